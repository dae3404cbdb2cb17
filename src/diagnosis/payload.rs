//! Wire format of the `generateContent` call.

use serde::{Deserialize, Serialize};

use super::{DiagnosisRequest, IMAGE_MIME_TYPE, SYSTEM_INSTRUCTION};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub system_instruction: Content,
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationConfig {
    pub temperature: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    status: Option<String>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    fn jpeg(data: impl Into<String>) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: IMAGE_MIME_TYPE.into(),
                data: data.into(),
            }),
        }
    }
}

pub fn build_request(request: &DiagnosisRequest, temperature: f64) -> GenerateContentRequest {
    let mut parts = vec![Part::text(request.prompt_text.clone())];
    if let Some(image) = &request.image_data {
        parts.push(Part::jpeg(image.clone()));
    }

    GenerateContentRequest {
        system_instruction: Content {
            role: None,
            parts: vec![Part::text(SYSTEM_INSTRUCTION)],
        },
        contents: vec![Content {
            role: Some("user".into()),
            parts,
        }],
        generation_config: GenerationConfig { temperature },
    }
}

/// Pulls the reply text out of a successful response body.
///
/// An answer with no text at all counts as malformed.
pub fn parse_response(body: &str) -> AppResult<String> {
    let response: GenerateContentResponse = serde_json::from_str(body)?;

    let text: String = response
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect::<String>()
        })
        .unwrap_or_default();

    if !text.trim().is_empty() {
        return Ok(text);
    }

    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(AppError::Remote(format!("Prompt blocked: {reason}")));
    }
    let finish = response
        .candidates
        .first()
        .and_then(|c| c.finish_reason.clone())
        .unwrap_or_else(|| "none".into());
    Err(AppError::Remote(format!(
        "Empty response from model (finish reason: {finish})"
    )))
}

/// Maps a non-2xx response to an error, keeping the remote message when the
/// body is the usual error envelope.
pub fn parse_error(status: u16, body: &str) -> AppError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            let status_name = envelope.error.status.unwrap_or_default();
            AppError::Remote(format!(
                "HTTP {status} {status_name}: {}",
                envelope.error.message
            ))
        }
        Err(_) => {
            let snippet: String = body.chars().take(200).collect();
            AppError::Remote(format!("HTTP {status}: {snippet}"))
        }
    }
}
