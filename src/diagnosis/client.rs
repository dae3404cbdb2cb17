use super::config::DiagnosisConfig;
use super::payload;
use super::{DiagnosisRequest, DiagnosisService};
use crate::error::{AppError, AppResult};
use crate::i18n;
use crate::models::settings::Language;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Single-shot client for the hosted Gemini model.
pub struct GeminiClient {
    http: reqwest::Client,
    config: DiagnosisConfig,
}

impl GeminiClient {
    pub fn new(config: DiagnosisConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::Transport(format!("HTTP client error: {e}")))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &DiagnosisConfig {
        &self.config
    }

    /// One `generateContent` round trip. No retries.
    pub async fn generate(&self, request: &DiagnosisRequest) -> AppResult<String> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::InvalidRequest("Gemini API key not configured".into()))?;

        let body = payload::build_request(request, self.config.temperature);
        log::debug!(
            "Gemini request: model={}, prompt_len={}, image_len={}",
            self.config.model,
            request.prompt_text.len(),
            request.image_data.as_ref().map_or(0, |d| d.len())
        );

        let resp = self
            .http
            .post(self.config.generate_url())
            .header(API_KEY_HEADER, api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(payload::parse_error(status.as_u16(), &text));
        }

        payload::parse_response(&text)
    }
}

impl DiagnosisService for GeminiClient {
    async fn diagnose(&self, request: DiagnosisRequest, language: Language) -> String {
        match self.generate(&request).await {
            Ok(text) => text,
            Err(e) => {
                log::error!("Gemini diagnosis error: {}", e);
                i18n::chat_strings(language).error_fallback.to_string()
            }
        }
    }
}
