pub mod client;
pub mod config;
pub mod image;
pub mod payload;

use std::future::Future;

use crate::models::settings::Language;

pub const DEFAULT_MODEL: &str = "gemini-3-pro-preview";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Media type every inline image is tagged with.
pub const IMAGE_MIME_TYPE: &str = "image/jpeg";

/// Prompt sent alongside an uploaded photo, whatever the UI language.
pub const IMAGE_ANALYSIS_PROMPT: &str = "Please analyze this potato leaf for diseases.";

pub const SYSTEM_INSTRUCTION: &str = "You are an expert agronomist specialized in potato crops (Solanum tuberosum). \
You help farmers identify diseases like Late Blight (Phytophthora infestans), Early Blight, and pests. \
Provide structured advice: Diagnosis, Confidence Level, and Treatment Plan (Organic and Chemical options). \
Be professional, technical yet accessible.";

// Matched against English output only, even in the Spanish UI.
const DIAGNOSIS_MARKER: &str = "diagnosis";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosisRequest {
    pub prompt_text: String,
    /// Base64 of a single JPEG image.
    pub image_data: Option<String>,
}

impl DiagnosisRequest {
    pub fn text(prompt_text: impl Into<String>) -> Self {
        Self {
            prompt_text: prompt_text.into(),
            image_data: None,
        }
    }

    pub fn with_image(prompt_text: impl Into<String>, image_base64: impl Into<String>) -> Self {
        Self {
            prompt_text: prompt_text.into(),
            image_data: Some(image_base64.into()),
        }
    }
}

/// Turns a prompt into display-ready reply text.
///
/// Implementations never fail outward: a failed call resolves to the
/// localized apology for `language`.
pub trait DiagnosisService: Send + Sync + 'static {
    fn diagnose(
        &self,
        request: DiagnosisRequest,
        language: Language,
    ) -> impl Future<Output = String> + Send;
}

pub fn is_diagnostic_reply(text: &str) -> bool {
    text.to_lowercase().contains(DIAGNOSIS_MARKER)
}
