use std::time::Duration;

use super::{DEFAULT_ENDPOINT, DEFAULT_MODEL, DEFAULT_TEMPERATURE};

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const LEGACY_API_KEY_ENV: &str = "API_KEY";
pub const ENDPOINT_ENV: &str = "PAPANDES_GEMINI_ENDPOINT";

#[derive(Debug, Clone)]
pub struct DiagnosisConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub temperature: f64,
    pub timeout: Duration,
}

impl Default for DiagnosisConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.into(),
            endpoint: DEFAULT_ENDPOINT.into(),
            temperature: DEFAULT_TEMPERATURE,
            timeout: Duration::from_secs(60),
        }
    }
}

impl DiagnosisConfig {
    /// Reads the API key and optional endpoint override from the environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let api_key = non_empty(API_KEY_ENV).or_else(|| non_empty(LEGACY_API_KEY_ENV));
        if api_key.is_none() {
            log::warn!("{} is not set; diagnosis requests will fail", API_KEY_ENV);
        }

        let mut config = Self {
            api_key,
            ..Self::default()
        };
        if let Some(endpoint) = non_empty(ENDPOINT_ENV) {
            log::info!("Using Gemini endpoint override: {}", endpoint);
            config.endpoint = endpoint;
        }
        config
    }

    pub fn generate_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        )
    }
}
