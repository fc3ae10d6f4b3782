use serde::{Deserialize, Serialize};

/// Which generation backend to run against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendProvider {
    /// The Google Gemini REST API.
    Gemini,
    /// Deterministic in-process fake — no network, canned replies.
    Scripted,
}

/// Generation backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub provider: BackendProvider,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default)]
    pub api_key: String,
    /// Override for tests and self-hosted proxies.
    pub api_base_url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

fn default_model_id() -> String {
    "gemini-pro".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_top_p() -> f32 {
    0.95
}

fn default_max_output_tokens() -> u32 {
    1024
}

impl ModelConfig {
    /// The API base URL, honoring any configured override.
    pub fn base_url(&self) -> &str {
        if let Some(url) = &self.api_base_url {
            url
        } else {
            match self.provider {
                BackendProvider::Gemini => "https://generativelanguage.googleapis.com",
                BackendProvider::Scripted => "local://scripted",
            }
        }
    }

    /// A minimal scripted configuration, handy for tests and offline runs.
    pub fn scripted() -> Self {
        Self {
            provider: BackendProvider::Scripted,
            model_id: "scripted".to_string(),
            api_key: String::new(),
            api_base_url: None,
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_serialization() {
        assert_eq!(
            serde_json::to_string(&BackendProvider::Gemini).unwrap(),
            "\"gemini\""
        );
        let provider: BackendProvider = serde_json::from_str("\"scripted\"").unwrap();
        assert!(matches!(provider, BackendProvider::Scripted));
    }

    #[test]
    fn test_config_defaults_from_toml() {
        let config: ModelConfig = toml::from_str("provider = \"gemini\"").unwrap();
        assert_eq!(config.model_id, "gemini-pro");
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.top_p, 0.95);
        assert_eq!(config.max_output_tokens, 1024);
        assert_eq!(config.base_url(), "https://generativelanguage.googleapis.com");
    }

    #[test]
    fn test_base_url_override() {
        let mut config = ModelConfig::scripted();
        config.api_base_url = Some("http://127.0.0.1:9".to_string());
        assert_eq!(config.base_url(), "http://127.0.0.1:9");
    }
}
