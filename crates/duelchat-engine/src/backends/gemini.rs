use super::GenerationBackend;
use crate::config::ModelConfig;
use async_trait::async_trait;
use duelchat_core::{DuelchatError, DuelchatResult, Role, Turn};

/// Live backend speaking the Gemini `generateContent` REST API.
///
/// System turns are folded into the `systemInstruction` field; user and
/// assistant turns become `contents` entries with roles `user` and `model`.
pub struct GeminiBackend {
    config: ModelConfig,
    http: reqwest::Client,
}

impl GeminiBackend {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn build_body(&self, turns: &[Turn]) -> serde_json::Value {
        let system_text = turns
            .iter()
            .filter(|t| t.role == Role::System)
            .map(|t| t.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let contents: Vec<serde_json::Value> = turns
            .iter()
            .filter(|t| t.role != Role::System)
            .map(|t| {
                serde_json::json!({
                    "role": match t.role {
                        Role::User => "user",
                        Role::Assistant => "model",
                        Role::System => unreachable!(),
                    },
                    "parts": [{"text": t.content}]
                })
            })
            .collect();

        let mut body = serde_json::json!({
            "contents": contents,
            "generationConfig": {
                "temperature": self.config.temperature,
                "topP": self.config.top_p,
                "maxOutputTokens": self.config.max_output_tokens,
            }
        });

        if !system_text.is_empty() {
            body["systemInstruction"] = serde_json::json!({
                "parts": [{"text": system_text}]
            });
        }

        body
    }
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    async fn generate(&self, turns: &[Turn]) -> DuelchatResult<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url(),
            self.config.model_id
        );

        let resp = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .header("Content-Type", "application/json")
            .json(&self.build_body(turns))
            .send()
            .await
            .map_err(|e| DuelchatError::Http(e.to_string()))?;

        let status = resp.status();
        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| DuelchatError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(DuelchatError::Http(format!(
                "Gemini API error {status}: {resp_body}"
            )));
        }

        parse_gemini_response(&resp_body)
    }
}

pub fn parse_gemini_response(body: &serde_json::Value) -> DuelchatResult<String> {
    body["candidates"][0]["content"]["parts"][0]["text"]
        .as_str()
        .map(ToString::to_string)
        .ok_or_else(|| {
            DuelchatError::Backend(format!("Gemini response carried no text candidate: {body}"))
        })
}
