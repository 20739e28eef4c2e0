//! LLM client: the single point of entry for all generative-model calls.
//!
//! No other module may call the Gemini API directly. Every model interaction
//! (pitch scoring, audio scoring, role-play replies) goes through here.
//!
//! Calls are made once. There is no retry or backoff: callers decide how to
//! degrade when a call fails.
use std::time::Duration;

use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub mod prompts;

const MAX_OUTPUT_TOKENS: u32 = 4096;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// Who produced a conversation turn, in the model's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Model,
}

impl ChatRole {
    fn as_str(self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Model => "model",
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    system_instruction: Content,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

impl Part {
    fn text(text: &str) -> Self {
        Part {
            text: Some(text.to_string()),
            inline_data: None,
        }
    }

    fn inline(mime_type: &str, bytes: &[u8]) -> Self {
        Part {
            text: None,
            inline_data: Some(InlineData {
                mime_type: mime_type.to_string(),
                data: base64::engine::general_purpose::STANDARD.encode(bytes),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
}

impl LlmResponse {
    /// Concatenates the text parts of the first candidate.
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: String,
}

/// The single LLM client used by all services.
/// Wraps the Gemini `generateContent` API with structured output helpers.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
}

impl LlmClient {
    pub fn new(api_key: String, api_base: String, model: String) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            model,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Single-turn text prompt. The model is asked for a JSON response.
    pub async fn call(&self, prompt: &str, system: &str) -> Result<LlmResponse, LlmError> {
        let contents = vec![Content {
            role: Some(ChatRole::User.as_str().to_string()),
            parts: vec![Part::text(prompt)],
        }];
        self.send(contents, system, true).await
    }

    /// Single-turn prompt with an inline audio attachment. The model is asked
    /// for a JSON response.
    pub async fn call_with_audio(
        &self,
        prompt: &str,
        system: &str,
        audio: &[u8],
        mime_type: &str,
    ) -> Result<LlmResponse, LlmError> {
        let contents = vec![Content {
            role: Some(ChatRole::User.as_str().to_string()),
            parts: vec![Part::inline(mime_type, audio), Part::text(prompt)],
        }];
        self.send(contents, system, true).await
    }

    /// Multi-turn free-text conversation. Turns are sent in order.
    pub async fn chat(
        &self,
        system: &str,
        turns: &[(ChatRole, String)],
    ) -> Result<String, LlmError> {
        let contents = turns
            .iter()
            .map(|(role, text)| Content {
                role: Some(role.as_str().to_string()),
                parts: vec![Part::text(text)],
            })
            .collect();
        let response = self.send(contents, system, false).await?;
        response.text().ok_or(LlmError::EmptyContent)
    }

    async fn send(
        &self,
        contents: Vec<Content>,
        system: &str,
        json_output: bool,
    ) -> Result<LlmResponse, LlmError> {
        let request_body = GenerateContentRequest {
            contents,
            system_instruction: Content {
                role: None,
                parts: vec![Part::text(system)],
            },
            generation_config: GenerationConfig {
                max_output_tokens: MAX_OUTPUT_TOKENS,
                temperature: if json_output { 0.2 } else { 0.8 },
                response_mime_type: json_output.then_some("application/json"),
            },
        };

        let url = format!("{}/models/{}:generateContent", self.api_base, self.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GeminiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let llm_response: LlmResponse = response.json().await?;

        if let Some(usage) = &llm_response.usage_metadata {
            debug!(
                "LLM call succeeded: prompt_tokens={}, output_tokens={}",
                usage.prompt_token_count, usage.candidates_token_count
            );
        }

        Ok(llm_response)
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};
    use serde_json::{json, Value};

    /// Starts a stand-in HTTP service (Gemini, S3) on an ephemeral port and
    /// returns its base URL.
    pub(crate) async fn spawn_mock_server(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    pub(crate) fn gemini_text_response(text: &str) -> Value {
        json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 34}
        })
    }

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_audio_part_serializes_as_inline_data() {
        let part = Part::inline("audio/webm", b"abc");
        let value = serde_json::to_value(&part).unwrap();
        assert_eq!(value["inlineData"]["mimeType"], "audio/webm");
        assert_eq!(value["inlineData"]["data"], "YWJj");
        assert!(value.get("text").is_none());
    }

    #[test]
    fn test_response_text_joins_parts() {
        let response: LlmResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{"text": "{\"a\":"}, {"text": " 1}"}]}}]
        }))
        .unwrap();
        assert_eq!(response.text().as_deref(), Some("{\"a\": 1}"));
    }

    #[test]
    fn test_response_without_candidates_has_no_text() {
        let response: LlmResponse = serde_json::from_value(json!({})).unwrap();
        assert!(response.text().is_none());
    }

    #[tokio::test]
    async fn test_call_requests_json_output() {
        let router = Router::new().route(
            "/models/:model",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(
                    body["generationConfig"]["responseMimeType"],
                    "application/json"
                );
                assert_eq!(body["systemInstruction"]["parts"][0]["text"], "sys");
                Json(gemini_text_response("```json\n{\"ok\": true}\n```"))
            }),
        );
        let base = spawn_mock_server(router).await;
        let client = LlmClient::new("k".into(), base, "test-model".into()).unwrap();

        let response = client.call("prompt", "sys").await.unwrap();
        let text = response.text().unwrap();
        let value: Value = serde_json::from_str(strip_json_fences(&text)).unwrap();
        assert_eq!(value, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_api_error_message_is_extracted() {
        let router = Router::new().route(
            "/models/:model",
            post(|| async {
                (
                    axum::http::StatusCode::BAD_REQUEST,
                    Json(json!({"error": {"message": "API key not valid"}})),
                )
            }),
        );
        let base = spawn_mock_server(router).await;
        let client = LlmClient::new("k".into(), base, "test-model".into()).unwrap();

        match client.call("prompt", "sys").await {
            Err(LlmError::Api { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "API key not valid");
            }
            other => panic!("expected API error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_chat_sends_turns_in_order() {
        let router = Router::new().route(
            "/models/:model",
            post(|Json(body): Json<Value>| async move {
                let roles: Vec<&str> = body["contents"]
                    .as_array()
                    .unwrap()
                    .iter()
                    .map(|c| c["role"].as_str().unwrap())
                    .collect();
                assert_eq!(roles, vec!["user", "model", "user"]);
                assert!(body["generationConfig"].get("responseMimeType").is_none());
                Json(gemini_text_response("We already use a competitor."))
            }),
        );
        let base = spawn_mock_server(router).await;
        let client = LlmClient::new("k".into(), base, "test-model".into()).unwrap();

        let turns = vec![
            (ChatRole::User, "Hi".to_string()),
            (ChatRole::Model, "Who is this?".to_string()),
            (ChatRole::User, "I sell analytics.".to_string()),
        ];
        let reply = client.chat("play a prospect", &turns).await.unwrap();
        assert_eq!(reply, "We already use a competitor.");
    }
}
