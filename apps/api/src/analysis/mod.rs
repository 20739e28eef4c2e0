//! Pitch analysis. Turns a transcript, recording or role-play conversation
//! into a fixed-shape MEDDIC score.
//!
//! `AppState` holds an `Arc<dyn PitchAnalyzer>`. The production backend is
//! `LlmPitchAnalyzer`; tests substitute their own.
//!
//! Analysis never fails from the caller's point of view: model, network and
//! parse errors are logged and replaced by `PitchAnalysis::default()` so a
//! submission is always saved.

pub mod models;
pub mod parser;
pub mod prompts;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::llm_client::{LlmClient, LlmError, LlmResponse};
use crate::models::training::ConversationTurn;

pub use models::{MeddicDimension, PitchAnalysis};
use parser::parse_analysis;
use prompts::{analysis_system, build_analysis_prompt, build_audio_prompt};

/// Optional framing passed alongside the pitch.
#[derive(Debug, Clone, Default)]
pub struct AnalysisContext {
    pub industry: Option<String>,
    pub scenario: Option<String>,
    pub difficulty: Option<String>,
    pub conversation: Vec<ConversationTurn>,
}

#[async_trait]
pub trait PitchAnalyzer: Send + Sync {
    async fn analyze_text(&self, transcript: &str, context: &AnalysisContext) -> PitchAnalysis;

    async fn analyze_audio(
        &self,
        audio: &[u8],
        mime_type: &str,
        context: &AnalysisContext,
    ) -> PitchAnalysis;
}

/// Scores pitches with the generative model behind `LlmClient`.
pub struct LlmPitchAnalyzer(pub LlmClient);

#[async_trait]
impl PitchAnalyzer for LlmPitchAnalyzer {
    async fn analyze_text(&self, transcript: &str, context: &AnalysisContext) -> PitchAnalysis {
        let prompt = build_analysis_prompt(transcript, context);
        let result = self.0.call(&prompt, &analysis_system()).await;
        degrade("text", result)
    }

    async fn analyze_audio(
        &self,
        audio: &[u8],
        mime_type: &str,
        context: &AnalysisContext,
    ) -> PitchAnalysis {
        let prompt = build_audio_prompt(context);
        let result = self
            .0
            .call_with_audio(&prompt, &analysis_system(), audio, mime_type)
            .await;
        degrade("audio", result)
    }
}

fn degrade(input: &str, result: Result<LlmResponse, LlmError>) -> PitchAnalysis {
    let text = match result.and_then(|r| r.text().ok_or(LlmError::EmptyContent)) {
        Ok(text) => text,
        Err(e) => {
            warn!("Pitch analysis ({input}) failed, using zeroed analysis: {e}");
            return PitchAnalysis::default();
        }
    };
    let analysis = parse_analysis(&text);
    info!(
        "Pitch analysis ({input}) complete: overall_score={}",
        analysis.overall_score
    );
    analysis
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::tests::{gemini_text_response, spawn_mock_server};
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::Value;

    async fn analyzer_replying(status: StatusCode, body: Value) -> LlmPitchAnalyzer {
        let router = Router::new().route(
            "/models/:model",
            post(move || {
                let body = body.clone();
                async move { (status, Json(body)) }
            }),
        );
        let base = spawn_mock_server(router).await;
        LlmPitchAnalyzer(LlmClient::new("k".into(), base, "test-model".into()).unwrap())
    }

    #[tokio::test]
    async fn test_text_analysis_parses_model_output() {
        let analyzer = analyzer_replying(
            StatusCode::OK,
            gemini_text_response(
                r#"{"overall_score": 77, "meddic": {"champion": {"score": 60, "feedback": "ok"}}}"#,
            ),
        )
        .await;
        let analysis = analyzer
            .analyze_text("Our platform saves 10 hours a week.", &AnalysisContext::default())
            .await;
        assert_eq!(analysis.overall_score, 77);
        assert_eq!(analysis.meddic.champion.score, 60);
    }

    #[tokio::test]
    async fn test_server_error_degrades_to_zero() {
        let analyzer = analyzer_replying(
            StatusCode::INTERNAL_SERVER_ERROR,
            serde_json::json!({"error": {"message": "overloaded"}}),
        )
        .await;
        let analysis = analyzer
            .analyze_text("pitch", &AnalysisContext::default())
            .await;
        assert!(analysis.is_fallback());
    }

    #[tokio::test]
    async fn test_malformed_output_degrades_to_zero() {
        let analyzer = analyzer_replying(
            StatusCode::OK,
            gemini_text_response("Sorry, I cannot score this pitch."),
        )
        .await;
        let analysis = analyzer
            .analyze_audio(b"RIFF....", "audio/wav", &AnalysisContext::default())
            .await;
        assert!(analysis.is_fallback());
    }

    #[tokio::test]
    async fn test_empty_candidates_degrade_to_zero() {
        let analyzer = analyzer_replying(StatusCode::OK, serde_json::json!({"candidates": []})).await;
        let analysis = analyzer
            .analyze_text("pitch", &AnalysisContext::default())
            .await;
        assert!(analysis.is_fallback());
    }

    #[tokio::test]
    async fn test_unreachable_model_degrades_to_zero() {
        let analyzer = LlmPitchAnalyzer(
            LlmClient::new("k".into(), "http://127.0.0.1:1".into(), "m".into()).unwrap(),
        );
        let analysis = analyzer
            .analyze_text("pitch", &AnalysisContext::default())
            .await;
        assert!(analysis.is_fallback());
    }
}
