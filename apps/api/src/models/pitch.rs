use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PitchRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub training_session_id: Option<Uuid>,
    pub industry_id: Option<Uuid>,
    pub title: String,
    pub transcript: String,
    pub audio_url: Option<String>,
    pub analysis: Value,
    pub overall_score: i32,
    pub metrics_score: i32,
    pub economic_buyer_score: i32,
    pub decision_criteria_score: i32,
    pub decision_process_score: i32,
    pub identify_pain_score: i32,
    pub champion_score: i32,
    pub sentiment_score: i32,
    pub confidence_score: i32,
    pub pace_score: i32,
    pub clarity_score: i32,
    pub filler_word_count: i32,
    pub question_count: i32,
    pub created_at: DateTime<Utc>,
}

/// Lightweight listing view; omits transcript and the analysis blob.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PitchSummaryRow {
    pub id: Uuid,
    pub title: String,
    pub training_session_id: Option<Uuid>,
    pub audio_url: Option<String>,
    pub overall_score: i32,
    pub created_at: DateTime<Utc>,
}
