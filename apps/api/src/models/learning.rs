use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LearningModuleRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub content: String,
    pub category: String,
    pub difficulty: String,
    pub xp_reward: i32,
    pub order_index: i32,
    pub duration_minutes: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserProgressRow {
    pub user_id: Uuid,
    pub module_id: Uuid,
    pub status: String,
    pub progress_percent: i32,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// A module joined with the caller's progress; progress columns are
/// defaulted when the user has never opened the module.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ModuleWithProgressRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub difficulty: String,
    pub xp_reward: i32,
    pub order_index: i32,
    pub duration_minutes: i32,
    pub status: String,
    pub progress_percent: i32,
    pub completed_at: Option<DateTime<Utc>>,
}
