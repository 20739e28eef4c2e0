//! Axum route handlers for learning modules and per-user progress.

use std::fmt;
use std::str::FromStr;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::learning::{LearningModuleRow, ModuleWithProgressRow, UserProgressRow};
use crate::state::AppState;
use crate::training::xp::award_xp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl ProgressStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProgressStatus::NotStarted => "not_started",
            ProgressStatus::InProgress => "in_progress",
            ProgressStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProgressStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(ProgressStatus::NotStarted),
            "in_progress" => Ok(ProgressStatus::InProgress),
            "completed" => Ok(ProgressStatus::Completed),
            other => Err(AppError::Validation(format!("unknown progress status '{other}'"))),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateProgressRequest {
    pub status: ProgressStatus,
    pub progress_percent: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct ModuleDetailResponse {
    pub module: LearningModuleRow,
    pub progress: Option<UserProgressRow>,
}

#[derive(Debug, Serialize)]
pub struct UpdateProgressResponse {
    pub progress: UserProgressRow,
    pub xp_awarded: i32,
}

#[derive(Debug, Default, PartialEq, Serialize)]
pub struct ProgressSummary {
    pub total_modules: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub not_started: usize,
    pub completion_percent: f64,
}

#[derive(Debug, Serialize)]
pub struct ProgressOverviewResponse {
    pub summary: ProgressSummary,
    pub modules: Vec<ModuleWithProgressRow>,
}

/// Normalizes the requested percentage against the status: completed is
/// always 100, not started is always 0.
pub fn effective_percent(status: ProgressStatus, requested: Option<i32>) -> Result<i32, AppError> {
    if let Some(p) = requested {
        if !(0..=100).contains(&p) {
            return Err(AppError::Validation(
                "progress_percent must be between 0 and 100".to_string(),
            ));
        }
    }
    Ok(match status {
        ProgressStatus::NotStarted => 0,
        ProgressStatus::Completed => 100,
        ProgressStatus::InProgress => requested.unwrap_or(0).min(99),
    })
}

pub fn summarize(modules: &[ModuleWithProgressRow]) -> ProgressSummary {
    let count = |status: ProgressStatus| {
        modules
            .iter()
            .filter(|m| m.status == status.as_str())
            .count()
    };
    let completed = count(ProgressStatus::Completed);
    let total = modules.len();
    ProgressSummary {
        total_modules: total,
        completed,
        in_progress: count(ProgressStatus::InProgress),
        not_started: total - completed - count(ProgressStatus::InProgress),
        completion_percent: if total == 0 {
            0.0
        } else {
            completed as f64 * 100.0 / total as f64
        },
    }
}

async fn modules_with_progress(
    state: &AppState,
    user_id: Uuid,
) -> Result<Vec<ModuleWithProgressRow>, AppError> {
    Ok(sqlx::query_as::<_, ModuleWithProgressRow>(
        r#"
        SELECT m.id, m.title, m.description, m.category, m.difficulty, m.xp_reward,
               m.order_index, m.duration_minutes,
               COALESCE(p.status, 'not_started') AS status,
               COALESCE(p.progress_percent, 0)   AS progress_percent,
               p.completed_at
        FROM learning_modules m
        LEFT JOIN user_progress p ON p.module_id = m.id AND p.user_id = $1
        ORDER BY m.order_index, m.title
        "#,
    )
    .bind(user_id)
    .fetch_all(&state.db)
    .await?)
}

/// GET /api/learning/modules
pub async fn handle_list_modules(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<ModuleWithProgressRow>>, AppError> {
    Ok(Json(modules_with_progress(&state, auth.id).await?))
}

/// GET /api/learning/progress
pub async fn handle_progress_overview(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ProgressOverviewResponse>, AppError> {
    let modules = modules_with_progress(&state, auth.id).await?;
    Ok(Json(ProgressOverviewResponse {
        summary: summarize(&modules),
        modules,
    }))
}

/// GET /api/learning/modules/:id
pub async fn handle_get_module(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(module_id): Path<Uuid>,
) -> Result<Json<ModuleDetailResponse>, AppError> {
    let module = sqlx::query_as::<_, LearningModuleRow>("SELECT * FROM learning_modules WHERE id = $1")
        .bind(module_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Learning module {module_id} not found")))?;

    let progress = sqlx::query_as::<_, UserProgressRow>(
        "SELECT * FROM user_progress WHERE user_id = $1 AND module_id = $2",
    )
    .bind(auth.id)
    .bind(module_id)
    .fetch_optional(&state.db)
    .await?;

    Ok(Json(ModuleDetailResponse { module, progress }))
}

/// PUT /api/learning/modules/:id/progress
///
/// The module's XP is awarded on the first transition to `completed` only.
/// `completed_at` doubles as the award marker: it is set once, by a guarded
/// UPDATE, and never cleared.
pub async fn handle_update_progress(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(module_id): Path<Uuid>,
    Json(req): Json<UpdateProgressRequest>,
) -> Result<Json<UpdateProgressResponse>, AppError> {
    let percent = effective_percent(req.status, req.progress_percent)?;

    let mut tx = state.db.begin().await?;

    let xp_reward: i32 = sqlx::query_scalar("SELECT xp_reward FROM learning_modules WHERE id = $1")
        .bind(module_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Learning module {module_id} not found")))?;

    let mut progress = sqlx::query_as::<_, UserProgressRow>(
        r#"
        INSERT INTO user_progress (user_id, module_id, status, progress_percent)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id, module_id) DO UPDATE
        SET status = EXCLUDED.status,
            progress_percent = EXCLUDED.progress_percent,
            updated_at = now()
        RETURNING *
        "#,
    )
    .bind(auth.id)
    .bind(module_id)
    .bind(req.status.as_str())
    .bind(percent)
    .fetch_one(&mut *tx)
    .await?;

    let mut xp_awarded = 0;
    if req.status == ProgressStatus::Completed {
        let first_completion = sqlx::query_as::<_, UserProgressRow>(
            r#"
            UPDATE user_progress SET completed_at = now()
            WHERE user_id = $1 AND module_id = $2 AND completed_at IS NULL
            RETURNING *
            "#,
        )
        .bind(auth.id)
        .bind(module_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(row) = first_completion {
            progress = row;
            if xp_reward > 0 {
                award_xp(&mut *tx, auth.id, xp_reward).await?;
            }
            xp_awarded = xp_reward;
        }
    }

    tx.commit().await?;

    if xp_awarded > 0 {
        info!("User {} completed module {module_id} (+{xp_awarded} XP)", auth.id);
    }
    Ok(Json(UpdateProgressResponse {
        progress,
        xp_awarded,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(status: &str) -> ModuleWithProgressRow {
        ModuleWithProgressRow {
            id: Uuid::new_v4(),
            title: "MEDDIC basics".into(),
            description: String::new(),
            category: "qualification".into(),
            difficulty: "beginner".into(),
            xp_reward: 25,
            order_index: 0,
            duration_minutes: 10,
            status: status.into(),
            progress_percent: 0,
            completed_at: None,
        }
    }

    #[test]
    fn test_effective_percent() {
        assert_eq!(effective_percent(ProgressStatus::Completed, Some(10)).unwrap(), 100);
        assert_eq!(effective_percent(ProgressStatus::NotStarted, Some(50)).unwrap(), 0);
        assert_eq!(effective_percent(ProgressStatus::InProgress, Some(40)).unwrap(), 40);
        assert_eq!(effective_percent(ProgressStatus::InProgress, Some(100)).unwrap(), 99);
        assert_eq!(effective_percent(ProgressStatus::InProgress, None).unwrap(), 0);
        assert!(effective_percent(ProgressStatus::InProgress, Some(101)).is_err());
        assert!(effective_percent(ProgressStatus::Completed, Some(-1)).is_err());
    }

    #[test]
    fn test_summarize() {
        let modules = vec![
            module("completed"),
            module("in_progress"),
            module("not_started"),
            module("completed"),
        ];
        assert_eq!(
            summarize(&modules),
            ProgressSummary {
                total_modules: 4,
                completed: 2,
                in_progress: 1,
                not_started: 1,
                completion_percent: 50.0,
            }
        );
        assert_eq!(summarize(&[]), ProgressSummary::default());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("in_progress".parse::<ProgressStatus>().unwrap(), ProgressStatus::InProgress);
        assert!("done".parse::<ProgressStatus>().is_err());
    }
}
