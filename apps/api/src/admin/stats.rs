use axum::{extract::State, Json};
use serde::Serialize;
use sqlx::FromRow;

use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PlatformStats {
    pub total_users: i64,
    pub users: i64,
    pub team_leads: i64,
    pub admins: i64,
    pub total_teams: i64,
    pub total_pitches: i64,
    pub average_score: f64,
    pub pitches_last_7_days: i64,
    pub sessions_started: i64,
    pub sessions_completed: i64,
    pub modules_completed: i64,
    pub total_xp_awarded: i64,
}

/// GET /api/admin/stats
pub async fn handle_platform_stats(
    State(state): State<AppState>,
) -> Result<Json<PlatformStats>, AppError> {
    let stats = sqlx::query_as::<_, PlatformStats>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM users)                             AS total_users,
            (SELECT COUNT(*) FROM users WHERE role = 'user')         AS users,
            (SELECT COUNT(*) FROM users WHERE role = 'team_lead')    AS team_leads,
            (SELECT COUNT(*) FROM users WHERE role = 'admin')        AS admins,
            (SELECT COUNT(*) FROM teams)                             AS total_teams,
            (SELECT COUNT(*) FROM pitches)                           AS total_pitches,
            (SELECT COALESCE(AVG(overall_score), 0)::float8 FROM pitches) AS average_score,
            (SELECT COUNT(*) FROM pitches
             WHERE created_at > now() - interval '7 days')           AS pitches_last_7_days,
            (SELECT COUNT(*) FROM training_sessions)                 AS sessions_started,
            (SELECT COUNT(*) FROM training_sessions WHERE completed) AS sessions_completed,
            (SELECT COUNT(*) FROM user_progress
             WHERE completed_at IS NOT NULL)                         AS modules_completed,
            (SELECT COALESCE(SUM(total_xp), 0)::int8 FROM users)     AS total_xp_awarded
        "#,
    )
    .fetch_one(&state.db)
    .await?;
    Ok(Json(stats))
}
