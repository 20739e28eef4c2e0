//! Axum route handlers for the caller's own profile, stats and skills.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::handlers::{normalize_email, validate_password};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::skill::UserSkillRow;
use crate::models::team::TeamRow;
use crate::models::user::UserRow;
use crate::state::AppState;
use crate::training::xp::{level_for_xp, LevelInfo};

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: UserRow,
    pub team: Option<TeamRow>,
    pub level: LevelInfo,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserStats {
    pub total_xp: i32,
    pub total_pitches: i64,
    pub average_score: f64,
    pub best_score: i32,
    pub sessions_started: i64,
    pub sessions_completed: i64,
    pub modules_completed: i64,
}

#[derive(Debug, Serialize)]
pub struct UserStatsResponse {
    #[serde(flatten)]
    pub stats: UserStats,
    pub level: LevelInfo,
}

async fn load_user(state: &AppState, auth: AuthUser) -> Result<UserRow, AppError> {
    sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
        .bind(auth.id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(AppError::Unauthorized)
}

/// GET /api/user/profile
pub async fn handle_get_profile(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ProfileResponse>, AppError> {
    let user = load_user(&state, auth).await?;
    let team = match user.team_id {
        Some(team_id) => sqlx::query_as::<_, TeamRow>("SELECT * FROM teams WHERE id = $1")
            .bind(team_id)
            .fetch_optional(&state.db)
            .await?,
        None => None,
    };
    let level = level_for_xp(user.total_xp);
    Ok(Json(ProfileResponse { user, team, level }))
}

/// PUT /api/user/profile
///
/// Only name and email are editable here. Role, team and XP are changed by
/// admins or earned.
pub async fn handle_update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<UserRow>, AppError> {
    let name = match req.name.as_deref().map(str::trim) {
        Some("") => return Err(AppError::Validation("name cannot be empty".to_string())),
        other => other,
    };
    let email = req.email.as_deref().map(normalize_email).transpose()?;

    let user = sqlx::query_as::<_, UserRow>(
        r#"
        UPDATE users
        SET name = COALESCE($2, name),
            email = COALESCE($3, email),
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(auth.id)
    .bind(name)
    .bind(email)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict("An account with this email already exists".to_string())
        }
        other => AppError::Database(other),
    })?
    .ok_or(AppError::Unauthorized)?;
    Ok(Json(user))
}

/// PUT /api/user/password
pub async fn handle_change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<StatusCode, AppError> {
    validate_password(&req.new_password)?;
    let user = load_user(&state, auth).await?;
    if !verify_password(req.current_password, user.password_hash).await? {
        return Err(AppError::Validation("current password is incorrect".to_string()));
    }

    let password_hash = hash_password(req.new_password).await?;
    sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
        .bind(auth.id)
        .bind(password_hash)
        .execute(&state.db)
        .await?;

    info!("User {} changed their password", auth.id);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/user/stats
pub async fn handle_user_stats(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UserStatsResponse>, AppError> {
    let stats = sqlx::query_as::<_, UserStats>(
        r#"
        SELECT u.total_xp,
               (SELECT COUNT(*) FROM pitches p WHERE p.user_id = u.id) AS total_pitches,
               (SELECT COALESCE(AVG(p.overall_score), 0)::float8
                FROM pitches p WHERE p.user_id = u.id)                 AS average_score,
               (SELECT COALESCE(MAX(p.overall_score), 0)
                FROM pitches p WHERE p.user_id = u.id)                 AS best_score,
               (SELECT COUNT(*) FROM training_sessions s
                WHERE s.user_id = u.id)                                AS sessions_started,
               (SELECT COUNT(*) FROM training_sessions s
                WHERE s.user_id = u.id AND s.completed)                AS sessions_completed,
               (SELECT COUNT(*) FROM user_progress up
                WHERE up.user_id = u.id AND up.completed_at IS NOT NULL) AS modules_completed
        FROM users u
        WHERE u.id = $1
        "#,
    )
    .bind(auth.id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::Unauthorized)?;

    let level = level_for_xp(stats.total_xp);
    Ok(Json(UserStatsResponse { stats, level }))
}

/// GET /api/user/skills
///
/// Every catalogue skill is listed; skills the user has never been scored on
/// report level 0.
pub async fn handle_user_skills(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<UserSkillRow>>, AppError> {
    let skills = sqlx::query_as::<_, UserSkillRow>(
        r#"
        SELECT s.id AS skill_id, s.name, s.category,
               COALESCE(us.level, 0) AS level,
               us.updated_at
        FROM skills s
        LEFT JOIN user_skills us ON us.skill_id = s.id AND us.user_id = $1
        ORDER BY s.category, s.name
        "#,
    )
    .bind(auth.id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(skills))
}
