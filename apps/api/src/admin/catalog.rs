//! Admin CRUD for teams, learning modules and the skill catalogue.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::learning::LearningModuleRow;
use crate::models::skill::SkillRow;
use crate::models::team::TeamRow;
use crate::state::AppState;
use crate::training::xp::Difficulty;

fn required(field: &str, value: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{field} cannot be empty")));
    }
    Ok(value.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn conflict_on_unique(what: &'static str) -> impl Fn(sqlx::Error) -> AppError {
    move |e| match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict(format!("{what} already exists"))
        }
        other => AppError::Database(other),
    }
}

// ── Teams ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TeamRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct TeamWithCountRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub member_count: i64,
}

/// GET /api/admin/teams
pub async fn handle_list_teams(
    State(state): State<AppState>,
) -> Result<Json<Vec<TeamWithCountRow>>, AppError> {
    let teams = sqlx::query_as::<_, TeamWithCountRow>(
        r#"
        SELECT t.id, t.name, t.description, t.created_at, COUNT(u.id) AS member_count
        FROM teams t
        LEFT JOIN users u ON u.team_id = t.id
        GROUP BY t.id
        ORDER BY t.name
        "#,
    )
    .fetch_all(&state.db)
    .await?;
    Ok(Json(teams))
}

/// POST /api/admin/teams
pub async fn handle_create_team(
    State(state): State<AppState>,
    Json(req): Json<TeamRequest>,
) -> Result<(StatusCode, Json<TeamRow>), AppError> {
    let name = required("team name", &req.name)?;
    let team = sqlx::query_as::<_, TeamRow>(
        "INSERT INTO teams (name, description) VALUES ($1, $2) RETURNING *",
    )
    .bind(&name)
    .bind(optional(req.description))
    .fetch_one(&state.db)
    .await?;
    info!("Created team {} ({name})", team.id);
    Ok((StatusCode::CREATED, Json(team)))
}

/// PUT /api/admin/teams/:id
pub async fn handle_update_team(
    State(state): State<AppState>,
    Path(team_id): Path<Uuid>,
    Json(req): Json<TeamRequest>,
) -> Result<Json<TeamRow>, AppError> {
    let name = required("team name", &req.name)?;
    let team = sqlx::query_as::<_, TeamRow>(
        "UPDATE teams SET name = $2, description = $3 WHERE id = $1 RETURNING *",
    )
    .bind(team_id)
    .bind(&name)
    .bind(optional(req.description))
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Team {team_id} not found")))?;
    Ok(Json(team))
}

/// DELETE /api/admin/teams/:id
///
/// Members stay; their `team_id` is cleared by the foreign key.
pub async fn handle_delete_team(
    State(state): State<AppState>,
    Path(team_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let result = sqlx::query("DELETE FROM teams WHERE id = $1")
        .bind(team_id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Team {team_id} not found")));
    }
    info!("Deleted team {team_id}");
    Ok(StatusCode::NO_CONTENT)
}

// ── Learning modules ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ModuleRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content: String,
    pub category: String,
    #[serde(default = "default_difficulty")]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub xp_reward: i32,
    #[serde(default)]
    pub order_index: i32,
    #[serde(default)]
    pub duration_minutes: i32,
}

fn default_difficulty() -> Difficulty {
    Difficulty::Beginner
}

#[derive(Debug)]
struct ValidModule {
    title: String,
    category: String,
}

fn validate_module(req: &ModuleRequest) -> Result<ValidModule, AppError> {
    if req.xp_reward < 0 {
        return Err(AppError::Validation("xp_reward cannot be negative".to_string()));
    }
    if req.duration_minutes < 0 {
        return Err(AppError::Validation("duration_minutes cannot be negative".to_string()));
    }
    Ok(ValidModule {
        title: required("title", &req.title)?,
        category: required("category", &req.category)?,
    })
}

/// POST /api/admin/learning/modules
pub async fn handle_create_module(
    State(state): State<AppState>,
    Json(req): Json<ModuleRequest>,
) -> Result<(StatusCode, Json<LearningModuleRow>), AppError> {
    let valid = validate_module(&req)?;
    let module = sqlx::query_as::<_, LearningModuleRow>(
        r#"
        INSERT INTO learning_modules
            (title, description, content, category, difficulty, xp_reward, order_index, duration_minutes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(&valid.title)
    .bind(req.description.trim())
    .bind(&req.content)
    .bind(&valid.category)
    .bind(req.difficulty.as_str())
    .bind(req.xp_reward)
    .bind(req.order_index)
    .bind(req.duration_minutes)
    .fetch_one(&state.db)
    .await?;
    info!("Created learning module {} ({})", module.id, module.title);
    Ok((StatusCode::CREATED, Json(module)))
}

/// PUT /api/admin/learning/modules/:id
///
/// Changing `xp_reward` does not touch XP already awarded.
pub async fn handle_update_module(
    State(state): State<AppState>,
    Path(module_id): Path<Uuid>,
    Json(req): Json<ModuleRequest>,
) -> Result<Json<LearningModuleRow>, AppError> {
    let valid = validate_module(&req)?;
    let module = sqlx::query_as::<_, LearningModuleRow>(
        r#"
        UPDATE learning_modules
        SET title = $2, description = $3, content = $4, category = $5,
            difficulty = $6, xp_reward = $7, order_index = $8, duration_minutes = $9
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(module_id)
    .bind(&valid.title)
    .bind(req.description.trim())
    .bind(&req.content)
    .bind(&valid.category)
    .bind(req.difficulty.as_str())
    .bind(req.xp_reward)
    .bind(req.order_index)
    .bind(req.duration_minutes)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Learning module {module_id} not found")))?;
    Ok(Json(module))
}

/// DELETE /api/admin/learning/modules/:id
pub async fn handle_delete_module(
    State(state): State<AppState>,
    Path(module_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let result = sqlx::query("DELETE FROM learning_modules WHERE id = $1")
        .bind(module_id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Learning module {module_id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ── Skills ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SkillRequest {
    pub name: String,
    pub category: String,
    pub description: Option<String>,
}

/// GET /api/admin/skills
pub async fn handle_list_skills(
    State(state): State<AppState>,
) -> Result<Json<Vec<SkillRow>>, AppError> {
    let skills = sqlx::query_as::<_, SkillRow>("SELECT * FROM skills ORDER BY category, name")
        .fetch_all(&state.db)
        .await?;
    Ok(Json(skills))
}

/// POST /api/admin/skills
pub async fn handle_create_skill(
    State(state): State<AppState>,
    Json(req): Json<SkillRequest>,
) -> Result<(StatusCode, Json<SkillRow>), AppError> {
    let name = required("skill name", &req.name)?;
    let category = required("category", &req.category)?;
    let skill = sqlx::query_as::<_, SkillRow>(
        "INSERT INTO skills (name, category, description) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(&name)
    .bind(&category)
    .bind(optional(req.description))
    .fetch_one(&state.db)
    .await
    .map_err(conflict_on_unique("A skill with this name"))?;
    Ok((StatusCode::CREATED, Json(skill)))
}
