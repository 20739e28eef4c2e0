//! Axum route handlers for `/api/team`. Mounted behind `require_manager`.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{AuthUser, Role};
use crate::errors::AppError;
use crate::models::pitch::PitchSummaryRow;
use crate::models::team::TeamRow;
use crate::pagination::Page;
use crate::state::AppState;
use crate::team::analytics::{member_summaries, team_analytics, MemberSummaryRow, TeamAnalytics};

#[derive(Debug, Default, Deserialize)]
pub struct TeamQuery {
    /// Admins may look at any team; leads only at their own.
    pub team_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct TeamResponse {
    pub team: TeamRow,
    pub members: Vec<MemberSummaryRow>,
}

/// Picks the team a request is about.
pub fn resolve_team_id(
    auth: AuthUser,
    own_team: Option<Uuid>,
    requested: Option<Uuid>,
) -> Result<Uuid, AppError> {
    match requested {
        Some(team_id) if auth.role == Role::Admin || own_team == Some(team_id) => Ok(team_id),
        Some(_) => Err(AppError::Forbidden),
        None => own_team.ok_or_else(|| AppError::NotFound("You are not assigned to a team".to_string())),
    }
}

async fn own_team_id(state: &AppState, user_id: Uuid) -> Result<Option<Uuid>, AppError> {
    let team: Option<Option<Uuid>> = sqlx::query_scalar("SELECT team_id FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&state.db)
        .await?;
    team.ok_or(AppError::Unauthorized)
}

async fn load_team(state: &AppState, team_id: Uuid) -> Result<TeamRow, AppError> {
    sqlx::query_as::<_, TeamRow>("SELECT * FROM teams WHERE id = $1")
        .bind(team_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Team {team_id} not found")))
}

/// GET /api/team
pub async fn handle_get_team(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<TeamQuery>,
) -> Result<Json<TeamResponse>, AppError> {
    let own = own_team_id(&state, auth.id).await?;
    let team_id = resolve_team_id(auth, own, query.team_id)?;
    let team = load_team(&state, team_id).await?;
    let members = member_summaries(&state.db, team_id).await?;
    Ok(Json(TeamResponse { team, members }))
}

/// GET /api/team/analytics
pub async fn handle_team_analytics(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<TeamQuery>,
) -> Result<Json<TeamAnalytics>, AppError> {
    let own = own_team_id(&state, auth.id).await?;
    let team_id = resolve_team_id(auth, own, query.team_id)?;
    load_team(&state, team_id).await?;
    Ok(Json(team_analytics(&state.db, team_id).await?))
}

/// GET /api/team/members/:id/pitches
///
/// Leads see members of their own team only. Anyone else is reported as not
/// found so member ids on other teams cannot be probed.
pub async fn handle_member_pitches(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(member_id): Path<Uuid>,
    Query(page): Query<Page>,
) -> Result<Json<Vec<PitchSummaryRow>>, AppError> {
    let not_found = || AppError::NotFound(format!("Team member {member_id} not found"));

    let member_team: Option<Uuid> =
        sqlx::query_scalar::<_, Option<Uuid>>("SELECT team_id FROM users WHERE id = $1")
            .bind(member_id)
            .fetch_optional(&state.db)
            .await?
            .ok_or_else(not_found)?;

    if auth.role != Role::Admin {
        let own = own_team_id(&state, auth.id).await?;
        if own.is_none() || own != member_team {
            return Err(not_found());
        }
    }

    let pitches = sqlx::query_as::<_, PitchSummaryRow>(
        r#"
        SELECT id, title, training_session_id, audio_url, overall_score, created_at
        FROM pitches
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(member_id)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(&state.db)
    .await?;
    Ok(Json(pitches))
}
