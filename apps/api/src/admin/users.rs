use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::{AuthUser, Role};
use crate::errors::AppError;
use crate::models::user::UserRow;
use crate::pagination::Page;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct UserFilter {
    pub role: Option<String>,
    pub team_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTeamRequest {
    /// `null` removes the user from their team.
    pub team_id: Option<Uuid>,
}

/// Admins may not change their own role or delete themselves, so the last
/// admin cannot lock everyone out.
pub fn ensure_not_self(auth: AuthUser, target: Uuid, action: &str) -> Result<(), AppError> {
    if auth.id == target {
        return Err(AppError::Validation(format!("You cannot {action} your own account")));
    }
    Ok(())
}

/// GET /api/admin/users?role=&team_id=&limit=&offset=
pub async fn handle_list_users(
    State(state): State<AppState>,
    Query(filter): Query<UserFilter>,
    Query(page): Query<Page>,
) -> Result<Json<Vec<UserRow>>, AppError> {
    let role = filter
        .role
        .as_deref()
        .map(|r| r.parse::<Role>())
        .transpose()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let users = sqlx::query_as::<_, UserRow>(
        r#"
        SELECT * FROM users
        WHERE ($1::text IS NULL OR role = $1)
          AND ($2::uuid IS NULL OR team_id = $2)
        ORDER BY created_at DESC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(role.map(Role::as_str))
    .bind(filter.team_id)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(&state.db)
    .await?;
    Ok(Json(users))
}

/// PUT /api/admin/users/:id/role
///
/// Takes effect on the user's next login, when a token with the new role is
/// issued.
pub async fn handle_update_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateRoleRequest>,
) -> Result<Json<UserRow>, AppError> {
    ensure_not_self(auth, user_id, "change the role of")?;
    let user = sqlx::query_as::<_, UserRow>(
        "UPDATE users SET role = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(user_id)
    .bind(req.role.as_str())
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))?;

    info!("Admin {} set role of {user_id} to {}", auth.id, req.role);
    Ok(Json(user))
}

/// PUT /api/admin/users/:id/team
pub async fn handle_update_team(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateTeamRequest>,
) -> Result<Json<UserRow>, AppError> {
    if let Some(team_id) = req.team_id {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM teams WHERE id = $1)")
            .bind(team_id)
            .fetch_one(&state.db)
            .await?;
        if !exists {
            return Err(AppError::NotFound(format!("Team {team_id} not found")));
        }
    }

    let user = sqlx::query_as::<_, UserRow>(
        "UPDATE users SET team_id = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(user_id)
    .bind(req.team_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))?;
    Ok(Json(user))
}

/// DELETE /api/admin/users/:id
///
/// Pitches, sessions and progress go with the user (ON DELETE CASCADE).
/// Stored recordings are removed on a best-effort basis.
pub async fn handle_delete_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    ensure_not_self(auth, user_id, "delete")?;

    let mut tx = state.db.begin().await?;
    let audio_urls: Vec<String> = sqlx::query_scalar(
        "SELECT audio_url FROM pitches WHERE user_id = $1 AND audio_url IS NOT NULL",
    )
    .bind(user_id)
    .fetch_all(&mut *tx)
    .await?;
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("User {user_id} not found")));
    }
    tx.commit().await?;

    for url in &audio_urls {
        state.storage.delete_audio(url).await;
    }
    info!(
        "Admin {} deleted user {user_id} ({} recordings)",
        auth.id,
        audio_urls.len()
    );
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_not_self() {
        let admin = AuthUser {
            id: Uuid::new_v4(),
            role: Role::Admin,
        };
        assert!(matches!(
            ensure_not_self(admin, admin.id, "delete"),
            Err(AppError::Validation(_))
        ));
        assert!(ensure_not_self(admin, Uuid::new_v4(), "delete").is_ok());
    }

    #[test]
    fn test_role_request_rejects_unknown_roles() {
        assert!(serde_json::from_str::<UpdateRoleRequest>(r#"{"role": "team_lead"}"#).is_ok());
        assert!(serde_json::from_str::<UpdateRoleRequest>(r#"{"role": "owner"}"#).is_err());
    }

    #[test]
    fn test_team_request_accepts_null() {
        let req: UpdateTeamRequest = serde_json::from_str(r#"{"team_id": null}"#).unwrap();
        assert_eq!(req.team_id, None);
    }
}
