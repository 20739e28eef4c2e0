//! Axum route handlers for industries and their role-play scenarios.
//!
//! Reads are open to every authenticated user; writes are mounted under
//! `/api/admin/industries`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use sqlx::types::Json as SqlJson;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::industry::{IndustryRow, Scenario};
use crate::state::AppState;
use crate::training::xp::Difficulty;

#[derive(Debug, Deserialize)]
pub struct IndustryRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub scenarios: Vec<Scenario>,
}

/// Trims names, rejects blank titles and unknown difficulties, and rejects
/// two scenarios sharing a title (titles are how sessions pick a template).
pub fn validate_industry(req: IndustryRequest) -> Result<IndustryRequest, AppError> {
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::Validation("industry name cannot be empty".to_string()));
    }

    let mut scenarios = Vec::with_capacity(req.scenarios.len());
    for mut scenario in req.scenarios {
        scenario.title = scenario.title.trim().to_string();
        if scenario.title.is_empty() {
            return Err(AppError::Validation("scenario title cannot be empty".to_string()));
        }
        scenario.difficulty.parse::<Difficulty>()?;
        if scenarios
            .iter()
            .any(|s: &Scenario| s.title.eq_ignore_ascii_case(&scenario.title))
        {
            return Err(AppError::Validation(format!(
                "duplicate scenario title '{}'",
                scenario.title
            )));
        }
        scenario.objections.retain(|o| !o.trim().is_empty());
        scenarios.push(scenario);
    }

    Ok(IndustryRequest {
        name,
        description: req
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty()),
        scenarios,
    })
}

fn map_unique(e: sqlx::Error, name: &str) -> AppError {
    match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict(format!("Industry '{name}' already exists"))
        }
        other => AppError::Database(other),
    }
}

/// GET /api/industries
pub async fn handle_list_industries(
    State(state): State<AppState>,
) -> Result<Json<Vec<IndustryRow>>, AppError> {
    let industries = sqlx::query_as::<_, IndustryRow>("SELECT * FROM industries ORDER BY name")
        .fetch_all(&state.db)
        .await?;
    Ok(Json(industries))
}

/// GET /api/industries/:id
pub async fn handle_get_industry(
    State(state): State<AppState>,
    Path(industry_id): Path<Uuid>,
) -> Result<Json<IndustryRow>, AppError> {
    let industry = sqlx::query_as::<_, IndustryRow>("SELECT * FROM industries WHERE id = $1")
        .bind(industry_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Industry {industry_id} not found")))?;
    Ok(Json(industry))
}

/// POST /api/admin/industries
pub async fn handle_create_industry(
    State(state): State<AppState>,
    Json(req): Json<IndustryRequest>,
) -> Result<(StatusCode, Json<IndustryRow>), AppError> {
    let req = validate_industry(req)?;
    let industry = sqlx::query_as::<_, IndustryRow>(
        r#"
        INSERT INTO industries (name, description, scenarios)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(&req.name)
    .bind(&req.description)
    .bind(SqlJson(&req.scenarios))
    .fetch_one(&state.db)
    .await
    .map_err(|e| map_unique(e, &req.name))?;

    info!(
        "Created industry {} with {} scenarios",
        industry.id,
        req.scenarios.len()
    );
    Ok((StatusCode::CREATED, Json(industry)))
}

/// PUT /api/admin/industries/:id
///
/// Full replacement: the scenario list in the body replaces the stored one.
pub async fn handle_update_industry(
    State(state): State<AppState>,
    Path(industry_id): Path<Uuid>,
    Json(req): Json<IndustryRequest>,
) -> Result<Json<IndustryRow>, AppError> {
    let req = validate_industry(req)?;
    let industry = sqlx::query_as::<_, IndustryRow>(
        r#"
        UPDATE industries SET name = $2, description = $3, scenarios = $4
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(industry_id)
    .bind(&req.name)
    .bind(&req.description)
    .bind(SqlJson(&req.scenarios))
    .fetch_optional(&state.db)
    .await
    .map_err(|e| map_unique(e, &req.name))?
    .ok_or_else(|| AppError::NotFound(format!("Industry {industry_id} not found")))?;
    Ok(Json(industry))
}

/// DELETE /api/admin/industries/:id
pub async fn handle_delete_industry(
    State(state): State<AppState>,
    Path(industry_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let result = sqlx::query("DELETE FROM industries WHERE id = $1")
        .bind(industry_id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Industry {industry_id} not found")));
    }
    info!("Deleted industry {industry_id}");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: &str) -> IndustryRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_validate_trims_and_defaults() {
        let req = validate_industry(request(
            r#"{"name": "  SaaS ", "description": "  ",
                "scenarios": [{"title": " Renewal ", "objections": ["price", "  "]}]}"#,
        ))
        .unwrap();
        assert_eq!(req.name, "SaaS");
        assert_eq!(req.description, None);
        assert_eq!(req.scenarios[0].title, "Renewal");
        assert_eq!(req.scenarios[0].difficulty, "beginner");
        assert_eq!(req.scenarios[0].objections, vec!["price"]);
    }

    #[test]
    fn test_validate_rejects_bad_scenarios() {
        for body in [
            r#"{"name": ""}"#,
            r#"{"name": "SaaS", "scenarios": [{"title": "  "}]}"#,
            r#"{"name": "SaaS", "scenarios": [{"title": "A", "difficulty": "expert"}]}"#,
            r#"{"name": "SaaS", "scenarios": [{"title": "Cold call"}, {"title": "cold CALL"}]}"#,
        ] {
            assert!(
                matches!(validate_industry(request(body)), Err(AppError::Validation(_))),
                "{body} should be rejected"
            );
        }
    }
}
