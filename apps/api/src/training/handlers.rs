//! Axum route handlers for the Training API.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::types::Json as SqlJson;
use tracing::info;
use uuid::Uuid;

use crate::analysis::AnalysisContext;
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::llm_client::ChatRole;
use crate::models::industry::{IndustryRow, Scenario};
use crate::models::pitch::PitchRow;
use crate::models::training::{render_conversation, ConversationTurn, Speaker, TrainingSessionRow};
use crate::pagination::Page;
use crate::pitches::handlers::validate_transcript;
use crate::state::AppState;
use crate::training::prompts::build_prospect_system;
use crate::training::completion::{finish_session, parse_completion_body, Completion};
use crate::training::xp::Difficulty;

/// Rep + prospect turns stored per session.
const MAX_TURNS: usize = 40;
const MAX_MESSAGE_CHARS: usize = 2_000;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub scenario: String,
    pub difficulty: Option<Difficulty>,
    pub industry_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub reply: String,
    pub session: TrainingSessionRow,
}

#[derive(Debug, Default, Deserialize)]
pub struct CompleteSessionRequest {
    /// A closing pitch to score. When absent the conversation itself is scored.
    pub transcript: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CompleteSessionResponse {
    pub session: TrainingSessionRow,
    pub pitch: PitchRow,
    pub xp_awarded: i32,
    pub total_xp: i32,
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

async fn load_own_session(
    state: &AppState,
    user_id: Uuid,
    session_id: Uuid,
) -> Result<TrainingSessionRow, AppError> {
    sqlx::query_as::<_, TrainingSessionRow>(
        "SELECT * FROM training_sessions WHERE id = $1 AND user_id = $2",
    )
    .bind(session_id)
    .bind(user_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Training session {session_id} not found")))
}

async fn load_industry(
    state: &AppState,
    industry_id: Option<Uuid>,
) -> Result<Option<IndustryRow>, AppError> {
    let Some(id) = industry_id else {
        return Ok(None);
    };
    Ok(
        sqlx::query_as::<_, IndustryRow>("SELECT * FROM industries WHERE id = $1")
            .bind(id)
            .fetch_optional(&state.db)
            .await?,
    )
}

/// The industry's scenario template whose title matches the session's scenario.
fn find_template<'a>(industry: Option<&'a IndustryRow>, scenario: &str) -> Option<&'a Scenario> {
    industry?
        .scenarios
        .iter()
        .find(|s| s.title.eq_ignore_ascii_case(scenario.trim()))
}

fn chat_turns(history: &[ConversationTurn], message: &str) -> Vec<(ChatRole, String)> {
    history
        .iter()
        .map(|t| {
            let role = match t.speaker {
                Speaker::Rep => ChatRole::User,
                Speaker::Prospect => ChatRole::Model,
            };
            (role, t.text.clone())
        })
        .chain(std::iter::once((ChatRole::User, message.to_string())))
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/training/sessions
///
/// When the scenario names one of the industry's templates and no difficulty
/// is given, the template's difficulty is used.
pub async fn handle_create_session(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<TrainingSessionRow>), AppError> {
    let scenario = req.scenario.trim();
    if scenario.is_empty() {
        return Err(AppError::Validation("scenario cannot be empty".to_string()));
    }

    let industry = load_industry(&state, req.industry_id).await?;
    if req.industry_id.is_some() && industry.is_none() {
        return Err(AppError::NotFound("Industry not found".to_string()));
    }

    let difficulty = match req.difficulty {
        Some(d) => d,
        None => match find_template(industry.as_ref(), scenario) {
            Some(template) => template.difficulty.parse()?,
            None => Difficulty::Beginner,
        },
    };

    let session = sqlx::query_as::<_, TrainingSessionRow>(
        r#"
        INSERT INTO training_sessions (user_id, industry_id, scenario, difficulty)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(auth.id)
    .bind(req.industry_id)
    .bind(scenario)
    .bind(difficulty.as_str())
    .fetch_one(&state.db)
    .await?;

    info!("User {} started training session {}", auth.id, session.id);
    Ok((StatusCode::CREATED, Json(session)))
}

/// GET /api/training/sessions
pub async fn handle_list_sessions(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(page): Query<Page>,
) -> Result<Json<Vec<TrainingSessionRow>>, AppError> {
    let sessions = sqlx::query_as::<_, TrainingSessionRow>(
        r#"
        SELECT * FROM training_sessions
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(auth.id)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(&state.db)
    .await?;
    Ok(Json(sessions))
}

/// GET /api/training/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(session_id): Path<Uuid>,
) -> Result<Json<TrainingSessionRow>, AppError> {
    Ok(Json(load_own_session(&state, auth.id, session_id).await?))
}

/// POST /api/training/sessions/:id/messages
///
/// Sends the rep's line to the model-played prospect and appends both turns.
/// Unlike scoring, a failed model call is an error: there is no sensible
/// default reply.
pub async fn handle_send_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(session_id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, AppError> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err(AppError::Validation("message cannot be empty".to_string()));
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(AppError::Validation(format!(
            "message exceeds {MAX_MESSAGE_CHARS} characters"
        )));
    }

    let session = load_own_session(&state, auth.id, session_id).await?;
    if session.completed {
        return Err(AppError::Conflict("Training session is already completed".to_string()));
    }
    if session.conversation.len() + 2 > MAX_TURNS {
        return Err(AppError::Validation(
            "Conversation limit reached; complete the session to get feedback".to_string(),
        ));
    }

    let difficulty: Difficulty = session.difficulty.parse()?;
    let industry = load_industry(&state, session.industry_id).await?;
    let system = build_prospect_system(
        &session.scenario,
        difficulty,
        industry.as_ref().map(|i| i.name.as_str()),
        find_template(industry.as_ref(), &session.scenario),
    );

    let reply = state
        .llm
        .chat(&system, &chat_turns(&session.conversation, message))
        .await
        .map_err(|e| AppError::Llm(format!("Prospect reply failed: {e}")))?;
    let reply = reply.trim().to_string();

    let now = Utc::now();
    let new_turns = vec![
        ConversationTurn {
            speaker: Speaker::Rep,
            text: message.to_string(),
            at: now,
        },
        ConversationTurn {
            speaker: Speaker::Prospect,
            text: reply.clone(),
            at: Utc::now(),
        },
    ];

    let session = sqlx::query_as::<_, TrainingSessionRow>(
        r#"
        UPDATE training_sessions
        SET conversation = conversation || $3
        WHERE id = $1 AND user_id = $2 AND completed = false
        RETURNING *
        "#,
    )
    .bind(session_id)
    .bind(auth.id)
    .bind(SqlJson(new_turns))
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::Conflict("Training session is already completed".to_string()))?;

    Ok(Json(SendMessageResponse { reply, session }))
}

/// POST /api/training/sessions/:id/complete
///
/// Scores the session, stores the result as a pitch linked to it, and awards
/// the difficulty's XP exactly once. An empty body scores the conversation;
/// a malformed one is rejected before anything is loaded.
pub async fn handle_complete_session(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(session_id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<CompleteSessionResponse>, AppError> {
    let req = parse_completion_body(&body)?;
    let session = load_own_session(&state, auth.id, session_id).await?;
    if session.completed {
        return Err(AppError::Conflict("Training session is already completed".to_string()));
    }

    let difficulty: Difficulty = session.difficulty.parse()?;
    let industry = load_industry(&state, session.industry_id).await?;
    let mut context = AnalysisContext {
        industry: industry.map(|i| i.name),
        scenario: Some(session.scenario.clone()),
        difficulty: Some(difficulty.to_string()),
        conversation: Vec::new(),
    };

    let transcript = match req.transcript.as_deref() {
        Some(text) => {
            context.conversation = session.conversation.0.clone();
            validate_transcript(text)?.to_string()
        }
        None if !session.conversation.is_empty() => render_conversation(&session.conversation),
        None => {
            return Err(AppError::Validation(
                "Nothing to score: send messages or provide a transcript".to_string(),
            ))
        }
    };

    let analysis = state.analyzer.analyze_text(&transcript, &context).await;
    let xp = difficulty.session_xp();

    let Completion {
        session,
        pitch,
        total_xp,
    } = finish_session(&state.db, auth.id, session_id, xp, &transcript, &analysis).await?;

    info!(
        "User {} completed session {} (+{} XP, total {})",
        auth.id, session_id, xp, total_xp
    );

    Ok(Json(CompleteSessionResponse {
        session,
        pitch,
        xp_awarded: xp,
        total_xp,
    }))
}
