//! Axum route handlers for the Pitch API.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use crate::analysis::AnalysisContext;
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::pitch::{PitchRow, PitchSummaryRow};
use crate::pagination::Page;
use crate::pitches::stats::{pitch_stats, PitchStats};
use crate::pitches::store::{default_title, save_pitch, NewPitch};
use crate::state::AppState;
use crate::storage::{audio_extension, MAX_AUDIO_BYTES};

pub const MAX_TRANSCRIPT_CHARS: usize = 50_000;

#[derive(Debug, Deserialize)]
pub struct CreatePitchRequest {
    pub transcript: String,
    pub title: Option<String>,
    pub industry_id: Option<Uuid>,
    pub training_session_id: Option<Uuid>,
}

pub fn validate_transcript(transcript: &str) -> Result<&str, AppError> {
    let transcript = transcript.trim();
    if transcript.is_empty() {
        return Err(AppError::Validation("transcript cannot be empty".to_string()));
    }
    if transcript.chars().count() > MAX_TRANSCRIPT_CHARS {
        return Err(AppError::Validation(format!(
            "transcript exceeds {MAX_TRANSCRIPT_CHARS} characters"
        )));
    }
    Ok(transcript)
}

fn resolve_title(title: Option<&str>, transcript: &str) -> String {
    match title.map(str::trim).filter(|t| !t.is_empty()) {
        Some(t) => t.to_string(),
        None => default_title(transcript),
    }
}

/// Gathers industry and scenario framing for the analyzer, checking that a
/// referenced training session belongs to the caller.
async fn load_context(
    state: &AppState,
    user_id: Uuid,
    industry_id: Option<Uuid>,
    training_session_id: Option<Uuid>,
) -> Result<AnalysisContext, AppError> {
    let mut context = AnalysisContext::default();

    if let Some(session_id) = training_session_id {
        let session: Option<(String, String)> = sqlx::query_as(
            "SELECT scenario, difficulty FROM training_sessions WHERE id = $1 AND user_id = $2",
        )
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(&state.db)
        .await?;
        let (scenario, difficulty) = session
            .ok_or_else(|| AppError::NotFound(format!("Training session {session_id} not found")))?;
        context.scenario = Some(scenario);
        context.difficulty = Some(difficulty);
    }

    if let Some(industry_id) = industry_id {
        let name: Option<String> = sqlx::query_scalar("SELECT name FROM industries WHERE id = $1")
            .bind(industry_id)
            .fetch_optional(&state.db)
            .await?;
        context.industry =
            Some(name.ok_or_else(|| AppError::NotFound(format!("Industry {industry_id} not found")))?);
    }

    Ok(context)
}

/// POST /api/pitches
///
/// Scores a typed or pre-transcribed pitch and stores it. A failed model call
/// still stores the pitch, with a zeroed analysis.
pub async fn handle_create_pitch(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreatePitchRequest>,
) -> Result<(StatusCode, Json<PitchRow>), AppError> {
    let transcript = validate_transcript(&req.transcript)?;
    let context = load_context(&state, auth.id, req.industry_id, req.training_session_id).await?;

    let analysis = state.analyzer.analyze_text(transcript, &context).await;

    let title = resolve_title(req.title.as_deref(), transcript);
    let pitch = save_pitch(
        &state.db,
        NewPitch {
            user_id: auth.id,
            training_session_id: req.training_session_id,
            industry_id: req.industry_id,
            title: &title,
            transcript,
            audio_url: None,
            analysis: &analysis,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(pitch)))
}

#[derive(Debug, Default)]
struct AudioUpload {
    audio: Option<(Bytes, String)>,
    title: Option<String>,
    industry_id: Option<Uuid>,
    training_session_id: Option<Uuid>,
}

fn parse_uuid_field(name: &str, value: &str) -> Result<Option<Uuid>, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    Uuid::parse_str(value)
        .map(Some)
        .map_err(|_| AppError::Validation(format!("{name} must be a UUID")))
}

async fn read_upload(mut multipart: Multipart) -> Result<AudioUpload, AppError> {
    let mut upload = AudioUpload::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "audio" => {
                let mime = field
                    .content_type()
                    .map(str::to_string)
                    .ok_or_else(|| AppError::Validation("audio part needs a content type".into()))?;
                if audio_extension(&mime).is_none() {
                    return Err(AppError::Validation(format!("Unsupported audio type '{mime}'")));
                }
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read audio: {e}")))?;
                if bytes.is_empty() {
                    return Err(AppError::Validation("audio file is empty".to_string()));
                }
                if bytes.len() > MAX_AUDIO_BYTES {
                    return Err(AppError::Validation(format!(
                        "audio exceeds {} MiB",
                        MAX_AUDIO_BYTES / (1024 * 1024)
                    )));
                }
                upload.audio = Some((bytes, mime));
            }
            "title" | "industry_id" | "training_session_id" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read {name}: {e}")))?;
                match name.as_str() {
                    "title" => upload.title = Some(text),
                    "industry_id" => upload.industry_id = parse_uuid_field(&name, &text)?,
                    _ => upload.training_session_id = parse_uuid_field(&name, &text)?,
                }
            }
            _ => {} // unknown parts are ignored
        }
    }
    Ok(upload)
}

/// POST /api/pitches/audio (multipart: `audio`, optional `title`,
/// `industry_id`, `training_session_id`)
///
/// Stores the recording, then scores it with the audio attached so delivery
/// (pace, hesitation) informs the score. The model's transcription becomes
/// the stored transcript. If the pitch cannot be saved the recording is
/// deleted again.
pub async fn handle_upload_audio_pitch(
    State(state): State<AppState>,
    auth: AuthUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<PitchRow>), AppError> {
    let upload = read_upload(multipart).await?;
    let (audio, mime) = upload
        .audio
        .ok_or_else(|| AppError::Validation("audio part is required".to_string()))?;

    let context =
        load_context(&state, auth.id, upload.industry_id, upload.training_session_id).await?;
    let audio_url = state
        .storage
        .upload_audio(auth.id, audio.clone(), &mime)
        .await?;

    let analysis = state.analyzer.analyze_audio(&audio, &mime, &context).await;
    let transcript = analysis.transcript.clone().unwrap_or_default();

    let title = resolve_title(upload.title.as_deref(), &transcript);
    let saved = save_pitch(
        &state.db,
        NewPitch {
            user_id: auth.id,
            training_session_id: upload.training_session_id,
            industry_id: upload.industry_id,
            title: &title,
            transcript: &transcript,
            audio_url: Some(&audio_url),
            analysis: &analysis,
        },
    )
    .await;

    match saved {
        Ok(pitch) => Ok((StatusCode::CREATED, Json(pitch))),
        Err(e) => {
            warn!("Discarding uploaded audio {audio_url}: pitch was not saved");
            state.storage.delete_audio(&audio_url).await;
            Err(e)
        }
    }
}

/// GET /api/pitches
pub async fn handle_list_pitches(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(page): Query<Page>,
) -> Result<Json<Vec<PitchSummaryRow>>, AppError> {
    let pitches = sqlx::query_as::<_, PitchSummaryRow>(
        r#"
        SELECT id, title, training_session_id, audio_url, overall_score, created_at
        FROM pitches
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
    Ok(Json(pitches))
}

/// GET /api/pitches/stats
pub async fn handle_pitch_stats(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<PitchStats>, AppError> {
    Ok(Json(pitch_stats(&state.db, auth.id).await?))
}

/// GET /api/pitches/:id
pub async fn handle_get_pitch(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(pitch_id): Path<Uuid>,
) -> Result<Json<PitchRow>, AppError> {
    let pitch = sqlx::query_as::<_, PitchRow>("SELECT * FROM pitches WHERE id = $1 AND user_id = $2")
        .bind(pitch_id)
        .bind(auth.id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Pitch {pitch_id} not found")))?;
    Ok(Json(pitch))
}

/// DELETE /api/pitches/:id
pub async fn handle_delete_pitch(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(pitch_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let deleted: Option<Option<String>> = sqlx::query_scalar(
        "DELETE FROM pitches WHERE id = $1 AND user_id = $2 RETURNING audio_url",
    )
    .bind(pitch_id)
    .bind(auth.id)
    .fetch_optional(&state.db)
    .await?;

    match deleted {
        None => Err(AppError::NotFound(format!("Pitch {pitch_id} not found"))),
        Some(audio_url) => {
            if let Some(url) = audio_url {
                state.storage.delete_audio(&url).await;
            }
            Ok(StatusCode::NO_CONTENT)
        }
    }
}
