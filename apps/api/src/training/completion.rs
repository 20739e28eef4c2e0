//! Closing a training session: the completion flag, the scored pitch, skill
//! levels and XP all commit together or not at all.

use axum::body::Bytes;
use sqlx::PgPool;
use uuid::Uuid;

use crate::analysis::PitchAnalysis;
use crate::errors::AppError;
use crate::models::pitch::PitchRow;
use crate::models::training::TrainingSessionRow;
use crate::pitches::store::{insert_pitch, update_skill_levels, NewPitch};
use crate::training::handlers::CompleteSessionRequest;
use crate::training::xp::award_xp;

pub struct Completion {
    pub session: TrainingSessionRow,
    pub pitch: PitchRow,
    pub total_xp: i32,
}

/// An empty body means "score the conversation". Anything else must be a
/// valid request object.
pub fn parse_completion_body(body: &Bytes) -> Result<CompleteSessionRequest, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(CompleteSessionRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::Validation(format!("Invalid request body: {e}")))
}

/// Marks the session completed and records its outcome. The guarded UPDATE
/// only matches an open session, so a repeated or concurrent call gets 409
/// and awards nothing.
pub async fn finish_session(
    pool: &PgPool,
    user_id: Uuid,
    session_id: Uuid,
    xp: i32,
    transcript: &str,
    analysis: &PitchAnalysis,
) -> Result<Completion, AppError> {
    let mut tx = pool.begin().await?;

    let session = sqlx::query_as::<_, TrainingSessionRow>(
        r#"
        UPDATE training_sessions
        SET completed = true, xp_earned = $3, completed_at = now()
        WHERE id = $1 AND user_id = $2 AND completed = false
        RETURNING *
        "#,
    )
    .bind(session_id)
    .bind(user_id)
    .bind(xp)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::Conflict("Training session is already completed".to_string()))?;

    let title = format!("Training: {}", session.scenario);
    let pitch = insert_pitch(
        &mut *tx,
        NewPitch {
            user_id,
            training_session_id: Some(session_id),
            industry_id: session.industry_id,
            title: &title,
            transcript,
            audio_url: None,
            analysis,
        },
    )
    .await?;
    update_skill_levels(&mut *tx, user_id, analysis).await?;
    let total_xp = award_xp(&mut *tx, user_id, xp).await?;

    tx.commit().await?;
    Ok(Completion {
        session,
        pitch,
        total_xp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::MeddicDimension;

    #[test]
    fn test_empty_body_scores_the_conversation() {
        for raw in ["", "  \n"] {
            let req = parse_completion_body(&Bytes::from(raw)).unwrap();
            assert!(req.transcript.is_none());
        }
        let req = parse_completion_body(&Bytes::from(r#"{"transcript": "Closing pitch"}"#)).unwrap();
        assert_eq!(req.transcript.as_deref(), Some("Closing pitch"));
        assert!(parse_completion_body(&Bytes::from("{}")).unwrap().transcript.is_none());
    }

    #[test]
    fn test_malformed_body_is_rejected() {
        for raw in [r#"{"transcript": "#, r#"{"transcript": 5}"#, "not json", "true"] {
            let err = parse_completion_body(&Bytes::from(raw)).unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "{raw}");
        }
    }

    async fn seed_session(pool: &PgPool) -> (Uuid, Uuid) {
        let user_id: Uuid = sqlx::query_scalar(
            "INSERT INTO users (email, password_hash, name) VALUES ($1, 'x', 'Rep') RETURNING id",
        )
        .bind(format!("rep-{}@acme.io", Uuid::new_v4()))
        .fetch_one(pool)
        .await
        .unwrap();
        let session_id: Uuid = sqlx::query_scalar(
            "INSERT INTO training_sessions (user_id, scenario, difficulty) VALUES ($1, 'Cold call', 'intermediate') RETURNING id",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await
        .unwrap();
        (user_id, session_id)
    }

    fn scored() -> PitchAnalysis {
        let mut analysis = PitchAnalysis {
            overall_score: 70,
            ..PitchAnalysis::default()
        };
        for dimension in MeddicDimension::ALL {
            analysis.meddic.get_mut(dimension).score = 60;
        }
        analysis
    }

    #[tokio::test]
    async fn test_second_completion_conflicts_without_xp() {
        let Some(pool) = crate::db::test_pool().await else {
            return;
        };
        let (user_id, session_id) = seed_session(&pool).await;
        let analysis = scored();

        let first = finish_session(&pool, user_id, session_id, 100, "Hi, Sam here", &analysis)
            .await
            .unwrap();
        assert!(first.session.completed);
        assert_eq!(first.session.xp_earned, 100);
        assert_eq!(first.total_xp, 100);
        assert_eq!(first.pitch.training_session_id, Some(session_id));

        let second = finish_session(&pool, user_id, session_id, 100, "Hi again", &analysis).await;
        assert!(matches!(second, Err(AppError::Conflict(_))));

        let total_xp: i32 = sqlx::query_scalar("SELECT total_xp FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(total_xp, 100);

        let pitches: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM pitches WHERE training_session_id = $1")
                .bind(session_id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(pitches, 1);

        let skills: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_skills WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(skills, MeddicDimension::ALL.len() as i64);
    }

    #[tokio::test]
    async fn test_completion_for_another_user_conflicts() {
        let Some(pool) = crate::db::test_pool().await else {
            return;
        };
        let (_, session_id) = seed_session(&pool).await;
        let (intruder, _) = seed_session(&pool).await;

        let result = finish_session(&pool, intruder, session_id, 50, "Hi", &scored()).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }
}
