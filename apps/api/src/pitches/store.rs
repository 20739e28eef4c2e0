use sqlx::{PgExecutor, PgPool};
use tracing::debug;
use uuid::Uuid;

use crate::analysis::{MeddicDimension, PitchAnalysis};
use crate::errors::AppError;
use crate::models::pitch::PitchRow;

const TITLE_WORDS: usize = 8;

/// Parameters for persisting one scored pitch.
pub struct NewPitch<'a> {
    pub user_id: Uuid,
    pub training_session_id: Option<Uuid>,
    pub industry_id: Option<Uuid>,
    pub title: &'a str,
    pub transcript: &'a str,
    pub audio_url: Option<&'a str>,
    pub analysis: &'a PitchAnalysis,
}

/// Title derived from the opening words of the transcript.
pub fn default_title(transcript: &str) -> String {
    let words: Vec<&str> = transcript.split_whitespace().collect();
    match words.len() {
        0 => "Untitled pitch".to_string(),
        n if n <= TITLE_WORDS => words.join(" "),
        _ => format!("{}…", words[..TITLE_WORDS].join(" ")),
    }
}

/// Stores the full analysis blob alongside one column per sub-score so that
/// aggregates can run in SQL.
pub async fn insert_pitch<'e>(
    executor: impl PgExecutor<'e>,
    pitch: NewPitch<'_>,
) -> Result<PitchRow, AppError> {
    let NewPitch {
        user_id,
        training_session_id,
        industry_id,
        title,
        transcript,
        audio_url,
        analysis,
    } = pitch;
    let blob = serde_json::to_value(analysis)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize analysis: {e}")))?;
    let m = &analysis.meddic;

    let row = sqlx::query_as::<_, PitchRow>(
        r#"
        INSERT INTO pitches
            (user_id, training_session_id, industry_id, title, transcript, audio_url, analysis,
             overall_score, metrics_score, economic_buyer_score, decision_criteria_score,
             decision_process_score, identify_pain_score, champion_score,
             sentiment_score, confidence_score, pace_score, clarity_score,
             filler_word_count, question_count)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(training_session_id)
    .bind(industry_id)
    .bind(title)
    .bind(transcript)
    .bind(audio_url)
    .bind(blob)
    .bind(as_i32(analysis.overall_score))
    .bind(as_i32(m.metrics.score))
    .bind(as_i32(m.economic_buyer.score))
    .bind(as_i32(m.decision_criteria.score))
    .bind(as_i32(m.decision_process.score))
    .bind(as_i32(m.identify_pain.score))
    .bind(as_i32(m.champion.score))
    .bind(as_i32(analysis.sentiment_score))
    .bind(as_i32(analysis.confidence_score))
    .bind(as_i32(analysis.pace_score))
    .bind(as_i32(analysis.clarity_score))
    .bind(as_i32(analysis.filler_word_count))
    .bind(as_i32(analysis.question_count))
    .fetch_one(executor)
    .await?;

    debug!("Stored pitch {} for user {user_id}", row.id);
    Ok(row)
}

/// Folds a new analysis into the user's MEDDIC skill levels as an
/// exponential moving average (30% weight on the new score). Zeroed
/// fallback analyses are skipped so a failed model call cannot erase
/// progress.
pub async fn update_skill_levels<'e>(
    executor: impl PgExecutor<'e>,
    user_id: Uuid,
    analysis: &PitchAnalysis,
) -> Result<(), AppError> {
    if analysis.is_fallback() {
        return Ok(());
    }
    let (names, scores): (Vec<&str>, Vec<i32>) = MeddicDimension::ALL
        .iter()
        .map(|d| (d.label(), as_i32(analysis.meddic.get(*d).score)))
        .unzip();

    sqlx::query(
        r#"
        INSERT INTO user_skills (user_id, skill_id, level)
        SELECT $1, s.id, v.score
        FROM skills s
        JOIN UNNEST($2::text[], $3::int[]) AS v(name, score) ON v.name = s.name
        ON CONFLICT (user_id, skill_id) DO UPDATE
        SET level = ROUND(user_skills.level * 0.7 + EXCLUDED.level * 0.3)::int,
            updated_at = now()
        "#,
    )
    .bind(user_id)
    .bind(&names)
    .bind(&scores)
    .execute(executor)
    .await?;
    Ok(())
}

/// Stores a pitch and folds it into the user's skill levels in one
/// transaction, so a failed skill update leaves no pitch behind.
pub async fn save_pitch(pool: &PgPool, pitch: NewPitch<'_>) -> Result<PitchRow, AppError> {
    let user_id = pitch.user_id;
    let analysis = pitch.analysis;
    let mut tx = pool.begin().await?;
    let row = insert_pitch(&mut *tx, pitch).await?;
    update_skill_levels(&mut *tx, user_id, analysis).await?;
    tx.commit().await?;
    Ok(row)
}

fn as_i32(n: u32) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_title() {
        assert_eq!(default_title("   "), "Untitled pitch");
        assert_eq!(default_title("Hi there, I'm Sam"), "Hi there, I'm Sam");
        assert_eq!(
            default_title("one two three four five six seven eight nine ten"),
            "one two three four five six seven eight…"
        );
    }

    #[tokio::test]
    async fn test_save_pitch_updates_skills_with_the_pitch() {
        let Some(pool) = crate::db::test_pool().await else {
            return;
        };
        let user_id: Uuid = sqlx::query_scalar(
            "INSERT INTO users (email, password_hash, name) VALUES ($1, 'x', 'Rep') RETURNING id",
        )
        .bind(format!("rep-{}@acme.io", Uuid::new_v4()))
        .fetch_one(&pool)
        .await
        .unwrap();
        let mut analysis = PitchAnalysis {
            overall_score: 80,
            ..PitchAnalysis::default()
        };
        analysis.meddic.champion.score = 90;

        let row = save_pitch(
            &pool,
            NewPitch {
                user_id,
                training_session_id: None,
                industry_id: None,
                title: "Discovery",
                transcript: "Hi, this is Sam",
                audio_url: None,
                analysis: &analysis,
            },
        )
        .await
        .unwrap();
        assert_eq!(row.overall_score, 80);

        let champion: i32 = sqlx::query_scalar(
            "SELECT us.level FROM user_skills us JOIN skills s ON s.id = us.skill_id WHERE us.user_id = $1 AND s.name = 'Champion'",
        )
        .bind(user_id)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(champion, 90);
    }

    #[tokio::test]
    async fn test_save_pitch_for_unknown_user_keeps_nothing() {
        let Some(pool) = crate::db::test_pool().await else {
            return;
        };
        // No such user: the foreign key fails and nothing is kept.
        let ghost = Uuid::new_v4();
        let analysis = PitchAnalysis {
            overall_score: 50,
            ..PitchAnalysis::default()
        };
        let result = save_pitch(
            &pool,
            NewPitch {
                user_id: ghost,
                training_session_id: None,
                industry_id: None,
                title: "Ghost",
                transcript: "Hello",
                audio_url: None,
                analysis: &analysis,
            },
        )
        .await;
        assert!(result.is_err());

        let skills: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_skills WHERE user_id = $1")
            .bind(ghost)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(skills, 0);
    }

    #[test]
    fn test_as_i32_saturates() {
        assert_eq!(as_i32(42), 42);
        assert_eq!(as_i32(u32::MAX), i32::MAX);
    }
}
