use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::analysis::MeddicDimension;
use crate::errors::AppError;

/// Number of most recent pitches compared against the ones before them.
const TREND_WINDOW: usize = 5;

#[derive(Debug, Clone, Default, Serialize, FromRow)]
pub struct MeddicAverages {
    pub metrics: f64,
    pub economic_buyer: f64,
    pub decision_criteria: f64,
    pub decision_process: f64,
    pub identify_pain: f64,
    pub champion: f64,
}

impl MeddicAverages {
    pub fn get(&self, dimension: MeddicDimension) -> f64 {
        match dimension {
            MeddicDimension::Metrics => self.metrics,
            MeddicDimension::EconomicBuyer => self.economic_buyer,
            MeddicDimension::DecisionCriteria => self.decision_criteria,
            MeddicDimension::DecisionProcess => self.decision_process,
            MeddicDimension::IdentifyPain => self.identify_pain,
            MeddicDimension::Champion => self.champion,
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PitchAggregate {
    pub total_pitches: i64,
    pub average_score: f64,
    pub best_score: i32,
    pub average_filler_words: f64,
    pub average_questions: f64,
    #[sqlx(flatten)]
    pub meddic: MeddicAverages,
}

#[derive(Debug, Clone, Serialize)]
pub struct PitchStats {
    #[serde(flatten)]
    pub aggregate: PitchAggregate,
    /// Newest first.
    pub recent_scores: Vec<i32>,
    /// Mean of the latest window minus mean of the window before it.
    pub trend: Option<f64>,
}

pub async fn pitch_stats(pool: &PgPool, user_id: Uuid) -> Result<PitchStats, AppError> {
    let aggregate = sqlx::query_as::<_, PitchAggregate>(
        r#"
        SELECT COUNT(*)                                        AS total_pitches,
               COALESCE(AVG(overall_score), 0)::float8         AS average_score,
               COALESCE(MAX(overall_score), 0)                 AS best_score,
               COALESCE(AVG(filler_word_count), 0)::float8     AS average_filler_words,
               COALESCE(AVG(question_count), 0)::float8        AS average_questions,
               COALESCE(AVG(metrics_score), 0)::float8           AS metrics,
               COALESCE(AVG(economic_buyer_score), 0)::float8    AS economic_buyer,
               COALESCE(AVG(decision_criteria_score), 0)::float8 AS decision_criteria,
               COALESCE(AVG(decision_process_score), 0)::float8  AS decision_process,
               COALESCE(AVG(identify_pain_score), 0)::float8     AS identify_pain,
               COALESCE(AVG(champion_score), 0)::float8          AS champion
        FROM pitches
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    let recent_scores: Vec<i32> = sqlx::query_scalar(
        "SELECT overall_score FROM pitches WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
    )
    .bind(user_id)
    .bind((TREND_WINDOW * 2) as i64)
    .fetch_all(pool)
    .await?;

    Ok(PitchStats {
        aggregate,
        trend: score_trend(&recent_scores),
        recent_scores,
    })
}

/// Compares the newest `TREND_WINDOW` scores with the window before them.
/// Needs at least one score on each side.
pub fn score_trend(newest_first: &[i32]) -> Option<f64> {
    if newest_first.len() <= 1 {
        return None;
    }
    let split = TREND_WINDOW.min(newest_first.len() / 2).max(1);
    let (recent, previous) = newest_first.split_at(split);
    let previous = &previous[..previous.len().min(TREND_WINDOW)];
    Some(mean(recent) - mean(previous))
}

fn mean(values: &[i32]) -> f64 {
    values.iter().map(|v| f64::from(*v)).sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trend_needs_two_scores() {
        assert_eq!(score_trend(&[]), None);
        assert_eq!(score_trend(&[80]), None);
    }

    #[test]
    fn test_trend_two_scores() {
        assert_eq!(score_trend(&[80, 60]), Some(20.0));
    }

    #[test]
    fn test_trend_full_windows() {
        // recent mean 70, previous mean 50
        let scores = [70, 70, 70, 70, 70, 50, 50, 50, 50, 50];
        assert_eq!(score_trend(&scores), Some(20.0));
    }

    #[test]
    fn test_trend_uneven_history_declining() {
        // 7 scores: split at 3 → recent [40,40,40], previous [60,60,60,60]
        let scores = [40, 40, 40, 60, 60, 60, 60];
        assert_eq!(score_trend(&scores), Some(-20.0));
    }
}
