//! Team-level aggregation over members' pitches, sessions and XP.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::analysis::MeddicDimension;
use crate::errors::AppError;
use crate::pitches::stats::MeddicAverages;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MemberSummaryRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub total_xp: i32,
    pub pitch_count: i64,
    pub average_score: f64,
    pub best_score: i32,
    pub sessions_completed: i64,
    pub last_pitch_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamAnalytics {
    pub team_id: Uuid,
    pub member_count: usize,
    pub total_pitches: i64,
    pub total_xp: i64,
    /// Mean over all of the team's pitches, not a mean of member means.
    pub average_score: f64,
    pub sessions_completed: i64,
    pub meddic: MeddicAverages,
    pub weakest_dimension: Option<MeddicDimension>,
    pub strongest_dimension: Option<MeddicDimension>,
    pub top_performer: Option<Uuid>,
    pub members: Vec<MemberSummaryRow>,
}

pub async fn member_summaries(
    pool: &PgPool,
    team_id: Uuid,
) -> Result<Vec<MemberSummaryRow>, AppError> {
    Ok(sqlx::query_as::<_, MemberSummaryRow>(
        r#"
        SELECT u.id, u.name, u.email, u.role, u.total_xp,
               COUNT(p.id)                               AS pitch_count,
               COALESCE(AVG(p.overall_score), 0)::float8 AS average_score,
               COALESCE(MAX(p.overall_score), 0)         AS best_score,
               MAX(p.created_at)                         AS last_pitch_at,
               (SELECT COUNT(*) FROM training_sessions s
                WHERE s.user_id = u.id AND s.completed)  AS sessions_completed
        FROM users u
        LEFT JOIN pitches p ON p.user_id = u.id
        WHERE u.team_id = $1
        GROUP BY u.id
        ORDER BY u.total_xp DESC, u.name
        "#,
    )
    .bind(team_id)
    .fetch_all(pool)
    .await?)
}

async fn team_meddic(pool: &PgPool, team_id: Uuid) -> Result<MeddicAverages, AppError> {
    Ok(sqlx::query_as::<_, MeddicAverages>(
        r#"
        SELECT COALESCE(AVG(p.metrics_score), 0)::float8           AS metrics,
               COALESCE(AVG(p.economic_buyer_score), 0)::float8    AS economic_buyer,
               COALESCE(AVG(p.decision_criteria_score), 0)::float8 AS decision_criteria,
               COALESCE(AVG(p.decision_process_score), 0)::float8  AS decision_process,
               COALESCE(AVG(p.identify_pain_score), 0)::float8     AS identify_pain,
               COALESCE(AVG(p.champion_score), 0)::float8          AS champion
        FROM pitches p
        JOIN users u ON u.id = p.user_id
        WHERE u.team_id = $1
        "#,
    )
    .bind(team_id)
    .fetch_one(pool)
    .await?)
}

pub async fn team_analytics(pool: &PgPool, team_id: Uuid) -> Result<TeamAnalytics, AppError> {
    let members = member_summaries(pool, team_id).await?;
    let meddic = team_meddic(pool, team_id).await?;
    Ok(summarize(team_id, members, meddic))
}

/// Folds member rows and the team's MEDDIC averages into one report.
pub fn summarize(
    team_id: Uuid,
    members: Vec<MemberSummaryRow>,
    meddic: MeddicAverages,
) -> TeamAnalytics {
    let total_pitches: i64 = members.iter().map(|m| m.pitch_count).sum();
    let weighted: f64 = members
        .iter()
        .map(|m| m.average_score * m.pitch_count as f64)
        .sum();
    let has_pitches = total_pitches > 0;

    TeamAnalytics {
        team_id,
        member_count: members.len(),
        total_pitches,
        total_xp: members.iter().map(|m| i64::from(m.total_xp)).sum(),
        average_score: if has_pitches {
            weighted / total_pitches as f64
        } else {
            0.0
        },
        sessions_completed: members.iter().map(|m| m.sessions_completed).sum(),
        weakest_dimension: has_pitches.then(|| weakest_dimension(&meddic)),
        strongest_dimension: has_pitches.then(|| strongest_dimension(&meddic)),
        top_performer: top_performer(&members),
        meddic,
        members,
    }
}

/// Lowest average; ties go to the earlier dimension in framework order.
pub fn weakest_dimension(meddic: &MeddicAverages) -> MeddicDimension {
    MeddicDimension::ALL
        .into_iter()
        .fold(MeddicDimension::Metrics, |best, d| {
            if meddic.get(d) < meddic.get(best) {
                d
            } else {
                best
            }
        })
}

pub fn strongest_dimension(meddic: &MeddicAverages) -> MeddicDimension {
    MeddicDimension::ALL
        .into_iter()
        .fold(MeddicDimension::Metrics, |best, d| {
            if meddic.get(d) > meddic.get(best) {
                d
            } else {
                best
            }
        })
}

/// Highest average score among members with at least one pitch.
pub fn top_performer(members: &[MemberSummaryRow]) -> Option<Uuid> {
    members
        .iter()
        .filter(|m| m.pitch_count > 0)
        .max_by(|a, b| a.average_score.total_cmp(&b.average_score))
        .map(|m| m.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(pitches: i64, average: f64, xp: i32) -> MemberSummaryRow {
        MemberSummaryRow {
            id: Uuid::new_v4(),
            name: "Rep".into(),
            email: "rep@example.com".into(),
            role: "user".into(),
            total_xp: xp,
            pitch_count: pitches,
            average_score: average,
            best_score: average as i32,
            sessions_completed: 1,
            last_pitch_at: None,
        }
    }

    fn averages() -> MeddicAverages {
        MeddicAverages {
            metrics: 70.0,
            economic_buyer: 35.0,
            decision_criteria: 60.0,
            decision_process: 35.0,
            identify_pain: 82.5,
            champion: 50.0,
        }
    }

    #[test]
    fn test_weakest_and_strongest() {
        let meddic = averages();
        assert_eq!(weakest_dimension(&meddic), MeddicDimension::EconomicBuyer);
        assert_eq!(strongest_dimension(&meddic), MeddicDimension::IdentifyPain);
    }

    #[test]
    fn test_summary_weights_average_by_pitch_count() {
        let members = vec![member(3, 80.0, 300), member(1, 40.0, 50), member(0, 0.0, 0)];
        let top = members[0].id;
        let report = summarize(Uuid::new_v4(), members, averages());
        assert_eq!(report.member_count, 3);
        assert_eq!(report.total_pitches, 4);
        assert_eq!(report.total_xp, 350);
        assert_eq!(report.average_score, 70.0);
        assert_eq!(report.sessions_completed, 3);
        assert_eq!(report.top_performer, Some(top));
        assert_eq!(report.weakest_dimension, Some(MeddicDimension::EconomicBuyer));
    }

    #[test]
    fn test_summary_without_pitches() {
        let report = summarize(Uuid::new_v4(), vec![member(0, 0.0, 10)], MeddicAverages::default());
        assert_eq!(report.average_score, 0.0);
        assert_eq!(report.weakest_dimension, None);
        assert_eq!(report.top_performer, None);
    }
}
