//! XP accounting.
//!
//! XP only ever moves through [`award_xp`], an atomic in-database increment.
//! Handlers never read a total, add to it and write it back.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::errors::AppError;

/// XP needed per level.
pub const XP_PER_LEVEL: i32 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }

    /// XP for completing a training session at this difficulty.
    pub fn session_xp(self) -> i32 {
        match self {
            Difficulty::Beginner => 50,
            Difficulty::Intermediate => 100,
            Difficulty::Advanced => 200,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "beginner" => Ok(Difficulty::Beginner),
            "intermediate" => Ok(Difficulty::Intermediate),
            "advanced" => Ok(Difficulty::Advanced),
            other => Err(AppError::Validation(format!(
                "difficulty must be one of beginner, intermediate, advanced (got '{other}')"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelInfo {
    pub level: i32,
    pub xp_into_level: i32,
    pub xp_to_next_level: i32,
}

pub fn level_for_xp(total_xp: i32) -> LevelInfo {
    let xp = total_xp.max(0);
    let into = xp % XP_PER_LEVEL;
    LevelInfo {
        level: xp / XP_PER_LEVEL + 1,
        xp_into_level: into,
        xp_to_next_level: XP_PER_LEVEL - into,
    }
}

/// Adds `amount` to the user's XP and returns the new total.
pub async fn award_xp<'e>(
    executor: impl PgExecutor<'e>,
    user_id: Uuid,
    amount: i32,
) -> Result<i32, AppError> {
    let total: Option<i32> = sqlx::query_scalar(
        "UPDATE users SET total_xp = total_xp + $2, updated_at = now() WHERE id = $1 RETURNING total_xp",
    )
    .bind(user_id)
    .bind(amount)
    .fetch_optional(executor)
    .await?;
    total.ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))
}
