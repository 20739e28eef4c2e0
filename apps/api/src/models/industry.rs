use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// A role-play template embedded in an industry row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scenario {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub prospect_role: String,
    #[serde(default = "default_difficulty")]
    pub difficulty: String,
    #[serde(default)]
    pub objections: Vec<String>,
}

fn default_difficulty() -> String {
    "beginner".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct IndustryRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub scenarios: Json<Vec<Scenario>>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_defaults_missing_fields() {
        let scenario: Scenario =
            serde_json::from_str(r#"{"title": "Cold call a CFO"}"#).unwrap();
        assert_eq!(scenario.difficulty, "beginner");
        assert!(scenario.objections.is_empty());
    }
}
