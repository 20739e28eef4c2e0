use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Rep,
    Prospect,
}

impl Speaker {
    pub fn label(self) -> &'static str {
        match self {
            Speaker::Rep => "Sales rep",
            Speaker::Prospect => "Prospect",
        }
    }
}

/// One exchange in a role-play conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationTurn {
    pub speaker: Speaker,
    pub text: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TrainingSessionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub industry_id: Option<Uuid>,
    pub scenario: String,
    pub difficulty: String,
    pub conversation: Json<Vec<ConversationTurn>>,
    pub completed: bool,
    pub xp_earned: i32,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Renders turns as `Speaker: text` lines.
pub fn render_conversation(turns: &[ConversationTurn]) -> String {
    turns
        .iter()
        .map(|t| format!("{}: {}", t.speaker.label(), t.text.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_conversation() {
        let turns = vec![
            ConversationTurn {
                speaker: Speaker::Rep,
                text: " Hi, do you have a minute? ".into(),
                at: Utc::now(),
            },
            ConversationTurn {
                speaker: Speaker::Prospect,
                text: "Barely.".into(),
                at: Utc::now(),
            },
        ];
        assert_eq!(
            render_conversation(&turns),
            "Sales rep: Hi, do you have a minute?\nProspect: Barely."
        );
        assert_eq!(render_conversation(&[]), "");
    }

    #[test]
    fn test_turn_serializes_speaker_snake_case() {
        let turn = ConversationTurn {
            speaker: Speaker::Prospect,
            text: "No budget.".into(),
            at: Utc::now(),
        };
        let value = serde_json::to_value(&turn).unwrap();
        assert_eq!(value["speaker"], "prospect");
    }
}
