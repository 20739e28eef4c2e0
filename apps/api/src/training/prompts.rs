// Prospect role-play prompt templates.

use crate::models::industry::Scenario;
use crate::training::xp::Difficulty;

const PROSPECT_SYSTEM: &str = "\
You are role-playing a B2B buyer on a sales call so that a sales rep can practise. \
Stay in character as the prospect at all times. Never reveal you are an AI, never \
coach the rep, and never break the fourth wall.

SCENARIO: {scenario}
{industry}{prospect_role}
BEHAVIOUR: {behaviour}
{objections}
Reply with what the prospect would say next, in one to four sentences of plain \
spoken English. No stage directions, no markdown.";

fn behaviour(difficulty: Difficulty) -> &'static str {
    match difficulty {
        Difficulty::Beginner => {
            "You are friendly and open. Volunteer information about your problems \
             when asked reasonable questions, and raise at most one mild objection."
        }
        Difficulty::Intermediate => {
            "You are polite but busy. Share details only when the rep asks good \
             discovery questions, and push back on vague claims with a realistic objection."
        }
        Difficulty::Advanced => {
            "You are skeptical and short on time. You already have an incumbent vendor. \
             Demand specifics and numbers, deflect generic pitches, and only reveal who \
             controls budget if the rep earns your trust."
        }
    }
}

/// Builds the system instruction for the prospect persona.
pub fn build_prospect_system(
    scenario: &str,
    difficulty: Difficulty,
    industry: Option<&str>,
    template: Option<&Scenario>,
) -> String {
    let industry = industry
        .map(|name| format!("INDUSTRY: {name}\n"))
        .unwrap_or_default();
    let prospect_role = template
        .map(|t| t.prospect_role.trim())
        .filter(|r| !r.is_empty())
        .map(|r| format!("YOUR ROLE: {r}\n"))
        .unwrap_or_default();
    let objections = template
        .filter(|t| !t.objections.is_empty())
        .map(|t| {
            let mut out = String::from("OBJECTIONS TO RAISE WHEN NATURAL:\n");
            for objection in &t.objections {
                out.push_str(&format!("- {objection}\n"));
            }
            out
        })
        .unwrap_or_default();

    PROSPECT_SYSTEM
        .replace("{behaviour}", behaviour(difficulty))
        .replace("{industry}", &industry)
        .replace("{prospect_role}", &prospect_role)
        .replace("{objections}", &objections)
        .replace("{scenario}", scenario.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_prompt_has_no_placeholders() {
        let prompt = build_prospect_system("Cold call", Difficulty::Beginner, None, None);
        assert!(prompt.contains("SCENARIO: Cold call"));
        assert!(!prompt.contains('{'));
        assert!(!prompt.contains("INDUSTRY:"));
        assert!(!prompt.contains("OBJECTIONS"));
    }

    #[test]
    fn test_template_details_are_included() {
        let template = Scenario {
            title: "Renewal".into(),
            description: String::new(),
            prospect_role: "VP of Operations".into(),
            difficulty: "advanced".into(),
            objections: vec!["Too expensive".into(), "Happy with current vendor".into()],
        };
        let prompt = build_prospect_system(
            "Renewal at risk",
            Difficulty::Advanced,
            Some("Logistics"),
            Some(&template),
        );
        assert!(prompt.contains("INDUSTRY: Logistics"));
        assert!(prompt.contains("YOUR ROLE: VP of Operations"));
        assert!(prompt.contains("- Too expensive\n- Happy with current vendor"));
        assert!(prompt.contains("incumbent vendor"));
    }
}
