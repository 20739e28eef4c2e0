// Pitch analysis prompt templates.

use crate::analysis::AnalysisContext;
use crate::llm_client::prompts::{COACH_PERSONA, JSON_ONLY_SYSTEM};

/// System instruction for every scoring call.
pub fn analysis_system() -> String {
    format!(
        "{COACH_PERSONA} Every rationale must quote or paraphrase what the rep actually said. {JSON_ONLY_SYSTEM}"
    )
}

const OUTPUT_SCHEMA: &str = r#"OUTPUT SCHEMA (return exactly this structure, all scores are integers 0-100):
{
  "overall_score": number,
  "meddic": {
    "metrics":           {"score": number, "feedback": "string"},
    "economic_buyer":    {"score": number, "feedback": "string"},
    "decision_criteria": {"score": number, "feedback": "string"},
    "decision_process":  {"score": number, "feedback": "string"},
    "identify_pain":     {"score": number, "feedback": "string"},
    "champion":          {"score": number, "feedback": "string"}
  },
  "sentiment_score": number,
  "confidence_score": number,
  "pace_score": number,
  "clarity_score": number,
  "key_phrases": ["string"],
  "filler_word_count": number,
  "question_count": number,
  "strengths": ["string"],
  "improvements": ["string"],
  "summary": "string"{transcript_field}
}

RULES:
1. metrics: did the rep quantify the value (numbers, %, $, time saved)?
2. economic_buyer: did the rep identify or engage whoever controls budget?
3. decision_criteria: did the rep uncover how the prospect will evaluate options?
4. decision_process: did the rep map steps, stakeholders and timeline?
5. identify_pain: did the rep surface a concrete business pain and its cost?
6. champion: did the rep cultivate an internal advocate?
7. filler_word_count counts "um", "uh", "like", "you know", "basically", "actually" used as fillers.
8. question_count counts questions the rep asked the prospect.
9. key_phrases: at most 8 short phrases that carried the pitch.
10. Return ONLY the JSON object."#;

const TEXT_PROMPT: &str = r#"Evaluate the following sales pitch.
{context}
PITCH TRANSCRIPT:
{transcript}

{schema}"#;

const AUDIO_PROMPT: &str = r#"The attached audio is a recorded sales pitch. Transcribe it, then evaluate it.
Use delivery cues from the audio (pace, hesitation, tone) for pace_score, confidence_score and sentiment_score.
{context}
{schema}"#;

const TRANSCRIPT_FIELD: &str = ",\n  \"transcript\": \"verbatim transcription of the audio\"";

/// Builds the scoring prompt for a typed or transcribed pitch.
pub fn build_analysis_prompt(transcript: &str, context: &AnalysisContext) -> String {
    TEXT_PROMPT
        .replace("{schema}", &OUTPUT_SCHEMA.replace("{transcript_field}", ""))
        .replace("{context}", &render_context(context))
        .replace("{transcript}", transcript.trim())
}

/// Builds the scoring prompt sent alongside an audio attachment.
pub fn build_audio_prompt(context: &AnalysisContext) -> String {
    AUDIO_PROMPT
        .replace(
            "{schema}",
            &OUTPUT_SCHEMA.replace("{transcript_field}", TRANSCRIPT_FIELD),
        )
        .replace("{context}", &render_context(context))
}

fn render_context(context: &AnalysisContext) -> String {
    let mut out = String::new();
    if let Some(industry) = &context.industry {
        out.push_str(&format!("\nINDUSTRY: {industry}\n"));
    }
    if let Some(scenario) = &context.scenario {
        out.push_str(&format!("SCENARIO: {scenario}\n"));
    }
    if let Some(difficulty) = &context.difficulty {
        out.push_str(&format!("DIFFICULTY: {difficulty}\n"));
    }
    if !context.conversation.is_empty() {
        out.push_str("\nCONVERSATION SO FAR:\n");
        for turn in &context.conversation {
            out.push_str(&format!("{}: {}\n", turn.speaker.label(), turn.text.trim()));
        }
    }
    out
}
