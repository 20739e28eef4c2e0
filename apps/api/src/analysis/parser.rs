//! Lenient reader for model-produced analysis JSON.
//!
//! Models drift from the requested schema: they wrap output in fences, add
//! prose around the object, switch to camelCase, quote numbers, or nest the
//! MEDDIC block differently. Each field is read independently; anything that
//! cannot be read becomes its zero value. Output with no JSON object at all
//! yields `PitchAnalysis::default()`.

use serde_json::{Map, Value};
use tracing::warn;

use crate::analysis::models::{DimensionScore, MeddicDimension, MeddicScores, PitchAnalysis};
use crate::llm_client::strip_json_fences;

const MAX_SCORE: f64 = 100.0;

pub fn parse_analysis(raw: &str) -> PitchAnalysis {
    match extract_json_object(raw) {
        Some(object) => analysis_from_object(&object),
        None => {
            warn!(
                "Model output contained no JSON object ({} chars), using zeroed analysis",
                raw.len()
            );
            PitchAnalysis::default()
        }
    }
}

/// Finds the first complete JSON object in `raw`. Braces in surrounding
/// prose are skipped: each `{` is tried in turn and the first one that
/// starts a parseable object wins, ignoring whatever trails it.
fn extract_json_object(raw: &str) -> Option<Map<String, Value>> {
    let text = strip_json_fences(raw);
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(text) {
        return Some(map);
    }
    text.match_indices('{').find_map(|(start, _)| {
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(Value::Object(map))) => Some(map),
            _ => None,
        }
    })
}

fn analysis_from_object(root: &Map<String, Value>) -> PitchAnalysis {
    let meddic = read_meddic(root);
    let overall_score = lookup(root, &["overall_score", "overallScore", "score"])
        .and_then(read_score)
        .unwrap_or_else(|| meddic.mean_score());

    PitchAnalysis {
        overall_score,
        sentiment_score: score_field(root, &["sentiment_score", "sentimentScore", "sentiment"]),
        confidence_score: score_field(root, &["confidence_score", "confidenceScore", "confidence"]),
        pace_score: score_field(root, &["pace_score", "paceScore", "pace"]),
        clarity_score: score_field(root, &["clarity_score", "clarityScore", "clarity"]),
        key_phrases: string_list(root, &["key_phrases", "keyPhrases"]),
        filler_word_count: count_field(
            root,
            &["filler_word_count", "fillerWordCount", "filler_words", "fillerWords"],
        ),
        question_count: count_field(
            root,
            &["question_count", "questionCount", "questions_asked", "questionsAsked"],
        ),
        strengths: string_list(root, &["strengths"]),
        improvements: string_list(root, &["improvements", "areas_for_improvement", "areasForImprovement"]),
        summary: lookup(root, &["summary", "overall_feedback", "overallFeedback", "feedback"])
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
        transcript: lookup(root, &["transcript", "transcription"])
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        meddic,
    }
}

fn read_meddic(root: &Map<String, Value>) -> MeddicScores {
    let block = lookup(
        root,
        &["meddic", "meddic_scores", "meddicScores", "meddic_analysis", "meddicAnalysis"],
    )
    .and_then(Value::as_object)
    .unwrap_or(root);

    let mut scores = MeddicScores::default();
    for dimension in MeddicDimension::ALL {
        if let Some(value) = lookup(block, &[dimension.key(), dimension.camel_key()]) {
            *scores.get_mut(dimension) = read_dimension(value);
        }
    }
    scores
}

/// A dimension is either `{ "score": n, "feedback": "..." }` or a bare score.
fn read_dimension(value: &Value) -> DimensionScore {
    match value {
        Value::Object(map) => DimensionScore {
            score: lookup(map, &["score", "value"])
                .and_then(read_score)
                .unwrap_or(0),
            feedback: lookup(map, &["feedback", "rationale", "reasoning", "comment"])
                .and_then(Value::as_str)
                .map(|s| s.trim().to_string())
                .unwrap_or_default(),
        },
        other => DimensionScore {
            score: read_score(other).unwrap_or(0),
            feedback: String::new(),
        },
    }
}

fn lookup<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| map.get(*k)).filter(|v| !v.is_null())
}

fn score_field(map: &Map<String, Value>, keys: &[&str]) -> u32 {
    lookup(map, keys).and_then(read_score).unwrap_or(0)
}

fn count_field(map: &Map<String, Value>, keys: &[&str]) -> u32 {
    lookup(map, keys).and_then(read_count).unwrap_or(0)
}

/// Numbers and numeric strings ("85", "85%") clamped to 0..=100.
fn read_score(value: &Value) -> Option<u32> {
    let n = read_number(value)?;
    Some(n.clamp(0.0, MAX_SCORE).round() as u32)
}

/// Non-negative counts. A list is counted by its length.
fn read_count(value: &Value) -> Option<u32> {
    if let Value::Array(items) = value {
        return Some(u32::try_from(items.len()).unwrap_or(u32::MAX));
    }
    let n = read_number(value)?;
    Some(n.max(0.0).min(f64::from(u32::MAX)).round() as u32)
}

fn read_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Arrays of strings, or a single comma-separated string.
fn string_list(map: &Map<String, Value>, keys: &[&str]) -> Vec<String> {
    match lookup(map, keys) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELL_FORMED: &str = r#"{
        "overall_score": 72,
        "meddic": {
            "metrics": {"score": 80, "feedback": "Quantified ROI clearly."},
            "economic_buyer": {"score": 40, "feedback": "Never asked who signs."},
            "decision_criteria": {"score": 65, "feedback": "Some criteria covered."},
            "decision_process": {"score": 55, "feedback": "Timeline unclear."},
            "identify_pain": {"score": 90, "feedback": "Pain surfaced early."},
            "champion": {"score": 50, "feedback": "No champion yet."}
        },
        "sentiment_score": 70,
        "confidence_score": 75,
        "pace_score": 60,
        "clarity_score": 85,
        "key_phrases": ["reduce churn", "30% faster"],
        "filler_word_count": 4,
        "question_count": 6,
        "strengths": ["Strong discovery"],
        "improvements": ["Identify the economic buyer"],
        "summary": "Solid discovery, weak qualification."
    }"#;

    #[test]
    fn test_well_formed_output() {
        let analysis = parse_analysis(WELL_FORMED);
        assert_eq!(analysis.overall_score, 72);
        assert_eq!(analysis.meddic.metrics.score, 80);
        assert_eq!(analysis.meddic.economic_buyer.feedback, "Never asked who signs.");
        assert_eq!(analysis.meddic.identify_pain.score, 90);
        assert_eq!(analysis.clarity_score, 85);
        assert_eq!(analysis.key_phrases, vec!["reduce churn", "30% faster"]);
        assert_eq!(analysis.filler_word_count, 4);
        assert_eq!(analysis.question_count, 6);
        assert_eq!(analysis.summary, "Solid discovery, weak qualification.");
        assert!(analysis.transcript.is_none());
    }

    #[test]
    fn test_fenced_output_with_prose() {
        let raw = format!("Here is the analysis you asked for:\n```json\n{WELL_FORMED}\n```\nThanks!");
        let analysis = parse_analysis(&raw);
        assert_eq!(analysis.overall_score, 72);
        assert_eq!(analysis.meddic.champion.score, 50);
    }

    #[test]
    fn test_camel_case_and_string_numbers() {
        let raw = r#"{
            "overallScore": "64",
            "meddicScores": {
                "economicBuyer": {"score": "70%", "feedback": "Named the CFO."},
                "identifyPain": 88
            },
            "fillerWordCount": "3",
            "keyPhrases": "pipeline, forecast accuracy"
        }"#;
        let analysis = parse_analysis(raw);
        assert_eq!(analysis.overall_score, 64);
        assert_eq!(analysis.meddic.economic_buyer.score, 70);
        assert_eq!(analysis.meddic.economic_buyer.feedback, "Named the CFO.");
        assert_eq!(analysis.meddic.identify_pain.score, 88);
        assert_eq!(analysis.filler_word_count, 3);
        assert_eq!(analysis.key_phrases, vec!["pipeline", "forecast accuracy"]);
    }

    #[test]
    fn test_scores_are_clamped() {
        let raw = r#"{"overall_score": 140, "pace_score": -20, "question_count": -3}"#;
        let analysis = parse_analysis(raw);
        assert_eq!(analysis.overall_score, 100);
        assert_eq!(analysis.pace_score, 0);
        assert_eq!(analysis.question_count, 0);
    }

    #[test]
    fn test_missing_overall_uses_meddic_mean() {
        let raw = r#"{"meddic": {"metrics": 60, "economic_buyer": 60, "decision_criteria": 60,
                      "decision_process": 60, "identify_pain": 60, "champion": 60}}"#;
        assert_eq!(parse_analysis(raw).overall_score, 60);
    }

    #[test]
    fn test_flat_meddic_keys_at_root() {
        let raw = r#"{"overall_score": 50, "metrics": {"score": 45, "feedback": "ok"}}"#;
        let analysis = parse_analysis(raw);
        assert_eq!(analysis.meddic.metrics.score, 45);
    }

    #[test]
    fn test_question_list_is_counted() {
        let raw = r#"{"questions_asked": ["What is your budget?", "Who else is involved?"]}"#;
        assert_eq!(parse_analysis(raw).question_count, 2);
    }

    #[test]
    fn test_wrong_types_become_zero() {
        let raw = r#"{"overall_score": {"nested": true}, "clarity_score": [1,2],
                      "meddic": {"metrics": {"score": "high"}}, "key_phrases": 7}"#;
        let analysis = parse_analysis(raw);
        assert_eq!(analysis.overall_score, 0);
        assert_eq!(analysis.clarity_score, 0);
        assert_eq!(analysis.meddic.metrics.score, 0);
        assert!(analysis.key_phrases.is_empty());
    }

    #[test]
    fn test_garbage_yields_zeroed_default() {
        for raw in [
            "",
            "I'm sorry, I can't help with that.",
            "{ this is not json }",
            "[1, 2, 3]",
            "}{",
            "```json\n```",
            "null",
        ] {
            let analysis = parse_analysis(raw);
            assert!(analysis.is_fallback(), "input {raw:?} produced {analysis:?}");
        }
    }

    #[test]
    fn test_braces_in_prose_are_skipped() {
        let raw = r#"Scores use the {0-100} scale. {"overall_score": 72, "summary": "Solid"} Let me know if {anything} else helps."#;
        let analysis = parse_analysis(raw);
        assert_eq!(analysis.overall_score, 72);
        assert_eq!(analysis.summary, "Solid");

        let trailing = r#"{"overall_score": 55} and a stray } at the end"#;
        assert_eq!(parse_analysis(trailing).overall_score, 55);
    }

    #[test]
    fn test_transcript_is_read_for_audio() {
        let raw = r#"{"overall_score": 10, "transcript": "  Hi, this is Sam from Acme.  "}"#;
        assert_eq!(
            parse_analysis(raw).transcript.as_deref(),
            Some("Hi, this is Sam from Acme.")
        );
    }
}
