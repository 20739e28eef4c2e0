use serde::{Deserialize, Serialize};

/// The six MEDDIC qualification dimensions, in framework order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeddicDimension {
    Metrics,
    EconomicBuyer,
    DecisionCriteria,
    DecisionProcess,
    IdentifyPain,
    Champion,
}

impl MeddicDimension {
    pub const ALL: [MeddicDimension; 6] = [
        MeddicDimension::Metrics,
        MeddicDimension::EconomicBuyer,
        MeddicDimension::DecisionCriteria,
        MeddicDimension::DecisionProcess,
        MeddicDimension::IdentifyPain,
        MeddicDimension::Champion,
    ];

    /// Key used in stored analysis JSON.
    pub fn key(self) -> &'static str {
        match self {
            MeddicDimension::Metrics => "metrics",
            MeddicDimension::EconomicBuyer => "economic_buyer",
            MeddicDimension::DecisionCriteria => "decision_criteria",
            MeddicDimension::DecisionProcess => "decision_process",
            MeddicDimension::IdentifyPain => "identify_pain",
            MeddicDimension::Champion => "champion",
        }
    }

    /// The camelCase spelling models frequently answer with.
    pub fn camel_key(self) -> &'static str {
        match self {
            MeddicDimension::Metrics => "metrics",
            MeddicDimension::EconomicBuyer => "economicBuyer",
            MeddicDimension::DecisionCriteria => "decisionCriteria",
            MeddicDimension::DecisionProcess => "decisionProcess",
            MeddicDimension::IdentifyPain => "identifyPain",
            MeddicDimension::Champion => "champion",
        }
    }

    /// Human-readable name; matches the seeded `skills.name` rows.
    pub fn label(self) -> &'static str {
        match self {
            MeddicDimension::Metrics => "Metrics",
            MeddicDimension::EconomicBuyer => "Economic Buyer",
            MeddicDimension::DecisionCriteria => "Decision Criteria",
            MeddicDimension::DecisionProcess => "Decision Process",
            MeddicDimension::IdentifyPain => "Identify Pain",
            MeddicDimension::Champion => "Champion",
        }
    }
}

/// Score (0–100) plus the model's rationale for one dimension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DimensionScore {
    pub score: u32,
    pub feedback: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeddicScores {
    pub metrics: DimensionScore,
    pub economic_buyer: DimensionScore,
    pub decision_criteria: DimensionScore,
    pub decision_process: DimensionScore,
    pub identify_pain: DimensionScore,
    pub champion: DimensionScore,
}

impl MeddicScores {
    pub fn get(&self, dimension: MeddicDimension) -> &DimensionScore {
        match dimension {
            MeddicDimension::Metrics => &self.metrics,
            MeddicDimension::EconomicBuyer => &self.economic_buyer,
            MeddicDimension::DecisionCriteria => &self.decision_criteria,
            MeddicDimension::DecisionProcess => &self.decision_process,
            MeddicDimension::IdentifyPain => &self.identify_pain,
            MeddicDimension::Champion => &self.champion,
        }
    }

    pub fn get_mut(&mut self, dimension: MeddicDimension) -> &mut DimensionScore {
        match dimension {
            MeddicDimension::Metrics => &mut self.metrics,
            MeddicDimension::EconomicBuyer => &mut self.economic_buyer,
            MeddicDimension::DecisionCriteria => &mut self.decision_criteria,
            MeddicDimension::DecisionProcess => &mut self.decision_process,
            MeddicDimension::IdentifyPain => &mut self.identify_pain,
            MeddicDimension::Champion => &mut self.champion,
        }
    }

    /// Rounded mean of the six dimension scores.
    pub fn mean_score(&self) -> u32 {
        let total: u32 = MeddicDimension::ALL.iter().map(|d| self.get(*d).score).sum();
        (f64::from(total) / MeddicDimension::ALL.len() as f64).round() as u32
    }
}

/// Fixed-shape result of scoring one pitch.
///
/// `Default` is the all-zero value returned whenever the model call or its
/// output cannot be used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PitchAnalysis {
    pub overall_score: u32,
    pub meddic: MeddicScores,
    pub sentiment_score: u32,
    pub confidence_score: u32,
    pub pace_score: u32,
    pub clarity_score: u32,
    pub key_phrases: Vec<String>,
    pub filler_word_count: u32,
    pub question_count: u32,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub summary: String,
    /// Populated only when the input was audio.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
}

impl PitchAnalysis {
    pub fn is_fallback(&self) -> bool {
        *self == PitchAnalysis::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_all_zero() {
        let analysis = PitchAnalysis::default();
        assert_eq!(analysis.overall_score, 0);
        for dimension in MeddicDimension::ALL {
            assert_eq!(analysis.meddic.get(dimension).score, 0);
            assert!(analysis.meddic.get(dimension).feedback.is_empty());
        }
        assert!(analysis.key_phrases.is_empty());
        assert!(analysis.is_fallback());
    }

    #[test]
    fn test_mean_score_rounds() {
        let mut scores = MeddicScores::default();
        scores.metrics.score = 80;
        scores.champion.score = 81;
        // 161 / 6 = 26.83
        assert_eq!(scores.mean_score(), 27);
    }

    #[test]
    fn test_serialized_keys_match_dimension_keys() {
        let value = serde_json::to_value(MeddicScores::default()).unwrap();
        for dimension in MeddicDimension::ALL {
            assert!(value.get(dimension.key()).is_some(), "{}", dimension.key());
        }
    }
}
