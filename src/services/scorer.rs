use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Fixed result shape shared between the processor and whatever scoring
/// backend is plugged in. Field names stay camelCase on the wire because the
/// dashboard reads `grading_json` verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GradingResult {
    pub(crate) total_score: f64,
    pub(crate) dimension_scores: BTreeMap<String, f64>,
    pub(crate) errors: Vec<GradingError>,
    pub(crate) suggestions: Suggestions,
    pub(crate) summary: String,
    pub(crate) next_steps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct GradingError {
    #[serde(rename = "type")]
    pub(crate) error_type: String,
    pub(crate) message: String,
    pub(crate) original: String,
    pub(crate) suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Suggestions {
    pub(crate) low: Vec<String>,
    pub(crate) mid: Vec<String>,
    pub(crate) high: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) rewrite: Option<String>,
}

/// Scoring backend seam: the pipeline only depends on
/// `score(merged_text) -> GradingResult`.
#[async_trait]
pub(crate) trait Scorer: Send + Sync {
    async fn score(&self, merged_text: &str) -> anyhow::Result<GradingResult>;
}

/// Deterministic placeholder backend.
///
/// TODO: replace with the rubric-driven scoring service once its API is
/// finalized; the pipeline contract stays as-is.
#[derive(Debug, Default, Clone)]
pub(crate) struct BaselineScorer;

#[async_trait]
impl Scorer for BaselineScorer {
    async fn score(&self, _merged_text: &str) -> anyhow::Result<GradingResult> {
        let mut dimension_scores = BTreeMap::new();
        for dimension in ["grammar", "vocabulary", "structure", "content", "coherence"] {
            dimension_scores.insert(dimension.to_string(), 17.0);
        }

        Ok(GradingResult {
            total_score: 85.0,
            dimension_scores,
            errors: Vec::new(),
            suggestions: Suggestions {
                low: vec![
                    "Check subject-verb agreement".to_string(),
                    "Avoid repeated words".to_string(),
                ],
                mid: vec!["Add more supporting examples".to_string()],
                high: vec!["Improve paragraph transitions".to_string()],
                rewrite: None,
            },
            summary: "Mock grading summary.".to_string(),
            next_steps: vec![
                "Rewrite introduction".to_string(),
                "Add one more example".to_string(),
            ],
        })
    }
}
