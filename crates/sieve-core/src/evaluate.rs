//! Accuracy of a fitted pipeline against labeled samples.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::SampleTable;
use crate::error::Result;
use crate::pipeline::Pipeline;

/// Exact-match accuracy over a sample table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub correct: usize,
    pub total: usize,
    /// `correct / total`, in `[0, 1]`.
    pub accuracy: f64,
}

impl Evaluation {
    pub fn new(correct: usize, total: usize) -> Self {
        let accuracy = if total > 0 {
            correct as f64 / total as f64
        } else {
            0.0
        };
        Self {
            correct,
            total,
            accuracy,
        }
    }

    /// Accuracy as a percentage in `[0, 100]`.
    pub fn percent(&self) -> f64 {
        self.accuracy * 100.0
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Accuracy score {:.2}%", self.percent())
    }
}

/// Predict every row of `table` and count exact label matches.
///
/// Run against the training table this measures fit, not generalization.
pub fn evaluate(pipeline: &Pipeline, table: &SampleTable) -> Result<Evaluation> {
    let predicted = pipeline.predict(table.texts())?;
    let correct = predicted
        .iter()
        .zip(table.labels())
        .filter(|(p, truth)| **p == truth.as_str())
        .count();

    let evaluation = Evaluation::new(correct, table.len());
    debug!(
        correct = evaluation.correct,
        total = evaluation.total,
        "Evaluated pipeline"
    );
    Ok(evaluation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineParams;

    #[test]
    fn display_uses_two_decimals() {
        assert_eq!(Evaluation::new(39, 40).to_string(), "Accuracy score 97.50%");
        assert_eq!(Evaluation::new(1, 3).to_string(), "Accuracy score 33.33%");
        assert_eq!(Evaluation::new(2, 2).to_string(), "Accuracy score 100.00%");
    }

    #[test]
    fn zero_rows_is_zero_accuracy() {
        let evaluation = Evaluation::new(0, 0);
        assert_eq!(evaluation.accuracy, 0.0);
        assert_eq!(evaluation.to_string(), "Accuracy score 0.00%");
    }

    #[test]
    fn counts_exact_matches() {
        let train = SampleTable::from_pairs([("buy now", "spam"), ("hello friend", "ham")]);
        let pipeline = Pipeline::fit_table(&train, &PipelineParams::default()).unwrap();

        let queries = SampleTable::from_pairs([
            ("buy buy", "spam"),
            ("hello", "ham"),
            ("friend", "spam"),
        ]);
        let evaluation = evaluate(&pipeline, &queries).unwrap();
        assert_eq!(evaluation.correct, 2);
        assert_eq!(evaluation.total, 3);
        assert!(evaluation.percent() >= 0.0 && evaluation.percent() <= 100.0);
    }

    #[test]
    fn serializes_as_json() {
        let json = serde_json::to_value(Evaluation::new(3, 4)).unwrap();
        assert_eq!(json["correct"], 3);
        assert_eq!(json["total"], 4);
        assert_eq!(json["accuracy"], 0.75);
    }
}
