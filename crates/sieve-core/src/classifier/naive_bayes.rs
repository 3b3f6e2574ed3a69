//! # Multinomial Naive Bayes
//!
//! Class-conditional term likelihoods with additive (Lidstone) smoothing.
//! All scoring is done in log space.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use sprs::CsMat;
use tracing::{debug, warn};

use crate::error::{Result, SieveError};

/// Naive Bayes hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NbParams {
    /// Additive smoothing applied to every feature count.
    pub alpha: f64,
    /// Learn class priors from label frequencies instead of using a
    /// uniform prior.
    pub fit_prior: bool,
}

impl Default for NbParams {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            fit_prior: true,
        }
    }
}

impl NbParams {
    pub fn validate(&self) -> Result<()> {
        if !self.alpha.is_finite() || self.alpha <= 0.0 {
            return Err(SieveError::InvalidParameter(format!(
                "alpha must be finite and positive, got {}",
                self.alpha
            )));
        }
        Ok(())
    }
}

/// A fitted multinomial Naive Bayes classifier.
#[derive(Debug, Clone)]
pub struct MultinomialNb {
    params: NbParams,
    classes: Vec<String>,
    class_count: Vec<f64>,
    /// `[class][feature]`
    feature_log_prob: Vec<Vec<f64>>,
    class_log_prior: Vec<f64>,
    n_features: usize,
}

impl MultinomialNb {
    /// Fit on a CSR feature matrix with one label per row.
    ///
    /// # Errors
    /// `SieveError::Fit` if the row and label counts differ, the data is
    /// empty, the matrix is not CSR, or a feature value is negative.
    pub fn fit<S: AsRef<str>>(x: &CsMat<f64>, labels: &[S], params: &NbParams) -> Result<Self> {
        params.validate()?;
        if x.rows() != labels.len() {
            return Err(SieveError::Fit(format!(
                "found {} feature rows but {} labels",
                x.rows(),
                labels.len()
            )));
        }
        if labels.is_empty() {
            return Err(SieveError::Fit(
                "cannot fit classifier on empty data".into(),
            ));
        }
        if !x.is_csr() {
            return Err(SieveError::Fit("feature matrix must be CSR".into()));
        }

        let classes: Vec<String> = labels
            .iter()
            .map(|l| l.as_ref())
            .collect::<BTreeSet<&str>>()
            .into_iter()
            .map(str::to_owned)
            .collect();
        let class_index: BTreeMap<&str, usize> = classes
            .iter()
            .enumerate()
            .map(|(idx, class)| (class.as_str(), idx))
            .collect();

        let n_classes = classes.len();
        let n_features = x.cols();
        let mut class_count = vec![0.0; n_classes];
        let mut feature_count = vec![vec![0.0; n_features]; n_classes];

        for (row, vec) in x.outer_iterator().enumerate() {
            let label: &str = labels[row].as_ref();
            let class = class_index[label];
            class_count[class] += 1.0;
            for (col, &value) in vec.iter() {
                if value < 0.0 {
                    return Err(SieveError::Fit(format!(
                        "negative feature value {value} at row {row}, column {col}"
                    )));
                }
                feature_count[class][col] += value;
            }
        }

        if n_classes == 1 {
            warn!(
                class = %classes[0],
                "Training data contains a single class; every prediction will be this class"
            );
        }

        let alpha = params.alpha;
        let feature_log_prob = feature_count
            .iter()
            .map(|counts| {
                let total: f64 = counts.iter().map(|c| c + alpha).sum();
                let log_total = total.ln();
                counts.iter().map(|c| (c + alpha).ln() - log_total).collect()
            })
            .collect();

        let n_samples = labels.len() as f64;
        let class_log_prior = if params.fit_prior {
            class_count.iter().map(|c| (c / n_samples).ln()).collect()
        } else {
            vec![-(n_classes as f64).ln(); n_classes]
        };

        debug!(
            samples = labels.len(),
            features = n_features,
            classes = n_classes,
            "Fitted multinomial Naive Bayes"
        );

        Ok(Self {
            params: params.clone(),
            classes,
            class_count,
            feature_log_prob,
            class_log_prior,
            n_features,
        })
    }

    /// Unnormalized posterior log-probability per row and class:
    /// `x · feature_log_probᵀ + class_log_prior`.
    pub fn joint_log_likelihood(&self, x: &CsMat<f64>) -> Result<Vec<Vec<f64>>> {
        if x.cols() != self.n_features {
            return Err(SieveError::Fit(format!(
                "expected {} features, got {}",
                self.n_features,
                x.cols()
            )));
        }
        if !x.is_csr() {
            return Err(SieveError::Fit("feature matrix must be CSR".into()));
        }

        Ok(x
            .outer_iterator()
            .map(|vec| {
                self.feature_log_prob
                    .iter()
                    .zip(&self.class_log_prior)
                    .map(|(log_prob, prior)| {
                        prior + vec.iter().map(|(col, &v)| v * log_prob[col]).sum::<f64>()
                    })
                    .collect()
            })
            .collect())
    }

    /// Index into [`classes`](Self::classes) of the most probable class per row.
    pub fn predict_indices(&self, x: &CsMat<f64>) -> Result<Vec<usize>> {
        Ok(self
            .joint_log_likelihood(x)?
            .iter()
            .map(|row| argmax(row))
            .collect())
    }

    /// Most probable class label per row. Ties go to the first class in
    /// sorted order.
    pub fn predict(&self, x: &CsMat<f64>) -> Result<Vec<&str>> {
        Ok(self
            .predict_indices(x)?
            .into_iter()
            .map(|idx| self.classes[idx].as_str())
            .collect())
    }

    /// Normalized log-probabilities, columns in class order.
    pub fn predict_log_proba(&self, x: &CsMat<f64>) -> Result<Vec<Vec<f64>>> {
        let mut jll = self.joint_log_likelihood(x)?;
        for row in &mut jll {
            let norm = log_sum_exp(row);
            for value in row.iter_mut() {
                *value -= norm;
            }
        }
        Ok(jll)
    }

    /// Class probabilities, columns in class order. Each row sums to one.
    pub fn predict_proba(&self, x: &CsMat<f64>) -> Result<Vec<Vec<f64>>> {
        let mut log_proba = self.predict_log_proba(x)?;
        for row in &mut log_proba {
            for value in row.iter_mut() {
                *value = value.exp();
            }
        }
        Ok(log_proba)
    }

    /// Sorted distinct training labels.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Number of training samples per class.
    pub fn class_count(&self) -> &[f64] {
        &self.class_count
    }

    pub fn feature_log_prob(&self) -> &[Vec<f64>] {
        &self.feature_log_prob
    }

    pub fn class_log_prior(&self) -> &[f64] {
        &self.class_log_prior
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn params(&self) -> &NbParams {
        &self.params
    }
}

fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (idx, &value) in values.iter().enumerate().skip(1) {
        if value > values[best] {
            best = idx;
        }
    }
    best
}

fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}
