//! Vectorizer configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SieveError};

/// A document-frequency limit, either an absolute document count or a
/// proportion of the corpus.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocFrequency {
    Count(usize),
    Proportion(f64),
}

impl DocFrequency {
    /// Resolve the limit to a document count for a corpus of `n_docs`.
    pub fn resolve(self, n_docs: usize) -> f64 {
        match self {
            Self::Count(count) => count as f64,
            Self::Proportion(p) => p * n_docs as f64,
        }
    }

    fn validate(self, name: &str) -> Result<()> {
        if let Self::Proportion(p) = self {
            if !p.is_finite() || p <= 0.0 || p > 1.0 {
                return Err(SieveError::InvalidParameter(format!(
                    "{name} proportion must be in (0, 1], got {p}"
                )));
            }
        }
        Ok(())
    }
}

/// Row normalization applied after term weighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Norm {
    L1,
    L2,
}

impl Norm {
    /// Name used by the `ai.onnx.ml.Normalizer` operator.
    pub fn as_onnx_str(self) -> &'static str {
        match self {
            Self::L1 => "L1",
            Self::L2 => "L2",
        }
    }
}

/// TF-IDF vectorizer parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorizerParams {
    /// Lowercase documents before tokenizing.
    pub lowercase: bool,
    /// Drop terms appearing in fewer documents than this.
    pub min_df: DocFrequency,
    /// Drop terms appearing in more documents than this.
    pub max_df: DocFrequency,
    /// Keep only the most frequent terms across the corpus.
    pub max_features: Option<usize>,
    pub use_idf: bool,
    /// Add one to document frequencies, as if an extra document contained
    /// every term once.
    pub smooth_idf: bool,
    pub norm: Option<Norm>,
}

impl Default for VectorizerParams {
    fn default() -> Self {
        Self {
            lowercase: true,
            min_df: DocFrequency::Count(1),
            max_df: DocFrequency::Proportion(1.0),
            max_features: None,
            use_idf: true,
            smooth_idf: true,
            norm: Some(Norm::L2),
        }
    }
}

impl VectorizerParams {
    /// Check parameters that do not depend on the corpus.
    pub fn validate(&self) -> Result<()> {
        self.min_df.validate("min_df")?;
        self.max_df.validate("max_df")?;
        if self.max_features == Some(0) {
            return Err(SieveError::InvalidParameter(
                "max_features must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Resolve `(min_df, max_df)` to document counts for a corpus of
    /// `n_docs` documents.
    pub fn doc_count_bounds(&self, n_docs: usize) -> Result<(f64, f64)> {
        let low = self.min_df.resolve(n_docs);
        let high = self.max_df.resolve(n_docs);
        if high < low {
            return Err(SieveError::InvalidParameter(format!(
                "max_df corresponds to fewer documents ({high}) than min_df ({low})"
            )));
        }
        Ok((low, high))
    }
}
