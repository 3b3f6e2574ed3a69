//! # Text Classification Pipeline
//!
//! Couples a fitted [`TfidfVectorizer`] with the [`MultinomialNb`] trained on
//! its output, so inference always applies the training-time transform.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::classifier::{MultinomialNb, NbParams};
use crate::data::SampleTable;
use crate::error::{Result, SieveError};
use crate::vectorizer::{TfidfVectorizer, VectorizerParams};

/// Parameters for both pipeline stages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineParams {
    pub vectorizer: VectorizerParams,
    pub classifier: NbParams,
}

/// A fitted TF-IDF + Naive Bayes pipeline.
///
/// Only constructible through [`Pipeline::fit`]; both stages are immutable
/// afterwards.
#[derive(Debug, Clone)]
pub struct Pipeline {
    vectorizer: TfidfVectorizer,
    classifier: MultinomialNb,
}

impl Pipeline {
    /// Fit the vectorizer on `texts`, then the classifier on the vectorized
    /// corpus and `labels`.
    ///
    /// # Examples
    /// ```
    /// use sieve_core::{Pipeline, PipelineParams};
    ///
    /// let texts = ["buy now", "hello friend"];
    /// let labels = ["spam", "ham"];
    /// let pipeline = Pipeline::fit(&texts, &labels, &PipelineParams::default()).unwrap();
    /// assert_eq!(pipeline.predict_one("buy now").unwrap(), "spam");
    /// ```
    pub fn fit<T, L>(texts: &[T], labels: &[L], params: &PipelineParams) -> Result<Self>
    where
        T: AsRef<str>,
        L: AsRef<str>,
    {
        if texts.len() != labels.len() {
            return Err(SieveError::Fit(format!(
                "found {} texts but {} labels",
                texts.len(),
                labels.len()
            )));
        }
        if texts.is_empty() {
            return Err(SieveError::Fit("cannot fit pipeline on empty data".into()));
        }

        let (vectorizer, features) = TfidfVectorizer::fit_transform(texts, &params.vectorizer)?;
        let classifier = MultinomialNb::fit(&features, labels, &params.classifier)?;

        info!(
            samples = texts.len(),
            vocabulary = vectorizer.num_features(),
            classes = classifier.classes().len(),
            "Pipeline fitted"
        );

        Ok(Self {
            vectorizer,
            classifier,
        })
    }

    /// Fit on every row of a sample table.
    pub fn fit_table(table: &SampleTable, params: &PipelineParams) -> Result<Self> {
        Self::fit(table.texts(), table.labels(), params)
    }

    /// Predicted label per text.
    pub fn predict<S: AsRef<str>>(&self, texts: &[S]) -> Result<Vec<&str>> {
        let features = self.vectorizer.transform(texts);
        self.classifier.predict(&features)
    }

    pub fn predict_one(&self, text: &str) -> Result<&str> {
        // One row in, one label out.
        Ok(self.predict(&[text])?.remove(0))
    }

    /// Class probabilities per text, columns ordered like [`classes`](Self::classes).
    pub fn predict_proba<S: AsRef<str>>(&self, texts: &[S]) -> Result<Vec<Vec<f64>>> {
        let features = self.vectorizer.transform(texts);
        self.classifier.predict_proba(&features)
    }

    pub fn classes(&self) -> &[String] {
        self.classifier.classes()
    }

    pub fn vectorizer(&self) -> &TfidfVectorizer {
        &self.vectorizer
    }

    pub fn classifier(&self) -> &MultinomialNb {
        &self.classifier
    }
}
