//! # TF-IDF Vectorizer
//!
//! Learns a vocabulary and inverse document frequencies from a corpus and
//! maps documents to L1/L2-normalized sparse rows over that vocabulary.

use std::collections::{BTreeMap, BTreeSet};

use sprs::CsMat;
use tracing::debug;

use super::params::{Norm, VectorizerParams};
use super::tokenizer::Analyzer;
use crate::error::{Result, SieveError};

/// A fitted TF-IDF vectorizer.
///
/// The vocabulary is sorted lexicographically; a term's column index is its
/// rank in that order.
#[derive(Debug, Clone)]
pub struct TfidfVectorizer {
    params: VectorizerParams,
    analyzer: Analyzer,
    vocabulary: BTreeMap<String, usize>,
    terms: Vec<String>,
    idf: Option<Vec<f64>>,
}

impl TfidfVectorizer {
    /// Learn the vocabulary and IDF weights from `texts`.
    ///
    /// # Errors
    /// `SieveError::InvalidParameter` for inconsistent parameters and
    /// `SieveError::Fit` when the corpus is empty or no term survives
    /// stop-word removal and frequency filtering.
    pub fn fit<S: AsRef<str>>(texts: &[S], params: &VectorizerParams) -> Result<Self> {
        params.validate()?;
        if texts.is_empty() {
            return Err(SieveError::Fit(
                "cannot fit vectorizer on an empty corpus".into(),
            ));
        }

        let analyzer = Analyzer::new(params.lowercase)?;
        let n_docs = texts.len();

        // term -> (document frequency, corpus term frequency)
        let mut stats: BTreeMap<String, (usize, usize)> = BTreeMap::new();
        for text in texts {
            for (term, count) in count_terms(&analyzer, text.as_ref()) {
                let entry = stats.entry(term).or_insert((0, 0));
                entry.0 += 1;
                entry.1 += count;
            }
        }
        if stats.is_empty() {
            return Err(SieveError::Fit(
                "empty vocabulary; perhaps the documents only contain stop words".into(),
            ));
        }

        let (low, high) = params.doc_count_bounds(n_docs)?;
        let seen = stats.len();
        stats.retain(|_, (df, _)| {
            let df = *df as f64;
            df >= low && df <= high
        });

        if let Some(limit) = params.max_features {
            if stats.len() > limit {
                let mut ranked: Vec<(&String, usize)> =
                    stats.iter().map(|(term, (_, tf))| (term, *tf)).collect();
                // Stable sort keeps alphabetical order among equal frequencies.
                ranked.sort_by(|a, b| b.1.cmp(&a.1));
                let keep: BTreeSet<String> = ranked
                    .into_iter()
                    .take(limit)
                    .map(|(term, _)| term.clone())
                    .collect();
                stats.retain(|term, _| keep.contains(term));
            }
        }

        if stats.is_empty() {
            return Err(SieveError::Fit(
                "after pruning, no terms remain; try a lower min_df or a higher max_df".into(),
            ));
        }

        let terms: Vec<String> = stats.keys().cloned().collect();
        let vocabulary = terms
            .iter()
            .enumerate()
            .map(|(idx, term)| (term.clone(), idx))
            .collect();

        let idf = params.use_idf.then(|| {
            stats
                .values()
                .map(|&(df, _)| inverse_document_frequency(n_docs, df, params.smooth_idf))
                .collect()
        });

        debug!(
            documents = n_docs,
            seen_terms = seen,
            vocabulary = terms.len(),
            "Fitted TF-IDF vectorizer"
        );

        Ok(Self {
            params: params.clone(),
            analyzer,
            vocabulary,
            terms,
            idf,
        })
    }

    /// Fit on `texts` and return the vectorizer with the transformed corpus.
    pub fn fit_transform<S: AsRef<str>>(
        texts: &[S],
        params: &VectorizerParams,
    ) -> Result<(Self, CsMat<f64>)> {
        let vectorizer = Self::fit(texts, params)?;
        let features = vectorizer.transform(texts);
        Ok((vectorizer, features))
    }

    /// Map documents to a CSR matrix of shape `(texts.len(), num_features())`.
    ///
    /// Terms outside the vocabulary get zero weight. Rows with no known
    /// terms stay all-zero.
    pub fn transform<S: AsRef<str>>(&self, texts: &[S]) -> CsMat<f64> {
        let mut indptr = Vec::with_capacity(texts.len() + 1);
        let mut indices = Vec::new();
        let mut data = Vec::new();
        indptr.push(0);

        for text in texts {
            let mut row: BTreeMap<usize, f64> = BTreeMap::new();
            for term in self.analyzer.analyze(text.as_ref()) {
                if let Some(&col) = self.vocabulary.get(&term) {
                    *row.entry(col).or_insert(0.0) += 1.0;
                }
            }

            if let Some(idf) = &self.idf {
                for (col, value) in row.iter_mut() {
                    *value *= idf[*col];
                }
            }
            if let Some(norm) = self.params.norm {
                normalize(&mut row, norm);
            }

            for (col, value) in row {
                indices.push(col);
                data.push(value);
            }
            indptr.push(indices.len());
        }

        CsMat::new((texts.len(), self.terms.len()), indptr, indices, data)
    }

    /// Term to column index mapping.
    pub fn vocabulary(&self) -> &BTreeMap<String, usize> {
        &self.vocabulary
    }

    /// Terms in column order.
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// IDF weight per column, or `None` when IDF weighting is disabled.
    pub fn idf(&self) -> Option<&[f64]> {
        self.idf.as_deref()
    }

    pub fn num_features(&self) -> usize {
        self.terms.len()
    }

    pub fn params(&self) -> &VectorizerParams {
        &self.params
    }
}

fn count_terms(analyzer: &Analyzer, text: &str) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for term in analyzer.analyze(text) {
        *counts.entry(term).or_insert(0) += 1;
    }
    counts
}

fn inverse_document_frequency(n_docs: usize, df: usize, smooth: bool) -> f64 {
    let (n, df) = if smooth {
        (n_docs as f64 + 1.0, df as f64 + 1.0)
    } else {
        (n_docs as f64, df as f64)
    };
    (n / df).ln() + 1.0
}

fn normalize(row: &mut BTreeMap<usize, f64>, norm: Norm) {
    let magnitude = match norm {
        Norm::L1 => row.values().map(|v| v.abs()).sum::<f64>(),
        Norm::L2 => row.values().map(|v| v * v).sum::<f64>().sqrt(),
    };
    if magnitude > 0.0 {
        for value in row.values_mut() {
            *value /= magnitude;
        }
    }
}
