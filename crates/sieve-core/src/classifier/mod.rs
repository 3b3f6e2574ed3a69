//! # Classification
//!
//! Multinomial Naive Bayes over sparse TF-IDF features.

pub mod naive_bayes;

pub use naive_bayes::{MultinomialNb, NbParams};
