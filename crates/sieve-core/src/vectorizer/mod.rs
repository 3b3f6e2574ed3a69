//! # Feature Extraction
//!
//! TF-IDF vectorization over a stop-word filtered unigram vocabulary.

pub mod params;
pub mod stop_words;
pub mod tfidf;
pub mod tokenizer;

pub use params::{DocFrequency, Norm, VectorizerParams};
pub use stop_words::{ENGLISH_STOP_WORDS, is_stop_word};
pub use tfidf::TfidfVectorizer;
pub use tokenizer::{Analyzer, TOKEN_PATTERN};
