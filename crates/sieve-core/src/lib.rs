//! # Sieve Core
//!
//! Text filtering with a TF-IDF vectorizer and a multinomial Naive Bayes
//! classifier, plus export of the fitted pipeline to ONNX.
//!
//! ## Quick Start
//!
//! ```rust
//! use sieve_core::{evaluate, export, Pipeline, PipelineParams, SampleTable};
//!
//! let table = SampleTable::from_pairs([("buy now", "spam"), ("hello friend", "ham")]);
//! let pipeline = Pipeline::fit_table(&table, &PipelineParams::default()).unwrap();
//!
//! assert_eq!(pipeline.predict_one("buy now").unwrap(), "spam");
//! assert_eq!(evaluate(&pipeline, &table).unwrap().to_string(), "Accuracy score 100.00%");
//!
//! let model = export::to_onnx(&pipeline, &export::ExportOptions::default()).unwrap();
//! assert!(!export::encode(&model).is_empty());
//! ```
pub mod classifier;
pub mod data;
pub mod error;
pub mod evaluate;
pub mod export;
pub mod pipeline;
pub mod vectorizer;

// Re-export primary API
pub use classifier::{MultinomialNb, NbParams};
pub use data::{Sample, SampleTable};
pub use error::{Result, SieveError};
pub use evaluate::{Evaluation, evaluate};
pub use export::ExportOptions;
pub use pipeline::{Pipeline, PipelineParams};
pub use vectorizer::{DocFrequency, Norm, TfidfVectorizer, VectorizerParams};
