//! # Sieve Trainer
//!
//! Trains the TF-IDF + Naive Bayes text filter from a labeled CSV, reports
//! training-set accuracy and writes the fitted pipeline as an ONNX model.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::{debug, info};

use sieve_core::export::{self, DEFAULT_OPSET, ExportOptions};
use sieve_core::{
    DocFrequency, Evaluation, NbParams, Pipeline, PipelineParams, SampleTable, VectorizerParams,
    evaluate,
};

/// CLI arguments
#[derive(Parser, Debug, Clone)]
#[command(name = "train")]
#[command(about = "Train the TF-IDF + Naive Bayes text filter and export it to ONNX")]
#[command(version)]
pub struct TrainArgs {
    /// Labeled CSV with `text` and `label` columns
    #[arg(long, default_value = "_data.csv")]
    pub data: PathBuf,

    /// Where to write the ONNX model
    #[arg(long, default_value = "filter.onnx")]
    pub output: PathBuf,

    /// Additive smoothing for Naive Bayes
    #[arg(long, default_value_t = 1.0)]
    pub alpha: f64,

    /// Ignore terms found in fewer documents than this
    #[arg(long, default_value_t = 1)]
    pub min_df: usize,

    /// Ignore terms found in more than this proportion of documents
    #[arg(long, default_value_t = 1.0)]
    pub max_df: f64,

    /// Keep only this many of the most frequent terms
    #[arg(long)]
    pub max_features: Option<usize>,

    /// Target ai.onnx opset version
    #[arg(long, default_value_t = DEFAULT_OPSET)]
    pub opset: i64,

    /// Emit probabilities as a raw tensor instead of per-class maps
    #[arg(long)]
    pub no_zipmap: bool,

    /// Write the evaluation as JSON to this path
    #[arg(long)]
    pub metrics: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Default for TrainArgs {
    fn default() -> Self {
        Self::parse_from(["train"])
    }
}

impl TrainArgs {
    pub fn pipeline_params(&self) -> PipelineParams {
        PipelineParams {
            vectorizer: VectorizerParams {
                min_df: DocFrequency::Count(self.min_df),
                max_df: DocFrequency::Proportion(self.max_df),
                max_features: self.max_features,
                ..Default::default()
            },
            classifier: NbParams {
                alpha: self.alpha,
                ..Default::default()
            },
        }
    }

    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            target_opset: self.opset,
            zipmap: !self.no_zipmap,
            ..Default::default()
        }
    }
}

/// Outcome of a training run.
#[derive(Debug, Clone, Serialize)]
pub struct TrainReport {
    pub evaluation: Evaluation,
    pub classes: Vec<String>,
    pub vocabulary_size: usize,
    pub model_path: PathBuf,
}

/// Load, fit, evaluate and export. Prints the accuracy line and the
/// completion line to stdout.
pub fn run_training(args: &TrainArgs) -> Result<TrainReport> {
    debug!(?args, "Starting training run");

    let table = SampleTable::from_path(&args.data).with_context(|| {
        format!("failed to load training data from {}", args.data.display())
    })?;
    info!(rows = table.len(), path = %args.data.display(), "Loaded training data");

    let pipeline = Pipeline::fit_table(&table, &args.pipeline_params())
        .context("failed to fit the text classification pipeline")?;

    let evaluation = evaluate(&pipeline, &table).context("failed to evaluate the pipeline")?;
    println!("{evaluation}");

    let model = export::to_onnx(&pipeline, &args.export_options())
        .context("failed to convert the pipeline to ONNX")?;
    export::write_model(&model, &args.output)
        .with_context(|| format!("failed to write model to {}", args.output.display()))?;

    if let Some(path) = &args.metrics {
        let json = serde_json::to_string_pretty(&evaluation)?;
        fs::write(path, json)
            .with_context(|| format!("failed to write metrics to {}", path.display()))?;
        info!(path = %path.display(), "Wrote metrics");
    }
    println!("Built the model");

    Ok(TrainReport {
        evaluation,
        classes: pipeline.classes().to_vec(),
        vocabulary_size: pipeline.vectorizer().num_features(),
        model_path: args.output.clone(),
    })
}
