//! # ONNX Export
//!
//! Converts a fitted [`Pipeline`] into an ONNX model that maps a 1-D string
//! tensor to a predicted label and per-class probabilities.
//!
//! The graph mirrors the native pipeline stage by stage:
//!
//! ```text
//! input -> StringNormalizer -> Tokenizer -> TfIdfVectorizer -> Mul(idf) -> Normalizer
//!       -> MatMul(feature_log_probᵀ) -> Add(class_log_prior)
//!       -> ArgMax -> ArrayFeatureExtractor(classes) -> Reshape      => output_label
//!       -> ReduceLogSumExp -> Sub -> Exp -> ZipMap                  => output_probability
//! ```
//!
//! `StringNormalizer`, `Mul` and `Normalizer` are only emitted when the
//! corresponding vectorizer option is enabled.

pub mod graph;
pub mod onnx;

use std::fs;
use std::path::Path;

use prost::Message;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use self::graph::{
    Dim, GraphBuilder, ML_DOMAIN, MS_DOMAIN, attr_int, attr_ints, attr_string, attr_strings,
    sequence_of_map_type, tensor_type,
};
use self::onnx::{DataType, ModelProto, OperatorSetIdProto};
use crate::error::{Result, SieveError};
use crate::pipeline::Pipeline;
use crate::vectorizer::TOKEN_PATTERN;

pub const IR_VERSION: i64 = 8;
pub const PRODUCER_NAME: &str = "sieve";
pub const DEFAULT_OPSET: i64 = 15;
/// `ReduceLogSumExp` takes `axes` as an attribute only in this range.
pub const MIN_OPSET: i64 = 13;
pub const MAX_OPSET: i64 = 17;
pub const ML_OPSET: i64 = 1;
pub const MS_OPSET: i64 = 1;

pub const OUTPUT_LABEL: &str = "output_label";
pub const OUTPUT_PROBABILITY: &str = "output_probability";

const BATCH_DIM: &str = "N";

// Intermediate tensor names.
const LOWERED: &str = "lowered";
const TOKENS: &str = "tokens";
const TERM_FREQUENCY: &str = "term_frequency";
const IDF: &str = "idf";
const TFIDF: &str = "tfidf";
const FEATURES: &str = "features";
const FEATURE_LOG_PROB: &str = "feature_log_prob_t";
const CLASS_LOG_PRIOR: &str = "class_log_prior";
const WEIGHTED: &str = "weighted";
const JOINT_LOG_LIKELIHOOD: &str = "joint_log_likelihood";
const LABEL_INDEX: &str = "label_index";
const CLASSES: &str = "classes";
const LABEL_2D: &str = "label_2d";
const FLAT_SHAPE: &str = "flat_shape";
const LOG_NORM: &str = "log_norm";
const LOG_PROBABILITY: &str = "log_probability";
const PROBABILITY_TENSOR: &str = "probability_tensor";

const RESERVED_NAMES: &[&str] = &[
    LOWERED,
    TOKENS,
    TERM_FREQUENCY,
    IDF,
    TFIDF,
    FEATURES,
    FEATURE_LOG_PROB,
    CLASS_LOG_PRIOR,
    WEIGHTED,
    JOINT_LOG_LIKELIHOOD,
    LABEL_INDEX,
    CLASSES,
    LABEL_2D,
    FLAT_SHAPE,
    LOG_NORM,
    LOG_PROBABILITY,
    PROBABILITY_TENSOR,
    OUTPUT_LABEL,
    OUTPUT_PROBABILITY,
];

/// Export configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Name of the graph's string input.
    pub input_name: String,
    /// Version of the default `ai.onnx` operator set.
    pub target_opset: i64,
    /// Emit probabilities as `seq(map(string, float))` instead of a
    /// `[N, classes]` float tensor.
    pub zipmap: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            input_name: "input".into(),
            target_opset: DEFAULT_OPSET,
            zipmap: true,
        }
    }
}

impl ExportOptions {
    pub fn validate(&self) -> Result<()> {
        if self.input_name.is_empty() {
            return Err(SieveError::Conversion("input name must not be empty".into()));
        }
        if RESERVED_NAMES.contains(&self.input_name.as_str()) {
            return Err(SieveError::Conversion(format!(
                "input name `{}` collides with a graph tensor name",
                self.input_name
            )));
        }
        if !(MIN_OPSET..=MAX_OPSET).contains(&self.target_opset) {
            return Err(SieveError::Conversion(format!(
                "target opset {} is not supported (expected {MIN_OPSET}..={MAX_OPSET})",
                self.target_opset
            )));
        }
        Ok(())
    }
}

/// Build the ONNX model for a fitted pipeline.
///
/// # Errors
/// `SieveError::Conversion` for unsupported export options or learned
/// parameters that cannot be stored as finite `float32` values.
pub fn to_onnx(pipeline: &Pipeline, options: &ExportOptions) -> Result<ModelProto> {
    options.validate()?;

    let vectorizer = pipeline.vectorizer();
    let classifier = pipeline.classifier();
    let classes = pipeline.classes();
    let n_features = vectorizer.num_features();
    let n_classes = classes.len();

    let mut g = GraphBuilder::new();
    g.input(
        &options.input_name,
        tensor_type(DataType::String, &[Dim::Symbolic(BATCH_DIM)]),
    );

    // Text -> term frequencies.
    let mut current: &str = &options.input_name;
    if vectorizer.params().lowercase {
        g.node(
            "StringNormalizer",
            "",
            "lowercase",
            &[current],
            &[LOWERED],
            vec![
                attr_string("case_change_action", "LOWER"),
                attr_int("is_case_sensitive", 0),
            ],
        );
        current = LOWERED;
    }

    g.node(
        "Tokenizer",
        MS_DOMAIN,
        "tokenize",
        &[current],
        &[TOKENS],
        vec![
            attr_int("mark", 0),
            attr_int("mincharnum", 1),
            attr_string("pad_value", "#"),
            attr_string("tokenexp", TOKEN_PATTERN),
        ],
    );

    g.node(
        "TfIdfVectorizer",
        "",
        "count_terms",
        &[TOKENS],
        &[TERM_FREQUENCY],
        vec![
            attr_int("max_gram_length", 1),
            attr_int("max_skip_count", 0),
            attr_int("min_gram_length", 1),
            attr_string("mode", "TF"),
            attr_ints("ngram_counts", vec![0]),
            attr_ints("ngram_indexes", (0..n_features as i64).collect()),
            attr_strings("pool_strings", vectorizer.terms()),
        ],
    );
    current = TERM_FREQUENCY;

    if let Some(idf) = vectorizer.idf() {
        g.float_initializer(IDF, vec![n_features as i64], to_f32(IDF, idf)?);
        g.node("Mul", "", "apply_idf", &[current, IDF], &[TFIDF], vec![]);
        current = TFIDF;
    }

    if let Some(norm) = vectorizer.params().norm {
        g.node(
            "Normalizer",
            ML_DOMAIN,
            "normalize_rows",
            &[current],
            &[FEATURES],
            vec![attr_string("norm", norm.as_onnx_str())],
        );
        current = FEATURES;
    }

    // Features -> joint log-likelihood.
    let mut weights = Vec::with_capacity(n_features * n_classes);
    for feature in 0..n_features {
        for class_log_prob in classifier.feature_log_prob() {
            weights.push(class_log_prob[feature]);
        }
    }
    g.float_initializer(
        FEATURE_LOG_PROB,
        vec![n_features as i64, n_classes as i64],
        to_f32(FEATURE_LOG_PROB, &weights)?,
    );
    g.float_initializer(
        CLASS_LOG_PRIOR,
        vec![n_classes as i64],
        to_f32(CLASS_LOG_PRIOR, classifier.class_log_prior())?,
    );
    g.node(
        "MatMul",
        "",
        "class_scores",
        &[current, FEATURE_LOG_PROB],
        &[WEIGHTED],
        vec![],
    );
    g.node(
        "Add",
        "",
        "add_prior",
        &[WEIGHTED, CLASS_LOG_PRIOR],
        &[JOINT_LOG_LIKELIHOOD],
        vec![],
    );

    // Joint log-likelihood -> label.
    g.string_initializer(CLASSES, classes);
    g.int64_initializer(FLAT_SHAPE, vec![1], vec![-1]);
    g.node(
        "ArgMax",
        "",
        "best_class",
        &[JOINT_LOG_LIKELIHOOD],
        &[LABEL_INDEX],
        vec![attr_int("axis", 1), attr_int("keepdims", 0)],
    );
    g.node(
        "ArrayFeatureExtractor",
        ML_DOMAIN,
        "lookup_label",
        &[CLASSES, LABEL_INDEX],
        &[LABEL_2D],
        vec![],
    );
    g.node(
        "Reshape",
        "",
        "flatten_label",
        &[LABEL_2D, FLAT_SHAPE],
        &[OUTPUT_LABEL],
        vec![],
    );

    // Joint log-likelihood -> probabilities.
    g.node(
        "ReduceLogSumExp",
        "",
        "log_normalizer",
        &[JOINT_LOG_LIKELIHOOD],
        &[LOG_NORM],
        vec![attr_ints("axes", vec![1]), attr_int("keepdims", 1)],
    );
    g.node(
        "Sub",
        "",
        "normalize_log_probability",
        &[JOINT_LOG_LIKELIHOOD, LOG_NORM],
        &[LOG_PROBABILITY],
        vec![],
    );

    g.output(
        OUTPUT_LABEL,
        tensor_type(DataType::String, &[Dim::Symbolic(BATCH_DIM)]),
    );
    if options.zipmap {
        g.node(
            "Exp",
            "",
            "probability",
            &[LOG_PROBABILITY],
            &[PROBABILITY_TENSOR],
            vec![],
        );
        g.node(
            "ZipMap",
            ML_DOMAIN,
            "zip_classes",
            &[PROBABILITY_TENSOR],
            &[OUTPUT_PROBABILITY],
            vec![attr_strings("classlabels_strings", classes)],
        );
        g.output(
            OUTPUT_PROBABILITY,
            sequence_of_map_type(DataType::String, DataType::Float),
        );
    } else {
        g.node(
            "Exp",
            "",
            "probability",
            &[LOG_PROBABILITY],
            &[OUTPUT_PROBABILITY],
            vec![],
        );
        g.output(
            OUTPUT_PROBABILITY,
            tensor_type(
                DataType::Float,
                &[Dim::Symbolic(BATCH_DIM), Dim::Fixed(n_classes as i64)],
            ),
        );
    }

    debug!(
        features = n_features,
        classes = n_classes,
        opset = options.target_opset,
        zipmap = options.zipmap,
        "Built ONNX graph"
    );

    Ok(ModelProto {
        ir_version: Some(IR_VERSION),
        opset_import: vec![
            opset("", options.target_opset),
            opset(ML_DOMAIN, ML_OPSET),
            opset(MS_DOMAIN, MS_OPSET),
        ],
        producer_name: Some(PRODUCER_NAME.into()),
        producer_version: Some(env!("CARGO_PKG_VERSION").into()),
        domain: None,
        model_version: Some(1),
        doc_string: Some("TF-IDF + multinomial Naive Bayes text classifier".into()),
        graph: Some(g.build("sieve_pipeline")),
    })
}

/// Serialize a model to protobuf bytes.
pub fn encode(model: &ModelProto) -> Vec<u8> {
    model.encode_to_vec()
}

/// Write a model to `path`, replacing any existing file.
pub fn write_model<P: AsRef<Path>>(model: &ModelProto, path: P) -> Result<()> {
    let path = path.as_ref();
    let bytes = encode(model);
    fs::write(path, &bytes)?;
    info!(path = %path.display(), bytes = bytes.len(), "Wrote ONNX model");
    Ok(())
}

fn opset(domain: &str, version: i64) -> OperatorSetIdProto {
    OperatorSetIdProto {
        domain: Some(domain.to_owned()),
        version: Some(version),
    }
}

fn to_f32(name: &str, values: &[f64]) -> Result<Vec<f32>> {
    values
        .iter()
        .map(|&v| {
            let narrowed = v as f32;
            if narrowed.is_finite() {
                Ok(narrowed)
            } else {
                Err(SieveError::Conversion(format!(
                    "`{name}` contains a value ({v}) not representable as float32"
                )))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SampleTable;
    use crate::export::onnx::{AttributeProto, GraphProto, TensorProto, type_proto};
    use crate::pipeline::PipelineParams;
    use crate::vectorizer::VectorizerParams;
    use ort::session::Session;
    use ort::value::Tensor;

    const CORPUS: [(&str, &str); 5] = [
        ("Claim your FREE prize now", "spam"),
        ("Cheap watches, buy today", "spam"),
        ("Lunch tomorrow?", "ham"),
        ("Please send the report", "ham"),
        ("Your parcel is waiting", "phish"),
    ];

    fn fitted(params: &PipelineParams) -> Pipeline {
        let table = SampleTable::from_pairs(CORPUS);
        Pipeline::fit_table(&table, params).unwrap()
    }

    /// Training texts followed by one text the pipeline has not seen.
    fn runtime_texts() -> Vec<&'static str> {
        let mut texts: Vec<_> = CORPUS.iter().map(|(text, _)| *text).collect();
        texts.push("Free watches with your lunch parcel");
        texts
    }

    /// Writes the export to disk and loads it back into ONNX Runtime.
    ///
    /// The runtime library is loaded dynamically from `ORT_DYLIB_PATH`; without
    /// it there is nothing to run against and this returns `None`.
    fn runtime_session(pipeline: &Pipeline, options: &ExportOptions) -> Option<Session> {
        if std::env::var_os("ORT_DYLIB_PATH").is_none() {
            eprintln!("ORT_DYLIB_PATH is not set, skipping the ONNX Runtime run");
            return None;
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filter.onnx");
        write_model(&to_onnx(pipeline, options).unwrap(), &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        Some(Session::builder().unwrap().commit_from_memory(&bytes).unwrap())
    }

    fn string_input(texts: &[&str]) -> Tensor<String> {
        let data: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
        Tensor::from_string_array((vec![texts.len()], &data[..])).unwrap()
    }

    fn graph(model: &ModelProto) -> &GraphProto {
        model.graph.as_ref().unwrap()
    }

    fn op_types(model: &ModelProto) -> Vec<&str> {
        graph(model)
            .node
            .iter()
            .filter_map(|n| n.op_type.as_deref())
            .collect()
    }

    fn initializer<'a>(model: &'a ModelProto, name: &str) -> &'a TensorProto {
        graph(model)
            .initializer
            .iter()
            .find(|t| t.name.as_deref() == Some(name))
            .unwrap()
    }

    fn attribute<'a>(model: &'a ModelProto, op: &str, name: &str) -> &'a AttributeProto {
        graph(model)
            .node
            .iter()
            .find(|n| n.op_type.as_deref() == Some(op))
            .unwrap()
            .attribute
            .iter()
            .find(|a| a.name.as_deref() == Some(name))
            .unwrap()
    }

    #[test]
    fn default_graph_layout() {
        let model =
            to_onnx(&fitted(&PipelineParams::default()), &ExportOptions::default()).unwrap();

        assert_eq!(
            op_types(&model),
            [
                "StringNormalizer",
                "Tokenizer",
                "TfIdfVectorizer",
                "Mul",
                "Normalizer",
                "MatMul",
                "Add",
                "ArgMax",
                "ArrayFeatureExtractor",
                "Reshape",
                "ReduceLogSumExp",
                "Sub",
                "Exp",
                "ZipMap",
            ]
        );

        let g = graph(&model);
        assert_eq!(g.input.len(), 1);
        assert_eq!(g.input[0].name.as_deref(), Some("input"));
        let outputs: Vec<_> = g.output.iter().filter_map(|o| o.name.as_deref()).collect();
        assert_eq!(outputs, [OUTPUT_LABEL, OUTPUT_PROBABILITY]);

        assert_eq!(model.ir_version, Some(IR_VERSION));
        assert_eq!(model.producer_name.as_deref(), Some(PRODUCER_NAME));
        let opsets: Vec<_> = model
            .opset_import
            .iter()
            .map(|o| (o.domain.as_deref().unwrap(), o.version.unwrap()))
            .collect();
        assert_eq!(opsets, [("", 15), (ML_DOMAIN, 1), (MS_DOMAIN, 1)]);
    }

    #[test]
    fn label_table_holds_training_classes() {
        let pipeline = fitted(&PipelineParams::default());
        let model = to_onnx(&pipeline, &ExportOptions::default()).unwrap();

        let labels: Vec<String> = initializer(&model, CLASSES)
            .string_data
            .iter()
            .map(|b| String::from_utf8(b.clone()).unwrap())
            .collect();
        assert_eq!(labels, ["ham", "phish", "spam"]);
        assert_eq!(labels, pipeline.classes());

        let zipmap = attribute(&model, "ZipMap", "classlabels_strings");
        assert_eq!(zipmap.strings.len(), 3);
    }

    #[test]
    fn vocabulary_and_weights_are_embedded() {
        let pipeline = fitted(&PipelineParams::default());
        let model = to_onnx(&pipeline, &ExportOptions::default()).unwrap();
        let vectorizer = pipeline.vectorizer();
        let classifier = pipeline.classifier();

        let pool = attribute(&model, "TfIdfVectorizer", "pool_strings");
        let pool: Vec<&[u8]> = pool.strings.iter().map(Vec::as_slice).collect();
        let terms: Vec<&[u8]> = vectorizer.terms().iter().map(|t| t.as_bytes()).collect();
        assert_eq!(pool, terms);
        assert!(!terms.contains(&b"your".as_slice()));

        let idf = initializer(&model, IDF);
        let expected: Vec<f32> = vectorizer.idf().unwrap().iter().map(|&v| v as f32).collect();
        assert_eq!(idf.float_data.len(), vectorizer.num_features());
        assert_eq!(idf.float_data, expected);

        let weights = initializer(&model, FEATURE_LOG_PROB);
        let n_classes = pipeline.classes().len();
        assert_eq!(
            weights.dims,
            [vectorizer.num_features() as i64, n_classes as i64]
        );
        // Row-major [feature][class].
        let expected = classifier.feature_log_prob()[2][1] as f32;
        assert_eq!(weights.float_data[n_classes + 2], expected);

        let keepdims = attribute(&model, "ArgMax", "keepdims");
        assert_eq!(keepdims.i, Some(0));
    }

    #[test]
    fn optional_stages_follow_vectorizer_params() {
        let params = PipelineParams {
            vectorizer: VectorizerParams {
                lowercase: false,
                use_idf: false,
                norm: None,
                ..Default::default()
            },
            ..Default::default()
        };
        let model = to_onnx(&fitted(&params), &ExportOptions::default()).unwrap();
        let ops = op_types(&model);

        assert_eq!(ops[0], "Tokenizer");
        assert!(!ops.contains(&"Mul"));
        assert!(!ops.contains(&"Normalizer"));
        assert_eq!(graph(&model).node[0].input, ["input"]);
    }

    #[test]
    fn raw_probability_tensor_without_zipmap() {
        let options = ExportOptions {
            zipmap: false,
            ..Default::default()
        };
        let model = to_onnx(&fitted(&PipelineParams::default()), &options).unwrap();

        assert_eq!(op_types(&model).last(), Some(&"Exp"));
        let output = &graph(&model).output[1];
        let ty = output.r#type.as_ref().and_then(|t| t.value.as_ref());
        let Some(type_proto::Value::TensorType(tensor)) = ty else {
            panic!("expected a tensor output, got {ty:?}");
        };
        assert_eq!(tensor.elem_type, Some(DataType::Float as i32));
        assert_eq!(tensor.shape.as_ref().unwrap().dim.len(), 2);
    }

    #[test]
    fn export_is_byte_identical() {
        let export = || {
            let pipeline = fitted(&PipelineParams::default());
            encode(&to_onnx(&pipeline, &ExportOptions::default()).unwrap())
        };
        assert_eq!(export(), export());
    }

    #[test]
    fn unsupported_options_are_conversion_errors() {
        let pipeline = fitted(&PipelineParams::default());
        for opset in [12, 18] {
            let options = ExportOptions {
                target_opset: opset,
                ..Default::default()
            };
            assert!(matches!(
                to_onnx(&pipeline, &options),
                Err(SieveError::Conversion(_))
            ));
        }

        for name in ["", "tokens", OUTPUT_LABEL] {
            let options = ExportOptions {
                input_name: name.into(),
                ..Default::default()
            };
            assert!(matches!(
                to_onnx(&pipeline, &options),
                Err(SieveError::Conversion(_))
            ));
        }
    }

    #[test]
    fn custom_input_name_feeds_first_node() {
        let options = ExportOptions {
            input_name: "text".into(),
            target_opset: 13,
            ..Default::default()
        };
        let model = to_onnx(&fitted(&PipelineParams::default()), &options).unwrap();
        assert_eq!(graph(&model).input[0].name.as_deref(), Some("text"));
        assert_eq!(graph(&model).node[0].input, ["text"]);
        assert_eq!(model.opset_import[0].version, Some(13));
    }

    #[test]
    fn written_file_decodes_to_same_model() {
        let model =
            to_onnx(&fitted(&PipelineParams::default()), &ExportOptions::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filter.onnx");

        write_model(&model, &path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(ModelProto::decode(bytes.as_slice()).unwrap(), model);
    }

    #[test]
    fn runtime_labels_match_native_predictions() {
        let pipeline = fitted(&PipelineParams::default());
        let options = ExportOptions::default();
        let Some(mut session) = runtime_session(&pipeline, &options) else {
            return;
        };
        let texts = runtime_texts();

        let outputs = session
            .run(ort::inputs![options.input_name.as_str() => string_input(&texts)])
            .unwrap();
        let (_, labels) = outputs[OUTPUT_LABEL].try_extract_strings().unwrap();

        assert_eq!(labels, pipeline.predict(&texts).unwrap());
        assert!(labels.iter().all(|l| pipeline.classes().contains(l)));
    }

    #[test]
    fn runtime_probabilities_match_native() {
        let pipeline = fitted(&PipelineParams::default());
        // Same graph as the default export up to the final ZipMap.
        let options = ExportOptions {
            zipmap: false,
            ..Default::default()
        };
        let Some(mut session) = runtime_session(&pipeline, &options) else {
            return;
        };
        let texts = runtime_texts();

        let outputs = session
            .run(ort::inputs![options.input_name.as_str() => string_input(&texts)])
            .unwrap();
        let (_, labels) = outputs[OUTPUT_LABEL].try_extract_strings().unwrap();
        let (_, probabilities) = outputs[OUTPUT_PROBABILITY]
            .try_extract_tensor::<f32>()
            .unwrap();

        let n_classes = pipeline.classes().len();
        let expected = pipeline.predict_proba(&texts).unwrap();
        assert_eq!(labels, pipeline.predict(&texts).unwrap());
        assert_eq!(probabilities.len(), texts.len() * n_classes);
        for (row, native) in probabilities.chunks(n_classes).zip(&expected) {
            for (&p, &q) in row.iter().zip(native) {
                assert!((f64::from(p) - q).abs() < 1e-4, "runtime {p}, native {q}");
            }
        }
    }

    #[test]
    fn non_finite_weights_are_rejected() {
        let err = to_f32("weights", &[0.0, f64::NEG_INFINITY]).unwrap_err();
        assert!(matches!(err, SieveError::Conversion(_)));
        assert!(to_f32("weights", &[f64::MAX]).is_err());
    }
}
