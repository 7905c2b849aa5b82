//! Loan approval classifiers.
//!
//! [`LoanClassifier`] is the seam between request handling and the trained
//! model. [`GbdtClassifier`] evaluates a gradient-boosted tree ensemble
//! exported to JSON from the offline training pipeline.

use crate::features::{
    FeatureRecord, FeatureValue, ScoreScale, CATEGORICAL_FEATURES, FEATURE_COUNT, FEATURE_NAMES,
};
use crate::models::Decision;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;

/// Code given to a categorical value the model never saw during training.
pub const UNKNOWN_CATEGORY_CODE: f64 = -1.0;

#[derive(Debug, Clone, PartialEq)]
pub enum ClassifierError {
    /// The artifact could not be read.
    Io(String),
    /// The artifact is not a usable model.
    InvalidArtifact(String),
    /// A record does not match the model's feature schema.
    SchemaMismatch(String),
    /// Evaluation failed for this record.
    Inference(String),
}

impl fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassifierError::Io(msg) => write!(f, "Model artifact I/O error: {}", msg),
            ClassifierError::InvalidArtifact(msg) => write!(f, "Invalid model artifact: {}", msg),
            ClassifierError::SchemaMismatch(msg) => write!(f, "Feature schema mismatch: {}", msg),
            ClassifierError::Inference(msg) => write!(f, "Inference failed: {}", msg),
        }
    }
}

impl std::error::Error for ClassifierError {}

/// Binary loan approval model.
pub trait LoanClassifier: Send + Sync {
    /// Approve or reject.
    fn predict(&self, record: &FeatureRecord) -> Result<Decision, ClassifierError>;

    /// `[p_rejected, p_approved]`, summing to 1.
    fn predict_probability(&self, record: &FeatureRecord) -> Result<[f64; 2], ClassifierError>;

    fn name(&self) -> &str;

    fn version(&self) -> &str;

    /// Payment-score scale the model was trained with, when it declares one.
    fn payment_score_scale(&self) -> Option<ScoreScale> {
        None
    }

    /// Decision and probabilities together. Override when both come from
    /// the same evaluation.
    fn classify(&self, record: &FeatureRecord) -> Result<(Decision, [f64; 2]), ClassifierError> {
        Ok((self.predict(record)?, self.predict_probability(record)?))
    }
}

// ============ Artifact Format ============

/// A tree node as stored in the artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeSpec {
    /// `feature <= threshold` goes to `left`, otherwise `right`.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        leaf: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeSpec {
    /// Root first; children always follow their parent.
    pub nodes: Vec<NodeSpec>,
}

/// JSON export of a fitted boosting pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GbdtArtifact {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub payment_score_scale: Option<ScoreScale>,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    pub feature_names: Vec<String>,
    /// Training-time category list per categorical column; a value is
    /// encoded as its index in the list.
    #[serde(default)]
    pub categorical: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub base_score: f64,
    pub trees: Vec<TreeSpec>,
}

fn default_threshold() -> f64 {
    0.5
}

fn invalid<T>(msg: String) -> Result<T, ClassifierError> {
    Err(ClassifierError::InvalidArtifact(msg))
}

// ============ Evaluator ============

/// Gradient-boosted decision tree classifier.
///
/// Probability of approval is `sigmoid(base_score + sum of leaves)`.
#[derive(Debug, Clone)]
pub struct GbdtClassifier {
    name: String,
    version: String,
    payment_score_scale: Option<ScoreScale>,
    threshold: f64,
    base_score: f64,
    trees: Vec<TreeSpec>,
    /// Indexed by feature position; `None` for numeric features.
    category_codes: Vec<Option<HashMap<String, f64>>>,
}

impl GbdtClassifier {
    /// Reads and validates an artifact from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ClassifierError::Io(format!("{}: {}", path.display(), e)))?;
        let classifier = Self::from_json_str(&raw)?;
        tracing::info!(
            "Loaded model '{}' v{} from {} ({} trees)",
            classifier.name,
            classifier.version,
            path.display(),
            classifier.trees.len()
        );
        Ok(classifier)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ClassifierError> {
        let artifact: GbdtArtifact = serde_json::from_str(raw)
            .map_err(|e| ClassifierError::InvalidArtifact(format!("malformed JSON: {}", e)))?;
        Self::from_artifact(artifact)
    }

    /// Validates an artifact and prepares it for evaluation.
    ///
    /// Rejects artifacts whose feature list differs from [`FEATURE_NAMES`],
    /// whose splits reference unknown features, or whose child links could
    /// loop or leave the tree.
    pub fn from_artifact(artifact: GbdtArtifact) -> Result<Self, ClassifierError> {
        if artifact.feature_names.len() != FEATURE_COUNT
            || artifact
                .feature_names
                .iter()
                .zip(FEATURE_NAMES.iter())
                .any(|(a, b)| a.as_str() != *b)
        {
            return invalid(format!(
                "feature_names must list the {} model columns in training order",
                FEATURE_COUNT
            ));
        }

        if !(artifact.threshold > 0.0 && artifact.threshold < 1.0) {
            return invalid(format!(
                "threshold must be in (0, 1), got {}",
                artifact.threshold
            ));
        }
        if !artifact.base_score.is_finite() {
            return invalid("base_score must be finite".to_string());
        }
        if artifact.trees.is_empty() {
            return invalid("model has no trees".to_string());
        }

        for (t, tree) in artifact.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                return invalid(format!("tree {} has no nodes", t));
            }
            for (i, node) in tree.nodes.iter().enumerate() {
                match node {
                    NodeSpec::Split {
                        feature,
                        threshold,
                        left,
                        right,
                    } => {
                        if *feature >= FEATURE_COUNT {
                            return invalid(format!(
                                "tree {} node {} splits on unknown feature {}",
                                t, i, feature
                            ));
                        }
                        if !threshold.is_finite() {
                            return invalid(format!(
                                "tree {} node {} has a non-finite threshold",
                                t, i
                            ));
                        }
                        for child in [left, right] {
                            if *child <= i || *child >= tree.nodes.len() {
                                return invalid(format!(
                                    "tree {} node {} has child {} outside ({}, {})",
                                    t,
                                    i,
                                    child,
                                    i,
                                    tree.nodes.len()
                                ));
                            }
                        }
                    }
                    NodeSpec::Leaf { leaf } => {
                        if !leaf.is_finite() {
                            return invalid(format!("tree {} node {} has a non-finite leaf", t, i));
                        }
                    }
                }
            }
        }

        let mut category_codes: Vec<Option<HashMap<String, f64>>> = vec![None; FEATURE_COUNT];
        for (column, values) in &artifact.categorical {
            if !CATEGORICAL_FEATURES.contains(&column.as_str()) {
                return invalid(format!("'{}' is not a categorical feature", column));
            }
            let index = FEATURE_NAMES
                .iter()
                .position(|n| n == column)
                .ok_or_else(|| ClassifierError::InvalidArtifact(column.clone()))?;
            let codes = values
                .iter()
                .enumerate()
                .map(|(code, value)| (value.clone(), code as f64))
                .collect();
            category_codes[index] = Some(codes);
        }

        Ok(Self {
            name: artifact.name,
            version: artifact.version,
            payment_score_scale: artifact.payment_score_scale,
            threshold: artifact.threshold,
            base_score: artifact.base_score,
            trees: artifact.trees,
            category_codes,
        })
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    /// Numeric encoding of a record, in feature order.
    fn encode(&self, record: &FeatureRecord) -> Result<Vec<f64>, ClassifierError> {
        if record.len() != FEATURE_COUNT {
            return Err(ClassifierError::SchemaMismatch(format!(
                "expected {} features, got {}",
                FEATURE_COUNT,
                record.len()
            )));
        }

        record
            .iter()
            .enumerate()
            .map(|(i, (name, value))| match value {
                FeatureValue::Number(v) if v.is_finite() => Ok(*v),
                FeatureValue::Number(_) => Err(ClassifierError::Inference(format!(
                    "feature '{}' is not a finite number",
                    name
                ))),
                FeatureValue::Category(c) => Ok(self.category_codes[i]
                    .as_ref()
                    .and_then(|codes| codes.get(*c).copied())
                    .unwrap_or(UNKNOWN_CATEGORY_CODE)),
            })
            .collect()
    }

    fn eval_tree(tree: &TreeSpec, features: &[f64]) -> Result<f64, ClassifierError> {
        let mut idx = 0usize;
        loop {
            match tree.nodes.get(idx) {
                Some(NodeSpec::Leaf { leaf }) => return Ok(*leaf),
                Some(NodeSpec::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let value = features.get(*feature).ok_or_else(|| {
                        ClassifierError::Inference(format!("feature index {} out of range", feature))
                    })?;
                    idx = if *value <= *threshold { *left } else { *right };
                }
                None => {
                    return Err(ClassifierError::Inference(format!(
                        "node {} out of range",
                        idx
                    )))
                }
            }
        }
    }

    /// Raw boosted score before the sigmoid.
    pub fn margin(&self, record: &FeatureRecord) -> Result<f64, ClassifierError> {
        let features = self.encode(record)?;
        let mut sum = self.base_score;
        for tree in &self.trees {
            sum += Self::eval_tree(tree, &features)?;
        }
        Ok(sum)
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

impl GbdtClassifier {
    fn decide(&self, probabilities: [f64; 2]) -> Decision {
        if probabilities[1] >= self.threshold {
            Decision::Approved
        } else {
            Decision::Rejected
        }
    }
}

impl LoanClassifier for GbdtClassifier {
    fn predict(&self, record: &FeatureRecord) -> Result<Decision, ClassifierError> {
        Ok(self.decide(self.predict_probability(record)?))
    }

    fn classify(&self, record: &FeatureRecord) -> Result<(Decision, [f64; 2]), ClassifierError> {
        let probabilities = self.predict_probability(record)?;
        Ok((self.decide(probabilities), probabilities))
    }

    fn predict_probability(&self, record: &FeatureRecord) -> Result<[f64; 2], ClassifierError> {
        let p1 = sigmoid(self.margin(record)?);
        Ok([1.0 - p1, p1])
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn payment_score_scale(&self) -> Option<ScoreScale> {
        self.payment_score_scale
    }
}
