use std::path::PathBuf;

use thiserror::Error;

/// Failures that prevent a graph from being loaded.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode GraphDef: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("unsupported GraphDef version: {reason}")]
    UnsupportedVersion { reason: String },

    #[error("node #{index} has an empty name")]
    EmptyNodeName { index: usize },

    #[error("duplicate node name '{name}'")]
    DuplicateNode { name: String },

    #[error("node '{node}' has malformed input '{input}'")]
    MalformedInput { node: String, input: String },

    #[error("node '{node}' references unknown input '{input}'")]
    UnknownInput { node: String, input: String },

    #[error("node '{node}' input '{input}' refers to output {slot} of '{producer}', which has {num_outputs} outputs")]
    InvalidInputSlot {
        node: String,
        input: String,
        producer: String,
        slot: usize,
        num_outputs: usize,
    },

    #[error("graph contains a cycle through node '{node}'")]
    Cycle { node: String },

    #[error("node '{node}' is missing attribute '{attr}'")]
    MissingAttr { node: String, attr: String },

    #[error("node '{node}' has invalid attribute '{attr}': {reason}")]
    InvalidAttr {
        node: String,
        attr: String,
        reason: String,
    },

    #[error("Shape inference failed: {reason}")]
    ShapeInferenceFailed { reason: String },

    #[error("invalid op registry: {0}")]
    Registry(#[from] serde_json::Error),
}

/// Failure of a single tensor introspection query. These never abort a report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TensorQueryError {
    #[error("operation {op} has {count} outputs, requested output {index}")]
    OutOfRange { op: usize, index: usize, count: usize },

    #[error("tensor rank is unknown")]
    UnknownRank,

    #[error("expected {expected} dimensions but the tensor has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}
