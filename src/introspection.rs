//! Narrow query interface between the report printer and a loaded graph
//!
//! Mirrors the shape of a runtime introspection API: operations are walked with
//! an opaque cursor and every tensor query that can fail returns a `Result`.

use crate::error::TensorQueryError;

/// Position of an operation in the graph's traversal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpId(pub usize);

/// An input slot of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Input {
    pub op: OpId,
    pub index: usize,
}

/// An output slot of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Output {
    pub op: OpId,
    pub index: usize,
}

pub trait GraphIntrospection {
    /// Returns the operation at `cursor` and advances it, or `None` once the
    /// traversal is exhausted.
    fn next_operation(&self, cursor: &mut usize) -> Option<OpId>;

    fn operation_name(&self, op: OpId) -> &str;

    fn operation_op_type(&self, op: OpId) -> &str;

    /// Assigned device; empty when unassigned.
    fn operation_device(&self, op: OpId) -> &str;

    fn operation_num_inputs(&self, op: OpId) -> usize;

    fn operation_num_outputs(&self, op: OpId) -> usize;

    /// Element type tag of the tensor consumed at `input`.
    fn operation_input_type(&self, input: Input) -> i32;

    /// Element type tag of the tensor produced at `output`.
    fn operation_output_type(&self, output: Output) -> i32;

    fn tensor_num_dims(&self, output: Output) -> Result<usize, TensorQueryError>;

    /// Dimension sizes of `output`; `num_dims` must match its rank.
    fn tensor_shape(&self, output: Output, num_dims: usize)
        -> Result<Vec<i64>, TensorQueryError>;
}
