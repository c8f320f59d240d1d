use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::TensorQueryError;
use crate::introspection::{GraphIntrospection, Input, OpId, Output};
use crate::shape_inference::Shape;

/// Tag of `DT_INVALID`, also reported for slots that do not exist.
pub const DT_INVALID: i32 = 0;

/// TensorFlow encodes reference types as the base tag plus this offset.
pub const REF_TYPE_OFFSET: i32 = 100;

/// Element types known to the TensorFlow runtime, numbered as in `types.proto`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    #[serde(rename = "DT_FLOAT")]
    Float = 1,
    #[serde(rename = "DT_DOUBLE")]
    Double = 2,
    #[serde(rename = "DT_INT32")]
    Int32 = 3,
    #[serde(rename = "DT_UINT8")]
    Uint8 = 4,
    #[serde(rename = "DT_INT16")]
    Int16 = 5,
    #[serde(rename = "DT_INT8")]
    Int8 = 6,
    #[serde(rename = "DT_STRING")]
    String = 7,
    #[serde(rename = "DT_COMPLEX64")]
    Complex64 = 8,
    #[serde(rename = "DT_INT64")]
    Int64 = 9,
    #[serde(rename = "DT_BOOL")]
    Bool = 10,
    #[serde(rename = "DT_QINT8")]
    Qint8 = 11,
    #[serde(rename = "DT_QUINT8")]
    Quint8 = 12,
    #[serde(rename = "DT_QINT32")]
    Qint32 = 13,
    #[serde(rename = "DT_BFLOAT16")]
    Bfloat16 = 14,
    #[serde(rename = "DT_QINT16")]
    Qint16 = 15,
    #[serde(rename = "DT_QUINT16")]
    Quint16 = 16,
    #[serde(rename = "DT_UINT16")]
    Uint16 = 17,
    #[serde(rename = "DT_COMPLEX128")]
    Complex128 = 18,
    #[serde(rename = "DT_HALF")]
    Half = 19,
    #[serde(rename = "DT_RESOURCE")]
    Resource = 20,
    #[serde(rename = "DT_VARIANT")]
    Variant = 21,
    #[serde(rename = "DT_UINT32")]
    Uint32 = 22,
    #[serde(rename = "DT_UINT64")]
    Uint64 = 23,
}

impl DataType {
    pub const ALL: [DataType; 23] = [
        DataType::Float,
        DataType::Double,
        DataType::Int32,
        DataType::Uint8,
        DataType::Int16,
        DataType::Int8,
        DataType::String,
        DataType::Complex64,
        DataType::Int64,
        DataType::Bool,
        DataType::Qint8,
        DataType::Quint8,
        DataType::Qint32,
        DataType::Bfloat16,
        DataType::Qint16,
        DataType::Quint16,
        DataType::Uint16,
        DataType::Complex128,
        DataType::Half,
        DataType::Resource,
        DataType::Variant,
        DataType::Uint32,
        DataType::Uint64,
    ];

    pub fn tag(self) -> i32 {
        self as i32
    }

    pub fn from_tag(tag: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|dt| dt.tag() == tag)
    }

    pub fn type_name(self) -> &'static str {
        match self {
            DataType::Float => "TF_FLOAT",
            DataType::Double => "TF_DOUBLE",
            DataType::Int32 => "TF_INT32",
            DataType::Uint8 => "TF_UINT8",
            DataType::Int16 => "TF_INT16",
            DataType::Int8 => "TF_INT8",
            DataType::String => "TF_STRING",
            DataType::Complex64 => "TF_COMPLEX64",
            DataType::Int64 => "TF_INT64",
            DataType::Bool => "TF_BOOL",
            DataType::Qint8 => "TF_QINT8",
            DataType::Quint8 => "TF_QUINT8",
            DataType::Qint32 => "TF_QINT32",
            DataType::Bfloat16 => "TF_BFLOAT16",
            DataType::Qint16 => "TF_QINT16",
            DataType::Quint16 => "TF_QUINT16",
            DataType::Uint16 => "TF_UINT16",
            DataType::Complex128 => "TF_COMPLEX128",
            DataType::Half => "TF_HALF",
            DataType::Resource => "TF_RESOURCE",
            DataType::Variant => "TF_VARIANT",
            DataType::Uint32 => "TF_UINT32",
            DataType::Uint64 => "TF_UINT64",
        }
    }
}

/// Display name for an element type tag; `"Unknown"` for anything unrecognized.
pub fn type_name_of(tag: i32) -> &'static str {
    DataType::from_tag(tag)
        .map(DataType::type_name)
        .unwrap_or("Unknown")
}

/// Element type and static shape of one output slot.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorSignature {
    pub dtype: i32,
    pub shape: Shape,
}

#[derive(Debug, Clone)]
pub struct Operation {
    pub name: String,
    pub op_type: String,
    pub device: String,
    /// Producer slot feeding each data input, in input order.
    pub inputs: Vec<Output>,
    /// Element type each data input is read as.
    pub input_types: Vec<i32>,
    pub control_inputs: Vec<OpId>,
    pub outputs: Vec<TensorSignature>,
}

/// A loaded graph. Operations are stored in traversal order, so an `OpId` is
/// also the operation's position in that order.
#[derive(Debug, Default)]
pub struct Graph {
    operations: Vec<Operation>,
    by_name: HashMap<String, OpId>,
}

impl Graph {
    pub(crate) fn from_operations(operations: Vec<Operation>) -> Self {
        let by_name = operations
            .iter()
            .enumerate()
            .map(|(idx, op)| (op.name.clone(), OpId(idx)))
            .collect();
        Self {
            operations,
            by_name,
        }
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn operation(&self, id: OpId) -> Option<&Operation> {
        self.operations.get(id.0)
    }

    pub fn operation_by_name(&self, name: &str) -> Option<OpId> {
        self.by_name.get(name).copied()
    }

    pub fn num_operations(&self) -> usize {
        self.operations.len()
    }

    fn output_signature(&self, output: Output) -> Result<&TensorSignature, TensorQueryError> {
        let outputs = self
            .operation(output.op)
            .map(|op| op.outputs.as_slice())
            .unwrap_or_default();
        outputs
            .get(output.index)
            .ok_or(TensorQueryError::OutOfRange {
                op: output.op.0,
                index: output.index,
                count: outputs.len(),
            })
    }
}

impl Drop for Graph {
    fn drop(&mut self) {
        tracing::debug!(operations = self.operations.len(), "releasing graph");
    }
}

impl GraphIntrospection for Graph {
    fn next_operation(&self, cursor: &mut usize) -> Option<OpId> {
        if *cursor < self.operations.len() {
            let id = OpId(*cursor);
            *cursor += 1;
            Some(id)
        } else {
            None
        }
    }

    fn operation_name(&self, op: OpId) -> &str {
        self.operation(op).map_or("", |op| op.name.as_str())
    }

    fn operation_op_type(&self, op: OpId) -> &str {
        self.operation(op).map_or("", |op| op.op_type.as_str())
    }

    fn operation_device(&self, op: OpId) -> &str {
        self.operation(op).map_or("", |op| op.device.as_str())
    }

    fn operation_num_inputs(&self, op: OpId) -> usize {
        self.operation(op).map_or(0, |op| op.inputs.len())
    }

    fn operation_num_outputs(&self, op: OpId) -> usize {
        self.operation(op).map_or(0, |op| op.outputs.len())
    }

    fn operation_input_type(&self, input: Input) -> i32 {
        self.operation(input.op)
            .and_then(|op| op.input_types.get(input.index))
            .copied()
            .unwrap_or(DT_INVALID)
    }

    fn operation_output_type(&self, output: Output) -> i32 {
        self.output_signature(output)
            .map_or(DT_INVALID, |signature| signature.dtype)
    }

    fn tensor_num_dims(&self, output: Output) -> Result<usize, TensorQueryError> {
        self.output_signature(output)?
            .shape
            .rank()
            .ok_or(TensorQueryError::UnknownRank)
    }

    fn tensor_shape(
        &self,
        output: Output,
        num_dims: usize,
    ) -> Result<Vec<i64>, TensorQueryError> {
        let dims = self
            .output_signature(output)?
            .shape
            .dims()
            .ok_or(TensorQueryError::UnknownRank)?;
        if dims.len() != num_dims {
            return Err(TensorQueryError::DimensionMismatch {
                expected: num_dims,
                actual: dims.len(),
            });
        }
        Ok(dims.to_vec())
    }
}
