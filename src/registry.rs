//! Op signature registry
//!
//! Maps an op type to the outputs it produces and the rule used to infer their
//! shapes. The built-in table lives in `op_registry.json`; a user file with the
//! same layout can add ops or replace built-in entries.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::GraphError;
use crate::graph::DataType;

const BUILTIN_OPS: &str = include_str!("op_registry.json");

/// How the shape of every output of an op is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeRule {
    #[default]
    Unknown,
    /// Same shape as the first input
    Unchanged,
    /// NumPy broadcast of the first two inputs
    Broadcast,
    MatMul,
    BatchMatMul,
    /// Shape of the tensor in the `value` attribute
    ValueAttr,
    /// Shape stored in the `shape` attribute
    ShapeAttr,
    Scalar,
    /// 1-D tensor holding the rank of the first input
    ShapeOf,
}

/// One declared output argument. Exactly one of `type_attr`, `dtype` or
/// `type_list_attr` names the element type.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputArg {
    #[serde(default)]
    pub type_attr: Option<String>,
    #[serde(default)]
    pub dtype: Option<DataType>,
    /// Integer attribute repeating this argument N times
    #[serde(default)]
    pub number_attr: Option<String>,
    /// Type-list attribute producing one output per listed type
    #[serde(default)]
    pub type_list_attr: Option<String>,
    #[serde(default)]
    pub is_ref: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpSignature {
    #[serde(default)]
    pub outputs: Vec<OutputArg>,
    #[serde(default)]
    pub shape: ShapeRule,
    /// Input positions that consume a reference; every other input reads the base type
    #[serde(default)]
    pub ref_inputs: Vec<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct OpRegistry {
    ops: HashMap<String, OpSignature>,
}

impl OpRegistry {
    /// Registry holding the built-in op table.
    pub fn builtin() -> Result<Self, GraphError> {
        Self::from_json(BUILTIN_OPS)
    }

    pub fn from_json(json: &str) -> Result<Self, GraphError> {
        let ops: HashMap<String, OpSignature> = serde_json::from_str(json)?;
        Ok(Self { ops })
    }

    /// Overlay the ops declared in the JSON file at `path`.
    pub fn merge_from_path<P: AsRef<Path>>(&mut self, path: P) -> Result<(), GraphError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| GraphError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let overlay = Self::from_json(&json)?;
        tracing::debug!(path = %path.display(), ops = overlay.len(), "merging op registry");
        self.merge(overlay);
        Ok(())
    }

    pub fn merge(&mut self, other: OpRegistry) {
        self.ops.extend(other.ops);
    }

    pub fn get(&self, op_type: &str) -> Option<&OpSignature> {
        self.ops.get(op_type)
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_parses() {
        let registry = OpRegistry::builtin().unwrap();
        assert!(!registry.is_empty());

        let konst = registry.get("Const").unwrap();
        assert_eq!(konst.shape, ShapeRule::ValueAttr);
        assert_eq!(konst.outputs.len(), 1);
        assert_eq!(konst.outputs[0].type_attr.as_deref(), Some("dtype"));

        let no_op = registry.get("NoOp").unwrap();
        assert!(no_op.outputs.is_empty());

        let rank = registry.get("Rank").unwrap();
        assert_eq!(rank.outputs[0].dtype, Some(DataType::Int32));

        assert_eq!(registry.get("Assign").unwrap().ref_inputs, vec![0]);
        assert!(registry.get("Identity").unwrap().ref_inputs.is_empty());
    }

    #[test]
    fn test_builtin_entries_name_a_type_source() {
        let registry = OpRegistry::builtin().unwrap();
        for (op, signature) in &registry.ops {
            for arg in &signature.outputs {
                let sources = [
                    arg.type_attr.is_some(),
                    arg.dtype.is_some(),
                    arg.type_list_attr.is_some(),
                ];
                assert_eq!(
                    sources.iter().filter(|s| **s).count(),
                    1,
                    "op {op} output must name exactly one type source"
                );
            }
        }
    }

    #[test]
    fn test_merge_overrides_and_extends() {
        let mut registry = OpRegistry::builtin().unwrap();
        let before = registry.len();
        let overlay = OpRegistry::from_json(
            r#"{
                "Relu": {"outputs": [{"dtype": "DT_HALF"}]},
                "MyCustomOp": {"outputs": [{"type_attr": "T"}, {"dtype": "DT_INT64"}], "shape": "unchanged"}
            }"#,
        )
        .unwrap();
        registry.merge(overlay);

        assert_eq!(registry.len(), before + 1);
        let relu = registry.get("Relu").unwrap();
        assert_eq!(relu.outputs[0].dtype, Some(DataType::Half));
        assert_eq!(relu.shape, ShapeRule::Unknown);
        assert_eq!(
            registry.get("MyCustomOp").unwrap().shape,
            ShapeRule::Unchanged
        );
    }

    #[test]
    fn test_invalid_registry_json() {
        assert!(matches!(
            OpRegistry::from_json(r#"{"Foo": {"shape": "sideways"}}"#),
            Err(GraphError::Registry(_))
        ));
        assert!(matches!(
            OpRegistry::from_json(r#"{"Foo": {"outputs": [{"typ_attr": "T"}]}}"#),
            Err(GraphError::Registry(_))
        ));
        assert!(OpRegistry::from_json("[]").is_err());
    }

    #[test]
    fn test_merge_from_missing_path() {
        let mut registry = OpRegistry::default();
        let err = registry
            .merge_from_path("/nonexistent/graphinfo/ops.json")
            .unwrap_err();
        assert!(matches!(err, GraphError::Io { .. }));
    }
}
