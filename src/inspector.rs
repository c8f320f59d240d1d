//! Human-readable report of every operation in a graph
//!
//! One block per operation:
//!
//! ```text
//! <index>: <name> type: <op type> device: <device> number inputs: <n> number outputs: <m>
//! Number inputs: <n>
//! <i> type : <TypeName>
//! Number outputs: <m>
//! <i> type : <TypeName> dims: <k> [<d0>,...,<dk-1>]
//!
//! ```
//!
//! A failed rank or shape query replaces the `dims:` part of that output's
//! line with a notice; the rest of the report is unaffected.

use std::io::{self, Write};

use crate::graph::type_name_of;
use crate::introspection::{GraphIntrospection, Input, OpId, Output};

pub const DIMENSIONALITY_UNAVAILABLE: &str = "Can't get tensor dimensionality";
pub const SHAPE_UNAVAILABLE: &str = "Can't get tensor shape";

/// Write the report for every operation of `graph` to `out`.
pub fn inspect<G, W>(graph: &G, out: &mut W) -> io::Result<()>
where
    G: GraphIntrospection + ?Sized,
    W: Write + ?Sized,
{
    let mut cursor = 0;
    let mut index = 0usize;
    while let Some(op) = graph.next_operation(&mut cursor) {
        writeln!(
            out,
            "{}: {} type: {} device: {} number inputs: {} number outputs: {}",
            index,
            graph.operation_name(op),
            graph.operation_op_type(op),
            graph.operation_device(op),
            graph.operation_num_inputs(op),
            graph.operation_num_outputs(op),
        )?;
        print_op_inputs(graph, op, out)?;
        print_op_outputs(graph, op, out)?;
        writeln!(out)?;
        index += 1;
    }
    Ok(())
}

fn print_op_inputs<G, W>(graph: &G, op: OpId, out: &mut W) -> io::Result<()>
where
    G: GraphIntrospection + ?Sized,
    W: Write + ?Sized,
{
    let num_inputs = graph.operation_num_inputs(op);
    writeln!(out, "Number inputs: {num_inputs}")?;

    for index in 0..num_inputs {
        let dtype = graph.operation_input_type(Input { op, index });
        writeln!(out, "{index} type : {}", type_name_of(dtype))?;
    }
    Ok(())
}

fn print_op_outputs<G, W>(graph: &G, op: OpId, out: &mut W) -> io::Result<()>
where
    G: GraphIntrospection + ?Sized,
    W: Write + ?Sized,
{
    let num_outputs = graph.operation_num_outputs(op);
    writeln!(out, "Number outputs: {num_outputs}")?;

    for index in 0..num_outputs {
        let output = Output { op, index };
        let dtype = graph.operation_output_type(output);
        write!(out, "{index} type : {}", type_name_of(dtype))?;

        let num_dims = match graph.tensor_num_dims(output) {
            Ok(num_dims) => num_dims,
            Err(err) => {
                tracing::debug!(op = graph.operation_name(op), index, error = %err, "rank query failed");
                writeln!(out, " {DIMENSIONALITY_UNAVAILABLE}")?;
                continue;
            }
        };

        let dims = match graph.tensor_shape(output, num_dims) {
            Ok(dims) => dims,
            Err(err) => {
                tracing::debug!(op = graph.operation_name(op), index, error = %err, "shape query failed");
                writeln!(out, " {SHAPE_UNAVAILABLE}")?;
                continue;
            }
        };

        let dims = dims
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        writeln!(out, " dims: {num_dims} [{dims}]")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TensorQueryError;
    use crate::graph::DataType;

    /// Scripted graph: every output carries a canned answer to each query.
    struct ScriptedOp {
        name: &'static str,
        op_type: &'static str,
        inputs: Vec<i32>,
        outputs: Vec<(i32, Result<usize, TensorQueryError>, Result<Vec<i64>, TensorQueryError>)>,
    }

    struct ScriptedGraph {
        ops: Vec<ScriptedOp>,
    }

    impl GraphIntrospection for ScriptedGraph {
        fn next_operation(&self, cursor: &mut usize) -> Option<OpId> {
            // Skip two slots per step to show the printed index is positional.
            let id = *cursor / 2;
            if id < self.ops.len() {
                *cursor += 2;
                Some(OpId(id))
            } else {
                None
            }
        }

        fn operation_name(&self, op: OpId) -> &str {
            self.ops[op.0].name
        }

        fn operation_op_type(&self, op: OpId) -> &str {
            self.ops[op.0].op_type
        }

        fn operation_device(&self, _op: OpId) -> &str {
            "/job:localhost/device:CPU:0"
        }

        fn operation_num_inputs(&self, op: OpId) -> usize {
            self.ops[op.0].inputs.len()
        }

        fn operation_num_outputs(&self, op: OpId) -> usize {
            self.ops[op.0].outputs.len()
        }

        fn operation_input_type(&self, input: Input) -> i32 {
            self.ops[input.op.0].inputs[input.index]
        }

        fn operation_output_type(&self, output: Output) -> i32 {
            self.ops[output.op.0].outputs[output.index].0
        }

        fn tensor_num_dims(&self, output: Output) -> Result<usize, TensorQueryError> {
            self.ops[output.op.0].outputs[output.index].1.clone()
        }

        fn tensor_shape(
            &self,
            output: Output,
            _num_dims: usize,
        ) -> Result<Vec<i64>, TensorQueryError> {
            self.ops[output.op.0].outputs[output.index].2.clone()
        }
    }

    fn render(graph: &ScriptedGraph) -> String {
        let mut out = Vec::new();
        inspect(graph, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_failed_queries_do_not_hide_siblings() {
        let graph = ScriptedGraph {
            ops: vec![
                ScriptedOp {
                    name: "split",
                    op_type: "Split",
                    inputs: vec![DataType::Int32.tag(), DataType::Float.tag()],
                    outputs: vec![
                        (DataType::Float.tag(), Ok(1), Ok(vec![4])),
                        (DataType::Float.tag(), Err(TensorQueryError::UnknownRank), Ok(vec![])),
                        (
                            DataType::Float.tag(),
                            Ok(2),
                            Err(TensorQueryError::DimensionMismatch {
                                expected: 2,
                                actual: 3,
                            }),
                        ),
                        (DataType::Float.tag(), Ok(2), Ok(vec![-1, 4])),
                    ],
                },
                ScriptedOp {
                    name: "tail",
                    op_type: "Custom",
                    inputs: vec![0],
                    outputs: vec![(250, Ok(0), Ok(vec![]))],
                },
            ],
        };

        let expected = "\
0: split type: Split device: /job:localhost/device:CPU:0 number inputs: 2 number outputs: 4
Number inputs: 2
0 type : TF_INT32
1 type : TF_FLOAT
Number outputs: 4
0 type : TF_FLOAT dims: 1 [4]
1 type : TF_FLOAT Can't get tensor dimensionality
2 type : TF_FLOAT Can't get tensor shape
3 type : TF_FLOAT dims: 2 [-1,4]

1: tail type: Custom device: /job:localhost/device:CPU:0 number inputs: 1 number outputs: 1
Number inputs: 1
0 type : Unknown
Number outputs: 1
0 type : Unknown dims: 0 []

";
        assert_eq!(render(&graph), expected);
    }

    #[test]
    fn test_empty_graph_prints_nothing() {
        let graph = ScriptedGraph { ops: vec![] };
        assert_eq!(render(&graph), "");
    }

    #[test]
    fn test_operation_without_slots() {
        let graph = ScriptedGraph {
            ops: vec![ScriptedOp {
                name: "init",
                op_type: "NoOp",
                inputs: vec![],
                outputs: vec![],
            }],
        };
        assert_eq!(
            render(&graph),
            "0: init type: NoOp device: /job:localhost/device:CPU:0 number inputs: 0 number outputs: 0\n\
             Number inputs: 0\n\
             Number outputs: 0\n\n"
        );
    }
}
