//! Import of a decoded `GraphDef` into a [`Graph`]
//!
//! Nodes are placed in topological order (data and control edges), taking the
//! earliest node in the file whenever several are ready. Loop back edges from
//! `NextIteration` into `Merge` do not constrain the order; any other cycle is
//! rejected.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::error::GraphError;
use crate::graph::{Graph, Operation, TensorSignature, DT_INVALID, REF_TYPE_OFFSET};
use crate::introspection::{OpId, Output};
use crate::protos::tensorflow::{GraphDef, NodeDef};
use crate::registry::{OpRegistry, OpSignature};
use crate::shape_inference::{infer_shape, Shape};

/// Attribute where TensorFlow records the shapes it inferred when saving.
pub const OUTPUT_SHAPES_ATTR: &str = "_output_shapes";

/// Attributes consulted, in order, for the element type of an unregistered op.
const FALLBACK_TYPE_ATTRS: [&str; 4] = ["T", "dtype", "out_type", "DstT"];

/// Upper bound on the number of outputs a single node may declare or be referenced at.
pub const MAX_OUTPUTS: usize = u16::MAX as usize;

#[derive(Debug, Clone, Copy)]
struct InputRef {
    producer: usize,
    slot: usize,
    control: bool,
}

pub fn import_graph_def(graph_def: &GraphDef, registry: &OpRegistry) -> Result<Graph, GraphError> {
    let nodes = &graph_def.node;
    let index = index_nodes(nodes)?;

    let edges = nodes
        .iter()
        .map(|node| resolve_inputs(node, &index))
        .collect::<Result<Vec<_>, GraphError>>()?;

    let referenced = highest_referenced_slots(nodes.len(), &edges);
    let output_types = nodes
        .iter()
        .zip(&referenced)
        .map(|(node, referenced)| output_types(node, registry, *referenced))
        .collect::<Result<Vec<_>, GraphError>>()?;
    validate_slots(nodes, &edges, &output_types)?;

    let order = traversal_order(nodes, &edges)?;
    let mut position = vec![0usize; nodes.len()];
    for (pos, &idx) in order.iter().enumerate() {
        position[idx] = pos;
    }

    let mut operations: Vec<Operation> = Vec::with_capacity(nodes.len());
    for &idx in &order {
        let node = &nodes[idx];
        let data_inputs: Vec<InputRef> = edges[idx].iter().copied().filter(|e| !e.control).collect();

        // Producers later in the order (loop back edges) have no shape yet.
        let input_shapes: Vec<Shape> = data_inputs
            .iter()
            .map(|input| {
                operations
                    .get(position[input.producer])
                    .and_then(|op| op.outputs.get(input.slot))
                    .map(|signature| signature.shape.clone())
                    .unwrap_or_default()
            })
            .collect();

        let signature = registry.get(&node.op);
        let input_types = data_inputs
            .iter()
            .enumerate()
            .map(|(index, input)| {
                let produced = output_types[input.producer][input.slot];
                consumed_type(produced, signature, index)
            })
            .collect();

        let outputs = output_signatures(
            node,
            signature,
            &output_types[idx],
            &input_shapes,
        )?;

        operations.push(Operation {
            name: node.name.clone(),
            op_type: node.op.clone(),
            device: node.device.clone(),
            inputs: data_inputs
                .iter()
                .map(|input| Output {
                    op: OpId(position[input.producer]),
                    index: input.slot,
                })
                .collect(),
            input_types,
            control_inputs: edges[idx]
                .iter()
                .filter(|e| e.control)
                .map(|e| OpId(position[e.producer]))
                .collect(),
            outputs,
        });
    }

    tracing::debug!(operations = operations.len(), "imported graph");
    Ok(Graph::from_operations(operations))
}

fn index_nodes(nodes: &[NodeDef]) -> Result<HashMap<&str, usize>, GraphError> {
    let mut index = HashMap::with_capacity(nodes.len());
    for (idx, node) in nodes.iter().enumerate() {
        if node.name.is_empty() {
            return Err(GraphError::EmptyNodeName { index: idx });
        }
        if index.insert(node.name.as_str(), idx).is_some() {
            return Err(GraphError::DuplicateNode {
                name: node.name.clone(),
            });
        }
    }
    Ok(index)
}

/// Splits `"name"`, `"name:slot"` and `"^name"` into (name, slot, control).
fn parse_input(input: &str) -> Option<(&str, usize, bool)> {
    if let Some(name) = input.strip_prefix('^') {
        return (!name.is_empty()).then_some((name, 0, true));
    }
    let (name, slot) = match input.rsplit_once(':') {
        Some((name, slot)) => (name, slot.parse().ok()?),
        None => (input, 0),
    };
    (!name.is_empty()).then_some((name, slot, false))
}

fn resolve_inputs(node: &NodeDef, index: &HashMap<&str, usize>) -> Result<Vec<InputRef>, GraphError> {
    node.input
        .iter()
        .map(|input| {
            let (name, slot, control) = parse_input(input)
                .filter(|(_, slot, _)| *slot < MAX_OUTPUTS)
                .ok_or_else(|| GraphError::MalformedInput {
                    node: node.name.clone(),
                    input: input.clone(),
                })?;
            let producer = *index.get(name).ok_or_else(|| GraphError::UnknownInput {
                node: node.name.clone(),
                input: input.clone(),
            })?;
            Ok(InputRef {
                producer,
                slot,
                control,
            })
        })
        .collect()
}

fn highest_referenced_slots(len: usize, edges: &[Vec<InputRef>]) -> Vec<Option<usize>> {
    let mut highest = vec![None; len];
    for input in edges.iter().flatten().filter(|e| !e.control) {
        let entry: &mut Option<usize> = &mut highest[input.producer];
        *entry = Some(entry.map_or(input.slot, |slot| slot.max(input.slot)));
    }
    highest
}

fn output_types(
    node: &NodeDef,
    registry: &OpRegistry,
    referenced: Option<usize>,
) -> Result<Vec<i32>, GraphError> {
    match registry.get(&node.op) {
        Some(signature) => declared_output_types(node, signature),
        None => {
            tracing::warn!(
                node = %node.name,
                op = %node.op,
                "op type not in registry; inferring outputs from attributes"
            );
            Ok(fallback_output_types(node, referenced))
        }
    }
}

fn declared_output_types(node: &NodeDef, signature: &OpSignature) -> Result<Vec<i32>, GraphError> {
    let mut types = Vec::new();
    for arg in &signature.outputs {
        let offset = if arg.is_ref { REF_TYPE_OFFSET } else { 0 };

        if let Some(attr) = &arg.type_list_attr {
            let list = node
                .attr_type_list(attr)
                .ok_or_else(|| missing_attr(node, attr))?;
            types.extend(list.iter().map(|tag| tag.saturating_add(offset)));
            continue;
        }

        let tag = match (&arg.dtype, &arg.type_attr) {
            (Some(dtype), _) => dtype.tag(),
            (None, Some(attr)) => node.attr_type(attr).ok_or_else(|| missing_attr(node, attr))?,
            (None, None) => DT_INVALID,
        };

        let count = match &arg.number_attr {
            Some(attr) => {
                let n = node.attr_int(attr).ok_or_else(|| missing_attr(node, attr))?;
                usize::try_from(n)
                    .ok()
                    .filter(|count| *count <= MAX_OUTPUTS)
                    .ok_or_else(|| GraphError::InvalidAttr {
                        node: node.name.clone(),
                        attr: attr.clone(),
                        reason: format!("expected a count between 0 and {MAX_OUTPUTS}, got {n}"),
                    })?
            }
            None => 1,
        };

        types.extend(std::iter::repeat(tag.saturating_add(offset)).take(count));
    }
    Ok(types)
}

fn fallback_output_types(node: &NodeDef, referenced: Option<usize>) -> Vec<i32> {
    let recorded = node.attr_shape_list(OUTPUT_SHAPES_ATTR).map(<[_]>::len);
    let count = match (recorded, referenced.and_then(|slot| slot.checked_add(1))) {
        (None, None) => 1,
        (recorded, referenced) => recorded.unwrap_or(0).max(referenced.unwrap_or(0)),
    };
    let dtype = FALLBACK_TYPE_ATTRS
        .iter()
        .find_map(|attr| node.attr_type(attr))
        .unwrap_or(DT_INVALID);
    vec![dtype; count]
}

/// A ref-typed tensor is read as its base type unless the consuming slot takes a ref.
fn consumed_type(produced: i32, signature: Option<&OpSignature>, index: usize) -> i32 {
    let takes_ref = signature.is_some_and(|signature| signature.ref_inputs.contains(&index));
    if produced > REF_TYPE_OFFSET && !takes_ref {
        produced - REF_TYPE_OFFSET
    } else {
        produced
    }
}

fn missing_attr(node: &NodeDef, attr: &str) -> GraphError {
    GraphError::MissingAttr {
        node: node.name.clone(),
        attr: attr.to_string(),
    }
}

fn validate_slots(
    nodes: &[NodeDef],
    edges: &[Vec<InputRef>],
    output_types: &[Vec<i32>],
) -> Result<(), GraphError> {
    for (consumer, inputs) in edges.iter().enumerate() {
        for (input, raw) in inputs.iter().zip(&nodes[consumer].input) {
            let num_outputs = output_types[input.producer].len();
            if !input.control && input.slot >= num_outputs {
                return Err(GraphError::InvalidInputSlot {
                    node: nodes[consumer].name.clone(),
                    input: raw.clone(),
                    producer: nodes[input.producer].name.clone(),
                    slot: input.slot,
                    num_outputs,
                });
            }
        }
    }
    Ok(())
}

fn is_loop_back_edge(producer: &NodeDef, consumer: &NodeDef) -> bool {
    producer.op == "NextIteration" && consumer.op == "Merge"
}

fn traversal_order(nodes: &[NodeDef], edges: &[Vec<InputRef>]) -> Result<Vec<usize>, GraphError> {
    let mut pending = vec![0usize; nodes.len()];
    let mut consumers: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for (consumer, inputs) in edges.iter().enumerate() {
        for input in inputs {
            if is_loop_back_edge(&nodes[input.producer], &nodes[consumer]) {
                continue;
            }
            pending[consumer] += 1;
            consumers[input.producer].push(consumer);
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = pending
        .iter()
        .enumerate()
        .filter(|(_, count)| **count == 0)
        .map(|(idx, _)| Reverse(idx))
        .collect();

    let mut order = Vec::with_capacity(nodes.len());
    while let Some(Reverse(idx)) = ready.pop() {
        order.push(idx);
        for &consumer in &consumers[idx] {
            pending[consumer] -= 1;
            if pending[consumer] == 0 {
                ready.push(Reverse(consumer));
            }
        }
    }

    if order.len() < nodes.len() {
        let stuck = pending.iter().position(|count| *count > 0).unwrap_or(0);
        return Err(GraphError::Cycle {
            node: nodes[stuck].name.clone(),
        });
    }
    Ok(order)
}

fn output_signatures(
    node: &NodeDef,
    signature: Option<&OpSignature>,
    types: &[i32],
    input_shapes: &[Shape],
) -> Result<Vec<TensorSignature>, GraphError> {
    let inferred = match signature {
        Some(signature) => {
            infer_shape(signature.shape, node, input_shapes).map_err(|err| match err {
                GraphError::ShapeInferenceFailed { reason } => GraphError::ShapeInferenceFailed {
                    reason: format!("node '{}': {reason}", node.name),
                },
                other => other,
            })?
        }
        None => Shape::UnknownRank,
    };
    let recorded = node.attr_shape_list(OUTPUT_SHAPES_ATTR).unwrap_or_default();

    Ok(types
        .iter()
        .enumerate()
        .map(|(slot, &dtype)| {
            let shape = match &inferred {
                Shape::UnknownRank => recorded.get(slot).map(Shape::from_proto).unwrap_or_default(),
                known => known.clone(),
            };
            TensorSignature { dtype, shape }
        })
        .collect())
}
