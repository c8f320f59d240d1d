/// Shape inference for TensorFlow graph nodes
use crate::error::GraphError;
use crate::protos::tensorflow::{NodeDef, TensorShapeProto};
use crate::registry::ShapeRule;

/// Size reported for a dimension whose extent is not known statically.
pub const UNKNOWN_DIM: i64 = -1;

/// Static shape of a tensor
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Shape {
    /// Not even the number of dimensions is known
    #[default]
    UnknownRank,
    /// Known rank; individual dimensions may be `UNKNOWN_DIM`
    Known(Vec<i64>),
}

impl Shape {
    pub fn scalar() -> Self {
        Shape::Known(Vec::new())
    }

    pub fn rank(&self) -> Option<usize> {
        self.dims().map(<[i64]>::len)
    }

    pub fn dims(&self) -> Option<&[i64]> {
        match self {
            Shape::UnknownRank => None,
            Shape::Known(dims) => Some(dims),
        }
    }

    pub fn from_proto(proto: &TensorShapeProto) -> Self {
        if proto.unknown_rank {
            return Shape::UnknownRank;
        }
        Shape::Known(
            proto
                .dim
                .iter()
                .map(|d| if d.size < 0 { UNKNOWN_DIM } else { d.size })
                .collect(),
        )
    }
}

impl From<Vec<i64>> for Shape {
    fn from(dims: Vec<i64>) -> Self {
        Shape::Known(dims)
    }
}

fn broadcast_dim(dim_a: i64, dim_b: i64) -> Option<i64> {
    if dim_a == dim_b {
        Some(dim_a)
    } else if dim_a == 1 {
        Some(dim_b)
    } else if dim_b == 1 {
        Some(dim_a)
    } else if dim_a == UNKNOWN_DIM {
        Some(dim_b)
    } else if dim_b == UNKNOWN_DIM {
        Some(dim_a)
    } else {
        None
    }
}

fn dims_compatible(dim_a: i64, dim_b: i64) -> bool {
    dim_a == dim_b || dim_a == UNKNOWN_DIM || dim_b == UNKNOWN_DIM
}

/// Compute the broadcasted shape for two operands following NumPy broadcasting rules
///
/// Broadcasting rules:
/// 1. If arrays have different ranks, prepend 1s to the smaller rank
/// 2. Two dimensions are compatible if they are equal or one of them is 1
/// 3. An unknown dimension broadcasts against anything; the result takes the known side
pub fn broadcast_shapes(shape_a: &[i64], shape_b: &[i64]) -> Result<Vec<i64>, GraphError> {
    let max_rank = shape_a.len().max(shape_b.len());
    let mut result = Vec::with_capacity(max_rank);

    // Iterate from right to left (least significant dimension first)
    for i in 0..max_rank {
        let dim_a = if i < shape_a.len() {
            shape_a[shape_a.len() - 1 - i]
        } else {
            1
        };

        let dim_b = if i < shape_b.len() {
            shape_b[shape_b.len() - 1 - i]
        } else {
            1
        };

        match broadcast_dim(dim_a, dim_b) {
            Some(dim) => result.push(dim),
            None => {
                return Err(GraphError::ShapeInferenceFailed {
                    reason: format!(
                        "Incompatible shapes for broadcasting: {:?} and {:?} (dimension {} incompatible: {} vs {})",
                        shape_a, shape_b, i, dim_a, dim_b
                    ),
                });
            }
        }
    }

    result.reverse();
    Ok(result)
}

/// Infer output shape for `MatMul`: `[M, K] @ [K, N] -> [M, N]`, after optional transposes
pub fn infer_matmul_shape(
    shape_a: &[i64],
    shape_b: &[i64],
    transpose_a: bool,
    transpose_b: bool,
) -> Result<Vec<i64>, GraphError> {
    if shape_a.len() != 2 || shape_b.len() != 2 {
        return Err(GraphError::ShapeInferenceFailed {
            reason: format!(
                "MatMul requires 2D tensors, got shapes {:?} and {:?}",
                shape_a, shape_b
            ),
        });
    }

    let (a_rows, a_cols) = oriented(shape_a, transpose_a);
    let (b_rows, b_cols) = oriented(shape_b, transpose_b);

    if !dims_compatible(a_cols, b_rows) {
        return Err(GraphError::ShapeInferenceFailed {
            reason: format!(
                "Incompatible shapes for matmul: {:?} and {:?} (inner dimensions {} != {})",
                shape_a, shape_b, a_cols, b_rows
            ),
        });
    }

    Ok(vec![a_rows, b_cols])
}

/// Infer output shape for `BatchMatMul`; batch dimensions are broadcast
pub fn infer_batch_matmul_shape(
    shape_a: &[i64],
    shape_b: &[i64],
    adj_x: bool,
    adj_y: bool,
) -> Result<Vec<i64>, GraphError> {
    if shape_a.len() < 2 || shape_b.len() < 2 {
        return Err(GraphError::ShapeInferenceFailed {
            reason: format!(
                "BatchMatMul requires at least 2D tensors, got shapes {:?} and {:?}",
                shape_a, shape_b
            ),
        });
    }

    let (matrix_a, matrix_b) = (
        &shape_a[shape_a.len() - 2..],
        &shape_b[shape_b.len() - 2..],
    );
    let (a_rows, a_cols) = oriented(matrix_a, adj_x);
    let (b_rows, b_cols) = oriented(matrix_b, adj_y);

    if !dims_compatible(a_cols, b_rows) {
        return Err(GraphError::ShapeInferenceFailed {
            reason: format!(
                "Incompatible shapes for batch matmul: {:?} and {:?} (inner dimensions {} != {})",
                shape_a, shape_b, a_cols, b_rows
            ),
        });
    }

    let batch_a = &shape_a[..shape_a.len() - 2];
    let batch_b = &shape_b[..shape_b.len() - 2];
    let mut dims = broadcast_shapes(batch_a, batch_b)?;
    dims.push(a_rows);
    dims.push(b_cols);
    Ok(dims)
}

fn oriented(matrix: &[i64], transposed: bool) -> (i64, i64) {
    if transposed {
        (matrix[1], matrix[0])
    } else {
        (matrix[0], matrix[1])
    }
}

/// Apply `rule` to a node whose data inputs have shapes `inputs`
///
/// Inputs whose producer has not been visited yet (loop back edges) are passed
/// as `Shape::UnknownRank`.
pub fn infer_shape(rule: ShapeRule, node: &NodeDef, inputs: &[Shape]) -> Result<Shape, GraphError> {
    let shape = match rule {
        ShapeRule::Unknown => Shape::UnknownRank,
        ShapeRule::Unchanged => inputs.first().cloned().unwrap_or_default(),
        ShapeRule::Scalar => Shape::scalar(),
        ShapeRule::ShapeOf => match inputs.first().and_then(Shape::rank) {
            Some(rank) => Shape::Known(vec![rank as i64]),
            None => Shape::Known(vec![UNKNOWN_DIM]),
        },
        ShapeRule::ValueAttr => node
            .attr_tensor("value")
            .and_then(|tensor| tensor.tensor_shape.as_ref())
            .map(Shape::from_proto)
            .unwrap_or_else(Shape::scalar),
        ShapeRule::ShapeAttr => node
            .attr_shape("shape")
            .map(Shape::from_proto)
            .unwrap_or_default(),
        ShapeRule::Broadcast => match binary_dims(inputs) {
            Some((a, b)) => Shape::Known(broadcast_shapes(a, b)?),
            None => Shape::UnknownRank,
        },
        ShapeRule::MatMul => match binary_dims(inputs) {
            Some((a, b)) => Shape::Known(infer_matmul_shape(
                a,
                b,
                node.attr_bool("transpose_a").unwrap_or(false),
                node.attr_bool("transpose_b").unwrap_or(false),
            )?),
            None => Shape::UnknownRank,
        },
        ShapeRule::BatchMatMul => match binary_dims(inputs) {
            Some((a, b)) => Shape::Known(infer_batch_matmul_shape(
                a,
                b,
                node.attr_bool("adj_x").unwrap_or(false),
                node.attr_bool("adj_y").unwrap_or(false),
            )?),
            None => Shape::UnknownRank,
        },
    };
    Ok(shape)
}

fn binary_dims(inputs: &[Shape]) -> Option<(&[i64], &[i64])> {
    match inputs {
        [a, b, ..] => Some((a.dims()?, b.dims()?)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protos::tensorflow::{attr_value, AttrValue, TensorProto};

    #[test]
    fn test_broadcast_same_shape() {
        assert_eq!(broadcast_shapes(&[2, 3], &[2, 3]).unwrap(), vec![2, 3]);
    }

    #[test]
    fn test_broadcast_with_ones() {
        assert_eq!(broadcast_shapes(&[2, 3], &[1, 3]).unwrap(), vec![2, 3]);
        assert_eq!(broadcast_shapes(&[1, 3], &[2, 3]).unwrap(), vec![2, 3]);
    }

    #[test]
    fn test_broadcast_different_ranks() {
        assert_eq!(
            broadcast_shapes(&[2, 3, 4], &[3, 4]).unwrap(),
            vec![2, 3, 4]
        );
        assert_eq!(broadcast_shapes(&[2, 3], &[]).unwrap(), vec![2, 3]);
    }

    #[test]
    fn test_broadcast_unknown_dims() {
        assert_eq!(broadcast_shapes(&[-1, 3], &[4, 3]).unwrap(), vec![4, 3]);
        assert_eq!(broadcast_shapes(&[-1, 3], &[1, 3]).unwrap(), vec![-1, 3]);
        assert_eq!(broadcast_shapes(&[-1], &[-1]).unwrap(), vec![-1]);
    }

    #[test]
    fn test_broadcast_incompatible() {
        assert!(broadcast_shapes(&[2, 3], &[2, 4]).is_err());
        assert!(broadcast_shapes(&[2, 3, 4], &[2, 5, 4]).is_err());
    }

    #[test]
    fn test_matmul_2d() {
        assert_eq!(
            infer_matmul_shape(&[2, 3], &[3, 4], false, false).unwrap(),
            vec![2, 4]
        );
    }

    #[test]
    fn test_matmul_transposed() {
        assert_eq!(
            infer_matmul_shape(&[3, 2], &[4, 3], true, true).unwrap(),
            vec![2, 4]
        );
        assert_eq!(
            infer_matmul_shape(&[-1, 3], &[3, 4], false, false).unwrap(),
            vec![-1, 4]
        );
    }

    #[test]
    fn test_matmul_incompatible() {
        assert!(infer_matmul_shape(&[2, 3], &[4, 5], false, false).is_err());
        assert!(infer_matmul_shape(&[2], &[3, 4], false, false).is_err());
        assert!(infer_matmul_shape(&[5, 2, 3], &[5, 3, 4], false, false).is_err());
    }

    #[test]
    fn test_batch_matmul() {
        assert_eq!(
            infer_batch_matmul_shape(&[5, 2, 3], &[5, 3, 4], false, false).unwrap(),
            vec![5, 2, 4]
        );
        assert_eq!(
            infer_batch_matmul_shape(&[7, 1, 3, 2], &[4, 3, 6], true, false).unwrap(),
            vec![7, 4, 2, 6]
        );
        assert!(infer_batch_matmul_shape(&[5, 2, 3], &[5, 4, 4], false, false).is_err());
    }

    #[test]
    fn test_shape_from_proto() {
        assert_eq!(
            Shape::from_proto(&TensorShapeProto::from_dims(&[2, -1])),
            Shape::Known(vec![2, -1])
        );
        assert_eq!(
            Shape::from_proto(&TensorShapeProto::unknown()),
            Shape::UnknownRank
        );
        assert_eq!(
            Shape::from_proto(&TensorShapeProto::default()),
            Shape::scalar()
        );
    }

    #[test]
    fn test_infer_shape_rules() {
        let node = NodeDef::default();
        let a = Shape::from(vec![2, 3]);
        let b = Shape::from(vec![3]);

        assert_eq!(
            infer_shape(ShapeRule::Broadcast, &node, &[a.clone(), b.clone()]).unwrap(),
            Shape::Known(vec![2, 3])
        );
        assert_eq!(
            infer_shape(ShapeRule::Broadcast, &node, &[a.clone(), Shape::UnknownRank]).unwrap(),
            Shape::UnknownRank
        );
        assert_eq!(
            infer_shape(ShapeRule::Unchanged, &node, &[a.clone()]).unwrap(),
            a
        );
        assert_eq!(
            infer_shape(ShapeRule::ShapeOf, &node, &[a]).unwrap(),
            Shape::Known(vec![2])
        );
        assert_eq!(
            infer_shape(ShapeRule::ShapeOf, &node, &[Shape::UnknownRank]).unwrap(),
            Shape::Known(vec![-1])
        );
        assert_eq!(
            infer_shape(ShapeRule::Unknown, &node, &[b]).unwrap(),
            Shape::UnknownRank
        );
    }

    #[test]
    fn test_infer_shape_from_attrs() {
        let mut node = NodeDef::default();
        node.attr.insert(
            "value".to_string(),
            AttrValue::of(attr_value::Value::Tensor(TensorProto {
                dtype: 1,
                tensor_shape: Some(TensorShapeProto::from_dims(&[4])),
                ..Default::default()
            })),
        );
        node.attr.insert(
            "shape".to_string(),
            AttrValue::of(attr_value::Value::Shape(TensorShapeProto::from_dims(&[
                -1, 28, 28,
            ]))),
        );
        node.attr.insert(
            "transpose_b".to_string(),
            AttrValue::of(attr_value::Value::B(true)),
        );

        assert_eq!(
            infer_shape(ShapeRule::ValueAttr, &node, &[]).unwrap(),
            Shape::Known(vec![4])
        );
        assert_eq!(
            infer_shape(ShapeRule::ShapeAttr, &node, &[]).unwrap(),
            Shape::Known(vec![-1, 28, 28])
        );
        assert_eq!(
            infer_shape(
                ShapeRule::MatMul,
                &node,
                &[Shape::from(vec![8, 3]), Shape::from(vec![5, 3])]
            )
            .unwrap(),
            Shape::Known(vec![8, 5])
        );
        assert!(infer_shape(
            ShapeRule::MatMul,
            &node,
            &[Shape::from(vec![8, 3]), Shape::from(vec![3, 5])]
        )
        .is_err());
    }
}
