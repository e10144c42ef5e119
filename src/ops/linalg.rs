//! Matrix operators.
//!
//! All of these work on the first two dimensions only; parents must be
//! matrices (order at most 2), and several require square matrices.

use crate::error::{GraphError, Result};
use crate::graph::Graph;
use crate::node::{DataType, NodeId};
use crate::ops::{Operator, Unary};
use crate::shape::Shape;
use std::rc::Rc;

fn check_square(op: &'static str, graph: &Graph, parent: NodeId) -> Result<()> {
    let shape = &graph.node(parent).shape;
    if shape[0] != shape[1] || !shape[2].is_one() || !shape[3].is_one() {
        return Err(GraphError::invalid_arguments(
            op,
            vec![parent],
            "parent must be a square matrix",
        ));
    }
    Ok(())
}

/// Chained general matrix multiplication with per-operand transposition
/// flags.
///
/// For `M = A B C` with output gradient `D`, the gradient with respect to
/// `B` is `Aᵀ D Cᵀ`, and with respect to a transposed operand `Bᵀ` it is
/// `C Dᵀ A`; `backward` builds exactly that composition as a single chained
/// multiplication.
#[derive(Debug, Clone)]
pub struct MatMul {
    /// Operands, multiplied left to right.
    pub operands: Vec<NodeId>,
    /// Per-operand transposition flags, same length as `operands`.
    pub transpositions: Vec<bool>,
    shape: Shape,
}

impl MatMul {
    /// Creates a chained multiplication, validating matrix orders and the
    /// symbolic equality of every contraction dimension. An empty
    /// `transpositions` means no operand is transposed.
    pub fn new(graph: &Graph, operands: Vec<NodeId>, transpositions: Vec<bool>) -> Result<Self> {
        crate::ops::rules::check_associative("MatrixMul", &operands)?;
        let transpositions = if transpositions.is_empty() {
            vec![false; operands.len()]
        } else if transpositions.len() == operands.len() {
            transpositions
        } else {
            return Err(GraphError::invalid_arguments(
                "MatrixMul",
                operands,
                "transposition flags must match the number of operands",
            ));
        };
        if graph.node(operands[0]).order() > 2 {
            return Err(GraphError::invalid_arguments(
                "MatrixMul",
                operands,
                "parent 0 is not a matrix",
            ));
        }
        let mut shape = graph.node(operands[0]).shape.clone();
        if transpositions[0] {
            shape.0.swap(0, 1);
        }
        for i in 1..operands.len() {
            if graph.node(operands[i]).order() > 2 {
                return Err(GraphError::invalid_arguments(
                    "MatrixMul",
                    operands,
                    format!("parent {i} is not a matrix"),
                ));
            }
            let incoming = &graph.node(operands[i]).shape;
            let contraction = &incoming[usize::from(transpositions[i])];
            if *contraction != shape[1] {
                let shapes = operands
                    .iter()
                    .map(|&n| graph.node(n).shape.to_string())
                    .collect();
                return Err(GraphError::incompatible_shapes(
                    "MatrixMul",
                    operands,
                    shapes,
                ));
            }
            shape[1] = incoming[1 - usize::from(transpositions[i])].clone();
        }
        Ok(Self {
            operands,
            transpositions,
            shape,
        })
    }
}

impl Operator for MatMul {
    fn name(&self) -> &'static str {
        "MatrixMul"
    }

    fn parents(&self) -> Vec<NodeId> {
        self.operands.clone()
    }

    fn data_type(&self, graph: &Graph) -> Result<DataType> {
        Ok(graph.props.max_float)
    }

    fn shape(&self, _graph: &Graph) -> Result<Shape> {
        Ok(self.shape.clone())
    }

    fn backward(
        &self,
        graph: &mut Graph,
        _owner: NodeId,
        grad: NodeId,
        index: usize,
    ) -> Result<NodeId> {
        let mut left = Vec::new();
        let mut left_trans = Vec::new();
        let mut right = Vec::new();
        let mut right_trans = Vec::new();
        for i in 0..index {
            if self.transpositions[i] {
                right.push(self.operands[i]);
                right_trans.push(true);
            } else {
                left.push(self.operands[i]);
                left_trans.push(true);
            }
        }
        for i in index + 1..self.operands.len() {
            if self.transpositions[i] {
                left.push(self.operands[i]);
                left_trans.push(true);
            } else {
                right.push(self.operands[i]);
                right_trans.push(true);
            }
        }
        if !self.transpositions[index] {
            left.reverse();
            left_trans.reverse();
            right.reverse();
            right_trans.reverse();
        }
        left.push(grad);
        left_trans.push(self.transpositions[index]);
        left.extend(right);
        left_trans.extend(right_trans);
        graph.gemm(&left, &left_trans)
    }

    fn copy_to(&self, ancestors: &[NodeId]) -> Rc<dyn Operator> {
        let mut copy = self.clone();
        copy.operands = ancestors.to_vec();
        Rc::new(copy)
    }
}

/// Matrix transposition.
#[derive(Debug, Clone)]
pub struct Transpose {
    /// The transposed node.
    pub parent: NodeId,
}

impl Transpose {
    /// Creates a transposition of a matrix.
    pub fn new(graph: &Graph, parent: NodeId) -> Result<Self> {
        if graph.node(parent).order() > 2 {
            return Err(GraphError::invalid_arguments(
                "Transpose",
                vec![parent],
                "parent is not a matrix",
            ));
        }
        Ok(Self { parent })
    }
}

impl Unary for Transpose {
    fn parent(&self) -> NodeId {
        self.parent
    }
}

impl Operator for Transpose {
    fn name(&self) -> &'static str {
        "Transpose"
    }

    fn parents(&self) -> Vec<NodeId> {
        vec![self.parent]
    }

    fn data_type(&self, graph: &Graph) -> Result<DataType> {
        Ok(crate::ops::rules::inherited(graph, self.parent))
    }

    fn shape(&self, graph: &Graph) -> Result<Shape> {
        let mut shape = graph.node(self.parent).shape.clone();
        shape.0.swap(0, 1);
        Ok(shape)
    }

    fn backward(
        &self,
        graph: &mut Graph,
        _owner: NodeId,
        grad: NodeId,
        _index: usize,
    ) -> Result<NodeId> {
        graph.transpose(grad)
    }

    fn copy_to(&self, ancestors: &[NodeId]) -> Rc<dyn Operator> {
        Rc::new(Self {
            parent: ancestors[0],
        })
    }
}

/// Inverse of a square matrix.
#[derive(Debug, Clone)]
pub struct MatrixInverse {
    /// The inverted node.
    pub parent: NodeId,
}

impl MatrixInverse {
    /// Creates an inverse; the parent must be square.
    pub fn new(graph: &Graph, parent: NodeId) -> Result<Self> {
        check_square("MatrixInv", graph, parent)?;
        Ok(Self { parent })
    }
}

impl Unary for MatrixInverse {
    fn parent(&self) -> NodeId {
        self.parent
    }
}

impl Operator for MatrixInverse {
    fn name(&self) -> &'static str {
        "MatrixInv"
    }

    fn parents(&self) -> Vec<NodeId> {
        vec![self.parent]
    }

    fn data_type(&self, graph: &Graph) -> Result<DataType> {
        Ok(graph.props.max_float)
    }

    fn shape(&self, graph: &Graph) -> Result<Shape> {
        Ok(graph.node(self.parent).shape.clone())
    }

    fn backward(
        &self,
        graph: &mut Graph,
        owner: NodeId,
        grad: NodeId,
        _index: usize,
    ) -> Result<NodeId> {
        // d(X^-1) = -X^-T G X^-T
        let product = graph.gemm(&[owner, grad, owner], &[true, false, true])?;
        graph.neg(product)
    }

    fn copy_to(&self, ancestors: &[NodeId]) -> Rc<dyn Operator> {
        Rc::new(Self {
            parent: ancestors[0],
        })
    }
}

/// Determinant of a square matrix.
#[derive(Debug, Clone)]
pub struct Determinant {
    /// The argument node.
    pub parent: NodeId,
}

impl Determinant {
    /// Creates a determinant; the parent must be square.
    pub fn new(graph: &Graph, parent: NodeId) -> Result<Self> {
        check_square("Det", graph, parent)?;
        Ok(Self { parent })
    }
}

impl Unary for Determinant {
    fn parent(&self) -> NodeId {
        self.parent
    }
}

impl Operator for Determinant {
    fn name(&self) -> &'static str {
        "Det"
    }

    fn parents(&self) -> Vec<NodeId> {
        vec![self.parent]
    }

    fn data_type(&self, graph: &Graph) -> Result<DataType> {
        Ok(graph.props.max_float)
    }

    fn shape(&self, _graph: &Graph) -> Result<Shape> {
        Ok(Shape::scalar())
    }

    fn backward(
        &self,
        graph: &mut Graph,
        owner: NodeId,
        grad: NodeId,
        _index: usize,
    ) -> Result<NodeId> {
        // d det(X) = det(X) X^-T
        let inverse = graph.matrix_inverse(self.parent)?;
        let cofactor = graph.transpose(inverse)?;
        graph.mul(&[grad, owner, cofactor])
    }

    fn copy_to(&self, ancestors: &[NodeId]) -> Rc<dyn Operator> {
        Rc::new(Self {
            parent: ancestors[0],
        })
    }
}

/// Natural logarithm of the determinant of a square matrix.
#[derive(Debug, Clone)]
pub struct LogDeterminant {
    /// The argument node.
    pub parent: NodeId,
}

impl LogDeterminant {
    /// Creates a log-determinant; the parent must be square.
    pub fn new(graph: &Graph, parent: NodeId) -> Result<Self> {
        check_square("LogDet", graph, parent)?;
        Ok(Self { parent })
    }
}

impl Unary for LogDeterminant {
    fn parent(&self) -> NodeId {
        self.parent
    }
}

impl Operator for LogDeterminant {
    fn name(&self) -> &'static str {
        "LogDet"
    }

    fn parents(&self) -> Vec<NodeId> {
        vec![self.parent]
    }

    fn data_type(&self, graph: &Graph) -> Result<DataType> {
        Ok(graph.props.max_float)
    }

    fn shape(&self, _graph: &Graph) -> Result<Shape> {
        Ok(Shape::scalar())
    }

    fn backward(
        &self,
        graph: &mut Graph,
        _owner: NodeId,
        grad: NodeId,
        _index: usize,
    ) -> Result<NodeId> {
        // d logdet(X) = X^-T
        let inverse = graph.matrix_inverse(self.parent)?;
        let cofactor = graph.transpose(inverse)?;
        graph.mul(&[grad, cofactor])
    }

    fn copy_to(&self, ancestors: &[NodeId]) -> Rc<dyn Operator> {
        Rc::new(Self {
            parent: ancestors[0],
        })
    }
}

/// Trace of a square matrix. Keeps the parent's data type.
#[derive(Debug, Clone)]
pub struct Trace {
    /// The argument node.
    pub parent: NodeId,
}

impl Trace {
    /// Creates a trace; the parent must be square.
    pub fn new(graph: &Graph, parent: NodeId) -> Result<Self> {
        check_square("Trace", graph, parent)?;
        Ok(Self { parent })
    }
}

impl Unary for Trace {
    fn parent(&self) -> NodeId {
        self.parent
    }
}

impl Operator for Trace {
    fn name(&self) -> &'static str {
        "Trace"
    }

    fn parents(&self) -> Vec<NodeId> {
        vec![self.parent]
    }

    fn data_type(&self, graph: &Graph) -> Result<DataType> {
        Ok(crate::ops::rules::inherited(graph, self.parent))
    }

    fn shape(&self, _graph: &Graph) -> Result<Shape> {
        Ok(Shape::scalar())
    }

    fn backward(
        &self,
        graph: &mut Graph,
        _owner: NodeId,
        grad: NodeId,
        _index: usize,
    ) -> Result<NodeId> {
        let size = graph.node(self.parent).shape[0].clone();
        let eye = graph.eye(size)?;
        graph.mul(&[grad, eye])
    }

    fn copy_to(&self, ancestors: &[NodeId]) -> Rc<dyn Operator> {
        Rc::new(Self {
            parent: ancestors[0],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::DataType;
    use crate::sym::SymInt;

    #[test]
    fn matmul_contracts_inner_dimensions() {
        let mut g = Graph::new("t");
        let n = g.new_symbol();
        let a = g
            .matrix(DataType::Float32, [SymInt::from(784), n.clone()], "a")
            .unwrap();
        let w = g
            .matrix(DataType::Float32, [SymInt::from(500), SymInt::from(784)], "w")
            .unwrap();
        let h = g.dot(w, a).unwrap();
        assert_eq!(g.node(h).shape, Shape::matrix(500, n));
    }

    #[test]
    fn matmul_rejects_symbolically_distinct_inner_dims() {
        let mut g = Graph::new("t");
        let n = g.new_symbol();
        let m = g.new_symbol();
        let a = g
            .matrix(DataType::Float32, [SymInt::from(3), n], "a")
            .unwrap();
        let b = g
            .matrix(DataType::Float32, [m, SymInt::from(5)], "b")
            .unwrap();
        assert!(matches!(
            g.dot(a, b),
            Err(crate::error::GraphError::IncompatibleShapes { .. })
        ));
    }

    #[test]
    fn matmul_accepts_symbolically_equal_inner_dims() {
        let mut g = Graph::new("t");
        let n = g.new_symbol();
        let a = g
            .matrix(DataType::Float32, [SymInt::from(3), n.clone() * 2], "a")
            .unwrap();
        let b = g
            .matrix(DataType::Float32, [n * 2, SymInt::from(5)], "b")
            .unwrap();
        assert!(g.dot(a, b).is_ok());
    }

    #[test]
    fn transposition_flags_swap_operand_dims() {
        let mut g = Graph::new("t");
        let a = g
            .matrix(DataType::Float32, [SymInt::from(3), SymInt::from(4)], "a")
            .unwrap();
        let b = g
            .matrix(DataType::Float32, [SymInt::from(3), SymInt::from(5)], "b")
            .unwrap();
        // a' (4x3) times b (3x5) gives 4x5.
        let c = g.gemm(&[a, b], &[true, false]).unwrap();
        assert_eq!(g.node(c).shape, Shape::matrix(4, 5));
    }

    #[test]
    fn matmul_gradients_transpose_the_other_operand() {
        let mut g = Graph::new("t");
        let n = g.new_symbol();
        let a = g
            .matrix(DataType::Float32, [SymInt::from(784), n.clone()], "a")
            .unwrap();
        let w = g
            .matrix(DataType::Float32, [SymInt::from(500), SymInt::from(784)], "w")
            .unwrap();
        let h = g.dot(w, a).unwrap();
        let seed = g
            .ones(DataType::Float32, g.node(h).shape.clone())
            .unwrap();
        let op = std::rc::Rc::clone(&g.node(h).op);
        // d/dW = D A^T is 500x784, d/dA = W^T D is 784xn.
        let dw = op.backward(&mut g, h, seed, 0).unwrap();
        assert_eq!(g.node(dw).shape, g.node(w).shape);
        let da = op.backward(&mut g, h, seed, 1).unwrap();
        assert_eq!(g.node(da).shape, g.node(a).shape);
    }

    #[test]
    fn square_matrix_checks() {
        let mut g = Graph::new("t");
        let a = g
            .matrix(DataType::Float32, [SymInt::from(3), SymInt::from(4)], "a")
            .unwrap();
        assert!(g.determinant(a).is_err());
        assert!(g.matrix_inverse(a).is_err());
        assert!(g.trace(a).is_err());
        let s = g.square_matrix(DataType::Float32, 3, "s").unwrap();
        assert!(g.trace(s).is_ok());
        let d = g.determinant(s).unwrap();
        assert!(g.node(d).shape.is_scalar());
    }
}
