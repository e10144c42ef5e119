//! The operator taxonomy.
//!
//! Every node owns exactly one [`Operator`]. An operator is a composition of
//! four orthogonal capability axes:
//!
//! - **Arity**: [`Unary`], [`Binary`] or [`Associative`] parent access, or
//!   no parents at all (orphans such as inputs and constants).
//! - **Shape rule**: elementwise mirroring, reduction collapse, or an
//!   operator-specific rule (see [`rules`] and the linalg operators).
//! - **Data-type rule**: inherited, max-promoted, or forced to a constant,
//!   boolean, integer or float type (see [`rules`]).
//! - **Differentiability**: differentiable by default; logical, integer and
//!   constant operators reject gradient requests with a
//!   [`WrongGradient`](crate::error::GraphError::WrongGradient) error.
//!
//! Concrete operators pick one behavior per axis by delegating to the shared
//! rule helpers, so no inheritance chain is needed.

pub mod arithmetic;
pub mod elementwise;
pub mod input;
pub mod linalg;
pub mod logical;
pub mod reduction;

use crate::error::Result;
use crate::graph::Graph;
use crate::node::{DataType, NodeId};
use crate::shape::Shape;
use std::fmt;
use std::rc::Rc;

/// The computation rule attached to a node.
///
/// Shape and data-type inference run eagerly when the node is created, against
/// ancestors already registered in the owning graph. `backward` produces the
/// gradient expression with respect to the parent at `index`, given the
/// combined incoming gradient message.
pub trait Operator: fmt::Debug {
    /// Unique name tag of the concrete operator.
    fn name(&self) -> &'static str;

    /// Ancestors that influence the output in a differentiable way.
    fn parents(&self) -> Vec<NodeId>;

    /// Ancestors that influence the output in a non-differentiable way.
    fn arguments(&self) -> Vec<NodeId> {
        Vec::new()
    }

    /// Union of parents and arguments.
    fn ancestors(&self) -> Vec<NodeId> {
        let mut all = self.parents();
        all.extend(self.arguments());
        all
    }

    /// Infers the output data type from the already-registered ancestors.
    fn data_type(&self, graph: &Graph) -> Result<DataType>;

    /// Infers the output shape from the already-registered ancestors.
    fn shape(&self, graph: &Graph) -> Result<Shape>;

    /// Whether gradients can flow through this operator.
    fn is_differentiable(&self) -> bool {
        true
    }

    /// Whether the output depends on runtime input data.
    fn is_input_dependent(&self, graph: &Graph) -> bool {
        self.ancestors()
            .iter()
            .any(|&a| graph.node(a).op.is_input_dependent(graph))
    }

    /// The maximum grad level among the ancestors.
    fn grad_level(&self, graph: &Graph) -> u16 {
        self.ancestors()
            .iter()
            .map(|&a| graph.node(a).grad_level)
            .max()
            .unwrap_or(0)
    }

    /// Builds the gradient with respect to the parent at `index`, given the
    /// combined incoming gradient `grad` for the owning node `owner`.
    fn backward(
        &self,
        graph: &mut Graph,
        owner: NodeId,
        grad: NodeId,
        index: usize,
    ) -> Result<NodeId>;

    /// Combines multiple incoming gradient messages into one. The default is
    /// an elementwise sum; multi-output operators may override it.
    fn combine(&self, graph: &mut Graph, _owner: NodeId, grads: &[NodeId]) -> Result<NodeId> {
        graph.add(grads)
    }

    /// Clones this operator with its ancestors rebound to `ancestors`, for
    /// migration into another graph.
    fn copy_to(&self, ancestors: &[NodeId]) -> Rc<dyn Operator>;
}

/// Arity axis: exactly one differentiable parent.
pub trait Unary {
    /// The sole parent.
    fn parent(&self) -> NodeId;
}

/// Arity axis: exactly two differentiable parents.
pub trait Binary {
    /// The first parent.
    fn left(&self) -> NodeId;
    /// The second parent.
    fn right(&self) -> NodeId;
}

/// Arity axis: two or more order-preserving operands.
pub trait Associative {
    /// The operands, in the order supplied at construction.
    fn operands(&self) -> &[NodeId];
}

/// Shared shape and data-type rules, one function per capability choice.
pub mod rules {
    use super::*;
    use crate::error::GraphError;

    /// Shape axis: every parent must share one shape; the output mirrors it.
    ///
    /// Implicit broadcasting is resolved before operator construction by the
    /// graph-level helpers, which wrap mismatched operands in explicit
    /// `Broadcast` nodes.
    pub fn elementwise_shape(op: &'static str, graph: &Graph, parents: &[NodeId]) -> Result<Shape> {
        let first = graph.node(parents[0]).shape.clone();
        for &p in &parents[1..] {
            if graph.node(p).shape != first {
                return Err(GraphError::incompatible_shapes(
                    op,
                    parents.to_vec(),
                    parents
                        .iter()
                        .map(|&n| graph.node(n).shape.to_string())
                        .collect(),
                ));
            }
        }
        Ok(first)
    }

    /// Shape axis: the parent shape with the reduced axes collapsed to 1.
    pub fn reduction_shape(graph: &Graph, parent: NodeId, axes: &[usize]) -> Shape {
        let mut shape = graph.node(parent).shape.clone();
        for &axis in axes {
            shape[axis] = crate::sym::SymInt::one();
        }
        shape
    }

    /// Validates a reduction axis set: in range, no duplicates, non-empty.
    /// Axes whose parent dimension is already statically 1 are dropped.
    pub fn clean_axes(
        op: &'static str,
        graph: &Graph,
        parent: NodeId,
        axes: &[usize],
    ) -> Result<Vec<usize>> {
        if axes.is_empty() {
            return Err(GraphError::invalid_arguments(
                op,
                vec![parent],
                "invalid axes: NULL",
            ));
        }
        let mut cleaned = Vec::with_capacity(axes.len());
        for &axis in axes {
            if axis >= 4 || cleaned.contains(&axis) {
                return Err(GraphError::invalid_arguments(
                    op,
                    vec![parent],
                    format!("invalid axes: {axes:?}"),
                ));
            }
            cleaned.push(axis);
        }
        let shape = &graph.node(parent).shape;
        cleaned.retain(|&axis| !shape[axis].is_one());
        Ok(cleaned)
    }

    /// Data-type axis: maximum promotion across all parents.
    pub fn promoted(graph: &Graph, parents: &[NodeId]) -> DataType {
        parents
            .iter()
            .map(|&p| graph.node(p).data_type)
            .max()
            .unwrap_or(DataType::Float32)
    }

    /// Data-type axis: inherited from the sole parent.
    pub fn inherited(graph: &Graph, parent: NodeId) -> DataType {
        graph.node(parent).data_type
    }

    /// Arity validation for associative operators.
    pub fn check_associative(op: &'static str, operands: &[NodeId]) -> Result<()> {
        if operands.len() < 2 {
            return Err(GraphError::invalid_arguments(
                op,
                operands.to_vec(),
                "associative operators require at least 2 parents",
            ));
        }
        Ok(())
    }

    /// Differentiability axis: shared rejection for non-differentiable and
    /// orphan operators.
    pub fn reject_gradient(op: &'static str, owner: NodeId, grad: NodeId) -> GraphError {
        GraphError::wrong_gradient(op, owner, grad)
    }
}
