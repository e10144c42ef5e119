//! Boolean operators. All produce `Bool` outputs and reject gradients.

use crate::error::Result;
use crate::graph::Graph;
use crate::node::{DataType, NodeId};
use crate::ops::{rules, Binary, Operator, Unary};
use crate::shape::Shape;
use std::rc::Rc;

/// Elementwise logical negation.
#[derive(Debug, Clone)]
pub struct Not {
    /// The negated node.
    pub parent: NodeId,
}

impl Unary for Not {
    fn parent(&self) -> NodeId {
        self.parent
    }
}

impl Operator for Not {
    fn name(&self) -> &'static str {
        "Not"
    }

    fn parents(&self) -> Vec<NodeId> {
        vec![self.parent]
    }

    fn data_type(&self, _graph: &Graph) -> Result<DataType> {
        Ok(DataType::Bool)
    }

    fn shape(&self, graph: &Graph) -> Result<Shape> {
        Ok(graph.node(self.parent).shape.clone())
    }

    fn is_differentiable(&self) -> bool {
        false
    }

    fn backward(
        &self,
        _graph: &mut Graph,
        owner: NodeId,
        grad: NodeId,
        _index: usize,
    ) -> Result<NodeId> {
        Err(rules::reject_gradient(self.name(), owner, grad))
    }

    fn copy_to(&self, ancestors: &[NodeId]) -> Rc<dyn Operator> {
        Rc::new(Self {
            parent: ancestors[0],
        })
    }
}

macro_rules! comparison_operator {
    ($ty:ident, $name:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone)]
        pub struct $ty {
            /// Left-hand operand.
            pub left: NodeId,
            /// Right-hand operand.
            pub right: NodeId,
        }

        impl Binary for $ty {
            fn left(&self) -> NodeId {
                self.left
            }

            fn right(&self) -> NodeId {
                self.right
            }
        }

        impl Operator for $ty {
            fn name(&self) -> &'static str {
                $name
            }

            fn parents(&self) -> Vec<NodeId> {
                vec![self.left, self.right]
            }

            fn data_type(&self, _graph: &Graph) -> Result<DataType> {
                Ok(DataType::Bool)
            }

            fn shape(&self, graph: &Graph) -> Result<Shape> {
                rules::elementwise_shape(self.name(), graph, &[self.left, self.right])
            }

            fn is_differentiable(&self) -> bool {
                false
            }

            fn backward(
                &self,
                _graph: &mut Graph,
                owner: NodeId,
                grad: NodeId,
                _index: usize,
            ) -> Result<NodeId> {
                Err(rules::reject_gradient(self.name(), owner, grad))
            }

            fn copy_to(&self, ancestors: &[NodeId]) -> Rc<dyn Operator> {
                Rc::new(Self {
                    left: ancestors[0],
                    right: ancestors[1],
                })
            }
        }
    };
}

comparison_operator!(GreaterThan, "GreaterThan", "Elementwise `left > right`.");
comparison_operator!(LessThan, "LessThan", "Elementwise `left < right`.");
comparison_operator!(
    GreaterOrEqual,
    "GreaterOrEqual",
    "Elementwise `left >= right`."
);
comparison_operator!(LessOrEqual, "LessOrEqual", "Elementwise `left <= right`.");
