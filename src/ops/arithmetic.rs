//! Elementwise arithmetic operators.

use crate::error::Result;
use crate::graph::Graph;
use crate::node::{DataType, NodeId};
use crate::ops::{rules, Associative, Operator, Unary};
use crate::shape::Shape;
use std::rc::Rc;

/// N-ary elementwise addition.
#[derive(Debug, Clone)]
pub struct Add {
    operands: Vec<NodeId>,
}

impl Add {
    /// Creates an addition over at least two operands.
    pub fn new(operands: Vec<NodeId>) -> Result<Self> {
        rules::check_associative("Add", &operands)?;
        Ok(Self { operands })
    }
}

impl Associative for Add {
    fn operands(&self) -> &[NodeId] {
        &self.operands
    }
}

impl Operator for Add {
    fn name(&self) -> &'static str {
        "Add"
    }

    fn parents(&self) -> Vec<NodeId> {
        self.operands.clone()
    }

    fn data_type(&self, graph: &Graph) -> Result<DataType> {
        Ok(rules::promoted(graph, &self.operands))
    }

    fn shape(&self, graph: &Graph) -> Result<Shape> {
        rules::elementwise_shape(self.name(), graph, &self.operands)
    }

    fn backward(
        &self,
        _graph: &mut Graph,
        _owner: NodeId,
        grad: NodeId,
        _index: usize,
    ) -> Result<NodeId> {
        Ok(grad)
    }

    fn copy_to(&self, ancestors: &[NodeId]) -> Rc<dyn Operator> {
        Rc::new(Self {
            operands: ancestors.to_vec(),
        })
    }
}

/// Elementwise negation.
#[derive(Debug, Clone)]
pub struct Neg {
    /// The negated node.
    pub parent: NodeId,
}

impl Unary for Neg {
    fn parent(&self) -> NodeId {
        self.parent
    }
}

impl Operator for Neg {
    fn name(&self) -> &'static str {
        "Neg"
    }

    fn parents(&self) -> Vec<NodeId> {
        vec![self.parent]
    }

    fn data_type(&self, graph: &Graph) -> Result<DataType> {
        // Unsigned operands become signed.
        Ok(rules::inherited(graph, self.parent).signed())
    }

    fn shape(&self, graph: &Graph) -> Result<Shape> {
        Ok(graph.node(self.parent).shape.clone())
    }

    fn backward(
        &self,
        graph: &mut Graph,
        _owner: NodeId,
        grad: NodeId,
        _index: usize,
    ) -> Result<NodeId> {
        graph.neg(grad)
    }

    fn copy_to(&self, ancestors: &[NodeId]) -> Rc<dyn Operator> {
        Rc::new(Self {
            parent: ancestors[0],
        })
    }
}

/// N-ary elementwise multiplication.
#[derive(Debug, Clone)]
pub struct Mul {
    operands: Vec<NodeId>,
}

impl Mul {
    /// Creates a multiplication over at least two operands.
    pub fn new(operands: Vec<NodeId>) -> Result<Self> {
        rules::check_associative("Mul", &operands)?;
        Ok(Self { operands })
    }
}

impl Associative for Mul {
    fn operands(&self) -> &[NodeId] {
        &self.operands
    }
}

impl Operator for Mul {
    fn name(&self) -> &'static str {
        "Mul"
    }

    fn parents(&self) -> Vec<NodeId> {
        self.operands.clone()
    }

    fn data_type(&self, graph: &Graph) -> Result<DataType> {
        Ok(rules::promoted(graph, &self.operands))
    }

    fn shape(&self, graph: &Graph) -> Result<Shape> {
        rules::elementwise_shape(self.name(), graph, &self.operands)
    }

    fn backward(
        &self,
        graph: &mut Graph,
        owner: NodeId,
        grad: NodeId,
        index: usize,
    ) -> Result<NodeId> {
        if self.operands.len() == 2 {
            graph.mul(&[grad, self.operands[1 - index]])
        } else {
            // For longer chains, divide the full product back out.
            let scaled = graph.mul(&[grad, owner])?;
            graph.div(scaled, self.operands[index])
        }
    }

    fn copy_to(&self, ancestors: &[NodeId]) -> Rc<dyn Operator> {
        Rc::new(Self {
            operands: ancestors.to_vec(),
        })
    }
}

/// Elementwise multiplicative inverse (`1 / x`).
#[derive(Debug, Clone)]
pub struct Reciprocal {
    /// The inverted node.
    pub parent: NodeId,
}

impl Unary for Reciprocal {
    fn parent(&self) -> NodeId {
        self.parent
    }
}

impl Operator for Reciprocal {
    fn name(&self) -> &'static str {
        "Reciprocal"
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
        _owner: NodeId,
        grad: NodeId,
        _index: usize,
    ) -> Result<NodeId> {
        // d(1/x) = -g / x^2
        let squared = graph.square(self.parent)?;
        let scaled = graph.div(grad, squared)?;
        graph.neg(scaled)
    }

    fn copy_to(&self, ancestors: &[NodeId]) -> Rc<dyn Operator> {
        Rc::new(Self {
            parent: ancestors[0],
        })
    }
}

/// Elementwise integer division.
#[derive(Debug, Clone)]
pub struct IntDiv {
    /// Dividend.
    pub left: NodeId,
    /// Divisor.
    pub right: NodeId,
}

/// Elementwise integer modulus.
#[derive(Debug, Clone)]
pub struct IntMod {
    /// Dividend.
    pub left: NodeId,
    /// Divisor.
    pub right: NodeId,
}

macro_rules! integer_binary_operator {
    ($ty:ident, $name:literal) => {
        impl crate::ops::Binary for $ty {
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

            fn data_type(&self, graph: &Graph) -> Result<DataType> {
                Ok(graph.props.max_int)
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

integer_binary_operator!(IntDiv, "IntDiv");
integer_binary_operator!(IntMod, "IntMod");
