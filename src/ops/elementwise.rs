//! Unary elementwise operators: morphs and float functions.

use crate::error::{GraphError, Result};
use crate::graph::Graph;
use crate::node::{DataType, NodeId};
use crate::ops::{rules, Operator, Unary};
use crate::shape::Shape;
use std::rc::Rc;

/// Elementwise square. Keeps the parent's data type.
#[derive(Debug, Clone)]
pub struct Square {
    /// The squared node.
    pub parent: NodeId,
}

impl Unary for Square {
    fn parent(&self) -> NodeId {
        self.parent
    }
}

impl Operator for Square {
    fn name(&self) -> &'static str {
        "Square"
    }

    fn parents(&self) -> Vec<NodeId> {
        vec![self.parent]
    }

    fn data_type(&self, graph: &Graph) -> Result<DataType> {
        Ok(rules::inherited(graph, self.parent))
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
        let two = graph.constant(2.0, Shape::scalar())?;
        graph.mul(&[grad, two, self.parent])
    }

    fn copy_to(&self, ancestors: &[NodeId]) -> Rc<dyn Operator> {
        Rc::new(Self {
            parent: ancestors[0],
        })
    }
}

/// Builds the float-typed unary elementwise scaffold; each operator supplies
/// only its gradient rule through an inherent `grad_parent` method.
macro_rules! float_unary_operator {
    ($ty:ident, $name:literal) => {
        impl Unary for $ty {
            fn parent(&self) -> NodeId {
                self.parent
            }
        }

        impl Operator for $ty {
            fn name(&self) -> &'static str {
                $name
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
                self.grad_parent(graph, owner, grad)
            }

            fn copy_to(&self, ancestors: &[NodeId]) -> Rc<dyn Operator> {
                let mut copy = self.clone();
                copy.parent = ancestors[0];
                Rc::new(copy)
            }
        }
    };
}

/// Elementwise exponential.
#[derive(Debug, Clone)]
pub struct Exp {
    /// The exponentiated node.
    pub parent: NodeId,
}

impl Exp {
    fn grad_parent(&self, graph: &mut Graph, owner: NodeId, grad: NodeId) -> Result<NodeId> {
        graph.mul(&[grad, owner])
    }
}

float_unary_operator!(Exp, "Exp");

/// Elementwise natural logarithm.
#[derive(Debug, Clone)]
pub struct Log {
    /// The argument node.
    pub parent: NodeId,
}

impl Log {
    fn grad_parent(&self, graph: &mut Graph, _owner: NodeId, grad: NodeId) -> Result<NodeId> {
        graph.div(grad, self.parent)
    }
}

float_unary_operator!(Log, "Log");

/// Elementwise square root.
#[derive(Debug, Clone)]
pub struct Sqrt {
    /// The argument node.
    pub parent: NodeId,
}

impl Sqrt {
    fn grad_parent(&self, graph: &mut Graph, owner: NodeId, grad: NodeId) -> Result<NodeId> {
        // g / (2 * sqrt(x))
        let two = graph.constant(2.0, Shape::scalar())?;
        let doubled = graph.mul(&[two, owner])?;
        graph.div(grad, doubled)
    }
}

float_unary_operator!(Sqrt, "Sqrt");

/// Logistic function.
#[derive(Debug, Clone)]
pub struct Sigmoid {
    /// The argument node.
    pub parent: NodeId,
}

impl Sigmoid {
    fn grad_parent(&self, graph: &mut Graph, owner: NodeId, grad: NodeId) -> Result<NodeId> {
        // g * s * (1 - s)
        let one = graph.constant(1.0, Shape::scalar())?;
        let complement = graph.sub(one, owner)?;
        graph.mul(&[grad, owner, complement])
    }
}

float_unary_operator!(Sigmoid, "Sigmoid");

/// Hyperbolic tangent.
#[derive(Debug, Clone)]
pub struct Tanh {
    /// The argument node.
    pub parent: NodeId,
}

impl Tanh {
    fn grad_parent(&self, graph: &mut Graph, owner: NodeId, grad: NodeId) -> Result<NodeId> {
        // g * (1 - t^2)
        let one = graph.constant(1.0, Shape::scalar())?;
        let squared = graph.square(owner)?;
        let complement = graph.sub(one, squared)?;
        graph.mul(&[grad, complement])
    }
}

float_unary_operator!(Tanh, "Tanh");

/// `log(exp(x) + 1)`, numerically fused above `threshold` at execution time.
#[derive(Debug, Clone)]
pub struct Softplus {
    /// The argument node.
    pub parent: NodeId,
    /// Linearization threshold carried for executors.
    pub threshold: f64,
}

impl Softplus {
    fn grad_parent(&self, graph: &mut Graph, _owner: NodeId, grad: NodeId) -> Result<NodeId> {
        let sigmoid = graph.sigmoid(self.parent)?;
        graph.mul(&[grad, sigmoid])
    }
}

float_unary_operator!(Softplus, "Softplus");

/// Softmax over the last non-unit axis of the parent.
#[derive(Debug, Clone)]
pub struct Softmax {
    /// The argument node.
    pub parent: NodeId,
    /// Axis the distribution is normalized over.
    pub axis: usize,
}

impl Softmax {
    /// Creates a softmax over the parent's last non-unit axis.
    pub fn new(graph: &Graph, parent: NodeId) -> Result<Self> {
        let order = graph.node(parent).order();
        if order == 0 {
            return Err(GraphError::invalid_arguments(
                "Softmax",
                vec![parent],
                "parent must have at least one non-unit dimension",
            ));
        }
        Ok(Self {
            parent,
            axis: order - 1,
        })
    }

    fn grad_parent(&self, graph: &mut Graph, owner: NodeId, grad: NodeId) -> Result<NodeId> {
        // s * g - s * sum(g * s, axis)
        let weighted = graph.mul(&[grad, owner])?;
        let total = graph.sum(weighted, &[self.axis])?;
        let direct = graph.mul(&[owner, grad])?;
        let correction = graph.mul(&[owner, total])?;
        graph.sub(direct, correction)
    }
}

float_unary_operator!(Softmax, "Softmax");

/// Elementwise binary cross entropy of labels `p` against `q = sigmoid(x)`,
/// computed from the logits `x` without forming `q`:
/// `f = p * softplus(-x) + (1 - p) * softplus(x)`.
#[derive(Debug, Clone)]
pub struct BinaryCrossEntropyLogits {
    /// Target probabilities `p`.
    pub labels: NodeId,
    /// Raw logits `x`.
    pub logits: NodeId,
}

impl crate::ops::Binary for BinaryCrossEntropyLogits {
    fn left(&self) -> NodeId {
        self.labels
    }

    fn right(&self) -> NodeId {
        self.logits
    }
}

impl Operator for BinaryCrossEntropyLogits {
    fn name(&self) -> &'static str {
        "BinaryCrossEntropyLogits"
    }

    fn parents(&self) -> Vec<NodeId> {
        vec![self.labels, self.logits]
    }

    fn data_type(&self, graph: &Graph) -> Result<DataType> {
        Ok(graph.props.max_float)
    }

    fn shape(&self, graph: &Graph) -> Result<Shape> {
        rules::elementwise_shape(self.name(), graph, &[self.labels, self.logits])
    }

    fn backward(
        &self,
        graph: &mut Graph,
        _owner: NodeId,
        grad: NodeId,
        index: usize,
    ) -> Result<NodeId> {
        if index == 0 {
            // df/dp = softplus(-x) - softplus(x)
            let negated = graph.neg(self.logits)?;
            let softplus_minus = graph.softplus(negated)?;
            let softplus = graph.softplus(self.logits)?;
            let diff = graph.sub(softplus_minus, softplus)?;
            graph.mul(&[grad, diff])
        } else {
            // df/dx = sigmoid(x) - p
            let sigmoid = graph.sigmoid(self.logits)?;
            let diff = graph.sub(sigmoid, self.labels)?;
            graph.mul(&[grad, diff])
        }
    }

    fn copy_to(&self, ancestors: &[NodeId]) -> Rc<dyn Operator> {
        Rc::new(Self {
            labels: ancestors[0],
            logits: ancestors[1],
        })
    }
}

/// Elementwise categorical cross entropy of labels `p` against
/// `q = softmax(x)` over the class axis, computed from the logits `x`:
/// `f_i = p_i * (log_sum_exp(x) - x_i)`. The caller sums over the class
/// axis to obtain the loss.
#[derive(Debug, Clone)]
pub struct CategoricalCrossEntropyLogits {
    /// Target probabilities `p`.
    pub labels: NodeId,
    /// Raw logits `x`.
    pub logits: NodeId,
    /// Class axis, the logits' last non-unit axis.
    pub axis: usize,
}

impl CategoricalCrossEntropyLogits {
    /// Creates the cross entropy; the logits must have a class axis.
    pub fn new(graph: &Graph, labels: NodeId, logits: NodeId) -> Result<Self> {
        let order = graph.node(logits).order();
        if order == 0 {
            return Err(GraphError::invalid_arguments(
                "CategoricalCrossEntropyLogits",
                vec![labels, logits],
                "logits must have at least one non-unit dimension",
            ));
        }
        Ok(Self {
            labels,
            logits,
            axis: order - 1,
        })
    }
}

impl crate::ops::Binary for CategoricalCrossEntropyLogits {
    fn left(&self) -> NodeId {
        self.labels
    }

    fn right(&self) -> NodeId {
        self.logits
    }
}

impl Operator for CategoricalCrossEntropyLogits {
    fn name(&self) -> &'static str {
        "CategoricalCrossEntropyLogits"
    }

    fn parents(&self) -> Vec<NodeId> {
        vec![self.labels, self.logits]
    }

    fn data_type(&self, graph: &Graph) -> Result<DataType> {
        Ok(graph.props.max_float)
    }

    fn shape(&self, graph: &Graph) -> Result<Shape> {
        rules::elementwise_shape(self.name(), graph, &[self.labels, self.logits])
    }

    fn backward(
        &self,
        graph: &mut Graph,
        _owner: NodeId,
        grad: NodeId,
        index: usize,
    ) -> Result<NodeId> {
        if index == 0 {
            // df/dp_i = log(Z) - x_i
            let log_z = graph.log_sum_exp(self.logits, &[self.axis])?;
            let diff = graph.sub(log_z, self.logits)?;
            graph.mul(&[grad, diff])
        } else {
            // df/dx_i = p_i - softmax(x)_i
            let softmax = graph.softmax(self.logits)?;
            let diff = graph.sub(self.labels, softmax)?;
            graph.mul(&[grad, diff])
        }
    }

    fn copy_to(&self, ancestors: &[NodeId]) -> Rc<dyn Operator> {
        Rc::new(Self {
            labels: ancestors[0],
            logits: ancestors[1],
            axis: self.axis,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::DataType;
    use crate::sym::SymInt;

    #[test]
    fn elementwise_output_mirrors_parent_shape() {
        let mut g = Graph::new("t");
        let n = g.new_symbol();
        let x = g
            .matrix(DataType::Float32, [SymInt::from(8), n.clone()], "x")
            .unwrap();
        let y = g.tanh(x).unwrap();
        assert_eq!(g.node(y).shape, g.node(x).shape);
        assert_eq!(g.node(y).shape[1], n);
    }

    #[test]
    fn square_keeps_integer_type() {
        let mut g = Graph::new("t");
        let x = g.scalar(DataType::Int32, "x").unwrap();
        let y = g.square(x).unwrap();
        assert_eq!(g.node(y).data_type, DataType::Int32);
        let z = g.exp(x).unwrap();
        assert_eq!(g.node(z).data_type, DataType::Float32);
    }

    #[test]
    fn cross_entropy_is_float_and_elementwise() {
        let mut g = Graph::new("t");
        let n = g.new_symbol();
        let p = g
            .matrix(DataType::Float32, [SymInt::from(10), n.clone()], "p")
            .unwrap();
        let x = g
            .matrix(DataType::Float32, [SymInt::from(10), n], "x")
            .unwrap();
        let bce = g.binary_cross_entropy_logits(p, x).unwrap();
        assert_eq!(g.node(bce).shape, g.node(p).shape);
        assert_eq!(g.node(bce).data_type, DataType::Float32);
        let cce = g.categorical_cross_entropy_logits(p, x).unwrap();
        assert_eq!(g.node(cce).shape, g.node(x).shape);
    }

    #[test]
    fn categorical_cross_entropy_needs_a_class_axis() {
        let mut g = Graph::new("t");
        let p = g.scalar(DataType::Float32, "p").unwrap();
        let x = g.scalar(DataType::Float32, "x").unwrap();
        assert!(g.categorical_cross_entropy_logits(p, x).is_err());
        // The binary form has no class axis and accepts scalars.
        assert!(g.binary_cross_entropy_logits(p, x).is_ok());
    }

    #[test]
    fn cross_entropy_gradients_match_parent_shapes() {
        let mut g = Graph::new("t");
        let n = g.new_symbol();
        let p = g
            .matrix(DataType::Float32, [SymInt::from(10), n.clone()], "p")
            .unwrap();
        let x = g
            .matrix(DataType::Float32, [SymInt::from(10), n], "x")
            .unwrap();
        let ce = g.categorical_cross_entropy_logits(p, x).unwrap();
        let loss = g.sum_all(ce).unwrap();
        let grads = g.gradient(loss, &[x, p]).unwrap();
        assert_eq!(g.node(grads[0]).shape, g.node(x).shape);
        assert_eq!(g.node(grads[1]).shape, g.node(p).shape);

        let bce = g.binary_cross_entropy_logits(p, x).unwrap();
        let bce_loss = g.sum_all(bce).unwrap();
        let bce_grad = g.gradient(bce_loss, &[x]).unwrap()[0];
        assert_eq!(g.node(bce_grad).shape, g.node(x).shape);
    }

    #[test]
    fn softmax_requires_non_scalar_parent() {
        let mut g = Graph::new("t");
        let x = g.scalar(DataType::Float32, "x").unwrap();
        assert!(g.softmax(x).is_err());
        let v = g.vector(DataType::Float32, 10, "v").unwrap();
        let s = g.softmax(v).unwrap();
        assert_eq!(g.node(s).shape, g.node(v).shape);
    }
}
