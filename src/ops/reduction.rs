//! Reductions and their inverse, broadcasting.

use crate::error::{GraphError, Result};
use crate::graph::Graph;
use crate::node::{DataType, NodeId};
use crate::ops::{rules, Operator, Unary};
use crate::shape::Shape;
use std::rc::Rc;

/// Summation over a set of axes. Reduced axes collapse to extent 1.
#[derive(Debug, Clone)]
pub struct Sum {
    /// The reduced node.
    pub parent: NodeId,
    /// Axes to reduce, already validated and deduplicated.
    pub axes: Vec<usize>,
}

impl Sum {
    /// Creates a sum over `axes` of `parent`. Axes must be in range and
    /// unique; axes that are statically 1 are dropped.
    pub fn new(graph: &Graph, parent: NodeId, axes: &[usize]) -> Result<Self> {
        let axes = rules::clean_axes("Sum", graph, parent, axes)?;
        Ok(Self { parent, axes })
    }
}

impl Unary for Sum {
    fn parent(&self) -> NodeId {
        self.parent
    }
}

impl Operator for Sum {
    fn name(&self) -> &'static str {
        "Sum"
    }

    fn parents(&self) -> Vec<NodeId> {
        vec![self.parent]
    }

    fn data_type(&self, graph: &Graph) -> Result<DataType> {
        Ok(rules::inherited(graph, self.parent))
    }

    fn shape(&self, graph: &Graph) -> Result<Shape> {
        Ok(rules::reduction_shape(graph, self.parent, &self.axes))
    }

    fn backward(
        &self,
        graph: &mut Graph,
        _owner: NodeId,
        grad: NodeId,
        _index: usize,
    ) -> Result<NodeId> {
        let to = graph.node(self.parent).shape.clone();
        graph.broadcast(grad, to)
    }

    fn copy_to(&self, ancestors: &[NodeId]) -> Rc<dyn Operator> {
        Rc::new(Self {
            parent: ancestors[0],
            axes: self.axes.clone(),
        })
    }
}

/// `log(sum(exp(x), axes))`, computed stably above `threshold` at execution
/// time.
#[derive(Debug, Clone)]
pub struct LogSumExp {
    /// The reduced node.
    pub parent: NodeId,
    /// Axes to reduce, already validated and deduplicated.
    pub axes: Vec<usize>,
    /// Stabilization threshold carried for executors.
    pub threshold: f64,
}

impl LogSumExp {
    /// Creates a log-sum-exp over `axes` of `parent`.
    pub fn new(graph: &Graph, parent: NodeId, axes: &[usize], threshold: f64) -> Result<Self> {
        let axes = rules::clean_axes("LogSumExp", graph, parent, axes)?;
        Ok(Self {
            parent,
            axes,
            threshold,
        })
    }
}

impl Unary for LogSumExp {
    fn parent(&self) -> NodeId {
        self.parent
    }
}

impl Operator for LogSumExp {
    fn name(&self) -> &'static str {
        "LogSumExp"
    }

    fn parents(&self) -> Vec<NodeId> {
        vec![self.parent]
    }

    fn data_type(&self, graph: &Graph) -> Result<DataType> {
        Ok(graph.props.max_float)
    }

    fn shape(&self, graph: &Graph) -> Result<Shape> {
        Ok(rules::reduction_shape(graph, self.parent, &self.axes))
    }

    fn backward(
        &self,
        graph: &mut Graph,
        _owner: NodeId,
        grad: NodeId,
        _index: usize,
    ) -> Result<NodeId> {
        // d lse(x) / dx = softmax(x); the elementwise product broadcasts the
        // reduced gradient back over the collapsed axes.
        let softmax = graph.softmax(self.parent)?;
        graph.mul(&[grad, softmax])
    }

    fn copy_to(&self, ancestors: &[NodeId]) -> Rc<dyn Operator> {
        let mut copy = self.clone();
        copy.parent = ancestors[0];
        Rc::new(copy)
    }
}

/// Replicates unit dimensions of the parent up to a target shape.
#[derive(Debug, Clone)]
pub struct Broadcast {
    /// The replicated node.
    pub parent: NodeId,
    /// Target shape.
    pub to: Shape,
}

impl Broadcast {
    /// Creates a broadcast of `parent` to `to`. Every parent dimension must
    /// either equal the target dimension or be statically 1.
    pub fn new(graph: &Graph, parent: NodeId, to: Shape) -> Result<Self> {
        let from = &graph.node(parent).shape;
        for axis in 0..4 {
            if from[axis] != to[axis] && !from[axis].is_one() {
                return Err(GraphError::incompatible_shapes(
                    "Broadcast",
                    vec![parent],
                    vec![from.to_string(), to.to_string()],
                ));
            }
        }
        Ok(Self { parent, to })
    }

    /// Axes along which the parent is actually replicated.
    pub fn expanded_axes(&self, graph: &Graph) -> Vec<usize> {
        let from = &graph.node(self.parent).shape;
        (0..4)
            .filter(|&axis| from[axis].is_one() && !self.to[axis].is_one())
            .collect()
    }
}

impl Unary for Broadcast {
    fn parent(&self) -> NodeId {
        self.parent
    }
}

impl Operator for Broadcast {
    fn name(&self) -> &'static str {
        "Broadcast"
    }

    fn parents(&self) -> Vec<NodeId> {
        vec![self.parent]
    }

    fn data_type(&self, graph: &Graph) -> Result<DataType> {
        Ok(rules::inherited(graph, self.parent))
    }

    fn shape(&self, _graph: &Graph) -> Result<Shape> {
        Ok(self.to.clone())
    }

    fn backward(
        &self,
        graph: &mut Graph,
        _owner: NodeId,
        grad: NodeId,
        _index: usize,
    ) -> Result<NodeId> {
        let axes = self.expanded_axes(graph);
        if axes.is_empty() {
            return Ok(grad);
        }
        graph.sum(grad, &axes)
    }

    fn copy_to(&self, ancestors: &[NodeId]) -> Rc<dyn Operator> {
        Rc::new(Self {
            parent: ancestors[0],
            to: self.to.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphError;
    use crate::node::DataType;
    use crate::sym::SymInt;

    #[test]
    fn sum_collapses_axes() {
        let mut g = Graph::new("t");
        let n = g.new_symbol();
        let x = g
            .matrix(DataType::Float32, [SymInt::from(8), n], "x")
            .unwrap();
        let s = g.sum(x, &[0]).unwrap();
        assert!(g.node(s).shape[0].is_one());
        assert_eq!(g.node(s).shape[1], g.node(x).shape[1]);
    }

    #[test]
    fn sum_rejects_bad_axes() {
        let mut g = Graph::new("t");
        let x = g.vector(DataType::Float32, 5, "x").unwrap();
        assert!(matches!(
            g.sum(x, &[4]),
            Err(GraphError::InvalidArguments { .. })
        ));
        assert!(matches!(
            g.sum(x, &[0, 0]),
            Err(GraphError::InvalidArguments { .. })
        ));
        assert!(matches!(
            g.sum(x, &[]),
            Err(GraphError::InvalidArguments { .. })
        ));
    }

    #[test]
    fn sum_all_is_scalar() {
        let mut g = Graph::new("t");
        let n = g.new_symbol();
        let x = g
            .matrix(DataType::Float32, [n, SymInt::from(3)], "x")
            .unwrap();
        let s = g.sum_all(x).unwrap();
        assert!(g.node(s).shape.is_scalar());
    }

    #[test]
    fn broadcast_requires_unit_source_dims() {
        let mut g = Graph::new("t");
        let x = g.vector(DataType::Float32, 3, "x").unwrap();
        assert!(g.broadcast(x, Shape::matrix(4, 7)).is_err());
        let b = g.broadcast(x, Shape::matrix(3, 7)).unwrap();
        assert_eq!(g.node(b).shape, Shape::matrix(3, 7));
    }

    #[test]
    fn broadcast_gradient_sums_expanded_axes() {
        let mut g = Graph::new("t");
        let x = g.vector(DataType::Float32, 3, "x").unwrap();
        let b = g.broadcast(x, Shape::matrix(3, 7)).unwrap();
        let seed = g.ones(DataType::Float32, Shape::matrix(3, 7)).unwrap();
        let op = std::rc::Rc::clone(&g.node(b).op);
        let back = op.backward(&mut g, b, seed, 0).unwrap();
        assert_eq!(g.node(back).shape, g.node(x).shape);
    }
}
