//! Input, shared-variable and constant operators.
//!
//! These are the orphan operators: they have no ancestors, so requesting a
//! gradient through them is a construction error. Inputs and shared
//! variables are nonetheless differentiable *targets* (gradients terminate
//! at them); constants are not.

use crate::error::Result;
use crate::graph::Graph;
use crate::node::{DataType, NodeId};
use crate::ops::{rules, Operator};
use crate::shape::Shape;
use crate::shared::SharedVar;
use crate::sym::SymInt;
use std::rc::Rc;

/// A runtime input placeholder with a declared type and symbolic shape.
#[derive(Debug, Clone)]
pub struct Input {
    /// Declared storage type.
    pub data_type: DataType,
    /// Declared symbolic shape.
    pub shape: Shape,
}

impl Operator for Input {
    fn name(&self) -> &'static str {
        "Input"
    }

    fn parents(&self) -> Vec<NodeId> {
        Vec::new()
    }

    fn data_type(&self, _graph: &Graph) -> Result<DataType> {
        Ok(self.data_type)
    }

    fn shape(&self, _graph: &Graph) -> Result<Shape> {
        Ok(self.shape.clone())
    }

    fn is_input_dependent(&self, _graph: &Graph) -> bool {
        true
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

    fn copy_to(&self, _ancestors: &[NodeId]) -> Rc<dyn Operator> {
        Rc::new(self.clone())
    }
}

/// A reference to an externally-owned shared tensor (a model parameter).
///
/// The handle is opaque: the graph records its shape and type but never
/// inspects or mutates its contents.
#[derive(Debug, Clone)]
pub struct SharedInput {
    /// The externally-owned variable handle.
    pub var: SharedVar,
}

impl Operator for SharedInput {
    fn name(&self) -> &'static str {
        "Shared"
    }

    fn parents(&self) -> Vec<NodeId> {
        Vec::new()
    }

    fn data_type(&self, _graph: &Graph) -> Result<DataType> {
        Ok(self.var.data_type)
    }

    fn shape(&self, _graph: &Graph) -> Result<Shape> {
        Ok(self.var.shape.clone())
    }

    fn is_input_dependent(&self, _graph: &Graph) -> bool {
        true
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

    fn copy_to(&self, _ancestors: &[NodeId]) -> Rc<dyn Operator> {
        Rc::new(self.clone())
    }
}

/// A filled constant tensor of a fixed value, type and shape.
#[derive(Debug, Clone)]
pub struct Constant {
    /// The fill value.
    pub value: f64,
    /// Storage type of the constant.
    pub data_type: DataType,
    /// Shape of the constant.
    pub shape: Shape,
}

impl Operator for Constant {
    fn name(&self) -> &'static str {
        "Constant"
    }

    fn parents(&self) -> Vec<NodeId> {
        Vec::new()
    }

    fn data_type(&self, _graph: &Graph) -> Result<DataType> {
        Ok(self.data_type)
    }

    fn shape(&self, _graph: &Graph) -> Result<Shape> {
        Ok(self.shape.clone())
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

    fn copy_to(&self, _ancestors: &[NodeId]) -> Rc<dyn Operator> {
        Rc::new(self.clone())
    }
}

/// The identity matrix of a (possibly symbolic) size.
#[derive(Debug, Clone)]
pub struct Eye {
    /// Number of rows and columns.
    pub size: SymInt,
}

impl Operator for Eye {
    fn name(&self) -> &'static str {
        "Eye"
    }

    fn parents(&self) -> Vec<NodeId> {
        Vec::new()
    }

    fn data_type(&self, graph: &Graph) -> Result<DataType> {
        Ok(graph.props.max_float)
    }

    fn shape(&self, _graph: &Graph) -> Result<Shape> {
        Ok(Shape::matrix(self.size.clone(), self.size.clone()))
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

    fn copy_to(&self, _ancestors: &[NodeId]) -> Rc<dyn Operator> {
        Rc::new(self.clone())
    }
}
