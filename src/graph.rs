//! The computation graph container.
//!
//! A [`Graph`] is an append-only arena of nodes. Node construction is eager:
//! shape and data-type inference run when the node is created, and on error
//! nothing is appended. Parents always carry smaller ids than their
//! children, which is what makes the reverse-id sweep of
//! [`gradient`](Graph::gradient) a valid reverse topological order.

use crate::backward;
use crate::error::{GraphError, Result};
use crate::node::{DataType, Device, Group, GroupId, NodeData, NodeId};
use crate::ops::arithmetic::{Add, IntDiv, IntMod, Mul, Neg, Reciprocal};
use crate::ops::elementwise::{
    BinaryCrossEntropyLogits, CategoricalCrossEntropyLogits, Exp, Log, Sigmoid, Softmax, Softplus,
    Sqrt, Square, Tanh,
};
use crate::ops::input::{Constant, Eye, Input, SharedInput};
use crate::ops::linalg::{Determinant, LogDeterminant, MatMul, MatrixInverse, Trace, Transpose};
use crate::ops::logical::{GreaterOrEqual, GreaterThan, LessOrEqual, LessThan, Not};
use crate::ops::reduction::{Broadcast, LogSumExp, Sum};
use crate::ops::Operator;
use crate::shape::Shape;
use crate::shared::SharedVar;
use crate::sym::{Registry, SymInt};
use std::rc::Rc;

/// Softplus linearization threshold used by the convenience helper.
pub const SOFTPLUS_THRESHOLD: f64 = 50.0;
/// Log-sum-exp stabilization threshold used by the convenience helper.
pub const LOG_SUM_EXP_THRESHOLD: f64 = 10.0;

/// Graph-wide settings consulted during type inference.
#[derive(Debug, Clone)]
pub struct GraphProperties {
    /// Name of the graph.
    pub name: String,
    /// Device stamped on newly created nodes.
    pub default_device: Device,
    /// Widest integer type produced by integer-typed operators.
    pub max_int: DataType,
    /// Widest float type produced by float-typed operators.
    pub max_float: DataType,
    /// Separator between group path segments.
    pub group_delimiter: char,
}

impl GraphProperties {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            default_device: Device::host(),
            max_int: DataType::Int64,
            max_float: DataType::Float32,
            group_delimiter: '/',
        }
    }
}

/// An append-only symbolic computation graph.
#[derive(Debug)]
pub struct Graph {
    /// Graph-wide settings.
    pub props: GraphProperties,
    nodes: Vec<NodeData>,
    groups: Vec<Group>,
    current_group: GroupId,
    registry: Registry,
    grad_level_floor: u16,
}

impl Graph {
    /// Creates an empty graph with default properties.
    pub fn new(name: &str) -> Self {
        Self {
            props: GraphProperties::new(name),
            nodes: Vec::new(),
            groups: vec![Group {
                name: String::new(),
                full_name: String::new(),
                parent: None,
            }],
            current_group: GroupId(0),
            registry: Registry::new(),
            grad_level_floor: 0,
        }
    }

    /// The node with the given id.
    ///
    /// # Panics
    ///
    /// Panics if `id` was minted by a different graph and is out of range.
    pub fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0]
    }

    /// Number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates over all nodes in insertion (topological) order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeData> {
        self.nodes.iter()
    }

    /// The symbolic-dimension registry of this graph.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Mints a fresh symbolic dimension.
    pub fn new_symbol(&self) -> SymInt {
        self.registry.new_symbol()
    }

    /// The group with the given id.
    pub fn group(&self, id: GroupId) -> &Group {
        &self.groups[id.0]
    }

    /// Iterates over all groups.
    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.iter()
    }

    /// Enters the child group `name` of the current group, creating it on
    /// first use. Nodes created afterwards belong to it. Spaces in the name
    /// are replaced with `_` so group paths stay delimiter-safe.
    pub fn set_group(&mut self, name: &str) -> GroupId {
        let name = name.replace(' ', "_");
        let existing = self
            .groups
            .iter()
            .position(|g| g.parent == Some(self.current_group) && g.name == name);
        let id = match existing {
            Some(index) => GroupId(index),
            None => {
                let parent = &self.groups[self.current_group.0];
                let full_name = if parent.is_base() {
                    name.clone()
                } else {
                    format!(
                        "{}{}{}",
                        parent.full_name, self.props.group_delimiter, name
                    )
                };
                self.groups.push(Group {
                    name,
                    full_name,
                    parent: Some(self.current_group),
                });
                GroupId(self.groups.len() - 1)
            }
        };
        self.current_group = id;
        id
    }

    /// Leaves the current group, returning to its parent. Leaving the base
    /// group is a no-op.
    pub fn pop_group(&mut self) {
        if let Some(parent) = self.groups[self.current_group.0].parent {
            self.current_group = parent;
        }
    }

    pub(crate) fn grad_level_floor(&self) -> u16 {
        self.grad_level_floor
    }

    pub(crate) fn set_grad_level_floor(&mut self, level: u16) {
        self.grad_level_floor = level;
    }

    /// Appends a node computing `op`, inferring its shape and data type.
    /// On error nothing is appended. The node is auto-named `"{op}:{id}"`.
    pub fn apply(&mut self, op: impl Operator + 'static) -> Result<NodeId> {
        self.apply_rc(Rc::new(op), None)
    }

    /// Like [`apply`](Graph::apply), with an explicit node name.
    pub fn apply_named(&mut self, op: impl Operator + 'static, name: &str) -> Result<NodeId> {
        self.apply_rc(Rc::new(op), Some(name.to_owned()))
    }

    pub(crate) fn apply_rc(&mut self, op: Rc<dyn Operator>, name: Option<String>) -> Result<NodeId> {
        let data_type = op.data_type(self)?;
        let shape = op.shape(self)?;
        let grad_level = op.grad_level(self).max(self.grad_level_floor);
        let id = NodeId(self.nodes.len());
        let name = name.unwrap_or_else(|| format!("{}:{}", op.name(), id.0));
        log::trace!(
            target: "symgrad::graph",
            "[{}] node {id} {} '{name}' shape {shape} dtype {data_type:?}",
            self.props.name,
            op.name(),
        );
        self.nodes.push(NodeData {
            id,
            name,
            data_type,
            shape,
            op,
            grad_level,
            device: self.props.default_device,
            group: self.current_group,
        });
        Ok(id)
    }

    // ---- input constructors ----

    /// A runtime input of an explicit four-dimensional shape.
    pub fn tensor4(&mut self, data_type: DataType, dims: [SymInt; 4], name: &str) -> Result<NodeId> {
        let [a, b, c, d] = dims;
        let shape = Shape([a, b, c, d]);
        self.apply_named(Input { data_type, shape }, name)
    }

    /// A runtime four-dimensional input with all dimensions fresh symbols.
    pub fn tensor4_sym(&mut self, data_type: DataType, name: &str) -> Result<NodeId> {
        let dims = [
            self.new_symbol(),
            self.new_symbol(),
            self.new_symbol(),
            self.new_symbol(),
        ];
        self.tensor4(data_type, dims, name)
    }

    /// A runtime input of an explicit three-dimensional shape.
    pub fn tensor3(&mut self, data_type: DataType, dims: [SymInt; 3], name: &str) -> Result<NodeId> {
        let [a, b, c] = dims;
        self.tensor4(data_type, [a, b, c, SymInt::one()], name)
    }

    /// A runtime three-dimensional input with all dimensions fresh symbols.
    pub fn tensor3_sym(&mut self, data_type: DataType, name: &str) -> Result<NodeId> {
        let dims = [self.new_symbol(), self.new_symbol(), self.new_symbol()];
        self.tensor3(data_type, dims, name)
    }

    /// A runtime matrix input of an explicit shape.
    pub fn matrix(&mut self, data_type: DataType, dims: [SymInt; 2], name: &str) -> Result<NodeId> {
        let [rows, cols] = dims;
        self.tensor4(data_type, [rows, cols, SymInt::one(), SymInt::one()], name)
    }

    /// A runtime matrix input with both dimensions fresh symbols.
    pub fn matrix_sym(&mut self, data_type: DataType, name: &str) -> Result<NodeId> {
        let dims = [self.new_symbol(), self.new_symbol()];
        self.matrix(data_type, dims, name)
    }

    /// A runtime square matrix input.
    pub fn square_matrix(
        &mut self,
        data_type: DataType,
        size: impl Into<SymInt>,
        name: &str,
    ) -> Result<NodeId> {
        let size = size.into();
        self.matrix(data_type, [size.clone(), size], name)
    }

    /// A runtime column-vector input.
    pub fn vector(
        &mut self,
        data_type: DataType,
        length: impl Into<SymInt>,
        name: &str,
    ) -> Result<NodeId> {
        self.matrix(data_type, [length.into(), SymInt::one()], name)
    }

    /// A runtime vector input with a fresh symbolic length.
    pub fn vector_sym(&mut self, data_type: DataType, name: &str) -> Result<NodeId> {
        let length = self.new_symbol();
        self.vector(data_type, length, name)
    }

    /// A runtime scalar input.
    pub fn scalar(&mut self, data_type: DataType, name: &str) -> Result<NodeId> {
        self.tensor4(
            data_type,
            [SymInt::one(), SymInt::one(), SymInt::one(), SymInt::one()],
            name,
        )
    }

    /// A runtime input with the shape and data type of an existing node.
    pub fn tensor_as(&mut self, like: NodeId, name: &str) -> Result<NodeId> {
        let data_type = self.node(like).data_type;
        let shape = self.node(like).shape.clone();
        self.apply_named(Input { data_type, shape }, name)
    }

    /// A node referencing an externally-owned shared variable.
    pub fn shared(&mut self, var: SharedVar) -> Result<NodeId> {
        let name = var.name.clone();
        self.apply_named(SharedInput { var }, &name)
    }

    /// A constant tensor filled with `value`, typed `max_float`.
    pub fn constant(&mut self, value: f64, shape: Shape) -> Result<NodeId> {
        let data_type = self.props.max_float;
        self.apply(Constant {
            value,
            data_type,
            shape,
        })
    }

    /// A zero-filled constant of the given type and shape.
    pub fn zeros(&mut self, data_type: DataType, shape: Shape) -> Result<NodeId> {
        self.apply(Constant {
            value: 0.0,
            data_type,
            shape,
        })
    }

    /// A one-filled constant of the given type and shape.
    pub fn ones(&mut self, data_type: DataType, shape: Shape) -> Result<NodeId> {
        self.apply(Constant {
            value: 1.0,
            data_type,
            shape,
        })
    }

    /// The identity matrix of a (possibly symbolic) size.
    pub fn eye(&mut self, size: impl Into<SymInt>) -> Result<NodeId> {
        self.apply(Eye { size: size.into() })
    }

    // ---- elementwise coercion ----

    /// Resolves implicit broadcasting among elementwise operands: computes
    /// the merged shape and wraps every smaller operand in an explicit
    /// `Broadcast` node. Fails if any pair of shapes cannot merge.
    fn coerce_elementwise(&mut self, op: &'static str, nodes: &[NodeId]) -> Result<Vec<NodeId>> {
        crate::ops::rules::check_associative(op, nodes)?;
        let mut merged = self.node(nodes[0]).shape.clone();
        for &n in &nodes[1..] {
            merged = match merged.broadcast_merge(&self.node(n).shape) {
                Some(shape) => shape,
                None => {
                    let shapes = nodes
                        .iter()
                        .map(|&n| self.node(n).shape.to_string())
                        .collect();
                    return Err(GraphError::incompatible_shapes(op, nodes.to_vec(), shapes));
                }
            };
        }
        let mut coerced = Vec::with_capacity(nodes.len());
        for &n in nodes {
            if self.node(n).shape == merged {
                coerced.push(n);
            } else {
                log::warn!(
                    target: "symgrad::graph",
                    "[{}] implicit broadcast of node {n} from {} to {merged} in {op}",
                    self.props.name,
                    self.node(n).shape,
                );
                let broadcast = Broadcast::new(self, n, merged.clone())?;
                coerced.push(self.apply(broadcast)?);
            }
        }
        Ok(coerced)
    }

    // ---- arithmetic ----

    /// Elementwise sum of two or more operands.
    pub fn add(&mut self, operands: &[NodeId]) -> Result<NodeId> {
        let operands = self.coerce_elementwise("Add", operands)?;
        let op = Add::new(operands)?;
        self.apply(op)
    }

    /// Elementwise negation.
    pub fn neg(&mut self, node: NodeId) -> Result<NodeId> {
        self.apply(Neg { parent: node })
    }

    /// Elementwise difference `left - right`.
    pub fn sub(&mut self, left: NodeId, right: NodeId) -> Result<NodeId> {
        let negated = self.neg(right)?;
        self.add(&[left, negated])
    }

    /// Elementwise product of two or more operands.
    pub fn mul(&mut self, operands: &[NodeId]) -> Result<NodeId> {
        let operands = self.coerce_elementwise("Mul", operands)?;
        let op = Mul::new(operands)?;
        self.apply(op)
    }

    /// Elementwise multiplicative inverse.
    pub fn reciprocal(&mut self, node: NodeId) -> Result<NodeId> {
        self.apply(Reciprocal { parent: node })
    }

    /// Elementwise quotient `left / right`.
    pub fn div(&mut self, left: NodeId, right: NodeId) -> Result<NodeId> {
        let inverse = self.reciprocal(right)?;
        self.mul(&[left, inverse])
    }

    /// Elementwise integer division.
    pub fn int_div(&mut self, left: NodeId, right: NodeId) -> Result<NodeId> {
        let coerced = self.coerce_elementwise("IntDiv", &[left, right])?;
        self.apply(IntDiv {
            left: coerced[0],
            right: coerced[1],
        })
    }

    /// Elementwise integer modulus.
    pub fn int_mod(&mut self, left: NodeId, right: NodeId) -> Result<NodeId> {
        let coerced = self.coerce_elementwise("IntMod", &[left, right])?;
        self.apply(IntMod {
            left: coerced[0],
            right: coerced[1],
        })
    }

    // ---- unary elementwise ----

    /// Elementwise square.
    pub fn square(&mut self, node: NodeId) -> Result<NodeId> {
        self.apply(Square { parent: node })
    }

    /// Elementwise exponential.
    pub fn exp(&mut self, node: NodeId) -> Result<NodeId> {
        self.apply(Exp { parent: node })
    }

    /// Elementwise natural logarithm.
    pub fn log(&mut self, node: NodeId) -> Result<NodeId> {
        self.apply(Log { parent: node })
    }

    /// Elementwise square root.
    pub fn sqrt(&mut self, node: NodeId) -> Result<NodeId> {
        self.apply(Sqrt { parent: node })
    }

    /// Elementwise logistic function.
    pub fn sigmoid(&mut self, node: NodeId) -> Result<NodeId> {
        self.apply(Sigmoid { parent: node })
    }

    /// Elementwise hyperbolic tangent.
    pub fn tanh(&mut self, node: NodeId) -> Result<NodeId> {
        self.apply(Tanh { parent: node })
    }

    /// Elementwise softplus with the default linearization threshold.
    pub fn softplus(&mut self, node: NodeId) -> Result<NodeId> {
        self.apply(Softplus {
            parent: node,
            threshold: SOFTPLUS_THRESHOLD,
        })
    }

    /// Softmax over the last non-unit axis.
    pub fn softmax(&mut self, node: NodeId) -> Result<NodeId> {
        let op = Softmax::new(self, node)?;
        self.apply(op)
    }

    /// Elementwise binary cross entropy of `labels` against
    /// `sigmoid(logits)`, computed directly from the logits.
    pub fn binary_cross_entropy_logits(
        &mut self,
        labels: NodeId,
        logits: NodeId,
    ) -> Result<NodeId> {
        let coerced = self.coerce_elementwise("BinaryCrossEntropyLogits", &[labels, logits])?;
        self.apply(BinaryCrossEntropyLogits {
            labels: coerced[0],
            logits: coerced[1],
        })
    }

    /// Elementwise categorical cross entropy of `labels` against
    /// `softmax(logits)` over the class axis, computed directly from the
    /// logits. Sum over the class axis to obtain the loss.
    pub fn categorical_cross_entropy_logits(
        &mut self,
        labels: NodeId,
        logits: NodeId,
    ) -> Result<NodeId> {
        let coerced =
            self.coerce_elementwise("CategoricalCrossEntropyLogits", &[labels, logits])?;
        let op = CategoricalCrossEntropyLogits::new(self, coerced[0], coerced[1])?;
        self.apply(op)
    }

    // ---- reductions ----

    /// Sum over the given axes.
    pub fn sum(&mut self, node: NodeId, axes: &[usize]) -> Result<NodeId> {
        let op = Sum::new(self, node, axes)?;
        self.apply(op)
    }

    /// Sum over all axes, producing a scalar.
    pub fn sum_all(&mut self, node: NodeId) -> Result<NodeId> {
        self.sum(node, &[0, 1, 2, 3])
    }

    /// Log-sum-exp over the given axes with the default threshold.
    pub fn log_sum_exp(&mut self, node: NodeId, axes: &[usize]) -> Result<NodeId> {
        let op = LogSumExp::new(self, node, axes, LOG_SUM_EXP_THRESHOLD)?;
        self.apply(op)
    }

    /// Broadcasts `node` to `to`. Returns the node unchanged if the shapes
    /// already match.
    pub fn broadcast(&mut self, node: NodeId, to: Shape) -> Result<NodeId> {
        if self.node(node).shape == to {
            return Ok(node);
        }
        let op = Broadcast::new(self, node, to)?;
        self.apply(op)
    }

    // ---- linear algebra ----

    /// Matrix product of exactly two operands.
    pub fn dot(&mut self, left: NodeId, right: NodeId) -> Result<NodeId> {
        self.gemm(&[left, right], &[])
    }

    /// Chained matrix product with per-operand transposition flags. An
    /// empty flag slice means no operand is transposed.
    pub fn gemm(&mut self, operands: &[NodeId], transpositions: &[bool]) -> Result<NodeId> {
        let op = MatMul::new(self, operands.to_vec(), transpositions.to_vec())?;
        self.apply(op)
    }

    /// Matrix transposition.
    pub fn transpose(&mut self, node: NodeId) -> Result<NodeId> {
        let op = Transpose::new(self, node)?;
        self.apply(op)
    }

    /// Inverse of a square matrix.
    pub fn matrix_inverse(&mut self, node: NodeId) -> Result<NodeId> {
        let op = MatrixInverse::new(self, node)?;
        self.apply(op)
    }

    /// Determinant of a square matrix.
    pub fn determinant(&mut self, node: NodeId) -> Result<NodeId> {
        let op = Determinant::new(self, node)?;
        self.apply(op)
    }

    /// Log-determinant of a square matrix.
    pub fn log_determinant(&mut self, node: NodeId) -> Result<NodeId> {
        let op = LogDeterminant::new(self, node)?;
        self.apply(op)
    }

    /// Trace of a square matrix.
    pub fn trace(&mut self, node: NodeId) -> Result<NodeId> {
        let op = Trace::new(self, node)?;
        self.apply(op)
    }

    // ---- logical ----

    /// Elementwise logical negation.
    pub fn not(&mut self, node: NodeId) -> Result<NodeId> {
        self.apply(Not { parent: node })
    }

    /// Elementwise `left > right`.
    pub fn gt(&mut self, left: NodeId, right: NodeId) -> Result<NodeId> {
        let coerced = self.coerce_elementwise("GreaterThan", &[left, right])?;
        self.apply(GreaterThan {
            left: coerced[0],
            right: coerced[1],
        })
    }

    /// Elementwise `left < right`.
    pub fn lt(&mut self, left: NodeId, right: NodeId) -> Result<NodeId> {
        let coerced = self.coerce_elementwise("LessThan", &[left, right])?;
        self.apply(LessThan {
            left: coerced[0],
            right: coerced[1],
        })
    }

    /// Elementwise `left >= right`.
    pub fn ge(&mut self, left: NodeId, right: NodeId) -> Result<NodeId> {
        let coerced = self.coerce_elementwise("GreaterOrEqual", &[left, right])?;
        self.apply(GreaterOrEqual {
            left: coerced[0],
            right: coerced[1],
        })
    }

    /// Elementwise `left <= right`.
    pub fn le(&mut self, left: NodeId, right: NodeId) -> Result<NodeId> {
        let coerced = self.coerce_elementwise("LessOrEqual", &[left, right])?;
        self.apply(LessOrEqual {
            left: coerced[0],
            right: coerced[1],
        })
    }

    // ---- differentiation ----

    /// Reverse-mode gradients of a scalar `loss` with respect to `params`.
    /// Returns one gradient node per parameter, in the same order.
    pub fn gradient(&mut self, loss: NodeId, params: &[NodeId]) -> Result<Vec<NodeId>> {
        backward::gradient(self, loss, params)
    }

    // ---- migration ----

    /// Copies every node of this graph into `target`, in order, rebinding
    /// ancestors through each operator's `copy_to`. Returns the id of the
    /// copy of each source node. The source graph is not mutated.
    pub fn copy_to(&self, target: &mut Graph) -> Result<Vec<NodeId>> {
        let mut mapping = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let ancestors: Vec<NodeId> = node
                .op
                .ancestors()
                .iter()
                .map(|a| mapping[a.index()])
                .collect();
            let op = node.op.copy_to(&ancestors);
            let id = target.apply_rc(op, Some(node.name.clone()))?;
            mapping.push(id);
        }
        Ok(mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphError;

    #[test]
    fn failed_construction_appends_nothing() {
        let mut g = Graph::new("t");
        let a = g.vector(DataType::Float32, 3, "a").unwrap();
        let b = g.vector(DataType::Float32, 4, "b").unwrap();
        let before = g.len();
        assert!(matches!(
            g.add(&[a, b]),
            Err(GraphError::IncompatibleShapes { .. })
        ));
        assert_eq!(g.len(), before);
    }

    #[test]
    fn empty_operand_lists_are_rejected() {
        let mut g = Graph::new("t");
        assert!(matches!(
            g.add(&[]),
            Err(GraphError::InvalidArguments { op: "Add", .. })
        ));
        assert!(matches!(
            g.mul(&[]),
            Err(GraphError::InvalidArguments { op: "Mul", .. })
        ));
        let a = g.scalar(DataType::Float32, "a").unwrap();
        assert!(matches!(
            g.add(&[a]),
            Err(GraphError::InvalidArguments { op: "Add", .. })
        ));
        // Nothing was appended by the failed calls.
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn group_names_replace_spaces() {
        let mut g = Graph::new("t");
        let outer = g.set_group("layer one");
        assert_eq!(g.group(outer).full_name, "layer_one");
        let inner = g.set_group("first half");
        assert_eq!(g.group(inner).full_name, "layer_one/first_half");
        g.pop_group();
        // Looking the group up by its unsanitized name reuses it.
        assert_eq!(g.set_group("first half"), inner);
    }

    #[test]
    fn nodes_are_auto_named_after_their_operator() {
        let mut g = Graph::new("t");
        let a = g.scalar(DataType::Float32, "a").unwrap();
        let s = g.add(&[a, a]).unwrap();
        assert_eq!(g.node(s).name, format!("Add:{}", s.index()));
        assert_eq!(g.node(a).name, "a");
    }

    #[test]
    fn groups_nest_and_are_reused() {
        let mut g = Graph::new("t");
        let layer = g.set_group("layer1");
        let inner = g.set_group("weights");
        assert_eq!(g.group(inner).full_name, "layer1/weights");
        g.pop_group();
        g.pop_group();
        assert_eq!(g.set_group("layer1"), layer);
        let a = g.scalar(DataType::Float32, "a").unwrap();
        assert_eq!(g.node(a).group, layer);
    }

    #[test]
    fn scalar_operands_broadcast_implicitly() {
        let mut g = Graph::new("t");
        let x = g.vector(DataType::Float32, 5, "x").unwrap();
        let c = g.constant(2.0, Shape::scalar()).unwrap();
        let y = g.mul(&[x, c]).unwrap();
        assert_eq!(g.node(y).shape, g.node(x).shape);
        // The scalar got wrapped in an explicit Broadcast node.
        let parents = g.node(y).op.parents();
        assert_eq!(g.node(parents[1]).op.name(), "Broadcast");
    }

    #[test]
    fn copy_to_preserves_structure() {
        let mut g = Graph::new("source");
        let n = g.new_symbol();
        let x = g
            .matrix(DataType::Float32, [SymInt::from(3), n], "x")
            .unwrap();
        let y = g.tanh(x).unwrap();
        let s = g.sum_all(y).unwrap();

        let mut h = Graph::new("target");
        let mapping = g.copy_to(&mut h).unwrap();
        assert_eq!(h.len(), g.len());
        let copied = h.node(mapping[s.index()]);
        assert_eq!(copied.op.name(), "Sum");
        assert_eq!(copied.shape, g.node(s).shape);
        assert_eq!(
            h.node(mapping[y.index()]).op.parents(),
            vec![mapping[x.index()]]
        );
    }

    #[test]
    fn tensor_as_clones_shape_and_type() {
        let mut g = Graph::new("t");
        let x = g.matrix_sym(DataType::Float64, "x").unwrap();
        let y = g.tensor_as(x, "y").unwrap();
        assert_eq!(g.node(y).shape, g.node(x).shape);
        assert_eq!(g.node(y).data_type, DataType::Float64);
    }
}
