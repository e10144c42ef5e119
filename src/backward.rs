//! Reverse-mode differentiation.
//!
//! Gradients are built as new nodes in the same graph. The sweep walks node
//! ids in strictly descending order, which is a reverse topological order
//! because parents always precede children. Each node combines its incoming
//! gradient messages once and then emits one message per in-flow parent.

use crate::error::{GraphError, Result};
use crate::graph::Graph;
use crate::node::NodeId;
use crate::shape::Shape;
use std::rc::Rc;

/// Marks the nodes gradient messages may travel through: ancestors of the
/// loss (via parent edges) that also have a requested parameter among their
/// ancestors.
fn flow_tree(graph: &Graph, loss: NodeId, params: &[NodeId]) -> Vec<bool> {
    let mut to_loss = vec![false; graph.len()];
    to_loss[loss.index()] = true;
    for id in (0..=loss.index()).rev() {
        if to_loss[id] {
            for parent in graph.node(NodeId(id)).op.parents() {
                to_loss[parent.index()] = true;
            }
        }
    }
    let mut from_params = vec![false; graph.len()];
    for &param in params {
        from_params[param.index()] = true;
    }
    for id in 0..graph.len() {
        if !from_params[id]
            && graph
                .node(NodeId(id))
                .op
                .parents()
                .iter()
                .any(|parent| from_params[parent.index()])
        {
            from_params[id] = true;
        }
    }
    to_loss
        .into_iter()
        .zip(from_params)
        .map(|(a, b)| a && b)
        .collect()
}

/// Builds the gradients of `loss` with respect to each of `params`.
///
/// See [`Graph::gradient`] for the public entry point.
pub(crate) fn gradient(graph: &mut Graph, loss: NodeId, params: &[NodeId]) -> Result<Vec<NodeId>> {
    if !graph.node(loss).shape.is_scalar() {
        return Err(GraphError::invalid_arguments(
            "Grad",
            vec![loss],
            format!("loss must be a scalar, got shape {}", graph.node(loss).shape),
        ));
    }
    log::debug!(
        target: "symgrad::backward",
        "[{}] differentiating {loss} with respect to {} parameters",
        graph.props.name,
        params.len(),
    );
    let flow = flow_tree(graph, loss, params);

    let saved_floor = graph.grad_level_floor();
    graph.set_grad_level_floor(graph.node(loss).grad_level + 1);
    graph.set_group("gradients");
    let result = sweep(graph, loss, params, &flow);
    graph.pop_group();
    graph.set_grad_level_floor(saved_floor);
    result
}

fn sweep(
    graph: &mut Graph,
    loss: NodeId,
    params: &[NodeId],
    flow: &[bool],
) -> Result<Vec<NodeId>> {
    let mut messages: Vec<Vec<NodeId>> = vec![Vec::new(); graph.len()];
    let mut combined: Vec<Option<NodeId>> = vec![None; graph.len()];

    if flow[loss.index()] {
        let seed = graph.ones(graph.node(loss).data_type, Shape::scalar())?;
        messages[loss.index()].push(seed);
    }

    for id in (0..=loss.index()).rev() {
        if messages[id].is_empty() {
            continue;
        }
        let owner = NodeId(id);
        let op = Rc::clone(&graph.node(owner).op);
        if !op.is_differentiable() {
            return Err(GraphError::wrong_gradient(
                op.name(),
                owner,
                messages[id][0],
            ));
        }
        let total = if messages[id].len() == 1 {
            messages[id][0]
        } else {
            op.combine(graph, owner, &messages[id])?
        };
        combined[id] = Some(total);
        for (index, parent) in op.parents().into_iter().enumerate() {
            if flow[parent.index()] {
                let message = op.backward(graph, owner, total, index)?;
                messages[parent.index()].push(message);
            }
        }
    }

    // Parameters the loss does not depend on get a fresh zeros constant of
    // their own shape and type, never an alias of an existing node.
    params
        .iter()
        .map(|&param| match combined[param.index()] {
            Some(grad) => Ok(grad),
            None => {
                log::debug!(
                    target: "symgrad::backward",
                    "[{}] {param} does not influence {loss}, gradient is zero",
                    graph.props.name,
                );
                let data_type = graph.node(param).data_type;
                let shape = graph.node(param).shape.clone();
                graph.zeros(data_type, shape)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::DataType;
    use crate::sym::SymInt;

    #[test]
    fn gradient_requires_scalar_loss() {
        let mut g = Graph::new("t");
        let x = g.vector(DataType::Float32, 3, "x").unwrap();
        assert!(matches!(
            g.gradient(x, &[x]),
            Err(GraphError::InvalidArguments { op: "Grad", .. })
        ));
    }

    #[test]
    fn unreached_parameter_gets_fresh_zeros() {
        let mut g = Graph::new("t");
        let x = g.scalar(DataType::Float32, "x").unwrap();
        let w = g.vector(DataType::Float32, 4, "w").unwrap();
        let loss = g.square(x).unwrap();
        let grads = g.gradient(loss, &[x, w]).unwrap();
        assert_ne!(grads[1], w);
        assert_eq!(g.node(grads[1]).op.name(), "Constant");
        assert_eq!(g.node(grads[1]).shape, g.node(w).shape);
    }

    #[test]
    fn fan_out_accumulates_messages() {
        // loss = x*x + x has two paths into x.
        let mut g = Graph::new("t");
        let x = g.scalar(DataType::Float32, "x").unwrap();
        let xx = g.mul(&[x, x]).unwrap();
        let loss = g.add(&[xx, x]).unwrap();
        let grads = g.gradient(loss, &[x]).unwrap();
        // The accumulated gradient is itself a sum node.
        assert_eq!(g.node(grads[0]).op.name(), "Add");
        assert!(g.node(grads[0]).shape.is_scalar());
    }

    #[test]
    fn gradient_nodes_carry_raised_grad_level() {
        let mut g = Graph::new("t");
        let x = g.scalar(DataType::Float32, "x").unwrap();
        let loss = g.square(x).unwrap();
        let grads = g.gradient(loss, &[x]).unwrap();
        assert_eq!(g.node(x).grad_level, 0);
        assert_eq!(g.node(grads[0]).grad_level, 1);
    }

    #[test]
    fn gradient_nodes_live_in_the_gradients_group() {
        let mut g = Graph::new("t");
        let x = g.scalar(DataType::Float32, "x").unwrap();
        let loss = g.square(x).unwrap();
        let grads = g.gradient(loss, &[x]).unwrap();
        assert_eq!(g.group(g.node(grads[0]).group).full_name, "gradients");
        // The group stack is restored afterwards.
        let y = g.scalar(DataType::Float32, "y").unwrap();
        assert!(g.group(g.node(y).group).is_base());
    }

    #[test]
    fn gradient_through_comparison_is_rejected() {
        let mut g = Graph::new("t");
        let x = g.scalar(DataType::Float32, "x").unwrap();
        let y = g.scalar(DataType::Float32, "y").unwrap();
        let mask = g.gt(x, y).unwrap();
        let masked = g.mul(&[x, mask]).unwrap();
        let loss = g.sum_all(masked).unwrap();
        assert!(matches!(
            g.gradient(loss, &[x]),
            Err(GraphError::WrongGradient { .. })
        ));
    }

    #[test]
    fn second_order_gradients_raise_the_level_again() {
        let mut g = Graph::new("t");
        let x = g.scalar(DataType::Float32, "x").unwrap();
        let x3 = g.mul(&[x, x, x]).unwrap();
        let first = g.gradient(x3, &[x]).unwrap()[0];
        let second = g.gradient(first, &[x]).unwrap()[0];
        assert_eq!(g.node(first).grad_level, 1);
        assert_eq!(g.node(second).grad_level, 2);
    }

    #[test]
    fn symbolic_batch_dimension_survives_differentiation() {
        let mut g = Graph::new("t");
        let n = g.new_symbol();
        let x = g
            .matrix(DataType::Float32, [SymInt::from(4), n.clone()], "x")
            .unwrap();
        let w = g
            .matrix(DataType::Float32, [SymInt::from(4), SymInt::from(4)], "w")
            .unwrap();
        let h = g.dot(w, x).unwrap();
        let sq = g.square(h).unwrap();
        let loss = g.sum_all(sq).unwrap();
        let grads = g.gradient(loss, &[w, x]).unwrap();
        assert_eq!(g.node(grads[0]).shape, g.node(w).shape);
        assert_eq!(g.node(grads[1]).shape, g.node(x).shape);
        assert_eq!(g.node(grads[1]).shape[1], n);
    }
}
