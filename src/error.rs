//! Error types for graph construction and differentiation.
//!
//! All errors are fatal and non-retriable: they indicate misuse of the
//! graph-building API and surface directly to the caller. The graph
//! guarantees that no partially-built node is appended when construction
//! fails.

use crate::node::NodeId;
use crate::sym::SymIntError;
use thiserror::Error;

/// Errors raised while building or differentiating a graph.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Wrong arity, invalid axis list, non-square matrix where required.
    #[error("{op}: invalid arguments for {nodes:?}: {reason}")]
    InvalidArguments {
        /// Name of the operator that rejected its arguments.
        op: &'static str,
        /// The offending nodes.
        nodes: Vec<NodeId>,
        /// Description of the violated constraint.
        reason: String,
    },

    /// Shape mismatch between operands.
    #[error("{op}: incompatible shapes {shapes:?} for {nodes:?}")]
    IncompatibleShapes {
        /// Name of the operator that rejected the shapes.
        op: &'static str,
        /// The offending nodes.
        nodes: Vec<NodeId>,
        /// Display forms of the mismatched shapes.
        shapes: Vec<String>,
    },

    /// Backward differentiation requested through a non-differentiable or
    /// parentless operator.
    #[error("{op}: gradient requested through a non-differentiable operator (node {node}, gradient {grad})")]
    WrongGradient {
        /// Name of the operator that cannot produce a gradient.
        op: &'static str,
        /// The node owning the operator.
        node: NodeId,
        /// The incoming gradient node.
        grad: NodeId,
    },

    /// Invalid symbolic shape arithmetic.
    #[error(transparent)]
    SymbolicInteger(#[from] SymIntError),

    /// JSON serialization failure during export.
    #[error("export failed: {0}")]
    Export(#[from] serde_json::Error),
}

impl GraphError {
    /// Creates an [`GraphError::InvalidArguments`] error and logs it under
    /// the operator's name.
    pub fn invalid_arguments(
        op: &'static str,
        nodes: Vec<NodeId>,
        reason: impl Into<String>,
    ) -> Self {
        let err = Self::InvalidArguments {
            op,
            nodes,
            reason: reason.into(),
        };
        log::error!(target: "symgrad::ops", "{err}");
        err
    }

    /// Creates an [`GraphError::IncompatibleShapes`] error and logs it under
    /// the operator's name.
    pub fn incompatible_shapes(op: &'static str, nodes: Vec<NodeId>, shapes: Vec<String>) -> Self {
        let err = Self::IncompatibleShapes { op, nodes, shapes };
        log::error!(target: "symgrad::ops", "{err}");
        err
    }

    /// Creates an [`GraphError::WrongGradient`] error and logs it under the
    /// operator's name.
    pub fn wrong_gradient(op: &'static str, node: NodeId, grad: NodeId) -> Self {
        let err = Self::WrongGradient { op, node, grad };
        log::error!(target: "symgrad::ops", "{err}");
        err
    }
}

/// Convenience alias for graph-construction results.
pub type Result<T> = std::result::Result<T, GraphError>;
