//! Symbolic tensor computation graphs with reverse-mode automatic
//! differentiation.
//!
//! A [`Graph`] is built eagerly, one operator at a time, without executing
//! anything: every node carries a data type and a four-dimensional
//! *symbolic* shape, so dimensions such as a batch size can stay unknown
//! while shapes are still fully checked at construction time.
//! [`Graph::gradient`] then grows the same graph with the reverse-mode
//! gradient expressions of a scalar loss.
//!
//! # Example
//!
//! ```
//! use symgrad::{DataType, Graph, SymInt};
//!
//! # fn main() -> symgrad::Result<()> {
//! let mut g = Graph::new("mlp");
//! let n = g.new_symbol(); // the batch size stays symbolic
//! let x = g.matrix(DataType::Float32, [SymInt::from(784), n.clone()], "input")?;
//! let w = g.matrix(DataType::Float32, [SymInt::from(500), SymInt::from(784)], "w")?;
//! let h = g.dot(w, x)?;
//! let a = g.tanh(h)?;
//! let sq = g.square(a)?;
//! let loss = g.sum_all(sq)?;
//!
//! let grads = g.gradient(loss, &[w])?;
//! assert_eq!(g.node(grads[0]).shape, g.node(w).shape);
//! # Ok(())
//! # }
//! ```
//!
//! Shape checking is symbolic: two dimensions match when their canonical
//! polynomial forms are identical, so `2 * n` matches `n + n` but not `m`.

mod backward;
pub mod error;
pub mod export;
pub mod graph;
pub mod node;
pub mod ops;
pub mod shape;
pub mod shared;
pub mod sym;

pub use error::{GraphError, Result};
pub use export::{to_json, write_json, GraphDocument};
pub use graph::{Graph, GraphProperties};
pub use node::{DataType, Device, DeviceKind, Group, GroupId, NodeData, NodeId};
pub use ops::Operator;
pub use shape::Shape;
pub use shared::{SharedStore, SharedVar, SharedVariable};
pub use sym::{Registry, SymInt, SymIntError};

/// The most commonly used types, for glob import.
pub mod prelude {
    pub use crate::error::{GraphError, Result};
    pub use crate::graph::Graph;
    pub use crate::node::{DataType, NodeId};
    pub use crate::shape::Shape;
    pub use crate::shared::SharedStore;
    pub use crate::sym::SymInt;
}
