//! Node metadata and the supporting arena types.

use crate::ops::Operator;
use crate::shape::Shape;
use serde::Serialize;
use std::fmt;
use std::rc::Rc;

/// Index of a node inside its owning graph.
///
/// Ids are assigned in insertion order and never reused; a node's parents
/// always carry smaller ids than the node itself. Ids are only meaningful
/// for the graph that minted them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// The position of this node in the graph's insertion-ordered node list.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Index of a group inside its owning graph's group tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(pub(crate) usize);

/// Storage data types a node can carry.
///
/// The derived ordering doubles as the promotion lattice: the result type of
/// a promoted operation is the maximum of its parent types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum DataType {
    /// 8-bit boolean.
    Bool,
    /// Unsigned integers.
    UInt8,
    /// 16-bit unsigned integer.
    UInt16,
    /// 32-bit unsigned integer.
    UInt32,
    /// 64-bit unsigned integer.
    UInt64,
    /// 8-bit signed integer.
    Int8,
    /// 16-bit signed integer.
    Int16,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 32-bit float.
    Float32,
    /// 64-bit float.
    Float64,
}

impl DataType {
    /// Whether this is a floating-point type.
    pub fn is_float(self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }

    /// Whether this is an integer type (signed or unsigned).
    pub fn is_integer(self) -> bool {
        !self.is_float() && self != DataType::Bool
    }

    /// Maps unsigned types to their same-width signed counterpart; used by
    /// negation. Other types are unchanged.
    pub fn signed(self) -> Self {
        match self {
            DataType::UInt8 => DataType::Int8,
            DataType::UInt16 => DataType::Int16,
            DataType::UInt32 => DataType::Int32,
            DataType::UInt64 => DataType::Int64,
            other => other,
        }
    }
}

/// Kind of device a node is placed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// Host CPU.
    Cpu,
    /// Accelerator device.
    Gpu,
}

/// A device placement. Placement is metadata only; no execution happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Device {
    /// Device kind.
    pub kind: DeviceKind,
    /// Device ordinal.
    pub id: usize,
}

impl Device {
    /// The host CPU device.
    pub fn host() -> Self {
        Self {
            kind: DeviceKind::Cpu,
            id: 0,
        }
    }
}

impl Default for Device {
    fn default() -> Self {
        Self::host()
    }
}

/// A hierarchical namespace entry used to organize nodes for export and
/// readability. Groups have no effect on computation.
#[derive(Debug, Clone)]
pub struct Group {
    /// Segment name of this group.
    pub name: String,
    /// Full delimiter-joined path from the base group.
    pub full_name: String,
    /// Parent group; `None` for the base group.
    pub parent: Option<GroupId>,
}

impl Group {
    /// Whether this is the graph's base group.
    pub fn is_base(&self) -> bool {
        self.parent.is_none()
    }
}

/// The metadata of a single computed value in the graph.
#[derive(Debug)]
pub struct NodeData {
    /// Insertion-ordered id inside the owning graph.
    pub id: NodeId,
    /// Human-readable name.
    pub name: String,
    /// Inferred storage data type.
    pub data_type: DataType,
    /// Inferred symbolic shape.
    pub shape: Shape,
    /// The operation that computes this node.
    pub op: Rc<dyn Operator>,
    /// How many differentiation passes produced this node.
    pub grad_level: u16,
    /// Device placement metadata.
    pub device: Device,
    /// Owning group in the graph's group tree.
    pub group: GroupId,
}

impl NodeData {
    /// The tensor order of this node's shape.
    pub fn order(&self) -> usize {
        self.shape.order()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promotion_follows_type_order() {
        assert_eq!(DataType::Int8.max(DataType::Float32), DataType::Float32);
        assert_eq!(DataType::UInt16.max(DataType::Int16), DataType::Int16);
        assert_eq!(DataType::Bool.max(DataType::UInt8), DataType::UInt8);
    }

    #[test]
    fn negation_promotes_unsigned_to_signed() {
        assert_eq!(DataType::UInt32.signed(), DataType::Int32);
        assert_eq!(DataType::Float32.signed(), DataType::Float32);
    }
}
