//! JSON export of a graph's structure.
//!
//! The export is a flat document of node records plus the group tree; shape
//! dimensions are rendered as their symbolic display form so external
//! viewers need no symbolic engine.

use crate::error::Result;
use crate::graph::Graph;
use crate::node::NodeId;
use serde::Serialize;
use std::io;

/// One exported node.
#[derive(Debug, Serialize)]
pub struct NodeRecord {
    /// Insertion-ordered node id.
    pub id: usize,
    /// Node name.
    pub name: String,
    /// Operator name tag.
    pub op: String,
    /// Full path of the owning group.
    pub group: String,
    /// Storage data type.
    pub data_type: crate::node::DataType,
    /// Symbolic shape, one rendered expression per dimension.
    pub shape: [String; 4],
    /// Differentiation pass that produced this node.
    pub grad_level: u16,
    /// Ids of all ancestors, parents first.
    pub inputs: Vec<usize>,
}

/// One exported group.
#[derive(Debug, Serialize)]
pub struct GroupRecord {
    /// Full path of the group.
    pub full_name: String,
    /// Full path of the parent group, if any.
    pub parent: Option<String>,
}

/// The complete exported document.
#[derive(Debug, Serialize)]
pub struct GraphDocument {
    /// Graph name.
    pub name: String,
    /// All groups, base group first.
    pub groups: Vec<GroupRecord>,
    /// All nodes in insertion order.
    pub nodes: Vec<NodeRecord>,
}

impl GraphDocument {
    /// Snapshots the structure of `graph`.
    pub fn from_graph(graph: &Graph) -> Self {
        let groups = graph
            .groups()
            .map(|group| GroupRecord {
                full_name: group.full_name.clone(),
                parent: group.parent.map(|p| graph.group(p).full_name.clone()),
            })
            .collect();
        let nodes = graph
            .nodes()
            .map(|node| NodeRecord {
                id: node.id.index(),
                name: node.name.clone(),
                op: node.op.name().to_owned(),
                group: graph.group(node.group).full_name.clone(),
                data_type: node.data_type,
                shape: [
                    node.shape[0].to_string(),
                    node.shape[1].to_string(),
                    node.shape[2].to_string(),
                    node.shape[3].to_string(),
                ],
                grad_level: node.grad_level,
                inputs: node.op.ancestors().into_iter().map(NodeId::index).collect(),
            })
            .collect();
        Self {
            name: graph.props.name.clone(),
            groups,
            nodes,
        }
    }
}

/// Renders the graph as a pretty-printed JSON string.
pub fn to_json(graph: &Graph) -> Result<String> {
    Ok(serde_json::to_string_pretty(&GraphDocument::from_graph(
        graph,
    ))?)
}

/// Writes the graph as pretty-printed JSON to `writer`.
pub fn write_json<W: io::Write>(graph: &Graph, writer: W) -> Result<()> {
    serde_json::to_writer_pretty(writer, &GraphDocument::from_graph(graph))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::DataType;

    #[test]
    fn exported_nodes_reference_their_inputs() {
        let mut g = Graph::new("export");
        let n = g.new_symbol();
        let x = g.vector(DataType::Float32, n, "x").unwrap();
        let y = g.tanh(x).unwrap();
        let doc = GraphDocument::from_graph(&g);
        assert_eq!(doc.name, "export");
        assert_eq!(doc.nodes.len(), 2);
        assert_eq!(doc.nodes[y.index()].op, "Tanh");
        assert_eq!(doc.nodes[y.index()].inputs, vec![x.index()]);
        // The symbolic length renders as an expression, not a number.
        assert_eq!(doc.nodes[x.index()].shape[0], "s0");
    }

    #[test]
    fn json_round_trips_through_serde() {
        let mut g = Graph::new("export");
        let x = g.scalar(DataType::Float32, "x").unwrap();
        let _ = g.square(x).unwrap();
        let text = to_json(&g).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["nodes"].as_array().unwrap().len(), 2);
        assert_eq!(value["nodes"][1]["op"], "Square");
    }
}
