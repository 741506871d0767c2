// SPDX-License-Identifier: MIT OR Apache-2.0
//! Edge views and connection validation errors.

use crate::id::GraphId;
use serde::{Deserialize, Serialize};

/// A directed view of one symmetric edge, output side first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    /// Source node ID
    pub from_node: GraphId,
    /// Source (output) socket ID
    pub from_socket: GraphId,
    /// Target node ID
    pub to_node: GraphId,
    /// Target (input) socket ID
    pub to_socket: GraphId,
}

impl Edge {
    /// Check if this edge involves a specific node
    pub fn involves_node(&self, node_id: GraphId) -> bool {
        self.from_node == node_id || self.to_node == node_id
    }

    /// Check if this edge involves a specific socket
    pub fn involves_socket(&self, socket_id: GraphId) -> bool {
        self.from_socket == socket_id || self.to_socket == socket_id
    }
}

/// Why two sockets can't be connected
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConnectionError {
    /// Socket not found in the graph
    #[error("Socket not found: {0}")]
    SocketNotFound(GraphId),

    /// Both sockets are inputs or both are outputs
    #[error("Sockets {0} and {1} have the same direction")]
    SameDirection(GraphId, GraphId),

    /// Both sockets belong to one node
    #[error("Sockets {0} and {1} belong to the same node")]
    SameNode(GraphId, GraphId),

    /// Socket types can't be converted into each other
    #[error("Incompatible socket types: {from} -> {to}")]
    IncompatibleTypes {
        /// Output socket type
        from: String,
        /// Input socket type
        to: String,
    },

    /// Socket doesn't allow more than one edge
    #[error("Socket already connected: {0}")]
    SocketOccupied(GraphId),
}

#[cfg(test)]
mod tests {
    use crate::graph::Graph;
    use crate::node::{Node, NodeDef, Passthrough};
    use crate::socket::Socket;

    #[test]
    fn test_edge_views() {
        let def = NodeDef::new("pass")
            .input("x", Socket::float(0.0))
            .output("x", Socket::float(0.0));
        let mut graph: Graph<()> = Graph::new("edges");
        let a = graph.add(Node::new(&def, Passthrough)).unwrap();
        let b = graph.add(Node::new(&def, Passthrough)).unwrap();
        let out = graph.output_id(a, "x").unwrap();
        let inp = graph.input_id(b, "x").unwrap();
        // connect accepts either order; the view is always output first
        graph.connect(inp, out).unwrap();

        let edges = graph.edges();
        assert_eq!(edges.len(), 1);
        assert_eq!((edges[0].from_socket, edges[0].to_socket), (out, inp));
        assert!(edges[0].involves_node(a) && edges[0].involves_node(b));
        assert!(edges[0].involves_socket(inp));
        assert!(!edges[0].involves_socket(graph.input_id(a, "x").unwrap()));
    }
}
