// SPDX-License-Identifier: MIT OR Apache-2.0
//! Engine error type.

use crate::connection::ConnectionError;
use crate::id::GraphId;
use thiserror::Error;

/// Errors raised by the graph engine
#[derive(Debug, Error)]
pub enum GraphError {
    /// Graph has cycles but its policy doesn't allow them
    #[error("Graph contains a cycle and cycles are not allowed")]
    CyclicGraph,

    /// Value operation on a socket type without value semantics
    #[error("Not implemented for socket type {0}")]
    NotImplemented(String),

    /// Connection rejected
    #[error("Invalid connection: {0}")]
    InvalidConnection(#[from] ConnectionError),

    /// Node already belongs to a graph
    #[error("Node already in graph: {0}")]
    AlreadyInGraph(GraphId),

    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(GraphId),

    /// Socket not found on a node
    #[error("Socket not found: {0}")]
    SocketNotFound(String),

    /// Graph class not registered
    #[error("Unknown graph class: {0}")]
    UnknownGraphClass(String),

    /// Node class not registered with the graph class
    #[error("Unknown node class {node} in graph class {graph}")]
    UnknownNodeClass {
        /// Graph class name
        graph: String,
        /// Requested node class name
        node: String,
    },

    /// Value can't be converted to the socket type
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Socket type
        expected: String,
        /// Offered value type
        found: String,
    },

    /// Snapshot serialization failed
    #[error("Serialization error: {0}")]
    Serialize(#[from] ron::Error),

    /// Snapshot parsing failed
    #[error("Deserialization error: {0}")]
    Deserialize(#[from] ron::error::SpannedError),

    /// File access failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure reported by a node implementation
    #[error("{0}")]
    Custom(String),
}

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, GraphError>;
