// SPDX-License-Identifier: MIT OR Apache-2.0
//! Dependency graph evaluation engine.
//!
//! Nodes own typed input and output sockets; sockets are joined by
//! symmetric edges. A [`Graph`] sorts its nodes topologically, runs dirty
//! nodes in dependency order and, when its policy allows cycles, relaxes
//! cyclic graphs until their values settle.
//!
//! ## Architecture
//!
//! - [`Socket`]: typed endpoint holding a [`SocketValue`] and edge ids
//! - [`Node`]: built from a [`NodeDef`], runs a [`NodeBehavior`]
//! - [`Graph`]: arena of nodes keyed by [`GraphId`], scheduling and evaluation
//! - [`GraphClass`] / [`GraphClassRegistry`]: graph flavors and their node classes
//! - [`ProxyNode`]: persistence stand-in for externally owned nodes
//! - [`GraphSnapshot`]: serde records for saving and reloading graphs
//!
//! Values move only when a node explicitly updates an output. The host
//! drives evaluation through [`Graph::exec`] or the coalesced
//! [`Graph::run_pending`].

pub mod config;
pub mod connection;
pub mod error;
pub mod evaluation;
pub mod flags;
pub mod graph;
pub mod graphs;
pub mod id;
pub mod node;
pub mod persist;
pub mod proxy;
pub mod registry;
pub mod socket;

pub use config::GraphSettings;
pub use connection::{ConnectionError, Edge};
pub use error::{GraphError, Result};
pub use evaluation::ExecReport;
pub use flags::{GraphFlags, NodeFlags, SocketFlags};
pub use graph::Graph;
pub use id::{GraphId, IdGen};
pub use node::{CallbackNode, Node, NodeBehavior, NodeClass, NodeDef, NodeScope, Passthrough};
pub use persist::{GraphSnapshot, NodeRecord, SocketRecord};
pub use proxy::ProxyNode;
pub use registry::{GraphClass, GraphClassRegistry};
pub use socket::{Closure, Socket, SocketDirection, SocketType, SocketValue};
