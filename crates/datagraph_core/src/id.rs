// SPDX-License-Identifier: MIT OR Apache-2.0
//! Integer identities for nodes and sockets.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a node or socket within one graph.
///
/// Nodes and sockets share one id space. [`GraphId::NONE`] marks an element
/// that is not part of any graph.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraphId(pub i64);

impl GraphId {
    /// Sentinel for "not yet added"
    pub const NONE: GraphId = GraphId(-1);

    /// Whether this id was assigned by a graph
    pub const fn is_valid(self) -> bool {
        self.0 >= 0
    }
}

impl Default for GraphId {
    fn default() -> Self {
        Self::NONE
    }
}

impl fmt::Debug for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic id allocator, persisted with the graph
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdGen {
    cur: i64,
}

impl IdGen {
    /// Create a generator starting at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id
    pub fn next_id(&mut self) -> GraphId {
        let id = GraphId(self.cur);
        self.cur += 1;
        id
    }

    /// Ensure future ids are greater than `id`.
    ///
    /// Returns `false` and leaves the generator alone when no id fits past `id`.
    pub fn reserve_past(&mut self, id: GraphId) -> bool {
        if id.0 < self.cur {
            return true;
        }
        match id.0.checked_add(1) {
            Some(next) => {
                self.cur = next;
                true
            }
            None => false,
        }
    }
}
