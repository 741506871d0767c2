// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing nodes and socket edges.

use crate::config::GraphSettings;
use crate::connection::{ConnectionError, Edge};
use crate::error::{GraphError, Result};
use crate::flags::{GraphFlags, NodeFlags, SocketFlags, SORT_MARKS};
use crate::id::{GraphId, IdGen};
use crate::node::Node;
use crate::socket::{Socket, SocketDirection, SocketValue};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;

/// Upper bound on edges removed from one socket in a single call
pub(crate) const MAX_DISCONNECT: usize = 10_000;

/// Location of a socket inside the node arena
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SocketKey {
    pub(crate) node: GraphId,
    pub(crate) direction: SocketDirection,
    pub(crate) name: String,
}

/// A node graph.
///
/// The graph owns its nodes. Nodes and sockets refer to each other through
/// [`GraphId`]s only, so every structural change goes through the graph.
pub struct Graph<C> {
    /// Graph name
    pub name: String,
    /// Graph flags (policy and computed state)
    pub flags: GraphFlags,
    /// Iteration cap for the relaxation solver
    pub max_cycle_steps: usize,
    /// Summed change below which relaxation stops
    pub cycle_stop_threshold: f32,
    pub(crate) nodes: IndexMap<GraphId, Node<C>>,
    pub(crate) sort_list: Vec<GraphId>,
    pub(crate) id_gen: IdGen,
    pub(crate) sock_idmap: HashMap<GraphId, SocketKey>,
    pub(crate) pending: bool,
    update_gen: u64,
}

impl<C> Graph<C> {
    /// Create a new empty graph
    pub fn new(name: impl Into<String>) -> Self {
        let settings = GraphSettings::default();
        Self {
            name: name.into(),
            flags: GraphFlags::empty(),
            max_cycle_steps: settings.max_cycle_steps,
            cycle_stop_threshold: settings.cycle_stop_threshold,
            nodes: IndexMap::new(),
            sort_list: Vec::new(),
            id_gen: IdGen::new(),
            sock_idmap: HashMap::new(),
            pending: false,
            update_gen: 0,
        }
    }

    /// Apply solver settings and cycle policy
    pub fn apply_settings(&mut self, settings: &GraphSettings) {
        self.max_cycle_steps = settings.max_cycle_steps;
        self.cycle_stop_threshold = settings.cycle_stop_threshold;
        self.set_cycles_allowed(settings.cycles_allowed);
    }

    /// Add a node, assigning ids to it and its sockets
    pub fn add(&mut self, mut node: Node<C>) -> Result<GraphId> {
        if node.graph_id.is_valid() {
            tracing::warn!("Node {} is already in a graph", node.graph_id);
            return Err(GraphError::AlreadyInGraph(node.graph_id));
        }

        let id = self.id_gen.next_id();
        node.graph_id = id;
        for direction in [SocketDirection::Input, SocketDirection::Output] {
            for (name, socket) in node.sockets_mut(direction).iter_mut() {
                socket.graph_id = self.id_gen.next_id();
                socket.edges.clear();
                self.sock_idmap.insert(
                    socket.graph_id,
                    SocketKey {
                        node: id,
                        direction,
                        name: name.clone(),
                    },
                );
            }
        }
        node.adopt_sockets();
        node.flags.remove(SORT_MARKS);
        node.graph_update();

        self.nodes.insert(id, node);
        self.flag_resort();
        self.signal_ui();
        Ok(id)
    }

    /// Add a socket to a node that is already in the graph
    pub fn add_socket(
        &mut self,
        node_id: GraphId,
        direction: SocketDirection,
        name: impl Into<String>,
        socket: Socket,
    ) -> Result<GraphId> {
        let name = name.into();
        let node = self.nodes.get_mut(&node_id).ok_or(GraphError::NodeNotFound(node_id))?;
        if let Some(old) = node.sockets(direction).get(&name).map(Socket::graph_id) {
            self.disconnect_all(old);
            self.sock_idmap.remove(&old);
        }

        let socket_id = self.id_gen.next_id();
        let mut socket = socket.copy();
        socket.graph_id = socket_id;

        let node = self.nodes.get_mut(&node_id).ok_or(GraphError::NodeNotFound(node_id))?;
        node.sockets_mut(direction).insert(name.clone(), socket);
        node.adopt_sockets();
        node.graph_update();

        self.sock_idmap.insert(socket_id, SocketKey { node: node_id, direction, name });
        self.flag_resort();
        Ok(socket_id)
    }

    /// Remove a node, disconnecting all of its edges.
    ///
    /// Returns the detached node with its ids cleared.
    pub fn remove(&mut self, id: GraphId) -> Option<Node<C>> {
        let Some(node) = self.nodes.get(&id).filter(|_| id.is_valid()) else {
            tracing::warn!("Node {id} is not in graph {}", self.name);
            return None;
        };

        let sockets: Vec<GraphId> = node.all_sockets().map(Socket::graph_id).collect();
        for socket in sockets {
            self.disconnect_all(socket);
        }

        let mut node = self.nodes.shift_remove(&id)?;
        for socket in node.all_sockets_mut() {
            self.sock_idmap.remove(&socket.graph_id);
            socket.graph_id = GraphId::NONE;
            socket.edges.clear();
        }
        node.graph_id = GraphId::NONE;
        node.adopt_sockets();
        node.flags.remove(SORT_MARKS);

        self.sort_list.retain(|n| *n != id);
        self.flag_resort();
        self.signal_ui();
        Some(node)
    }

    /// Remove every node
    pub fn clear(&mut self) {
        let ids: Vec<GraphId> = self.nodes.keys().copied().collect();
        for id in ids {
            self.remove(id);
        }
        self.sort_list.clear();
        self.flags.remove(GraphFlags::CYCLIC);
    }

    /// Whether `id` names a node of this graph
    pub fn has(&self, id: GraphId) -> bool {
        id.is_valid() && self.nodes.contains_key(&id)
    }

    /// Whether `node` is the instance stored under its id
    pub fn contains(&self, node: &Node<C>) -> bool {
        self.has(node.graph_id)
            && self.nodes.get(&node.graph_id).is_some_and(|n| std::ptr::eq(n, node))
    }

    /// Get a node by ID
    pub fn node(&self, id: GraphId) -> Option<&Node<C>> {
        self.nodes.get(&id)
    }

    /// Get a mutable node by ID
    pub fn node_mut(&mut self, id: GraphId) -> Option<&mut Node<C>> {
        self.nodes.get_mut(&id)
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &Node<C>> {
        self.nodes.values()
    }

    /// Node ids in insertion order
    pub fn node_ids(&self) -> impl Iterator<Item = GraphId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Last computed topological order
    pub fn sort_list(&self) -> &[GraphId] {
        &self.sort_list
    }

    /// Socket by id
    pub fn socket(&self, id: GraphId) -> Option<&Socket> {
        let key = self.sock_idmap.get(&id)?;
        self.nodes.get(&key.node)?.socket(key.direction, &key.name)
    }

    pub(crate) fn socket_mut(&mut self, id: GraphId) -> Option<&mut Socket> {
        let key = self.sock_idmap.get(&id)?;
        self.nodes.get_mut(&key.node)?.socket_mut(key.direction, &key.name)
    }

    /// Id of a named socket on a node
    pub fn socket_id(
        &self,
        node: GraphId,
        direction: SocketDirection,
        name: &str,
    ) -> Option<GraphId> {
        self.nodes.get(&node)?.socket(direction, name).map(Socket::graph_id)
    }

    /// Id of a named input socket
    pub fn input_id(&self, node: GraphId, name: &str) -> Option<GraphId> {
        self.socket_id(node, SocketDirection::Input, name)
    }

    /// Id of a named output socket
    pub fn output_id(&self, node: GraphId, name: &str) -> Option<GraphId> {
        self.socket_id(node, SocketDirection::Output, name)
    }

    /// Owning node of a socket
    pub fn socket_owner(&self, socket: GraphId) -> Option<GraphId> {
        self.sock_idmap.get(&socket).map(|key| key.node)
    }

    /// Connect two sockets of opposite direction.
    ///
    /// Connecting an already connected pair is a no-op.
    pub fn connect(&mut self, a: GraphId, b: GraphId) -> Result<()> {
        let sa = self.socket(a).ok_or(ConnectionError::SocketNotFound(a))?;
        let sb = self.socket(b).ok_or(ConnectionError::SocketNotFound(b))?;

        if sa.is_connected_to(b) {
            tracing::warn!("Sockets {a} and {b} are already connected");
            return Ok(());
        }
        if sa.direction() == sb.direction() {
            return Err(ConnectionError::SameDirection(a, b).into());
        }
        if sa.owner() == sb.owner() {
            return Err(ConnectionError::SameNode(a, b).into());
        }

        let (output, input) = match sa.direction() {
            SocketDirection::Output => (sa, sb),
            SocketDirection::Input => (sb, sa),
        };
        if !output.socket_type().can_connect_to(input.socket_type()) {
            return Err(ConnectionError::IncompatibleTypes {
                from: output.socket_type().to_string(),
                to: input.socket_type().to_string(),
            }
            .into());
        }
        for socket in [sa, sb] {
            if !socket.is_multi() && socket.has_edges() {
                return Err(ConnectionError::SocketOccupied(socket.graph_id()).into());
            }
        }

        let owners = [sa.owner(), sb.owner()];
        if let Some(socket) = self.socket_mut(a) {
            socket.edges.push(b);
        }
        if let Some(socket) = self.socket_mut(b) {
            socket.edges.push(a);
        }
        for owner in owners {
            if let Some(node) = self.nodes.get_mut(&owner) {
                node.graph_update();
            }
        }

        self.flag_resort();
        self.request_pass();
        Ok(())
    }

    /// Remove the edge between two sockets.
    ///
    /// Returns `false` if there was no such edge.
    pub fn disconnect(&mut self, a: GraphId, b: GraphId) -> bool {
        let Some(near) = self.socket_mut(a) else {
            tracing::warn!("Disconnect from unknown socket {a}");
            return false;
        };
        if !near.is_connected_to(b) {
            tracing::warn!("Sockets {a} and {b} are not connected");
            return false;
        }
        near.edges.retain(|e| *e != b);
        let near_owner = near.owner();

        let mut owners = vec![near_owner];
        match self.socket_mut(b) {
            Some(far) => {
                far.edges.retain(|e| *e != a);
                owners.push(far.owner());
            }
            None => tracing::warn!("Socket {a} had an edge to unknown socket {b}"),
        }
        for owner in owners {
            if let Some(node) = self.nodes.get_mut(&owner) {
                node.graph_update();
            }
        }

        self.flag_resort();
        self.request_pass();
        true
    }

    /// Remove every edge of a socket, returning how many were removed
    pub fn disconnect_all(&mut self, socket: GraphId) -> usize {
        let mut count = 0;
        while let Some(far) = self.socket(socket).and_then(|s| s.edges().first().copied()) {
            if count >= MAX_DISCONNECT {
                tracing::warn!("Too many edges on socket {socket}, giving up");
                break;
            }
            if !self.disconnect(socket, far) {
                break;
            }
            count += 1;
        }
        count
    }

    /// Every edge, output side first
    pub fn edges(&self) -> Vec<Edge> {
        let mut edges = Vec::new();
        for node in self.nodes.values() {
            for socket in node.outputs() {
                for &far in socket.edges() {
                    let Some(to_node) = self.socket_owner(far) else {
                        continue;
                    };
                    edges.push(Edge {
                        from_node: node.graph_id,
                        from_socket: socket.graph_id(),
                        to_node,
                        to_socket: far,
                    });
                }
            }
        }
        edges
    }

    /// Push a socket's value along its edges.
    ///
    /// Far sockets receive the value (converted to their type) and their
    /// nodes are flagged for execution. The socket's own node is left alone.
    pub fn update_socket(&mut self, id: GraphId, exclude: Option<GraphId>) -> Result<()> {
        let socket = self.socket_mut(id).ok_or_else(|| GraphError::SocketNotFound(id.to_string()))?;
        socket.flags.insert(SocketFlags::UPDATE);
        let value = socket.raw_value().cloned();
        let edges = socket.edges.clone();

        for far in edges {
            if exclude == Some(far) {
                continue;
            }
            let Some(far_socket) = self.socket_mut(far) else {
                tracing::warn!("Socket {id} has a dangling edge to {far}");
                continue;
            };
            if let Some(value) = &value {
                if far_socket.socket_type().has_value() {
                    if let Err(err) = far_socket.set_value(value.clone()) {
                        tracing::warn!("Couldn't propagate value from {id} to {far}: {err}");
                    }
                }
            }
            far_socket.flags.insert(SocketFlags::UPDATE);
            let owner = far_socket.owner();
            if let Some(node) = self.nodes.get_mut(&owner) {
                node.graph_update();
            }
        }

        self.request_pass();
        Ok(())
    }

    /// Set a socket's value and propagate it
    pub fn set_and_update(
        &mut self,
        id: GraphId,
        value: SocketValue,
        update_parent: bool,
    ) -> Result<()> {
        let socket = self.socket_mut(id).ok_or_else(|| GraphError::SocketNotFound(id.to_string()))?;
        socket.set_value(value)?;
        if update_parent {
            let owner = socket.owner();
            if let Some(node) = self.nodes.get_mut(&owner) {
                node.graph_update();
            }
        }
        self.update_socket(id, None)
    }

    /// Flag a node for execution and request a pass
    pub fn mark_dirty(&mut self, id: GraphId) -> bool {
        let Some(node) = self.nodes.get_mut(&id) else {
            tracing::warn!("Can't mark unknown node {id} dirty");
            return false;
        };
        node.graph_update();
        self.request_pass();
        true
    }

    /// Request one evaluation pass
    pub fn request_pass(&mut self) {
        self.pending = true;
    }

    /// Whether a pass was requested since the last `exec`
    pub fn has_pending_update(&self) -> bool {
        self.pending
    }

    /// Mark the topology as changed
    pub fn flag_resort(&mut self) {
        self.flags.insert(GraphFlags::RESORT);
    }

    /// Whether the next `exec` will resort
    pub fn needs_resort(&self) -> bool {
        self.flags.contains(GraphFlags::RESORT)
    }

    /// Whether the last sort found a cycle
    pub fn is_cyclic(&self) -> bool {
        self.flags.contains(GraphFlags::CYCLIC)
    }

    /// Whether cyclic graphs are evaluated by relaxation
    pub fn cycles_allowed(&self) -> bool {
        self.flags.contains(GraphFlags::CYCLIC_ALLOWED)
    }

    /// Set the cycle policy
    pub fn set_cycles_allowed(&mut self, allowed: bool) {
        self.flags.set(GraphFlags::CYCLIC_ALLOWED, allowed);
    }

    /// Select or deselect a node
    pub fn set_selected(&mut self, id: GraphId, selected: bool) -> bool {
        let Some(node) = self.nodes.get_mut(&id) else {
            return false;
        };
        node.flags.set(NodeFlags::SELECT, selected);
        self.signal_ui();
        true
    }

    /// Ids of selected nodes, in insertion order
    pub fn selected(&self) -> impl Iterator<Item = GraphId> + '_ {
        self.nodes
            .values()
            .filter(|n| n.flags.contains(NodeFlags::SELECT))
            .map(Node::graph_id)
    }

    /// Move a node to the front of the node list
    pub fn push_to_front(&mut self, id: GraphId) -> bool {
        let Some(index) = self.nodes.get_index_of(&id) else {
            return false;
        };
        self.nodes.move_index(index, 0);
        self.signal_ui();
        true
    }

    /// Counter bumped whenever a view of the graph should redraw
    pub fn update_gen(&self) -> u64 {
        self.update_gen
    }

    /// Bump the redraw counter
    pub fn signal_ui(&mut self) {
        self.update_gen = self.update_gen.wrapping_add(1);
    }

    fn node_flags(&self, id: GraphId) -> Option<NodeFlags> {
        self.nodes.get(&id).map(|n| n.flags)
    }

    fn set_node_flags(&mut self, id: GraphId, insert: NodeFlags, remove: NodeFlags) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.flags.remove(remove);
            node.flags.insert(insert);
        }
    }

    /// Nodes feeding the inputs of `id`
    pub(crate) fn upstream(&self, id: GraphId) -> Vec<GraphId> {
        self.linked(id, SocketDirection::Input)
    }

    /// Nodes fed by the outputs of `id`
    pub(crate) fn downstream(&self, id: GraphId) -> Vec<GraphId> {
        self.linked(id, SocketDirection::Output)
    }

    fn linked(&self, id: GraphId, direction: SocketDirection) -> Vec<GraphId> {
        let Some(node) = self.nodes.get(&id) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for socket in node.sockets(direction).values() {
            for far in socket.edges() {
                if let Some(owner) = self.socket_owner(*far) {
                    if !out.contains(&owner) {
                        out.push(owner);
                    }
                }
            }
        }
        out
    }

    /// Recompute the topological order and the cyclic flag
    pub fn sort(&mut self) {
        tracing::debug!(graph = %self.name, nodes = self.nodes.len(), "Resorting graph");

        for node in self.nodes.values_mut() {
            node.flags.remove(SORT_MARKS);
        }
        self.flags.remove(GraphFlags::CYCLIC);

        let mut order = Vec::with_capacity(self.nodes.len());
        let ids: Vec<GraphId> = self.nodes.keys().copied().collect();
        for id in ids {
            self.sort_from(id, &mut order);
        }

        for node in self.nodes.values_mut() {
            node.flags.remove(SORT_MARKS);
        }

        if self.find_cycle() {
            if !self.is_cyclic() {
                tracing::warn!(graph = %self.name, "Cycle found by the colouring pass only");
            }
            self.flags.insert(GraphFlags::CYCLIC);
        }

        self.sort_list = order;
        self.flags.remove(GraphFlags::RESORT);
    }

    /// Post-order walk over input edges starting at `start`
    fn sort_from(&mut self, start: GraphId, order: &mut Vec<GraphId>) {
        match self.node_flags(start) {
            Some(flags) if !flags.contains(NodeFlags::SORT_TAG) => {}
            _ => return,
        }

        self.set_node_flags(start, NodeFlags::CYCLE_TAG, NodeFlags::empty());
        let mut stack = vec![(start, self.upstream(start), 0usize)];

        while let Some((id, deps, next)) = stack.last_mut() {
            let Some(&dep) = deps.get(*next) else {
                let id = *id;
                stack.pop();
                self.set_node_flags(id, NodeFlags::SORT_TAG, NodeFlags::CYCLE_TAG);
                order.push(id);
                continue;
            };
            *next += 1;

            let Some(flags) = self.node_flags(dep) else {
                continue;
            };
            if flags.contains(NodeFlags::CYCLE_TAG) {
                tracing::warn!(graph = %self.name, "Cycle detected at node {dep}");
                self.flags.insert(GraphFlags::CYCLIC);
                continue;
            }
            if flags.contains(NodeFlags::SORT_TAG) {
                continue;
            }

            self.set_node_flags(dep, NodeFlags::CYCLE_TAG, NodeFlags::empty());
            let deps = self.upstream(dep);
            stack.push((dep, deps, 0));
        }
    }

    /// Independent colouring walk over output edges
    fn find_cycle(&self) -> bool {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Open,
            Done,
        }

        let mut marks: HashMap<GraphId, Mark> = HashMap::with_capacity(self.nodes.len());
        for &start in self.nodes.keys() {
            if marks.contains_key(&start) {
                continue;
            }
            marks.insert(start, Mark::Open);
            let mut stack = vec![(start, self.downstream(start), 0usize)];

            while let Some((id, next_nodes, next)) = stack.last_mut() {
                let Some(&child) = next_nodes.get(*next) else {
                    let id = *id;
                    stack.pop();
                    marks.insert(id, Mark::Done);
                    continue;
                };
                *next += 1;

                match marks.get(&child) {
                    Some(Mark::Open) => return true,
                    Some(Mark::Done) => {}
                    None => {
                        marks.insert(child, Mark::Open);
                        let children = self.downstream(child);
                        stack.push((child, children, 0));
                    }
                }
            }
        }
        false
    }
}

impl<C> Default for Graph<C> {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

impl<C> Clone for Graph<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            flags: self.flags,
            max_cycle_steps: self.max_cycle_steps,
            cycle_stop_threshold: self.cycle_stop_threshold,
            nodes: self.nodes.clone(),
            sort_list: self.sort_list.clone(),
            id_gen: self.id_gen.clone(),
            sock_idmap: self.sock_idmap.clone(),
            pending: self.pending,
            update_gen: self.update_gen,
        }
    }
}

impl<C> fmt::Debug for Graph<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("name", &self.name)
            .field("flags", &self.flags)
            .field("nodes", &self.nodes.values().collect::<Vec<_>>())
            .field("sort_list", &self.sort_list)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeDef, Passthrough};

    fn def() -> NodeDef {
        NodeDef::new("pass")
            .input("in", Socket::float(0.0))
            .output("out", Socket::float(0.0))
    }

    fn chain(len: usize) -> (Graph<()>, Vec<GraphId>) {
        let mut graph = Graph::new("test");
        let ids: Vec<GraphId> = (0..len)
            .map(|_| graph.add(Node::new(&def(), Passthrough)).unwrap())
            .collect();
        for pair in ids.windows(2) {
            let out = graph.output_id(pair[0], "out").unwrap();
            let inp = graph.input_id(pair[1], "in").unwrap();
            graph.connect(out, inp).unwrap();
        }
        (graph, ids)
    }

    #[test]
    fn test_add_assigns_ids() {
        let mut graph: Graph<()> = Graph::new("test");
        let id = graph.add(Node::new(&def(), Passthrough)).unwrap();
        let node = graph.node(id).unwrap();

        assert!(graph.has(id));
        assert!(graph.contains(node));
        assert!(graph.needs_resort());
        for socket in node.all_sockets() {
            assert!(socket.graph_id().is_valid());
            assert_eq!(socket.owner(), id);
            assert_eq!(graph.socket_owner(socket.graph_id()), Some(id));
        }
    }

    #[test]
    fn test_add_twice_rejected() {
        let mut graph: Graph<()> = Graph::new("test");
        let id = graph.add(Node::new(&def(), Passthrough)).unwrap();
        let copy = graph.node(id).unwrap().clone();

        assert!(matches!(graph.add(copy), Err(GraphError::AlreadyInGraph(x)) if x == id));
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn test_connect_rules() {
        let (mut graph, ids) = chain(3);
        let out = graph.output_id(ids[0], "out").unwrap();
        let inp = graph.input_id(ids[1], "in").unwrap();
        let other_in = graph.input_id(ids[0], "in").unwrap();
        let other_out = graph.output_id(ids[2], "out").unwrap();

        // duplicate is a no-op
        graph.connect(out, inp).unwrap();
        assert_eq!(graph.socket(out).unwrap().edges(), &[inp]);

        assert!(matches!(
            graph.connect(inp, other_in),
            Err(GraphError::InvalidConnection(ConnectionError::SameDirection(..)))
        ));
        assert!(matches!(
            graph.connect(other_in, out),
            Err(GraphError::InvalidConnection(ConnectionError::SameNode(..)))
        ));
        assert!(matches!(
            graph.connect(other_out, inp),
            Err(GraphError::InvalidConnection(ConnectionError::SocketOccupied(_)))
        ));
    }

    #[test]
    fn test_disconnect_missing_edge() {
        let (mut graph, ids) = chain(2);
        let out = graph.output_id(ids[0], "out").unwrap();
        let inp = graph.input_id(ids[1], "in").unwrap();

        assert!(graph.disconnect(inp, out));
        assert!(!graph.disconnect(out, inp));
        assert!(!graph.socket(out).unwrap().has_edges());
    }

    #[test]
    fn test_sort_chain() {
        let (mut graph, ids) = chain(4);
        graph.push_to_front(ids[3]);
        graph.sort();

        assert_eq!(graph.sort_list(), &ids[..]);
        assert!(!graph.is_cyclic());
        assert!(!graph.needs_resort());
        assert!(graph.nodes().all(|n| !n.flags.intersects(SORT_MARKS)));
    }

    #[test]
    fn test_sort_detects_cycle() {
        let (mut graph, ids) = chain(3);
        let out = graph.output_id(ids[2], "out").unwrap();
        let inp = graph
            .add_socket(ids[0], SocketDirection::Input, "loop", Socket::float(0.0))
            .unwrap();
        graph.connect(out, inp).unwrap();

        graph.sort();
        assert!(graph.is_cyclic());
        assert_eq!(graph.sort_list().len(), 3);
    }

    #[test]
    fn test_clear() {
        let (mut graph, ids) = chain(3);
        let out = graph.output_id(ids[2], "out").unwrap();
        let inp = graph
            .add_socket(ids[0], SocketDirection::Input, "loop", Socket::float(0.0))
            .unwrap();
        graph.connect(out, inp).unwrap();
        graph.sort();
        assert!(graph.is_cyclic());

        graph.clear();
        assert!(graph.is_empty());
        assert_eq!(graph.node_count(), 0);
        assert!(graph.sock_idmap.is_empty());
        assert!(graph.sort_list().is_empty());
        assert!(!graph.is_cyclic());
        assert!(graph.socket(out).is_none());

        let id = graph.add(Node::new(&def(), Passthrough)).unwrap();
        assert!(id > ids[2]);
    }

    #[test]
    fn test_deep_chain_sorts_without_recursion() {
        let (mut graph, ids) = chain(5000);
        graph.sort();
        assert_eq!(graph.sort_list().first(), ids.first());
        assert_eq!(graph.sort_list().last(), ids.last());
    }

    #[test]
    fn test_remove_twice() {
        let (mut graph, ids) = chain(2);
        let node = graph.remove(ids[0]).unwrap();
        assert_eq!(node.graph_id(), GraphId::NONE);
        assert!(node.all_sockets().all(|s| !s.graph_id().is_valid() && !s.has_edges()));
        assert!(graph.remove(ids[0]).is_none());
        assert!(!graph.node(ids[1]).unwrap().input("in").unwrap().has_edges());
    }

    #[test]
    fn test_update_leaves_owner_clean() {
        let (mut graph, ids) = chain(2);
        graph.exec(&mut ()).unwrap();
        let out = graph.output_id(ids[0], "out").unwrap();

        graph.update_socket(out, None).unwrap();
        assert!(!graph.node(ids[0]).unwrap().needs_update());
        assert!(graph.node(ids[1]).unwrap().needs_update());
        assert!(graph.has_pending_update());

        graph.set_and_update(out, SocketValue::Float(1.0), true).unwrap();
        assert!(graph.node(ids[0]).unwrap().needs_update());
    }

    #[test]
    fn test_clone_is_deep() {
        let (graph, ids) = chain(2);
        let mut copy = graph.clone();
        let out = copy.output_id(ids[0], "out").unwrap();
        copy.set_and_update(out, SocketValue::Float(3.0), false).unwrap();

        let inp = graph.input_id(ids[1], "in").unwrap();
        assert_eq!(graph.socket(inp).unwrap().get_value().unwrap(), &SocketValue::Float(0.0));
        assert_eq!(copy.socket(inp).unwrap().get_value().unwrap(), &SocketValue::Float(3.0));
    }

    #[test]
    fn test_selection() {
        let (mut graph, ids) = chain(3);
        let before = graph.update_gen();
        graph.set_selected(ids[1], true);
        graph.set_selected(ids[2], true);
        graph.set_selected(ids[2], false);

        assert_eq!(graph.selected().collect::<Vec<_>>(), [ids[1]]);
        assert!(graph.update_gen() > before);
    }
}
