// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph snapshots and reloading.
//!
//! Snapshots are plain serde records keyed by [`GraphId`]. Loading goes
//! through a [`GraphClass`] so each node is rebuilt against its current
//! class definition.

use crate::error::Result;
use crate::flags::{GraphFlags, NodeFlags, SocketFlags, SORT_MARKS};
use crate::graph::{Graph, SocketKey};
use crate::id::{GraphId, IdGen};
use crate::node::{Node, NodeDef};
use crate::proxy::ProxyNode;
use crate::registry::GraphClass;
use crate::socket::{Socket, SocketDirection, SocketType, SocketValue};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Persisted socket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocketRecord {
    /// Socket id
    pub graph_id: GraphId,
    /// Key in the node's socket map
    pub name: String,
    /// Display name
    pub ui_name: String,
    /// Socket type at save time
    pub socket_type: SocketType,
    /// Socket flags
    pub flags: SocketFlags,
    /// Value, absent for abstract types
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<SocketValue>,
    /// Ids of connected sockets
    #[serde(default)]
    pub edges: Vec<GraphId>,
}

impl SocketRecord {
    fn from_socket(socket: &Socket) -> Self {
        Self {
            graph_id: socket.graph_id(),
            name: socket.name().to_string(),
            ui_name: socket.ui_name.clone(),
            socket_type: socket.socket_type().clone(),
            flags: socket.flags,
            value: socket.raw_value().cloned(),
            edges: socket.edges().to_vec(),
        }
    }
}

/// Persisted node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Node id
    pub graph_id: GraphId,
    /// Node class name
    pub class_name: String,
    /// Display name
    pub ui_name: String,
    /// Node flags
    pub flags: NodeFlags,
    /// Editor position
    pub ui_pos: [f32; 2],
    /// Editor size
    pub ui_size: [f32; 2],
    /// Whether this record is a proxy stand-in
    #[serde(default)]
    pub proxy: bool,
    /// Input sockets
    pub inputs: Vec<SocketRecord>,
    /// Output sockets
    pub outputs: Vec<SocketRecord>,
}

impl NodeRecord {
    /// Record a node as it is
    pub fn from_node<C>(node: &Node<C>) -> Self {
        let mut flags = node.flags;
        flags.remove(SORT_MARKS);
        Self {
            graph_id: node.graph_id(),
            class_name: node.class_name().to_string(),
            ui_name: node.ui_name.clone(),
            flags,
            ui_pos: node.ui_pos,
            ui_size: node.ui_size,
            proxy: node.is_proxy(),
            inputs: node.inputs().map(SocketRecord::from_socket).collect(),
            outputs: node.outputs().map(SocketRecord::from_socket).collect(),
        }
    }

    fn sockets(&self) -> impl Iterator<Item = (SocketDirection, &SocketRecord)> {
        let inputs = self.inputs.iter().map(|s| (SocketDirection::Input, s));
        let outputs = self.outputs.iter().map(|s| (SocketDirection::Output, s));
        inputs.chain(outputs)
    }
}

/// Persisted graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    /// Graph name
    pub name: String,
    /// Id generator state
    pub id_gen: IdGen,
    /// Cycle policy
    #[serde(default)]
    pub cycles_allowed: bool,
    /// Relaxation iteration cap
    pub max_cycle_steps: usize,
    /// Relaxation stop threshold
    pub cycle_stop_threshold: f32,
    /// Nodes in list order
    pub nodes: Vec<NodeRecord>,
}

impl GraphSnapshot {
    /// Serialize to RON text
    pub fn to_ron(&self) -> Result<String> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        Ok(ron::ser::to_string_pretty(self, config)?)
    }

    /// Parse from RON text
    pub fn from_ron(text: &str) -> Result<Self> {
        Ok(ron::from_str(text)?)
    }

    /// Record for a node id
    pub fn node(&self, id: GraphId) -> Option<&NodeRecord> {
        self.nodes.iter().find(|n| n.graph_id == id)
    }
}

impl<C> Graph<C> {
    /// Records for every persistent node.
    ///
    /// ZOMBIE nodes are left out; SAVE_PROXY nodes are written as proxies.
    pub fn save_nodes(&self) -> Vec<NodeRecord> {
        self.nodes
            .values()
            .filter(|n| !n.flags.contains(NodeFlags::ZOMBIE))
            .map(|node| {
                if node.flags.contains(NodeFlags::SAVE_PROXY) && !node.is_proxy() {
                    NodeRecord::from_node(&ProxyNode::from_node(node))
                } else {
                    NodeRecord::from_node(node)
                }
            })
            .collect()
    }

    /// Snapshot of the whole graph
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            name: self.name.clone(),
            id_gen: self.id_gen.clone(),
            cycles_allowed: self.cycles_allowed(),
            max_cycle_steps: self.max_cycle_steps,
            cycle_stop_threshold: self.cycle_stop_threshold,
            nodes: self.save_nodes(),
        }
    }
}

impl<C> GraphClass<C> {
    /// Rebuild a graph from a snapshot.
    ///
    /// Nodes are rebuilt from their class definitions: sockets added to a
    /// class since the snapshot was written get fresh ids, sockets only
    /// present in the snapshot are kept. Records of unknown classes are
    /// skipped. Edges without a live, reciprocal far end are dropped and
    /// zombie nodes are pruned. Proxies stay in place until their owner
    /// calls [`Graph::relink_proxy_owner`].
    pub fn load_graph(&self, snapshot: &GraphSnapshot) -> Graph<C> {
        let mut graph = self.new_graph(snapshot.name.clone());
        let class_allows = self.default_flags.contains(GraphFlags::CYCLIC_ALLOWED);
        graph.set_cycles_allowed(snapshot.cycles_allowed || class_allows);
        graph.max_cycle_steps = snapshot.max_cycle_steps;
        graph.cycle_stop_threshold = snapshot.cycle_stop_threshold;
        graph.id_gen = snapshot.id_gen.clone();

        let mut rejected = HashSet::new();
        for record in &snapshot.nodes {
            let mut fits = graph.id_gen.reserve_past(record.graph_id);
            for (_, socket) in record.sockets() {
                fits &= graph.id_gen.reserve_past(socket.graph_id);
                // edges past the id range are dropped as dead later
                for &far in &socket.edges {
                    graph.id_gen.reserve_past(far);
                }
            }
            if !fits {
                tracing::warn!("Skipping node {}: id out of range", record.graph_id);
                rejected.insert(record.graph_id);
            }
        }

        for record in &snapshot.nodes {
            if rejected.contains(&record.graph_id) {
                continue;
            }
            let Some(node) = self.rebuild_node(record) else {
                continue;
            };
            if graph.nodes.contains_key(&record.graph_id) {
                tracing::warn!("Duplicate node id {} in snapshot", record.graph_id);
                continue;
            }
            graph.nodes.insert(record.graph_id, node);
        }

        register_sockets(&mut graph);
        drop_dead_edges(&mut graph);

        let zombies: Vec<GraphId> = graph
            .nodes
            .values()
            .filter(|n| n.flags.contains(NodeFlags::ZOMBIE))
            .map(Node::graph_id)
            .collect();
        for id in zombies {
            graph.remove(id);
        }

        for node in graph.nodes.values_mut() {
            node.graph_update();
        }
        graph.flag_resort();
        graph.request_pass();
        tracing::debug!(graph = %graph.name, nodes = graph.node_count(), "Loaded graph");
        graph
    }

    fn rebuild_node(&self, record: &NodeRecord) -> Option<Node<C>> {
        let mut node = if record.proxy {
            Node::new(&NodeDef::new(record.class_name.clone()), ProxyNode)
        } else {
            match self.create(&record.class_name) {
                Ok(node) => node,
                Err(err) => {
                    tracing::warn!("Skipping node {}: {err}", record.graph_id);
                    return None;
                }
            }
        };

        node.set_graph_id(record.graph_id);
        node.ui_name.clone_from(&record.ui_name);
        node.flags = record.flags;
        node.flags.remove(SORT_MARKS);
        node.ui_pos = record.ui_pos;
        node.ui_size = record.ui_size;

        for (direction, saved) in record.sockets() {
            if node.socket(direction, &saved.name).is_none() {
                let socket = Socket::new(saved.socket_type.clone());
                node.add_socket(direction, saved.name.clone(), socket);
            }
            let Some(socket) = node.socket_mut(direction, &saved.name) else {
                continue;
            };

            socket.graph_id = saved.graph_id;
            socket.edges.clone_from(&saved.edges);
            socket.flags = saved.flags;
            if !saved.ui_name.is_empty() {
                socket.ui_name.clone_from(&saved.ui_name);
            }
            if let Some(value) = &saved.value {
                if socket.socket_type().has_value() {
                    if let Err(err) = socket.set_value(value.clone()) {
                        tracing::warn!("Dropping saved value of socket {}: {err}", saved.name);
                    }
                }
            }
        }

        node.adopt_sockets();
        Some(node)
    }
}

/// Assign ids to sockets without one and rebuild the socket id map
fn register_sockets<C>(graph: &mut Graph<C>) {
    graph.sock_idmap.clear();
    let mut seen = HashSet::new();

    for (&node_id, node) in graph.nodes.iter_mut() {
        for direction in [SocketDirection::Input, SocketDirection::Output] {
            for (name, socket) in node.sockets_mut(direction).iter_mut() {
                if !socket.graph_id.is_valid() || !seen.insert(socket.graph_id) {
                    socket.graph_id = graph.id_gen.next_id();
                    socket.edges.clear();
                    seen.insert(socket.graph_id);
                }
                graph.sock_idmap.insert(
                    socket.graph_id,
                    SocketKey {
                        node: node_id,
                        direction,
                        name: name.clone(),
                    },
                );
            }
        }
    }
}

/// Remove edges whose far socket is missing or doesn't point back
fn drop_dead_edges<C>(graph: &mut Graph<C>) {
    let mut dead = Vec::new();
    for node in graph.nodes.values() {
        for socket in node.all_sockets() {
            for &far in socket.edges() {
                let live = graph.socket(far).is_some_and(|f| {
                    f.is_connected_to(socket.graph_id())
                        && f.direction() == socket.direction().opposite()
                        && f.owner() != socket.owner()
                });
                if !live {
                    dead.push((socket.graph_id(), far));
                }
            }
        }
    }

    for (socket, far) in dead {
        tracing::warn!("Dropping dead edge {socket} -> {far}");
        if let Some(socket) = graph.socket_mut(socket) {
            socket.edges.retain(|e| *e != far);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{CallbackNode, NodeClass, Passthrough};

    fn flavor() -> GraphClass<()> {
        GraphClass::new("test", "Test")
            .with_node(NodeClass::new::<Passthrough>(
                NodeDef::new("a").input("in", Socket::float(0.0)).output("out", Socket::float(0.0)),
            ))
            .with_node(NodeClass::new::<Passthrough>(
                NodeDef::new("lib")
                    .with_flags(NodeFlags::SAVE_PROXY)
                    .input("in", Socket::float(0.0))
                    .output("out", Socket::float(0.0)),
            ))
    }

    #[test]
    fn test_zombies_not_saved() {
        let class = flavor();
        let mut graph = class.new_graph("g");
        graph.add(class.create("a").unwrap()).unwrap();
        graph
            .add(CallbackNode::create("hook", |_, _: &mut ()| Ok(()), [], []))
            .unwrap();

        let records = graph.save_nodes();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].class_name, "a");
    }

    #[test]
    fn test_save_proxy_records() {
        let class = flavor();
        let mut graph = class.new_graph("g");
        let a = graph.add(class.create("a").unwrap()).unwrap();
        let lib = graph.add(class.create("lib").unwrap()).unwrap();
        graph
            .connect(graph.output_id(a, "out").unwrap(), graph.input_id(lib, "in").unwrap())
            .unwrap();

        let snapshot = graph.snapshot();
        let record = snapshot.node(lib).unwrap();
        assert!(record.proxy);
        assert_eq!(record.inputs[0].edges, [graph.output_id(a, "out").unwrap()]);
    }

    #[test]
    fn test_load_patches_sockets_and_edges() {
        let class = flavor();
        let mut graph = class.new_graph("g");
        let a = graph.add(class.create("a").unwrap()).unwrap();
        let b = graph.add(class.create("a").unwrap()).unwrap();
        graph
            .connect(graph.output_id(a, "out").unwrap(), graph.input_id(b, "in").unwrap())
            .unwrap();

        let mut snapshot = graph.snapshot();
        // class lost an output since save, and a dangling edge crept in
        snapshot.nodes[1].outputs.clear();
        snapshot.nodes[1].inputs[0].edges.push(GraphId(999));
        snapshot.nodes[0].inputs.push(SocketRecord {
            graph_id: GraphId(500),
            name: "extra".into(),
            ui_name: String::new(),
            socket_type: SocketType::Int,
            flags: SocketFlags::empty(),
            value: Some(SocketValue::Int(3)),
            edges: Vec::new(),
        });

        let loaded = class.load_graph(&snapshot);
        let node_b = loaded.node(b).unwrap();
        let out_b = node_b.output("out").unwrap().graph_id();
        assert!(out_b.is_valid());
        assert!(out_b.0 > 500);
        assert_eq!(node_b.input("in").unwrap().edges(), &[graph.output_id(a, "out").unwrap()]);

        let extra = loaded.node(a).unwrap().input("extra").unwrap();
        assert_eq!(extra.get_value().unwrap(), &SocketValue::Int(3));
        assert!(loaded.needs_resort());
        assert!(loaded.nodes().all(Node::needs_update));
    }

    #[test]
    fn test_load_skips_ids_out_of_range() {
        let class = flavor();
        let mut graph = class.new_graph("g");
        let a = graph.add(class.create("a").unwrap()).unwrap();
        let b = graph.add(class.create("a").unwrap()).unwrap();
        graph
            .connect(graph.output_id(a, "out").unwrap(), graph.input_id(b, "in").unwrap())
            .unwrap();

        let mut snapshot = graph.snapshot();
        snapshot.nodes[0].graph_id = GraphId(i64::MAX);

        let mut loaded = class.load_graph(&snapshot);
        assert_eq!(loaded.node_ids().collect::<Vec<_>>(), [b]);
        assert!(!loaded.node(b).unwrap().input("in").unwrap().has_edges());

        let c = loaded.add(class.create("a").unwrap()).unwrap();
        assert!(c.is_valid());
        assert!(c > b);
    }

    #[test]
    fn test_snapshot_ron_text() {
        let class = flavor();
        let mut graph = class.new_graph("g");
        graph.add(class.create("a").unwrap()).unwrap();

        let text = graph.snapshot().to_ron().unwrap();
        let parsed = GraphSnapshot::from_ron(&text).unwrap();
        assert_eq!(parsed, graph.snapshot());
    }
}
