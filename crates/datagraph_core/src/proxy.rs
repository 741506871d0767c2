// SPDX-License-Identifier: MIT OR Apache-2.0
//! Proxy stand-ins for nodes persisted by an external owner.
//!
//! A node flagged `SAVE_PROXY` lives in some other document (a library
//! asset, a scene object). The graph persists only a [`ProxyNode`] carrying
//! the same ids, values and edges; after loading, the owner hands the real
//! node back through [`Graph::relink_proxy_owner`].

use crate::error::Result;
use crate::flags::{NodeFlags, SORT_MARKS};
use crate::graph::{Graph, SocketKey};
use crate::id::GraphId;
use crate::node::{Node, NodeBehavior, NodeScope};
use crate::socket::SocketDirection;

/// Behaviour of a proxy: holds sockets, computes nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct ProxyNode;

impl ProxyNode {
    /// Stand-in mirroring the id, socket ids, values and edges of `node`
    pub fn from_node<C>(node: &Node<C>) -> Node<C> {
        let mut proxy = node.clone_with(Box::new(ProxyNode));
        proxy.flags.remove(SORT_MARKS);
        proxy
    }
}

impl<C> NodeBehavior<C> for ProxyNode {
    fn exec(&mut self, _scope: &mut NodeScope<'_>, _ctx: &mut C) -> Result<()> {
        Ok(())
    }

    fn is_proxy(&self) -> bool {
        true
    }
}

impl<C> Graph<C> {
    /// Replace the proxy stored under `node.graph_id()` with `node`.
    ///
    /// Same-named sockets inherit the proxy socket's id, edges, value and
    /// flags. Proxy sockets without a counterpart are disconnected; new
    /// sockets get fresh ids. If there is no proxy at that id the graph is
    /// left untouched and the node is handed back.
    pub fn relink_proxy_owner(
        &mut self,
        mut node: Node<C>,
    ) -> std::result::Result<GraphId, Box<Node<C>>> {
        let id = node.graph_id();
        let Some(proxy) = self.nodes.get(&id).filter(|n| n.is_proxy()) else {
            tracing::warn!("No proxy node with id {id} in graph {}", self.name);
            return Err(Box::new(node));
        };

        let mut orphans = Vec::new();
        for direction in [SocketDirection::Input, SocketDirection::Output] {
            for (name, proxy_socket) in proxy.sockets(direction) {
                let Some(real) = node.socket_mut(direction, name) else {
                    orphans.push(proxy_socket.graph_id());
                    continue;
                };
                real.graph_id = proxy_socket.graph_id();
                real.edges = proxy_socket.edges.clone();
                real.flags = proxy_socket.flags;
                if let Some(value) = proxy_socket.raw_value() {
                    if real.socket_type().has_value() {
                        if let Err(err) = real.set_value(value.clone()) {
                            tracing::warn!(
                                "Couldn't restore value of socket {name} on node {id}: {err}"
                            );
                        }
                    }
                }
            }
        }

        for socket in orphans {
            self.disconnect_all(socket);
            self.sock_idmap.remove(&socket);
        }

        for direction in [SocketDirection::Input, SocketDirection::Output] {
            for (name, socket) in node.sockets_mut(direction).iter_mut() {
                let key = SocketKey {
                    node: id,
                    direction,
                    name: name.clone(),
                };
                // matched sockets already sit under the proxy's key
                if self.sock_idmap.get(&socket.graph_id) != Some(&key) {
                    socket.graph_id = self.id_gen.next_id();
                    socket.edges.clear();
                }
                self.sock_idmap.insert(socket.graph_id, key);
            }
        }

        node.adopt_sockets();
        node.flags.remove(SORT_MARKS);
        node.flags.insert(NodeFlags::UPDATE);

        if let Some(slot) = self.nodes.get_mut(&id) {
            *slot = node;
        }
        self.flag_resort();
        self.request_pass();
        self.signal_ui();
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeDef, Passthrough};
    use crate::socket::{Socket, SocketValue};

    fn def() -> NodeDef {
        NodeDef::new("asset")
            .with_flags(NodeFlags::SAVE_PROXY)
            .input("in", Socket::float(0.0))
            .output("out", Socket::float(0.0))
    }

    #[test]
    fn test_proxy_mirrors_node() {
        let mut graph: Graph<()> = Graph::new("test");
        let id = graph.add(Node::new(&def(), Passthrough)).unwrap();
        let node = graph.node(id).unwrap();
        let proxy = ProxyNode::from_node(node);

        assert!(proxy.is_proxy());
        assert_eq!(proxy.graph_id(), id);
        let ids: Vec<_> = proxy.all_sockets().map(Socket::graph_id).collect();
        let real: Vec<_> = node.all_sockets().map(Socket::graph_id).collect();
        assert_eq!(ids, real);
    }

    #[test]
    fn test_relink_without_proxy_returns_node() {
        let mut graph: Graph<()> = Graph::new("test");
        let id = graph.add(Node::new(&def(), Passthrough)).unwrap();

        let mut node = Node::new(&def(), Passthrough);
        node.set_graph_id(id);
        let back = graph.relink_proxy_owner(node).unwrap_err();
        assert_eq!(back.graph_id(), id);
        assert!(!graph.node(id).unwrap().is_proxy());
    }

    #[test]
    fn test_relink_patches_new_and_missing_sockets() {
        let mut graph: Graph<()> = Graph::new("test");
        let src_def = NodeDef::new("src").output("v", Socket::float(0.0));
        let src = graph.add(Node::new(&src_def, Passthrough)).unwrap();
        let old_def = def().input("gone", Socket::float(0.0));
        let id = graph.add(Node::new(&old_def, Passthrough)).unwrap();
        let gone = graph.input_id(id, "gone").unwrap();
        graph.connect(graph.output_id(src, "v").unwrap(), gone).unwrap();

        let proxy = ProxyNode::from_node(graph.node(id).unwrap());
        *graph.node_mut(id).unwrap() = proxy;
        let input = graph.input_id(id, "in").unwrap();
        graph.set_and_update(input, SocketValue::Float(2.5), false).unwrap();

        let mut real = Node::new(&def().input("fresh", Socket::int(1)), Passthrough);
        real.set_graph_id(id);
        graph.relink_proxy_owner(real).unwrap();

        let node = graph.node(id).unwrap();
        assert!(!node.is_proxy());
        assert!(node.input("gone").is_none());
        assert!(!graph.socket(graph.output_id(src, "v").unwrap()).unwrap().has_edges());
        assert_eq!(node.input("in").unwrap().get_value().unwrap(), &SocketValue::Float(2.5));

        let fresh = node.input("fresh").unwrap().graph_id();
        assert!(fresh.is_valid());
        assert_eq!(graph.socket_owner(fresh), Some(id));
    }
}
