// SPDX-License-Identifier: MIT OR Apache-2.0
//! External owner for library nodes.
//!
//! Library nodes are flagged `SAVE_PROXY`: the graph snapshot stores only a
//! proxy, while the library document keeps the real node. After a snapshot
//! is reloaded the library hands its nodes back to the graph.

use crate::app::{AppError, AppResult};
use datagraph_core::{Graph, GraphClass, Node, NodeFlags, NodeRecord, Socket, SocketRecord};
use serde::{Deserialize, Serialize};

/// Document holding the real state of library nodes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetLibrary {
    /// Owned nodes, keyed by their id in the graph that uses them
    pub nodes: Vec<NodeRecord>,
}

impl AssetLibrary {
    /// Collect every library-owned node of a graph
    pub fn capture<C>(graph: &Graph<C>) -> Self {
        let nodes = graph
            .nodes()
            .filter(|n| n.flags.contains(NodeFlags::SAVE_PROXY) && !n.is_proxy())
            .map(NodeRecord::from_node)
            .collect();
        Self { nodes }
    }

    /// Serialize to RON text
    pub fn to_ron(&self) -> AppResult<String> {
        let config = ron::ser::PrettyConfig::default().struct_names(true);
        Ok(ron::ser::to_string_pretty(self, config)?)
    }

    /// Parse from RON text
    pub fn from_ron(text: &str) -> AppResult<Self> {
        Ok(ron::from_str(text)?)
    }

    /// Swap each proxy in `graph` for the real node; returns how many were relinked
    pub fn relink_all<C>(&self, class: &GraphClass<C>, graph: &mut Graph<C>) -> AppResult<usize> {
        let mut relinked = 0;
        for record in &self.nodes {
            let node = restore(class, record)?;
            graph
                .relink_proxy_owner(node)
                .map_err(|node| AppError::Relink(node.graph_id()))?;
            relinked += 1;
        }
        tracing::debug!(relinked, graph = %graph.name, "Relinked library nodes");
        Ok(relinked)
    }
}

fn restore<C>(class: &GraphClass<C>, record: &NodeRecord) -> AppResult<Node<C>> {
    let mut node = class.create(&record.class_name)?;
    node.ui_name.clone_from(&record.ui_name);
    node.ui_pos = record.ui_pos;
    node.set_graph_id(record.graph_id);

    let apply = |saved: &SocketRecord, socket: Option<&mut Socket>| -> AppResult<()> {
        if let (Some(value), Some(socket)) = (&saved.value, socket) {
            socket.set_value(value.clone())?;
        }
        Ok(())
    };
    for saved in &record.inputs {
        apply(saved, node.input_mut(&saved.name))?;
    }
    for saved in &record.outputs {
        apply(saved, node.output_mut(&saved.name))?;
    }
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo;
    use crate::host::FrameContext;
    use datagraph_core::graphs::shader::SHADER_GRAPH;
    use datagraph_core::{GraphId, GraphSettings, SocketValue};

    #[test]
    fn test_capture_only_library_nodes() {
        let registry = demo::registry();
        let class = registry.get_graph_class(SHADER_GRAPH).unwrap();
        let material = demo::build_shader(class, &GraphSettings::default()).unwrap();

        let library = AssetLibrary::capture(&material.graph);
        assert_eq!(library.nodes.len(), 1);
        assert_eq!(library.nodes[0].class_name, demo::LIBRARY_COLOR);

        let parsed = AssetLibrary::from_ron(&library.to_ron().unwrap()).unwrap();
        assert_eq!(parsed, library);
    }

    #[test]
    fn test_relink_restores_real_node() {
        let registry = demo::registry();
        let class = registry.get_graph_class(SHADER_GRAPH).unwrap();
        let mut material = demo::build_shader(class, &GraphSettings::default()).unwrap();
        material.graph.exec(&mut FrameContext::default()).unwrap();

        let library = AssetLibrary::capture(&material.graph);
        let mut reloaded = class.load_graph(&material.graph.snapshot());
        let id = library.nodes[0].graph_id;
        assert!(reloaded.node(id).unwrap().is_proxy());

        assert_eq!(library.relink_all(class, &mut reloaded).unwrap(), 1);
        let node = reloaded.node(id).unwrap();
        assert!(!node.is_proxy());
        assert_eq!(
            node.output("color").unwrap().get_value().unwrap(),
            &SocketValue::Color(demo::LIBRARY_TINT)
        );
        assert!(node.output("color").unwrap().has_edges());
    }

    #[test]
    fn test_relink_without_proxy_fails() {
        let registry = demo::registry();
        let class = registry.get_graph_class(SHADER_GRAPH).unwrap();
        let mut graph = class.new_graph("empty");

        let mut record = NodeRecord::from_node(&class.create(demo::LIBRARY_COLOR).unwrap());
        record.graph_id = GraphId(7);
        let library = AssetLibrary { nodes: vec![record] };
        assert!(matches!(library.relink_all(class, &mut graph), Err(AppError::Relink(GraphId(7)))));
    }
}
