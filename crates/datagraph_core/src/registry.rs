// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph flavors and the catalogue of node classes they accept.

use crate::error::{GraphError, Result};
use crate::flags::GraphFlags;
use crate::graph::Graph;
use crate::node::{Node, NodeClass};
use indexmap::IndexMap;
use std::sync::Arc;

/// A graph flavor: a closed set of node classes plus default graph flags
#[derive(Debug, Clone)]
pub struct GraphClass<C> {
    /// Unique flavor name
    pub type_name: String,
    /// Display name
    pub ui_name: String,
    /// Flags every new graph of this flavor starts with
    pub default_flags: GraphFlags,
    node_classes: IndexMap<String, NodeClass<C>>,
}

impl<C> GraphClass<C> {
    /// Create an empty flavor
    pub fn new(type_name: impl Into<String>, ui_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            ui_name: ui_name.into(),
            default_flags: GraphFlags::empty(),
            node_classes: IndexMap::new(),
        }
    }

    /// Set the default graph flags
    pub fn with_flags(mut self, flags: GraphFlags) -> Self {
        self.default_flags |= flags;
        self
    }

    /// Register a node class with this flavor
    pub fn register(&mut self, class: NodeClass<C>) -> &mut Self {
        let name = class.name().to_string();
        if self.node_classes.insert(name.clone(), class).is_some() {
            tracing::warn!("Node class {name} registered twice in {}", self.type_name);
        }
        self
    }

    /// Builder form of [`GraphClass::register`]
    pub fn with_node(mut self, class: NodeClass<C>) -> Self {
        self.register(class);
        self
    }

    /// Node class by name
    pub fn node_class(&self, name: &str) -> Option<&NodeClass<C>> {
        self.node_classes.get(name)
    }

    /// Registered node classes in registration order
    pub fn node_classes(&self) -> impl Iterator<Item = &NodeClass<C>> {
        self.node_classes.values()
    }

    fn unknown(&self, name: &str) -> GraphError {
        GraphError::UnknownNodeClass {
            graph: self.type_name.clone(),
            node: name.to_string(),
        }
    }

    /// Create a detached node by class name
    pub fn create(&self, name: &str) -> Result<Node<C>> {
        self.node_class(name)
            .map(NodeClass::instantiate)
            .ok_or_else(|| self.unknown(name))
    }

    /// Create a detached node, refusing classes foreign to this flavor
    pub fn instantiate(&self, class: &NodeClass<C>) -> Result<Node<C>> {
        match self.node_class(class.name()) {
            Some(own) if Arc::ptr_eq(own.def(), class.def()) => Ok(class.instantiate()),
            _ => Err(self.unknown(class.name())),
        }
    }

    /// Create an empty graph of this flavor
    pub fn new_graph(&self, name: impl Into<String>) -> Graph<C> {
        let mut graph = Graph::new(name);
        graph.flags |= self.default_flags;
        graph
    }
}

/// Registry of graph flavors, built once at startup
#[derive(Debug, Clone)]
pub struct GraphClassRegistry<C> {
    classes: IndexMap<String, GraphClass<C>>,
}

impl<C> GraphClassRegistry<C> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self { classes: IndexMap::new() }
    }

    /// Register a flavor under its type name
    pub fn register_class(&mut self, class: GraphClass<C>) {
        let name = class.type_name.clone();
        if self.classes.insert(name.clone(), class).is_some() {
            tracing::warn!("Graph class {name} registered twice");
        }
    }

    /// Look up a flavor
    pub fn get_graph_class(&self, type_name: &str) -> Result<&GraphClass<C>> {
        self.classes
            .get(type_name)
            .ok_or_else(|| GraphError::UnknownGraphClass(type_name.to_string()))
    }

    /// All flavors in registration order
    pub fn graph_classes(&self) -> impl Iterator<Item = &GraphClass<C>> {
        self.classes.values()
    }
}

impl<C> Default for GraphClassRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeDef, Passthrough};
    use crate::socket::Socket;

    fn flavor() -> GraphClass<()> {
        GraphClass::new("test", "Test")
            .with_flags(GraphFlags::CYCLIC_ALLOWED)
            .with_node(NodeClass::new::<Passthrough>(
                NodeDef::new("a").output("x", Socket::float(0.0)),
            ))
    }

    #[test]
    fn test_create_by_name() {
        let class = flavor();
        let node = class.create("a").unwrap();
        assert_eq!(node.class_name(), "a");
        assert!(matches!(class.create("b"), Err(GraphError::UnknownNodeClass { .. })));
    }

    #[test]
    fn test_instantiate_rejects_foreign_class() {
        let class = flavor();
        let own = class.node_class("a").unwrap().clone();
        let foreign: NodeClass<()> = NodeClass::new::<Passthrough>(NodeDef::new("a"));

        assert!(class.instantiate(&own).is_ok());
        assert!(class.instantiate(&foreign).is_err());
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = GraphClassRegistry::new();
        registry.register_class(flavor());

        let graph = registry.get_graph_class("test").unwrap().new_graph("g");
        assert!(graph.cycles_allowed());
        assert!(matches!(registry.get_graph_class("nope"), Err(GraphError::UnknownGraphClass(_))));
    }
}
