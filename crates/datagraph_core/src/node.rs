// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the graph framework.
//!
//! A node class is a declarative [`NodeDef`] (name, flags, socket shape)
//! paired with a [`NodeBehavior`] implementation. Every node instance gets
//! its own copies of the declared socket prototypes.

use crate::error::{GraphError, Result};
use crate::flags::{NodeFlags, SocketFlags, SORT_MARKS};
use crate::id::GraphId;
use crate::socket::{Socket, SocketDirection, SocketValue};
use indexmap::IndexMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// Declared sockets for one side of a node
#[derive(Debug, Clone, Default)]
pub struct SocketShape {
    sockets: IndexMap<String, Socket>,
    inherit: bool,
}

impl SocketShape {
    /// Whether the parent's sockets are merged in
    pub fn inherits(&self) -> bool {
        self.inherit
    }

    /// Sockets declared on this level only
    pub fn declared(&self) -> impl Iterator<Item = (&str, &Socket)> {
        self.sockets.iter().map(|(k, s)| (k.as_str(), s))
    }
}

/// Node type definition
#[derive(Debug, Clone)]
pub struct NodeDef {
    /// Unique class name
    pub name: String,
    /// Display name
    pub ui_name: String,
    /// Default node flags
    pub flags: NodeFlags,
    inputs: SocketShape,
    outputs: SocketShape,
    parent: Option<Arc<NodeDef>>,
}

impl NodeDef {
    /// Create an empty definition
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            ui_name: name.clone(),
            name,
            flags: NodeFlags::empty(),
            inputs: SocketShape::default(),
            outputs: SocketShape::default(),
            parent: None,
        }
    }

    /// Create a definition that extends `parent`.
    ///
    /// Inputs and outputs inherit the parent's sockets until replaced with
    /// [`NodeDef::own_inputs`] / [`NodeDef::own_outputs`]. Flags are merged.
    pub fn derive(parent: &Arc<NodeDef>, name: impl Into<String>) -> Self {
        let mut def = Self::new(name);
        def.inputs.inherit = true;
        def.outputs.inherit = true;
        def.parent = Some(Arc::clone(parent));
        def
    }

    /// Set the display name
    pub fn with_ui_name(mut self, ui_name: impl Into<String>) -> Self {
        self.ui_name = ui_name.into();
        self
    }

    /// Add default node flags
    pub fn with_flags(mut self, flags: NodeFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Declare an input socket
    pub fn input(mut self, name: impl Into<String>, socket: Socket) -> Self {
        self.inputs.sockets.insert(name.into(), socket);
        self
    }

    /// Declare an output socket
    pub fn output(mut self, name: impl Into<String>, socket: Socket) -> Self {
        self.outputs.sockets.insert(name.into(), socket);
        self
    }

    /// Stop inheriting the parent's inputs
    pub fn own_inputs(mut self) -> Self {
        self.inputs.inherit = false;
        self
    }

    /// Stop inheriting the parent's outputs
    pub fn own_outputs(mut self) -> Self {
        self.outputs.inherit = false;
        self
    }

    /// Parent definition, if derived
    pub fn parent(&self) -> Option<&NodeDef> {
        self.parent.as_deref()
    }

    /// Declared shape for one side
    pub fn shape(&self, direction: SocketDirection) -> &SocketShape {
        match direction {
            SocketDirection::Input => &self.inputs,
            SocketDirection::Output => &self.outputs,
        }
    }

    /// Final socket set for one side with inheritance applied.
    ///
    /// Own sockets come first, followed by inherited sockets that weren't
    /// redeclared, walking up while each level inherits.
    pub fn resolved(&self, direction: SocketDirection) -> IndexMap<String, Socket> {
        let mut sockets = IndexMap::new();
        let mut level = Some(self);

        while let Some(def) = level {
            let shape = def.shape(direction);
            for (name, socket) in shape.declared() {
                sockets.entry(name.to_string()).or_insert_with(|| socket.copy());
            }
            if !shape.inherits() {
                break;
            }
            level = def.parent();
        }

        sockets
    }

    /// Final flags, merged along the parent chain
    pub fn resolved_flags(&self) -> NodeFlags {
        let mut flags = self.flags;
        let mut parent = self.parent();
        while let Some(def) = parent {
            flags |= def.flags;
            parent = def.parent();
        }
        flags
    }
}

/// Clone support for boxed behaviours
pub trait BehaviorClone<C> {
    /// Clone into a new box
    fn box_clone(&self) -> Box<dyn NodeBehavior<C>>;
}

impl<C, T> BehaviorClone<C> for T
where
    T: NodeBehavior<C> + Clone + 'static,
{
    fn box_clone(&self) -> Box<dyn NodeBehavior<C>> {
        Box::new(self.clone())
    }
}

/// Computation attached to a node.
///
/// `C` is the execution context handed to [`Graph::exec`](crate::Graph::exec);
/// the engine passes it through untouched.
pub trait NodeBehavior<C>: BehaviorClone<C> + fmt::Debug {
    /// Run the node.
    ///
    /// Read inputs, write outputs and call [`NodeScope::update`] on every
    /// output that changed. The default implementation only propagates the
    /// current output values.
    fn exec(&mut self, scope: &mut NodeScope<'_>, ctx: &mut C) -> Result<()> {
        let _ = ctx;
        scope.update_all();
        Ok(())
    }

    /// Whether this is a serialization stand-in
    fn is_proxy(&self) -> bool {
        false
    }
}

/// Behaviour that keeps the default `exec`
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl<C> NodeBehavior<C> for Passthrough {}

/// Node view handed to [`NodeBehavior::exec`]
pub struct NodeScope<'a> {
    node_id: GraphId,
    inputs: &'a mut IndexMap<String, Socket>,
    outputs: &'a mut IndexMap<String, Socket>,
    updated: Vec<GraphId>,
}

impl<'a> NodeScope<'a> {
    /// Id of the running node
    pub fn node_id(&self) -> GraphId {
        self.node_id
    }

    /// Input socket by name
    pub fn input(&self, name: &str) -> Result<&Socket> {
        self.inputs.get(name).ok_or_else(|| missing(name))
    }

    /// Mutable input socket by name
    pub fn input_mut(&mut self, name: &str) -> Result<&mut Socket> {
        self.inputs.get_mut(name).ok_or_else(|| missing(name))
    }

    /// Output socket by name
    pub fn output(&self, name: &str) -> Result<&Socket> {
        self.outputs.get(name).ok_or_else(|| missing(name))
    }

    /// Mutable output socket by name
    pub fn output_mut(&mut self, name: &str) -> Result<&mut Socket> {
        self.outputs.get_mut(name).ok_or_else(|| missing(name))
    }

    /// Current value of an input
    pub fn input_value(&self, name: &str) -> Result<&SocketValue> {
        self.input(name)?.get_value()
    }

    /// Input read as a float
    pub fn float(&self, name: &str) -> Result<f32> {
        self.input_value(name)?.as_float()
    }

    /// Write an output without propagating it
    pub fn set_output(&mut self, name: &str, value: SocketValue) -> Result<()> {
        self.output_mut(name)?.set_value(value)
    }

    /// Queue an output for propagation once `exec` returns
    pub fn update(&mut self, name: &str) -> Result<()> {
        let socket = self.outputs.get_mut(name).ok_or_else(|| missing(name))?;
        socket.flags.insert(SocketFlags::UPDATE);
        if !self.updated.contains(&socket.graph_id) {
            self.updated.push(socket.graph_id);
        }
        Ok(())
    }

    /// Write an output and queue it for propagation
    pub fn set_and_update(&mut self, name: &str, value: SocketValue) -> Result<()> {
        self.set_output(name, value)?;
        self.update(name)
    }

    /// Queue every output for propagation
    pub fn update_all(&mut self) {
        for socket in self.outputs.values_mut() {
            socket.flags.insert(SocketFlags::UPDATE);
            if !self.updated.contains(&socket.graph_id) {
                self.updated.push(socket.graph_id);
            }
        }
    }

    /// Input sockets in declaration order
    pub fn inputs(&self) -> impl Iterator<Item = &Socket> {
        self.inputs.values()
    }

    /// Output sockets in declaration order
    pub fn outputs(&self) -> impl Iterator<Item = &Socket> {
        self.outputs.values()
    }
}

fn missing(name: &str) -> GraphError {
    GraphError::SocketNotFound(name.to_string())
}

/// A node instance
pub struct Node<C> {
    pub(crate) graph_id: GraphId,
    class_name: String,
    /// Display name (can be customized)
    pub ui_name: String,
    /// Node flags
    pub flags: NodeFlags,
    /// Position in the graph editor
    pub ui_pos: [f32; 2],
    /// Size in the graph editor
    pub ui_size: [f32; 2],
    pub(crate) inputs: IndexMap<String, Socket>,
    pub(crate) outputs: IndexMap<String, Socket>,
    behavior: Box<dyn NodeBehavior<C>>,
}

impl<C> Node<C> {
    /// Create a node from a definition and a behaviour
    pub fn new(def: &NodeDef, behavior: impl NodeBehavior<C> + 'static) -> Self {
        Self::with_behavior(def, Box::new(behavior))
    }

    /// Create a node from a definition and a boxed behaviour
    pub fn with_behavior(def: &NodeDef, behavior: Box<dyn NodeBehavior<C>>) -> Self {
        let mut flags = def.resolved_flags();
        flags.remove(SORT_MARKS);
        flags.insert(NodeFlags::UPDATE);

        let mut node = Self {
            graph_id: GraphId::NONE,
            class_name: def.name.clone(),
            ui_name: def.ui_name.clone(),
            flags,
            ui_pos: [0.0, 0.0],
            ui_size: [235.0, 200.0],
            inputs: def.resolved(SocketDirection::Input),
            outputs: def.resolved(SocketDirection::Output),
            behavior,
        };
        node.adopt_sockets();
        node
    }

    /// Fix up names, directions and default flags of owned sockets
    pub(crate) fn adopt_sockets(&mut self) {
        for (direction, sockets) in [
            (SocketDirection::Input, &mut self.inputs),
            (SocketDirection::Output, &mut self.outputs),
        ] {
            for (name, socket) in sockets.iter_mut() {
                socket.name.clone_from(name);
                socket.direction = direction;
                socket.owner = self.graph_id;
                if socket.ui_name.is_empty() {
                    socket.ui_name.clone_from(name);
                }
                if direction == SocketDirection::Output
                    && !socket.flags.contains(SocketFlags::NO_MULTI_OUTPUTS)
                {
                    socket.flags.insert(SocketFlags::MULTI);
                }
            }
        }
    }

    /// Set the position
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.ui_pos = [x, y];
        self
    }

    /// Graph id, [`GraphId::NONE`] while detached
    pub fn graph_id(&self) -> GraphId {
        self.graph_id
    }

    /// Restore the id of a node persisted outside the graph.
    ///
    /// Only meaningful before [`Graph::relink_proxy_owner`](crate::Graph::relink_proxy_owner).
    pub fn set_graph_id(&mut self, id: GraphId) {
        self.graph_id = id;
    }

    /// Node class name
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Whether this node is a proxy stand-in
    pub fn is_proxy(&self) -> bool {
        self.behavior.is_proxy()
    }

    /// Whether the node needs execution
    pub fn needs_update(&self) -> bool {
        self.flags.contains(NodeFlags::UPDATE)
    }

    /// Flag the node for execution
    pub fn graph_update(&mut self) {
        self.flags.insert(NodeFlags::UPDATE);
    }

    /// Input socket by name
    pub fn input(&self, name: &str) -> Option<&Socket> {
        self.inputs.get(name)
    }

    /// Mutable input socket by name
    pub fn input_mut(&mut self, name: &str) -> Option<&mut Socket> {
        self.inputs.get_mut(name)
    }

    /// Output socket by name
    pub fn output(&self, name: &str) -> Option<&Socket> {
        self.outputs.get(name)
    }

    /// Mutable output socket by name
    pub fn output_mut(&mut self, name: &str) -> Option<&mut Socket> {
        self.outputs.get_mut(name)
    }

    /// Socket by direction and name
    pub fn socket(&self, direction: SocketDirection, name: &str) -> Option<&Socket> {
        self.sockets(direction).get(name)
    }

    pub(crate) fn socket_mut(
        &mut self,
        direction: SocketDirection,
        name: &str,
    ) -> Option<&mut Socket> {
        self.sockets_mut(direction).get_mut(name)
    }

    pub(crate) fn sockets(&self, direction: SocketDirection) -> &IndexMap<String, Socket> {
        match direction {
            SocketDirection::Input => &self.inputs,
            SocketDirection::Output => &self.outputs,
        }
    }

    pub(crate) fn sockets_mut(
        &mut self,
        direction: SocketDirection,
    ) -> &mut IndexMap<String, Socket> {
        match direction {
            SocketDirection::Input => &mut self.inputs,
            SocketDirection::Output => &mut self.outputs,
        }
    }

    /// Input sockets in declaration order
    pub fn inputs(&self) -> impl Iterator<Item = &Socket> {
        self.inputs.values()
    }

    /// Output sockets in declaration order
    pub fn outputs(&self) -> impl Iterator<Item = &Socket> {
        self.outputs.values()
    }

    /// All sockets, inputs then outputs
    pub fn all_sockets(&self) -> impl Iterator<Item = &Socket> {
        self.inputs.values().chain(self.outputs.values())
    }

    pub(crate) fn all_sockets_mut(&mut self) -> impl Iterator<Item = &mut Socket> {
        self.inputs.values_mut().chain(self.outputs.values_mut())
    }

    /// Add a socket to a detached node
    pub fn add_socket(
        &mut self,
        direction: SocketDirection,
        name: impl Into<String>,
        socket: Socket,
    ) {
        self.sockets_mut(direction).insert(name.into(), socket);
        self.adopt_sockets();
    }

    /// Run the behaviour, returning the outputs queued for propagation
    pub(crate) fn run(&mut self, ctx: &mut C) -> Result<Vec<GraphId>> {
        let mut scope = NodeScope {
            node_id: self.graph_id,
            inputs: &mut self.inputs,
            outputs: &mut self.outputs,
            updated: Vec::new(),
        };
        self.behavior.exec(&mut scope, ctx)?;
        Ok(scope.updated)
    }

    /// Detached copy carrying socket values but no ids or edges
    pub fn copy(&self) -> Node<C> {
        let mut node = Node {
            graph_id: GraphId::NONE,
            class_name: self.class_name.clone(),
            ui_name: self.ui_name.clone(),
            flags: self.flags,
            ui_pos: self.ui_pos,
            ui_size: self.ui_size,
            inputs: self.inputs.iter().map(|(k, s)| (k.clone(), s.copy())).collect(),
            outputs: self.outputs.iter().map(|(k, s)| (k.clone(), s.copy())).collect(),
            behavior: self.behavior.box_clone(),
        };
        node.flags.remove(SORT_MARKS);
        node.adopt_sockets();
        node
    }

    /// Clone ids, edges and values under a different behaviour
    pub(crate) fn clone_with(&self, behavior: Box<dyn NodeBehavior<C>>) -> Node<C> {
        Node {
            graph_id: self.graph_id,
            class_name: self.class_name.clone(),
            ui_name: self.ui_name.clone(),
            flags: self.flags,
            ui_pos: self.ui_pos,
            ui_size: self.ui_size,
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
            behavior,
        }
    }

    /// Copy names, flags and socket values onto `other`.
    ///
    /// Sockets missing on `other` are added; edges are never copied.
    pub fn copy_to(&self, other: &mut Node<C>) {
        other.class_name.clone_from(&self.class_name);
        other.ui_name.clone_from(&self.ui_name);
        other.flags = self.flags;
        other.flags.remove(SORT_MARKS);

        for direction in [SocketDirection::Input, SocketDirection::Output] {
            for (name, socket) in self.sockets(direction) {
                let target = other.sockets_mut(direction);
                let Some(dest) = target.get_mut(name) else {
                    target.insert(name.clone(), socket.copy());
                    continue;
                };
                if let Some(value) = socket.raw_value() {
                    if let Err(err) = dest.set_value(value.clone()) {
                        tracing::warn!("Couldn't copy value of socket {name}: {err}");
                    }
                }
            }
        }
        other.adopt_sockets();
    }
}

impl<C> Clone for Node<C> {
    fn clone(&self) -> Self {
        self.clone_with(self.behavior.box_clone())
    }
}

impl<C> fmt::Debug for Node<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("graph_id", &self.graph_id)
            .field("class_name", &self.class_name)
            .field("flags", &self.flags)
            .field("inputs", &self.inputs.keys().collect::<Vec<_>>())
            .field("outputs", &self.outputs.keys().collect::<Vec<_>>())
            .field("behavior", &self.behavior)
            .finish()
    }
}

/// A registrable node type: definition plus behaviour factory
pub struct NodeClass<C> {
    def: Arc<NodeDef>,
    factory: fn() -> Box<dyn NodeBehavior<C>>,
}

fn make_behavior<C, B>() -> Box<dyn NodeBehavior<C>>
where
    B: NodeBehavior<C> + Default + 'static,
{
    Box::new(B::default())
}

impl<C> NodeClass<C> {
    /// Node class whose behaviour is `B::default()`
    pub fn new<B>(def: NodeDef) -> Self
    where
        B: NodeBehavior<C> + Default + 'static,
    {
        Self::from_shared::<B>(Arc::new(def))
    }

    /// Node class for a definition shared with derived classes
    pub fn from_shared<B>(def: Arc<NodeDef>) -> Self
    where
        B: NodeBehavior<C> + Default + 'static,
    {
        Self {
            def,
            factory: make_behavior::<C, B>,
        }
    }

    /// Class name
    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// Definition
    pub fn def(&self) -> &Arc<NodeDef> {
        &self.def
    }

    /// Create a detached node of this class
    pub fn instantiate(&self) -> Node<C> {
        Node::with_behavior(&self.def, (self.factory)())
    }
}

impl<C> Clone for NodeClass<C> {
    fn clone(&self) -> Self {
        Self {
            def: Arc::clone(&self.def),
            factory: self.factory,
        }
    }
}

impl<C> fmt::Debug for NodeClass<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeClass").field("def", &self.def.name).finish()
    }
}

/// Callback signature for [`CallbackNode`]
pub type NodeCallback<C> = dyn Fn(&mut NodeScope<'_>, &mut C) -> Result<()>;

/// Transient node running a closure; flagged ZOMBIE so it is never persisted
pub struct CallbackNode<C> {
    callback: Rc<NodeCallback<C>>,
}

impl<C: 'static> CallbackNode<C> {
    /// Class name shared by all callback nodes
    pub const CLASS_NAME: &'static str = "callback";

    /// Build a callback node with the given sockets
    pub fn create<F>(
        ui_name: impl Into<String>,
        callback: F,
        inputs: impl IntoIterator<Item = (&'static str, Socket)>,
        outputs: impl IntoIterator<Item = (&'static str, Socket)>,
    ) -> Node<C>
    where
        F: Fn(&mut NodeScope<'_>, &mut C) -> Result<()> + 'static,
    {
        let mut def = NodeDef::new(Self::CLASS_NAME)
            .with_ui_name(ui_name)
            .with_flags(NodeFlags::ZOMBIE);
        for (name, socket) in inputs {
            def = def.input(name, socket);
        }
        for (name, socket) in outputs {
            def = def.output(name, socket);
        }

        Node::new(&def, Self { callback: Rc::new(callback) })
    }
}

impl<C> Clone for CallbackNode<C> {
    fn clone(&self) -> Self {
        Self {
            callback: Rc::clone(&self.callback),
        }
    }
}

impl<C> fmt::Debug for CallbackNode<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CallbackNode")
    }
}

impl<C: 'static> NodeBehavior<C> for CallbackNode<C> {
    fn exec(&mut self, scope: &mut NodeScope<'_>, ctx: &mut C) -> Result<()> {
        (self.callback)(scope, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket::SocketType;

    fn base_def() -> Arc<NodeDef> {
        Arc::new(
            NodeDef::new("test")
                .with_flags(NodeFlags::SAVE_PROXY)
                .input("depend", Socket::depend())
                .input("f", Socket::float(0.0))
                .output("depend", Socket::depend())
                .output("f", Socket::float(0.0)),
        )
    }

    #[test]
    fn test_node_from_def() {
        let node: Node<()> = Node::new(&base_def(), Passthrough);
        assert_eq!(node.graph_id(), GraphId::NONE);
        assert!(node.needs_update());

        let names: Vec<_> = node.all_sockets().map(Socket::name).collect();
        assert_eq!(names, ["depend", "f", "depend", "f"]);

        let out = node.output("f").unwrap();
        assert_eq!(out.direction(), SocketDirection::Output);
        assert!(out.is_multi());
        assert!(!node.input("f").unwrap().is_multi());
    }

    #[test]
    fn test_inherited_shape() {
        let base = base_def();
        let derived = NodeDef::derive(&base, "derived")
            .input("i", Socket::int(0))
            .output("b", Socket::int(0));

        let inputs: Vec<_> = derived.resolved(SocketDirection::Input).into_keys().collect();
        assert_eq!(inputs, ["i", "depend", "f"]);
        assert!(derived.resolved_flags().contains(NodeFlags::SAVE_PROXY));

        let replaced = NodeDef::derive(&base, "replaced")
            .own_outputs()
            .output("x", Socket::float(1.0));
        let outputs: Vec<_> = replaced.resolved(SocketDirection::Output).into_keys().collect();
        assert_eq!(outputs, ["x"]);

        let declared: Vec<_> = derived
            .shape(SocketDirection::Input)
            .declared()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(declared, ["i"]);
        assert!(derived.shape(SocketDirection::Input).inherits());
        assert!(!replaced.shape(SocketDirection::Output).inherits());
    }

    #[test]
    fn test_instances_get_own_sockets() {
        let class: NodeClass<()> = NodeClass::from_shared::<Passthrough>(base_def());
        let mut a = class.instantiate();
        let b = class.instantiate();

        a.input_mut("f").unwrap().set_value(SocketValue::Float(3.0)).unwrap();
        assert_eq!(b.input("f").unwrap().get_value().unwrap(), &SocketValue::Float(0.0));
    }

    #[test]
    fn test_copy_to_adds_missing_sockets() {
        let def = NodeDef::new("a").input("x", Socket::float(2.0));
        let mut src: Node<()> = Node::new(&def, Passthrough);
        src.add_socket(SocketDirection::Output, "extra", Socket::new(SocketType::Vector3));

        let def = NodeDef::new("a").input("x", Socket::float(0.0));
        let mut dst: Node<()> = Node::new(&def, Passthrough);
        src.copy_to(&mut dst);

        assert_eq!(dst.input("x").unwrap().get_value().unwrap(), &SocketValue::Float(2.0));
        assert!(dst.output("extra").is_some());
        assert!(dst.output("extra").unwrap().is_multi());
    }

    #[test]
    fn test_callback_node_is_zombie() {
        let node: Node<u32> = CallbackNode::create(
            "hook",
            |_, ctx: &mut u32| {
                *ctx += 1;
                Ok(())
            },
            [],
            [],
        );
        assert!(node.flags.contains(NodeFlags::ZOMBIE));
        assert_eq!(node.class_name(), CallbackNode::<u32>::CLASS_NAME);
    }
}
