// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shader network flavor.
//!
//! Value and color sources feed math and mixing nodes, which feed BSDF-style
//! shader nodes producing [`Closure`]s. The first `output` node in the node
//! list is the active one.

use crate::error::Result;
use crate::flags::SocketFlags;
use crate::graph::Graph;
use crate::id::GraphId;
use crate::node::{Node, NodeBehavior, NodeClass, NodeDef, NodeScope, Passthrough};
use crate::registry::GraphClass;
use crate::socket::{Closure, Socket, SocketValue};
use std::sync::Arc;

/// Flavor name
pub const SHADER_GRAPH: &str = "shader";

/// Class name of the material output node
pub const OUTPUT_NODE: &str = "output";

/// Build the shader network flavor with all of its node classes
pub fn create_shader_class<C>() -> GraphClass<C> {
    let mut class = GraphClass::new(SHADER_GRAPH, "Shader Network");

    // ========================================================================
    // Inputs
    // ========================================================================

    class.register(NodeClass::new::<Passthrough>(
        NodeDef::new("value")
            .with_ui_name("Value")
            .output("value", Socket::float(0.5).with_ui_name("Value")),
    ));

    class.register(NodeClass::new::<Passthrough>(
        NodeDef::new("rgb")
            .with_ui_name("RGB")
            .output("color", Socket::color([0.8, 0.8, 0.8, 1.0]).with_ui_name("Color")),
    ));

    // ========================================================================
    // Converters
    // ========================================================================

    class.register(NodeClass::new::<MathNode>(
        NodeDef::new("math")
            .with_ui_name("Math")
            .input(
                "operation",
                Socket::int(0).with_flags(SocketFlags::NO_UI_EDITING).with_ui_name("Operation"),
            )
            .input("a", Socket::float(0.5))
            .input("b", Socket::float(0.5))
            .output("value", Socket::float(0.0).with_ui_name("Value")),
    ));

    class.register(NodeClass::new::<MixRgbNode>(
        NodeDef::new("mix_rgb")
            .with_ui_name("Mix RGB")
            .input("fac", Socket::float(0.5).with_ui_name("Factor"))
            .input("color1", Socket::color([0.5, 0.5, 0.5, 1.0]))
            .input("color2", Socket::color([0.5, 0.5, 0.5, 1.0]))
            .output("color", Socket::color([0.5, 0.5, 0.5, 1.0])),
    ));

    // ========================================================================
    // Shaders
    // ========================================================================

    let shader = Arc::new(
        NodeDef::new("shader")
            .with_ui_name("Shader")
            .output("surface", Socket::closure().with_ui_name("Surface")),
    );

    class.register(NodeClass::new::<DiffuseNode>(
        NodeDef::derive(&shader, "diffuse")
            .with_ui_name("Diffuse BSDF")
            .input("color", Socket::color([0.8, 0.8, 0.8, 1.0])),
    ));

    class.register(NodeClass::new::<EmissionNode>(
        NodeDef::derive(&shader, "emission")
            .with_ui_name("Emission")
            .input("color", Socket::color([1.0, 1.0, 1.0, 1.0]))
            .input("strength", Socket::float(1.0)),
    ));

    class.register(NodeClass::new::<MixShaderNode>(
        NodeDef::derive(&shader, "mix_shader")
            .with_ui_name("Mix Shader")
            .input("fac", Socket::float(0.5).with_ui_name("Factor"))
            .input("shader1", Socket::closure())
            .input("shader2", Socket::closure()),
    ));

    // ========================================================================
    // Output
    // ========================================================================

    class.register(NodeClass::new::<OutputNode>(
        NodeDef::new(OUTPUT_NODE)
            .with_ui_name("Material Output")
            .input("surface", Socket::closure().with_ui_name("Surface"))
            .output("result", Socket::closure().with_flags(SocketFlags::PRIVATE))
            .output("depend", Socket::depend()),
    ));

    class
}

/// First output node in list order
pub fn active_output<C>(graph: &Graph<C>) -> Option<GraphId> {
    graph
        .nodes()
        .find(|n| n.class_name() == OUTPUT_NODE)
        .map(Node::graph_id)
}

/// Final surface closure of the active output, if any
pub fn surface<C>(graph: &Graph<C>) -> Option<Closure> {
    let node = graph.node(active_output(graph)?)?;
    node.output("result")?.get_value().ok()?.as_closure().ok()
}

/// Arithmetic performed by the `math` node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathOp {
    /// a + b
    Add,
    /// a - b
    Subtract,
    /// a * b
    Multiply,
    /// a / b, zero when b is zero
    Divide,
    /// a ^ b
    Power,
    /// min(a, b)
    Minimum,
    /// max(a, b)
    Maximum,
}

impl MathOp {
    /// Operation for the `operation` socket value; unknown values add
    pub fn from_index(index: i32) -> Self {
        match index {
            1 => Self::Subtract,
            2 => Self::Multiply,
            3 => Self::Divide,
            4 => Self::Power,
            5 => Self::Minimum,
            6 => Self::Maximum,
            _ => Self::Add,
        }
    }

    /// Apply to two operands
    pub fn apply(self, a: f32, b: f32) -> f32 {
        match self {
            Self::Add => a + b,
            Self::Subtract => a - b,
            Self::Multiply => a * b,
            Self::Divide if b == 0.0 => 0.0,
            Self::Divide => a / b,
            Self::Power => a.powf(b),
            Self::Minimum => a.min(b),
            Self::Maximum => a.max(b),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct MathNode;

impl<C> NodeBehavior<C> for MathNode {
    fn exec(&mut self, scope: &mut NodeScope<'_>, _ctx: &mut C) -> Result<()> {
        let op = MathOp::from_index(scope.input_value("operation")?.as_int()?);
        let value = op.apply(scope.float("a")?, scope.float("b")?);
        scope.set_and_update("value", SocketValue::Float(value))
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct MixRgbNode;

impl<C> NodeBehavior<C> for MixRgbNode {
    fn exec(&mut self, scope: &mut NodeScope<'_>, _ctx: &mut C) -> Result<()> {
        let fac = scope.float("fac")?.clamp(0.0, 1.0);
        let a = scope.input_value("color1")?.as_color()?;
        let b = scope.input_value("color2")?.as_color()?;
        let mixed = [0, 1, 2, 3].map(|i| a[i] + (b[i] - a[i]) * fac);
        scope.set_and_update("color", SocketValue::Color(mixed))
    }
}

fn rgb(color: [f32; 4]) -> [f32; 3] {
    [color[0], color[1], color[2]]
}

#[derive(Debug, Clone, Copy, Default)]
struct DiffuseNode;

impl<C> NodeBehavior<C> for DiffuseNode {
    fn exec(&mut self, scope: &mut NodeScope<'_>, _ctx: &mut C) -> Result<()> {
        let color = scope.input_value("color")?.as_color()?;
        scope.set_and_update("surface", SocketValue::Closure(Closure::diffuse(rgb(color))))
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct EmissionNode;

impl<C> NodeBehavior<C> for EmissionNode {
    fn exec(&mut self, scope: &mut NodeScope<'_>, _ctx: &mut C) -> Result<()> {
        let color = scope.input_value("color")?.as_color()?;
        let strength = scope.float("strength")?;
        let surface = Closure::emission(rgb(color), strength);
        scope.set_and_update("surface", SocketValue::Closure(surface))
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct MixShaderNode;

impl<C> NodeBehavior<C> for MixShaderNode {
    fn exec(&mut self, scope: &mut NodeScope<'_>, _ctx: &mut C) -> Result<()> {
        let fac = scope.float("fac")?.clamp(0.0, 1.0);
        let a = scope.input_value("shader1")?.as_closure()?;
        let b = scope.input_value("shader2")?.as_closure()?;
        scope.set_and_update("surface", SocketValue::Closure(a.mix(&b, fac)))
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct OutputNode;

impl<C> NodeBehavior<C> for OutputNode {
    fn exec(&mut self, scope: &mut NodeScope<'_>, _ctx: &mut C) -> Result<()> {
        let surface = scope.input_value("surface")?.clone();
        scope.set_output("result", surface)?;
        scope.set_and_update("depend", SocketValue::Bool(true))
    }
}
