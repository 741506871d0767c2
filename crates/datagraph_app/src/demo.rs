// SPDX-License-Identifier: MIT OR Apache-2.0
//! Demo networks driven by the host.

use crate::app::AppResult;
use crate::host::{self, FrameContext};
use datagraph_core::graphs::rig::create_rig_class;
use datagraph_core::graphs::shader::{self, create_shader_class};
use datagraph_core::{
    Graph, GraphClass, GraphClassRegistry, GraphError, GraphFlags, GraphId, GraphSettings,
    NodeClass, NodeDef, NodeFlags, Passthrough, Socket, SocketValue,
};

/// Class name of the library-owned color node
pub const LIBRARY_COLOR: &str = "library_color";

/// Color stored by the library node
pub const LIBRARY_TINT: [f32; 4] = [0.9, 0.4, 0.1, 1.0];

/// Registry with the built-in flavors plus the library node class
pub fn registry() -> GraphClassRegistry<FrameContext> {
    let mut shader = create_shader_class();
    shader.register(NodeClass::new::<Passthrough>(
        NodeDef::new(LIBRARY_COLOR)
            .with_ui_name("Library Color")
            .with_flags(NodeFlags::SAVE_PROXY)
            .output("color", Socket::color(LIBRARY_TINT)),
    ));

    let mut registry = GraphClassRegistry::new();
    registry.register_class(shader);
    registry.register_class(create_rig_class());
    registry
}

/// Apply settings without dropping a flavor's own cycle policy
fn configure(
    graph: &mut Graph<FrameContext>,
    class: &GraphClass<FrameContext>,
    settings: &GraphSettings,
) {
    graph.apply_settings(settings);
    if class.default_flags.contains(GraphFlags::CYCLIC_ALLOWED) {
        graph.set_cycles_allowed(true);
    }
}

fn link(
    graph: &mut Graph<FrameContext>,
    from: (GraphId, &str),
    to: (GraphId, &str),
) -> AppResult<()> {
    let out = graph
        .output_id(from.0, from.1)
        .ok_or_else(|| GraphError::SocketNotFound(from.1.to_string()))?;
    let inp = graph
        .input_id(to.0, to.1)
        .ok_or_else(|| GraphError::SocketNotFound(to.1.to_string()))?;
    graph.connect(out, inp)?;
    Ok(())
}

fn set_input(
    graph: &mut Graph<FrameContext>,
    node: GraphId,
    name: &str,
    value: SocketValue,
) -> AppResult<()> {
    let id = graph
        .input_id(node, name)
        .ok_or_else(|| GraphError::SocketNotFound(name.to_string()))?;
    graph.set_and_update(id, value, true)?;
    Ok(())
}

/// Float value of a node output, zero when unreadable
pub fn read_float(graph: &Graph<FrameContext>, node: GraphId, output: &str) -> f32 {
    graph
        .node(node)
        .and_then(|n| n.output(output))
        .and_then(|s| s.get_value().ok())
        .and_then(|v| v.as_float().ok())
        .unwrap_or_default()
}

/// Shader network and the handles the host animates
pub struct ShaderDemo {
    /// The network
    pub graph: Graph<FrameContext>,
    /// Animated `value` output
    pub pulse: GraphId,
}

/// `library_color -> diffuse` and `rgb + pulse * 4 -> emission`, mixed into the output
pub fn build_shader(
    class: &GraphClass<FrameContext>,
    settings: &GraphSettings,
) -> AppResult<ShaderDemo> {
    let mut graph = class.new_graph("material");
    configure(&mut graph, class, settings);

    let library = graph.add(class.create(LIBRARY_COLOR)?.with_position(0.0, 0.0))?;
    let diffuse = graph.add(class.create("diffuse")?.with_position(260.0, 0.0))?;
    let value = graph.add(class.create("value")?.with_position(0.0, 220.0))?;
    let math = graph.add(class.create("math")?.with_position(260.0, 220.0))?;
    let rgb = graph.add(class.create("rgb")?.with_position(260.0, 440.0))?;
    let emission = graph.add(class.create("emission")?.with_position(520.0, 220.0))?;
    let mix = graph.add(class.create("mix_shader")?.with_position(780.0, 100.0))?;
    let output = graph.add(class.create(shader::OUTPUT_NODE)?.with_position(1040.0, 100.0))?;
    let probe = graph.add(host::probe())?;

    link(&mut graph, (library, "color"), (diffuse, "color"))?;
    link(&mut graph, (value, "value"), (math, "a"))?;
    link(&mut graph, (math, "value"), (emission, "strength"))?;
    link(&mut graph, (rgb, "color"), (emission, "color"))?;
    link(&mut graph, (diffuse, "surface"), (mix, "shader1"))?;
    link(&mut graph, (emission, "surface"), (mix, "shader2"))?;
    link(&mut graph, (mix, "surface"), (output, "surface"))?;
    link(&mut graph, (output, "depend"), (probe, "depend"))?;

    set_input(&mut graph, math, "operation", SocketValue::Int(2))?;
    set_input(&mut graph, math, "b", SocketValue::Float(4.0))?;
    set_input(&mut graph, mix, "fac", SocketValue::Float(0.25))?;

    let pulse = graph
        .output_id(value, "value")
        .ok_or_else(|| GraphError::SocketNotFound("value".into()))?;
    tracing::debug!(nodes = graph.node_count(), "Built shader network");
    Ok(ShaderDemo { graph, pulse })
}

/// Drive the pulse every third frame; other frames are idle
pub fn animate(graph: &mut Graph<FrameContext>, pulse: GraphId, frame: u64) -> AppResult<()> {
    if frame % 3 == 0 {
        let value = 0.5 + 0.125 * (frame / 3) as f32;
        graph.set_and_update(pulse, SocketValue::Float(value), false)?;
    }
    Ok(())
}

/// Rig graph with a feedback loop and the node to read back
pub struct RigDemo {
    /// The rig
    pub graph: Graph<FrameContext>,
    /// Blend node whose `value` settles on the target
    pub blend: GraphId,
}

/// `target -> blend.b`, `blend -> average -> blend.a`
pub fn build_rig(class: &GraphClass<FrameContext>, settings: &GraphSettings) -> AppResult<RigDemo> {
    let mut graph = class.new_graph("rig");
    configure(&mut graph, class, settings);

    let target = graph.add(class.create("value")?)?;
    let blend = graph.add(class.create("blend")?)?;
    let average = graph.add(class.create("average")?)?;

    let out = graph
        .output_id(target, "value")
        .ok_or_else(|| GraphError::SocketNotFound("value".into()))?;
    graph.set_and_update(out, SocketValue::Float(2.0), true)?;

    link(&mut graph, (target, "value"), (blend, "b"))?;
    link(&mut graph, (blend, "value"), (average, "a"))?;
    link(&mut graph, (blend, "value"), (average, "b"))?;
    link(&mut graph, (average, "value"), (blend, "a"))?;

    Ok(RigDemo { graph, blend })
}

#[cfg(test)]
mod tests {
    use super::*;
    use datagraph_core::graphs::rig::RIG_GRAPH;
    use datagraph_core::graphs::shader::SHADER_GRAPH;

    #[test]
    fn test_shader_demo_surface() {
        let registry = registry();
        let class = registry.get_graph_class(SHADER_GRAPH).unwrap();
        let mut material = build_shader(class, &GraphSettings::default()).unwrap();
        let mut ctx = FrameContext::default();
        material.graph.exec(&mut ctx).unwrap();

        let surface = shader::surface(&material.graph).unwrap();
        // default pulse 0.5 * 4 = 2, rgb 0.8 * 2 = 1.6, mixed at 0.25
        assert!((surface.emission[0] - 0.4).abs() < 1e-5);
        assert!((surface.diffuse[0] - 0.9 * 0.75).abs() < 1e-5);
        assert_eq!(ctx.probe_hits, 1);
    }

    #[test]
    fn test_rig_settles_on_target() {
        let registry = registry();
        let class = registry.get_graph_class(RIG_GRAPH).unwrap();
        let mut rig = build_rig(class, &GraphSettings::default()).unwrap();
        assert!(rig.graph.cycles_allowed());

        let report = rig.graph.exec(&mut FrameContext::default()).unwrap();
        assert!(rig.graph.is_cyclic());
        assert!(report.converged);
        assert!((read_float(&rig.graph, rig.blend, "value") - 2.0).abs() < 0.01);
    }

    #[test]
    fn test_settings_step_limit() {
        let registry = registry();
        let class = registry.get_graph_class(RIG_GRAPH).unwrap();
        let settings = GraphSettings {
            max_cycle_steps: 2,
            ..GraphSettings::default()
        };
        let mut rig = build_rig(class, &settings).unwrap();

        let report = rig.graph.exec(&mut FrameContext::default()).unwrap();
        assert_eq!(report.iterations, 2);
        assert!(!report.converged);
    }
}
