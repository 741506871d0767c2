// SPDX-License-Identifier: MIT OR Apache-2.0
//! Rig constraint flavor.
//!
//! Rig graphs are allowed to loop back on themselves (a driver reading a
//! value it indirectly drives), so graphs of this flavor are relaxed
//! instead of rejected when a cycle is found.

use crate::error::Result;
use crate::flags::GraphFlags;
use crate::node::{NodeBehavior, NodeClass, NodeDef, NodeScope, Passthrough};
use crate::registry::GraphClass;
use crate::socket::{Socket, SocketValue};

/// Flavor name
pub const RIG_GRAPH: &str = "rig";

/// Build the rig flavor with all of its node classes
pub fn create_rig_class<C>() -> GraphClass<C> {
    GraphClass::new(RIG_GRAPH, "Rig Constraints")
        .with_flags(GraphFlags::CYCLIC_ALLOWED)
        .with_node(NodeClass::new::<Passthrough>(
            NodeDef::new("value").with_ui_name("Value").output("value", Socket::float(0.0)),
        ))
        .with_node(NodeClass::new::<StepNode>(
            NodeDef::new("step")
                .with_ui_name("Step")
                .input("value", Socket::float(0.0))
                .input("step", Socket::float(1.0))
                .input("limit", Socket::float(10.0))
                .output("value", Socket::float(0.0)),
        ))
        .with_node(NodeClass::new::<BlendNode>(
            NodeDef::new("blend")
                .with_ui_name("Blend")
                .input("a", Socket::float(0.0))
                .input("b", Socket::float(0.0))
                .input("factor", Socket::float(0.5))
                .output("value", Socket::float(0.0)),
        ))
        .with_node(NodeClass::new::<AverageNode>(
            NodeDef::new("average")
                .with_ui_name("Average")
                .input("a", Socket::float(0.0))
                .input("b", Socket::float(0.0))
                .output("value", Socket::float(0.0)),
        ))
}

/// `value = min(value + step, limit)`
#[derive(Debug, Clone, Copy, Default)]
struct StepNode;

impl<C> NodeBehavior<C> for StepNode {
    fn exec(&mut self, scope: &mut NodeScope<'_>, _ctx: &mut C) -> Result<()> {
        let next = (scope.float("value")? + scope.float("step")?).min(scope.float("limit")?);
        scope.set_and_update("value", SocketValue::Float(next))
    }
}

/// Linear blend of `a` towards `b`
#[derive(Debug, Clone, Copy, Default)]
struct BlendNode;

impl<C> NodeBehavior<C> for BlendNode {
    fn exec(&mut self, scope: &mut NodeScope<'_>, _ctx: &mut C) -> Result<()> {
        let (a, b) = (scope.float("a")?, scope.float("b")?);
        let factor = scope.float("factor")?;
        scope.set_and_update("value", SocketValue::Float(a + (b - a) * factor))
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct AverageNode;

impl<C> NodeBehavior<C> for AverageNode {
    fn exec(&mut self, scope: &mut NodeScope<'_>, _ctx: &mut C) -> Result<()> {
        let value = (scope.float("a")? + scope.float("b")?) * 0.5;
        scope.set_and_update("value", SocketValue::Float(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::GraphId;

    #[test]
    fn test_rig_graphs_allow_cycles() {
        let graph = create_rig_class::<()>().new_graph("rig");
        assert!(graph.cycles_allowed());
    }

    #[test]
    fn test_feedback_converges() {
        // blend pulls towards a fixed target through a feedback loop
        let class = create_rig_class::<()>();
        let mut graph = class.new_graph("rig");
        let target = graph.add(class.create("value").unwrap()).unwrap();
        let blend = graph.add(class.create("blend").unwrap()).unwrap();
        let avg = graph.add(class.create("average").unwrap()).unwrap();

        let out = |g: &crate::Graph<()>, n: GraphId| g.output_id(n, "value").unwrap();
        graph
            .set_and_update(out(&graph, target), SocketValue::Float(1.0), true)
            .unwrap();
        graph.connect(out(&graph, target), graph.input_id(blend, "b").unwrap()).unwrap();
        graph.connect(out(&graph, blend), graph.input_id(avg, "a").unwrap()).unwrap();
        graph.connect(out(&graph, blend), graph.input_id(avg, "b").unwrap()).unwrap();
        graph.connect(out(&graph, avg), graph.input_id(blend, "a").unwrap()).unwrap();

        let report = graph.exec(&mut ()).unwrap();
        assert!(graph.is_cyclic());
        assert!(report.converged);
        assert!(report.iterations < graph.max_cycle_steps);

        let socket = graph.socket(out(&graph, blend)).unwrap();
        let value = socket.get_value().unwrap().as_float().unwrap();
        assert!((value - 1.0).abs() < 0.01);
    }
}
