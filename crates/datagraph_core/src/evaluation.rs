// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph evaluation and execution.
//!
//! Acyclic graphs run once in topological order. Cyclic graphs whose policy
//! allows it are relaxed: dirty nodes are re-run until the summed change of
//! the sockets still flagged for update drops below the stop threshold.

use crate::error::{GraphError, Result};
use crate::flags::{NodeFlags, SocketFlags};
use crate::graph::Graph;
use crate::id::GraphId;
use crate::socket::{Socket, SocketValue};
use std::collections::{HashMap, HashSet, VecDeque};

/// Summary of one evaluation pass
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExecReport {
    /// Node executions performed
    pub executed: usize,
    /// Sweeps over the sort list (always 1 for acyclic graphs)
    pub iterations: usize,
    /// Summed change of the last relaxation step
    pub final_change: f32,
    /// Whether relaxation stopped under the threshold
    pub converged: bool,
}

impl<C> Graph<C> {
    /// Evaluate every dirty node.
    ///
    /// Resorts first if the topology changed. A cyclic graph fails with
    /// [`GraphError::CyclicGraph`] before any node runs unless cycles are
    /// allowed, in which case it is relaxed.
    pub fn exec(&mut self, ctx: &mut C) -> Result<ExecReport> {
        self.exec_with(ctx, false)
    }

    /// Evaluate every dirty node in one sweep, even if the graph is cyclic.
    ///
    /// Cycles must still be allowed; they are just not relaxed.
    pub fn exec_single(&mut self, ctx: &mut C) -> Result<ExecReport> {
        self.exec_with(ctx, true)
    }

    /// Propagate a socket and, if it has edges, evaluate right away.
    ///
    /// Without edges nothing downstream can change, so the pass stays
    /// pending for the host loop and `None` is returned.
    pub fn immediate_update(
        &mut self,
        socket: GraphId,
        ctx: &mut C,
    ) -> Result<Option<ExecReport>> {
        self.update_socket(socket, None)?;
        if !self.socket(socket).is_some_and(Socket::has_edges) {
            return Ok(None);
        }
        self.exec(ctx).map(Some)
    }

    fn exec_with(&mut self, ctx: &mut C, single: bool) -> Result<ExecReport> {
        self.pending = false;
        if self.needs_resort() {
            self.sort();
        }

        if self.is_cyclic() && !self.cycles_allowed() {
            tracing::warn!(graph = %self.name, "Refusing to execute cyclic graph");
            return Err(GraphError::CyclicGraph);
        }
        if self.is_cyclic() && !single {
            let order = std::mem::take(&mut self.sort_list);
            let result = self.relax(&order, ctx);
            self.sort_list = order;
            self.pending = false;
            return result;
        }

        let order = std::mem::take(&mut self.sort_list);
        let result = self.run_list(&order, ctx, |_| true);
        self.sort_list = order;
        self.pending = false;

        Ok(ExecReport {
            executed: result?,
            iterations: 1,
            final_change: 0.0,
            converged: true,
        })
    }

    /// Run one pass if one was requested since the last `exec`
    pub fn run_pending(&mut self, ctx: &mut C) -> Result<Option<ExecReport>> {
        if !self.has_pending_update() {
            return Ok(None);
        }
        self.exec(ctx).map(Some)
    }

    /// Evaluate the dirty nodes downstream of `start`.
    ///
    /// With `check_start_parents` the dirty ancestors of `start` run too.
    /// Returns the number of nodes executed.
    pub fn exec_subtree(
        &mut self,
        start: GraphId,
        ctx: &mut C,
        check_start_parents: bool,
    ) -> Result<usize> {
        if !self.has(start) {
            return Err(GraphError::NodeNotFound(start));
        }
        if self.needs_resort() {
            self.sort();
        }
        if self.is_cyclic() {
            return Err(GraphError::CyclicGraph);
        }

        let mut reach = self.reachable(start, true);
        if check_start_parents {
            reach.extend(self.reachable(start, false));
        }

        let order = std::mem::take(&mut self.sort_list);
        let result = self.run_list(&order, ctx, |id| reach.contains(&id));
        self.sort_list = order;
        result
    }

    fn reachable(&self, start: GraphId, downstream: bool) -> HashSet<GraphId> {
        let mut seen = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(id) = queue.pop_front() {
            let next = if downstream { self.downstream(id) } else { self.upstream(id) };
            for n in next {
                if seen.insert(n) {
                    queue.push_back(n);
                }
            }
        }
        seen
    }

    fn run_list(
        &mut self,
        order: &[GraphId],
        ctx: &mut C,
        filter: impl Fn(GraphId) -> bool,
    ) -> Result<usize> {
        let mut executed = 0;
        for &id in order {
            if filter(id) && self.run_node(id, ctx)? {
                executed += 1;
            }
        }
        Ok(executed)
    }

    /// Run one node if it is dirty and enabled, then propagate its updates
    fn run_node(&mut self, id: GraphId, ctx: &mut C) -> Result<bool> {
        let Some(node) = self.nodes.get_mut(&id) else {
            return Ok(false);
        };
        if node.flags.contains(NodeFlags::DISABLED) || !node.flags.contains(NodeFlags::UPDATE) {
            return Ok(false);
        }

        node.flags.remove(NodeFlags::UPDATE);
        let updated = node.run(ctx)?;
        for socket in node.inputs.values_mut() {
            socket.flags.remove(SocketFlags::UPDATE);
        }

        for socket in updated {
            self.update_socket(socket, None)?;
        }
        Ok(true)
    }

    fn relax(&mut self, order: &[GraphId], ctx: &mut C) -> Result<ExecReport> {
        let mut previous: HashMap<GraphId, SocketValue> = HashMap::new();
        for node in self.nodes.values().filter(|n| !n.flags.contains(NodeFlags::DISABLED)) {
            for socket in node.all_sockets() {
                if let Ok(value) = socket.copy_value() {
                    previous.insert(socket.graph_id(), value);
                }
            }
        }

        let mut report = ExecReport::default();
        for step in 0..self.max_cycle_steps {
            report.executed += self.run_list(order, ctx, |_| true)?;

            let mut change = 0.0f32;
            let dirty = self
                .nodes
                .values()
                .filter(|n| n.needs_update() && !n.flags.contains(NodeFlags::DISABLED));
            for node in dirty {
                for socket in node.all_sockets() {
                    let Ok(value) = socket.copy_value() else {
                        continue;
                    };
                    if let Some(prev) = previous.get(&socket.graph_id()) {
                        match socket.diff_value(prev) {
                            Ok(diff) if diff.is_nan() => {
                                tracing::warn!(
                                    "NaN change on socket {} of node {}",
                                    socket.name(),
                                    node.graph_id()
                                );
                            }
                            Ok(diff) => change += diff.abs(),
                            Err(err) => {
                                tracing::debug!("Skipping socket {}: {err}", socket.graph_id());
                            }
                        }
                    }
                    previous.insert(socket.graph_id(), value);
                }
            }

            report.iterations = step + 1;
            report.final_change = change;
            tracing::debug!(graph = %self.name, step, change, "Relaxation step");

            if change.abs() < self.cycle_stop_threshold {
                report.converged = true;
                break;
            }
        }

        if !report.converged {
            tracing::debug!(
                graph = %self.name,
                steps = report.iterations,
                "Relaxation hit the step limit"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{CallbackNode, Node, NodeDef, Passthrough};

    #[test]
    fn test_passthrough_chain() {
        let def = NodeDef::new("pass")
            .input("x", Socket::float(0.0))
            .output("x", Socket::float(0.0));
        let mut graph: Graph<()> = Graph::new("test");
        let a = graph.add(Node::new(&def, Passthrough)).unwrap();
        let b = graph.add(Node::new(&def, Passthrough)).unwrap();
        graph
            .connect(graph.output_id(a, "x").unwrap(), graph.input_id(b, "x").unwrap())
            .unwrap();

        let out = graph.output_id(a, "x").unwrap();
        graph.socket_mut(out).unwrap().set_value(SocketValue::Float(4.0)).unwrap();

        let report = graph.exec(&mut ()).unwrap();
        assert_eq!(report.executed, 2);
        let inp = graph.input_id(b, "x").unwrap();
        assert_eq!(graph.socket(inp).unwrap().get_value().unwrap(), &SocketValue::Float(4.0));

        assert_eq!(graph.exec(&mut ()).unwrap().executed, 0);
    }

    #[test]
    fn test_disabled_node_skipped() {
        let mut graph: Graph<u32> = Graph::new("test");
        let id = graph.add(counter()).unwrap();
        graph.node_mut(id).unwrap().flags.insert(NodeFlags::DISABLED);

        let mut count = 0;
        graph.exec(&mut count).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_run_pending() {
        let mut graph: Graph<u32> = Graph::new("test");
        let id = graph.add(counter()).unwrap();

        let mut count = 0;
        assert!(graph.run_pending(&mut count).unwrap().is_none());

        graph.mark_dirty(id);
        graph.mark_dirty(id);
        assert!(graph.has_pending_update());
        assert!(graph.run_pending(&mut count).unwrap().is_some());
        assert!(graph.run_pending(&mut count).unwrap().is_none());
        assert_eq!(count, 1);
    }

    #[test]
    fn test_exec_subtree() {
        let def = NodeDef::new("pass")
            .input("x", Socket::float(0.0))
            .output("x", Socket::float(0.0));
        let mut graph: Graph<()> = Graph::new("test");
        let a = graph.add(Node::new(&def, Passthrough)).unwrap();
        let b = graph.add(Node::new(&def, Passthrough)).unwrap();
        let c = graph.add(Node::new(&def, Passthrough)).unwrap();
        graph
            .connect(graph.output_id(a, "x").unwrap(), graph.input_id(b, "x").unwrap())
            .unwrap();

        assert_eq!(graph.exec_subtree(b, &mut (), false).unwrap(), 1);
        assert!(graph.node(a).unwrap().needs_update());
        assert!(graph.node(c).unwrap().needs_update());

        assert_eq!(graph.exec_subtree(b, &mut (), true).unwrap(), 2);
        assert!(!graph.node(a).unwrap().needs_update());
        assert!(graph.node(c).unwrap().needs_update());
    }

    fn counter() -> Node<u32> {
        CallbackNode::create(
            "count",
            |scope, n: &mut u32| {
                *n += 1;
                scope.update_all();
                Ok(())
            },
            [("in", Socket::float(0.0))],
            [("out", Socket::float(0.0))],
        )
    }

    fn ring(graph: &mut Graph<u32>) -> [GraphId; 3] {
        let ids = [(); 3].map(|_| graph.add(counter()).unwrap());
        for i in 0..3 {
            let out = graph.output_id(ids[i], "out").unwrap();
            let inp = graph.input_id(ids[(i + 1) % 3], "in").unwrap();
            graph.connect(out, inp).unwrap();
        }
        ids
    }

    #[test]
    fn test_exec_single_skips_relaxation() {
        let mut graph: Graph<u32> = Graph::new("test");
        ring(&mut graph);
        graph.set_cycles_allowed(true);

        let mut count = 0;
        let report = graph.exec_single(&mut count).unwrap();
        assert!(graph.is_cyclic());
        assert_eq!(report.iterations, 1);
        assert_eq!(report.executed, 3);
        assert_eq!(count, 3);
    }

    #[test]
    fn test_exec_single_respects_cycle_policy() {
        let mut graph: Graph<u32> = Graph::new("test");
        ring(&mut graph);

        let mut count = 0;
        assert!(matches!(graph.exec_single(&mut count), Err(GraphError::CyclicGraph)));
        assert_eq!(count, 0);
    }

    #[test]
    fn test_immediate_update() {
        let mut graph: Graph<u32> = Graph::new("test");
        let a = graph.add(counter()).unwrap();
        let b = graph.add(counter()).unwrap();
        let out = graph.output_id(a, "out").unwrap();
        graph.connect(out, graph.input_id(b, "in").unwrap()).unwrap();
        let mut count = 0;
        graph.exec(&mut count).unwrap();

        count = 0;
        graph.socket_mut(out).unwrap().set_value(SocketValue::Float(2.0)).unwrap();
        let report = graph.immediate_update(out, &mut count).unwrap().unwrap();
        assert_eq!(report.executed, 1);
        assert_eq!(count, 1);
        assert!(!graph.has_pending_update());
        let inp = graph.input_id(b, "in").unwrap();
        assert_eq!(graph.socket(inp).unwrap().get_value().unwrap(), &SocketValue::Float(2.0));

        let loose = graph.output_id(b, "out").unwrap();
        assert!(graph.immediate_update(loose, &mut count).unwrap().is_none());
        assert!(graph.has_pending_update());
        assert_eq!(count, 1);
    }

    #[test]
    fn test_node_failure_aborts_pass() {
        let mut graph: Graph<u32> = Graph::new("test");
        graph
            .add(CallbackNode::create(
                "fail",
                |_, _: &mut u32| Err(GraphError::Custom("no mesh bound".into())),
                [],
                [],
            ))
            .unwrap();

        let err = graph.exec(&mut 0).unwrap_err();
        assert!(matches!(err, GraphError::Custom(ref msg) if msg == "no mesh bound"));
        assert_eq!(err.to_string(), "no mesh bound");
    }
}
