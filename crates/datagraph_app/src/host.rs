// SPDX-License-Identifier: MIT OR Apache-2.0
//! Frame loop owning the pending-update queue.
//!
//! Edits made between frames only request a pass; the loop runs at most one
//! evaluation per frame, so bursts of edits are coalesced.

use crate::app::AppResult;
use datagraph_core::{CallbackNode, Graph, Node, Socket};
use serde::Serialize;

/// Context handed to every node during evaluation
#[derive(Debug, Default)]
pub struct FrameContext {
    /// Current frame number
    pub frame: u64,
    /// How many times the probe node ran
    pub probe_hits: u64,
}

/// One evaluated frame
#[derive(Debug, Clone, Serialize)]
pub struct FrameLog {
    /// Frame number
    pub frame: u64,
    /// Node executions
    pub executed: usize,
    /// Solver steps, one for acyclic graphs
    pub iterations: usize,
    /// Whether the pass settled
    pub converged: bool,
}

/// Transient node counting how often its dependency fires
pub fn probe() -> Node<FrameContext> {
    CallbackNode::create(
        "Probe",
        |_scope, ctx: &mut FrameContext| {
            ctx.probe_hits += 1;
            tracing::trace!(frame = ctx.frame, "Probe fired");
            Ok(())
        },
        [("depend", Socket::depend())],
        [],
    )
}

/// Run `frames` frames, calling `tick` before each one
pub fn run_frames<F>(
    graph: &mut Graph<FrameContext>,
    frames: u64,
    mut tick: F,
) -> AppResult<(Vec<FrameLog>, FrameContext)>
where
    F: FnMut(&mut Graph<FrameContext>, u64) -> AppResult<()>,
{
    let mut ctx = FrameContext::default();
    let mut logs = Vec::new();

    for frame in 0..frames {
        ctx.frame = frame;
        tick(graph, frame)?;

        let Some(report) = graph.run_pending(&mut ctx)? else {
            tracing::trace!(frame, "Idle frame");
            continue;
        };
        tracing::debug!(frame, executed = report.executed, "Evaluated frame");
        logs.push(FrameLog {
            frame,
            executed: report.executed,
            iterations: report.iterations,
            converged: report.converged,
        });
    }

    Ok((logs, ctx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use datagraph_core::{GraphId, SocketValue};

    fn probed_graph() -> (Graph<FrameContext>, GraphId) {
        let mut graph = Graph::new("probe");
        let source = graph
            .add(CallbackNode::create(
                "Source",
                |scope, _ctx: &mut FrameContext| {
                    scope.update_all();
                    Ok(())
                },
                [],
                [("out", Socket::float(0.0))],
            ))
            .unwrap();
        let probe = graph.add(probe()).unwrap();
        let out = graph.output_id(source, "out").unwrap();
        graph.connect(out, graph.input_id(probe, "depend").unwrap()).unwrap();
        (graph, out)
    }

    #[test]
    fn test_idle_frames_skip_evaluation() {
        let (mut graph, _) = probed_graph();
        let (logs, ctx) = run_frames(&mut graph, 5, |_, _| Ok(())).unwrap();

        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].frame, 0);
        assert_eq!(ctx.probe_hits, 1);
    }

    #[test]
    fn test_edits_coalesce_per_frame() {
        let (mut graph, out) = probed_graph();
        let (logs, ctx) = run_frames(&mut graph, 4, |graph, frame| {
            if frame == 2 {
                for i in 0..3 {
                    graph.set_and_update(out, SocketValue::Float(i as f32), true)?;
                }
            }
            Ok(())
        })
        .unwrap();

        let frames: Vec<u64> = logs.iter().map(|log| log.frame).collect();
        assert_eq!(frames, [0, 2]);
        assert_eq!(ctx.probe_hits, 2);
    }
}
