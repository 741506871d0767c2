// SPDX-License-Identifier: MIT OR Apache-2.0
//! JSON run report.

use crate::app::AppResult;
use crate::host::FrameLog;
use datagraph_core::{Closure, GraphId};
use serde::Serialize;

/// Everything the host observed
#[derive(Debug, Serialize)]
pub struct Report {
    /// Animated shader network
    pub shader: ShaderReport,
    /// Cyclic rig
    pub rig: RigReport,
    /// Snapshot reload of the shader network
    pub roundtrip: RoundTripReport,
}

/// Shader network results
#[derive(Debug, Serialize)]
pub struct ShaderReport {
    /// Node count
    pub nodes: usize,
    /// Execution order
    pub sort_list: Vec<GraphId>,
    /// Final surface of the active output
    pub surface: Option<Closure>,
    /// Frames that ran a pass
    pub frames: Vec<FrameLog>,
    /// Probe executions
    pub probe_hits: u64,
}

/// Rig relaxation results
#[derive(Debug, Serialize)]
pub struct RigReport {
    /// Whether a cycle was found
    pub cyclic: bool,
    /// Relaxation steps
    pub iterations: usize,
    /// Whether the change dropped under the threshold
    pub converged: bool,
    /// Change of the last step
    pub final_change: f32,
    /// Settled blend output
    pub value: f32,
}

/// Save, reload and relink results
#[derive(Debug, Serialize)]
pub struct RoundTripReport {
    /// Nodes written to the snapshot
    pub snapshot_nodes: usize,
    /// Proxies present after loading
    pub proxies: usize,
    /// Proxies replaced by library nodes
    pub relinked: usize,
    /// Whether the reloaded surface equals the original
    pub surface_matches: bool,
}

impl Report {
    /// Pretty-printed JSON
    pub fn to_json(&self) -> AppResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
