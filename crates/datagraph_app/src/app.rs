// SPDX-License-Identifier: MIT OR Apache-2.0
//! Application state, options and top-level flow.

use crate::demo;
use crate::host;
use crate::library::AssetLibrary;
use crate::report::{Report, RigReport, RoundTripReport, ShaderReport};
use datagraph_core::graphs::rig::RIG_GRAPH;
use datagraph_core::graphs::shader::{self, SHADER_GRAPH};
use datagraph_core::{
    Closure, Graph, GraphClassRegistry, GraphError, GraphId, GraphSettings, GraphSnapshot,
};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while running the host
#[derive(Debug, Error)]
pub enum AppError {
    /// Engine failure
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// Report serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Library document serialization failed
    #[error("Library serialization error: {0}")]
    Ron(#[from] ron::Error),

    /// Library document parsing failed
    #[error("Library parse error: {0}")]
    RonParse(#[from] ron::error::SpannedError),

    /// File access failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Bad command line
    #[error("Invalid argument: {0}")]
    Args(String),

    /// Library node had no proxy to replace
    #[error("No proxy for library node {0}")]
    Relink(GraphId),
}

/// Result alias for the host
pub type AppResult<T> = Result<T, AppError>;

/// Command line options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Optional RON settings file
    pub settings_path: Option<PathBuf>,
    /// Frames to simulate
    pub frames: u64,
    /// Where to write the snapshot and library documents
    pub save_dir: Option<PathBuf>,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            settings_path: None,
            frames: 12,
            save_dir: None,
        }
    }
}

impl AppOptions {
    /// Parse `[SETTINGS.ron] [--frames N] [--save DIR]`
    pub fn from_args(args: impl IntoIterator<Item = String>) -> AppResult<Self> {
        let mut options = Self::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--frames" => {
                    let value = args
                        .next()
                        .ok_or_else(|| AppError::Args("--frames needs a value".into()))?;
                    options.frames = value
                        .parse()
                        .map_err(|_| AppError::Args(format!("bad frame count: {value}")))?;
                }
                "--save" => {
                    let value = args
                        .next()
                        .ok_or_else(|| AppError::Args("--save needs a directory".into()))?;
                    options.save_dir = Some(PathBuf::from(value));
                }
                flag if flag.starts_with("--") => {
                    return Err(AppError::Args(format!("unknown option {flag}")));
                }
                path => {
                    if options.settings_path.is_some() {
                        return Err(AppError::Args(format!("unexpected argument {path}")));
                    }
                    options.settings_path = Some(PathBuf::from(path));
                }
            }
        }

        Ok(options)
    }
}

/// The host application
pub struct App {
    options: AppOptions,
    settings: GraphSettings,
    registry: GraphClassRegistry<host::FrameContext>,
}

impl App {
    /// Load settings and build the graph class registry
    pub fn new(options: AppOptions) -> AppResult<Self> {
        let settings = match &options.settings_path {
            Some(path) => GraphSettings::load(path)?,
            None => GraphSettings::default(),
        };
        tracing::debug!(?settings, "Using graph settings");

        Ok(Self {
            options,
            settings,
            registry: demo::registry(),
        })
    }

    /// Run every demo and return the JSON report
    pub fn run(&self) -> AppResult<String> {
        let shader_class = self.registry.get_graph_class(SHADER_GRAPH)?;
        let mut material = demo::build_shader(shader_class, &self.settings)?;

        let pulse = material.pulse;
        let (frames, mut ctx) =
            host::run_frames(&mut material.graph, self.options.frames, |graph, frame| {
                demo::animate(graph, pulse, frame)
            })?;
        material.graph.run_pending(&mut ctx)?;
        let surface = shader::surface(&material.graph);
        tracing::info!(
            frames = frames.len(),
            probe_hits = ctx.probe_hits,
            "Shader network settled"
        );

        let shader_report = ShaderReport {
            nodes: material.graph.node_count(),
            sort_list: material.graph.sort_list().to_vec(),
            surface,
            frames,
            probe_hits: ctx.probe_hits,
        };

        let roundtrip = self.round_trip(&material.graph, surface)?;

        let rig_class = self.registry.get_graph_class(RIG_GRAPH)?;
        let mut rig = demo::build_rig(rig_class, &self.settings)?;
        let exec = rig.graph.exec(&mut host::FrameContext::default())?;
        let rig_report = RigReport {
            cyclic: rig.graph.is_cyclic(),
            iterations: exec.iterations,
            converged: exec.converged,
            final_change: exec.final_change,
            value: demo::read_float(&rig.graph, rig.blend, "value"),
        };

        Report {
            shader: shader_report,
            rig: rig_report,
            roundtrip,
        }
        .to_json()
    }

    /// Save the shader network, reload it and relink its library nodes
    fn round_trip(
        &self,
        graph: &Graph<host::FrameContext>,
        surface: Option<Closure>,
    ) -> AppResult<RoundTripReport> {
        let library = AssetLibrary::capture(graph);
        let snapshot = graph.snapshot();
        let snapshot_text = snapshot.to_ron()?;
        let library_text = library.to_ron()?;

        if let Some(dir) = &self.options.save_dir {
            std::fs::create_dir_all(dir)?;
            std::fs::write(dir.join("shader.graph.ron"), &snapshot_text)?;
            std::fs::write(dir.join("library.ron"), &library_text)?;
            tracing::info!(dir = %dir.display(), "Saved shader network");
        }

        let class = self.registry.get_graph_class(SHADER_GRAPH)?;
        let mut reloaded = class.load_graph(&GraphSnapshot::from_ron(&snapshot_text)?);
        let proxies = reloaded.nodes().filter(|n| n.is_proxy()).count();

        let relinked = AssetLibrary::from_ron(&library_text)?.relink_all(class, &mut reloaded)?;
        reloaded.run_pending(&mut host::FrameContext::default())?;

        Ok(RoundTripReport {
            snapshot_nodes: snapshot.nodes.len(),
            proxies,
            relinked,
            surface_matches: shader::surface(&reloaded) == surface,
        })
    }
}
