// SPDX-License-Identifier: MIT OR Apache-2.0
//! `datagraph` - headless host for the dependency graph engine.
//!
//! Builds a demo shader network and a cyclic rig graph, drives them through
//! a frame loop that owns the pending-update queue, round-trips the shader
//! network through a snapshot with an externally owned library node, and
//! prints a JSON report.
//!
//! Usage: `datagraph [SETTINGS.ron] [--frames N] [--save DIR]`

mod app;
mod demo;
mod host;
mod library;
mod report;

use app::{App, AppOptions};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("datagraph_app=debug".parse().unwrap())
        .add_directive("datagraph_core=info".parse().unwrap());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting datagraph v{}", env!("CARGO_PKG_VERSION"));

    let options = match AppOptions::from_args(std::env::args().skip(1)) {
        Ok(options) => options,
        Err(e) => {
            tracing::error!("{e}");
            std::process::exit(2);
        }
    };

    match App::new(options).and_then(|app| app.run()) {
        Ok(report) => println!("{report}"),
        Err(e) => {
            tracing::error!("datagraph failed: {e}");
            std::process::exit(1);
        }
    }
}
