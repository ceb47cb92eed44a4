// SPDX-License-Identifier: MIT OR Apache-2.0
//! Flow graph editor host window.
//!
//! Opens one graph asset in an `EditorSession` and shows it on an egui
//! canvas with a breadcrumb bar for subgraph tabs.
//!
//! Usage: `flowgraph_editor [GRAPH.ron] [--config CONFIG.ron]`

mod app;

use app::{EditorApp, LaunchOptions};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_FILTER: &str = "flowgraph_editor_app=debug,flowgraph_editor_graph=debug,wgpu=warn,naga=warn";

fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Flow Graph Editor v{}", env!("CARGO_PKG_VERSION"));

    let options = LaunchOptions::from_args(std::env::args().skip(1));
    if let Err(e) = EditorApp::run(options) {
        tracing::error!("Editor crashed: {e}");
        std::process::exit(1);
    }
}
