// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph asset storage.
//!
//! The editor core only talks to the [`GraphStore`] trait. [`RonGraphStore`]
//! writes pretty RON wrapped in a small envelope carrying a format version.

use crate::graph::Graph;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Current graph asset format version
pub const GRAPH_FORMAT_VERSION: u32 = 1;

/// Persistence errors
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed asset
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(#[from] ron::Error),

    /// Asset written by a newer editor
    #[error("Graph format version {0} is newer than supported version {GRAPH_FORMAT_VERSION}")]
    UnsupportedVersion(u32),
}

/// Load/save seam used by the editor session
pub trait GraphStore {
    /// Read a graph
    fn load(&self, path: &Path) -> Result<Graph, PersistenceError>;

    /// Write a graph
    fn save(&self, graph: &Graph, path: &Path) -> Result<(), PersistenceError>;
}

#[derive(Serialize)]
#[serde(rename = "GraphAsset")]
struct AssetOut<'a> {
    format_version: u32,
    graph: &'a Graph,
}

#[derive(Deserialize)]
#[serde(rename = "GraphAsset")]
struct AssetIn {
    format_version: u32,
    graph: Graph,
}

/// RON-backed [`GraphStore`]
#[derive(Debug, Clone, Copy, Default)]
pub struct RonGraphStore;

impl RonGraphStore {
    /// Create a store
    pub fn new() -> Self {
        Self
    }

    /// Serialize a graph to a RON string
    pub fn to_ron(&self, graph: &Graph) -> Result<String, PersistenceError> {
        let pretty = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        let asset = AssetOut {
            format_version: GRAPH_FORMAT_VERSION,
            graph,
        };
        Ok(ron::ser::to_string_pretty(&asset, pretty)?)
    }

    /// Parse a graph from a RON string. The graph is repaired and its
    /// duplicate-name flags recomputed.
    pub fn parse(&self, content: &str) -> Result<Graph, PersistenceError> {
        let asset: AssetIn = ron::from_str(content)?;
        if asset.format_version > GRAPH_FORMAT_VERSION {
            return Err(PersistenceError::UnsupportedVersion(asset.format_version));
        }
        let mut graph = asset.graph;
        let report = graph.repair();
        if !report.is_clean() {
            tracing::debug!("Repaired loaded graph '{}': {:?}", graph.name, report);
        }
        graph.validate_names();
        graph.clear_dirty();
        Ok(graph)
    }
}

impl GraphStore for RonGraphStore {
    fn load(&self, path: &Path) -> Result<Graph, PersistenceError> {
        let content = std::fs::read_to_string(path)?;
        let graph = self.parse(&content)?;
        tracing::info!("Loaded graph '{}' from {:?}", graph.name, path);
        Ok(graph)
    }

    fn save(&self, graph: &Graph, path: &Path) -> Result<(), PersistenceError> {
        let content = self.to_ron(graph)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        tracing::info!("Saved graph '{}' to {:?}", graph.name, path);
        Ok(())
    }
}
