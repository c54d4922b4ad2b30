// SPDX-License-Identifier: MIT OR Apache-2.0
//! Loading inputs, replaying scripts and writing the resulting library.

use crate::args::OutputFormat;
use ordoplay_timeline_builder::{
    BuildScript, BuilderConfig, BuilderError, ConfigError, NodeId, PathResolver, SceneTree,
    ScriptReport, TimelineLibrary,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors surfaced by the command-line tool
#[derive(Debug, Error)]
pub enum CliError {
    /// IO error on an input or output file
    #[error("{path}: {source}")]
    Io {
        /// File being read or written
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Malformed RON input
    #[error("RON parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// RON output failed
    #[error("RON serialization error: {0}")]
    Serialization(#[from] ron::Error),

    /// JSON input or output failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration could not be loaded
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// A script step was rejected by the builder
    #[error("Build error: {0}")]
    Build(#[from] BuilderError),
}

/// Result type for the tool
pub type CliResult<T> = Result<T, CliError>;

/// What replaying one script did, pass by pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// Timeline the script built
    pub timeline: String,
    /// One report per pass
    pub passes: Vec<ScriptReport>,
}

impl RunSummary {
    /// Reports summed over every pass
    pub fn total(&self) -> ScriptReport {
        let mut total = ScriptReport::default();
        for report in &self.passes {
            total += *report;
        }
        total
    }
}

/// Everything a run needs: the scene, the base node and the library being built
pub struct Session {
    scene: SceneTree,
    base: NodeId,
    config: BuilderConfig,
    library: TimelineLibrary,
}

impl Session {
    /// Build a session from a scene description, resolving `base` from its root
    pub fn new(scene_ron: &str, base: &str, config: BuilderConfig) -> CliResult<Self> {
        let (scene, root) = SceneTree::from_ron(scene_ron)?;
        let base = PathResolver::new(&scene, root).node_at(base)?;
        Ok(Self {
            scene,
            base,
            config,
            library: TimelineLibrary::new(),
        })
    }

    /// Replace the library the scripts build into
    pub fn with_library(mut self, library: TimelineLibrary) -> Self {
        self.library = library;
        self
    }

    /// The library built so far
    pub fn library(&self) -> &TimelineLibrary {
        &self.library
    }

    /// Apply a script `passes` times in one builder session
    pub fn run_script(&mut self, script: &BuildScript, passes: usize) -> CliResult<RunSummary> {
        let passes = script.run(&mut self.library, &self.scene, self.base, &self.config, passes)?;
        Ok(RunSummary {
            timeline: script.timeline.clone(),
            passes,
        })
    }
}

/// Read a file to a string
pub fn read(path: &Path) -> CliResult<String> {
    std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Write a string to a file
pub fn write(path: &Path, contents: &str) -> CliResult<()> {
    std::fs::write(path, contents).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse a library in the given format
pub fn parse_library(source: &str, format: OutputFormat) -> CliResult<TimelineLibrary> {
    match format {
        OutputFormat::Ron => Ok(TimelineLibrary::from_ron(source)?),
        OutputFormat::Json => Ok(serde_json::from_str(source)?),
    }
}

/// Serialize a library in the given format
pub fn render_library(library: &TimelineLibrary, format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Ron => Ok(library.to_ron()?),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(library)?),
    }
}
