// SPDX-License-Identifier: MIT OR Apache-2.0
//! Command-line arguments.

use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};

/// Replay timeline construction scripts against a scene
#[derive(Debug, Parser)]
#[command(name = "ordoplay_timeline")]
#[command(author, version, about = "Build OrdoPlay timelines from construction scripts")]
pub struct Args {
    /// Scene description (RON)
    #[arg(long)]
    pub scene: PathBuf,

    /// Construction scripts (RON), applied in order
    #[arg(short = 's', long = "script", required = true)]
    pub scripts: Vec<PathBuf>,

    /// Node the scripts' target paths are relative to, from the scene root
    #[arg(long, default_value = ".")]
    pub base: String,

    /// Builder configuration (RON)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Existing timeline library to build into (RON, or JSON by extension)
    #[arg(short = 'l', long)]
    pub library: Option<PathBuf>,

    /// How many times each script is applied in one builder session
    #[arg(short = 'p', long, default_value_t = 1)]
    pub passes: usize,

    /// Where to write the resulting library; stdout when omitted
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Ron)]
    pub format: OutputFormat,
}

/// Serialization format of a timeline library
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty RON
    Ron,
    /// Pretty JSON
    Json,
}

impl OutputFormat {
    /// Format implied by a file extension, RON unless it is `.json`
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => OutputFormat::Json,
            _ => OutputFormat::Ron,
        }
    }
}
