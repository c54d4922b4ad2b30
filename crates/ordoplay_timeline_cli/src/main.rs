// SPDX-License-Identifier: MIT OR Apache-2.0
//! `OrdoPlay` Timeline - build timelines from construction scripts
//!
//! Loads a scene description and one or more construction scripts, replays
//! each script through a track builder and writes the resulting timeline
//! library:
//! - Scripts resolve their targets from a base node in the scene
//! - Replaying a script several times leaves the timeline unchanged
//! - An existing library can be extended in place

mod args;
mod session;

use args::{Args, OutputFormat};
use clap::Parser;
use ordoplay_timeline_builder::{BuildScript, BuilderConfig};
use session::{CliResult, Session};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(
            "warn,ordoplay_timeline_builder=info,ordoplay_timeline_cli=info",
        )
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    if let Err(e) = run(&args) {
        tracing::error!("Timeline build failed: {e}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> CliResult<()> {
    let config = match &args.config {
        Some(path) => BuilderConfig::load(path)?,
        None => BuilderConfig::default(),
    };

    let scene = session::read(&args.scene)?;
    let mut session = Session::new(&scene, &args.base, config)?;

    if let Some(path) = &args.library {
        let source = session::read(path)?;
        let library = session::parse_library(&source, OutputFormat::from_path(path))?;
        tracing::info!("Loaded {} timeline(s) from {}", library.len(), path.display());
        session = session.with_library(library);
    }

    for path in &args.scripts {
        let script = BuildScript::from_ron(&session::read(path)?)?;
        let summary = session.run_script(&script, args.passes)?;
        let total = summary.total();
        tracing::info!(
            "{}: {} track(s) created, {} reused, {} removed, {} key(s) inserted, {} unchanged over {} pass(es)",
            summary.timeline,
            total.tracks_created,
            total.tracks_reused,
            total.tracks_removed,
            total.keys_inserted,
            total.keys_unchanged,
            summary.passes.len()
        );
    }

    let rendered = session::render_library(session.library(), args.format)?;
    match &args.output {
        Some(path) => {
            session::write(path, &rendered)?;
            tracing::info!("Wrote {} timeline(s) to {}", session.library().len(), path.display());
        }
        None => println!("{rendered}"),
    }
    Ok(())
}
