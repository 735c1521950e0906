use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Multi-language dependency graph engine.
///
/// depmap discovers source files, detects cross-file imports per language
/// (TypeScript/JavaScript, Python, GDScript, C#), resolves them to concrete
/// files, and emits a node/edge graph for visualization.
#[derive(Parser, Debug)]
#[command(name = "depmap", version, about, long_about = None, propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze a workspace and print its dependency graph.
    Analyze {
        /// Path to the workspace root.
        path: PathBuf,

        /// Output the graph as JSON instead of a human-readable summary.
        #[arg(long)]
        json: bool,

        /// Enable debug logging on stderr (equivalent to RUST_LOG=depmap=debug).
        #[arg(long, short)]
        verbose: bool,

        /// Ignore the on-disk cache and re-analyze every file.
        #[arg(long)]
        no_cache: bool,

        /// Exclude files with no resolved connections from the graph.
        #[arg(long)]
        hide_orphans: bool,
    },

    /// Delete the on-disk analysis cache for a workspace.
    Clean {
        /// Path to the workspace root.
        path: PathBuf,
    },
}
