use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use depmap::analyzer::Analyzer;
use depmap::cache::FsCacheStore;
use depmap::cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = match &cli.command {
        Commands::Analyze { verbose: true, .. } => "depmap=debug",
        _ => "warn",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Analyze { path, json, no_cache, hide_orphans, .. } => {
            let mut analyzer = Analyzer::new(&path);
            let show_orphans = analyzer.config().show_orphans && !hide_orphans;
            let outcome = analyzer.run(!no_cache, show_orphans)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome.graph)?);
            } else {
                println!("Analyzed {}", path.display());
                println!(
                    "  files: {} ({} cached, {} analyzed)",
                    outcome.stats.files, outcome.stats.cache_hits, outcome.stats.analyzed
                );
                println!(
                    "  connections: {} resolved, {} unresolved",
                    outcome.stats.resolved, outcome.stats.unresolved
                );
                println!(
                    "  graph: {} node(s), {} edge(s)",
                    outcome.graph.nodes.len(),
                    outcome.graph.edges.len()
                );
            }
        }
        Commands::Clean { path } => {
            let store = FsCacheStore::for_workspace(&path);
            store.remove()?;
            println!("Removed {}", store.path().display());
        }
    }

    Ok(())
}
