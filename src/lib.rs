//! depmap — multi-language dependency graph engine.
//!
//! Pipeline: discovery ([`walker`]) yields candidate files → the
//! [`cache`] is consulted per file → on a miss the [`plugins::registry`]
//! dispatches detection to the matching language plugin → a whole-workspace
//! registration pass feeds declarations into resolver registries → the
//! resolution pass turns raw references into [`connection::Connection`]s →
//! [`graph`] assembles deduplicated nodes and edges.

pub mod analyzer;
pub mod cache;
pub mod cli;
pub mod config;
pub mod connection;
pub mod graph;
pub mod index;
pub mod plugins;
pub mod walker;

pub use analyzer::{AnalysisOutcome, AnalysisStats, Analyzer};
pub use connection::{Connection, FileAnalysis, RawReference, ReferenceKind};
pub use graph::{GraphData, GraphEdge, GraphNode};
pub use index::FileIndex;
pub use plugins::{LanguagePlugin, PluginError};
pub use plugins::registry::{PluginRegistry, RegistryError};
