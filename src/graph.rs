use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::connection::Connection;
use crate::index::FileIndex;

/// One file in the graph. `id` is the workspace-relative path — stable across
/// rebuilds as long as the path is unchanged, so a renderer can preserve
/// layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    /// File name without directories, for display.
    pub label: String,
    /// Preferred color from the owning plugin, when one claims the extension.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// One resolved dependency. `id` is `"{from}->{to}"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: String,
    pub from: String,
    pub to: String,
}

/// The renderer-facing graph. Derived, never stored: recomputed from the
/// connection map on every build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphData {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// Build the node/edge graph from the per-file connection map.
///
/// Pass 1 marks files with at least one resolved connection, in either
/// direction, whose target is itself a discovered file — connections to
/// external/undiscovered targets do not count toward non-orphan status.
/// Pass 2 emits one node per discovered file (orphans skipped unless
/// `show_orphans`) and the edges between discovered files.
///
/// Edges are deduplicated: several distinct imports between the same file
/// pair collapse into the single edge `"{from}->{to}"`. Multiplicity carries
/// no meaning for the renderer and a colliding id would break it.
///
/// A pure set/aggregate transform: no cycle detection, weights, or traversal
/// order guarantees.
pub fn build(
    connections: &BTreeMap<PathBuf, Vec<Connection>>,
    index: &FileIndex,
    colors: &HashMap<String, String>,
    show_orphans: bool,
) -> GraphData {
    // Pass 1: resolved endpoints between discovered files.
    let mut connected: HashSet<&Path> = HashSet::new();
    for (from, conns) in connections {
        for conn in conns {
            let Some(target_abs) = &conn.resolved else {
                continue;
            };
            let Some(target_rel) = index.relative_of(target_abs) else {
                continue; // resolved outside the discovered set
            };
            connected.insert(from.as_path());
            connected.insert(target_rel);
        }
    }

    // Pass 2: nodes, then deduplicated edges whose endpoints both have nodes.
    let mut graph = GraphData::default();
    let mut node_ids: HashSet<String> = HashSet::new();
    for (rel, _) in index.iter() {
        if !show_orphans && !connected.contains(rel.as_path()) {
            continue;
        }
        let id = id_for(rel);
        let label = rel
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| id.clone());
        let color = rel
            .extension()
            .and_then(|e| e.to_str())
            .and_then(|e| colors.get(e).cloned());
        node_ids.insert(id.clone());
        graph.nodes.push(GraphNode { id, label, color });
    }

    let mut seen_edges: HashSet<(String, String)> = HashSet::new();
    for (from, conns) in connections {
        let from_id = id_for(from);
        if !node_ids.contains(&from_id) {
            continue;
        }
        for conn in conns {
            let Some(target_abs) = &conn.resolved else {
                continue;
            };
            let Some(target_rel) = index.relative_of(target_abs) else {
                continue;
            };
            let to_id = id_for(target_rel);
            if !node_ids.contains(&to_id) {
                continue;
            }
            if seen_edges.insert((from_id.clone(), to_id.clone())) {
                graph.edges.push(GraphEdge {
                    id: format!("{from_id}->{to_id}"),
                    from: from_id.clone(),
                    to: to_id,
                });
            }
        }
    }

    graph
}

/// Node id for a workspace-relative path: forward slashes on every platform.
fn id_for(rel: &Path) -> String {
    let s = rel.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        s.into_owned()
    } else {
        s.replace(std::path::MAIN_SEPARATOR, "/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ReferenceKind;
    use pretty_assertions::assert_eq;

    fn conn(spec: &str, resolved: Option<&str>) -> Connection {
        Connection {
            specifier: spec.into(),
            resolved: resolved.map(PathBuf::from),
            kind: ReferenceKind::Static,
            line: 1,
            column: None,
        }
    }

    fn two_file_fixture() -> (BTreeMap<PathBuf, Vec<Connection>>, FileIndex) {
        let index = FileIndex::from_pairs([("a.ts", "/ws/a.ts"), ("b.ts", "/ws/b.ts")]);
        let mut connections = BTreeMap::new();
        connections.insert(PathBuf::from("a.ts"), vec![conn("./b", Some("/ws/b.ts"))]);
        connections.insert(PathBuf::from("b.ts"), Vec::new());
        (connections, index)
    }

    #[test]
    fn test_two_files_one_edge() {
        let (connections, index) = two_file_fixture();
        let graph = build(&connections, &index, &HashMap::new(), true);
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].id, "a.ts->b.ts");
        assert_eq!(graph.edges[0].from, "a.ts");
        assert_eq!(graph.edges[0].to, "b.ts");
    }

    #[test]
    fn test_build_is_stable_across_runs() {
        let (connections, index) = two_file_fixture();
        let first = build(&connections, &index, &HashMap::new(), true);
        let second = build(&connections, &index, &HashMap::new(), true);
        assert_eq!(first, second, "identical input must yield identical node/edge sets");
    }

    #[test]
    fn test_orphans_hidden_and_shown() {
        let index = FileIndex::from_pairs([
            ("a.ts", "/ws/a.ts"),
            ("b.ts", "/ws/b.ts"),
            ("lonely.md", "/ws/lonely.md"),
        ]);
        let mut connections = BTreeMap::new();
        connections.insert(PathBuf::from("a.ts"), vec![conn("./b", Some("/ws/b.ts"))]);

        let hidden = build(&connections, &index, &HashMap::new(), false);
        let ids: Vec<&str> = hidden.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["a.ts", "b.ts"], "orphan must be excluded");

        let shown = build(&connections, &index, &HashMap::new(), true);
        assert_eq!(shown.nodes.len(), 3, "every discovered file appears when orphans are shown");
    }

    #[test]
    fn test_unresolved_and_external_targets_do_not_count() {
        let index = FileIndex::from_pairs([("a.ts", "/ws/a.ts")]);
        let mut connections = BTreeMap::new();
        connections.insert(
            PathBuf::from("a.ts"),
            vec![
                conn("react", None),
                // resolved, but outside the discovered set
                conn("../other/x", Some("/elsewhere/x.ts")),
            ],
        );
        let graph = build(&connections, &index, &HashMap::new(), false);
        assert!(graph.nodes.is_empty(), "a.ts has no in-workspace connection; it is an orphan");
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn test_duplicate_edges_collapse() {
        let index = FileIndex::from_pairs([("a.ts", "/ws/a.ts"), ("b.ts", "/ws/b.ts")]);
        let mut connections = BTreeMap::new();
        connections.insert(
            PathBuf::from("a.ts"),
            vec![
                conn("./b", Some("/ws/b.ts")),
                conn("./b", Some("/ws/b.ts")), // second import of the same file
            ],
        );
        let graph = build(&connections, &index, &HashMap::new(), false);
        assert_eq!(graph.edges.len(), 1, "same (from, to) pair must produce one edge");
    }

    #[test]
    fn test_node_colors_come_from_extension_map() {
        let index = FileIndex::from_pairs([("a.ts", "/ws/a.ts")]);
        let mut colors = HashMap::new();
        colors.insert("ts".to_owned(), "#3178c6".to_owned());
        let graph = build(&BTreeMap::new(), &index, &colors, true);
        assert_eq!(graph.nodes[0].color.as_deref(), Some("#3178c6"));
        assert_eq!(graph.nodes[0].label, "a.ts");
    }

    #[test]
    fn test_incoming_connection_saves_target_from_orphanhood() {
        // b.py has no outgoing connections; the incoming edge from a.py keeps
        // it in the graph with orphans hidden.
        let index = FileIndex::from_pairs([("a.py", "/ws/a.py"), ("b.py", "/ws/b.py")]);
        let mut connections = BTreeMap::new();
        connections.insert(PathBuf::from("a.py"), vec![conn("b", Some("/ws/b.py"))]);
        let graph = build(&connections, &index, &HashMap::new(), false);
        assert!(graph.nodes.iter().any(|n| n.id == "b.py"));
    }
}
