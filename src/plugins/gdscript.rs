use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::connection::{Declaration, FileAnalysis, RawReference, ReferenceKind};
use crate::index::{FileIndex, normalize};
use crate::plugins::LanguagePlugin;

fn preload_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\bpreload\s*\(\s*"([^"]+)"\s*\)"#).expect("invalid preload regex")
    })
}

fn load_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // `\b` keeps this from matching the tail of `preload(`.
    RE.get_or_init(|| {
        Regex::new(r#"\b(?:ResourceLoader\s*\.\s*)?load\s*\(\s*"([^"]+)"\s*\)"#)
            .expect("invalid load regex")
    })
}

fn extends_path_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"^\s*extends\s+"([^"]+)""#).expect("invalid extends regex"))
}

fn extends_class_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*extends\s+([A-Za-z_]\w*)\s*$").expect("invalid extends class regex")
    })
}

fn class_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*class_name\s+([A-Za-z_]\w*)").expect("invalid class_name regex")
    })
}

/// Strip an inline `#` comment, keeping `#` characters inside string literals.
fn strip_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    let mut in_string = false;
    for (i, &c) in bytes.iter().enumerate() {
        match c {
            b'"' => in_string = !in_string,
            b'#' if !in_string => return &line[..i],
            _ => {}
        }
    }
    line
}

/// GDScript plugin: per-line regex detection for `preload`/`load` resource
/// references, `extends`, and `class_name` declarations, plus `res://` and
/// class-registry resolution.
///
/// GDScript allows forward and out-of-order class references, so the
/// class-name registry is populated by the registration pass over the whole
/// workspace before any resolution happens.
pub struct GdScriptPlugin {
    /// class name -> workspace-relative path of the declaring script.
    /// First declaration wins; duplicates are a script error in the engine.
    classes: HashMap<String, PathBuf>,
}

impl GdScriptPlugin {
    pub fn new() -> Self {
        Self { classes: HashMap::new() }
    }
}

impl Default for GdScriptPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguagePlugin for GdScriptPlugin {
    fn id(&self) -> &'static str {
        "gdscript"
    }

    fn name(&self) -> &'static str {
        "GDScript"
    }

    fn version(&self) -> &'static str {
        "0.3.0"
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        &["gd"]
    }

    fn file_colors(&self) -> &'static [(&'static str, &'static str)] {
        &[("gd", "#478cbf")]
    }

    fn default_exclude(&self) -> &'static [&'static str] {
        &["**/.godot/**", "**/.import/**"]
    }

    fn dispose(&mut self) {
        self.classes.clear();
    }

    fn detect(&self, _path: &Path, content: &str) -> FileAnalysis {
        let mut references = Vec::new();
        let mut declarations = Vec::new();

        for (i, raw) in content.lines().enumerate() {
            let line_no = i as u32 + 1;
            let line = strip_comment(raw);

            if let Some(caps) = class_name_re().captures(line) {
                let name = caps[1].to_owned();
                references.push(
                    RawReference::new(name.clone(), ReferenceKind::Declaration, line_no)
                        .with_column(caps.get(1).map_or(0, |m| m.start()) as u32),
                );
                declarations.push(Declaration::ClassName(name));
                continue;
            }

            if let Some(caps) = extends_path_re().captures(line) {
                references.push(RawReference::new(
                    &caps[1],
                    ReferenceKind::Inheritance,
                    line_no,
                ));
                continue;
            }
            if let Some(caps) = extends_class_re().captures(line) {
                // Bare identifier: user class via the registry, or a built-in
                // engine class that simply misses it and stays unresolved.
                references.push(RawReference::new(
                    &caps[1],
                    ReferenceKind::Inheritance,
                    line_no,
                ));
                continue;
            }

            for caps in preload_re().captures_iter(line) {
                references.push(
                    RawReference::new(&caps[1], ReferenceKind::Static, line_no)
                        .with_column(caps.get(0).map_or(0, |m| m.start()) as u32),
                );
            }
            for caps in load_re().captures_iter(line) {
                references.push(
                    RawReference::new(&caps[1], ReferenceKind::Dynamic, line_no)
                        .with_column(caps.get(0).map_or(0, |m| m.start()) as u32),
                );
            }
        }

        FileAnalysis { references, declarations }
    }

    fn register(&mut self, file: &Path, analysis: &FileAnalysis) {
        for declaration in &analysis.declarations {
            if let Declaration::ClassName(name) = declaration {
                self.classes
                    .entry(name.clone())
                    .or_insert_with(|| file.to_path_buf());
            }
        }
    }

    fn resolve(
        &self,
        reference: &RawReference,
        from: &Path,
        index: &FileIndex,
    ) -> Option<PathBuf> {
        // A declaration registers a symbol; it is not an edge to another file.
        if reference.kind == ReferenceKind::Declaration {
            return None;
        }

        let specifier = reference.specifier.as_str();

        if let Some(rest) = specifier.strip_prefix("res://") {
            // res:// is already workspace-relative, 1:1, no search.
            return index.absolute(Path::new(rest)).cloned();
        }
        if specifier.starts_with("user://") {
            // user:// lives outside the workspace.
            return None;
        }
        if specifier.starts_with("./") || specifier.starts_with("../") {
            let from_dir = from.parent().unwrap_or(Path::new(""));
            return index.absolute(&normalize(&from_dir.join(specifier))).cloned();
        }

        // Bare identifier: class-name registry lookup.
        let rel = self.classes.get(specifier)?;
        index.absolute(rel).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn detect(content: &str) -> FileAnalysis {
        GdScriptPlugin::new().detect(Path::new("player.gd"), content)
    }

    fn specs(analysis: &FileAnalysis) -> Vec<(&str, ReferenceKind, u32)> {
        analysis
            .references
            .iter()
            .map(|r| (r.specifier.as_str(), r.kind, r.line))
            .collect()
    }

    #[test]
    fn test_detect_preload_load_and_resource_loader() {
        let analysis = detect(
            "const Enemy = preload(\"res://enemy.gd\")\n\
             var level = load(\"res://levels/one.tscn\")\n\
             var late = ResourceLoader.load(\"res://late.gd\")\n",
        );
        assert_eq!(
            specs(&analysis),
            vec![
                ("res://enemy.gd", ReferenceKind::Static, 1),
                ("res://levels/one.tscn", ReferenceKind::Dynamic, 2),
                ("res://late.gd", ReferenceKind::Dynamic, 3),
            ]
        );
    }

    #[test]
    fn test_preload_is_not_also_a_load() {
        let analysis = detect("const E = preload(\"res://enemy.gd\")\n");
        assert_eq!(analysis.references.len(), 1, "preload must not double-match as load");
    }

    #[test]
    fn test_extends_path_and_class_name_declaration() {
        let analysis = detect("extends \"res://base.gd\"\nclass_name Player\n");
        assert_eq!(
            specs(&analysis),
            vec![
                ("res://base.gd", ReferenceKind::Inheritance, 1),
                ("Player", ReferenceKind::Declaration, 2),
            ]
        );
        assert_eq!(analysis.declarations, vec![Declaration::ClassName("Player".into())]);
    }

    #[test]
    fn test_extends_bare_identifier() {
        let analysis = detect("extends Enemy\n");
        assert_eq!(specs(&analysis), vec![("Enemy", ReferenceKind::Inheritance, 1)]);
    }

    #[test]
    fn test_inline_comments_are_stripped() {
        let analysis = detect(
            "# const A = preload(\"res://a.gd\")\n\
             var x = 1  # load(\"res://b.gd\")\n\
             var s = \"# not a comment\" + str(preload(\"res://c.gd\"))\n",
        );
        assert_eq!(specs(&analysis), vec![("res://c.gd", ReferenceKind::Static, 3)]);
    }

    #[test]
    fn test_empty_and_comment_only_files() {
        assert!(detect("").is_empty());
        assert!(detect("# just a comment\n").is_empty());
    }

    fn index() -> FileIndex {
        FileIndex::from_pairs([
            ("enemy.gd", "/ws/enemy.gd"),
            ("scenes/level.tscn", "/ws/scenes/level.tscn"),
            ("actors/base.gd", "/ws/actors/base.gd"),
            ("actors/player.gd", "/ws/actors/player.gd"),
        ])
    }

    #[test]
    fn test_res_path_maps_one_to_one() {
        let plugin = GdScriptPlugin::new();
        let r = RawReference::new("res://scenes/level.tscn", ReferenceKind::Static, 1);
        assert_eq!(
            plugin.resolve(&r, Path::new("main.gd"), &index()),
            Some(PathBuf::from("/ws/scenes/level.tscn"))
        );
    }

    #[test]
    fn test_user_path_never_resolves() {
        let plugin = GdScriptPlugin::new();
        let r = RawReference::new("user://save.dat", ReferenceKind::Dynamic, 1);
        assert_eq!(plugin.resolve(&r, Path::new("main.gd"), &index()), None);
    }

    #[test]
    fn test_relative_path_resolves_against_importer_directory() {
        let plugin = GdScriptPlugin::new();
        let r = RawReference::new("../enemy.gd", ReferenceKind::Static, 1);
        assert_eq!(
            plugin.resolve(&r, Path::new("actors/player.gd"), &index()),
            Some(PathBuf::from("/ws/enemy.gd"))
        );
    }

    #[test]
    fn test_forward_class_reference_resolves_after_registration() {
        // The referencing file is visited before the declaring file; the
        // registration pass over the whole workspace must still make the
        // lookup succeed.
        let mut plugin = GdScriptPlugin::new();
        let referencing = plugin.detect(Path::new("actors/player.gd"), "extends Enemy\n");
        let declaring = plugin.detect(
            Path::new("enemy.gd"),
            "class_name Enemy\nextends Node2D\n",
        );

        plugin.register(Path::new("actors/player.gd"), &referencing);
        plugin.register(Path::new("enemy.gd"), &declaring);

        let resolved =
            plugin.resolve(&referencing.references[0], Path::new("actors/player.gd"), &index());
        assert_eq!(resolved, Some(PathBuf::from("/ws/enemy.gd")));
    }

    #[test]
    fn test_builtin_class_extends_stays_unresolved() {
        let plugin = GdScriptPlugin::new();
        let r = RawReference::new("Node2D", ReferenceKind::Inheritance, 1);
        assert_eq!(
            plugin.resolve(&r, Path::new("main.gd"), &index()),
            None,
            "engine classes miss the registry and stay unresolved"
        );
    }

    #[test]
    fn test_dispose_clears_class_registry() {
        let mut plugin = GdScriptPlugin::new();
        let analysis = plugin.detect(Path::new("enemy.gd"), "class_name Enemy\n");
        plugin.register(Path::new("enemy.gd"), &analysis);
        plugin.dispose();
        let r = RawReference::new("Enemy", ReferenceKind::Inheritance, 1);
        assert_eq!(plugin.resolve(&r, Path::new("main.gd"), &index()), None);
    }
}
