//! Snippet index: `index.md` listing every rendered construct by scope.
//!
//! Entries are read back from the rendered snippets rather than from the
//! in-memory constructs, so files skipped as up to date are still listed.

use std::collections::BTreeMap;
use std::path::Path;

pub const INDEX_FILE: &str = "index.md";

const GLOBAL_SCOPE: &str = "Global scope";

/// One snippet as listed in the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub file_name: String,
    pub name: String,
    pub kind: String,
    pub scope: String,
}

impl IndexEntry {
    /// Read name, kind and scope back from a rendered snippet.
    pub fn from_snippet(path: &Path, content: &str) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?.to_string();
        let fields = match path.extension().and_then(|e| e.to_str()) {
            Some("md") => read_frontmatter(content),
            Some("json") => read_json_fields(content),
            _ => return None,
        };
        Some(IndexEntry {
            file_name,
            name: fields.get("name").cloned().unwrap_or_default(),
            kind: fields.get("type").cloned().unwrap_or_default(),
            scope: fields.get("namespace").cloned().unwrap_or_default(),
        })
    }
}

/// Top-level `key: value` pairs of a YAML frontmatter block.
pub fn read_frontmatter(content: &str) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    let mut lines = content.lines();
    if lines.next() != Some("---") {
        return fields;
    }
    for line in lines {
        if line == "---" {
            break;
        }
        if line.starts_with(' ') {
            continue;
        }
        if let Some((key, value)) = line.split_once(": ") {
            fields.insert(key.to_string(), unquote(value));
        }
    }
    fields
}

fn unquote(value: &str) -> String {
    match value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
        Some(inner) => inner.replace("\\\"", "\"").replace("\\\\", "\\"),
        None => value.to_string(),
    }
}

fn read_json_fields(content: &str) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    let Ok(value) = serde_json::from_str::<serde_json::Value>(content) else {
        return fields;
    };
    for (key, json_key) in [("name", "name"), ("type", "kind"), ("namespace", "enclosing_scope")] {
        if let Some(text) = value.get(json_key).and_then(|v| v.as_str()) {
            fields.insert(key.to_string(), text.to_string());
        }
    }
    fields
}

/// Render the index page: a contents list of scopes, then one section per
/// scope with a link to each snippet.
pub fn render_index(entries: &[IndexEntry]) -> String {
    let mut by_scope: BTreeMap<&str, Vec<&IndexEntry>> = BTreeMap::new();
    for entry in entries {
        let scope = if entry.scope.is_empty() {
            GLOBAL_SCOPE
        } else {
            entry.scope.as_str()
        };
        by_scope.entry(scope).or_default().push(entry);
    }

    let mut lines = vec!["# API Index".to_string(), String::new()];
    if by_scope.is_empty() {
        lines.push("*No documented constructs.*".to_string());
        lines.push(String::new());
        return lines.join("\n");
    }

    lines.push("## Contents\n".to_string());
    for scope in by_scope.keys() {
        lines.push(render_toc_item(scope));
    }
    lines.push(String::new());

    for (scope, mut items) in by_scope {
        items.sort_by(|a, b| a.name.cmp(&b.name).then(a.file_name.cmp(&b.file_name)));
        lines.push(format!("## {}\n", scope));
        for item in items {
            let label = if item.name.is_empty() {
                item.file_name.as_str()
            } else {
                item.name.as_str()
            };
            if item.kind.is_empty() {
                lines.push(format!("* [{}]({})", label, item.file_name));
            } else {
                lines.push(format!("* [{}]({}) ({})", label, item.file_name, item.kind));
            }
        }
        lines.push(String::new());
    }
    lines.join("\n")
}

/// Anchor link to a heading on the same page.
pub fn render_toc_link(text: &str) -> String {
    format!("[{}](#{})", text, github_slug(text))
}

pub fn render_toc_item(title: &str) -> String {
    format!("* {}", render_toc_link(title))
}

/// GitHub heading anchor slug: lowercase, keep alphanumerics, spaces and
/// hyphens, then turn spaces into hyphens.
pub fn github_slug(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.to_lowercase().chars() {
        if c.is_alphanumeric() || c == ' ' || c == '-' {
            slug.push(c);
        }
    }
    slug.replace(' ', "-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn slug_with_colons() {
        assert_eq!(github_slug("geo::Vec"), "geovec");
        assert_eq!(github_slug("Global scope"), "global-scope");
        assert_eq!(github_slug("detail_impl"), "detailimpl");
    }

    #[test]
    fn toc_item() {
        assert_eq!(render_toc_item("geo::Vec"), "* [geo::Vec](#geovec)");
    }

    #[test]
    fn frontmatter_fields() {
        let content = "---\ntype: method\nnamespace: \"geo::Vec\"\nname: scale\nsource_locations:\n  - \"a.hpp:1\"\n---\n\n# scale\n";
        let fields = read_frontmatter(content);
        assert_eq!(fields["type"], "method");
        assert_eq!(fields["namespace"], "geo::Vec");
        assert_eq!(fields["name"], "scale");
        assert!(!fields.contains_key("  - \"a.hpp"));
        assert!(read_frontmatter("# no frontmatter").is_empty());
    }

    #[test]
    fn entries_from_both_formats() {
        let md = IndexEntry::from_snippet(
            Path::new("out/geo.Vec.md"),
            "---\ntype: class\nnamespace: geo\nname: Vec\n---\n",
        )
        .unwrap();
        assert_eq!(md.name, "Vec");
        assert_eq!(md.kind, "class");
        assert_eq!(md.scope, "geo");
        assert_eq!(md.file_name, "geo.Vec.md");

        let json = IndexEntry::from_snippet(
            Path::new("out/f.json"),
            r#"{"kind": "function", "name": "f", "enclosing_scope": ""}"#,
        )
        .unwrap();
        assert_eq!(json.kind, "function");
        assert_eq!(json.scope, "");

        assert!(IndexEntry::from_snippet(Path::new("x.txt"), "").is_none());
    }

    #[test]
    fn index_groups_by_scope() {
        let entry = |file: &str, name: &str, kind: &str, scope: &str| IndexEntry {
            file_name: file.into(),
            name: name.into(),
            kind: kind.into(),
            scope: scope.into(),
        };
        let index = render_index(&[
            entry("main.md", "main", "function", ""),
            entry("geo.Vec.scale.md", "scale", "method", "geo::Vec"),
            entry("geo.Vec.md", "Vec", "class", "geo"),
            entry("geo.Vec.add.md", "add", "method", "geo::Vec"),
        ]);
        let expected = "\
# API Index

## Contents

* [Global scope](#global-scope)
* [geo](#geo)
* [geo::Vec](#geovec)

## Global scope

* [main](main.md) (function)

## geo

* [Vec](geo.Vec.md) (class)

## geo::Vec

* [add](geo.Vec.add.md) (method)
* [scale](geo.Vec.scale.md) (method)
";
        assert_eq!(index, expected);
    }

    #[test]
    fn empty_index() {
        assert_eq!(render_index(&[]), "# API Index\n\n*No documented constructs.*\n");
    }
}
