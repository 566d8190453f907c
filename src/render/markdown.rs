//! Markdown renderer: one page per construct with YAML frontmatter.
//!
//! Doc comments are kept raw on the construct and parsed here, so merged
//! records show each occurrence's description in order while `@param` and
//! `@return` text from any of them feeds the tables.

use crate::model::{Construct, ConstructKind, DocBlock};
use crate::parser::comments::parse_doc_comment;
use crate::render::Renderer;
use std::collections::BTreeMap;

pub struct MarkdownRenderer;

const NO_DESCRIPTION: &str = "*(No description available)*";

impl Renderer for MarkdownRenderer {
    fn render(&self, c: &Construct) -> String {
        let docs = ParsedDocs::from_construct(c);
        let mut lines: Vec<String> = Vec::new();

        lines.extend(frontmatter(c));
        lines.push(String::new());

        lines.push(format!("# {}\n", c.name));
        if c.enclosing_scope.is_empty() {
            lines.push(format!("*{}*\n", c.kind));
        } else {
            lines.push(format!("*{} in {}*\n", c.kind, c.enclosing_scope));
        }

        if c.kind.is_callable() {
            lines.push("## Signature\n".to_string());
            lines.push("```cpp".to_string());
            lines.push(signature(c));
            lines.push("```\n".to_string());
        }

        if !c.base_types.is_empty() {
            lines.push("## Bases\n".to_string());
            for base in &c.base_types {
                lines.push(format!("* `{}`", base));
            }
            lines.push(String::new());
        }

        if !c.parameters.is_empty() {
            lines.push("## Parameters\n".to_string());
            lines.push("| Name | Type | Description |".to_string());
            lines.push("|------|------|-------------|".to_string());
            for p in &c.parameters {
                let doc = docs.params.get(&p.name).filter(|d| !d.is_empty());
                let description = match (doc, &p.default_value) {
                    (Some(doc), Some(default)) => format!("{} *(default: `{}`)*", doc, default),
                    (Some(doc), None) => doc.clone(),
                    (None, Some(default)) => format!("*Default: `{}`*", default),
                    (None, None) => NO_DESCRIPTION.to_string(),
                };
                lines.push(format!(
                    "| `{}` | `{}` | {} |",
                    p.name,
                    p.type_name,
                    description.replace('|', "\\|")
                ));
            }
            lines.push(String::new());
        }

        if let Some(ret) = returned_type(c) {
            lines.push("## Returns\n".to_string());
            lines.push(format!("`{}`\n", ret));
            if docs.returns.is_empty() {
                lines.push(format!("{}\n", NO_DESCRIPTION));
            } else {
                lines.push(format!("{}\n", docs.returns));
            }
        }

        lines.push("## Documentation\n".to_string());
        if !c.has_doc() {
            lines.push(format!(
                "*No documentation available. This {} was automatically discovered from the source code.*\n",
                c.kind
            ));
        } else if docs.descriptions.is_empty() {
            lines.push(format!("{}\n", NO_DESCRIPTION));
        } else {
            lines.push(format!("{}\n", docs.descriptions.join("\n\n")));
        }

        if !docs.tags.is_empty() {
            lines.push("## Additional Information\n".to_string());
            for tag in &docs.tags {
                lines.push(format!("* {}", tag));
            }
            lines.push(String::new());
        }

        lines.push("## Source\n".to_string());
        if c.merge.is_merged {
            for loc in &c.merge.source_locations {
                lines.push(format!("* `{}`", loc));
            }
        } else {
            lines.push(format!("**File:** `{}`\n", c.source_file));
            lines.push(format!(
                "**Lines:** {}-{}",
                c.span.start_line, c.span.end_line
            ));
        }

        let mut out = lines.join("\n");
        out.push('\n');
        out
    }

    fn file_extension(&self) -> &str {
        "md"
    }
}

/// Doc comment content gathered from every fragment of a construct.
#[derive(Default)]
struct ParsedDocs {
    descriptions: Vec<String>,
    params: BTreeMap<String, String>,
    returns: String,
    tags: Vec<String>,
}

impl ParsedDocs {
    fn from_construct(c: &Construct) -> Self {
        let fragments: Vec<&str> = if c.merge.doc_fragments.is_empty() {
            c.doc_comment.as_deref().into_iter().collect()
        } else {
            c.merge.doc_fragments.iter().map(String::as_str).collect()
        };

        let mut docs = ParsedDocs::default();
        for fragment in fragments {
            let DocBlock {
                description,
                params,
                returns,
                tags,
                ..
            } = parse_doc_comment(fragment);
            if !description.is_empty() && !docs.descriptions.contains(&description) {
                docs.descriptions.push(description);
            }
            for (name, text) in params {
                docs.params.entry(name).or_insert(text);
            }
            if docs.returns.is_empty() {
                docs.returns = returns;
            }
            for tag in tags {
                if !docs.tags.contains(&tag) {
                    docs.tags.push(tag);
                }
            }
        }
        docs
    }
}

/// Return type worth a section: callables other than ctor/dtor, not void.
fn returned_type(c: &Construct) -> Option<&str> {
    if !matches!(c.kind, ConstructKind::Function | ConstructKind::Method) {
        return None;
    }
    c.return_type.as_deref().filter(|r| !r.is_empty() && *r != "void")
}

fn signature(c: &Construct) -> String {
    let params = c
        .parameters
        .iter()
        .map(|p| {
            let mut s = p.type_name.clone();
            if !p.name.is_empty() {
                s.push(' ');
                s.push_str(&p.name);
            }
            if let Some(default) = &p.default_value {
                s.push_str(" = ");
                s.push_str(default);
            }
            s
        })
        .collect::<Vec<_>>()
        .join(", ");

    let prefix = match (&c.return_type, c.kind) {
        (_, ConstructKind::Constructor | ConstructKind::Destructor) => String::new(),
        (Some(ret), _) if !ret.is_empty() => format!("{} ", ret),
        _ => String::new(),
    };
    format!("{}{}({})", prefix, c.name, params)
}

fn frontmatter(c: &Construct) -> Vec<String> {
    let mut lines = vec!["---".to_string()];
    let mut field = |key: &str, value: &str| lines.push(format!("{}: {}", key, yaml_value(value)));

    field("type", c.kind.as_str());
    if !c.enclosing_scope.is_empty() {
        field("namespace", &c.enclosing_scope);
    }
    field("name", &c.name);
    field("qualified_name", &c.qualified_name);
    if !c.visibility.is_empty() {
        field("visibility", &c.visibility);
    }
    field("start_line", &c.span.start_line.to_string());
    field("end_line", &c.span.end_line.to_string());
    field("file", &c.source_file);
    if let Some(ret) = &c.return_type {
        field("return_type", ret);
    }
    if c.merge.is_merged {
        lines.push("is_merged: true".to_string());
        lines.push("source_locations:".to_string());
        for loc in &c.merge.source_locations {
            lines.push(format!("  - {}", yaml_value(loc)));
        }
    }
    lines.push("---".to_string());
    lines
}

/// Plain scalar when safe, double-quoted otherwise.
fn yaml_value(value: &str) -> String {
    const SPECIAL: &[char] = &[
        ':', '#', '[', ']', '{', '}', ',', '&', '*', '!', '|', '>', '<', '\'', '"', '%', '@', '`',
    ];
    let needs_quotes = value.is_empty()
        || value.starts_with(['-', '?', ' ', '~'])
        || value.ends_with(' ')
        || value.contains(SPECIAL);
    if !needs_quotes {
        return value.to_string();
    }
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}
