//! Documentation comment parser: Javadoc and Doxygen tags.
//!
//! Finds `/** ... */` blocks or runs of `///` / `//!` lines and splits them
//! into a description, `@param` entries, a return description and the
//! remaining tags. Tags may be written `@tag` or `\tag`.

use crate::model::{DocBlock, SourceLocation};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Which comments count as documentation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocstringStyle {
    #[default]
    #[serde(rename = "/** */")]
    Block,
    #[serde(rename = "/// ", alias = "///")]
    TripleSlash,
    #[serde(rename = "//! ", alias = "//!")]
    Bang,
}

impl DocstringStyle {
    fn line_prefix(self) -> Option<&'static str> {
        match self {
            DocstringStyle::Block => None,
            DocstringStyle::TripleSlash => Some("///"),
            DocstringStyle::Bang => Some("//!"),
        }
    }
}

impl fmt::Display for DocstringStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DocstringStyle::Block => "/** */",
            DocstringStyle::TripleSlash => "/// ",
            DocstringStyle::Bang => "//! ",
        })
    }
}

// -- Regex patterns -----------------------------------------------------------

/// `/** ... */`, but not the empty C comment `/**/`.
static RE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*\*(?:[^/].*?)?\*/").unwrap());

static RE_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[@\\]param(?:\[[a-z, ]+\])?\s+(\w+)(?:\s+(.*))?$").unwrap()
});

static RE_RETURN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[@\\]returns?(?:\s+(.*))?$").unwrap());

static RE_BRIEF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[@\\]brief(?:\s+(.*))?$").unwrap());

static RE_OVERRIDE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[@\\](?:class|struct|enum)\s+(\S+)").unwrap());

static RE_FILE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[@\\]file\b").unwrap());

static RE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[@\\](\w+)(?:\s+(.*))?$").unwrap());

// -- Extraction ---------------------------------------------------------------

/// Find every documentation comment of the given style in `content`.
pub fn extract_doc_blocks(content: &str, style: DocstringStyle) -> Vec<DocBlock> {
    match style.line_prefix() {
        None => RE_BLOCK
            .find_iter(content)
            .map(|m| located(content, m.as_str(), m.start(), m.end()))
            .collect(),
        Some(prefix) => extract_line_blocks(content, prefix),
    }
}

/// Group consecutive prefixed lines into one block each.
fn extract_line_blocks(content: &str, prefix: &str) -> Vec<DocBlock> {
    let mut blocks = Vec::new();
    let mut run: Option<(usize, usize)> = None;
    let mut offset = 0;

    for line in content.split_inclusive('\n') {
        let text = line.trim_end_matches(['\n', '\r']);
        let indent = text.len() - text.trim_start().len();
        if text.trim_start().starts_with(prefix) {
            let end = offset + text.len();
            run = Some(match run {
                Some((start, _)) => (start, end),
                None => (offset + indent, end),
            });
        } else if let Some((start, end)) = run.take() {
            blocks.push(located(content, &content[start..end], start, end));
        }
        offset += line.len();
    }
    if let Some((start, end)) = run {
        blocks.push(located(content, &content[start..end], start, end));
    }
    blocks
}

fn located(content: &str, raw: &str, start: usize, end: usize) -> DocBlock {
    let mut block = parse_doc_comment(raw);
    block.location = source_location(content, start);
    block.end_byte = end;
    block
}

fn source_location(content: &str, offset: usize) -> SourceLocation {
    let before = &content[..offset];
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    SourceLocation {
        line: before.matches('\n').count() + 1,
        column: offset - line_start + 1,
        byte_offset: offset,
    }
}

// -- Content parsing ----------------------------------------------------------

/// Strip comment markers: `/**`, `*/`, leading `*` and `///` / `//!` prefixes.
pub fn clean_comment(raw: &str) -> String {
    let raw = raw.trim();
    let (body, block) = match raw.strip_prefix("/**") {
        Some(inner) => (inner.strip_suffix("*/").unwrap_or(inner), true),
        None => (raw, false),
    };

    body.lines()
        .map(|line| {
            let line = line.trim_start();
            let line = if block {
                line.strip_prefix('*').unwrap_or(line)
            } else {
                line.strip_prefix("///")
                    .or_else(|| line.strip_prefix("//!"))
                    .unwrap_or(line)
            };
            line.strip_prefix(' ').unwrap_or(line).trim_end()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Which tag a continuation line belongs to.
enum Continuation {
    None,
    Param(String),
    Returns,
    Tag(usize),
}

/// Parse a raw comment into description, params, return text and tags.
pub fn parse_doc_comment(raw: &str) -> DocBlock {
    let cleaned = clean_comment(raw);
    let mut block = DocBlock {
        raw_text: raw.to_string(),
        ..Default::default()
    };
    let mut description: Vec<&str> = Vec::new();
    let mut brief: Option<String> = None;
    let mut in_description = true;
    let mut continuation = Continuation::None;

    for line in cleaned.lines() {
        let line = line.trim();

        if let Some(caps) = RE_PARAM.captures(line) {
            let name = caps[1].to_string();
            let text = caps.get(2).map_or("", |m| m.as_str().trim());
            block.params.insert(name.clone(), text.to_string());
            continuation = Continuation::Param(name);
        } else if let Some(caps) = RE_RETURN.captures(line) {
            block.returns = caps.get(1).map_or("", |m| m.as_str().trim()).to_string();
            continuation = Continuation::Returns;
        } else if let Some(caps) = RE_BRIEF.captures(line) {
            brief = caps.get(1).map(|m| m.as_str().trim().to_string());
            continuation = Continuation::None;
        } else if let Some(caps) = RE_OVERRIDE.captures(line) {
            block.name_override = Some(caps[1].to_string());
            continuation = Continuation::None;
        } else if RE_FILE.is_match(line) {
            continuation = Continuation::None;
        } else if let Some(caps) = RE_TAG.captures(line) {
            let tag = match caps.get(2).map(|m| m.as_str().trim()) {
                Some(value) if !value.is_empty() => format!("{}: {}", &caps[1], value),
                _ => caps[1].to_string(),
            };
            block.tags.push(tag);
            continuation = Continuation::Tag(block.tags.len() - 1);
        } else {
            if in_description {
                description.push(line);
                continue;
            }
            if line.is_empty() {
                continuation = Continuation::None;
                continue;
            }
            let target = match &continuation {
                Continuation::Param(name) => block.params.get_mut(name),
                Continuation::Returns => Some(&mut block.returns),
                Continuation::Tag(i) => block.tags.get_mut(*i),
                Continuation::None => None,
            };
            if let Some(text) = target {
                if !text.is_empty() {
                    text.push(' ');
                }
                text.push_str(line);
            }
            continue;
        }
        in_description = false;
    }

    block.description = description.join("\n").trim().to_string();
    if block.description.is_empty() {
        block.description = brief.unwrap_or_default();
    }
    block
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_comment_with_tags() {
        let raw = "/**\n * Adds two numbers.\n *\n * @param a first operand\n * @param b second operand\n * @return the sum\n * @since 1.2\n */";
        let block = parse_doc_comment(raw);
        assert_eq!(block.description, "Adds two numbers.");
        assert_eq!(block.params["a"], "first operand");
        assert_eq!(block.params["b"], "second operand");
        assert_eq!(block.returns, "the sum");
        assert_eq!(block.tags, vec!["since: 1.2"]);
        assert_eq!(block.raw_text, raw);
    }

    #[test]
    fn doxygen_backslash_tags() {
        let block = parse_doc_comment("/** \\brief Short.\n * \\returns nothing */");
        assert_eq!(block.description, "Short.");
        assert_eq!(block.returns, "nothing");
    }

    #[test]
    fn brief_only_used_without_description() {
        let block = parse_doc_comment("/** Long text.\n * @brief Short. */");
        assert_eq!(block.description, "Long text.");
    }

    #[test]
    fn multi_line_param_description() {
        let block = parse_doc_comment("/**\n * @param key the lookup key,\n *   never empty\n */");
        assert_eq!(block.params["key"], "the lookup key, never empty");
    }

    #[test]
    fn overrides_and_file_tag() {
        let block = parse_doc_comment("/** @file json.hpp\n * @class JsonDoc\n * @deprecated */");
        assert_eq!(block.name_override.as_deref(), Some("JsonDoc"));
        assert_eq!(block.tags, vec!["deprecated"]);
    }

    #[test]
    fn finds_block_comments_with_locations() {
        let src = "int x;\n/** First */\nvoid f();\n  /** Second */\nvoid g();\n";
        let blocks = extract_doc_blocks(src, DocstringStyle::Block);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].description, "First");
        assert_eq!(blocks[0].location.line, 2);
        assert_eq!(blocks[0].location.column, 1);
        assert_eq!(blocks[0].location.byte_offset, 7);
        assert_eq!(blocks[0].end_byte, 7 + "/** First */".len());
        assert_eq!(blocks[1].location.line, 4);
        assert_eq!(blocks[1].location.column, 3);
    }

    #[test]
    fn empty_c_comment_is_not_a_doc_block() {
        let src = "/**/ int hidden = 0;\n/** Real doc. */\nvoid f();\n";
        let blocks = extract_doc_blocks(src, DocstringStyle::Block);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].raw_text, "/** Real doc. */");
        assert_eq!(blocks[0].location.line, 2);
    }

    #[test]
    fn groups_consecutive_line_comments() {
        let src = "/// Alpha\n/// @param x value\nvoid a(int x);\n\n    /// Beta\nvoid b();\n";
        let blocks = extract_doc_blocks(src, DocstringStyle::TripleSlash);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].description, "Alpha");
        assert_eq!(blocks[0].params["x"], "value");
        assert_eq!(blocks[0].raw_text, "/// Alpha\n/// @param x value");
        assert_eq!(blocks[1].description, "Beta");
        assert_eq!(blocks[1].location.line, 5);
    }

    #[test]
    fn bang_style_ignores_triple_slash() {
        let src = "/// not this\n//! Module docs\n";
        let blocks = extract_doc_blocks(src, DocstringStyle::Bang);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].description, "Module docs");
    }

    #[test]
    fn clean_strips_markers() {
        assert_eq!(clean_comment("/** Add two numbers */"), "Add two numbers");
        assert_eq!(clean_comment("/// one\n/// two"), "one\ntwo");
    }

    #[test]
    fn style_names_round_trip_through_config_strings() {
        let style: DocstringStyle = serde_json::from_str("\"///\"").unwrap();
        assert_eq!(style, DocstringStyle::TripleSlash);
        assert_eq!(style.to_string(), "/// ");
        let style: DocstringStyle = serde_json::from_str("\"/** */\"").unwrap();
        assert_eq!(style, DocstringStyle::Block);
    }
}
