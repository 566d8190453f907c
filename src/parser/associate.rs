//! Doc association: match comment blocks to the declaration that follows.
//!
//! A tree query collects every declaration node; each comment block is
//! paired with the declaration starting closest after the comment ends.

use super::extract::find_function_declarator;
use crate::model::{Association, Construct, DocBlock};
use tracing::{debug, warn};
use tree_sitter::{Language, Node, Query, QueryCursor, StreamingIterator, Tree};

const DECLARATION_KINDS: &[&str] = &[
    "function_definition",
    "class_specifier",
    "namespace_definition",
    "struct_specifier",
    "enum_specifier",
];

const SCOPE_KINDS: &[&str] = &["namespace_definition", "class_specifier", "struct_specifier"];

/// `[(function_definition) (class_specifier) ...] @decl`, restricted to the
/// node kinds this grammar defines.
fn declaration_query(language: &Language) -> Option<Query> {
    let kinds: Vec<String> = DECLARATION_KINDS
        .iter()
        .filter(|kind| language.id_for_node_kind(kind, true) != 0)
        .map(|kind| format!("({})", kind))
        .collect();
    if kinds.is_empty() {
        return None;
    }
    let source = format!("[{}] @decl", kinds.join(" "));
    match Query::new(language, &source) {
        Ok(query) => Some(query),
        Err(e) => {
            warn!("declaration query rejected: {}", e);
            None
        }
    }
}

fn declarations<'t>(tree: &'t Tree, source: &str, language: &Language) -> Vec<Node<'t>> {
    let Some(query) = declaration_query(language) else {
        return Vec::new();
    };
    let mut cursor = QueryCursor::new();
    let mut nodes = Vec::new();
    let mut matches = cursor.matches(&query, tree.root_node(), source.as_bytes());
    while let Some(m) = matches.next() {
        nodes.extend(m.captures.iter().map(|c| c.node));
    }
    nodes
}

fn node_text<'s>(node: Node<'_>, source: &'s str) -> &'s str {
    source.get(node.start_byte()..node.end_byte()).unwrap_or("")
}

/// Names of enclosing namespaces and classes, outermost first.
fn scope_path(node: Node<'_>, source: &str) -> String {
    let mut parts = Vec::new();
    let mut current = node.parent();
    while let Some(n) = current {
        if SCOPE_KINDS.contains(&n.kind()) {
            if let Some(name) = n.child_by_field_name("name") {
                parts.push(node_text(name, source));
            }
        }
        current = n.parent();
    }
    parts.reverse();
    parts.join("::")
}

fn symbol_name(node: Node<'_>, source: &str) -> String {
    if node.kind() == "function_definition" {
        let declarator = find_function_declarator(node);
        let inner = declarator.and_then(|d| d.child_by_field_name("declarator"));
        return inner.or(declarator).map_or_else(String::new, |n| {
            let text = node_text(n, source);
            text.split('(').next().unwrap_or(text).trim().to_string()
        });
    }
    node.child_by_field_name("name")
        .map_or_else(String::new, |n| node_text(n, source).trim().to_string())
}

/// The declaration starting closest after `comment_end`; ties go to the one
/// the query reported first.
fn nearest_following<'t>(decls: &[Node<'t>], comment_end: usize) -> Option<Node<'t>> {
    let mut best: Option<(usize, Node<'t>)> = None;
    for &node in decls {
        if node.start_byte() <= comment_end {
            continue;
        }
        let distance = node.start_byte() - comment_end;
        match best {
            Some((d, _)) if d <= distance => {}
            _ => best = Some((distance, node)),
        }
    }
    best.map(|(_, node)| node)
}

/// Attach to each block the declaration that follows it.
pub fn associate_doc_blocks(blocks: &mut [DocBlock], tree: &Tree, source: &str, language: &Language) {
    let decls = declarations(tree, source, language);
    for block in blocks.iter_mut() {
        let Some(node) = nearest_following(&decls, block.end_byte) else {
            continue;
        };
        let symbol_name = block
            .name_override
            .clone()
            .unwrap_or_else(|| symbol_name(node, source));
        debug!(
            line = block.location.line,
            symbol = %symbol_name,
            kind = node.kind(),
            "associated doc block"
        );
        block.association = Some(Association {
            symbol_name,
            symbol_kind: node.kind().to_string(),
            scope: scope_path(node, source),
            start_byte: node.start_byte(),
            start_line: node.start_position().row + 1,
        });
    }
}

fn block_end_line(block: &DocBlock) -> usize {
    block.location.line + block.raw_text.lines().count().saturating_sub(1)
}

/// Give undocumented constructs the raw text of their doc block. Returns
/// how many were filled.
///
/// The query only sees definitions and type declarations. When another
/// construct (a prototype, usually) starts between the block and the
/// associated declaration, the block documents that construct instead.
pub fn attach_associated_docs(constructs: &mut [Construct], blocks: &[DocBlock]) -> usize {
    let mut attached = 0;
    for block in blocks {
        let Some(assoc) = &block.association else {
            continue;
        };
        let end_line = block_end_line(block);
        let intervening = constructs
            .iter()
            .enumerate()
            .filter(|(_, c)| c.span.start_line > end_line && c.span.start_line < assoc.start_line)
            .min_by_key(|(_, c)| c.span.start_line)
            .map(|(i, _)| i);

        let target = match intervening {
            Some(i) => Some(&mut constructs[i]).filter(|c| !c.has_doc()),
            None => constructs.iter_mut().find(|c| {
                !c.has_doc()
                    && c.span.start_line == assoc.start_line
                    && (assoc.symbol_name.is_empty()
                        || c.qualified_name.ends_with(assoc.symbol_name.as_str()))
            }),
        };
        if let Some(construct) = target {
            construct.doc_comment = Some(block.raw_text.clone());
            attached += 1;
        }
    }
    attached
}
