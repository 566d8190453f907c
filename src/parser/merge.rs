//! Cross-file merge: collapse occurrences of the same qualified name.
//!
//! A method declared in a header and defined in a source file is extracted
//! twice. Merging keeps one record per qualified name, seeded from the first
//! occurrence, with every location and doc comment collected. Differences
//! between occurrences are reported as conflicts and never block the merge.

use crate::model::{Construct, ConstructKind, MergeState};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

/// What two occurrences of one construct disagree on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictKind {
    /// Both carry a doc comment and the texts differ.
    DifferingDocs { first: String, other: String },
    ParameterCount { expected: usize, found: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub qualified_name: String,
    pub kind: ConflictKind,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ConflictKind::DifferingDocs { first, other } => write!(
                f,
                "{}: different docstring content in {} vs {}",
                self.qualified_name, first, other
            ),
            ConflictKind::ParameterCount { expected, found } => write!(
                f,
                "{}: parameter count mismatch ({} vs {})",
                self.qualified_name, expected, found
            ),
        }
    }
}

#[derive(Debug, Default)]
pub struct MergeOutcome {
    pub constructs: Vec<Construct>,
    pub conflicts: Vec<Conflict>,
}

/// Merge constructs that share a qualified name.
///
/// Groups come out in first-seen order; constructs without a qualified name
/// are never merged and are appended after all groups.
pub fn merge(constructs: Vec<Construct>) -> MergeOutcome {
    let mut groups: HashMap<String, Vec<Construct>> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    let mut standalone: Vec<Construct> = Vec::new();

    for construct in constructs {
        if construct.qualified_name.is_empty() {
            standalone.push(construct);
            continue;
        }
        match groups.entry(construct.qualified_name.clone()) {
            Entry::Occupied(mut e) => e.get_mut().push(construct),
            Entry::Vacant(e) => {
                order.push(e.key().clone());
                e.insert(vec![construct]);
            }
        }
    }

    let mut outcome = MergeOutcome::default();
    for name in order {
        let Some(group) = groups.remove(&name) else {
            continue;
        };
        if group.len() == 1 {
            outcome.constructs.extend(group);
            continue;
        }
        if let Some(merged) = merge_group(group, &mut outcome.conflicts) {
            outcome.constructs.push(merged);
        }
    }
    outcome.constructs.extend(standalone);
    outcome
}

/// Collapse one group into a single record seeded from its first member.
fn merge_group(group: Vec<Construct>, conflicts: &mut Vec<Conflict>) -> Option<Construct> {
    let mut iter = group.into_iter();
    let mut merged = iter.next()?;
    merged.merge = MergeState {
        is_merged: true,
        source_locations: vec![merged.location()],
        doc_fragments: Vec::new(),
    };
    if let Some(doc) = merged.doc_comment.clone().filter(|d| !d.is_empty()) {
        merged.merge.doc_fragments.push(doc);
    }

    for other in iter {
        merged.merge.source_locations.push(other.location());
        for kind in detect_conflicts(&merged, &other) {
            let conflict = Conflict {
                qualified_name: merged.qualified_name.clone(),
                kind,
            };
            warn!("merge conflict: {}", conflict);
            conflicts.push(conflict);
        }
        absorb(&mut merged, other);
    }

    if !merged.merge.doc_fragments.is_empty() {
        merged.doc_comment = Some(merged.merge.doc_fragments.join("\n\n"));
    }
    Some(merged)
}

/// Take what the seed lacks from a later occurrence.
fn absorb(merged: &mut Construct, other: Construct) {
    if merged.kind == ConstructKind::Function && other.kind != ConstructKind::Function {
        // a declaration inside the class body knows it is a member
        merged.kind = other.kind;
    }
    if merged.visibility.is_empty() {
        merged.visibility = other.visibility;
    }
    if merged.base_types.is_empty() {
        merged.base_types = other.base_types;
    }
    if let Some(doc) = other.doc_comment.filter(|d| !d.is_empty()) {
        merged.merge.doc_fragments.push(doc);
    }
}

/// Compare an occurrence against the record it is merging into.
fn detect_conflicts(merged: &Construct, other: &Construct) -> Vec<ConflictKind> {
    let mut found = Vec::new();
    if let (Some(a), Some(b)) = (&merged.doc_comment, &other.doc_comment) {
        if !a.is_empty() && !b.is_empty() && a != b {
            found.push(ConflictKind::DifferingDocs {
                first: merged.location(),
                other: other.location(),
            });
        }
    }
    if merged.parameters.len() != other.parameters.len() {
        found.push(ConflictKind::ParameterCount {
            expected: merged.parameters.len(),
            found: other.parameters.len(),
        });
    }
    found
}

/// Key that pairs a header with its implementation file.
/// "include/json.hpp" → "json", "src/json.cpp" → "json"
pub fn companion_key(path: &str) -> String {
    let filename = path.rsplit(['/', '\\']).next().unwrap_or(path);
    match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => filename.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Parameter, Span};

    fn construct(qualified: &str, file: &str, line: usize, doc: Option<&str>) -> Construct {
        let mut c = Construct::new(ConstructKind::Function, file);
        let (scope, name) = crate::parser::names::split_qualified(qualified);
        c.set_name(scope, name);
        c.span = Span {
            start_line: line,
            end_line: line,
        };
        c.doc_comment = doc.map(str::to_string);
        c
    }

    fn int_param(name: &str) -> Parameter {
        Parameter {
            type_name: "int".into(),
            name: name.into(),
            default_value: None,
        }
    }

    #[test]
    fn distinct_names_pass_through_unchanged() {
        let input = vec![
            construct("a", "x.cpp", 1, Some("A")),
            construct("N::b", "x.cpp", 5, None),
            construct("c", "y.cpp", 2, None),
        ];
        let outcome = merge(input.clone());
        assert_eq!(outcome.constructs, input);
        assert!(outcome.conflicts.is_empty());
    }

    #[test]
    fn docs_are_concatenated_in_order() {
        let outcome = merge(vec![
            construct("C::m", "c.hpp", 3, Some("A")),
            construct("C::m", "c.cpp", 10, Some("B")),
        ]);
        assert_eq!(outcome.constructs.len(), 1);

        let m = &outcome.constructs[0];
        assert_eq!(m.doc_comment.as_deref(), Some("A\n\nB"));
        assert!(m.merge.is_merged);
        assert_eq!(m.merge.source_locations, vec!["c.hpp:3", "c.cpp:10"]);
        assert_eq!(m.source_file, "c.hpp");
    }

    #[test]
    fn undocumented_occurrence_adds_no_fragment() {
        let outcome = merge(vec![
            construct("f", "f.hpp", 1, None),
            construct("f", "f.cpp", 4, Some("Only here")),
        ]);
        let f = &outcome.constructs[0];
        assert_eq!(f.doc_comment.as_deref(), Some("Only here"));
        assert!(outcome.conflicts.is_empty());
    }

    #[test]
    fn conflicts_are_reported_without_blocking() {
        let mut decl = construct("C::m", "c.hpp", 3, Some("A"));
        decl.parameters = vec![int_param("x")];
        let mut def = construct("C::m", "c.cpp", 10, Some("B"));
        def.parameters = vec![int_param("x"), int_param("y")];

        let outcome = merge(vec![decl, def]);
        assert_eq!(outcome.constructs.len(), 1);
        assert_eq!(outcome.constructs[0].parameters.len(), 1);
        assert_eq!(
            outcome.conflicts,
            vec![
                Conflict {
                    qualified_name: "C::m".into(),
                    kind: ConflictKind::DifferingDocs {
                        first: "c.hpp:3".into(),
                        other: "c.cpp:10".into(),
                    },
                },
                Conflict {
                    qualified_name: "C::m".into(),
                    kind: ConflictKind::ParameterCount {
                        expected: 1,
                        found: 2,
                    },
                },
            ]
        );
        assert_eq!(
            outcome.conflicts[1].to_string(),
            "C::m: parameter count mismatch (1 vs 2)"
        );
    }

    #[test]
    fn identical_docs_do_not_conflict() {
        let outcome = merge(vec![
            construct("f", "f.hpp", 1, Some("Same")),
            construct("f", "f.cpp", 4, Some("Same")),
        ]);
        assert!(outcome.conflicts.is_empty());
        assert_eq!(outcome.constructs[0].doc_comment.as_deref(), Some("Same\n\nSame"));
    }

    #[test]
    fn unnamed_constructs_are_never_merged() {
        let outcome = merge(vec![
            construct("", "a.cpp", 1, None),
            construct("f", "a.cpp", 2, None),
            construct("", "a.cpp", 3, None),
        ]);
        let lines: Vec<usize> = outcome.constructs.iter().map(|c| c.span.start_line).collect();
        assert_eq!(lines, vec![2, 1, 3]);
        assert!(outcome.constructs.iter().all(|c| !c.merge.is_merged));
    }

    #[test]
    fn member_kind_from_later_occurrence() {
        let def = construct("C::m", "c.cpp", 10, None);
        let mut decl = construct("C::m", "c.hpp", 3, None);
        decl.kind = ConstructKind::Method;
        decl.visibility = "public".into();

        let outcome = merge(vec![def, decl]);
        let m = &outcome.constructs[0];
        assert_eq!(m.kind, ConstructKind::Method);
        assert_eq!(m.visibility, "public");
        assert_eq!(m.source_file, "c.cpp");
    }

    #[test]
    fn companion_keys() {
        assert_eq!(companion_key("include/json.hpp"), "json");
        assert_eq!(companion_key("src/json.cpp"), "json");
        assert_eq!(companion_key("Makefile"), "Makefile");
        assert_eq!(companion_key(".hidden"), ".hidden");
    }
}
