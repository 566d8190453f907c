//! Data model for extracted documentation: grammar-agnostic.
//!
//! Nothing here borrows from a syntax tree: constructs and comment blocks
//! carry byte offsets and line numbers only, so trees can be dropped as soon
//! as a file has been extracted.

use crate::parser::names::qualify;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Category of an extracted construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstructKind {
    Function,
    Method,
    Class,
    Struct,
    Enum,
    Variable,
    Namespace,
    Constructor,
    Destructor,
}

impl ConstructKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ConstructKind::Function => "function",
            ConstructKind::Method => "method",
            ConstructKind::Class => "class",
            ConstructKind::Struct => "struct",
            ConstructKind::Enum => "enum",
            ConstructKind::Variable => "variable",
            ConstructKind::Namespace => "namespace",
            ConstructKind::Constructor => "constructor",
            ConstructKind::Destructor => "destructor",
        }
    }

    /// Kinds that have a parameter list and a signature.
    pub fn is_callable(self) -> bool {
        matches!(
            self,
            ConstructKind::Function
                | ConstructKind::Method
                | ConstructKind::Constructor
                | ConstructKind::Destructor
        )
    }
}

impl fmt::Display for ConstructKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single function parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Parameter {
    #[serde(rename = "type")]
    pub type_name: String,
    /// Empty for unnamed parameters.
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

/// 1-based, inclusive line range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Span {
    pub start_line: usize,
    pub end_line: usize,
}

/// Bookkeeping filled in when several occurrences collapse into one record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeState {
    pub is_merged: bool,
    /// `file:start_line` for every occurrence, in input order.
    pub source_locations: Vec<String>,
    /// Non-empty doc comments of the occurrences, in input order.
    pub doc_fragments: Vec<String>,
}

/// One extracted code construct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Construct {
    pub kind: ConstructKind,
    pub name: String,
    /// `enclosing_scope::name`, or just `name` at global scope.
    pub qualified_name: String,
    pub enclosing_scope: String,
    pub return_type: Option<String>,
    pub parameters: Vec<Parameter>,
    pub base_types: Vec<String>,
    /// Empty when unknown.
    pub visibility: String,
    pub doc_comment: Option<String>,
    pub span: Span,
    pub source_file: String,
    pub merge: MergeState,
}

impl Construct {
    pub fn new(kind: ConstructKind, source_file: impl Into<String>) -> Self {
        Construct {
            kind,
            name: String::new(),
            qualified_name: String::new(),
            enclosing_scope: String::new(),
            return_type: None,
            parameters: Vec::new(),
            base_types: Vec::new(),
            visibility: String::new(),
            doc_comment: None,
            span: Span::default(),
            source_file: source_file.into(),
            merge: MergeState::default(),
        }
    }

    /// Set scope and name together so `qualified_name` always agrees with them.
    pub fn set_name(&mut self, scope: &str, name: &str) {
        self.enclosing_scope = scope.to_string();
        self.name = name.to_string();
        self.qualified_name = if name.is_empty() {
            String::new()
        } else {
            qualify(scope, name)
        };
    }

    /// `file:start_line` of this occurrence.
    pub fn location(&self) -> String {
        format!("{}:{}", self.source_file, self.span.start_line)
    }

    /// Every source file that contributed to this record.
    pub fn contributing_files(&self) -> Vec<&str> {
        if !self.merge.is_merged {
            return vec![self.source_file.as_str()];
        }
        let mut files: Vec<&str> = Vec::new();
        for loc in &self.merge.source_locations {
            let file = loc.rsplit_once(':').map_or(loc.as_str(), |(file, _)| file);
            if !files.contains(&file) {
                files.push(file);
            }
        }
        files
    }

    pub fn has_doc(&self) -> bool {
        self.doc_comment.as_deref().is_some_and(|d| !d.is_empty())
    }
}

/// Where a comment block starts in its file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    /// 1-based
    pub line: usize,
    /// 1-based, in bytes
    pub column: usize,
    pub byte_offset: usize,
}

/// The declaration a comment block was matched to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Association {
    pub symbol_name: String,
    /// Grammar node kind of the declaration, e.g. `function_definition`.
    pub symbol_kind: String,
    pub scope: String,
    pub start_byte: usize,
    /// 1-based
    pub start_line: usize,
}

/// A parsed documentation comment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocBlock {
    pub raw_text: String,
    pub description: String,
    /// @param name → description
    pub params: BTreeMap<String, String>,
    pub returns: String,
    /// Remaining tags as `name: value` (or `name` when valueless).
    pub tags: Vec<String>,
    /// @class / @struct / @enum
    pub name_override: Option<String>,
    pub location: SourceLocation,
    pub end_byte: usize,
    pub association: Option<Association>,
}
