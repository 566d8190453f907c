//! Construct extraction: a pre-order walk over the syntax tree.
//!
//! Function definitions, function declarations, classes, structs, enums and
//! namespaces become `Construct`s. The enclosing scope is threaded down the
//! walk and function bodies are never entered. Extraction does not fail:
//! whatever cannot be recovered is left empty.

use super::names;
use crate::model::{Construct, ConstructKind, Parameter, Span};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;
use tree_sitter::{Node, Tree};

static RE_DELETED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"=\s*delete\b").unwrap());

/// How far before a construct to look for its `/** */` comment.
const DOC_WINDOW: usize = 100;

const RETURN_TYPE_KINDS: &[&str] = &[
    "primitive_type",
    "type_identifier",
    "qualified_identifier",
    "template_type",
    "sized_type_specifier",
    "placeholder_type_specifier",
];

const NAME_KINDS: &[&str] = &[
    "identifier",
    "field_identifier",
    "destructor_name",
    "operator_name",
];

const BASE_TYPE_KINDS: &[&str] = &[
    "type_identifier",
    "qualified_identifier",
    "qualified_type_identifier",
    "template_type",
];

/// Extract every construct in `tree`, in source order.
pub fn extract_constructs(tree: &Tree, source: &str, file: &str) -> Vec<Construct> {
    let mut extractor = Extractor {
        source,
        file,
        constructs: Vec::new(),
    };
    extractor.visit(tree.root_node(), "", None);
    debug!(file, count = extractor.constructs.len(), "extracted constructs");
    extractor.constructs
}

/// The `/** ... */` comment ending shortly before `start`, if nothing but
/// a declaration prefix (template header, attributes) sits in between.
pub fn nearby_doc_comment(source: &str, start: usize) -> Option<String> {
    let start = start.min(source.len());
    let mut lo = start.saturating_sub(DOC_WINDOW);
    while !source.is_char_boundary(lo) {
        lo += 1;
    }
    let open = lo + source.get(lo..start)?.rfind("/**")?;
    if source[open..].starts_with("/**/") {
        return None;
    }
    let close = open + 2 + source[open + 2..].find("*/")?;
    if close >= start {
        return None;
    }
    let between = &source[close + 2..start];
    if between.contains([';', '{', '}']) {
        return None;
    }
    Some(source[open..close + 2].to_string())
}

fn children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

fn child_of_kind<'t>(node: Node<'t>, kinds: &[&str]) -> Option<Node<'t>> {
    children(node).into_iter().find(|c| kinds.contains(&c.kind()))
}

/// The declarator one level inside a pointer or reference declarator.
fn inner_declarator(node: Node<'_>) -> Option<Node<'_>> {
    node.child_by_field_name("declarator").or_else(|| {
        let mut cursor = node.walk();
        let inner = node
            .named_children(&mut cursor)
            .filter(|c| c.kind() != "type_qualifier")
            .last();
        inner
    })
}

/// Follow the `declarator` field through pointer and reference declarators
/// (`Foo& get()`, `char* name()`) to the function declarator.
pub(crate) fn find_function_declarator(node: Node<'_>) -> Option<Node<'_>> {
    let mut current = node.child_by_field_name("declarator")?;
    loop {
        match current.kind() {
            "function_declarator" => {
                return Some(returned_pointer_declarator(current).unwrap_or(current))
            }
            "pointer_declarator" | "reference_declarator" => current = inner_declarator(current)?,
            _ => return None,
        }
    }
}

/// In `int (*get_handler())(int)` the outer declarator describes the
/// returned function pointer; the function itself is declared inside the
/// parentheses.
fn returned_pointer_declarator(declarator: Node<'_>) -> Option<Node<'_>> {
    let wrapped = declarator.child_by_field_name("declarator")?;
    if wrapped.kind() != "parenthesized_declarator" {
        return None;
    }
    let mut current = wrapped.named_child(0)?;
    loop {
        match current.kind() {
            "function_declarator" => return Some(current),
            "pointer_declarator" | "reference_declarator" | "parenthesized_declarator" => {
                current = inner_declarator(current)?
            }
            _ => return None,
        }
    }
}

/// `void (*callback)(int)` declares a variable, not a function.
fn is_function_pointer(declarator: Node<'_>) -> bool {
    declarator
        .child_by_field_name("declarator")
        .is_some_and(|d| d.kind() == "parenthesized_declarator")
}

fn refine_kind(name: &str, scope: &str, is_member: bool) -> ConstructKind {
    let (_, enclosing) = names::split_qualified(scope);
    let enclosing = enclosing.split('<').next().unwrap_or(enclosing);
    if name.starts_with('~') {
        ConstructKind::Destructor
    } else if !enclosing.is_empty() && name == enclosing {
        ConstructKind::Constructor
    } else if is_member {
        ConstructKind::Method
    } else {
        ConstructKind::Function
    }
}

struct Extractor<'a> {
    source: &'a str,
    file: &'a str,
    constructs: Vec<Construct>,
}

impl<'a> Extractor<'a> {
    fn text(&self, node: Node<'_>) -> &'a str {
        self.source
            .get(node.start_byte()..node.end_byte())
            .unwrap_or("")
    }

    /// `member` carries the current visibility while walking a class body.
    fn visit(&mut self, node: Node<'_>, scope: &str, member: Option<&str>) {
        match node.kind() {
            "function_definition" => {
                if RE_DELETED.is_match(self.text(node)) {
                    debug!(line = node.start_position().row + 1, "skipping deleted function");
                    return;
                }
                self.extract_function(node, scope, member);
            }
            "declaration" | "field_declaration" => match find_function_declarator(node) {
                Some(declarator) => {
                    if !RE_DELETED.is_match(self.text(node)) && !is_function_pointer(declarator) {
                        self.extract_declaration(node, declarator, scope, member);
                    }
                }
                None => self.visit_children(node, scope, member),
            },
            "function_declarator" => {
                if !is_function_pointer(node) {
                    let outer = node.parent().unwrap_or(node);
                    self.extract_declaration(outer, node, scope, member);
                }
            }
            "class_specifier" | "struct_specifier" => self.extract_class(node, scope, member),
            "enum_specifier" => {
                if node.child_by_field_name("body").is_some() {
                    let name = self.field_text(node, "name");
                    if !name.is_empty() {
                        let c = self.construct(ConstructKind::Enum, node, scope, name, member);
                        self.push(c);
                    }
                }
                self.visit_children(node, scope, None);
            }
            "namespace_definition" => {
                let name = self.field_text(node, "name");
                let mut inner = scope.to_string();
                if !name.is_empty() {
                    let c = self.construct(ConstructKind::Namespace, node, scope, name, None);
                    inner = c.qualified_name.clone();
                    self.push(c);
                }
                self.visit_children(node, &inner, None);
            }
            _ => self.visit_children(node, scope, member),
        }
    }

    fn visit_children(&mut self, node: Node<'_>, scope: &str, member: Option<&str>) {
        for child in children(node) {
            self.visit(child, scope, member);
        }
    }

    /// Walk a class body, tracking `public:` / `protected:` / `private:`.
    fn visit_members(&mut self, body: Node<'_>, scope: &str, default_visibility: &str) {
        let mut visibility = default_visibility.to_string();
        for child in children(body) {
            if child.kind() == "access_specifier" {
                visibility = self.text(child).trim_end_matches(':').trim().to_string();
            } else {
                self.visit(child, scope, Some(visibility.as_str()));
            }
        }
    }

    fn field_text(&self, node: Node<'_>, field: &str) -> &'a str {
        node.child_by_field_name(field)
            .map_or("", |n| self.text(n).trim())
    }

    fn push(&mut self, construct: Construct) {
        debug!(
            kind = %construct.kind,
            name = %construct.qualified_name,
            line = construct.span.start_line,
            "found construct"
        );
        self.constructs.push(construct);
    }

    /// A construct named `raw_name`. A qualified `raw_name` (`Foo::bar`)
    /// overrides the structural scope.
    fn construct(
        &self,
        kind: ConstructKind,
        node: Node<'_>,
        scope: &str,
        raw_name: &str,
        member: Option<&str>,
    ) -> Construct {
        let raw_name = raw_name.trim();
        let (qualifier, name) = names::split_qualified(raw_name);
        let scope = if raw_name.contains("::") { qualifier } else { scope };

        let mut c = Construct::new(kind, self.file);
        c.set_name(scope, name);
        c.span = Span {
            start_line: node.start_position().row + 1,
            end_line: node.end_position().row + 1,
        };
        c.visibility = member.unwrap_or_default().to_string();
        c.doc_comment = nearby_doc_comment(self.source, node.start_byte());
        c
    }

    // -- Classes -----------------------------------------------------------------

    fn extract_class(&mut self, node: Node<'_>, scope: &str, member: Option<&str>) {
        let Some(body) = node.child_by_field_name("body") else {
            // forward declaration or a type reference like `struct S s;`
            self.visit_children(node, scope, member);
            return;
        };
        let (kind, default_visibility) = if node.kind() == "class_specifier" {
            (ConstructKind::Class, "private")
        } else {
            (ConstructKind::Struct, "public")
        };

        let name = self.field_text(node, "name");
        let mut inner = scope.to_string();
        if !name.is_empty() {
            let mut c = self.construct(kind, node, scope, name, member);
            c.base_types = self.base_types(node);
            inner = c.qualified_name.clone();
            self.push(c);
        }

        for child in children(node) {
            if child.id() == body.id() {
                self.visit_members(child, &inner, default_visibility);
            } else {
                self.visit(child, &inner, None);
            }
        }
    }

    fn base_types(&self, node: Node<'_>) -> Vec<String> {
        let Some(clause) = child_of_kind(node, &["base_class_clause"]) else {
            return Vec::new();
        };
        let mut cursor = clause.walk();
        let bases = clause
            .named_children(&mut cursor)
            .filter(|c| BASE_TYPE_KINDS.contains(&c.kind()))
            .map(|c| self.text(c).to_string())
            .collect();
        bases
    }

    // -- Functions ---------------------------------------------------------------

    fn extract_function(&mut self, node: Node<'_>, scope: &str, member: Option<&str>) {
        let declarator = find_function_declarator(node);
        let raw_name = match declarator {
            Some(d) => self.declarator_name(node, d),
            None => names::name_from_definition_text(self.text(node)),
        }
        .unwrap_or_default();

        let mut c = self.construct(ConstructKind::Function, node, scope, &raw_name, member);
        self.fill_signature(&mut c, node, declarator, member.is_some());
        self.push(c);
    }

    /// A function declared without a body; `outer` is the enclosing
    /// declaration, which holds the return type.
    fn extract_declaration(
        &mut self,
        outer: Node<'_>,
        declarator: Node<'_>,
        scope: &str,
        member: Option<&str>,
    ) {
        let raw_name = self.declarator_name(outer, declarator).unwrap_or_default();
        let mut c = self.construct(ConstructKind::Function, outer, scope, &raw_name, member);
        self.fill_signature(&mut c, outer, Some(declarator), member.is_some());
        self.push(c);
    }

    fn fill_signature(
        &self,
        c: &mut Construct,
        node: Node<'_>,
        declarator: Option<Node<'_>>,
        is_member: bool,
    ) {
        c.kind = refine_kind(&c.name, &c.enclosing_scope, is_member);
        c.return_type = Some(self.return_type(node));
        if let Some(d) = declarator {
            c.parameters = self.parameters(d);
        }
    }

    /// Name recovery, most reliable source first: a qualified identifier,
    /// an operator scan when the declarator text is degenerate, the
    /// declarator text, and finally any identifier child.
    fn declarator_name(&self, definition: Node<'_>, declarator: Node<'_>) -> Option<String> {
        if let Some(qualified) = child_of_kind(declarator, &["qualified_identifier"]) {
            return Some(self.text(qualified).to_string());
        }
        let text = self.text(declarator).trim();
        let recovered = if text.is_empty() || text == "()" {
            names::operator_name(self.text(definition))
        } else {
            names::function_name_from_text(text)
        };
        recovered.filter(|n| !n.is_empty()).or_else(|| {
            child_of_kind(declarator, NAME_KINDS).map(|n| self.text(n).to_string())
        })
    }

    /// First type-like child before the declarator, plus any `*` / `&`
    /// from declarators wrapping the function declarator. Defaults to `void`.
    fn return_type(&self, node: Node<'_>) -> String {
        let base = children(node)
            .into_iter()
            .take_while(|c| c.kind() != "function_declarator")
            .find(|c| RETURN_TYPE_KINDS.contains(&c.kind()));
        let Some(base) = base else {
            return "void".to_string();
        };

        let mut ty = self.text(base).to_string();
        if let Some(outer) = node
            .child_by_field_name("declarator")
            .filter(|d| d.kind() == "function_declarator")
        {
            if returned_pointer_declarator(outer).is_some() {
                let params = outer
                    .child_by_field_name("parameters")
                    .map_or("()", |p| self.text(p));
                ty.push_str(" (*)");
                ty.push_str(params);
                return ty;
            }
        }
        let mut current = node.child_by_field_name("declarator");
        while let Some(d) = current {
            match d.kind() {
                "pointer_declarator" => ty.push('*'),
                "reference_declarator" => ty.push_str(self.reference_token(d)),
                _ => break,
            }
            current = inner_declarator(d);
        }
        ty
    }

    fn reference_token(&self, node: Node<'_>) -> &'a str {
        children(node).first().map_or("&", |t| self.text(*t))
    }

    // -- Parameters --------------------------------------------------------------

    fn parameters(&self, declarator: Node<'_>) -> Vec<Parameter> {
        let Some(list) = declarator
            .child_by_field_name("parameters")
            .or_else(|| child_of_kind(declarator, &["parameter_list"]))
        else {
            return Vec::new();
        };
        let params: Vec<Parameter> = children(list)
            .into_iter()
            .filter(|p| {
                matches!(
                    p.kind(),
                    "parameter_declaration" | "optional_parameter_declaration"
                )
            })
            .map(|p| self.parameter(p))
            .collect();

        // `f(void)` takes no parameters
        if let [only] = params.as_slice() {
            if only.type_name == "void" && only.name.is_empty() {
                return Vec::new();
            }
        }
        params
    }

    fn parameter(&self, node: Node<'_>) -> Parameter {
        let mut type_name = String::new();
        for qualifier in children(node)
            .into_iter()
            .filter(|c| c.kind() == "type_qualifier")
        {
            type_name.push_str(self.text(qualifier));
            type_name.push(' ');
        }
        let type_node = node
            .child_by_field_name("type")
            .or_else(|| children(node).first().copied());
        type_name.push_str(type_node.map_or("", |t| self.text(t)));

        let (suffix, name) = node
            .child_by_field_name("declarator")
            .map(|d| self.declarator_parts(d))
            .unwrap_or_default();
        type_name.push_str(&suffix);

        Parameter {
            type_name: type_name.trim().to_string(),
            name,
            default_value: node
                .child_by_field_name("default_value")
                .map(|v| self.text(v).to_string()),
        }
    }

    /// Type suffix and name of a parameter declarator:
    /// `*out` → (`*`, `out`), `&&value` → (`&&`, `value`), `buf[]` → (`[]`, `buf`).
    fn declarator_parts(&self, node: Node<'_>) -> (String, String) {
        match node.kind() {
            "identifier" | "field_identifier" => (String::new(), self.text(node).to_string()),
            "pointer_declarator" | "abstract_pointer_declarator" => self.wrapped_parts(node, "*"),
            "reference_declarator" | "abstract_reference_declarator" => {
                self.wrapped_parts(node, self.reference_token(node))
            }
            "array_declarator" | "abstract_array_declarator" => {
                let (suffix, name) = inner_declarator(node)
                    .map(|inner| self.declarator_parts(inner))
                    .unwrap_or_default();
                (format!("{}[]", suffix), name)
            }
            _ => (String::new(), self.first_identifier(node).unwrap_or_default()),
        }
    }

    fn wrapped_parts(&self, node: Node<'_>, token: &str) -> (String, String) {
        match inner_declarator(node) {
            Some(inner) => {
                let (suffix, name) = self.declarator_parts(inner);
                (format!("{}{}", token, suffix), name)
            }
            None => (token.to_string(), String::new()),
        }
    }

    fn first_identifier(&self, node: Node<'_>) -> Option<String> {
        if node.kind() == "identifier" {
            return Some(self.text(node).to_string());
        }
        children(node)
            .into_iter()
            .find_map(|c| self.first_identifier(c))
    }
}
