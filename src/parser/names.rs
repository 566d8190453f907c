//! Name recovery from raw declarator or definition text.
//!
//! Used when the syntax tree does not hand over a clean identifier node:
//! operators, destructors, and declarators the grammar only partially
//! structured. Every function here works on plain text and can be tried
//! independently of the others.

const OPERATOR: &str = "operator";

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Split `a::b::c` on the last `::` into (`a::b`, `c`).
/// Without `::` the scope part is empty.
pub fn split_qualified(name: &str) -> (&str, &str) {
    match name.rfind("::") {
        Some(pos) => (&name[..pos], &name[pos + 2..]),
        None => ("", name),
    }
}

/// Join a scope and a name with `::`, or return the name alone at global scope.
pub fn qualify(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{}::{}", scope, name)
    }
}

/// Position of the `operator` keyword, ignoring identifiers that merely
/// contain it (`operatorCount`, `my_operator`).
fn find_operator(text: &str) -> Option<usize> {
    text.match_indices(OPERATOR).map(|(pos, _)| pos).find(|&pos| {
        let before = text[..pos].chars().next_back();
        let after = text[pos + OPERATOR.len()..].chars().next();
        !before.is_some_and(is_ident_char) && !after.is_some_and(is_ident_char)
    })
}

/// Byte index of the `(` that opens the parameter list.
///
/// For `operator()` the first parenthesis pair belongs to the name.
fn parameter_list_start(text: &str) -> Option<usize> {
    let Some(op) = find_operator(text) else {
        return text.find('(');
    };
    let after = op + OPERATOR.len();
    let rest = &text[after..];
    let trimmed = rest.trim_start();
    let from = if trimmed.starts_with("()") {
        after + (rest.len() - trimmed.len()) + 2
    } else {
        after
    };
    text[from..].find('(').map(|i| from + i)
}

/// The run of identifier characters (and `~`) at the end of `text`.
fn trailing_identifier(text: &str) -> &str {
    let start = text
        .char_indices()
        .rev()
        .take_while(|&(_, c)| is_ident_char(c) || c == '~')
        .last()
        .map_or(text.len(), |(i, _)| i);
    &text[start..]
}

/// Drop a trailing template argument list: `max<int>` → `max`.
fn strip_template_args(text: &str) -> &str {
    if !text.ends_with('>') {
        return text;
    }
    let mut depth = 0usize;
    for (i, c) in text.char_indices().rev() {
        match c {
            '>' => depth += 1,
            '<' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return text[..i].trim_end();
                }
            }
            _ => {}
        }
    }
    text
}

/// `Outer::Inner::` immediately before `pos`, if any.
fn qualifier_before(text: &str, pos: usize) -> &str {
    let head = &text[..pos];
    if !head.ends_with("::") {
        return "";
    }
    let start = head
        .char_indices()
        .rev()
        .take_while(|&(_, c)| is_ident_char(c) || c == ':')
        .last()
        .map_or(pos, |(i, _)| i);
    &text[start..pos]
}

/// Operator name from the text of a whole definition or declarator:
/// from the `operator` keyword up to the parameter list, right-trimmed.
pub fn operator_name(text: &str) -> Option<String> {
    let op = find_operator(text)?;
    let end = parameter_list_start(text).unwrap_or(text.len());
    if end <= op {
        return None;
    }
    Some(text[op..end].trim_end().to_string())
}

/// Function name from declarator text such as `Foo::bar(int x) const`.
///
/// Qualified names come back whole (`Foo::operator=`), operator names from
/// the keyword on (`operator[]`), anything else as the trailing identifier
/// before the parameter list (`~Foo`, `someFunction`).
pub fn function_name_from_text(text: &str) -> Option<String> {
    let end = parameter_list_start(text).unwrap_or(text.len());
    let before = text[..end].trim_end();
    if before.is_empty() {
        return None;
    }
    // `f<std::string>` names `f`; operators keep their `<` and `>`
    let before = match find_operator(before) {
        Some(_) => before,
        None => strip_template_args(before),
    };
    if before.contains("::") {
        return Some(before.trim_start_matches("::").to_string());
    }
    if let Some(op) = find_operator(before) {
        return Some(before[op..].to_string());
    }
    let name = trailing_identifier(before);
    (!name.is_empty()).then(|| name.to_string())
}

/// Function name from the full text of a definition that has no usable
/// declarator node. The class qualifier directly before the name is kept
/// (`Foo::~Foo`, `Foo::operator=`).
pub fn name_from_definition_text(text: &str) -> Option<String> {
    if let Some(op) = find_operator(text) {
        let name = operator_name(text)?;
        return Some(format!("{}{}", qualifier_before(text, op), name));
    }
    let paren = text.find('(')?;
    let before = strip_template_args(text[..paren].trim_end());
    let name = trailing_identifier(before);
    if name.is_empty() {
        return None;
    }
    let start = before.len() - name.len();
    Some(format!("{}{}", qualifier_before(before, start), name))
}
