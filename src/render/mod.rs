//! Renderer module: trait-based format dispatch and snippet file naming.

pub mod json;
pub mod markdown;

use crate::error::{Error, Result};
use crate::model::Construct;
use std::path::Path;

/// Trait for rendering one construct into a specific output format.
pub trait Renderer {
    fn render(&self, construct: &Construct) -> String;
    fn file_extension(&self) -> &str;
}

/// Create a renderer for the given format name.
pub fn create_renderer(format: &str) -> Result<Box<dyn Renderer>> {
    match format {
        "markdown" | "md" => Ok(Box::new(markdown::MarkdownRenderer)),
        "json" => Ok(Box::new(json::JsonRenderer)),
        _ => Err(Error::UnknownFormat(format.to_string())),
    }
}

/// File name (without extension) of the snippet rendered for `construct`.
///
/// `ns::Type::method` becomes `ns.Type.method`; characters that are unsafe
/// in file names are spelled out so distinct names never collide.
pub fn output_file_stem(construct: &Construct) -> String {
    let name = if !construct.qualified_name.is_empty() {
        construct.qualified_name.clone()
    } else if !construct.name.is_empty() {
        construct.name.clone()
    } else {
        let stem = Path::new(&construct.source_file)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!(
            "unnamed_{}_{}_{}",
            construct.kind, stem, construct.span.start_line
        )
    };

    let mut out = String::with_capacity(name.len());
    for ch in name.replace("::", ".").chars() {
        match ch {
            ':' => out.push_str("%colon"),
            '<' => out.push_str("%lt"),
            '>' => out.push_str("%gt"),
            '"' => out.push_str("%quote"),
            '|' => out.push_str("%pipe"),
            '?' => out.push_str("%quest"),
            '*' => out.push_str("%star"),
            '\\' => out.push_str("%bslash"),
            '/' => out.push_str("%slash"),
            ' ' => out.push('_'),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConstructKind, Span};

    fn named(qualified: &str) -> Construct {
        let mut c = Construct::new(ConstructKind::Function, "src/a.cpp");
        let (scope, name) = crate::parser::names::split_qualified(qualified);
        c.set_name(scope, name);
        c
    }

    #[test]
    fn stems() {
        assert_eq!(output_file_stem(&named("ns::Type::get")), "ns.Type.get");
        assert_eq!(output_file_stem(&named("Vec::operator<")), "Vec.operator%lt");
        assert_eq!(output_file_stem(&named("Vec::operator()")), "Vec.operator()");
        assert_eq!(output_file_stem(&named("A::operator/")), "A.operator%slash");
        assert_eq!(
            output_file_stem(&named("Box<T>::operator*")),
            "Box%ltT%gt.operator%star"
        );
        assert_eq!(
            output_file_stem(&named("A::operator new")),
            "A.operator_new"
        );
    }

    #[test]
    fn unnamed_stem_uses_kind_file_and_line() {
        let mut c = Construct::new(ConstructKind::Struct, "include/geo.hpp");
        c.span = Span {
            start_line: 12,
            end_line: 14,
        };
        assert_eq!(output_file_stem(&c), "unnamed_struct_geo_12");
    }

    #[test]
    fn renderer_lookup() {
        assert_eq!(create_renderer("md").unwrap().file_extension(), "md");
        assert_eq!(create_renderer("markdown").unwrap().file_extension(), "md");
        assert_eq!(create_renderer("json").unwrap().file_extension(), "json");
        let err = create_renderer("html").err().unwrap();
        assert_eq!(err.to_string(), "unknown format: html. Use markdown or json");
    }
}
