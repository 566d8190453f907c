//! JSON renderer: the construct record as-is, for tooling integration.

use crate::model::Construct;
use crate::render::Renderer;
use tracing::error;

pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn render(&self, construct: &Construct) -> String {
        match serde_json::to_string_pretty(construct) {
            Ok(mut json) => {
                json.push('\n');
                json
            }
            Err(e) => {
                error!("failed to serialize {}: {}", construct.qualified_name, e);
                String::new()
            }
        }
    }

    fn file_extension(&self) -> &str {
        "json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConstructKind, Parameter};

    #[test]
    fn serializes_construct_fields() {
        let mut c = Construct::new(ConstructKind::Method, "w.hpp");
        c.set_name("ui::Widget", "resize");
        c.return_type = Some("void".into());
        c.parameters = vec![Parameter {
            type_name: "int".into(),
            name: "w".into(),
            default_value: Some("0".into()),
        }];
        c.visibility = "public".into();

        let out = JsonRenderer.render(&c);
        assert!(out.ends_with("}\n"));
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["kind"], "method");
        assert_eq!(value["qualified_name"], "ui::Widget::resize");
        assert_eq!(value["enclosing_scope"], "ui::Widget");
        assert_eq!(value["parameters"][0]["type"], "int");
        assert_eq!(value["parameters"][0]["default_value"], "0");
        assert_eq!(value["merge"]["is_merged"], false);
        assert!(value["doc_comment"].is_null());
    }
}
