//! Parser module: grammar registry and dispatch by file extension.

pub mod associate;
pub mod comments;
pub mod extract;
pub mod merge;
pub mod names;

use crate::config::{Config, LanguageConfig};
use comments::DocstringStyle;
use std::collections::BTreeMap;
use std::path::Path;
use tree_sitter::{Language, Parser, Tree};
use tracing::warn;

/// Something that turns source text into a syntax tree.
pub trait TreeProvider: Send + Sync {
    fn language(&self) -> &Language;

    /// Parse `source`. The parser lives only for the duration of the call.
    fn parse(&self, source: &str) -> Option<Tree> {
        let mut parser = Parser::new();
        if let Err(e) = parser.set_language(self.language()) {
            warn!("grammar rejected by parser: {}", e);
            return None;
        }
        parser.parse(source, None)
    }
}

/// A grammar compiled into the binary.
pub struct Grammar {
    name: &'static str,
    language: Language,
}

impl Grammar {
    pub fn name(&self) -> &str {
        self.name
    }
}

impl TreeProvider for Grammar {
    fn language(&self) -> &Language {
        &self.language
    }
}

/// Names accepted for the `grammar` key, canonical name first.
pub const BUILTIN_GRAMMARS: &[(&str, &[&str])] = &[("cpp", &["c++", "cxx"]), ("c", &[])];

/// Look up a compiled-in grammar by name or alias.
pub fn builtin_grammar(name: &str) -> Option<Grammar> {
    let lower = name.to_ascii_lowercase();
    let canonical: &'static str = BUILTIN_GRAMMARS
        .iter()
        .find(|(canonical, aliases)| *canonical == lower || aliases.contains(&lower.as_str()))
        .map(|(canonical, _)| *canonical)?;
    let language: Language = match canonical {
        "cpp" => tree_sitter_cpp::LANGUAGE.into(),
        "c" => tree_sitter_c::LANGUAGE.into(),
        _ => return None,
    };
    Some(Grammar {
        name: canonical,
        language,
    })
}

/// A configured language: its grammar plus how files and comments look.
pub struct LanguageEntry {
    pub provider: Box<dyn TreeProvider>,
    pub grammar: String,
    pub extensions: Vec<String>,
    pub docstring_style: DocstringStyle,
}

impl LanguageEntry {
    fn from_config(name: &str, cfg: &LanguageConfig) -> Option<Self> {
        let grammar_name = cfg.grammar.as_deref().unwrap_or(name);
        let grammar = builtin_grammar(grammar_name)?;
        Some(LanguageEntry {
            grammar: grammar.name().to_string(),
            provider: Box::new(grammar),
            extensions: cfg.extensions.clone(),
            docstring_style: cfg.docstring_style,
        })
    }
}

/// Language name → grammar, in name order.
#[derive(Default)]
pub struct LanguageRegistry {
    languages: BTreeMap<String, LanguageEntry>,
}

impl LanguageRegistry {
    /// Build the registry from configuration. Languages without a known
    /// grammar are skipped with a warning.
    pub fn from_config(config: &Config) -> Self {
        let mut registry = LanguageRegistry::default();
        for (name, cfg) in &config.languages {
            match LanguageEntry::from_config(name, cfg) {
                Some(entry) => registry.register(name, entry),
                None => warn!(
                    "no grammar available for language '{}' (grammar '{}'), skipping",
                    name,
                    cfg.grammar.as_deref().unwrap_or(name)
                ),
            }
        }
        registry
    }

    pub fn register(&mut self, name: &str, entry: LanguageEntry) {
        self.languages.insert(name.to_string(), entry);
    }

    pub fn get(&self, name: &str) -> Option<&LanguageEntry> {
        self.languages.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &LanguageEntry)> {
        self.languages.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }

    /// The language whose extensions include this file's extension.
    pub fn language_for_file(&self, path: &Path) -> Option<(&str, &LanguageEntry)> {
        let ext = format!(".{}", path.extension()?.to_str()?);
        self.iter()
            .find(|(_, entry)| entry.extensions.iter().any(|e| *e == ext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn builtin_grammars_resolve_aliases() {
        assert_eq!(builtin_grammar("cpp").map(|g| g.name), Some("cpp"));
        assert_eq!(builtin_grammar("C++").map(|g| g.name), Some("cpp"));
        assert_eq!(builtin_grammar("c").map(|g| g.name), Some("c"));
        assert!(builtin_grammar("cobol").is_none());
    }

    #[test]
    fn grammar_parses_source() {
        let grammar = builtin_grammar("cpp").unwrap();
        let tree = grammar.parse("int main() { return 0; }").unwrap();
        assert_eq!(tree.root_node().kind(), "translation_unit");
    }

    #[test]
    fn language_for_file_by_extension() {
        let registry = LanguageRegistry::from_config(&Config::template());
        let (name, entry) = registry.language_for_file(Path::new("src/a.hpp")).unwrap();
        assert_eq!(name, "cpp");
        assert_eq!(entry.grammar, "cpp");
        assert!(registry.language_for_file(Path::new("README.md")).is_none());
        assert!(registry.language_for_file(Path::new("Makefile")).is_none());
    }

    #[test]
    fn unknown_grammar_is_skipped() {
        let mut config = Config::template();
        config.languages.insert(
            "cobol".into(),
            LanguageConfig {
                grammar: None,
                extensions: vec![".cob".into()],
                docstring_style: DocstringStyle::Block,
            },
        );
        let registry = LanguageRegistry::from_config(&config);
        assert!(registry.get("cobol").is_none());
        assert!(registry.get("cpp").is_some());
    }
}
