//! Configuration: JSON or JSON-with-comments, found in the working directory.

use crate::error::ConfigError;
use crate::parser::comments::DocstringStyle;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const CONFIG_JSONC: &str = "treedoc.jsonc";
pub const CONFIG_JSON: &str = "treedoc.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub languages: BTreeMap<String, LanguageConfig>,
    pub source_directories: Vec<PathBuf>,
    /// Rendered snippets and the cache live here.
    pub extract_directory: PathBuf,
    /// `generate` copies snippets here.
    pub output_directory: PathBuf,
    /// Glob patterns; matching source paths are skipped.
    pub exclude_patterns: Vec<String>,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageConfig {
    /// Built-in grammar to use; defaults to the language name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grammar: Option<String>,
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub docstring_style: DocstringStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut languages = BTreeMap::new();
        languages.insert(
            "cpp".to_string(),
            LanguageConfig {
                grammar: None,
                extensions: [".cpp", ".hpp", ".cc", ".h", ".cxx"]
                    .iter()
                    .map(|e| e.to_string())
                    .collect(),
                docstring_style: DocstringStyle::Block,
            },
        );
        Config {
            languages,
            source_directories: Vec::new(),
            extract_directory: PathBuf::from(".treedoc"),
            output_directory: PathBuf::from("docs/extracted"),
            exclude_patterns: Vec::new(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// The configuration written by `init-config`.
    pub fn template() -> Self {
        Config {
            source_directories: vec![PathBuf::from("src"), PathBuf::from("include")],
            exclude_patterns: vec!["**/third_party/**".to_string()],
            ..Config::default()
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Parse JSON or JSONC text; `path` is only used in error messages.
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        serde_json::from_str(&strip_json_comments(content)).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Compiled exclude patterns. Invalid patterns are reported and dropped.
    pub fn exclude_matchers(&self) -> Vec<glob::Pattern> {
        self.exclude_patterns
            .iter()
            .filter_map(|p| match glob::Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!("ignoring invalid exclude pattern '{}': {}", p, e);
                    None
                }
            })
            .collect()
    }
}

/// Whether `path` matches any of the exclude patterns.
pub fn is_excluded(path: &Path, patterns: &[glob::Pattern]) -> bool {
    let path = path.strip_prefix(".").unwrap_or(path);
    patterns.iter().any(|p| p.matches_path(path))
}

/// Resolve which configuration file to read.
///
/// An explicit path must exist and be a regular file. Otherwise `dir` is
/// searched for `treedoc.jsonc`, then `treedoc.json`.
pub fn resolve_config_path(explicit: Option<&Path>, dir: &Path) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        if !path.is_file() {
            return Err(ConfigError::NotAFile(path.to_path_buf()));
        }
        return Ok(path.to_path_buf());
    }

    let jsonc = dir.join(CONFIG_JSONC);
    let json = dir.join(CONFIG_JSON);
    match (jsonc.is_file(), json.is_file()) {
        (true, both) => {
            if both {
                warn!(
                    "both {} and {} exist, using {}",
                    CONFIG_JSONC, CONFIG_JSON, CONFIG_JSONC
                );
            }
            Ok(jsonc)
        }
        (false, true) => Ok(json),
        (false, false) => Err(ConfigError::NoDefault {
            jsonc: CONFIG_JSONC.to_string(),
            json: CONFIG_JSON.to_string(),
        }),
    }
}

/// Remove `//` and `/* */` comments outside of string literals.
/// Newlines inside comments are kept so error positions stay meaningful.
pub fn strip_json_comments(content: &str) -> String {
    #[derive(PartialEq)]
    enum State {
        Code,
        Str { escaped: bool },
        LineComment,
        BlockComment,
    }

    let mut out = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();
    let mut state = State::Code;

    while let Some(ch) = chars.next() {
        match state {
            State::Code => match (ch, chars.peek()) {
                ('"', _) => {
                    state = State::Str { escaped: false };
                    out.push(ch);
                }
                ('/', Some('/')) => {
                    chars.next();
                    state = State::LineComment;
                }
                ('/', Some('*')) => {
                    chars.next();
                    state = State::BlockComment;
                }
                _ => out.push(ch),
            },
            State::Str { escaped } => {
                out.push(ch);
                state = match ch {
                    '"' if !escaped => State::Code,
                    '\\' => State::Str { escaped: !escaped },
                    _ => State::Str { escaped: false },
                };
            }
            State::LineComment => {
                if ch == '\n' {
                    out.push(ch);
                    state = State::Code;
                }
            }
            State::BlockComment => {
                if ch == '\n' {
                    out.push(ch);
                } else if ch == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = State::Code;
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn strips_comments_but_not_strings() {
        let input = "{\n  // comment\n  \"url\": \"http://x/*y*/\", /* block\n  */ \"q\": \"a\\\"//b\"\n}";
        let stripped = strip_json_comments(input);
        assert_eq!(
            stripped,
            "{\n  \n  \"url\": \"http://x/*y*/\", \n \"q\": \"a\\\"//b\"\n}"
        );
        let value: serde_json::Value = serde_json::from_str(&stripped).unwrap();
        assert_eq!(value["url"], "http://x/*y*/");
        assert_eq!(value["q"], "a\"//b");
    }

    #[test]
    fn parses_jsonc_with_defaults() {
        let content = r#"{
            // C sources only
            "languages": {
                "c": { "library": "ignored", "extensions": [".c", ".h"], "docstring_style": "///" }
            },
            "source_directories": ["lib"]
        }"#;
        let config = Config::parse(content, Path::new("treedoc.jsonc")).unwrap();

        let c = &config.languages["c"];
        assert_eq!(c.extensions, vec![".c", ".h"]);
        assert_eq!(c.docstring_style, DocstringStyle::TripleSlash);
        assert_eq!(config.source_directories, vec![PathBuf::from("lib")]);
        assert_eq!(config.extract_directory, PathBuf::from(".treedoc"));
        assert_eq!(config.logging.level, "info");
        assert!(!config.languages.contains_key("cpp"));
    }

    #[test]
    fn template_round_trips() {
        let template = Config::template();
        let json = template.to_json().unwrap();
        assert!(json.contains("\"/** */\""));
        let parsed = Config::parse(&json, Path::new("treedoc.json")).unwrap();
        assert_eq!(parsed, template);
    }

    #[test]
    fn parse_error_names_the_file() {
        let err = Config::parse("{ nope", Path::new("bad.json")).unwrap_err();
        assert!(err.to_string().contains("bad.json"));
    }

    #[test]
    fn prefers_jsonc_over_json() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_JSON), "{}").unwrap();
        assert_eq!(
            resolve_config_path(None, dir.path()).unwrap(),
            dir.path().join(CONFIG_JSON)
        );

        std::fs::write(dir.path().join(CONFIG_JSONC), "{}").unwrap();
        assert_eq!(
            resolve_config_path(None, dir.path()).unwrap(),
            dir.path().join(CONFIG_JSONC)
        );
    }

    #[test]
    fn missing_configs() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            resolve_config_path(None, dir.path()),
            Err(ConfigError::NoDefault { .. })
        ));
        let missing = dir.path().join("nope.json");
        assert!(matches!(
            resolve_config_path(Some(&missing), dir.path()),
            Err(ConfigError::NotFound(_))
        ));
        assert!(matches!(
            resolve_config_path(Some(dir.path()), dir.path()),
            Err(ConfigError::NotAFile(_))
        ));
    }

    #[test]
    fn exclude_patterns_match_paths() {
        let config = Config {
            exclude_patterns: vec!["**/third_party/**".into(), "[".into()],
            ..Config::default()
        };
        let matchers = config.exclude_matchers();
        assert_eq!(matchers.len(), 1);
        assert!(is_excluded(Path::new("src/third_party/x.cpp"), &matchers));
        assert!(is_excluded(Path::new("./src/third_party/x.cpp"), &matchers));
        assert!(!is_excluded(Path::new("src/core/x.cpp"), &matchers));
    }
}
