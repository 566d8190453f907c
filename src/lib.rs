//! treedoc: documentation extraction for C and C++ on tree-sitter syntax trees.
//!
//! Source files are parsed with a compiled-in grammar, every named construct
//! is extracted together with its doc comment, occurrences spread across a
//! header and its implementation are merged, and each construct is rendered
//! to its own markdown or JSON snippet.

pub mod cache;
pub mod config;
pub mod docgen;
pub mod error;
pub mod logging;
pub mod model;
pub mod parser;
pub mod render;
pub mod toc;
