//! treedoc: extract per-construct documentation from C and C++ sources.
//!
//! - `treedoc extract src/ include/` renders snippets into the extract directory
//! - `treedoc generate` also publishes them with an index
//! - `treedoc prune` removes snippets whose sources are gone

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use treedoc::config::{resolve_config_path, Config, CONFIG_JSON};
use treedoc::docgen::{DocGenerator, ExtractOptions};
use treedoc::error::ConfigError;
use treedoc::logging;
use treedoc::parser::BUILTIN_GRAMMARS;

#[derive(Parser)]
#[command(
    name = "treedoc",
    version,
    about = "Extract documentation for C and C++ constructs into markdown or JSON snippets"
)]
struct Cli {
    /// Configuration file (default: treedoc.jsonc or treedoc.json in the current directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract constructs and render one snippet per construct
    Extract {
        /// Files, directories or glob patterns (default: configured source directories)
        sources: Vec<String>,

        /// Additional source path; may be repeated
        #[arg(short, long = "source")]
        source: Vec<String>,

        /// Where snippets and the cache are written
        #[arg(short, long)]
        extract_dir: Option<PathBuf>,

        /// Output format: markdown (default) or json
        #[arg(short, long, default_value = "markdown")]
        format: String,

        /// Extract every file even when the cache says it is up to date
        #[arg(long)]
        force: bool,
    },

    /// Extract, then copy snippets and an index to the output directory
    Generate {
        #[arg(short, long)]
        extract_dir: Option<PathBuf>,

        #[arg(short, long, default_value = "markdown")]
        format: String,

        #[arg(long)]
        force: bool,
    },

    /// Remove snippets whose sources no longer exist
    Prune {
        #[arg(short, long)]
        extract_dir: Option<PathBuf>,

        /// Only report what would be removed
        #[arg(long)]
        dry_run: bool,
    },

    /// List built-in grammars and configured languages
    ListParsers,

    /// Write a starter configuration file
    InitConfig {
        /// Target file
        #[arg(default_value = CONFIG_JSON)]
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = logging::verbosity_level(cli.verbose, cli.quiet);

    if let Command::InitConfig { file } = &cli.command {
        logging::initialize(&Config::default().logging, level);
        return init_config(file);
    }

    let (config, source) = load_config(cli.config.as_deref())?;
    logging::initialize(&config.logging, level);
    match source {
        Some(path) => debug!("using configuration {}", path.display()),
        None => warn!("no configuration file found, using built-in defaults"),
    }

    let generator = DocGenerator::new(config);
    match cli.command {
        Command::Extract {
            mut sources,
            source,
            extract_dir,
            format,
            force,
        } => {
            sources.extend(source);
            let stats = generator.extract(&ExtractOptions {
                sources,
                extract_dir,
                format,
                force,
            })?;
            println!("{}", stats);
        }
        Command::Generate {
            extract_dir,
            format,
            force,
        } => {
            let stats = generator.generate(&ExtractOptions {
                extract_dir,
                format,
                force,
                ..Default::default()
            })?;
            println!("{}", stats);
            println!(
                "documentation written to {}",
                generator.config().output_directory.display()
            );
        }
        Command::Prune {
            extract_dir,
            dry_run,
        } => {
            let count = generator.prune(extract_dir.as_deref(), dry_run)?;
            if dry_run {
                println!("{} orphaned files would be removed", count);
            } else {
                println!("{} orphaned files removed", count);
            }
        }
        Command::ListParsers => list_parsers(&generator),
        Command::InitConfig { .. } => unreachable!("handled before loading configuration"),
    }
    Ok(())
}

/// Load the configuration. Only a missing default file falls back to the
/// built-in defaults; anything else is an error.
fn load_config(explicit: Option<&Path>) -> Result<(Config, Option<PathBuf>)> {
    match resolve_config_path(explicit, Path::new(".")) {
        Ok(path) => {
            let config = Config::load(&path)
                .with_context(|| format!("failed to load configuration {}", path.display()))?;
            Ok((config, Some(path)))
        }
        Err(ConfigError::NoDefault { .. }) => Ok((Config::default(), None)),
        Err(e) => Err(e).context("failed to locate configuration"),
    }
}

fn init_config(file: &Path) -> Result<()> {
    if file.exists() {
        bail!("{} already exists, not overwriting", file.display());
    }
    let json = Config::template()
        .to_json()
        .context("failed to serialize configuration")?;
    fs::write(file, json + "\n")
        .with_context(|| format!("failed to write {}", file.display()))?;
    println!("wrote {}", file.display());
    Ok(())
}

fn list_parsers(generator: &DocGenerator) {
    println!("Built-in grammars:");
    for (name, aliases) in BUILTIN_GRAMMARS {
        if aliases.is_empty() {
            println!("  {}", name);
        } else {
            println!("  {} (aliases: {})", name, aliases.join(", "));
        }
    }

    println!("Configured languages:");
    let registry = generator.registry();
    if registry.is_empty() {
        println!("  (none)");
    }
    for (name, entry) in registry.iter() {
        println!(
            "  {}: grammar {}, extensions {}, docstring style \"{}\"",
            name,
            entry.grammar,
            entry.extensions.join(" "),
            entry.docstring_style
        );
    }
}
