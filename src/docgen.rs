//! Extraction pipeline: sources in, one rendered snippet per construct out.
//!
//! Per file: parse, extract constructs, find doc comments and associate them.
//! Per run: collect sources, skip companion groups the cache says are up to
//! date, merge everything extracted, render, record outputs in the cache.

use crate::cache::{DocumentationCache, CACHE_FILE};
use crate::config::{is_excluded, Config};
use crate::error::{Error, Result};
use crate::model::Construct;
use crate::parser::associate::{associate_doc_blocks, attach_associated_docs};
use crate::parser::comments::extract_doc_blocks;
use crate::parser::extract::extract_constructs;
use crate::parser::merge::{companion_key, merge};
use crate::parser::LanguageRegistry;
use crate::render::{create_renderer, output_file_stem};
use crate::toc::{render_index, IndexEntry, INDEX_FILE};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// What to extract and where to put it.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Files, directories or glob patterns. Empty means the configured
    /// source directories.
    pub sources: Vec<String>,
    /// Overrides the configured extract directory.
    pub extract_dir: Option<PathBuf>,
    pub format: String,
    /// Ignore the cache and extract everything.
    pub force: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        ExtractOptions {
            sources: Vec::new(),
            extract_dir: None,
            format: "markdown".to_string(),
            force: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub constructs: usize,
    pub files_extracted: usize,
    pub files_up_to_date: usize,
    pub conflicts: usize,
    pub files_written: usize,
    pub orphans_pruned: usize,
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} constructs extracted from {} files ({} up to date), {} merge conflicts, {} files written",
            self.constructs,
            self.files_extracted,
            self.files_up_to_date,
            self.conflicts,
            self.files_written
        )
    }
}

pub struct DocGenerator {
    config: Config,
    registry: LanguageRegistry,
    excludes: Vec<glob::Pattern>,
}

impl DocGenerator {
    pub fn new(config: Config) -> Self {
        let registry = LanguageRegistry::from_config(&config);
        if registry.is_empty() {
            warn!("no usable languages configured");
        }
        let excludes = config.exclude_matchers();
        DocGenerator {
            config,
            registry,
            excludes,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &LanguageRegistry {
        &self.registry
    }

    fn extract_dir(&self, opts: &ExtractOptions) -> PathBuf {
        opts.extract_dir
            .clone()
            .unwrap_or_else(|| self.config.extract_directory.clone())
    }

    // -- Single file ------------------------------------------------------

    /// Every construct of one file with its documentation attached.
    /// Failures are logged and give an empty result.
    pub fn extract_file(&self, path: &Path) -> Vec<Construct> {
        let Some((language, entry)) = self.registry.language_for_file(path) else {
            debug!("no language for {}", path.display());
            return Vec::new();
        };
        let source = match fs::read_to_string(path) {
            Ok(source) => source,
            Err(e) => {
                error!("failed to read {}: {}", path.display(), e);
                return Vec::new();
            }
        };
        let Some(tree) = entry.provider.parse(&source) else {
            warn!("failed to parse {}", path.display());
            return Vec::new();
        };

        let file = path.to_string_lossy();
        let mut constructs = extract_constructs(&tree, &source, &file);
        let mut blocks = extract_doc_blocks(&source, entry.docstring_style);
        associate_doc_blocks(&mut blocks, &tree, &source, entry.provider.language());
        let attached = attach_associated_docs(&mut constructs, &blocks);

        info!(
            file = %path.display(),
            language,
            constructs = constructs.len(),
            doc_blocks = blocks.len(),
            attached,
            "extracted"
        );
        constructs
    }

    // -- Source collection ------------------------------------------------

    /// Expand files, directories (recursively) and glob patterns into the
    /// sorted list of files with a configured language, minus exclusions.
    pub fn collect_sources(&self, patterns: &[String]) -> Vec<PathBuf> {
        let configured: Vec<String>;
        let patterns = if patterns.is_empty() {
            configured = self
                .config
                .source_directories
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect();
            configured.as_slice()
        } else {
            patterns
        };

        let mut files = Vec::new();
        for pattern in patterns {
            let path = Path::new(pattern);
            if path.is_file() {
                if self.registry.language_for_file(path).is_none() {
                    warn!("skipping {}: no language for this extension", path.display());
                    continue;
                }
                files.push(path.to_path_buf());
            } else if path.is_dir() {
                files.extend(
                    WalkDir::new(path)
                        .into_iter()
                        .filter_map(|e| e.ok())
                        .filter(|e| e.file_type().is_file())
                        .map(|e| e.into_path())
                        .filter(|p| self.registry.language_for_file(p).is_some()),
                );
            } else if pattern.contains(['*', '?', '[']) {
                let matches: Vec<PathBuf> = match glob::glob(pattern) {
                    Ok(paths) => paths
                        .filter_map(|r| r.ok())
                        .filter(|p| p.is_file())
                        .filter(|p| self.registry.language_for_file(p).is_some())
                        .collect(),
                    Err(e) => {
                        warn!("invalid glob pattern {}: {}", pattern, e);
                        continue;
                    }
                };
                if matches.is_empty() {
                    warn!("no files matched: {}", pattern);
                }
                files.extend(matches);
            } else {
                warn!("source not found, skipping: {}", pattern);
            }
        }

        files.retain(|p| {
            let excluded = is_excluded(p, &self.excludes);
            if excluded {
                debug!("excluded {}", p.display());
            }
            !excluded
        });
        files.sort();
        files.dedup();
        files
    }

    // -- Runs -------------------------------------------------------------

    /// Extract, merge and render into the extract directory.
    pub fn extract(&self, opts: &ExtractOptions) -> Result<RunStats> {
        let renderer = create_renderer(&opts.format)?;
        let extract_dir = self.extract_dir(opts);
        fs::create_dir_all(&extract_dir).map_err(|source| Error::Write {
            path: extract_dir.clone(),
            source,
        })?;

        let mut cache = DocumentationCache::in_directory(&extract_dir);
        if let Err(e) = cache.load() {
            warn!("{}, starting with an empty cache", e);
            cache.clear();
        }

        let mut stats = RunStats::default();
        let mut groups: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
        for source in self.collect_sources(&opts.sources) {
            groups
                .entry(companion_key(&source.to_string_lossy()))
                .or_default()
                .push(source);
        }

        let stale = stale_groups(&groups, &cache, opts.force);
        let mut extracted: Vec<(PathBuf, usize)> = Vec::new();
        let mut constructs = Vec::new();
        for (key, group) in &groups {
            if !stale.contains(key.as_str()) {
                debug!("{} up to date", key);
                stats.files_up_to_date += group.len();
                continue;
            }
            for path in group {
                let found = self.extract_file(path);
                extracted.push((path.clone(), found.len()));
                constructs.extend(found);
            }
        }
        stats.files_extracted = extracted.len();

        let outcome = merge(constructs);
        stats.constructs = outcome.constructs.len();
        stats.conflicts = outcome.conflicts.len();

        let mut used: HashSet<String> = HashSet::new();
        let mut generated: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for construct in &outcome.constructs {
            let stem = output_file_stem(construct);
            let mut name = format!("{}.{}", stem, renderer.file_extension());
            let mut n = 2;
            while used.contains(&name) {
                name = format!("{}_{}.{}", stem, n, renderer.file_extension());
                n += 1;
            }
            used.insert(name.clone());

            let path = extract_dir.join(&name);
            fs::write(&path, renderer.render(construct))
                .map_err(|source| Error::Write { path, source })?;
            stats.files_written += 1;
            debug!("wrote {}", name);

            for file in construct.contributing_files() {
                generated
                    .entry(file.to_string())
                    .or_default()
                    .push(name.clone());
            }
        }

        for (path, count) in &extracted {
            let language = self
                .registry
                .language_for_file(path)
                .map_or("", |(name, _)| name);
            let outputs = generated
                .remove(&*path.to_string_lossy())
                .unwrap_or_default();
            cache.update_file(path, language, *count, outputs);
        }
        cache.save()?;

        if !cache.verify_integrity() {
            info!("removing outputs that no longer have a source");
            stats.orphans_pruned = cache.prune_orphaned_files(false)?;
        }

        info!("{}", stats);
        Ok(stats)
    }

    /// Extract, then publish the snippets and an index to the output directory.
    pub fn generate(&self, opts: &ExtractOptions) -> Result<RunStats> {
        let stats = self.extract(opts)?;
        let extract_dir = self.extract_dir(opts);
        let output_dir = &self.config.output_directory;
        fs::create_dir_all(output_dir).map_err(|source| Error::Write {
            path: output_dir.clone(),
            source,
        })?;

        let mut snippets: Vec<PathBuf> = fs::read_dir(&extract_dir)
            .map_err(|source| Error::Write {
                path: extract_dir.clone(),
                source,
            })?
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .filter(|p| p.file_name().is_some_and(|n| n != CACHE_FILE))
            .collect();
        snippets.sort();

        let mut entries = Vec::new();
        for snippet in &snippets {
            let Ok(content) = fs::read_to_string(snippet) else {
                warn!("failed to read {}", snippet.display());
                continue;
            };
            let Some(entry) = IndexEntry::from_snippet(snippet, &content) else {
                continue;
            };
            let target = output_dir.join(&entry.file_name);
            fs::write(&target, &content).map_err(|source| Error::Write {
                path: target.clone(),
                source,
            })?;
            entries.push(entry);
        }

        let published: HashSet<&str> = entries.iter().map(|e| e.file_name.as_str()).collect();
        remove_unpublished(output_dir, &published);

        let index_path = output_dir.join(INDEX_FILE);
        fs::write(&index_path, render_index(&entries)).map_err(|source| Error::Write {
            path: index_path.clone(),
            source,
        })?;
        info!(
            "published {} snippets and {} to {}",
            entries.len(),
            INDEX_FILE,
            output_dir.display()
        );
        Ok(stats)
    }

    /// Remove outputs whose sources are gone. Returns how many were found.
    pub fn prune(&self, extract_dir: Option<&Path>, dry_run: bool) -> Result<usize> {
        let dir = extract_dir.unwrap_or(self.config.extract_directory.as_path());
        let mut cache = DocumentationCache::in_directory(dir);
        if !cache.load()? {
            info!("no cache in {}, nothing to prune", dir.display());
            return Ok(0);
        }
        Ok(cache.prune_orphaned_files(dry_run)?)
    }
}

/// Delete snippets left in the output directory by earlier runs whose
/// construct is no longer indexed. Only rendered snippet files are touched.
fn remove_unpublished(output_dir: &Path, published: &HashSet<&str>) {
    let Ok(entries) = fs::read_dir(output_dir) else {
        return;
    };
    for path in entries.flatten().map(|e| e.path()) {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let rendered = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == "md" || e == "json");
        if !rendered || name == INDEX_FILE || published.contains(name) || !path.is_file() {
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => info!("removed unpublished {}", path.display()),
            Err(e) => warn!("failed to remove {}: {}", path.display(), e),
        }
    }
}

/// Companion groups to extract this run: those with a changed source, plus
/// every group that shares a rendered output with one of them. A merged
/// snippet is rewritten from all of its sources or not at all.
fn stale_groups<'g>(
    groups: &'g BTreeMap<String, Vec<PathBuf>>,
    cache: &DocumentationCache,
    force: bool,
) -> BTreeSet<&'g str> {
    let mut stale: BTreeSet<&str> = groups
        .iter()
        .filter(|(_, group)| force || group.iter().any(|p| cache.needs_extraction(p)))
        .map(|(key, _)| key.as_str())
        .collect();

    loop {
        let sources: Vec<&Path> = stale
            .iter()
            .flat_map(|key| groups[*key].iter().map(PathBuf::as_path))
            .collect();
        let related = cache.sources_sharing_outputs(&sources);
        let before = stale.len();
        for (key, group) in groups {
            let shares = group.iter().any(|p| related.contains(&*p.to_string_lossy()));
            if shares && stale.insert(key.as_str()) {
                debug!("{} shares output with a changed source", key);
            }
        }
        if stale.len() == before {
            return stale;
        }
    }
}
