//! Extraction cache: skip sources that have not changed since the last run.
//!
//! The cache file sits in the extract directory next to the snippets it
//! tracks. Generated files are recorded by name relative to that directory.

use crate::error::CacheError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

pub const CACHE_FILE: &str = ".treedoc-cache.json";
const CACHE_VERSION: &str = "1.0";

/// Extensions of files the renderers produce.
const RENDERED_EXTENSIONS: &[&str] = &["md", "json"];

/// What the cache remembers about one source file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// SHA-256, hex
    pub content_hash: String,
    /// Modification time in nanoseconds since the epoch.
    pub last_modified: String,
    pub construct_count: usize,
    pub language: String,
    pub generated_files: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct CacheData {
    version: String,
    last_updated: u64,
    file_count: usize,
    files: BTreeMap<String, FileMetadata>,
}

pub struct DocumentationCache {
    path: PathBuf,
    files: BTreeMap<String, FileMetadata>,
    /// generated file name → sources that produced it
    output_sources: BTreeMap<String, BTreeSet<String>>,
}

fn source_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn content_hash(path: &Path) -> Option<String> {
    let bytes = fs::read(path).ok()?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Some(format!("{:x}", hasher.finalize()))
}

fn modified_time(path: &Path) -> Option<String> {
    let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
    let since_epoch = modified.duration_since(UNIX_EPOCH).ok()?;
    Some(since_epoch.as_nanos().to_string())
}

impl DocumentationCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DocumentationCache {
            path: path.into(),
            files: BTreeMap::new(),
            output_sources: BTreeMap::new(),
        }
    }

    /// A cache stored in `dir` under the standard file name.
    pub fn in_directory(dir: &Path) -> Self {
        Self::new(dir.join(CACHE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory the generated file names are relative to.
    pub fn directory(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new("."))
    }

    /// Load from disk. A missing file is not an error and leaves the cache empty.
    pub fn load(&mut self) -> Result<bool, CacheError> {
        if !self.path.exists() {
            return Ok(false);
        }
        let content = fs::read_to_string(&self.path).map_err(|source| CacheError::Io {
            path: self.path.clone(),
            source,
        })?;
        let data: CacheData =
            serde_json::from_str(&content).map_err(|source| CacheError::Corrupt {
                path: self.path.clone(),
                source,
            })?;
        if data.version != CACHE_VERSION {
            warn!(
                "cache version {} differs from {}, loading anyway",
                data.version, CACHE_VERSION
            );
        }
        self.files = data.files;
        self.rebuild_index();
        debug!(files = self.files.len(), "loaded cache");
        Ok(true)
    }

    pub fn save(&self) -> Result<(), CacheError> {
        let io_err = |source| CacheError::Io {
            path: self.path.clone(),
            source,
        };
        fs::create_dir_all(self.directory()).map_err(io_err)?;

        let data = CacheData {
            version: CACHE_VERSION.to_string(),
            last_updated: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
            file_count: self.files.len(),
            files: self.files.clone(),
        };
        let json = serde_json::to_string_pretty(&data).map_err(|source| CacheError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, json).map_err(io_err)
    }

    fn rebuild_index(&mut self) {
        self.output_sources.clear();
        for (source, meta) in &self.files {
            for output in &meta.generated_files {
                self.output_sources
                    .entry(output.clone())
                    .or_default()
                    .insert(source.clone());
            }
        }
    }

    /// Whether `source` must be extracted again. Sources that no longer
    /// exist never need extraction.
    pub fn needs_extraction(&self, source: &Path) -> bool {
        if !source.exists() {
            return false;
        }
        let Some(meta) = self.files.get(&source_key(source)) else {
            return true;
        };
        if modified_time(source).as_deref() != Some(meta.last_modified.as_str()) {
            return true;
        }
        if content_hash(source).as_deref() != Some(meta.content_hash.as_str()) {
            return true;
        }
        let dir = self.directory();
        meta.generated_files
            .iter()
            .any(|output| !dir.join(output).exists())
    }

    /// Record a fresh extraction of `source`.
    pub fn update_file(
        &mut self,
        source: &Path,
        language: &str,
        construct_count: usize,
        generated_files: Vec<String>,
    ) {
        let meta = FileMetadata {
            content_hash: content_hash(source).unwrap_or_default(),
            last_modified: modified_time(source).unwrap_or_default(),
            construct_count,
            language: language.to_string(),
            generated_files,
        };
        self.files.insert(source_key(source), meta);
        self.rebuild_index();
    }

    /// Other tracked sources that contributed to an output of any of
    /// `sources`, such as the header whose declaration merged with a
    /// definition in one of them.
    pub fn sources_sharing_outputs(&self, sources: &[&Path]) -> BTreeSet<String> {
        let keys: BTreeSet<String> = sources.iter().map(|s| source_key(s)).collect();
        let mut related = BTreeSet::new();
        for key in &keys {
            let Some(meta) = self.files.get(key) else {
                continue;
            };
            for output in &meta.generated_files {
                if let Some(owners) = self.output_sources.get(output) {
                    related.extend(owners.iter().filter(|o| !keys.contains(*o)).cloned());
                }
            }
        }
        related
    }

    pub fn remove_file(&mut self, source: &Path) -> Option<FileMetadata> {
        let removed = self.files.remove(&source_key(source));
        if removed.is_some() {
            self.rebuild_index();
        }
        removed
    }

    pub fn get(&self, source: &Path) -> Option<&FileMetadata> {
        self.files.get(&source_key(source))
    }

    /// Generated files whose every source is gone but which still exist.
    pub fn orphaned_files(&self) -> Vec<PathBuf> {
        let dir = self.directory();
        self.output_sources
            .iter()
            .filter(|(_, sources)| sources.iter().all(|s| !Path::new(s).exists()))
            .map(|(output, _)| dir.join(output))
            .filter(|path| path.exists())
            .collect()
    }

    /// Rendered files in the cache directory that the cache does not track.
    pub fn orphaned_files_in_directory(&self) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(self.directory()) else {
            return Vec::new();
        };
        let mut orphans: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| {
                path.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| RENDERED_EXTENSIONS.contains(&e))
            })
            .filter(|path| {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                name != CACHE_FILE && !self.output_sources.contains_key(&name)
            })
            .collect();
        orphans.sort();
        orphans
    }

    pub fn verify_integrity(&self) -> bool {
        self.orphaned_files().is_empty() && self.orphaned_files_in_directory().is_empty()
    }

    /// Delete orphaned outputs, forget deleted sources and save.
    /// With `dry_run` nothing is touched. Returns the number of orphans.
    pub fn prune_orphaned_files(&mut self, dry_run: bool) -> Result<usize, CacheError> {
        let mut orphans = self.orphaned_files();
        orphans.extend(self.orphaned_files_in_directory());
        orphans.sort();
        orphans.dedup();

        for orphan in &orphans {
            if dry_run {
                info!("would remove {}", orphan.display());
            } else if let Err(e) = fs::remove_file(orphan) {
                warn!("failed to remove {}: {}", orphan.display(), e);
            } else {
                info!("removed {}", orphan.display());
            }
        }
        if dry_run {
            return Ok(orphans.len());
        }

        let gone: Vec<String> = self
            .files
            .keys()
            .filter(|s| !Path::new(s.as_str()).exists())
            .cloned()
            .collect();
        for source in &gone {
            debug!("forgetting deleted source {}", source);
            self.files.remove(source);
        }
        self.rebuild_index();
        self.save()?;
        Ok(orphans.len())
    }

    /// (tracked sources, generated files)
    pub fn stats(&self) -> (usize, usize) {
        let generated = self.files.values().map(|m| m.generated_files.len()).sum();
        (self.files.len(), generated)
    }

    pub fn clear(&mut self) {
        self.files.clear();
        self.output_sources.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        source: PathBuf,
        out_dir: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a.cpp");
        fs::write(&source, "int a();\n").unwrap();
        let out_dir = dir.path().join("out");
        fs::create_dir_all(&out_dir).unwrap();
        Fixture {
            _dir: dir,
            source,
            out_dir,
        }
    }

    #[test]
    fn tracks_changes() {
        let fx = fixture();
        let mut cache = DocumentationCache::in_directory(&fx.out_dir);
        assert!(cache.needs_extraction(&fx.source));

        fs::write(fx.out_dir.join("a.md"), "# a").unwrap();
        cache.update_file(&fx.source, "cpp", 1, vec!["a.md".into()]);
        assert!(!cache.needs_extraction(&fx.source));

        fs::write(&fx.source, "int a(int x);\n").unwrap();
        assert!(cache.needs_extraction(&fx.source));
    }

    #[test]
    fn missing_output_forces_extraction() {
        let fx = fixture();
        let mut cache = DocumentationCache::in_directory(&fx.out_dir);
        cache.update_file(&fx.source, "cpp", 1, vec!["a.md".into()]);
        assert!(cache.needs_extraction(&fx.source));
    }

    #[test]
    fn sources_sharing_an_output() {
        let fx = fixture();
        let header = fx.out_dir.join("a.hpp");
        let other = fx.out_dir.join("b.cpp");
        let mut cache = DocumentationCache::in_directory(&fx.out_dir);
        cache.update_file(&fx.source, "cpp", 2, vec!["a.md".into(), "run.md".into()]);
        cache.update_file(&header, "cpp", 1, vec!["run.md".into()]);
        cache.update_file(&other, "cpp", 1, vec!["b.md".into()]);

        let related = cache.sources_sharing_outputs(&[fx.source.as_path()]);
        assert_eq!(related.into_iter().collect::<Vec<_>>(), vec![source_key(&header)]);
        assert!(cache
            .sources_sharing_outputs(&[fx.source.as_path(), header.as_path()])
            .is_empty());
        assert!(cache.sources_sharing_outputs(&[other.as_path()]).is_empty());
    }

    #[test]
    fn deleted_source_needs_nothing() {
        let fx = fixture();
        let cache = DocumentationCache::in_directory(&fx.out_dir);
        assert!(!cache.needs_extraction(&fx.out_dir.join("gone.cpp")));
    }

    #[test]
    fn save_and_load() {
        let fx = fixture();
        let mut cache = DocumentationCache::in_directory(&fx.out_dir);
        cache.update_file(&fx.source, "cpp", 2, vec!["a.md".into(), "b.md".into()]);
        cache.save().unwrap();

        let mut loaded = DocumentationCache::in_directory(&fx.out_dir);
        assert!(loaded.load().unwrap());
        assert_eq!(loaded.stats(), (1, 2));
        let meta = loaded.get(&fx.source).unwrap();
        assert_eq!(meta.language, "cpp");
        assert_eq!(meta.construct_count, 2);
        assert_eq!(meta.content_hash.len(), 64);

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(loaded.path()).unwrap()).unwrap();
        assert_eq!(raw["version"], "1.0");
        assert_eq!(raw["file_count"], 1);
    }

    #[test]
    fn missing_and_corrupt_cache() {
        let fx = fixture();
        let mut cache = DocumentationCache::in_directory(&fx.out_dir);
        assert!(!cache.load().unwrap());

        fs::write(cache.path(), "{ not json").unwrap();
        assert!(matches!(cache.load(), Err(CacheError::Corrupt { .. })));
    }

    #[test]
    fn finds_and_prunes_orphans() {
        let fx = fixture();
        let gone = fx.out_dir.join("gone.cpp");
        fs::write(&gone, "void g();\n").unwrap();
        for name in ["a.md", "g.md", "stray.md", "notes.txt"] {
            fs::write(fx.out_dir.join(name), "x").unwrap();
        }

        let mut cache = DocumentationCache::in_directory(&fx.out_dir);
        cache.update_file(&fx.source, "cpp", 1, vec!["a.md".into()]);
        cache.update_file(&gone, "cpp", 1, vec!["g.md".into()]);
        cache.save().unwrap();
        assert!(!cache.verify_integrity());

        fs::remove_file(&gone).unwrap();
        assert_eq!(cache.orphaned_files(), vec![fx.out_dir.join("g.md")]);
        assert_eq!(
            cache.orphaned_files_in_directory(),
            vec![fx.out_dir.join("stray.md")]
        );

        assert_eq!(cache.prune_orphaned_files(true).unwrap(), 2);
        assert!(fx.out_dir.join("g.md").exists());

        assert_eq!(cache.prune_orphaned_files(false).unwrap(), 2);
        assert!(!fx.out_dir.join("g.md").exists());
        assert!(!fx.out_dir.join("stray.md").exists());
        assert!(fx.out_dir.join("a.md").exists());
        assert!(fx.out_dir.join("notes.txt").exists());
        assert!(cache.path().exists());
        assert_eq!(cache.stats(), (1, 1));
        assert!(cache.verify_integrity());
    }

    #[test]
    fn shared_output_survives_one_deleted_source() {
        let fx = fixture();
        let header = fx.out_dir.join("a.hpp");
        fs::write(&header, "int a();\n").unwrap();
        fs::write(fx.out_dir.join("a.md"), "x").unwrap();

        let mut cache = DocumentationCache::in_directory(&fx.out_dir);
        cache.update_file(&fx.source, "cpp", 1, vec!["a.md".into()]);
        cache.update_file(&header, "cpp", 1, vec!["a.md".into()]);
        fs::remove_file(&header).unwrap();
        assert!(cache.orphaned_files().is_empty());
    }

    #[test]
    fn clear_forgets_everything() {
        let fx = fixture();
        let mut cache = DocumentationCache::in_directory(&fx.out_dir);
        cache.update_file(&fx.source, "cpp", 1, vec!["a.md".into()]);
        assert!(cache.remove_file(&fx.source).is_some());
        cache.update_file(&fx.source, "cpp", 1, vec!["a.md".into()]);
        cache.clear();
        assert_eq!(cache.stats(), (0, 0));
    }
}
