//! Discoverer: walks the project tree and turns each recognized source file
//! into a list of raw artifacts, tolerating unparsable syntax via a regex
//! fallback.

pub mod fallback;
pub mod parser;
pub mod walker;

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;

use crate::config::EngineConfig;
use crate::error::{ModelError, Result};
use crate::languages::LanguageRegistry;
use crate::model::{DependencyKind, ParseOrigin};

use fallback::FallbackExtractor;
use parser::SourceParser;
pub use walker::ProjectWalker;

/// A function/class/etc. recovered from one file.
#[derive(Debug, Clone)]
pub struct RawSymbol {
    pub name: String,
    pub kind: String,
    pub start_line: u32,
    pub end_line: u32,
}

/// An import statement's specifier, as written in the source.
#[derive(Debug, Clone)]
pub struct RawImport {
    pub specifier: String,
    pub line: u32,
}

/// An outgoing name reference (call, extends, implements).
#[derive(Debug, Clone)]
pub struct RawReference {
    pub name: String,
    pub kind: DependencyKind,
    pub line: u32,
}

/// Raw artifacts for one source file.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    /// Project-relative path with forward slashes.
    pub path: String,
    pub language: Option<String>,
    pub origin: ParseOrigin,
    pub symbols: Vec<RawSymbol>,
    pub imports: Vec<RawImport>,
    pub exports: Vec<String>,
    pub references: Vec<RawReference>,
    pub modified_ms: u64,
}

/// Output of a full discovery pass.
#[derive(Debug)]
pub struct Discovery {
    pub root: PathBuf,
    pub files: Vec<DiscoveredFile>,
    pub fallback_count: usize,
    pub failed_count: usize,
}

pub struct Discoverer<'a> {
    config: &'a EngineConfig,
    show_progress: bool,
}

impl<'a> Discoverer<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self {
            config,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Walks `root` and parses every recognized file. Per-file parsing runs
    /// on the rayon pool; the merge into a single ordered list is
    /// single-threaded.
    pub fn discover(&self, root: &Path) -> Result<Discovery> {
        let walker = ProjectWalker::new(&self.config.include, &self.config.exclude)?;
        let rel_paths = walker.walk(root)?;

        if rel_paths.is_empty() {
            return Err(ModelError::Discovery(format!(
                "no source files to analyze under {}",
                root.display()
            )));
        }

        let bar = if self.show_progress {
            let bar = ProgressBar::new(rel_paths.len() as u64);
            bar.set_style(
                ProgressStyle::with_template("{bar:30} {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar
        } else {
            ProgressBar::hidden()
        };

        let files: Vec<DiscoveredFile> = rel_paths
            .par_iter()
            .map(|rel| {
                // Each worker gets its own registry and parser.
                let registry = LanguageRegistry::new();
                let file = parse_one(root, rel, &registry);
                bar.inc(1);
                file
            })
            .collect();

        bar.finish_and_clear();

        let fallback_count = files.iter().filter(|f| f.origin == ParseOrigin::Fallback).count();
        let failed_count = files.iter().filter(|f| f.origin == ParseOrigin::Failed).count();

        tracing::info!(
            files = files.len(),
            fallback = fallback_count,
            failed = failed_count,
            "discovery complete"
        );

        Ok(Discovery {
            root: root.to_path_buf(),
            files,
            fallback_count,
            failed_count,
        })
    }

    /// Parses only the given project-relative paths, for incremental
    /// updates. Paths that no longer exist are skipped; deletions are the
    /// caller's concern.
    pub fn discover_files(&self, root: &Path, rel_paths: &[String]) -> Vec<DiscoveredFile> {
        let mut files: Vec<DiscoveredFile> = rel_paths
            .par_iter()
            .filter(|rel| root.join(rel.as_str()).is_file())
            .map(|rel| {
                let registry = LanguageRegistry::new();
                parse_one(root, rel, &registry)
            })
            .collect();
        files.sort_by(|a, b| a.path.cmp(&b.path));
        files
    }
}

fn parse_one(root: &Path, rel: &str, registry: &LanguageRegistry) -> DiscoveredFile {
    let abs = root.join(rel);
    let modified_ms = modified_millis(&abs);

    let mut file = DiscoveredFile {
        path: rel.to_string(),
        language: None,
        origin: ParseOrigin::Failed,
        symbols: Vec::new(),
        imports: Vec::new(),
        exports: Vec::new(),
        references: Vec::new(),
        modified_ms,
    };

    let source = match std::fs::read_to_string(&abs) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!("unreadable file {}: {}", rel, e);
            return file;
        }
    };

    let grammar = registry.get_for_file(&abs);
    file.language = grammar.as_ref().map(|g| g.name().to_string());

    let structured = grammar
        .as_ref()
        .and_then(|g| SourceParser::new().extract(&source, g).ok())
        // A tree riddled with errors that yielded nothing usable counts as
        // a parse failure.
        .filter(|ext| !(ext.had_errors && ext.is_empty()));

    let (origin, extraction) = match structured {
        Some(ext) => (ParseOrigin::Structured, ext),
        None => {
            let recovered = FallbackExtractor::extract(&source);
            if recovered.is_empty() && !source.trim().is_empty() {
                tracing::warn!("no artifacts recovered from {}", rel);
                (ParseOrigin::Failed, recovered)
            } else {
                tracing::debug!("regex fallback used for {}", rel);
                (ParseOrigin::Fallback, recovered)
            }
        }
    };

    file.origin = origin;
    file.symbols = extraction.symbols;
    file.imports = extraction.imports;
    file.exports = extraction.exports;
    file.references = extraction.references;
    file
}

fn modified_millis(path: &Path) -> u64 {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
