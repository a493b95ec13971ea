//! Freshness: decides whether a persisted model still matches the project,
//! and drives incremental updates when changes are confined to a known file
//! subset. Git provides the change history when available; outside git a
//! modification-time census is used instead.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::UNIX_EPOCH;

use serde::Serialize;
use xxhash_rust::xxh3::Xxh3;

use crate::config::EngineConfig;
use crate::discover::{Discoverer, ProjectWalker};
use crate::emit::{self, Emitter};
use crate::error::{ModelError, Result};
use crate::model::Instance;
use crate::populate::Populator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FreshnessState {
    Fresh,
    Incremental,
    RebuildRequired,
}

/// Structured freshness verdict. `reason` always explains the state, in
/// particular why a rebuild is required.
#[derive(Debug, Clone, Serialize)]
pub struct FreshnessReport {
    pub state: FreshnessState,
    pub reason: String,
    pub affected_files: usize,
    pub changed: Vec<String>,
    pub deleted: Vec<String>,
}

impl FreshnessReport {
    fn fresh(reason: impl Into<String>) -> Self {
        Self {
            state: FreshnessState::Fresh,
            reason: reason.into(),
            affected_files: 0,
            changed: Vec::new(),
            deleted: Vec::new(),
        }
    }

    fn rebuild(reason: impl Into<String>) -> Self {
        Self {
            state: FreshnessState::RebuildRequired,
            reason: reason.into(),
            affected_files: 0,
            changed: Vec::new(),
            deleted: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct UpdateOutcome {
    pub report: FreshnessReport,
    /// Whether an incremental update was applied and emitted.
    pub updated: bool,
}

pub struct FreshnessChecker<'a> {
    config: &'a EngineConfig,
    root: &'a Path,
    model_dir: PathBuf,
}

impl<'a> FreshnessChecker<'a> {
    pub fn new(config: &'a EngineConfig, root: &'a Path, model_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            root,
            model_dir: model_dir.into(),
        }
    }

    pub fn check(&self) -> Result<FreshnessReport> {
        let instance = match emit::load_model(&self.model_dir) {
            Ok((_, instance)) => instance,
            Err(ModelError::ModelNotFound(m)) => return Ok(FreshnessReport::rebuild(m)),
            Err(ModelError::Json(e)) => {
                return Ok(FreshnessReport::rebuild(format!("model files are corrupt: {}", e)))
            }
            Err(e) => return Err(e),
        };

        let walker = ProjectWalker::new(&self.config.include, &self.config.exclude)?;
        let current = walker.walk(self.root)?;

        // Identical census means every change is already incorporated, even
        // uncommitted ones present at build time.
        if worktree_digest(self.root, &current) == instance.freshness.worktree_digest {
            return Ok(FreshnessReport::fresh("worktree unchanged since last build"));
        }

        let current_set: HashSet<&str> = current.iter().map(|s| s.as_str()).collect();
        let (mut changed, mut deleted) = match &instance.freshness.marker {
            Some(marker) => {
                if git_head(self.root).is_none() {
                    return Ok(FreshnessReport::rebuild(
                        "model was built from a git marker but git history is unavailable",
                    ));
                }
                match git_changes(self.root, marker)? {
                    Some(changes) => changes,
                    None => {
                        return Ok(FreshnessReport::rebuild(format!(
                            "recorded marker {} is not in the repository history",
                            marker
                        )))
                    }
                }
            }
            None => mtime_changes(self.root, &current, &instance),
        };

        // Only files the model covers (or would cover) matter.
        changed.retain(|p| current_set.contains(p.as_str()));
        deleted.retain(|p| instance.artifacts.contains_key(p));
        changed.sort();
        changed.dedup();
        deleted.sort();
        deleted.dedup();

        let affected = changed.len() + deleted.len();
        if affected == 0 {
            return Ok(FreshnessReport::fresh("no relevant changes since last build"));
        }

        let baseline = instance.freshness.file_count.max(1);
        if affected as f64 / baseline as f64 > self.config.rebuild_change_fraction {
            return Ok(FreshnessReport {
                state: FreshnessState::RebuildRequired,
                reason: format!(
                    "{} of {} indexed files changed, beyond the incremental-update boundary",
                    affected, baseline
                ),
                affected_files: affected,
                changed,
                deleted,
            });
        }

        Ok(FreshnessReport {
            state: FreshnessState::Incremental,
            reason: format!("{} file(s) changed since last build", affected),
            affected_files: affected,
            changed,
            deleted,
        })
    }

    /// Applies an incremental update when the state allows it. A
    /// rebuild-required state is reported back, never silently escalated to
    /// a full rebuild.
    pub fn auto_update(&self) -> Result<UpdateOutcome> {
        let report = self.check()?;
        if report.state != FreshnessState::Incremental {
            return Ok(UpdateOutcome {
                report,
                updated: false,
            });
        }

        let (schema, instance) = emit::load_model(&self.model_dir)?;

        // Changed files plus anything with an edge into the changed or
        // deleted set get re-parsed.
        let mut affected: BTreeSet<String> = report.changed.iter().cloned().collect();
        let targets: HashSet<&str> = report
            .changed
            .iter()
            .chain(report.deleted.iter())
            .map(String::as_str)
            .collect();
        for dep in &instance.dependencies {
            if let Some(to) = dep.to.resolved_path() {
                if targets.contains(to) {
                    affected.insert(dep.from.clone());
                }
            }
        }
        let affected: Vec<String> = affected
            .into_iter()
            .filter(|p| !report.deleted.contains(p))
            .collect();

        let reparsed = Discoverer::new(self.config).discover_files(self.root, &affected);
        let populated =
            Populator::new(self.config).repopulate(&instance, schema, &reparsed, &report.deleted)?;

        let mut updated_instance = populated.instance;
        stamp(self.root, &mut updated_instance);
        Emitter::new(&self.model_dir).emit(&populated.schema, &updated_instance)?;

        tracing::info!(
            reparsed = reparsed.len(),
            deleted = report.deleted.len(),
            "incremental update applied"
        );
        Ok(UpdateOutcome {
            report,
            updated: true,
        })
    }
}

/// Fills the freshness record's marker, census digest, and build time.
/// Counts are already set by the Populator.
pub fn stamp(root: &Path, instance: &mut Instance) {
    let paths: Vec<String> = instance.artifacts.keys().cloned().collect();
    instance.freshness.marker = git_head(root);
    instance.freshness.worktree_digest = worktree_digest(root, &paths);
    instance.freshness.built_at_ms = std::time::SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
}

/// xxh3 over (path, mtime) pairs of the given project-relative files.
/// Stable across runs when nothing on disk moved.
fn worktree_digest(root: &Path, rel_paths: &[String]) -> u64 {
    let mut hasher = Xxh3::new();
    for rel in rel_paths {
        hasher.update(rel.as_bytes());
        hasher.update(&[0]);
        hasher.update(&modified_millis(&root.join(rel)).to_le_bytes());
    }
    hasher.digest()
}

fn modified_millis(path: &Path) -> u64 {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn git_head(root: &Path) -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(root)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let head = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if head.is_empty() {
        None
    } else {
        Some(head)
    }
}

/// Changed and deleted paths relative to `marker`, from `git diff` against
/// the worktree plus untracked files from `git status`. `None` when the
/// marker is unknown to the repository. Git reports paths relative to the
/// repository root; they are re-rooted onto the project root, and paths
/// outside it are dropped.
fn git_changes(root: &Path, marker: &str) -> Result<Option<(Vec<String>, Vec<String>)>> {
    let diff = Command::new("git")
        .args(["diff", "--name-status", marker])
        .current_dir(root)
        .output()?;
    if !diff.status.success() {
        return Ok(None);
    }

    let prefix = git_prefix(root);
    let mut changed = Vec::new();
    let mut deleted = Vec::new();
    for line in String::from_utf8_lossy(&diff.stdout).lines() {
        let mut fields = line.split('\t');
        let Some(status) = fields.next() else { continue };
        match status.chars().next() {
            Some('D') => {
                if let Some(path) = fields.next().and_then(|p| project_relative(p, &prefix)) {
                    deleted.push(path);
                }
            }
            Some('R') => {
                // rename: old path gone, new path changed
                if let Some(old) = fields.next().and_then(|p| project_relative(p, &prefix)) {
                    deleted.push(old);
                }
                if let Some(new) = fields.next().and_then(|p| project_relative(p, &prefix)) {
                    changed.push(new);
                }
            }
            Some(_) => {
                if let Some(path) = fields.next().and_then(|p| project_relative(p, &prefix)) {
                    changed.push(path);
                }
            }
            None => {}
        }
    }

    // Untracked files never show in a diff against a commit. Listing each
    // file keeps new directories from collapsing into one `dir/` entry.
    let status = Command::new("git")
        .args(["status", "--porcelain", "--untracked-files=all"])
        .current_dir(root)
        .output()?;
    if status.status.success() {
        for line in String::from_utf8_lossy(&status.stdout).lines() {
            if let Some(path) = line
                .strip_prefix("?? ")
                .and_then(|p| project_relative(p, &prefix))
            {
                changed.push(path);
            }
        }
    }

    Ok(Some((changed, deleted)))
}

/// Project root's path inside the repository (e.g. `pkg/`), empty when the
/// project root is the repository root.
fn git_prefix(root: &Path) -> String {
    Command::new("git")
        .args(["rev-parse", "--show-prefix"])
        .current_dir(root)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .unwrap_or_default()
}

fn project_relative(path: &str, prefix: &str) -> Option<String> {
    if prefix.is_empty() {
        return Some(path.to_string());
    }
    path.strip_prefix(prefix).map(str::to_string)
}

/// Modification-time comparison for projects outside git: a file is changed
/// when its mtime no longer matches the recorded artifact.
fn mtime_changes(root: &Path, current: &[String], instance: &Instance) -> (Vec<String>, Vec<String>) {
    let current_set: HashSet<&str> = current.iter().map(|s| s.as_str()).collect();
    let mut changed = Vec::new();
    for rel in current {
        match instance.artifacts.get(rel) {
            Some(artifact) if artifact.modified_ms == modified_millis(&root.join(rel)) => {}
            _ => changed.push(rel.clone()),
        }
    }
    let deleted = instance
        .artifacts
        .keys()
        .filter(|p| !current_set.contains(p.as_str()))
        .cloned()
        .collect();
    (changed, deleted)
}
