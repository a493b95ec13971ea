//! Thin command surface: maps subcommands onto engine components and prints
//! structured JSON. Query-style failures come back as `{"error": ...}`
//! documents rather than process aborts.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;

use code_model::error::{ModelError, Result};
use code_model::freshness::FreshnessChecker;
use code_model::impact::{ImpactAnalyzer, ImpactRequest};
use code_model::model::DependencyKind;
use code_model::navigate::{Heading, Navigator, Strategy, WalkRequest};
use code_model::patterns::{PatternCategory, PatternDiscovery};
use code_model::query::{ModelQuery, QueryEngine, QueryType};
use code_model::{Builder, EngineConfig, LoadedModel};

#[derive(Parser)]
#[command(name = "code-model")]
#[command(about = "Builds and queries a structural model of a source project")]
#[command(version)]
#[command(after_long_help = r#"
EXAMPLES:
    # Build the model for the current directory
    code-model build

    # Show one artifact and its dependencies
    code-model explore artifact src/auth/login.ts
    code-model explore dependencies src/auth/login.ts --direction in

    # Pattern-match entities, expanding one hop
    code-model query entity 'src/auth/*' --depth 1

    # What breaks if this file changes?
    code-model impact 'src/db/pool.ts' --depth 3

    # Shortest path between two files
    code-model navigate path src/a.ts src/z.ts

    # Is the model stale? Apply an incremental update if possible
    code-model freshness --update
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Project root to analyze
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Directory holding the persisted model
    #[arg(long, default_value = ".code-model")]
    pub model: PathBuf,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan the project and build the model
    Build {
        /// Show a progress bar during parsing
        #[arg(long)]
        progress: bool,
    },

    /// Low-level lookups against the model
    Explore {
        #[command(subcommand)]
        command: ExploreCommands,
    },

    /// Structured subgraph query (entity | relation | structure | impact)
    Query {
        /// Query type
        query_type: String,

        /// Glob matched against paths and element names
        #[arg(default_value = "*")]
        pattern: String,

        /// Neighbor-expansion / traversal depth
        #[arg(long, default_value = "1")]
        depth: usize,

        /// Maximum result count
        #[arg(long, default_value = "50")]
        limit: usize,

        /// Dependency-kind filter (import | call | extends | implements)
        #[arg(long)]
        kind: Option<String>,

        /// Edge endpoint the pattern must match for relation queries
        /// (in | out | both)
        #[arg(long, default_value = "both")]
        direction: String,
    },

    /// Transitive impact of changing a target
    Impact {
        /// Glob matched against paths and element names
        target: String,

        /// Maximum traversal depth
        #[arg(long, default_value = "3")]
        depth: usize,

        /// Skip the reverse (dependents) pass
        #[arg(long)]
        no_reverse: bool,
    },

    /// Discover project conventions statistically
    Patterns {
        /// One category (naming | organization | modules | architecture);
        /// all run when omitted
        #[arg(long)]
        category: Option<String>,

        /// Find artifacts similar to this path instead
        #[arg(long)]
        similar: Option<String>,

        /// Maximum similar-artifact results
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Graph traversal primitives
    Navigate {
        #[command(subcommand)]
        command: NavigateCommands,
    },

    /// Compare the model against the project's current state
    Freshness {
        /// Apply an incremental update when the state allows it
        #[arg(long)]
        update: bool,
    },
}

#[derive(Subcommand)]
pub enum ExploreCommands {
    /// Show one artifact
    Artifact { path: String },

    /// List dependency edges touching an artifact
    Dependencies {
        path: String,

        /// in | out | both
        #[arg(long, default_value = "both")]
        direction: String,

        /// Dependency-kind filter
        #[arg(long)]
        kind: Option<String>,
    },

    /// Show one traced flow
    Flow { name: String },

    /// Case-insensitive substring search over paths, names, summaries, and tags
    Search { text: String },

    /// Aggregate model statistics
    Stats,
}

#[derive(Subcommand)]
pub enum NavigateCommands {
    /// Bounded traversal from a start artifact
    Walk {
        start: String,

        /// in | out | both
        #[arg(long, default_value = "out")]
        direction: String,

        /// Comma-separated dependency kinds to follow
        #[arg(long)]
        kinds: Option<String>,

        #[arg(long, default_value = "3")]
        depth: usize,

        #[arg(long, default_value = "100")]
        limit: usize,

        /// Depth-first instead of breadth-first
        #[arg(long)]
        dfs: bool,
    },

    /// Shortest path between two artifacts (undirected view)
    Path { from: String, to: String },

    /// Immediate adjacency of an artifact
    Neighbors {
        path: String,

        /// in | out | both
        #[arg(long, default_value = "both")]
        direction: String,

        /// Dependency-kind filter
        #[arg(long)]
        kind: Option<String>,
    },
}

pub fn run(cli: Cli) -> Result<()> {
    let config = EngineConfig::load_or_default(&cli.model)?;

    match cli.command {
        Commands::Build { progress } => {
            let report = Builder::new(&config)
                .with_progress(progress)
                .build(&cli.root, &cli.model)?;
            print_json(&report)
        }
        Commands::Explore { command } => {
            with_model(&cli.model, |model| explore(model, command))
        }
        Commands::Query {
            query_type,
            pattern,
            depth,
            limit,
            kind,
            direction,
        } => with_model(&cli.model, |model| {
            let query = ModelQuery {
                query_type: QueryType::from_str(&query_type).ok_or_else(|| {
                    ModelError::Query(format!("unknown query type '{}'", query_type))
                })?,
                pattern,
                depth,
                limit,
                kind: kind.as_deref().map(parse_kind).transpose()?,
                direction: parse_heading(&direction)?,
                include_reverse: true,
            };
            let result = QueryEngine::new(model, &config).run(&query)?;
            print_json(&result)
        }),
        Commands::Impact {
            target,
            depth,
            no_reverse,
        } => with_model(&cli.model, |model| {
            let report = ImpactAnalyzer::new(model, &config).analyze(&ImpactRequest {
                target,
                depth,
                include_reverse: !no_reverse,
            })?;
            print_json(&report)
        }),
        Commands::Patterns {
            category,
            similar,
            limit,
        } => with_model(&cli.model, |model| {
            let discovery = PatternDiscovery::new(model);
            let findings = match (similar, category) {
                (Some(path), _) => discovery.similar(&path, limit)?,
                (None, Some(name)) => {
                    let category = PatternCategory::from_str(&name).ok_or_else(|| {
                        ModelError::Query(format!("unknown pattern category '{}'", name))
                    })?;
                    discovery.discover(category)
                }
                (None, None) => discovery.discover_all(),
            };
            print_json(&findings)
        }),
        Commands::Navigate { command } => {
            with_model(&cli.model, |model| navigate(model, command))
        }
        Commands::Freshness { update } => {
            let checker = FreshnessChecker::new(&config, &cli.root, &cli.model);
            if update {
                let outcome = checker.auto_update()?;
                print_json(&json!({
                    "report": outcome.report,
                    "updated": outcome.updated,
                }))
            } else {
                print_json(&checker.check()?)
            }
        }
    }
}

fn explore(model: &LoadedModel, command: ExploreCommands) -> Result<()> {
    match command {
        ExploreCommands::Artifact { path } => {
            let artifact = model
                .artifact(&path)
                .ok_or_else(|| ModelError::Query(format!("unknown artifact '{}'", path)))?;
            print_json(artifact)
        }
        ExploreCommands::Dependencies {
            path,
            direction,
            kind,
        } => {
            let kind = kind.as_deref().map(parse_kind).transpose()?;
            let mut edges = Vec::new();
            for d in parse_heading(&direction)?.directions() {
                edges.extend(model.dependencies(&path, *d, kind));
            }
            print_json(&edges)
        }
        ExploreCommands::Flow { name } => {
            let flow = model
                .flow(&name)
                .ok_or_else(|| ModelError::Query(format!("unknown flow '{}'", name)))?;
            print_json(flow)
        }
        ExploreCommands::Search { text } => print_json(&model.search(&text)),
        ExploreCommands::Stats => print_json(&model.stats()),
    }
}

fn navigate(model: &LoadedModel, command: NavigateCommands) -> Result<()> {
    let navigator = Navigator::new(model);
    match command {
        NavigateCommands::Walk {
            start,
            direction,
            kinds,
            depth,
            limit,
            dfs,
        } => {
            let kinds: BTreeSet<DependencyKind> = match kinds {
                Some(list) => list
                    .split(',')
                    .map(|k| parse_kind(k.trim()))
                    .collect::<Result<_>>()?,
                None => BTreeSet::new(),
            };
            let nodes = navigator.walk(&WalkRequest {
                start,
                heading: parse_heading(&direction)?,
                kinds,
                depth,
                limit,
                strategy: if dfs { Strategy::Dfs } else { Strategy::Bfs },
            })?;
            print_json(&nodes)
        }
        NavigateCommands::Path { from, to } => match navigator.path(&from, &to)? {
            Some(path) => print_json(&path),
            None => print_json(&json!({ "path": null, "reason": "no path" })),
        },
        NavigateCommands::Neighbors {
            path,
            direction,
            kind,
        } => {
            let kind = kind.as_deref().map(parse_kind).transpose()?;
            let neighbors = navigator.neighbors(&path, parse_heading(&direction)?, kind)?;
            print_json(&neighbors)
        }
    }
}

/// Loads the model once and runs a read-side command against it. Query-type
/// errors become a structured `{"error": ...}` document instead of a
/// process failure.
fn with_model<F>(model_dir: &Path, f: F) -> Result<()>
where
    F: FnOnce(&LoadedModel) -> Result<()>,
{
    let outcome = LoadedModel::load(model_dir).and_then(|model| f(&model));
    match outcome {
        Ok(()) => Ok(()),
        Err(e @ (ModelError::Query(_) | ModelError::ModelNotFound(_))) => {
            print_json(&json!({ "error": e.to_string() }))
        }
        Err(e) => Err(e),
    }
}

fn parse_kind(s: &str) -> Result<DependencyKind> {
    DependencyKind::from_str(s)
        .ok_or_else(|| ModelError::Query(format!("unknown dependency kind '{}'", s)))
}

fn parse_heading(s: &str) -> Result<Heading> {
    match s {
        "in" => Ok(Heading::Incoming),
        "out" => Ok(Heading::Outgoing),
        "both" => Ok(Heading::Both),
        _ => Err(ModelError::Query(format!(
            "direction must be in, out, or both (got '{}')",
            s
        ))),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
