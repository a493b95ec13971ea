//! Engine configuration. Heuristic constants (promotion threshold, risk
//! weights, rebuild boundary) live here rather than in the components.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Glob patterns a file must match to be discovered. Empty = all files.
    pub include: Vec<String>,
    /// Glob patterns that exclude files from discovery.
    pub exclude: Vec<String>,
    /// Occurrences of a kind within one directory scope needed to promote
    /// it to a first-class schema element type.
    pub promotion_threshold: usize,
    /// Globs matching flow entry-point artifacts.
    pub entry_points: Vec<String>,
    /// Maximum depth when tracing flows from an entry point.
    pub flow_depth: usize,
    /// Extensions tried when resolving an extensionless import specifier.
    pub resolve_extensions: Vec<String>,
    /// Index-file names tried when a specifier resolves to a directory.
    pub index_files: Vec<String>,
    /// Weight of the inverse-distance term in the impact risk score.
    pub distance_weight: f64,
    /// Weight of the fan-in term in the impact risk score.
    pub fanin_weight: f64,
    /// Fraction of instance files that may change before an incremental
    /// update gives way to a full rebuild.
    pub rebuild_change_fraction: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            exclude: Vec::new(),
            promotion_threshold: 3,
            entry_points: vec![
                "main.*".to_string(),
                "index.*".to_string(),
                "src/main.*".to_string(),
                "src/index.*".to_string(),
                "src/lib.rs".to_string(),
                "src/app.*".to_string(),
            ],
            flow_depth: 8,
            resolve_extensions: vec![
                ".ts".to_string(),
                ".tsx".to_string(),
                ".js".to_string(),
                ".jsx".to_string(),
                ".py".to_string(),
                ".rs".to_string(),
            ],
            index_files: vec![
                "index.ts".to_string(),
                "index.js".to_string(),
                "mod.rs".to_string(),
                "__init__.py".to_string(),
            ],
            distance_weight: 0.6,
            fanin_weight: 0.4,
            rebuild_change_fraction: 0.5,
        }
    }
}

impl EngineConfig {
    /// Loads `config.json` from the model directory, or defaults when the
    /// file does not exist.
    pub fn load_or_default(model_dir: &Path) -> Result<Self> {
        let path = model_dir.join("config.json");
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
