//! One-shot build pipeline: discover, derive the schema, populate the
//! instance, stamp freshness, emit.

use std::path::Path;

use serde::Serialize;

use crate::config::EngineConfig;
use crate::discover::Discoverer;
use crate::emit::Emitter;
use crate::error::Result;
use crate::freshness;
use crate::populate::Populator;
use crate::schema::SchemaDeriver;

/// Counts a build run reports back, including how much of the model came
/// from degraded parses.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub files: usize,
    pub artifacts: usize,
    pub dependencies: usize,
    pub unresolved_dependencies: usize,
    pub flows: usize,
    pub fallback_files: usize,
    pub failed_files: usize,
    pub schema_extensions: usize,
    pub skipped_references: usize,
}

pub struct Builder<'a> {
    config: &'a EngineConfig,
    show_progress: bool,
}

impl<'a> Builder<'a> {
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

    pub fn build(&self, root: &Path, model_dir: &Path) -> Result<BuildReport> {
        let discovery = Discoverer::new(self.config)
            .with_progress(self.show_progress)
            .discover(root)?;
        let schema = SchemaDeriver::new(self.config).derive(&discovery);
        let populated = Populator::new(self.config).populate(&discovery, schema)?;

        let mut instance = populated.instance;
        freshness::stamp(root, &mut instance);
        Emitter::new(model_dir).emit(&populated.schema, &instance)?;

        Ok(BuildReport {
            files: discovery.files.len(),
            artifacts: instance.artifacts.len(),
            dependencies: instance.dependencies.len(),
            unresolved_dependencies: instance.unresolved_count(),
            flows: instance.flows.len(),
            fallback_files: discovery.fallback_count,
            failed_files: discovery.failed_count,
            schema_extensions: populated.schema.extensions.len(),
            skipped_references: populated.skipped_references,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::load_model;
    use crate::model::{DependencyKind, DependencyTarget};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_build_produces_import_edge() {
        let project = TempDir::new().unwrap();
        fs::write(project.path().join("a.ts"), "export function foo() { return 1; }\n").unwrap();
        fs::write(project.path().join("b.ts"), "import { foo } from './a';\nfoo();\n").unwrap();

        let config = EngineConfig::default();
        let model_dir = project.path().join(".code-model");
        let report = Builder::new(&config).build(project.path(), &model_dir).unwrap();

        assert_eq!(report.files, 2);
        assert_eq!(report.artifacts, 2);
        assert!(report.dependencies >= 1);

        let (_, instance) = load_model(&model_dir).unwrap();
        let import = instance
            .dependencies
            .iter()
            .find(|d| d.kind == DependencyKind::Import)
            .unwrap();
        assert_eq!(import.from, "b.ts");
        assert_eq!(import.to, DependencyTarget::Resolved("a.ts".to_string()));
    }
}
