//! Emitter: validates a populated model against its schema and persists it
//! as two JSON documents under the model directory. Writes go through a
//! temp-file rename and are guarded by a lock file so concurrent builds
//! cannot interleave.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::{ModelError, Result};
use crate::model::{Instance, Schema};

pub const MODEL_DIR: &str = ".code-model";
pub const SCHEMA_FILE: &str = "schema.json";
pub const INSTANCE_FILE: &str = "instance.json";
const LOCK_FILE: &str = ".lock";

/// Held while an emit is in progress. The lock file is removed on drop.
struct EmitLock {
    path: PathBuf,
}

impl EmitLock {
    fn acquire(model_dir: &Path) -> Result<Self> {
        let path = model_dir.join(LOCK_FILE);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(Self { path }),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Err(ModelError::Locked(
                format!("{} exists; another build may be running", path.display()),
            )),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for EmitLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release emit lock");
        }
    }
}

pub struct Emitter {
    model_dir: PathBuf,
}

impl Emitter {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
        }
    }

    /// Validates and writes the model. Validation collects every violation
    /// before failing so one pass reports them all.
    pub fn emit(&self, schema: &Schema, instance: &Instance) -> Result<()> {
        let violations = validate(schema, instance);
        if !violations.is_empty() {
            return Err(ModelError::SchemaValidation(violations));
        }

        fs::create_dir_all(&self.model_dir)?;
        let _lock = EmitLock::acquire(&self.model_dir)?;

        write_atomic(&self.model_dir.join(SCHEMA_FILE), schema)?;
        write_atomic(&self.model_dir.join(INSTANCE_FILE), instance)?;

        tracing::info!(
            dir = %self.model_dir.display(),
            artifacts = instance.artifacts.len(),
            dependencies = instance.dependencies.len(),
            flows = instance.flows.len(),
            "model emitted"
        );
        Ok(())
    }
}

/// Loads a previously emitted model from `model_dir`.
pub fn load_model(model_dir: &Path) -> Result<(Schema, Instance)> {
    let schema_path = model_dir.join(SCHEMA_FILE);
    let instance_path = model_dir.join(INSTANCE_FILE);
    if !schema_path.exists() || !instance_path.exists() {
        return Err(ModelError::ModelNotFound(format!(
            "no model at {}; run a build first",
            model_dir.display()
        )));
    }
    let schema: Schema = serde_json::from_str(&fs::read_to_string(&schema_path)?)?;
    let instance: Instance = serde_json::from_str(&fs::read_to_string(&instance_path)?)?;
    Ok((schema, instance))
}

/// Every consistency rule the persisted model must satisfy. Returns all
/// violations, not just the first.
pub fn validate(schema: &Schema, instance: &Instance) -> Vec<String> {
    let mut violations = Vec::new();

    for (path, artifact) in &instance.artifacts {
        if path != &artifact.path {
            violations.push(format!(
                "artifact keyed as '{}' carries path '{}'",
                path, artifact.path
            ));
        }
        if !schema.contains(&artifact.kind) {
            violations.push(format!(
                "artifact '{}' has kind '{}' not present in schema",
                path, artifact.kind
            ));
        }
        for child in &artifact.children {
            if !schema.contains(&child.kind) {
                violations.push(format!(
                    "child '{}' of '{}' has kind '{}' not present in schema",
                    child.name, path, child.kind
                ));
            }
        }
    }

    for dep in &instance.dependencies {
        if !instance.artifacts.contains_key(&dep.from) {
            violations.push(format!(
                "dependency from unknown artifact '{}'",
                dep.from
            ));
        }
        if let Some(to) = dep.to.resolved_path() {
            if !instance.artifacts.contains_key(to) {
                violations.push(format!(
                    "dependency '{}' -> '{}' targets an artifact not in the instance",
                    dep.from, to
                ));
            }
        }
    }

    for (name, flow) in &instance.flows {
        if flow.steps.is_empty() {
            violations.push(format!("flow '{}' has no steps", name));
        }
        if name != &flow.name {
            violations.push(format!("flow keyed as '{}' is named '{}'", name, flow.name));
        }
        for step in &flow.steps {
            if !instance.artifacts.contains_key(&step.artifact) {
                violations.push(format!(
                    "flow '{}' references unknown artifact '{}'",
                    name, step.artifact
                ));
            }
        }
    }

    violations
}

fn write_atomic<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_string_pretty(value)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
