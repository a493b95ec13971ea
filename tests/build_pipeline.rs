//! End-to-end pipeline tests: discover -> derive -> populate -> emit, plus
//! freshness and incremental updates, against real files on disk.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use code_model::freshness::{FreshnessChecker, FreshnessState};
use code_model::model::{DependencyKind, DependencyTarget};
use code_model::{load_model, Builder, EngineConfig, ParseOrigin};

fn write_file(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn fixture() -> TempDir {
    let project = TempDir::new().unwrap();
    write_file(
        project.path(),
        "src/main.ts",
        "import { connect } from './db/pool';\nimport { login } from './auth/login';\n\nfunction start() {\n  connect();\n  login();\n}\nstart();\n",
    );
    write_file(
        project.path(),
        "src/db/pool.ts",
        "export function connect() { return 1; }\nexport function disconnect() { return 0; }\n",
    );
    write_file(
        project.path(),
        "src/auth/login.ts",
        "import { connect } from '../db/pool';\nexport function login() { return connect(); }\n",
    );
    write_file(
        project.path(),
        "src/auth/token.ts",
        "export function issueToken() { return 't'; }\nexport function revokeToken() {}\n",
    );
    project
}

#[test]
fn build_full_project() {
    let project = fixture();
    let config = EngineConfig::default();
    let model_dir = project.path().join(".code-model");

    let report = Builder::new(&config).build(project.path(), &model_dir).unwrap();

    assert_eq!(report.files, 4);
    assert_eq!(report.artifacts, 4);
    assert_eq!(report.fallback_files, 0);
    assert_eq!(report.failed_files, 0);
    assert!(report.flows >= 1, "src/main.ts is an entry point");

    let (schema, instance) = load_model(&model_dir).unwrap();
    // four function definitions in src/* directories promote the kind
    assert!(schema.contains("function"));

    let main = instance.artifact("src/main.ts").unwrap();
    assert_eq!(main.kind, "module");
    assert_eq!(main.language.as_deref(), Some("typescript"));
    assert!(main.child("start").is_some());

    let import = instance
        .dependencies
        .iter()
        .find(|d| d.from == "src/auth/login.ts" && d.kind == DependencyKind::Import)
        .unwrap();
    assert_eq!(import.to, DependencyTarget::Resolved("src/db/pool.ts".to_string()));

    let flow = instance.flows.get("startup:src/main.ts").unwrap();
    assert_eq!(flow.steps[0].artifact, "src/main.ts");
    assert!(flow.steps.iter().any(|s| s.artifact == "src/db/pool.ts"));
}

#[test]
fn emit_round_trip_is_byte_identical() {
    let project = fixture();
    let config = EngineConfig::default();
    let model_dir = project.path().join(".code-model");
    Builder::new(&config).build(project.path(), &model_dir).unwrap();

    let first_schema = fs::read_to_string(model_dir.join("schema.json")).unwrap();
    let first_instance = fs::read_to_string(model_dir.join("instance.json")).unwrap();

    let (schema, instance) = load_model(&model_dir).unwrap();
    code_model::Emitter::new(&model_dir).emit(&schema, &instance).unwrap();

    assert_eq!(first_schema, fs::read_to_string(model_dir.join("schema.json")).unwrap());
    assert_eq!(
        first_instance,
        fs::read_to_string(model_dir.join("instance.json")).unwrap()
    );
}

#[test]
fn no_silent_dangling_edges() {
    let project = fixture();
    // an import nothing resolves
    write_file(
        project.path(),
        "src/broken.ts",
        "import { gone } from './missing';\nexport function broken() {}\n",
    );
    let config = EngineConfig::default();
    let model_dir = project.path().join(".code-model");
    Builder::new(&config).build(project.path(), &model_dir).unwrap();

    let (_, instance) = load_model(&model_dir).unwrap();
    for dep in &instance.dependencies {
        if let Some(to) = dep.to.resolved_path() {
            assert!(
                instance.artifact(to).is_some(),
                "resolved edge {} -> {} has no target artifact",
                dep.from,
                to
            );
        }
    }
    let unresolved = instance
        .dependencies
        .iter()
        .find(|d| d.from == "src/broken.ts")
        .unwrap();
    assert_eq!(unresolved.to, DependencyTarget::Unresolved("./missing".to_string()));
}

#[test]
fn malformed_file_degrades_to_fallback() {
    let project = fixture();
    write_file(
        project.path(),
        "src/broken.ts",
        "import { x } from './db/pool';\nfunction half( {{{{\nexport function rescued() {}\n",
    );
    let config = EngineConfig::default();
    let model_dir = project.path().join(".code-model");
    let report = Builder::new(&config).build(project.path(), &model_dir).unwrap();

    // the run finishes and reports the degradation
    assert_eq!(report.artifacts, 5);

    let (_, instance) = load_model(&model_dir).unwrap();
    let broken = instance.artifact("src/broken.ts").unwrap();
    if broken.parse_origin == ParseOrigin::Fallback {
        assert!(broken.tags.contains("fallback"));
        assert!(broken.child("rescued").is_some());
    }
}

#[test]
fn freshness_idempotent_after_build() {
    let project = fixture();
    let config = EngineConfig::default();
    let model_dir = project.path().join(".code-model");
    Builder::new(&config).build(project.path(), &model_dir).unwrap();

    let checker = FreshnessChecker::new(&config, project.path(), &model_dir);
    assert_eq!(checker.check().unwrap().state, FreshnessState::Fresh);
    assert_eq!(checker.check().unwrap().state, FreshnessState::Fresh);
}

#[test]
fn deleting_a_file_updates_incrementally() {
    let project = fixture();
    let config = EngineConfig::default();
    let model_dir = project.path().join(".code-model");
    Builder::new(&config).build(project.path(), &model_dir).unwrap();

    fs::remove_file(project.path().join("src/db/pool.ts")).unwrap();

    let checker = FreshnessChecker::new(&config, project.path(), &model_dir);
    let outcome = checker.auto_update().unwrap();
    assert_eq!(outcome.report.state, FreshnessState::Incremental);
    assert!(outcome.updated);
    assert_eq!(outcome.report.deleted, vec!["src/db/pool.ts"]);

    let (_, instance) = load_model(&model_dir).unwrap();
    assert!(instance.artifact("src/db/pool.ts").is_none());
    // importers keep the evidence as unresolved edges
    let login_edge = instance
        .dependencies
        .iter()
        .find(|d| d.from == "src/auth/login.ts" && d.kind == DependencyKind::Import)
        .unwrap();
    assert!(matches!(login_edge.to, DependencyTarget::Unresolved(_)));

    // and the updated model is fresh again
    assert_eq!(checker.check().unwrap().state, FreshnessState::Fresh);
}

#[test]
fn editing_a_file_updates_its_artifact() {
    let project = fixture();
    let config = EngineConfig::default();
    let model_dir = project.path().join(".code-model");
    Builder::new(&config).build(project.path(), &model_dir).unwrap();

    // ensure the mtime moves even on coarse filesystem clocks
    std::thread::sleep(std::time::Duration::from_millis(20));
    write_file(
        project.path(),
        "src/auth/token.ts",
        "export function issueToken() { return 't'; }\nexport function refreshToken() { return 'r'; }\n",
    );

    let checker = FreshnessChecker::new(&config, project.path(), &model_dir);
    let outcome = checker.auto_update().unwrap();
    if outcome.report.state == FreshnessState::Fresh {
        // mtime granularity hid the edit; nothing to assert
        return;
    }
    assert!(outcome.updated);

    let (_, instance) = load_model(&model_dir).unwrap();
    let token = instance.artifact("src/auth/token.ts").unwrap();
    assert!(token.child("refreshToken").is_some());
    assert!(token.child("revokeToken").is_none());
}

#[test]
fn mixed_language_project() {
    let project = TempDir::new().unwrap();
    write_file(
        project.path(),
        "main.py",
        "import helper\n\ndef run():\n    return helper.assist()\n",
    );
    write_file(project.path(), "helper.py", "def assist():\n    return 1\n");
    write_file(
        project.path(),
        "src/lib.rs",
        "pub mod util;\n\npub fn entry() -> u32 {\n    42\n}\n",
    );
    write_file(project.path(), "src/util.rs", "pub fn helper() -> u32 { 1 }\n");

    let config = EngineConfig::default();
    let model_dir = project.path().join(".code-model");
    let report = Builder::new(&config).build(project.path(), &model_dir).unwrap();
    assert_eq!(report.files, 4);

    let (_, instance) = load_model(&model_dir).unwrap();
    let py_import = instance
        .dependencies
        .iter()
        .find(|d| d.from == "main.py")
        .unwrap();
    assert_eq!(py_import.to, DependencyTarget::Resolved("helper.py".to_string()));
    assert_eq!(
        instance.artifact("src/lib.rs").unwrap().language.as_deref(),
        Some("rust")
    );
}
