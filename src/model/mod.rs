//! Persisted data model: artifacts, dependencies, flows, schema, instance.
//!
//! Everything here round-trips through serde_json. Maps are `BTreeMap` so a
//! freshly loaded instance re-serializes to the identical document.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// How a file's artifacts were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseOrigin {
    /// Full tree-sitter AST walk.
    Structured,
    /// Regex recovery after a failed structured parse.
    Fallback,
    /// Neither parser produced anything usable.
    Failed,
}

impl ParseOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseOrigin::Structured => "structured",
            ParseOrigin::Fallback => "fallback",
            ParseOrigin::Failed => "failed",
        }
    }
}

/// An in-file element (function, class, ...) attached to a file artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildElement {
    pub name: String,
    pub kind: String,
    pub start_line: u32,
    pub end_line: u32,
}

/// A discovered structural unit, keyed by project-relative path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub path: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ChildElement>,
    pub summary: String,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    /// Last-modified signal in milliseconds since the epoch.
    pub modified_ms: u64,
    pub parse_origin: ParseOrigin,
}

impl Artifact {
    pub fn new(path: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: kind.into(),
            language: None,
            children: Vec::new(),
            summary: String::new(),
            tags: BTreeSet::new(),
            modified_ms: 0,
            parse_origin: ParseOrigin::Structured,
        }
    }

    /// Names exported or defined at the top level of this artifact.
    pub fn child(&self, name: &str) -> Option<&ChildElement> {
        self.children.iter().find(|c| c.name == name)
    }
}

/// Kind of a directed dependency edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    Import,
    Call,
    Extends,
    Implements,
}

impl DependencyKind {
    pub const ALL: [DependencyKind; 4] = [
        DependencyKind::Import,
        DependencyKind::Call,
        DependencyKind::Extends,
        DependencyKind::Implements,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyKind::Import => "import",
            DependencyKind::Call => "call",
            DependencyKind::Extends => "extends",
            DependencyKind::Implements => "implements",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "import" => Some(DependencyKind::Import),
            "call" => Some(DependencyKind::Call),
            "extends" => Some(DependencyKind::Extends),
            "implements" => Some(DependencyKind::Implements),
            _ => None,
        }
    }
}

/// Target of a dependency edge. Unresolved references are kept as evidence
/// of attempted linkage, never silently dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "path", rename_all = "lowercase")]
pub enum DependencyTarget {
    /// Project-relative path of an artifact present in the instance.
    Resolved(String),
    /// The original specifier that could not be resolved.
    Unresolved(String),
}

impl DependencyTarget {
    pub fn resolved_path(&self) -> Option<&str> {
        match self {
            DependencyTarget::Resolved(p) => Some(p),
            DependencyTarget::Unresolved(_) => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, DependencyTarget::Resolved(_))
    }
}

/// Directed edge between artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    pub from: String,
    pub to: DependencyTarget,
    pub kind: DependencyKind,
}

impl Dependency {
    pub fn resolved(from: impl Into<String>, to: impl Into<String>, kind: DependencyKind) -> Self {
        Self {
            from: from.into(),
            to: DependencyTarget::Resolved(to.into()),
            kind,
        }
    }

    pub fn unresolved(
        from: impl Into<String>,
        specifier: impl Into<String>,
        kind: DependencyKind,
    ) -> Self {
        Self {
            from: from.into(),
            to: DependencyTarget::Unresolved(specifier.into()),
            kind,
        }
    }
}

/// One step of a traced flow: an artifact, optionally narrowed to a child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowStep {
    pub artifact: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element: Option<String>,
}

/// A named, ordered chain of artifact references representing a traced
/// execution/activation path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub name: String,
    pub steps: Vec<FlowStep>,
}

/// Definition of one element type in the schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementType {
    pub name: String,
    /// Attributes artifacts of this type are expected to carry.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<String>,
    /// Sample source paths that evidenced this type.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<String>,
}

/// Audit record for a schema extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaExtension {
    pub element_type: String,
    pub reason: String,
    pub evidence_count: usize,
    /// Position in the extension sequence, for stable ordering.
    pub sequence: usize,
}

/// Typed catalog of artifact/element kinds, extensible as new patterns
/// are observed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub element_types: BTreeMap<String, ElementType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<SchemaExtension>,
}

/// Generic catch-all element type for kinds below the promotion threshold.
pub const GENERIC_ELEMENT: &str = "element";
/// Element type of every file artifact.
pub const MODULE_TYPE: &str = "module";

impl Schema {
    /// Schema seeded with the two always-present types.
    pub fn base() -> Self {
        let mut schema = Self::default();
        schema.element_types.insert(
            MODULE_TYPE.to_string(),
            ElementType {
                name: MODULE_TYPE.to_string(),
                attributes: vec![
                    "path".to_string(),
                    "language".to_string(),
                    "children".to_string(),
                ],
                examples: Vec::new(),
            },
        );
        schema.element_types.insert(
            GENERIC_ELEMENT.to_string(),
            ElementType {
                name: GENERIC_ELEMENT.to_string(),
                attributes: vec!["name".to_string(), "lines".to_string()],
                examples: Vec::new(),
            },
        );
        schema
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.element_types.contains_key(kind)
    }

    /// Adds an element type and logs the extension. No-op if already present.
    pub fn extend(&mut self, definition: ElementType, reason: impl Into<String>, evidence: usize) {
        if self.element_types.contains_key(&definition.name) {
            return;
        }
        let sequence = self.extensions.len();
        self.extensions.push(SchemaExtension {
            element_type: definition.name.clone(),
            reason: reason.into(),
            evidence_count: evidence,
            sequence,
        });
        self.element_types.insert(definition.name.clone(), definition);
    }

    /// Maps an observed kind to a schema type, folding unknown kinds into
    /// the generic catch-all.
    pub fn resolve_kind<'a>(&self, kind: &'a str) -> &'a str {
        if self.contains(kind) {
            kind
        } else {
            GENERIC_ELEMENT
        }
    }
}

/// Where the project stood when the instance was built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FreshnessRecord {
    /// Git HEAD at build time; absent for non-git projects.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,
    /// Digest of the uncommitted-change set (or mtime census outside git).
    pub worktree_digest: u64,
    pub file_count: usize,
    pub artifact_count: usize,
    pub built_at_ms: u64,
}

/// The concrete graph for one project snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub artifacts: BTreeMap<String, Artifact>,
    pub dependencies: Vec<Dependency>,
    pub flows: BTreeMap<String, Flow>,
    pub freshness: FreshnessRecord,
}

impl Instance {
    pub fn artifact(&self, path: &str) -> Option<&Artifact> {
        self.artifacts.get(path)
    }

    /// Count of dependencies with an unresolved target.
    pub fn unresolved_count(&self) -> usize {
        self.dependencies.iter().filter(|d| !d.to.is_resolved()).count()
    }
}
