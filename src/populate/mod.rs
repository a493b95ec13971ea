//! Populator: turns discovered raw artifacts plus a derived schema into a
//! Code Model instance — artifacts, dependency edges, and traced flows.

pub mod flows;
pub mod resolver;

use std::collections::{HashMap, HashSet};

use crate::config::EngineConfig;
use crate::discover::{DiscoveredFile, Discovery};
use crate::error::Result;
use crate::model::{
    Artifact, ChildElement, Dependency, DependencyKind, DependencyTarget, ElementType,
    FreshnessRecord, Instance, ParseOrigin, Schema, MODULE_TYPE,
};
use crate::summary::{HeuristicSummarizer, SummaryProvider};

use flows::FlowTracer;
use resolver::ReferenceResolver;

const EXPORT_KIND: &str = "export";

/// Result of population: the instance plus the (possibly further extended)
/// schema it conforms to.
pub struct Populated {
    pub instance: Instance,
    pub schema: Schema,
    /// Name references that matched no known definition and were skipped.
    pub skipped_references: usize,
}

pub struct Populator<'a> {
    config: &'a EngineConfig,
    summarizer: Box<dyn SummaryProvider>,
}

impl<'a> Populator<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self {
            config,
            summarizer: Box::new(HeuristicSummarizer),
        }
    }

    /// Swaps in an external summary provider (e.g. an LLM-backed one).
    pub fn with_summarizer(mut self, summarizer: Box<dyn SummaryProvider>) -> Self {
        self.summarizer = summarizer;
        self
    }

    pub fn populate(&self, discovery: &Discovery, mut schema: Schema) -> Result<Populated> {
        let known: HashSet<String> = discovery.files.iter().map(|f| f.path.clone()).collect();
        extend_for_exports(&mut schema, &discovery.files);

        let mut instance = Instance::default();

        // (a) one artifact per discovered file
        for file in &discovery.files {
            let artifact = self.artifact_for(file, &schema);
            instance.artifacts.insert(artifact.path.clone(), artifact);
        }

        // Definition index for name references: name -> defining paths,
        // in discovery order.
        let mut definitions: HashMap<String, Vec<String>> = HashMap::new();
        for artifact in instance.artifacts.values() {
            index_definitions(&mut definitions, artifact);
        }

        // (b) dependency edges
        let resolver = ReferenceResolver::new(self.config, &known);
        let mut seen: HashSet<(String, String, DependencyKind)> = HashSet::new();
        let mut skipped_references = 0usize;
        for file in &discovery.files {
            self.edges_for_file(
                file,
                &resolver,
                &definitions,
                &mut instance.dependencies,
                &mut seen,
                &mut skipped_references,
            );
        }
        if skipped_references > 0 {
            tracing::debug!(skipped_references, "name references without a known target");
        }

        // (c) flows from entry points
        let paths: Vec<String> = instance.artifacts.keys().cloned().collect();
        instance.flows = FlowTracer::new(self.config).trace(&paths, &instance.dependencies);

        instance.freshness = FreshnessRecord {
            file_count: discovery.files.len(),
            artifact_count: instance.artifacts.len(),
            ..FreshnessRecord::default()
        };

        Ok(Populated {
            instance,
            schema,
            skipped_references,
        })
    }

    /// Partial rebuild for an incremental update. Deleted artifacts leave
    /// their incoming edges behind as unresolved markers; reparsed files
    /// replace their artifact and every edge they own; flows are retraced
    /// over the merged graph.
    pub fn repopulate(
        &self,
        prior: &Instance,
        mut schema: Schema,
        reparsed: &[DiscoveredFile],
        deleted: &[String],
    ) -> Result<Populated> {
        let mut instance = prior.clone();
        let gone: HashSet<&str> = deleted.iter().map(|s| s.as_str()).collect();
        let touched: HashSet<&str> = reparsed.iter().map(|f| f.path.as_str()).collect();

        for path in deleted {
            if instance.artifacts.remove(path).is_some() {
                tracing::warn!(path, "artifact removed; incoming edges kept as unresolved");
            }
        }

        // Edges owned by deleted or reparsed files go away; edges into a
        // deleted artifact keep the old path as an unresolved specifier.
        instance.dependencies.retain(|d| {
            !gone.contains(d.from.as_str()) && !touched.contains(d.from.as_str())
        });
        for dep in &mut instance.dependencies {
            let unresolved = dep
                .to
                .resolved_path()
                .map_or(false, |to| gone.contains(to));
            if unresolved {
                if let DependencyTarget::Resolved(path) = &dep.to {
                    dep.to = DependencyTarget::Unresolved(path.clone());
                }
            }
        }

        extend_for_exports(&mut schema, reparsed);
        for file in reparsed {
            let artifact = self.artifact_for(file, &schema);
            instance.artifacts.insert(artifact.path.clone(), artifact);
        }

        let known: HashSet<String> = instance.artifacts.keys().cloned().collect();
        let mut definitions: HashMap<String, Vec<String>> = HashMap::new();
        for artifact in instance.artifacts.values() {
            index_definitions(&mut definitions, artifact);
        }

        let resolver = ReferenceResolver::new(self.config, &known);
        let mut seen: HashSet<(String, String, DependencyKind)> = instance
            .dependencies
            .iter()
            .map(edge_key)
            .collect();
        let mut skipped_references = 0usize;
        for file in reparsed {
            self.edges_for_file(
                file,
                &resolver,
                &definitions,
                &mut instance.dependencies,
                &mut seen,
                &mut skipped_references,
            );
        }

        let paths: Vec<String> = instance.artifacts.keys().cloned().collect();
        instance.flows = FlowTracer::new(self.config).trace(&paths, &instance.dependencies);

        instance.freshness.file_count = instance.artifacts.len();
        instance.freshness.artifact_count = instance.artifacts.len();

        Ok(Populated {
            instance,
            schema,
            skipped_references,
        })
    }

    fn artifact_for(&self, file: &DiscoveredFile, schema: &Schema) -> Artifact {
        let mut artifact = Artifact::new(&file.path, MODULE_TYPE);
        artifact.language = file.language.clone();
        artifact.modified_ms = file.modified_ms;
        artifact.parse_origin = file.origin;

        for symbol in &file.symbols {
            artifact.children.push(ChildElement {
                name: symbol.name.clone(),
                kind: schema.resolve_kind(&symbol.kind).to_string(),
                start_line: symbol.start_line,
                end_line: symbol.end_line,
            });
        }
        for export in &file.exports {
            if artifact.children.iter().any(|c| &c.name == export) {
                continue;
            }
            artifact.children.push(ChildElement {
                name: export.clone(),
                kind: schema.resolve_kind(EXPORT_KIND).to_string(),
                start_line: 0,
                end_line: 0,
            });
        }

        artifact
            .tags
            .insert(file.language.clone().unwrap_or_else(|| "unknown".to_string()));
        for child in &artifact.children {
            artifact.tags.insert(child.kind.clone());
        }
        if file.origin != ParseOrigin::Structured {
            artifact.tags.insert(file.origin.as_str().to_string());
        }

        artifact.summary = self.summarizer.summarize(file);
        artifact
    }

    fn edges_for_file(
        &self,
        file: &DiscoveredFile,
        resolver: &ReferenceResolver<'_>,
        definitions: &HashMap<String, Vec<String>>,
        dependencies: &mut Vec<Dependency>,
        seen: &mut HashSet<(String, String, DependencyKind)>,
        skipped_references: &mut usize,
    ) {
        let mut import_targets: HashSet<String> = HashSet::new();

        for import in &file.imports {
            let dep = match resolver.resolve(&file.path, &import.specifier) {
                Some(target) => {
                    import_targets.insert(target.clone());
                    Dependency::resolved(&file.path, target, DependencyKind::Import)
                }
                // Unresolved imports are evidence, not errors.
                None => Dependency::unresolved(&file.path, &import.specifier, DependencyKind::Import),
            };
            push_unique(dependencies, seen, dep);
        }

        for reference in &file.references {
            let Some(candidates) = definitions.get(reference.name.as_str()) else {
                *skipped_references += 1;
                continue;
            };
            match pick_target(&file.path, candidates, &import_targets) {
                Some(target) => {
                    let dep = Dependency::resolved(&file.path, target, reference.kind);
                    push_unique(dependencies, seen, dep);
                }
                None => *skipped_references += 1,
            }
        }
    }
}

/// Export children introduce an element type the deriver never saw.
fn extend_for_exports(schema: &mut Schema, files: &[DiscoveredFile]) {
    let export_count: usize = files
        .iter()
        .map(|f| {
            f.exports
                .iter()
                .filter(|e| !f.symbols.iter().any(|s| &s.name == *e))
                .count()
        })
        .sum();
    if export_count > 0 && !schema.contains(EXPORT_KIND) {
        schema.extend(
            ElementType {
                name: EXPORT_KIND.to_string(),
                attributes: vec!["name".to_string()],
                examples: Vec::new(),
            },
            "discovered while attaching export children",
            export_count,
        );
    }
}

fn index_definitions(definitions: &mut HashMap<String, Vec<String>>, artifact: &Artifact) {
    for child in &artifact.children {
        let paths = definitions.entry(child.name.clone()).or_default();
        if !paths.contains(&artifact.path) {
            paths.push(artifact.path.clone());
        }
    }
}

fn edge_key(dep: &Dependency) -> (String, String, DependencyKind) {
    let target_key = match &dep.to {
        DependencyTarget::Resolved(p) => format!("r:{}", p),
        DependencyTarget::Unresolved(s) => format!("u:{}", s),
    };
    (dep.from.clone(), target_key, dep.kind)
}

fn push_unique(
    dependencies: &mut Vec<Dependency>,
    seen: &mut HashSet<(String, String, DependencyKind)>,
    dep: Dependency,
) {
    if seen.insert(edge_key(&dep)) {
        dependencies.push(dep);
    }
}

/// Picks the defining artifact for a name reference: a definition in a file
/// the referencing file imports wins; otherwise the lexically smallest
/// definition. Self-references are dropped.
fn pick_target(
    from: &str,
    candidates: &[String],
    import_targets: &HashSet<String>,
) -> Option<String> {
    let mut external: Vec<&str> = candidates
        .iter()
        .filter(|c| c.as_str() != from)
        .map(|c| c.as_str())
        .collect();
    if external.is_empty() {
        return None;
    }
    external.sort_unstable();

    external
        .iter()
        .find(|c| import_targets.contains(**c))
        .or_else(|| external.first())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discover::{DiscoveredFile, RawImport, RawReference, RawSymbol};
    use std::path::PathBuf;

    fn symbol(name: &str, kind: &str) -> RawSymbol {
        RawSymbol {
            name: name.to_string(),
            kind: kind.to_string(),
            start_line: 1,
            end_line: 2,
        }
    }

    fn file(path: &str) -> DiscoveredFile {
        DiscoveredFile {
            path: path.to_string(),
            language: Some("typescript".to_string()),
            origin: ParseOrigin::Structured,
            symbols: Vec::new(),
            imports: Vec::new(),
            exports: Vec::new(),
            references: Vec::new(),
            modified_ms: 0,
        }
    }

    fn discovery(files: Vec<DiscoveredFile>) -> Discovery {
        Discovery {
            root: PathBuf::from("."),
            files,
            fallback_count: 0,
            failed_count: 0,
        }
    }

    fn schema_with_function() -> Schema {
        let mut schema = Schema::base();
        schema.extend(
            ElementType {
                name: "function".to_string(),
                attributes: vec!["name".to_string()],
                examples: Vec::new(),
            },
            "test",
            3,
        );
        schema
    }

    #[test]
    fn test_import_edge_resolved() {
        let config = EngineConfig::default();
        let mut a = file("src/a.ts");
        a.symbols.push(symbol("foo", "function"));
        a.exports.push("foo".to_string());
        let mut b = file("src/b.ts");
        b.imports.push(RawImport {
            specifier: "./a".to_string(),
            line: 1,
        });

        let populated = Populator::new(&config)
            .populate(&discovery(vec![a, b]), schema_with_function())
            .unwrap();

        let dep = populated
            .instance
            .dependencies
            .iter()
            .find(|d| d.from == "src/b.ts")
            .unwrap();
        assert_eq!(dep.to, DependencyTarget::Resolved("src/a.ts".to_string()));
        assert_eq!(dep.kind, DependencyKind::Import);
    }

    #[test]
    fn test_unresolved_import_kept() {
        let config = EngineConfig::default();
        let mut b = file("src/b.ts");
        b.imports.push(RawImport {
            specifier: "./missing".to_string(),
            line: 1,
        });

        let populated = Populator::new(&config)
            .populate(&discovery(vec![b]), Schema::base())
            .unwrap();

        assert_eq!(populated.instance.dependencies.len(), 1);
        assert_eq!(
            populated.instance.dependencies[0].to,
            DependencyTarget::Unresolved("./missing".to_string())
        );
    }

    #[test]
    fn test_call_reference_prefers_imported_file() {
        let config = EngineConfig::default();
        // Two files define `run`; the caller imports only one of them.
        let mut a = file("src/a.ts");
        a.symbols.push(symbol("run", "function"));
        let mut z = file("src/z.ts");
        z.symbols.push(symbol("run", "function"));
        let mut caller = file("src/caller.ts");
        caller.imports.push(RawImport {
            specifier: "./z".to_string(),
            line: 1,
        });
        caller.references.push(RawReference {
            name: "run".to_string(),
            kind: DependencyKind::Call,
            line: 2,
        });

        let populated = Populator::new(&config)
            .populate(&discovery(vec![a, z, caller]), schema_with_function())
            .unwrap();

        let call = populated
            .instance
            .dependencies
            .iter()
            .find(|d| d.kind == DependencyKind::Call)
            .unwrap();
        assert_eq!(call.to, DependencyTarget::Resolved("src/z.ts".to_string()));
    }

    #[test]
    fn test_unknown_reference_skipped() {
        let config = EngineConfig::default();
        let mut a = file("src/a.ts");
        a.references.push(RawReference {
            name: "console".to_string(),
            kind: DependencyKind::Call,
            line: 1,
        });

        let populated = Populator::new(&config)
            .populate(&discovery(vec![a]), Schema::base())
            .unwrap();

        assert!(populated.instance.dependencies.is_empty());
        assert_eq!(populated.skipped_references, 1);
    }

    #[test]
    fn test_children_and_schema_extension_for_exports() {
        let config = EngineConfig::default();
        let mut a = file("src/a.ts");
        a.symbols.push(symbol("foo", "function"));
        a.exports.push("foo".to_string()); // shadowed by the symbol
        a.exports.push("bar".to_string()); // export-only child

        let populated = Populator::new(&config)
            .populate(&discovery(vec![a]), schema_with_function())
            .unwrap();

        let artifact = populated.instance.artifact("src/a.ts").unwrap();
        assert_eq!(artifact.children.len(), 2);
        assert!(artifact.child("foo").is_some());
        assert_eq!(artifact.child("bar").unwrap().kind, "export");
        assert!(populated.schema.contains("export"));
        assert!(populated
            .schema
            .extensions
            .iter()
            .any(|e| e.element_type == "export"));
    }

    #[test]
    fn test_unknown_kind_folds_to_element() {
        let config = EngineConfig::default();
        let mut a = file("src/a.ts");
        a.symbols.push(symbol("Weird", "exotic"));

        let populated = Populator::new(&config)
            .populate(&discovery(vec![a]), Schema::base())
            .unwrap();

        let artifact = populated.instance.artifact("src/a.ts").unwrap();
        assert_eq!(artifact.child("Weird").unwrap().kind, "element");
    }

    #[test]
    fn test_duplicate_edges_collapsed() {
        let config = EngineConfig::default();
        let a = file("src/a.ts");
        let mut b = file("src/b.ts");
        for _ in 0..3 {
            b.imports.push(RawImport {
                specifier: "./a".to_string(),
                line: 1,
            });
        }

        let populated = Populator::new(&config)
            .populate(&discovery(vec![a, b]), Schema::base())
            .unwrap();

        assert_eq!(populated.instance.dependencies.len(), 1);
    }

    #[test]
    fn test_repopulate_deletion_unresolves_incoming_edges() {
        let config = EngineConfig::default();
        let mut a = file("src/a.ts");
        a.symbols.push(symbol("foo", "function"));
        let mut b = file("src/b.ts");
        b.imports.push(RawImport {
            specifier: "./a".to_string(),
            line: 1,
        });
        let populator = Populator::new(&config);
        let built = populator
            .populate(&discovery(vec![a, b]), schema_with_function())
            .unwrap();

        let updated = populator
            .repopulate(
                &built.instance,
                built.schema,
                &[],
                &["src/a.ts".to_string()],
            )
            .unwrap();

        assert!(updated.instance.artifact("src/a.ts").is_none());
        assert_eq!(updated.instance.dependencies.len(), 1);
        let dep = &updated.instance.dependencies[0];
        assert_eq!(dep.to, DependencyTarget::Unresolved("src/a.ts".to_string()));
    }

    #[test]
    fn test_repopulate_replaces_reparsed_edges() {
        let config = EngineConfig::default();
        let a = file("src/a.ts");
        let c = file("src/c.ts");
        let mut b = file("src/b.ts");
        b.imports.push(RawImport {
            specifier: "./a".to_string(),
            line: 1,
        });
        let populator = Populator::new(&config);
        let built = populator
            .populate(&discovery(vec![a, b, c]), Schema::base())
            .unwrap();

        // b now imports c instead of a
        let mut b2 = file("src/b.ts");
        b2.imports.push(RawImport {
            specifier: "./c".to_string(),
            line: 1,
        });
        let updated = populator
            .repopulate(&built.instance, built.schema, &[b2], &[])
            .unwrap();

        assert_eq!(updated.instance.dependencies.len(), 1);
        assert_eq!(
            updated.instance.dependencies[0].to,
            DependencyTarget::Resolved("src/c.ts".to_string())
        );
        assert_eq!(updated.instance.artifacts.len(), 3);
    }

    #[test]
    fn test_freshness_counts_recorded() {
        let config = EngineConfig::default();
        let populated = Populator::new(&config)
            .populate(&discovery(vec![file("a.ts"), file("b.ts")]), Schema::base())
            .unwrap();

        assert_eq!(populated.instance.freshness.file_count, 2);
        assert_eq!(populated.instance.freshness.artifact_count, 2);
    }
}
