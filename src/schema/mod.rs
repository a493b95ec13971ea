//! Schema derivation: promotes observed artifact kinds to first-class
//! element types once they recur often enough within a directory scope.

use std::collections::HashMap;

use crate::config::EngineConfig;
use crate::discover::Discovery;
use crate::model::{ElementType, Schema};

pub struct SchemaDeriver<'a> {
    config: &'a EngineConfig,
}

impl<'a> SchemaDeriver<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Derives a schema from discovered artifacts. Deterministic given
    /// identical input ordering; ties break by first-seen order. Kinds that
    /// never reach the promotion threshold in any one directory fold into
    /// the generic catch-all type.
    pub fn derive(&self, discovery: &Discovery) -> Schema {
        let mut schema = Schema::base();

        // (kind, directory) -> occurrence count, plus first-seen bookkeeping.
        let mut scope_counts: HashMap<(String, String), usize> = HashMap::new();
        let mut kind_order: Vec<String> = Vec::new();
        let mut examples: HashMap<String, Vec<String>> = HashMap::new();

        for file in &discovery.files {
            let scope = directory_scope(&file.path);
            for symbol in &file.symbols {
                if !kind_order.contains(&symbol.kind) {
                    kind_order.push(symbol.kind.clone());
                }
                *scope_counts
                    .entry((symbol.kind.clone(), scope.clone()))
                    .or_insert(0) += 1;

                let sample = examples.entry(symbol.kind.clone()).or_default();
                if sample.len() < 3 && !sample.contains(&file.path) {
                    sample.push(file.path.clone());
                }
            }
        }

        for kind in &kind_order {
            let peak = scope_counts
                .iter()
                .filter(|((k, _), _)| k == kind)
                .map(|((_, scope), count)| (*count, scope.clone()))
                .max_by(|a, b| a.0.cmp(&b.0).then_with(|| b.1.cmp(&a.1)));

            let Some((count, scope)) = peak else { continue };
            if count < self.config.promotion_threshold {
                tracing::debug!(kind, count, "kind below promotion threshold, folded into element");
                continue;
            }

            schema.extend(
                ElementType {
                    name: kind.clone(),
                    attributes: vec!["name".to_string(), "lines".to_string()],
                    examples: examples.remove(kind).unwrap_or_default(),
                },
                format!("{} occurrence(s) of '{}' in {}", count, kind, display_scope(&scope)),
                count,
            );
        }

        schema
    }
}

fn directory_scope(path: &str) -> String {
    match path.rfind('/') {
        Some(idx) => path[..idx].to_string(),
        None => String::new(),
    }
}

fn display_scope(scope: &str) -> &str {
    if scope.is_empty() {
        "."
    } else {
        scope
    }
}
