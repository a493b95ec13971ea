//! Structured extraction: tree-sitter parse plus query-driven capture of
//! symbols, imports, exports, and outgoing references.

use std::sync::Arc;

use tree_sitter::StreamingIterator;

use crate::error::{ModelError, Result};
use crate::languages::LanguageGrammar;
use crate::model::DependencyKind;

use super::{RawImport, RawReference, RawSymbol};

/// Everything the structured parse recovered from one file.
#[derive(Debug, Default)]
pub struct Extraction {
    pub symbols: Vec<RawSymbol>,
    pub imports: Vec<RawImport>,
    pub exports: Vec<String>,
    pub references: Vec<RawReference>,
    /// The parse tree contained error nodes; artifacts may be incomplete.
    pub had_errors: bool,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty() && self.imports.is_empty() && self.exports.is_empty()
    }
}

pub struct SourceParser;

impl SourceParser {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, source: &str, grammar: &Arc<dyn LanguageGrammar>) -> Result<Extraction> {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&grammar.language())
            .map_err(|e| ModelError::Parse(e.to_string()))?;

        let tree = parser
            .parse(source, None)
            .ok_or_else(|| ModelError::Parse("failed to parse source".to_string()))?;

        let mut extraction = Extraction {
            had_errors: tree.root_node().has_error(),
            ..Extraction::default()
        };

        self.extract_symbols(source, grammar, &tree, &mut extraction)?;
        self.extract_imports(source, grammar, &tree, &mut extraction)?;
        self.extract_exports(source, grammar, &tree, &mut extraction);
        self.extract_references(source, grammar, &tree, &mut extraction);

        Ok(extraction)
    }

    fn extract_symbols(
        &self,
        source: &str,
        grammar: &Arc<dyn LanguageGrammar>,
        tree: &tree_sitter::Tree,
        out: &mut Extraction,
    ) -> Result<()> {
        let query_str = grammar.symbols_query();
        let query = tree_sitter::Query::new(&grammar.language(), query_str)
            .map_err(|e| ModelError::Parse(format!("invalid symbols query: {}", e)))?;

        let mut cursor = tree_sitter::QueryCursor::new();
        let mut matches = cursor.matches(&query, tree.root_node(), source.as_bytes());

        while let Some(m) = matches.next() {
            let mut name: Option<&str> = None;
            let mut kind: Option<&str> = None;
            let mut node: Option<tree_sitter::Node> = None;

            for capture in m.captures {
                let capture_name = query.capture_names()[capture.index as usize];
                if capture_name == "name" {
                    name = capture.node.utf8_text(source.as_bytes()).ok();
                } else {
                    kind = Some(capture_name);
                    node = Some(capture.node);
                }
            }

            if let (Some(name), Some(kind), Some(node)) = (name, kind, node) {
                out.symbols.push(RawSymbol {
                    name: name.to_string(),
                    kind: kind.to_string(),
                    start_line: node.start_position().row as u32 + 1,
                    end_line: node.end_position().row as u32 + 1,
                });
            }
        }

        Ok(())
    }

    fn extract_imports(
        &self,
        source: &str,
        grammar: &Arc<dyn LanguageGrammar>,
        tree: &tree_sitter::Tree,
        out: &mut Extraction,
    ) -> Result<()> {
        let query_str = grammar.imports_query();
        let query = tree_sitter::Query::new(&grammar.language(), query_str)
            .map_err(|e| ModelError::Parse(format!("invalid imports query: {}", e)))?;

        let mut cursor = tree_sitter::QueryCursor::new();
        let mut matches = cursor.matches(&query, tree.root_node(), source.as_bytes());

        while let Some(m) = matches.next() {
            for capture in m.captures {
                let capture_name = query.capture_names()[capture.index as usize];
                if capture_name != "source" {
                    continue;
                }
                if let Ok(text) = capture.node.utf8_text(source.as_bytes()) {
                    let specifier = text.trim_matches(|c| c == '"' || c == '\'' || c == '`');
                    if !specifier.is_empty() {
                        out.imports.push(RawImport {
                            specifier: specifier.to_string(),
                            line: capture.node.start_position().row as u32 + 1,
                        });
                    }
                }
            }
        }

        Ok(())
    }

    fn extract_exports(
        &self,
        source: &str,
        grammar: &Arc<dyn LanguageGrammar>,
        tree: &tree_sitter::Tree,
        out: &mut Extraction,
    ) {
        let query_str = grammar.exports_query();
        if query_str.trim().is_empty() {
            return;
        }

        // Export capture is best-effort: a query that fails to compile is a
        // warning, not a parse failure.
        let query = match tree_sitter::Query::new(&grammar.language(), query_str) {
            Ok(q) => q,
            Err(e) => {
                tracing::warn!("invalid exports query for {}: {}", grammar.name(), e);
                return;
            }
        };

        let mut cursor = tree_sitter::QueryCursor::new();
        let mut matches = cursor.matches(&query, tree.root_node(), source.as_bytes());

        while let Some(m) = matches.next() {
            for capture in m.captures {
                let capture_name = query.capture_names()[capture.index as usize];
                let Ok(text) = capture.node.utf8_text(source.as_bytes()) else {
                    continue;
                };
                match capture_name {
                    "name" => out.exports.push(text.to_string()),
                    // Re-exports contribute an import edge to the source module.
                    "source" => {
                        let specifier = text.trim_matches(|c| c == '"' || c == '\'' || c == '`');
                        if !specifier.is_empty() {
                            out.imports.push(RawImport {
                                specifier: specifier.to_string(),
                                line: capture.node.start_position().row as u32 + 1,
                            });
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    fn extract_references(
        &self,
        source: &str,
        grammar: &Arc<dyn LanguageGrammar>,
        tree: &tree_sitter::Tree,
        out: &mut Extraction,
    ) {
        let query_str = grammar.calls_query();
        if query_str.trim().is_empty() {
            return;
        }

        let query = match tree_sitter::Query::new(&grammar.language(), query_str) {
            Ok(q) => q,
            Err(e) => {
                tracing::warn!("invalid calls query for {}: {}", grammar.name(), e);
                return;
            }
        };

        let mut cursor = tree_sitter::QueryCursor::new();
        let mut matches = cursor.matches(&query, tree.root_node(), source.as_bytes());

        while let Some(m) = matches.next() {
            for capture in m.captures {
                let capture_name = query.capture_names()[capture.index as usize];
                let kind = match capture_name {
                    "callee" => DependencyKind::Call,
                    "extends" => DependencyKind::Extends,
                    "implements" => DependencyKind::Implements,
                    _ => continue,
                };
                if let Ok(text) = capture.node.utf8_text(source.as_bytes()) {
                    out.references.push(RawReference {
                        name: text.to_string(),
                        kind,
                        line: capture.node.start_position().row as u32 + 1,
                    });
                }
            }
        }
    }
}

impl Default for SourceParser {
    fn default() -> Self {
        Self::new()
    }
}
