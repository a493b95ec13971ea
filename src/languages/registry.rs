use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use super::{python::PythonGrammar, rust_lang::RustGrammar, typescript::TypeScriptGrammar};

/// One recognized language: its tree-sitter grammar plus the queries that
/// pull artifacts out of a parse tree.
pub trait LanguageGrammar: Send + Sync {
    fn name(&self) -> &'static str;
    fn file_extensions(&self) -> &[&'static str];
    fn language(&self) -> tree_sitter::Language;

    /// Captures top-level functions/classes/etc. Container capture names
    /// (`function`, `class`, `interface`, ...) carry the element kind; the
    /// `name` capture carries the identifier.
    fn symbols_query(&self) -> &str;

    /// Captures import specifiers under `source`.
    fn imports_query(&self) -> &str;

    /// Captures exported names under `name` and re-export sources under
    /// `source`. Languages without export syntax leave this empty.
    fn exports_query(&self) -> &str {
        ""
    }

    /// Captures outgoing references: `callee`, `extends`, `implements`.
    fn calls_query(&self) -> &str {
        ""
    }
}

pub struct LanguageRegistry {
    languages: HashMap<String, Arc<dyn LanguageGrammar>>,
    extension_map: HashMap<String, String>,
}

impl LanguageRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            languages: HashMap::new(),
            extension_map: HashMap::new(),
        };

        registry.register(Arc::new(TypeScriptGrammar));
        registry.register(Arc::new(PythonGrammar));
        registry.register(Arc::new(RustGrammar));

        registry
    }

    pub fn register(&mut self, grammar: Arc<dyn LanguageGrammar>) {
        let name = grammar.name().to_string();
        for ext in grammar.file_extensions() {
            self.extension_map.insert(ext.to_string(), name.clone());
        }
        self.languages.insert(name, grammar);
    }

    pub fn get_by_name(&self, name: &str) -> Option<Arc<dyn LanguageGrammar>> {
        self.languages.get(name).cloned()
    }

    pub fn get_for_file(&self, path: &Path) -> Option<Arc<dyn LanguageGrammar>> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.extension_map.get(ext))
            .and_then(|name| self.languages.get(name))
            .cloned()
    }

    pub fn is_supported(&self, path: &Path) -> bool {
        self.get_for_file(path).is_some()
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::new()
    }
}
