//! Import-specifier resolution: maps the string written in a source file to
//! the project-relative path of a concrete artifact, when one exists.

use std::collections::HashSet;

use crate::config::EngineConfig;

pub struct ReferenceResolver<'a> {
    config: &'a EngineConfig,
    known: &'a HashSet<String>,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(config: &'a EngineConfig, known: &'a HashSet<String>) -> Self {
        Self { config, known }
    }

    /// Resolves `specifier` as written in `from`. Returns the target
    /// artifact path, or `None` when nothing in the instance matches
    /// (external packages, stdlib modules, typos).
    pub fn resolve(&self, from: &str, specifier: &str) -> Option<String> {
        let language = extension(from);

        if specifier.starts_with("./") || specifier.starts_with("../") {
            let base = normalize_join(directory(from), specifier);
            return self.probe(&base);
        }

        match language {
            "rs" => self.resolve_rust(from, specifier),
            "py" | "pyi" => self.resolve_python(from, specifier),
            _ => {
                // Project-root-relative specifiers (tsconfig baseUrl style);
                // bare package names fall through unresolved.
                if specifier.contains('/') {
                    self.probe(specifier)
                } else {
                    None
                }
            }
        }
    }

    /// Tries the path as-is, then with configured extensions, then as a
    /// directory holding an index file.
    fn probe(&self, base: &str) -> Option<String> {
        if self.known.contains(base) {
            return Some(base.to_string());
        }
        for ext in &self.config.resolve_extensions {
            let candidate = format!("{}{}", base, ext);
            if self.known.contains(&candidate) {
                return Some(candidate);
            }
        }
        for index in &self.config.index_files {
            let candidate = format!("{}/{}", base, index);
            if self.known.contains(&candidate) {
                return Some(candidate);
            }
        }
        None
    }

    fn resolve_rust(&self, from: &str, specifier: &str) -> Option<String> {
        let segments: Vec<&str> = specifier.split("::").filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            return None;
        }

        let base_segments: Vec<String> = match segments[0] {
            "crate" => {
                let mut v = vec!["src".to_string()];
                v.extend(segments[1..].iter().map(|s| s.to_string()));
                v
            }
            "self" => {
                let mut v = split_dir(directory(from));
                v.extend(segments[1..].iter().map(|s| s.to_string()));
                v
            }
            "super" => {
                let mut v = split_dir(directory(from));
                v.pop();
                v.extend(segments[1..].iter().map(|s| s.to_string()));
                v
            }
            // External crates stay unresolved.
            _ => return None,
        };

        // The last segment is usually an item, not a module: try the full
        // path as a module first, then its parent.
        let full = base_segments.join("/");
        if let Some(hit) = self.probe(&full) {
            return Some(hit);
        }
        if base_segments.len() > 1 {
            let parent = base_segments[..base_segments.len() - 1].join("/");
            return self.probe(&parent);
        }
        None
    }

    fn resolve_python(&self, from: &str, specifier: &str) -> Option<String> {
        let base = specifier.replace('.', "/");

        // Root-relative (absolute import) first, then sibling-relative.
        if let Some(hit) = self.probe(&base) {
            return Some(hit);
        }
        let sibling = normalize_join(directory(from), &base);
        if sibling != base {
            if let Some(hit) = self.probe(&sibling) {
                return Some(hit);
            }
        }
        // `from a.b import c` may name an item in module a/b: already
        // covered because the module_name capture excludes the item.
        None
    }
}

fn extension(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or("")
}

fn directory(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

fn split_dir(dir: &str) -> Vec<String> {
    if dir.is_empty() {
        Vec::new()
    } else {
        dir.split('/').map(|s| s.to_string()).collect()
    }
}

/// Joins a relative specifier onto a directory, collapsing `.` and `..`.
fn normalize_join(dir: &str, spec: &str) -> String {
    let mut parts = split_dir(dir);
    for segment in spec.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s.to_string()),
        }
    }
    parts.join("/")
}
