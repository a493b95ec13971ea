use std::path::{Path, PathBuf};

use glob::Pattern;
use ignore::WalkBuilder;

use crate::error::{ModelError, Result};
use crate::languages::LanguageRegistry;

/// Walks a project tree honoring gitignore plus configured include/exclude
/// globs, yielding the source files the engine recognizes.
pub struct ProjectWalker {
    registry: LanguageRegistry,
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl ProjectWalker {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        Ok(Self {
            registry: LanguageRegistry::new(),
            include: Self::compile(include)?,
            exclude: Self::compile(exclude)?,
        })
    }

    fn compile(patterns: &[String]) -> Result<Vec<Pattern>> {
        patterns
            .iter()
            .map(|p| {
                Pattern::new(p)
                    .map_err(|e| ModelError::Discovery(format!("invalid glob '{}': {}", p, e)))
            })
            .collect()
    }

    /// Returns project-relative paths (forward slashes), sorted for
    /// deterministic downstream processing.
    pub fn walk(&self, root: &Path) -> Result<Vec<String>> {
        if !root.is_dir() {
            return Err(ModelError::Discovery(format!(
                "project root does not exist: {}",
                root.display()
            )));
        }

        let mut files = Vec::new();

        let walker = WalkBuilder::new(root)
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .ignore(true)
            .build();

        for entry in walker.flatten() {
            let path = entry.path();
            if !path.is_file() || !self.registry.is_supported(path) {
                continue;
            }
            let Ok(rel) = path.strip_prefix(root) else {
                continue;
            };
            let rel = normalize(rel);
            if self.matches(&rel) {
                files.push(rel);
            }
        }

        files.sort();
        Ok(files)
    }

    fn matches(&self, rel: &str) -> bool {
        if self.exclude.iter().any(|p| p.matches(rel)) {
            return false;
        }
        if self.include.is_empty() {
            return true;
        }
        self.include.iter().any(|p| p.matches(rel))
    }
}

fn normalize(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::TempDir;

    fn create_file(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut file = File::create(path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn test_walk_finds_supported_files() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "src/a.ts", "export const x = 1;");
        create_file(temp_dir.path(), "src/b.py", "def b(): pass");
        create_file(temp_dir.path(), "src/c.rs", "fn c() {}");
        create_file(temp_dir.path(), "README.md", "# nope");

        let walker = ProjectWalker::new(&[], &[]).unwrap();
        let files = walker.walk(temp_dir.path()).unwrap();

        assert_eq!(files, vec!["src/a.ts", "src/b.py", "src/c.rs"]);
    }

    #[test]
    fn test_walk_missing_root_fails() {
        let walker = ProjectWalker::new(&[], &[]).unwrap();
        let err = walker.walk(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, ModelError::Discovery(_)));
    }

    #[test]
    fn test_exclude_patterns() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "src/a.ts", "");
        create_file(temp_dir.path(), "vendor/lib.ts", "");

        let walker = ProjectWalker::new(&[], &["vendor/**".to_string()]).unwrap();
        let files = walker.walk(temp_dir.path()).unwrap();

        assert_eq!(files, vec!["src/a.ts"]);
    }

    #[test]
    fn test_include_patterns() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "src/a.ts", "");
        create_file(temp_dir.path(), "scripts/tool.py", "");

        let walker = ProjectWalker::new(&["src/**".to_string()], &[]).unwrap();
        let files = walker.walk(temp_dir.path()).unwrap();

        assert_eq!(files, vec!["src/a.ts"]);
    }

    #[test]
    fn test_invalid_glob_is_discovery_error() {
        let err = ProjectWalker::new(&["[".to_string()], &[]).map(|_| ()).unwrap_err();
        assert!(matches!(err, ModelError::Discovery(_)));
    }

    #[test]
    fn test_results_are_sorted() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "z.ts", "");
        create_file(temp_dir.path(), "a.ts", "");
        create_file(temp_dir.path(), "m/n.ts", "");

        let walker = ProjectWalker::new(&[], &[]).unwrap();
        let files = walker.walk(temp_dir.path()).unwrap();

        let mut sorted = files.clone();
        sorted.sort();
        assert_eq!(files, sorted);
    }
}
