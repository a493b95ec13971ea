//! Regex-based recovery for files the structured parser cannot handle.
//!
//! Recovers import statements, top-level function/class declarations, and
//! export statements from raw text. Line-oriented and deliberately loose;
//! anything it produces is tagged with `ParseOrigin::Fallback` downstream.

use once_cell::sync::Lazy;
use regex::Regex;

use super::parser::Extraction;
use super::{RawImport, RawSymbol};

static IMPORT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // import ... from '...'; import '...'
        Regex::new(r#"^\s*import\s+(?:.+?\s+from\s+)?['"]([^'"]+)['"]"#).unwrap(),
        // const x = require('...')
        Regex::new(r#"require\(\s*['"]([^'"]+)['"]\s*\)"#).unwrap(),
        // Python: import a.b / from a.b import c
        Regex::new(r"^\s*import\s+([\w.]+)").unwrap(),
        Regex::new(r"^\s*from\s+([\w.]+)\s+import\b").unwrap(),
        // Rust: use a::b::c;
        Regex::new(r"^\s*(?:pub\s+)?use\s+([\w:]+)").unwrap(),
    ]
});

static FUNCTION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s+(\w+)").unwrap(),
        Regex::new(r"^\s*(?:export\s+)?const\s+(\w+)\s*=\s*(?:async\s+)?\(").unwrap(),
        Regex::new(r"^\s*(?:async\s+)?def\s+(\w+)").unwrap(),
        Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?fn\s+(\w+)").unwrap(),
    ]
});

static CLASS_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"^\s*(?:export\s+)?(?:default\s+)?(?:abstract\s+)?class\s+(\w+)").unwrap(),
        Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?struct\s+(\w+)").unwrap(),
    ]
});

static EXPORT_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*export\s+(?:default\s+)?(?:async\s+)?(?:function|class|const|let|var)\s+(\w+)")
        .unwrap()
});

static EXPORT_LIST: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*export\s*\{([^}]*)\}").unwrap());

pub struct FallbackExtractor;

impl FallbackExtractor {
    pub fn extract(source: &str) -> Extraction {
        let mut out = Extraction::default();

        for (idx, line) in source.lines().enumerate() {
            let line_no = idx as u32 + 1;

            for pattern in IMPORT_PATTERNS.iter() {
                if let Some(caps) = pattern.captures(line) {
                    out.imports.push(RawImport {
                        specifier: caps[1].to_string(),
                        line: line_no,
                    });
                    break;
                }
            }

            for pattern in FUNCTION_PATTERNS.iter() {
                if let Some(caps) = pattern.captures(line) {
                    out.symbols.push(RawSymbol {
                        name: caps[1].to_string(),
                        kind: "function".to_string(),
                        start_line: line_no,
                        end_line: line_no,
                    });
                    break;
                }
            }

            for pattern in CLASS_PATTERNS.iter() {
                if let Some(caps) = pattern.captures(line) {
                    out.symbols.push(RawSymbol {
                        name: caps[1].to_string(),
                        kind: "class".to_string(),
                        start_line: line_no,
                        end_line: line_no,
                    });
                    break;
                }
            }

            if let Some(caps) = EXPORT_DECL.captures(line) {
                out.exports.push(caps[1].to_string());
            } else if let Some(caps) = EXPORT_LIST.captures(line) {
                for name in caps[1].split(',') {
                    // `foo as bar` exports bar
                    let name = name.split_whitespace().last().unwrap_or("").trim();
                    if !name.is_empty() {
                        out.exports.push(name.to_string());
                    }
                }
            }
        }

        out
    }
}
