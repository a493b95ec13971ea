//! Summary generation seam.
//!
//! Natural-language summaries come from an external service in the larger
//! system; the engine only depends on this trait, resolved once at startup,
//! and ships a heuristic provider so builds work with no service available.

use crate::discover::DiscoveredFile;
use crate::model::ParseOrigin;

pub trait SummaryProvider: Send + Sync {
    fn summarize(&self, file: &DiscoveredFile) -> String;
}

/// Structural one-liner built from what discovery recovered.
pub struct HeuristicSummarizer;

impl SummaryProvider for HeuristicSummarizer {
    fn summarize(&self, file: &DiscoveredFile) -> String {
        let language = file.language.as_deref().unwrap_or("source");

        let mut counts: Vec<(String, usize)> = Vec::new();
        for symbol in &file.symbols {
            match counts.iter_mut().find(|(kind, _)| *kind == symbol.kind) {
                Some((_, n)) => *n += 1,
                None => counts.push((symbol.kind.clone(), 1)),
            }
        }

        let mut parts: Vec<String> = counts
            .iter()
            .map(|(kind, n)| format!("{} {}{}", n, kind, if *n == 1 { "" } else { "s" }))
            .collect();
        if !file.imports.is_empty() {
            parts.push(format!("{} import(s)", file.imports.len()));
        }

        let body = if parts.is_empty() {
            format!("{} module with no recognized declarations", language)
        } else {
            format!("{} module: {}", language, parts.join(", "))
        };

        match file.origin {
            ParseOrigin::Fallback => format!("{} (recovered by fallback parser)", body),
            ParseOrigin::Failed => format!("{} (parse failed)", body),
            ParseOrigin::Structured => body,
        }
    }
}
