pub mod python;
pub mod registry;
pub mod rust_lang;
pub mod typescript;

pub use registry::{LanguageGrammar, LanguageRegistry};
