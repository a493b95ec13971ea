pub mod build;
pub mod config;
pub mod discover;
pub mod emit;
pub mod error;
pub mod explore;
pub mod freshness;
pub mod impact;
pub mod languages;
pub mod model;
pub mod navigate;
pub mod patterns;
pub mod populate;
pub mod query;
pub mod schema;
pub mod summary;

pub use build::{BuildReport, Builder};
pub use config::EngineConfig;
pub use discover::{Discoverer, Discovery};
pub use emit::{load_model, Emitter, MODEL_DIR};
pub use error::{ModelError, Result};
pub use explore::{Direction, LoadedModel, ModelStats};
pub use freshness::{FreshnessChecker, FreshnessReport, FreshnessState, UpdateOutcome};
pub use impact::{ImpactAnalyzer, ImpactReport, ImpactRequest};
pub use languages::{LanguageGrammar, LanguageRegistry};
pub use model::{
    Artifact, Dependency, DependencyKind, DependencyTarget, Flow, Instance, ParseOrigin, Schema,
};
pub use navigate::{Heading, NavPath, Navigator, Strategy, WalkRequest};
pub use patterns::{PatternCategory, PatternDiscovery, PatternFinding};
pub use populate::{Populated, Populator};
pub use query::{ModelQuery, QueryEngine, QueryResult, QueryType};
pub use schema::SchemaDeriver;
pub use summary::{HeuristicSummarizer, SummaryProvider};
