//! bookfuse resolve: normalization, dedup keys, survivorship, provenance and quality.

pub mod dedup;
pub mod error;
pub mod identifiers;
pub mod normalize;
pub mod pipeline;
pub mod provenance;
pub mod quality;
pub mod survivorship;

pub use dedup::{DedupGroup, KeyResolver, KeyStrategy, count_by_strategy};
pub use error::{ResolveError, Result};
pub use normalize::Normalizer;
pub use pipeline::{Pipeline, Reconciled, RunOptions, RunOutcome};
pub use provenance::build_details;
pub use quality::{RunStamp, build_report};
pub use survivorship::{DefaultPolicy, FillRule, Merger, SurvivorshipPolicy};
