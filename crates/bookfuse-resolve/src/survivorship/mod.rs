pub mod merge;
pub mod policy;

pub use merge::Merger;
pub use policy::{DefaultPolicy, FillRule, SurvivorshipPolicy};
