//! bookfuse core: catalog records, configuration, landing readers and artifact writers.

pub mod config;
pub mod error;
pub mod models;
pub mod storage;

pub use config::AppConfig;
pub use error::{CatalogError, ExitCode, Result};
pub use models::*;
pub use storage::{ArtifactPaths, read_source, write_artifacts};
