use bookfuse_core::CatalogError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("invalid ISBN: {0}")]
    InvalidIsbn(String),

    #[error("merge invariant violated: {0}")]
    MergeInvariant(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl ResolveError {
    /// True when an input collaborator's output was missing or unreadable.
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Catalog(err) if err.is_structural())
    }
}

pub type Result<T> = std::result::Result<T, ResolveError>;
