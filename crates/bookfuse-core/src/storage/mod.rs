pub mod artifacts;
pub mod landing;
pub mod table;

pub use artifacts::{ArtifactPaths, write_artifacts};
pub use landing::read_source;
pub use table::{ColumnData, Table};
