pub mod book;
pub mod quality;
pub mod source;

pub use book::{
    BookAttributes, CanonicalField, CanonicalRecord, DetailRecord, FieldKind, FieldOrigin,
    NormalizedRecord,
};
pub use quality::{QualityCheck, QualityReport};
pub use source::{RawSourceRecord, SourceBatch, SourceKind, SourceManifest};
