//! Dataset Module - reference data loading and encoding
//!
//! The training CSV doubles as the reference dataset for serving: it fixes
//! the feature schema, the fill-in statistics and the category encoders.

pub mod encoder;
pub mod reference;

#[cfg(test)]
pub(crate) mod fixtures;


// Re-export common types
pub use encoder::{EncodingError, LabelEncoder};
pub use reference::{
    boolean_flag, parse_label, ColumnKind, ColumnSpec, DatasetError, DatasetOptions, RawTable,
    ReferenceDataset,
};
