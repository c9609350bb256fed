//! Features Module - request schema and normalization
//!
//! Turns loosely typed client payloads into rows aligned with the model's
//! training schema.

pub mod schema;
pub mod normalize;


// Re-export common types
pub use schema::{resolve_schema, resolve_schema_from_path};
pub use normalize::{
    FeatureNormalizer, FeatureRow, FeatureValue, MissingFeaturePolicy, NormalizeError,
    NormalizedRow,
};
