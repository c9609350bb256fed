//! Logic Module - data, model and operations behind the API
//!
//! - `dataset/` - reference CSV loading, column kinds, label encoders
//! - `features/` - request schema and normalization
//! - `model/` - random forest, artifact, metrics
//! - `monitoring/`, `alerting/` - metrics history, prediction log, alerts

// Data and model
pub mod dataset;
pub mod features;
pub mod model;
pub mod pipeline;

// Serving and operations
pub mod serving;
pub mod monitoring;
pub mod alerting;
pub mod scheduler;
pub mod reporting;
