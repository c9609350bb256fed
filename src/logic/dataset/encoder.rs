//! Label Encoder - category string <-> integer code
//!
//! Codes are assigned in sorted order of the categories observed when
//! fitting, so the same reference data always yields the same mapping.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of known categories quoted back in an error message
const KNOWN_PREVIEW: usize = 5;

/// Raised when a value was never observed while fitting the encoder
#[derive(Debug, Clone, Error, PartialEq)]
#[error("unknown category '{value}' for feature '{column}' (expected one of: {known})")]
pub struct EncodingError {
    pub column: String,
    pub value: String,
    pub known: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabelEncoder {
    column: String,
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Fit on every value of a column
    pub fn fit<'a, I>(column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let classes: BTreeSet<&str> = values.into_iter().collect();

        Self {
            column: column.to_string(),
            classes: classes.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Map a category to its code
    pub fn transform(&self, value: &str) -> Result<usize, EncodingError> {
        self.classes
            .binary_search_by(|class| class.as_str().cmp(value))
            .map_err(|_| EncodingError {
                column: self.column.clone(),
                value: value.to_string(),
                known: self.known_preview(),
            })
    }

    /// Map a code back to its category
    pub fn inverse(&self, code: usize) -> Option<&str> {
        self.classes.get(code).map(String::as_str)
    }

    fn known_preview(&self) -> String {
        let mut preview = self.classes
            .iter()
            .take(KNOWN_PREVIEW)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");

        if self.classes.len() > KNOWN_PREVIEW {
            preview.push_str(", ...");
        }
        preview
    }
}
