//! Schema Resolver - ordered model input columns

use std::path::Path;

use crate::logic::dataset::DatasetError;

/// Every header column except the target, in file order
pub fn resolve_schema(headers: &[String], target: &str) -> Result<Vec<String>, DatasetError> {
    if !headers.iter().any(|h| h == target) {
        return Err(DatasetError::MissingTarget(target.to_string()));
    }

    Ok(headers.iter().filter(|h| *h != target).cloned().collect())
}

/// Resolve the schema straight from a CSV header without loading rows
pub fn resolve_schema_from_path(path: &Path, target: &str) -> Result<Vec<String>, DatasetError> {
    let csv_error = |source: csv::Error| DatasetError::Csv {
        path: path.display().to_string(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_error)?;

    let headers: Vec<String> = reader.headers()
        .map_err(csv_error)?
        .iter()
        .map(str::to_string)
        .collect();

    resolve_schema(&headers, target)
}
