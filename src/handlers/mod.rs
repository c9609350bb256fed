//! HTTP handlers

pub mod health;
pub mod predict;
pub mod features;
pub mod model;
pub mod monitoring;
pub mod admin;
pub mod test_results;

#[cfg(test)]
mod tests;
