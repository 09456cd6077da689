//! Error types
//!
//! Nothing in the engine is fatal. These errors surface at the edges: fixture
//! decoding, configuration, and persistence reported by a [`crate::FlagStore`].

use crate::selector::SelectorError;

#[derive(Debug, thiserror::Error)]
pub enum HiderError {
    #[error("Invalid selector: {0}")]
    Selector(#[from] SelectorError),
    #[error("Failed to decode JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Storage error: {0}")]
    Storage(String),
}
