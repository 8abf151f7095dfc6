//! Hyperparameter optimization module
//!
//! Exhaustive grid search over an explicit candidate list, with each
//! candidate scored by its mean cross-validated R².

mod grid;

pub use grid::{GridSearch, SearchResult, TrialResult};
