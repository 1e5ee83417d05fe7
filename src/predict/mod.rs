//! Prediction and result assembly
//!
//! Score the validation windows with a trained model and bundle the results.

pub mod evaluate;

pub use evaluate::{predict_windows, FitResult, Predictions};
