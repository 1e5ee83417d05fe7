//! Input data and windowing
//!
//! Train/validation splits and lazy sliding windows over them.

pub mod split;
pub mod window;

pub use split::DatasetSplit;
pub use window::{window_length, WindowBatch, WindowBatcher, WindowDataset, WindowSample};
