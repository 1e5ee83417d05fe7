//! Model training
//!
//! Training loop, callbacks, and loss tracking.

pub mod callbacks;
pub mod metrics;
pub mod trainer;

pub use callbacks::{EarlyStopping, ModelCheckpoint};
pub use metrics::{LossMeter, TrainingHistory};
pub use trainer::{SequenceTrainer, TrainerOptions};
