//! Neural network architectures
//!
//! Two regressors over windows of shape [batch, sequence_length, features]:
//! - LSTM: a single recurrent layer
//! - CNN-LSTM: three convolution stages feeding two stacked recurrent layers

pub mod cnn_lstm;
pub mod lstm;
pub mod recurrent;

use burn::module::Module;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use std::fmt;

pub use cnn_lstm::{CnnLstmConfig, CnnLstmRegressor};
pub use lstm::{LstmRegressor, LstmRegressorConfig};
pub use recurrent::DropoutLstm;

/// A model mapping a batch of windows to one prediction per window
pub trait SequenceRegressor<B: Backend>: Module<B> {
    /// Forward pass: [batch, sequence_length, features] -> [batch, 1]
    fn forward(&self, inputs: Tensor<B, 3>) -> Tensor<B, 2>;
}

/// Network topology selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Lstm,
    CnnLstm,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::Lstm => write!(f, "LSTM"),
            ModelKind::CnnLstm => write!(f, "CNN-LSTM"),
        }
    }
}
