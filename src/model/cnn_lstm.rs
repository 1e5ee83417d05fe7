//! Convolutional + recurrent hybrid regressor
//!
//! Architecture:
//!   Conv1d(32, k=2) -> ReLU -> MaxPool(2) -> Dropout
//!   Conv1d(64, k=2) -> ReLU -> MaxPool(2) -> Dropout
//!   Conv1d(128, k=2) -> ReLU -> MaxPool(2) -> Dropout
//!   LSTM(32, full sequence) -> LSTM(300, recurrent dropout) -> Linear(1)

use burn::module::Module;
use burn::nn::conv::{Conv1d, Conv1dConfig};
use burn::nn::pool::{MaxPool1d, MaxPool1dConfig};
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig, Lstm, LstmConfig, PaddingConfig1d};
use burn::tensor::activation::relu;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::recurrent::DropoutLstm;
use super::SequenceRegressor;

/// Configuration for the CNN-LSTM regressor
#[derive(Debug, Clone)]
pub struct CnnLstmConfig {
    /// Features per time step
    pub input_dim: usize,
    /// Filter counts of the three convolution stages
    pub filters: [usize; 3],
    pub kernel_size: usize,
    pub pool_size: usize,
    /// Hidden size of the first (sequence-returning) LSTM
    pub sequence_hidden: usize,
    /// Hidden size of the second LSTM
    pub final_hidden: usize,
    pub recurrent_dropout: f64,
    /// Dropout after every pooling stage
    pub other_dropout: f64,
}

impl CnnLstmConfig {
    pub fn new(input_dim: usize, recurrent_dropout: f64, other_dropout: f64) -> Self {
        CnnLstmConfig {
            input_dim,
            filters: [32, 64, 128],
            kernel_size: 2,
            pool_size: 2,
            sequence_hidden: 32,
            final_hidden: 300,
            recurrent_dropout,
            other_dropout,
        }
    }

    /// Sequence length reaching the recurrent layers
    ///
    /// Convolutions keep the length, every pool divides it (floor).
    pub fn pooled_length(&self, sequence_length: usize) -> usize {
        self.filters
            .iter()
            .fold(sequence_length, |len, _| len / self.pool_size)
    }
}

/// Convolution -> ReLU -> max-pool -> dropout
///
/// The convolution pads zeros on the right so the output keeps the input length.
#[derive(Module, Debug)]
pub struct ConvStage<B: Backend> {
    conv: Conv1d<B>,
    pool: MaxPool1d,
    dropout: Dropout,
    kernel_size: usize,
}

impl<B: Backend> ConvStage<B> {
    pub fn new(
        device: &B::Device,
        in_channels: usize,
        out_channels: usize,
        config: &CnnLstmConfig,
    ) -> Self {
        ConvStage {
            conv: Conv1dConfig::new(in_channels, out_channels, config.kernel_size)
                .with_padding(PaddingConfig1d::Valid)
                .init(device),
            pool: MaxPool1dConfig::new(config.pool_size)
                .with_stride(config.pool_size)
                .init(),
            dropout: DropoutConfig::new(config.other_dropout).init(),
            kernel_size: config.kernel_size,
        }
    }

    /// x: [batch, channels, length] -> [batch, out_channels, length / pool]
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let x = self.pad_same(x);
        let x = relu(self.conv.forward(x));
        let x = self.pool.forward(x);
        self.dropout.forward(x)
    }

    fn pad_same(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let total = self.kernel_size - 1;
        if total == 0 {
            return x;
        }
        let [batch_size, channels, _] = x.dims();
        let device = x.device();
        let left = total / 2;
        let right = total - left;

        let mut parts: Vec<Tensor<B, 3>> = Vec::with_capacity(3);
        if left > 0 {
            parts.push(Tensor::zeros([batch_size, channels, left], &device));
        }
        parts.push(x);
        parts.push(Tensor::zeros([batch_size, channels, right], &device));
        Tensor::cat(parts, 2)
    }
}

#[derive(Module, Debug)]
pub struct CnnLstmRegressor<B: Backend> {
    stages: Vec<ConvStage<B>>,
    sequence_lstm: Lstm<B>,
    final_lstm: DropoutLstm<B>,
    output: Linear<B>,
}

impl<B: Backend> CnnLstmRegressor<B> {
    pub fn new(device: &B::Device, config: &CnnLstmConfig) -> Self {
        let mut stages = Vec::with_capacity(config.filters.len());
        let mut in_channels = config.input_dim;
        for &out_channels in &config.filters {
            stages.push(ConvStage::new(device, in_channels, out_channels, config));
            in_channels = out_channels;
        }

        CnnLstmRegressor {
            stages,
            sequence_lstm: LstmConfig::new(in_channels, config.sequence_hidden, true).init(device),
            final_lstm: DropoutLstm::new(
                device,
                config.sequence_hidden,
                config.final_hidden,
                config.recurrent_dropout,
            ),
            output: LinearConfig::new(config.final_hidden, 1).init(device),
        }
    }
}

impl<B: Backend> SequenceRegressor<B> for CnnLstmRegressor<B> {
    fn forward(&self, inputs: Tensor<B, 3>) -> Tensor<B, 2> {
        // Convolutions run over time: [batch, features, seq_len]
        let mut x = inputs.swap_dims(1, 2);
        for stage in &self.stages {
            x = stage.forward(x);
        }

        // Back to [batch, seq_len, channels] for the recurrent layers
        let x = x.swap_dims(1, 2);
        let (sequence, _) = self.sequence_lstm.forward(x, None);
        let last = self.final_lstm.forward(sequence);

        self.output.forward(last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_pooled_length() {
        let config = CnnLstmConfig::new(4, 0.0, 0.0);
        assert_eq!(config.pooled_length(18), 2);
        assert_eq!(config.pooled_length(8), 1);
        assert_eq!(config.pooled_length(7), 0);
    }

    #[test]
    fn test_conv_stage_keeps_then_halves_length() {
        let device = Default::default();
        let config = CnnLstmConfig::new(4, 0.0, 0.0);
        let stage = ConvStage::<TestBackend>::new(&device, 4, 32, &config);

        let x = Tensor::random([2, 4, 18], Distribution::Normal(0.0, 1.0), &device);
        assert_eq!(stage.forward(x).dims(), [2, 32, 9]);
    }

    #[test]
    fn test_cnn_lstm_output_shape() {
        let device = Default::default();
        let config = CnnLstmConfig::new(5, 0.2, 0.2);
        let model = CnnLstmRegressor::<TestBackend>::new(&device, &config);

        let inputs = Tensor::random([3, 18, 5], Distribution::Normal(0.0, 1.0), &device);
        let output = model.forward(inputs);

        assert_eq!(output.dims(), [3, 1]);
    }
}
