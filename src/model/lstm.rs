//! Plain LSTM regressor
//!
//! The final hidden state of one recurrent layer is projected to a scalar.

use burn::module::Module;
use burn::nn::{Linear, LinearConfig, Lstm, LstmConfig};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::SequenceRegressor;

/// Configuration for the LSTM regressor
#[derive(Debug, Clone)]
pub struct LstmRegressorConfig {
    /// Features per time step
    pub input_dim: usize,
    /// LSTM hidden size
    pub hidden_size: usize,
}

impl LstmRegressorConfig {
    pub fn new(input_dim: usize) -> Self {
        LstmRegressorConfig {
            input_dim,
            hidden_size: 32,
        }
    }
}

/// Architecture: LSTM(32) -> Linear(1)
#[derive(Module, Debug)]
pub struct LstmRegressor<B: Backend> {
    lstm: Lstm<B>,
    output: Linear<B>,
    hidden_size: usize,
}

impl<B: Backend> LstmRegressor<B> {
    pub fn new(device: &B::Device, config: &LstmRegressorConfig) -> Self {
        LstmRegressor {
            lstm: LstmConfig::new(config.input_dim, config.hidden_size, true).init(device),
            output: LinearConfig::new(config.hidden_size, 1).init(device),
            hidden_size: config.hidden_size,
        }
    }
}

impl<B: Backend> SequenceRegressor<B> for LstmRegressor<B> {
    fn forward(&self, inputs: Tensor<B, 3>) -> Tensor<B, 2> {
        let batch_size = inputs.dims()[0];

        // Only the final hidden state is used
        let (_, state) = self.lstm.forward(inputs, None);
        let last = state.hidden.reshape([batch_size, self.hidden_size]);

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
    fn test_lstm_regressor_output_shape() {
        let device = Default::default();
        let model = LstmRegressor::<TestBackend>::new(&device, &LstmRegressorConfig::new(5));

        let inputs = Tensor::random([4, 18, 5], Distribution::Normal(0.0, 1.0), &device);
        let output = model.forward(inputs);

        assert_eq!(output.dims(), [4, 1]);
    }

    #[test]
    fn test_lstm_regressor_parameter_count() {
        let device = Default::default();
        let model = LstmRegressor::<TestBackend>::new(&device, &LstmRegressorConfig::new(3));

        // 4 gates x (input weights + recurrent weights + bias), then the projection
        let lstm_params = 4 * (3 * 32 + 32 * 32 + 32);
        let dense_params = 32 + 1;
        assert!(model.num_params() >= lstm_params + dense_params);
    }
}
