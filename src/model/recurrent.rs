//! LSTM layer with dropout on the recurrent state
//!
//! burn's `Lstm` has no recurrent dropout, so this layer unrolls the cell itself.
//! One Bernoulli mask is drawn per sequence and applied to the previous hidden
//! state before the recurrent projection. The mask is only drawn while autodiff
//! is enabled, i.e. during training.

use burn::module::{Module, Param};
use burn::nn::{Linear, LinearConfig};
use burn::tensor::activation::sigmoid;
use burn::tensor::backend::Backend;
use burn::tensor::{Distribution, Tensor};

/// Gate order inside the stacked projections
const INPUT_GATE: usize = 0;
const FORGET_GATE: usize = 1;
const CELL_GATE: usize = 2;
const OUTPUT_GATE: usize = 3;

#[derive(Module, Debug)]
pub struct DropoutLstm<B: Backend> {
    /// Input -> all four gates [d_input, 4 * d_hidden]
    input_transform: Linear<B>,
    /// Hidden -> all four gates [d_hidden, 4 * d_hidden], no bias
    hidden_transform: Linear<B>,
    d_hidden: usize,
    recurrent_dropout: f64,
}

impl<B: Backend> DropoutLstm<B> {
    pub fn new(device: &B::Device, d_input: usize, d_hidden: usize, recurrent_dropout: f64) -> Self {
        let mut input_transform = LinearConfig::new(d_input, 4 * d_hidden).init(device);
        input_transform.bias = Some(Param::from_tensor(Self::initial_bias(d_hidden, device)));

        DropoutLstm {
            input_transform,
            hidden_transform: LinearConfig::new(d_hidden, 4 * d_hidden)
                .with_bias(false)
                .init(device),
            d_hidden,
            recurrent_dropout,
        }
    }

    /// Zero bias except for the forget gate, which starts at one
    fn initial_bias(d_hidden: usize, device: &B::Device) -> Tensor<B, 1> {
        let start = FORGET_GATE * d_hidden;
        Tensor::zeros([4 * d_hidden], device).slice_assign(
            [start..start + d_hidden],
            Tensor::ones([d_hidden], device),
        )
    }

    /// Run the sequence and return the final hidden state
    ///
    /// # Arguments
    /// * `inputs` - [batch, seq_len, d_input]
    ///
    /// # Returns
    /// Final hidden state [batch, d_hidden]
    pub fn forward(&self, inputs: Tensor<B, 3>) -> Tensor<B, 2> {
        let [batch_size, seq_len, _] = inputs.dims();
        let device = inputs.device();
        let gate_width = 4 * self.d_hidden;

        // Input contributions for every step in one matmul
        let projected = self.input_transform.forward(inputs);

        let mut hidden = Tensor::<B, 2>::zeros([batch_size, self.d_hidden], &device);
        let mut cell = Tensor::<B, 2>::zeros([batch_size, self.d_hidden], &device);
        let mask = self.recurrent_mask(batch_size, &device);

        for t in 0..seq_len {
            let x_t = projected
                .clone()
                .slice([0..batch_size, t..t + 1, 0..gate_width])
                .reshape([batch_size, gate_width]);

            let h_prev = match &mask {
                Some(mask) => hidden * mask.clone(),
                None => hidden,
            };
            let gates = x_t + self.hidden_transform.forward(h_prev);

            let input_gate = sigmoid(self.gate(&gates, INPUT_GATE));
            let forget_gate = sigmoid(self.gate(&gates, FORGET_GATE));
            let candidate = self.gate(&gates, CELL_GATE).tanh();
            let output_gate = sigmoid(self.gate(&gates, OUTPUT_GATE));

            cell = forget_gate * cell + input_gate * candidate;
            hidden = output_gate * cell.clone().tanh();
        }

        hidden
    }

    fn gate(&self, gates: &Tensor<B, 2>, index: usize) -> Tensor<B, 2> {
        let [batch_size, _] = gates.dims();
        let start = index * self.d_hidden;
        gates
            .clone()
            .slice([0..batch_size, start..start + self.d_hidden])
    }

    /// Inverted dropout mask, scaled so the expected activation is unchanged
    fn recurrent_mask(&self, batch_size: usize, device: &B::Device) -> Option<Tensor<B, 2>> {
        if !B::ad_enabled() || self.recurrent_dropout <= 0.0 {
            return None;
        }
        let keep = 1.0 - self.recurrent_dropout;
        let mask = Tensor::<B, 2>::random(
            [batch_size, self.d_hidden],
            Distribution::Bernoulli(keep),
            device,
        );
        Some(mask.div_scalar(keep))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_final_hidden_shape() {
        let device = Default::default();
        let layer = DropoutLstm::<TestBackend>::new(&device, 8, 16, 0.3);

        let inputs = Tensor::random([3, 5, 8], Distribution::Normal(0.0, 1.0), &device);
        let hidden = layer.forward(inputs);

        assert_eq!(hidden.dims(), [3, 16]);
    }

    #[test]
    fn test_forget_gate_bias_starts_at_one() {
        let device = Default::default();
        let layer = DropoutLstm::<TestBackend>::new(&device, 3, 4, 0.0);

        let bias = layer
            .input_transform
            .bias
            .as_ref()
            .unwrap()
            .val()
            .into_data()
            .to_vec::<f32>()
            .unwrap();

        assert_eq!(bias.len(), 16);
        assert_eq!(&bias[..4], &[0.0; 4]);
        assert_eq!(&bias[4..8], &[1.0; 4]);
        assert!(bias[8..].iter().all(|b| *b == 0.0));
    }

    #[test]
    fn test_no_mask_without_autodiff() {
        let device = Default::default();
        let layer = DropoutLstm::<TestBackend>::new(&device, 4, 6, 0.5);

        let inputs = Tensor::<TestBackend, 3>::random(
            [2, 4, 4],
            Distribution::Normal(0.0, 1.0),
            &device,
        );
        let a = layer.forward(inputs.clone()).into_data().to_vec::<f32>().unwrap();
        let b = layer.forward(inputs).into_data().to_vec::<f32>().unwrap();

        assert!(a.iter().zip(&b).all(|(x, y)| (x - y).abs() < 1e-6));
    }

    #[test]
    fn test_hidden_bounded_by_tanh() {
        let device = Default::default();
        let layer = DropoutLstm::<TestBackend>::new(&device, 2, 4, 0.0);

        let inputs = Tensor::<TestBackend, 3>::ones([1, 10, 2], &device).mul_scalar(50.0);
        let hidden = layer.forward(inputs).into_data().to_vec::<f32>().unwrap();

        assert!(hidden.iter().all(|h| h.abs() <= 1.0));
    }
}
