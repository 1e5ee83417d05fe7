//! Burn Dataset over sliding windows of a multivariate series
//!
//! Windows are gathered on demand by index, so the full (windows × length × features)
//! array is never materialized. Order is temporal and never shuffled.

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::{FitError, Result};

/// Window length for a past horizon sampled every `step` rows
pub fn window_length(past: usize, step: usize) -> Result<usize> {
    if step == 0 {
        return Err(FitError::Config("step must be at least 1".to_string()));
    }
    let length = past / step;
    if length == 0 {
        return Err(FitError::Config(format!(
            "past horizon {} is shorter than step {}",
            past, step
        )));
    }
    Ok(length)
}

/// One training example: a window of rows and the target paired with it
#[derive(Debug, Clone)]
pub struct WindowSample {
    /// Row-major [sequence_length, features]
    pub window: Vec<f32>,
    pub target: f32,
}

/// Sliding windows over one split
///
/// Window `i` covers rows `i, i + step, ..., i + (sequence_length - 1) * step`
/// and is paired with `targets[i]`.
#[derive(Debug, Clone)]
pub struct WindowDataset {
    /// Row-major [rows, features]
    features: Vec<f32>,
    targets: Vec<f32>,
    feature_dim: usize,
    sequence_length: usize,
    sampling_rate: usize,
    num_windows: usize,
}

impl WindowDataset {
    pub fn new(
        rows: &[Vec<f32>],
        targets: &[f32],
        sequence_length: usize,
        sampling_rate: usize,
    ) -> Result<Self> {
        if sequence_length == 0 || sampling_rate == 0 {
            return Err(FitError::Config(
                "sequence length and sampling rate must be at least 1".to_string(),
            ));
        }

        let feature_dim = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut features = Vec::with_capacity(rows.len() * feature_dim);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != feature_dim {
                return Err(FitError::Shape(format!(
                    "row {} has {} features, expected {}",
                    i,
                    row.len(),
                    feature_dim
                )));
            }
            features.extend_from_slice(row);
        }

        let span = (sequence_length - 1) * sampling_rate;
        let num_windows = rows.len().saturating_sub(span).min(targets.len());

        Ok(WindowDataset {
            features,
            targets: targets.to_vec(),
            feature_dim,
            sequence_length,
            sampling_rate,
            num_windows,
        })
    }

    /// Rows covered by one window, first to last inclusive
    pub fn span(&self) -> usize {
        (self.sequence_length - 1) * self.sampling_rate + 1
    }

    pub fn len(&self) -> usize {
        self.num_windows
    }

    pub fn is_empty(&self) -> bool {
        self.num_windows == 0
    }

    pub fn feature_dim(&self) -> usize {
        self.feature_dim
    }

    pub fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    /// Targets of every window, in window order
    pub fn window_targets(&self) -> &[f32] {
        &self.targets[..self.num_windows]
    }

    fn window(&self, start: usize) -> Vec<f32> {
        let mut window = Vec::with_capacity(self.sequence_length * self.feature_dim);
        for k in 0..self.sequence_length {
            let row = start + k * self.sampling_rate;
            let offset = row * self.feature_dim;
            window.extend_from_slice(&self.features[offset..offset + self.feature_dim]);
        }
        window
    }
}

impl Dataset<WindowSample> for WindowDataset {
    fn get(&self, index: usize) -> Option<WindowSample> {
        if index >= self.num_windows {
            return None;
        }
        Some(WindowSample {
            window: self.window(index),
            target: self.targets[index],
        })
    }

    fn len(&self) -> usize {
        self.num_windows
    }
}

/// Batch of windows
#[derive(Debug, Clone)]
pub struct WindowBatch<B: Backend> {
    /// [batch, sequence_length, features]
    pub inputs: Tensor<B, 3>,
    /// [batch]
    pub targets: Tensor<B, 1>,
}

/// Batcher stacking window samples into tensors
#[derive(Clone)]
pub struct WindowBatcher<B: Backend> {
    device: B::Device,
    sequence_length: usize,
    feature_dim: usize,
}

impl<B: Backend> WindowBatcher<B> {
    pub fn new(device: B::Device, sequence_length: usize, feature_dim: usize) -> Self {
        WindowBatcher {
            device,
            sequence_length,
            feature_dim,
        }
    }

    pub fn for_dataset(device: B::Device, dataset: &WindowDataset) -> Self {
        Self::new(device, dataset.sequence_length(), dataset.feature_dim())
    }
}

impl<B: Backend> Batcher<B, WindowSample, WindowBatch<B>> for WindowBatcher<B> {
    fn batch(&self, items: Vec<WindowSample>, _device: &B::Device) -> WindowBatch<B> {
        let batch_size = items.len();

        let mut input_data = Vec::with_capacity(batch_size * self.sequence_length * self.feature_dim);
        let mut target_data = Vec::with_capacity(batch_size);

        for sample in &items {
            input_data.extend_from_slice(&sample.window);
            target_data.push(sample.target);
        }

        let inputs = Tensor::<B, 1>::from_floats(input_data.as_slice(), &self.device)
            .reshape([batch_size, self.sequence_length, self.feature_dim]);
        let targets = Tensor::<B, 1>::from_floats(target_data.as_slice(), &self.device);

        WindowBatch { inputs, targets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::data::dataloader::DataLoaderBuilder;

    type TestBackend = NdArray<f32>;

    /// Rows [i, 10 * i] for i in 0..n
    fn series(n: usize) -> (Vec<Vec<f32>>, Vec<f32>) {
        let rows = (0..n).map(|i| vec![i as f32, 10.0 * i as f32]).collect();
        let targets = (0..n).map(|i| 100.0 + i as f32).collect();
        (rows, targets)
    }

    #[test]
    fn test_window_length_is_past_over_step() {
        assert_eq!(window_length(18, 1).unwrap(), 18);
        assert_eq!(window_length(18, 3).unwrap(), 6);
        assert_eq!(window_length(18, 4).unwrap(), 4);
        assert!(window_length(18, 0).is_err());
        assert!(window_length(2, 3).is_err());
    }

    #[test]
    fn test_window_count_and_contents() {
        let (rows, targets) = series(10);
        let dataset = WindowDataset::new(&rows, &targets, 3, 1).unwrap();

        assert_eq!(dataset.len(), 8);
        let first = dataset.get(0).unwrap();
        assert_eq!(first.window, vec![0.0, 0.0, 1.0, 10.0, 2.0, 20.0]);
        assert_eq!(first.target, 100.0);

        let last = dataset.get(7).unwrap();
        assert_eq!(last.window[0], 7.0);
        assert_eq!(last.target, 107.0);
        assert!(dataset.get(8).is_none());
    }

    #[test]
    fn test_sampling_rate_subsamples_within_window() {
        let (rows, targets) = series(10);
        let dataset = WindowDataset::new(&rows, &targets, 3, 2).unwrap();

        // span covers 5 rows, so 6 windows fit in 10 rows
        assert_eq!(dataset.span(), 5);
        assert_eq!(dataset.len(), 6);
        let sample = dataset.get(1).unwrap();
        let firsts: Vec<f32> = sample.window.chunks(2).map(|r| r[0]).collect();
        assert_eq!(firsts, vec![1.0, 3.0, 5.0]);
    }

    #[test]
    fn test_short_targets_limit_windows() {
        let (rows, targets) = series(10);
        let dataset = WindowDataset::new(&rows, &targets[..4], 3, 1).unwrap();
        assert_eq!(dataset.len(), 4);
        assert_eq!(dataset.window_targets(), &[100.0, 101.0, 102.0, 103.0]);
    }

    #[test]
    fn test_too_few_rows_gives_empty_dataset() {
        let (rows, targets) = series(2);
        let dataset = WindowDataset::new(&rows, &targets, 3, 1).unwrap();
        assert!(dataset.is_empty());
    }

    #[test]
    fn test_loader_preserves_order_and_last_partial_batch() {
        let (rows, targets) = series(12);
        let dataset = WindowDataset::new(&rows, &targets, 4, 1).unwrap();
        let device = Default::default();
        let batcher = WindowBatcher::<TestBackend>::for_dataset(device, &dataset);

        let loader = DataLoaderBuilder::new(batcher).batch_size(4).build(dataset);
        let batches: Vec<_> = loader.iter().collect();

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].inputs.dims(), [4, 4, 2]);
        assert_eq!(batches[2].inputs.dims(), [1, 4, 2]);

        let targets: Vec<f32> = batches
            .iter()
            .flat_map(|b| b.targets.clone().into_data().to_vec::<f32>().unwrap())
            .collect();
        let expected: Vec<f32> = (0..9).map(|i| 100.0 + i as f32).collect();
        assert_eq!(targets, expected);
    }
}
