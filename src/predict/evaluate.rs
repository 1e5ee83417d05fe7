//! Validation-set predictions and the result bundle

use burn::data::dataloader::DataLoaderBuilder;
use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::data::window::{WindowBatcher, WindowDataset};
use crate::model::SequenceRegressor;
use crate::training::metrics::TrainingHistory;
use crate::{FitError, Result};

/// Actual and predicted values over every window of a split, in window order
#[derive(Debug, Clone, Default)]
pub struct Predictions {
    pub actual: Vec<f32>,
    pub predicted: Vec<f32>,
}

/// Run inference batch by batch and concatenate the outputs
///
/// `model` should be the inference-mode model (`AutodiffModule::valid`), so
/// dropout layers are inactive.
pub fn predict_windows<B: Backend, M: SequenceRegressor<B>>(
    model: &M,
    dataset: WindowDataset,
    batch_size: usize,
    device: &B::Device,
) -> Result<Predictions> {
    let expected = dataset.len();
    let batcher = WindowBatcher::<B>::for_dataset(device.clone(), &dataset);
    let loader = DataLoaderBuilder::new(batcher)
        .batch_size(batch_size)
        .build(dataset);

    let mut predictions = Predictions {
        actual: Vec::with_capacity(expected),
        predicted: Vec::with_capacity(expected),
    };

    for batch in loader.iter() {
        let output = model.forward(batch.inputs);
        predictions.predicted.extend(tensor_values(output.into_data())?);
        predictions.actual.extend(tensor_values(batch.targets.into_data())?);
    }

    if predictions.predicted.len() != expected {
        return Err(FitError::Shape(format!(
            "collected {} predictions for {} windows",
            predictions.predicted.len(),
            expected
        )));
    }

    Ok(predictions)
}

fn tensor_values(data: burn::tensor::TensorData) -> Result<Vec<f32>> {
    data.convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| FitError::Shape(format!("unreadable tensor data: {:?}", e)))
}

/// Result of one fit call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitResult {
    /// Metadata passed through from the input split
    pub preds: serde_json::Value,
    /// Training loss per epoch
    pub loss: Vec<f64>,
    /// Validation loss per epoch
    pub val_loss: Vec<f64>,
    /// Validation targets, one per window
    pub actual_y: Vec<f32>,
    /// Validation predictions, one per window
    pub pred_y: Vec<f32>,
}

impl FitResult {
    pub fn new(preds: serde_json::Value, history: TrainingHistory, predictions: Predictions) -> Self {
        FitResult {
            preds,
            loss: history.loss,
            val_loss: history.val_loss,
            actual_y: predictions.actual,
            pred_y: predictions.predicted,
        }
    }

    /// Mean absolute error of the validation predictions
    pub fn val_mae(&self) -> f64 {
        if self.pred_y.is_empty() {
            return f64::NAN;
        }
        self.actual_y
            .iter()
            .zip(&self.pred_y)
            .map(|(a, p)| (a - p).abs() as f64)
            .sum::<f64>()
            / self.pred_y.len() as f64
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
