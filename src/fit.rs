//! The two fitting pipelines
//!
//! windowing -> model construction -> optimizer/loss -> fit with callbacks -> predict + collect.
//! `fit_lstm` and `fit_cnn_lstm` only differ in the network they build.

use burn::backend::{Autodiff, NdArray};
use burn::module::{AutodiffModule, Module};
use burn::tensor::backend::{AutodiffBackend, Backend};
use std::path::{Path, PathBuf};

use crate::data::split::DatasetSplit;
use crate::data::window::{window_length, WindowDataset};
use crate::model::{
    CnnLstmConfig, CnnLstmRegressor, LstmRegressor, LstmRegressorConfig, ModelKind,
    SequenceRegressor,
};
use crate::predict::{predict_windows, FitResult};
use crate::training::callbacks::{checkpoint_file, load_model};
use crate::training::{SequenceTrainer, TrainerOptions};
use crate::{FitError, Result};

/// Backend used by the command line
pub type DefaultBackend = Autodiff<NdArray<f32>>;

/// Hyperparameters of one fit call
#[derive(Debug, Clone)]
pub struct FitParams {
    /// Sampling rate inside a window
    pub step: usize,
    pub learning_rate: f64,
    pub batch_size: usize,
    pub epochs: usize,
    /// Epochs without validation improvement before stopping
    pub patience: usize,
    /// CNN-LSTM only
    pub recurrent_dropout: f64,
    /// CNN-LSTM only
    pub other_dropout: f64,
}

impl FitParams {
    /// Reject values burn would panic on
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(FitError::Config("batch_size must be at least 1".to_string()));
        }
        for (name, rate) in [
            ("recurrent_dropout", self.recurrent_dropout),
            ("other_dropout", self.other_dropout),
        ] {
            if !(0.0..1.0).contains(&rate) {
                return Err(FitError::Config(format!(
                    "{} must be in [0, 1), got {}",
                    name, rate
                )));
            }
        }
        Ok(())
    }
}

/// Settings shared by every fit call
#[derive(Debug, Clone)]
pub struct FitSettings {
    /// Past horizon in rows; the window holds `past / step` of them
    pub past: usize,
    pub min_delta: f64,
    pub restore_best_weights: bool,
    /// Checkpoint path without extension
    pub checkpoint_path: PathBuf,
}

/// Fit a single-layer LSTM and score the validation windows
pub fn fit_lstm<B: AutodiffBackend>(
    data: &DatasetSplit,
    params: &FitParams,
    settings: &FitSettings,
    device: &B::Device,
) -> Result<FitResult> {
    run_pipeline::<B, _>(data, params, settings, device, ModelKind::Lstm, |feature_dim, _| {
        Ok(LstmRegressor::<B>::new(device, &LstmRegressorConfig::new(feature_dim)))
    })
}

/// Fit the convolutional + recurrent hybrid and score the validation windows
pub fn fit_cnn_lstm<B: AutodiffBackend>(
    data: &DatasetSplit,
    params: &FitParams,
    settings: &FitSettings,
    device: &B::Device,
) -> Result<FitResult> {
    run_pipeline::<B, _>(
        data,
        params,
        settings,
        device,
        ModelKind::CnnLstm,
        |feature_dim, sequence_length| {
            let config = cnn_lstm_config(feature_dim, params);
            if config.pooled_length(sequence_length) == 0 {
                return Err(FitError::Config(format!(
                    "window of {} steps is too short for {} pooling stages",
                    sequence_length,
                    config.filters.len()
                )));
            }
            Ok(CnnLstmRegressor::<B>::new(device, &config))
        },
    )
}

/// Rebuild an LSTM regressor from its checkpoint
pub fn load_lstm<B: Backend>(
    feature_dim: usize,
    checkpoint_path: &Path,
    device: &B::Device,
) -> Result<LstmRegressor<B>> {
    let model = LstmRegressor::<B>::new(device, &LstmRegressorConfig::new(feature_dim));
    load_model::<B, _>(model, checkpoint_path, device)
}

/// Rebuild a CNN-LSTM regressor from its checkpoint
pub fn load_cnn_lstm<B: Backend>(
    feature_dim: usize,
    params: &FitParams,
    checkpoint_path: &Path,
    device: &B::Device,
) -> Result<CnnLstmRegressor<B>> {
    let model = CnnLstmRegressor::<B>::new(device, &cnn_lstm_config(feature_dim, params));
    load_model::<B, _>(model, checkpoint_path, device)
}

fn cnn_lstm_config(feature_dim: usize, params: &FitParams) -> CnnLstmConfig {
    CnnLstmConfig::new(feature_dim, params.recurrent_dropout, params.other_dropout)
}

fn run_pipeline<B, M>(
    data: &DatasetSplit,
    params: &FitParams,
    settings: &FitSettings,
    device: &B::Device,
    kind: ModelKind,
    build_model: impl FnOnce(usize, usize) -> Result<M>,
) -> Result<FitResult>
where
    B: AutodiffBackend,
    M: SequenceRegressor<B> + AutodiffModule<B>,
    M::InnerModule: SequenceRegressor<B::InnerBackend>,
{
    params.validate()?;

    let sequence_length = window_length(settings.past, params.step)?;
    let feature_dim = data.feature_dim()?;

    let train_dataset =
        windows_for_split("training", &data.x_train, &data.y_train, sequence_length, params.step)?;
    let val_dataset =
        windows_for_split("validation", &data.x_val, &data.y_val, sequence_length, params.step)?;

    log::info!(
        "{} windows: {} training, {} validation (length {}, step {})",
        kind,
        train_dataset.len(),
        val_dataset.len(),
        sequence_length,
        params.step
    );

    let first_batch = params.batch_size.min(train_dataset.len());
    log::info!(
        "Input shape: [{}, {}, {}]",
        first_batch,
        sequence_length,
        feature_dim
    );
    log::info!("Target shape: [{}]", first_batch);

    let model = build_model(feature_dim, sequence_length)?;
    log::info!("Model: {} with {} parameters", kind, model.num_params());
    log::debug!("{:?}", model);

    let options = TrainerOptions {
        learning_rate: params.learning_rate,
        batch_size: params.batch_size,
        patience: params.patience,
        min_delta: settings.min_delta,
        checkpoint_path: settings.checkpoint_path.clone(),
    };

    let trainer = SequenceTrainer::new(model, options, device.clone());
    let (model, history) = trainer.fit(train_dataset, val_dataset.clone(), params.epochs)?;

    log::info!(
        "Training finished after {} epochs, best val_loss {:.4} at epoch {}",
        history.epochs(),
        history.best_val_loss,
        history.best_epoch + 1
    );

    let model = if settings.restore_best_weights && history.best_val_loss.is_finite() {
        log::info!(
            "Restoring best weights from {}",
            checkpoint_file(&settings.checkpoint_path).display()
        );
        load_model::<B, M>(model, &settings.checkpoint_path, device)?
    } else {
        model
    };

    let predictions = predict_windows::<B::InnerBackend, _>(
        &model.valid(),
        val_dataset,
        params.batch_size,
        device,
    )?;

    Ok(FitResult::new(data.preds.clone(), history, predictions))
}

fn windows_for_split(
    split: &'static str,
    rows: &[Vec<f32>],
    targets: &[f32],
    sequence_length: usize,
    step: usize,
) -> Result<WindowDataset> {
    let dataset = WindowDataset::new(rows, targets, sequence_length, step)?;
    if dataset.is_empty() {
        return Err(FitError::EmptyWindows {
            split,
            rows: rows.len(),
            span: dataset.span(),
        });
    }
    Ok(dataset)
}
