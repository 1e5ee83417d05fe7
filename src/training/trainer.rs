//! Training loop shared by every sequence regressor

use burn::data::dataloader::DataLoaderBuilder;
use burn::module::AutodiffModule;
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::{Adam, AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::{ElementConversion, Tensor};
use std::path::PathBuf;

use crate::data::window::{WindowBatch, WindowBatcher, WindowDataset};
use crate::model::SequenceRegressor;
use crate::training::callbacks::{EarlyStopping, ModelCheckpoint};
use crate::training::metrics::{LossMeter, TrainingHistory};
use crate::Result;

/// Mean absolute error between [batch, 1] predictions and [batch] targets
pub fn mean_absolute_error<B: Backend>(
    predictions: Tensor<B, 2>,
    targets: Tensor<B, 1>,
) -> Tensor<B, 1> {
    let batch_size = targets.dims()[0];
    let predictions: Tensor<B, 1> = predictions.reshape([batch_size]);
    (predictions - targets).abs().mean()
}

/// Settings of one fit call
#[derive(Debug, Clone)]
pub struct TrainerOptions {
    pub learning_rate: f64,
    pub batch_size: usize,
    pub patience: usize,
    pub min_delta: f64,
    pub checkpoint_path: PathBuf,
}

/// Adam + MAE trainer with early stopping and best-only checkpointing
pub struct SequenceTrainer<B, M>
where
    B: AutodiffBackend,
    M: SequenceRegressor<B> + AutodiffModule<B>,
{
    model: M,
    optimizer: OptimizerAdaptor<Adam, M, B>,
    learning_rate: f64,
    batch_size: usize,
    early_stopping: EarlyStopping,
    checkpoint: ModelCheckpoint,
    device: B::Device,
}

impl<B, M> SequenceTrainer<B, M>
where
    B: AutodiffBackend,
    M: SequenceRegressor<B> + AutodiffModule<B>,
    M::InnerModule: SequenceRegressor<B::InnerBackend>,
{
    pub fn new(model: M, options: TrainerOptions, device: B::Device) -> Self {
        // Epsilon 1e-7 instead of the burn default 1e-5
        let optimizer = AdamConfig::new().with_epsilon(1e-7).init();

        SequenceTrainer {
            model,
            optimizer,
            learning_rate: options.learning_rate,
            batch_size: options.batch_size,
            early_stopping: EarlyStopping::new(options.patience, options.min_delta),
            checkpoint: ModelCheckpoint::new(options.checkpoint_path),
            device,
        }
    }

    /// Train for at most `epochs` epochs and return the final model with its history
    pub fn fit(
        mut self,
        train_dataset: WindowDataset,
        val_dataset: WindowDataset,
        epochs: usize,
    ) -> Result<(M, TrainingHistory)> {
        let batcher_train = WindowBatcher::<B>::for_dataset(self.device.clone(), &train_dataset);
        let batcher_val =
            WindowBatcher::<B::InnerBackend>::for_dataset(self.device.clone(), &val_dataset);

        // Temporal order is kept: no shuffling
        let train_loader = DataLoaderBuilder::new(batcher_train)
            .batch_size(self.batch_size)
            .build(train_dataset);

        let val_loader = DataLoaderBuilder::new(batcher_val)
            .batch_size(self.batch_size)
            .build(val_dataset);

        let mut history = TrainingHistory::new();

        log::info!("Starting training for {} epochs", epochs);

        for epoch in 0..epochs {
            let train_metrics = self.train_epoch(train_loader.iter());
            let val_metrics = self.validate_epoch(val_loader.iter());

            history.record_epoch(epoch, &train_metrics, &val_metrics);

            log::info!(
                "Epoch {}/{}: loss={:.4} | val_loss={:.4}",
                epoch + 1,
                epochs,
                train_metrics.avg_loss(),
                val_metrics.avg_loss()
            );

            let val_loss = val_metrics.avg_loss();

            if self.checkpoint.on_epoch_end::<B, M>(epoch, val_loss, &self.model)? {
                log::info!(
                    "  New best model saved to {}",
                    self.checkpoint.file_path().display()
                );
            }

            if self.early_stopping.on_epoch_end(epoch, val_loss) {
                log::info!(
                    "Early stopping at epoch {} (best was epoch {})",
                    epoch + 1,
                    history.best_epoch + 1
                );
                break;
            }
        }

        Ok((self.model, history))
    }

    /// Train one epoch
    fn train_epoch(&mut self, loader: impl Iterator<Item = WindowBatch<B>>) -> LossMeter {
        let mut metrics = LossMeter::new();

        for batch in loader {
            let batch_size = batch.targets.dims()[0];

            let predictions = self.model.forward(batch.inputs);
            let loss = mean_absolute_error(predictions, batch.targets);
            let loss_val: f32 = loss.clone().into_scalar().elem();

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &self.model);

            self.model = self
                .optimizer
                .step(self.learning_rate, self.model.clone(), grads);

            metrics.update(loss_val, batch_size);
        }

        metrics
    }

    /// Validate one epoch with dropout disabled
    fn validate_epoch(
        &self,
        loader: impl Iterator<Item = WindowBatch<B::InnerBackend>>,
    ) -> LossMeter {
        let model = self.model.valid();
        let mut metrics = LossMeter::new();

        for batch in loader {
            let batch_size = batch.targets.dims()[0];

            let predictions = model.forward(batch.inputs);
            let loss = mean_absolute_error(predictions, batch.targets);
            let loss_val: f32 = loss.into_scalar().elem();

            metrics.update(loss_val, batch_size);
        }

        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LstmRegressor, LstmRegressorConfig};
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = NdArray<f32>;
    type TestAutodiffBackend = Autodiff<TestBackend>;

    #[test]
    fn test_mae_matches_manual_value() {
        let device = Default::default();
        let predictions = Tensor::<TestBackend, 1>::from_floats([1.0, 2.0, 4.0], &device)
            .reshape([3, 1]);
        let targets = Tensor::<TestBackend, 1>::from_floats([2.0, 2.0, 1.0], &device);

        let loss: f32 = mean_absolute_error(predictions, targets).into_scalar().elem();
        assert!((loss - 4.0 / 3.0).abs() < 1e-6);
    }

    fn ramp(n: usize) -> (Vec<Vec<f32>>, Vec<f32>) {
        let rows = (0..n).map(|i| vec![(i as f32 * 0.1).sin()]).collect();
        let targets = (0..n).map(|i| ((i + 4) as f32 * 0.1).sin()).collect();
        (rows, targets)
    }

    fn ramp_datasets() -> (WindowDataset, WindowDataset) {
        let (rows, targets) = ramp(40);
        let train = WindowDataset::new(&rows[..30], &targets[..30], 4, 1).unwrap();
        let val = WindowDataset::new(&rows[30..], &targets[30..], 4, 1).unwrap();
        (train, val)
    }

    fn options(learning_rate: f64, patience: usize, dir: &tempfile::TempDir) -> TrainerOptions {
        TrainerOptions {
            learning_rate,
            batch_size: 8,
            patience,
            min_delta: 0.0,
            checkpoint_path: dir.path().join("checkpoint"),
        }
    }

    #[test]
    fn test_history_bounded_by_epochs() {
        let device = Default::default();
        let dir = tempfile::tempdir().unwrap();
        let (train, val) = ramp_datasets();

        let model = LstmRegressor::<TestAutodiffBackend>::new(&device, &LstmRegressorConfig::new(1));
        let trainer = SequenceTrainer::new(model, options(1e-2, 1, &dir), device);
        let (_, history) = trainer.fit(train, val, 3).unwrap();

        assert!(history.epochs() >= 1 && history.epochs() <= 3);
        assert_eq!(history.loss.len(), history.val_loss.len());
        assert!(history.loss.iter().all(|l| l.is_finite()));
    }

    #[test]
    fn test_flat_validation_loss_stops_early() {
        let device = Default::default();
        let dir = tempfile::tempdir().unwrap();
        let (train, val) = ramp_datasets();

        // Zero learning rate keeps the weights, so val_loss never improves after epoch 0
        let model = LstmRegressor::<TestAutodiffBackend>::new(&device, &LstmRegressorConfig::new(1));
        let trainer = SequenceTrainer::new(model, options(0.0, 1, &dir), device);
        let (_, history) = trainer.fit(train, val, 5).unwrap();

        assert_eq!(history.epochs(), 2);
        assert_eq!(history.val_loss.len(), 2);
        assert!((history.val_loss[0] - history.val_loss[1]).abs() < 1e-9);
        assert_eq!(history.best_epoch, 0);
    }
}
