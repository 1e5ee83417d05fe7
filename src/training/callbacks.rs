//! Epoch-end callbacks: early stopping and best-only checkpointing
//!
//! Both monitor the validation loss and treat lower as better.

use burn::module::Module;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder};
use burn::tensor::backend::Backend;
use std::path::{Path, PathBuf};

use crate::{FitError, Result};

/// Extension appended by the checkpoint recorder
pub const CHECKPOINT_EXTENSION: &str = "mpk";

/// Stop training once the validation loss has not improved for `patience` epochs
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    min_delta: f64,
    best: f64,
    wait: usize,
    stopped_epoch: Option<usize>,
}

impl EarlyStopping {
    pub fn new(patience: usize, min_delta: f64) -> Self {
        EarlyStopping {
            patience,
            min_delta: min_delta.abs(),
            best: f64::INFINITY,
            wait: 0,
            stopped_epoch: None,
        }
    }

    /// Returns true when training should stop after this epoch
    ///
    /// The first epoch never stops training, even with zero patience.
    pub fn on_epoch_end(&mut self, epoch: usize, val_loss: f64) -> bool {
        self.wait += 1;

        if val_loss < self.best - self.min_delta {
            self.best = val_loss;
            self.wait = 0;
            return false;
        }

        if self.wait >= self.patience && epoch > 0 {
            self.stopped_epoch = Some(epoch);
            return true;
        }

        false
    }

    pub fn stopped_epoch(&self) -> Option<usize> {
        self.stopped_epoch
    }
}

/// Save model weights whenever the validation loss reaches a new minimum
#[derive(Debug, Clone)]
pub struct ModelCheckpoint {
    path: PathBuf,
    best: f64,
    saves: usize,
}

impl ModelCheckpoint {
    /// `path` is given without extension; the recorder appends `.mpk`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ModelCheckpoint {
            path: path.into(),
            best: f64::INFINITY,
            saves: 0,
        }
    }

    /// Path of the file on disk
    pub fn file_path(&self) -> PathBuf {
        checkpoint_file(&self.path)
    }

    /// Number of times the checkpoint has been written
    pub fn saves(&self) -> usize {
        self.saves
    }

    /// Returns true when the checkpoint was overwritten this epoch
    pub fn on_epoch_end<B: Backend, M: Module<B>>(
        &mut self,
        epoch: usize,
        val_loss: f64,
        model: &M,
    ) -> Result<bool> {
        if val_loss.is_nan() || val_loss >= self.best {
            return Ok(false);
        }

        log::debug!(
            "Epoch {}: val_loss improved from {:.4} to {:.4}",
            epoch + 1,
            self.best,
            val_loss
        );
        self.best = val_loss;
        save_model::<B, M>(model, &self.path)?;
        self.saves += 1;

        Ok(true)
    }
}

/// File written for a checkpoint path
pub fn checkpoint_file(path: &Path) -> PathBuf {
    path.with_extension(CHECKPOINT_EXTENSION)
}

/// Write model weights to `path` (extension added by the recorder)
pub fn save_model<B: Backend, M: Module<B>>(model: &M, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    recorder
        .record(model.clone().into_record(), path.to_path_buf())
        .map_err(|e| FitError::Checkpoint {
            path: path.display().to_string(),
            message: e.to_string(),
        })
}

/// Load weights from `path` into a freshly built model of the same topology
pub fn load_model<B: Backend, M: Module<B>>(model: M, path: &Path, device: &B::Device) -> Result<M> {
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    let record = recorder
        .load(path.to_path_buf(), device)
        .map_err(|e| FitError::Checkpoint {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

    Ok(model.load_record(record))
}
