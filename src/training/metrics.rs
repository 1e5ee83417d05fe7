//! Loss tracking across batches and epochs

use std::fmt;

/// Mean absolute error accumulated over the batches of one epoch
///
/// Batch losses are weighted by batch size, so a short final batch counts
/// for its examples and no more.
#[derive(Debug, Clone, Default)]
pub struct LossMeter {
    weighted_sum: f64,
    examples: usize,
    batch_count: usize,
}

impl LossMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update with the mean loss of one batch
    pub fn update(&mut self, batch_loss: f32, batch_size: usize) {
        self.weighted_sum += batch_loss as f64 * batch_size as f64;
        self.examples += batch_size;
        self.batch_count += 1;
    }

    /// Example-weighted mean loss
    pub fn avg_loss(&self) -> f64 {
        if self.examples == 0 {
            f64::NAN
        } else {
            self.weighted_sum / self.examples as f64
        }
    }

    pub fn examples(&self) -> usize {
        self.examples
    }

    pub fn batch_count(&self) -> usize {
        self.batch_count
    }
}

impl fmt::Display for LossMeter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.4} ({} examples, {} batches)",
            self.avg_loss(),
            self.examples,
            self.batch_count
        )
    }
}

/// Per-epoch loss curves of one fit call
#[derive(Debug, Clone, Default)]
pub struct TrainingHistory {
    pub loss: Vec<f64>,
    pub val_loss: Vec<f64>,
    pub best_val_loss: f64,
    pub best_epoch: usize,
}

impl TrainingHistory {
    pub fn new() -> Self {
        Self {
            best_val_loss: f64::INFINITY,
            ..Default::default()
        }
    }

    /// Record losses for an epoch
    pub fn record_epoch(&mut self, epoch: usize, train: &LossMeter, val: &LossMeter) {
        self.loss.push(train.avg_loss());
        self.val_loss.push(val.avg_loss());

        if val.avg_loss() < self.best_val_loss {
            self.best_val_loss = val.avg_loss();
            self.best_epoch = epoch;
        }
    }

    pub fn epochs(&self) -> usize {
        self.loss.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loss_meter_weights_by_batch_size() {
        let mut meter = LossMeter::new();
        meter.update(1.0, 3);
        meter.update(4.0, 1);

        assert!((meter.avg_loss() - 1.75).abs() < 1e-9);
        assert_eq!(meter.examples(), 4);
        assert_eq!(meter.batch_count(), 2);
    }

    #[test]
    fn test_empty_meter_is_nan() {
        assert!(LossMeter::new().avg_loss().is_nan());
    }

    #[test]
    fn test_history_tracks_best_epoch() {
        let mut history = TrainingHistory::new();
        for (epoch, val) in [0.9f32, 0.5, 0.7].into_iter().enumerate() {
            let mut train = LossMeter::new();
            train.update(1.0, 1);
            let mut valid = LossMeter::new();
            valid.update(val, 1);
            history.record_epoch(epoch, &train, &valid);
        }

        assert_eq!(history.epochs(), 3);
        assert_eq!(history.best_epoch, 1);
        assert!((history.best_val_loss - 0.5).abs() < 1e-6);
    }
}
