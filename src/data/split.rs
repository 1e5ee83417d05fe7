//! Train/validation split as handed over by the caller

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{FitError, Result};

/// Training and validation arrays plus opaque prediction metadata
///
/// Inputs are row-major (examples × features), targets have one value per example.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSplit {
    pub x_train: Vec<Vec<f32>>,
    pub y_train: Vec<f32>,
    pub x_val: Vec<Vec<f32>>,
    pub y_val: Vec<f32>,
    /// Passed through untouched into the result bundle
    #[serde(default)]
    pub preds: serde_json::Value,
}

impl DatasetSplit {
    /// Read a split from a JSON document
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let split: DatasetSplit = serde_json::from_str(&content)?;
        log::debug!(
            "Loaded split from {}: {} train rows, {} val rows",
            path.as_ref().display(),
            split.x_train.len(),
            split.x_val.len()
        );
        Ok(split)
    }

    /// Number of features per row, checked across both splits
    pub fn feature_dim(&self) -> Result<usize> {
        let dim = self
            .x_train
            .first()
            .or_else(|| self.x_val.first())
            .map(|row| row.len())
            .ok_or_else(|| FitError::Shape("x_train and x_val are both empty".to_string()))?;

        if dim == 0 {
            return Err(FitError::Shape("rows have no features".to_string()));
        }

        for (name, rows) in [("x_train", &self.x_train), ("x_val", &self.x_val)] {
            if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != dim) {
                return Err(FitError::Shape(format!(
                    "{}[{}] has {} features, expected {}",
                    name,
                    i,
                    row.len(),
                    dim
                )));
            }
        }

        Ok(dim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_arbitrary_preds() {
        let json = r#"{
            "x_train": [[1.0, 2.0], [3.0, 4.0]],
            "y_train": [0.5, 0.6],
            "x_val": [[5.0, 6.0]],
            "y_val": [0.7],
            "preds": {"horizon": 6, "names": ["a", "b"]}
        }"#;
        let split: DatasetSplit = serde_json::from_str(json).unwrap();

        assert_eq!(split.feature_dim().unwrap(), 2);
        assert_eq!(split.preds["horizon"], 6);
    }

    #[test]
    fn test_missing_preds_defaults_to_null() {
        let json = r#"{"x_train": [[1.0]], "y_train": [1.0], "x_val": [[2.0]], "y_val": [2.0]}"#;
        let split: DatasetSplit = serde_json::from_str(json).unwrap();
        assert!(split.preds.is_null());
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let split = DatasetSplit {
            x_train: vec![vec![1.0, 2.0]],
            y_train: vec![1.0],
            x_val: vec![vec![1.0]],
            y_val: vec![1.0],
            preds: serde_json::Value::Null,
        };
        assert!(matches!(split.feature_dim(), Err(FitError::Shape(_))));
    }
}
