//! Frozen per-feature standardization

use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{GridironError, Result};

/// Per-field mean and scale, fitted once on training rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureNormalizer {
    pub mean: Vec<f32>,
    pub scale: Vec<f32>,
}

impl FeatureNormalizer {
    /// Fit on a training matrix. Population standard deviation; fields with
    /// zero variance get a scale of 1.
    pub fn fit(rows: &[Vec<f32>]) -> Result<Self> {
        let Some(first) = rows.first() else {
            return Err(GridironError::EmptyDataset(
                "cannot fit a normalizer on zero rows".to_string(),
            ));
        };
        let dim = first.len();
        if let Some(bad) = rows.iter().find(|r| r.len() != dim) {
            return Err(GridironError::SchemaMismatch {
                expected: dim.to_string(),
                found: bad.len().to_string(),
            });
        }

        let n = rows.len() as f64;
        let mut sum = vec![0.0f64; dim];
        for row in rows {
            for (s, v) in sum.iter_mut().zip(row) {
                *s += *v as f64;
            }
        }
        let mean: Vec<f64> = sum.into_iter().map(|s| s / n).collect();

        let mut sq = vec![0.0f64; dim];
        for row in rows {
            for ((s, v), m) in sq.iter_mut().zip(row).zip(&mean) {
                *s += (*v as f64 - m).powi(2);
            }
        }
        let scale = sq
            .into_iter()
            .map(|s| {
                let std = (s / n).sqrt();
                if std > 0.0 && std.is_finite() {
                    std as f32
                } else {
                    1.0
                }
            })
            .collect();

        Ok(FeatureNormalizer {
            mean: mean.into_iter().map(|m| m as f32).collect(),
            scale,
        })
    }

    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }

    /// Standardize one row with the frozen statistics
    pub fn transform(&self, row: &[f32]) -> Result<Vec<f32>> {
        if row.len() != self.len() {
            return Err(GridironError::SchemaMismatch {
                expected: self.len().to_string(),
                found: row.len().to_string(),
            });
        }
        Ok(row
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(v, (m, s))| (v - m) / s)
            .collect())
    }

    /// Standardize every row; a single bad row fails the call
    pub fn transform_all(&self, rows: &[Vec<f32>]) -> Result<Vec<Vec<f32>>> {
        rows.iter().map(|r| self.transform(r)).collect()
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path.as_ref(), serde_json::to_string(self)?)?;
        info!("Saved normalizer to {}", path.as_ref().display());
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let normalizer: FeatureNormalizer = serde_json::from_str(&content)?;
        if normalizer.mean.len() != normalizer.scale.len() {
            return Err(GridironError::Parse(format!(
                "normalizer has {} means and {} scales",
                normalizer.mean.len(),
                normalizer.scale.len()
            )));
        }
        Ok(normalizer)
    }
}
