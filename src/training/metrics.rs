//! Training metrics and evaluation

use std::fmt;

/// Metrics accumulated during training/evaluation
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    /// Total loss
    pub total_loss: f64,
    /// Win prediction loss component
    pub win_loss: f64,
    /// Score prediction loss component
    pub score_loss: f64,
    /// Number of correct win predictions
    pub correct_wins: usize,
    /// Total predictions
    pub total_predictions: usize,
    /// Sum of absolute home score errors, in points
    pub home_score_mae_sum: f64,
    /// Sum of absolute away score errors, in points
    pub away_score_mae_sum: f64,
    /// Number of batches accumulated
    pub batch_count: usize,
}

/// Per-batch values fed into [`Metrics::update`]
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchResult {
    pub total_loss: f32,
    pub win_loss: f32,
    pub score_loss: f32,
    pub correct_wins: usize,
    pub batch_size: usize,
    pub home_score_mae: f32,
    pub away_score_mae: f32,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update metrics with a batch result
    pub fn update(&mut self, batch: BatchResult) {
        self.total_loss += batch.total_loss as f64;
        self.win_loss += batch.win_loss as f64;
        self.score_loss += batch.score_loss as f64;
        self.correct_wins += batch.correct_wins;
        self.total_predictions += batch.batch_size;
        self.home_score_mae_sum += batch.home_score_mae as f64 * batch.batch_size as f64;
        self.away_score_mae_sum += batch.away_score_mae as f64 * batch.batch_size as f64;
        self.batch_count += 1;
    }

    /// Get average total loss
    pub fn avg_loss(&self) -> f64 {
        if self.batch_count == 0 {
            0.0
        } else {
            self.total_loss / self.batch_count as f64
        }
    }

    pub fn avg_win_loss(&self) -> f64 {
        if self.batch_count == 0 {
            0.0
        } else {
            self.win_loss / self.batch_count as f64
        }
    }

    pub fn avg_score_loss(&self) -> f64 {
        if self.batch_count == 0 {
            0.0
        } else {
            self.score_loss / self.batch_count as f64
        }
    }

    /// Get win prediction accuracy
    pub fn accuracy(&self) -> f64 {
        if self.total_predictions == 0 {
            0.0
        } else {
            self.correct_wins as f64 / self.total_predictions as f64
        }
    }

    pub fn home_score_mae(&self) -> f64 {
        if self.total_predictions == 0 {
            0.0
        } else {
            self.home_score_mae_sum / self.total_predictions as f64
        }
    }

    pub fn away_score_mae(&self) -> f64 {
        if self.total_predictions == 0 {
            0.0
        } else {
            self.away_score_mae_sum / self.total_predictions as f64
        }
    }

    /// Mean of the home and away MAE, in points
    pub fn score_mae(&self) -> f64 {
        (self.home_score_mae() + self.away_score_mae()) / 2.0
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Loss: {:.4} (win: {:.4}, score: {:.4}) | Acc: {:.2}% | Score MAE: {:.2}",
            self.avg_loss(),
            self.avg_win_loss(),
            self.avg_score_loss(),
            self.accuracy() * 100.0,
            self.score_mae()
        )
    }
}

/// Per-epoch history for one ensemble member
#[derive(Debug, Clone, Default)]
pub struct TrainingHistory {
    pub train_losses: Vec<f64>,
    pub val_losses: Vec<f64>,
    pub val_accuracies: Vec<f64>,
    pub val_score_maes: Vec<f64>,
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

    /// Record an epoch. Returns true when it is the new best.
    pub fn record_epoch(&mut self, epoch: usize, train: &Metrics, val: &Metrics) -> bool {
        self.train_losses.push(train.avg_loss());
        self.val_losses.push(val.avg_loss());
        self.val_accuracies.push(val.accuracy());
        self.val_score_maes.push(val.score_mae());

        if val.avg_loss() < self.best_val_loss {
            self.best_val_loss = val.avg_loss();
            self.best_epoch = epoch;
            true
        } else {
            false
        }
    }

    /// True once `patience` epochs have passed without improvement
    pub fn should_early_stop(&self, patience: usize) -> bool {
        if patience == 0 || self.val_losses.is_empty() {
            return false;
        }
        let current_epoch = self.val_losses.len() - 1;
        current_epoch - self.best_epoch >= patience
    }

    pub fn epochs(&self) -> usize {
        self.val_losses.len()
    }
}
