//! Model training
//!
//! Ensemble training loop, loss and metrics tracking.

pub mod metrics;
pub mod trainer;

pub use metrics::{Metrics, TrainingHistory};
pub use trainer::{MemberTrainer, ScoreLoss, Trainer};
