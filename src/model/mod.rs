//! Neural network architecture
//!
//! A dense multi-output network: two score regressions and a win logit.

pub mod score_net;

pub use score_net::{BurnScoreModel, ScoreNet, ScoreNetConfig, ScoreNetOutput};
