//! Dense score network
//!
//! Architecture: Input(feature_len) → [Linear → ReLU → Dropout] × hidden_dims
//!                                  → score_head(2), win_head(1)

use burn::module::Module;
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig};
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder};
use burn::tensor::activation::{relu, sigmoid};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::predict::ensemble::{ModelOutput, ScoreModel};
use crate::{GridironError, Result, TrainingConfig};

/// Configuration for the score network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreNetConfig {
    /// Input dimension (feature vector length)
    pub input_dim: usize,
    /// Hidden layer widths, in order
    pub hidden_dims: Vec<usize>,
    /// Dropout rate
    pub dropout: f64,
}

impl ScoreNetConfig {
    pub fn new(input_dim: usize) -> Self {
        ScoreNetConfig {
            input_dim,
            hidden_dims: vec![128, 64, 32],
            dropout: 0.1,
        }
    }

    pub fn from_training(input_dim: usize, training: &TrainingConfig) -> Self {
        ScoreNetConfig {
            input_dim,
            hidden_dims: training.hidden_dims.clone(),
            dropout: training.dropout,
        }
    }

    fn head_input_dim(&self) -> usize {
        self.hidden_dims.last().copied().unwrap_or(self.input_dim)
    }
}

/// Raw network outputs
#[derive(Debug, Clone)]
pub struct ScoreNetOutput<B: Backend> {
    /// Predicted (home, away) scores [batch, 2]
    pub scores: Tensor<B, 2>,
    /// Win logit [batch, 1] - apply sigmoid for P(home wins)
    pub win_logit: Tensor<B, 2>,
}

impl<B: Backend> ScoreNetOutput<B> {
    pub fn win_prob(&self) -> Tensor<B, 2> {
        sigmoid(self.win_logit.clone())
    }
}

/// A single hidden layer block: Linear → ReLU → Dropout
#[derive(Module, Debug)]
pub struct HiddenBlock<B: Backend> {
    linear: Linear<B>,
    dropout: Dropout,
}

impl<B: Backend> HiddenBlock<B> {
    pub fn new(device: &B::Device, in_dim: usize, out_dim: usize, dropout: f64) -> Self {
        HiddenBlock {
            linear: LinearConfig::new(in_dim, out_dim).init(device),
            dropout: DropoutConfig::new(dropout).init(),
        }
    }

    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.linear.forward(x);
        let x = relu(x);
        self.dropout.forward(x)
    }
}

/// Multi-output dense network: two regression scores plus a win logit
#[derive(Module, Debug)]
pub struct ScoreNet<B: Backend> {
    hidden: Vec<HiddenBlock<B>>,
    score_head: Linear<B>,
    win_head: Linear<B>,
}

impl<B: Backend> ScoreNet<B> {
    pub fn new(device: &B::Device, config: &ScoreNetConfig) -> Self {
        let mut hidden = Vec::with_capacity(config.hidden_dims.len());
        let mut in_dim = config.input_dim;
        for &out_dim in &config.hidden_dims {
            hidden.push(HiddenBlock::new(device, in_dim, out_dim, config.dropout));
            in_dim = out_dim;
        }

        let head_dim = config.head_input_dim();
        ScoreNet {
            hidden,
            score_head: LinearConfig::new(head_dim, 2).init(device),
            win_head: LinearConfig::new(head_dim, 1).init(device),
        }
    }

    /// Forward pass over features [batch, input_dim]
    pub fn forward(&self, features: Tensor<B, 2>) -> ScoreNetOutput<B> {
        let mut x = features;
        for block in &self.hidden {
            x = block.forward(x);
        }

        ScoreNetOutput {
            scores: self.score_head.forward(x.clone()),
            win_logit: self.win_head.forward(x),
        }
    }

    /// Save weights; the recorder appends the `.mpk` extension
    pub fn save(&self, path: &Path) -> Result<()>
    where
        B::FloatElem: serde::Serialize + serde::de::DeserializeOwned,
        B::IntElem: serde::Serialize + serde::de::DeserializeOwned,
    {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        recorder
            .record(self.clone().into_record(), path.to_path_buf())
            .map_err(|e| GridironError::Model(e.to_string()))
    }

    /// Load weights saved with [`ScoreNet::save`]
    pub fn load(device: &B::Device, path: &Path, config: &ScoreNetConfig) -> Result<Self>
    where
        B::FloatElem: serde::Serialize + serde::de::DeserializeOwned,
        B::IntElem: serde::Serialize + serde::de::DeserializeOwned,
    {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        let record = recorder
            .load(path.to_path_buf(), device)
            .map_err(|e| GridironError::Model(e.to_string()))?;

        Ok(Self::new(device, config).load_record(record))
    }
}

/// Adapts a [`ScoreNet`] to the ensemble's [`ScoreModel`] seam
pub struct BurnScoreModel<B: Backend> {
    net: ScoreNet<B>,
    input_dim: usize,
    device: B::Device,
}

impl<B: Backend> BurnScoreModel<B> {
    pub fn new(net: ScoreNet<B>, input_dim: usize, device: B::Device) -> Self {
        BurnScoreModel {
            net,
            input_dim,
            device,
        }
    }

    pub fn load(device: &B::Device, path: &Path, config: &ScoreNetConfig) -> Result<Self>
    where
        B::FloatElem: serde::Serialize + serde::de::DeserializeOwned,
        B::IntElem: serde::Serialize + serde::de::DeserializeOwned,
    {
        let net = ScoreNet::load(device, path, config)?;
        Ok(Self::new(net, config.input_dim, device.clone()))
    }
}

impl<B: Backend> ScoreModel for BurnScoreModel<B> {
    fn input_dim(&self) -> usize {
        self.input_dim
    }

    fn predict(&self, rows: &[Vec<f32>]) -> Result<Vec<ModelOutput>> {
        if let Some(bad) = rows.iter().find(|r| r.len() != self.input_dim) {
            return Err(GridironError::SchemaMismatch {
                expected: self.input_dim.to_string(),
                found: bad.len().to_string(),
            });
        }
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let data: Vec<f32> = rows.iter().flatten().copied().collect();
        let features = Tensor::<B, 1>::from_floats(data.as_slice(), &self.device)
            .reshape([rows.len(), self.input_dim]);

        let output = self.net.forward(features);
        let scores = to_f32_vec(output.scores.clone())?;
        let probs = to_f32_vec(output.win_prob())?;

        Ok(scores
            .chunks_exact(2)
            .zip(probs)
            .map(|(s, p)| ModelOutput {
                home_score: s[0],
                away_score: s[1],
                home_win_prob: p,
            })
            .collect())
    }
}

fn to_f32_vec<B: Backend>(tensor: Tensor<B, 2>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| GridironError::Model(format!("{:?}", e)))
}
