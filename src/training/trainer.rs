//! Ensemble training
//!
//! Fits the frozen normalizer once, then trains each ensemble member on its
//! own seeded train/validation shuffle and writes the artifact directory read
//! by [`InferenceContext::load`](crate::predict::InferenceContext::load).

use burn::data::dataloader::DataLoaderBuilder;
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::{ElementConversion, Tensor};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::Path;

use crate::data::dataset::{GameBatch, GameBatcher, GameDataset, GameSample, TrainingMatrix};
use crate::features::schema::SchemaRegistry;
use crate::model::score_net::{ScoreNet, ScoreNetConfig, ScoreNetOutput};
use crate::predict::context::{ArtifactManifest, MemberArtifact, MANIFEST_FILE, NORMALIZER_FILE};
use crate::predict::normalizer::FeatureNormalizer;
use crate::training::metrics::{BatchResult, Metrics, TrainingHistory};
use crate::{GridironError, Result, TrainingBackend, TrainingConfig};

/// Weighted sum of score MSE and win BCE
pub struct ScoreLoss {
    pub win_weight: f32,
    pub score_weight: f32,
}

impl ScoreLoss {
    pub fn new(win_weight: f32, score_weight: f32) -> Self {
        ScoreLoss {
            win_weight,
            score_weight,
        }
    }

    /// Compute loss and return (total, win_loss, score_loss)
    pub fn forward<B: Backend>(
        &self,
        output: &ScoreNetOutput<B>,
        targets: &GameBatch<B>,
    ) -> (Tensor<B, 1>, Tensor<B, 1>, Tensor<B, 1>) {
        let win_targets = targets.home_win.clone().unsqueeze_dim(1);
        let win_loss = binary_cross_entropy(output.win_prob(), win_targets);

        let score_loss = (output.scores.clone() - targets.scores.clone())
            .powf_scalar(2.0)
            .mean();

        let total = win_loss.clone() * self.win_weight + score_loss.clone() * self.score_weight;
        (total, win_loss, score_loss)
    }
}

fn binary_cross_entropy<B: Backend>(probs: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 1> {
    let eps = 1e-7;
    let probs = probs.clamp(eps, 1.0 - eps);
    let loss = targets.clone().neg() * probs.clone().log()
        - (targets.neg() + 1.0) * (probs.neg() + 1.0).log();
    loss.mean()
}

/// Trains a single [`ScoreNet`]
pub struct MemberTrainer<B: AutodiffBackend> {
    model: ScoreNet<B>,
    optimizer: burn::optim::adaptor::OptimizerAdaptor<burn::optim::Adam, ScoreNet<B>, B>,
    loss_fn: ScoreLoss,
    config: TrainingConfig,
    device: B::Device,
}

impl<B: AutodiffBackend> MemberTrainer<B> {
    pub fn new(model: ScoreNet<B>, config: TrainingConfig, device: B::Device) -> Self {
        MemberTrainer {
            model,
            optimizer: AdamConfig::new().init(),
            loss_fn: ScoreLoss::new(config.win_weight, config.score_weight),
            config,
            device,
        }
    }

    /// Train with early stopping and return the weights from the best
    /// validation epoch
    pub fn train(
        mut self,
        train_dataset: GameDataset,
        val_dataset: GameDataset,
        seed: u64,
    ) -> Result<(ScoreNet<B>, TrainingHistory)> {
        let batch_size = self.config.batch_size.max(1);
        let train_loader = DataLoaderBuilder::new(GameBatcher::<B>::new(self.device.clone()))
            .batch_size(batch_size)
            .shuffle(seed)
            .build(train_dataset);
        let val_loader =
            DataLoaderBuilder::new(GameBatcher::<B::InnerBackend>::new(self.device.clone()))
                .batch_size(batch_size)
                .build(val_dataset);

        let mut history = TrainingHistory::new();
        let mut best_model = self.model.clone();

        for epoch in 0..self.config.epochs {
            let train_metrics = self.train_epoch(train_loader.iter())?;
            let val_metrics = self.validate_epoch(val_loader.iter())?;

            let improved = history.record_epoch(epoch, &train_metrics, &val_metrics);
            info!(
                "Epoch {}/{}: Train: {} | Val: {}",
                epoch + 1,
                self.config.epochs,
                train_metrics,
                val_metrics
            );

            if improved {
                best_model = self.model.clone();
                log::debug!("  New best model (val_loss: {:.4})", val_metrics.avg_loss());
            }

            if history.should_early_stop(self.config.early_stopping_patience) {
                info!(
                    "Early stopping at epoch {} (best was epoch {})",
                    epoch + 1,
                    history.best_epoch + 1
                );
                break;
            }
        }

        Ok((best_model, history))
    }

    fn train_epoch(&mut self, loader: impl Iterator<Item = GameBatch<B>>) -> Result<Metrics> {
        let mut metrics = Metrics::new();

        for batch in loader {
            let output = self.model.forward(batch.features.clone());
            let (total_loss, win_loss, score_loss) = self.loss_fn.forward(&output, &batch);

            let mut result = batch_result(&output, &batch)?;
            result.total_loss = total_loss.clone().into_scalar().elem();
            result.win_loss = win_loss.into_scalar().elem();
            result.score_loss = score_loss.into_scalar().elem();

            let grads = total_loss.backward();
            let grads = GradientsParams::from_grads(grads, &self.model);
            self.model = self
                .optimizer
                .step(self.config.learning_rate, self.model.clone(), grads);

            metrics.update(result);
        }

        Ok(metrics)
    }

    /// Evaluated on the inner backend so dropout is disabled
    fn validate_epoch(
        &self,
        loader: impl Iterator<Item = GameBatch<B::InnerBackend>>,
    ) -> Result<Metrics> {
        let model = self.model.valid();
        let mut metrics = Metrics::new();

        for batch in loader {
            let output = model.forward(batch.features.clone());
            let (total_loss, win_loss, score_loss) = self.loss_fn.forward(&output, &batch);

            let mut result = batch_result(&output, &batch)?;
            result.total_loss = total_loss.into_scalar().elem();
            result.win_loss = win_loss.into_scalar().elem();
            result.score_loss = score_loss.into_scalar().elem();
            metrics.update(result);
        }

        Ok(metrics)
    }
}

/// Win accuracy and per-side score MAE for one batch
fn batch_result<B: Backend>(
    output: &ScoreNetOutput<B>,
    batch: &GameBatch<B>,
) -> Result<BatchResult> {
    let probs = values(output.win_prob())?;
    let targets = values(batch.home_win.clone())?;
    let predicted = values(output.scores.clone())?;
    let actual = values(batch.scores.clone())?;

    let correct_wins = probs
        .iter()
        .zip(&targets)
        .filter(|(p, t)| (**p >= 0.5) == (**t >= 0.5))
        .count();

    let n = targets.len().max(1) as f32;
    let (mut home, mut away) = (0.0f32, 0.0f32);
    for (p, a) in predicted.chunks_exact(2).zip(actual.chunks_exact(2)) {
        home += (p[0] - a[0]).abs();
        away += (p[1] - a[1]).abs();
    }

    Ok(BatchResult {
        correct_wins,
        batch_size: targets.len(),
        home_score_mae: home / n,
        away_score_mae: away / n,
        ..Default::default()
    })
}

fn values<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| GridironError::Model(format!("{:?}", e)))
}

/// Trains the whole ensemble and writes its artifacts
pub struct Trainer {
    config: TrainingConfig,
    schema: SchemaRegistry,
}

impl Trainer {
    pub fn new(config: TrainingConfig, schema: SchemaRegistry) -> Self {
        Trainer { config, schema }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Fit the normalizer, train every member and write normalizer, weights
    /// and manifest into `artifact_dir`
    pub fn train<P: AsRef<Path>>(
        &self,
        matrix: &TrainingMatrix,
        artifact_dir: P,
    ) -> Result<ArtifactManifest> {
        let feature_len = self.schema.feature_len();
        if matrix.feature_len != feature_len {
            return Err(GridironError::SchemaMismatch {
                expected: feature_len.to_string(),
                found: matrix.feature_len.to_string(),
            });
        }
        if matrix.len() < 2 {
            return Err(GridironError::EmptyDataset(format!(
                "need at least 2 training games, found {}",
                matrix.len()
            )));
        }
        if self.config.ensemble_size == 0 {
            return Err(GridironError::Config("ensemble_size must be at least 1".to_string()));
        }

        let dir = artifact_dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let normalizer = FeatureNormalizer::fit(&matrix.features)?;
        let rows = normalizer.transform_all(&matrix.features)?;
        let samples = GameDataset::from_rows(rows, &matrix.labels).samples().to_vec();

        let net_config = ScoreNetConfig::from_training(feature_len, &self.config);
        let mut manifest = ArtifactManifest::new(&self.schema, net_config.clone(), matrix.len());
        let device: <TrainingBackend as Backend>::Device = Default::default();

        info!(
            "Training {} ensemble member(s) on {} games ({} features)",
            self.config.ensemble_size,
            matrix.len(),
            feature_len
        );

        for member in 0..self.config.ensemble_size {
            let seed = self.config.seed.wrapping_add(member as u64);
            let (train, val) = self.member_split(&samples, seed);
            info!(
                "Member {}/{} (seed {}): {} train / {} validation",
                member + 1,
                self.config.ensemble_size,
                seed,
                train.len(),
                val.len()
            );

            let model = ScoreNet::<TrainingBackend>::new(&device, &net_config);
            let trainer = MemberTrainer::new(model, self.config.clone(), device.clone());
            let (best, history) = trainer.train(train, val, seed)?;

            let file = format!("member-{}", member);
            best.valid().save(&dir.join(&file))?;
            manifest.members.push(MemberArtifact {
                file,
                seed,
                best_epoch: history.best_epoch,
                validation_loss: history.best_val_loss,
            });
        }

        normalizer.save(dir.join(NORMALIZER_FILE))?;
        manifest.save(dir.join(MANIFEST_FILE))?;
        info!("Saved {} ensemble member(s) to {}", manifest.members.len(), dir.display());

        Ok(manifest)
    }

    /// Seeded shuffle then split; falls back to validating on the training
    /// rows when the split leaves no validation rows
    fn member_split(&self, samples: &[GameSample], seed: u64) -> (GameDataset, GameDataset) {
        let mut shuffled = samples.to_vec();
        let mut rng = StdRng::seed_from_u64(seed);
        shuffled.shuffle(&mut rng);

        let ratio = self.config.validation_ratio.clamp(0.0, 0.9);
        let (train, val) = GameDataset::new(shuffled).split(1.0 - ratio);
        if val.is_empty() {
            warn!("Validation split is empty, validating on the training rows");
            return (train.clone(), train);
        }
        (train, val)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::encoder::LabelVector;
    use crate::predict::context::InferenceContext;
    use crate::predict::ensemble::EnsemblePredictor;
    use burn::backend::NdArray;

    fn matrix(schema: &SchemaRegistry, games: usize) -> TrainingMatrix {
        let dim = schema.feature_len();
        let mut m = TrainingMatrix {
            feature_len: dim,
            ..Default::default()
        };
        for g in 0..games {
            let row: Vec<f32> = (0..dim).map(|i| ((g * 7 + i) % 11) as f32).collect();
            let home = 10.0 + (g % 4) as f32 * 7.0;
            let away = 24.0 - (g % 3) as f32 * 3.0;
            m.features.push(row);
            m.labels.push(LabelVector::from_scores(home, away));
            m.game_ids.push(g.to_string());
        }
        m
    }

    fn quick_config() -> TrainingConfig {
        TrainingConfig {
            epochs: 3,
            batch_size: 4,
            hidden_dims: vec![8],
            ensemble_size: 2,
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn test_loss_components() {
        type B = NdArray<f32>;
        let device = Default::default();
        let output = ScoreNetOutput::<B> {
            scores: Tensor::from_floats([[20.0, 10.0]], &device),
            win_logit: Tensor::from_floats([[0.0]], &device),
        };
        let batch = GameBatch::<B> {
            features: Tensor::zeros([1, 1], &device),
            scores: Tensor::from_floats([[22.0, 10.0]], &device),
            home_win: Tensor::from_floats([1.0], &device),
        };

        let (total, win, score) = ScoreLoss::new(1.0, 1.0).forward(&output, &batch);
        let score: f32 = score.into_scalar().elem();
        let win: f32 = win.into_scalar().elem();
        let total: f32 = total.into_scalar().elem();

        assert!((score - 2.0).abs() < 1e-5);
        assert!((win - std::f32::consts::LN_2).abs() < 1e-4);
        assert!((total - (score + win)).abs() < 1e-4);
    }

    #[test]
    fn test_member_splits_differ_by_seed() {
        let trainer = Trainer::new(quick_config(), SchemaRegistry::default());
        let samples: Vec<GameSample> = (0..20)
            .map(|i| GameSample {
                features: vec![i as f32],
                home_score: 0.0,
                away_score: 0.0,
                home_win: 0.0,
            })
            .collect();

        let (a, a_val) = trainer.member_split(&samples, 1);
        let (b, _) = trainer.member_split(&samples, 2);
        let (a_again, _) = trainer.member_split(&samples, 1);

        assert_eq!(a.len(), 16);
        assert_eq!(a_val.len(), 4);
        let firsts = |d: &GameDataset| d.samples().iter().map(|s| s.features[0]).collect::<Vec<_>>();
        assert_eq!(firsts(&a), firsts(&a_again));
        assert_ne!(firsts(&a), firsts(&b));
    }

    #[test]
    fn test_rejects_tiny_or_mismatched_matrix() {
        let schema = SchemaRegistry::default();
        let trainer = Trainer::new(quick_config(), schema.clone());
        let dir = std::env::temp_dir().join(format!("gridiron-reject-{}", std::process::id()));

        assert!(matches!(
            trainer.train(&matrix(&schema, 1), &dir),
            Err(GridironError::EmptyDataset(_))
        ));

        let mut wrong = matrix(&schema, 4);
        wrong.feature_len += 1;
        assert!(matches!(
            trainer.train(&wrong, &dir),
            Err(GridironError::SchemaMismatch { .. })
        ));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_train_then_load_and_predict() {
        let schema = SchemaRegistry::default();
        let data = matrix(&schema, 12);
        let dir = std::env::temp_dir().join(format!("gridiron-train-{}", std::process::id()));

        let manifest = Trainer::new(quick_config(), schema.clone())
            .train(&data, &dir)
            .unwrap();
        assert_eq!(manifest.members.len(), 2);
        assert_ne!(manifest.members[0].seed, manifest.members[1].seed);
        assert!(manifest.members.iter().all(|m| m.best_epoch < 3));

        let context = InferenceContext::load(&dir, &schema).unwrap();
        let scored = EnsemblePredictor::new(&context).predict_rows(&data.features[..3]);
        assert_eq!(scored.len(), 3);
        assert!(scored.iter().all(|(_, o)| (0.0..=1.0).contains(&o.home_win_prob)));

        std::fs::remove_dir_all(&dir).ok();
    }
}
