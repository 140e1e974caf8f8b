//! Ensemble scoring over normalized feature rows

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::predict::context::InferenceContext;
use crate::Result;

/// One model's (or the ensemble's) prediction for one contest
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelOutput {
    pub home_score: f32,
    pub away_score: f32,
    /// In `[0, 1]`
    pub home_win_prob: f32,
}

impl ModelOutput {
    pub fn is_finite(&self) -> bool {
        self.home_score.is_finite() && self.away_score.is_finite() && self.home_win_prob.is_finite()
    }
}

/// A trained scorer: a normalized row in, two scores and a win probability out
///
/// Models are `Send` so a loaded context can move to a serving thread. They
/// are not required to be `Sync`: concurrent callers need one context per
/// thread or a lock around a shared one.
pub trait ScoreModel: Send {
    /// Expected row length
    fn input_dim(&self) -> usize;

    /// Score a batch of normalized rows, one output per row
    fn predict(&self, rows: &[Vec<f32>]) -> Result<Vec<ModelOutput>>;
}

/// Averages every model of a loaded context
pub struct EnsemblePredictor<'a> {
    context: &'a InferenceContext,
}

impl<'a> EnsemblePredictor<'a> {
    pub fn new(context: &'a InferenceContext) -> Self {
        EnsemblePredictor { context }
    }

    /// Score raw (unnormalized) rows. Returns `(row index, mean output)` for
    /// every row that could be scored; malformed rows are logged and left out.
    pub fn predict_rows(&self, rows: &[Vec<f32>]) -> Vec<(usize, ModelOutput)> {
        let normalizer = self.context.normalizer();

        let mut indices = Vec::with_capacity(rows.len());
        let mut normalized = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            if row.iter().any(|v| !v.is_finite()) {
                warn!("Skipping row {}: non-finite feature value", i);
                continue;
            }
            match normalizer.transform(row) {
                Ok(n) => {
                    indices.push(i);
                    normalized.push(n);
                }
                Err(e) => warn!("Skipping row {}: {}", i, e),
            }
        }
        if normalized.is_empty() {
            return Vec::new();
        }

        // Running mean per row; None once any model fails on that row
        let mut means: Vec<Option<ModelOutput>> = vec![None; normalized.len()];
        let mut failed = vec![false; normalized.len()];

        for (k, model) in self.context.models().iter().enumerate() {
            let outputs = score_rows(&**model, &normalized);
            for (slot, output) in outputs.into_iter().enumerate() {
                if failed[slot] {
                    continue;
                }
                match output {
                    Some(out) if out.is_finite() => {
                        means[slot] = Some(match means[slot] {
                            None => out,
                            Some(m) => running_mean(m, out, k + 1),
                        });
                    }
                    _ => {
                        warn!("Skipping row {}: model {} produced no usable output", indices[slot], k);
                        failed[slot] = true;
                        means[slot] = None;
                    }
                }
            }
        }

        let scored: Vec<_> = indices
            .into_iter()
            .zip(means)
            .filter_map(|(i, mean)| mean.map(|m| (i, m)))
            .collect();
        debug!("Ensemble scored {} of {} rows", scored.len(), rows.len());
        scored
    }
}

/// Batch first; if the batch fails, fall back to one row at a time so a
/// single bad row does not take the others down
fn score_rows(model: &dyn ScoreModel, rows: &[Vec<f32>]) -> Vec<Option<ModelOutput>> {
    match model.predict(rows) {
        Ok(outputs) if outputs.len() == rows.len() => outputs.into_iter().map(Some).collect(),
        Ok(outputs) => {
            warn!(
                "Model returned {} outputs for {} rows, scoring rows individually",
                outputs.len(),
                rows.len()
            );
            score_individually(model, rows)
        }
        Err(e) => {
            warn!("Batch prediction failed ({}), scoring rows individually", e);
            score_individually(model, rows)
        }
    }
}

fn score_individually(model: &dyn ScoreModel, rows: &[Vec<f32>]) -> Vec<Option<ModelOutput>> {
    rows.iter()
        .map(|row| match model.predict(std::slice::from_ref(row)) {
            Ok(outputs) if outputs.len() == 1 => Some(outputs[0]),
            _ => None,
        })
        .collect()
}

/// Mean of `count` outputs given the mean of the first `count - 1`
fn running_mean(mean: ModelOutput, next: ModelOutput, count: usize) -> ModelOutput {
    let n = count as f32;
    ModelOutput {
        home_score: mean.home_score + (next.home_score - mean.home_score) / n,
        away_score: mean.away_score + (next.away_score - mean.away_score) / n,
        home_win_prob: mean.home_win_prob + (next.home_win_prob - mean.home_win_prob) / n,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predict::context::ArtifactManifest;
    use crate::predict::normalizer::FeatureNormalizer;
    use crate::GridironError;

    /// Returns a fixed output, or a per-row function of the first feature
    struct FixedModel {
        dim: usize,
        output: ModelOutput,
        scale_by_first: bool,
    }

    impl ScoreModel for FixedModel {
        fn input_dim(&self) -> usize {
            self.dim
        }

        fn predict(&self, rows: &[Vec<f32>]) -> Result<Vec<ModelOutput>> {
            Ok(rows
                .iter()
                .map(|r| {
                    if self.scale_by_first {
                        ModelOutput {
                            home_score: self.output.home_score * r[0],
                            ..self.output
                        }
                    } else {
                        self.output
                    }
                })
                .collect())
        }
    }

    /// Fails whenever a batch contains a row whose first feature exceeds 100
    struct PickyModel;

    impl ScoreModel for PickyModel {
        fn input_dim(&self) -> usize {
            2
        }

        fn predict(&self, rows: &[Vec<f32>]) -> Result<Vec<ModelOutput>> {
            if rows.iter().any(|r| r[0] > 100.0) {
                return Err(GridironError::Model("activation overflow".to_string()));
            }
            Ok(vec![
                ModelOutput {
                    home_score: 1.0,
                    away_score: 2.0,
                    home_win_prob: 0.3,
                };
                rows.len()
            ])
        }
    }

    fn identity_context(models: Vec<Box<dyn ScoreModel>>) -> InferenceContext {
        let normalizer = FeatureNormalizer {
            mean: vec![0.0, 0.0],
            scale: vec![1.0, 1.0],
        };
        InferenceContext::new(normalizer, models, ArtifactManifest::for_tests(2)).unwrap()
    }

    fn output(h: f32, a: f32, p: f32) -> ModelOutput {
        ModelOutput {
            home_score: h,
            away_score: a,
            home_win_prob: p,
        }
    }

    #[test]
    fn test_identical_models_equal_single_model() {
        let single = output(27.3, 19.9, 0.71);
        for n in 1..=5 {
            let models: Vec<Box<dyn ScoreModel>> = (0..n)
                .map(|_| {
                    Box::new(FixedModel {
                        dim: 2,
                        output: single,
                        scale_by_first: false,
                    }) as Box<dyn ScoreModel>
                })
                .collect();
            let context = identity_context(models);
            let scored = EnsemblePredictor::new(&context).predict_rows(&[vec![1.0, 2.0]]);
            assert_eq!(scored, vec![(0, single)]);
        }
    }

    #[test]
    fn test_mean_across_models() {
        let models: Vec<Box<dyn ScoreModel>> = vec![
            Box::new(FixedModel { dim: 2, output: output(20.0, 10.0, 0.6), scale_by_first: false }),
            Box::new(FixedModel { dim: 2, output: output(30.0, 20.0, 0.8), scale_by_first: false }),
        ];
        let context = identity_context(models);
        let scored = EnsemblePredictor::new(&context).predict_rows(&[vec![0.0, 0.0]]);

        let (_, mean) = scored[0];
        assert!((mean.home_score - 25.0).abs() < 1e-5);
        assert!((mean.away_score - 15.0).abs() < 1e-5);
        assert!((mean.home_win_prob - 0.7).abs() < 1e-5);
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let models: Vec<Box<dyn ScoreModel>> = vec![Box::new(FixedModel {
            dim: 2,
            output: output(10.0, 7.0, 0.5),
            scale_by_first: true,
        })];
        let context = identity_context(models);
        let rows = vec![
            vec![1.0, 0.0],
            vec![1.0],
            vec![f32::NAN, 0.0],
            vec![2.0, 0.0],
        ];
        let scored = EnsemblePredictor::new(&context).predict_rows(&rows);

        let indices: Vec<_> = scored.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![0, 3]);
        assert_eq!(scored[1].1.home_score, 20.0);
    }

    #[test]
    fn test_failing_row_does_not_abort_batch() {
        let context = identity_context(vec![Box::new(PickyModel)]);
        let rows = vec![vec![1.0, 0.0], vec![500.0, 0.0], vec![3.0, 0.0]];
        let scored = EnsemblePredictor::new(&context).predict_rows(&rows);

        let indices: Vec<_> = scored.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![0, 2]);
    }

    #[test]
    fn test_non_finite_output_is_dropped() {
        let models: Vec<Box<dyn ScoreModel>> = vec![
            Box::new(FixedModel { dim: 2, output: output(10.0, 7.0, 0.5), scale_by_first: false }),
            Box::new(FixedModel { dim: 2, output: output(f32::INFINITY, 7.0, 0.5), scale_by_first: false }),
        ];
        let context = identity_context(models);
        assert!(EnsemblePredictor::new(&context)
            .predict_rows(&[vec![0.0, 0.0]])
            .is_empty());
    }
}
