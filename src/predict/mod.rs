//! Prediction and inference
//!
//! Frozen normalizer, loaded ensemble and the inference front end.

pub mod context;
pub mod ensemble;
pub mod inference;
pub mod normalizer;

pub use context::{ArtifactManifest, InferenceContext, MemberArtifact};
pub use ensemble::{EnsemblePredictor, ModelOutput, ScoreModel};
pub use inference::{GamePrediction, Predictor, ScheduleEntry, WeeklyPredictions};
pub use normalizer::FeatureNormalizer;
