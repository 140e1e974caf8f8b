//! Loaded inference artifacts

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::features::schema::SchemaRegistry;
use crate::model::score_net::{BurnScoreModel, ScoreNetConfig};
use crate::predict::ensemble::ScoreModel;
use crate::predict::normalizer::FeatureNormalizer;
use crate::{GridironError, InferenceBackend, Result};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const NORMALIZER_FILE: &str = "normalizer.json";

/// One trained ensemble member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberArtifact {
    /// Weights file relative to the artifact directory, without `.mpk`
    pub file: String,
    pub seed: u64,
    pub best_epoch: usize,
    pub validation_loss: f64,
}

/// Describes what a set of artifacts was trained against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub schema_version: u32,
    pub schema_fingerprint: String,
    pub feature_len: usize,
    pub model: ScoreNetConfig,
    pub members: Vec<MemberArtifact>,
    pub trained_at: DateTime<Utc>,
    pub training_games: usize,
}

impl ArtifactManifest {
    pub fn new(schema: &SchemaRegistry, model: ScoreNetConfig, training_games: usize) -> Self {
        ArtifactManifest {
            schema_version: schema.options().version,
            schema_fingerprint: schema.fingerprint(),
            feature_len: schema.feature_len(),
            model,
            members: Vec::new(),
            trained_at: Utc::now(),
            training_games,
        }
    }

    /// Fails with `SchemaMismatch` unless these artifacts match the active layout
    pub fn check_schema(&self, schema: &SchemaRegistry) -> Result<()> {
        if self.feature_len != schema.feature_len() {
            return Err(GridironError::SchemaMismatch {
                expected: format!("feature length {}", schema.feature_len()),
                found: format!("feature length {}", self.feature_len),
            });
        }
        let fingerprint = schema.fingerprint();
        if self.schema_fingerprint != fingerprint {
            return Err(GridironError::SchemaMismatch {
                expected: format!("schema {}", fingerprint),
                found: format!("schema {}", self.schema_fingerprint),
            });
        }
        Ok(())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path.as_ref(), serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&content)?)
    }

    #[cfg(test)]
    /// Length-only manifest; any fingerprint check against it fails
    pub(crate) fn for_tests(feature_len: usize) -> Self {
        ArtifactManifest {
            schema_version: 1,
            schema_fingerprint: String::new(),
            feature_len,
            model: ScoreNetConfig::new(feature_len),
            members: Vec::new(),
            trained_at: Utc::now(),
            training_games: 0,
        }
    }
}

/// Frozen normalizer and ensemble members, built once and shared by reference
pub struct InferenceContext {
    normalizer: FeatureNormalizer,
    models: Vec<Box<dyn ScoreModel>>,
    manifest: ArtifactManifest,
}

impl InferenceContext {
    pub fn new(
        normalizer: FeatureNormalizer,
        models: Vec<Box<dyn ScoreModel>>,
        manifest: ArtifactManifest,
    ) -> Result<Self> {
        if models.is_empty() {
            return Err(GridironError::NoModel);
        }
        if normalizer.len() != manifest.feature_len {
            return Err(GridironError::SchemaMismatch {
                expected: manifest.feature_len.to_string(),
                found: format!("normalizer of length {}", normalizer.len()),
            });
        }
        if let Some(model) = models.iter().find(|m| m.input_dim() != manifest.feature_len) {
            return Err(GridironError::SchemaMismatch {
                expected: manifest.feature_len.to_string(),
                found: format!("model input of length {}", model.input_dim()),
            });
        }

        Ok(InferenceContext {
            normalizer,
            models,
            manifest,
        })
    }

    /// Load the artifact directory written by the trainer
    pub fn load<P: AsRef<Path>>(dir: P, schema: &SchemaRegistry) -> Result<Self> {
        let dir = dir.as_ref();
        let manifest_path = dir.join(MANIFEST_FILE);
        if !manifest_path.exists() {
            return Err(GridironError::NoModel);
        }

        let manifest = ArtifactManifest::load(&manifest_path)?;
        manifest.check_schema(schema)?;

        let normalizer = FeatureNormalizer::load(dir.join(NORMALIZER_FILE))?;

        let device = Default::default();
        let mut models: Vec<Box<dyn ScoreModel>> = Vec::with_capacity(manifest.members.len());
        for member in &manifest.members {
            let model = BurnScoreModel::<InferenceBackend>::load(
                &device,
                &dir.join(&member.file),
                &manifest.model,
            )?;
            models.push(Box::new(model));
        }

        info!(
            "Loaded {} ensemble member(s) from {} (schema {})",
            models.len(),
            dir.display(),
            manifest.schema_fingerprint
        );
        Self::new(normalizer, models, manifest)
    }

    pub fn normalizer(&self) -> &FeatureNormalizer {
        &self.normalizer
    }

    pub fn models(&self) -> &[Box<dyn ScoreModel>] {
        &self.models
    }

    pub fn manifest(&self) -> &ArtifactManifest {
        &self.manifest
    }
}
