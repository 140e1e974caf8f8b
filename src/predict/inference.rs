//! Inference front end
//!
//! Encodes upcoming contests exactly as the training matrix was encoded,
//! scores them with the loaded ensemble and joins the results with schedule
//! metadata for display.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::data::dataset::{BatchPreprocessor, GameRecord, SeasonRange};
use crate::data::lenient;
use crate::features::encoder::FeatureEncoder;
use crate::predict::context::InferenceContext;
use crate::predict::ensemble::{EnsemblePredictor, ModelOutput};
use crate::{GridironError, Result};

/// Descriptive metadata for one scheduled contest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ScheduleEntry {
    #[serde(rename = "GameID", deserialize_with = "lenient::id_string")]
    pub game_id: String,
    pub home_team_name: String,
    pub home_team_alias: String,
    pub home_team_primary_color: String,
    pub home_team_secondary_color: String,
    pub away_team_name: String,
    pub away_team_alias: String,
    pub away_team_primary_color: String,
    pub away_team_secondary_color: String,
    #[serde(deserialize_with = "lenient::optional_count")]
    pub home_team_wins: Option<u32>,
    #[serde(deserialize_with = "lenient::optional_count")]
    pub away_team_wins: Option<u32>,
    #[serde(deserialize_with = "lenient::optional_count")]
    pub home_team_losses: Option<u32>,
    #[serde(deserialize_with = "lenient::optional_count")]
    pub away_team_losses: Option<u32>,
    pub home_team_division: String,
    pub away_team_division: String,
    #[serde(deserialize_with = "lenient::optional_f32")]
    pub home_points: Option<f32>,
    #[serde(deserialize_with = "lenient::optional_f32")]
    pub away_points: Option<f32>,
}

pub fn load_schedule<P: AsRef<Path>>(path: P) -> Result<Vec<ScheduleEntry>> {
    let content = std::fs::read_to_string(path.as_ref())?;
    Ok(serde_json::from_str(&content)?)
}

/// One scored contest, keyed the way the web front end reads it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GamePrediction {
    #[serde(rename = "GameID")]
    pub game_id: String,
    pub home_team: String,
    pub home_team_alias: String,
    pub home_team_primary_color: String,
    pub home_team_secondary_color: String,
    pub away_team: String,
    pub away_team_alias: String,
    pub away_team_primary_color: String,
    pub away_team_secondary_color: String,
    pub home_team_wins: Option<u32>,
    pub away_team_wins: Option<u32>,
    pub home_team_losses: Option<u32>,
    pub away_team_losses: Option<u32>,
    pub home_team_division: String,
    pub away_team_division: String,
    pub actual_home_score: Option<f32>,
    pub actual_away_score: Option<f32>,
    pub predicted_home_score: f32,
    pub predicted_away_score: f32,
    pub home_win_probability: f32,
}

impl GamePrediction {
    fn new(game_id: &str, info: Option<&ScheduleEntry>, output: ModelOutput) -> Self {
        let empty = ScheduleEntry::default();
        let info = info.unwrap_or(&empty);
        GamePrediction {
            game_id: game_id.to_string(),
            home_team: info.home_team_name.clone(),
            home_team_alias: info.home_team_alias.clone(),
            home_team_primary_color: info.home_team_primary_color.clone(),
            home_team_secondary_color: info.home_team_secondary_color.clone(),
            away_team: info.away_team_name.clone(),
            away_team_alias: info.away_team_alias.clone(),
            away_team_primary_color: info.away_team_primary_color.clone(),
            away_team_secondary_color: info.away_team_secondary_color.clone(),
            home_team_wins: info.home_team_wins,
            away_team_wins: info.away_team_wins,
            home_team_losses: info.home_team_losses,
            away_team_losses: info.away_team_losses,
            home_team_division: info.home_team_division.clone(),
            away_team_division: info.away_team_division.clone(),
            actual_home_score: info.home_points,
            actual_away_score: info.away_points,
            predicted_home_score: output.home_score,
            predicted_away_score: output.away_score,
            home_win_probability: output.home_win_prob,
        }
    }

    /// Team shown as the favourite
    pub fn favourite(&self) -> &str {
        if self.home_win_probability >= 0.5 {
            &self.home_team
        } else {
            &self.away_team
        }
    }
}

/// Predictions grouped by week, in week order
pub type WeeklyPredictions = BTreeMap<u8, Vec<GamePrediction>>;

pub fn save_predictions<P: AsRef<Path>>(path: P, predictions: &WeeklyPredictions) -> Result<()> {
    // Week keys are written as strings, as the front end expects
    let keyed: BTreeMap<String, &Vec<GamePrediction>> =
        predictions.iter().map(|(w, p)| (w.to_string(), p)).collect();
    if let Some(parent) = path.as_ref().parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path.as_ref(), serde_json::to_string_pretty(&keyed)?)?;
    info!("Saved predictions to {}", path.as_ref().display());
    Ok(())
}

/// Scores contests against a loaded [`InferenceContext`]
pub struct Predictor<'a> {
    context: &'a InferenceContext,
    preprocessor: BatchPreprocessor,
}

impl<'a> Predictor<'a> {
    /// Fails with `SchemaMismatch` if the encoder's layout is not the one the
    /// context was trained on
    pub fn new(
        context: &'a InferenceContext,
        encoder: FeatureEncoder,
        seasons: SeasonRange,
    ) -> Result<Self> {
        context.manifest().check_schema(encoder.schema())?;
        Ok(Predictor {
            context,
            preprocessor: BatchPreprocessor::new(encoder, seasons),
        })
    }

    /// Score every eligible contest, optionally restricted to one week.
    /// Contests that fail the completeness checks or cannot be scored are
    /// left out; a layout disagreement aborts.
    pub fn predict(
        &self,
        games: &[GameRecord],
        schedule: &[ScheduleEntry],
        week: Option<u8>,
    ) -> Result<WeeklyPredictions> {
        let selected: Vec<GameRecord> = games
            .iter()
            .filter(|g| week.map_or(true, |w| g.week == w))
            .cloned()
            .collect();

        let matrix = self.preprocessor.process(&selected)?;
        let scored = EnsemblePredictor::new(self.context).predict_rows(&matrix.features);

        let schedule: HashMap<&str, &ScheduleEntry> =
            schedule.iter().map(|e| (e.game_id.as_str(), e)).collect();
        let weeks: HashMap<&str, u8> = selected
            .iter()
            .map(|g| (g.game_id.as_str(), g.week))
            .collect();

        let mut predictions = WeeklyPredictions::new();
        for (row, output) in scored {
            let game_id = &matrix.game_ids[row];
            let Some(&game_week) = weeks.get(game_id.as_str()) else {
                continue;
            };
            let info = schedule.get(game_id.as_str()).copied();
            if info.is_none() {
                warn!("No schedule metadata for game {}", game_id);
            }
            predictions
                .entry(game_week)
                .or_default()
                .push(GamePrediction::new(game_id, info, output));
        }

        let total: usize = predictions.values().map(Vec::len).sum();
        info!(
            "Predicted {} of {} games across {} week(s)",
            total,
            selected.len(),
            predictions.len()
        );
        Ok(predictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::roster::{PlayerFeatureRecord, PositionBlock, RosterObject, TeamMetrics};
    use crate::data::source::TimeWindow;
    use crate::features::schema::{
        PeriodCompletedEncoding, PositionGroup, SchemaOptions, SchemaRegistry,
    };
    use crate::model::ScoreNetConfig;
    use crate::predict::context::ArtifactManifest;
    use crate::predict::ensemble::ScoreModel;
    use crate::predict::normalizer::FeatureNormalizer;
    use serde_json::json;

    struct ConstantModel {
        dim: usize,
    }

    impl ScoreModel for ConstantModel {
        fn input_dim(&self) -> usize {
            self.dim
        }

        fn predict(&self, rows: &[Vec<f32>]) -> Result<Vec<ModelOutput>> {
            Ok(vec![
                ModelOutput {
                    home_score: 31.0,
                    away_score: 17.0,
                    home_win_prob: 0.8,
                };
                rows.len()
            ])
        }
    }

    fn context(schema: &SchemaRegistry) -> InferenceContext {
        let dim = schema.feature_len();
        let normalizer = FeatureNormalizer {
            mean: vec![0.0; dim],
            scale: vec![1.0; dim],
        };
        InferenceContext::new(
            normalizer,
            vec![Box::new(ConstantModel { dim })],
            ArtifactManifest::new(schema, ScoreNetConfig::new(dim), 0),
        )
        .unwrap()
    }

    fn roster(with_linemen: bool) -> RosterObject {
        let mut roster = RosterObject::new(TeamMetrics::new("FBS"));
        for group in PositionGroup::ALL {
            if group == PositionGroup::OffensiveLine && !with_linemen {
                continue;
            }
            roster.set_block(PositionBlock::from_players(
                group,
                vec![PlayerFeatureRecord::new("p")],
            ));
        }
        roster
    }

    fn game(id: &str, season: u16, week: u8, complete: bool) -> GameRecord {
        GameRecord {
            game_id: id.to_string(),
            season,
            week,
            home_points: 0.0,
            away_points: 0.0,
            home_stats: vec![roster(complete); 3],
            away_stats: vec![roster(true); 3],
            home_ap_votes: 0.0,
            away_ap_votes: 0.0,
            home_fcs_votes: 0.0,
            away_fcs_votes: 0.0,
        }
    }

    fn schedule() -> Vec<ScheduleEntry> {
        serde_json::from_value(json!([
            {
                "GameID": 401,
                "HomeTeamName": "Georgia",
                "HomeTeamAlias": "UGA",
                "AwayTeamName": "Auburn",
                "HomeTeamWins": "5",
                "HomeTeamLosses": 0,
                "HomePoints": ""
            }
        ]))
        .unwrap()
    }

    #[test]
    fn test_predictions_grouped_by_week() {
        let schema = SchemaRegistry::default();
        let context = context(&schema);
        let predictor =
            Predictor::new(&context, FeatureEncoder::new(schema), SeasonRange::starting(2023))
                .unwrap();

        let games = vec![
            game("401", 2023, 3, true),
            game("402", 2023, 4, true),
            game("403", 2023, 4, false),
            game("300", 2022, 4, true),
        ];
        let predictions = predictor.predict(&games, &schedule(), None).unwrap();

        assert_eq!(predictions.keys().copied().collect::<Vec<_>>(), vec![3, 4]);
        assert_eq!(predictions[&4].len(), 1);

        let first = &predictions[&3][0];
        assert_eq!(first.home_team, "Georgia");
        assert_eq!(first.home_team_wins, Some(5));
        assert_eq!(first.actual_home_score, None);
        assert_eq!(first.predicted_home_score, 31.0);
        assert_eq!(first.favourite(), "Georgia");

        // Unknown schedule entries still produce a prediction
        assert_eq!(predictions[&4][0].game_id, "402");
        assert_eq!(predictions[&4][0].home_team, "");
    }

    #[test]
    fn test_week_filter() {
        let schema = SchemaRegistry::default();
        let context = context(&schema);
        let predictor =
            Predictor::new(&context, FeatureEncoder::new(schema), SeasonRange::all()).unwrap();

        let games = vec![game("1", 2023, 3, true), game("2", 2023, 4, true)];
        let predictions = predictor.predict(&games, &[], Some(4)).unwrap();
        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[&4][0].game_id, "2");
    }

    #[test]
    fn test_layout_disagreement_is_rejected() {
        let context = context(&SchemaRegistry::default());
        let wider = SchemaRegistry::new(SchemaOptions {
            include_recruiting_summary: true,
            ..SchemaOptions::default()
        });
        let result = Predictor::new(&context, FeatureEncoder::new(wider), SeasonRange::all());
        assert!(matches!(result, Err(GridironError::SchemaMismatch { .. })));
    }

    #[test]
    fn test_same_length_different_layout_is_rejected() {
        let context = context(&SchemaRegistry::default());

        let reordered = SchemaRegistry::new(SchemaOptions {
            windows: vec![
                TimeWindow::LastSeason,
                TimeWindow::Last3Games,
                TimeWindow::CurrentSeason,
            ],
            ..SchemaOptions::default()
        });
        assert_eq!(reordered.feature_len(), context.manifest().feature_len);
        let result = Predictor::new(&context, FeatureEncoder::new(reordered), SeasonRange::all());
        assert!(matches!(result, Err(GridironError::SchemaMismatch { .. })));

        let legacy = SchemaRegistry::new(SchemaOptions {
            period_completed: PeriodCompletedEncoding::LegacyStringMatch,
            ..SchemaOptions::default()
        });
        let result = Predictor::new(&context, FeatureEncoder::new(legacy), SeasonRange::all());
        assert!(matches!(result, Err(GridironError::SchemaMismatch { .. })));
    }

    #[test]
    fn test_output_keys() {
        let prediction = GamePrediction::new(
            "9",
            None,
            ModelOutput {
                home_score: 20.0,
                away_score: 24.0,
                home_win_prob: 0.4,
            },
        );
        let value = serde_json::to_value(&prediction).unwrap();
        assert_eq!(value["PredictedAwayScore"], json!(24.0));
        assert!((value["HomeWinProbability"].as_f64().unwrap() - 0.4).abs() < 1e-6);
        assert!(value.get("HomeTeamPrimaryColor").is_some());
    }

    #[test]
    fn test_save_predictions_creates_directory() {
        let root = std::env::temp_dir().join(format!("gridiron-out-{}", std::process::id()));
        let path = root.join("week").join("predictions.json");

        let schema = SchemaRegistry::default();
        let context = context(&schema);
        let predictor =
            Predictor::new(&context, FeatureEncoder::new(schema), SeasonRange::all()).unwrap();
        let predictions = predictor.predict(&[game("1", 2023, 5, true)], &[], None).unwrap();

        save_predictions(&path, &predictions).unwrap();
        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved["5"][0]["GameID"], "1");

        std::fs::remove_dir_all(&root).ok();
    }
}
