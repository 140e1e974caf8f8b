//! Game records, batch preprocessing and the burn dataset
//!
//! The bulk game file is a JSON array of contests, each carrying one roster
//! object per configured time window for both sides. The preprocessor filters
//! it by season and roster completeness and encodes the survivors into a
//! training matrix.

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::data::lenient;
use crate::features::encoder::{FeatureEncoder, LabelVector};
use crate::features::roster::RosterObject;
use crate::features::schema::{PositionGroup, LABEL_NAMES};
use crate::{GridironError, Result};

/// One contest with per-window rosters for both sides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    #[serde(rename = "GameID", default, deserialize_with = "lenient::id_string")]
    pub game_id: String,
    #[serde(rename = "Season", deserialize_with = "lenient::season")]
    pub season: u16,
    #[serde(rename = "Week", deserialize_with = "lenient::week")]
    pub week: u8,
    #[serde(rename = "HomePoints", default, deserialize_with = "lenient::f32_or_zero")]
    pub home_points: f32,
    #[serde(rename = "AwayPoints", default, deserialize_with = "lenient::f32_or_zero")]
    pub away_points: f32,
    /// One roster per configured window, in window order
    #[serde(rename = "HomeStats")]
    pub home_stats: Vec<RosterObject>,
    #[serde(rename = "AwayStats")]
    pub away_stats: Vec<RosterObject>,
    #[serde(rename = "HomeAPVotes", default, deserialize_with = "lenient::f32_or_zero")]
    pub home_ap_votes: f32,
    #[serde(rename = "AwayAPVotes", default, deserialize_with = "lenient::f32_or_zero")]
    pub away_ap_votes: f32,
    #[serde(rename = "HomeFCSVotes", default, deserialize_with = "lenient::f32_or_zero")]
    pub home_fcs_votes: f32,
    #[serde(rename = "AwayFCSVotes", default, deserialize_with = "lenient::f32_or_zero")]
    pub away_fcs_votes: f32,
}

impl GameRecord {
    /// First required group found empty, as `(side, window index, group)`
    pub fn first_missing_group(&self) -> Option<(&'static str, usize, PositionGroup)> {
        for (side, rosters) in [("home", &self.home_stats), ("away", &self.away_stats)] {
            for (i, roster) in rosters.iter().enumerate() {
                if let Some(group) = roster.missing_required_groups().first() {
                    return Some((side, i, *group));
                }
            }
        }
        None
    }

    /// Every window of both sides has a real player in every required group
    pub fn is_complete(&self) -> bool {
        self.first_missing_group().is_none()
    }
}

/// Load the bulk game file
pub fn load_games<P: AsRef<Path>>(path: P) -> Result<Vec<GameRecord>> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let games: Vec<GameRecord> = serde_json::from_str(&content)?;
    info!("Loaded {} games from {}", games.len(), path.as_ref().display());
    Ok(games)
}

/// Write the bulk game file
pub fn save_games<P: AsRef<Path>>(path: P, games: &[GameRecord]) -> Result<()> {
    if let Some(parent) = path.as_ref().parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path.as_ref(), serde_json::to_string_pretty(games)?)?;
    Ok(())
}

/// Inclusive season range; an open end is unbounded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<u16>,
}

impl SeasonRange {
    pub fn all() -> Self {
        SeasonRange::default()
    }

    /// Every season up to and including `season`
    pub fn through(season: u16) -> Self {
        SeasonRange {
            from: None,
            until: Some(season),
        }
    }

    /// Every season from `season` on
    pub fn starting(season: u16) -> Self {
        SeasonRange {
            from: Some(season),
            until: None,
        }
    }

    pub fn contains(&self, season: u16) -> bool {
        self.from.map_or(true, |from| season >= from)
            && self.until.map_or(true, |until| season <= until)
    }
}

/// Encoded contests ready for normalization and training
#[derive(Debug, Clone, Default)]
pub struct TrainingMatrix {
    pub features: Vec<Vec<f32>>,
    pub labels: Vec<LabelVector>,
    pub game_ids: Vec<String>,
    pub feature_len: usize,
}

impl TrainingMatrix {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Write one row per contest: game id, features, labels
    pub fn write_csv<P: AsRef<Path>>(&self, path: P, feature_names: &[String]) -> Result<()> {
        if feature_names.len() != self.feature_len {
            return Err(GridironError::SchemaMismatch {
                expected: self.feature_len.to_string(),
                found: format!("{} feature names", feature_names.len()),
            });
        }
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut writer = csv::Writer::from_path(path.as_ref())?;
        let mut header = Vec::with_capacity(1 + self.feature_len + LABEL_NAMES.len());
        header.push("game_id".to_string());
        header.extend(feature_names.iter().cloned());
        header.extend(LABEL_NAMES.iter().map(|s| s.to_string()));
        writer.write_record(&header)?;

        for ((id, row), labels) in self.game_ids.iter().zip(&self.features).zip(&self.labels) {
            let mut record = Vec::with_capacity(header.len());
            record.push(id.clone());
            record.extend(row.iter().map(|v| v.to_string()));
            record.extend(labels.to_vec().iter().map(|v| v.to_string()));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        info!("Wrote {} rows to {}", self.len(), path.as_ref().display());
        Ok(())
    }
}

/// Applies the season filter, the completeness filter and the encoder
pub struct BatchPreprocessor {
    encoder: FeatureEncoder,
    seasons: SeasonRange,
}

impl BatchPreprocessor {
    pub fn new(encoder: FeatureEncoder, seasons: SeasonRange) -> Self {
        BatchPreprocessor { encoder, seasons }
    }

    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    /// Games in the season range whose rosters can be encoded as real signal
    pub fn retain<'a>(&self, games: &'a [GameRecord]) -> Vec<&'a GameRecord> {
        let windows = self.encoder.schema().windows().len();
        let mut kept = Vec::new();
        let mut skipped = 0usize;

        for game in games.iter().filter(|g| self.seasons.contains(g.season)) {
            if game.home_stats.len() != windows || game.away_stats.len() != windows {
                warn!(
                    "Skipping game {}: {} home / {} away windows, expected {}",
                    game.game_id,
                    game.home_stats.len(),
                    game.away_stats.len(),
                    windows
                );
                skipped += 1;
                continue;
            }
            if let Some((side, window, group)) = game.first_missing_group() {
                debug!(
                    "Skipping game {}: {} window {} has no {}",
                    game.game_id,
                    side,
                    window,
                    group.label()
                );
                skipped += 1;
                continue;
            }
            kept.push(game);
        }

        info!(
            "{} games passed the checks and were processed ({} skipped)",
            kept.len(),
            skipped
        );
        kept
    }

    /// Encode the retained games. Any row whose length disagrees with the
    /// schema aborts the whole batch.
    pub fn process(&self, games: &[GameRecord]) -> Result<TrainingMatrix> {
        let feature_len = self.encoder.feature_len();
        let mut matrix = TrainingMatrix {
            feature_len,
            ..Default::default()
        };

        for game in self.retain(games) {
            let row = self.encoder.encode(game)?;
            if row.len() != feature_len {
                return Err(GridironError::SchemaMismatch {
                    expected: feature_len.to_string(),
                    found: format!("{} in game {}", row.len(), game.game_id),
                });
            }
            matrix.features.push(row);
            matrix.labels.push(self.encoder.labels(game));
            matrix.game_ids.push(game.game_id.clone());
        }

        Ok(matrix)
    }
}

/// A single training sample
#[derive(Debug, Clone)]
pub struct GameSample {
    /// Normalized feature vector
    pub features: Vec<f32>,
    pub home_score: f32,
    pub away_score: f32,
    pub home_win: f32,
}

/// In-memory dataset of encoded contests
#[derive(Clone)]
pub struct GameDataset {
    samples: Vec<GameSample>,
}

impl GameDataset {
    pub fn new(samples: Vec<GameSample>) -> Self {
        GameDataset { samples }
    }

    /// Pair already-normalized rows with their labels
    pub fn from_rows(features: Vec<Vec<f32>>, labels: &[LabelVector]) -> Self {
        let samples = features
            .into_iter()
            .zip(labels)
            .map(|(features, label)| GameSample {
                features,
                home_score: label.home_score,
                away_score: label.away_score,
                home_win: label.home_win,
            })
            .collect();
        GameDataset { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[GameSample] {
        &self.samples
    }

    /// Split dataset into train/validation
    pub fn split(self, train_ratio: f32) -> (Self, Self) {
        let split_idx = (self.samples.len() as f32 * train_ratio) as usize;
        let mut samples = self.samples;
        let val_samples = samples.split_off(split_idx.min(samples.len()));
        (
            GameDataset { samples },
            GameDataset {
                samples: val_samples,
            },
        )
    }
}

impl Dataset<GameSample> for GameDataset {
    fn get(&self, index: usize) -> Option<GameSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// Batch of samples for training
#[derive(Debug, Clone)]
pub struct GameBatch<B: Backend> {
    /// Features: [batch, feature_len]
    pub features: Tensor<B, 2>,
    /// Target scores (home, away): [batch, 2]
    pub scores: Tensor<B, 2>,
    /// Target win labels: [batch]
    pub home_win: Tensor<B, 1>,
}

/// Batcher for creating training batches
#[derive(Clone)]
pub struct GameBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> GameBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        GameBatcher { device }
    }
}

impl<B: Backend> Batcher<B, GameSample, GameBatch<B>> for GameBatcher<B> {
    fn batch(&self, items: Vec<GameSample>, _device: &B::Device) -> GameBatch<B> {
        let batch_size = items.len();
        let feature_dim = items.first().map(|s| s.features.len()).unwrap_or(0);

        let mut feature_data = Vec::with_capacity(batch_size * feature_dim);
        let mut score_data = Vec::with_capacity(batch_size * 2);
        let mut win_data = Vec::with_capacity(batch_size);

        for sample in &items {
            feature_data.extend_from_slice(&sample.features);
            score_data.push(sample.home_score);
            score_data.push(sample.away_score);
            win_data.push(sample.home_win);
        }

        let features = Tensor::<B, 1>::from_floats(feature_data.as_slice(), &self.device)
            .reshape([batch_size, feature_dim]);
        let scores = Tensor::<B, 1>::from_floats(score_data.as_slice(), &self.device)
            .reshape([batch_size, 2]);
        let home_win = Tensor::<B, 1>::from_floats(win_data.as_slice(), &self.device);

        GameBatch {
            features,
            scores,
            home_win,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::roster::{PlayerFeatureRecord, PositionBlock, TeamMetrics};
    use crate::features::schema::SchemaRegistry;
    use burn::backend::NdArray;
    use serde_json::json;

    type TestBackend = NdArray<f32>;

    fn complete_roster() -> RosterObject {
        let mut roster = RosterObject::new(TeamMetrics::new("FBS"));
        for group in PositionGroup::ALL {
            roster.set_block(PositionBlock::from_players(
                group,
                vec![PlayerFeatureRecord::new("p")],
            ));
        }
        roster
    }

    fn game(id: &str, season: u16) -> GameRecord {
        GameRecord {
            game_id: id.to_string(),
            season,
            week: 2,
            home_points: 24.0,
            away_points: 10.0,
            home_stats: vec![complete_roster(); 3],
            away_stats: vec![complete_roster(); 3],
            home_ap_votes: 0.0,
            away_ap_votes: 0.0,
            home_fcs_votes: 0.0,
            away_fcs_votes: 0.0,
        }
    }

    fn preprocessor(seasons: SeasonRange) -> BatchPreprocessor {
        BatchPreprocessor::new(FeatureEncoder::new(SchemaRegistry::default()), seasons)
    }

    #[test]
    fn test_season_range() {
        assert!(SeasonRange::through(2022).contains(2014));
        assert!(!SeasonRange::through(2022).contains(2023));
        assert!(SeasonRange::starting(2023).contains(2023));
        assert!(!SeasonRange::starting(2023).contains(2022));
        assert!(SeasonRange::all().contains(1999));
    }

    #[test]
    fn test_game_without_linemen_is_excluded() {
        let mut no_line = game("no-line", 2019);
        no_line.home_stats[2].set_block(PositionBlock::empty(PositionGroup::OffensiveLine));

        let mut no_defense = game("no-defense", 2019);
        no_defense.away_stats[0].set_block(PositionBlock::empty(PositionGroup::Defender));

        let games = vec![game("ok", 2019), no_line, no_defense];
        let matrix = preprocessor(SeasonRange::all()).process(&games).unwrap();

        assert_eq!(matrix.game_ids, vec!["ok".to_string(), "no-defense".to_string()]);
        assert!(matrix.features.iter().all(|row| row.len() == matrix.feature_len));
    }

    #[test]
    fn test_season_filter_and_window_count() {
        let mut short = game("short", 2019);
        short.home_stats.pop();
        let games = vec![game("old", 2018), game("new", 2023), short];

        let matrix = preprocessor(SeasonRange::through(2022)).process(&games).unwrap();
        assert_eq!(matrix.game_ids, vec!["old".to_string()]);
        assert_eq!(matrix.labels[0].to_vec(), vec![24.0, 10.0, 1.0]);
    }

    #[test]
    fn test_game_record_from_json() {
        let roster = json!({
            "division": "FBS",
            "QB": [{"player_id": "q"}],
            "RBs": [{"player_id": "r"}],
            "WRs/TEs": [{"player_id": "w"}],
            "OLs": [{"player_id": "o"}],
        });
        let record: GameRecord = serde_json::from_value(json!({
            "GameID": "abc",
            "Season": "2022",
            "Week": "5",
            "HomePoints": "31",
            "AwayPoints": 17,
            "HomeStats": [roster.clone(), roster.clone(), roster.clone()],
            "AwayStats": [roster.clone(), roster.clone(), roster],
        }))
        .unwrap();

        assert_eq!(record.season, 2022);
        assert_eq!(record.week, 5);
        assert_eq!(record.home_points, 31.0);
        assert_eq!(record.home_ap_votes, 0.0);
        assert!(record.is_complete());
    }

    #[test]
    fn test_csv_export() {
        let schema = SchemaRegistry::default();
        let names = schema.feature_names();
        let matrix = preprocessor(SeasonRange::all())
            .process(&[game("g1", 2020)])
            .unwrap();

        let path = std::env::temp_dir().join(format!("gridiron-matrix-{}.csv", std::process::id()));
        matrix.write_csv(&path, &names).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("game_id,season_offset,week"));
        assert!(header.ends_with("home_score,away_score,home_win"));
        assert!(lines.next().unwrap().starts_with("g1,6,2,"));
        std::fs::remove_file(&path).ok();

        assert!(matrix.write_csv(&path, &names[1..]).is_err());
    }

    #[test]
    fn test_batcher_shapes() {
        let device = Default::default();
        let batcher = GameBatcher::<TestBackend>::new(device);
        let dataset = GameDataset::from_rows(
            vec![vec![0.0; 6], vec![1.0; 6]],
            &[LabelVector::from_scores(3.0, 7.0), LabelVector::from_scores(14.0, 0.0)],
        );
        let items: Vec<_> = (0..dataset.len()).filter_map(|i| dataset.get(i)).collect();
        let batch = batcher.batch(items, &Default::default());

        assert_eq!(batch.features.dims(), [2, 6]);
        assert_eq!(batch.scores.dims(), [2, 2]);
        assert_eq!(batch.home_win.dims(), [2]);
    }

    #[test]
    fn test_split() {
        let dataset = GameDataset::from_rows(vec![vec![0.0]; 10], &[LabelVector::from_scores(1.0, 0.0); 10]);
        let (train, val) = dataset.split(0.8);
        assert_eq!(train.len(), 8);
        assert_eq!(val.len(), 2);
    }
}
