//! Feature vector encoding
//!
//! Flattens a [`GameRecord`] into the fixed-order numeric vector described by
//! a [`SchemaRegistry`]. Layout:
//!
//! ```text
//! [season_offset, week, home_top_tier, away_top_tier]
//! [home/away AP + FCS poll votes]            (optional)
//! [recruiting scores, home then away]        (optional)
//! [recruiting summary, home then away]       (optional)
//! [home roster per window] [away roster per window]
//! ```
//!
//! Each roster contributes its team metrics followed by the five positional
//! blocks, slot 0 first, with every slot carrying its group's field list.

use crate::data::dataset::GameRecord;
use crate::features::roster::{PlayerFeatureRecord, RosterObject};
use crate::features::schema::{
    PeriodCompletedEncoding, PlayerField, PositionGroup, SchemaRegistry, TeamField,
    RECRUITING_THRESHOLDS,
};
use crate::{GridironError, Result};

/// `[home_score, away_score, home_win]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelVector {
    pub home_score: f32,
    pub away_score: f32,
    /// 1.0 iff the home side scored strictly more
    pub home_win: f32,
}

impl LabelVector {
    pub const DIM: usize = 3;

    pub fn from_scores(home_score: f32, away_score: f32) -> Self {
        LabelVector {
            home_score,
            away_score,
            home_win: if home_score > away_score { 1.0 } else { 0.0 },
        }
    }

    pub fn to_vec(&self) -> Vec<f32> {
        vec![self.home_score, self.away_score, self.home_win]
    }
}

/// Schema-driven encoder shared by training and inference
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    schema: SchemaRegistry,
}

impl FeatureEncoder {
    pub fn new(schema: SchemaRegistry) -> Self {
        FeatureEncoder { schema }
    }

    pub fn schema(&self) -> &SchemaRegistry {
        &self.schema
    }

    pub fn feature_len(&self) -> usize {
        self.schema.feature_len()
    }

    /// Encode one contest. A record whose roster sequence does not match the
    /// configured windows cannot be laid out and is rejected.
    pub fn encode(&self, game: &GameRecord) -> Result<Vec<f32>> {
        let windows = self.schema.windows().len();
        for (side, rosters) in [("home", &game.home_stats), ("away", &game.away_stats)] {
            if rosters.len() != windows {
                return Err(GridironError::SchemaMismatch {
                    expected: format!("{} {} rosters", windows, side),
                    found: format!("{} in game {}", rosters.len(), game.game_id),
                });
            }
        }

        let options = self.schema.options();
        let mut features = Vec::with_capacity(self.feature_len());

        let top_tier = |rosters: &[RosterObject]| {
            rosters
                .first()
                .map(|r| r.is_top_tier(&options.top_tier_division))
                .unwrap_or(false)
        };
        features.push(game.season as f32 - options.season_base as f32);
        features.push(game.week as f32);
        features.push(flag(top_tier(&game.home_stats)));
        features.push(flag(top_tier(&game.away_stats)));

        if options.include_poll_votes {
            features.extend([
                game.home_ap_votes,
                game.away_ap_votes,
                game.home_fcs_votes,
                game.away_fcs_votes,
            ]);
        }

        let home_recruiting = recruiting_scores(game.home_stats.first());
        let away_recruiting = recruiting_scores(game.away_stats.first());
        if options.include_recruiting_block {
            features.extend_from_slice(&home_recruiting);
            features.extend_from_slice(&away_recruiting);
        }
        if options.include_recruiting_summary {
            features.extend(recruiting_summary(&home_recruiting));
            features.extend(recruiting_summary(&away_recruiting));
        }

        for roster in game.home_stats.iter().chain(game.away_stats.iter()) {
            self.encode_roster(roster, &mut features);
        }

        if features.len() != self.feature_len() {
            return Err(GridironError::SchemaMismatch {
                expected: self.feature_len().to_string(),
                found: features.len().to_string(),
            });
        }
        Ok(features)
    }

    /// Label vector for a played contest
    pub fn labels(&self, game: &GameRecord) -> LabelVector {
        LabelVector::from_scores(game.home_points, game.away_points)
    }

    fn encode_roster(&self, roster: &RosterObject, out: &mut Vec<f32>) {
        out.extend(TeamField::ALL.iter().map(|f| roster.team.get(*f)));
        for group in PositionGroup::ALL {
            for record in roster.block(group).records() {
                for field in group.fields() {
                    out.push(self.player_value(record, *field));
                }
            }
        }
    }

    fn player_value(&self, record: &PlayerFeatureRecord, field: PlayerField) -> f32 {
        match (field, self.schema.options().period_completed) {
            (PlayerField::PeriodCompleted, PeriodCompletedEncoding::LegacyStringMatch) => 0.0,
            _ => record.get(field),
        }
    }
}

fn flag(value: bool) -> f32 {
    if value {
        1.0
    } else {
        0.0
    }
}

/// Recruiting score of every slot of every group, in layout order
fn recruiting_scores(roster: Option<&RosterObject>) -> Vec<f32> {
    let mut scores = Vec::with_capacity(PositionGroup::total_slots());
    for group in PositionGroup::ALL {
        match roster {
            Some(roster) => scores.extend(
                roster
                    .block(group)
                    .records()
                    .iter()
                    .map(|r| r.recruiting_score()),
            ),
            None => scores.extend(std::iter::repeat(0.0).take(group.capacity())),
        }
    }
    scores
}

/// `[mean, share above each threshold]`
fn recruiting_summary(scores: &[f32]) -> Vec<f32> {
    let n = scores.len().max(1) as f32;
    let mut summary = Vec::with_capacity(1 + RECRUITING_THRESHOLDS.len());
    summary.push(scores.iter().sum::<f32>() / n);
    for threshold in RECRUITING_THRESHOLDS {
        summary.push(scores.iter().filter(|s| **s > threshold).count() as f32 / n);
    }
    summary
}
