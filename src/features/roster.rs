//! Roster objects
//!
//! Aggregated team metrics plus fixed-capacity positional player blocks for
//! one team in one time window. Blocks always hold exactly `capacity` records:
//! real players first, then zero-filled placeholders.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;

use crate::data::lenient::{value_to_bool, value_to_f32, value_to_string};
use crate::features::schema::{PlayerField, PositionGroup, TeamField};

/// Team-level metrics for one window
#[derive(Debug, Clone, PartialEq)]
pub struct TeamMetrics {
    /// Competitive division label (e.g. "FBS"), empty when unknown
    pub division: String,
    values: [f32; TeamField::COUNT],
}

impl Default for TeamMetrics {
    fn default() -> Self {
        TeamMetrics {
            division: String::new(),
            values: TeamField::ALL.map(|f| f.default_value()),
        }
    }
}

impl TeamMetrics {
    pub fn new(division: impl Into<String>) -> Self {
        TeamMetrics {
            division: division.into(),
            ..Self::default()
        }
    }

    pub fn get(&self, field: TeamField) -> f32 {
        self.values[field.index()]
    }

    pub fn set(&mut self, field: TeamField, value: f32) {
        self.values[field.index()] = value;
    }

    pub fn with(mut self, field: TeamField, value: f32) -> Self {
        self.set(field, value);
        self
    }

    fn from_json(map: &Map<String, Value>) -> Self {
        let mut metrics = TeamMetrics {
            division: map.get("division").map(value_to_string).unwrap_or_default(),
            ..Self::default()
        };
        for field in TeamField::ALL {
            if let Some(value) = map.get(field.name()) {
                metrics.set(field, value_to_f32(value));
            }
        }
        metrics
    }

    fn write_json(&self, map: &mut Map<String, Value>) {
        map.insert("division".to_string(), Value::from(self.division.clone()));
        for field in TeamField::ALL {
            map.insert(field.name().to_string(), Value::from(self.get(field)));
        }
    }
}

/// Derived and raw metrics for one player slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct PlayerFeatureRecord {
    pub player_id: Option<String>,
    /// The window had sufficient data for this player
    pub period_completed: bool,
    values: [f32; PlayerField::COUNT],
}

impl Default for PlayerFeatureRecord {
    fn default() -> Self {
        Self::placeholder()
    }
}

impl PlayerFeatureRecord {
    /// Zero-valued record used to fill unused slots
    pub fn placeholder() -> Self {
        PlayerFeatureRecord {
            player_id: None,
            period_completed: false,
            values: PlayerField::ALL.map(|f| f.default_value()),
        }
    }

    pub fn new(player_id: impl Into<String>) -> Self {
        PlayerFeatureRecord {
            player_id: Some(player_id.into()),
            ..Self::placeholder()
        }
    }

    /// Numeric value of a field. `PeriodCompleted` reads as 1.0 / 0.0.
    pub fn get(&self, field: PlayerField) -> f32 {
        match field {
            PlayerField::PeriodCompleted => {
                if self.period_completed {
                    1.0
                } else {
                    0.0
                }
            }
            _ => self.values[field.index()],
        }
    }

    pub fn set(&mut self, field: PlayerField, value: f32) {
        match field {
            PlayerField::PeriodCompleted => self.period_completed = value != 0.0,
            _ => self.values[field.index()] = value,
        }
    }

    pub fn with(mut self, field: PlayerField, value: f32) -> Self {
        self.set(field, value);
        self
    }

    pub fn completed(mut self, completed: bool) -> Self {
        self.period_completed = completed;
        self
    }

    pub fn recruiting_score(&self) -> f32 {
        self.get(PlayerField::RecruitingScore)
    }
}

impl From<Map<String, Value>> for PlayerFeatureRecord {
    fn from(map: Map<String, Value>) -> Self {
        let mut record = PlayerFeatureRecord::placeholder();
        record.player_id = map
            .get("player_id")
            .map(value_to_string)
            .filter(|s| !s.is_empty());
        for field in PlayerField::ALL {
            let Some(value) = map.get(field.name()) else {
                continue;
            };
            match field {
                PlayerField::PeriodCompleted => record.period_completed = value_to_bool(value),
                _ => record.set(field, value_to_f32(value)),
            }
        }
        record
    }
}

impl From<PlayerFeatureRecord> for Map<String, Value> {
    fn from(record: PlayerFeatureRecord) -> Self {
        let mut map = Map::new();
        if let Some(id) = &record.player_id {
            map.insert("player_id".to_string(), Value::from(id.clone()));
        }
        for field in PlayerField::ALL {
            let value = match field {
                PlayerField::PeriodCompleted => Value::from(record.period_completed),
                _ => Value::from(record.get(field)),
            };
            map.insert(field.name().to_string(), value);
        }
        map
    }
}

/// Fixed-capacity, ordered slots for one position group
#[derive(Debug, Clone, PartialEq)]
pub struct PositionBlock {
    group: PositionGroup,
    records: Vec<PlayerFeatureRecord>,
    filled: usize,
}

impl PositionBlock {
    /// Block with every slot a placeholder
    pub fn empty(group: PositionGroup) -> Self {
        PositionBlock {
            group,
            records: vec![PlayerFeatureRecord::placeholder(); group.capacity()],
            filled: 0,
        }
    }

    /// Keep the given order, truncate to capacity, pad with placeholders
    pub fn from_players(
        group: PositionGroup,
        players: impl IntoIterator<Item = PlayerFeatureRecord>,
    ) -> Self {
        let capacity = group.capacity();
        let mut records: Vec<_> = players.into_iter().take(capacity).collect();
        let filled = records.len();
        records.resize(capacity, PlayerFeatureRecord::placeholder());
        PositionBlock {
            group,
            records,
            filled,
        }
    }

    /// Rank by the group's ordering key (descending, stable) and keep the top slots
    pub fn ranked(group: PositionGroup, mut players: Vec<PlayerFeatureRecord>) -> Self {
        if let Some(key) = group.rank_field() {
            players.sort_by(|a, b| {
                b.get(key)
                    .partial_cmp(&a.get(key))
                    .unwrap_or(Ordering::Equal)
            });
        }
        Self::from_players(group, players)
    }

    pub fn group(&self) -> PositionGroup {
        self.group
    }

    /// All slots, always `capacity` long
    pub fn records(&self) -> &[PlayerFeatureRecord] {
        &self.records
    }

    /// Only the real players
    pub fn players(&self) -> &[PlayerFeatureRecord] {
        &self.records[..self.filled]
    }

    /// Number of real players
    pub fn filled(&self) -> usize {
        self.filled
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no real player is present
    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }
}

/// Team metrics plus the five positional blocks for one team in one window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct RosterObject {
    pub team: TeamMetrics,
    blocks: [PositionBlock; 5],
}

impl Default for RosterObject {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl RosterObject {
    pub fn new(team: TeamMetrics) -> Self {
        RosterObject {
            team,
            blocks: PositionGroup::ALL.map(PositionBlock::empty),
        }
    }

    /// Fully zero-valued roster. Stands for "unknown", never for a team that
    /// genuinely recorded zeros.
    pub fn zeroed() -> Self {
        Self::new(TeamMetrics::default())
    }

    pub fn block(&self, group: PositionGroup) -> &PositionBlock {
        &self.blocks[group as usize]
    }

    pub fn blocks(&self) -> &[PositionBlock] {
        &self.blocks
    }

    pub fn set_block(&mut self, block: PositionBlock) {
        let slot = block.group() as usize;
        self.blocks[slot] = block;
    }

    pub fn with_block(mut self, block: PositionBlock) -> Self {
        self.set_block(block);
        self
    }

    /// Required groups that have no real player
    pub fn missing_required_groups(&self) -> Vec<PositionGroup> {
        PositionGroup::ALL
            .into_iter()
            .filter(|g| g.is_required() && self.block(*g).is_empty())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_required_groups().is_empty()
    }

    /// True if the division label matches the given top tier
    pub fn is_top_tier(&self, top_tier: &str) -> bool {
        self.team.division == top_tier
    }
}

impl TryFrom<Map<String, Value>> for RosterObject {
    type Error = String;

    fn try_from(map: Map<String, Value>) -> std::result::Result<Self, Self::Error> {
        let mut roster = RosterObject::new(TeamMetrics::from_json(&map));

        for group in PositionGroup::ALL {
            let players = match map.get(group.label()) {
                None | Some(Value::Null) => continue,
                Some(Value::Array(items)) => items,
                Some(other) => {
                    return Err(format!(
                        "{} must be a list of players, found {}",
                        group.label(),
                        other
                    ))
                }
            };

            let mut records = Vec::with_capacity(players.len());
            for item in players {
                match item {
                    Value::Object(fields) => records.push(PlayerFeatureRecord::from(fields.clone())),
                    other => {
                        return Err(format!(
                            "{} entries must be objects, found {}",
                            group.label(),
                            other
                        ))
                    }
                }
            }
            roster.set_block(PositionBlock::from_players(group, records));
        }

        Ok(roster)
    }
}

impl From<RosterObject> for Map<String, Value> {
    fn from(roster: RosterObject) -> Self {
        let mut map = Map::new();
        roster.team.write_json(&mut map);
        for block in roster.blocks.iter() {
            let players: Vec<Value> = block
                .players()
                .iter()
                .cloned()
                .map(|p| Value::Object(p.into()))
                .collect();
            map.insert(block.group().label().to_string(), Value::Array(players));
        }
        map
    }
}
