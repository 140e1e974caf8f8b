//! Raw statistics retrieval
//!
//! The aggregation pipeline depends only on [`StatSource`]. Backends answer
//! per team, season, week and time window; `Ok(None)` means the source has no
//! data for that key, which is distinct from a real zero.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::{Result, TeamId};

/// Labelled slice of a team's schedule over which counters are aggregated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimeWindow {
    LastGame,
    #[serde(rename = "last3Games")]
    Last3Games,
    #[serde(rename = "last3GamesHome")]
    Last3GamesHome,
    #[serde(rename = "last3GamesAway")]
    Last3GamesAway,
    CurrentSeason,
    LastSeason,
}

impl TimeWindow {
    pub const ALL: [TimeWindow; 6] = [
        TimeWindow::LastGame,
        TimeWindow::Last3Games,
        TimeWindow::Last3GamesHome,
        TimeWindow::Last3GamesAway,
        TimeWindow::CurrentSeason,
        TimeWindow::LastSeason,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TimeWindow::LastGame => "lastGame",
            TimeWindow::Last3Games => "last3Games",
            TimeWindow::Last3GamesHome => "last3GamesHome",
            TimeWindow::Last3GamesAway => "last3GamesAway",
            TimeWindow::CurrentSeason => "currentSeason",
            TimeWindow::LastSeason => "lastSeason",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|w| w.label().eq_ignore_ascii_case(label))
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Lookup key for one team in one window
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatKey {
    pub team: TeamId,
    pub season: u16,
    pub week: u8,
    pub window: TimeWindow,
}

impl StatKey {
    pub fn new(team: TeamId, season: u16, week: u8, window: TimeWindow) -> Self {
        StatKey {
            team,
            season,
            week,
            window,
        }
    }
}

impl fmt::Display for StatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} season {} week {} ({})",
            self.team, self.season, self.week, self.window
        )
    }
}

/// Team-level counters for one window. `None` marks a counter the source
/// could not provide.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTeamStats {
    pub division: Option<String>,
    pub win_percentage: Option<f32>,
    pub strength_of_record: Option<f32>,
    pub points_per_game: Option<f32>,
    pub points_allowed_per_game: Option<f32>,
    pub yards_per_game: Option<f32>,
    pub turnovers_per_game: Option<f32>,
    pub penalties_per_game: Option<f32>,
    pub third_down_efficiency: Option<f32>,
    pub red_zone_efficiency: Option<f32>,
    pub sacks_per_game: Option<f32>,
    pub interceptions_per_game: Option<f32>,
    pub forced_fumbles_per_game: Option<f32>,
    pub yards_per_play: Option<f32>,
    pub opponent_yards_per_game: Option<f32>,
    pub opponent_yards_per_play: Option<f32>,
    pub fbs_opponent_ratio: Option<f32>,
}

/// Counters for one player summed over one window
///
/// Per-game rates divide by `games_played`, floored at 1. A missing
/// `games_played` reads the counters as a single game.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawPlayerStat {
    pub player_id: String,
    /// Roster position tag (QB, RB, WR, CB, OT, ...)
    pub position: String,
    pub recruiting_score: Option<f32>,
    /// Whether the window had enough games to be meaningful
    pub period_completed: bool,
    pub games_played: Option<f32>,

    pub passing_attempts: Option<f32>,
    pub passing_completions: Option<f32>,
    pub passing_yards: Option<f32>,
    pub passing_touchdowns: Option<f32>,
    pub passing_interceptions: Option<f32>,

    pub rushing_yards: Option<f32>,
    pub rushing_yards_per_carry: Option<f32>,
    pub rushing_touchdowns: Option<f32>,

    pub receptions: Option<f32>,
    pub receiving_yards: Option<f32>,
    pub receiving_touchdowns: Option<f32>,

    pub fumbles: Option<f32>,
    pub tackles: Option<f32>,
    pub sacks: Option<f32>,
    pub interceptions: Option<f32>,
    pub forced_fumbles: Option<f32>,
    pub passes_defended: Option<f32>,
}

/// Retrieval backend for team and player counters
pub trait StatSource {
    /// Team counters for the key, `Ok(None)` if the source has none
    fn team_stats(&self, key: &StatKey) -> Result<Option<RawTeamStats>>;

    /// Player counters for the key's roster, in the source's natural order
    fn player_stats(&self, key: &StatKey) -> Result<Vec<RawPlayerStat>>;
}

impl<S: StatSource + ?Sized> StatSource for &S {
    fn team_stats(&self, key: &StatKey) -> Result<Option<RawTeamStats>> {
        (**self).team_stats(key)
    }

    fn player_stats(&self, key: &StatKey) -> Result<Vec<RawPlayerStat>> {
        (**self).player_stats(key)
    }
}

/// HashMap-backed source for fixtures and tests
#[derive(Debug, Clone, Default)]
pub struct InMemoryStatSource {
    teams: HashMap<StatKey, RawTeamStats>,
    players: HashMap<StatKey, Vec<RawPlayerStat>>,
}

impl InMemoryStatSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_team(&mut self, key: StatKey, stats: RawTeamStats) {
        self.teams.insert(key, stats);
    }

    pub fn insert_players(&mut self, key: StatKey, players: Vec<RawPlayerStat>) {
        self.players.entry(key).or_default().extend(players);
    }
}

impl StatSource for InMemoryStatSource {
    fn team_stats(&self, key: &StatKey) -> Result<Option<RawTeamStats>> {
        Ok(self.teams.get(key).cloned())
    }

    fn player_stats(&self, key: &StatKey) -> Result<Vec<RawPlayerStat>> {
        Ok(self.players.get(key).cloned().unwrap_or_default())
    }
}
