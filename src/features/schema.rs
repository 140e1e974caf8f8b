//! Feature schema registry
//!
//! The single place where team metric order, per-position player metric
//! order, slot capacities and field defaults are declared. The encoder and the
//! feature-name listing both walk these tables, so a model's weight layout is
//! tied to exactly one schema. Changing any list, capacity or option changes
//! the fingerprint and invalidates previously trained artifacts.

use serde::{Deserialize, Serialize};

use crate::data::source::TimeWindow;

/// Current layout version. Bump whenever a table below changes.
pub const SCHEMA_VERSION: u32 = 1;

/// Names of the three label columns, in order
pub const LABEL_NAMES: [&str; 3] = ["home_score", "away_score", "home_win"];

/// Team-level metrics, in encoding order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TeamField {
    WinPercentage,
    StrengthOfRecord,
    PointsPerGame,
    PointsAllowedPerGame,
    TotalYardsPerGame,
    TurnoversPerGame,
    PenaltiesPerGame,
    ThirdDownEfficiency,
    RedZoneEfficiency,
    SacksPerGame,
    InterceptionsPerGame,
    ForcedFumblesPerGame,
    YardsPerPlay,
    YardsAllowedPerGame,
    YardsAllowedPerPlay,
    FbsOpponentRatio,
}

impl TeamField {
    pub const COUNT: usize = 16;

    pub const ALL: [TeamField; Self::COUNT] = [
        TeamField::WinPercentage,
        TeamField::StrengthOfRecord,
        TeamField::PointsPerGame,
        TeamField::PointsAllowedPerGame,
        TeamField::TotalYardsPerGame,
        TeamField::TurnoversPerGame,
        TeamField::PenaltiesPerGame,
        TeamField::ThirdDownEfficiency,
        TeamField::RedZoneEfficiency,
        TeamField::SacksPerGame,
        TeamField::InterceptionsPerGame,
        TeamField::ForcedFumblesPerGame,
        TeamField::YardsPerPlay,
        TeamField::YardsAllowedPerGame,
        TeamField::YardsAllowedPerPlay,
        TeamField::FbsOpponentRatio,
    ];

    /// Key used in roster JSON and in feature names
    pub fn name(&self) -> &'static str {
        match self {
            TeamField::WinPercentage => "win_percentage",
            TeamField::StrengthOfRecord => "strength_of_record",
            TeamField::PointsPerGame => "points_per_game",
            TeamField::PointsAllowedPerGame => "points_allowed_per_game",
            TeamField::TotalYardsPerGame => "total_YPG",
            TeamField::TurnoversPerGame => "turnovers_per_game",
            TeamField::PenaltiesPerGame => "penalties_per_game",
            TeamField::ThirdDownEfficiency => "3rd_down_eff",
            TeamField::RedZoneEfficiency => "redzone_eff",
            TeamField::SacksPerGame => "sacks_per_game",
            TeamField::InterceptionsPerGame => "interceptions_per_game",
            TeamField::ForcedFumblesPerGame => "forced_fumbles_per_game",
            TeamField::YardsPerPlay => "yards_per_play",
            TeamField::YardsAllowedPerGame => "yards_allowed_per_game",
            TeamField::YardsAllowedPerPlay => "yards_allowed_per_play",
            TeamField::FbsOpponentRatio => "FBS_opponent_ratio",
        }
    }

    /// Value imputed when the metric is absent
    pub fn default_value(&self) -> f32 {
        0.0
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// Player-level metrics. Each position group encodes a subset of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerField {
    FumblesPerGame,
    PeriodCompleted,
    RecruitingScore,
    CompletionPercentage,
    PassingYardsPerGame,
    TdIntRatio,
    RatingScore,
    RushingYards,
    RushingTouchdowns,
    PassingTouchdowns,
    RushingYardsPerGame,
    RushingYardsPerCarry,
    RushingTouchdownsPerGame,
    ReceivingTouchdownsPerGame,
    ReceptionsPerGame,
    ReceivingYardsPerGame,
    ReceivingYardsPerCatch,
    TacklesPerGame,
    SacksPerGame,
    InterceptionsPerGame,
    ForcedFumblesPerGame,
    PassesDefendedPerGame,
}

impl PlayerField {
    pub const COUNT: usize = 22;

    pub const ALL: [PlayerField; Self::COUNT] = [
        PlayerField::FumblesPerGame,
        PlayerField::PeriodCompleted,
        PlayerField::RecruitingScore,
        PlayerField::CompletionPercentage,
        PlayerField::PassingYardsPerGame,
        PlayerField::TdIntRatio,
        PlayerField::RatingScore,
        PlayerField::RushingYards,
        PlayerField::RushingTouchdowns,
        PlayerField::PassingTouchdowns,
        PlayerField::RushingYardsPerGame,
        PlayerField::RushingYardsPerCarry,
        PlayerField::RushingTouchdownsPerGame,
        PlayerField::ReceivingTouchdownsPerGame,
        PlayerField::ReceptionsPerGame,
        PlayerField::ReceivingYardsPerGame,
        PlayerField::ReceivingYardsPerCatch,
        PlayerField::TacklesPerGame,
        PlayerField::SacksPerGame,
        PlayerField::InterceptionsPerGame,
        PlayerField::ForcedFumblesPerGame,
        PlayerField::PassesDefendedPerGame,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PlayerField::FumblesPerGame => "fumbles_per_game",
            PlayerField::PeriodCompleted => "period_completed",
            PlayerField::RecruitingScore => "recruiting_score",
            PlayerField::CompletionPercentage => "completion_percentage",
            PlayerField::PassingYardsPerGame => "passing_yards_per_game",
            PlayerField::TdIntRatio => "TD_INT_ratio",
            PlayerField::RatingScore => "QBR",
            PlayerField::RushingYards => "rushing_yards",
            PlayerField::RushingTouchdowns => "rushing_touchdowns",
            PlayerField::PassingTouchdowns => "passing_touchdowns",
            PlayerField::RushingYardsPerGame => "rushing_yards_per_game",
            PlayerField::RushingYardsPerCarry => "rushing_yards_per_carry",
            PlayerField::RushingTouchdownsPerGame => "rushing_touchdowns_per_game",
            PlayerField::ReceivingTouchdownsPerGame => "receiving_touchdowns_per_game",
            PlayerField::ReceptionsPerGame => "receptions_per_game",
            PlayerField::ReceivingYardsPerGame => "receiving_yards_per_game",
            PlayerField::ReceivingYardsPerCatch => "receiving_yards_per_catch",
            PlayerField::TacklesPerGame => "tackles_per_game",
            PlayerField::SacksPerGame => "sacks_per_game",
            PlayerField::InterceptionsPerGame => "interceptions_per_game",
            PlayerField::ForcedFumblesPerGame => "forced_fumbles_per_game",
            PlayerField::PassesDefendedPerGame => "passes_defended_per_game",
        }
    }

    pub fn default_value(&self) -> f32 {
        0.0
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

const QB_FIELDS: [PlayerField; 9] = [
    PlayerField::FumblesPerGame,
    PlayerField::PeriodCompleted,
    PlayerField::CompletionPercentage,
    PlayerField::PassingYardsPerGame,
    PlayerField::TdIntRatio,
    PlayerField::RatingScore,
    PlayerField::RushingYards,
    PlayerField::RushingTouchdowns,
    PlayerField::PassingTouchdowns,
];

const SKILL_FIELDS: [PlayerField; 9] = [
    PlayerField::FumblesPerGame,
    PlayerField::PeriodCompleted,
    PlayerField::RushingYardsPerGame,
    PlayerField::RushingYardsPerCarry,
    PlayerField::RushingTouchdownsPerGame,
    PlayerField::ReceivingTouchdownsPerGame,
    PlayerField::ReceptionsPerGame,
    PlayerField::ReceivingYardsPerGame,
    PlayerField::ReceivingYardsPerCatch,
];

const DEFENDER_FIELDS: [PlayerField; 7] = [
    PlayerField::FumblesPerGame,
    PlayerField::PeriodCompleted,
    PlayerField::TacklesPerGame,
    PlayerField::SacksPerGame,
    PlayerField::InterceptionsPerGame,
    PlayerField::ForcedFumblesPerGame,
    PlayerField::PassesDefendedPerGame,
];

const LINE_FIELDS: [PlayerField; 2] = [PlayerField::FumblesPerGame, PlayerField::PeriodCompleted];

/// Positional slot groups, in encoding order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PositionGroup {
    Quarterback,
    RunningBack,
    Receiver,
    Defender,
    OffensiveLine,
}

impl PositionGroup {
    pub const ALL: [PositionGroup; 5] = [
        PositionGroup::Quarterback,
        PositionGroup::RunningBack,
        PositionGroup::Receiver,
        PositionGroup::Defender,
        PositionGroup::OffensiveLine,
    ];

    /// Number of player slots reserved in the feature layout
    pub fn capacity(&self) -> usize {
        match self {
            PositionGroup::Quarterback => 1,
            PositionGroup::RunningBack => 4,
            PositionGroup::Receiver => 7,
            PositionGroup::Defender => 12,
            PositionGroup::OffensiveLine => 5,
        }
    }

    /// Roster JSON key for this group
    pub fn label(&self) -> &'static str {
        match self {
            PositionGroup::Quarterback => "QB",
            PositionGroup::RunningBack => "RBs",
            PositionGroup::Receiver => "WRs/TEs",
            PositionGroup::Defender => "Defenders",
            PositionGroup::OffensiveLine => "OLs",
        }
    }

    /// Player metrics encoded for each slot of this group
    pub fn fields(&self) -> &'static [PlayerField] {
        match self {
            PositionGroup::Quarterback => &QB_FIELDS,
            PositionGroup::RunningBack | PositionGroup::Receiver => &SKILL_FIELDS,
            PositionGroup::Defender => &DEFENDER_FIELDS,
            PositionGroup::OffensiveLine => &LINE_FIELDS,
        }
    }

    /// Metric used to rank candidates (descending). `None` keeps insertion order.
    pub fn rank_field(&self) -> Option<PlayerField> {
        match self {
            PositionGroup::Quarterback => Some(PlayerField::PassingYardsPerGame),
            PositionGroup::RunningBack => Some(PlayerField::RushingYardsPerGame),
            PositionGroup::Receiver => Some(PlayerField::ReceivingYardsPerGame),
            PositionGroup::Defender => Some(PlayerField::TacklesPerGame),
            PositionGroup::OffensiveLine => None,
        }
    }

    /// A contest is only usable if this group has at least one real player
    /// in every window for both sides
    pub fn is_required(&self) -> bool {
        !matches!(self, PositionGroup::Defender)
    }

    /// Map a roster position tag to its slot group
    pub fn from_position_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_uppercase().as_str() {
            "QB" => Some(PositionGroup::Quarterback),
            "RB" | "FB" => Some(PositionGroup::RunningBack),
            "WR" | "TE" => Some(PositionGroup::Receiver),
            "CB" | "DB" | "DE" | "DL" | "DT" | "LB" | "SAF" | "S" | "OLB" | "ILB" | "MLB" => {
                Some(PositionGroup::Defender)
            }
            "OL" | "OT" | "OG" | "T" | "G" | "C" => Some(PositionGroup::OffensiveLine),
            _ => None,
        }
    }

    /// Encoded width of one block of this group
    pub fn block_len(&self) -> usize {
        self.capacity() * self.fields().len()
    }

    /// Total player slots across all groups
    pub fn total_slots() -> usize {
        Self::ALL.iter().map(|g| g.capacity()).sum()
    }
}

/// How the `period_completed` flag is written into the vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodCompletedEncoding {
    /// 1.0 when the window had sufficient data, else 0.0
    #[default]
    Boolean,
    /// Always 0.0. Reproduces vectors from the earlier pipeline, which compared
    /// the boolean against the text "True" and therefore never matched.
    LegacyStringMatch,
}

/// Tunable parts of the layout. All of them feed the fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaOptions {
    pub version: u32,
    /// Time windows, in encoding order
    pub windows: Vec<TimeWindow>,
    /// Subtracted from the season to form the leading `season_offset` field
    pub season_base: u16,
    /// Division label treated as the higher competitive tier
    pub top_tier_division: String,
    pub include_poll_votes: bool,
    pub include_recruiting_block: bool,
    pub include_recruiting_summary: bool,
    pub period_completed: PeriodCompletedEncoding,
}

impl Default for SchemaOptions {
    fn default() -> Self {
        SchemaOptions {
            version: SCHEMA_VERSION,
            windows: vec![
                TimeWindow::CurrentSeason,
                TimeWindow::Last3Games,
                TimeWindow::LastSeason,
            ],
            season_base: 2014,
            top_tier_division: "FBS".to_string(),
            include_poll_votes: false,
            include_recruiting_block: true,
            include_recruiting_summary: false,
            period_completed: PeriodCompletedEncoding::Boolean,
        }
    }
}

/// Recruiting-score thresholds used by the optional summary block
pub const RECRUITING_THRESHOLDS: [f32; 3] = [0.9, 0.8, 0.1];

/// Resolved schema: options plus the static tables above
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaRegistry {
    options: SchemaOptions,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new(SchemaOptions::default())
    }
}

impl SchemaRegistry {
    pub fn new(options: SchemaOptions) -> Self {
        SchemaRegistry { options }
    }

    pub fn options(&self) -> &SchemaOptions {
        &self.options
    }

    pub fn windows(&self) -> &[TimeWindow] {
        &self.options.windows
    }

    /// Season, week and the two division flags, plus poll votes if enabled
    pub fn header_len(&self) -> usize {
        4 + if self.options.include_poll_votes { 4 } else { 0 }
    }

    pub fn recruiting_len(&self) -> usize {
        let block = if self.options.include_recruiting_block {
            2 * PositionGroup::total_slots()
        } else {
            0
        };
        let summary = if self.options.include_recruiting_summary {
            2 * (1 + RECRUITING_THRESHOLDS.len())
        } else {
            0
        };
        block + summary
    }

    /// Width contributed by one roster object
    pub fn roster_len(&self) -> usize {
        TeamField::COUNT
            + PositionGroup::ALL
                .iter()
                .map(|g| g.block_len())
                .sum::<usize>()
    }

    /// Total vector length for one contest
    pub fn feature_len(&self) -> usize {
        self.header_len() + self.recruiting_len() + 2 * self.windows().len() * self.roster_len()
    }

    /// One name per vector offset, in encoding order
    pub fn feature_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.feature_len());
        names.extend(
            [
                "season_offset",
                "week",
                "home_division_is_top_tier",
                "away_division_is_top_tier",
            ]
            .iter()
            .map(|s| s.to_string()),
        );
        if self.options.include_poll_votes {
            names.extend(
                ["home_ap_votes", "away_ap_votes", "home_fcs_votes", "away_fcs_votes"]
                    .iter()
                    .map(|s| s.to_string()),
            );
        }

        if self.options.include_recruiting_block {
            for side in ["home", "away"] {
                for group in PositionGroup::ALL {
                    for slot in 0..group.capacity() {
                        names.push(format!("recruiting.{}.{}[{}]", side, group.label(), slot));
                    }
                }
            }
        }
        if self.options.include_recruiting_summary {
            for side in ["home", "away"] {
                names.push(format!("recruiting.{}.mean", side));
                for threshold in RECRUITING_THRESHOLDS {
                    names.push(format!("recruiting.{}.share_above_{}", side, threshold));
                }
            }
        }

        for side in ["home", "away"] {
            for window in self.windows() {
                let prefix = format!("{}.{}", side, window.label());
                for field in TeamField::ALL {
                    names.push(format!("{}.team.{}", prefix, field.name()));
                }
                for group in PositionGroup::ALL {
                    for slot in 0..group.capacity() {
                        for field in group.fields() {
                            names.push(format!(
                                "{}.{}[{}].{}",
                                prefix,
                                group.label(),
                                slot,
                                field.name()
                            ));
                        }
                    }
                }
            }
        }

        names
    }

    /// Stable digest of the full layout, stored alongside trained artifacts
    pub fn fingerprint(&self) -> String {
        let mut hash = Fnv1a::new();
        hash.write(format!("v{}", self.options.version).as_bytes());
        hash.write(format!("base{}", self.options.season_base).as_bytes());
        hash.write(self.options.top_tier_division.as_bytes());
        hash.write(format!("{:?}", self.options.period_completed).as_bytes());
        for group in PositionGroup::ALL {
            hash.write(format!("{}={}", group.label(), group.capacity()).as_bytes());
        }
        for name in self.feature_names() {
            hash.write(name.as_bytes());
            hash.write(&[0]);
        }
        format!("{:016x}", hash.finish())
    }
}

/// 64-bit FNV-1a, fixed so fingerprints survive toolchain upgrades
struct Fnv1a(u64);

impl Fnv1a {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    fn new() -> Self {
        Fnv1a(Self::OFFSET)
    }

    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::PRIME);
        }
    }

    fn finish(&self) -> u64 {
        self.0
    }
}
