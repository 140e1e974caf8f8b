//! Period aggregation
//!
//! Turns raw team and player counters for one team in one time window into a
//! [`RosterObject`], and assembles scheduled contests into [`GameRecord`]s.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::data::dataset::GameRecord;
use crate::data::lenient;
use crate::data::source::{RawPlayerStat, RawTeamStats, StatKey, StatSource, TimeWindow};
use crate::features::derived;
use crate::features::roster::{PlayerFeatureRecord, PositionBlock, RosterObject, TeamMetrics};
use crate::features::schema::{PlayerField, PositionGroup, TeamField};
use crate::{Result, TeamId};

/// Builds roster objects from a statistics source
pub struct PeriodAggregator<S> {
    source: S,
}

impl<S: StatSource> PeriodAggregator<S> {
    pub fn new(source: S) -> Self {
        PeriodAggregator { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Roster for the key, `Ok(None)` when the source has no team counters
    pub fn try_build(&self, key: &StatKey) -> Result<Option<RosterObject>> {
        let Some(team) = self.source.team_stats(key)? else {
            return Ok(None);
        };
        let players = self.source.player_stats(key)?;
        Ok(Some(assemble_roster(&team, &players)))
    }

    /// Roster for the key. Missing data and retrieval failures both yield a
    /// zero-valued roster, which callers must read as "unknown".
    pub fn build(&self, key: &StatKey) -> RosterObject {
        match self.try_build(key) {
            Ok(Some(roster)) => roster,
            Ok(None) => {
                debug!("No team counters for {}, using zero roster", key);
                RosterObject::zeroed()
            }
            Err(e) => {
                warn!("Retrieval failed for {}: {}, using zero roster", key, e);
                RosterObject::zeroed()
            }
        }
    }

    /// One roster per window, in the given order
    pub fn build_windows(
        &self,
        team: &TeamId,
        season: u16,
        week: u8,
        windows: &[TimeWindow],
    ) -> Vec<RosterObject> {
        windows
            .iter()
            .map(|w| self.build(&StatKey::new(team.clone(), season, week, *w)))
            .collect()
    }

    /// Run the aggregator for both sides of a scheduled contest
    pub fn assemble_game(&self, game: &ScheduledGame, windows: &[TimeWindow]) -> GameRecord {
        debug!(
            "Assembling game {} ({} vs {}, {} week {})",
            game.game_id, game.home_team, game.away_team, game.season, game.week
        );
        GameRecord {
            game_id: game.game_id.clone(),
            season: game.season,
            week: game.week,
            home_points: game.home_points,
            away_points: game.away_points,
            home_stats: self.build_windows(&game.home_team, game.season, game.week, windows),
            away_stats: self.build_windows(&game.away_team, game.season, game.week, windows),
            home_ap_votes: game.home_ap_votes,
            away_ap_votes: game.away_ap_votes,
            home_fcs_votes: game.home_fcs_votes,
            away_fcs_votes: game.away_fcs_votes,
        }
    }
}

/// Team metrics from raw counters; absent counters impute to the field default
pub fn team_metrics(raw: &RawTeamStats) -> TeamMetrics {
    let mut metrics = TeamMetrics::new(raw.division.clone().unwrap_or_default());
    let values = [
        (TeamField::WinPercentage, raw.win_percentage),
        (TeamField::StrengthOfRecord, raw.strength_of_record),
        (TeamField::PointsPerGame, raw.points_per_game),
        (TeamField::PointsAllowedPerGame, raw.points_allowed_per_game),
        (TeamField::TotalYardsPerGame, raw.yards_per_game),
        (TeamField::TurnoversPerGame, raw.turnovers_per_game),
        (TeamField::PenaltiesPerGame, raw.penalties_per_game),
        (TeamField::ThirdDownEfficiency, raw.third_down_efficiency),
        (TeamField::RedZoneEfficiency, raw.red_zone_efficiency),
        (TeamField::SacksPerGame, raw.sacks_per_game),
        (TeamField::InterceptionsPerGame, raw.interceptions_per_game),
        (TeamField::ForcedFumblesPerGame, raw.forced_fumbles_per_game),
        (TeamField::YardsPerPlay, raw.yards_per_play),
        (TeamField::YardsAllowedPerGame, raw.opponent_yards_per_game),
        (TeamField::YardsAllowedPerPlay, raw.opponent_yards_per_play),
        (TeamField::FbsOpponentRatio, raw.fbs_opponent_ratio),
    ];
    for (field, value) in values {
        metrics.set(field, value.unwrap_or_else(|| field.default_value()));
    }
    metrics
}

/// Position-specific record for one player
///
/// Ratios come from window totals; everything else is a per-game rate.
pub fn player_record(group: PositionGroup, raw: &RawPlayerStat) -> PlayerFeatureRecord {
    let v = |x: Option<f32>| x.unwrap_or(0.0);
    let games = raw.games_played.unwrap_or(1.0).max(1.0);
    let per_game = |x: Option<f32>| v(x) / games;

    let mut record = PlayerFeatureRecord::new(raw.player_id.clone())
        .completed(raw.period_completed)
        .with(PlayerField::FumblesPerGame, per_game(raw.fumbles))
        .with(PlayerField::RecruitingScore, v(raw.recruiting_score));

    match group {
        PositionGroup::Quarterback => {
            let attempts = v(raw.passing_attempts);
            let completions = v(raw.passing_completions);
            let yards = v(raw.passing_yards);
            let touchdowns = v(raw.passing_touchdowns);
            let interceptions = v(raw.passing_interceptions);

            record.set(
                PlayerField::CompletionPercentage,
                derived::completion_percentage(completions, attempts),
            );
            record.set(PlayerField::PassingYardsPerGame, yards / games);
            record.set(
                PlayerField::TdIntRatio,
                derived::td_int_ratio(touchdowns, interceptions),
            );
            record.set(
                PlayerField::RatingScore,
                derived::rating_score(attempts, completions, yards, touchdowns, interceptions),
            );
            record.set(PlayerField::RushingYards, per_game(raw.rushing_yards));
            record.set(PlayerField::RushingTouchdowns, per_game(raw.rushing_touchdowns));
            record.set(PlayerField::PassingTouchdowns, touchdowns / games);
        }
        PositionGroup::RunningBack | PositionGroup::Receiver => {
            let receptions = v(raw.receptions);
            let receiving_yards = v(raw.receiving_yards);

            record.set(PlayerField::RushingYardsPerGame, per_game(raw.rushing_yards));
            record.set(PlayerField::RushingYardsPerCarry, v(raw.rushing_yards_per_carry));
            record.set(
                PlayerField::RushingTouchdownsPerGame,
                per_game(raw.rushing_touchdowns),
            );
            record.set(
                PlayerField::ReceivingTouchdownsPerGame,
                per_game(raw.receiving_touchdowns),
            );
            record.set(PlayerField::ReceptionsPerGame, receptions / games);
            record.set(PlayerField::ReceivingYardsPerGame, receiving_yards / games);
            record.set(
                PlayerField::ReceivingYardsPerCatch,
                derived::yards_per_catch(receiving_yards, receptions),
            );
        }
        PositionGroup::Defender => {
            record.set(PlayerField::TacklesPerGame, per_game(raw.tackles));
            record.set(PlayerField::SacksPerGame, per_game(raw.sacks));
            record.set(PlayerField::InterceptionsPerGame, per_game(raw.interceptions));
            record.set(PlayerField::ForcedFumblesPerGame, per_game(raw.forced_fumbles));
            record.set(PlayerField::PassesDefendedPerGame, per_game(raw.passes_defended));
        }
        PositionGroup::OffensiveLine => {}
    }

    record
}

/// Group players by position tag, rank each group and fill its slots
pub fn assemble_roster(team: &RawTeamStats, players: &[RawPlayerStat]) -> RosterObject {
    let mut grouped: [Vec<PlayerFeatureRecord>; 5] = Default::default();

    for raw in players {
        match PositionGroup::from_position_tag(&raw.position) {
            Some(group) => grouped[group as usize].push(player_record(group, raw)),
            None => debug!(
                "Ignoring player {} with position {}",
                raw.player_id, raw.position
            ),
        }
    }

    let mut roster = RosterObject::new(team_metrics(team));
    for (group, records) in PositionGroup::ALL.into_iter().zip(grouped) {
        roster.set_block(PositionBlock::ranked(group, records));
    }
    roster
}

/// A contest from the schedule, with its result if already played
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledGame {
    #[serde(rename = "GameID", deserialize_with = "lenient::id_string")]
    pub game_id: String,
    #[serde(rename = "Season", deserialize_with = "lenient::season")]
    pub season: u16,
    #[serde(rename = "Week", deserialize_with = "lenient::week")]
    pub week: u8,
    #[serde(rename = "HomeTeamID")]
    pub home_team: TeamId,
    #[serde(rename = "AwayTeamID")]
    pub away_team: TeamId,
    #[serde(rename = "HomePoints", default, deserialize_with = "lenient::f32_or_zero")]
    pub home_points: f32,
    #[serde(rename = "AwayPoints", default, deserialize_with = "lenient::f32_or_zero")]
    pub away_points: f32,
    #[serde(rename = "HomeAPVotes", default, deserialize_with = "lenient::f32_or_zero")]
    pub home_ap_votes: f32,
    #[serde(rename = "AwayAPVotes", default, deserialize_with = "lenient::f32_or_zero")]
    pub away_ap_votes: f32,
    #[serde(rename = "HomeFCSVotes", default, deserialize_with = "lenient::f32_or_zero")]
    pub home_fcs_votes: f32,
    #[serde(rename = "AwayFCSVotes", default, deserialize_with = "lenient::f32_or_zero")]
    pub away_fcs_votes: f32,
}

/// Assemble the bulk game file for a schedule
pub fn assemble_games<S: StatSource>(
    aggregator: &PeriodAggregator<S>,
    schedule: &[ScheduledGame],
    windows: &[TimeWindow],
) -> Vec<GameRecord> {
    schedule
        .iter()
        .map(|game| aggregator.assemble_game(game, windows))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::source::InMemoryStatSource;
    use crate::GridironError;
    use serde_json::json;

    fn player(id: &str, position: &str) -> RawPlayerStat {
        RawPlayerStat {
            player_id: id.to_string(),
            position: position.to_string(),
            period_completed: true,
            ..Default::default()
        }
    }

    fn key(team: &str, window: TimeWindow) -> StatKey {
        StatKey::new(TeamId::new(team), 2021, 6, window)
    }

    #[test]
    fn test_quarterback_derivations() {
        let raw = RawPlayerStat {
            passing_attempts: Some(30.0),
            passing_completions: Some(20.0),
            passing_yards: Some(250.0),
            passing_touchdowns: Some(2.0),
            passing_interceptions: Some(0.0),
            rushing_yards: Some(14.0),
            recruiting_score: Some(0.93),
            ..player("qb", "QB")
        };
        let record = player_record(PositionGroup::Quarterback, &raw);

        assert!((record.get(PlayerField::CompletionPercentage) - 20.0 / 30.0).abs() < 1e-6);
        assert_eq!(record.get(PlayerField::TdIntRatio), 2.0 / 0.05);
        assert_eq!(record.get(PlayerField::PassingYardsPerGame), 250.0);
        assert_eq!(record.get(PlayerField::RushingYards), 14.0);
        assert_eq!(record.get(PlayerField::PeriodCompleted), 1.0);
        assert_eq!(record.recruiting_score(), 0.93);
        assert!(record.get(PlayerField::RatingScore) > 0.0);
    }

    #[test]
    fn test_quarterback_without_attempts() {
        let raw = RawPlayerStat {
            passing_attempts: Some(0.0),
            passing_completions: Some(4.0),
            passing_yards: Some(60.0),
            passing_touchdowns: Some(1.0),
            ..player("qb", "QB")
        };
        let record = player_record(PositionGroup::Quarterback, &raw);
        assert_eq!(record.get(PlayerField::CompletionPercentage), 0.0);
        assert_eq!(record.get(PlayerField::RatingScore), 0.0);
    }

    #[test]
    fn test_ratios_use_window_totals() {
        // 10 games, 5 catches for 60 yards
        let receiver = RawPlayerStat {
            games_played: Some(10.0),
            receptions: Some(5.0),
            receiving_yards: Some(60.0),
            fumbles: Some(2.0),
            ..player("wr", "WR")
        };
        let record = player_record(PositionGroup::Receiver, &receiver);
        assert_eq!(record.get(PlayerField::ReceivingYardsPerCatch), 12.0);
        assert_eq!(record.get(PlayerField::ReceptionsPerGame), 0.5);
        assert_eq!(record.get(PlayerField::ReceivingYardsPerGame), 6.0);
        assert_eq!(record.get(PlayerField::FumblesPerGame), 0.2);

        // 12 TD and 3 INT over 12 games
        let passer = RawPlayerStat {
            games_played: Some(12.0),
            passing_attempts: Some(360.0),
            passing_completions: Some(240.0),
            passing_yards: Some(3000.0),
            passing_touchdowns: Some(12.0),
            passing_interceptions: Some(3.0),
            ..player("qb", "QB")
        };
        let record = player_record(PositionGroup::Quarterback, &passer);
        assert_eq!(record.get(PlayerField::TdIntRatio), 4.0);
        assert_eq!(record.get(PlayerField::PassingYardsPerGame), 250.0);
        assert_eq!(record.get(PlayerField::PassingTouchdowns), 1.0);
    }

    #[test]
    fn test_roster_groups_and_ranks_players() {
        let players = vec![
            RawPlayerStat { rushing_yards: Some(30.0), ..player("rb-b", "RB") },
            RawPlayerStat { rushing_yards: Some(80.0), ..player("rb-a", "FB") },
            RawPlayerStat { receiving_yards: Some(55.0), receptions: Some(0.0), ..player("te", "TE") },
            RawPlayerStat { tackles: Some(6.0), ..player("lb", "LB") },
            player("lt", "OT"),
            player("k", "K"),
        ];
        let roster = assemble_roster(&RawTeamStats::default(), &players);

        let rbs = roster.block(PositionGroup::RunningBack);
        assert_eq!(rbs.filled(), 2);
        assert_eq!(rbs.records()[0].player_id.as_deref(), Some("rb-a"));

        let receivers = roster.block(PositionGroup::Receiver);
        assert_eq!(receivers.records()[0].get(PlayerField::ReceivingYardsPerCatch), 55.0);

        assert_eq!(roster.block(PositionGroup::Defender).filled(), 1);
        assert_eq!(roster.block(PositionGroup::OffensiveLine).filled(), 1);
        assert!(roster.block(PositionGroup::Quarterback).is_empty());
    }

    #[test]
    fn test_team_metrics_impute_missing() {
        let raw = RawTeamStats {
            division: Some("FBS".to_string()),
            win_percentage: Some(0.5),
            opponent_yards_per_play: Some(5.1),
            ..Default::default()
        };
        let metrics = team_metrics(&raw);
        assert_eq!(metrics.division, "FBS");
        assert_eq!(metrics.get(TeamField::WinPercentage), 0.5);
        assert_eq!(metrics.get(TeamField::YardsAllowedPerPlay), 5.1);
        assert_eq!(metrics.get(TeamField::StrengthOfRecord), 0.0);
    }

    #[test]
    fn test_missing_team_degrades_to_zero_roster() {
        let mut source = InMemoryStatSource::new();
        source.insert_players(key("a", TimeWindow::CurrentSeason), vec![player("qb", "QB")]);

        let aggregator = PeriodAggregator::new(&source);
        assert!(aggregator
            .try_build(&key("a", TimeWindow::CurrentSeason))
            .unwrap()
            .is_none());
        assert_eq!(
            aggregator.build(&key("a", TimeWindow::CurrentSeason)),
            RosterObject::zeroed()
        );
    }

    struct FailingSource;

    impl StatSource for FailingSource {
        fn team_stats(&self, key: &StatKey) -> Result<Option<RawTeamStats>> {
            Err(GridironError::Retrieval {
                team: key.team.clone(),
                message: "connection refused".to_string(),
            })
        }

        fn player_stats(&self, _key: &StatKey) -> Result<Vec<RawPlayerStat>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_retrieval_failure_degrades_to_zero_roster() {
        let aggregator = PeriodAggregator::new(FailingSource);
        let roster = aggregator.build(&key("a", TimeWindow::LastSeason));
        assert_eq!(roster, RosterObject::zeroed());
    }

    /// Team counters always resolve; player lookups fail for one team
    struct PlayerLookupFails {
        inner: InMemoryStatSource,
        broken: TeamId,
    }

    impl StatSource for PlayerLookupFails {
        fn team_stats(&self, key: &StatKey) -> Result<Option<RawTeamStats>> {
            self.inner.team_stats(key)
        }

        fn player_stats(&self, key: &StatKey) -> Result<Vec<RawPlayerStat>> {
            if key.team == self.broken {
                return Err(GridironError::Retrieval {
                    team: key.team.clone(),
                    message: "player query timed out".to_string(),
                });
            }
            self.inner.player_stats(key)
        }
    }

    #[test]
    fn test_player_failure_degrades_to_zero_roster() {
        let mut inner = InMemoryStatSource::new();
        for team in ["a", "b", "c"] {
            let k = key(team, TimeWindow::CurrentSeason);
            inner.insert_team(
                k.clone(),
                RawTeamStats {
                    division: Some("FBS".to_string()),
                    win_percentage: Some(0.5),
                    ..Default::default()
                },
            );
            inner.insert_players(k, vec![player("qb", "QB")]);
        }
        let aggregator = PeriodAggregator::new(PlayerLookupFails {
            inner,
            broken: TeamId::new("a"),
        });

        let failing = key("a", TimeWindow::CurrentSeason);
        assert!(aggregator.try_build(&failing).is_err());
        assert_eq!(aggregator.build(&failing), RosterObject::zeroed());

        let schedule: Vec<ScheduledGame> = serde_json::from_value(json!([
            { "GameID": "1", "Season": 2021, "Week": 6, "HomeTeamID": "a", "AwayTeamID": "b" },
            { "GameID": "2", "Season": 2021, "Week": 6, "HomeTeamID": "c", "AwayTeamID": "b" }
        ]))
        .unwrap();
        let games = assemble_games(&aggregator, &schedule, &[TimeWindow::CurrentSeason]);

        assert_eq!(games.len(), 2);
        assert_eq!(games[0].home_stats[0], RosterObject::zeroed());
        assert_eq!(games[0].away_stats[0].team.get(TeamField::WinPercentage), 0.5);
        assert_eq!(games[1].home_stats[0].block(PositionGroup::Quarterback).filled(), 1);
    }

    #[test]
    fn test_assemble_game_orders_windows() {
        let mut source = InMemoryStatSource::new();
        for (i, window) in [TimeWindow::CurrentSeason, TimeWindow::LastSeason].iter().enumerate() {
            source.insert_team(
                key("home", *window),
                RawTeamStats {
                    division: Some("FBS".to_string()),
                    win_percentage: Some(i as f32),
                    ..Default::default()
                },
            );
        }

        let game: ScheduledGame = serde_json::from_value(json!({
            "GameID": "g1",
            "Season": "2021",
            "Week": 6,
            "HomeTeamID": "home",
            "AwayTeamID": "away",
            "HomePoints": 28,
            "AwayPoints": null,
        }))
        .unwrap();

        let windows = [TimeWindow::CurrentSeason, TimeWindow::LastSeason];
        let record = PeriodAggregator::new(&source).assemble_game(&game, &windows);

        assert_eq!(record.home_stats.len(), 2);
        assert_eq!(record.home_stats[1].team.get(TeamField::WinPercentage), 1.0);
        assert_eq!(record.away_stats[0], RosterObject::zeroed());
        assert_eq!(record.home_points, 28.0);
        assert_eq!(record.away_points, 0.0);
    }
}
