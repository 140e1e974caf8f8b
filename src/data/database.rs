//! SQLite store for per-period team and player statistics

use crate::data::lenient;
use crate::data::source::{RawPlayerStat, RawTeamStats, StatKey, StatSource, TimeWindow};
use crate::{Result, TeamId};
use log::info;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Database connection and operations
pub struct Database {
    conn: Connection,
}

const TEAM_COLUMNS: &str = "division, win_percentage, strength_of_record, points_per_game,
    points_allowed_per_game, yards_per_game, turnovers_per_game, penalties_per_game,
    third_down_efficiency, red_zone_efficiency, sacks_per_game, interceptions_per_game,
    forced_fumbles_per_game, yards_per_play, opponent_yards_per_game, opponent_yards_per_play,
    fbs_opponent_ratio";

const PLAYER_COLUMNS: &str = "player_id, position, recruiting_score, period_completed,
    passing_attempts, passing_completions, passing_yards, passing_touchdowns,
    passing_interceptions, rushing_yards, rushing_yards_per_carry, rushing_touchdowns,
    receptions, receiving_yards, receiving_touchdowns, fumbles, tackles, sacks,
    interceptions, forced_fumbles, passes_defended, games_played";

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS team_period_stats (
                team_id TEXT NOT NULL,
                season INTEGER NOT NULL,
                week INTEGER NOT NULL,
                time_window TEXT NOT NULL,
                division TEXT,
                win_percentage REAL,
                strength_of_record REAL,
                points_per_game REAL,
                points_allowed_per_game REAL,
                yards_per_game REAL,
                turnovers_per_game REAL,
                penalties_per_game REAL,
                third_down_efficiency REAL,
                red_zone_efficiency REAL,
                sacks_per_game REAL,
                interceptions_per_game REAL,
                forced_fumbles_per_game REAL,
                yards_per_play REAL,
                opponent_yards_per_game REAL,
                opponent_yards_per_play REAL,
                fbs_opponent_ratio REAL,
                PRIMARY KEY (team_id, season, week, time_window)
            );

            CREATE TABLE IF NOT EXISTS player_period_stats (
                team_id TEXT NOT NULL,
                season INTEGER NOT NULL,
                week INTEGER NOT NULL,
                time_window TEXT NOT NULL,
                player_id TEXT NOT NULL,
                position TEXT NOT NULL,
                recruiting_score REAL,
                period_completed INTEGER NOT NULL DEFAULT 0,
                passing_attempts REAL,
                passing_completions REAL,
                passing_yards REAL,
                passing_touchdowns REAL,
                passing_interceptions REAL,
                rushing_yards REAL,
                rushing_yards_per_carry REAL,
                rushing_touchdowns REAL,
                receptions REAL,
                receiving_yards REAL,
                receiving_touchdowns REAL,
                fumbles REAL,
                tackles REAL,
                sacks REAL,
                interceptions REAL,
                forced_fumbles REAL,
                passes_defended REAL,
                games_played REAL,
                UNIQUE(team_id, season, week, time_window, player_id)
            );

            CREATE INDEX IF NOT EXISTS idx_player_period_key
                ON player_period_stats(team_id, season, week, time_window);
            "#,
        )?;
        Ok(())
    }

    // ==================== Team Operations ====================

    /// Insert or replace the team counters for a key
    pub fn upsert_team_stats(&self, key: &StatKey, stats: &RawTeamStats) -> Result<()> {
        self.conn.execute(
            &format!(
                r#"
                INSERT OR REPLACE INTO team_period_stats (team_id, season, week, time_window, {})
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                        ?16, ?17, ?18, ?19, ?20, ?21)
                "#,
                TEAM_COLUMNS
            ),
            params![
                key.team.as_str(),
                key.season,
                key.week,
                key.window.label(),
                stats.division,
                real(stats.win_percentage),
                real(stats.strength_of_record),
                real(stats.points_per_game),
                real(stats.points_allowed_per_game),
                real(stats.yards_per_game),
                real(stats.turnovers_per_game),
                real(stats.penalties_per_game),
                real(stats.third_down_efficiency),
                real(stats.red_zone_efficiency),
                real(stats.sacks_per_game),
                real(stats.interceptions_per_game),
                real(stats.forced_fumbles_per_game),
                real(stats.yards_per_play),
                real(stats.opponent_yards_per_game),
                real(stats.opponent_yards_per_play),
                real(stats.fbs_opponent_ratio),
            ],
        )?;
        Ok(())
    }

    /// Team counters for a key
    pub fn get_team_stats(&self, key: &StatKey) -> Result<Option<RawTeamStats>> {
        let stats = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM team_period_stats
                     WHERE team_id = ?1 AND season = ?2 AND week = ?3 AND time_window = ?4",
                    TEAM_COLUMNS
                ),
                params![key.team.as_str(), key.season, key.week, key.window.label()],
                Self::row_to_team_stats,
            )
            .optional()?;
        Ok(stats)
    }

    fn row_to_team_stats(row: &Row) -> rusqlite::Result<RawTeamStats> {
        let f = |i: usize| -> rusqlite::Result<Option<f32>> {
            Ok(row.get::<_, Option<f64>>(i)?.map(|v| v as f32))
        };
        Ok(RawTeamStats {
            division: row.get(0)?,
            win_percentage: f(1)?,
            strength_of_record: f(2)?,
            points_per_game: f(3)?,
            points_allowed_per_game: f(4)?,
            yards_per_game: f(5)?,
            turnovers_per_game: f(6)?,
            penalties_per_game: f(7)?,
            third_down_efficiency: f(8)?,
            red_zone_efficiency: f(9)?,
            sacks_per_game: f(10)?,
            interceptions_per_game: f(11)?,
            forced_fumbles_per_game: f(12)?,
            yards_per_play: f(13)?,
            opponent_yards_per_game: f(14)?,
            opponent_yards_per_play: f(15)?,
            fbs_opponent_ratio: f(16)?,
        })
    }

    // ==================== Player Operations ====================

    /// Insert or update a player's counters for a key
    pub fn upsert_player_stat(&self, key: &StatKey, stat: &RawPlayerStat) -> Result<()> {
        self.conn.execute(
            &format!(
                r#"
                INSERT INTO player_period_stats (team_id, season, week, time_window, {})
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                        ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26)
                ON CONFLICT(team_id, season, week, time_window, player_id) DO UPDATE SET
                    position = excluded.position,
                    recruiting_score = COALESCE(excluded.recruiting_score, recruiting_score),
                    period_completed = excluded.period_completed,
                    passing_attempts = excluded.passing_attempts,
                    passing_completions = excluded.passing_completions,
                    passing_yards = excluded.passing_yards,
                    passing_touchdowns = excluded.passing_touchdowns,
                    passing_interceptions = excluded.passing_interceptions,
                    rushing_yards = excluded.rushing_yards,
                    rushing_yards_per_carry = excluded.rushing_yards_per_carry,
                    rushing_touchdowns = excluded.rushing_touchdowns,
                    receptions = excluded.receptions,
                    receiving_yards = excluded.receiving_yards,
                    receiving_touchdowns = excluded.receiving_touchdowns,
                    fumbles = excluded.fumbles,
                    tackles = excluded.tackles,
                    sacks = excluded.sacks,
                    interceptions = excluded.interceptions,
                    forced_fumbles = excluded.forced_fumbles,
                    passes_defended = excluded.passes_defended,
                    games_played = excluded.games_played
                "#,
                PLAYER_COLUMNS
            ),
            params![
                key.team.as_str(),
                key.season,
                key.week,
                key.window.label(),
                stat.player_id,
                stat.position,
                real(stat.recruiting_score),
                stat.period_completed,
                real(stat.passing_attempts),
                real(stat.passing_completions),
                real(stat.passing_yards),
                real(stat.passing_touchdowns),
                real(stat.passing_interceptions),
                real(stat.rushing_yards),
                real(stat.rushing_yards_per_carry),
                real(stat.rushing_touchdowns),
                real(stat.receptions),
                real(stat.receiving_yards),
                real(stat.receiving_touchdowns),
                real(stat.fumbles),
                real(stat.tackles),
                real(stat.sacks),
                real(stat.interceptions),
                real(stat.forced_fumbles),
                real(stat.passes_defended),
                real(stat.games_played),
            ],
        )?;
        Ok(())
    }

    /// Insert multiple player rows
    pub fn upsert_player_stats(&self, key: &StatKey, stats: &[RawPlayerStat]) -> Result<usize> {
        let mut count = 0;
        for stat in stats {
            self.upsert_player_stat(key, stat)?;
            count += 1;
        }
        Ok(count)
    }

    /// Player counters for a key, in insertion order
    pub fn get_player_stats(&self, key: &StatKey) -> Result<Vec<RawPlayerStat>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM player_period_stats
             WHERE team_id = ?1 AND season = ?2 AND week = ?3 AND time_window = ?4
             ORDER BY rowid",
            PLAYER_COLUMNS
        ))?;

        let players = stmt
            .query_map(
                params![key.team.as_str(), key.season, key.week, key.window.label()],
                Self::row_to_player_stat,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(players)
    }

    fn row_to_player_stat(row: &Row) -> rusqlite::Result<RawPlayerStat> {
        let f = |i: usize| -> rusqlite::Result<Option<f32>> {
            Ok(row.get::<_, Option<f64>>(i)?.map(|v| v as f32))
        };
        Ok(RawPlayerStat {
            player_id: row.get(0)?,
            position: row.get(1)?,
            recruiting_score: f(2)?,
            period_completed: row.get(3)?,
            passing_attempts: f(4)?,
            passing_completions: f(5)?,
            passing_yards: f(6)?,
            passing_touchdowns: f(7)?,
            passing_interceptions: f(8)?,
            rushing_yards: f(9)?,
            rushing_yards_per_carry: f(10)?,
            rushing_touchdowns: f(11)?,
            receptions: f(12)?,
            receiving_yards: f(13)?,
            receiving_touchdowns: f(14)?,
            fumbles: f(15)?,
            tackles: f(16)?,
            sacks: f(17)?,
            interceptions: f(18)?,
            forced_fumbles: f(19)?,
            passes_defended: f(20)?,
            games_played: f(21)?,
        })
    }

    // ==================== Import ====================

    /// Upsert a batch of exported period records
    pub fn import(&self, records: &[PeriodStatsImport]) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();
        for record in records {
            let key = record.key();
            if let Some(team) = &record.team {
                self.upsert_team_stats(&key, team)?;
                summary.team_rows += 1;
            }
            summary.player_rows += self.upsert_player_stats(&key, &record.players)?;
        }
        info!(
            "Imported {} team rows and {} player rows",
            summary.team_rows, summary.player_rows
        );
        Ok(summary)
    }

    // ==================== Statistics ====================

    /// Get database statistics
    pub fn get_stats(&self) -> Result<DatabaseStats> {
        let team_rows: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM team_period_stats", [], |row| row.get(0))?;

        let player_rows: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM player_period_stats", [], |row| row.get(0))?;

        let team_count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT team_id) FROM team_period_stats",
            [],
            |row| row.get(0),
        )?;

        let (earliest_season, latest_season): (Option<u16>, Option<u16>) = self.conn.query_row(
            "SELECT MIN(season), MAX(season) FROM team_period_stats",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(DatabaseStats {
            team_count: team_count as usize,
            team_rows: team_rows as usize,
            player_rows: player_rows as usize,
            earliest_season,
            latest_season,
        })
    }
}

impl StatSource for Database {
    fn team_stats(&self, key: &StatKey) -> Result<Option<RawTeamStats>> {
        self.get_team_stats(key)
    }

    fn player_stats(&self, key: &StatKey) -> Result<Vec<RawPlayerStat>> {
        self.get_player_stats(key)
    }
}

fn real(value: Option<f32>) -> Option<f64> {
    value.map(f64::from)
}

/// One exported (team, season, week, window) record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodStatsImport {
    pub team_id: TeamId,
    #[serde(deserialize_with = "lenient::season")]
    pub season: u16,
    #[serde(deserialize_with = "lenient::week")]
    pub week: u8,
    pub window: TimeWindow,
    #[serde(default)]
    pub team: Option<RawTeamStats>,
    #[serde(default)]
    pub players: Vec<RawPlayerStat>,
}

impl PeriodStatsImport {
    pub fn key(&self) -> StatKey {
        StatKey::new(self.team_id.clone(), self.season, self.week, self.window)
    }
}

/// Read a JSON array of [`PeriodStatsImport`] records
pub fn load_import<P: AsRef<Path>>(path: P) -> Result<Vec<PeriodStatsImport>> {
    let content = std::fs::read_to_string(path.as_ref())?;
    Ok(serde_json::from_str(&content)?)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportSummary {
    pub team_rows: usize,
    pub player_rows: usize,
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    pub team_count: usize,
    pub team_rows: usize,
    pub player_rows: usize,
    pub earliest_season: Option<u16>,
    pub latest_season: Option<u16>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(window: TimeWindow) -> StatKey {
        StatKey::new(TeamId::new("7f1c"), 2019, 3, window)
    }

    #[test]
    fn test_create_database() {
        let db = Database::in_memory().unwrap();
        let stats = db.get_stats().unwrap();
        assert_eq!(stats.team_count, 0);
        assert_eq!(stats.player_rows, 0);
        assert_eq!(stats.earliest_season, None);
    }

    #[test]
    fn test_team_stats_roundtrip() {
        let db = Database::in_memory().unwrap();
        let stats = RawTeamStats {
            division: Some("FBS".to_string()),
            win_percentage: Some(0.5),
            red_zone_efficiency: Some(0.8),
            ..Default::default()
        };
        db.upsert_team_stats(&key(TimeWindow::CurrentSeason), &stats).unwrap();

        assert_eq!(db.get_team_stats(&key(TimeWindow::CurrentSeason)).unwrap(), Some(stats));
        assert_eq!(db.get_team_stats(&key(TimeWindow::LastSeason)).unwrap(), None);

        let summary = db.get_stats().unwrap();
        assert_eq!(summary.team_count, 1);
        assert_eq!(summary.latest_season, Some(2019));
    }

    #[test]
    fn test_player_stats_keep_insertion_order() {
        let db = Database::in_memory().unwrap();
        let k = key(TimeWindow::Last3Games);
        let players: Vec<RawPlayerStat> = ["c", "lg", "rg"]
            .iter()
            .map(|id| RawPlayerStat {
                player_id: id.to_string(),
                position: "OL".to_string(),
                fumbles: Some(0.0),
                ..Default::default()
            })
            .collect();
        assert_eq!(db.upsert_player_stats(&k, &players).unwrap(), 3);

        // updating an existing player must not move it
        let updated = RawPlayerStat {
            period_completed: true,
            games_played: Some(4.0),
            ..players[0].clone()
        };
        db.upsert_player_stat(&k, &updated).unwrap();

        let stored = db.player_stats(&k).unwrap();
        let ids: Vec<_> = stored.iter().map(|p| p.player_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "lg", "rg"]);
        assert!(stored[0].period_completed);
        assert_eq!(stored[0].games_played, Some(4.0));
        assert_eq!(stored[1].passing_yards, None);
    }

    #[test]
    fn test_import_records() {
        let db = Database::in_memory().unwrap();
        let records: Vec<PeriodStatsImport> = serde_json::from_value(json!([
            {
                "team_id": "7f1c",
                "season": "2019",
                "week": 3,
                "window": "currentSeason",
                "team": { "division": "FBS", "win_percentage": 0.75 },
                "players": [
                    { "player_id": "qb1", "position": "QB", "period_completed": true, "passing_yards": 250.0 }
                ]
            },
            {
                "team_id": "7f1c",
                "season": 2019,
                "week": 3,
                "window": "lastSeason"
            }
        ]))
        .unwrap();

        let summary = db.import(&records).unwrap();
        assert_eq!(summary, ImportSummary { team_rows: 1, player_rows: 1 });

        let team = db.team_stats(&key(TimeWindow::CurrentSeason)).unwrap().unwrap();
        assert_eq!(team.win_percentage, Some(0.75));
        assert_eq!(db.team_stats(&key(TimeWindow::LastSeason)).unwrap(), None);
        assert_eq!(db.player_stats(&key(TimeWindow::CurrentSeason)).unwrap()[0].passing_yards, Some(250.0));
    }
}
