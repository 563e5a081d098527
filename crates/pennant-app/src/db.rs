// SQLite persistence layer for the simulation history log.

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, Row};

use pennant_core::AggregateResult;

/// One team's outlook as recorded in a past run.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub run_id: i64,
    pub run_at: DateTime<Utc>,
    pub team: String,
    pub championship_probability: f64,
    pub playoff_probability: f64,
    pub expected_final_wins: f64,
}

/// League-wide means for one recorded run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunAverage {
    pub run_id: i64,
    pub run_at: DateTime<Utc>,
    pub seed: u64,
    pub trial_count: u64,
    pub team_count: usize,
    pub mean_championship_probability: f64,
    pub mean_playoff_probability: f64,
}

/// SQLite-backed log of completed forecasts: one `simulation_runs` row per
/// run and one `simulation_log` row per team per run.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        // Seeds are full-range u64 and are stored bit-cast into INTEGER.
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS simulation_runs (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                run_at         TEXT NOT NULL,
                seed           INTEGER NOT NULL,
                trial_count    INTEGER NOT NULL,
                playoff_cutoff INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS simulation_log (
                run_id                   INTEGER NOT NULL REFERENCES simulation_runs(id),
                team                     TEXT NOT NULL,
                championship_probability REAL NOT NULL,
                playoff_probability      REAL NOT NULL,
                expected_final_wins      REAL NOT NULL,
                PRIMARY KEY (run_id, team)
            );

            CREATE INDEX IF NOT EXISTS idx_simulation_log_team ON simulation_log(team);
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock).
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    /// Append a completed forecast to the log, stamped with the current time.
    pub fn record_run(&self, forecast: &AggregateResult) -> Result<i64> {
        self.record_run_at(forecast, Utc::now())
    }

    /// Append a completed forecast to the log in a single transaction.
    /// Returns the new run id.
    pub fn record_run_at(&self, forecast: &AggregateResult, run_at: DateTime<Utc>) -> Result<i64> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin history transaction")?;

        tx.execute(
            "INSERT INTO simulation_runs (run_at, seed, trial_count, playoff_cutoff)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                format_timestamp(&run_at),
                forecast.seed as i64,
                forecast.trial_count as i64,
                forecast.playoff_cutoff as i64,
            ],
        )
        .context("failed to insert simulation run")?;
        let run_id = tx.last_insert_rowid();

        for team in &forecast.teams {
            tx.execute(
                "INSERT INTO simulation_log
                    (run_id, team, championship_probability, playoff_probability, expected_final_wins)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    run_id,
                    team.name,
                    team.championship_probability,
                    team.playoff_probability,
                    team.expected_final_wins,
                ],
            )
            .context("failed to insert simulation log row")?;
        }

        tx.commit().context("failed to commit simulation run")?;
        Ok(run_id)
    }

    /// Every logged team outlook, oldest run first, teams by name.
    pub fn load_history(&self) -> Result<Vec<HistoryEntry>> {
        self.query_history(
            "SELECT l.run_id, r.run_at, l.team, l.championship_probability,
                    l.playoff_probability, l.expected_final_wins
             FROM simulation_log l JOIN simulation_runs r ON r.id = l.run_id
             ORDER BY l.run_id, l.team",
            params![],
        )
    }

    /// One team's logged outlooks, oldest first.
    pub fn team_history(&self, team: &str) -> Result<Vec<HistoryEntry>> {
        self.query_history(
            "SELECT l.run_id, r.run_at, l.team, l.championship_probability,
                    l.playoff_probability, l.expected_final_wins
             FROM simulation_log l JOIN simulation_runs r ON r.id = l.run_id
             WHERE l.team = ?1
             ORDER BY l.run_id",
            params![team],
        )
    }

    fn query_history(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<HistoryEntry>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(sql)
            .context("failed to prepare history query")?;

        let rows = stmt
            .query_map(args, |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, f64>(4)?,
                    row.get::<_, f64>(5)?,
                ))
            })
            .context("failed to query simulation history")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map simulation history rows")?;

        rows.into_iter()
            .map(|(run_id, run_at, team, champ, playoff, wins)| {
                Ok(HistoryEntry {
                    run_id,
                    run_at: parse_timestamp(&run_at)?,
                    team,
                    championship_probability: champ,
                    playoff_probability: playoff,
                    expected_final_wins: wins,
                })
            })
            .collect()
    }

    /// Mean championship and playoff probability per run, oldest first.
    pub fn run_averages(&self) -> Result<Vec<RunAverage>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT r.id, r.run_at, r.seed, r.trial_count, COUNT(l.team),
                        AVG(l.championship_probability), AVG(l.playoff_probability)
                 FROM simulation_runs r JOIN simulation_log l ON l.run_id = r.id
                 GROUP BY r.id
                 ORDER BY r.id",
            )
            .context("failed to prepare run_averages query")?;

        let rows = stmt
            .query_map([], RawRunAverage::from_row)
            .context("failed to query run averages")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map run average rows")?;

        rows.into_iter()
            .map(|raw| {
                Ok(RunAverage {
                    run_id: raw.run_id,
                    run_at: parse_timestamp(&raw.run_at)?,
                    seed: raw.seed as u64,
                    trial_count: raw.trial_count as u64,
                    team_count: raw.team_count as usize,
                    mean_championship_probability: raw.mean_championship,
                    mean_playoff_probability: raw.mean_playoff,
                })
            })
            .collect()
    }
}

struct RawRunAverage {
    run_id: i64,
    run_at: String,
    seed: i64,
    trial_count: i64,
    team_count: i64,
    mean_championship: f64,
    mean_playoff: f64,
}

impl RawRunAverage {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            run_id: row.get(0)?,
            run_at: row.get(1)?,
            seed: row.get(2)?,
            trial_count: row.get(3)?,
            team_count: row.get(4)?,
            mean_championship: row.get(5)?,
            mean_playoff: row.get(6)?,
        })
    }
}

fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(text)
        .with_context(|| format!("invalid run timestamp '{text}'"))?;
    Ok(parsed.with_timezone(&Utc))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
