// Team snapshots built from standings rows.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::metrics::clamp_probability;
use crate::win_prob::{RecordToDate, WinProbabilityModel};

/// One row of the standings table as handed over by the data collaborator.
///
/// Counts are signed so that negative values can be reported as malformed
/// instead of failing to parse upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandingsRow {
    pub team: String,
    pub wins: i64,
    pub losses: i64,
    #[serde(default)]
    pub ties: i64,
    pub runs_scored: i64,
    pub runs_allowed: i64,
}

impl StandingsRow {
    pub fn new(team: &str, wins: i64, losses: i64, runs_scored: i64, runs_allowed: i64) -> Self {
        Self {
            team: team.to_string(),
            wins,
            losses,
            ties: 0,
            runs_scored,
            runs_allowed,
        }
    }
}

/// Immutable snapshot of one team's season to date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamState {
    pub name: String,
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
    pub games_remaining: u32,
    pub runs_scored: u32,
    pub runs_allowed: u32,
    /// Probability of winning any single remaining game, strictly in (0, 1).
    pub win_probability: f64,
}

impl TeamState {
    pub fn record(&self) -> RecordToDate {
        RecordToDate {
            wins: self.wins,
            losses: self.losses,
            runs_scored: self.runs_scored,
            runs_allowed: self.runs_allowed,
        }
    }

    pub fn games_played(&self) -> u32 {
        self.wins + self.losses + self.ties
    }

    /// Copy of this snapshot with a different single-game win probability.
    pub fn with_win_probability(&self, p: f64) -> Self {
        Self {
            win_probability: clamp_probability(p),
            ..self.clone()
        }
    }
}

/// Strip every whitespace character from a team name so that `"K T"`,
/// `" KT "` and `"KT"` all refer to the same team.
pub fn normalize_team_name(name: &str) -> String {
    name.chars().filter(|c| !c.is_whitespace()).collect()
}

fn count(team: &str, field: &str, value: i64, total_games: u32) -> Result<u32, AnalysisError> {
    if value < 0 {
        return Err(AnalysisError::malformed(team, format!("{field} is negative ({value})")));
    }
    if field != "runs_scored" && field != "runs_allowed" && value > total_games as i64 {
        return Err(AnalysisError::malformed(
            team,
            format!("{field} ({value}) exceeds the {total_games}-game schedule"),
        ));
    }
    u32::try_from(value)
        .map_err(|_| AnalysisError::malformed(team, format!("{field} ({value}) is out of range")))
}

/// Build one `TeamState` per standings row.
///
/// Fails with `MalformedStandingsRow` on an empty or duplicated team name,
/// negative counts, or a record longer than `total_games`.
pub fn build_team_states(
    rows: &[StandingsRow],
    total_games: u32,
    model: &dyn WinProbabilityModel,
) -> Result<Vec<TeamState>, AnalysisError> {
    let mut seen = HashSet::new();
    let mut teams = Vec::with_capacity(rows.len());

    for row in rows {
        let name = normalize_team_name(&row.team);
        if name.is_empty() {
            return Err(AnalysisError::malformed(&row.team, "team name is empty"));
        }
        if !seen.insert(name.clone()) {
            return Err(AnalysisError::malformed(&name, "duplicate team name"));
        }

        let wins = count(&name, "wins", row.wins, total_games)?;
        let losses = count(&name, "losses", row.losses, total_games)?;
        let ties = count(&name, "ties", row.ties, total_games)?;
        let runs_scored = count(&name, "runs_scored", row.runs_scored, total_games)?;
        let runs_allowed = count(&name, "runs_allowed", row.runs_allowed, total_games)?;

        let played = wins as u64 + losses as u64 + ties as u64;
        if played > total_games as u64 {
            return Err(AnalysisError::malformed(
                &name,
                format!("{played} games played exceeds the {total_games}-game schedule"),
            ));
        }

        let record = RecordToDate {
            wins,
            losses,
            runs_scored,
            runs_allowed,
        };
        teams.push(TeamState {
            name,
            wins,
            losses,
            ties,
            games_remaining: total_games - played as u32,
            runs_scored,
            runs_allowed,
            win_probability: clamp_probability(model.win_probability(&record)),
        });
    }

    Ok(teams)
}
