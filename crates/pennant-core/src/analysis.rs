// Analysis facade: validate raw tables, derive metrics, run the forecast.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::ControlFlow;

use serde::Serialize;
use tracing::{info, warn};

use crate::aggregator::{
    AggregateResult, OutcomeAggregator, SimulationConfig, SimulationProgress, DEFAULT_CHUNK_SIZE,
    DEFAULT_PLAYOFF_CUTOFF, DEFAULT_TRIAL_COUNT,
};
use crate::error::AnalysisError;
use crate::metrics::{
    league_metrics, pythagorean_win_pct, BattingLine, MetricsResult, PitchingLine,
    DEFAULT_PYTHAGOREAN_EXPONENT,
};
use crate::team::{build_team_states, normalize_team_name, StandingsRow, TeamState};
use crate::win_prob::{BlendedPythagoreanModel, DEFAULT_MIN_GAMES_FOR_PYTHAGOREAN};

/// Season length of the default league (KBO).
pub const DEFAULT_TOTAL_SCHEDULED_GAMES: u32 = 144;

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    pub total_scheduled_games: u32,
    pub pythagorean_exponent: f64,
    pub trial_count: u64,
    pub playoff_cutoff: usize,
    pub random_seed: Option<u64>,
    pub chunk_size: u64,
    pub min_games_for_pythagorean: u32,
    pub pythagorean_weight: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            total_scheduled_games: DEFAULT_TOTAL_SCHEDULED_GAMES,
            pythagorean_exponent: DEFAULT_PYTHAGOREAN_EXPONENT,
            trial_count: DEFAULT_TRIAL_COUNT,
            playoff_cutoff: DEFAULT_PLAYOFF_CUTOFF,
            random_seed: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            min_games_for_pythagorean: DEFAULT_MIN_GAMES_FOR_PYTHAGOREAN,
            pythagorean_weight: 1.0,
        }
    }
}

impl AnalysisConfig {
    pub fn model(&self) -> BlendedPythagoreanModel {
        BlendedPythagoreanModel {
            exponent: self.pythagorean_exponent,
            min_games: self.min_games_for_pythagorean,
            pythagorean_weight: self.pythagorean_weight,
        }
    }

    pub fn simulation(&self) -> SimulationConfig {
        SimulationConfig {
            trial_count: self.trial_count,
            playoff_cutoff: self.playoff_cutoff,
            seed: self.random_seed,
            chunk_size: self.chunk_size,
        }
    }

    /// Checks that do not depend on the team count. The playoff cutoff is
    /// checked once the standings have been read.
    fn validate_model(&self) -> Result<(), AnalysisError> {
        if self.total_scheduled_games == 0 {
            return Err(AnalysisError::invalid_config(
                "total_scheduled_games",
                "must be greater than 0",
            ));
        }
        if !(self.pythagorean_exponent.is_finite() && self.pythagorean_exponent > 0.0) {
            return Err(AnalysisError::invalid_config(
                "pythagorean_exponent",
                format!("must be a positive number, got {}", self.pythagorean_exponent),
            ));
        }
        if !(0.0..=1.0).contains(&self.pythagorean_weight) {
            return Err(AnalysisError::invalid_config(
                "pythagorean_weight",
                format!("must be between 0.0 and 1.0, got {}", self.pythagorean_weight),
            ));
        }
        Ok(())
    }
}

/// Raw tables handed over by the data collaborator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeagueInput {
    pub standings: Vec<StandingsRow>,
    pub batting: BTreeMap<String, BattingLine>,
    pub pitching: BTreeMap<String, PitchingLine>,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// A team's place in the current standings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamSummary {
    pub rank: usize,
    pub name: String,
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
    pub games_remaining: u32,
    /// `None` before the first decision.
    pub win_pct: Option<f64>,
    pub games_behind: f64,
    pub pythagorean_win_pct: f64,
    pub win_probability: f64,
    /// `wins + games_remaining * win_probability`.
    pub projected_final_wins: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub total_scheduled_games: u32,
    /// Ordered by current win percentage.
    pub standings: Vec<TeamSummary>,
    pub metrics: MetricsResult,
    pub forecast: AggregateResult,
}

// ---------------------------------------------------------------------------
// Orchestration
// ---------------------------------------------------------------------------

pub fn analyze(input: &LeagueInput, config: &AnalysisConfig) -> Result<AnalysisReport, AnalysisError> {
    analyze_with_progress(input, config, |_| ControlFlow::Continue(()))
}

/// Run the full analysis, forwarding simulation progress to `on_progress`.
///
/// Every validation error is raised before the first trial runs.
pub fn analyze_with_progress<F>(
    input: &LeagueInput,
    config: &AnalysisConfig,
    on_progress: F,
) -> Result<AnalysisReport, AnalysisError>
where
    F: FnMut(SimulationProgress) -> ControlFlow<()>,
{
    config.validate_model()?;

    let model = config.model();
    let teams = build_team_states(&input.standings, config.total_scheduled_games, &model)?;

    let batting = normalize_keys(&input.batting, "batting");
    let pitching = normalize_keys(&input.pitching, "pitching");
    check_team_sets(&teams, &batting, &pitching)?;

    let aggregator = OutcomeAggregator::new(&teams, config.simulation())?;
    info!(
        "analyzing {} teams: {} trials, top {} qualify, seed {}",
        teams.len(),
        config.trial_count,
        config.playoff_cutoff,
        aggregator.seed()
    );

    let metrics = league_metrics(&batting, &pitching);
    let forecast = aggregator.run_with_progress(on_progress)?;
    let standings = summarize_standings(&teams, config.pythagorean_exponent);

    info!("analysis complete ({} trials)", forecast.trial_count);
    Ok(AnalysisReport {
        total_scheduled_games: config.total_scheduled_games,
        standings,
        metrics,
        forecast,
    })
}

fn normalize_keys<V: Copy>(table: &BTreeMap<String, V>, label: &str) -> BTreeMap<String, V> {
    let mut out = BTreeMap::new();
    for (name, value) in table {
        let key = normalize_team_name(name);
        if out.insert(key.clone(), *value).is_some() {
            warn!("duplicate {label} entry for '{key}', using latest value");
        }
    }
    out
}

fn check_team_sets(
    teams: &[TeamState],
    batting: &BTreeMap<String, BattingLine>,
    pitching: &BTreeMap<String, PitchingLine>,
) -> Result<(), AnalysisError> {
    let standings: BTreeSet<&str> = teams.iter().map(|t| t.name.as_str()).collect();
    let stats: BTreeSet<&str> = batting
        .keys()
        .chain(pitching.keys())
        .map(String::as_str)
        .collect();

    let missing_from_standings: Vec<String> =
        stats.difference(&standings).map(|s| s.to_string()).collect();
    let mut missing_from_stats = BTreeSet::new();
    for name in &standings {
        if !batting.contains_key(*name) || !pitching.contains_key(*name) {
            missing_from_stats.insert(name.to_string());
        }
    }

    if missing_from_standings.is_empty() && missing_from_stats.is_empty() {
        return Ok(());
    }
    Err(AnalysisError::TeamSetMismatch {
        missing_from_standings,
        missing_from_stats: missing_from_stats.into_iter().collect(),
    })
}

/// Rank teams by current win percentage (name breaks ties) and compute games
/// behind the leader.
pub fn summarize_standings(teams: &[TeamState], exponent: f64) -> Vec<TeamSummary> {
    let mut ordered: Vec<&TeamState> = teams.iter().collect();
    ordered.sort_by(|a, b| {
        let pa = a.record().actual_win_pct().unwrap_or(0.0);
        let pb = b.record().actual_win_pct().unwrap_or(0.0);
        pb.total_cmp(&pa).then_with(|| a.name.cmp(&b.name))
    });

    let Some(leader) = ordered.first() else {
        return Vec::new();
    };
    let (leader_w, leader_l) = (leader.wins as f64, leader.losses as f64);

    ordered
        .iter()
        .enumerate()
        .map(|(i, t)| TeamSummary {
            rank: i + 1,
            name: t.name.clone(),
            wins: t.wins,
            losses: t.losses,
            ties: t.ties,
            games_remaining: t.games_remaining,
            win_pct: t.record().actual_win_pct(),
            games_behind: ((leader_w - t.wins as f64) + (t.losses as f64 - leader_l)) / 2.0,
            pythagorean_win_pct: pythagorean_win_pct(t.runs_scored, t.runs_allowed, exponent),
            win_probability: t.win_probability,
            projected_final_wins: t.wins as f64 + t.games_remaining as f64 * t.win_probability,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn batting(ab: u32, h: u32) -> BattingLine {
        BattingLine {
            at_bats: ab,
            hits: h,
            walks: ab / 10,
            hit_by_pitch: 5,
            sacrifice_flies: 3,
            total_bases: h * 3 / 2,
        }
    }

    fn pitching(ip: f64, er: u32) -> PitchingLine {
        PitchingLine {
            innings_pitched: ip,
            earned_runs: er,
            hits_allowed: er * 2,
            walks_allowed: er / 2,
        }
    }

    fn input() -> LeagueInput {
        let standings = vec![
            StandingsRow::new("Bears", 20, 10, 160, 120),
            StandingsRow::new("Eagles", 15, 15, 140, 140),
            StandingsRow::new("Lions", 10, 20, 110, 170),
        ];
        let mut bat = BTreeMap::new();
        let mut pit = BTreeMap::new();
        for (name, ab, h, ip, er) in [
            ("Bears", 1000, 280, 270.0, 110),
            ("Eagles", 1000, 260, 268.0, 125),
            ("Lions", 1000, 240, 265.0, 150),
        ] {
            bat.insert(name.to_string(), batting(ab, h));
            pit.insert(name.to_string(), pitching(ip, er));
        }
        LeagueInput {
            standings,
            batting: bat,
            pitching: pit,
        }
    }

    fn config() -> AnalysisConfig {
        AnalysisConfig {
            total_scheduled_games: 40,
            trial_count: 2000,
            playoff_cutoff: 2,
            random_seed: Some(77),
            chunk_size: 500,
            ..AnalysisConfig::default()
        }
    }

    #[test]
    fn full_analysis_produces_all_sections() {
        let report = analyze(&input(), &config()).unwrap();
        assert_eq!(report.standings.len(), 3);
        assert_eq!(report.metrics.len(), 3);
        assert_eq!(report.forecast.teams.len(), 3);
        assert_eq!(report.forecast.championship_total(), 2000);
        assert_eq!(report.forecast.seed, 77);
    }

    #[test]
    fn standings_are_ranked_with_games_behind() {
        let report = analyze(&input(), &config()).unwrap();
        let s = &report.standings;
        assert_eq!(s[0].name, "Bears");
        assert_eq!(s[0].rank, 1);
        assert_eq!(s[0].games_behind, 0.0);
        assert_eq!(s[1].games_behind, 5.0);
        assert_eq!(s[2].games_behind, 10.0);
        assert_eq!(s[1].pythagorean_win_pct, 0.5);
        assert_eq!(s[0].games_remaining, 10);
        let expected = 20.0 + 10.0 * s[0].win_probability;
        assert!((s[0].projected_final_wins - expected).abs() < 1e-12);
    }

    #[test]
    fn stat_table_names_are_normalized() {
        let mut inp = input();
        let line = inp.batting.remove("Eagles").unwrap();
        inp.batting.insert(" Eag les ".to_string(), line);
        assert!(analyze(&inp, &config()).is_ok());
    }

    #[test]
    fn team_missing_from_stats_is_mismatch() {
        let mut inp = input();
        inp.pitching.remove("Lions");
        match analyze(&inp, &config()) {
            Err(AnalysisError::TeamSetMismatch {
                missing_from_standings,
                missing_from_stats,
            }) => {
                assert!(missing_from_standings.is_empty());
                assert_eq!(missing_from_stats, vec!["Lions".to_string()]);
            }
            other => panic!("expected TeamSetMismatch, got {other:?}"),
        }
    }

    #[test]
    fn extra_stats_team_is_mismatch() {
        let mut inp = input();
        inp.batting.insert("Wyverns".to_string(), batting(900, 200));
        match analyze(&inp, &config()) {
            Err(AnalysisError::TeamSetMismatch {
                missing_from_standings,
                ..
            }) => assert_eq!(missing_from_standings, vec!["Wyverns".to_string()]),
            other => panic!("expected TeamSetMismatch, got {other:?}"),
        }
    }

    #[test]
    fn malformed_standings_reported_before_mismatch() {
        let mut inp = input();
        inp.standings[0].wins = -3;
        inp.pitching.clear();
        assert!(matches!(
            analyze(&inp, &config()),
            Err(AnalysisError::MalformedStandingsRow { .. })
        ));
    }

    #[test]
    fn invalid_configuration_is_rejected_up_front() {
        let bad = [
            AnalysisConfig { trial_count: 0, ..config() },
            AnalysisConfig { playoff_cutoff: 4, ..config() },
            AnalysisConfig { playoff_cutoff: 0, ..config() },
            AnalysisConfig { total_scheduled_games: 0, ..config() },
            AnalysisConfig { pythagorean_exponent: -1.0, ..config() },
            AnalysisConfig { pythagorean_weight: 1.5, ..config() },
        ];
        for cfg in bad {
            let mut calls = 0;
            let result = analyze_with_progress(&input(), &cfg, |_| {
                calls += 1;
                ControlFlow::Continue(())
            });
            assert!(
                matches!(result, Err(AnalysisError::InvalidConfiguration { .. })),
                "{cfg:?} should be rejected"
            );
            assert_eq!(calls, 0);
        }
    }

    #[test]
    fn zero_at_bat_team_does_not_abort_analysis() {
        let mut inp = input();
        inp.batting.insert("Lions".to_string(), BattingLine::default());
        let report = analyze(&inp, &config()).unwrap();
        assert_eq!(report.metrics["Lions"].batting.avg, None);
        assert!(report.metrics["Lions"].pitching.era.is_some());
        assert!(report.metrics["Bears"].batting.avg.is_some());
    }

    #[test]
    fn report_serializes_undefined_metrics_as_null() {
        let mut inp = input();
        inp.batting.insert("Lions".to_string(), BattingLine::default());
        let report = analyze(&inp, &config()).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert!(json["metrics"]["Lions"]["batting"]["avg"].is_null());
        assert!(json["forecast"]["teams"][0]["championship_probability"].is_number());
    }

    #[test]
    fn summarize_empty_league() {
        assert!(summarize_standings(&[], DEFAULT_PYTHAGOREAN_EXPONENT).is_empty());
    }
}
