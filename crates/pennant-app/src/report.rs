// Plain-text and JSON rendering of an analysis report and the history log.

use std::fmt::Write as _;

use pennant_core::{AnalysisReport, MetricsResult, TeamMetrics};

use crate::db::{HistoryEntry, RunAverage};

/// How many teams each leaderboard lists.
pub const LEADERBOARD_SIZE: usize = 3;

/// A rate stat shown on a leaderboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderStat {
    Avg,
    Ops,
    Era,
    Whip,
}

impl LeaderStat {
    pub const ALL: [LeaderStat; 4] = [LeaderStat::Avg, LeaderStat::Ops, LeaderStat::Era, LeaderStat::Whip];

    pub fn label(self) -> &'static str {
        match self {
            LeaderStat::Avg => "AVG",
            LeaderStat::Ops => "OPS",
            LeaderStat::Era => "ERA",
            LeaderStat::Whip => "WHIP",
        }
    }

    fn value(self, m: &TeamMetrics) -> Option<f64> {
        match self {
            LeaderStat::Avg => m.batting.avg,
            LeaderStat::Ops => m.batting.ops,
            LeaderStat::Era => m.pitching.era,
            LeaderStat::Whip => m.pitching.whip,
        }
    }

    /// Batting stats rank high-to-low, pitching stats low-to-high.
    fn higher_is_better(self) -> bool {
        matches!(self, LeaderStat::Avg | LeaderStat::Ops)
    }
}

/// Best `LEADERBOARD_SIZE` teams for `stat`. Teams whose value is undefined
/// are left off; equal values fall back to team name.
pub fn leaders(metrics: &MetricsResult, stat: LeaderStat) -> Vec<(&str, f64)> {
    let mut ranked: Vec<(&str, f64)> = metrics
        .iter()
        .filter_map(|(name, m)| stat.value(m).map(|v| (name.as_str(), v)))
        .collect();
    ranked.sort_by(|a, b| {
        let by_value = if stat.higher_is_better() {
            b.1.total_cmp(&a.1)
        } else {
            a.1.total_cmp(&b.1)
        };
        by_value.then_with(|| a.0.cmp(b.0))
    });
    ranked.truncate(LEADERBOARD_SIZE);
    ranked
}

fn pct(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.3}"),
        None => "-".to_string(),
    }
}

/// Full text report: standings, leaderboards, and the forecast.
pub fn render_text(league_name: &str, report: &AnalysisReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{league_name} ({}-game season)\n",
        report.total_scheduled_games
    );

    render_standings(&mut out, report);
    out.push('\n');
    render_leaders(&mut out, &report.metrics);
    out.push('\n');
    render_forecast(&mut out, report);
    out
}

fn render_standings(out: &mut String, report: &AnalysisReport) {
    let _ = writeln!(out, "STANDINGS");
    let _ = writeln!(
        out,
        "{:>4}  {:<12} {:>4} {:>4} {:>3} {:>6} {:>5} {:>6} {:>6} {:>7}",
        "Rank", "Team", "W", "L", "T", "PCT", "GB", "PYTH", "P(W)", "Proj W"
    );
    for s in &report.standings {
        let gb = if s.games_behind == 0.0 {
            "-".to_string()
        } else {
            format!("{:.1}", s.games_behind)
        };
        let _ = writeln!(
            out,
            "{:>4}  {:<12} {:>4} {:>4} {:>3} {:>6} {:>5} {:>6.3} {:>6.3} {:>7.1}",
            s.rank,
            s.name,
            s.wins,
            s.losses,
            s.ties,
            pct(s.win_pct),
            gb,
            s.pythagorean_win_pct,
            s.win_probability,
            s.projected_final_wins,
        );
    }
}

fn render_leaders(out: &mut String, metrics: &MetricsResult) {
    let _ = writeln!(out, "LEADERS");
    for stat in LeaderStat::ALL {
        let entries: Vec<String> = leaders(metrics, stat)
            .iter()
            .enumerate()
            .map(|(i, (name, v))| match stat {
                LeaderStat::Era | LeaderStat::Whip => format!("{}. {name} {v:.2}", i + 1),
                LeaderStat::Avg | LeaderStat::Ops => format!("{}. {name} {v:.3}", i + 1),
            })
            .collect();
        let line = if entries.is_empty() {
            "n/a".to_string()
        } else {
            entries.join("   ")
        };
        let _ = writeln!(out, "  {:<5} {line}", stat.label());
    }
}

fn render_forecast(out: &mut String, report: &AnalysisReport) {
    let forecast = &report.forecast;
    let _ = writeln!(
        out,
        "FORECAST ({} trials, top {} qualify, seed {})",
        forecast.trial_count, forecast.playoff_cutoff, forecast.seed
    );
    let _ = writeln!(
        out,
        "{:<12} {:>8} {:>8} {:>7}",
        "Team", "Title %", "PO %", "Exp W"
    );

    let mut teams: Vec<_> = forecast.teams.iter().collect();
    teams.sort_by(|a, b| {
        b.championship_probability
            .total_cmp(&a.championship_probability)
            .then_with(|| b.playoff_probability.total_cmp(&a.playoff_probability))
            .then_with(|| a.name.cmp(&b.name))
    });
    for t in teams {
        let _ = writeln!(
            out,
            "{:<12} {:>8.2} {:>8.2} {:>7.1}",
            t.name,
            t.championship_probability * 100.0,
            t.playoff_probability * 100.0,
            t.expected_final_wins,
        );
    }
}

/// The full report as pretty-printed JSON. Undefined metrics are `null`.
pub fn render_json(report: &AnalysisReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

/// Per-run league averages from the history log.
pub fn render_run_averages(runs: &[RunAverage]) -> String {
    if runs.is_empty() {
        return "No simulation history yet. Run `pennant run` first.\n".to_string();
    }
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>5}  {:<24} {:>6} {:>8} {:>12} {:>10}",
        "Run", "Recorded (UTC)", "Teams", "Trials", "Avg title %", "Avg PO %"
    );
    for r in runs {
        let _ = writeln!(
            out,
            "{:>5}  {:<24} {:>6} {:>8} {:>12.2} {:>10.2}",
            r.run_id,
            r.run_at.format("%Y-%m-%d %H:%M:%S"),
            r.team_count,
            r.trial_count,
            r.mean_championship_probability * 100.0,
            r.mean_playoff_probability * 100.0,
        );
    }
    out
}

/// One team's outlook across recorded runs.
pub fn render_team_history(team: &str, entries: &[HistoryEntry]) -> String {
    if entries.is_empty() {
        return format!("No recorded runs for '{team}'.\n");
    }
    let mut out = String::new();
    let _ = writeln!(out, "{team}");
    let _ = writeln!(
        out,
        "{:>5}  {:<24} {:>8} {:>8} {:>7}",
        "Run", "Recorded (UTC)", "Title %", "PO %", "Exp W"
    );
    for e in entries {
        let _ = writeln!(
            out,
            "{:>5}  {:<24} {:>8.2} {:>8.2} {:>7.1}",
            e.run_id,
            e.run_at.format("%Y-%m-%d %H:%M:%S"),
            e.championship_probability * 100.0,
            e.playoff_probability * 100.0,
            e.expected_final_wins,
        );
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
