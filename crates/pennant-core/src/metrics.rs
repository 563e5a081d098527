// Rate statistics and Pythagorean win expectation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::MetricError;

/// Historically tuned Pythagorean exponent for baseball run environments.
pub const DEFAULT_PYTHAGOREAN_EXPONENT: f64 = 1.83;

/// Lower bound applied to anything that will later be used as a single-game
/// win probability. The upper bound is `1.0 - PROBABILITY_FLOOR`.
pub const PROBABILITY_FLOOR: f64 = 0.001;

// ---------------------------------------------------------------------------
// Raw counting stats
// ---------------------------------------------------------------------------

/// Team batting counting stats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BattingLine {
    pub at_bats: u32,
    pub hits: u32,
    pub walks: u32,
    pub hit_by_pitch: u32,
    pub sacrifice_flies: u32,
    pub total_bases: u32,
}

/// Team pitching counting stats. `innings_pitched` is a true decimal
/// (`123 2/3` innings is `123.667`), not box-score shorthand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PitchingLine {
    pub innings_pitched: f64,
    pub earned_runs: u32,
    pub hits_allowed: u32,
    pub walks_allowed: u32,
}

// ---------------------------------------------------------------------------
// Derived rates
// ---------------------------------------------------------------------------

/// Batting rate stats. `None` means the metric is undefined for this team.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BattingRates {
    pub avg: Option<f64>,
    pub obp: Option<f64>,
    pub slg: Option<f64>,
    pub ops: Option<f64>,
}

/// Pitching rate stats. `None` means the metric is undefined for this team.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PitchingRates {
    pub era: Option<f64>,
    pub whip: Option<f64>,
}

/// Divide, reporting a zero (or non-finite) denominator as `DivisionUndefined`.
pub fn ratio(metric: &'static str, numerator: f64, denominator: f64) -> Result<f64, MetricError> {
    if denominator == 0.0 || !denominator.is_finite() {
        return Err(MetricError::DivisionUndefined { metric });
    }
    Ok(numerator / denominator)
}

/// AVG, OBP, SLG and OPS from counting stats.
///
/// OPS is defined only when both OBP and SLG are.
pub fn batting_rates(line: &BattingLine) -> BattingRates {
    let ab = line.at_bats as f64;
    let (h, bb, hbp, sf) = (
        line.hits as f64,
        line.walks as f64,
        line.hit_by_pitch as f64,
        line.sacrifice_flies as f64,
    );
    let on_base = h + bb + hbp;
    let obp_den = ab + bb + hbp + sf;

    let avg = ratio("AVG", line.hits as f64, ab).ok();
    let obp = ratio("OBP", on_base, obp_den).ok();
    let slg = ratio("SLG", line.total_bases as f64, ab).ok();
    let ops = match (obp, slg) {
        (Some(o), Some(s)) => Some(o + s),
        _ => None,
    };

    BattingRates { avg, obp, slg, ops }
}

/// ERA and WHIP from counting stats.
pub fn pitching_rates(line: &PitchingLine) -> PitchingRates {
    let ip = line.innings_pitched;
    let era = ratio("ERA", line.earned_runs as f64 * 9.0, ip).ok();
    let baserunners = line.hits_allowed as f64 + line.walks_allowed as f64;
    let whip = ratio("WHIP", baserunners, ip).ok();
    PitchingRates { era, whip }
}

// ---------------------------------------------------------------------------
// League-wide metrics
// ---------------------------------------------------------------------------

/// Display metrics for one team.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TeamMetrics {
    pub batting: BattingRates,
    pub pitching: PitchingRates,
}

impl TeamMetrics {
    /// Names of the metrics that could not be computed.
    pub fn undefined(&self) -> Vec<&'static str> {
        let b = &self.batting;
        let p = &self.pitching;
        [
            ("AVG", b.avg),
            ("OBP", b.obp),
            ("SLG", b.slg),
            ("OPS", b.ops),
            ("ERA", p.era),
            ("WHIP", p.whip),
        ]
        .into_iter()
        .filter(|(_, v)| v.is_none())
        .map(|(name, _)| name)
        .collect()
    }
}

/// Rate stats for every team, keyed by team name.
pub type MetricsResult = BTreeMap<String, TeamMetrics>;

/// Compute rate stats for every team appearing in either table.
///
/// A team with an undefined metric (zero denominator) gets `None` for that
/// metric only; every other metric and team is still computed. A team
/// missing from one table gets all of that table's metrics undefined.
pub fn league_metrics(
    batting: &BTreeMap<String, BattingLine>,
    pitching: &BTreeMap<String, PitchingLine>,
) -> MetricsResult {
    let mut result = MetricsResult::new();
    for name in batting.keys().chain(pitching.keys()) {
        if result.contains_key(name) {
            continue;
        }
        let metrics = TeamMetrics {
            batting: batting.get(name).map(batting_rates).unwrap_or_default(),
            pitching: pitching.get(name).map(pitching_rates).unwrap_or_default(),
        };
        let undefined = metrics.undefined();
        if !undefined.is_empty() {
            warn!("{name}: undefined metrics {}", undefined.join(", "));
        }
        result.insert(name.clone(), metrics);
    }
    result
}

// ---------------------------------------------------------------------------
// Pythagorean expectation
// ---------------------------------------------------------------------------

/// `RS^x / (RS^x + RA^x)`, clamped into `[PROBABILITY_FLOOR, 1 - PROBABILITY_FLOOR]`.
///
/// Equal run totals (including 0-0) return exactly 0.5. Evaluated as
/// `1 / (1 + (RA/RS)^x)` so large exponents saturate instead of overflowing.
pub fn pythagorean_win_pct(runs_scored: u32, runs_allowed: u32, exponent: f64) -> f64 {
    if runs_scored == runs_allowed {
        return 0.5;
    }
    if runs_scored == 0 {
        return PROBABILITY_FLOOR;
    }
    let ratio = runs_allowed as f64 / runs_scored as f64;
    clamp_probability(1.0 / (1.0 + ratio.powf(exponent)))
}

/// Pull a probability strictly inside (0, 1).
pub fn clamp_probability(p: f64) -> f64 {
    if !p.is_finite() {
        return 0.5;
    }
    p.clamp(PROBABILITY_FLOOR, 1.0 - PROBABILITY_FLOOR)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    fn sample_batting() -> BattingLine {
        BattingLine {
            at_bats: 4000,
            hits: 1080,
            walks: 400,
            hit_by_pitch: 50,
            sacrifice_flies: 30,
            total_bases: 1640,
        }
    }

    #[test]
    fn batting_rates_basic() {
        let rates = batting_rates(&sample_batting());
        assert!(approx_eq(rates.avg.unwrap(), 0.270, 1e-12));
        // (1080 + 400 + 50) / (4000 + 400 + 50 + 30)
        assert!(approx_eq(rates.obp.unwrap(), 1530.0 / 4480.0, 1e-12));
        assert!(approx_eq(rates.slg.unwrap(), 0.410, 1e-12));
        assert!(approx_eq(
            rates.ops.unwrap(),
            rates.obp.unwrap() + rates.slg.unwrap(),
            1e-12
        ));
    }

    #[test]
    fn zero_at_bats_leaves_avg_and_slg_undefined() {
        let line = BattingLine {
            at_bats: 0,
            walks: 5,
            ..BattingLine::default()
        };
        let rates = batting_rates(&line);
        assert_eq!(rates.avg, None);
        assert_eq!(rates.slg, None);
        assert_eq!(rates.ops, None);
        // OBP still has plate appearances from walks
        assert!(approx_eq(rates.obp.unwrap(), 1.0, 1e-12));
    }

    #[test]
    fn empty_batting_line_is_all_undefined() {
        let rates = batting_rates(&BattingLine::default());
        assert_eq!(rates, BattingRates::default());
    }

    #[test]
    fn pitching_rates_basic() {
        let line = PitchingLine {
            innings_pitched: 1000.0,
            earned_runs: 400,
            hits_allowed: 950,
            walks_allowed: 350,
        };
        let rates = pitching_rates(&line);
        assert!(approx_eq(rates.era.unwrap(), 3.6, 1e-12));
        assert!(approx_eq(rates.whip.unwrap(), 1.3, 1e-12));
    }

    #[test]
    fn pitching_rates_with_fractional_innings() {
        let line = PitchingLine {
            innings_pitched: 8.0 + 2.0 / 3.0,
            earned_runs: 3,
            hits_allowed: 7,
            walks_allowed: 1,
        };
        let rates = pitching_rates(&line);
        assert!(approx_eq(rates.era.unwrap(), 27.0 / (26.0 / 3.0), 1e-12));
    }

    #[test]
    fn zero_innings_leaves_pitching_undefined() {
        let line = PitchingLine {
            earned_runs: 2,
            ..PitchingLine::default()
        };
        assert_eq!(pitching_rates(&line), PitchingRates::default());
    }

    #[test]
    fn ratio_reports_division_undefined() {
        assert_eq!(
            ratio("AVG", 1.0, 0.0),
            Err(MetricError::DivisionUndefined { metric: "AVG" })
        );
        assert_eq!(ratio("AVG", 1.0, 4.0), Ok(0.25));
    }

    #[test]
    fn league_metrics_isolates_undefined_team() {
        let mut batting = BTreeMap::new();
        batting.insert("Bears".to_string(), sample_batting());
        batting.insert("Empty".to_string(), BattingLine::default());
        let mut pitching = BTreeMap::new();
        pitching.insert(
            "Bears".to_string(),
            PitchingLine {
                innings_pitched: 900.0,
                earned_runs: 380,
                hits_allowed: 880,
                walks_allowed: 300,
            },
        );
        pitching.insert(
            "Empty".to_string(),
            PitchingLine {
                innings_pitched: 9.0,
                earned_runs: 1,
                hits_allowed: 5,
                walks_allowed: 1,
            },
        );

        let result = league_metrics(&batting, &pitching);
        assert_eq!(result.len(), 2);

        let empty = &result["Empty"];
        assert_eq!(empty.batting.avg, None);
        assert_eq!(empty.undefined(), vec!["AVG", "OBP", "SLG", "OPS"]);
        assert!(approx_eq(empty.pitching.era.unwrap(), 1.0, 1e-12));

        let bears = &result["Bears"];
        assert!(approx_eq(bears.batting.avg.unwrap(), 0.270, 1e-12));
        assert!(bears.undefined().is_empty());
    }

    #[test]
    fn league_metrics_team_missing_from_one_table() {
        let mut batting = BTreeMap::new();
        batting.insert("Solo".to_string(), sample_batting());
        let result = league_metrics(&batting, &BTreeMap::new());
        assert_eq!(result["Solo"].pitching, PitchingRates::default());
        assert!(result["Solo"].batting.avg.is_some());
    }

    #[test]
    fn pythagorean_equal_runs_is_exactly_half() {
        assert_eq!(pythagorean_win_pct(500, 500, DEFAULT_PYTHAGOREAN_EXPONENT), 0.5);
        assert_eq!(pythagorean_win_pct(0, 0, DEFAULT_PYTHAGOREAN_EXPONENT), 0.5);
    }

    #[test]
    fn pythagorean_known_value() {
        // exponent 2: 600^2 / (600^2 + 500^2) = 360000 / 610000
        let p = pythagorean_win_pct(600, 500, 2.0);
        assert!(approx_eq(p, 360_000.0 / 610_000.0, 1e-12));
    }

    #[test]
    fn pythagorean_is_symmetric() {
        let a = pythagorean_win_pct(650, 540, DEFAULT_PYTHAGOREAN_EXPONENT);
        let b = pythagorean_win_pct(540, 650, DEFAULT_PYTHAGOREAN_EXPONENT);
        assert!(approx_eq(a + b, 1.0, 1e-12));
        assert!(a > 0.5);
    }

    #[test]
    fn pythagorean_shutout_is_clamped() {
        let p = pythagorean_win_pct(0, 40, DEFAULT_PYTHAGOREAN_EXPONENT);
        assert_eq!(p, PROBABILITY_FLOOR);
        let q = pythagorean_win_pct(40, 0, DEFAULT_PYTHAGOREAN_EXPONENT);
        assert_eq!(q, 1.0 - PROBABILITY_FLOOR);
    }

    #[test]
    fn pythagorean_large_exponent_saturates() {
        let p = pythagorean_win_pct(600, 500, 400.0);
        assert_eq!(p, 1.0 - PROBABILITY_FLOOR);
        let q = pythagorean_win_pct(500, 600, 400.0);
        assert_eq!(q, PROBABILITY_FLOOR);
        let r = pythagorean_win_pct(u32::MAX, u32::MAX - 1, 1000.0);
        assert!(r > 0.5 && r.is_finite());
    }

    #[test]
    fn counting_stats_near_u32_max_do_not_overflow() {
        let line = BattingLine {
            at_bats: u32::MAX - 5,
            hits: u32::MAX - 10,
            walks: 10,
            hit_by_pitch: u32::MAX,
            sacrifice_flies: u32::MAX,
            total_bases: u32::MAX,
        };
        let rates = batting_rates(&line);
        let ab = (u32::MAX - 5) as f64;
        let on_base = (u32::MAX - 10) as f64 + 10.0 + u32::MAX as f64;
        let obp_den = ab + 10.0 + 2.0 * u32::MAX as f64;
        assert!(approx_eq(rates.obp.unwrap(), on_base / obp_den, 1e-12));
        assert!(rates.avg.unwrap() < 1.0);

        let pitching = PitchingLine {
            innings_pitched: 1.0,
            earned_runs: u32::MAX,
            hits_allowed: u32::MAX,
            walks_allowed: u32::MAX,
        };
        let rates = pitching_rates(&pitching);
        assert_eq!(rates.whip.unwrap(), 2.0 * u32::MAX as f64);
        assert_eq!(rates.era.unwrap(), 9.0 * u32::MAX as f64);
    }

    #[test]
    fn clamp_probability_handles_nan() {
        assert_eq!(clamp_probability(f64::NAN), 0.5);
        assert_eq!(clamp_probability(0.0), PROBABILITY_FLOOR);
        assert_eq!(clamp_probability(0.37), 0.37);
    }
}
