// Single-game win probability model.

use crate::metrics::{clamp_probability, pythagorean_win_pct, DEFAULT_PYTHAGOREAN_EXPONENT};

/// Default number of decided games before the Pythagorean estimate is trusted.
pub const DEFAULT_MIN_GAMES_FOR_PYTHAGOREAN: u32 = 10;

/// A team's record to date, as seen by a win-probability model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordToDate {
    pub wins: u32,
    pub losses: u32,
    pub runs_scored: u32,
    pub runs_allowed: u32,
}

impl RecordToDate {
    /// Decided games (ties excluded).
    pub fn decisions(&self) -> u32 {
        self.wins + self.losses
    }

    /// `wins / (wins + losses)`, or `None` before the first decision.
    pub fn actual_win_pct(&self) -> Option<f64> {
        match self.decisions() {
            0 => None,
            n => Some(self.wins as f64 / n as f64),
        }
    }
}

/// Maps a record to the probability of winning any single future game.
///
/// The simulator treats the result as an opaque per-team scalar, so any
/// implementation can be swapped in without touching it. Callers clamp the
/// result into (0, 1).
pub trait WinProbabilityModel: Send + Sync {
    fn win_probability(&self, record: &RecordToDate) -> f64;
}

/// Pythagorean expectation blended with actual win percentage.
///
/// - no decisions yet: 0.5
/// - fewer than `min_games` decisions: actual win percentage
/// - otherwise: `weight * pythagorean + (1 - weight) * actual`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendedPythagoreanModel {
    pub exponent: f64,
    pub min_games: u32,
    pub pythagorean_weight: f64,
}

impl Default for BlendedPythagoreanModel {
    fn default() -> Self {
        Self {
            exponent: DEFAULT_PYTHAGOREAN_EXPONENT,
            min_games: DEFAULT_MIN_GAMES_FOR_PYTHAGOREAN,
            pythagorean_weight: 1.0,
        }
    }
}

impl WinProbabilityModel for BlendedPythagoreanModel {
    fn win_probability(&self, record: &RecordToDate) -> f64 {
        let Some(actual) = record.actual_win_pct() else {
            return 0.5;
        };
        if record.decisions() < self.min_games {
            return clamp_probability(actual);
        }
        let pythag = pythagorean_win_pct(record.runs_scored, record.runs_allowed, self.exponent);
        let w = self.pythagorean_weight;
        clamp_probability(w * pythag + (1.0 - w) * actual)
    }
}

/// A model that returns the same probability for every team. Handy for
/// isolating the simulator from run-differential noise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedProbability(pub f64);

impl WinProbabilityModel for FixedProbability {
    fn win_probability(&self, _record: &RecordToDate) -> f64 {
        self.0
    }
}
