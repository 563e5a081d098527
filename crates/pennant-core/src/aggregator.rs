// Monte Carlo aggregation of season trials into championship and playoff odds.
//
// Trials are grouped into fixed-size chunks. Chunk `i` draws from its own
// ChaCha stream (base seed, stream `i`) and returns local counters; chunks run
// in parallel waves and are merged by integer summation. For a fixed seed and
// chunk size the result is identical regardless of thread count.

use std::ops::ControlFlow;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::error::AnalysisError;
use crate::simulator::SeasonSimulator;
use crate::team::TeamState;

pub const DEFAULT_TRIAL_COUNT: u64 = 10_000;
pub const DEFAULT_PLAYOFF_CUTOFF: usize = 5;
pub const DEFAULT_CHUNK_SIZE: u64 = 1_000;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationConfig {
    pub trial_count: u64,
    /// Teams ranked at or above this position in a trial make the playoffs.
    pub playoff_cutoff: usize,
    /// Base seed. `None` draws a fresh one per run.
    pub seed: Option<u64>,
    /// Trials per independently seeded chunk; also the progress granularity.
    pub chunk_size: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            trial_count: DEFAULT_TRIAL_COUNT,
            playoff_cutoff: DEFAULT_PLAYOFF_CUTOFF,
            seed: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self, team_count: usize) -> Result<(), AnalysisError> {
        if self.trial_count == 0 {
            return Err(AnalysisError::invalid_config("trial_count", "must be greater than 0"));
        }
        if self.chunk_size == 0 {
            return Err(AnalysisError::invalid_config("chunk_size", "must be greater than 0"));
        }
        if self.playoff_cutoff == 0 || self.playoff_cutoff > team_count {
            return Err(AnalysisError::invalid_config(
                "playoff_cutoff",
                format!(
                    "must be between 1 and the team count ({team_count}), got {}",
                    self.playoff_cutoff
                ),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

/// Per-team counters for a batch of trials. Only ever combined through
/// [`merge`](Self::merge); workers never share one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialCounts {
    pub trials: u64,
    pub championships: Vec<u64>,
    pub playoff_appearances: Vec<u64>,
    pub total_final_wins: Vec<u64>,
}

impl TrialCounts {
    pub fn zeroed(team_count: usize) -> Self {
        Self {
            trials: 0,
            championships: vec![0; team_count],
            playoff_appearances: vec![0; team_count],
            total_final_wins: vec![0; team_count],
        }
    }

    pub fn merge(mut self, other: TrialCounts) -> Self {
        self.trials += other.trials;
        for (a, b) in self.championships.iter_mut().zip(&other.championships) {
            *a += b;
        }
        for (a, b) in self.playoff_appearances.iter_mut().zip(&other.playoff_appearances) {
            *a += b;
        }
        for (a, b) in self.total_final_wins.iter_mut().zip(&other.total_final_wins) {
            *a += b;
        }
        self
    }
}

/// Reported after every parallel wave of chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SimulationProgress {
    pub completed_trials: u64,
    pub total_trials: u64,
}

impl SimulationProgress {
    pub fn fraction(&self) -> f64 {
        if self.total_trials == 0 {
            return 1.0;
        }
        self.completed_trials as f64 / self.total_trials as f64
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamOutlook {
    pub name: String,
    pub championships: u64,
    pub playoff_appearances: u64,
    pub championship_probability: f64,
    pub playoff_probability: f64,
    /// Mean simulated final win total.
    pub expected_final_wins: f64,
}

/// Forecast for every team, in the same order as the input teams.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    pub trial_count: u64,
    pub playoff_cutoff: usize,
    /// Base seed actually used; rerunning with it reproduces this result.
    pub seed: u64,
    pub teams: Vec<TeamOutlook>,
}

impl AggregateResult {
    pub fn get(&self, name: &str) -> Option<&TeamOutlook> {
        self.teams.iter().find(|t| t.name == name)
    }

    /// Sum of raw championship counts. Always equals `trial_count`.
    pub fn championship_total(&self) -> u64 {
        self.teams.iter().map(|t| t.championships).sum()
    }
}

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

pub struct OutcomeAggregator<'a> {
    simulator: SeasonSimulator<'a>,
    config: SimulationConfig,
    seed: u64,
    // Position of each team in lexicographic name order; breaks win ties.
    name_rank: Vec<usize>,
}

impl<'a> OutcomeAggregator<'a> {
    /// Validate the configuration against `teams` and fix the base seed.
    pub fn new(teams: &'a [TeamState], config: SimulationConfig) -> Result<Self, AnalysisError> {
        config.validate(teams.len())?;

        let mut by_name: Vec<usize> = (0..teams.len()).collect();
        by_name.sort_by(|&a, &b| teams[a].name.cmp(&teams[b].name));
        let mut name_rank = vec![0; teams.len()];
        for (rank, &idx) in by_name.iter().enumerate() {
            name_rank[idx] = rank;
        }

        Ok(Self {
            simulator: SeasonSimulator::new(teams),
            config,
            seed: config.seed.unwrap_or_else(rand::random),
            name_rank,
        })
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn chunk_count(&self) -> usize {
        self.config.trial_count.div_ceil(self.config.chunk_size) as usize
    }

    /// Run every trial without progress reporting.
    pub fn run(&self) -> AggregateResult {
        // The callback never breaks, so the run cannot abort.
        match self.run_with_progress(|_| ControlFlow::Continue(())) {
            Ok(result) => result,
            Err(_) => unreachable!("run without a cancelling callback cannot abort"),
        }
    }

    /// Run every trial, calling `on_progress` after each parallel wave of
    /// chunks. Returning `ControlFlow::Break` stops before the next wave.
    pub fn run_with_progress<F>(&self, mut on_progress: F) -> Result<AggregateResult, AnalysisError>
    where
        F: FnMut(SimulationProgress) -> ControlFlow<()>,
    {
        let team_count = self.simulator.teams().len();
        let chunk_count = self.chunk_count();
        let wave = rayon::current_num_threads().max(1);

        let mut totals = TrialCounts::zeroed(team_count);
        let mut next = 0;
        while next < chunk_count {
            let end = (next + wave).min(chunk_count);
            let wave_counts = (next..end)
                .into_par_iter()
                .map(|chunk| self.run_chunk(chunk))
                .reduce(|| TrialCounts::zeroed(team_count), TrialCounts::merge);
            totals = totals.merge(wave_counts);
            debug!(
                "simulated chunks {}..{} of {} ({} trials so far)",
                next, end, chunk_count, totals.trials
            );
            next = end;

            let progress = SimulationProgress {
                completed_trials: totals.trials,
                total_trials: self.config.trial_count,
            };
            if on_progress(progress).is_break() && next < chunk_count {
                return Err(AnalysisError::Aborted {
                    completed_trials: totals.trials,
                });
            }
        }

        Ok(self.finish(totals))
    }

    /// Run the trials of one chunk on that chunk's own random stream.
    pub fn run_chunk(&self, chunk: usize) -> TrialCounts {
        let teams = self.simulator.teams();
        let start = chunk as u64 * self.config.chunk_size;
        let end = (start + self.config.chunk_size).min(self.config.trial_count);

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        rng.set_stream(chunk as u64);

        let mut counts = TrialCounts::zeroed(teams.len());
        let mut final_wins = Vec::with_capacity(teams.len());
        let mut order: Vec<usize> = (0..teams.len()).collect();

        for _ in start..end {
            self.simulator.simulate_into(&mut rng, &mut final_wins);
            self.record_trial(&final_wins, &mut order, &mut counts);
        }
        counts
    }

    // Every team shares the same schedule length, so ordering by final wins
    // is ordering by final win percentage.
    fn record_trial(&self, final_wins: &[u32], order: &mut [usize], counts: &mut TrialCounts) {
        order.sort_unstable_by(|&a, &b| {
            final_wins[b]
                .cmp(&final_wins[a])
                .then(self.name_rank[a].cmp(&self.name_rank[b]))
        });

        counts.trials += 1;
        counts.championships[order[0]] += 1;
        for &idx in &order[..self.config.playoff_cutoff] {
            counts.playoff_appearances[idx] += 1;
        }
        for (total, &w) in counts.total_final_wins.iter_mut().zip(final_wins) {
            *total += w as u64;
        }
    }

    fn finish(&self, totals: TrialCounts) -> AggregateResult {
        let n = totals.trials as f64;
        let teams = self
            .simulator
            .teams()
            .iter()
            .enumerate()
            .map(|(i, team)| TeamOutlook {
                name: team.name.clone(),
                championships: totals.championships[i],
                playoff_appearances: totals.playoff_appearances[i],
                championship_probability: totals.championships[i] as f64 / n,
                playoff_probability: totals.playoff_appearances[i] as f64 / n,
                expected_final_wins: totals.total_final_wins[i] as f64 / n,
            })
            .collect();

        AggregateResult {
            trial_count: totals.trials,
            playoff_cutoff: self.config.playoff_cutoff,
            seed: self.seed,
            teams,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
