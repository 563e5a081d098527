// One stochastic remainder-of-season trial.
//
// Modeling choice: every team's remaining games are resolved independently
// from its own win probability. There is no opponent pairing, so a simulated
// win for one team is not a simulated loss for another. League-wide win
// totals therefore only balance in expectation, not per trial.

use rand::Rng;
use rand_distr::{Binomial, Distribution};

use crate::metrics::clamp_probability;
use crate::team::TeamState;

/// Simulated final win totals, indexed like the team slice the simulator was
/// built from. Produced once per trial and discarded after aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationTrial {
    pub final_wins: Vec<u32>,
}

/// Resolves remaining schedules for a fixed, read-only set of teams.
///
/// Holds no mutable state, so a single simulator can be shared by any number
/// of workers as long as each brings its own RNG.
#[derive(Debug, Clone)]
pub struct SeasonSimulator<'a> {
    teams: &'a [TeamState],
    // `None` when the team has no games left; such a team never touches the RNG.
    remaining: Vec<Option<Binomial>>,
}

impl<'a> SeasonSimulator<'a> {
    pub fn new(teams: &'a [TeamState]) -> Self {
        let remaining = teams
            .iter()
            .map(|t| {
                if t.games_remaining == 0 {
                    return None;
                }
                // Fields are public, so pull p back into (0, 1) before use.
                let p = clamp_probability(t.win_probability);
                Some(
                    Binomial::new(t.games_remaining as u64, p)
                        .expect("clamped win probability is a valid binomial parameter"),
                )
            })
            .collect();
        Self { teams, remaining }
    }

    pub fn teams(&self) -> &'a [TeamState] {
        self.teams
    }

    /// Run one trial: current wins plus the number of successes in
    /// `games_remaining` Bernoulli draws at the team's win probability.
    pub fn simulate_trial<R: Rng + ?Sized>(&self, rng: &mut R) -> SimulationTrial {
        let mut final_wins = Vec::with_capacity(self.teams.len());
        self.simulate_into(rng, &mut final_wins);
        SimulationTrial { final_wins }
    }

    /// Allocation-free variant of [`simulate_trial`](Self::simulate_trial)
    /// for hot loops: clears and refills `out`.
    pub fn simulate_into<R: Rng + ?Sized>(&self, rng: &mut R, out: &mut Vec<u32>) {
        out.clear();
        for (team, dist) in self.teams.iter().zip(&self.remaining) {
            let extra = match dist {
                Some(binomial) => binomial.sample(rng) as u32,
                None => 0,
            };
            out.push(team.wins + extra);
        }
    }
}
