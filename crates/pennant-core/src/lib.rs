// Season analytics core: rate stats, win-probability model, and the Monte
// Carlo season-outcome simulation. No I/O happens in this crate.

pub mod aggregator;
pub mod analysis;
pub mod error;
pub mod metrics;
pub mod simulator;
pub mod team;
pub mod win_prob;

pub use aggregator::{AggregateResult, OutcomeAggregator, SimulationConfig, SimulationProgress, TeamOutlook};
pub use analysis::{analyze, analyze_with_progress, AnalysisConfig, AnalysisReport, LeagueInput, TeamSummary};
pub use error::{AnalysisError, MetricError};
pub use metrics::{BattingLine, MetricsResult, PitchingLine, TeamMetrics};
pub use simulator::{SeasonSimulator, SimulationTrial};
pub use team::{build_team_states, StandingsRow, TeamState};
pub use win_prob::{BlendedPythagoreanModel, WinProbabilityModel};
