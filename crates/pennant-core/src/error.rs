// Error taxonomy for the analysis core.

use thiserror::Error;

/// Fatal errors raised while validating inputs or configuration, plus the
/// caller-initiated abort of a chunked simulation run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("malformed standings row for team `{team}`: {reason}")]
    MalformedStandingsRow { team: String, reason: String },

    #[error(
        "team sets differ: missing from standings {missing_from_standings:?}, \
         missing from stats {missing_from_stats:?}"
    )]
    TeamSetMismatch {
        missing_from_standings: Vec<String>,
        missing_from_stats: Vec<String>,
    },

    #[error("invalid configuration for `{field}`: {message}")]
    InvalidConfiguration { field: String, message: String },

    #[error("simulation aborted after {completed_trials} trials")]
    Aborted { completed_trials: u64 },
}

impl AnalysisError {
    pub(crate) fn malformed(team: &str, reason: impl Into<String>) -> Self {
        AnalysisError::MalformedStandingsRow {
            team: team.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_config(field: &str, message: impl Into<String>) -> Self {
        AnalysisError::InvalidConfiguration {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Non-fatal metric failure. Rate calculators turn this into a missing value
/// for the affected metric only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MetricError {
    #[error("{metric} is undefined: denominator is zero")]
    DivisionUndefined { metric: &'static str },
}
