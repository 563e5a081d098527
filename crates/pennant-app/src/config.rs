// Configuration loading and parsing (league.toml, simulation.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use pennant_core::AnalysisConfig;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub league: LeagueConfig,
    pub simulation: SimulationSection,
    pub model: ModelSection,
    pub db_path: String,
    pub data_paths: DataPaths,
}

impl Config {
    /// The core's view of this configuration.
    pub fn analysis_config(&self) -> AnalysisConfig {
        AnalysisConfig {
            total_scheduled_games: self.league.total_scheduled_games,
            pythagorean_exponent: self.model.pythagorean_exponent,
            trial_count: self.simulation.trial_count,
            playoff_cutoff: self.league.playoff_cutoff,
            random_seed: self.simulation.seed,
            chunk_size: self.simulation.chunk_size,
            min_games_for_pythagorean: self.model.min_games_for_pythagorean,
            pythagorean_weight: self.model.pythagorean_weight,
        }
    }
}

// ---------------------------------------------------------------------------
// league.toml structs
// ---------------------------------------------------------------------------

/// Wrapper for the top-level `[league]` table in league.toml.
#[derive(Debug, Clone, Deserialize)]
struct LeagueFile {
    league: LeagueConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeagueConfig {
    pub name: String,
    pub total_scheduled_games: u32,
    #[serde(default = "default_playoff_cutoff")]
    pub playoff_cutoff: usize,
}

fn default_playoff_cutoff() -> usize {
    pennant_core::aggregator::DEFAULT_PLAYOFF_CUTOFF
}

// ---------------------------------------------------------------------------
// simulation.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire simulation.toml file.
#[derive(Debug, Clone, Deserialize)]
struct SimulationFile {
    simulation: SimulationSection,
    #[serde(default)]
    model: ModelSection,
    database: DatabaseSection,
    data_paths: DataPaths,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationSection {
    #[serde(default = "default_trial_count")]
    pub trial_count: u64,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
    /// Fixed base seed for reproducible runs; omit for a fresh seed each run.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_trial_count() -> u64 {
    pennant_core::aggregator::DEFAULT_TRIAL_COUNT
}

fn default_chunk_size() -> u64 {
    pennant_core::aggregator::DEFAULT_CHUNK_SIZE
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelSection {
    pub pythagorean_exponent: f64,
    pub min_games_for_pythagorean: u32,
    pub pythagorean_weight: f64,
}

impl Default for ModelSection {
    fn default() -> Self {
        let defaults = AnalysisConfig::default();
        Self {
            pythagorean_exponent: defaults.pythagorean_exponent,
            min_games_for_pythagorean: defaults.min_games_for_pythagorean,
            pythagorean_weight: defaults.pythagorean_weight,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseSection {
    path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataPaths {
    pub standings: String,
    pub batting: String,
    pub pitching: String,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/league.toml` and
/// `config/simulation.toml`, both relative to the given `base_dir`.
///
/// This is the lower-level loading primitive that does not auto-copy defaults.
/// Prefer `load_config()` which handles default initialization automatically.
pub(crate) fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- league.toml (required) ---
    let league_path = config_dir.join("league.toml");
    let league_text = read_file(&league_path)?;
    let league_file: LeagueFile =
        toml::from_str(&league_text).map_err(|e| ConfigError::ParseError {
            path: league_path.clone(),
            source: e,
        })?;

    // --- simulation.toml (required) ---
    let simulation_path = config_dir.join("simulation.toml");
    let simulation_text = read_file(&simulation_path)?;
    let simulation_file: SimulationFile =
        toml::from_str(&simulation_text).map_err(|e| ConfigError::ParseError {
            path: simulation_path.clone(),
            source: e,
        })?;

    let config = Config {
        league: league_file.league,
        simulation: simulation_file.simulation,
        model: simulation_file.model,
        db_path: simulation_file.database.path,
        data_paths: simulation_file.data_paths,
    };

    validate(&config)?;

    Ok(config)
}

/// Config files the app reads from `config/`, each shipped under `defaults/`.
pub const CONFIG_FILES: [&str; 2] = ["league.toml", "simulation.toml"];

/// Install any of [`CONFIG_FILES`] missing from `config/` using the shipped
/// copy in `defaults/`. Files already in `config/` are never touched.
///
/// Returns the paths that were installed.
pub fn install_default_config(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    let missing: Vec<&str> = CONFIG_FILES
        .iter()
        .copied()
        .filter(|name| !config_dir.join(name).is_file())
        .collect();
    if missing.is_empty() {
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("cannot create {}: {e}", config_dir.display()),
    })?;

    let mut installed = Vec::with_capacity(missing.len());
    for name in missing {
        let source = defaults_dir.join(name);
        if !source.is_file() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "config/{name} is missing and no shipped default exists at {}",
                    source.display()
                ),
            });
        }
        let target = config_dir.join(name);
        std::fs::copy(&source, &target).map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("cannot install {}: {e}", target.display()),
        })?;
        installed.push(target);
    }

    Ok(installed)
}

/// Convenience wrapper: loads config relative to the current working directory.
/// Installs any missing config files from `defaults/` first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    install_default_config(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.league.total_scheduled_games == 0 {
        return Err(ConfigError::ValidationError {
            field: "league.total_scheduled_games".into(),
            message: "must be greater than 0".into(),
        });
    }

    // The upper bound depends on the team count and is checked by the core.
    if config.league.playoff_cutoff == 0 {
        return Err(ConfigError::ValidationError {
            field: "league.playoff_cutoff".into(),
            message: "must be greater than 0".into(),
        });
    }

    let sim = &config.simulation;
    let count_fields: &[(&str, u64)] = &[
        ("simulation.trial_count", sim.trial_count),
        ("simulation.chunk_size", sim.chunk_size),
    ];
    for (name, val) in count_fields {
        if *val == 0 {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: "must be > 0".into(),
            });
        }
    }

    let exp = config.model.pythagorean_exponent;
    if !(exp.is_finite() && exp > 0.0) {
        return Err(ConfigError::ValidationError {
            field: "model.pythagorean_exponent".into(),
            message: format!("must be > 0, got {exp}"),
        });
    }

    let weight = config.model.pythagorean_weight;
    if !(0.0..=1.0).contains(&weight) {
        return Err(ConfigError::ValidationError {
            field: "model.pythagorean_weight".into(),
            message: format!("must be between 0.0 and 1.0 inclusive, got {weight}"),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
