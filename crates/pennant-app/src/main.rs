// Pennant entry point.
//
// Run sequence:
// 1. Initialize tracing (log to file, stdout is the report)
// 2. Load config, apply command-line overrides
// 3. Open the history database
// 4. Load standings and team stats
// 5. Run the forecast on the blocking pool (Ctrl-C cancels between waves)
// 6. Record the forecast in the history log
// 7. Print the report

use clap::{Parser, Subcommand};
use pennant_app::{config, db, input, pipeline, report};
use pennant_core::team::normalize_team_name;

use anyhow::Context;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "pennant")]
#[command(about = "Season standings, team metrics and title odds", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze the configured CSV files and forecast the season (default)
    Run(RunArgs),

    /// Show the simulation history log
    History {
        /// Show one team's odds across runs instead of per-run averages
        team: Option<String>,
    },
}

#[derive(clap::Args)]
struct RunArgs {
    /// Print the full report as JSON
    #[arg(long)]
    json: bool,

    /// Base seed for a reproducible forecast
    #[arg(long)]
    seed: Option<u64>,

    /// Number of simulated seasons
    #[arg(long)]
    trials: Option<u64>,

    /// Do not append this run to the history log
    #[arg(long)]
    no_record: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 1. Initialize tracing
    init_tracing()?;
    info!("pennant starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: league={}, {} games, top {} qualify",
        config.league.name, config.league.total_scheduled_games, config.league.playoff_cutoff
    );

    // 3. Open database
    let db = db::Database::open(&config.db_path).context("failed to open database")?;
    info!("Database opened at {}", config.db_path);

    let result = match cli.command {
        Some(Command::History { team }) => show_history(&db, team.as_deref()),
        Some(Command::Run(args)) => run(&config, &db, args).await,
        None => run(&config, &db, cli.run).await,
    };

    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}

async fn run(config: &config::Config, db: &db::Database, args: RunArgs) -> anyhow::Result<()> {
    let mut analysis_config = config.analysis_config();
    if let Some(seed) = args.seed {
        analysis_config.random_seed = Some(seed);
    }
    if let Some(trials) = args.trials {
        analysis_config.trial_count = trials;
    }

    // 4. Load league tables
    let league = input::load_all(config).context("failed to load league tables")?;
    info!(
        "Loaded {} standings rows, {} batting lines, {} pitching lines",
        league.standings.len(),
        league.batting.len(),
        league.pitching.len()
    );

    // 5. Forecast
    let cancel = pipeline::CancelFlag::new();
    let interrupt = pipeline::cancel_on_ctrl_c(cancel.clone());
    let outcome = pipeline::run_forecast(league, analysis_config, cancel).await;
    interrupt.abort();
    let analysis = outcome.context("season analysis failed")?;

    // 6. Record history
    if !args.no_record {
        let run_id = db
            .record_run(&analysis.forecast)
            .context("failed to record simulation history")?;
        info!("Recorded forecast as run {}", run_id);
    }

    // 7. Print report
    if args.json {
        let json = report::render_json(&analysis).context("failed to serialize report")?;
        println!("{json}");
    } else {
        print!("{}", report::render_text(&config.league.name, &analysis));
    }

    info!("pennant finished");
    Ok(())
}

fn show_history(db: &db::Database, team: Option<&str>) -> anyhow::Result<()> {
    match team {
        Some(team) => {
            let team = normalize_team_name(team);
            let entries = db.team_history(&team).context("failed to load team history")?;
            print!("{}", report::render_team_history(&team, &entries));
        }
        None => {
            let runs = db.run_averages().context("failed to load run averages")?;
            print!("{}", report::render_run_averages(&runs));
        }
    }
    Ok(())
}

/// Initialize tracing to log to a file (stdout carries the report).
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("pennant.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("pennant=info,pennant_app=info,pennant_core=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
