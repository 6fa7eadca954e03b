use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use poolgate_core::PoolgateConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "poolgate",
    about = "poolgate — progressive rollout of item pools",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Path to poolgate.toml (defaults apply when the file is missing)
    #[arg(short, long, global = true, default_value = "poolgate.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a poolgate.toml scaffold
    Init {
        /// Directory for state, backups and market data
        #[arg(long, default_value = "data")]
        data_root: PathBuf,
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
    /// Start a rollout from the current pool to a new one.
    ///
    /// Item files are either a JSON array of codes or one code per line
    /// (blank lines and `#` comments are ignored).
    Start {
        /// File with the pool that is live today
        #[arg(long)]
        original: PathBuf,
        /// File with the pool to roll out
        #[arg(long)]
        target: PathBuf,
        /// Let `tick` advance automatically once gates pass
        #[arg(long)]
        auto_advance: bool,
    },
    /// Try to move to the next phase
    Advance,
    /// Advance only if auto-advance is enabled (for schedulers)
    Tick,
    /// Stop phase progression
    Pause,
    /// Resume a paused rollout
    Resume,
    /// Revert the live pool to the baseline
    Rollback {
        #[arg(short, long, default_value = "manual rollback")]
        reason: String,
    },
    /// Record an outcome for the current phase
    Record {
        #[command(subcommand)]
        outcome: Outcome,
    },
    /// Set quality scores for the current phase
    Metrics {
        #[arg(long)]
        data_quality: Option<f64>,
        #[arg(long)]
        performance: Option<f64>,
        #[arg(long)]
        feedback: Option<f64>,
    },
    /// Print the live item set, one code per line
    Active {
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
    /// Show rollout progress
    Status {
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
    /// Print a rollout report
    Report {
        #[arg(value_enum, default_value_t = ReportKind::Progress)]
        kind: ReportKind,
    },
    /// Run the phase checks against the live pool
    Validate {
        /// Override the market data directory from poolgate.toml
        #[arg(long)]
        data_dir: Option<PathBuf>,
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
    /// List baseline snapshots
    Baselines,
}

#[derive(Subcommand)]
enum Outcome {
    /// A successful run against the live pool
    Success,
    /// A failed run; counts towards automatic rollback
    Error { message: String },
    /// A warning; counted but not gated on
    Warning,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Format {
    Text,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ReportKind {
    Progress,
    Phase,
    Summary,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("poolgate=info".parse()?)
        )
        .with_writer(std::io::stderr)
        .init();

    run(Cli::parse())
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let Cli {
        config: config_path,
        command,
    } = cli;
    let config = || PoolgateConfig::load_or_default(&config_path);

    match command {
        Commands::Init { data_root, force } => {
            commands::init::init(&config_path, &data_root, force)
        }
        Commands::Start {
            original,
            target,
            auto_advance,
        } => commands::rollout::start(&config()?, &original, &target, auto_advance),
        Commands::Advance => commands::rollout::advance(&config()?),
        Commands::Tick => commands::rollout::tick(&config()?),
        Commands::Pause => commands::rollout::pause(&config()?),
        Commands::Resume => commands::rollout::resume(&config()?),
        Commands::Rollback { reason } => commands::rollout::rollback(&config()?, &reason),
        Commands::Record { outcome } => match outcome {
            Outcome::Success => commands::rollout::record_success(&config()?),
            Outcome::Error { message } => commands::rollout::record_error(&config()?, &message),
            Outcome::Warning => commands::rollout::record_warning(&config()?),
        },
        Commands::Metrics {
            data_quality,
            performance,
            feedback,
        } => commands::rollout::metrics(&config()?, data_quality, performance, feedback),
        Commands::Active { format } => commands::inspect::active(&config()?, format),
        Commands::Status { format } => commands::inspect::status(&config()?, format),
        Commands::Report { kind } => commands::inspect::report(&config()?, kind),
        Commands::Validate { data_dir, format } => {
            commands::inspect::validate(&config()?, data_dir, format)
        }
        Commands::Baselines => commands::inspect::baselines(&config()?),
    }
}
