use clap::Parser;
use color_eyre::eyre::{eyre, Result};
use league_elo::competitor::Mode;
use league_elo::ledger::Ledger;
use league_elo::menu::Menu;
use league_elo::storage::WorkbookStorage;
use std::io;
use std::path::PathBuf;
use tracing::info;

/// ELO leaderboard for a singles or fixed-pair doubles league
#[derive(Parser)]
#[command(name = "league-elo", version)]
struct Args {
    /// Rate fixed pairs instead of individual players
    #[arg(long, env = "LEAGUE_DOUBLES")]
    doubles: bool,

    /// Workbook path; defaults to a per-mode file in the current directory
    #[arg(short, long, value_name = "FILE", env = "LEAGUE_FILE")]
    file: Option<PathBuf>,

    /// Skip writing the CSV and HTML leaderboards next to the workbook
    #[arg(long, env = "LEAGUE_NO_EXPORT")]
    no_export: bool,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, value_name = "LEVEL", env = "LEAGUE_LOG", default_value = "warn")]
    log_level: String,
}

fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| eyre!("failed to initialize logging: {e}"))
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    init_logging(&args.log_level)?;

    let mode = if args.doubles {
        Mode::Doubles
    } else {
        Mode::Singles
    };
    let path = args
        .file
        .unwrap_or_else(|| PathBuf::from(mode.default_file()));
    let storage = WorkbookStorage::new(path).with_export(!args.no_export);
    info!(path = %storage.path().display(), %mode, "opening league");

    let mut ledger = Ledger::open(storage, mode)?;
    Menu::new(&mut ledger, io::stdin().lock(), io::stdout().lock()).run()
}
