//! orgmate CLI entry point

use anyhow::Result;
use clap::Parser;
use orgmate::{App, Config};
use std::io::{self, IsTerminal};
use std::path::PathBuf;

/// orgmate - hierarchical task tracker
///
/// Reads commands from stdin; type `help` for the command list.
#[derive(Parser, Debug)]
#[command(name = "orgmate")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Discard stored tasks and aliases
    #[arg(long)]
    clear: bool,

    /// Data file (overrides the config)
    #[arg(long, env = "ORGMATE_DATA")]
    data: Option<PathBuf>,

    /// Config file (defaults to <config_dir>/orgmate/config.yml)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logger
    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    log::debug!("orgmate v{}", env!("CARGO_PKG_VERSION"));

    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };
    let data_file = args.data.clone().unwrap_or_else(|| config.data_file());

    let stdin = io::stdin();
    let interactive = stdin.is_terminal();
    let mut app = App::open(&config, &data_file, args.clear, io::stdout().lock())?
        .interactive(interactive);
    app.run(stdin.lock())?;
    app.save()
}
