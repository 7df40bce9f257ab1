// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use auric::{CancelToken, Error};
use clap::Parser;
use cli::Cli;
use std::process::ExitCode;
use tracing::{debug, error};

/// Exit status after an interrupt
const EXIT_INTERRUPTED: u8 = 130;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => match e.downcast_ref::<Error>() {
            Some(Error::Cancelled) => {
                eprintln!("interrupted");
                ExitCode::from(EXIT_INTERRUPTED)
            }
            // The reporter already printed the prompt's outcome
            Some(Error::Declined(_)) => ExitCode::FAILURE,
            _ => {
                error!("{:#}", e);
                eprintln!("error: {:#}", e);
                ExitCode::FAILURE
            }
        },
    }
}

fn run(cli: &Cli) -> Result<bool> {
    let op = cli.operation()?;
    debug!("operation: {:?}", op);

    let config = commands::load_config(cli)?;
    let cancel = CancelToken::new();
    let session = commands::Session::open(cli, op, &config, cancel.clone())?;

    // Builds run supervised: they poll the flag and unwind, dropping their
    // build directories and the lock. Outside one nothing polls, so release
    // the lock and leave right away.
    let lock = session.cache.lock_handle();
    ctrlc::set_handler(move || {
        cancel.cancel();
        if !cancel.is_supervising() {
            lock.release();
            eprintln!("\ninterrupted");
            std::process::exit(i32::from(EXIT_INTERRUPTED));
        }
    })
    .map_err(|e| anyhow::anyhow!("Failed to set Ctrl-C handler: {}", e))?;

    commands::dispatch(op, &session, &cli.targets)
}
