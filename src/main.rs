//! SDK installer - self-extracting SDK installer
//!
//! Checks that the host can run the bundled SDK, streams the SDK archive out
//! of the installer payload into the chosen directory, and rewrites the
//! generated environment scripts so the SDK works from that location.

use clap::Parser;
use miette::Diagnostic;
use tracing_subscriber::EnvFilter;

mod cli;
mod command;
mod compat;
mod config;
mod driver;
mod env;
mod error;
mod extract;
mod hooks;
mod payload;
mod progress;
mod prompt;
mod relocate;
mod session;
mod temp;

use cli::Cli;
use compat::SystemProbe;
use driver::Installer;
use error::{InstallerError, Result};
use hooks::ShellHookRunner;
use payload::PayloadContainer;
use prompt::InteractivePrompter;

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let payload = match &cli.payload {
        Some(path) => path.clone(),
        None => std::env::current_exe()?,
    };
    let mut container = PayloadContainer::open(&payload)?;
    tracing::info!("Using payload '{}'", container.path().display());
    let mut hooks = ShellHookRunner::from_container(&mut container)?;
    let mut prompter = InteractivePrompter;

    let mut installer = Installer::new(
        container,
        cli.install_options(),
        &SystemProbe,
        &mut prompter,
        &mut hooks,
    )?;
    tracing::debug!("Installing {}", installer.manifest().banner());
    installer.run()?;
    Ok(())
}

fn report(err: &InstallerError) {
    if matches!(err, InstallerError::Aborted) {
        println!("{err}");
        return;
    }
    eprintln!("Error: {err}");
    if let Some(help) = err.help() {
        eprintln!("{help}");
    }
}

fn main() {
    if let Err(e) = env::normalize_environment() {
        report(&e);
        std::process::exit(1);
    }

    let cli = Cli::parse();
    init_logging(cli.log_level());

    if let Err(e) = run(&cli) {
        report(&e);
        std::process::exit(1);
    }
}
