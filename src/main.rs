// ABOUTME: Entry point for the hoist CLI application.
// ABOUTME: Parses arguments, loads config, and dispatches to the engine.

mod cli;

use clap::Parser;
use cli::{Cli, Commands, LoginArgs};
use hoist::config::{ClientConfig, DEFAULT_REGISTRY};
use hoist::engine::{Engine, EngineVersionInfo};
use hoist::error::Result;
use hoist::output::{Output, OutputMode};
use hoist::pull::{PullCommand, PullError, PullHandle};
use hoist::types::{ImageRef, RegistryCredentials};
use std::env;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const PROGRESS_INTERVAL: Duration = Duration::from_millis(200);

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };
    let mut output = Output::new(mode);

    if let Err(e) = run(cli, &mut output).await {
        output.error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, output: &mut Output) -> Result<()> {
    let config = match cli.config {
        Some(ref path) => ClientConfig::load(path)?,
        None => ClientConfig::discover_or_default(&env::current_dir()?)?,
    };
    let engine = Engine::connect(&config.engine)?.with_pull_options(config.pull.clone());

    match cli.command {
        Commands::Pull {
            image,
            login,
            timeout,
        } => {
            let reference: ImageRef = image.parse()?;
            let timeout = timeout.unwrap_or(config.pull.timeout);
            pull(&engine, &config, reference, login, timeout, output).await
        }
        Commands::Info => {
            let info = engine.info().await?;
            let failures = config.thresholds.expectations(&EngineVersionInfo::from(&info));
            output.engine_info(&info, &failures);
            Ok(())
        }
        Commands::Rmi { image, force } => {
            let reference: ImageRef = image.parse()?;
            engine.remove_image(&reference, force).await?;
            output.success(&format!("Removed {reference}"));
            Ok(())
        }
    }
}

async fn pull(
    engine: &Engine,
    config: &ClientConfig,
    reference: ImageRef,
    login: LoginArgs,
    timeout: Duration,
    output: &mut Output,
) -> Result<()> {
    let mut command = PullCommand::new(reference.clone());
    if let Some(credentials) = credentials(config, &reference, login)? {
        tracing::debug!(registry = credentials.server_address(), "sending registry credentials");
        command = command.with_credentials(credentials);
    }

    output.start_timer();
    output.progress(&format!("Pulling {reference}"));

    let handle = engine.pull(command);
    follow(&handle, timeout, output).await?;

    let summary = handle.summary();
    let message = match (summary.up_to_date, summary.digest) {
        (true, _) => format!("{reference} is up to date"),
        (false, Some(digest)) => format!("Pulled {reference} ({digest})"),
        (false, None) => format!("Pulled {reference}"),
    };
    output.success(&message);
    Ok(())
}

/// Command-line login wins over the config file.
fn credentials(
    config: &ClientConfig,
    reference: &ImageRef,
    login: LoginArgs,
) -> Result<Option<RegistryCredentials>> {
    let (Some(username), Some(password)) = (login.username, login.password) else {
        return config.credentials_for(reference);
    };
    let server = login
        .registry
        .unwrap_or_else(|| reference.registry().unwrap_or(DEFAULT_REGISTRY).to_string());
    let credentials = RegistryCredentials::new(username, password, server);
    Ok(Some(match login.email {
        Some(email) => credentials.with_email(email),
        None => credentials,
    }))
}

/// Print new progress while waiting. Ctrl-C cancels the pull.
async fn follow(
    handle: &PullHandle,
    timeout: Duration,
    output: &Output,
) -> std::result::Result<(), PullError> {
    let done = handle.await_completion(timeout);
    tokio::pin!(done);
    let mut ticker = tokio::time::interval(PROGRESS_INTERVAL);
    let mut shown = 0;
    let mut interrupted = false;

    loop {
        tokio::select! {
            result = &mut done => {
                show_latest(handle, &mut shown, output);
                return result;
            }
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                output.progress("Cancelling pull");
                handle.cancel().await;
            }
            _ = ticker.tick() => show_latest(handle, &mut shown, output),
        }
    }
}

fn show_latest(handle: &PullHandle, shown: &mut usize, output: &Output) {
    let summary = handle.summary();
    if summary.events > *shown {
        if let Some(ref event) = summary.last_event {
            output.pull_event(event);
        }
        *shown = summary.events;
    }
}
