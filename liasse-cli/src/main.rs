use std::process;

use clap::Parser;
use colored::Colorize;
use liasse_lib::{Error, Outcome, ProfileCoordinator, Repository, repository::CoreConfig};
use sysexits::ExitCode;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod profile;

#[derive(Parser, Debug)]
#[command(name = "liasse")]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: profile::Command,
}

fn main() -> process::ExitCode {
    // Human friendly panicking in release mode
    human_panic::setup_panic!();

    // Logging goes to stderr so it never mixes with command output
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Logging is unavailable");
    }

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("{} {err}", "error:".red().bold());
            return ExitCode::OsErr.into();
        }
    };

    runtime.block_on(run(cli)).into()
}

async fn run(cli: Cli) -> ExitCode {
    let cfg = match CoreConfig::load() {
        Ok(cfg) => cfg.handle(),
        Err(err) => return report(Err(Error::from(err))),
    };
    let repo = match Repository::open(cfg.clone()) {
        Ok(repo) => repo,
        Err(err) => {
            tracing::error!(error = %err, "Could not open the profile database");
            return report(Err(Error::from(err)));
        }
    };

    let coordinator = ProfileCoordinator::new(repo, cfg);
    if let Err(err) = coordinator.load().await {
        return report(Err(err));
    }

    report(profile::handle(&coordinator, &cli.command).await)
}

/// Print the error of a failed command, if any, and pick the matching exit code.
fn report(result: liasse_lib::Result<()>) -> ExitCode {
    let code = match &result {
        Ok(()) => ExitCode::Ok,
        Err(Error::Validation(_))
        | Err(Error::DeactivateDefault)
        | Err(Error::RenameDefault)
        | Err(Error::RenameDraft) => ExitCode::DataErr,
        Err(Error::UnknownProfile(_)) => ExitCode::NoInput,
        Err(Error::Storage(_)) => ExitCode::IoErr,
        Err(Error::Config(_)) => ExitCode::Config,
        Err(Error::Busy) => ExitCode::TempFail,
    };

    if let Some(message) = Outcome::from(result).error {
        eprintln!("{} {message}", "error:".red().bold());
    }

    code
}
