//! Discover and verify mail submission endpoints.
//!
//! - `mailroute discover <domain>` lists the submission endpoints derived for a domain
//! - `mailroute verify --address <addr>` authenticates the account against them and
//!   submits one test message; the secret is read from `MAILROUTE_SECRET`

use std::{path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand};
use mailroute::{commands, config};
use mailroute_common::{logging, tracing};
use mailroute_discovery::{Credential, Discovery};

#[cfg(not(any(target_os = "macos", unix)))]
compile_error!("Only macos and unix are currently supported");

/// Discover and verify mail submission endpoints
#[derive(Parser, Debug)]
#[command(name = "mailroute")]
#[command(about = "Discover and verify mail submission endpoints", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the configuration file (overrides MAILROUTE_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the submission endpoints derived for a domain
    Discover {
        /// Mail domain to search
        domain: String,
    },
    /// Verify an account against its domain's submission endpoints
    Verify {
        /// Account address; its domain is searched
        #[arg(long)]
        address: String,

        /// Recipient of the test message (defaults to the account itself)
        #[arg(long)]
        test_recipient: Option<String>,
    },
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = config::load(cli.config.as_deref())?;
    let discovery = Discovery::from_config(config)?;
    let sweeper = discovery.spawn_cache_sweeper();
    let mut out = std::io::stdout();

    let success = match cli.command {
        Commands::Discover { domain } => {
            commands::discover(&discovery, &domain, &mut out).await?
        }
        Commands::Verify {
            address,
            test_recipient,
        } => {
            let secret = std::env::var(commands::SECRET_VAR)
                .map_err(|_| anyhow::anyhow!("{} must be set", commands::SECRET_VAR))?;
            let credential = Credential::new(address, secret);

            commands::verify(
                &discovery,
                discovery.checker(),
                &credential,
                test_recipient.as_deref(),
                &mut out,
            )
            .await?
            .is_verified()
        }
    };

    sweeper.abort();
    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn shutdown() -> anyhow::Result<()> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("CTRL+C entered, shutting down");
        }
        _ = terminate.recv() => {
            tracing::info!("Terminate Signal received, shutting down");
        }
    };

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    logging::init();
    let cli = Cli::parse();

    tokio::select! {
        result = run(cli) => result,
        signal = shutdown() => {
            signal?;
            Ok(ExitCode::from(130))
        }
    }
}
