//! drlctl - maintain and query the local DRL mirror.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use drl_core::DrlOptions;
use drl_sync::DrlProvider;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// DRL mirror maintenance tool.
#[derive(Parser, Debug)]
#[command(name = "drlctl")]
#[command(version, about = "Maintain and query the local DRL mirror", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "DRL_CONFIG", default_value = "config/drl.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Synchronize the local mirror with the upstream service
    Refresh,
    /// Check whether a certificate identifier is revoked
    Check {
        /// Cleartext UCVI to test
        ucvi: String,
    },
    /// Print the stored synchronization status
    Status,
}

fn load_options(path: &str) -> Result<DrlOptions> {
    let options: DrlOptions = Figment::from(Serialized::defaults(DrlOptions::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("DRL_"))
        .extract()
        .context("failed to load configuration")?;
    options.validate()?;
    Ok(options)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let options = load_options(&args.config)?;
    let provider = DrlProvider::open(options).await?;
    let cancel = CancellationToken::new();

    match args.command {
        Command::Refresh => {
            let subscription = provider.subscribe_progress(|progress| {
                if progress.target_chunks_count > 0 {
                    eprintln!(
                        "version {}: chunk {}/{} ({:.0}%)",
                        progress.target_version,
                        progress.last_chunk_saved,
                        progress.target_chunks_count,
                        progress.total_progress_percent * 100.0
                    );
                }
            });
            let status = provider.refresh(&cancel).await?;
            provider.unsubscribe_progress(subscription);
            println!(
                "installed version {} ({} revoked identifiers)",
                status.current_version, status.target_total_number_ucvi
            );
        }
        Command::Check { ucvi } => {
            let revoked = provider.is_revoked(&ucvi, &cancel).await?;
            println!("{}", if revoked { "REVOKED" } else { "not revoked" });
        }
        Command::Status => {
            let status = provider.status().await?;
            println!("current version:  {}", status.current_version);
            println!("target version:   {}", status.target_version);
            println!(
                "chunks saved:     {}/{}",
                status.last_chunk_saved, status.target_chunks_count
            );
            println!(
                "expected entries: {}",
                status.target_total_number_ucvi
            );
            match status.last_check {
                Some(at) => println!("last check:       {at}"),
                None => println!("last check:       never"),
            }
        }
    }
    Ok(())
}
