//! pageview - command line driver for the page view engine.
//!
//! Loads a page descriptor and a record fixture, applies a toolbar state
//! and prints the resulting snapshot, stats, export or action outcome.

use clap::Parser;

mod cli;
mod commands;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays machine readable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(cli.log_level().into()),
        )
        .init();

    if let Err(error) = commands::run(cli.command).await {
        tracing::error!("{:#}", error);
        eprintln!("error: {error:#}");
        std::process::exit(1);
    }
}
