//! Release-builder CLI entry point.

use clap::Parser;
use selfup::cli::Cli;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(err) = Cli::parse().execute().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
