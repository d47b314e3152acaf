pub mod commands;
pub mod config;
pub mod error;
pub mod excel;
pub mod extraction;
pub mod processing;
pub mod queue;
pub mod report;
pub mod results;
pub mod session;
pub mod types;
pub mod upload;

use clap::Parser;

pub use error::{AppError, Result};
pub use session::ExpenseSession;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run() -> anyhow::Result<()> {
    // .env first so clap can pick up DOCUMENT_AI_* values.
    config::load_env();
    init_tracing();
    let cli = commands::Cli::parse();
    commands::execute(cli)?;
    Ok(())
}
