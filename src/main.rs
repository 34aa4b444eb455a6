use avlkit::cli::Command;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    // Parse CLI arguments
    let cmd = Command::parse();

    // Execute command
    avlkit::cli::execute_command(cmd)?;

    Ok(())
}
