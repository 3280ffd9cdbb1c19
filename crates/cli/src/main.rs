use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use envrpm_core::{Config, RunLock, installer, walker};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Turn a git-tracked environment history into rpmbuild content.
#[derive(Parser)]
#[command(name = "envrpm")]
#[command(author, version, about)]
struct Cli {
    /// Repo to deploy.
    repo_uri: String,

    /// Location to put the RPMBUILD content.
    target: PathBuf,

    /// YAML configuration filename.
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .without_time()
        .init();

    let config = Config::load(&cli.config)?;

    // One exclusive lock around the whole clone-and-walk sequence.
    let _lock = RunLock::acquire(&cli.target, "envrpm")?;

    info!(repo = %cli.repo_uri, target = %cli.target.display(), "generating rpmbuild content");
    let checkout = tempfile::tempdir()?;
    let repo = walker::clone_repo(&cli.repo_uri, checkout.path())?;
    walker::create_rpmbuild_content(&repo, &cli.target, &config)?;
    installer::create_rpm_installer(&cli.target, &config, installer::DEFAULT_PYTHON_SPEC)?;
    info!("rpmbuild content up to date");

    Ok(())
}
