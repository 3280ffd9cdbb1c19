use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Build every spec file which doesn't already have an equivalent RPM in
/// the build directory.
#[derive(Parser)]
#[command(name = "envrpm-build")]
#[command(author, version, about)]
struct Cli {
    /// The location of the rpmbuild directory.
    rpmbuild_dir: PathBuf,

    /// The location to look for existing RPMs.
    rpm_dir: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .without_time()
        .init();

    let cli = Cli::parse();
    envrpm_core::build::build_new(&cli.rpmbuild_dir, &cli.rpm_dir)?;
    Ok(())
}
