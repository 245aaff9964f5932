use anyhow::Result;
use clap::Parser;
use spectral_rz::{run, Config};
use std::path::PathBuf;
use tracing::Level;

#[derive(Parser, Debug)]
#[command(name = "spectral_rz")]
#[command(about = "Quasi-cylindrical spectral PIC simulation")]
#[command(version)]
struct Args {
    /// Run configuration
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Log every step
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    let cfg = Config::from_file(&args.config)?;
    run(cfg)
}
