//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了CLI命令行接口。

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "cacheguard")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[arg(long, global = true, help = "Log filter directives, defaults to RUST_LOG or info")]
    pub log: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(name = "check-config", about = "Validate a configuration file")]
    CheckConfig(CheckConfigArgs),

    #[command(name = "stampede", about = "Run concurrent get_or_set calls against memory storage")]
    Stampede(StampedeArgs),
}

#[derive(Parser, Debug)]
pub struct CheckConfigArgs {
    #[arg(help = "Path to the TOML configuration file")]
    pub path: PathBuf,
}

#[derive(Parser, Debug)]
pub struct StampedeArgs {
    #[arg(short, long, help = "Optional TOML configuration file")]
    pub config: Option<PathBuf>,

    #[arg(short = 'n', long, default_value_t = 50, help = "Number of concurrent callers")]
    pub concurrency: usize,

    #[arg(short, long, default_value_t = 1, help = "Number of distinct keys")]
    pub keys: usize,

    #[arg(long, default_value_t = 50, help = "Simulated loader latency in milliseconds")]
    pub loader_ms: u64,

    #[arg(long, help = "Print metrics after the run")]
    pub metrics: bool,
}

mod check_config;
mod stampede;

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    crate::telemetry::init_tracing("cacheguard", cli.log.as_deref(), false);

    match &cli.command {
        Commands::CheckConfig(args) => check_config::execute(args),
        Commands::Stampede(args) => stampede::execute(args).await,
    }
}
