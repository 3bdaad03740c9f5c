//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 命令行入口。

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    cacheguard::cli::run().await
}
