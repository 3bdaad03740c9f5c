use crate::cli::CheckConfigArgs;
use crate::config::{CacheConfig, ExpirationLevel, ExpirationSettings};
use anyhow::{Context, Result};

pub fn execute(args: &CheckConfigArgs) -> Result<()> {
    let config = CacheConfig::from_file(&args.path)
        .with_context(|| format!("Invalid configuration '{}'", args.path.display()))?;

    println!("=== Configuration OK ===\n");
    println!("Service:        {}", config.service_name);
    println!("Max free locks: {}", config.lock_pool.max_free_locks);
    println!("Max capacity:   {}", config.storage.max_capacity);
    println!(
        "Serialization:  {:?}{}",
        config.serialization.format,
        if config.serialization.compress {
            " (gzip)"
        } else {
            ""
        }
    );

    println!("\nExpiration levels (minutes):");
    for level in ExpirationLevel::ALL {
        println!(
            "  {:<11} {}",
            level.name(),
            config.expiration.minutes_for(level)
        );
    }

    Ok(())
}
