use anyhow::Result;
use owo_colors::OwoColorize;
use rescal_core::config::RescalConfig;

pub fn run(config: &RescalConfig) -> Result<()> {
    let config_path = RescalConfig::config_path()?;

    println!("{}", "Paths".bold());
    println!("  Config:     {}", config_path.display());
    println!("  Database:   {}", config.database_url());
    if let Some(chunks) = config.chunk_dir() {
        println!("  Chunks:     {}", chunks.display());
    }
    println!();

    println!("{}", "Effective configuration".bold());
    for line in config.to_toml()?.lines() {
        println!("  {}", line);
    }

    Ok(())
}
