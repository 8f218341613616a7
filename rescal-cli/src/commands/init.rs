use anyhow::Result;
use owo_colors::OwoColorize;
use rescal_core::RescalError;
use rescal_core::config::RescalConfig;

use crate::context::Context;

pub async fn run(ctx: &Context) -> Result<()> {
    let principal = ctx.principal();

    match ctx.permissions().add_calendar(principal, Some(principal)).await {
        Ok(()) => println!("{}", format!("  Created calendar: {}", principal).green()),
        Err(RescalError::Validation(_)) => {
            println!("  Calendar {} already exists", principal.bold())
        }
        Err(e) => return Err(e.into()),
    }

    println!("  Config:   {}", RescalConfig::config_path()?.display());
    println!("  Database: {}", ctx.config.database_url());

    Ok(())
}
