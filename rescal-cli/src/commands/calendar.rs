use anyhow::Result;
use owo_colors::OwoColorize;

use crate::context::Context;
use crate::render::CalendarRender;

pub async fn add(ctx: &Context, id: &str, name: Option<&str>) -> Result<()> {
    ctx.permissions().add_calendar(id, name).await?;
    println!("{}", format!("  Created calendar: {}", id).green());
    Ok(())
}

pub async fn share(ctx: &Context, id: &str, reader: &str) -> Result<()> {
    ctx.permissions().share(id, reader).await?;
    println!("  {} can now read {}", reader.bold(), id.bold());
    Ok(())
}

pub async fn list(ctx: &Context) -> Result<()> {
    let calendars = ctx.permissions().calendars().await?;

    if calendars.is_empty() {
        println!("{}", "  No calendars. Create yours with: rescal init".dimmed());
        return Ok(());
    }

    for calendar in &calendars {
        let owned = calendar.owner == ctx.principal();
        println!("  {}", calendar.render_for(owned));
    }

    Ok(())
}
