use anyhow::Result;
use owo_colors::OwoColorize;
use rescal_core::event::Event;
use rescal_core::resource::{Resource, ResourceFilter, ResponseType};

use crate::context::Context;
use crate::render::Render;

pub async fn list(ctx: &Context, filters: &[String]) -> Result<()> {
    let filter = ResourceFilter::parse(filters.iter().map(String::as_str))?;
    let resources = ctx.resource_store().list_resources(&filter).await?;

    if resources.is_empty() {
        println!("   {}", "No resources".dimmed());
        return Ok(());
    }

    for resource in resources.values() {
        println!("   {}", resource.render());
    }

    Ok(())
}

pub async fn add(
    ctx: &Context,
    name: String,
    category: Option<String>,
    description: Option<String>,
    members: Option<Vec<i64>>,
    response: &str,
) -> Result<()> {
    let store = ctx.resource_store();

    if let Some(members) = &members {
        for member in members {
            store.get_resource(*member).await?;
        }
    }

    let mut resource = match members {
        Some(members) => Resource::group(name, members),
        None => Resource::single(name),
    };
    resource.category = category;
    resource.description = description;
    resource.response_type = response.parse::<ResponseType>()?;

    store.save(&mut resource).await?;
    println!("{}", format!("  Created: {}", resource.render()).green());

    Ok(())
}

pub async fn delete(ctx: &Context, id: i64) -> Result<()> {
    let store = ctx.resource_store();
    let resource = store.get_resource(id).await?;

    store.delete(&resource).await?;
    println!("{}", format!("  Deleted: {}", resource.name).red());

    Ok(())
}

pub async fn attach(
    ctx: &Context,
    resource_id: i64,
    calendar: Option<String>,
    event_id: &str,
) -> Result<()> {
    let resource = ctx.resource_store().get_resource(resource_id).await?;

    let mut store = ctx.event_store(calendar);
    let mut event = Event::clone(&*store.get_event(Some(event_id)).await?);

    let booked = store.attach_resource(&mut event, &resource).await?;
    let booked = if booked == resource_id {
        resource
    } else {
        ctx.resource_store().get_resource(booked).await?
    };

    println!(
        "{}",
        format!("  Booked {} for {}", booked.name, event.title).green()
    );

    Ok(())
}
