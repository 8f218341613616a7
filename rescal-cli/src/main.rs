mod commands;
mod context;
mod render;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rescal_core::config::RescalConfig;
use rescal_core::date_range::DateRange;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::context::Context;

#[derive(Parser)]
#[command(name = "rescal")]
#[command(about = "Manage calendars, events and bookable resources")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the config file and database, and register your calendar
    Init,
    /// Show paths and the effective configuration
    Config,
    /// Manage calendars and read shares
    #[command(subcommand)]
    Calendar(CalendarCommand),
    /// List, create and delete events
    #[command(subcommand)]
    Events(EventsCommand),
    /// Manage bookable resources
    #[command(subcommand)]
    Resources(ResourcesCommand),
}

#[derive(Subcommand)]
enum CalendarCommand {
    /// Register a calendar owned by you
    Add {
        id: String,

        #[arg(short, long)]
        name: Option<String>,
    },
    /// Let another user read one of your calendars
    Share { id: String, reader: String },
    /// List the calendars you can read
    List,
}

#[derive(Subcommand)]
enum EventsCommand {
    /// List events in a date range
    List {
        /// Calendar to list (defaults to your own)
        #[arg(short, long)]
        calendar: Option<String>,

        /// Show events from this date (YYYY-MM-DD, or "start" for all past events)
        #[arg(long)]
        from: Option<String>,

        /// Show events until this date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,

        /// Only events created by this user
        #[arg(long)]
        creator: Option<String>,

        /// Only events with this status (tentative, confirmed, cancelled, free)
        #[arg(long)]
        status: Option<String>,

        /// Only events whose title contains this text
        #[arg(long)]
        title: Option<String>,
    },
    /// Show one event by identifier
    Show {
        id: String,

        #[arg(short, long)]
        calendar: Option<String>,

        /// Print the event as JSON
        #[arg(long)]
        json: bool,
    },
    /// Find an event by UID across calendars
    Find {
        uid: String,

        /// Show every copy instead of the most relevant one
        #[arg(long)]
        all: bool,

        /// Only search these calendars (comma separated)
        #[arg(long = "in", value_delimiter = ',')]
        calendars: Option<Vec<String>>,

        #[arg(long)]
        json: bool,
    },
    /// Create an event
    New {
        title: String,

        /// Start (e.g. "2025-03-20T15:00", or "2025-03-20" for all-day)
        #[arg(short, long)]
        start: String,

        /// End, in the same formats as --start
        #[arg(short, long, conflicts_with = "duration")]
        end: Option<String>,

        /// Duration (e.g. "30m", "1h 30m")
        #[arg(short, long)]
        duration: Option<String>,

        #[arg(short, long)]
        location: Option<String>,

        #[arg(short, long)]
        calendar: Option<String>,

        /// Repeat: daily, weekly, monthly, monthly-weekday, yearly, yearly-day, yearly-weekday
        #[arg(long)]
        repeat: Option<String>,

        /// Repeat every N days/weeks/months/years
        #[arg(long, requires = "repeat")]
        interval: Option<u32>,

        /// Stop after this many occurrences
        #[arg(long, requires = "repeat")]
        count: Option<u32>,

        /// Stop repeating after this date (YYYY-MM-DD)
        #[arg(long, requires = "repeat", conflicts_with = "count")]
        until: Option<String>,

        #[arg(short, long)]
        tag: Vec<String>,
    },
    /// Delete an event
    Delete {
        id: String,

        #[arg(short, long)]
        calendar: Option<String>,

        /// Do not notify anyone
        #[arg(long)]
        silent: bool,
    },
}

#[derive(Subcommand)]
enum ResourcesCommand {
    /// List resources, optionally filtered by field=value pairs
    List { filters: Vec<String> },
    /// Add a resource, or a group of resources with --members
    Add {
        name: String,

        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// Member resource ids of a group (comma separated)
        #[arg(long, value_delimiter = ',')]
        members: Option<Vec<i64>>,

        /// none, auto, always-accept, always-decline or manual
        #[arg(long, default_value = "auto")]
        response: String,
    },
    /// Delete a resource and every event in its calendar
    Delete { id: i64 },
    /// Book a resource for an event
    Attach {
        resource: i64,
        event: String,

        /// Calendar of the event (defaults to your own)
        #[arg(short, long)]
        calendar: Option<String>,
    },
}

fn init_logging(default_filter: &str) {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set up logging: {}", e);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = RescalConfig::load()?;
    init_logging(&config.log_filter);

    if let Commands::Config = cli.command {
        return commands::config::run(&config);
    }

    let ctx = Context::connect(config).await?;

    match cli.command {
        Commands::Init => commands::init::run(&ctx).await,
        Commands::Config => Ok(()),
        Commands::Calendar(command) => match command {
            CalendarCommand::Add { id, name } => {
                commands::calendar::add(&ctx, &id, name.as_deref()).await
            }
            CalendarCommand::Share { id, reader } => {
                commands::calendar::share(&ctx, &id, &reader).await
            }
            CalendarCommand::List => commands::calendar::list(&ctx).await,
        },
        Commands::Events(command) => match command {
            EventsCommand::List {
                calendar,
                from,
                to,
                creator,
                status,
                title,
            } => {
                let range = DateRange::from_args(from.as_deref(), to.as_deref())?;
                let conditions = commands::events::conditions(creator, status, title)?;
                commands::events::list(&ctx, calendar, range, conditions).await
            }
            EventsCommand::Show { id, calendar, json } => {
                commands::events::show(&ctx, calendar, &id, json).await
            }
            EventsCommand::Find {
                uid,
                all,
                calendars,
                json,
            } => commands::events::find(&ctx, &uid, all, calendars, json).await,
            EventsCommand::New {
                title,
                start,
                end,
                duration,
                location,
                calendar,
                repeat,
                interval,
                count,
                until,
                tag,
            } => {
                let draft = commands::events::Draft {
                    title,
                    start,
                    end,
                    duration,
                    location,
                    repeat,
                    interval,
                    count,
                    until,
                    tags: tag,
                };
                commands::events::new(&ctx, calendar, draft).await
            }
            EventsCommand::Delete {
                id,
                calendar,
                silent,
            } => commands::events::delete(&ctx, calendar, &id, silent).await,
        },
        Commands::Resources(command) => match command {
            ResourcesCommand::List { filters } => commands::resources::list(&ctx, &filters).await,
            ResourcesCommand::Add {
                name,
                category,
                description,
                members,
                response,
            } => {
                commands::resources::add(&ctx, name, category, description, members, &response)
                    .await
            }
            ResourcesCommand::Delete { id } => commands::resources::delete(&ctx, id).await,
            ResourcesCommand::Attach {
                resource,
                event,
                calendar,
            } => commands::resources::attach(&ctx, resource, calendar, &event).await,
        },
    }
}
