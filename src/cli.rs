// Command-line surface and dispatch.

use crate::admin::{
    list_entries, list_projects, list_tags, projects_heading, render_listing, tags_heading,
};
use crate::api::{ApiClient, HttpTransport};
use crate::config::ConfigStore;
use crate::entries::{create_entry, NewEntry};
use crate::error::FreckResult;
use crate::ui::{bootstrap, TerminalPrompter};
use chrono::NaiveDate;
use clap::Parser;
use std::fmt;
use std::fmt::Write as _;
use tracing::{debug, info, Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

/// Record time on your Freckle account
#[derive(Parser, Debug)]
#[command(name = "freck", version, about)]
pub struct Cli {
    /// List all available projects
    #[arg(short = 'l', long, conflicts_with = "time_spent")]
    pub list_projects: bool,

    /// List all available tags
    #[arg(short = 'L', long, conflicts_with = "time_spent")]
    pub list_tags: bool,

    /// Tags for this entry, overriding the default if any
    #[arg(short, long)]
    pub tags: Option<String>,

    /// The date this task was done, if not today: yyyy-mm-dd
    #[arg(short, long, value_parser = parse_date)]
    pub date: Option<NaiveDate>,

    /// Email address of the user to record time for, if not you
    #[arg(short, long)]
    pub user: Option<String>,

    /// The name of the project. If you have specified a default you can miss this out
    #[arg(short, long)]
    pub project: Option<String>,

    /// Create the project if it does not exist
    #[arg(short, long)]
    pub create: bool,

    /// First day of the listed entries (defaults to today)
    #[arg(
        long,
        value_parser = parse_date,
        conflicts_with_all = ["time_spent", "list_projects", "list_tags"]
    )]
    pub from: Option<NaiveDate>,

    /// Last day of the listed entries (defaults to today)
    #[arg(
        long,
        value_parser = parse_date,
        conflicts_with_all = ["time_spent", "list_projects", "list_tags"]
    )]
    pub to: Option<NaiveDate>,

    /// Print detailed logging messages
    #[arg(short, long, conflicts_with = "silent")]
    pub verbose: bool,

    /// Print no informational messages
    #[arg(short, long)]
    pub silent: bool,

    /// Time spent, e.g. 90 or 1h30m
    pub time_spent: Option<String>,

    /// Description of the work; words are joined with ", "
    pub description: Vec<String>,
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("expected yyyy-mm-dd: {e}"))
}

impl Cli {
    fn log_level(&self) -> Level {
        if self.verbose {
            Level::DEBUG
        } else if self.silent {
            Level::WARN
        } else {
            Level::INFO
        }
    }
}

/// Log lines look like ` * Recorded 30 against project Acme`.
struct BulletFormat;

impl<S, N> FormatEvent<S, N> for BulletFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(writer, " * ")?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

fn init_tracing(level: Level) {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .event_format(BulletFormat)
        .init();
}

pub fn execute(cli: Cli) -> FreckResult<()> {
    init_tracing(cli.log_level());
    debug!("CLI arguments: {:?}", &cli);

    let store = ConfigStore::default_location();
    let mut api = match store.load()? {
        Some(config) => ApiClient::<HttpTransport>::from_env(config)?,
        None => bootstrap(
            &store,
            &mut TerminalPrompter,
            ApiClient::<HttpTransport>::from_env,
        )?,
    };

    if cli.list_projects {
        let lines = list_projects(&mut api)?;
        println!("{}", render_listing(&projects_heading(&api), &lines));
        return Ok(());
    }

    if cli.list_tags {
        let lines = list_tags(&mut api)?;
        println!("{}", render_listing(&tags_heading(&api), &lines));
        return Ok(());
    }

    if cli.create {
        let name = api.resolve_project_name(cli.project.as_deref())?;
        if api.create_project(Some(&name))? {
            info!("Created new project: {}", name);
        } else {
            debug!("The project {} already exists", name);
        }
    }

    if let Some(time) = cli.time_spent {
        let entry = NewEntry {
            time,
            description: cli.description.join(", "),
            tags: cli.tags,
            project: cli.project,
            date: cli.date,
            user: cli.user,
        };
        let project = create_entry(&mut api, &entry)?;
        info!("Recorded {} against project {}", entry.time, project);
        return Ok(());
    }

    // No action given: show the entries for the requested range.
    let today = chrono::Local::now().date_naive();
    let report = list_entries(&api, cli.from, cli.to, None, today)?;
    print!("{}", report.render());
    Ok(())
}
