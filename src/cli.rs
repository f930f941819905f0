use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};

use calstore::{
    app::{CalendarContext, EventForm},
    calendar::{
        month::{weekday_labels, LayoutOptions},
        CalendarEvent, CalendarView, DayCell, EventStore, MonthLayout,
    },
    storage::{config::Config, KeyValueStore, SqliteStorage},
};

#[derive(Parser)]
#[command(name = "calstore")]
#[command(about = "A personal calendar kept in a local event store")]
pub struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database holding the event slot
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the month grid and the selected day's events
    Month {
        /// Month to show (YYYY/MM), defaults to the current one
        #[arg(value_parser = parse_month_arg)]
        month: Option<NaiveDate>,
    },
    /// List the events of one day
    List {
        /// Day to list (YYYY/MM/DD), defaults to today
        #[arg(value_parser = parse_date_arg)]
        date: Option<NaiveDate>,
    },
    /// Add an event
    Add(EventFields),
    /// Edit an existing event; omitted options keep their current value
    Edit {
        id: String,
        #[command(flatten)]
        fields: EventFields,
    },
    /// Delete an event
    Delete { id: String },
}

#[derive(Args, Debug, Default)]
pub struct EventFields {
    /// Event title
    #[arg(long)]
    pub title: Option<String>,

    /// Day of the event (YYYY/MM/DD)
    #[arg(long, value_parser = parse_date_arg)]
    pub date: Option<NaiveDate>,

    /// Start time (HH:MM)
    #[arg(long)]
    pub start: Option<String>,

    /// End time (HH:MM)
    #[arg(long)]
    pub end: Option<String>,

    /// Day the event ends (YYYY/MM/DD), defaults to its start day
    #[arg(long, value_parser = parse_date_arg)]
    pub end_date: Option<NaiveDate>,

    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub all_day: Option<bool>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub location: Option<String>,

    #[arg(long)]
    pub category: Option<String>,

    /// Color as #rgb or #rrggbb
    #[arg(long)]
    pub color: Option<String>,
}

impl EventFields {
    fn apply(self, form: &mut EventForm) {
        if let Some(title) = self.title {
            form.title = title;
        }
        if let Some(date) = self.date {
            form.date = date;
        }
        if let Some(start) = self.start {
            form.start_time = start;
        }
        if let Some(end) = self.end {
            form.end_time = end;
        }
        if let Some(end_date) = self.end_date {
            form.end_date = Some(end_date);
        }
        if let Some(all_day) = self.all_day {
            form.all_day = all_day;
        }
        if let Some(description) = self.description {
            form.description = description;
        }
        if let Some(location) = self.location {
            form.location = location;
        }
        if let Some(category) = self.category {
            form.category = category;
        }
        if let Some(color) = self.color {
            form.color = color;
        }
    }
}

pub fn run(cli: Cli, config: Config) -> Result<()> {
    let database = cli.database.unwrap_or_else(|| config.storage.database.clone());
    let storage = SqliteStorage::open(&database)
        .with_context(|| format!("Failed to open {}", database.display()))?;
    let store = EventStore::open(storage, config.storage.slot.clone());
    let mut context = CalendarContext::new(store).with_view(config.ui.default_view);

    let options = LayoutOptions {
        week_start: config.ui.week_start()?,
        preview_limit: config.ui.max_events_per_cell,
    };
    let twelve_hour = config.ui.twelve_hour();
    let date_format = config.ui.date_format.as_str();

    match cli.command {
        None => {
            if !context.view().is_rendered() {
                println!("The {} view is not available yet; showing the month.\n", context.view());
                context.set_view(CalendarView::Month);
            }
            print_month(&context, &options, twelve_hour, date_format);
        }
        Some(Command::Month { month }) => {
            if let Some(month) = month {
                context.set_selected_date(month);
            }
            context.set_view(CalendarView::Month);
            print_month(&context, &options, twelve_hour, date_format);
        }
        Some(Command::List { date }) => {
            if let Some(date) = date {
                context.set_selected_date(date);
            }
            println!(
                "{}",
                format_day_list(context.selected_date(), &context.selected_events(), twelve_hour, date_format)
            );
        }
        Some(Command::Add(fields)) => {
            let mut form = EventForm::new(Local::now().date_naive());
            fields.apply(&mut form);
            let event = form.submit(&mut context)?;
            tracing::info!("Created event {}", event.id);
            println!("Created event {}", event.id);
        }
        Some(Command::Edit { id, fields }) => {
            let existing = context
                .store()
                .get(&id)
                .with_context(|| format!("No event with id {}", id))?;
            let mut form = EventForm::for_event(existing);
            fields.apply(&mut form);
            let event = form.submit(&mut context)?;
            tracing::info!("Updated event {}", event.id);
            println!("Updated event {}", event.id);
        }
        Some(Command::Delete { id }) => {
            if context.store_mut().delete(&id)? {
                tracing::info!("Deleted event {}", id);
                println!("Deleted event {}", id);
            } else {
                println!("No event with id {}", id);
            }
        }
    }

    Ok(())
}

fn print_month<S: KeyValueStore>(
    context: &CalendarContext<S>,
    options: &LayoutOptions,
    twelve_hour: bool,
    date_format: &str,
) {
    let layout = context.month_layout(options);
    println!("{}", format_month_grid(&layout));
    println!(
        "{}",
        format_day_list(context.selected_date(), &context.selected_events(), twelve_hour, date_format)
    );
}

fn parse_date_arg(text: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(text, "%Y/%m/%d")
        .or_else(|_| NaiveDate::parse_from_str(text, "%Y-%m-%d"))
        .map_err(|_| format!("Invalid date '{}'. Use YYYY/MM/DD.", text))
}

fn parse_month_arg(text: &str) -> Result<NaiveDate, String> {
    let normalized = text.replace('-', "/");
    NaiveDate::parse_from_str(&format!("{}/01", normalized), "%Y/%m/%d")
        .map_err(|_| format!("Invalid month '{}'. Use YYYY/MM.", text))
}

const CELL_WIDTH: usize = 7;

fn format_month_grid(layout: &MonthLayout) -> String {
    let mut lines = Vec::new();
    let title = NaiveDate::from_ymd_opt(layout.year, layout.month, 1)
        .map(|first| first.format("%B %Y").to_string())
        .unwrap_or_default();
    lines.push(title);

    lines.push(
        weekday_labels(layout.week_start)
            .iter()
            .map(|label| format!("{:<width$}", format!(" {}", label), width = CELL_WIDTH))
            .collect::<String>()
            .trim_end()
            .to_string(),
    );

    for week in &layout.weeks {
        let row: String = week.days.iter().map(format_cell).collect();
        lines.push(row.trim_end().to_string());
    }

    let busy: Vec<&DayCell> = layout
        .weeks
        .iter()
        .flat_map(|week| &week.days)
        .filter(|cell| cell.event_count > 0)
        .collect();
    if !busy.is_empty() {
        lines.push(String::new());
        for cell in busy {
            lines.push(format_preview(cell));
        }
    }

    lines.join("\n")
}

/// "[ 5]*2 " for a selected day with two events, "( 6)   " for today.
fn format_cell(cell: &DayCell) -> String {
    let Some(date) = cell.date else {
        return " ".repeat(CELL_WIDTH);
    };
    let (open, close) = if cell.is_selected {
        ('[', ']')
    } else if cell.is_today {
        ('(', ')')
    } else {
        (' ', ' ')
    };
    let count = match cell.event_count {
        0 => String::new(),
        n if n < 10 => format!("*{}", n),
        _ => "*+".to_string(),
    };
    format!("{}{:>2}{}{:<3}", open, date.format("%-d").to_string(), close, count)
}

fn format_preview(cell: &DayCell) -> String {
    let day = cell.date.map(|d| d.format("%-d").to_string()).unwrap_or_default();
    let mut line = format!("{:>3}: {}", day, cell.previews.join(", "));
    if cell.overflow() > 0 {
        line.push_str(&format!(" +{} more", cell.overflow()));
    }
    line
}

fn format_day_list(date: NaiveDate, events: &[&CalendarEvent], twelve_hour: bool, date_format: &str) -> String {
    let mut lines = Vec::new();
    lines.push(format!("Events for {}", date.format(date_format)));
    lines.push(String::new());

    if events.is_empty() {
        lines.push("No events scheduled for this day".to_string());
    }

    for event in events {
        lines.push(format!("- {}", event.title));
        if let Some(description) = &event.description {
            lines.push(format!("  {}", description));
        }
        lines.push(format!("  {}", event.time_label(twelve_hour)));
        if let Some(location) = &event.location {
            lines.push(format!("  @ {}", location));
        }
        let mut tags = Vec::new();
        if let Some(category) = &event.category {
            tags.push(format!("[{}]", category));
        }
        tags.push(event.display_color().to_string());
        lines.push(format!("  {}", tags.join(" ")));
        lines.push(format!("  id: {}", event.id));
    }

    lines.join("\n")
}
