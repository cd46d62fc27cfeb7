use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use checklist::{
    apply, group, CompletionFilter, DateRange, GroupKey, Priority, SortKey, SortOrder, Store,
    Todo, TodoFilter, TriState,
};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use eyre::{eyre, Result};
use std::io::Read;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "checklist")]
#[command(about = "Checklist CLI - todo lists with a filter/sort/group engine")]
#[command(version)]
struct Cli {
    /// Path to the data directory (default: the platform data dir)
    #[arg(short, long)]
    store_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new todo
    Add {
        title: String,
        #[arg(short, long)]
        description: Option<String>,
        /// low, medium, or high
        #[arg(short, long, default_value = "medium")]
        priority: String,
        #[arg(short, long)]
        category: Option<String>,
        /// Due date (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        due: Option<String>,
    },

    /// List todos, filtered, sorted, and grouped
    List(FilterArgs),

    /// Mark a todo as completed
    Done { id: String },

    /// Reopen a completed todo
    Reopen { id: String },

    /// Edit fields of an existing todo
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        priority: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        due: Option<String>,
        /// Remove the due date
        #[arg(long, conflicts_with = "due")]
        clear_due: bool,
    },

    /// Remove a todo
    Rm { id: String },

    /// Export and import filter documents
    Filter {
        #[command(subcommand)]
        command: FilterCommands,
    },

    /// Manage saved filter presets
    Preset {
        #[command(subcommand)]
        command: PresetCommands,
    },

    /// Rebuild the SQLite cache from the JSONL journals
    Sync,
}

#[derive(Subcommand)]
enum FilterCommands {
    /// Print the filter document built from the given flags
    Export(FilterArgs),
    /// Read a filter document (file or stdin) and list matching todos
    Import {
        /// Read from this file instead of stdin
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum PresetCommands {
    /// Save the given flags as a named preset
    Save {
        name: String,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Load a preset and list matching todos
    Load { name: String },
    /// List saved preset names
    List,
    /// Delete a preset
    Rm { name: String },
}

/// Filter flags shared by `list`, `filter export`, and `preset save`
#[derive(Args, Default)]
struct FilterArgs {
    /// Only todos whose title contains this text
    #[arg(long)]
    title: Option<String>,
    /// Only todos whose description contains this text
    #[arg(long)]
    description: Option<String>,
    /// Exclude todos whose title or description contains this text
    #[arg(long)]
    exclude: Option<String>,
    /// Allowed priority (repeatable)
    #[arg(long = "priority")]
    priorities: Vec<String>,
    /// Allowed category (repeatable)
    #[arg(long = "category")]
    categories: Vec<String>,
    /// Only completed todos
    #[arg(long, conflicts_with = "active")]
    completed: bool,
    /// Only incomplete todos
    #[arg(long)]
    active: bool,
    /// Only overdue todos
    #[arg(long)]
    overdue: bool,
    /// Only todos due within the next seven days
    #[arg(long)]
    due_soon: bool,
    /// Due on or after this date
    #[arg(long)]
    due_after: Option<String>,
    /// Due on or before this date
    #[arg(long)]
    due_before: Option<String>,
    /// Created on or after this date
    #[arg(long)]
    created_after: Option<String>,
    /// Created on or before this date
    #[arg(long)]
    created_before: Option<String>,
    /// Updated on or after this date
    #[arg(long)]
    updated_after: Option<String>,
    /// Updated on or before this date
    #[arg(long)]
    updated_before: Option<String>,
    /// Completed on or after this date
    #[arg(long)]
    completed_after: Option<String>,
    /// Completed on or before this date
    #[arg(long)]
    completed_before: Option<String>,
    /// Sort key: created, updated, title, priority, due, category
    #[arg(long)]
    sort: Option<String>,
    /// Sort order: asc or desc
    #[arg(long)]
    order: Option<String>,
    /// Group key: none, category, priority, status, due
    #[arg(long)]
    group: Option<String>,
    /// Cap the number of results (0 means no cap)
    #[arg(long)]
    limit: Option<i64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let store_path = cli
        .store_path
        .or_else(dirs::data_dir)
        .unwrap_or_else(|| PathBuf::from("."));
    let mut store = Store::open(&store_path)?;

    match cli.command {
        Commands::Add {
            title,
            description,
            priority,
            category,
            due,
        } => {
            let mut todo = Todo::new(title);
            todo.description = description;
            todo.priority = parse_priority(&priority)?;
            todo.category = category;
            todo.due_date = due.as_deref().map(parse_instant).transpose()?;

            store.create(&todo)?;
            println!("Added {} {}", short_id(&todo.id).dimmed(), todo.title.bold());
        }

        Commands::List(args) => {
            let filter = build_filter(&args)?;
            list_with_filter(&store, &filter)?;
        }

        Commands::Done { id } => {
            let mut todo = resolve(&store, &id)?;
            todo.completed = true;
            todo.touch();
            store.update(&todo)?;
            println!("Completed {} {}", short_id(&todo.id).dimmed(), todo.title);
        }

        Commands::Reopen { id } => {
            let mut todo = resolve(&store, &id)?;
            todo.completed = false;
            todo.touch();
            store.update(&todo)?;
            println!("Reopened {} {}", short_id(&todo.id).dimmed(), todo.title);
        }

        Commands::Edit {
            id,
            title,
            description,
            priority,
            category,
            due,
            clear_due,
        } => {
            let mut todo = resolve(&store, &id)?;
            if let Some(title) = title {
                todo.title = title;
            }
            if let Some(description) = description {
                todo.description = Some(description);
            }
            if let Some(priority) = priority {
                todo.priority = parse_priority(&priority)?;
            }
            if let Some(category) = category {
                todo.category = Some(category);
            }
            if let Some(due) = due {
                todo.due_date = Some(parse_instant(&due)?);
            }
            if clear_due {
                todo.due_date = None;
            }
            todo.touch();
            store.update(&todo)?;
            println!("Updated {} {}", short_id(&todo.id).dimmed(), todo.title);
        }

        Commands::Rm { id } => {
            let todo = resolve(&store, &id)?;
            store.delete(&todo.id)?;
            println!("Removed {} {}", short_id(&todo.id).dimmed(), todo.title);
        }

        Commands::Filter { command } => match command {
            FilterCommands::Export(args) => {
                let filter = build_filter(&args)?;
                println!("{}", filter.to_text());
            }
            FilterCommands::Import { file } => {
                let text = match file {
                    Some(path) => std::fs::read_to_string(path)?,
                    None => {
                        let mut buffer = String::new();
                        std::io::stdin().read_to_string(&mut buffer)?;
                        buffer
                    }
                };
                // A failed parse leaves everything untouched; the caller
                // keeps whatever filter they were using before.
                let filter = TodoFilter::from_text(&text)?;
                list_with_filter(&store, &filter)?;
            }
        },

        Commands::Preset { command } => match command {
            PresetCommands::Save { name, filter } => {
                let filter = build_filter(&filter)?;
                store.save_preset(&name, &filter.to_text())?;
                println!("Saved preset {}", name.bold());
            }
            PresetCommands::Load { name } => {
                let text = store
                    .load_preset(&name)?
                    .ok_or_else(|| eyre!("No preset named {name}"))?;
                let filter = TodoFilter::from_text(&text)?;
                list_with_filter(&store, &filter)?;
            }
            PresetCommands::List => {
                let names = store.list_presets()?;
                if names.is_empty() {
                    println!("{}", "No presets saved.".dimmed());
                }
                for name in names {
                    println!("{name}");
                }
            }
            PresetCommands::Rm { name } => {
                store.delete_preset(&name)?;
                println!("Removed preset {}", name.bold());
            }
        },

        Commands::Sync => {
            println!("Syncing database from journals...");
            store.sync()?;
            println!("Sync complete");
        }
    }

    Ok(())
}

fn list_with_filter(store: &Store, filter: &TodoFilter) -> Result<()> {
    let now = Utc::now();
    let todos = store.list_all()?;
    let visible = apply(&todos, filter, now);

    if filter.is_active() {
        println!("{} {}", "Filters:".dimmed(), filter.summarize().join(" | ").dimmed());
    }

    if visible.is_empty() {
        println!("{}", "No todos match.".dimmed());
        return Ok(());
    }

    if filter.group_by == GroupKey::None {
        for todo in &visible {
            print_todo(todo, now);
        }
    } else {
        for (label, bucket) in group(&visible, filter.group_by, now) {
            println!("{} {}", label.bold(), format!("({})", bucket.len()).dimmed());
            for todo in &bucket {
                print_todo(todo, now);
            }
            println!();
        }
    }

    Ok(())
}

fn print_todo(todo: &Todo, now: DateTime<Utc>) {
    let marker = if todo.completed {
        "x".green()
    } else {
        "-".normal()
    };

    let priority = match todo.priority {
        Priority::High => "high".red(),
        Priority::Medium => "medium".yellow(),
        Priority::Low => "low".blue(),
    };

    let mut line = format!("{} {} [{}] {}", short_id(&todo.id).dimmed(), marker, priority, todo.title);

    if let Some(category) = todo.category.as_deref().filter(|c| !c.trim().is_empty()) {
        line.push_str(&format!(" {}", format!("#{category}").cyan()));
    }

    if let Some(due) = todo.due_date {
        let due_text = format!("due {}", due.format("%Y-%m-%d"));
        let styled = if todo.is_overdue(now) {
            due_text.red()
        } else if todo.is_due_soon(now) {
            due_text.yellow()
        } else {
            due_text.dimmed()
        };
        line.push_str(&format!(" {styled}"));
    }

    println!("{line}");
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Find a todo by exact id or unique id prefix
fn resolve(store: &Store, id: &str) -> Result<Todo> {
    if let Some(todo) = store.get(id)? {
        return Ok(todo);
    }

    let mut matches: Vec<Todo> = store
        .list_all()?
        .into_iter()
        .filter(|t| t.id.starts_with(id))
        .collect();

    if matches.len() > 1 {
        return Err(eyre!("Id prefix {id} is ambiguous ({} matches)", matches.len()));
    }
    matches.pop().ok_or_else(|| eyre!("No todo with id {id}"))
}

fn parse_priority(text: &str) -> Result<Priority> {
    text.parse::<Priority>().map_err(|e| eyre!(e))
}

/// Accept a plain date (midnight UTC) or a full RFC 3339 instant
fn parse_instant(text: &str) -> Result<DateTime<Utc>> {
    if let Ok(instant) = text.parse::<DateTime<Utc>>() {
        return Ok(instant);
    }
    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map_err(|_| eyre!("Invalid date: {text} (expected YYYY-MM-DD or RFC 3339)"))?;
    Ok(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)))
}

/// End-of-day companion for "before" bounds given as plain dates
fn parse_instant_end(text: &str) -> Result<DateTime<Utc>> {
    if let Ok(instant) = text.parse::<DateTime<Utc>>() {
        return Ok(instant);
    }
    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map_err(|_| eyre!("Invalid date: {text} (expected YYYY-MM-DD or RFC 3339)"))?;
    let end = date
        .and_time(NaiveTime::MIN)
        .checked_add_days(chrono::Days::new(1))
        .ok_or_else(|| eyre!("Date out of range: {text}"))?
        - chrono::Duration::seconds(1);
    Ok(Utc.from_utc_datetime(&end))
}

fn parse_range(after: &Option<String>, before: &Option<String>) -> Result<DateRange> {
    Ok(DateRange {
        start: after.as_deref().map(parse_instant).transpose()?,
        end: before.as_deref().map(parse_instant_end).transpose()?,
    })
}

fn build_filter(args: &FilterArgs) -> Result<TodoFilter> {
    let mut filter = TodoFilter {
        due: parse_range(&args.due_after, &args.due_before)?,
        created: parse_range(&args.created_after, &args.created_before)?,
        updated: parse_range(&args.updated_after, &args.updated_before)?,
        completed_between: parse_range(&args.completed_after, &args.completed_before)?,
        title_contains: args.title.clone(),
        description_contains: args.description.clone(),
        exclude_text: args.exclude.clone(),
        categories: args.categories.clone(),
        ..TodoFilter::default()
    };

    for priority in &args.priorities {
        filter.priorities.push(parse_priority(priority)?);
    }

    if args.completed {
        filter.completion = CompletionFilter::Completed;
    } else if args.active {
        filter.completion = CompletionFilter::Incomplete;
    }

    if args.overdue {
        filter.overdue = TriState::Yes;
    }
    if args.due_soon {
        filter.due_soon = TriState::Yes;
    }

    if let Some(sort) = &args.sort {
        filter.sort_by = sort.parse::<SortKey>().map_err(|e| eyre!(e))?;
    }
    if let Some(order) = &args.order {
        filter.sort_order = order.parse::<SortOrder>().map_err(|e| eyre!(e))?;
    }
    if let Some(group) = &args.group {
        filter.group_by = group.parse::<GroupKey>().map_err(|e| eyre!(e))?;
    }
    if let Some(limit) = args.limit {
        filter.max_results = limit;
    }

    Ok(filter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_instant_plain_date() {
        let instant = parse_instant("2026-03-10").unwrap();
        assert_eq!(instant, Utc.with_ymd_and_hms(2026, 3, 10, 0, 0, 0).unwrap());
        assert!(parse_instant("next tuesday").is_err());
    }

    #[test]
    fn test_parse_instant_end_covers_whole_day() {
        let end = parse_instant_end("2026-03-10").unwrap();
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 3, 10, 23, 59, 59).unwrap());
    }

    #[test]
    fn test_build_filter_from_flags() {
        let args = FilterArgs {
            title: Some("report".to_string()),
            priorities: vec!["HIGH".to_string()],
            active: true,
            overdue: true,
            sort: Some("due".to_string()),
            order: Some("asc".to_string()),
            group: Some("category".to_string()),
            limit: Some(10),
            ..FilterArgs::default()
        };

        let filter = build_filter(&args).unwrap();
        assert_eq!(filter.title_contains.as_deref(), Some("report"));
        assert_eq!(filter.priorities, vec![Priority::High]);
        assert_eq!(filter.completion, checklist::CompletionFilter::Incomplete);
        assert_eq!(filter.overdue, TriState::Yes);
        assert_eq!(filter.sort_by, SortKey::DueDate);
        assert_eq!(filter.sort_order, SortOrder::Asc);
        assert_eq!(filter.group_by, GroupKey::Category);
        assert_eq!(filter.max_results, 10);
        assert!(filter.is_active());
    }

    #[test]
    fn test_build_filter_rejects_bad_flags() {
        let args = FilterArgs {
            priorities: vec!["urgent".to_string()],
            ..FilterArgs::default()
        };
        assert!(build_filter(&args).is_err());

        let args = FilterArgs {
            due_after: Some("soonish".to_string()),
            ..FilterArgs::default()
        };
        assert!(build_filter(&args).is_err());
    }
}
