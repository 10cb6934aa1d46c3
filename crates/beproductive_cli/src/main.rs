//! Command-line front end over one item collection.
//!
//! # Responsibility
//! - Wire a device directory and an optional SQLite document store into an
//!   `ItemCollectionManager`.
//! - Run one collection operation per invocation and print the resulting view.

use beproductive_core::{
    AuthContext, CoreConfig, CoreError, FeatureKind, FsLocalStore, Item, ItemCollectionManager,
    ItemDraft, ItemPayload, LocalStore, Location, RemoteStore, SqliteDocumentStore,
};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "beproductive")]
#[command(about = "Manage notes and goals across device and cloud storage")]
struct Cli {
    /// Directory holding device-only records
    #[arg(long)]
    local_dir: PathBuf,

    /// SQLite file acting as the cloud document store
    #[arg(long)]
    remote_db: Option<PathBuf>,

    /// Signed-in user id; premium is read from the user's profile
    #[arg(long)]
    user: Option<String>,

    #[arg(long, value_enum, default_value_t = FeatureArg::Notes)]
    feature: FeatureArg,

    /// Optional JSON file overriding tier limits
    #[arg(long)]
    config: Option<PathBuf>,

    /// Absolute directory for rolling log files
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum FeatureArg {
    Notes,
    Goals,
}

impl From<FeatureArg> for FeatureKind {
    fn from(value: FeatureArg) -> Self {
        match value {
            FeatureArg::Notes => FeatureKind::Notes,
            FeatureArg::Goals => FeatureKind::Goals,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum LocationArg {
    Local,
    Remote,
}

impl From<LocationArg> for Location {
    fn from(value: LocationArg) -> Self {
        match value {
            LocationArg::Local => Location::Local,
            LocationArg::Remote => Location::Remote,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the merged collection
    List,

    /// Create a note (with --body) or a goal (with --date)
    Add {
        title: String,
        #[arg(long, default_value = "")]
        body: String,
        /// Goal target date (RFC 3339)
        #[arg(long)]
        date: Option<DateTime<Utc>>,
        /// Count up from the date instead of down to it
        #[arg(long)]
        counter: bool,
        #[arg(long)]
        category: Option<String>,
        #[arg(long, value_enum, default_value_t = LocationArg::Local)]
        to: LocationArg,
    },

    /// Toggle the pin of one item
    Pin { id: String },

    /// Move one item to the other store
    Move {
        id: String,
        #[arg(value_enum)]
        to: LocationArg,
    },

    /// Delete items from whichever store owns them
    Delete { ids: Vec<String> },

    /// Delete a category and every item in it
    DeleteCategory { name: String },

    /// Print health-check information
    Ping,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    if let Some(log_dir) = &cli.log_dir {
        beproductive_core::init_logging(beproductive_core::default_log_level(), log_dir)?;
    }

    let command = cli.command.unwrap_or(Commands::List);
    if let Commands::Ping = command {
        println!("beproductive_core ping={}", beproductive_core::ping());
        println!("beproductive_core version={}", beproductive_core::core_version());
        return Ok(());
    }

    let feature = FeatureKind::from(cli.feature);
    let config = match &cli.config {
        Some(path) => CoreConfig::from_json_str(&std::fs::read_to_string(path)?)?,
        None => CoreConfig::default(),
    };
    let local: Arc<dyn LocalStore> = Arc::new(FsLocalStore::open(&cli.local_dir).await?);
    let remote: Option<Arc<dyn RemoteStore>> = match &cli.remote_db {
        Some(path) => Some(Arc::new(SqliteDocumentStore::open(path)?)),
        None => None,
    };
    let auth = match (&remote, &cli.user) {
        (Some(remote), Some(user)) => AuthContext::from_profile(remote.as_ref(), user).await?,
        (None, Some(user)) => AuthContext::new(user.as_str(), false),
        (_, None) => AuthContext::anonymous(),
    };

    let manager = ItemCollectionManager::new(feature, auth, config, local, remote);
    let outcome = manager.load_all().await;
    for warning in &outcome.warnings {
        eprintln!("warning [{}]: {}", warning.location, warning.message);
    }

    let result = execute(&manager, command).await;
    manager.unsubscribe();
    if let Err(err) = result {
        let notification = err.notification(feature);
        return Err(format!("{}: {}", notification.title, notification.message).into());
    }

    print_items(&manager.items());
    info!(
        "event=cli_run module=cli status=ok feature={} items={}",
        feature.plural(),
        manager.items().len()
    );
    Ok(())
}

async fn execute(manager: &ItemCollectionManager, command: Commands) -> Result<(), CoreError> {
    match command {
        Commands::List | Commands::Ping => {}
        Commands::Add {
            title,
            body,
            date,
            counter,
            category,
            to,
        } => {
            let draft = match date {
                Some(date) => ItemDraft::goal(title, date, counter),
                None => ItemDraft::note(title, body),
            };
            let draft = match category {
                Some(category) => draft.with_category(category),
                None => draft,
            };
            let item = manager.create(draft, to.into()).await?;
            println!("created {}", item.id);
        }
        Commands::Pin { id } => {
            let item = manager.toggle_pin(&id).await?;
            println!("{} pinned={}", item.id, item.pinned);
        }
        Commands::Move { id, to } => {
            let item = manager.move_location(&id, to.into()).await?;
            println!("moved {id} -> {} ({})", item.id, item.location);
        }
        Commands::Delete { ids } => {
            let report = manager.delete_many(ids).await;
            if let Some(partial) = report.partial_failure(beproductive_core::BulkOperation::Delete)
            {
                return Err(CoreError::PartialFailure(partial));
            }
        }
        Commands::DeleteCategory { name } => {
            let report = manager.delete_category(&name).await?;
            if let Some(partial) = report
                .items
                .partial_failure(beproductive_core::BulkOperation::CategoryDelete)
            {
                return Err(CoreError::PartialFailure(partial));
            }
        }
    }
    Ok(())
}

fn print_items(items: &[Item]) {
    let now = Utc::now();
    for item in items {
        let pin = if item.pinned { "*" } else { " " };
        let detail = match &item.payload {
            ItemPayload::Note { content } => format!("{} chars", content.chars().count()),
            ItemPayload::Goal { date, is_counter } => {
                let span = beproductive_core::GoalSpan::between(now, *date, *is_counter);
                format!(
                    "{}y {}m {}d {}h{}",
                    span.years,
                    span.months,
                    span.days,
                    span.hours,
                    if span.is_completed(*is_counter) {
                        " (completed)"
                    } else {
                        ""
                    }
                )
            }
        };
        println!(
            "{pin} {:<8} {:<34} {:<27} {}",
            item.location.as_str(),
            item.id,
            item.title,
            detail
        );
    }
}
