use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{ArgAction, Parser, Subcommand};
use tracing::info;

use release_watch::audit::audit_report;
use release_watch::config::{self, AppConfig};
use release_watch::engine::{CycleError, Reconciler, Scheduler};
use release_watch::logging;
use release_watch::source::{SourceKind, build_adapters};
use release_watch::status::user_status;
use release_watch::store::{SqliteStore, Store, User};

#[derive(Parser)]
#[command(name = "release-watch")]
#[command(version, about = "Tracks vendor product releases and notifies subscribed users")]
struct Cli {
    /// Write log lines as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the scheduler until interrupted
    Run {
        /// Run one cycle immediately instead of waiting for the first interval
        #[arg(long)]
        now: bool,
    },
    /// Run one reconciliation cycle
    Update {
        /// Only this source (e.g. kaspersky, usergate_ngfw_7, securitycode)
        #[arg(long)]
        source: Option<SourceKind>,
    },
    /// List tracked products
    Products,
    /// Show the version history of a product
    History { product_id: i64 },
    #[command(subcommand)]
    User(UserCommand),
    /// Show a user's accepted versions next to the latest ones
    Status { username: String },
    /// Accept the latest known version of a product for a user
    Apply { username: String, product_id: i64 },
    /// Show a user's notifications
    Notifications {
        username: String,
        #[arg(long)]
        unread: bool,
        /// Mark them read after printing
        #[arg(long)]
        mark_read: bool,
    },
    #[command(subcommand)]
    Audit(AuditCommand),
}

#[derive(Subcommand)]
enum UserCommand {
    /// Create a user
    Add {
        username: String,
        /// Do not send notifications to this user
        #[arg(long)]
        no_notify: bool,
    },
    /// Enable or disable notifications
    Notify {
        username: String,
        #[arg(action = ArgAction::Set)]
        enabled: bool,
    },
}

#[derive(Subcommand)]
enum AuditCommand {
    /// Declare the installed version of a product
    Add {
        username: String,
        product_id: i64,
        version: String,
    },
    /// Compare declared versions with the latest known ones
    Report { username: String },
    /// Remove all audit entries of a user
    Clear { username: String },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _log_guard = logging::init(&config::log_path(), cli.log_json)
        .context("Failed to initialize logging")?;

    let app_config = AppConfig::load(&config::config_path())?;
    let db_path = config::db_path();
    if let Some(dir) = db_path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create data directory {:?}", dir))?;
    }
    let store = Arc::new(SqliteStore::new(&db_path)?);

    match cli.command {
        Command::Run { now } => runtime()?.block_on(run_scheduler(store, &app_config, now)),
        Command::Update { source } => runtime()?.block_on(run_update(store, &app_config, source)),
        Command::Products => list_products(store.as_ref()),
        Command::History { product_id } => show_history(store.as_ref(), product_id),
        Command::User(command) => user_command(store.as_ref(), command),
        Command::Status { username } => {
            let user = require_user(store.as_ref(), &username)?;
            let status = user_status(store.as_ref(), user.id)?;
            print!("{status}");
            println!("{} update(s) pending", status.pending_count());
            Ok(())
        }
        Command::Apply {
            username,
            product_id,
        } => {
            let user = require_user(store.as_ref(), &username)?;
            if store.apply_latest(user.id, product_id)? {
                println!("Applied latest version of product {product_id} for {username}");
            } else {
                println!("{username} is already on the latest version of product {product_id}");
            }
            Ok(())
        }
        Command::Notifications {
            username,
            unread,
            mark_read,
        } => {
            let user = require_user(store.as_ref(), &username)?;
            for notification in store.notifications(user.id, unread)? {
                let marker = if notification.read { ' ' } else { '*' };
                println!("{marker} {}", notification.message);
            }
            if mark_read {
                let count = store.mark_notifications_read(user.id)?;
                println!("Marked {count} notification(s) read");
            }
            Ok(())
        }
        Command::Audit(command) => audit_command(store.as_ref(), command),
    }
}

fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
}

fn create_reconciler(
    store: Arc<SqliteStore>,
    app_config: &AppConfig,
) -> anyhow::Result<Reconciler<SqliteStore>> {
    let adapters = build_adapters(app_config)?;
    let fetch_timeout = Duration::from_millis(app_config.fetch.timeout.max(0) as u64);
    Ok(Reconciler::new(store, adapters, fetch_timeout))
}

async fn run_update(
    store: Arc<SqliteStore>,
    app_config: &AppConfig,
    source: Option<SourceKind>,
) -> anyhow::Result<()> {
    let reconciler = create_reconciler(store, app_config)?;

    let result = match source {
        Some(kind) => reconciler.reconcile_one(kind).await,
        None => reconciler.reconcile_all().await,
    };

    match result {
        Ok(summary) => {
            print!("{summary}");
            Ok(())
        }
        Err(CycleError::Persistence {
            kind,
            source,
            completed,
        }) => {
            print!("{completed}");
            Err(source).with_context(|| format!("Reconciliation aborted at {kind}"))
        }
        Err(e) => Err(e.into()),
    }
}

async fn run_scheduler(
    store: Arc<SqliteStore>,
    app_config: &AppConfig,
    now: bool,
) -> anyhow::Result<()> {
    let reconciler = Arc::new(create_reconciler(store, app_config)?);
    let interval = Duration::from_millis(app_config.schedule.refresh_interval.max(1) as u64);

    info!("Tracking sources: {:?}", reconciler.sources());
    let handle = Scheduler::start(reconciler, interval);
    if now {
        handle.trigger();
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Interrupted, stopping scheduler");
    handle.stop().await;

    Ok(())
}

fn require_user<S: Store>(store: &S, username: &str) -> anyhow::Result<User> {
    match store.find_user(username)? {
        Some(user) => Ok(user),
        None => bail!("Unknown user: {username}"),
    }
}

fn list_products<S: Store>(store: &S) -> anyhow::Result<()> {
    for product in store.list_products()? {
        let latest = product.latest_version.as_deref().unwrap_or("-");
        match &product.error {
            Some(error) => println!(
                "[{}] {} {}: {} (last candidate rejected: {})",
                product.id, product.vendor, product.name, latest, error
            ),
            None => println!(
                "[{}] {} {}: {}",
                product.id, product.vendor, product.name, latest
            ),
        }
    }
    Ok(())
}

fn show_history<S: Store>(store: &S, product_id: i64) -> anyhow::Result<()> {
    let Some(product) = store.get_product(product_id)? else {
        bail!("Unknown product: {product_id}");
    };

    println!("{} {}", product.vendor, product.name);
    for entry in store.product_versions(product_id)? {
        let date = entry.release_date.as_deref().unwrap_or("-");
        println!("  {} ({})", entry.version, date);
    }
    Ok(())
}

fn user_command<S: Store>(store: &S, command: UserCommand) -> anyhow::Result<()> {
    match command {
        UserCommand::Add {
            username,
            no_notify,
        } => {
            let user = store.create_user(&username, !no_notify)?;
            println!("Created user {} (id {})", user.username, user.id);
        }
        UserCommand::Notify { username, enabled } => {
            let user = require_user(store, &username)?;
            store.set_notify(user.id, enabled)?;
            println!("Notifications for {username}: {enabled}");
        }
    }
    Ok(())
}

fn audit_command<S: Store>(store: &S, command: AuditCommand) -> anyhow::Result<()> {
    match command {
        AuditCommand::Add {
            username,
            product_id,
            version,
        } => {
            let user = require_user(store, &username)?;
            let entry = store.add_audit_entry(user.id, product_id, &version)?;
            println!("Added audit entry {}", entry.id);
        }
        AuditCommand::Report { username } => {
            let user = require_user(store, &username)?;
            let report = audit_report(store, user.id)?;
            if report.is_empty() {
                println!("No audit entries for {username}");
            } else {
                print!("{report}");
                println!("{} product(s) need an update", report.needs_update_count());
            }
        }
        AuditCommand::Clear { username } => {
            let user = require_user(store, &username)?;
            let removed = store.clear_audit(user.id)?;
            println!("Removed {removed} audit entries");
        }
    }
    Ok(())
}
