//! Shiftwatch main entry point
//!
//! This is the command-line interface for the Shiftwatch shift finder.

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use shiftwatch::client::HttpJobSource;
use shiftwatch::config::{load_config_with_hash, Config};
use shiftwatch::coordinator::{landing_url, ChannelMessenger, Coordinator};
use shiftwatch::exhaustion::{ExhaustionKind, ExhaustionStore};
use shiftwatch::poller::PollSettings;
use shiftwatch::storage::{open_storage, SqliteStorage, Storage};
use shiftwatch::tab::{TabAgent, TabOutcome};
use shiftwatch::TabId;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Tab id of the agent the CLI runs in-process
const LOCAL_TAB_ID: TabId = 1;

/// Shiftwatch: a polling shift finder
///
/// Shiftwatch polls a hiring platform's job search, scores open jobs against
/// your shift and city preferences, and opens the application page for the
/// first schedule that matches.
#[derive(Parser, Debug)]
#[command(name = "shiftwatch")]
#[command(version = "1.0.0")]
#[command(about = "A polling shift finder", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Forget the stored session, tabs and exhausted entries before starting
    #[arg(long)]
    fresh: bool,

    /// Validate config and show the search that would run
    #[arg(long, conflicts_with = "status")]
    dry_run: bool,

    /// Show the stored session and exhausted entries and exit
    #[arg(long, conflicts_with = "dry_run")]
    status: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok(loaded) => loaded,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.status {
        handle_status(&config)?;
    } else {
        handle_search(config, cli.fresh).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("shiftwatch=info,warn"),
            1 => EnvFilter::new("shiftwatch=debug,info"),
            2 => EnvFilter::new("shiftwatch=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows the search
fn handle_dry_run(config: &Config) {
    println!("=== Shiftwatch Dry Run ===\n");

    let search = &config.search;
    println!("Search:");
    println!("  Locale: {} ({})", search.locale, search.country);
    println!(
        "  Shifts: {:?}{}",
        search.shifts,
        if search.shifts_prioritized { " (in order)" } else { "" }
    );
    println!(
        "  Cities: {:?}{}",
        search.cities,
        if search.cities_prioritized { " (in order)" } else { "" }
    );
    match &search.location {
        Some(location) => println!(
            "  Within {} mi of {}, {}",
            location.commute_radius, location.lat, location.lng
        ),
        None => println!("  No location restriction"),
    }

    println!("\nClient:");
    println!("  Job search: {}", config.client.endpoint);
    println!("  Schedule search: {}", config.client.schedule_endpoint());
    println!("  Apply page: {}", config.client.apply_url);
    println!("  Timeout: {}ms", config.client.timeout_ms);
    println!(
        "  Bearer token: {}",
        if config.client.bearer_token.is_some() { "set" } else { "none" }
    );

    let poll = &config.poll;
    println!("\nPolling:");
    println!(
        "  Delay: {}ms + up to {}ms jitter",
        poll.delay_base_ms, poll.delay_jitter_ms
    );
    println!(
        "  Backoff: {}ms doubling to {}ms",
        poll.backoff_floor_ms, poll.backoff_cap_ms
    );
    println!("  Exhaustion TTL: {}s", poll.exhaustion_ttl_secs);

    println!("\nTabs:");
    println!("  Target domain: {}", config.tabs.target_domain);
    println!("  Active window: {}ms", config.tabs.active_window_ms);

    println!("\nStorage:");
    println!("  Database: {}", config.storage.database_path);

    println!("\n✓ Configuration is valid");
}

/// Handles the --status mode: shows persisted state
fn handle_status(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.storage.database_path);

    let storage = open_storage(Path::new(&config.storage.database_path))
        .context("failed to open database")?;

    match storage.load_session()? {
        Some(session) => {
            println!("Search active: {}", session.is_active());
            if let Some(tab_id) = session.active_tab_id() {
                println!("Active tab: {}", tab_id);
            }
            println!("Preferences (timestamp {}):", session.app_data_timestamp);
            println!("  {}", serde_json::to_string(&session.app_data)?);
        }
        None => println!("No search session stored"),
    }

    let tabs = storage.load_tabs()?;
    println!("\nRegistered tabs ({}):", tabs.len());
    for tab in &tabs {
        println!("  - {} (last active {})", tab.tab_id, tab.last_active_at);
    }

    let exhaustion = ExhaustionStore::new(
        Arc::new(Mutex::new(storage)),
        config.poll.exhaustion_ttl(),
    );
    let now = Utc::now();
    for kind in [ExhaustionKind::Job, ExhaustionKind::JobSchedulePair] {
        let set = exhaustion.load(kind, now)?;
        println!("\n{} ({}):", kind.storage_key(), set.len());
        for (key, expires_at) in set.entries() {
            println!("  - {} until {}", key, expires_at);
        }
    }

    Ok(())
}

/// Runs the coordinator and one local tab until a schedule is acquired or
/// the user interrupts
async fn handle_search(config: Config, fresh: bool) -> anyhow::Result<()> {
    let mut storage = open_storage(Path::new(&config.storage.database_path))
        .context("failed to open database")?;
    if fresh {
        tracing::info!("Starting fresh (clearing stored session and exhaustion)");
        storage.clear_all()?;
    }
    let storage: Arc<Mutex<SqliteStorage>> = Arc::new(Mutex::new(storage));

    let messenger = ChannelMessenger::new();
    let inbox = messenger.connect(LOCAL_TAB_ID);

    let coordinator = Coordinator::restore(
        storage.clone(),
        messenger,
        &config.tabs,
        config.search.app_data(),
        Utc::now(),
    )
    .await?;
    let resumed = coordinator.resumed();
    let (handle, coordinator_task) = coordinator.spawn();

    let source = HttpJobSource::new(&config.client, &config.search)?;
    let exhaustion = ExhaustionStore::new(storage, config.poll.exhaustion_ttl());
    let mut agent = TabAgent::new(
        LOCAL_TAB_ID,
        landing_url(&config.tabs.target_domain),
        handle.clone(),
        inbox,
        Arc::new(source),
        exhaustion,
        PollSettings::from_config(&config),
    );

    agent.register().await?;
    if resumed {
        tracing::info!("Resuming with stored preferences");
    } else {
        agent.publish_preferences(config.search.app_data()).await?;
    }
    handle.toggle_search(true).await?;
    tracing::info!("Search running, press Ctrl-C to stop");

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupt received, stopping search");
                shutdown.cancel();
            }
        });
    }

    match agent.run(shutdown).await? {
        TabOutcome::Acquired(acquisition) => {
            println!("✓ Found job {} schedule {}", acquisition.job_id, acquisition.schedule_id);
            println!("  Apply at: {}", acquisition.url);
        }
        TabOutcome::Shutdown => {
            handle.toggle_search(false).await?;
            agent.unregister().await?;
            println!("Search stopped");
        }
        TabOutcome::Disconnected => {
            tracing::warn!("Coordinator closed the tab connection");
        }
    }

    drop(agent);
    drop(handle);
    coordinator_task.await?;
    Ok(())
}
