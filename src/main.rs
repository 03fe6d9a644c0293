use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use shopfilter::app::App;
use shopfilter::config::Config;
use shopfilter::filter::{
    Collaborators, FilterController, FilterEvent, ItemType, SELECTION_KEY_PREFIX,
};
use shopfilter::page::MemoryPage;
use shopfilter::storage::{Database, DatabaseError};
use shopfilter::transport::{CountSource, HttpTransport, ItemSource};
use shopfilter::ui;

/// Get the config directory path (~/.config/shopfilter/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("shopfilter"))
}

#[derive(Parser, Debug)]
#[command(name = "shopfilter", about = "Browse and filter a storefront catalog from the terminal")]
struct Args {
    /// Config file (default: ~/.config/shopfilter/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Storefront origin, overrides `base_url` from the config file
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// What to list: products or categories
    #[arg(long, value_name = "TYPE", value_parser = parse_item_type)]
    item_type: Option<ItemType>,

    /// Forget saved category selections and exit
    #[arg(long)]
    reset_selection: bool,
}

fn parse_item_type(raw: &str) -> Result<ItemType, String> {
    match raw {
        "products" => Ok(ItemType::Products),
        "categories" => Ok(ItemType::Categories),
        other => Err(format!("expected 'products' or 'categories', got '{}'", other)),
    }
}

/// Send logs to a file so they don't corrupt the TUI.
fn init_logging(config_dir: &std::path::Path) -> Result<()> {
    let log_path = config_dir.join("shopfilter.log");
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file '{}'", log_path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
        println!("Created config directory: {}", config_dir.display());
    }

    // User-only access to saved state and logs
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) =
            std::fs::set_permissions(&config_dir, std::fs::Permissions::from_mode(0o700))
        {
            eprintln!(
                "Warning: failed to restrict permissions on {}: {}",
                config_dir.display(),
                e
            );
        }
    }

    init_logging(&config_dir)?;

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from '{}'", config_path.display()))?;
    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
    }
    if let Some(item_type) = args.item_type {
        config.item_type = item_type;
    }

    let db_path = config_dir.join("state.db");
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in state database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!(
                "Error: Another instance of shopfilter appears to be running. Please close it and try again."
            );
            std::process::exit(1);
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open state database: {}", e)),
    };

    if args.reset_selection {
        let removed = db
            .delete_preferences_by_prefix(SELECTION_KEY_PREFIX)
            .await
            .context("Failed to reset saved selections")?;
        tracing::info!(removed, "Saved category selections reset");
        println!("Forgot {} saved category selection(s).", removed);
        return Ok(());
    }

    if config.categories.is_empty() {
        eprintln!(
            "Note: no [[categories]] in {}; the filter panel will be empty.",
            config_path.display()
        );
    }

    let transport = Arc::new(
        HttpTransport::new(&config.transport_config()).context("Failed to create HTTP client")?,
    );
    let items: Arc<dyn ItemSource> = transport.clone();
    let counts: Arc<dyn CountSource> = transport;

    let (event_tx, event_rx) = mpsc::channel::<FilterEvent>(32);
    let page = MemoryPage::new(config.category_options());
    let controller = FilterController::new(
        page,
        config.controller_options(),
        Collaborators {
            items,
            counts: Some(counts),
            storage: Arc::new(db),
        },
        event_tx,
    )
    .await
    .context("Failed to restore saved category selection")?;

    let mut app = App::new(controller, config.base_url.clone());
    ui::run(&mut app, event_rx).await?;

    println!("Goodbye!");
    Ok(())
}
