//! tablecache - browse the restaurant directory from the terminal.
//!
//! Reads go through the offline cache: the first `list` populates it from the
//! server, later runs work without a network.

mod output;

use std::io;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tablecache_core::query::ALL;
use tablecache_core::{ApiClient, CacheHandle, Config, Directory, Endpoints, ReviewBatch};

// ============================================================================
// Constants
// ============================================================================

/// Log file written inside the cache directory
const LOG_FILE: &str = "tablecache.log";

/// Environment override for the server base URL
const API_URL_ENV: &str = "TABLECACHE_API_URL";

const USAGE: &str = "\
Usage: tablecache <command> [args]

Commands:
  list [cuisine] [neighborhood]   List restaurants (use \"all\" for no filter)
  show <id>                       Show one restaurant
  reviews <id>                    Show reviews, then any new ones from the server
  favorite <id> <on|off>          Mark or unmark a favorite
  neighborhoods                   List neighborhoods
  cuisines                        List cuisines
  status                          Show what is cached
  clear                           Forget cached restaurants and reviews
  server [url]                    Show or save the server base URL
";

/// Initialize the tracing subscriber for logging.
///
/// Logs go to a file in the cache directory so they do not mix with command
/// output; without a cache directory they go to stderr.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    match log_dir.filter(|dir| std::fs::create_dir_all(dir).is_ok()) {
        Some(dir) => {
            let appender = tracing_appender::rolling::never(dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(filter)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: failed to load config, using defaults: {}", e);
        Config::default()
    });
    let cache_dir = config.cache_dir();

    let _log_guard = init_tracing(cache_dir.as_deref());

    let base_url = std::env::var(API_URL_ENV).unwrap_or_else(|_| config.base_url().to_string());
    info!(base_url = %base_url, cache_dir = ?cache_dir, "tablecache starting");

    let api = ApiClient::new(Endpoints::new(base_url.clone()))?;
    let directory = Directory::new(CacheHandle::from_location(cache_dir), Arc::new(api));

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.first().map(String::as_str) == Some("server") {
        return server_command(config, &base_url, args.get(1));
    }
    let result = run(&directory, &args).await;

    // Let background cache writes land before the runtime shuts down
    directory.wait_for_writeback().await;
    result
}

async fn run(directory: &Directory, args: &[String]) -> Result<()> {
    let command = args.first().map(String::as_str).unwrap_or("help");

    match command {
        "list" => {
            let cuisine = args.get(1).map(String::as_str).unwrap_or(ALL);
            let neighborhood = args.get(2).map(String::as_str).unwrap_or(ALL);
            match directory
                .restaurants_by_cuisine_and_neighborhood(cuisine, neighborhood)
                .await?
            {
                Some(list) => output::print_restaurant_list(&list),
                None => output::print_no_cache(),
            }
        }
        "show" => {
            let id = parse_id(args.get(1))?;
            match directory.restaurant_by_id(id).await? {
                Some(restaurant) => output::print_restaurant(&restaurant),
                None => output::print_no_cache(),
            }
        }
        "reviews" => {
            let id = parse_id(args.get(1))?;
            let mut rx = directory.reviews(id);
            let mut delivered = false;
            while let Some(batch) = rx.recv().await {
                delivered = true;
                match batch {
                    ReviewBatch::Local(reviews) => output::print_reviews("Reviews", &reviews),
                    ReviewBatch::Remote(reviews) if !reviews.is_empty() => {
                        output::print_reviews("New from server", &reviews)
                    }
                    ReviewBatch::Remote(_) => {}
                }
            }
            if !delivered {
                output::print_no_cache();
            }
        }
        "favorite" => {
            let id = parse_id(args.get(1))?;
            let value = match args.get(2).map(String::as_str) {
                Some("on") | Some("true") => true,
                Some("off") | Some("false") => false,
                _ => bail!("favorite expects on or off\n\n{}", USAGE),
            };
            directory.set_favorite(id, value).await;
            let Some(store) = directory.store().await else {
                output::print_no_cache();
                return Ok(());
            };
            match store.restaurant(id)? {
                Some(restaurant) => output::print_favorite(&restaurant),
                None => println!("Restaurant {} is not cached; run `list` first.", id),
            }
        }
        "neighborhoods" => match directory.neighborhoods().await? {
            Some(values) => output::print_values(&values),
            None => output::print_no_cache(),
        },
        "cuisines" => match directory.cuisines().await? {
            Some(values) => output::print_values(&values),
            None => output::print_no_cache(),
        },
        "status" => match directory.cache_status().await? {
            Some(status) => output::print_status(&status),
            None => output::print_no_cache(),
        },
        "clear" => {
            directory.clear_cache().await?;
            println!("Cache cleared.");
        }
        "help" | "--help" | "-h" => print!("{}", USAGE),
        other => bail!("Unknown command: {}\n\n{}", other, USAGE),
    }

    Ok(())
}

/// Print the effective base URL, or persist a new one to the config file.
fn server_command(mut config: Config, current: &str, url: Option<&String>) -> Result<()> {
    match url {
        None => println!("{}", current),
        Some(url) => {
            config.api_base_url = Some(Endpoints::new(url.as_str()).base().to_string());
            config.save().context("Failed to save config")?;
            info!(base_url = %config.base_url(), "Saved server base URL");
            println!("Server set to {}", config.base_url());
            if std::env::var(API_URL_ENV).is_ok() {
                println!("Note: {} is set and takes precedence.", API_URL_ENV);
            }
        }
    }
    Ok(())
}

fn parse_id(arg: Option<&String>) -> Result<i64> {
    let raw = arg.with_context(|| format!("Missing restaurant id\n\n{}", USAGE))?;
    raw.parse()
        .with_context(|| format!("Invalid restaurant id: {}", raw))
}
