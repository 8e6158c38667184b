use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

use kofa::api::{endpoints, Gateway, ReqwestClient};
use kofa::cache::{CacheKey, CacheLayer, CacheSource, CacheStore, Resource, Revalidation};
use kofa::clock::{Clock, SystemClock};
use kofa::config::Config;
use kofa::session::{SessionMonitor, SessionState, UserProfile};
use kofa::storage::{PersistedStore, SqliteStore};

#[derive(Parser, Debug)]
#[command(name = "kofa")]
#[command(about = "Cached, session-aware access to the KOFA vendor dashboard API")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/kofa/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Fetch an endpoint, serving from cache when possible
  Get {
    /// Endpoint name (products, orders, dashboard, ...) or a path starting with '/'
    endpoint: String,

    /// Cache under this key instead of the resource's own
    #[arg(long)]
    cache_key: Option<String>,

    /// Always go to the network and leave the cache alone
    #[arg(long, conflicts_with = "cache_key")]
    no_cache: bool,
  },

  /// Inspect or clear cached responses
  Cache {
    #[command(subcommand)]
    action: CacheAction,
  },

  /// Inspect or change the stored session
  Session {
    #[command(subcommand)]
    action: SessionAction,
  },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
  /// Remove one entry, or every cached response
  Clear { key: Option<String> },
  /// Print a cached entry and whether it is stale
  Show { key: String },
}

#[derive(Subcommand, Debug)]
enum SessionAction {
  /// Show whether a session is active, restoring it as on start-up
  Status,
  /// Start a session for a vendor
  Login {
    #[arg(long)]
    email: String,
    #[arg(long)]
    business_name: Option<String>,
    #[arg(long)]
    phone: Option<String>,
  },
  /// End the session
  Logout,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Keep the guard alive so buffered log lines are flushed on exit
  let _log_guard = init_tracing();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;

  let store = open_store(&config)?;
  let clock: Arc<dyn Clock> = Arc::new(SystemClock);

  match args.command {
    Command::Get {
      endpoint,
      cache_key,
      no_cache,
    } => get(&config, store, clock, &endpoint, cache_key, no_cache).await,
    Command::Cache { action } => cache(store, clock, action),
    Command::Session { action } => session(store, clock, action),
  }
}

fn init_tracing() -> Option<WorkerGuard> {
  let filter = EnvFilter::try_from_env("KOFA_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

  let appender = Config::log_dir().and_then(|dir| {
    RollingFileAppender::builder()
      .rotation(Rotation::DAILY)
      .filename_prefix("kofa")
      .filename_suffix("log")
      .build(dir)
      .ok()
  });

  match appender {
    Some(appender) => {
      let (writer, guard) = tracing_appender::non_blocking(appender);
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
      Some(guard)
    }
    None => {
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
      None
    }
  }
}

fn open_store(config: &Config) -> Result<PersistedStore<SqliteStore>> {
  let backend = match &config.storage.path {
    Some(path) => SqliteStore::open_at(path)?,
    None => SqliteStore::open()?,
  };
  Ok(PersistedStore::new(backend))
}

async fn get(
  config: &Config,
  store: PersistedStore<SqliteStore>,
  clock: Arc<dyn Clock>,
  name: &str,
  cache_key: Option<String>,
  no_cache: bool,
) -> Result<()> {
  let gateway = Gateway::new(ReqwestClient::new()?, config.api.base_url.as_str());
  let resource = name.parse::<Resource>().ok();

  let endpoint = match resource {
    Some(resource) => resource.endpoint().to_string(),
    None => endpoints::resolve(name)
      .ok_or_else(|| eyre!("Unknown endpoint {:?}; pass a path starting with '/'", name))?,
  };

  if no_cache {
    return print_json(&gateway.get(&endpoint).await?);
  }

  let key = match (cache_key, resource) {
    (Some(key), _) => key,
    (None, Some(resource)) => {
      // Scope to the signed-in vendor, as the dashboard does
      let monitor = SessionMonitor::new(store.clone(), clock.clone());
      let key = CacheKey::new(resource);
      match monitor.restore().user() {
        Some(user) => key.for_user(user.id.clone()).to_string(),
        None => key.to_string(),
      }
    }
    (None, None) => endpoint.clone(),
  };

  let layer = CacheLayer::new(CacheStore::new(store, clock), gateway);
  let Revalidation {
    value,
    source,
    cached_at,
    refreshed,
  } = layer.cached_api_call(&endpoint, &key).await?;

  print_json(&value)?;
  match (source, cached_at) {
    (CacheSource::Network, _) => eprintln!("fetched {} (cached as {})", endpoint, key),
    (_, Some(at)) => eprintln!(
      "served {} from cache ({}, written {})",
      key,
      if source == CacheSource::CacheStale { "stale" } else { "fresh" },
      at.to_rfc3339()
    ),
    (_, None) => eprintln!("served {} from cache", key),
  }

  // Let the background refresh land in the cache before exiting
  if refreshed.is_pending_refresh() {
    match refreshed.await {
      Some(_) => eprintln!("cache refreshed"),
      None => eprintln!("refresh failed; cached value kept"),
    }
  }

  Ok(())
}

fn cache(store: PersistedStore<SqliteStore>, clock: Arc<dyn Clock>, action: CacheAction) -> Result<()> {
  let cache = CacheStore::new(store, clock);

  match action {
    CacheAction::Clear { key } => {
      cache.clear_cache(key.as_deref());
      match key {
        Some(key) => eprintln!("cleared {}", key),
        None => eprintln!("cleared all cached responses"),
      }
      Ok(())
    }
    CacheAction::Show { key } => {
      let read = cache
        .get_cache(&key)
        .ok_or_else(|| eyre!("Nothing cached under {:?}", key))?;
      print_json(&read.data)?;
      eprintln!("{}", if read.is_expired { "stale" } else { "fresh" });
      Ok(())
    }
  }
}

fn session(store: PersistedStore<SqliteStore>, clock: Arc<dyn Clock>, action: SessionAction) -> Result<()> {
  let monitor = SessionMonitor::new(store, clock);

  match action {
    SessionAction::Status => {
      let state = monitor.restore();
      match &state {
        SessionState::Active { user } => {
          println!("{}: {} <{}>", state.label(), user.business_name, user.email)
        }
        _ => println!("{}", state.label()),
      }
      if let Some(redirect) = monitor.redirect() {
        eprintln!("next: {}", redirect);
      }
      Ok(())
    }
    SessionAction::Login {
      email,
      business_name,
      phone,
    } => {
      let mut user = UserProfile::new(email, business_name.unwrap_or_default());
      if let Some(phone) = phone {
        user = user.with_phone(phone);
      }
      let state = monitor.login(user);
      println!("{}", state.label());
      Ok(())
    }
    SessionAction::Logout => {
      monitor.logout();
      println!("{}", monitor.state().label());
      Ok(())
    }
  }
}

fn print_json(value: &Value) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}
