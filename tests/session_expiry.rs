use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use kofa::cache::CacheStore;
use kofa::clock::ManualClock;
use kofa::event::ActivityEvent;
use kofa::session::{
  SessionMonitor, SessionState, UserProfile, HEARTBEAT_INTERVAL, HEARTBEAT_KEY, IDLE_TIMEOUT,
  PROFILE_KEY,
};
use kofa::storage::{KeyValueStore, MemoryStore, PersistedStore, SqliteStore};

const T: i64 = 1_717_000_000_000;

fn vendor() -> UserProfile {
  UserProfile::new("ada@shop.ng", "Ada Kicks")
}

fn monitor<S: KeyValueStore + 'static>(
  store: &PersistedStore<S>,
  clock: &Arc<ManualClock>,
) -> SessionMonitor<S> {
  SessionMonitor::new(store.clone(), clock.clone())
}

#[tokio::test(start_paused = true)]
async fn test_reload_after_long_absence_expires_immediately() {
  let store = PersistedStore::new(MemoryStore::new());
  let clock = Arc::new(ManualClock::new(T));

  let first = monitor(&store, &clock);
  first.login(vendor());
  let sender = first.attach();

  clock.advance(Duration::from_secs(30));
  assert!(sender.send(ActivityEvent::Click));
  tokio::time::sleep(HEARTBEAT_INTERVAL + Duration::from_millis(1)).await;
  assert_eq!(store.get(HEARTBEAT_KEY), Some((T + 30_000).to_string()));

  // Tab closed
  drop(first);

  clock.advance(Duration::from_secs(16 * 60));
  let second = monitor(&store, &clock);
  let timeouts = Arc::new(Mutex::new(0));
  let seen = timeouts.clone();
  second.on_logout(move |_| *seen.lock().unwrap() += 1);

  assert_eq!(second.restore(), SessionState::Expired);
  assert!(!second.is_authenticated());
  assert_eq!(store.get(PROFILE_KEY), None);
  assert_eq!(store.get(HEARTBEAT_KEY), None);

  tokio::time::sleep(IDLE_TIMEOUT * 2).await;
  assert_eq!(*timeouts.lock().unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_reload_within_window_keeps_session() {
  let store = PersistedStore::new(MemoryStore::new());
  let clock = Arc::new(ManualClock::new(T));

  let first = monitor(&store, &clock);
  first.login(vendor());
  drop(first);

  clock.advance(Duration::from_secs(14 * 60));
  let second = monitor(&store, &clock);
  let redirects = Arc::new(Mutex::new(Vec::new()));
  let seen = redirects.clone();
  second.on_logout(move |r| seen.lock().unwrap().push(r.to_string()));

  let state = second.restore();
  assert_eq!(state.user().map(|u| u.email.as_str()), Some("ada@shop.ng"));

  // One minute of the idle window was left
  tokio::time::sleep(Duration::from_secs(61)).await;
  assert_eq!(second.state(), SessionState::Expired);
  assert_eq!(*redirects.lock().unwrap(), vec!["/login?reason=timeout"]);
}

#[tokio::test(start_paused = true)]
async fn test_expiry_leaves_cached_responses_alone() {
  let store = PersistedStore::new(MemoryStore::new());
  let clock = Arc::new(ManualClock::new(T));
  let cache = CacheStore::new(store.clone(), clock.clone());
  cache.set_cache("products", &json!([{"id": 1}]));

  let session = monitor(&store, &clock);
  session.login(vendor());
  tokio::time::sleep(IDLE_TIMEOUT + Duration::from_secs(1)).await;

  assert_eq!(session.state(), SessionState::Expired);
  assert_eq!(store.get(PROFILE_KEY), None);
  assert_eq!(cache.get_cache("products").unwrap().data, json!([{"id": 1}]));
}

#[tokio::test(start_paused = true)]
async fn test_session_survives_restart_on_sqlite() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("storage.db");
  let clock = Arc::new(ManualClock::new(T));

  {
    let store = PersistedStore::new(SqliteStore::open_at(&path).unwrap());
    monitor(&store, &clock).login(vendor().with_phone("+2348000000000"));
  }

  clock.advance(Duration::from_secs(5 * 60));
  let store = PersistedStore::new(SqliteStore::open_at(&path).unwrap());
  let session = monitor(&store, &clock);

  let user = session.restore().user().cloned().unwrap();
  assert_eq!(user.business_name, "Ada Kicks");
  assert_eq!(user.phone.as_deref(), Some("+2348000000000"));

  session.logout();
  assert_eq!(store.get(PROFILE_KEY), None);
  assert_eq!(session.restore(), SessionState::SignedOut);
}
