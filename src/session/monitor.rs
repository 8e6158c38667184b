//! Inactivity-based session monitor.
//!
//! The session is persisted as two independent keys: the profile, and a
//! heartbeat holding the last activity time. Activity restarts a single idle
//! countdown; the heartbeat is only written every [`HEARTBEAT_INTERVAL`] so
//! bursts of input don't turn into bursts of storage writes. On start-up the
//! heartbeat tells how long the user has really been away.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, trace, warn};

use super::timer::IdleTimer;
use super::types::{Redirect, SessionState, UserProfile};
use crate::clock::{duration_ms, Clock};
use crate::event::{activity_channel, ActivityEvent, ActivitySender};
use crate::storage::{KeyValueStore, PersistedStore};

/// Storage key of the signed-in profile.
pub const PROFILE_KEY: &str = "session:user";
/// Storage key of the last persisted activity time, in epoch milliseconds.
pub const HEARTBEAT_KEY: &str = "session:last_activity";

/// Inactivity after which the session ends: 15 minutes.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(15 * 60);
/// How often the in-memory activity time is written out.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

type LogoutFn = Arc<dyn Fn(&Redirect) + Send + Sync>;

/// Tracks activity and logs the user out after [`IDLE_TIMEOUT`] without any.
///
/// Timers and listeners run on tokio; every method that can start one must be
/// called from within a runtime.
pub struct SessionMonitor<S: KeyValueStore> {
  inner: Arc<Inner<S>>,
}

struct Inner<S: KeyValueStore> {
  store: PersistedStore<S>,
  clock: Arc<dyn Clock>,
  state: Mutex<SessionState>,
  last_activity: AtomicI64,
  /// Activity happened since the heartbeat was last written
  dirty: AtomicBool,
  timer: IdleTimer,
  heartbeat: Mutex<Option<JoinHandle<()>>>,
  listener: Mutex<Option<Listener>>,
  on_logout: Mutex<Option<LogoutFn>>,
}

struct Listener {
  sender: ActivitySender,
  task: JoinHandle<()>,
}

impl<S: KeyValueStore + 'static> SessionMonitor<S> {
  pub fn new(store: PersistedStore<S>, clock: Arc<dyn Clock>) -> Self {
    let inner = Arc::new(Inner {
      store,
      clock,
      state: Mutex::new(SessionState::SignedOut),
      last_activity: AtomicI64::new(0),
      dirty: AtomicBool::new(false),
      timer: IdleTimer::new(IDLE_TIMEOUT),
      heartbeat: Mutex::new(None),
      listener: Mutex::new(None),
      on_logout: Mutex::new(None),
    });

    let weak = Arc::downgrade(&inner);
    inner.timer.on_expire(move || {
      if let Some(inner) = weak.upgrade() {
        inner.expire();
      }
    });

    Self { inner }
  }

  /// Set the callback run when the session times out.
  pub fn on_logout(&self, f: impl Fn(&Redirect) + Send + Sync + 'static) {
    *lock(&self.inner.on_logout) = Some(Arc::new(f));
  }

  /// Rebuild the session from storage, as on application start.
  ///
  /// A profile whose heartbeat is missing, unreadable or older than
  /// [`IDLE_TIMEOUT`] is cleared right here and the state becomes
  /// [`SessionState::Expired`]; no timer has to run for that. A corrupt
  /// profile is cleared and reads as no session.
  pub fn restore(&self) -> SessionState {
    let inner = &self.inner;

    let Some(raw) = inner.store.get(PROFILE_KEY) else {
      let mut state = lock(&inner.state);
      if state.is_authenticated() {
        inner.stop_timers();
        *state = SessionState::SignedOut;
      }
      return state.clone();
    };

    let user = match serde_json::from_str::<UserProfile>(&raw) {
      Ok(user) => user,
      Err(e) => {
        warn!(error = %e, "discarding corrupt session profile");
        let mut state = lock(&inner.state);
        inner.stop_timers();
        inner.clear_record();
        *state = SessionState::SignedOut;
        return state.clone();
      }
    };

    let now = inner.clock.now_ms();
    let heartbeat = inner
      .store
      .get(HEARTBEAT_KEY)
      .and_then(|raw| raw.trim().parse::<i64>().ok());
    let idle_ms = duration_ms(IDLE_TIMEOUT);

    match heartbeat {
      Some(at) if now.saturating_sub(at) <= idle_ms => {
        // A heartbeat from the future counts as activity right now
        let away = now.saturating_sub(at).max(0);
        let remaining = Duration::from_millis(u64::try_from(idle_ms - away).unwrap_or(0));
        info!(user = %user.id, away_ms = away, "session restored");
        inner.activate(user, at.min(now), remaining)
      }
      _ => {
        info!(user = %user.id, "session expired while away");
        let mut state = lock(&inner.state);
        inner.stop_timers();
        inner.clear_record();
        *state = SessionState::Expired;
        state.clone()
      }
    }
  }

  /// Start a session for `user` after a successful login or signup.
  pub fn login(&self, user: UserProfile) -> SessionState {
    let inner = &self.inner;
    let now = inner.clock.now_ms();

    let profile_saved = match serde_json::to_string(&user) {
      Ok(json) => inner.store.set(PROFILE_KEY, &json),
      Err(e) => {
        warn!(error = %e, "failed to serialize session profile");
        false
      }
    };
    let heartbeat_saved = inner.store.set(HEARTBEAT_KEY, &now.to_string());
    if !(profile_saved && heartbeat_saved) {
      error!("session could not be persisted; it will not survive a restart");
    }

    info!(user = %user.id, "session started");
    inner.activate(user, now, IDLE_TIMEOUT)
  }

  /// End the session at the user's request. No timeout redirect is produced.
  pub fn logout(&self) {
    let inner = &self.inner;
    let mut state = lock(&inner.state);
    inner.stop_timers();
    inner.clear_record();
    *state = SessionState::SignedOut;
    info!("session ended by user");
  }

  /// Note user activity. Ignored unless a session is active.
  pub fn record_activity(&self, event: ActivityEvent) {
    self.inner.record_activity(event);
  }

  /// Start listening for activity and return the handle to report it through.
  ///
  /// Attaching again while a listener is running returns the same channel.
  pub fn attach(&self) -> ActivitySender {
    let mut listener = lock(&self.inner.listener);
    if let Some(current) = listener.as_ref() {
      if !current.task.is_finished() {
        return current.sender.clone();
      }
    }

    let (sender, mut receiver) = activity_channel();
    let weak = Arc::downgrade(&self.inner);
    let task = tokio::spawn(async move {
      while let Some(event) = receiver.next().await {
        let Some(inner) = weak.upgrade() else {
          break;
        };
        inner.record_activity(event);
      }
    });

    debug!("activity listener attached");
    *listener = Some(Listener {
      sender: sender.clone(),
      task,
    });
    sender
  }

  /// Stop listening for activity. Safe to call when nothing is attached.
  pub fn detach(&self) {
    if let Some(listener) = lock(&self.inner.listener).take() {
      listener.task.abort();
      debug!("activity listener detached");
    }
  }

  pub fn is_attached(&self) -> bool {
    lock(&self.inner.listener)
      .as_ref()
      .is_some_and(|l| !l.task.is_finished())
  }

  pub fn state(&self) -> SessionState {
    lock(&self.inner.state).clone()
  }

  pub fn is_authenticated(&self) -> bool {
    lock(&self.inner.state).is_authenticated()
  }

  pub fn user(&self) -> Option<UserProfile> {
    lock(&self.inner.state).user().cloned()
  }

  /// In-memory time of the last activity, in epoch milliseconds.
  pub fn last_activity_ms(&self) -> i64 {
    self.inner.last_activity.load(Ordering::SeqCst)
  }

  /// Where a guarded view should send the user, if anywhere.
  pub fn redirect(&self) -> Option<Redirect> {
    match *lock(&self.inner.state) {
      SessionState::Active { .. } => None,
      SessionState::Expired => Some(Redirect::timed_out()),
      SessionState::SignedOut => Some(Redirect::login()),
    }
  }
}

impl<S: KeyValueStore + 'static> Inner<S> {
  fn activate(self: &Arc<Self>, user: UserProfile, last_activity: i64, remaining: Duration) -> SessionState {
    let mut state = lock(&self.state);
    self.last_activity.store(last_activity, Ordering::SeqCst);
    self.dirty.store(false, Ordering::SeqCst);
    self.timer.reset_after(remaining);
    self.start_heartbeat();
    *state = SessionState::Active { user };
    state.clone()
  }

  fn record_activity(&self, event: ActivityEvent) {
    let state = lock(&self.state);
    if !state.is_authenticated() {
      trace!(?event, "ignoring activity without an active session");
      return;
    }

    self
      .last_activity
      .store(self.clock.now_ms(), Ordering::SeqCst);
    self.dirty.store(true, Ordering::SeqCst);
    self.timer.reset();
  }

  /// Idle countdown elapsed.
  fn expire(&self) {
    let callback = {
      let mut state = lock(&self.state);
      if !state.is_authenticated() {
        return;
      }
      self.stop_heartbeat();
      self.clear_record();
      *state = SessionState::Expired;
      lock(&self.on_logout).clone()
    };

    info!("session expired after inactivity");
    if let Some(callback) = callback {
      callback(&Redirect::timed_out());
    }
  }

  fn start_heartbeat(self: &Arc<Self>) {
    let weak: Weak<Self> = Arc::downgrade(self);
    let task = tokio::spawn(async move {
      let mut ticks = tokio::time::interval(HEARTBEAT_INTERVAL);
      ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
      // First tick completes immediately
      ticks.tick().await;

      loop {
        ticks.tick().await;
        let Some(inner) = weak.upgrade() else {
          break;
        };
        inner.persist_heartbeat();
      }
    });

    if let Some(previous) = lock(&self.heartbeat).replace(task) {
      previous.abort();
    }
  }

  fn persist_heartbeat(&self) {
    if !self.dirty.swap(false, Ordering::SeqCst) {
      return;
    }

    let state = lock(&self.state);
    if !state.is_authenticated() {
      return;
    }

    let at = self.last_activity.load(Ordering::SeqCst);
    if self.store.set(HEARTBEAT_KEY, &at.to_string()) {
      trace!(at, "heartbeat persisted");
    } else {
      // Retry on the next tick
      self.dirty.store(true, Ordering::SeqCst);
      error!("heartbeat could not be persisted; idle expiry will not carry across a restart");
    }
  }

  fn stop_heartbeat(&self) {
    if let Some(task) = lock(&self.heartbeat).take() {
      task.abort();
    }
  }

  fn stop_timers(&self) {
    self.timer.cancel();
    self.stop_heartbeat();
  }

  fn clear_record(&self) {
    self.store.remove(PROFILE_KEY);
    self.store.remove(HEARTBEAT_KEY);
  }
}

impl<S: KeyValueStore> Drop for Inner<S> {
  fn drop(&mut self) {
    if let Some(task) = lock(&self.heartbeat).take() {
      task.abort();
    }
    if let Some(listener) = lock(&self.listener).take() {
      listener.task.abort();
    }
  }
}

/// Lock, recovering from poisoning so a panicked callback can't wedge the monitor.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::clock::ManualClock;
  use crate::storage::{DisabledStore, MemoryStore};
  use std::sync::atomic::AtomicUsize;

  const START: i64 = 1_700_000_000_000;

  struct Harness {
    monitor: SessionMonitor<MemoryStore>,
    store: PersistedStore<MemoryStore>,
    clock: Arc<ManualClock>,
    logouts: Arc<Mutex<Vec<String>>>,
  }

  fn harness() -> Harness {
    let store = PersistedStore::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(START));
    let monitor = SessionMonitor::new(store.clone(), clock.clone());

    let logouts = Arc::new(Mutex::new(Vec::new()));
    let seen = logouts.clone();
    monitor.on_logout(move |redirect| seen.lock().unwrap().push(redirect.to_string()));

    Harness {
      monitor,
      store,
      clock,
      logouts,
    }
  }

  fn profile() -> UserProfile {
    UserProfile::new("ada@shop.ng", "Ada Kicks")
  }

  fn persist_profile(store: &PersistedStore<MemoryStore>, heartbeat: Option<i64>) {
    store.set(PROFILE_KEY, &serde_json::to_string(&profile()).unwrap());
    if let Some(at) = heartbeat {
      store.set(HEARTBEAT_KEY, &at.to_string());
    }
  }

  #[tokio::test(start_paused = true)]
  async fn test_login_persists_both_keys() {
    let h = harness();
    let state = h.monitor.login(profile());

    assert!(state.is_authenticated());
    assert!(h.store.get(PROFILE_KEY).unwrap().contains("Ada Kicks"));
    assert_eq!(h.store.get(HEARTBEAT_KEY), Some(START.to_string()));
    assert_eq!(h.monitor.redirect(), None);
  }

  #[tokio::test(start_paused = true)]
  async fn test_idle_expiry_logs_out_once() {
    let h = harness();
    h.monitor.login(profile());

    tokio::time::sleep(IDLE_TIMEOUT - Duration::from_secs(1)).await;
    assert!(h.monitor.is_authenticated());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.monitor.state(), SessionState::Expired);
    assert_eq!(*h.logouts.lock().unwrap(), vec!["/login?reason=timeout"]);
    assert_eq!(h.store.get(PROFILE_KEY), None);
    assert_eq!(h.store.get(HEARTBEAT_KEY), None);

    tokio::time::sleep(IDLE_TIMEOUT * 2).await;
    assert_eq!(h.logouts.lock().unwrap().len(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_activity_resets_countdown() {
    let h = harness();
    h.monitor.login(profile());

    tokio::time::sleep(Duration::from_secs(10 * 60)).await;
    h.monitor.record_activity(ActivityEvent::KeyDown);
    tokio::time::sleep(Duration::from_secs(10 * 60)).await;
    assert!(h.monitor.is_authenticated());
    assert!(h.logouts.lock().unwrap().is_empty());

    tokio::time::sleep(Duration::from_secs(5 * 60 + 1)).await;
    assert_eq!(h.monitor.state(), SessionState::Expired);
    assert_eq!(h.logouts.lock().unwrap().len(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_activity_does_not_revive_expired_session() {
    let h = harness();
    h.monitor.login(profile());
    tokio::time::sleep(IDLE_TIMEOUT + Duration::from_secs(1)).await;

    h.monitor.record_activity(ActivityEvent::Click);
    assert_eq!(h.monitor.state(), SessionState::Expired);
    assert_eq!(h.monitor.redirect(), Some(Redirect::timed_out()));
    assert_eq!(h.store.get(HEARTBEAT_KEY), None);

    h.monitor.login(profile());
    assert!(h.monitor.is_authenticated());
  }

  #[tokio::test(start_paused = true)]
  async fn test_heartbeat_written_on_interval_only() {
    let h = harness();
    h.monitor.login(profile());

    h.clock.advance(Duration::from_secs(3));
    h.monitor.record_activity(ActivityEvent::PointerMove);
    h.clock.advance(Duration::from_secs(1));
    h.monitor.record_activity(ActivityEvent::Scroll);
    let latest = START + 4_000;

    // Not written per event
    assert_eq!(h.store.get(HEARTBEAT_KEY), Some(START.to_string()));
    assert_eq!(h.monitor.last_activity_ms(), latest);

    tokio::time::sleep(HEARTBEAT_INTERVAL + Duration::from_millis(1)).await;
    assert_eq!(h.store.get(HEARTBEAT_KEY), Some(latest.to_string()));
  }

  #[tokio::test(start_paused = true)]
  async fn test_restore_without_profile_is_signed_out() {
    let h = harness();
    assert_eq!(h.monitor.restore(), SessionState::SignedOut);
    assert_eq!(h.monitor.redirect(), Some(Redirect::login()));
  }

  #[tokio::test(start_paused = true)]
  async fn test_restore_clears_corrupt_profile() {
    let h = harness();
    h.store.set(PROFILE_KEY, "{\"id\":");
    h.store.set(HEARTBEAT_KEY, &START.to_string());

    assert_eq!(h.monitor.restore(), SessionState::SignedOut);
    assert_eq!(h.store.get(PROFILE_KEY), None);
    assert_eq!(h.store.get(HEARTBEAT_KEY), None);
  }

  #[tokio::test(start_paused = true)]
  async fn test_restore_expires_stale_heartbeat_without_timer() {
    let h = harness();
    let sixteen_minutes_ago = START - 16 * 60 * 1000;
    persist_profile(&h.store, Some(sixteen_minutes_ago));

    assert_eq!(h.monitor.restore(), SessionState::Expired);
    assert!(!h.monitor.is_authenticated());
    assert_eq!(h.store.get(PROFILE_KEY), None);
    assert_eq!(h.store.get(HEARTBEAT_KEY), None);
    // Nothing was showing as signed in, so there is nobody to log out
    assert!(h.logouts.lock().unwrap().is_empty());
  }

  #[tokio::test(start_paused = true)]
  async fn test_restore_without_heartbeat_is_expired() {
    let h = harness();
    persist_profile(&h.store, None);

    assert_eq!(h.monitor.restore(), SessionState::Expired);
    assert_eq!(h.store.get(PROFILE_KEY), None);
  }

  #[tokio::test(start_paused = true)]
  async fn test_restore_resumes_remaining_idle_time() {
    let h = harness();
    let ten_minutes_ago = START - 10 * 60 * 1000;
    persist_profile(&h.store, Some(ten_minutes_ago));

    assert!(h.monitor.restore().is_authenticated());
    assert_eq!(h.monitor.user().unwrap().business_name, "Ada Kicks");

    tokio::time::sleep(Duration::from_secs(5 * 60 - 1)).await;
    assert!(h.monitor.is_authenticated());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.monitor.state(), SessionState::Expired);
    assert_eq!(h.logouts.lock().unwrap().len(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_attach_is_idempotent_and_feeds_activity() {
    let h = harness();
    h.monitor.login(profile());

    let first = h.monitor.attach();
    let second = h.monitor.attach();
    assert!(h.monitor.is_attached());

    tokio::time::sleep(Duration::from_secs(14 * 60)).await;
    h.clock.advance(Duration::from_secs(14 * 60));
    assert!(second.send(ActivityEvent::TouchStart));
    tokio::task::yield_now().await;
    assert_eq!(h.monitor.last_activity_ms(), START + 14 * 60 * 1000);

    tokio::time::sleep(Duration::from_secs(14 * 60)).await;
    assert!(h.monitor.is_authenticated());

    h.monitor.detach();
    h.monitor.detach();
    assert!(!h.monitor.is_attached());
    for _ in 0..3 {
      tokio::task::yield_now().await;
    }
    assert!(!first.send(ActivityEvent::Click));
  }

  #[tokio::test(start_paused = true)]
  async fn test_detach_without_attach_is_noop() {
    let h = harness();
    h.monitor.detach();
    assert!(!h.monitor.is_attached());
  }

  #[tokio::test(start_paused = true)]
  async fn test_user_logout_has_no_timeout_redirect() {
    let h = harness();
    h.monitor.login(profile());
    h.monitor.logout();

    assert_eq!(h.monitor.state(), SessionState::SignedOut);
    assert_eq!(h.store.get(PROFILE_KEY), None);

    tokio::time::sleep(IDLE_TIMEOUT * 2).await;
    assert!(h.logouts.lock().unwrap().is_empty());
  }

  #[tokio::test(start_paused = true)]
  async fn test_disabled_storage_still_expires_in_memory() {
    let monitor = SessionMonitor::new(
      PersistedStore::new(DisabledStore),
      Arc::new(ManualClock::new(START)),
    );
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    monitor.on_logout(move |_| {
      counter.fetch_add(1, Ordering::SeqCst);
    });

    assert!(monitor.login(profile()).is_authenticated());
    assert_eq!(monitor.restore(), SessionState::SignedOut);

    monitor.login(profile());
    tokio::time::sleep(IDLE_TIMEOUT + Duration::from_secs(1)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);
  }
}
