use std::str::FromStr;
use tokio::sync::mpsc;

/// User activity that counts against the idle timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityEvent {
  PointerDown,
  PointerMove,
  KeyDown,
  Scroll,
  TouchStart,
  Click,
}

impl ActivityEvent {
  pub const ALL: [ActivityEvent; 6] = [
    ActivityEvent::PointerDown,
    ActivityEvent::PointerMove,
    ActivityEvent::KeyDown,
    ActivityEvent::Scroll,
    ActivityEvent::TouchStart,
    ActivityEvent::Click,
  ];

  /// DOM event name this activity is reported under
  pub fn dom_name(&self) -> &'static str {
    match self {
      ActivityEvent::PointerDown => "pointerdown",
      ActivityEvent::PointerMove => "pointermove",
      ActivityEvent::KeyDown => "keydown",
      ActivityEvent::Scroll => "scroll",
      ActivityEvent::TouchStart => "touchstart",
      ActivityEvent::Click => "click",
    }
  }
}

impl FromStr for ActivityEvent {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    // mousedown/mousemove are what older browsers report
    match s {
      "pointerdown" | "mousedown" => Ok(ActivityEvent::PointerDown),
      "pointermove" | "mousemove" => Ok(ActivityEvent::PointerMove),
      _ => Self::ALL
        .into_iter()
        .find(|e| e.dom_name() == s)
        .ok_or_else(|| format!("not an activity event: {}", s)),
    }
  }
}

/// Sending half handed to whatever observes input
#[derive(Debug, Clone)]
pub struct ActivitySender {
  tx: mpsc::UnboundedSender<ActivityEvent>,
}

impl ActivitySender {
  /// Report activity. Returns false once nobody is listening.
  pub fn send(&self, event: ActivityEvent) -> bool {
    self.tx.send(event).is_ok()
  }

  pub fn is_closed(&self) -> bool {
    self.tx.is_closed()
  }
}

/// Receiving half, drained by the session monitor
#[derive(Debug)]
pub struct ActivityReceiver {
  rx: mpsc::UnboundedReceiver<ActivityEvent>,
}

impl ActivityReceiver {
  /// Receive the next event
  pub async fn next(&mut self) -> Option<ActivityEvent> {
    self.rx.recv().await
  }
}

pub fn activity_channel() -> (ActivitySender, ActivityReceiver) {
  let (tx, rx) = mpsc::unbounded_channel();
  (ActivitySender { tx }, ActivityReceiver { rx })
}
