use std::io::{
  self,
  BufRead,
  Write
};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{
  debug,
  error,
  info
};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum Level {
  Success,
  Error
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
  pub message: String,
  pub level:   Level
}

/// Fire-and-forget user notices.
pub trait NotificationSink: Send + Sync {
  fn notify(&self, message: &str, level: Level);
}

/// Blocking yes/no question asked
/// before destructive actions.
pub trait ConfirmPrompt: Send + Sync {
  fn confirm(&self, question: &str) -> bool;
}

#[derive(Debug, Default)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
  fn notify(&self, message: &str, level: Level) {
    match level {
      | Level::Success => {
        info!(message, "notification")
      }
      | Level::Error => {
        error!(message, "notification")
      }
    }
  }
}

/// Keeps every notice in memory and
/// forwards it to tracing as well.
#[derive(Debug, Default, Clone)]
pub struct NotificationLog {
  entries: Arc<Mutex<Vec<Notification>>>
}

impl NotificationLog {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn entries(&self) -> Vec<Notification> {
    self.entries.lock().clone()
  }

  /// Removes and returns everything
  /// recorded so far.
  pub fn drain(&self) -> Vec<Notification> {
    std::mem::take(&mut *self.entries.lock())
  }

  pub fn last(&self) -> Option<Notification> {
    self.entries.lock().last().cloned()
  }
}

impl NotificationSink for NotificationLog {
  fn notify(&self, message: &str, level: Level) {
    TracingNotifier.notify(message, level);
    self.entries.lock().push(Notification {
      message: message.to_string(),
      level
    });
  }
}

/// Fixed answer, for `--yes` and tests.
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

impl ConfirmPrompt for AutoConfirm {
  fn confirm(&self, question: &str) -> bool {
    debug!(question, answer = self.0, "auto-answered confirmation");
    self.0
  }
}

#[derive(Debug, Default)]
pub struct StdinConfirm;

impl ConfirmPrompt for StdinConfirm {
  fn confirm(&self, question: &str) -> bool {
    let mut out = io::stderr().lock();
    if write!(out, "{question} [y/N] ").is_err()
      || out.flush().is_err()
    {
      return false;
    }

    let mut answer = String::new();
    if io::stdin()
      .lock()
      .read_line(&mut answer)
      .is_err()
    {
      return false;
    }
    matches!(
      answer.trim().to_ascii_lowercase().as_str(),
      "y" | "yes"
    )
  }
}
