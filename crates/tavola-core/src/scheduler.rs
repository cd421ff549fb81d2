//! Periodic background refresh for a mounted screen.

use std::sync::Arc;
use std::sync::atomic::{
  AtomicU64,
  Ordering
};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{
  Instant,
  MissedTickBehavior,
  interval_at
};
use tracing::{
  debug,
  warn
};

const MIN_PERIOD: Duration =
  Duration::from_secs(1);

/// Work performed on every tick.
/// Failures are the target's business;
/// the schedule keeps going regardless.
#[async_trait]
pub trait Refresh: Send + Sync {
  async fn refresh(&self);
}

/// Owner of a running schedule. Dropping
/// it has the same effect as `cancel`.
pub struct RefreshHandle {
  stop:   Option<oneshot::Sender<()>>,
  task:   Option<JoinHandle<()>>,
  ticks:  Arc<AtomicU64>,
  period: Duration
}

impl RefreshHandle {
  pub fn period(&self) -> Duration {
    self.period
  }

  /// Completed refreshes so far.
  pub fn ticks(&self) -> u64 {
    self.ticks.load(Ordering::SeqCst)
  }

  pub fn is_running(&self) -> bool {
    self
      .task
      .as_ref()
      .is_some_and(|task| !task.is_finished())
  }

  /// No tick starts after this returns.
  /// A refresh already running is left
  /// to finish.
  pub fn cancel(&mut self) {
    if let Some(stop) = self.stop.take() {
      debug!("cancelling refresh schedule");
      let _ = stop.send(());
    }
  }

  /// Cancels and waits for the loop to
  /// wind down.
  pub async fn shutdown(mut self) {
    self.cancel();
    if let Some(task) = self.task.take()
      && let Err(err) = task.await
    {
      warn!(error = %err, "refresh task ended abnormally");
    }
  }
}

impl Drop for RefreshHandle {
  fn drop(&mut self) {
    self.cancel();
  }
}

/// Calls `target.refresh()` every
/// `period`, first one `period` after
/// start. A slow refresh delays the next
/// tick instead of overlapping it.
pub fn start(
  target: Arc<dyn Refresh>,
  period: Duration
) -> RefreshHandle {
  let period = if period < MIN_PERIOD {
    warn!(
      ?period,
      "refresh period too short, using {MIN_PERIOD:?}"
    );
    MIN_PERIOD
  } else {
    period
  };

  let (stop_tx, mut stop_rx) = oneshot::channel();
  let ticks = Arc::new(AtomicU64::new(0));
  let counter = Arc::clone(&ticks);

  let task = tokio::spawn(async move {
    let mut ticker =
      interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(
      MissedTickBehavior::Delay
    );

    loop {
      tokio::select! {
        biased;
        _ = &mut stop_rx => break,
        _ = ticker.tick() => {
          debug!("refresh tick");
          target.refresh().await;
          counter.fetch_add(1, Ordering::SeqCst);
        }
      }
    }
    debug!("refresh schedule stopped");
  });

  RefreshHandle {
    stop: Some(stop_tx),
    task: Some(task),
    ticks,
    period
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::AtomicUsize;

  use super::*;

  #[derive(Default)]
  struct Counter {
    calls:   AtomicUsize,
    running: AtomicUsize,
    overlap: AtomicUsize,
    delay:   Duration
  }

  #[async_trait]
  impl Refresh for Counter {
    async fn refresh(&self) {
      if self.running.fetch_add(1, Ordering::SeqCst) > 0 {
        self.overlap.fetch_add(1, Ordering::SeqCst);
      }
      if !self.delay.is_zero() {
        tokio::time::sleep(self.delay).await;
      }
      self.calls.fetch_add(1, Ordering::SeqCst);
      self.running.fetch_sub(1, Ordering::SeqCst);
    }
  }

  const MINUTE: Duration = Duration::from_secs(60);

  #[tokio::test(start_paused = true)]
  async fn first_tick_waits_one_period() {
    let target = Arc::new(Counter::default());
    let handle = start(target.clone(), MINUTE);

    tokio::time::sleep(Duration::from_secs(59)).await;
    assert_eq!(target.calls.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(target.calls.load(Ordering::SeqCst), 1);

    tokio::time::sleep(MINUTE * 2).await;
    assert_eq!(target.calls.load(Ordering::SeqCst), 3);
    assert_eq!(handle.ticks(), 3);
  }

  #[tokio::test(start_paused = true)]
  async fn cancel_stops_future_ticks() {
    let target = Arc::new(Counter::default());
    let mut handle = start(target.clone(), MINUTE);

    tokio::time::sleep(Duration::from_secs(61)).await;
    handle.cancel();
    tokio::time::sleep(MINUTE * 10).await;

    assert_eq!(target.calls.load(Ordering::SeqCst), 1);
    assert!(!handle.is_running());
  }

  #[tokio::test(start_paused = true)]
  async fn dropping_handle_unmounts() {
    let target = Arc::new(Counter::default());
    drop(start(target.clone(), MINUTE));

    tokio::time::sleep(MINUTE * 5).await;
    assert_eq!(target.calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test(start_paused = true)]
  async fn slow_refresh_never_overlaps() {
    let target = Arc::new(Counter {
      delay: Duration::from_secs(90),
      ..Counter::default()
    });
    let handle = start(target.clone(), MINUTE);

    tokio::time::sleep(MINUTE * 10).await;
    assert_eq!(target.overlap.load(Ordering::SeqCst), 0);
    assert!(target.calls.load(Ordering::SeqCst) >= 3);
    handle.shutdown().await;
  }

  #[tokio::test(start_paused = true)]
  async fn zero_period_is_clamped() {
    let target = Arc::new(Counter::default());
    let handle = start(target, Duration::ZERO);
    assert_eq!(handle.period(), MIN_PERIOD);
  }
}
