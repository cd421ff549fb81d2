//! Admin screens: each one composes resources, a filter view, form
//! sessions and an optional refresh schedule. Public methods are action
//! boundaries; whatever fails inside them ends up as a notification.

pub mod menu;
pub mod restaurants;
pub mod tables;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tavola_shared::Entity;
use tracing::debug;

use crate::api::{
  ApiClient,
  UploadChannel
};
use crate::error::ApiError;
use crate::form::{
  Draft,
  FormMode,
  FormSession,
  SubmitBlocked
};
use crate::notify::{
  ConfirmPrompt,
  Level,
  NotificationSink
};
use crate::resource::{
  LoadOutcome,
  MutationOutcome,
  RemoteResource
};
use crate::scheduler::{
  self,
  Refresh,
  RefreshHandle
};

/// Collaborators handed to a screen at
/// mount. Nothing here is global.
#[derive(Clone)]
pub struct ScreenContext {
  pub api:      Arc<dyn ApiClient>,
  pub uploads:  Arc<dyn UploadChannel>,
  pub notifier: Arc<dyn NotificationSink>,
  pub confirm:  Arc<dyn ConfirmPrompt>,
  /// Prefix for relative image paths.
  pub assets:   String,
  /// `None` disables background
  /// refresh.
  pub refresh:  Option<Duration>
}

impl ScreenContext {
  pub fn new(
    api: Arc<dyn ApiClient>,
    uploads: Arc<dyn UploadChannel>,
    notifier: Arc<dyn NotificationSink>,
    confirm: Arc<dyn ConfirmPrompt>
  ) -> Self {
    Self {
      api,
      uploads,
      notifier,
      confirm,
      assets: String::new(),
      refresh: None
    }
  }

  pub fn with_refresh(
    mut self,
    period: Option<Duration>
  ) -> Self {
    self.refresh = period;
    self
  }

  pub fn with_assets(
    mut self,
    assets: impl Into<String>
  ) -> Self {
    self.assets = assets.into();
    self
  }

  pub(crate) fn success(&self, message: &str) {
    self.notifier.notify(message, Level::Success);
  }

  pub(crate) fn failure(&self, message: &str) {
    self.notifier.notify(message, Level::Error);
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
  /// The server accepted the action.
  Done,
  /// The user said no at the prompt.
  Declined,
  /// Stopped before any request
  /// (validation, nothing selected).
  Blocked,
  /// A request was made and failed.
  Failed
}

impl ActionOutcome {
  pub fn is_done(self) -> bool {
    self == ActionOutcome::Done
  }
}

/// Notification texts for one form.
pub(crate) struct FormMessages {
  pub added:         &'static str,
  pub updated:       &'static str,
  pub add_failed:    &'static str,
  pub update_failed: &'static str,
  pub load_failed:   &'static str
}

pub(crate) async fn load_resource<T>(
  ctx: &ScreenContext,
  resource: &RemoteResource<T>,
  load_failed: &str
) -> ActionOutcome
where
  T: Entity + DeserializeOwned + PartialEq
{
  match resource.load().await {
    | Ok(_) => ActionOutcome::Done,
    | Err(err) => {
      debug!(error = %err, "load failed");
      ctx.failure(load_failed);
      ActionOutcome::Failed
    }
  }
}

/// Notifies the outcome of a write and
/// of the reload that followed it.
pub(crate) fn report_write(
  ctx: &ScreenContext,
  result: Result<MutationOutcome, ApiError>,
  success: &str,
  failed: &str,
  load_failed: &str
) -> ActionOutcome {
  match result {
    | Ok(outcome) => {
      ctx.success(success);
      if let Err(err) = outcome.reload {
        debug!(error = %err, "reload after write failed");
        ctx.failure(load_failed);
      }
      ActionOutcome::Done
    }
    | Err(err) => {
      ctx.failure(&err.user_message(failed));
      ActionOutcome::Failed
    }
  }
}

/// Validates and sends the open draft
/// of `session` to `resource`.
pub(crate) async fn commit_form<D>(
  ctx: &ScreenContext,
  session: &mut FormSession<D>,
  resource: &RemoteResource<D::Entity>,
  messages: &FormMessages
) -> ActionOutcome
where
  D: Draft,
  D::Entity: DeserializeOwned + PartialEq
{
  let submission = match session.begin_submit() {
    | Ok(submission) => submission,
    | Err(SubmitBlocked::NotOpen) => {
      return ActionOutcome::Blocked;
    }
    | Err(SubmitBlocked::Invalid(err)) => {
      ctx.failure(&err.user_message());
      return ActionOutcome::Blocked;
    }
  };

  let (result, success, failed) =
    match &submission.mode {
      | FormMode::Add => (
        resource.create(&submission.payload).await,
        messages.added,
        messages.add_failed
      ),
      | FormMode::Edit(id) => (
        resource
          .update(id, &submission.payload)
          .await,
        messages.updated,
        messages.update_failed
      )
    };

  let verdict = match &result {
    | Ok(_) => Ok(()),
    | Err(err) => Err(err.user_message(failed))
  };
  if !session.finish_submit(submission.ticket, verdict) {
    debug!("form closed while submitting");
  }
  report_write(
    ctx,
    result,
    success,
    failed,
    messages.load_failed
  )
}

/// Periodic reload of one resource,
/// with the same failure notice as a
/// user-initiated load.
pub(crate) struct ResourceRefresh<T> {
  pub ctx:         ScreenContext,
  pub resource:    Arc<RemoteResource<T>>,
  pub load_failed: &'static str
}

#[async_trait]
impl<T> Refresh for ResourceRefresh<T>
where
  T: Entity + DeserializeOwned + PartialEq
{
  async fn refresh(&self) {
    match self.resource.load().await {
      | Ok(LoadOutcome::KeptStale {
        reason
      }) => {
        debug!(reason, "background refresh kept stale snapshot");
      }
      | Ok(_) => {}
      | Err(err) => {
        debug!(error = %err, "background refresh failed");
        self.ctx.failure(self.load_failed);
      }
    }
  }
}

pub(crate) fn start_refresh<T>(
  ctx: &ScreenContext,
  resource: &Arc<RemoteResource<T>>,
  load_failed: &'static str
) -> Option<RefreshHandle>
where
  T: Entity + DeserializeOwned + PartialEq
{
  let period = ctx.refresh?;
  let target = Arc::new(ResourceRefresh {
    ctx: ctx.clone(),
    resource: Arc::clone(resource),
    load_failed
  });
  Some(scheduler::start(target, period))
}
