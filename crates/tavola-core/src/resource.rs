//! Client-side mirror of one server-owned collection.
//!
//! The snapshot is replaced wholesale by a successful load and never patched
//! in place. Writes are followed by a reload instead of a local splice, so
//! the list always shows what the server computed (timestamps, counters).
//!
//! Overlapping loads are allowed. Each load takes a ticket before it
//! suspends, and a response is only applied when no later-issued load has
//! been applied already: the snapshot follows issue order, not arrival
//! order.

use std::sync::Arc;
use std::sync::atomic::{
  AtomicU64,
  AtomicUsize,
  Ordering
};

use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tavola_shared::{
  Entity,
  EntityId,
  WriteAck
};
use tracing::{
  debug,
  info,
  warn
};

use crate::api::{
  ApiClient,
  ApiRequest
};
use crate::envelope::{
  ListResponse,
  normalize_ack,
  normalize_list
};
use crate::error::ApiError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
  /// Snapshot swapped (or confirmed
  /// identical) with `count` entries.
  Replaced { count: usize },
  /// A later-issued load already
  /// landed; this response was dropped.
  Superseded,
  /// Response shape not recognized;
  /// previous snapshot kept.
  KeptStale { reason: String }
}

/// Result of a write that the server
/// accepted. The reload may still fail
/// independently of the write.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationOutcome {
  pub ack:    WriteAck,
  pub reload: Result<LoadOutcome, ApiError>
}

struct SnapshotState<T> {
  items:          Arc<Vec<T>>,
  version:        u64,
  applied_ticket: u64,
  last_warning:   Option<String>
}

pub struct RemoteResource<T> {
  api:       Arc<dyn ApiClient>,
  path:      String,
  state:     RwLock<SnapshotState<T>>,
  issued:    AtomicU64,
  in_flight: AtomicUsize
}

struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
  fn drop(&mut self) {
    self.0.fetch_sub(1, Ordering::SeqCst);
  }
}

impl<T> RemoteResource<T>
where
  T: Entity + DeserializeOwned + PartialEq
{
  pub fn new(
    api: Arc<dyn ApiClient>,
    path: impl Into<String>
  ) -> Self {
    Self {
      api,
      path: path.into(),
      state: RwLock::new(SnapshotState {
        items:          Arc::new(Vec::new()),
        version:        0,
        applied_ticket: 0,
        last_warning:   None
      }),
      issued: AtomicU64::new(0),
      in_flight: AtomicUsize::new(0)
    }
  }

  pub fn path(&self) -> &str {
    &self.path
  }

  pub fn item_path(
    &self,
    id: &EntityId
  ) -> String {
    format!(
      "{}/{}",
      self.path,
      id.as_path_segment()
    )
  }

  /// Shared read-only view of the
  /// current snapshot. Holding it does
  /// not block later replacements.
  pub fn snapshot(&self) -> Arc<Vec<T>> {
    Arc::clone(&self.state.read().items)
  }

  pub fn version(&self) -> u64 {
    self.state.read().version
  }

  pub fn len(&self) -> usize {
    self.state.read().items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Owned copy of one entity, safe to
  /// hand to an edit form.
  pub fn get(&self, id: &EntityId) -> Option<T> {
    self
      .state
      .read()
      .items
      .iter()
      .find(|item| item.id() == id)
      .cloned()
  }

  pub fn last_warning(&self) -> Option<String> {
    self.state.read().last_warning.clone()
  }

  pub fn is_loading(&self) -> bool {
    self.in_flight.load(Ordering::SeqCst) > 0
  }

  #[tracing::instrument(skip(self), fields(path = %self.path))]
  pub async fn load(
    &self
  ) -> Result<LoadOutcome, ApiError> {
    let ticket =
      self.issued.fetch_add(1, Ordering::SeqCst)
        + 1;
    self.in_flight.fetch_add(1, Ordering::SeqCst);
    let _guard = InFlightGuard(&self.in_flight);

    let value = self
      .api
      .call(&self.path, ApiRequest::get())
      .await?;
    let parsed = normalize_list::<T>(value);

    let mut state = self.state.write();
    if ticket < state.applied_ticket {
      debug!(
        ticket,
        applied = state.applied_ticket,
        "dropping superseded load response"
      );
      return Ok(LoadOutcome::Superseded);
    }

    match parsed {
      | ListResponse::Items(items) => {
        let count = items.len();
        state.applied_ticket = ticket;
        state.last_warning = None;
        if *state.items != items {
          state.items = Arc::new(items);
          state.version += 1;
          info!(
            count,
            version = state.version,
            "snapshot replaced"
          );
        } else {
          debug!(count, "snapshot unchanged");
        }
        Ok(LoadOutcome::Replaced {
          count
        })
      }
      | ListResponse::Unrecognized {
        reason
      } => {
        warn!(reason = %reason, "unexpected list response; keeping previous snapshot");
        state.last_warning =
          Some(reason.clone());
        Ok(LoadOutcome::KeptStale {
          reason
        })
      }
    }
  }

  #[tracing::instrument(skip(self, payload), fields(path = %self.path))]
  pub async fn create<P>(
    &self,
    payload: &P
  ) -> Result<MutationOutcome, ApiError>
  where
    P: Serialize + Sync
  {
    let body = encode(payload)?;
    let path = self.path.clone();
    self.write(&path, ApiRequest::post(body)).await
  }

  #[tracing::instrument(skip(self, patch), fields(path = %self.path, id = %id))]
  pub async fn update<P>(
    &self,
    id: &EntityId,
    patch: &P
  ) -> Result<MutationOutcome, ApiError>
  where
    P: Serialize + Sync
  {
    self.put(&self.item_path(id), patch).await
  }

  /// `PUT` to an arbitrary path under
  /// this collection, such as a status
  /// sub-resource.
  pub async fn put<P>(
    &self,
    path: &str,
    body: &P
  ) -> Result<MutationOutcome, ApiError>
  where
    P: Serialize + Sync
  {
    let body = encode(body)?;
    self.write(path, ApiRequest::put(body)).await
  }

  #[tracing::instrument(skip(self), fields(path = %self.path, id = %id))]
  pub async fn delete(
    &self,
    id: &EntityId
  ) -> Result<MutationOutcome, ApiError> {
    self
      .write(
        &self.item_path(id),
        ApiRequest::delete()
      )
      .await
  }

  /// One write request, then a reload
  /// once the acknowledgement is in.
  /// Nothing is retried.
  pub async fn write(
    &self,
    path: &str,
    request: ApiRequest
  ) -> Result<MutationOutcome, ApiError> {
    debug!(path, method = request.method.as_str(), "issuing write");
    let value =
      self.api.call(path, request).await?;
    let ack = normalize_ack(path, value)?;
    Ok(self.reconcile(ack).await)
  }

  /// Reload after a write performed
  /// through another channel (uploads).
  pub async fn reconcile(
    &self,
    ack: WriteAck
  ) -> MutationOutcome {
    let reload = self.load().await;
    if let Err(err) = reload.as_ref() {
      warn!(error = %err, "reload after write failed");
    }
    MutationOutcome {
      ack,
      reload
    }
  }
}

fn encode<P>(
  payload: &P
) -> Result<serde_json::Value, ApiError>
where
  P: Serialize
{
  serde_json::to_value(payload).map_err(|err| {
    ApiError::transport(format!(
      "failed to encode request: {err}"
    ))
  })
}
