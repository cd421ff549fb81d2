//! In-memory stand-ins for the API collaborators, shared by unit and
//! integration tests.

use std::collections::{
  BTreeMap,
  HashMap,
  VecDeque
};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{
  Map,
  Value,
  json
};
use tavola_shared::{
  EntityId,
  WriteAck
};
use tokio::sync::oneshot;

use crate::api::{
  ApiClient,
  ApiRequest,
  Method,
  UploadChannel,
  UploadFile
};
use crate::error::ApiError;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
  pub key:  String,
  pub body: Option<Value>
}

struct Scripted {
  response: Result<Value, ApiError>,
  gate:     Option<oneshot::Receiver<()>>
}

/// Scripted client: responses are
/// queued per `"METHOD /path"` key and
/// handed out in order.
#[derive(Default)]
pub struct FakeApi {
  queues:   Mutex<HashMap<String, VecDeque<Scripted>>>,
  defaults: Mutex<HashMap<String, Result<Value, ApiError>>>,
  calls:    Mutex<Vec<RecordedCall>>
}

impl FakeApi {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push_response(
    &self,
    key: &str,
    response: Result<Value, ApiError>
  ) {
    self
      .queues
      .lock()
      .entry(key.to_string())
      .or_default()
      .push_back(Scripted {
        response,
        gate: None
      });
  }

  /// Queues a response that is held
  /// back until the returned sender
  /// fires (or is dropped).
  pub fn push_gated(
    &self,
    key: &str,
    response: Result<Value, ApiError>
  ) -> oneshot::Sender<()> {
    let (tx, rx) = oneshot::channel();
    self
      .queues
      .lock()
      .entry(key.to_string())
      .or_default()
      .push_back(Scripted {
        response,
        gate: Some(rx)
      });
    tx
  }

  /// Answer used once the queue for
  /// `key` is empty.
  pub fn set_default(
    &self,
    key: &str,
    response: Result<Value, ApiError>
  ) {
    self
      .defaults
      .lock()
      .insert(key.to_string(), response);
  }

  pub fn calls(&self) -> Vec<RecordedCall> {
    self.calls.lock().clone()
  }

  pub fn count(&self, key: &str) -> usize {
    self
      .calls
      .lock()
      .iter()
      .filter(|call| call.key == key)
      .count()
  }
}

#[async_trait]
impl ApiClient for FakeApi {
  async fn call(
    &self,
    path: &str,
    request: ApiRequest
  ) -> Result<Value, ApiError> {
    let key = format!(
      "{} {}",
      request.method.as_str(),
      path
    );
    self.calls.lock().push(RecordedCall {
      key:  key.clone(),
      body: request.body.clone()
    });

    let scripted = self
      .queues
      .lock()
      .get_mut(&key)
      .and_then(VecDeque::pop_front);

    match scripted {
      | Some(Scripted {
        response,
        gate
      }) => {
        if let Some(gate) = gate {
          let _ = gate.await;
        }
        response
      }
      | None => self
        .defaults
        .lock()
        .get(&key)
        .cloned()
        .unwrap_or_else(|| {
          Err(ApiError::transport(format!(
            "no scripted response for {key}"
          )))
        })
    }
  }
}

/// Tiny REST server over JSON objects:
/// `GET` lists, `POST` inserts with the
/// next numeric id, `PUT` merges fields
/// (also on `/{id}/<field>` subpaths),
/// `DELETE` removes.
#[derive(Default)]
pub struct MemoryServer {
  collections:
    Mutex<BTreeMap<String, Vec<Map<String, Value>>>>,
  next_id:     Mutex<i64>,
  calls:       Mutex<Vec<RecordedCall>>
}

impl MemoryServer {
  pub fn new() -> Self {
    Self {
      next_id: Mutex::new(100),
      ..Self::default()
    }
  }

  pub fn seed(
    &self,
    collection: &str,
    rows: Vec<Value>
  ) {
    let rows = rows
      .into_iter()
      .filter_map(|row| match row {
        | Value::Object(map) => Some(map),
        | _ => None
      })
      .collect();
    self
      .collections
      .lock()
      .insert(collection.to_string(), rows);
  }

  pub fn rows(
    &self,
    collection: &str
  ) -> Vec<Map<String, Value>> {
    self
      .collections
      .lock()
      .get(collection)
      .cloned()
      .unwrap_or_default()
  }

  pub fn calls(&self) -> Vec<RecordedCall> {
    self.calls.lock().clone()
  }

  fn split<'a>(
    &self,
    path: &'a str
  ) -> Option<(String, &'a str, Option<&'a str>)>
  {
    let collections = self.collections.lock();
    let base = collections
      .keys()
      .filter(|base| {
        path == base.as_str()
          || path.starts_with(&format!("{base}/"))
      })
      .max_by_key(|base| base.len())?
      .clone();
    drop(collections);

    let rest = path[base.len()..]
      .trim_start_matches('/');
    if rest.is_empty() {
      return Some((base, "", None));
    }
    let mut parts = rest.splitn(2, '/');
    let id = parts.next().unwrap_or_default();
    Some((base, id, parts.next()))
  }
}

#[async_trait]
impl ApiClient for MemoryServer {
  async fn call(
    &self,
    path: &str,
    request: ApiRequest
  ) -> Result<Value, ApiError> {
    self.calls.lock().push(RecordedCall {
      key:  format!(
        "{} {}",
        request.method.as_str(),
        path
      ),
      body: request.body.clone()
    });

    let Some((base, id, sub)) = self.split(path)
    else {
      return Err(ApiError::rejected(
        Some(404),
        "Not found"
      ));
    };

    let mut collections = self.collections.lock();
    let rows = collections
      .get_mut(&base)
      .ok_or_else(|| {
        ApiError::rejected(Some(404), "Not found")
      })?;

    let matches = |row: &Map<String, Value>| {
      row
        .get("id")
        .and_then(|v| {
          serde_json::from_value::<EntityId>(
            v.clone()
          )
          .ok()
        })
        .is_some_and(|rid| {
          rid == EntityId::from(id)
        })
    };

    match (request.method, id.is_empty()) {
      | (Method::Get, true) => Ok(json!({
        "success": true,
        "data": rows.clone()
      })),
      | (Method::Post, true) => {
        let Some(Value::Object(mut row)) =
          request.body
        else {
          return Err(ApiError::rejected(
            Some(400),
            "Body required"
          ));
        };
        let mut next = self.next_id.lock();
        *next += 1;
        row.insert("id".to_string(), json!(*next));
        rows.push(row);
        Ok(json!({ "success": true, "data": { "id": *next } }))
      }
      | (Method::Put, false) => {
        let row = rows
          .iter_mut()
          .find(|row| matches(&**row))
          .ok_or_else(|| {
            ApiError::rejected(Some(404), "Not found")
          })?;
        if let Some(Value::Object(patch)) =
          request.body
        {
          for (k, v) in patch {
            if k != "id" {
              row.insert(k, v);
            }
          }
        }
        Ok(json!({ "success": true }))
      }
      | (Method::Delete, false)
        if sub.is_some() =>
      {
        // `/{id}/<field>/<child>` drops
        // one element of a nested list.
        let (field, child) = sub
          .and_then(|sub| sub.split_once('/'))
          .ok_or_else(|| {
            ApiError::rejected(Some(404), "Not found")
          })?;
        let row = rows
          .iter_mut()
          .find(|row| matches(&**row))
          .ok_or_else(|| {
            ApiError::rejected(Some(404), "Not found")
          })?;
        let Some(Value::Array(children)) =
          row.get_mut(field)
        else {
          return Err(ApiError::rejected(
            Some(404),
            "Not found"
          ));
        };
        let before = children.len();
        children.retain(|c| {
          c.get("id")
            .and_then(|v| {
              serde_json::from_value::<EntityId>(
                v.clone()
              )
              .ok()
            })
            .is_none_or(|cid| {
              cid != EntityId::from(child)
            })
        });
        if children.len() == before {
          return Err(ApiError::rejected(
            Some(404),
            "Not found"
          ));
        }
        Ok(json!({ "success": true }))
      }
      | (Method::Delete, false) => {
        let before = rows.len();
        rows.retain(|row| !matches(row));
        if rows.len() == before {
          return Err(ApiError::rejected(
            Some(404),
            "Not found"
          ));
        }
        Ok(json!({ "success": true }))
      }
      | _ => Err(ApiError::rejected(
        Some(405),
        "Method not allowed"
      ))
    }
  }
}

/// Upload channel that records what it
/// was given and answers with a fixed
/// acknowledgement.
pub struct RecordingUploads {
  answer:  Result<WriteAck, ApiError>,
  batches: Mutex<Vec<(EntityId, Vec<UploadFile>)>>
}

impl RecordingUploads {
  pub fn answering(
    answer: Result<WriteAck, ApiError>
  ) -> Self {
    Self {
      answer,
      batches: Mutex::new(Vec::new())
    }
  }

  pub fn batches(
    &self
  ) -> Vec<(EntityId, Vec<UploadFile>)> {
    self.batches.lock().clone()
  }
}

#[async_trait]
impl UploadChannel for RecordingUploads {
  async fn upload_table_images(
    &self,
    table_id: &EntityId,
    files: Vec<UploadFile>
  ) -> Result<WriteAck, ApiError> {
    self
      .batches
      .lock()
      .push((table_id.clone(), files));
    self.answer.clone()
  }
}
