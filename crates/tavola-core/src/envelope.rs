//! Normalization of the response shapes the admin API produces.
//!
//! List endpoints answer either with a tagged envelope
//! (`{"success": true, "data": [...]}`) or, on older routes, with a bare
//! array. Both are accepted here so nothing past this module has to care
//! which one arrived.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tavola_shared::WriteAck;
use tracing::trace;

use crate::error::ApiError;

#[derive(Debug, Clone, PartialEq)]
pub enum ListResponse<T> {
  Items(Vec<T>),
  Unrecognized { reason: String }
}

#[tracing::instrument(skip(value))]
pub fn normalize_list<T>(
  value: Value
) -> ListResponse<T>
where
  T: DeserializeOwned
{
  match value {
    | Value::Array(_) => {
      trace!("bare array list response");
      decode_items(value)
    }
    | Value::Object(mut map) => {
      if !is_truthy(map.get("success")) {
        let detail = map
          .get("message")
          .and_then(Value::as_str)
          .map(|m| format!(": {m}"))
          .unwrap_or_default();
        return ListResponse::Unrecognized {
          reason: format!(
            "envelope without success flag{detail}"
          )
        };
      }

      match map.remove("data") {
        | None | Some(Value::Null) => {
          ListResponse::Items(Vec::new())
        }
        | Some(data @ Value::Array(_)) => {
          decode_items(data)
        }
        | Some(_) => {
          ListResponse::Unrecognized {
            reason: "envelope data is not \
                     a list"
              .to_string()
          }
        }
      }
    }
    | other => ListResponse::Unrecognized {
      reason: format!(
        "expected list or envelope, got {}",
        kind_name(&other)
      )
    }
  }
}

/// Write endpoints answer `{success,
/// message?}`. A false flag is a
/// rejection; anything else is a
/// malformed reply.
pub fn normalize_ack(
  path: &str,
  value: Value
) -> Result<WriteAck, ApiError> {
  if !value.is_object() {
    return Err(ApiError::Malformed {
      path: path.to_string()
    });
  }

  let has_flag = value
    .get("success")
    .is_some_and(|flag| !flag.is_null());
  let ack: WriteAck =
    serde_json::from_value(value)
      .map_err(|_| {
        ApiError::Malformed {
          path: path.to_string()
        }
      })?;

  if !has_flag {
    return Err(ApiError::Malformed {
      path: path.to_string()
    });
  }

  if ack.success {
    Ok(ack)
  } else {
    Err(ApiError::rejected(
      None,
      ack.message.clone().unwrap_or_default()
    ))
  }
}

fn decode_items<T>(
  value: Value
) -> ListResponse<T>
where
  T: DeserializeOwned
{
  match serde_json::from_value::<Vec<T>>(
    value
  ) {
    | Ok(items) => ListResponse::Items(items),
    | Err(err) => {
      ListResponse::Unrecognized {
        reason: format!(
          "list entries did not decode: {err}"
        )
      }
    }
  }
}

fn is_truthy(flag: Option<&Value>) -> bool {
  match flag {
    | Some(Value::Bool(b)) => *b,
    | Some(Value::Number(n)) => {
      n.as_f64().is_some_and(|v| v != 0.0)
    }
    | _ => false
  }
}

fn kind_name(value: &Value) -> &'static str {
  match value {
    | Value::Null => "null",
    | Value::Bool(_) => "boolean",
    | Value::Number(_) => "number",
    | Value::String(_) => "string",
    | Value::Array(_) => "array",
    | Value::Object(_) => "object"
  }
}
