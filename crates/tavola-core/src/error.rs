use thiserror::Error;

/// Failure of a request issued to the
/// admin API or the upload channel.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
  #[error("request failed: {message}")]
  Transport { message: String },

  #[error("{message}")]
  Rejected {
    status:  Option<u16>,
    message: String
  },

  #[error(
    "unexpected response shape from {path}"
  )]
  Malformed { path: String }
}

impl ApiError {
  pub fn transport(
    message: impl Into<String>
  ) -> Self {
    ApiError::Transport {
      message: message.into()
    }
  }

  pub fn rejected(
    status: Option<u16>,
    message: impl Into<String>
  ) -> Self {
    ApiError::Rejected {
      status,
      message: message.into()
    }
  }

  /// Message worth showing to the user,
  /// if the server supplied one.
  pub fn server_message(
    &self
  ) -> Option<&str> {
    match self {
      | ApiError::Rejected {
        message,
        ..
      } if !message.trim().is_empty() => {
        Some(message.as_str())
      }
      | _ => None
    }
  }

  /// Notification text: the server's
  /// message when present, otherwise
  /// the caller's fallback.
  pub fn user_message(
    &self,
    fallback: &str
  ) -> String {
    self
      .server_message()
      .unwrap_or(fallback)
      .to_string()
  }
}

/// Client-side form check that failed
/// before anything was sent.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
  #[error("missing required fields: {}", .fields.join(", "))]
  MissingFields { fields: Vec<&'static str> },

  #[error("{field} must be a number, got {value:?}")]
  NotANumber {
    field: &'static str,
    value: String
  },

  #[error("{field} must be between {min} and {max}")]
  OutOfRange {
    field: &'static str,
    min:   f64,
    max:   f64
  }
}

impl ValidationError {
  pub fn user_message(&self) -> String {
    match self {
      | ValidationError::MissingFields {
        ..
      } => "Please fill in all required \
            fields"
        .to_string(),
      | other => other.to_string()
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn user_message_prefers_server_text() {
    let err = ApiError::rejected(
      Some(409),
      "Table number already exists"
    );
    assert_eq!(
      err.user_message("Failed to add table"),
      "Table number already exists"
    );

    let blank =
      ApiError::rejected(Some(500), "  ");
    assert_eq!(
      blank.user_message("Failed to add table"),
      "Failed to add table"
    );

    let transport =
      ApiError::transport("connection reset");
    assert_eq!(
      transport
        .user_message("Failed to delete image"),
      "Failed to delete image"
    );
  }

  #[test]
  fn missing_fields_read_as_form_notice() {
    let err =
      ValidationError::MissingFields {
        fields: vec!["name", "price"]
      };
    assert_eq!(
      err.user_message(),
      "Please fill in all required fields"
    );
    assert_eq!(
      err.to_string(),
      "missing required fields: name, price"
    );
  }
}
