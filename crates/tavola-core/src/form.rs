//! Create/edit sessions behind the admin modals.
//!
//! A session owns its draft outright. Opening an edit clones the entity, so
//! typing into the form can never reach the mirrored snapshot; the list only
//! changes after a committed write and the reload that follows it.

use std::path::Path;

use anyhow::Context;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use tavola_shared::{
  Entity,
  EntityId
};
use tracing::debug;

use crate::error::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormMode {
  Add,
  Edit(EntityId)
}

/// Form contents for one entity type.
pub trait Draft: Clone + Send {
  type Entity: Entity;
  type Payload: Serialize + Send + Sync;

  /// Template shown by "add".
  fn blank() -> Self;

  /// Owned copy of `entity` for "edit".
  fn from_entity(entity: &Self::Entity) -> Self;

  /// Required fields and numeric
  /// coercion; runs before any request.
  fn validate(
    &self,
    mode: &FormMode
  ) -> Result<Self::Payload, ValidationError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState<D> {
  Closed,
  Open {
    mode:   FormMode,
    draft:  D,
    notice: Option<String>
  },
  Submitting {
    mode:   FormMode,
    draft:  D,
    ticket: u64
  }
}

#[derive(Debug)]
pub struct Submission<P> {
  pub ticket:  u64,
  pub mode:    FormMode,
  pub payload: P
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitBlocked {
  NotOpen,
  Invalid(ValidationError)
}

#[derive(Debug, Clone)]
pub struct FormSession<D> {
  state:       SessionState<D>,
  next_ticket: u64
}

impl<D> Default for FormSession<D> {
  fn default() -> Self {
    Self {
      state:       SessionState::Closed,
      next_ticket: 0
    }
  }
}

impl<D> FormSession<D>
where
  D: Draft
{
  pub fn new() -> Self {
    Self::default()
  }

  pub fn state(&self) -> &SessionState<D> {
    &self.state
  }

  pub fn is_closed(&self) -> bool {
    matches!(self.state, SessionState::Closed)
  }

  pub fn is_open(&self) -> bool {
    matches!(self.state, SessionState::Open { .. })
  }

  pub fn is_submitting(&self) -> bool {
    matches!(
      self.state,
      SessionState::Submitting { .. }
    )
  }

  pub fn mode(&self) -> Option<&FormMode> {
    match &self.state {
      | SessionState::Closed => None,
      | SessionState::Open {
        mode, ..
      }
      | SessionState::Submitting {
        mode,
        ..
      } => Some(mode)
    }
  }

  pub fn draft(&self) -> Option<&D> {
    match &self.state {
      | SessionState::Closed => None,
      | SessionState::Open {
        draft, ..
      }
      | SessionState::Submitting {
        draft,
        ..
      } => Some(draft)
    }
  }

  /// Editable only while open; a
  /// submitting draft is frozen.
  pub fn draft_mut(&mut self) -> Option<&mut D> {
    match &mut self.state {
      | SessionState::Open {
        draft, ..
      } => Some(draft),
      | _ => None
    }
  }

  pub fn notice(&self) -> Option<&str> {
    match &self.state {
      | SessionState::Open {
        notice, ..
      } => notice.as_deref(),
      | _ => None
    }
  }

  pub fn open_add(&mut self) {
    debug!("opening add form");
    self.state = SessionState::Open {
      mode:   FormMode::Add,
      draft:  D::blank(),
      notice: None
    };
  }

  pub fn open_edit(&mut self, entity: &D::Entity) {
    let id = entity.id().clone();
    debug!(id = %id, "opening edit form");
    self.state = SessionState::Open {
      mode:   FormMode::Edit(id),
      draft:  D::from_entity(entity),
      notice: None
    };
  }

  /// Drops the draft. An in-flight
  /// write keeps going; its completion
  /// will find the session closed.
  pub fn cancel(&mut self) {
    debug!("closing form");
    self.state = SessionState::Closed;
  }

  pub fn begin_submit(
    &mut self
  ) -> Result<Submission<D::Payload>, SubmitBlocked>
  {
    let SessionState::Open {
      mode,
      draft,
      notice
    } = &mut self.state
    else {
      return Err(SubmitBlocked::NotOpen);
    };

    match draft.validate(mode) {
      | Err(err) => {
        *notice = Some(err.user_message());
        Err(SubmitBlocked::Invalid(err))
      }
      | Ok(payload) => {
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        let mode = mode.clone();
        let draft = draft.clone();
        self.state = SessionState::Submitting {
          mode: mode.clone(),
          draft,
          ticket
        };
        Ok(Submission {
          ticket,
          mode,
          payload
        })
      }
    }
  }

  /// Applies the server's verdict for
  /// `ticket`. Returns `false` when the
  /// session moved on in the meantime
  /// (cancelled or reopened) and the
  /// verdict was ignored.
  pub fn finish_submit(
    &mut self,
    ticket: u64,
    result: Result<(), String>
  ) -> bool {
    let current = match &self.state {
      | SessionState::Submitting {
        ticket: current,
        ..
      } => *current,
      | _ => return false
    };
    if current != ticket {
      return false;
    }

    let state = std::mem::replace(
      &mut self.state,
      SessionState::Closed
    );
    if let (
      Err(message),
      SessionState::Submitting {
        mode,
        draft,
        ..
      }
    ) = (result, state)
    {
      self.state = SessionState::Open {
        mode,
        draft,
        notice: Some(message)
      };
    }
    true
  }
}

/// Picture attached to a draft. Setting
/// either form replaces the other.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ImageSource {
  #[default]
  None,
  Url(String),
  Embedded {
    file_name: String,
    data_url:  String
  }
}

impl ImageSource {
  pub fn from_existing(value: Option<&str>) -> Self {
    match value.map(str::trim) {
      | Some(url) if !url.is_empty() => {
        ImageSource::Url(url.to_string())
      }
      | _ => ImageSource::None
    }
  }

  pub fn embed(
    file_name: &str,
    mime: &str,
    bytes: &[u8]
  ) -> Self {
    ImageSource::Embedded {
      file_name: file_name.to_string(),
      data_url:  format!(
        "data:{mime};base64,{}",
        STANDARD.encode(bytes)
      )
    }
  }

  pub async fn embed_file(
    path: &Path
  ) -> anyhow::Result<Self> {
    let bytes = tokio::fs::read(path)
      .await
      .with_context(|| {
        format!(
          "failed to read {}",
          path.display()
        )
      })?;
    let file_name = path
      .file_name()
      .map(|n| n.to_string_lossy().to_string())
      .unwrap_or_default();
    Ok(Self::embed(
      &file_name,
      mime_for_path(path),
      &bytes
    ))
  }

  /// The single string sent in the
  /// write payload.
  pub fn payload_value(&self) -> String {
    match self {
      | ImageSource::None => String::new(),
      | ImageSource::Url(url) => url.clone(),
      | ImageSource::Embedded {
        data_url,
        ..
      } => data_url.clone()
    }
  }
}

pub fn mime_for_path(path: &Path) -> &'static str {
  let ext = path
    .extension()
    .map(|e| e.to_string_lossy().to_ascii_lowercase())
    .unwrap_or_default();
  match ext.as_str() {
    | "jpg" | "jpeg" => "image/jpeg",
    | "png" => "image/png",
    | "gif" => "image/gif",
    | "webp" => "image/webp",
    | "svg" => "image/svg+xml",
    | "avif" => "image/avif",
    | _ => "application/octet-stream"
  }
}

/// Fails with every blank field named,
/// in the order given.
pub fn require(
  fields: &[(&'static str, &str)]
) -> Result<(), ValidationError> {
  let missing: Vec<&'static str> = fields
    .iter()
    .filter(|(_, value)| value.trim().is_empty())
    .map(|(name, _)| *name)
    .collect();
  if missing.is_empty() {
    Ok(())
  } else {
    Err(ValidationError::MissingFields {
      fields: missing
    })
  }
}

pub fn parse_decimal(
  field: &'static str,
  raw: &str
) -> Result<f64, ValidationError> {
  raw
    .trim()
    .parse::<f64>()
    .ok()
    .filter(|value| value.is_finite())
    .ok_or_else(|| ValidationError::NotANumber {
      field,
      value: raw.to_string()
    })
}

pub fn parse_integer(
  field: &'static str,
  raw: &str
) -> Result<i64, ValidationError> {
  raw.trim().parse::<i64>().map_err(|_| {
    ValidationError::NotANumber {
      field,
      value: raw.to_string()
    }
  })
}

/// Blank means "use the default";
/// anything else must parse.
pub fn parse_decimal_or(
  field: &'static str,
  raw: &str,
  default: f64
) -> Result<f64, ValidationError> {
  if raw.trim().is_empty() {
    Ok(default)
  } else {
    parse_decimal(field, raw)
  }
}

pub fn ensure_range(
  field: &'static str,
  value: f64,
  min: f64,
  max: f64
) -> Result<f64, ValidationError> {
  if (min..=max).contains(&value) {
    Ok(value)
  } else {
    Err(ValidationError::OutOfRange {
      field,
      min,
      max
    })
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;
  use tavola_shared::MenuItemDto;

  use super::*;

  #[derive(Debug, Clone, PartialEq)]
  struct NameDraft {
    name:  String,
    price: String
  }

  impl Draft for NameDraft {
    type Entity = MenuItemDto;
    type Payload = (String, f64);

    fn blank() -> Self {
      Self {
        name:  String::new(),
        price: String::new()
      }
    }

    fn from_entity(entity: &MenuItemDto) -> Self {
      Self {
        name:  entity.name.clone(),
        price: entity.price.to_string()
      }
    }

    fn validate(
      &self,
      _mode: &FormMode
    ) -> Result<Self::Payload, ValidationError> {
      require(&[
        ("name", &self.name),
        ("price", &self.price)
      ])?;
      Ok((
        self.name.clone(),
        parse_decimal("price", &self.price)?
      ))
    }
  }

  fn gyoza() -> MenuItemDto {
    serde_json::from_value(json!({
      "id": 5, "name": "Gyoza", "price": 6.5
    }))
    .unwrap()
  }

  #[test]
  fn invalid_draft_stays_open_with_notice() {
    let mut session = FormSession::<NameDraft>::new();
    session.open_add();
    session.draft_mut().unwrap().name = "Udon".into();

    let blocked = session.begin_submit().unwrap_err();
    assert!(matches!(
      blocked,
      SubmitBlocked::Invalid(ValidationError::MissingFields { .. })
    ));
    assert!(session.is_open());
    assert_eq!(
      session.notice(),
      Some("Please fill in all required fields")
    );
    assert_eq!(session.draft().unwrap().name, "Udon");
  }

  #[test]
  fn unparsable_number_is_not_zero() {
    let mut session = FormSession::<NameDraft>::new();
    session.open_add();
    {
      let draft = session.draft_mut().unwrap();
      draft.name = "Udon".into();
      draft.price = "twelve".into();
    }
    assert_eq!(
      session.begin_submit().unwrap_err(),
      SubmitBlocked::Invalid(ValidationError::NotANumber {
        field: "price",
        value: "twelve".to_string()
      })
    );
  }

  #[test]
  fn server_failure_reopens_with_draft() {
    let mut session = FormSession::<NameDraft>::new();
    session.open_edit(&gyoza());
    session.draft_mut().unwrap().price = "7".into();

    let submission = session.begin_submit().unwrap();
    assert_eq!(submission.mode, FormMode::Edit(EntityId::from(5)));
    assert_eq!(submission.payload, ("Gyoza".to_string(), 7.0));
    assert!(session.is_submitting());
    assert!(session.draft_mut().is_none());

    assert!(session.finish_submit(
      submission.ticket,
      Err("Menu item is locked".to_string())
    ));
    assert!(session.is_open());
    assert_eq!(session.notice(), Some("Menu item is locked"));
    assert_eq!(session.draft().unwrap().price, "7");
  }

  #[test]
  fn success_closes_session() {
    let mut session = FormSession::<NameDraft>::new();
    session.open_edit(&gyoza());
    let submission = session.begin_submit().unwrap();
    assert!(session.finish_submit(submission.ticket, Ok(())));
    assert!(session.is_closed());
    assert!(session.draft().is_none());
  }

  #[test]
  fn late_verdict_after_cancel_is_ignored() {
    let mut session = FormSession::<NameDraft>::new();
    session.open_edit(&gyoza());
    let submission = session.begin_submit().unwrap();
    session.cancel();

    assert!(!session.finish_submit(
      submission.ticket,
      Err("too late".to_string())
    ));
    assert!(session.is_closed());

    session.open_add();
    assert!(!session.finish_submit(submission.ticket, Ok(())));
    assert!(session.is_open());
  }

  #[test]
  fn image_source_last_set_wins() {
    let mut image = ImageSource::embed(
      "ramen.png",
      "image/png",
      b"\x89PNG"
    );
    assert_eq!(
      image.payload_value(),
      "data:image/png;base64,iVBORw=="
    );

    image = ImageSource::from_existing(Some("https://cdn/x.jpg"));
    assert_eq!(image.payload_value(), "https://cdn/x.jpg");

    assert_eq!(
      ImageSource::from_existing(Some("  ")),
      ImageSource::None
    );
  }

  #[test]
  fn numeric_helpers() {
    assert_eq!(parse_decimal("price", " 12.50 "), Ok(12.5));
    assert!(parse_decimal("price", "NaN").is_err());
    assert!(parse_integer("capacity", "4.5").is_err());
    assert_eq!(parse_decimal_or("x", "", 0.0), Ok(0.0));
    assert!(ensure_range("rating", 5.5, 0.0, 5.0).is_err());
    assert_eq!(
      mime_for_path(Path::new("a/B.JPG")),
      "image/jpeg"
    );
  }

  #[tokio::test]
  async fn embed_file_inlines_bytes_as_data_url() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gyoza.png");
    tokio::fs::write(&path, [1u8, 2, 3]).await.unwrap();

    let image = ImageSource::embed_file(&path).await.unwrap();
    assert_eq!(
      image,
      ImageSource::Embedded {
        file_name: "gyoza.png".to_string(),
        data_url:  "data:image/png;base64,AQID".to_string()
      }
    );

    let missing =
      ImageSource::embed_file(&dir.path().join("nope.png")).await;
    assert!(missing.is_err());
  }
}
