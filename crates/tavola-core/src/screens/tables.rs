use std::sync::Arc;

use tavola_shared::{
  EntityId,
  TableCreate,
  TableDto
};
use tracing::info;

use super::{
  ActionOutcome,
  FormMessages,
  ScreenContext,
  commit_form,
  load_resource,
  report_write,
  start_refresh
};
use crate::api::{
  ApiRequest,
  UploadFile
};
use crate::error::{
  ApiError,
  ValidationError
};
use crate::filter::{
  CategoryFilter,
  FilterView
};
use crate::form::{
  Draft,
  FormMode,
  FormSession,
  parse_decimal_or,
  parse_integer,
  require
};
use crate::resource::RemoteResource;
use crate::scheduler::RefreshHandle;

pub const TABLES_PATH: &str = "/admin/tables";

const LOAD_FAILED: &str =
  "Failed to load tables from server";

const UPLOAD_FAILED: &str = "Failed to upload images";

const MESSAGES: FormMessages = FormMessages {
  added:         "Table added successfully",
  updated:       "Table updated successfully",
  add_failed:    "Failed to add table",
  update_failed: "Failed to update table",
  load_failed:   LOAD_FAILED
};

#[derive(Debug, Clone, PartialEq)]
pub struct TableDraft {
  pub table_number: String,
  pub capacity:     String,
  pub kind:         String,
  pub features:     String,
  pub x_position:   String,
  pub y_position:   String
}

impl Draft for TableDraft {
  type Entity = TableDto;
  type Payload = TableCreate;

  fn blank() -> Self {
    Self {
      table_number: String::new(),
      capacity:     "2".to_string(),
      kind:         String::new(),
      features:     String::new(),
      x_position:   "0".to_string(),
      y_position:   "0".to_string()
    }
  }

  fn from_entity(table: &TableDto) -> Self {
    Self {
      table_number: table.table_number.to_string(),
      capacity:     table.capacity.to_string(),
      kind:         table.kind.clone(),
      features:     table
        .features
        .clone()
        .unwrap_or_default(),
      x_position:   table.x_position.to_string(),
      y_position:   table.y_position.to_string()
    }
  }

  fn validate(
    &self,
    _mode: &FormMode
  ) -> Result<TableCreate, ValidationError> {
    require(&[
      ("table_number", &self.table_number),
      ("type", &self.kind)
    ])?;
    Ok(TableCreate {
      table_number: parse_integer(
        "table_number",
        &self.table_number
      )?,
      capacity:     parse_integer(
        "capacity",
        &self.capacity
      )?,
      kind:         self.kind.clone(),
      features:     self.features.clone(),
      x_position:   parse_decimal_or(
        "x_position",
        &self.x_position,
        0.0
      )?,
      y_position:   parse_decimal_or(
        "y_position",
        &self.y_position,
        0.0
      )?
    })
  }
}

/// Dining tables and their photo
/// galleries.
pub struct TablesScreen {
  ctx:     ScreenContext,
  tables:  Arc<RemoteResource<TableDto>>,
  view:    FilterView<TableDto>,
  form:    FormSession<TableDraft>,
  refresh: Option<RefreshHandle>
}

impl TablesScreen {
  pub fn new(ctx: ScreenContext) -> Self {
    let tables = Arc::new(RemoteResource::new(
      Arc::clone(&ctx.api),
      TABLES_PATH
    ));
    Self {
      ctx,
      tables,
      view: FilterView::new(),
      form: FormSession::new(),
      refresh: None
    }
  }

  #[tracing::instrument(skip(self))]
  pub async fn mount(&mut self) -> ActionOutcome {
    let outcome = self.reload().await;
    if self.refresh.is_none() {
      self.refresh = start_refresh(
        &self.ctx,
        &self.tables,
        LOAD_FAILED
      );
    }
    outcome
  }

  pub fn unmount(&mut self) {
    if let Some(mut handle) = self.refresh.take() {
      handle.cancel();
    }
    self.form.cancel();
  }

  pub fn tables(&self) -> &RemoteResource<TableDto> {
    &self.tables
  }

  pub fn set_search(&mut self, term: &str) {
    self.view.set_search(term);
  }

  /// `all` or a table status.
  pub fn set_status(&mut self, status: &str) {
    self
      .view
      .set_category(CategoryFilter::parse(status));
  }

  pub fn visible(&mut self) -> Arc<Vec<TableDto>> {
    self.view.visible(&self.tables)
  }

  pub fn assets(&self) -> &str {
    &self.ctx.assets
  }

  pub fn thumbnail(&self, table: &TableDto) -> String {
    table.thumbnail_url(&self.ctx.assets)
  }

  pub fn form(&self) -> &FormSession<TableDraft> {
    &self.form
  }

  pub fn form_mut(
    &mut self
  ) -> &mut FormSession<TableDraft> {
    &mut self.form
  }

  pub fn open_add(&mut self) {
    self.form.open_add();
  }

  pub fn cancel_form(&mut self) {
    self.form.cancel();
  }

  pub async fn reload(&self) -> ActionOutcome {
    load_resource(&self.ctx, &self.tables, LOAD_FAILED)
      .await
  }

  #[tracing::instrument(skip(self))]
  pub async fn submit(&mut self) -> ActionOutcome {
    commit_form(
      &self.ctx,
      &mut self.form,
      &self.tables,
      &MESSAGES
    )
    .await
  }

  #[tracing::instrument(skip(self), fields(id = %id))]
  pub async fn delete(&self, id: &EntityId) -> ActionOutcome {
    if !self.ctx.confirm.confirm(
      "Are you sure you want to delete this table? This \
       action cannot be undone."
    ) {
      return ActionOutcome::Declined;
    }
    let result = self.tables.delete(id).await;
    report_write(
      &self.ctx,
      result,
      "Table deleted successfully",
      "Failed to delete table",
      LOAD_FAILED
    )
  }

  /// Sends every file in one multipart
  /// request, then reloads the tables so
  /// counts and thumbnails are fresh.
  #[tracing::instrument(skip(self, files), fields(id = %table_id, files = files.len()))]
  pub async fn upload_images(
    &self,
    table_id: &EntityId,
    files: Vec<UploadFile>
  ) -> ActionOutcome {
    if files.is_empty() {
      self
        .ctx
        .failure("Please select images to upload");
      return ActionOutcome::Blocked;
    }

    let count = files.len();
    let ack = match self
      .ctx
      .uploads
      .upload_table_images(table_id, files)
      .await
    {
      | Ok(ack) if ack.success => ack,
      | Ok(ack) => {
        let message = ack
          .message
          .filter(|m| !m.trim().is_empty())
          .unwrap_or_else(|| UPLOAD_FAILED.to_string());
        self.ctx.failure(&message);
        return ActionOutcome::Failed;
      }
      | Err(err) => {
        self.ctx.failure(&err.user_message(UPLOAD_FAILED));
        return ActionOutcome::Failed;
      }
    };

    info!(count, "images uploaded");
    let outcome = self.tables.reconcile(ack).await;
    report_write(
      &self.ctx,
      Ok::<_, ApiError>(outcome),
      &format!("{count} image(s) uploaded successfully"),
      UPLOAD_FAILED,
      LOAD_FAILED
    )
  }

  #[tracing::instrument(skip(self), fields(table = %table_id, image = %image_id))]
  pub async fn delete_image(
    &self,
    table_id: &EntityId,
    image_id: &EntityId
  ) -> ActionOutcome {
    if !self
      .ctx
      .confirm
      .confirm("Are you sure you want to delete this image?")
    {
      return ActionOutcome::Declined;
    }
    let path = format!(
      "{}/images/{}",
      self.tables.item_path(table_id),
      image_id.as_path_segment()
    );
    let result = self
      .tables
      .write(&path, ApiRequest::delete())
      .await;
    report_write(
      &self.ctx,
      result,
      "Image deleted successfully",
      "Failed to delete image",
      LOAD_FAILED
    )
  }
}

impl Drop for TablesScreen {
  fn drop(&mut self) {
    self.unmount();
  }
}
