use std::sync::Arc;

use serde::Serialize;
use serde_json::{
  Map,
  Value,
  json
};
use tavola_shared::{
  EntityId,
  RestaurantCreate,
  RestaurantDto,
  RestaurantStatusPatch
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
use crate::error::ValidationError;
use crate::filter::{
  CategoryFilter,
  FilterView
};
use crate::form::{
  Draft,
  FormMode,
  FormSession,
  ImageSource,
  ensure_range,
  parse_decimal,
  require
};
use crate::resource::RemoteResource;
use crate::scheduler::RefreshHandle;

pub const RESTAURANTS_PATH: &str =
  "/super-admin/restaurants";

const LOAD_FAILED: &str =
  "Failed to load restaurants from server";

const MESSAGES: FormMessages = FormMessages {
  added:         "Restaurant added successfully",
  updated:       "Restaurant updated successfully",
  add_failed:    "Failed to add restaurant",
  update_failed: "Failed to update restaurant",
  load_failed:   LOAD_FAILED
};

#[derive(Debug, Clone, PartialEq)]
pub struct RestaurantDraft {
  pub name:           String,
  pub cuisine:        String,
  pub address:        String,
  pub phone:          String,
  pub description:    String,
  pub image:          ImageSource,
  pub admin_id:       String,
  pub admin_password: String,
  pub rating:         String,
  pub is_active:      bool,
  /// Server fields the form does not
  /// show; sent back untouched on edit.
  pub passthrough:    Map<String, Value>
}

/// Full record written back by edit.
#[derive(Debug, Clone, Serialize)]
pub struct RestaurantUpdate {
  pub name:        String,
  pub cuisine:     String,
  pub address:     String,
  pub phone:       String,
  pub description: String,
  pub image:       String,
  pub admin_id:    String,
  /// Left out when the field was
  /// cleared; the server keeps its value.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub rating:      Option<f64>,
  pub is_active:   bool,
  #[serde(flatten)]
  pub passthrough: Map<String, Value>
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RestaurantPayload {
  Create(RestaurantCreate),
  Update(RestaurantUpdate)
}

impl Draft for RestaurantDraft {
  type Entity = RestaurantDto;
  type Payload = RestaurantPayload;

  fn blank() -> Self {
    Self {
      name:           String::new(),
      cuisine:        String::new(),
      address:        String::new(),
      phone:          String::new(),
      description:    String::new(),
      image:          ImageSource::None,
      admin_id:       String::new(),
      admin_password: String::new(),
      rating:         String::new(),
      is_active:      true,
      passthrough:    Map::new()
    }
  }

  fn from_entity(restaurant: &RestaurantDto) -> Self {
    let mut passthrough = restaurant.extra.clone();
    if let Some(orders) = restaurant.total_orders {
      passthrough
        .insert("total_orders".to_string(), json!(orders));
    }
    if let Some(revenue) = restaurant.revenue {
      passthrough
        .insert("revenue".to_string(), json!(revenue));
    }

    Self {
      name: restaurant.name.clone(),
      cuisine: restaurant.cuisine.clone(),
      address: restaurant.address.clone(),
      phone: restaurant.phone.clone(),
      description: restaurant
        .description
        .clone()
        .unwrap_or_default(),
      image: ImageSource::from_existing(
        restaurant.image.as_deref()
      ),
      admin_id: restaurant.admin_id.clone(),
      admin_password: String::new(),
      rating: restaurant.rating.to_string(),
      is_active: restaurant.is_active,
      passthrough
    }
  }

  fn validate(
    &self,
    mode: &FormMode
  ) -> Result<RestaurantPayload, ValidationError> {
    match mode {
      | FormMode::Add => {
        require(&[
          ("name", &self.name),
          ("cuisine", &self.cuisine),
          ("address", &self.address),
          ("phone", &self.phone),
          ("admin_id", &self.admin_id),
          ("admin_password", &self.admin_password)
        ])?;
        Ok(RestaurantPayload::Create(RestaurantCreate {
          name:           self.name.clone(),
          cuisine:        self.cuisine.clone(),
          address:        self.address.clone(),
          phone:          self.phone.clone(),
          description:    self.description.clone(),
          image:          self.image.payload_value(),
          admin_id:       self.admin_id.clone(),
          admin_password: self.admin_password.clone()
        }))
      }
      | FormMode::Edit(_) => {
        require(&[
          ("name", &self.name),
          ("cuisine", &self.cuisine),
          ("address", &self.address),
          ("phone", &self.phone)
        ])?;
        let rating = if self.rating.trim().is_empty() {
          None
        } else {
          Some(ensure_range(
            "rating",
            parse_decimal("rating", &self.rating)?,
            0.0,
            5.0
          )?)
        };
        Ok(RestaurantPayload::Update(RestaurantUpdate {
          name: self.name.clone(),
          cuisine: self.cuisine.clone(),
          address: self.address.clone(),
          phone: self.phone.clone(),
          description: self.description.clone(),
          image: self.image.payload_value(),
          admin_id: self.admin_id.clone(),
          rating,
          is_active: self.is_active,
          passthrough: self.passthrough.clone()
        }))
      }
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestaurantCounts {
  pub total:    usize,
  pub active:   usize,
  pub inactive: usize
}

/// Super-admin oversight of every
/// restaurant on the platform.
pub struct RestaurantsScreen {
  ctx:         ScreenContext,
  restaurants: Arc<RemoteResource<RestaurantDto>>,
  view:        FilterView<RestaurantDto>,
  form:        FormSession<RestaurantDraft>,
  refresh:     Option<RefreshHandle>
}

impl RestaurantsScreen {
  pub fn new(ctx: ScreenContext) -> Self {
    let restaurants = Arc::new(RemoteResource::new(
      Arc::clone(&ctx.api),
      RESTAURANTS_PATH
    ));
    Self {
      ctx,
      restaurants,
      view: FilterView::new(),
      form: FormSession::new(),
      refresh: None
    }
  }

  /// Loads once and keeps the list
  /// fresh until `unmount`.
  #[tracing::instrument(skip(self))]
  pub async fn mount(&mut self) -> ActionOutcome {
    let outcome = self.reload().await;
    if self.refresh.is_none() {
      self.refresh = start_refresh(
        &self.ctx,
        &self.restaurants,
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

  pub fn is_refreshing(&self) -> bool {
    self
      .refresh
      .as_ref()
      .is_some_and(RefreshHandle::is_running)
  }

  pub fn restaurants(
    &self
  ) -> &RemoteResource<RestaurantDto> {
    &self.restaurants
  }

  pub fn set_search(&mut self, term: &str) {
    self.view.set_search(term);
  }

  /// `all`, `active` or `inactive`.
  pub fn set_status(&mut self, status: &str) {
    self
      .view
      .set_category(CategoryFilter::parse(status));
  }

  pub fn visible(&mut self) -> Arc<Vec<RestaurantDto>> {
    self.view.visible(&self.restaurants)
  }

  pub fn details(
    &self,
    id: &EntityId
  ) -> Option<RestaurantDto> {
    self.restaurants.get(id)
  }

  pub fn counts(&self) -> RestaurantCounts {
    let snapshot = self.restaurants.snapshot();
    let active =
      snapshot.iter().filter(|r| r.is_active).count();
    RestaurantCounts {
      total: snapshot.len(),
      active,
      inactive: snapshot.len() - active
    }
  }

  pub fn form(&self) -> &FormSession<RestaurantDraft> {
    &self.form
  }

  pub fn form_mut(
    &mut self
  ) -> &mut FormSession<RestaurantDraft> {
    &mut self.form
  }

  pub fn open_add(&mut self) {
    self.form.open_add();
  }

  pub fn open_edit(&mut self, id: &EntityId) -> bool {
    match self.restaurants.get(id) {
      | Some(restaurant) => {
        self.form.open_edit(&restaurant);
        true
      }
      | None => false
    }
  }

  pub fn cancel_form(&mut self) {
    self.form.cancel();
  }

  pub async fn reload(&self) -> ActionOutcome {
    load_resource(
      &self.ctx,
      &self.restaurants,
      LOAD_FAILED
    )
    .await
  }

  #[tracing::instrument(skip(self))]
  pub async fn submit(&mut self) -> ActionOutcome {
    commit_form(
      &self.ctx,
      &mut self.form,
      &self.restaurants,
      &MESSAGES
    )
    .await
  }

  /// Flips `is_active` through the
  /// status endpoint; the list shows the
  /// new state once the reload lands.
  #[tracing::instrument(skip(self), fields(id = %id))]
  pub async fn toggle_status(
    &self,
    id: &EntityId
  ) -> ActionOutcome {
    const FAILED: &str =
      "Failed to update restaurant status";

    let Some(current) = self.restaurants.get(id) else {
      self.ctx.failure(FAILED);
      return ActionOutcome::Blocked;
    };
    let patch = RestaurantStatusPatch {
      is_active: !current.is_active
    };
    info!(is_active = patch.is_active, "toggling restaurant status");
    let path = format!(
      "{}/status",
      self.restaurants.item_path(id)
    );
    let result =
      self.restaurants.put(&path, &patch).await;
    let success = if patch.is_active {
      "Restaurant activated successfully"
    } else {
      "Restaurant deactivated successfully"
    };
    report_write(
      &self.ctx,
      result,
      success,
      FAILED,
      LOAD_FAILED
    )
  }
}

impl Drop for RestaurantsScreen {
  fn drop(&mut self) {
    self.unmount();
  }
}
