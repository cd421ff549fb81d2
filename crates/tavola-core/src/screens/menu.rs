use std::sync::Arc;

use serde::Serialize;
use tavola_shared::{
  EntityId,
  MenuItemCreate,
  MenuItemDto,
  MenuItemPatch
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
  FilterView,
  category_facets
};
use crate::form::{
  Draft,
  FormMode,
  FormSession,
  ImageSource,
  parse_decimal,
  require
};
use crate::resource::RemoteResource;
use crate::scheduler::RefreshHandle;

pub const MENU_PATH: &str = "/admin/menu";

const LOAD_FAILED: &str =
  "Failed to load menu items from server";

const MESSAGES: FormMessages = FormMessages {
  added:         "Menu item added successfully",
  updated:       "Menu item updated successfully",
  add_failed:    "Failed to add menu item",
  update_failed: "Failed to update menu item",
  load_failed:   LOAD_FAILED
};

#[derive(Debug, Clone, PartialEq)]
pub struct MenuItemDraft {
  pub name:         String,
  pub category:     String,
  pub price:        String,
  pub description:  String,
  pub image:        ImageSource,
  pub dietary:      String,
  pub cuisine:      String,
  pub chef_special: bool,
  pub available:    bool
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MenuItemPayload {
  Create(MenuItemCreate),
  Update(MenuItemPatch)
}

impl Draft for MenuItemDraft {
  type Entity = MenuItemDto;
  type Payload = MenuItemPayload;

  fn blank() -> Self {
    Self {
      name:         String::new(),
      category:     String::new(),
      price:        String::new(),
      description:  String::new(),
      image:        ImageSource::None,
      dietary:      String::new(),
      cuisine:      String::new(),
      chef_special: false,
      available:    true
    }
  }

  fn from_entity(item: &MenuItemDto) -> Self {
    Self {
      name:         item.name.clone(),
      category:     item.category.clone(),
      price:        item.price.to_string(),
      description:  item
        .description
        .clone()
        .unwrap_or_default(),
      image:        ImageSource::from_existing(
        item.image.as_deref()
      ),
      dietary:      item
        .dietary
        .clone()
        .unwrap_or_default(),
      cuisine:      item
        .cuisine
        .clone()
        .unwrap_or_default(),
      chef_special: item.chef_special,
      available:    item.available
    }
  }

  fn validate(
    &self,
    mode: &FormMode
  ) -> Result<MenuItemPayload, ValidationError> {
    require(&[
      ("name", &self.name),
      ("category", &self.category),
      ("price", &self.price)
    ])?;
    let price = parse_decimal("price", &self.price)?;
    let cuisine = Some(self.cuisine.trim())
      .filter(|c| !c.is_empty())
      .map(str::to_string);

    Ok(match mode {
      | FormMode::Add => {
        MenuItemPayload::Create(MenuItemCreate {
          name: self.name.clone(),
          category: self.category.clone(),
          price,
          description: self.description.clone(),
          image: self.image.payload_value(),
          dietary: self.dietary.clone(),
          cuisine,
          chef_special: self.chef_special
        })
      }
      | FormMode::Edit(_) => {
        MenuItemPayload::Update(MenuItemPatch {
          name: Some(self.name.clone()),
          category: Some(self.category.clone()),
          price: Some(price),
          description: Some(
            self.description.clone()
          ),
          image: Some(self.image.payload_value()),
          dietary: Some(self.dietary.clone()),
          cuisine,
          chef_special: Some(self.chef_special),
          available: Some(self.available)
        })
      }
    })
  }
}

/// Menu management: the item list with
/// search and category filters plus the
/// add/edit modal.
pub struct MenuScreen {
  ctx:     ScreenContext,
  items:   Arc<RemoteResource<MenuItemDto>>,
  view:    FilterView<MenuItemDto>,
  form:    FormSession<MenuItemDraft>,
  refresh: Option<RefreshHandle>
}

impl MenuScreen {
  pub fn new(ctx: ScreenContext) -> Self {
    let items = Arc::new(RemoteResource::new(
      Arc::clone(&ctx.api),
      MENU_PATH
    ));
    Self {
      ctx,
      items,
      view: FilterView::new(),
      form: FormSession::new(),
      refresh: None
    }
  }

  /// First load, then the background
  /// refresh if one is configured.
  #[tracing::instrument(skip(self))]
  pub async fn mount(&mut self) -> ActionOutcome {
    let outcome = self.reload().await;
    if self.refresh.is_none() {
      self.refresh = start_refresh(
        &self.ctx,
        &self.items,
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

  pub fn items(&self) -> &RemoteResource<MenuItemDto> {
    &self.items
  }

  pub fn set_search(&mut self, term: &str) {
    self.view.set_search(term);
  }

  pub fn set_category(&mut self, category: &str) {
    self
      .view
      .set_category(CategoryFilter::parse(category));
  }

  pub fn visible(&mut self) -> Arc<Vec<MenuItemDto>> {
    self.view.visible(&self.items)
  }

  /// Dropdown entries: `all` first,
  /// then categories in menu order.
  pub fn categories(&self) -> Vec<String> {
    category_facets(&self.items.snapshot())
  }

  pub fn form(&self) -> &FormSession<MenuItemDraft> {
    &self.form
  }

  pub fn form_mut(
    &mut self
  ) -> &mut FormSession<MenuItemDraft> {
    &mut self.form
  }

  pub fn open_add(&mut self) {
    self.form.open_add();
  }

  /// Returns `false` when the item is
  /// not in the current snapshot.
  pub fn open_edit(&mut self, id: &EntityId) -> bool {
    match self.items.get(id) {
      | Some(item) => {
        self.form.open_edit(&item);
        true
      }
      | None => false
    }
  }

  pub fn cancel_form(&mut self) {
    self.form.cancel();
  }

  pub async fn reload(&self) -> ActionOutcome {
    load_resource(&self.ctx, &self.items, LOAD_FAILED)
      .await
  }

  #[tracing::instrument(skip(self))]
  pub async fn submit(&mut self) -> ActionOutcome {
    commit_form(
      &self.ctx,
      &mut self.form,
      &self.items,
      &MESSAGES
    )
    .await
  }

  #[tracing::instrument(skip(self), fields(id = %id))]
  pub async fn toggle_availability(
    &self,
    id: &EntityId
  ) -> ActionOutcome {
    let Some(item) = self.items.get(id) else {
      self.ctx.failure(
        "Failed to update item availability"
      );
      return ActionOutcome::Blocked;
    };
    let patch = MenuItemPatch {
      available: Some(!item.available),
      ..MenuItemPatch::default()
    };
    info!(available = !item.available, "toggling availability");
    let result = self.items.update(id, &patch).await;
    report_write(
      &self.ctx,
      result,
      MESSAGES.updated,
      MESSAGES.update_failed,
      LOAD_FAILED
    )
  }

  #[tracing::instrument(skip(self), fields(id = %id))]
  pub async fn delete(&self, id: &EntityId) -> ActionOutcome {
    if !self.ctx.confirm.confirm(
      "Are you sure you want to delete this menu item?"
    ) {
      return ActionOutcome::Declined;
    }
    let result = self.items.delete(id).await;
    report_write(
      &self.ctx,
      result,
      "Menu item deleted successfully",
      "Failed to delete menu item",
      LOAD_FAILED
    )
  }
}

impl Drop for MenuScreen {
  fn drop(&mut self) {
    self.unmount();
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn edit_payload_keeps_availability() {
    let item: MenuItemDto = serde_json::from_value(json!({
      "id": 3, "name": "Gyoza", "category": "Starters",
      "price": "6.50", "available": 0
    }))
    .unwrap();
    let draft = MenuItemDraft::from_entity(&item);
    assert_eq!(draft.price, "6.5");

    let payload = draft
      .validate(&FormMode::Edit(item.id.clone()))
      .unwrap();
    let body = serde_json::to_value(&payload).unwrap();
    assert_eq!(body["available"], json!(false));
    assert_eq!(body["price"], json!(6.5));
    assert!(body.get("cuisine").is_none());
  }

  #[test]
  fn add_payload_sends_one_image_string() {
    let mut draft = MenuItemDraft::blank();
    draft.name = "Ramen".into();
    draft.category = "Noodles".into();
    draft.price = "12.50".into();
    draft.image = ImageSource::embed("r.png", "image/png", b"x");

    let body = serde_json::to_value(
      draft.validate(&FormMode::Add).unwrap()
    )
    .unwrap();
    assert_eq!(body["price"], json!(12.5));
    assert_eq!(body["image"], json!("data:image/png;base64,eA=="));
    assert_eq!(body["chef_special"], json!(false));
    assert!(body.get("available").is_none());
  }
}
