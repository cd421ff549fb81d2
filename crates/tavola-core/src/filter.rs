use std::borrow::Cow;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tavola_shared::{
  Entity,
  MenuItemDto,
  RestaurantDto,
  TableDto
};
use tracing::trace;

use crate::resource::RemoteResource;

/// Sentinel category that disables the
/// category predicate.
pub const ALL: &str = "all";

#[derive(
  Debug, Clone, PartialEq, Eq, Default,
)]
pub enum CategoryFilter {
  #[default]
  All,
  Only(String)
}

impl CategoryFilter {
  pub fn parse(raw: &str) -> Self {
    if raw == ALL {
      CategoryFilter::All
    } else {
      CategoryFilter::Only(raw.to_string())
    }
  }

  pub fn as_str(&self) -> &str {
    match self {
      | CategoryFilter::All => ALL,
      | CategoryFilter::Only(value) => value
    }
  }

  pub fn matches(&self, value: &str) -> bool {
    match self {
      | CategoryFilter::All => true,
      | CategoryFilter::Only(wanted) => {
        wanted == value
      }
    }
  }
}

/// Text the search box looks at, and
/// the single field the category
/// dropdown compares against.
pub trait Searchable {
  fn search_fields(&self) -> Vec<Cow<'_, str>>;

  fn category(&self) -> Cow<'_, str>;
}

impl Searchable for MenuItemDto {
  fn search_fields(&self) -> Vec<Cow<'_, str>> {
    vec![
      Cow::Borrowed(self.name.as_str()),
      Cow::Borrowed(
        self.description.as_deref().unwrap_or("")
      ),
    ]
  }

  fn category(&self) -> Cow<'_, str> {
    Cow::Borrowed(&self.category)
  }
}

impl Searchable for TableDto {
  fn search_fields(&self) -> Vec<Cow<'_, str>> {
    vec![
      Cow::Owned(self.table_number.to_string()),
      Cow::Borrowed(self.kind.as_str()),
      Cow::Borrowed(
        self.features.as_deref().unwrap_or("")
      ),
    ]
  }

  fn category(&self) -> Cow<'_, str> {
    Cow::Borrowed(self.status.as_str())
  }
}

impl Searchable for RestaurantDto {
  fn search_fields(&self) -> Vec<Cow<'_, str>> {
    vec![
      Cow::Borrowed(self.name.as_str()),
      Cow::Borrowed(self.cuisine.as_str()),
      Cow::Borrowed(self.admin_id.as_str()),
    ]
  }

  fn category(&self) -> Cow<'_, str> {
    Cow::Borrowed(if self.is_active {
      "active"
    } else {
      "inactive"
    })
  }
}

pub fn matches<T>(
  item: &T,
  needle: &str,
  category: &CategoryFilter
) -> bool
where
  T: Searchable
{
  if !category.matches(&item.category()) {
    return false;
  }
  if needle.is_empty() {
    return true;
  }
  item
    .search_fields()
    .iter()
    .any(|field| {
      field.to_lowercase().contains(needle)
    })
}

/// Visible subset of `snapshot`, in
/// snapshot order.
pub fn filter<T>(
  snapshot: &[T],
  search: &str,
  category: &CategoryFilter
) -> Vec<T>
where
  T: Searchable + Clone
{
  let needle = search.to_lowercase();
  snapshot
    .iter()
    .filter(|item| {
      matches(*item, &needle, category)
    })
    .cloned()
    .collect()
}

/// `["all", ...]` followed by each
/// distinct non-empty category in the
/// order it first appears.
pub fn category_facets<T>(
  snapshot: &[T]
) -> Vec<String>
where
  T: Searchable
{
  let mut facets = vec![ALL.to_string()];
  for item in snapshot {
    let category = item.category();
    if category.is_empty()
      || facets
        .iter()
        .any(|seen| seen.as_str() == category)
    {
      continue;
    }
    facets.push(category.into_owned());
  }
  facets
}

struct CachedView<T> {
  version:  u64,
  source:   Arc<Vec<T>>,
  search:   String,
  category: CategoryFilter,
  items:    Arc<Vec<T>>
}

/// Search box plus category dropdown
/// over one resource. The visible list
/// is recomputed whenever the snapshot,
/// the term or the category changes.
pub struct FilterView<T> {
  search:     String,
  category:   CategoryFilter,
  cache:      Option<CachedView<T>>,
  recomputed: u64
}

impl<T> Default for FilterView<T> {
  fn default() -> Self {
    Self {
      search:     String::new(),
      category:   CategoryFilter::All,
      cache:      None,
      recomputed: 0
    }
  }
}

impl<T> FilterView<T>
where
  T: Searchable + Entity + DeserializeOwned + PartialEq
{
  pub fn new() -> Self {
    Self::default()
  }

  pub fn search(&self) -> &str {
    &self.search
  }

  pub fn category(&self) -> &CategoryFilter {
    &self.category
  }

  pub fn set_search(
    &mut self,
    term: impl Into<String>
  ) {
    self.search = term.into();
  }

  pub fn set_category(
    &mut self,
    category: CategoryFilter
  ) {
    self.category = category;
  }

  /// How many times the visible list
  /// was actually rebuilt.
  pub fn recompute_count(&self) -> u64 {
    self.recomputed
  }

  pub fn visible(
    &mut self,
    resource: &RemoteResource<T>
  ) -> Arc<Vec<T>> {
    let snapshot = resource.snapshot();
    let version = resource.version();

    if let Some(cache) = self.cache.as_ref()
      && cache.version == version
      && Arc::ptr_eq(&cache.source, &snapshot)
      && cache.search == self.search
      && cache.category == self.category
    {
      return Arc::clone(&cache.items);
    }

    let items = Arc::new(filter(
      &snapshot,
      &self.search,
      &self.category
    ));
    self.recomputed += 1;
    trace!(
      version,
      visible = items.len(),
      total = snapshot.len(),
      "recomputed filtered view"
    );
    self.cache = Some(CachedView {
      version,
      source: snapshot,
      search: self.search.clone(),
      category: self.category.clone(),
      items: Arc::clone(&items)
    });
    items
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn item(
    id: i64,
    name: &str,
    category: &str,
    description: &str
  ) -> MenuItemDto {
    serde_json::from_value(json!({
      "id": id,
      "name": name,
      "category": category,
      "description": description,
      "price": 10
    }))
    .unwrap()
  }

  fn sample() -> Vec<MenuItemDto> {
    vec![
      item(1, "Tonkotsu Ramen", "Noodles", "pork broth"),
      item(2, "Miso Soup", "Soups", "tofu and wakame"),
      item(3, "Shoyu Ramen", "Noodles", "soy base"),
      item(4, "Matcha Ice", "Desserts", "green tea ice cream"),
    ]
  }

  #[test]
  fn empty_term_and_all_is_identity() {
    let snapshot = sample();
    assert_eq!(
      filter(&snapshot, "", &CategoryFilter::All),
      snapshot
    );
  }

  #[test]
  fn search_is_case_insensitive_over_name_and_description()
  {
    let snapshot = sample();
    let names: Vec<_> =
      filter(&snapshot, "RAMEN", &CategoryFilter::All)
        .into_iter()
        .map(|i| i.name)
        .collect();
    assert_eq!(
      names,
      vec!["Tonkotsu Ramen", "Shoyu Ramen"]
    );

    let by_description =
      filter(&snapshot, "Tea", &CategoryFilter::All);
    assert_eq!(by_description.len(), 1);
    assert_eq!(by_description[0].name, "Matcha Ice");
  }

  #[test]
  fn category_and_search_combine_with_and() {
    let snapshot = sample();
    let only_noodles =
      CategoryFilter::parse("Noodles");

    let result =
      filter(&snapshot, "soy", &only_noodles);
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].name, "Shoyu Ramen");

    assert!(
      filter(&snapshot, "miso", &only_noodles)
        .is_empty()
    );
  }

  #[test]
  fn output_is_ordered_subset() {
    let snapshot = sample();
    for term in ["", "a", "o", "ramen", "zzz"] {
      for category in
        ["all", "Noodles", "Soups", "Nope"]
      {
        let out = filter(
          &snapshot,
          term,
          &CategoryFilter::parse(category)
        );
        let mut cursor = 0;
        for found in &out {
          let pos = snapshot[cursor..]
            .iter()
            .position(|s| s == found)
            .expect("filtered item must come from the snapshot");
          cursor += pos + 1;
        }
      }
    }
  }

  #[tokio::test]
  async fn view_tracks_snapshot_term_and_category()
  {
    use std::sync::Arc;

    use crate::testing::MemoryServer;

    let server = Arc::new(MemoryServer::new());
    server.seed(
      "/admin/menu",
      vec![
        json!({ "id": 1, "name": "Shoyu Ramen", "category": "Noodles" }),
        json!({ "id": 2, "name": "Miso Soup", "category": "Soups" })
      ]
    );
    let resource: RemoteResource<MenuItemDto> =
      RemoteResource::new(server.clone(), "/admin/menu");
    let mut view = FilterView::new();

    resource.load().await.unwrap();
    assert_eq!(view.visible(&resource).len(), 2);
    assert_eq!(view.visible(&resource).len(), 2);
    assert_eq!(view.recompute_count(), 1);

    view.set_search("ramen");
    let names: Vec<String> = view
      .visible(&resource)
      .iter()
      .map(|i| i.name.clone())
      .collect();
    assert_eq!(names, vec!["Shoyu Ramen"]);
    assert_eq!(view.recompute_count(), 2);

    view.set_search("");
    view.set_category(CategoryFilter::parse("Soups"));
    let soups = view.visible(&resource);
    assert_eq!(soups.len(), 1);
    assert_eq!(soups[0].name, "Miso Soup");
    assert_eq!(view.recompute_count(), 3);

    // Same rows again: nothing to rebuild.
    resource.load().await.unwrap();
    assert_eq!(view.visible(&resource).len(), 1);
    assert_eq!(view.recompute_count(), 3);

    server.seed(
      "/admin/menu",
      vec![
        json!({ "id": 1, "name": "Shoyu Ramen", "category": "Noodles" }),
        json!({ "id": 2, "name": "Miso Soup", "category": "Soups" }),
        json!({ "id": 3, "name": "Clam Chowder", "category": "Soups" })
      ]
    );
    resource.load().await.unwrap();
    let soups = view.visible(&resource);
    assert_eq!(soups.len(), 2);
    assert_eq!(soups[1].name, "Clam Chowder");
    assert_eq!(view.recompute_count(), 4);
  }

  #[test]
  fn facets_keep_first_seen_order() {
    assert_eq!(
      category_facets(&sample()),
      vec!["all", "Noodles", "Soups", "Desserts"]
    );
  }

  #[test]
  fn restaurants_search_admin_id_and_filter_status()
  {
    let restaurants: Vec<RestaurantDto> =
      serde_json::from_value(json!([
        { "id": 1, "name": "Sakura", "cuisine": "Japanese", "admin_id": "RES001", "is_active": true },
        { "id": 2, "name": "Trattoria", "cuisine": "Italian", "admin_id": "RES002", "is_active": false }
      ]))
      .unwrap();

    let by_admin = filter(
      &restaurants,
      "res002",
      &CategoryFilter::All
    );
    assert_eq!(by_admin.len(), 1);
    assert_eq!(by_admin[0].name, "Trattoria");

    let active = filter(
      &restaurants,
      "",
      &CategoryFilter::parse("active")
    );
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].name, "Sakura");
  }
}
