use std::fmt;
use std::hash::{
  Hash,
  Hasher
};

use chrono::{
  DateTime,
  NaiveDateTime,
  Utc
};
use serde::{
  Deserialize,
  Serialize
};
use serde_json::{
  Map,
  Value
};

pub const MENU_CATEGORIES: &[&str] = &[
  "Starters",
  "Mains",
  "Desserts",
  "Beverages",
  "Pizza",
  "Pasta",
  "Sushi",
  "Sashimi",
  "Noodles",
  "Salads",
  "Soups"
];

pub const MENU_CUISINES: &[&str] = &[
  "Italian",
  "Japanese",
  "Chinese",
  "Mexican",
  "Indian",
  "Thai",
  "French",
  "Mediterranean",
  "American",
  "Korean",
  "Vietnamese",
  "Greek",
  "Spanish"
];

pub const RESTAURANT_CUISINES: &[&str] = &[
  "Fine Dining",
  "Italian",
  "Japanese",
  "Chinese",
  "Mexican",
  "Indian",
  "Thai",
  "French",
  "Mediterranean",
  "American"
];

pub const TABLE_TYPES: &[&str] = &[
  "couple", "family", "group", "private"
];

pub const TABLE_CAPACITIES: &[i64] =
  &[2, 4, 6, 8, 10, 12];

pub const TABLE_PLACEHOLDER_IMAGE:
  &str = "https://images.pexels.com/photos/67468/pexels-photo-67468.jpeg";

/// Server-issued identifier. The
/// backend hands out integers for some
/// collections and strings for others;
/// two ids are equal when their
/// textual forms are equal.
#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
#[serde(untagged)]
pub enum EntityId {
  Number(i64),
  Text(String)
}

impl EntityId {
  pub fn as_path_segment(
    &self
  ) -> String {
    self.to_string()
  }
}

impl fmt::Display for EntityId {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    match self {
      | EntityId::Number(n) => {
        write!(f, "{n}")
      }
      | EntityId::Text(s) => {
        f.write_str(s)
      }
    }
  }
}

impl PartialEq for EntityId {
  fn eq(&self, other: &Self) -> bool {
    self.to_string() == other.to_string()
  }
}

impl Eq for EntityId {}

impl Hash for EntityId {
  fn hash<H: Hasher>(
    &self,
    state: &mut H
  ) {
    self.to_string().hash(state);
  }
}

impl From<i64> for EntityId {
  fn from(value: i64) -> Self {
    EntityId::Number(value)
  }
}

impl From<&str> for EntityId {
  fn from(value: &str) -> Self {
    // "0012" and "+12" stay text: the
    // server would not recognize "12".
    match value.parse::<i64>() {
      | Ok(n) if n.to_string() == value => {
        EntityId::Number(n)
      }
      | _ => {
        EntityId::Text(value.to_string())
      }
    }
  }
}

impl std::str::FromStr for EntityId {
  type Err = std::convert::Infallible;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    Ok(EntityId::from(s.trim()))
  }
}

/// Anything mirrored from a server
/// collection.
pub trait Entity:
  Clone + Send + Sync + 'static
{
  fn id(&self) -> &EntityId;
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct MenuItemDto {
  pub id:           EntityId,
  #[serde(default)]
  pub name:         String,
  #[serde(default)]
  pub category:     String,
  #[serde(
    default,
    deserialize_with = "lenient::f64_value"
  )]
  pub price:        f64,
  #[serde(default)]
  pub description:  Option<String>,
  #[serde(default)]
  pub image:        Option<String>,
  #[serde(default)]
  pub dietary:      Option<String>,
  #[serde(default)]
  pub cuisine:      Option<String>,
  #[serde(
    default,
    deserialize_with = "lenient::bool_value"
  )]
  pub chef_special: bool,
  #[serde(
    default = "default_true",
    deserialize_with = "lenient::bool_value"
  )]
  pub available:    bool,
  #[serde(flatten)]
  pub extra:        Map<String, Value>
}

impl Entity for MenuItemDto {
  fn id(&self) -> &EntityId {
    &self.id
  }
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct MenuItemCreate {
  pub name:         String,
  pub category:     String,
  pub price:        f64,
  pub description:  String,
  pub image:        String,
  pub dietary:      String,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub cuisine:      Option<String>,
  pub chef_special: bool
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  Default,
)]
pub struct MenuItemPatch {
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub name:         Option<String>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub category:     Option<String>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub price:        Option<f64>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub description:  Option<String>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub image:        Option<String>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub dietary:      Option<String>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub cuisine:      Option<String>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub chef_special: Option<bool>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub available:    Option<bool>
}

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
#[serde(rename_all = "lowercase")]
pub enum TableStatus {
  Available,
  Reserved,
  Occupied,
  #[default]
  #[serde(other)]
  Unknown
}

impl TableStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      | TableStatus::Available => {
        "available"
      }
      | TableStatus::Reserved => {
        "reserved"
      }
      | TableStatus::Occupied => {
        "occupied"
      }
      | TableStatus::Unknown => "unknown"
    }
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct TableImageDto {
  pub id:         EntityId,
  #[serde(
    default,
    alias = "image_path",
    alias = "url"
  )]
  pub path:       String,
  #[serde(
    default,
    deserialize_with = "lenient::bool_value"
  )]
  pub is_primary: bool,
  #[serde(default)]
  pub created_at: Option<String>
}

impl TableImageDto {
  /// Accepts RFC 3339 as well as the
  /// `YYYY-MM-DD HH:MM:SS` form SQL
  /// backends emit.
  pub fn created_at_utc(
    &self
  ) -> Option<DateTime<Utc>> {
    let raw = self.created_at.as_deref()?;
    if let Ok(dt) =
      DateTime::parse_from_rfc3339(raw)
    {
      return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(
      raw,
      "%Y-%m-%d %H:%M:%S"
    )
    .ok()
    .map(|naive| naive.and_utc())
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct TableDto {
  pub id:              EntityId,
  #[serde(
    default,
    deserialize_with = "lenient::i64_value"
  )]
  pub table_number:    i64,
  #[serde(
    default,
    deserialize_with = "lenient::i64_value"
  )]
  pub capacity:        i64,
  #[serde(rename = "type", default)]
  pub kind:            String,
  #[serde(default)]
  pub features:        Option<String>,
  #[serde(
    default,
    deserialize_with = "lenient::f64_value"
  )]
  pub x_position:      f64,
  #[serde(
    default,
    deserialize_with = "lenient::f64_value"
  )]
  pub y_position:      f64,
  #[serde(default)]
  pub status:          TableStatus,
  #[serde(default)]
  pub thumbnail_image: Option<String>,
  #[serde(
    default,
    deserialize_with = "lenient::opt_u32_value"
  )]
  pub image_count:     Option<u32>,
  #[serde(default)]
  pub images:          Vec<TableImageDto>,
  #[serde(flatten)]
  pub extra:           Map<String, Value>
}

impl Entity for TableDto {
  fn id(&self) -> &EntityId {
    &self.id
  }
}

impl TableDto {
  pub fn primary_image(
    &self
  ) -> Option<&TableImageDto> {
    self
      .images
      .iter()
      .find(|image| image.is_primary)
  }

  pub fn photo_count(&self) -> usize {
    self
      .image_count
      .map(|count| count as usize)
      .unwrap_or(self.images.len())
  }

  /// Stored image paths are relative to
  /// the asset host, placeholder URLs
  /// are absolute.
  pub fn thumbnail_url(
    &self,
    asset_host: &str
  ) -> String {
    let path = self
      .primary_image()
      .map(|image| image.path.as_str())
      .or(self.thumbnail_image.as_deref())
      .filter(|path| !path.is_empty());

    match path {
      | Some(path)
        if path.starts_with("http://")
          || path.starts_with("https://") =>
      {
        path.to_string()
      }
      | Some(path) => format!(
        "{}{}",
        asset_host.trim_end_matches('/'),
        path
      ),
      | None => {
        TABLE_PLACEHOLDER_IMAGE.to_string()
      }
    }
  }
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct TableCreate {
  pub table_number: i64,
  pub capacity:     i64,
  #[serde(rename = "type")]
  pub kind:         String,
  pub features:     String,
  pub x_position:   f64,
  pub y_position:   f64
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct RestaurantDto {
  pub id:           EntityId,
  #[serde(default)]
  pub name:         String,
  #[serde(default)]
  pub cuisine:      String,
  #[serde(default)]
  pub address:      String,
  #[serde(default)]
  pub phone:        String,
  #[serde(default)]
  pub description:  Option<String>,
  #[serde(default)]
  pub image:        Option<String>,
  #[serde(default)]
  pub admin_id:     String,
  #[serde(
    default,
    deserialize_with = "lenient::f64_value"
  )]
  pub rating:       f64,
  #[serde(
    default,
    deserialize_with = "lenient::bool_value"
  )]
  pub is_active:    bool,
  #[serde(
    default,
    deserialize_with = "lenient::opt_u64_value"
  )]
  pub total_orders: Option<u64>,
  #[serde(
    default,
    deserialize_with = "lenient::opt_f64_value"
  )]
  pub revenue:      Option<f64>,
  #[serde(flatten)]
  pub extra:        Map<String, Value>
}

impl Entity for RestaurantDto {
  fn id(&self) -> &EntityId {
    &self.id
  }
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct RestaurantCreate {
  pub name:           String,
  pub cuisine:        String,
  pub address:        String,
  pub phone:          String,
  pub description:    String,
  pub image:          String,
  pub admin_id:       String,
  pub admin_password: String
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct RestaurantStatusPatch {
  pub is_active: bool
}

/// Acknowledgement returned by write
/// endpoints and the image upload
/// channel.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Default,
)]
pub struct WriteAck {
  #[serde(
    default,
    deserialize_with = "lenient::bool_value"
  )]
  pub success: bool,
  #[serde(default)]
  pub message: Option<String>,
  #[serde(default)]
  pub data:    Option<Value>
}

fn default_true() -> bool {
  true
}

mod lenient {
  use serde::{
    Deserialize,
    Deserializer,
    de
  };
  use serde_json::Value;

  pub fn f64_value<'de, D>(
    deserializer: D
  ) -> Result<f64, D::Error>
  where
    D: Deserializer<'de>
  {
    match Value::deserialize(deserializer)? {
      | Value::Null => Ok(0.0),
      | Value::Number(n) => n
        .as_f64()
        .ok_or_else(|| {
          de::Error::custom(
            "number out of range"
          )
        }),
      | Value::String(s) => s
        .trim()
        .parse::<f64>()
        .map_err(de::Error::custom),
      | other => Err(de::Error::custom(
        format!("expected number, got {other}")
      ))
    }
  }

  pub fn i64_value<'de, D>(
    deserializer: D
  ) -> Result<i64, D::Error>
  where
    D: Deserializer<'de>
  {
    match Value::deserialize(deserializer)? {
      | Value::Null => Ok(0),
      | Value::Number(n) => {
        if let Some(v) = n.as_i64() {
          Ok(v)
        } else {
          n.as_f64()
            .filter(|v| v.fract() == 0.0)
            .map(|v| v as i64)
            .ok_or_else(|| {
              de::Error::custom(
                "expected integer"
              )
            })
        }
      }
      | Value::String(s) => s
        .trim()
        .parse::<i64>()
        .map_err(de::Error::custom),
      | other => Err(de::Error::custom(
        format!("expected integer, got {other}")
      ))
    }
  }

  /// Aggregates (`COUNT`, `SUM` over
  /// NUMERIC) arrive as strings from
  /// some drivers; null stays `None`.
  pub fn opt_f64_value<'de, D>(
    deserializer: D
  ) -> Result<Option<f64>, D::Error>
  where
    D: Deserializer<'de>
  {
    match Value::deserialize(deserializer)? {
      | Value::Null => Ok(None),
      | Value::String(s)
        if s.trim().is_empty() =>
      {
        Ok(None)
      }
      | value => f64_value(value)
        .map(Some)
        .map_err(de::Error::custom)
    }
  }

  pub fn opt_u64_value<'de, D>(
    deserializer: D
  ) -> Result<Option<u64>, D::Error>
  where
    D: Deserializer<'de>
  {
    match Value::deserialize(deserializer)? {
      | Value::Null => Ok(None),
      | Value::String(s)
        if s.trim().is_empty() =>
      {
        Ok(None)
      }
      | value => {
        let n = i64_value(value)
          .map_err(de::Error::custom)?;
        u64::try_from(n)
          .map(Some)
          .map_err(de::Error::custom)
      }
    }
  }

  pub fn opt_u32_value<'de, D>(
    deserializer: D
  ) -> Result<Option<u32>, D::Error>
  where
    D: Deserializer<'de>
  {
    opt_u64_value(deserializer)?
      .map(u32::try_from)
      .transpose()
      .map_err(de::Error::custom)
  }

  /// SQLite-backed endpoints report
  /// booleans as 0/1.
  pub fn bool_value<'de, D>(
    deserializer: D
  ) -> Result<bool, D::Error>
  where
    D: Deserializer<'de>
  {
    match Value::deserialize(deserializer)? {
      | Value::Null => Ok(false),
      | Value::Bool(b) => Ok(b),
      | Value::Number(n) => {
        Ok(n.as_f64().unwrap_or(0.0) != 0.0)
      }
      | Value::String(s) => Ok(matches!(
        s.trim()
          .to_ascii_lowercase()
          .as_str(),
        "1" | "true" | "yes"
      )),
      | other => Err(de::Error::custom(
        format!("expected boolean, got {other}")
      ))
    }
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn entity_ids_compare_by_text() {
    let numeric: EntityId =
      serde_json::from_value(json!(7))
        .unwrap();
    let text: EntityId =
      serde_json::from_value(json!("7"))
        .unwrap();
    assert_eq!(numeric, text);
    assert_eq!(
      "abc".parse::<EntityId>().unwrap(),
      EntityId::Text("abc".to_string())
    );
  }

  #[test]
  fn menu_item_tolerates_sql_shapes() {
    let item: MenuItemDto =
      serde_json::from_value(json!({
        "id": 3,
        "name": "Ramen",
        "category": "Noodles",
        "price": "12.50",
        "description": null,
        "chef_special": 1,
        "spice_level": "hot"
      }))
      .unwrap();

    assert_eq!(item.price, 12.5);
    assert!(item.chef_special);
    assert!(item.available);
    assert_eq!(item.description, None);
    assert_eq!(
      item.extra.get("spice_level"),
      Some(&json!("hot"))
    );
  }

  #[test]
  fn non_canonical_numeric_ids_stay_text() {
    assert_eq!(
      "12".parse::<EntityId>().unwrap(),
      EntityId::Number(12)
    );
    for raw in ["0012", "+12", "-0"] {
      let id = raw.parse::<EntityId>().unwrap();
      assert_eq!(
        id,
        EntityId::Text(raw.to_string())
      );
      assert_eq!(id.as_path_segment(), raw);
      assert_ne!(id, EntityId::Number(12));
    }
  }

  #[test]
  fn restaurant_tolerates_string_aggregates() {
    let restaurant: RestaurantDto =
      serde_json::from_value(json!({
        "id": 1,
        "name": "Sakura",
        "total_orders": "120",
        "revenue": "1234.50"
      }))
      .unwrap();
    assert_eq!(restaurant.total_orders, Some(120));
    assert_eq!(restaurant.revenue, Some(1234.5));

    let empty: RestaurantDto =
      serde_json::from_value(json!({
        "id": 2,
        "total_orders": null
      }))
      .unwrap();
    assert_eq!(empty.total_orders, None);
    assert_eq!(empty.revenue, None);

    let table: TableDto =
      serde_json::from_value(json!({
        "id": 3,
        "image_count": "4"
      }))
      .unwrap();
    assert_eq!(table.image_count, Some(4));
  }

  #[test]
  fn table_thumbnail_prefers_primary_image()
  {
    let table: TableDto =
      serde_json::from_value(json!({
        "id": 1,
        "table_number": 4,
        "capacity": 2,
        "type": "couple",
        "status": "closed_for_cleaning",
        "thumbnail_image": "/uploads/old.jpg",
        "images": [
          { "id": 1, "image_path": "/uploads/a.jpg", "is_primary": 0 },
          { "id": 2, "image_path": "/uploads/b.jpg", "is_primary": 1,
            "created_at": "2026-03-01 18:30:00" }
        ]
      }))
      .unwrap();

    assert_eq!(
      table.status,
      TableStatus::Unknown
    );
    assert_eq!(
      table.thumbnail_url(
        "http://localhost:5000/"
      ),
      "http://localhost:5000/uploads/b.jpg"
    );
    assert_eq!(table.photo_count(), 2);
    assert!(
      table.images[1]
        .created_at_utc()
        .is_some()
    );
  }

  #[test]
  fn table_without_images_uses_placeholder()
  {
    let table: TableDto =
      serde_json::from_value(json!({
        "id": "t-9",
        "table_number": 9,
        "capacity": 6,
        "type": "family"
      }))
      .unwrap();
    assert_eq!(
      table.thumbnail_url("http://x"),
      TABLE_PLACEHOLDER_IMAGE
    );
  }

  #[test]
  fn table_create_serializes_type_key() {
    let payload = TableCreate {
      table_number: 5,
      capacity:     2,
      kind:         "couple".to_string(),
      features:     String::new(),
      x_position:   0.0,
      y_position:   0.0
    };
    let value =
      serde_json::to_value(&payload)
        .unwrap();
    assert_eq!(value["type"], "couple");
    assert_eq!(value["capacity"], 2);
  }
}
