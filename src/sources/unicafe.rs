//! Unicafe Menu Source
//!
//! Fetches the Unicafe restaurant listing and picks out today's lunch menu
//! for each configured restaurant:
//! - today's entry is matched on the English "Mon 04.03." date label
//! - lunch hours come from `visitingHours.lounas`
//! - food items are grouped by lowercased price tier

use super::{get_json, DatasetKey, HttpSettings, Snapshot, Source, SourceError};
use crate::clock::SharedClock;
use crate::window::{parse_lunch_hours, ServingHours};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A restaurant to pick out of the Unicafe listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestaurantRef {
    /// Short name used in URLs, e.g. "exactum"
    pub slug: String,
    /// Position in the Unicafe listing
    pub id: usize,
}

impl RestaurantRef {
    pub fn new(slug: impl Into<String>, id: usize) -> Self {
        Self { slug: slug.into(), id }
    }
}

/// Today's menu for one restaurant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantMenu {
    pub slug: String,
    pub name: String,
    /// Local date the menu is for
    pub date: NaiveDate,
    /// Raw lunch hours as published, e.g. "10:30–14:00"
    pub lunch_hours: Option<String>,
    pub opening_hour: Option<DateTime<Utc>>,
    pub closing_hour: Option<DateTime<Utc>>,
    /// Serialised as `{ "category": [items...] }` in listing order
    #[serde(with = "category_map")]
    pub groups: Vec<MenuGroup>,
}

impl RestaurantMenu {
    pub fn has_food(&self) -> bool {
        self.groups.iter().any(|g| !g.items.is_empty())
    }

    pub fn serving_hours(&self) -> Option<ServingHours> {
        Some(ServingHours {
            opens: self.opening_hour?,
            closes: self.closing_hour?,
        })
    }
}

/// Food items sharing a price tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuGroup {
    pub name: String,
    pub items: Vec<FoodItem>,
}

/// Menu groups as an ordered map from category name to items
mod category_map {
    use super::{FoodItem, MenuGroup};
    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(groups: &[MenuGroup], serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(groups.len()))?;
        for group in groups {
            map.serialize_entry(&group.name, &group.items)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<MenuGroup>, D::Error> {
        deserializer.deserialize_map(GroupsVisitor)
    }

    struct GroupsVisitor;

    impl<'de> Visitor<'de> for GroupsVisitor {
        type Value = Vec<MenuGroup>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map from category name to food items")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut groups = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((name, items)) = access.next_entry::<String, Vec<FoodItem>>()? {
                groups.push(MenuGroup { name, items });
            }
            Ok(groups)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodItem {
    pub name: String,
    pub price_name: String,
    /// Price values exactly as published
    #[serde(default)]
    pub prices: Value,
    pub meta: FoodMeta,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodMeta {
    pub diet: Vec<String>,
    pub allergies: Vec<String>,
    pub climate_choice: bool,
}

/// Unicafe listing client
pub struct UnicafeSource {
    client: reqwest::Client,
    url: String,
    restaurants: Vec<RestaurantRef>,
    timezone: Tz,
    clock: SharedClock,
}

impl UnicafeSource {
    pub fn new(
        url: impl Into<String>,
        restaurants: Vec<RestaurantRef>,
        timezone: Tz,
        clock: SharedClock,
        http: &HttpSettings,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            client: http.client()?,
            url: url.into(),
            restaurants,
            timezone,
            clock,
        })
    }

    pub fn restaurants(&self) -> &[RestaurantRef] {
        &self.restaurants
    }

    /// Fetch the listing and shape every configured restaurant
    pub async fn fetch_menus(&self) -> Result<Vec<(String, Result<RestaurantMenu, SourceError>)>, SourceError> {
        let body = get_json(&self.client, &self.url).await?;
        let today = self.clock.now().with_timezone(&self.timezone).date_naive();

        Ok(self
            .restaurants
            .iter()
            .map(|r| (r.slug.clone(), shape_restaurant(&body, r, today, self.timezone)))
            .collect())
    }
}

#[async_trait]
impl Source for UnicafeSource {
    fn name(&self) -> &str {
        "unicafe"
    }

    fn dataset(&self) -> DatasetKey {
        DatasetKey::Restaurants
    }

    async fn fetch(&self) -> Result<Snapshot, SourceError> {
        Ok(Snapshot::Restaurants(self.fetch_menus().await?))
    }
}

// ============================================
// Upstream shapes
// ============================================

#[derive(Debug, Deserialize)]
struct UnicafeRestaurant {
    #[serde(rename = "menuData")]
    menu_data: MenuData,
}

#[derive(Debug, Deserialize)]
struct MenuData {
    name: String,
    #[serde(default)]
    menus: Vec<DailyMenu>,
    #[serde(rename = "visitingHours", default)]
    visiting_hours: Option<VisitingHours>,
}

#[derive(Debug, Deserialize)]
struct DailyMenu {
    date: String,
    #[serde(default)]
    data: Vec<FoodEntry>,
}

#[derive(Debug, Deserialize)]
struct VisitingHours {
    #[serde(default)]
    lounas: Option<HoursGroup>,
}

#[derive(Debug, Deserialize)]
struct HoursGroup {
    #[serde(default)]
    items: Vec<HoursItem>,
}

#[derive(Debug, Deserialize)]
struct HoursItem {
    #[serde(default)]
    hours: String,
}

#[derive(Debug, Deserialize)]
struct FoodEntry {
    name: String,
    #[serde(default)]
    price: Price,
    #[serde(default)]
    meta: Value,
}

#[derive(Debug, Default, Deserialize)]
struct Price {
    #[serde(default)]
    name: String,
    #[serde(default)]
    value: Value,
}

/// Shape one restaurant out of the listing for `today`.
///
/// A restaurant with no entry for today yields a menu without groups rather
/// than an error: the restaurant is simply closed.
fn shape_restaurant(
    body: &Value,
    restaurant: &RestaurantRef,
    today: NaiveDate,
    tz: Tz,
) -> Result<RestaurantMenu, SourceError> {
    let entry = match body {
        Value::Array(list) => list.get(restaurant.id),
        Value::Object(map) => map.get(&restaurant.id.to_string()),
        _ => None,
    }
    .ok_or_else(|| SourceError::Missing(format!("restaurant {} not in listing", restaurant.id)))?;

    let raw: UnicafeRestaurant =
        serde_json::from_value(entry.clone()).map_err(|e| SourceError::Parse(e.to_string()))?;
    let MenuData {
        name,
        menus,
        visiting_hours,
    } = raw.menu_data;

    let label = today.format("%a %d.%m.").to_string();
    let entries = menus
        .into_iter()
        .find(|m| m.date == label)
        .map(|m| m.data)
        .unwrap_or_default();

    let lunch_hours = visiting_hours
        .and_then(|v| v.lounas)
        .and_then(|l| l.items.into_iter().next())
        .map(|i| i.hours.trim().to_string())
        .filter(|h| !h.is_empty());
    let hours = lunch_hours
        .as_deref()
        .and_then(|h| parse_lunch_hours(h, today, tz));

    Ok(RestaurantMenu {
        slug: restaurant.slug.clone(),
        name,
        date: today,
        lunch_hours,
        opening_hour: hours.map(|h| h.opens),
        closing_hour: hours.map(|h| h.closes),
        groups: group_by_price(entries),
    })
}

fn group_by_price(entries: Vec<FoodEntry>) -> Vec<MenuGroup> {
    let mut groups: Vec<MenuGroup> = Vec::new();

    for entry in entries {
        let group_name = entry.price.name.to_lowercase();
        let item = FoodItem {
            name: entry.name,
            price_name: entry.price.name,
            prices: entry.price.value,
            meta: FoodMeta {
                diet: meta_list(&entry.meta, 0),
                allergies: meta_list(&entry.meta, 1),
                climate_choice: meta_list(&entry.meta, 2)
                    .iter()
                    .any(|tag| tag == "Ilmastovalinta"),
            },
        };

        match groups.iter_mut().find(|g| g.name == group_name) {
            Some(group) => group.items.push(item),
            None => groups.push(MenuGroup {
                name: group_name,
                items: vec![item],
            }),
        }
    }

    groups
}

/// Meta tags are published as `{"0": [...], "1": [...]}` or as a plain array
fn meta_list(meta: &Value, index: usize) -> Vec<String> {
    let list = match meta {
        Value::Object(map) => map.get(&index.to_string()),
        Value::Array(list) => list.get(index),
        _ => None,
    };

    list.and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
