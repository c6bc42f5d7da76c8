//! Data models for Akindo wave hack listings.
//!
//! Only the fields the viewer reads are typed. Everything else the upstream
//! sends is kept in `extra` and written back out unchanged.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Treats an explicit JSON `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Reads a timestamp, treating anything unparsable as absent. Strings without
/// an offset are taken as UTC.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(Value::String(raw)) = Option::<Value>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let raw = raw.trim();
    Ok(DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|at| at.and_utc()))
        .ok())
}

/// Reads a day count from an integer, a whole float or a numeric string.
/// Negative, fractional or non-numeric values are treated as absent.
fn lenient_days<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let days = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as u64)
        }),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    Ok(days.and_then(|d| u32::try_from(d).ok()))
}

/// Token a wave's grant is paid out in.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    /// Empty when the upstream sends no usable name.
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u32>,
}

/// The currently open cycle of a wave hack.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActiveWave {
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub opened_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub submission_deadline: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub judgement_deadline: Option<DateTime<Utc>>,
    /// Decimal string, e.g. `"5000"` or `"1250.5"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_amount: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One listing record from the wave hacks collection.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WaveHack {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_public: bool,
    #[serde(
        default,
        deserialize_with = "lenient_days",
        skip_serializing_if = "Option::is_none"
    )]
    pub building_days: Option<u32>,
    #[serde(
        default,
        deserialize_with = "lenient_days",
        skip_serializing_if = "Option::is_none"
    )]
    pub judging_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_wave: Option<ActiveWave>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_denomination: Option<Token>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WaveHack {
    /// True when the listing has an open submission/judging cycle.
    pub fn is_active(&self) -> bool {
        self.active_wave.is_some()
    }
}

/// Links to a wave hack's community channels.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Community {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discord_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram_url: Option<String>,
}

/// One judging factor.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Criterion {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub sort: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_active: bool,
}

/// Detail record for a single wave hack.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WaveHackDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub community: Option<Community>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub criteria: Vec<Criterion>,
    #[serde(flatten)]
    pub wave: WaveHack,
}

/// Page metadata of the `{ items, meta: { totalPages, totalItems } }` shape.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ItemsMeta {
    pub total_pages: u32,
    #[serde(default)]
    pub total_items: u64,
}

/// Pagination block of the `{ data, meta: { pagination } }` shape.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(default)]
    pub page_size: Option<u32>,
    pub page_count: u32,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataMeta {
    pub pagination: Pagination,
}

/// A listing page as the upstream sends it. Both known shapes are accepted.
#[derive(Debug, Clone)]
pub enum RawPage {
    Items {
        items: Vec<WaveHack>,
        meta: ItemsMeta,
    },
    Data {
        data: Vec<WaveHack>,
        meta: DataMeta,
    },
}

#[derive(Deserialize)]
struct ItemsPage {
    items: Vec<WaveHack>,
    meta: ItemsMeta,
}

#[derive(Deserialize)]
struct DataPage {
    data: Vec<WaveHack>,
    meta: DataMeta,
}

impl<'de> Deserialize<'de> for RawPage {
    /// Picks the shape by its list key so that field errors inside the
    /// chosen shape are reported as they are.
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        if value.get("items").is_some() {
            let page: ItemsPage = serde_json::from_value(value).map_err(D::Error::custom)?;
            Ok(RawPage::Items {
                items: page.items,
                meta: page.meta,
            })
        } else if value.get("data").is_some() {
            let page: DataPage = serde_json::from_value(value).map_err(D::Error::custom)?;
            Ok(RawPage::Data {
                data: page.data,
                meta: page.meta,
            })
        } else {
            Err(D::Error::custom(
                "listing page has neither an `items` nor a `data` list",
            ))
        }
    }
}

/// Normalized page metadata.
#[derive(Debug, Serialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total_pages: u32,
    pub total_items: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}

/// A listing page after normalization.
#[derive(Debug, Serialize, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<WaveHack>,
    pub meta: PageMeta,
}

impl From<RawPage> for Page {
    fn from(raw: RawPage) -> Self {
        match raw {
            RawPage::Items { items, meta } => Page {
                items,
                meta: PageMeta {
                    total_pages: meta.total_pages,
                    total_items: meta.total_items,
                    page_size: None,
                },
            },
            RawPage::Data { data, meta } => Page {
                items: data,
                meta: PageMeta {
                    total_pages: meta.pagination.page_count,
                    total_items: meta.pagination.total,
                    page_size: meta.pagination.page_size,
                },
            },
        }
    }
}

/// Statistics derived from a set of wave hacks.
#[derive(Debug, Serialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_items: usize,
    pub active_count: usize,
    pub public_count: usize,
    pub unique_token_count: usize,
    /// Distinct denomination names in first-seen order.
    pub tokens: Vec<String>,
    /// `None` when there are no items to average over.
    pub average_building_days: Option<f64>,
    pub average_judging_days: Option<f64>,
}
