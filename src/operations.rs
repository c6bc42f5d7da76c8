//! Transport-independent operations shared by the JSON API, the HTML pages
//! and the tool endpoint.
//!
//! Each operation returns a `Result`; the envelope types turn that into the
//! `{ success, ..., timestamp }` shape every caller emits, so failures never
//! escape as anything but data.

use std::num::NonZeroU32;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::data::{active_only, summarize};
use crate::error::AppError;
use crate::fetcher::WaveFetcher;
use crate::models::{Summary, WaveHack, WaveHackDetail};

/// Which part of the collection to fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    #[default]
    All,
    Single,
    Page,
}

/// Listing request as callers send it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchRequest {
    #[serde(default)]
    pub mode: FetchMode,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub active_only: Option<bool>,
}

/// A validated listing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingQuery {
    All,
    Single,
    Page(NonZeroU32),
}

impl FetchRequest {
    /// Validates the request. `default_active_only` applies when the caller
    /// did not say.
    pub fn resolve(&self, default_active_only: bool) -> Result<(ListingQuery, bool), AppError> {
        let query = match self.mode {
            FetchMode::All => ListingQuery::All,
            FetchMode::Single => ListingQuery::Single,
            FetchMode::Page => {
                let page = self.page.ok_or_else(|| {
                    AppError::InvalidInput("page is required when mode is 'page'".into())
                })?;
                let page = NonZeroU32::new(page).ok_or_else(|| {
                    AppError::InvalidInput("page must be a positive integer".into())
                })?;
                ListingQuery::Page(page)
            }
        };
        Ok((query, self.active_only.unwrap_or(default_active_only)))
    }
}

/// Where a single-page listing sits in the collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub page: u32,
    pub total_pages: u32,
    pub total_items: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    pub items_on_page: usize,
    pub filtered_items: usize,
}

/// A successful listing fetch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub data: Vec<WaveHack>,
    pub summary: Summary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PageInfo>,
    pub active_only: bool,
}

/// Fetches wave hacks per `request`, applies the active-only filter and
/// summarizes what is left.
pub async fn list_wave_hacks(
    fetcher: &WaveFetcher,
    request: &FetchRequest,
    default_active_only: bool,
) -> Result<Listing, AppError> {
    let (query, only_active) = request.resolve(default_active_only)?;
    let keep = |items: Vec<WaveHack>| {
        if only_active {
            active_only(items)
        } else {
            items
        }
    };

    let (data, pagination) = match query {
        ListingQuery::All => (keep(fetcher.fetch_all_pages().await?), None),
        ListingQuery::Single | ListingQuery::Page(_) => {
            let number = match query {
                ListingQuery::Page(number) => number,
                _ => NonZeroU32::MIN,
            };
            let page = fetcher.fetch_page(number).await?;
            let items_on_page = page.items.len();
            let data = keep(page.items);
            let info = PageInfo {
                page: number.get(),
                total_pages: page.meta.total_pages,
                total_items: page.meta.total_items,
                page_size: page.meta.page_size,
                items_on_page,
                filtered_items: data.len(),
            };
            (data, Some(info))
        }
    };

    Ok(Listing {
        summary: summarize(&data),
        data,
        pagination,
        active_only: only_active,
    })
}

/// Fetches one wave hack's detail record.
pub async fn wave_hack_detail(fetcher: &WaveFetcher, id: &str) -> Result<WaveHackDetail, AppError> {
    fetcher.fetch_detail(id).await
}

/// Current time as an ISO-8601 string with millisecond precision.
pub(crate) fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Wire shape of a listing result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingEnvelope {
    pub success: bool,
    #[serde(flatten)]
    pub listing: Option<Listing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: String,
}

impl From<Result<Listing, AppError>> for ListingEnvelope {
    fn from(result: Result<Listing, AppError>) -> Self {
        match result {
            Ok(listing) => Self {
                success: true,
                listing: Some(listing),
                error: None,
                timestamp: timestamp(),
            },
            Err(e) => {
                error!("Listing fetch failed: {}", e);
                Self {
                    success: false,
                    listing: None,
                    error: Some(e.user_message()),
                    timestamp: timestamp(),
                }
            }
        }
    }
}

/// Diagnostics attached to a failed detail fetch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailDebug {
    pub wave_hack_id: String,
    pub original_error: String,
}

/// Wire shape of a detail result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailEnvelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<WaveHackDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DetailDebug>,
}

impl DetailEnvelope {
    pub fn from_result(id: &str, result: Result<WaveHackDetail, AppError>) -> Self {
        match result {
            Ok(detail) => Self {
                success: true,
                data: Some(detail),
                error: None,
                timestamp: timestamp(),
                debug: None,
            },
            Err(e) => {
                error!("Error fetching wave hack details: {}", e);
                Self {
                    success: false,
                    data: None,
                    error: Some(e.user_message()),
                    timestamp: timestamp(),
                    debug: Some(DetailDebug {
                        wave_hack_id: id.to_string(),
                        original_error: e.to_string(),
                    }),
                }
            }
        }
    }
}
