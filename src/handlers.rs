use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tera::{Context, Tera};
use tracing::error;

use crate::display::{format_date, sort_by_deadline, DetailView, SummaryView, WaveCard};
use crate::error::AppError;
use crate::models::WaveHackDetail;
use crate::operations::{
    list_wave_hacks, wave_hack_detail, DetailEnvelope, FetchMode, FetchRequest, Listing,
    ListingEnvelope,
};
use crate::state::AppState;

const DETAIL_CACHE_CONTROL: &str =
    "public, s-maxage=86400, max-age=3600, stale-while-revalidate=86400";

/// Query parameters accepted by the listing endpoints and pages.
///
/// `single=true` and a bare `page=N` are kept as shorthands for
/// `mode=single` and `mode=page`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingParams {
    #[serde(default)]
    pub mode: Option<FetchMode>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub page: Option<u32>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub single: Option<bool>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub active_only: Option<bool>,
}

impl ListingParams {
    pub fn into_request(self, default_mode: FetchMode) -> FetchRequest {
        let mode = if self.single == Some(true) {
            FetchMode::Single
        } else {
            self.mode.unwrap_or(if self.page.is_some() {
                FetchMode::Page
            } else {
                default_mode
            })
        };
        FetchRequest {
            mode,
            page: self.page,
            active_only: self.active_only,
        }
    }
}

/// Turns the listing query into a request, reporting unparsable parameters
/// as invalid input instead of letting axum answer with plain text.
fn listing_request(
    params: Result<Query<ListingParams>, QueryRejection>,
    default_mode: FetchMode,
) -> Result<FetchRequest, AppError> {
    params
        .map(|Query(params)| params.into_request(default_mode))
        .map_err(|rejection| {
            AppError::InvalidInput(format!("Invalid query parameters: {}", rejection.body_text()))
        })
}

/// Runs a listing for a possibly rejected query.
async fn listing(
    state: &AppState,
    params: Result<Query<ListingParams>, QueryRejection>,
    default_mode: FetchMode,
    default_active_only: bool,
) -> Result<Listing, AppError> {
    let request = listing_request(params, default_mode)?;
    list_wave_hacks(&state.fetcher, &request, default_active_only).await
}

/// Query parameters for the detail widget.
#[derive(Debug, Deserialize)]
pub struct DetailQuery {
    #[serde(default, deserialize_with = "empty_string_as_none_str")]
    pub id: Option<String>,
}

fn empty_string_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt {
        None => Ok(None),
        Some(s) if s.is_empty() => Ok(None),
        Some(s) => s.parse::<T>().map(Some).map_err(serde::de::Error::custom),
    }
}

fn empty_string_as_none_str<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt {
        None => Ok(None),
        Some(s) if s.is_empty() => Ok(None),
        Some(s) => Ok(Some(s)),
    }
}

pub(crate) fn render_template(
    tera: &Tera,
    template: &str,
    context: &Context,
) -> Result<String, AppError> {
    tera.render(template, context).map_err(|e| {
        error!("Template render error for '{}': {}", template, e);
        AppError::Template(e)
    })
}

fn into_html(rendered: Result<String, AppError>) -> Result<Html<String>, (StatusCode, &'static str)> {
    rendered
        .map(Html)
        .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Render error"))
}

/// Renders a listing result (cards, summary or the error state).
pub(crate) fn render_listing(
    state: &AppState,
    template: &str,
    result: &Result<Listing, AppError>,
    now: DateTime<Utc>,
) -> Result<String, AppError> {
    let mut context = Context::new();
    let mut cards: Vec<WaveCard> = Vec::new();
    let mut summary = None;
    let mut pagination = None;
    let mut active_only = false;
    let mut error = None;

    match result {
        Ok(listing) => {
            let mut items = listing.data.clone();
            sort_by_deadline(&mut items, now);
            cards = items
                .iter()
                .map(|item| WaveCard::new(item, &state.config.app_url, now))
                .collect();
            summary = Some(SummaryView::from(&listing.summary));
            pagination = listing.pagination.clone();
            active_only = listing.active_only;
        }
        Err(e) => error = Some(e.user_message()),
    }

    context.insert("cards", &cards);
    context.insert("summary", &summary);
    context.insert("pagination", &pagination);
    context.insert("active_only", &active_only);
    context.insert("error", &error);
    context.insert("generated_at", &format_date(now));
    render_template(&state.tera, template, &context)
}

/// Renders a detail result.
pub(crate) fn render_detail(
    state: &AppState,
    template: &str,
    id: &str,
    result: &Result<WaveHackDetail, AppError>,
    now: DateTime<Utc>,
) -> Result<String, AppError> {
    let mut context = Context::new();
    let (detail, error) = match result {
        Ok(detail) => (Some(DetailView::new(detail, &state.config.app_url, now)), None),
        Err(e) => (None, Some(e.user_message())),
    };
    context.insert("id", id);
    context.insert("detail", &detail);
    context.insert("error", &error);
    context.insert("generated_at", &format_date(now));
    render_template(&state.tera, template, &context)
}

/// GET /api/akindo-data - Listing JSON.
pub async fn api_listings(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ListingParams>, QueryRejection>,
) -> impl IntoResponse {
    let result = listing(&state, params, FetchMode::All, false).await;
    let status = result
        .as_ref()
        .err()
        .map_or(StatusCode::OK, AppError::status_code);
    (status, Json(ListingEnvelope::from(result)))
}

/// GET /api/wave-hack/{id} - Detail JSON.
pub async fn api_wave_hack(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    let result = wave_hack_detail(&state.fetcher, &id).await;
    let status = result
        .as_ref()
        .err()
        .map_or(StatusCode::OK, AppError::status_code);
    let envelope = DetailEnvelope::from_result(&id, result);

    if !envelope.success {
        return (status, Json(envelope)).into_response();
    }

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(DETAIL_CACHE_CONTROL),
    );
    headers.insert(header::VARY, HeaderValue::from_static("Accept-Encoding"));
    if let Ok(tag) = HeaderValue::from_str(&format!("wave-hack-{id}")) {
        headers.insert(HeaderName::from_static("cache-tag"), tag);
    }
    (status, headers, Json(envelope)).into_response()
}

/// GET / - Dashboard of open wave hacks.
pub async fn index(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ListingParams>, QueryRejection>,
) -> impl IntoResponse {
    let result = listing(&state, params, FetchMode::Single, true).await;
    into_html(render_listing(&state, "dashboard.html", &result, Utc::now()))
}

/// GET /wave-hacks/{id} - Detail page.
pub async fn wave_hack_page(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let result = wave_hack_detail(&state.fetcher, &id).await;
    into_html(render_detail(&state, "detail.html", &id, &result, Utc::now()))
}

/// GET /view-wave-cute - Listing widget.
pub async fn view_wave_cute(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ListingParams>, QueryRejection>,
) -> impl IntoResponse {
    let result = listing(&state, params, FetchMode::All, true).await;
    into_html(render_listing(&state, "widget_list.html", &result, Utc::now()))
}

/// GET /view-wave-cute-detail?id= - Detail widget.
pub async fn view_wave_cute_detail(
    State(state): State<Arc<AppState>>,
    query: Result<Query<DetailQuery>, QueryRejection>,
) -> impl IntoResponse {
    let id = query.ok().and_then(|Query(query)| query.id).unwrap_or_default();
    let result = wave_hack_detail(&state.fetcher, &id).await;
    into_html(render_detail(&state, "widget_detail.html", &id, &result, Utc::now()))
}

/// GET /health - Liveness check.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
