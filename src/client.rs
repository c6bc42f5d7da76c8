//! HTTP access to the Akindo public API.
//!
//! [`WaveSource`] is the seam the fetcher talks to. [`HttpSource`] is the
//! production implementation: one reqwest client behind a retry middleware,
//! GET only, with a fixed per-request timeout.

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::policies::ExponentialBackoff;
use reqwest_retry::{RetryTransientMiddleware, Retryable, RetryableStrategy};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::AppError;
use crate::models::{Page, RawPage, WaveHackDetail};
use crate::state::Config;

/// Statuses worth another attempt.
const RETRY_STATUS_CODES: [u16; 7] = [408, 413, 429, 500, 502, 503, 504];

const MIN_RETRY_DELAY: Duration = Duration::from_millis(300);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Source of wave hack pages and detail records.
#[async_trait]
pub trait WaveSource: Send + Sync {
    /// Fetches one listing page, normalized.
    async fn list_page(&self, page: NonZeroU32) -> Result<Page, AppError>;

    /// Fetches the detail record for `id`.
    async fn detail(&self, id: &str) -> Result<WaveHackDetail, AppError>;
}

/// Retries the transient upstream statuses and nothing else. Timeouts are
/// final, other transport failures fall back to the middleware's defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransientStatus;

impl TransientStatus {
    pub fn is_retryable(status: StatusCode) -> bool {
        RETRY_STATUS_CODES.contains(&status.as_u16())
    }
}

impl RetryableStrategy for TransientStatus {
    fn handle(&self, res: &Result<reqwest::Response, reqwest_middleware::Error>) -> Option<Retryable> {
        match res {
            Ok(response) if response.status().is_success() => None,
            Ok(response) if Self::is_retryable(response.status()) => Some(Retryable::Transient),
            Ok(_) => Some(Retryable::Fatal),
            Err(reqwest_middleware::Error::Reqwest(err)) if err.is_timeout() => {
                Some(Retryable::Fatal)
            }
            Err(err) => reqwest_retry::default_on_request_failure(err),
        }
    }
}

/// Exponential backoff from 300ms, capped at 30s, for `limit` extra attempts.
pub fn retry_policy(limit: u32) -> ExponentialBackoff {
    ExponentialBackoff::builder()
        .retry_bounds(MIN_RETRY_DELAY, MAX_RETRY_DELAY)
        .build_with_max_retries(limit)
}

/// reqwest-backed [`WaveSource`].
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: ClientWithMiddleware,
    base_url: Url,
}

impl HttpSource {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("wavecute/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout)
            .build()?;
        Self::with_client(client, &config.api_base, retry_policy(config.retry_limit))
    }

    pub fn with_client(
        client: reqwest::Client,
        api_base: &str,
        retry: ExponentialBackoff,
    ) -> Result<Self, AppError> {
        let base_url = Url::parse(api_base)
            .map_err(|e| AppError::InvalidConfig(format!("AKINDO_API_BASE {api_base:?}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::InvalidConfig(format!(
                "AKINDO_API_BASE {api_base:?} cannot be used as a base URL"
            )));
        }
        let client = ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy_and_strategy(
                retry,
                TransientStatus,
            ))
            .build();
        Ok(Self { client, base_url })
    }

    fn listing_url(&self, page: NonZeroU32) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("page", &page.get().to_string());
        url
    }

    fn detail_url(&self, id: &str) -> Result<Url, AppError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::InvalidConfig("API base URL has no path".into()))?
            .pop_if_empty()
            .push(id);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, AppError> {
        debug!(%url, "GET");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| AppError::from_transport(e, url.as_str()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::UpstreamStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| AppError::from_reqwest(e, url.as_str()))?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl WaveSource for HttpSource {
    async fn list_page(&self, page: NonZeroU32) -> Result<Page, AppError> {
        let raw: RawPage = self.get_json(self.listing_url(page)).await?;
        Ok(Page::from(raw))
    }

    async fn detail(&self, id: &str) -> Result<WaveHackDetail, AppError> {
        let url = self.detail_url(id)?;
        self.get_json(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_retry(limit: u32) -> ExponentialBackoff {
        ExponentialBackoff::builder()
            .retry_bounds(Duration::from_millis(1), Duration::from_millis(5))
            .build_with_max_retries(limit)
    }

    fn source(base: &str) -> HttpSource {
        HttpSource::with_client(reqwest::Client::new(), base, fast_retry(3)).unwrap()
    }

    mod strategy_tests {
        use super::*;

        #[test]
        fn test_transient_statuses_retry() {
            for code in [408, 413, 429, 500, 502, 503, 504] {
                let status = StatusCode::from_u16(code).unwrap();
                assert!(TransientStatus::is_retryable(status), "{code} should retry");
            }
        }

        #[test]
        fn test_other_statuses_do_not_retry() {
            for code in [200, 400, 401, 403, 404, 422, 501] {
                let status = StatusCode::from_u16(code).unwrap();
                assert!(!TransientStatus::is_retryable(status), "{code} should not retry");
            }
        }
    }

    mod url_tests {
        use super::*;

        #[test]
        fn test_listing_url_carries_page() {
            let url = source("https://api.akindo.io/public/wave-hacks")
                .listing_url(NonZeroU32::new(4).unwrap());
            assert_eq!(url.as_str(), "https://api.akindo.io/public/wave-hacks?page=4");
        }

        #[test]
        fn test_detail_url_appends_id() {
            let url = source("https://api.akindo.io/public/wave-hacks")
                .detail_url("abc123")
                .unwrap();
            assert_eq!(url.as_str(), "https://api.akindo.io/public/wave-hacks/abc123");
        }

        #[test]
        fn test_detail_url_with_trailing_slash() {
            let url = source("https://api.akindo.io/public/wave-hacks/")
                .detail_url("abc123")
                .unwrap();
            assert_eq!(url.as_str(), "https://api.akindo.io/public/wave-hacks/abc123");
        }

        #[test]
        fn test_detail_id_is_escaped() {
            let url = source("https://api.akindo.io/public/wave-hacks")
                .detail_url("a/b?c")
                .unwrap();
            assert_eq!(
                url.as_str(),
                "https://api.akindo.io/public/wave-hacks/a%2Fb%3Fc"
            );
        }

        #[test]
        fn test_invalid_base_is_rejected() {
            let err = HttpSource::with_client(reqwest::Client::new(), "not a url", fast_retry(3))
                .unwrap_err();
            assert!(matches!(err, AppError::InvalidConfig(_)));
        }
    }

    mod request_tests {
        use super::*;
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        use axum::{http::StatusCode as AxumStatus, routing::get, Json, Router};
        use httpmock::prelude::*;
        use serde_json::json;

        fn listing_body(id: &str) -> serde_json::Value {
            json!({
                "items": [{ "id": id, "isPublic": true }],
                "meta": { "totalPages": 1, "totalItems": 1 }
            })
        }

        #[tokio::test]
        async fn test_listing_page_is_decoded() {
            let server = MockServer::start_async().await;
            let mock = server
                .mock_async(|when, then| {
                    when.method(GET).path("/wave-hacks").query_param("page", "2");
                    then.status(200)
                        .header("content-type", "application/json")
                        .json_body(listing_body("wh-1"));
                })
                .await;

            let page = source(&server.url("/wave-hacks"))
                .list_page(NonZeroU32::new(2).unwrap())
                .await
                .unwrap();

            mock.assert_async().await;
            assert_eq!(page.items[0].id, "wh-1");
            assert_eq!(page.meta.total_pages, 1);
        }

        #[tokio::test]
        async fn test_not_found_is_not_retried() {
            let server = MockServer::start_async().await;
            let mock = server
                .mock_async(|when, then| {
                    when.method(GET).path("/wave-hacks/missing");
                    then.status(404);
                })
                .await;

            let err = source(&server.url("/wave-hacks"))
                .detail("missing")
                .await
                .unwrap_err();

            assert_eq!(mock.hits_async().await, 1);
            assert!(matches!(err, AppError::UpstreamStatus { status: 404, .. }));
        }

        #[tokio::test]
        async fn test_persistent_503_exhausts_retries() {
            let server = MockServer::start_async().await;
            let mock = server
                .mock_async(|when, then| {
                    when.method(GET).path("/wave-hacks");
                    then.status(503);
                })
                .await;

            let err = source(&server.url("/wave-hacks"))
                .list_page(NonZeroU32::MIN)
                .await
                .unwrap_err();

            assert_eq!(mock.hits_async().await, 4);
            assert!(matches!(err, AppError::UpstreamStatus { status: 503, .. }));
        }

        #[tokio::test]
        async fn test_503_then_success_is_retried() {
            let hits = Arc::new(AtomicUsize::new(0));
            let counter = hits.clone();
            let app = Router::new().route(
                "/wave-hacks",
                get(move || {
                    let counter = counter.clone();
                    async move {
                        if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                            Err(AxumStatus::SERVICE_UNAVAILABLE)
                        } else {
                            Ok(Json(listing_body("wh-9")))
                        }
                    }
                }),
            );
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move { axum::serve(listener, app).await });

            let page = source(&format!("http://{addr}/wave-hacks"))
                .list_page(NonZeroU32::MIN)
                .await
                .unwrap();

            assert_eq!(hits.load(Ordering::SeqCst), 3);
            assert_eq!(page.items[0].id, "wh-9");
        }

        #[tokio::test]
        async fn test_client_timeout_is_classified_and_not_retried() {
            let server = MockServer::start_async().await;
            let mock = server
                .mock_async(|when, then| {
                    when.method(GET).path("/wave-hacks/slow");
                    then.status(200)
                        .delay(Duration::from_millis(500))
                        .json_body(json!({ "id": "slow" }));
                })
                .await;
            let client = reqwest::Client::builder()
                .timeout(Duration::from_millis(50))
                .build()
                .unwrap();
            let source =
                HttpSource::with_client(client, &server.url("/wave-hacks"), fast_retry(3)).unwrap();

            let err = source.detail("slow").await.unwrap_err();

            assert!(matches!(err, AppError::Timeout { .. }), "{err:?}");
            assert_eq!(mock.hits_async().await, 1);
        }

        #[tokio::test]
        async fn test_refused_connection_is_network_error() {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            let addr = listener.local_addr().unwrap();
            drop(listener);

            let err = source(&format!("http://{addr}/wave-hacks"))
                .detail("x")
                .await
                .unwrap_err();

            assert!(matches!(err, AppError::Network { .. }), "{err:?}");
            assert_eq!(err.user_message(), "Network error - unable to reach the API");
        }
    }
}
