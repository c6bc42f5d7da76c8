//! Paged fetch-and-aggregate over a [`WaveSource`].

use std::num::NonZeroU32;
use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, error, info};

use crate::client::WaveSource;
use crate::error::AppError;
use crate::models::{Page, WaveHack, WaveHackDetail};

/// Fetches listing pages and detail records from an injected source.
#[derive(Clone)]
pub struct WaveFetcher {
    source: Arc<dyn WaveSource>,
}

impl WaveFetcher {
    pub fn new(source: Arc<dyn WaveSource>) -> Self {
        Self { source }
    }

    /// Fetches a single listing page.
    pub async fn fetch_page(&self, page: NonZeroU32) -> Result<Page, AppError> {
        self.source.list_page(page).await.inspect_err(|e| {
            error!("Error fetching page {}: {}", page, e);
        })
    }

    /// Fetches every listing page and concatenates the items in page order.
    ///
    /// Page 1 is fetched first to learn the page count. The remaining pages are
    /// requested together and joined as one batch. The first failing page fails
    /// the whole call; pages still in flight are dropped and no partial list is
    /// returned.
    pub async fn fetch_all_pages(&self) -> Result<Vec<WaveHack>, AppError> {
        let first = self.fetch_page(NonZeroU32::MIN).await?;
        let total_pages = first.meta.total_pages;
        info!(
            "Total items: {}, Pages: {}",
            first.meta.total_items, total_pages
        );

        let mut items = first.items;
        if total_pages > 1 {
            // try_join_all yields results in input order, not completion order.
            let remaining = (2..=total_pages)
                .filter_map(NonZeroU32::new)
                .map(|page| self.fetch_page(page));
            let pages = try_join_all(remaining).await?;
            items.extend(pages.into_iter().flat_map(|page| page.items));
        }

        info!("Fetched {} total items", items.len());
        Ok(items)
    }

    /// Fetches the detail record for one wave hack.
    pub async fn fetch_detail(&self, id: &str) -> Result<WaveHackDetail, AppError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(AppError::InvalidInput("Wave hack ID is required".into()));
        }
        // Dot segments would resolve to the collection URL, not a record.
        if id == "." || id == ".." {
            return Err(AppError::InvalidInput(format!("Invalid wave hack ID: {id}")));
        }

        info!("Fetching wave hack details for ID: {}", id);
        let detail = self
            .source
            .detail(id)
            .await
            .map_err(|e| match e {
                AppError::UpstreamStatus { status: 404, .. } => AppError::NotFound {
                    id: id.to_string(),
                },
                other => other,
            })
            .inspect_err(|e| {
                error!("Error fetching wave hack {}: {}", id, e);
            })?;
        debug!(
            id = %detail.wave.id,
            title = ?detail.wave.title,
            has_description = detail.description.is_some(),
            has_community = detail.community.is_some(),
            criteria_count = detail.criteria.len(),
            "API response received"
        );
        Ok(detail)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use std::time::Duration;

    fn ids(items: &[WaveHack]) -> Vec<&str> {
        items.iter().map(|item| item.id.as_str()).collect()
    }

    mod fetch_all_pages_tests {
        use super::*;

        #[tokio::test]
        async fn test_pages_reassembled_by_index() {
            let source = Arc::new(
                ScriptedSource::new()
                    .page(1, 3, vec![item("a"), item("b")])
                    .delayed_page(2, 3, vec![item("c")], Duration::from_millis(60))
                    .delayed_page(3, 3, vec![item("d"), item("e")], Duration::from_millis(5)),
            );
            let fetcher = WaveFetcher::new(source.clone());

            let items = fetcher.fetch_all_pages().await.unwrap();

            assert_eq!(source.completion_order(), vec![1, 3, 2]);
            assert_eq!(ids(&items), vec!["a", "b", "c", "d", "e"]);
        }

        #[tokio::test]
        async fn test_single_page_makes_one_call() {
            let source = Arc::new(ScriptedSource::new().page(1, 1, vec![item("a")]));
            let fetcher = WaveFetcher::new(source.clone());

            let items = fetcher.fetch_all_pages().await.unwrap();

            assert_eq!(source.calls(), 1);
            assert_eq!(ids(&items), vec!["a"]);
        }

        #[tokio::test]
        async fn test_zero_pages_returns_first_page_items() {
            let source = Arc::new(ScriptedSource::new().page(1, 0, Vec::new()));
            let fetcher = WaveFetcher::new(source.clone());

            let items = fetcher.fetch_all_pages().await.unwrap();

            assert_eq!(source.calls(), 1);
            assert!(items.is_empty());
        }

        #[tokio::test]
        async fn test_every_remaining_page_is_requested() {
            let source = Arc::new(
                ScriptedSource::new()
                    .page(1, 4, vec![item("a")])
                    .page(2, 4, vec![item("b")])
                    .page(3, 4, vec![item("c")])
                    .page(4, 4, vec![item("d")]),
            );
            let fetcher = WaveFetcher::new(source.clone());

            let items = fetcher.fetch_all_pages().await.unwrap();

            assert_eq!(source.calls(), 4);
            assert_eq!(items.len(), 4);
        }

        #[tokio::test]
        async fn test_one_failed_page_fails_everything() {
            let source = Arc::new(
                ScriptedSource::new()
                    .page(1, 3, vec![item("a")])
                    .failing_page(2, Failure::Status(500))
                    .delayed_page(3, 3, vec![item("c")], Duration::from_millis(20)),
            );
            let fetcher = WaveFetcher::new(source);

            let result = fetcher.fetch_all_pages().await;

            assert!(matches!(
                result,
                Err(AppError::UpstreamStatus { status: 500, .. })
            ));
        }

        #[tokio::test]
        async fn test_first_page_failure_skips_fan_out() {
            let source = Arc::new(ScriptedSource::new().failing_page(1, Failure::Timeout));
            let fetcher = WaveFetcher::new(source.clone());

            let result = fetcher.fetch_all_pages().await;

            assert!(matches!(result, Err(AppError::Timeout { .. })));
            assert_eq!(source.calls(), 1);
        }
    }

    mod fetch_page_tests {
        use super::*;

        #[tokio::test]
        async fn test_missing_page_is_not_reported_as_missing_wave_hack() {
            let fetcher = WaveFetcher::new(Arc::new(ScriptedSource::new().page(1, 1, vec![])));

            let err = fetcher.fetch_page(NonZeroU32::new(9).unwrap()).await.unwrap_err();

            assert!(matches!(err, AppError::UpstreamStatus { status: 404, .. }));
            assert!(!err.user_message().contains("Wave hack not found"));
        }

        #[tokio::test]
        async fn test_specific_page() {
            let source = Arc::new(
                ScriptedSource::new()
                    .page(1, 2, vec![item("a")])
                    .page(2, 2, vec![item("b")]),
            );
            let fetcher = WaveFetcher::new(source.clone());

            let page = fetcher.fetch_page(NonZeroU32::new(2).unwrap()).await.unwrap();

            assert_eq!(ids(&page.items), vec!["b"]);
            assert_eq!(page.meta.total_pages, 2);
            assert_eq!(source.calls(), 1);
        }
    }

    mod fetch_detail_tests {
        use super::*;

        #[tokio::test]
        async fn test_detail_found() {
            let detail = WaveHackDetail {
                wave: item("wh-1"),
                description: Some("Hello".into()),
                ..WaveHackDetail::default()
            };
            let fetcher = WaveFetcher::new(Arc::new(ScriptedSource::new().detail(detail)));

            let found = fetcher.fetch_detail("wh-1").await.unwrap();

            assert_eq!(found.description.as_deref(), Some("Hello"));
        }

        #[tokio::test]
        async fn test_empty_id_makes_no_request() {
            let source = Arc::new(ScriptedSource::new());
            let fetcher = WaveFetcher::new(source.clone());

            let result = fetcher.fetch_detail("  ").await;

            assert!(matches!(result, Err(AppError::InvalidInput(_))));
            assert_eq!(source.calls(), 0);
        }

        #[tokio::test]
        async fn test_missing_detail_is_not_found() {
            let fetcher = WaveFetcher::new(Arc::new(ScriptedSource::new()));

            let err = fetcher.fetch_detail("nope").await.unwrap_err();

            assert!(matches!(err, AppError::NotFound { ref id } if id == "nope"));
            assert_eq!(err.user_message(), "Wave hack not found");
        }

        #[tokio::test]
        async fn test_dot_segment_ids_make_no_request() {
            let source = Arc::new(ScriptedSource::new());
            let fetcher = WaveFetcher::new(source.clone());

            for id in [".", "..", " .. "] {
                let err = fetcher.fetch_detail(id).await.unwrap_err();
                assert!(matches!(err, AppError::InvalidInput(_)), "{id:?}");
            }
            assert_eq!(source.calls(), 0);
        }
    }
}
