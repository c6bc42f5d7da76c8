//! Reductions over fetched wave hacks: the active-only filter and the summary.

use itertools::Itertools;

use crate::models::{Summary, WaveHack};

/// Keeps only listings with an open wave.
pub fn active_only(items: Vec<WaveHack>) -> Vec<WaveHack> {
    items.into_iter().filter(WaveHack::is_active).collect()
}

/// Computes summary statistics over `items`.
///
/// Averages divide by the full item count, with missing day counts taken as
/// zero. An empty slice has no averages.
pub fn summarize(items: &[WaveHack]) -> Summary {
    let tokens: Vec<String> = items
        .iter()
        .filter_map(|item| item.grant_denomination.as_ref())
        .map(|token| token.name.as_str())
        .filter(|name| !name.is_empty())
        .unique()
        .map(str::to_string)
        .collect();

    Summary {
        total_items: items.len(),
        active_count: items.iter().filter(|item| item.is_active()).count(),
        public_count: items.iter().filter(|item| item.is_public).count(),
        unique_token_count: tokens.len(),
        tokens,
        average_building_days: average(items, |item| item.building_days),
        average_judging_days: average(items, |item| item.judging_days),
    }
}

fn average(items: &[WaveHack], days: impl Fn(&WaveHack) -> Option<u32>) -> Option<f64> {
    if items.is_empty() {
        return None;
    }
    let total: f64 = items
        .iter()
        .map(|item| f64::from(days(item).unwrap_or(0)))
        .sum();
    Some(total / items.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::testing::{active_item, item, token};

    fn with_days(id: &str, building: Option<u32>, judging: Option<u32>) -> WaveHack {
        WaveHack {
            building_days: building,
            judging_days: judging,
            ..item(id)
        }
    }

    mod summarize_tests {
        use super::*;

        #[test]
        fn test_missing_days_count_as_zero() {
            let items = vec![with_days("a", Some(10), Some(4)), with_days("b", None, None)];

            let summary = summarize(&items);

            assert_eq!(summary.average_building_days, Some(5.0));
            assert_eq!(summary.average_judging_days, Some(2.0));
        }

        #[test]
        fn test_empty_has_no_averages() {
            let summary = summarize(&[]);

            assert_eq!(summary.total_items, 0);
            assert_eq!(summary.average_building_days, None);
            assert_eq!(summary.average_judging_days, None);
            assert!(summary.tokens.is_empty());
        }

        #[test]
        fn test_counts() {
            let items = vec![
                WaveHack {
                    is_public: true,
                    ..active_item("a")
                },
                active_item("b"),
                WaveHack {
                    is_public: true,
                    ..item("c")
                },
                item("d"),
            ];

            let summary = summarize(&items);

            assert_eq!(summary.total_items, 4);
            assert_eq!(summary.active_count, 2);
            assert_eq!(summary.public_count, 2);
        }

        #[test]
        fn test_tokens_distinct_in_first_seen_order() {
            let with_token = |id: &str, name: &str| WaveHack {
                grant_denomination: Some(token(name)),
                ..item(id)
            };
            let items = vec![
                with_token("a", "USDC"),
                item("b"),
                with_token("c", "ETH"),
                with_token("d", "USDC"),
                with_token("e", ""),
            ];

            let summary = summarize(&items);

            assert_eq!(summary.tokens, vec!["USDC", "ETH"]);
            assert_eq!(summary.unique_token_count, 2);
        }

        #[test]
        fn test_summary_wire_names() {
            let summary = summarize(&[with_days("a", Some(3), Some(1))]);
            let value = serde_json::to_value(&summary).unwrap();

            assert_eq!(value["totalItems"], 1);
            assert_eq!(value["uniqueTokenCount"], 0);
            assert_eq!(value["averageBuildingDays"], 3.0);
        }

        #[test]
        fn test_empty_averages_serialize_as_null() {
            let value = serde_json::to_value(summarize(&[])).unwrap();
            assert!(value["averageBuildingDays"].is_null());
        }
    }

    mod active_only_tests {
        use super::*;

        #[test]
        fn test_filter_then_summarize() {
            let items = vec![
                item("a"),
                active_item("b"),
                item("c"),
                active_item("d"),
                item("e"),
            ];

            let summary = summarize(&active_only(items));

            assert_eq!(summary.total_items, 2);
            assert_eq!(summary.active_count, 2);
        }

        #[test]
        fn test_preserves_order() {
            let items = vec![active_item("x"), item("y"), active_item("z")];
            let kept: Vec<String> = active_only(items).into_iter().map(|i| i.id).collect();
            assert_eq!(kept, vec!["x", "z"]);
        }
    }
}
