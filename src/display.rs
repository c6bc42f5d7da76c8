//! Display-only computations: countdowns, urgency, progress bars, ordering and
//! formatting. These feed the Tera templates and carry no data semantics.

use std::cmp::Ordering;

use chrono::{DateTime, TimeDelta, Utc};
use pulldown_cmark::{html, Options, Parser};
use serde::Serialize;

use crate::models::{Criterion, Summary, WaveHack, WaveHackDetail};

/// Dates are shown in Asia/Jakarta time (UTC+7, no DST).
const JAKARTA_UTC_OFFSET_HOURS: i64 = 7;
const MISSING: &str = "—";

/// Time left until a deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeRemaining {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
    pub is_expired: bool,
}

impl TimeRemaining {
    pub fn until(deadline: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let millis = deadline.signed_duration_since(now).num_milliseconds();
        if millis <= 0 {
            return Self {
                days: 0,
                hours: 0,
                minutes: 0,
                seconds: 0,
                is_expired: true,
            };
        }
        let secs = millis / 1000;
        Self {
            days: secs / 86_400,
            hours: (secs % 86_400) / 3_600,
            minutes: (secs % 3_600) / 60,
            seconds: secs % 60,
            is_expired: false,
        }
    }

    pub fn urgency(&self) -> Urgency {
        match self.days {
            _ if self.is_expired => Urgency::Expired,
            d if d <= 1 => Urgency::Urgent,
            d if d <= 3 => Urgency::Soon,
            d if d <= 7 => Urgency::Warning,
            _ => Urgency::Good,
        }
    }

    /// Width of the countdown bar in percent.
    ///
    /// Has a floor of 5 but no ceiling.
    pub fn progress_percent(&self) -> f64 {
        if self.is_expired {
            100.0
        } else {
            (100.0 - self.days as f64 * 3.33).max(5.0)
        }
    }

    pub fn label(&self) -> String {
        if self.is_expired {
            "Expired".to_string()
        } else {
            format!(
                "{}d {}h {}m {}s",
                self.days, self.hours, self.minutes, self.seconds
            )
        }
    }
}

/// How close a deadline is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Expired,
    Urgent,
    Soon,
    Warning,
    Good,
}

/// Formats a timestamp like `Jan 5, 2025, 07:00 PM` in Jakarta time.
pub fn format_date(at: DateTime<Utc>) -> String {
    let local = at.naive_utc() + TimeDelta::hours(JAKARTA_UTC_OFFSET_HOURS);
    local.format("%b %-d, %Y, %I:%M %p").to_string()
}

/// Renders a decimal string with thousands separators and at most three
/// fraction digits. Returns `None` for anything that is not a finite number.
pub fn format_grant_amount(raw: &str) -> Option<String> {
    let value: f64 = raw.trim().parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    let fixed = format!("{:.3}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let frac_part = frac_part.trim_end_matches('0');

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && (int_part != "0" || !frac_part.is_empty()) {
        "-"
    } else {
        ""
    };
    if frac_part.is_empty() {
        Some(format!("{sign}{grouped}"))
    } else {
        Some(format!("{sign}{grouped}.{frac_part}"))
    }
}

/// Renders an average, or a dash when there is nothing to average.
pub fn format_average(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:.1}", v),
        _ => MISSING.to_string(),
    }
}

/// Renders markdown to HTML and sanitizes the result, so it can be emitted
/// into a page unescaped. Scripts, event handlers and other active content
/// are stripped.
pub fn render_markdown(source: &str) -> String {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
    let mut rendered = String::with_capacity(source.len() * 3 / 2);
    html::push_html(&mut rendered, Parser::new_ext(source, options));
    ammonia::clean(&rendered)
}

/// Orders listings for display: open deadlines first, closest first, then
/// expired ones, then listings without a submission deadline.
pub fn sort_by_deadline(items: &mut [WaveHack], now: DateTime<Utc>) {
    items.sort_by(|a, b| compare_deadlines(submission_deadline(a), submission_deadline(b), now));
}

fn submission_deadline(item: &WaveHack) -> Option<DateTime<Utc>> {
    item.active_wave.as_ref()?.submission_deadline
}

fn compare_deadlines(
    a: Option<DateTime<Utc>>,
    b: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => {
            let expired_a = a <= now;
            let expired_b = b <= now;
            expired_a.cmp(&expired_b).then(a.cmp(&b))
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// One countdown as the templates draw it.
#[derive(Debug, Clone, Serialize)]
pub struct DeadlineView {
    pub iso: String,
    pub formatted: String,
    pub remaining: TimeRemaining,
    pub label: String,
    pub urgency: Urgency,
    pub progress: f64,
}

impl DeadlineView {
    pub fn new(deadline: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let remaining = TimeRemaining::until(deadline, now);
        Self {
            iso: deadline.to_rfc3339(),
            formatted: format_date(deadline),
            remaining,
            label: remaining.label(),
            urgency: remaining.urgency(),
            progress: remaining.progress_percent(),
        }
    }
}

/// Grant line on a card.
#[derive(Debug, Clone, Serialize)]
pub struct GrantView {
    pub amount: String,
    pub token: String,
    pub address: Option<String>,
}

/// A listing card.
#[derive(Debug, Clone, Serialize)]
pub struct WaveCard {
    pub id: String,
    pub title: String,
    pub url: String,
    pub is_public: bool,
    pub building_days: String,
    pub judging_days: String,
    pub opened: Option<String>,
    pub submission: Option<DeadlineView>,
    pub judging: Option<DeadlineView>,
    pub grant: Option<GrantView>,
}

impl WaveCard {
    pub fn new(item: &WaveHack, app_url: &str, now: DateTime<Utc>) -> Self {
        let wave = item.active_wave.as_ref();
        let grant = match (wave.and_then(|w| w.grant_amount.as_deref()), &item.grant_denomination) {
            (Some(amount), Some(token)) => format_grant_amount(amount).map(|amount| GrantView {
                amount,
                token: token.name.clone(),
                address: token.address.clone(),
            }),
            _ => None,
        };

        Self {
            id: item.id.clone(),
            title: item.title.clone().unwrap_or_else(|| item.id.clone()),
            url: format!("{}/{}", app_url.trim_end_matches('/'), item.id),
            is_public: item.is_public,
            building_days: days(item.building_days),
            judging_days: days(item.judging_days),
            opened: wave.and_then(|w| w.opened_at).map(format_date),
            submission: wave
                .and_then(|w| w.submission_deadline)
                .map(|d| DeadlineView::new(d, now)),
            judging: wave
                .and_then(|w| w.judgement_deadline)
                .map(|d| DeadlineView::new(d, now)),
            grant,
        }
    }
}

fn days(value: Option<u32>) -> String {
    value.map_or_else(|| MISSING.to_string(), |d| format!("{d} days"))
}

/// Summary figures ready for display.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryView {
    pub total_items: usize,
    pub active_count: usize,
    pub public_count: usize,
    pub unique_token_count: usize,
    pub tokens: Vec<String>,
    pub average_building_days: String,
    pub average_judging_days: String,
}

impl From<&Summary> for SummaryView {
    fn from(summary: &Summary) -> Self {
        Self {
            total_items: summary.total_items,
            active_count: summary.active_count,
            public_count: summary.public_count,
            unique_token_count: summary.unique_token_count,
            tokens: summary.tokens.clone(),
            average_building_days: format_average(summary.average_building_days),
            average_judging_days: format_average(summary.average_judging_days),
        }
    }
}

/// Labelled community link.
#[derive(Debug, Clone, Serialize)]
pub struct CommunityLink {
    pub label: &'static str,
    pub url: String,
}

/// Detail page content.
#[derive(Debug, Clone, Serialize)]
pub struct DetailView {
    pub card: WaveCard,
    /// Sanitized HTML rendered from the markdown description.
    pub description_html: Option<String>,
    pub community: Vec<CommunityLink>,
    pub criteria: Vec<Criterion>,
}

impl DetailView {
    pub fn new(detail: &WaveHackDetail, app_url: &str, now: DateTime<Utc>) -> Self {
        let community: Vec<CommunityLink> = detail
            .community
            .as_ref()
            .map(|c| {
                [
                    ("Website", &c.website_url),
                    ("Discord", &c.discord_url),
                    ("Twitter", &c.twitter_url),
                    ("Telegram", &c.telegram_url),
                ]
                .into_iter()
                .filter_map(|(label, url)| {
                    url.as_ref()
                        .filter(|u| !u.is_empty())
                        .map(|u| CommunityLink {
                            label,
                            url: u.clone(),
                        })
                })
                .collect()
            })
            .unwrap_or_default();

        let mut criteria: Vec<Criterion> = detail
            .criteria
            .iter()
            .filter(|c| c.is_active)
            .cloned()
            .collect();
        criteria.sort_by_key(|c| c.sort);

        Self {
            card: WaveCard::new(&detail.wave, app_url, now),
            description_html: detail
                .description
                .as_deref()
                .filter(|d| !d.trim().is_empty())
                .map(render_markdown),
            community,
            criteria,
        }
    }
}
