//! Dashboard statistics folded from a batch of event records.
//!
//! [`aggregate`] makes a single pass over the events and then reduces the
//! tallies into sorted distributions, a monthly timeline, a weekday histogram
//! and per free/paid price insight. The result depends only on the input
//! events and the reference time.

pub mod options;

use chrono::{DateTime, Datelike, FixedOffset, Offset, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::info;

use crate::constants::{
    DEFAULT_BOTTOM_DISTRICTS, DEFAULT_TIMELINE_MONTHS, DEFAULT_TOP_CATEGORIES,
    DEFAULT_TOP_DISTRICTS, MILLIS_PER_DAY, SEOUL_UTC_OFFSET_HOURS, WEEKDAY_LABELS,
};
use crate::metrics::AggregateMetrics;
use crate::types::EventRecord;

// Digits with comma or space grouping, e.g. `12,000` or `10 000`.
static FIRST_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d(?:[\d,]|\s+\d)*").unwrap_or_else(|e| panic!("invalid number pattern: {e}"))
});

/// Limits and calendar settings for [`aggregate_with`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateOptions {
    pub top_districts: usize,
    pub bottom_districts: usize,
    pub top_categories: usize,
    pub timeline_months: usize,
    /// Offset used for weekday buckets; month buckets are always UTC.
    pub utc_offset_hours: i32,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            top_districts: DEFAULT_TOP_DISTRICTS,
            bottom_districts: DEFAULT_BOTTOM_DISTRICTS,
            top_categories: DEFAULT_TOP_CATEGORIES,
            timeline_months: DEFAULT_TIMELINE_MONTHS,
            utc_offset_hours: SEOUL_UTC_OFFSET_HOURS,
        }
    }
}

impl AggregateOptions {
    /// The configured offset, or UTC when it is out of range.
    pub fn local_offset(&self) -> FixedOffset {
        local_offset(self.utc_offset_hours)
    }
}

pub(crate) fn local_offset(hours: i32) -> FixedOffset {
    hours
        .checked_mul(3600)
        .and_then(FixedOffset::east_opt)
        .unwrap_or_else(|| Utc.fix())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelCount {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistrictDistribution {
    /// Every district, most events first
    pub all: Vec<LabelCount>,
    pub top: Vec<LabelCount>,
    /// Least active districts, fewest events first
    pub bottom: Vec<LabelCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryDistribution {
    pub all: Vec<LabelCount>,
    pub top: Vec<LabelCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthCount {
    /// `YYYY-MM`
    pub month: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekdayCount {
    /// 0 = Sunday .. 6 = Saturday
    pub day: u32,
    pub label: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBucket {
    pub count: usize,
    /// Mean sampled price; `None` when nothing was sampled
    pub average_price: Option<f64>,
    /// Mean days between listing and start; `None` when no event had both dates
    pub average_lead_days: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceInsight {
    pub free: PriceBucket,
    pub paid: PriceBucket,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub total: usize,
    pub upcoming: usize,
    pub ongoing: usize,
    pub past: usize,
    pub free_count: usize,
    pub paid_count: usize,
    pub free_ratio: f64,
    pub districts: DistrictDistribution,
    pub categories: CategoryDistribution,
    pub timeline: Vec<MonthCount>,
    pub weekdays: Vec<WeekdayCount>,
    pub price_insight: PriceInsight,
}

/// Free/paid heuristic used for dashboard counts.
///
/// Free when the flag mentions 무료/free or is `y`, or the fee text mentions
/// 무료/free or contains `0원`. This is deliberately simpler than the price
/// parser: any amount ending in `0원` (`20,000원`) also counts as free.
pub fn is_free_event(event: &EventRecord) -> bool {
    let flag_free = event.is_free.as_deref().is_some_and(|flag| {
        let normalized = flag.trim().to_lowercase();
        normalized.contains("무료") || normalized.contains("free") || normalized == "y"
    });

    let fee_free = event.use_fee.as_deref().is_some_and(|fee| {
        let normalized = fee.to_lowercase();
        normalized.contains("무료") || normalized.contains("free") || normalized.contains("0원")
    });

    flag_free || fee_free
}

fn first_price(text: Option<&str>) -> Option<u64> {
    let found = FIRST_NUMBER.find(text?)?;
    let digits: String = found
        .as_str()
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok().filter(|price| *price > 0)
}

/// Price sample for a paid event: the first number in `use_fee`, else in `ticket`.
pub fn sample_price(event: &EventRecord) -> Option<u64> {
    first_price(event.use_fee.as_deref()).or_else(|| first_price(event.ticket.as_deref()))
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[derive(Default)]
struct Tally {
    total: usize,
    upcoming: usize,
    ongoing: usize,
    past: usize,
    undated: usize,
    free: usize,
    paid: usize,
    districts: HashMap<String, usize>,
    categories: HashMap<String, usize>,
    months: BTreeMap<String, usize>,
    weekdays: [usize; 7],
    free_lead_days: Vec<f64>,
    paid_lead_days: Vec<f64>,
    paid_prices: Vec<f64>,
}

impl Tally {
    fn add(&mut self, event: &EventRecord, now: DateTime<Utc>, offset: FixedOffset) {
        self.total += 1;

        match event.start_date {
            Some(start) => {
                // Missing end means a single-moment event
                let end = event.end_date.unwrap_or(start);
                if start > now {
                    self.upcoming += 1;
                } else if end >= now {
                    self.ongoing += 1;
                } else {
                    self.past += 1;
                }

                *self.months.entry(start.format("%Y-%m").to_string()).or_default() += 1;
                let weekday = start.with_timezone(&offset).weekday().num_days_from_sunday();
                self.weekdays[weekday as usize] += 1;
            }
            None => self.undated += 1,
        }

        if let Some(district) = event.district() {
            *self.districts.entry(district.to_string()).or_default() += 1;
        }
        if let Some(category) = event.category() {
            *self.categories.entry(category.to_string()).or_default() += 1;
        }

        let free = is_free_event(event);
        let lead_days = match (event.created_at, event.start_date) {
            (Some(created), Some(start)) => {
                Some(((start - created).num_milliseconds() as f64 / MILLIS_PER_DAY).max(0.0))
            }
            _ => None,
        };

        if free {
            self.free += 1;
            self.free_lead_days.extend(lead_days);
        } else {
            self.paid += 1;
            self.paid_lead_days.extend(lead_days);
            self.paid_prices.extend(sample_price(event).map(|p| p as f64));
        }
    }

    fn finish(self, options: &AggregateOptions) -> AnalyticsSummary {
        let districts = ranked(self.districts);
        let mut bottom = districts[districts.len().saturating_sub(options.bottom_districts)..].to_vec();
        bottom.sort_by_key(|entry| entry.count);
        let top = districts.iter().take(options.top_districts).cloned().collect();

        let categories = ranked(self.categories);
        let top_categories = categories.iter().take(options.top_categories).cloned().collect();

        let skip = self.months.len().saturating_sub(options.timeline_months);
        let timeline = self
            .months
            .into_iter()
            .skip(skip)
            .map(|(month, count)| MonthCount { month, count })
            .collect();

        let weekdays = self
            .weekdays
            .iter()
            .zip(WEEKDAY_LABELS)
            .enumerate()
            .map(|(day, (&count, label))| WeekdayCount {
                day: day as u32,
                label,
                count,
            })
            .collect();

        let free_ratio = if self.total == 0 {
            0.0
        } else {
            self.free as f64 / self.total as f64
        };

        AnalyticsSummary {
            total: self.total,
            upcoming: self.upcoming,
            ongoing: self.ongoing,
            past: self.past,
            free_count: self.free,
            paid_count: self.paid,
            free_ratio,
            districts: DistrictDistribution {
                all: districts,
                top,
                bottom,
            },
            categories: CategoryDistribution {
                all: categories,
                top: top_categories,
            },
            timeline,
            weekdays,
            price_insight: PriceInsight {
                free: PriceBucket {
                    count: self.free,
                    average_price: None,
                    average_lead_days: mean(&self.free_lead_days),
                },
                paid: PriceBucket {
                    count: self.paid,
                    average_price: mean(&self.paid_prices),
                    average_lead_days: mean(&self.paid_lead_days),
                },
            },
        }
    }
}

/// Most frequent first; ties broken by label so output is stable.
fn ranked(counts: HashMap<String, usize>) -> Vec<LabelCount> {
    let mut entries: Vec<LabelCount> = counts
        .into_iter()
        .map(|(label, count)| LabelCount { label, count })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    entries
}

/// Aggregate with the default limits (5 districts, 8 categories, 8 months, Seoul weekdays).
pub fn aggregate(events: &[EventRecord], now: DateTime<Utc>) -> AnalyticsSummary {
    aggregate_with(events, now, &AggregateOptions::default())
}

pub fn aggregate_with(
    events: &[EventRecord],
    now: DateTime<Utc>,
    options: &AggregateOptions,
) -> AnalyticsSummary {
    let offset = options.local_offset();
    let mut tally = Tally::default();
    for event in events {
        tally.add(event, now, offset);
    }

    let undated = tally.undated;
    let summary = tally.finish(options);

    info!(
        total = summary.total,
        upcoming = summary.upcoming,
        ongoing = summary.ongoing,
        past = summary.past,
        undated,
        free = summary.free_count,
        "Aggregated event statistics"
    );
    AggregateMetrics::record_run(summary.total, undated);
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn event(id: i64) -> EventRecord {
        EventRecord::new(id, format!("event {id}"))
    }

    #[test]
    fn test_is_free_event() {
        let mut e = event(1);
        assert!(!is_free_event(&e));

        e.is_free = Some(" Y ".into());
        assert!(is_free_event(&e));

        e.is_free = Some("유료".into());
        e.use_fee = Some("현장 결제".into());
        assert!(!is_free_event(&e));

        // Any amount ending in 0원 reads as free here
        e.use_fee = Some("전석 20,000원".into());
        assert!(is_free_event(&e));

        e.use_fee = Some("전석 25,005원".into());
        assert!(!is_free_event(&e));

        e.use_fee = Some("0원".into());
        assert!(is_free_event(&e));

        e.use_fee = Some("Free admission".into());
        assert!(is_free_event(&e));
    }

    #[test]
    fn test_sample_price() {
        let mut e = event(1);
        e.use_fee = Some("성인 12,000원 / 청소년 8,000원".into());
        assert_eq!(sample_price(&e), Some(12_000));

        e.use_fee = Some("현장 문의".into());
        e.ticket = Some("5000원".into());
        assert_eq!(sample_price(&e), Some(5_000));

        e.ticket = Some("0원".into());
        assert_eq!(sample_price(&e), None);

        e.use_fee = Some("일반 10 000원".into());
        assert_eq!(sample_price(&e), Some(10_000));

        e.use_fee = Some("2회 공연, 5,000원".into());
        assert_eq!(sample_price(&e), Some(2));
    }

    #[test]
    fn test_temporal_status() {
        let now = at(2025, 5, 10, 12);
        let mut upcoming = event(1);
        upcoming.start_date = Some(at(2025, 5, 11, 0));

        let mut ongoing = event(2);
        ongoing.start_date = Some(at(2025, 5, 1, 0));
        ongoing.end_date = Some(at(2025, 5, 20, 0));

        let mut past = event(3);
        past.start_date = Some(at(2025, 4, 1, 0));
        past.end_date = Some(at(2025, 4, 2, 0));

        let undated = event(4);

        let summary = aggregate(&[upcoming, ongoing, past, undated], now);
        assert_eq!(summary.total, 4);
        assert_eq!((summary.upcoming, summary.ongoing, summary.past), (1, 1, 1));
        assert_eq!(summary.timeline.iter().map(|m| m.count).sum::<usize>(), 3);
        assert_eq!(summary.weekdays.iter().map(|w| w.count).sum::<usize>(), 3);
        // Undated events still count towards free/paid
        assert_eq!(summary.free_count + summary.paid_count, 4);
    }

    #[test]
    fn test_district_top_and_bottom() {
        let mut events = Vec::new();
        let spread = [("강남구", 6), ("종로구", 5), ("마포구", 4), ("중구", 3), ("용산구", 2), ("성동구", 1), ("광진구", 1)];
        let mut id = 0;
        for (district, count) in spread {
            for _ in 0..count {
                id += 1;
                let mut e = event(id);
                e.guname = Some(format!(" {district} "));
                events.push(e);
            }
        }
        let mut blank = event(100);
        blank.guname = Some("   ".into());
        events.push(blank);

        let summary = aggregate(&events, at(2025, 1, 1, 0));
        let labels = |v: &[LabelCount]| v.iter().map(|e| e.label.clone()).collect::<Vec<_>>();

        assert_eq!(summary.districts.all.len(), 7);
        assert_eq!(labels(&summary.districts.top), ["강남구", "종로구", "마포구", "중구", "용산구"]);
        assert_eq!(
            summary.districts.bottom.iter().map(|e| e.count).collect::<Vec<_>>(),
            [1, 1, 2, 3, 4]
        );
        assert_eq!(summary.districts.bottom[0].label, "광진구");
    }

    #[test]
    fn test_timeline_keeps_latest_months() {
        let events: Vec<EventRecord> = (1..=10)
            .map(|month| {
                let mut e = event(month as i64);
                e.start_date = Some(at(2024, month, 15, 3));
                e
            })
            .collect();

        let summary = aggregate(&events, at(2025, 1, 1, 0));
        let months: Vec<&str> = summary.timeline.iter().map(|m| m.month.as_str()).collect();
        assert_eq!(months.len(), 8);
        assert_eq!(months.first(), Some(&"2024-03"));
        assert_eq!(months.last(), Some(&"2024-10"));
    }

    #[test]
    fn test_weekday_uses_local_offset() {
        // Saturday 20:00 UTC is Sunday 05:00 in Seoul
        let mut e = event(1);
        e.start_date = Some(at(2025, 5, 10, 20));

        let seoul = aggregate(&[e.clone()], at(2025, 1, 1, 0));
        assert_eq!(seoul.weekdays[0].count, 1);
        assert_eq!(seoul.weekdays[0].label, "일");

        let options = AggregateOptions {
            utc_offset_hours: 0,
            ..AggregateOptions::default()
        };
        let utc = aggregate_with(&[e], at(2025, 1, 1, 0), &options);
        assert_eq!(utc.weekdays[6].count, 1);
    }

    #[test]
    fn test_price_insight_averages() {
        let mut paid_a = event(1);
        paid_a.use_fee = Some("현장 결제".into());
        paid_a.ticket = Some("10,000원".into());
        paid_a.created_at = Some(at(2025, 5, 1, 0));
        paid_a.start_date = Some(at(2025, 5, 11, 0));

        let mut paid_b = event(2);
        paid_b.use_fee = Some("현장 결제".into());
        paid_b.ticket = Some("30,000원".into());
        // Listed after it started: clamps to zero
        paid_b.created_at = Some(at(2025, 5, 12, 0));
        paid_b.start_date = Some(at(2025, 5, 11, 0));

        let mut free = event(3);
        free.is_free = Some("무료".into());

        let summary = aggregate(&[paid_a, paid_b, free], at(2025, 5, 1, 0));
        assert_eq!(summary.price_insight.paid.count, 2);
        assert_eq!(summary.price_insight.paid.average_price, Some(20_000.0));
        assert_eq!(summary.price_insight.paid.average_lead_days, Some(5.0));
        assert_eq!(summary.price_insight.free.count, 1);
        assert_eq!(summary.price_insight.free.average_price, None);
        assert_eq!(summary.price_insight.free.average_lead_days, None);
        assert!((summary.free_ratio - 1.0 / 3.0).abs() < 1e-9);
    }
}
