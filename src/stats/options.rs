//! Smaller views used around the dashboard: filter dropdown options, headline
//! counts, the current week's events and human date-range labels.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use std::collections::BTreeSet;

use crate::constants::{DEFAULT_POPULAR_DISTRICTS, NO_SCHEDULE_LABEL};
use crate::types::EventRecord;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    pub districts: Vec<String>,
    pub fee_options: Vec<String>,
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadlineStats {
    pub free_events_count: usize,
    pub paid_or_unknown_count: usize,
    pub district_count: usize,
    pub popular_districts: Vec<String>,
}

fn distinct_sorted<'a>(values: impl Iterator<Item = Option<&'a str>>) -> Vec<String> {
    values
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Distinct non-blank districts, fee flags and categories, each sorted.
pub fn available_options(events: &[EventRecord]) -> FilterOptions {
    FilterOptions {
        districts: distinct_sorted(events.iter().map(|e| e.guname.as_deref())),
        fee_options: distinct_sorted(events.iter().map(|e| e.is_free.as_deref())),
        categories: distinct_sorted(events.iter().map(|e| e.codename.as_deref())),
    }
}

/// Free when the flag alone says so; the fee text is not consulted here.
fn flagged_free(event: &EventRecord) -> bool {
    event.is_free.as_deref().is_some_and(|flag| {
        let normalized = flag.trim().to_lowercase();
        !normalized.is_empty()
            && (normalized.contains("무료") || normalized.contains("free") || normalized == "y")
    })
}

/// Counts shown in the stats header. `popular_limit` caps the district list.
pub fn headline_stats(events: &[EventRecord], popular_limit: usize) -> HeadlineStats {
    let free_events_count = events.iter().filter(|e| flagged_free(e)).count();
    let districts = available_options(events).districts;

    HeadlineStats {
        free_events_count,
        paid_or_unknown_count: events.len().saturating_sub(free_events_count),
        district_count: districts.len(),
        popular_districts: districts.into_iter().take(popular_limit).collect(),
    }
}

pub fn default_headline_stats(events: &[EventRecord]) -> HeadlineStats {
    headline_stats(events, DEFAULT_POPULAR_DISTRICTS)
}

/// Events starting in the Sunday-to-Saturday week that contains `now`,
/// measured in the given local offset.
pub fn this_week_events<'a>(
    events: &'a [EventRecord],
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Vec<&'a EventRecord> {
    let today = now.with_timezone(&offset).date_naive();
    let sunday = today - Duration::days(i64::from(today.weekday().num_days_from_sunday()));
    let Some(week_start) = local_midnight(sunday, offset) else {
        return Vec::new();
    };
    let week_end = week_start + Duration::days(7);

    events
        .iter()
        .filter(|e| e.start_date.is_some_and(|start| start >= week_start && start < week_end))
        .collect()
}

fn local_midnight(date: NaiveDate, offset: FixedOffset) -> Option<DateTime<Utc>> {
    let midnight = date.and_hms_opt(0, 0, 0)?;
    offset
        .from_local_datetime(&midnight)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

fn month_day(date: NaiveDate) -> String {
    format!("{}월 {}일", date.month(), date.day())
}

/// Label such as "3월 5일 - 3월 7일" for an event's schedule.
pub fn format_date_range(event: &EventRecord, offset: FixedOffset) -> String {
    let local = |dt: DateTime<Utc>| dt.with_timezone(&offset).date_naive();
    match (event.start_date.map(local), event.end_date.map(local)) {
        (Some(start), Some(end)) if start == end => month_day(start),
        (Some(start), Some(end)) => format!("{} - {}", month_day(start), month_day(end)),
        (Some(start), None) => format!("{} 이후", month_day(start)),
        (None, Some(end)) => format!("{} 까지", month_day(end)),
        (None, None) => event
            .date
            .clone()
            .unwrap_or_else(|| NO_SCHEDULE_LABEL.to_string()),
    }
}
