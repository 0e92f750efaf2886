use crate::constants::SEOUL_UTC_OFFSET_HOURS;
use crate::error::{DashboardError, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// A cultural event as served by the events API.
///
/// Only `id` and `title` are guaranteed; every other field may be missing,
/// and timestamps that cannot be parsed are read as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub codename: Option<String>,
    #[serde(default)]
    pub guname: Option<String>,
    /// Free-text schedule as published, e.g. "2025-03-01~2025-03-09".
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub place: Option<String>,
    #[serde(default)]
    pub org_name: Option<String>,
    #[serde(default)]
    pub use_trgt: Option<String>,
    #[serde(default)]
    pub use_fee: Option<String>,
    #[serde(default)]
    pub ticket: Option<String>,
    #[serde(default)]
    pub is_free: Option<String>,
    #[serde(default)]
    pub theme_code: Option<String>,
    #[serde(default)]
    pub main_img: Option<String>,
    #[serde(default)]
    pub org_link: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub lot: Option<f64>,
}

impl EventRecord {
    pub fn new(id: i64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            ..Self::default()
        }
    }

    /// District name, trimmed; `None` when blank.
    pub fn district(&self) -> Option<&str> {
        non_blank(self.guname.as_deref())
    }

    /// Category name, trimmed; `None` when blank.
    pub fn category(&self) -> Option<&str> {
        non_blank(self.codename.as_deref())
    }

    /// Transform a raw Seoul Open Data row (upper-case keys) into a record.
    pub fn from_open_data_row(row: &Value) -> Result<Self> {
        let row = OpenDataRow(row);
        let title = row
            .str_field("TITLE")
            .ok_or_else(|| DashboardError::MissingField("TITLE".into()))?;

        Ok(Self {
            id: row.id_field("CODENAME_SEQ")?,
            title,
            codename: row.str_field("CODENAME"),
            guname: row.str_field("GUNAME"),
            date: row.str_field("DATE"),
            start_date: row.str_field("STRTDATE").and_then(|s| parse_timestamp(&s)),
            end_date: row.str_field("END_DATE").and_then(|s| parse_timestamp(&s)),
            created_at: row.str_field("RGSTDATE").and_then(|s| parse_timestamp(&s)),
            place: row.str_field("PLACE"),
            org_name: row.str_field("ORG_NAME"),
            use_trgt: row.str_field("USE_TRGT"),
            use_fee: row.str_field("USE_FEE"),
            ticket: row.str_field("TICKET"),
            is_free: row.str_field("IS_FREE"),
            theme_code: row.str_field("THEME_CODE"),
            main_img: row.str_field("MAIN_IMG"),
            org_link: row.str_field("ORG_LINK"),
            lat: row.float_field("LAT"),
            lot: row.float_field("LOT"),
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

struct OpenDataRow<'a>(&'a Value);

impl OpenDataRow<'_> {
    fn str_field(&self, key: &str) -> Option<String> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    fn id_field(&self, key: &str) -> Result<i64> {
        let value = self.0.get(key);
        let parsed = match value {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) => {
                s.parse().ok()
            }
            _ => None,
        };
        parsed.ok_or_else(|| DashboardError::InvalidRecord {
            message: format!("invalid integer field {key}: {value:?}"),
        })
    }

    fn float_field(&self, key: &str) -> Option<f64> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

fn seoul_offset() -> Option<FixedOffset> {
    FixedOffset::east_opt(SEOUL_UTC_OFFSET_HOURS * 3600)
}

/// Parse a timestamp the way the events API and open-data feed emit them.
///
/// Offset-carrying values keep their offset; naive values are Seoul local time.
/// Returns `None` for anything unrecognised instead of failing.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.with_timezone(&Utc));
    }

    let formats = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    let naive = formats
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;

    seoul_offset()?
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

fn lenient_timestamp<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => parse_timestamp(&s),
        _ => None,
    })
}

fn lenient_number<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Parse a JSON document of events.
///
/// Accepts a bare array, a paged list response (`{"items": [...]}`), and raw
/// open-data rows (detected by their `TITLE` key). Rows that fail to convert
/// are skipped with a warning.
pub fn parse_events_document(json: &str) -> Result<Vec<EventRecord>> {
    let document: Value = serde_json::from_str(json)?;
    let rows = match &document {
        Value::Array(rows) => rows,
        Value::Object(map) => map
            .get("items")
            .and_then(Value::as_array)
            .ok_or_else(|| DashboardError::MissingField("items".into()))?,
        _ => {
            return Err(DashboardError::InvalidRecord {
                message: "expected an array of events or an object with `items`".into(),
            })
        }
    };

    let mut events = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        let converted = if row.get("TITLE").is_some() {
            EventRecord::from_open_data_row(row)
        } else {
            EventRecord::deserialize(row).map_err(DashboardError::from)
        };
        match converted {
            Ok(event) => events.push(event),
            Err(e) => warn!(index, error = %e, "Skipping malformed event row"),
        }
    }

    debug!(total = rows.len(), loaded = events.len(), "Parsed events document");
    Ok(events)
}

/// Read and parse an events file. See [`parse_events_document`].
pub fn load_events(path: impl AsRef<Path>) -> Result<Vec<EventRecord>> {
    let content = fs::read_to_string(path.as_ref())?;
    parse_events_document(&content)
}
