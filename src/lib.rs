pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod price;
pub mod stats;
pub mod types;

pub use error::{DashboardError, Result};
pub use price::{
    parse_event_price, parse_price_info, simple_price_display, validate_events,
    validate_price_consistency, PriceConsistency, PriceInfo, PriceIssue, PriceStrategy,
};
pub use stats::{aggregate, aggregate_with, AggregateOptions, AnalyticsSummary};
pub use types::{load_events, parse_timestamp, EventRecord};
