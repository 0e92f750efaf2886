/// Literals and default limits shared by the price parser and the aggregator.
/// Source data is Korean, so most of these are the exact phrases that appear in
/// the open-data fee fields.

pub const WON: &str = "원";

// Display texts
pub const FREE_LABEL: &str = "무료";
pub const NO_PRICE_INFO: &str = "가격 정보 없음";
pub const PRICE_INQUIRY: &str = "가격 문의";
pub const PARTIAL_PAID_LABEL: &str = "일부 유료";
pub const STARTING_FROM_SUFFIX: &str = "부터";

/// Values of the `is_free` flag the parser treats as an explicit free marker.
/// Compared exactly, no case folding.
pub const FREE_FLAG_VALUES: [&str; 2] = ["무료", "free"];

/// Phrases in the fee text that mark the whole event as free.
pub const FREE_INDICATORS: [&str; 6] = [
    "무료",
    "free",
    "0원",
    "입장료 없음",
    "참가비 없음",
    "관람료 없음",
];

/// Phrases that mean "free, except for something". Any of these overrides a free indicator.
pub const PARTIAL_PAID_INDICATORS: [&str; 6] = [
    "일부 유료",
    "별도 비용",
    "추가 비용",
    "재료비",
    "교재비",
    "체험비",
];

// Aggregator defaults
pub const DEFAULT_TOP_DISTRICTS: usize = 5;
pub const DEFAULT_BOTTOM_DISTRICTS: usize = 5;
pub const DEFAULT_TOP_CATEGORIES: usize = 8;
pub const DEFAULT_TIMELINE_MONTHS: usize = 8;
pub const DEFAULT_POPULAR_DISTRICTS: usize = 6;

/// Asia/Seoul, used for naive timestamps and local calendar calculations.
pub const SEOUL_UTC_OFFSET_HOURS: i32 = 9;

pub const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Sunday-first weekday labels.
pub const WEEKDAY_LABELS: [&str; 7] = ["일", "월", "화", "수", "목", "금", "토"];

pub const NO_SCHEDULE_LABEL: &str = "일정 정보 없음";

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";
pub const API_BASE_URL_ENV: &str = "SEOUL_NOW_API_BASE_URL";
pub const LOG_DIR_ENV: &str = "SEOUL_NOW_LOG_DIR";
