//! Price information parsed from the free-text fee fields of an event.
//!
//! The fee text is run through a fixed cascade: free detection, promotional
//! price, seat tiers, explicit range, partial-paid note, then a generic scan
//! for every won amount. The first step that recognises the text wins, so the
//! order matters for ambiguous inputs such as a range that also names a seat.

pub mod patterns;

use serde::Serialize;
use std::fmt;
use tracing::debug;

use crate::constants::{
    FREE_FLAG_VALUES, FREE_INDICATORS, FREE_LABEL, NO_PRICE_INFO, PARTIAL_PAID_INDICATORS,
    PARTIAL_PAID_LABEL, PRICE_INQUIRY, STARTING_FROM_SUFFIX, WON,
};
use crate::metrics::PriceMetrics;
use crate::types::EventRecord;

/// Normalized price descriptor for one event.
///
/// When `is_free` is set both prices are `None`; when both prices are set,
/// `min_price <= max_price`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceInfo {
    pub is_free: bool,
    pub min_price: Option<u64>,
    pub max_price: Option<u64>,
    pub display_text: String,
    pub raw_text: String,
    pub has_multiple_prices: bool,
    /// Cascade step that produced this result
    #[serde(skip)]
    pub strategy: PriceStrategy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PriceStrategy {
    Free,
    Promotional,
    SeatTier,
    Range,
    PartialPaid,
    Generic,
    #[default]
    NoPrice,
}

impl PriceStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceStrategy::Free => "free",
            PriceStrategy::Promotional => "promotional",
            PriceStrategy::SeatTier => "seat_tier",
            PriceStrategy::Range => "range",
            PriceStrategy::PartialPaid => "partial_paid",
            PriceStrategy::Generic => "generic",
            PriceStrategy::NoPrice => "no_price",
        }
    }
}

impl PriceInfo {
    fn free(raw_text: String) -> Self {
        Self {
            is_free: true,
            min_price: None,
            max_price: None,
            display_text: FREE_LABEL.to_string(),
            raw_text,
            has_multiple_prices: false,
            strategy: PriceStrategy::Free,
        }
    }

    fn priced(
        raw_text: String,
        min: u64,
        max: u64,
        display_text: String,
        has_multiple_prices: bool,
        strategy: PriceStrategy,
    ) -> Self {
        Self {
            is_free: false,
            min_price: Some(min),
            max_price: Some(max),
            display_text,
            raw_text,
            has_multiple_prices,
            strategy,
        }
    }

    fn unpriced(raw_text: String, is_free: bool, display_text: String, strategy: PriceStrategy) -> Self {
        Self {
            is_free,
            min_price: None,
            max_price: None,
            display_text,
            raw_text,
            has_multiple_prices: false,
            strategy,
        }
    }
}

/// Format won with thousands grouping, e.g. `20000` -> `"20,000원"`.
pub fn format_won(amount: u64) -> String {
    let digits = amount.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + WON.len());
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped.push_str(WON);
    grouped
}

fn starting_from(amount: u64) -> String {
    format!("{}{}", format_won(amount), STARTING_FROM_SUFFIX)
}

/// `"<min>원"` when every amount is the same, otherwise `"<min>원부터"`.
fn min_or_starting_from(min: u64, max: u64) -> String {
    if min == max {
        format_won(min)
    } else {
        starting_from(min)
    }
}

/// Exact, case-sensitive check of the categorical free flag.
pub fn is_free_flag(flag: Option<&str>) -> bool {
    flag.is_some_and(|f| FREE_FLAG_VALUES.contains(&f))
}

fn has_partial_paid_indicator(normalized: &str) -> bool {
    PARTIAL_PAID_INDICATORS.iter().any(|p| normalized.contains(p))
}

fn has_free_indicator(normalized: &str) -> bool {
    FREE_INDICATORS.iter().any(|p| normalized.contains(p))
}

fn assemble_raw_text(use_fee: Option<&str>, ticket: Option<&str>) -> String {
    [use_fee, ticket]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

/// Parse the fee fields of an event into a [`PriceInfo`].
///
/// Never fails: text that yields no price ends in the "가격 정보 없음" state.
pub fn parse_price_info(
    use_fee: Option<&str>,
    ticket: Option<&str>,
    is_free_flag_value: Option<&str>,
) -> PriceInfo {
    let raw_text = assemble_raw_text(use_fee, ticket);
    let normalized = raw_text.to_lowercase();

    let partial_paid = has_partial_paid_indicator(&normalized);
    let free_from_flag = is_free_flag(is_free_flag_value) && !partial_paid;
    let free_from_text = !partial_paid && has_free_indicator(&normalized);

    // A free phrase next to an explicit amount describes a sub-item, not the event
    let info = if free_from_flag || (free_from_text && !patterns::has_won_amount(&raw_text)) {
        PriceInfo::free(raw_text)
    } else {
        parse_paid(raw_text, free_from_flag)
    };

    debug!(
        strategy = info.strategy.as_str(),
        min = ?info.min_price,
        max = ?info.max_price,
        "Parsed price text"
    );
    PriceMetrics::record_parsed(info.strategy);
    info
}

/// Parse the price fields of a full event record.
pub fn parse_event_price(event: &EventRecord) -> PriceInfo {
    parse_price_info(
        event.use_fee.as_deref(),
        event.ticket.as_deref(),
        event.is_free.as_deref(),
    )
}

fn parse_paid(raw_text: String, free_from_flag: bool) -> PriceInfo {
    if let Some(promo) = patterns::find_promotion(&raw_text) {
        let display = format!("{} ({})", format_won(promo.discount), promo.label);
        return PriceInfo::priced(
            raw_text,
            promo.discount.min(promo.regular),
            promo.discount.max(promo.regular),
            display,
            true,
            PriceStrategy::Promotional,
        );
    }

    let seat_prices = patterns::find_seat_tier_prices(&raw_text);
    if let (Some(&min), Some(&max)) = (seat_prices.iter().min(), seat_prices.iter().max()) {
        let multiple = seat_prices.len() > 1;
        return PriceInfo::priced(
            raw_text,
            min,
            max,
            min_or_starting_from(min, max),
            multiple,
            PriceStrategy::SeatTier,
        );
    }

    if let Some((min, max)) = patterns::find_range(&raw_text) {
        let display = format!("{}~{}", format_won(min), format_won(max));
        return PriceInfo::priced(raw_text, min, max, display, true, PriceStrategy::Range);
    }

    if let Some(note) = patterns::find_partial_paid_note(&raw_text) {
        let display = format!("{PARTIAL_PAID_LABEL} ({note})");
        return PriceInfo::unpriced(raw_text, false, display, PriceStrategy::PartialPaid);
    }

    let prices = patterns::extract_prices(&raw_text);
    match (prices.iter().min(), prices.iter().max()) {
        (Some(&min), Some(&max)) => {
            let multiple = prices.len() > 1;
            PriceInfo::priced(
                raw_text,
                min,
                max,
                min_or_starting_from(min, max),
                multiple,
                PriceStrategy::Generic,
            )
        }
        _ => {
            let display = if free_from_flag { FREE_LABEL } else { NO_PRICE_INFO };
            PriceInfo::unpriced(raw_text, free_from_flag, display.to_string(), PriceStrategy::NoPrice)
        }
    }
}

/// Short label for cards and list rows.
pub fn simple_price_display(info: &PriceInfo) -> String {
    if info.is_free {
        return FREE_LABEL.to_string();
    }
    if info.display_text.contains(PARTIAL_PAID_LABEL) {
        return info.display_text.clone();
    }
    let Some(min) = info.min_price else {
        return PRICE_INQUIRY.to_string();
    };
    if info.has_multiple_prices && info.max_price != Some(min) {
        starting_from(min)
    } else {
        format_won(min)
    }
}

/// A disagreement between the free flag and the parsed price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceIssue {
    /// Flag says free but a price was parsed
    FreeFlagWithPrice,
    /// Flag says paid but the text parsed as free
    PaidFlagParsedFree,
    /// `min_price` exceeds `max_price`
    InvertedRange,
}

impl fmt::Display for PriceIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            PriceIssue::FreeFlagWithPrice => "무료 플래그가 설정되었지만 가격 정보가 있습니다",
            PriceIssue::PaidFlagParsedFree => "유료 플래그이지만 무료로 파싱되었습니다",
            PriceIssue::InvertedRange => "최소 가격이 최대 가격보다 큽니다",
        };
        f.write_str(message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceConsistency {
    pub is_consistent: bool,
    pub issues: Vec<PriceIssue>,
}

fn is_paid_flag(flag: Option<&str>) -> bool {
    flag.is_some_and(|f| f.contains("유료") || f.trim().eq_ignore_ascii_case("paid"))
}

/// Diagnose disagreements between a parse result and the event's free flag.
pub fn validate_price_consistency(info: &PriceInfo, is_free_flag_value: Option<&str>) -> PriceConsistency {
    let mut issues = Vec::new();

    let has_price = info.min_price.is_some() || info.max_price.is_some();
    if is_free_flag(is_free_flag_value) && !info.is_free && has_price {
        issues.push(PriceIssue::FreeFlagWithPrice);
    }

    if is_paid_flag(is_free_flag_value) && info.is_free && !info.raw_text.is_empty() {
        issues.push(PriceIssue::PaidFlagParsedFree);
    }

    if let (Some(min), Some(max)) = (info.min_price, info.max_price) {
        if min > max {
            issues.push(PriceIssue::InvertedRange);
        }
    }

    PriceConsistency {
        is_consistent: issues.is_empty(),
        issues,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPriceValidation {
    pub id: i64,
    pub title: String,
    pub price: PriceInfo,
    pub simple_display: String,
    pub consistency: PriceConsistency,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub checked: usize,
    pub inconsistent: usize,
    pub results: Vec<EventPriceValidation>,
}

/// Parse and check the first `limit` events, for inspecting parser behaviour on real data.
pub fn validate_events(events: &[EventRecord], limit: usize) -> ValidationReport {
    let results: Vec<EventPriceValidation> = events
        .iter()
        .take(limit)
        .map(|event| {
            let price = parse_event_price(event);
            let consistency = validate_price_consistency(&price, event.is_free.as_deref());
            EventPriceValidation {
                id: event.id,
                title: event.title.clone(),
                simple_display: simple_price_display(&price),
                price,
                consistency,
            }
        })
        .collect();

    let inconsistent = results.iter().filter(|r| !r.consistency.is_consistent).count();
    PriceMetrics::record_inconsistencies(inconsistent);

    ValidationReport {
        checked: results.len(),
        inconsistent,
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(use_fee: &str) -> PriceInfo {
        parse_price_info(Some(use_fee), None, None)
    }

    #[test]
    fn test_format_won() {
        assert_eq!(format_won(0), "0원");
        assert_eq!(format_won(500), "500원");
        assert_eq!(format_won(1_000), "1,000원");
        assert_eq!(format_won(143_000), "143,000원");
        assert_eq!(format_won(1_234_567), "1,234,567원");
    }

    #[test]
    fn test_raw_text_assembly() {
        let info = parse_price_info(Some("  성인 5,000원"), Some("현장 판매 "), None);
        assert_eq!(info.raw_text, "성인 5,000원 현장 판매");

        let info = parse_price_info(Some(""), Some("전석 10,000원"), None);
        assert_eq!(info.raw_text, "전석 10,000원");

        let info = parse_price_info(None, None, None);
        assert_eq!(info.raw_text, "");
        assert_eq!(info.display_text, NO_PRICE_INFO);
    }

    #[test]
    fn test_free_flag_is_exact_match() {
        assert!(parse_price_info(None, None, Some("무료")).is_free);
        assert!(parse_price_info(None, None, Some("free")).is_free);
        assert!(!parse_price_info(None, None, Some("FREE")).is_free);
        assert!(!parse_price_info(None, None, Some("유료")).is_free);
    }

    #[test]
    fn test_partial_paid_beats_free_flag() {
        let info = parse_price_info(Some("무료 (재료비 별도)"), None, Some("무료"));
        assert!(!info.is_free);
        assert_eq!(info.display_text, "일부 유료 (재료비)");
        assert_eq!(info.strategy, PriceStrategy::PartialPaid);
    }

    #[test]
    fn test_free_phrase_with_amount_is_not_free() {
        let info = parse("무료 공연, 기념품 3,000원");
        assert!(!info.is_free);
        assert_eq!(info.min_price, Some(3_000));
    }

    #[test]
    fn test_free_text_variants() {
        for text in ["FREE entry", "입장료 없음", "관람료 없음", "참가비 없음"] {
            let info = parse(text);
            assert!(info.is_free, "{text}");
            assert_eq!(info.strategy, PriceStrategy::Free);
        }
    }

    #[test]
    fn test_promotional_price() {
        let info = parse("오픈기념할인: 15,000원 (정가 20,000원)");
        assert_eq!(info.min_price, Some(15_000));
        assert_eq!(info.max_price, Some(20_000));
        assert_eq!(info.display_text, "15,000원 (오픈기념할인)");
        assert!(info.has_multiple_prices);
        assert_eq!(info.strategy, PriceStrategy::Promotional);
    }

    #[test]
    fn test_seat_tier_beats_range() {
        let info = parse("R석 50,000원~S석 30,000원");
        assert_eq!(info.strategy, PriceStrategy::SeatTier);
        assert_eq!(info.display_text, "30,000원부터");
    }

    #[test]
    fn test_seat_tier_same_price() {
        let info = parse("R석 40,000원 S석 40,000원");
        assert_eq!(info.display_text, "40,000원");
        assert!(info.has_multiple_prices);
    }

    #[test]
    fn test_range_with_korean_units() {
        let info = parse("3만원~5만원");
        assert_eq!((info.min_price, info.max_price), (Some(30_000), Some(50_000)));
        assert_eq!(info.display_text, "30,000원~50,000원");
    }

    #[test]
    fn test_generic_single_price() {
        let info = parse("1인 5000원");
        assert_eq!(info.display_text, "5,000원");
        assert!(!info.has_multiple_prices);
        assert_eq!(info.strategy, PriceStrategy::Generic);
    }

    #[test]
    fn test_no_price_information() {
        let info = parse("현장 문의");
        assert!(!info.is_free);
        assert_eq!(info.min_price, None);
        assert_eq!(info.display_text, NO_PRICE_INFO);
        assert_eq!(info.strategy, PriceStrategy::NoPrice);
    }

    #[test]
    fn test_simple_price_display() {
        assert_eq!(simple_price_display(&parse("무료")), "무료");
        assert_eq!(simple_price_display(&parse("현장 문의")), PRICE_INQUIRY);
        assert_eq!(simple_price_display(&parse("99,000원~143,000원")), "99,000원부터");
        assert_eq!(simple_price_display(&parse("전석 20,000원")), "20,000원");
        assert_eq!(
            simple_price_display(&parse("무료 (일부 유료(체험 부스))")),
            "일부 유료 (체험 부스)"
        );
    }

    #[test]
    fn test_validate_price_consistency() {
        let priced = parse("성인 5,000원");
        let result = validate_price_consistency(&priced, Some("무료"));
        assert_eq!(result.issues, vec![PriceIssue::FreeFlagWithPrice]);

        let free = parse("무료");
        let result = validate_price_consistency(&free, Some("유료"));
        assert_eq!(result.issues, vec![PriceIssue::PaidFlagParsedFree]);
        assert!(validate_price_consistency(&free, None).is_consistent);

        let mut inverted = priced.clone();
        inverted.min_price = Some(9_000);
        let result = validate_price_consistency(&inverted, None);
        assert_eq!(result.issues, vec![PriceIssue::InvertedRange]);
        assert_eq!(result.issues[0].to_string(), "최소 가격이 최대 가격보다 큽니다");
    }

    #[test]
    fn test_price_info_serializes_camel_case() {
        let value = serde_json::to_value(parse("전석 20,000원")).unwrap();
        assert_eq!(value["isFree"], false);
        assert_eq!(value["minPrice"], 20_000);
        assert_eq!(value["displayText"], "20,000원");
        assert!(value.get("strategy").is_none());
    }
}
