//! Compiled patterns for fee text and the amount extractors built on them.
//!
//! Amounts are read in three shapes: comma-grouped digits (`20,000원`),
//! a Korean unit multiplier (`3만원`, `5천원`) and bare digits (`5000원`).

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static WON_AMOUNT: Lazy<Regex> = Lazy::new(|| compile(r"\d+\s*원"));

static PROMOTIONAL: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"(오픈기념할인|할인|특가)가?\s*[:：]?\s*(\d{1,3}(?:,\d{3})+|\d+)\s*(만|천)?\s*원\s*\(\s*정가\s*[:：]?\s*(\d{1,3}(?:,\d{3})+|\d+)\s*(만|천)?\s*원\s*\)",
    )
});

static SEAT_TIER: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"(?i)(?:\b(?:VIP\s*석?|[RSA]\s*석)|전석|일반석|프리미엄석)\s*[:：]?\s*(?:(\d{1,3}(?:,\d{3})+)\s*원|(\d+)\s*(만|천)\s*원|(\d{4,})\s*원)",
    )
});

static RANGE: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"(\d{1,3}(?:,\d{3})+|\d+)\s*(만|천)?\s*(원)?\s*[-~]\s*(\d{1,3}(?:,\d{3})+|\d+)\s*(만|천)?\s*원",
    )
});

static PARTIAL_PAID: Lazy<[Regex; 6]> = Lazy::new(|| {
    [
        compile(r"일부\s*유료\s*\(([^)]+)\)"),
        compile(r"별도\s*비용\s*\(([^)]+)\)"),
        compile(r"추가\s*비용\s*\(([^)]+)\)"),
        compile(r"((?:재료|교재|체험|입장)(?:비|료))\s*별도"),
        compile(r"(재료비|교재비|체험비)\s*[:：]\s*[^,\n]+"),
        compile(r"\*\s*([^:：*\n]*(?:비|료)\s*[:：]\s*[^,\n*]+)"),
    ]
});

static COMMA_AMOUNT: Lazy<Regex> = Lazy::new(|| compile(r"(\d{1,3}(?:,\d{3})+)\s*원"));
static KOREAN_UNIT_AMOUNT: Lazy<Regex> = Lazy::new(|| compile(r"(\d+)\s*(만|천)\s*원"));
static BARE_AMOUNT: Lazy<Regex> = Lazy::new(|| compile(r"(\d{4,})\s*원"));

// Every pattern in this module is a literal covered by the tests below.
fn compile(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(re) => re,
        Err(e) => panic!("invalid built-in pattern {pattern:?}: {e}"),
    }
}

/// A promotional price with its regular price in parentheses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Promotion {
    pub label: String,
    pub discount: u64,
    pub regular: u64,
}

/// Convert digits (commas allowed) and an optional Korean unit into won.
/// Overflowing or malformed fragments yield `None`.
pub fn parse_amount(digits: &str, unit: Option<&str>) -> Option<u64> {
    let base: u64 = digits.replace(',', "").parse().ok()?;
    let multiplier = match unit {
        Some("만") => 10_000,
        Some("천") => 1_000,
        _ => 1,
    };
    base.checked_mul(multiplier)
}

fn amount_at(caps: &Captures<'_>, digits: usize, unit: Option<usize>) -> Option<u64> {
    let digits = caps.get(digits)?.as_str();
    parse_amount(digits, unit.and_then(|i| caps.get(i)).map(|m| m.as_str()))
}

/// True when the text carries any digits immediately followed by 원.
pub fn has_won_amount(text: &str) -> bool {
    WON_AMOUNT.is_match(text)
}

pub fn find_promotion(text: &str) -> Option<Promotion> {
    let caps = PROMOTIONAL.captures(text)?;
    Some(Promotion {
        label: caps.get(1)?.as_str().to_string(),
        discount: amount_at(&caps, 2, Some(3))?,
        regular: amount_at(&caps, 4, Some(5))?,
    })
}

/// Amounts attached to seat-class tokens, in order of appearance.
pub fn find_seat_tier_prices(text: &str) -> Vec<u64> {
    SEAT_TIER
        .captures_iter(text)
        .filter_map(|caps| {
            if caps.get(1).is_some() {
                amount_at(&caps, 1, None)
            } else if caps.get(2).is_some() {
                amount_at(&caps, 2, Some(3))
            } else {
                amount_at(&caps, 4, None)
            }
        })
        .collect()
}

/// First `<a>[원]?[-~]<b>원` range as `(min, max)`.
///
/// A bare leading number borrows the trailing unit, so `3~5만원` reads as
/// 30,000 to 50,000.
pub fn find_range(text: &str) -> Option<(u64, u64)> {
    let caps = RANGE.captures(text)?;
    let end_unit = caps.get(5).map(|m| m.as_str());
    let start_unit = match (caps.get(2), caps.get(3)) {
        (Some(unit), _) => Some(unit.as_str()),
        (None, None) => end_unit,
        (None, Some(_)) => None,
    };

    let start = parse_amount(caps.get(1)?.as_str(), start_unit)?;
    let end = parse_amount(caps.get(4)?.as_str(), end_unit)?;
    Some((start.min(end), start.max(end)))
}

/// The note describing what costs extra on a nominally free event.
pub fn find_partial_paid_note(text: &str) -> Option<String> {
    PARTIAL_PAID.iter().find_map(|pattern| {
        let caps = pattern.captures(text)?;
        let note = caps.get(1)?.as_str().trim();
        (!note.is_empty()).then(|| note.to_string())
    })
}

/// Every won amount in the text.
///
/// Patterns run in priority order (comma-grouped, Korean unit, bare digits).
/// A value already produced by an earlier pattern is not collected again by a
/// later one; repeats within one pattern are kept. Zero amounts are ignored.
pub fn extract_prices(text: &str) -> Vec<u64> {
    let mut prices = Vec::new();

    let comma: Vec<u64> = COMMA_AMOUNT
        .captures_iter(text)
        .filter_map(|caps| amount_at(&caps, 1, None))
        .collect();
    let korean: Vec<u64> = KOREAN_UNIT_AMOUNT
        .captures_iter(text)
        .filter_map(|caps| amount_at(&caps, 1, Some(2)))
        .collect();
    let bare: Vec<u64> = BARE_AMOUNT
        .captures_iter(text)
        .filter_map(|caps| amount_at(&caps, 1, None))
        .collect();

    for group in [comma, korean, bare] {
        let seen = prices.len();
        for value in group.into_iter().filter(|v| *v > 0) {
            if !prices[..seen].contains(&value) {
                prices.push(value);
            }
        }
    }
    prices
}
