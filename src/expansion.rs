//! The `expansion` module materializes individual range members (e.g. "10 Foo Rd", "11 Foo Rd",
//! "12 Foo Rd" from a gazetteer header of "10-12 Foo Rd") into [`ExpandedAddress`] rows, so L1's
//! third phase can match a source document that cites a single range member by canonical
//! equality rather than falling through to the fuzzy layers.
use crate::components::Components;
use crate::domain::{CanonicalAddress, ExpandedAddress, ExpansionType};
use regex::Regex;
use std::sync::LazyLock;

static NUMERIC_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*-\s*(\d+)\b(.*)$").expect("valid numeric range regex"));

static UNIT_NUMERIC_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^unit\s+(\d+)\s*-\s*(\d+)\b(.*)$").expect("valid unit numeric range regex")
});

static MIXED_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)([a-zA-Z])\s*-\s*\d*([a-zA-Z])\b(.*)$").expect("valid mixed range regex")
});

static ALPHA_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^unit\s+([a-z])\s*-\s*([a-z])\b(.*)$").expect("valid alpha range regex")
});

/// The maximum number of members a single range entry may expand into, guarding against a
/// malformed header (e.g. "1-99999 Foo Rd") producing an unbounded number of rows.
const MAX_RANGE_MEMBERS: u32 = 500;

/// Expands every range-shaped entry in `gazetteer` into its individual [`ExpandedAddress`]
/// members. Idempotent: re-running against the same gazetteer produces the same set of expanded
/// rows (by content), since expansion is a pure function of the header text.
pub fn expand_ranges(gazetteer: &[CanonicalAddress]) -> Vec<ExpandedAddress> {
    gazetteer
        .iter()
        .filter(|addr| !addr.is_historic)
        .flat_map(|addr| expand_one(addr))
        .collect()
}

fn expand_one(addr: &CanonicalAddress) -> Vec<ExpandedAddress> {
    let full = addr.full_address.trim();

    if let Some(caps) = UNIT_NUMERIC_RANGE.captures(full) {
        let low: u32 = caps[1].parse().unwrap_or(0);
        let high: u32 = caps[2].parse().unwrap_or(0);
        let rest = caps[3].to_string();
        return numeric_members(low, high)
            .map(|n| {
                let member_full = format!("Unit {n}{rest}");
                build(addr, member_full, ExpansionType::UnitNumericRange)
            })
            .collect();
    }

    if let Some(caps) = MIXED_RANGE.captures(full) {
        let number = &caps[1];
        let low = caps[2].chars().next().unwrap_or('a');
        let high = caps[3].chars().next().unwrap_or('a');
        let rest = caps[4].to_string();
        return alpha_members(low, high)
            .map(|letter| {
                let member_full = format!("{number}{letter}{rest}");
                build(addr, member_full, ExpansionType::MixedRange)
            })
            .collect();
    }

    if let Some(caps) = NUMERIC_RANGE.captures(full) {
        let low: u32 = caps[1].parse().unwrap_or(0);
        let high: u32 = caps[2].parse().unwrap_or(0);
        let rest = caps[3].to_string();
        return numeric_members(low, high)
            .map(|n| {
                let member_full = format!("{n}{rest}");
                build(addr, member_full, ExpansionType::NumericRange)
            })
            .collect();
    }

    if let Some(caps) = ALPHA_RANGE.captures(full) {
        let low = caps[1].chars().next().unwrap_or('a');
        let high = caps[2].chars().next().unwrap_or('a');
        let rest = caps[3].to_string();
        return alpha_members(low, high)
            .map(|letter| {
                let member_full = format!("Unit {letter}{rest}");
                build(addr, member_full, ExpansionType::AlphaRange)
            })
            .collect();
    }

    Vec::new()
}

fn numeric_members(low: u32, high: u32) -> impl Iterator<Item = u32> {
    let (lo, hi) = if low <= high { (low, high) } else { (high, low) };
    let capped_hi = hi.min(lo.saturating_add(MAX_RANGE_MEMBERS));
    lo..=capped_hi
}

fn alpha_members(low: char, high: char) -> impl Iterator<Item = char> {
    let lo = low.to_ascii_lowercase() as u8;
    let hi = high.to_ascii_lowercase() as u8;
    let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
    (lo..=hi).map(|b| b as char)
}

fn build(original: &CanonicalAddress, member_full: String, expansion_type: ExpansionType) -> ExpandedAddress {
    let member_full = member_full.trim().to_string();
    let mut components = original.components.clone();
    components.house_number = leading_token(&member_full);
    ExpandedAddress::new(original, member_full, components, expansion_type)
}

fn leading_token(s: &str) -> Option<String> {
    s.split_whitespace().next().map(|t| t.trim_end_matches(',').to_string())
}
