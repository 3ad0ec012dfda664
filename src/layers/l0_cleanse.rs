//! L0: address cleansing. Trims, uppercases and applies a small dictionary of common
//! abbreviation expansions to every source document's raw address, writing the result back as
//! `standardized_address`. Idempotent: re-cleansing an already-cleansed string is a no-op, since
//! every substitution target is itself already in expanded form.
use crate::error::MatchResult;
use crate::ports::SourcePool;
use regex::Regex;
use std::sync::LazyLock;

/// Substring corrections applied at a word boundary (preceded and followed by whitespace,
/// punctuation, start, or end), so "RD" expands in "RD" or "LONDON RD" but not inside "ROAD" or
/// "GARDEN". Multi-word entries (e.g. "IND EST") match the whole phrase, not each word in
/// isolation.
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("RD", "ROAD"),
    ("ST", "STREET"),
    ("AVE", "AVENUE"),
    ("LN", "LANE"),
    ("DR", "DRIVE"),
    ("CL", "CLOSE"),
    ("CT", "COURT"),
    ("PL", "PLACE"),
    ("SQ", "SQUARE"),
    ("TCE", "TERRACE"),
    ("GDNS", "GARDENS"),
    ("CRES", "CRESCENT"),
    ("HSE", "HOUSE"),
    ("FLR", "FLOOR"),
    ("APPT", "APARTMENT"),
    ("APT", "APARTMENT"),
    ("HANTS", "HAMPSHIRE"),
    ("IND EST", "INDUSTRIAL ESTATE"),
];

/// Matches any `ABBREVIATIONS` key as a whole word or phrase, longest key first so a multi-word
/// entry like "IND EST" is preferred over any single-word entry that could otherwise match part
/// of it.
static ABBREVIATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    let mut entries: Vec<&(&str, &str)> = ABBREVIATIONS.iter().collect();
    entries.sort_by_key(|(abbr, _)| std::cmp::Reverse(abbr.len()));
    let pattern = entries
        .iter()
        .map(|(abbr, _)| format!(r"\b{}\b", regex::escape(abbr)))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&pattern).expect("valid abbreviation regex")
});

/// Expands recognized abbreviations in `input` at word boundaries, after uppercasing and
/// collapsing whitespace.
fn standardize(input: &str) -> String {
    let upper = input.trim().to_uppercase();
    let collapsed = upper.split_whitespace().collect::<Vec<_>>().join(" ");
    ABBREVIATION_RE
        .replace_all(&collapsed, |caps: &regex::Captures| {
            let matched = &caps[0];
            ABBREVIATIONS
                .iter()
                .find(|(abbr, _)| *abbr == matched)
                .map(|(_, full)| full.to_string())
                .unwrap_or_else(|| matched.to_string())
        })
        .into_owned()
}

/// Runs L0 over every document in `pool`, writing the standardized address back through
/// [`SourcePool::set_standardized_address`]. Returns the number of documents cleansed.
pub fn cleanse(pool: &dyn SourcePool) -> MatchResult<usize> {
    let documents = pool.all();
    let mut count = 0;
    for doc in &documents {
        let standardized = standardize(&doc.raw_address);
        pool.set_standardized_address(doc.id, standardized)?;
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SourceDocument;
    use crate::ports::InMemorySourcePool;
    use uuid::Uuid;

    fn doc(raw: &str) -> SourceDocument {
        SourceDocument {
            id: Uuid::new_v4(),
            doc_type: "decision_notice".to_string(),
            job_id: "job-1".to_string(),
            raw_address: raw.to_string(),
            standardized_address: None,
            raw_uprn: None,
            external_reference: "20003".to_string(),
            date: "2024-01-01".to_string(),
            parsed_components: None,
            gopostal_processed: false,
            planning_app_base: "20003".to_string(),
            planning_app_sequence: None,
        }
    }

    #[test]
    fn expands_common_abbreviations() {
        assert_eq!(standardize("14 London Rd"), "14 LONDON ROAD");
        assert_eq!(standardize("3 Mill Ln, Liss"), "3 MILL LANE, LISS");
    }

    #[test]
    fn expands_county_and_industrial_estate_abbreviations() {
        assert_eq!(standardize("3 Mill Lane, Liss, Hants"), "3 MILL LANE, LISS, HAMPSHIRE");
        assert_eq!(
            standardize("Unit 4 Bordon Ind Est, Bordon"),
            "UNIT 4 BORDON INDUSTRIAL ESTATE, BORDON"
        );
    }

    #[test]
    fn is_idempotent() {
        let once = standardize("14 London Rd");
        let twice = standardize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn cleanse_writes_every_document_back_to_the_pool() {
        let pool = InMemorySourcePool::new(vec![doc("14 London Rd"), doc("3 Mill Ln")]);
        let count = cleanse(&pool).unwrap();
        assert_eq!(count, 2);
        for document in pool.all() {
            assert!(document.standardized_address.is_some());
        }
    }
}
