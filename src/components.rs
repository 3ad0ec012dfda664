//! The `components` module defines the pre-parsed address component set shared by
//! [`crate::domain::CanonicalAddress`] and [`crate::domain::SourceDocument`]. Both sides of a
//! match arrive with components already split out (gopostal on the source side, the gazetteer
//! load on the canonical side); this crate never parses an address from scratch, it only
//! re-derives components when the upstream parse is missing (`gopostal_processed = false`).
use derive_new::new;
use serde::{Deserialize, Serialize};

/// Pre-parsed address components, named after the gopostal/libpostal component set rather than
/// the FGDC standard, since the source documents and gazetteer in this domain are UK planning
/// and property records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, new)]
pub struct Components {
    /// Street number, including any suffix letter (e.g. "12A").
    #[new(default)]
    pub house_number: Option<String>,
    /// Named building/property, used when no street number applies.
    #[new(default)]
    pub house_name: Option<String>,
    /// Street / road name.
    #[new(default)]
    pub road: Option<String>,
    /// Suburb or locality.
    #[new(default)]
    pub suburb: Option<String>,
    /// City or town.
    #[new(default)]
    pub city: Option<String>,
    /// County-equivalent administrative division.
    #[new(default)]
    pub state_district: Option<String>,
    /// State/country-subdivision; largely unused in a UK context but kept for parity with the
    /// gopostal component set.
    #[new(default)]
    pub state: Option<String>,
    /// Postcode.
    #[new(default)]
    pub postcode: Option<String>,
    /// Country.
    #[new(default)]
    pub country: Option<String>,
    /// Flat/unit designator (e.g. "Flat 3").
    #[new(default)]
    pub unit: Option<String>,
}

impl Components {
    /// True when the house number is present and equal, normalized to uppercase, between `self`
    /// and `other`. Returns `None` when either side lacks a house number, since absence is not
    /// itself a mismatch (the Validator treats that case separately).
    pub fn house_number_matches(&self, other: &Components) -> Option<bool> {
        match (&self.house_number, &other.house_number) {
            (Some(a), Some(b)) => Some(a.to_uppercase() == b.to_uppercase()),
            _ => None,
        }
    }

    /// True when both sides carry a unit designator and they differ after uppercasing.
    pub fn unit_conflicts(&self, other: &Components) -> bool {
        match (&self.unit, &other.unit) {
            (Some(a), Some(b)) => a.to_uppercase() != b.to_uppercase(),
            _ => false,
        }
    }
}
