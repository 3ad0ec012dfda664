//! The `address` module defines [`CanonicalAddress`] and [`ExpandedAddress`], the two address
//! shapes carried by the address corpus (AC).
use crate::components::Components;
use crate::domain::location::Location;
use crate::utils::canonicalize;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A canonical address from the authoritative gazetteer. If `uprn` is set it is unique across
/// all non-historic `CanonicalAddress` rows — historic records may share or predate a UPRN, since
/// they are materialized by an out-of-scope pre-pass when a source UPRN references an unknown
/// property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalAddress {
    /// Stable identifier for this gazetteer row.
    pub id: Uuid,
    /// Unique Property Reference Number, when known.
    pub uprn: Option<String>,
    /// Full display form, as published by the gazetteer.
    pub full_address: String,
    /// Parsed components for this address.
    pub components: Components,
    /// Spatial reference for this address.
    pub location: Location,
    /// Historic records may share/predate a UPRN and are excluded from UPRN-equality matching.
    pub is_historic: bool,
    /// Free-text provenance note (e.g. source extract and load date).
    pub provenance: String,
}

impl CanonicalAddress {
    /// Constructs a new, non-historic `CanonicalAddress`, deriving its canonical form from
    /// `full_address`.
    pub fn new(
        uprn: Option<String>,
        full_address: impl Into<String>,
        components: Components,
        location: Location,
        provenance: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            uprn,
            full_address: full_address.into(),
            components,
            location,
            is_historic: false,
            provenance: provenance.into(),
        }
    }

    /// The canonical (uppercased, punctuation-stripped, whitespace-collapsed) form of
    /// `full_address`, used for L1's exact-canonical-equality phases.
    pub fn canonical(&self) -> String {
        canonicalize(&self.full_address)
    }
}

/// How an [`ExpandedAddress`] was derived from its originating range entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum ExpansionType {
    /// "10-12 Foo Rd" style numeric range.
    NumericRange,
    /// "Unit 10-12 Foo Rd" style numeric range with a preserved unit prefix.
    UnitNumericRange,
    /// "10a-10c Foo Rd" style mixed numeric/alpha range.
    MixedRange,
    /// Non-numeric alpha range (e.g. "Unit A-C").
    AlphaRange,
}

/// A synthetic canonical address materialized from a range-style gazetteer entry, so that an
/// individual range member (e.g. "11 Mill Lane") can be matched by canonical equality even
/// though the gazetteer only lists the range header. Carries the same UPRN and location as its
/// originating row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpandedAddress {
    /// Stable identifier for this expanded row.
    pub id: Uuid,
    /// The gazetteer row this expansion was derived from.
    pub original_address_id: Uuid,
    /// Unique Property Reference Number, inherited from the originating row.
    pub uprn: Option<String>,
    /// Full display form of the expanded member, e.g. "11 Mill Lane, Liss".
    pub full_address: String,
    /// Parsed components for the expanded member.
    pub components: Components,
    /// Spatial reference, inherited from the originating row.
    pub location: Location,
    /// How this row was derived.
    pub expansion_type: ExpansionType,
}

impl ExpandedAddress {
    /// Constructs a new `ExpandedAddress` derived from `original`.
    pub fn new(
        original: &CanonicalAddress,
        full_address: impl Into<String>,
        components: Components,
        expansion_type: ExpansionType,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            original_address_id: original.id,
            uprn: original.uprn.clone(),
            full_address: full_address.into(),
            components,
            location: original.location,
            expansion_type,
        }
    }

    /// The canonical form of `full_address`, used for L1's expanded-canonical-equality phase.
    pub fn canonical(&self) -> String {
        canonicalize(&self.full_address)
    }
}
