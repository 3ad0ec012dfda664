//! The `domain` module holds the core data-model entities described by the dimensional fact
//! table this pipeline populates: addresses, locations, source documents, and matching outcomes.
mod address;
mod document;
mod fact;
mod location;

pub use address::{CanonicalAddress, ExpandedAddress, ExpansionType};
pub use document::{OriginalAddress, SourceDocument};
pub use fact::{effective_fact, CorrectionRow, Decision, FactRow, MatchMethod};
pub use location::Location;
