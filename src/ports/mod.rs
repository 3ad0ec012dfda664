//! External interface ports: the traits the matching layers depend on, each with an in-memory
//! fake adapter, so the core algorithms in [`crate::layers`] can be exercised without a real
//! store, so matching logic and persistence stay decoupled.
pub mod corpus;
pub mod pool;
pub mod progress;
pub mod store;

pub use corpus::{AddressCorpus, Candidate, InMemoryAddressCorpus};
pub use pool::{InMemorySourcePool, SourcePool};
pub use progress::{
    IndicatifProgressSink, ProgressSink, RecordingProgressSink, StageProgress, TracingProgressSink,
};
pub use store::{effective_fact_table, CorrectionOverlay, FactStore, InMemoryCorrectionOverlay, InMemoryFactStore};
