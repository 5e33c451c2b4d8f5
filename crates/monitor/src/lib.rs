//! Entity registry, event routing, evaluation sweeps and the periodic
//! scheduler.
//!
//! - [`Monitor`]: the coordinator shared as `Arc<Monitor>`.
//! - [`EvaluationScheduler`]: cancelable periodic re-evaluation.
//! - [`MetadataProvider`]: host-supplied registry metadata.

pub mod engine;
pub mod export;
pub mod feed;
pub mod metadata;
pub mod mode;
pub mod registry;
pub mod scheduler;

pub use engine::Monitor;
pub use feed::{EntityEvent, IngestOutcome};
pub use metadata::{MetadataProvider, NoMetadata, StaticMetadata};
pub use scheduler::EvaluationScheduler;
