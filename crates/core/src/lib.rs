//! Pure domain logic for entity health monitoring: cadence learning,
//! thresholds, classification, diagnosis and alert selection. No I/O.

pub mod alerts;
pub mod cadence;
pub mod config;
pub mod diagnosis;
pub mod entity;
pub mod error;
pub mod health;
pub mod mode;
pub mod snapshot;
pub mod thresholds;
pub mod types;
