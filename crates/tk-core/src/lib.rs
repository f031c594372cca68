//! tk-core: stable foundation for tickflow.
//!
//! Contains:
//! - ids (compact handles for blocks and registers)
//! - numeric (register word type + Q16 fixed-point helpers)
//! - timing (sweep duration accounting)

pub mod ids;
pub mod numeric;
pub mod timing;

// Re-exports: nice ergonomics for downstream crates
pub use ids::*;
pub use numeric::*;
pub use timing::{SweepStats, SweepTimer};
