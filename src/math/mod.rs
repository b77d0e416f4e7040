//! Mathematical utilities: habitable-zone physics and descriptive statistics.

pub mod habitable_zone;
pub mod stats;

pub use habitable_zone::*;
pub use stats::*;
