//! Catalog sources other than a local CSV: the NASA Exoplanet Archive and a
//! seeded synthetic generator.

pub mod archive;
pub mod sample;

pub use archive::{ArchiveClient, ArchiveTable};
pub use sample::generate_catalog;
