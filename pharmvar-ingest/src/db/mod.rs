//! Database access for pharmvar-ingest
//!
//! - Gene panel seeding and lookups
//! - Variant/annotation persistence writer
//! - Analysis result regeneration

pub mod analysis;
pub mod annotations;
pub mod genes;
pub mod variants;

pub use genes::{GeneSeed, DEFAULT_GENE_PANEL};
pub use variants::{upsert_variant, PersistenceError, UpsertAction, UpsertOutcome};
