//! Test Helper Utilities
//!
//! Shared utilities for testing pharmvar-ingest

#![allow(dead_code, unused_imports)]

pub mod db_utils;
pub mod fake_sources;
pub mod mock_upstream;

pub use db_utils::{create_test_db, gene_id, insert_variant};
pub use fake_sources::{FakeClinicalSource, FakeVariantSource};
pub use mock_upstream::{fast_retry, spawn_mock_upstream, HitLog};
