//! # PharmVar Common Library
//!
//! Shared code for the PharmVar services including:
//! - Configuration loading and resolution
//! - Database initialization and row models
//! - Common error types

pub mod config;
pub mod db;
pub mod error;

pub use config::PharmvarConfig;
pub use error::{Error, Result};
