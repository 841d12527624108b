//! Core types and shared functionality for lendboard.
//!
//! This crate provides:
//! - SQLite store for cached notes, cached listings, strategies and sync runs
//! - Strategy model and listing filter matching
//! - Unified error types
//! - Configuration structures

pub mod config;
pub mod error;
pub mod store;
pub mod strategy;

pub use config::{AppConfig, ConfigError, Credentials};
pub use error::Error;
pub use store::{CachedListing, CachedNote, Collection, NewSyncRun, Store, SyncRun, SyncStatus};
pub use strategy::{NewStrategy, Range, Strategy, StrategyFilters};
