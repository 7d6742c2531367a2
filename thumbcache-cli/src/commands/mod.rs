//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`cache`] - Disk cache management (stats, clear)
//! - [`catalog`] - List a JSON catalog and optionally warm the cache
//! - [`config`] - Configuration management (init, show)
//! - [`fetch`] - Resolve identifiers through the cache tiers

pub mod cache;
pub mod catalog;
pub mod common;
pub mod config;
pub mod fetch;
