//! Unit asset resolution and caching for Territory Battle squad tooling.
//!
//! The crate is organized around a fallback chain: the [`sources`]
//! registry describes candidate providers per asset class, the
//! [`health`] tracker orders them by observed reachability, the
//! [`locator`] walks them to resolve an identity to a URL or payload,
//! and the [`cache`] layer sits in front of the locator for the serving
//! path. [`sync`] populates the local [`store`] and regenerates the
//! [`manifest`] in bulk, outside the request path.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod errors;
pub mod health;
pub mod locator;
pub mod manifest;
pub mod models;
pub mod sources;
pub mod store;
pub mod sync;
pub mod utils;
pub mod web;

#[cfg(test)]
pub mod test_support;

pub use errors::{AppError, ResolveError, SyncError};
