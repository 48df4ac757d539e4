//! Macros shared across the Eight compiler crates.
//!
//! The error macro is always available. The assertion macros are only compiled in when the
//! `assertion-macros` feature is enabled, which the crates do for their dev-dependencies.

#[cfg(feature = "assertion-macros")]
pub mod assertions;
pub mod error;
