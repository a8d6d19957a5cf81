//! Button sampling, debounce and battery estimation for a handheld console.
//!
//! - [`input`] - background sampler and the published key state
//! - [`battery`] - on-demand battery estimate
//! - [`hal`] - peripheral traits and backends
//! - [`config`] - TOML configuration

pub mod battery;
pub mod config;
pub mod hal;
pub mod input;
