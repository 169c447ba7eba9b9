//! Content Filter Module
//!
//! Headless content filter for post fields served over GraphQL and REST.
//! Options resolve through network, site and default tiers; matching fields
//! are rewritten to plain text, Markdown or an allowlisted tag subset.

// Public exports
pub mod contract;
pub use contract::{
    client::ContentFilterApi, error::SettingsError, EffectiveOptions, FilterMode, FilterOptions,
    NetworkSettings, SiteSettings, SyncReport,
};

pub mod module;
pub use module::ContentFilterModule;

// Internal modules (hidden from public API)
#[doc(hidden)]
pub mod api;
#[doc(hidden)]
pub mod config;
#[doc(hidden)]
pub mod domain;
#[doc(hidden)]
pub mod infra;
