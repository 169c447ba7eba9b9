//! Contract error types for the content filter
//!
//! These errors are transport-agnostic and used for inter-module communication.
//! Only write paths and sync aggregation produce them; read and transform paths
//! degrade instead of failing.

use super::model::SiteId;

/// Content filter domain errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    /// Site or resource not found
    #[error("{resource} not found: {id}")]
    NotFound {
        /// Resource type (site, post)
        resource: String,
        /// Resource identifier
        id: String,
    },

    /// Malformed request (unknown key, bad override map)
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Option values rejected by the options schema
    #[error("Schema validation failed: {}", errors.join(", "))]
    SchemaValidation { errors: Vec<String> },

    /// Network disallows per-site overrides
    #[error("Site {site_id} may not override network settings: {keys:?}")]
    OverridesNotAllowed { site_id: SiteId, keys: Vec<String> },

    /// The persistence layer rejected a read or write on a write path
    #[error("Persistence error: {message}")]
    Persistence { message: String },

    /// Another network sync holds the tenant context
    #[error("A network sync is already running")]
    SyncInProgress,

    /// Caller lacks the required capability
    #[error("Forbidden: {reason}")]
    Forbidden { reason: String },

    /// Internal error
    #[error("Internal error")]
    Internal,
}

impl SettingsError {
    pub fn persistence(error: impl std::fmt::Display) -> Self {
        Self::Persistence {
            message: error.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
