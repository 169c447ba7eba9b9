//! Contract layer - public API for inter-module communication
//!
//! This layer contains transport-agnostic models and the native client trait.

pub mod client;
pub mod error;
pub mod model;

pub use client::ContentFilterApi;
pub use error::SettingsError;
pub use model::{
    ApiSurface, AuthContext, CacheStats, ContentField, ContentFieldName, EffectiveOptions,
    FilterMode, FilterOptions, InvalidationScope, ModuleStatus, NetworkSettings, Notice, OptionMap,
    OverrideMap, PostId, RegistrationReport, RegistrationState, SiteId, SiteSettings,
    StoredSiteRecord, SurfaceStatus, SyncReport,
};
