//! Conversions from contract models to REST DTOs

use super::dto::*;
use crate::contract::{
    self, CacheStats, EffectiveOptions, ModuleStatus, NetworkSettings, RegistrationState, SiteId,
    SiteSettings, SyncReport,
};

impl From<CacheStats> for CacheStatsDto {
    fn from(stats: CacheStats) -> Self {
        Self {
            entries: stats.entries,
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
        }
    }
}

impl From<EffectiveOptions> for EffectiveOptionsDto {
    fn from(options: EffectiveOptions) -> Self {
        Self {
            site_id: options.site_id,
            options: options.values,
        }
    }
}

impl SiteSettingsDto {
    pub fn new(site_id: SiteId, settings: SiteSettings) -> Self {
        Self {
            site_id,
            options: settings.options,
            overrides: settings.overrides,
            last_sync: settings.last_sync,
        }
    }
}

impl From<NetworkSettings> for NetworkOptionsDto {
    fn from(settings: NetworkSettings) -> Self {
        Self {
            enforce_network_settings: settings.enforce(),
            allow_site_overrides: settings.allow_site_overrides(),
            options: settings.options,
        }
    }
}

impl From<SyncReport> for SyncReportDto {
    fn from(report: SyncReport) -> Self {
        Self {
            synced_count: report.synced_count,
            failures: report.failures,
        }
    }
}

fn state_name(state: RegistrationState) -> &'static str {
    match state {
        RegistrationState::Unregistered => "unregistered",
        RegistrationState::Registering => "registering",
        RegistrationState::Registered => "registered",
        RegistrationState::Unregistering => "unregistering",
    }
}

impl From<contract::Notice> for NoticeDto {
    fn from(notice: contract::Notice) -> Self {
        Self {
            surface: notice.surface.as_str().to_string(),
            message: notice.message,
        }
    }
}

impl From<ModuleStatus> for StatusDto {
    fn from(status: ModuleStatus) -> Self {
        Self {
            surfaces: status
                .surfaces
                .into_iter()
                .map(|s| SurfaceStatusDto {
                    surface: s.surface.as_str().to_string(),
                    state: state_name(s.state).to_string(),
                    hooks: s.hooks,
                })
                .collect(),
            notices: status.notices.into_iter().map(Into::into).collect(),
            cache: status.cache.into(),
        }
    }
}
