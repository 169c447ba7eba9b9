//! Domain layer - business logic and services

pub mod defaults;
pub mod events;
pub mod host;
pub mod interception;
pub mod repository;
pub mod resolver;
pub mod service;
pub mod sync;
pub mod transform;
pub mod validation;

pub use events::{CacheInvalidatingPublisher, EventPublisher, NoOpEventPublisher, OptionsEvent};
pub use host::{
    FieldHook, FieldPipeline, GraphqlHost, GraphqlType, HostBindings, MemoryProbe, MemorySample,
    NoMemoryProbe, PostLookup, RestHost, SiteContext, SiteSwitch,
};
pub use interception::{GraphqlInterceptor, HookManager, HookSignature, RestInterceptor};
pub use repository::OptionsRepository;
pub use resolver::SettingsResolver;
pub use service::{Service, TransformOutcome};
pub use sync::SettingsSynchronizer;
pub use transform::{ContentTransformer, RequestScope, TransformEngine, TransformError};
