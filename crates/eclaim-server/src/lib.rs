pub mod config;
pub mod handlers;
pub mod observability;
pub mod server;

pub use config::{
    AppConfig, ClearinghouseConfig, FacilityConfig, LoggingConfig, ServerConfig, StorageBackend,
    StorageConfig,
};
pub use observability::{apply_logging_level, init_tracing};
pub use server::{AppState, EclaimServer, ServerBuilder, build_app, router};
