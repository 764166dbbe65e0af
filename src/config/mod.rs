//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, secrets from env)
//!     → validation.rs (semantic checks)
//!     → LoaderConfig (validated, immutable)
//!     → passed by reference into each component at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    ArchiveConfig, Credentials, EnrichConfig, FetchFailurePolicy, LoaderConfig, LogSourceConfig,
    ObservabilityConfig, RetryConfig, RunMode, ScheduleConfig, StorageConfig, TimeoutConfig,
    TraceSourceConfig, WindowConfig,
};
