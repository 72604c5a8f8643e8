//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (JSON/TOML)          DEVCYCLE_PROXY_* env / CLI flags
//!     → loader.rs (parse)              → cli.rs (single instance)
//!                 \                    /
//!                  → apply_defaults (zero = system default)
//!                  → validation.rs (semantic checks)
//!                  → ProxyConfig (validated, immutable)
//!                  → one ProxyInstance per lifecycle::Instance
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; instances never observe changes
//! - Missing fields deserialize to zero values and are defaulted afterwards
//! - Validation separates syntactic (serde) from semantic checks
//! - The SDK key is a redacting newtype so it never reaches logs

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{PlatformData, ProxyConfig, ProxyInstance, SdkConfig, SdkKey};
pub use validation::{parse_permissions, validate_config, ValidationError};
