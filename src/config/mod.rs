pub mod manifest;
pub mod toml_config;

pub use manifest::{ManifestEntry, ServiceManifest};
pub use toml_config::{ClientConfig, LoggingConfig};
