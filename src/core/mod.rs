pub mod builder;
pub mod client;
pub mod handle;
pub mod registry;
pub mod swagger;
pub mod version;

pub use crate::domain::model::{CodeRef, PackageSpec, ParamSchema, RemoteRef, ServiceDefinition};
pub use crate::domain::ports::{AuthValue, Capability, CredentialContext, PluginCapability};
pub use crate::utils::error::Result;
