pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use crate::adapters::local::LocalPlugin;
pub use crate::config::{ClientConfig, ServiceManifest};
pub use crate::core::builder::{DefinitionBuilder, ServiceOptions};
pub use crate::core::client::{MlDeploy, OperationalizationClient};
pub use crate::core::handle::{InvocationResult, ServiceHandle};
pub use crate::core::swagger::{SwaggerDocument, SwaggerProjector};
pub use crate::core::version::VersionToken;
pub use crate::domain::model::{
    CallScope, CodeRef, PackageSpec, ParamSchema, RemoteRef, ServiceDefinition, TypeTag,
};
pub use crate::domain::ports::{AuthValue, Capability, CredentialContext, PluginCapability};
pub use crate::utils::error::{DeployError, Result};
