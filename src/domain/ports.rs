use crate::core::swagger::SwaggerDocument;
use crate::domain::model::{RemoteRef, ServiceDefinition};
use crate::utils::error::{DeployError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// The operations a plugin can provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    Authenticate,
    Deploy,
    Redeploy,
    Delete,
    List,
    Get,
    Invoke,
}

impl Capability {
    pub const ALL: [Capability; 7] = [
        Capability::Authenticate,
        Capability::Deploy,
        Capability::Redeploy,
        Capability::Delete,
        Capability::List,
        Capability::Get,
        Capability::Invoke,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Authenticate => "authenticate",
            Capability::Deploy => "deploy",
            Capability::Redeploy => "redeploy",
            Capability::Delete => "delete",
            Capability::List => "list",
            Capability::Get => "get",
            Capability::Invoke => "invoke",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque authentication value handed to the plugin verbatim.
#[derive(Clone)]
pub struct AuthValue(Option<Arc<dyn Any + Send + Sync>>);

impl AuthValue {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Some(Arc::new(value)))
    }

    pub fn none() -> Self {
        Self(None)
    }

    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_deref().and_then(|value| value.downcast_ref::<T>())
    }
}

impl Default for AuthValue {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Debug for AuthValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(_) => f.write_str("AuthValue(<opaque>)"),
            None => f.write_str("AuthValue(None)"),
        }
    }
}

/// Whatever `authenticate` produced. Cached by the client until it expires.
#[derive(Clone)]
pub struct CredentialContext {
    value: Arc<dyn Any + Send + Sync>,
    expires_at: Option<DateTime<Utc>>,
}

impl CredentialContext {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            expires_at: None,
        }
    }

    /// 不需要認證的外掛使用
    pub fn anonymous() -> Self {
        Self::new(())
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }
}

impl fmt::Debug for CredentialContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialContext")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Contract between the client and a deployment backend.
///
/// Every operation has a default body that reports the capability as missing,
/// so a provider only implements what its backend supports and registers
/// without any conformance check. Calls to an operation it left out fail with
/// `CapabilityMissingError` at that point, never earlier.
///
/// Retries, timeouts and idempotency are the provider's business; the client
/// never retries a failed call.
#[async_trait]
pub trait PluginCapability: Send + Sync {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Capabilities the provider declares. Only consulted by strict registration.
    fn declared_capabilities(&self) -> Vec<Capability> {
        Vec::new()
    }

    /// When true, deploying an existing name+version overwrites it instead of
    /// failing with `ConflictError`.
    fn upserts_on_deploy(&self) -> bool {
        false
    }

    async fn authenticate(&self, _auth: &AuthValue) -> Result<CredentialContext> {
        Err(DeployError::capability_missing(self.name(), Capability::Authenticate))
    }

    async fn deploy(
        &self,
        _definition: &ServiceDefinition,
        _swagger: &SwaggerDocument,
        _credential: &CredentialContext,
    ) -> Result<RemoteRef> {
        Err(DeployError::capability_missing(self.name(), Capability::Deploy))
    }

    async fn redeploy(
        &self,
        _definition: &ServiceDefinition,
        _swagger: &SwaggerDocument,
        _credential: &CredentialContext,
    ) -> Result<RemoteRef> {
        Err(DeployError::capability_missing(self.name(), Capability::Redeploy))
    }

    async fn delete(
        &self,
        _name: &str,
        _version: Option<&str>,
        _credential: &CredentialContext,
    ) -> Result<()> {
        Err(DeployError::capability_missing(self.name(), Capability::Delete))
    }

    async fn list(
        &self,
        _name: Option<&str>,
        _credential: &CredentialContext,
    ) -> Result<Vec<RemoteRef>> {
        Err(DeployError::capability_missing(self.name(), Capability::List))
    }

    /// `Ok(None)` means the service does not exist.
    async fn get(
        &self,
        _name: &str,
        _version: Option<&str>,
        _credential: &CredentialContext,
    ) -> Result<Option<RemoteRef>> {
        Err(DeployError::capability_missing(self.name(), Capability::Get))
    }

    async fn invoke(&self, _remote: &RemoteRef, _inputs: &Map<String, Value>) -> Result<Value> {
        Err(DeployError::capability_missing(self.name(), Capability::Invoke))
    }
}
