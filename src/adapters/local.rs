use crate::core::swagger::SwaggerDocument;
use crate::core::version::VersionToken;
use crate::domain::model::{CallScope, CodeBody, InitBody, RemoteRef, ServiceDefinition};
use crate::domain::ports::{AuthValue, Capability, CredentialContext, PluginCapability};
use crate::utils::error::{DeployError, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tokio::sync::Mutex;

struct LocalRecord {
    remote: RemoteRef,
    swagger: SwaggerDocument,
    globals: Map<String, Value>,
}

/// In-process plugin that keeps services in memory and runs `code_fn`
/// services directly. Useful for tests and for trying services out before
/// publishing them to a real backend.
pub struct LocalPlugin {
    base_url: String,
    upsert: bool,
    credential_ttl: Option<Duration>,
    services: Mutex<BTreeMap<(String, String), LocalRecord>>,
}

impl LocalPlugin {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            upsert: false,
            credential_ttl: None,
            services: Mutex::new(BTreeMap::new()),
        }
    }

    /// Deploying an existing name+version overwrites it.
    pub fn with_upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }

    /// Credentials handed out by `authenticate` expire after `ttl`.
    pub fn with_credential_ttl(mut self, ttl: Duration) -> Self {
        self.credential_ttl = Some(ttl);
        self
    }

    pub async fn count(&self, name: &str) -> usize {
        let services = self.services.lock().await;
        services.keys().filter(|(n, _)| n == name).count()
    }

    /// Swagger document stored at deploy time.
    pub async fn swagger(&self, name: &str, version: &str) -> Option<SwaggerDocument> {
        let services = self.services.lock().await;
        services
            .get(&(name.to_string(), version.to_string()))
            .map(|record| record.swagger.clone())
    }

    fn store(&self, definition: &ServiceDefinition, swagger: &SwaggerDocument) -> LocalRecord {
        let url = format!(
            "{}/api/{}/{}",
            self.base_url, definition.name, definition.version
        );
        let deployed_at = Utc::now();
        let mut remote = RemoteRef::new(definition.clone()).with_url(url);
        remote
            .metadata
            .insert("deployed_at".to_string(), json!(deployed_at.to_rfc3339()));

        let globals = match definition.code.init() {
            Some(InitBody::Function(init)) => (**init)(),
            _ => Map::new(),
        };

        LocalRecord {
            remote,
            swagger: swagger.clone(),
            globals,
        }
    }
}

#[async_trait]
impl PluginCapability for LocalPlugin {
    fn name(&self) -> &str {
        "local"
    }

    fn declared_capabilities(&self) -> Vec<Capability> {
        Capability::ALL.to_vec()
    }

    fn upserts_on_deploy(&self) -> bool {
        self.upsert
    }

    async fn authenticate(&self, _auth: &AuthValue) -> Result<CredentialContext> {
        let credential = CredentialContext::new(format!("local-{}", Utc::now().timestamp_millis()));
        Ok(match self.credential_ttl {
            Some(ttl) => credential.with_expiry(Utc::now() + ttl),
            None => credential,
        })
    }

    async fn deploy(
        &self,
        definition: &ServiceDefinition,
        swagger: &SwaggerDocument,
        _credential: &CredentialContext,
    ) -> Result<RemoteRef> {
        let key = (definition.name.clone(), definition.version.clone());
        let mut services = self.services.lock().await;
        if services.contains_key(&key) && !self.upsert {
            return Err(DeployError::ConflictError {
                name: key.0,
                version: key.1,
            });
        }
        let record = self.store(definition, swagger);
        let remote = record.remote.clone();
        services.insert(key, record);
        Ok(remote)
    }

    async fn redeploy(
        &self,
        definition: &ServiceDefinition,
        swagger: &SwaggerDocument,
        _credential: &CredentialContext,
    ) -> Result<RemoteRef> {
        let key = (definition.name.clone(), definition.version.clone());
        let mut services = self.services.lock().await;
        if !services.contains_key(&key) {
            return Err(DeployError::not_found(&key.0, Some(&key.1)));
        }
        let record = self.store(definition, swagger);
        let remote = record.remote.clone();
        services.insert(key, record);
        Ok(remote)
    }

    async fn delete(
        &self,
        name: &str,
        version: Option<&str>,
        _credential: &CredentialContext,
    ) -> Result<()> {
        let mut services = self.services.lock().await;
        let before = services.len();
        services.retain(|(n, v), _| !(n == name && version.map_or(true, |target| v == target)));
        if services.len() == before {
            return Err(DeployError::not_found(name, version));
        }
        Ok(())
    }

    async fn list(
        &self,
        name: Option<&str>,
        _credential: &CredentialContext,
    ) -> Result<Vec<RemoteRef>> {
        let services = self.services.lock().await;
        Ok(services
            .values()
            .filter(|record| name.map_or(true, |n| record.remote.name == n))
            .map(|record| record.remote.clone())
            .collect())
    }

    async fn get(
        &self,
        name: &str,
        version: Option<&str>,
        _credential: &CredentialContext,
    ) -> Result<Option<RemoteRef>> {
        let services = self.services.lock().await;
        Ok(match version {
            Some(version) => services
                .get(&(name.to_string(), version.to_string()))
                .map(|record| record.remote.clone()),
            // 版本最高者
            None => {
                let versions = services
                    .keys()
                    .filter(|(n, _)| n == name)
                    .map(|(_, v)| v.as_str());
                VersionToken::latest(versions).and_then(|latest| {
                    services
                        .get(&(name.to_string(), latest.to_string()))
                        .map(|record| record.remote.clone())
                })
            }
        })
    }

    async fn invoke(&self, remote: &RemoteRef, inputs: &Map<String, Value>) -> Result<Value> {
        let services = self.services.lock().await;
        let record = services
            .get(&(remote.name.clone(), remote.version.clone()))
            .ok_or_else(|| DeployError::not_found(&remote.name, Some(&remote.version)))?;

        let definition = &record.remote.definition;
        let function = match definition.code.body() {
            CodeBody::Function(function) => function,
            CodeBody::Source(_) => {
                return Err(DeployError::backend_message(format!(
                    "local plugin cannot execute source code of {}@{}",
                    remote.name, remote.version
                )))
            }
        };

        let scope = CallScope {
            inputs,
            globals: &record.globals,
            objects: &definition.objects,
        };
        match (**function)(&scope) {
            Ok(output) => Ok(json!({ "success": true, "output": output })),
            Err(message) => Err(DeployError::backend_message(message)),
        }
    }
}
