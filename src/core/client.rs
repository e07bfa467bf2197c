use crate::config::toml_config::ClientConfig;
use crate::core::builder::{DefinitionBuilder, ServiceOptions};
use crate::core::handle::ServiceHandle;
use crate::core::registry::PluginRegistry;
use crate::core::swagger::{service_path, SwaggerProjector};
use crate::core::version::{VersionToken, INITIAL_VERSION};
use crate::domain::model::RemoteRef;
use crate::domain::ports::{AuthValue, Capability, CredentialContext, PluginCapability};
use crate::utils::error::{DeployError, Result};
use crate::utils::validation::validate_url;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Client façade: owns the endpoint, the opaque auth value and the active plugin.
pub struct OperationalizationClient {
    endpoint: String,
    auth: AuthValue,
    registry: PluginRegistry,
    credential: Mutex<Option<CredentialContext>>,
}

/// Short name matching the CLI.
pub type MlDeploy = OperationalizationClient;

impl OperationalizationClient {
    pub fn new(
        endpoint: &str,
        auth: AuthValue,
        plugin: Option<Arc<dyn PluginCapability>>,
    ) -> Result<Self> {
        validate_url("endpoint", endpoint)?;
        let mut client = Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            auth,
            registry: PluginRegistry::new(),
            credential: Mutex::new(None),
        };
        if let Some(plugin) = plugin {
            client.register(plugin);
        }
        Ok(client)
    }

    /// 從設定檔建立 client；`strict_plugin_check` 開啟時改用嚴格註冊
    pub fn from_config(
        config: &ClientConfig,
        plugin: Option<Arc<dyn PluginCapability>>,
    ) -> Result<Self> {
        let mut client = Self::new(config.endpoint(), config.auth_value(), None)?;
        if let Some(plugin) = plugin {
            if config.strict_plugin_check() {
                client.register_strict(plugin)?;
            } else {
                client.register(plugin);
            }
        }
        Ok(client)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn service_url(&self, name: &str, version: &str) -> String {
        format!("{}{}", self.endpoint, service_path(name, version))
    }

    pub fn swagger_url(&self, name: &str, version: &str) -> String {
        format!("{}/swagger.json", self.service_url(name, version))
    }

    /// Binds a plugin. A plugin registered earlier is replaced and the cached
    /// credential is dropped.
    pub fn register(&mut self, plugin: Arc<dyn PluginCapability>) {
        self.registry.register(plugin);
        self.credential.get_mut().take();
    }

    pub fn register_strict(&mut self, plugin: Arc<dyn PluginCapability>) -> Result<()> {
        self.registry.register_strict(plugin)?;
        self.credential.get_mut().take();
        Ok(())
    }

    pub fn is_registered(&self) -> bool {
        self.registry.is_registered()
    }

    pub fn service(&self, name: &str) -> DefinitionBuilder<'_> {
        DefinitionBuilder::new(self, name)
    }

    pub async fn deploy_service(&self, name: &str, options: ServiceOptions) -> Result<ServiceHandle> {
        DefinitionBuilder::from_options(self, name, options).deploy().await
    }

    pub async fn redeploy_service(
        &self,
        name: &str,
        options: ServiceOptions,
    ) -> Result<ServiceHandle> {
        DefinitionBuilder::from_options(self, name, options)
            .redeploy()
            .await
    }

    /// One version of `name`; the highest deployed version when `version` is None.
    pub async fn get_service(&self, name: &str, version: Option<&str>) -> Result<ServiceHandle> {
        let plugin = self.registry.resolve(Capability::Get)?;
        let credential = self.credential(plugin).await?;
        let remote = match version {
            Some(version) => plugin.get(name, Some(version), &credential).await?,
            None => self.latest(plugin, name, &credential).await?,
        };
        let remote = remote.ok_or_else(|| DeployError::not_found(name, version))?;
        Ok(self.wrap(remote, plugin))
    }

    /// Every deployed version of `name` in ascending version order, or every
    /// service ordered by name then version when `name` is None.
    pub async fn list_services(&self, name: Option<&str>) -> Result<Vec<ServiceHandle>> {
        let plugin = self.registry.resolve(Capability::List)?;
        let credential = self.credential(plugin).await?;
        let remotes = self.versions(plugin, name, &credential).await?;
        Ok(remotes
            .into_iter()
            .map(|remote| self.wrap(remote, plugin))
            .collect())
    }

    /// Deletes one version, or every version of `name` when `version` is None.
    pub async fn delete_service(&self, name: &str, version: Option<&str>) -> Result<()> {
        let plugin = self.registry.resolve(Capability::Delete)?;
        let credential = self.credential(plugin).await?;
        let exists = match version {
            Some(version) => plugin.get(name, Some(version), &credential).await?.is_some(),
            None => !self.versions(plugin, Some(name), &credential).await?.is_empty(),
        };
        if !exists {
            return Err(DeployError::not_found(name, version));
        }
        tracing::info!(service = name, ?version, "deleting service");
        plugin.delete(name, version, &credential).await
    }

    pub(crate) async fn publish(&self, name: &str, options: ServiceOptions) -> Result<ServiceHandle> {
        let plugin = self.registry.resolve(Capability::Deploy)?;
        // Fail on an incomplete definition before touching the plugin.
        options.finalize(name, options.version.as_deref().unwrap_or(INITIAL_VERSION))?;

        let credential = self.credential(plugin).await?;
        let version = match options.version.clone() {
            Some(version) => version,
            None => self.next_version(plugin, name, &credential).await?,
        };
        let definition = options.finalize(name, &version)?;

        if !plugin.upserts_on_deploy()
            && plugin.get(name, Some(version.as_str()), &credential).await?.is_some()
        {
            return Err(DeployError::ConflictError {
                name: name.to_string(),
                version,
            });
        }

        let swagger = SwaggerProjector::project(&definition);
        tracing::info!(
            service = name,
            version = version.as_str(),
            plugin = plugin.name(),
            "deploying service"
        );
        let remote = plugin.deploy(&definition, &swagger, &credential).await?;
        Ok(self.wrap(remote, plugin))
    }

    pub(crate) async fn republish(&self, name: &str, options: ServiceOptions) -> Result<ServiceHandle> {
        let plugin = self.registry.resolve(Capability::Redeploy)?;
        // Option-level errors surface before authentication.
        options.precheck(name)?;
        let credential = self.credential(plugin).await?;
        let current = match options.version.as_deref() {
            Some(version) => plugin.get(name, Some(version), &credential).await?,
            None => self.latest(plugin, name, &credential).await?,
        }
        .ok_or_else(|| DeployError::not_found(name, options.version.as_deref()))?;

        let definition = options.merge_onto(&current.definition)?;
        let swagger = SwaggerProjector::project(&definition);
        tracing::info!(
            service = name,
            version = definition.version.as_str(),
            plugin = plugin.name(),
            "redeploying service"
        );
        let remote = plugin.redeploy(&definition, &swagger, &credential).await?;
        Ok(self.wrap(remote, plugin))
    }

    fn wrap(&self, remote: RemoteRef, plugin: &Arc<dyn PluginCapability>) -> ServiceHandle {
        ServiceHandle::new(remote, &self.endpoint, Arc::clone(plugin))
    }

    async fn versions(
        &self,
        plugin: &Arc<dyn PluginCapability>,
        name: Option<&str>,
        credential: &CredentialContext,
    ) -> Result<Vec<RemoteRef>> {
        let mut remotes = plugin.list(name, credential).await?;
        if let Some(name) = name {
            remotes.retain(|remote| remote.name == name);
        }
        remotes.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then_with(|| VersionToken::compare(&a.version, &b.version))
        });
        Ok(remotes)
    }

    async fn latest(
        &self,
        plugin: &Arc<dyn PluginCapability>,
        name: &str,
        credential: &CredentialContext,
    ) -> Result<Option<RemoteRef>> {
        Ok(self.versions(plugin, Some(name), credential).await?.pop())
    }

    async fn next_version(
        &self,
        plugin: &Arc<dyn PluginCapability>,
        name: &str,
        credential: &CredentialContext,
    ) -> Result<String> {
        let next = match self.latest(plugin, name, credential).await? {
            Some(latest) => VersionToken::new(latest.version).successor().as_str().to_string(),
            None => INITIAL_VERSION.to_string(),
        };
        tracing::debug!(service = name, version = next.as_str(), "assigned version");
        Ok(next)
    }

    /// Cached credential, re-authenticating when missing or expired.
    async fn credential(&self, plugin: &Arc<dyn PluginCapability>) -> Result<CredentialContext> {
        let mut cached = self.credential.lock().await;
        if let Some(credential) = cached.as_ref() {
            if !credential.is_expired(chrono::Utc::now()) {
                return Ok(credential.clone());
            }
            tracing::debug!(plugin = plugin.name(), "credential expired, re-authenticating");
        }
        let credential = plugin.authenticate(&self.auth).await?;
        *cached = Some(credential.clone());
        Ok(credential)
    }
}

impl std::fmt::Debug for OperationalizationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationalizationClient")
            .field("endpoint", &self.endpoint)
            .field("auth", &self.auth)
            .field("registry", &self.registry)
            .finish()
    }
}
