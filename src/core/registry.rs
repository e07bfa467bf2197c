use crate::domain::ports::{Capability, PluginCapability};
use crate::utils::error::{DeployError, Result};
use std::sync::Arc;

/// Per-client binding of the active plugin.
///
/// Registration does not inspect the plugin: a provider that leaves out an
/// operation fails when that operation is first dispatched. `register_strict`
/// is the opt-in exception and checks the declared capability set up front.
#[derive(Default)]
pub struct PluginRegistry {
    active: Option<Arc<dyn PluginCapability>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `plugin`, replacing any plugin bound before. Returns the replaced one.
    pub fn register(
        &mut self,
        plugin: Arc<dyn PluginCapability>,
    ) -> Option<Arc<dyn PluginCapability>> {
        match &self.active {
            Some(previous) => tracing::info!(
                previous = previous.name(),
                plugin = plugin.name(),
                "replacing registered plugin"
            ),
            None => tracing::debug!(plugin = plugin.name(), "plugin registered"),
        }
        self.active.replace(plugin)
    }

    /// Like `register`, but rejects a plugin that does not declare every capability.
    pub fn register_strict(
        &mut self,
        plugin: Arc<dyn PluginCapability>,
    ) -> Result<Option<Arc<dyn PluginCapability>>> {
        let declared = plugin.declared_capabilities();
        if let Some(missing) = Capability::ALL
            .iter()
            .find(|capability| !declared.contains(capability))
        {
            return Err(DeployError::capability_missing(plugin.name(), missing));
        }
        Ok(self.register(plugin))
    }

    pub fn is_registered(&self) -> bool {
        self.active.is_some()
    }

    /// The plugin that handles `capability`. Fails with `NoPluginError` when
    /// nothing is bound; whether the plugin really provides the capability is
    /// only known once it is called.
    pub fn resolve(&self, capability: Capability) -> Result<&Arc<dyn PluginCapability>> {
        let plugin = self.active.as_ref().ok_or(DeployError::NoPluginError)?;
        tracing::trace!(plugin = plugin.name(), %capability, "dispatch");
        Ok(plugin)
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("active", &self.active.as_ref().map(|p| p.name()))
            .finish()
    }
}
