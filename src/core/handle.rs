use crate::core::swagger::{SwaggerDocument, SwaggerProjector};
use crate::domain::model::{ParamSchema, RemoteRef, ServiceDefinition};
use crate::domain::ports::{Capability, PluginCapability};
use crate::utils::error::{DeployError, Result};
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Raw response of one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationResult {
    raw: Value,
}

impl InvocationResult {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// 依名稱取出輸出值
    pub fn output(&self, field: &str) -> Result<&Value> {
        self.raw
            .get("output")
            .and_then(|outputs| outputs.get(field))
            .ok_or_else(|| DeployError::OutputNotFoundError {
                field: field.to_string(),
            })
    }

    pub fn outputs(&self) -> Option<&Map<String, Value>> {
        self.raw.get("output").and_then(Value::as_object)
    }
}

/// Proxy for one deployed service version.
///
/// Handles are created fresh by every deploy/discovery call and hold no state
/// beyond the remote reference they were built from.
#[derive(Clone)]
pub struct ServiceHandle {
    remote: RemoteRef,
    url: String,
    plugin: Arc<dyn PluginCapability>,
}

impl ServiceHandle {
    pub(crate) fn new(remote: RemoteRef, endpoint: &str, plugin: Arc<dyn PluginCapability>) -> Self {
        let url = remote
            .url
            .clone()
            .unwrap_or_else(|| format!("{}/api/{}/{}", endpoint, remote.name, remote.version));
        Self {
            remote,
            url,
            plugin,
        }
    }

    pub fn name(&self) -> &str {
        &self.remote.name
    }

    pub fn version(&self) -> &str {
        &self.remote.version
    }

    /// Name under which the operation is exposed (alias or callable name).
    pub fn operation(&self) -> &str {
        self.remote.definition.operation_id()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn swagger_url(&self) -> String {
        format!("{}/swagger.json", self.url)
    }

    pub fn definition(&self) -> &ServiceDefinition {
        &self.remote.definition
    }

    pub fn remote(&self) -> &RemoteRef {
        &self.remote
    }

    pub fn inputs(&self) -> &ParamSchema {
        &self.remote.definition.inputs
    }

    pub fn outputs(&self) -> &ParamSchema {
        &self.remote.definition.outputs
    }

    pub fn swagger(&self) -> SwaggerDocument {
        SwaggerProjector::project(&self.remote.definition)
    }

    /// Summary of what this service accepts and returns.
    pub fn capabilities(&self) -> Value {
        json!({
            "name": self.name(),
            "version": self.version(),
            "operationId": self.operation(),
            "url": self.url(),
            "swagger": self.swagger_url(),
            "inputs": self.inputs(),
            "outputs": self.outputs(),
            "artifacts": self.remote.definition.artifacts,
            "description": self.remote.definition.description,
        })
    }

    /// Calls the operation by name, as a consumer of the swagger document would.
    pub async fn call(&self, operation: &str, inputs: Map<String, Value>) -> Result<InvocationResult> {
        if operation != self.operation() {
            return Err(DeployError::UnknownOperationError {
                service: format!("{}@{}", self.name(), self.version()),
                operation: operation.to_string(),
            });
        }
        self.invoke(inputs).await
    }

    pub async fn invoke(&self, inputs: Map<String, Value>) -> Result<InvocationResult> {
        if let Some(missing) = self.inputs().names().find(|name| !inputs.contains_key(*name)) {
            return Err(DeployError::InvalidInputError {
                service: format!("{}@{}", self.name(), self.version()),
                message: format!("missing input '{}'", missing),
            });
        }
        tracing::debug!(
            service = self.name(),
            version = self.version(),
            capability = %Capability::Invoke,
            "invoking service"
        );
        let raw = self.plugin.invoke(&self.remote, &inputs).await?;
        Ok(InvocationResult::new(raw))
    }
}

impl std::fmt::Debug for ServiceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceHandle")
            .field("name", &self.remote.name)
            .field("version", &self.remote.version)
            .field("url", &self.url)
            .field("plugin", &self.plugin.name())
            .finish()
    }
}
