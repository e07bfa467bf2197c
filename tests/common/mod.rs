#![allow(dead_code)]

use async_trait::async_trait;
use mldeploy::core::swagger::SwaggerDocument;
use mldeploy::{
    AuthValue, CodeRef, CredentialContext, LocalPlugin, PluginCapability, RemoteRef, Result,
    ServiceDefinition,
};
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const ENDPOINT: &str = "http://localhost:12800";

pub fn add_one() -> CodeRef {
    CodeRef::function("add_one", |scope| {
        let x = scope
            .inputs
            .get("x")
            .and_then(Value::as_f64)
            .ok_or_else(|| "x must be a number".to_string())?;
        let mut out = Map::new();
        out.insert("answer".to_string(), json!(x + 1.0));
        Ok(out)
    })
}

pub fn inputs(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

/// Counts every call it receives and answers nothing useful.
#[derive(Default)]
pub struct SpyPlugin {
    calls: AtomicUsize,
}

impl SpyPlugin {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PluginCapability for SpyPlugin {
    fn name(&self) -> &str {
        "spy"
    }

    async fn authenticate(&self, _auth: &AuthValue) -> Result<CredentialContext> {
        self.touch();
        Ok(CredentialContext::anonymous())
    }

    async fn deploy(
        &self,
        definition: &ServiceDefinition,
        _swagger: &SwaggerDocument,
        _credential: &CredentialContext,
    ) -> Result<RemoteRef> {
        self.touch();
        Ok(RemoteRef::new(definition.clone()))
    }

    async fn list(
        &self,
        _name: Option<&str>,
        _credential: &CredentialContext,
    ) -> Result<Vec<RemoteRef>> {
        self.touch();
        Ok(Vec::new())
    }

    async fn get(
        &self,
        _name: &str,
        _version: Option<&str>,
        _credential: &CredentialContext,
    ) -> Result<Option<RemoteRef>> {
        self.touch();
        Ok(None)
    }
}

/// Delegates to a `LocalPlugin` but leaves out `redeploy`, and counts
/// authentications.
pub struct NoRedeployPlugin {
    inner: LocalPlugin,
    pub authentications: AtomicUsize,
}

impl NoRedeployPlugin {
    pub fn new() -> Self {
        Self::wrapping(LocalPlugin::new(ENDPOINT))
    }

    pub fn wrapping(inner: LocalPlugin) -> Self {
        Self {
            inner,
            authentications: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PluginCapability for NoRedeployPlugin {
    fn name(&self) -> &str {
        "no-redeploy"
    }

    async fn authenticate(&self, auth: &AuthValue) -> Result<CredentialContext> {
        self.authentications.fetch_add(1, Ordering::SeqCst);
        self.inner.authenticate(auth).await
    }

    async fn deploy(
        &self,
        definition: &ServiceDefinition,
        swagger: &SwaggerDocument,
        credential: &CredentialContext,
    ) -> Result<RemoteRef> {
        self.inner.deploy(definition, swagger, credential).await
    }

    async fn list(
        &self,
        name: Option<&str>,
        credential: &CredentialContext,
    ) -> Result<Vec<RemoteRef>> {
        self.inner.list(name, credential).await
    }

    async fn get(
        &self,
        name: &str,
        version: Option<&str>,
        credential: &CredentialContext,
    ) -> Result<Option<RemoteRef>> {
        self.inner.get(name, version, credential).await
    }
}

pub fn local() -> Arc<LocalPlugin> {
    Arc::new(LocalPlugin::new(ENDPOINT))
}
