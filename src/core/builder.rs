use crate::core::client::OperationalizationClient;
use crate::core::handle::ServiceHandle;
use crate::domain::model::{CodeRef, PackageSpec, ParamSchema, ServiceDefinition};
use crate::utils::error::{DeployError, Result};
use serde::Deserialize;
use serde_json::Value;

/// Keyword-map authoring surface. Field names match the builder's setters.
///
/// Every field is optional; an unset field means "not given in this call",
/// which is what lets a redeploy merge onto the stored definition.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceOptions {
    pub version: Option<String>,
    #[serde(skip)]
    pub code_fn: Option<CodeRef>,
    pub code_str: Option<String>,
    pub init_str: Option<String>,
    pub inputs: Option<ParamSchema>,
    pub outputs: Option<ParamSchema>,
    pub objects: Option<Vec<Value>>,
    pub packages: Option<Vec<PackageSpec>>,
    pub artifacts: Option<Vec<String>>,
    pub description: Option<String>,
    pub alias: Option<String>,
}

impl ServiceOptions {
    fn code(&self) -> Result<Option<CodeRef>> {
        match (&self.code_fn, &self.code_str) {
            (Some(_), Some(_)) => Err(DeployError::definition(
                "code_fn and code_str are mutually exclusive",
            )),
            (Some(code), None) => Ok(Some(code.clone())),
            (None, Some(source)) => {
                Ok(Some(CodeRef::source(source, self.init_str.as_deref())))
            }
            (None, None) if self.init_str.is_some() => Err(DeployError::definition(
                "init_str requires code_str",
            )),
            (None, None) => Ok(None),
        }
    }

    /// Checks that need no stored definition, so a redeploy can fail before
    /// any plugin call.
    pub fn precheck(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        if let Some(version) = &self.version {
            validate_version(version)?;
        }
        self.code()?;
        if let (Some(inputs), Some(outputs)) = (&self.inputs, &self.outputs) {
            validate_schemas(inputs, outputs)?;
        }
        if let Some(alias) = &self.alias {
            validate_alias(alias)?;
        }
        if let Some(packages) = &self.packages {
            validate_packages(packages)?;
        }
        Ok(())
    }

    /// Builds a new definition from these options alone.
    pub fn finalize(&self, name: &str, version: &str) -> Result<ServiceDefinition> {
        validate_name(name)?;
        validate_version(version)?;
        let code = self
            .code()?
            .ok_or_else(|| DeployError::definition(format!("service '{}' has no code", name)))?;

        let definition = ServiceDefinition {
            name: name.to_string(),
            version: version.to_string(),
            code,
            inputs: self.inputs.clone().unwrap_or_default(),
            outputs: self.outputs.clone().unwrap_or_default(),
            objects: self.objects.clone().unwrap_or_default(),
            packages: self.packages.clone().unwrap_or_default(),
            artifacts: self.artifacts.clone().unwrap_or_default(),
            description: self.description.clone(),
            alias: self.alias.clone(),
        };
        validate_definition(&definition)?;
        Ok(definition)
    }

    /// Overlays the fields set here onto a previously deployed definition.
    /// Name and version always come from `base`.
    pub fn merge_onto(&self, base: &ServiceDefinition) -> Result<ServiceDefinition> {
        let mut merged = base.clone();
        if let Some(code) = self.code()? {
            merged.code = code;
        }
        if let Some(inputs) = &self.inputs {
            merged.inputs = inputs.clone();
        }
        if let Some(outputs) = &self.outputs {
            merged.outputs = outputs.clone();
        }
        if let Some(objects) = &self.objects {
            merged.objects = objects.clone();
        }
        if let Some(packages) = &self.packages {
            merged.packages = packages.clone();
        }
        if let Some(artifacts) = &self.artifacts {
            merged.artifacts = artifacts.clone();
        }
        if let Some(description) = &self.description {
            merged.description = Some(description.clone());
        }
        if let Some(alias) = &self.alias {
            merged.alias = Some(alias.clone());
        }
        validate_definition(&merged)?;
        Ok(merged)
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(DeployError::definition("service name cannot be empty"));
    }
    if name.contains('/') {
        return Err(DeployError::definition(format!(
            "service name '{}' cannot contain '/'",
            name
        )));
    }
    Ok(())
}

fn validate_version(version: &str) -> Result<()> {
    if version.trim().is_empty() || version.contains('/') {
        return Err(DeployError::definition(format!(
            "invalid version '{}'",
            version
        )));
    }
    Ok(())
}

fn validate_schemas(inputs: &ParamSchema, outputs: &ParamSchema) -> Result<()> {
    match inputs.names().find(|name| outputs.contains(name)) {
        Some(shared) => Err(DeployError::definition(format!(
            "'{}' is declared as both an input and an output",
            shared
        ))),
        None => Ok(()),
    }
}

fn validate_alias(alias: &str) -> Result<()> {
    if alias.trim().is_empty() {
        return Err(DeployError::definition("alias cannot be empty"));
    }
    Ok(())
}

fn validate_packages(packages: &[PackageSpec]) -> Result<()> {
    if packages.iter().any(|p| p.name.is_empty()) {
        return Err(DeployError::definition("package name cannot be empty"));
    }
    Ok(())
}

fn validate_definition(definition: &ServiceDefinition) -> Result<()> {
    validate_schemas(&definition.inputs, &definition.outputs)?;
    if let Some(alias) = &definition.alias {
        validate_alias(alias)?;
    }
    validate_packages(&definition.packages)
}

/// Fluent builder returned by [`OperationalizationClient::service`].
///
/// ```ignore
/// let handle = client
///     .service("add-one")
///     .version("1.0.1")
///     .code_fn(add_one)
///     .inputs([("x", "float")])
///     .outputs([("answer", "float")])
///     .deploy()
///     .await?;
/// ```
#[must_use = "a builder does nothing until deploy() or redeploy() is called"]
pub struct DefinitionBuilder<'a> {
    client: &'a OperationalizationClient,
    name: String,
    options: ServiceOptions,
}

impl<'a> DefinitionBuilder<'a> {
    pub(crate) fn new(client: &'a OperationalizationClient, name: &str) -> Self {
        Self::from_options(client, name, ServiceOptions::default())
    }

    pub(crate) fn from_options(
        client: &'a OperationalizationClient,
        name: &str,
        options: ServiceOptions,
    ) -> Self {
        Self {
            client,
            name: name.to_string(),
            options,
        }
    }

    pub fn version(mut self, version: &str) -> Self {
        self.options.version = Some(version.to_string());
        self
    }

    pub fn code_fn(mut self, code: CodeRef) -> Self {
        self.options.code_fn = Some(code);
        self.options.code_str = None;
        self.options.init_str = None;
        self
    }

    pub fn code_str(mut self, source: &str, init: Option<&str>) -> Self {
        self.options.code_fn = None;
        self.options.code_str = Some(source.to_string());
        self.options.init_str = init.map(str::to_string);
        self
    }

    pub fn inputs(mut self, inputs: impl Into<ParamSchema>) -> Self {
        self.options.inputs = Some(inputs.into());
        self
    }

    pub fn outputs(mut self, outputs: impl Into<ParamSchema>) -> Self {
        self.options.outputs = Some(outputs.into());
        self
    }

    pub fn objects(mut self, objects: Vec<Value>) -> Self {
        self.options.objects = Some(objects);
        self
    }

    pub fn packages<I, P>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PackageSpec>,
    {
        self.options.packages = Some(packages.into_iter().map(Into::into).collect());
        self
    }

    pub fn artifacts<I, S>(mut self, artifacts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.artifacts = Some(artifacts.into_iter().map(Into::into).collect());
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.options.description = Some(description.to_string());
        self
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.options.alias = Some(alias.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &ServiceOptions {
        &self.options
    }

    /// Publishes a new name+version.
    pub async fn deploy(self) -> Result<ServiceHandle> {
        self.client.publish(&self.name, self.options).await
    }

    /// Updates an existing name+version, keeping every field not set here.
    pub async fn redeploy(self) -> Result<ServiceHandle> {
        self.client.republish(&self.name, self.options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn code() -> CodeRef {
        CodeRef::function("add_one", |scope| {
            let x = scope.inputs.get("x").and_then(Value::as_f64).unwrap_or(0.0);
            let mut out = Map::new();
            out.insert("answer".to_string(), serde_json::json!(x + 1.0));
            Ok(out)
        })
    }

    #[test]
    fn test_finalize_defaults_empty_schemas() {
        let options = ServiceOptions {
            code_fn: Some(code()),
            ..Default::default()
        };
        let definition = options.finalize("add-one", "1.0.0").unwrap();
        assert!(definition.inputs.is_empty());
        assert!(definition.outputs.is_empty());
        assert_eq!(definition.operation_id(), "add_one");
    }

    #[test]
    fn test_precheck_rejects_option_errors_without_base() {
        let init_only = ServiceOptions {
            init_str: Some("x <- 1".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            init_only.precheck("add-one"),
            Err(DeployError::DefinitionError { .. })
        ));

        let both_codes = ServiceOptions {
            code_fn: Some(code()),
            code_str: Some("answer <- x + 1".to_string()),
            ..Default::default()
        };
        assert!(both_codes.precheck("add-one").is_err());

        let overlapping = ServiceOptions {
            inputs: Some(ParamSchema::from([("x", "float")])),
            outputs: Some(ParamSchema::from([("x", "float")])),
            ..Default::default()
        };
        assert!(overlapping.precheck("add-one").is_err());

        let blank_alias = ServiceOptions {
            alias: Some(" ".to_string()),
            ..Default::default()
        };
        assert!(blank_alias.precheck("add-one").is_err());
        assert!(ServiceOptions::default().precheck("a/b").is_err());

        // Only a partial update: code and schemas come from the stored definition.
        let description_only = ServiceOptions {
            description: Some("updated".to_string()),
            inputs: Some(ParamSchema::from([("x", "float")])),
            ..Default::default()
        };
        assert!(description_only.precheck("add-one").is_ok());
    }

    #[test]
    fn test_finalize_requires_code() {
        let err = ServiceOptions::default()
            .finalize("add-one", "1.0.0")
            .unwrap_err();
        assert!(matches!(err, DeployError::DefinitionError { .. }));
    }

    #[test]
    fn test_finalize_rejects_empty_name() {
        let options = ServiceOptions {
            code_fn: Some(code()),
            ..Default::default()
        };
        assert!(options.finalize("  ", "1.0.0").is_err());
        assert!(options.finalize("add-one", "").is_err());
    }

    #[test]
    fn test_input_output_collision() {
        let options = ServiceOptions {
            code_fn: Some(code()),
            inputs: Some(ParamSchema::from([("x", "float")])),
            outputs: Some(ParamSchema::from([("x", "float")])),
            ..Default::default()
        };
        let err = options.finalize("add-one", "1.0.0").unwrap_err();
        assert!(err.to_string().contains("both an input and an output"));
    }

    #[test]
    fn test_code_fn_and_code_str_conflict() {
        let options = ServiceOptions {
            code_fn: Some(code()),
            code_str: Some("answer <- x + 1".to_string()),
            ..Default::default()
        };
        assert!(options.finalize("add-one", "1.0.0").is_err());
    }

    #[test]
    fn test_source_code_operation_id() {
        let options = ServiceOptions {
            code_str: Some("answer = x + 1".to_string()),
            init_str: Some("import math".to_string()),
            ..Default::default()
        };
        let definition = options.finalize("add-one", "1.0.0").unwrap();
        assert_eq!(definition.operation_id(), "consume");
    }

    #[test]
    fn test_merge_only_overwrites_given_fields() {
        let base = ServiceOptions {
            code_fn: Some(code()),
            inputs: Some(ParamSchema::from([("x", "float")])),
            outputs: Some(ParamSchema::from([("answer", "float")])),
            description: Some("old".to_string()),
            ..Default::default()
        }
        .finalize("add-one", "1.0.1")
        .unwrap();

        let update = ServiceOptions {
            description: Some("new".to_string()),
            ..Default::default()
        };
        let merged = update.merge_onto(&base).unwrap();

        assert_eq!(merged.description.as_deref(), Some("new"));
        assert_eq!(merged.inputs, base.inputs);
        assert_eq!(merged.outputs, base.outputs);
        assert_eq!(merged.code, base.code);
        assert_eq!(merged.key(), ("add-one", "1.0.1"));
    }

    #[test]
    fn test_options_from_toml() {
        let options: ServiceOptions = toml::from_str(
            r#"
version = "2.0.0"
code_str = "answer = x + 1"
packages = ["numpy==1.26.0", "pandas"]
description = "adds one"

[inputs]
x = "float"

[outputs]
answer = "float"
"#,
        )
        .unwrap();

        assert_eq!(options.version.as_deref(), Some("2.0.0"));
        assert_eq!(options.packages.as_ref().unwrap()[0].name, "numpy");
        assert!(options.inputs.as_ref().unwrap().contains("x"));
        assert!(options.code_fn.is_none());
    }
}
