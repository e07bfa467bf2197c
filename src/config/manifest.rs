use crate::config::toml_config::substitute_env_vars;
use crate::core::builder::ServiceOptions;
use crate::core::version::INITIAL_VERSION;
use crate::domain::model::ServiceDefinition;
use crate::utils::error::{DeployError, Result};
use crate::utils::validation::{validate_non_empty_string, Validate};
use serde::Deserialize;
use std::path::Path;

/// TOML file describing one or more services.
///
/// ```toml
/// [[services]]
/// name = "add-one"
/// version = "1.0.1"
/// code_str = "answer = x + 1"
///
/// [services.inputs]
/// x = "float"
///
/// [services.outputs]
/// answer = "float"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceManifest {
    pub services: Vec<ManifestEntry>,
}

/// One `[[services]]` table: the name plus the keyword-map fields.
/// Keys that are not option fields are rejected.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "toml::Table")]
pub struct ManifestEntry {
    pub name: String,
    pub options: ServiceOptions,
}

impl TryFrom<toml::Table> for ManifestEntry {
    type Error = String;

    fn try_from(mut table: toml::Table) -> std::result::Result<Self, Self::Error> {
        let name = match table.remove("name") {
            Some(toml::Value::String(name)) => name,
            Some(other) => return Err(format!("service name must be a string, got {}", other)),
            None => return Err("missing field `name`".to_string()),
        };
        let options = toml::Value::Table(table)
            .try_into::<ServiceOptions>()
            .map_err(|e| format!("service '{}': {}", name, e.message()))?;
        Ok(Self { name, options })
    }
}

impl ManifestEntry {
    /// 沒有指定版本時使用初始版本
    pub fn definition(&self) -> Result<ServiceDefinition> {
        let version = self.options.version.as_deref().unwrap_or(INITIAL_VERSION);
        self.options.finalize(&self.name, version)
    }
}

impl ServiceManifest {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| DeployError::ConfigValidationError {
            field: "services".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    pub fn get(&self, name: &str) -> Option<&ManifestEntry> {
        self.services.iter().find(|entry| entry.name == name)
    }

    /// The `(name, options)` pairs, ready for `deploy_service`.
    pub fn into_options(self) -> Vec<(String, ServiceOptions)> {
        self.services
            .into_iter()
            .map(|entry| (entry.name, entry.options))
            .collect()
    }
}

impl Validate for ServiceManifest {
    fn validate(&self) -> Result<()> {
        if self.services.is_empty() {
            return Err(DeployError::MissingConfigError {
                field: "services".to_string(),
            });
        }
        for (index, entry) in self.services.iter().enumerate() {
            validate_non_empty_string(&format!("services[{}].name", index), &entry.name)?;
            let version = entry.options.version.as_deref().unwrap_or(INITIAL_VERSION);
            let duplicate = self.services[..index].iter().any(|other| {
                other.name == entry.name
                    && other.options.version.as_deref().unwrap_or(INITIAL_VERSION) == version
            });
            if duplicate {
                return Err(DeployError::ConflictError {
                    name: entry.name.clone(),
                    version: version.to_string(),
                });
            }
            entry.definition()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
[[services]]
name = "add-one"
version = "1.0.1"
code_str = "answer = x + 1"
description = "Adds one"
alias = "increment"

[services.inputs]
x = "float"

[services.outputs]
answer = "float"

[[services]]
name = "echo"
code_str = "out = msg"

[services.inputs]
msg = "string"

[services.outputs]
out = "string"
"#;

    #[test]
    fn test_parse_manifest() {
        let manifest = ServiceManifest::from_toml_str(MANIFEST).unwrap();
        assert_eq!(manifest.services.len(), 2);
        assert!(manifest.validate().is_ok());

        let add_one = manifest.get("add-one").unwrap().definition().unwrap();
        assert_eq!(add_one.version, "1.0.1");
        assert_eq!(add_one.operation_id(), "increment");

        let echo = manifest.get("echo").unwrap().definition().unwrap();
        assert_eq!(echo.version, INITIAL_VERSION);
    }

    #[test]
    fn test_duplicate_entries_are_rejected() {
        let manifest = ServiceManifest::from_toml_str(
            r#"
[[services]]
name = "echo"
version = "1.0.0"
code_str = "out = msg"

[[services]]
name = "echo"
code_str = "out = msg"
"#,
        )
        .unwrap();
        assert!(matches!(
            manifest.validate(),
            Err(DeployError::ConflictError { .. })
        ));
    }

    #[test]
    fn test_entry_without_code_fails_validation() {
        let manifest = ServiceManifest::from_toml_str(
            r#"
[[services]]
name = "empty"
"#,
        )
        .unwrap();
        assert!(matches!(
            manifest.validate(),
            Err(DeployError::DefinitionError { .. })
        ));
    }

    #[test]
    fn test_misspelled_key_is_rejected() {
        let err = ServiceManifest::from_toml_str(
            r#"
[[services]]
name = "echo"
code_str = "out = msg"
descripton = "typo"
"#,
        )
        .unwrap_err();
        match err {
            DeployError::ConfigValidationError { message, .. } => {
                assert!(message.contains("descripton"), "{}", message);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_entry_without_name_is_rejected() {
        assert!(ServiceManifest::from_toml_str(
            r#"
[[services]]
code_str = "out = msg"
"#,
        )
        .is_err());
    }

    #[test]
    fn test_into_options() {
        let pairs = ServiceManifest::from_toml_str(MANIFEST).unwrap().into_options();
        assert_eq!(pairs[0].0, "add-one");
        assert_eq!(pairs[0].1.alias.as_deref(), Some("increment"));
    }
}
