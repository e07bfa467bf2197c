mod common;

use anyhow::Result;
use common::{inputs, local};
use mldeploy::utils::validation::Validate;
use mldeploy::{ClientConfig, DeployError, OperationalizationClient, ServiceManifest, SwaggerProjector};
use serde_json::json;
use std::io::Write;
use tempfile::NamedTempFile;

const MANIFEST: &str = r#"
[[services]]
name = "add-one"
version = "1.0.1"
code_str = "answer <- x + 1"
description = "Adds one to **x**"
packages = ["jsonlite==1.8.8"]

[services.inputs]
x = "float"

[services.outputs]
answer = "float"
"#;

#[tokio::test]
async fn test_manifest_services_deploy_through_client() -> Result<()> {
    let mut config_file = NamedTempFile::new()?;
    write!(
        config_file,
        r#"
[client]
endpoint = "http://localhost:12800/"
strict_plugin_check = true

[auth]
username = "admin"
"#
    )?;
    let config = ClientConfig::from_file(config_file.path())?;
    config.validate()?;

    let client = OperationalizationClient::from_config(&config, Some(local()))?;
    assert_eq!(client.endpoint(), "http://localhost:12800");

    let manifest = ServiceManifest::from_toml_str(MANIFEST)?;
    manifest.validate()?;

    for (name, options) in manifest.clone().into_options() {
        let handle = client.deploy_service(&name, options).await?;
        assert_eq!(handle.operation(), "consume");
        assert_eq!(handle.definition().packages[0].to_string(), "jsonlite==1.8.8");
    }

    let expected = SwaggerProjector::project(&manifest.services[0].definition()?);
    let handle = client.get_service("add-one", None).await?;
    assert_eq!(handle.swagger(), expected);
    assert_eq!(
        expected.as_value()["info"]["description"],
        "Adds one to **x**"
    );

    // The local plugin only runs in-process functions.
    let err = handle
        .invoke(inputs(&[("x", json!(1.0))]))
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::BackendError(_)));
    Ok(())
}

#[test]
fn test_manifest_from_file() -> Result<()> {
    let mut manifest_file = NamedTempFile::new()?;
    manifest_file.write_all(MANIFEST.as_bytes())?;

    let manifest = ServiceManifest::from_file(manifest_file.path())?;
    let definition = manifest.get("add-one").unwrap().definition()?;
    let names: Vec<&str> = definition.inputs.names().collect();
    assert_eq!(names, vec!["x"]);
    Ok(())
}

#[test]
fn test_invalid_manifest_is_reported() {
    let err = ServiceManifest::from_toml_str("services = 3").unwrap_err();
    assert!(matches!(err, DeployError::ConfigValidationError { .. }));
}
