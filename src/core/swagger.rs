use crate::domain::model::{ParamSchema, ServiceDefinition, TypeTag};
use crate::utils::error::Result;
use serde::Serialize;
use serde_json::{json, Map, Value};

pub const INPUT_SCHEMA: &str = "InputParameters";
pub const OUTPUT_SCHEMA: &str = "OutputParameters";
pub const RESULT_SCHEMA: &str = "WebServiceResult";
pub const SECURITY_SCHEME: &str = "Bearer";

/// OpenAPI 2.0 document describing how to consume one service version.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SwaggerDocument(Value);

impl SwaggerDocument {
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.0)?)
    }

    pub fn to_pretty_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.0)?)
    }

    /// 服務的唯一路徑，例如 `/api/add-one/1.0.1`
    pub fn path(&self) -> Option<&str> {
        self.0
            .get("paths")
            .and_then(Value::as_object)
            .and_then(|paths| paths.keys().next())
            .map(String::as_str)
    }

    pub fn operation_id(&self) -> Option<&str> {
        let path = self.path()?;
        self.0["paths"][path]["post"]["operationId"].as_str()
    }
}

pub fn service_path(name: &str, version: &str) -> String {
    format!("/api/{}/{}", name, version)
}

/// Maps a finalized definition to its OpenAPI document.
///
/// The mapping has no side effects other than a warning for unknown type
/// tags. Object keys keep insertion order, so the same definition always
/// serializes to the same bytes.
pub struct SwaggerProjector;

impl SwaggerProjector {
    pub fn project(definition: &ServiceDefinition) -> SwaggerDocument {
        let path = service_path(&definition.name, &definition.version);

        let mut paths = Map::new();
        paths.insert(path, json!({ "post": Self::operation(definition) }));

        let mut definitions = Map::new();
        definitions.insert(
            INPUT_SCHEMA.to_string(),
            Self::parameters_schema(&definition.name, &definition.inputs),
        );
        definitions.insert(
            OUTPUT_SCHEMA.to_string(),
            Self::parameters_schema(&definition.name, &definition.outputs),
        );
        definitions.insert(
            RESULT_SCHEMA.to_string(),
            json!({
                "type": "object",
                "properties": {
                    "output": { "$ref": format!("#/definitions/{}", OUTPUT_SCHEMA) }
                }
            }),
        );

        let mut security_definitions = Map::new();
        security_definitions.insert(
            SECURITY_SCHEME.to_string(),
            json!({
                "type": "apiKey",
                "name": "Authorization",
                "in": "header",
                "description": "Bearer token, sent as 'Bearer <token>'"
            }),
        );

        let mut doc = Map::new();
        doc.insert("swagger".to_string(), json!("2.0"));
        doc.insert(
            "info".to_string(),
            json!({
                "title": definition.name,
                "description": definition.description.clone().unwrap_or_default(),
                "version": definition.version,
            }),
        );
        doc.insert("consumes".to_string(), json!(["application/json"]));
        doc.insert("produces".to_string(), json!(["application/json"]));
        doc.insert(
            "securityDefinitions".to_string(),
            Value::Object(security_definitions),
        );
        doc.insert(
            "security".to_string(),
            json!([{ SECURITY_SCHEME: [] }]),
        );
        doc.insert("paths".to_string(), Value::Object(paths));
        doc.insert("definitions".to_string(), Value::Object(definitions));

        SwaggerDocument(Value::Object(doc))
    }

    fn operation(definition: &ServiceDefinition) -> Value {
        json!({
            "operationId": definition.operation_id(),
            "description": format!("Consume the {} web service.", definition.name),
            "parameters": [{
                "name": "WebServiceParameters",
                "in": "body",
                "required": true,
                "schema": { "$ref": format!("#/definitions/{}", INPUT_SCHEMA) }
            }],
            "responses": {
                "200": {
                    "description": "OK",
                    "schema": { "$ref": format!("#/definitions/{}", RESULT_SCHEMA) }
                },
                "default": { "description": "Error" }
            }
        })
    }

    fn parameters_schema(service: &str, schema: &ParamSchema) -> Value {
        let mut properties = Map::new();
        for (name, tag) in schema.iter() {
            properties.insert(name.to_string(), Self::property(service, name, tag));
        }
        json!({ "type": "object", "properties": properties })
    }

    fn property(service: &str, field: &str, tag: &TypeTag) -> Value {
        match tag {
            TypeTag::Float => json!({ "type": "number" }),
            TypeTag::Int => json!({ "type": "integer" }),
            TypeTag::Str => json!({ "type": "string" }),
            TypeTag::Bool => json!({ "type": "boolean" }),
            TypeTag::Object => json!({ "type": "object" }),
            TypeTag::Array => json!({ "type": "array", "items": {} }),
            TypeTag::Other(raw) => {
                tracing::warn!(
                    service,
                    field,
                    tag = raw.as_str(),
                    "unknown type tag, described as object"
                );
                json!({ "type": "object" })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::CodeRef;

    fn add_one() -> ServiceDefinition {
        ServiceDefinition {
            name: "add-one".to_string(),
            version: "1.0.1".to_string(),
            code: CodeRef::function("add_one", |_| Ok(Map::new())),
            inputs: ParamSchema::from([("x", "float")]),
            outputs: ParamSchema::from([("answer", "float")]),
            objects: vec![],
            packages: vec![],
            artifacts: vec![],
            description: None,
            alias: None,
        }
    }

    #[test]
    fn test_add_one_document() {
        let doc = SwaggerProjector::project(&add_one());
        let value = doc.as_value();

        assert_eq!(value["swagger"], "2.0");
        assert_eq!(value["info"]["title"], "add-one");
        assert_eq!(value["info"]["version"], "1.0.1");
        assert_eq!(value["info"]["description"], "");
        assert_eq!(doc.path(), Some("/api/add-one/1.0.1"));
        assert_eq!(doc.operation_id(), Some("add_one"));
        assert_eq!(
            value["definitions"]["InputParameters"]["properties"]["x"]["type"],
            "number"
        );
        assert_eq!(
            value["definitions"]["WebServiceResult"]["properties"]["output"]["$ref"],
            "#/definitions/OutputParameters"
        );
        assert_eq!(value["securityDefinitions"]["Bearer"]["in"], "header");
    }

    #[test]
    fn test_projection_is_deterministic() {
        let definition = add_one();
        let first = SwaggerProjector::project(&definition).to_json_string().unwrap();
        let second = SwaggerProjector::project(&definition).to_json_string().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_alias_overrides_operation_id() {
        let mut definition = add_one();
        definition.alias = Some("increment".to_string());
        assert_eq!(
            SwaggerProjector::project(&definition).operation_id(),
            Some("increment")
        );
    }

    #[test]
    fn test_properties_keep_definition_order() {
        let mut definition = add_one();
        definition.inputs = ParamSchema::from([("zeta", "int"), ("alpha", "bool"), ("mid", "string")]);
        let doc = SwaggerProjector::project(&definition);
        let keys: Vec<&String> = doc.as_value()["definitions"]["InputParameters"]["properties"]
            .as_object()
            .unwrap()
            .keys()
            .collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_unknown_tag_becomes_object() {
        let mut definition = add_one();
        definition.outputs = ParamSchema::from([("frame", "data.frame"), ("rows", "array")]);
        let doc = SwaggerProjector::project(&definition);
        let props = &doc.as_value()["definitions"]["OutputParameters"]["properties"];
        assert_eq!(props["frame"]["type"], "object");
        assert_eq!(props["rows"]["type"], "array");
    }
}
