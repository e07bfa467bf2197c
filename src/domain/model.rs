use serde::de::{MapAccess, Visitor};
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// 參數型別標籤
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeTag {
    Float,
    Int,
    Str,
    Bool,
    Object,
    Array,
    /// 無法辨識的標籤，原樣保留
    Other(String),
}

impl TypeTag {
    pub fn parse(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "float" | "double" | "number" | "numeric" => TypeTag::Float,
            "int" | "integer" => TypeTag::Int,
            "str" | "string" | "character" => TypeTag::Str,
            "bool" | "boolean" | "logical" => TypeTag::Bool,
            "object" | "dict" | "map" => TypeTag::Object,
            "array" | "list" | "vector" => TypeTag::Array,
            _ => TypeTag::Other(tag.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TypeTag::Float => "float",
            TypeTag::Int => "int",
            TypeTag::Str => "string",
            TypeTag::Bool => "bool",
            TypeTag::Object => "object",
            TypeTag::Array => "array",
            TypeTag::Other(tag) => tag,
        }
    }
}

impl From<&str> for TypeTag {
    fn from(tag: &str) -> Self {
        TypeTag::parse(tag)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Insertion-ordered parameter name → type tag mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamSchema {
    fields: Vec<(String, TypeTag)>,
}

impl ParamSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter. Re-inserting an existing name replaces its type in place.
    pub fn field(mut self, name: &str, tag: impl Into<TypeTag>) -> Self {
        self.insert(name, tag.into());
        self
    }

    pub fn insert(&mut self, name: &str, tag: TypeTag) {
        match self.fields.iter_mut().find(|(key, _)| key == name) {
            Some(entry) => entry.1 = tag,
            None => self.fields.push((name.to_string(), tag)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&TypeTag> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, tag)| tag)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypeTag)> {
        self.fields.iter().map(|(key, tag)| (key.as_str(), tag))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: AsRef<str>, T: Into<TypeTag>> FromIterator<(K, T)> for ParamSchema {
    fn from_iter<I: IntoIterator<Item = (K, T)>>(iter: I) -> Self {
        let mut schema = ParamSchema::new();
        for (name, tag) in iter {
            schema.insert(name.as_ref(), tag.into());
        }
        schema
    }
}

impl<const N: usize> From<[(&str, &str); N]> for ParamSchema {
    fn from(fields: [(&str, &str); N]) -> Self {
        fields.into_iter().collect()
    }
}

impl Serialize for ParamSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, tag) in &self.fields {
            map.serialize_entry(name, tag.as_str())?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ParamSchema {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SchemaVisitor;

        impl<'de> Visitor<'de> for SchemaVisitor {
            type Value = ParamSchema;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a table of parameter names to type tags")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ParamSchema, A::Error> {
                let mut schema = ParamSchema::new();
                while let Some((name, tag)) = access.next_entry::<String, String>()? {
                    schema.insert(&name, TypeTag::parse(&tag));
                }
                Ok(schema)
            }
        }

        deserializer.deserialize_map(SchemaVisitor)
    }
}

/// A dependency required by the remote execution environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    pub name: String,
    pub version: Option<String>,
}

impl PackageSpec {
    /// 解析 `name` 或 `name==version`
    pub fn parse(spec: &str) -> Self {
        match spec.split_once("==") {
            Some((name, version)) if !version.trim().is_empty() => Self {
                name: name.trim().to_string(),
                version: Some(version.trim().to_string()),
            },
            Some((name, _)) => Self {
                name: name.trim().to_string(),
                version: None,
            },
            None => Self {
                name: spec.trim().to_string(),
                version: None,
            },
        }
    }
}

impl From<&str> for PackageSpec {
    fn from(spec: &str) -> Self {
        PackageSpec::parse(spec)
    }
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}=={}", self.name, version),
            None => f.write_str(&self.name),
        }
    }
}

impl Serialize for PackageSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PackageSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let spec = String::deserialize(deserializer)?;
        Ok(PackageSpec::parse(&spec))
    }
}

/// Execution scope handed to a service function on every call.
pub struct CallScope<'a> {
    pub inputs: &'a Map<String, Value>,
    /// Names defined by the init code.
    pub globals: &'a Map<String, Value>,
    pub objects: &'a [Value],
}

impl CallScope<'_> {
    /// 先查輸入參數，再查 init 定義的名稱
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.inputs.get(name).or_else(|| self.globals.get(name))
    }
}

pub type ServiceFn =
    Arc<dyn Fn(&CallScope<'_>) -> Result<Map<String, Value>, String> + Send + Sync>;
pub type InitFn = Arc<dyn Fn() -> Map<String, Value> + Send + Sync>;

#[derive(Clone)]
pub enum CodeBody {
    Function(ServiceFn),
    Source(String),
}

#[derive(Clone)]
pub enum InitBody {
    Function(InitFn),
    Source(String),
}

/// Default operation id for services authored from source text.
pub const SOURCE_OPERATION_NAME: &str = "consume";

/// Reference to the code a service runs, plus its optional init code.
#[derive(Clone)]
pub struct CodeRef {
    name: String,
    body: CodeBody,
    init: Option<InitBody>,
}

impl CodeRef {
    pub fn function<F>(name: &str, f: F) -> Self
    where
        F: Fn(&CallScope<'_>) -> Result<Map<String, Value>, String> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            body: CodeBody::Function(Arc::new(f)),
            init: None,
        }
    }

    pub fn source(source: &str, init: Option<&str>) -> Self {
        Self {
            name: SOURCE_OPERATION_NAME.to_string(),
            body: CodeBody::Source(source.to_string()),
            init: init.map(|src| InitBody::Source(src.to_string())),
        }
    }

    pub fn with_init<F>(mut self, init: F) -> Self
    where
        F: Fn() -> Map<String, Value> + Send + Sync + 'static,
    {
        self.init = Some(InitBody::Function(Arc::new(init)));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn body(&self) -> &CodeBody {
        &self.body
    }

    pub fn init(&self) -> Option<&InitBody> {
        self.init.as_ref()
    }

    fn kind(&self) -> &'static str {
        match self.body {
            CodeBody::Function(_) => "function",
            CodeBody::Source(_) => "source",
        }
    }
}

impl PartialEq for CodeRef {
    fn eq(&self, other: &Self) -> bool {
        let body_eq = match (&self.body, &other.body) {
            (CodeBody::Function(a), CodeBody::Function(b)) => Arc::ptr_eq(a, b),
            (CodeBody::Source(a), CodeBody::Source(b)) => a == b,
            _ => false,
        };
        let init_eq = match (&self.init, &other.init) {
            (None, None) => true,
            (Some(InitBody::Function(a)), Some(InitBody::Function(b))) => Arc::ptr_eq(a, b),
            (Some(InitBody::Source(a)), Some(InitBody::Source(b))) => a == b,
            _ => false,
        };
        self.name == other.name && body_eq && init_eq
    }
}

impl fmt::Debug for CodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeRef")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("has_init", &self.init.is_some())
            .finish()
    }
}

impl Serialize for CodeRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("CodeRef", 4)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("kind", self.kind())?;
        match &self.body {
            CodeBody::Source(src) => state.serialize_field("source", src)?,
            CodeBody::Function(_) => state.serialize_field("source", &Option::<String>::None)?,
        }
        let init = match &self.init {
            Some(InitBody::Source(src)) => Some(src.as_str()),
            Some(InitBody::Function(_)) => Some("<function>"),
            None => None,
        };
        state.serialize_field("init", &init)?;
        state.end()
    }
}

/// Canonical metadata for one version of a service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceDefinition {
    pub name: String,
    pub version: String,
    pub code: CodeRef,
    pub inputs: ParamSchema,
    pub outputs: ParamSchema,
    pub objects: Vec<Value>,
    pub packages: Vec<PackageSpec>,
    pub artifacts: Vec<String>,
    pub description: Option<String>,
    pub alias: Option<String>,
}

impl ServiceDefinition {
    /// Operation id exposed to consumers: the alias, else the callable's name.
    pub fn operation_id(&self) -> &str {
        self.alias.as_deref().unwrap_or_else(|| self.code.name())
    }

    pub fn key(&self) -> (&str, &str) {
        (&self.name, &self.version)
    }

    pub fn to_json_string(&self) -> crate::utils::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// What a plugin hands back for a deployed service.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRef {
    pub name: String,
    pub version: String,
    pub url: Option<String>,
    pub definition: ServiceDefinition,
    /// Provider-specific details, passed through untouched.
    pub metadata: Map<String, Value>,
}

impl RemoteRef {
    pub fn new(definition: ServiceDefinition) -> Self {
        Self {
            name: definition.name.clone(),
            version: definition.version.clone(),
            url: None,
            definition,
            metadata: Map::new(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_schema_preserves_insertion_order() {
        let schema = ParamSchema::new()
            .field("zeta", "float")
            .field("alpha", "int")
            .field("zeta", "string");

        let names: Vec<&str> = schema.names().collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
        assert_eq!(schema.get("zeta"), Some(&TypeTag::Str));
    }

    #[test]
    fn test_param_schema_serializes_in_order() {
        let schema = ParamSchema::from([("b", "bool"), ("a", "float")]);
        let json = serde_json::to_string(&schema).unwrap();
        assert_eq!(json, r#"{"b":"bool","a":"float"}"#);
    }

    #[test]
    fn test_type_tag_parse() {
        assert_eq!(TypeTag::parse("numeric"), TypeTag::Float);
        assert_eq!(TypeTag::parse("Integer"), TypeTag::Int);
        assert_eq!(
            TypeTag::parse("data.frame"),
            TypeTag::Other("data.frame".to_string())
        );
    }

    #[test]
    fn test_package_spec_parse() {
        let pinned = PackageSpec::parse("numpy==1.26.0");
        assert_eq!(pinned.name, "numpy");
        assert_eq!(pinned.version.as_deref(), Some("1.26.0"));

        let loose = PackageSpec::parse("pandas");
        assert_eq!(loose.version, None);
        assert_eq!(loose.to_string(), "pandas");
    }

    #[test]
    fn test_code_ref_equality_is_by_identity() {
        let code = CodeRef::function("add_one", |_| Ok(Map::new()));
        let same = code.clone();
        let other = CodeRef::function("add_one", |_| Ok(Map::new()));

        assert_eq!(code, same);
        assert_ne!(code, other);
        assert_eq!(CodeRef::source("x + 1", None), CodeRef::source("x + 1", None));
    }
}
