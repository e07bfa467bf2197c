use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

fn version_suffix(version: &Option<String>) -> String {
    version.as_deref().map(|v| format!("@{}", v)).unwrap_or_default()
}

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("Invalid service definition: {message}")]
    DefinitionError { message: String },

    #[error("Service {name}@{version} already exists")]
    ConflictError { name: String, version: String },

    #[error("Service {name}{} not found", version_suffix(.version))]
    NotFoundError {
        name: String,
        version: Option<String>,
    },

    #[error("No plugin registered on this client")]
    NoPluginError,

    #[error("Plugin '{plugin}' does not provide the '{capability}' capability")]
    CapabilityMissingError { plugin: String, capability: String },

    #[error("Output '{field}' not found in service response")]
    OutputNotFoundError { field: String },

    #[error("Invalid input for {service}: {message}")]
    InvalidInputError { service: String, message: String },

    #[error("Service {service} has no operation named '{operation}'")]
    UnknownOperationError { service: String, operation: String },

    /// 外掛回傳的錯誤，原樣傳遞
    #[error("Backend error: {0}")]
    BackendError(#[source] BoxError),

    #[error("Invalid configuration value for '{field}': {value} ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Plugin,
    Backend,
    Configuration,
    Invocation,
    System,
}

impl DeployError {
    pub fn definition(message: impl Into<String>) -> Self {
        DeployError::DefinitionError {
            message: message.into(),
        }
    }

    pub fn not_found(name: &str, version: Option<&str>) -> Self {
        DeployError::NotFoundError {
            name: name.to_string(),
            version: version.map(str::to_string),
        }
    }

    pub fn capability_missing(plugin: &str, capability: impl std::fmt::Display) -> Self {
        DeployError::CapabilityMissingError {
            plugin: plugin.to_string(),
            capability: capability.to_string(),
        }
    }

    /// 包裝外掛自身的錯誤型別
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        DeployError::BackendError(Box::new(error))
    }

    pub fn backend_message(message: impl Into<String>) -> Self {
        let message: String = message.into();
        DeployError::BackendError(message.into())
    }

    /// 取得外掛原始錯誤，供呼叫端檢查特定後端的細節
    pub fn backend_source<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            DeployError::BackendError(inner) => inner.downcast_ref::<E>(),
            _ => None,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            DeployError::DefinitionError { .. }
            | DeployError::ConflictError { .. }
            | DeployError::NotFoundError { .. } => ErrorCategory::Validation,
            DeployError::NoPluginError | DeployError::CapabilityMissingError { .. } => {
                ErrorCategory::Plugin
            }
            DeployError::BackendError(_) => ErrorCategory::Backend,
            DeployError::InvalidConfigValueError { .. }
            | DeployError::MissingConfigError { .. }
            | DeployError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            DeployError::OutputNotFoundError { .. }
            | DeployError::InvalidInputError { .. }
            | DeployError::UnknownOperationError { .. } => ErrorCategory::Invocation,
            DeployError::IoError(_) | DeployError::SerializationError(_) => ErrorCategory::System,
        }
    }

    pub fn is_validation(&self) -> bool {
        self.category() == ErrorCategory::Validation
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Validation => "Check the service name, version and definition fields",
            ErrorCategory::Plugin => "Register a plugin that provides the required capability",
            ErrorCategory::Backend => "Inspect the plugin error; retry only if the backend allows it",
            ErrorCategory::Configuration => "Fix the configuration file and try again",
            ErrorCategory::Invocation => "Compare the call with the service's inputs and outputs",
            ErrorCategory::System => "Check file permissions and the file format",
        }
    }
}

pub type Result<T> = std::result::Result<T, DeployError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("quota exceeded")]
    struct QuotaExceeded;

    #[test]
    fn test_backend_error_is_downcastable() {
        let err = DeployError::backend(QuotaExceeded);
        assert!(err.backend_source::<QuotaExceeded>().is_some());
        assert_eq!(err.category(), ErrorCategory::Backend);
        assert_eq!(err.to_string(), "Backend error: quota exceeded");
    }

    #[test]
    fn test_not_found_message() {
        assert_eq!(
            DeployError::not_found("add-one", Some("1.0.1")).to_string(),
            "Service add-one@1.0.1 not found"
        );
        assert_eq!(
            DeployError::not_found("add-one", None).to_string(),
            "Service add-one not found"
        );
    }

    #[test]
    fn test_validation_category() {
        assert!(DeployError::definition("missing code").is_validation());
        assert!(!DeployError::NoPluginError.is_validation());
    }
}
