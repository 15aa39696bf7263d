use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScopeError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Component {component} has no member named '{member}'")]
    UnknownMember { component: String, member: String },

    #[error("Component {component} is already bound to a different view state")]
    AlreadyBound { component: String },

    #[error("Unknown provider '{name}' required by {component}")]
    UnknownProvider { name: String, component: String },

    #[error("Unknown component: {name}")]
    UnknownComponent { name: String },

    #[error("{ttl} digest iterations reached without the view state settling")]
    DigestLimit { ttl: usize },

    #[error("A digest is already in progress")]
    DigestInProgress,
}

impl ScopeError {
    pub fn config(message: impl Into<String>) -> Self {
        ScopeError::ConfigError {
            message: message.into(),
        }
    }

    /// 提供給使用者的修復建議
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            ScopeError::IoError(_) => "Check that the file exists and is readable",
            ScopeError::SerializationError(_) => "Check that the value is valid JSON",
            ScopeError::ConfigError { .. }
            | ScopeError::ConfigValidationError { .. }
            | ScopeError::InvalidConfigValueError { .. }
            | ScopeError::MissingConfigError { .. } => {
                "Review the module description file and fix the reported field"
            }
            ScopeError::UnknownMember { .. } => {
                "Declare the member on the component class (field or method) before writing it"
            }
            ScopeError::AlreadyBound { .. } => {
                "Create a new component instance for each view state"
            }
            ScopeError::UnknownProvider { .. } => {
                "Register the dependency as a module value or pass it as a local"
            }
            ScopeError::UnknownComponent { .. } => "Register the component on the module first",
            ScopeError::DigestLimit { .. } => {
                "A watch listener keeps changing the value it watches; break the cycle"
            }
            ScopeError::DigestInProgress => "Do not start a digest from inside a watch listener",
        }
    }

    /// 簡短、適合直接顯示在終端機的錯誤訊息
    pub fn user_friendly_message(&self) -> String {
        match self {
            ScopeError::IoError(e) => format!("Could not read input: {}", e),
            ScopeError::DigestLimit { ttl } => {
                format!("The view state did not settle after {} digest rounds", ttl)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScopeError>;
