use thiserror::Error;

#[derive(Error, Debug)]
pub enum IntegrationError {
    #[error("No {provider} integration data for rule '{rule}' (CWE {classifier})")]
    NoIntegrationData {
        provider: String,
        rule: String,
        classifier: String,
    },

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("Request to {url} failed with status {status}")]
    UnexpectedStatus { url: String, status: u16 },

    #[error("Bad JSON in response from {url}: {message}")]
    MalformedResponse { url: String, message: String },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV output error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Template error: {message}")]
    TemplateError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration field '{field}' could not be parsed: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration '{field}'")]
    MissingConfigError { field: String },

    #[error("Rule update rejected for '{rule}': {message}")]
    UpdateRejected { rule: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// 預期中的結果，例如某個規則沒有對應的整合資料
    Expected,
    Transport,
    Configuration,
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl IntegrationError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            IntegrationError::NoIntegrationData { .. } => ErrorCategory::Expected,
            IntegrationError::ApiError(_)
            | IntegrationError::UnexpectedStatus { .. }
            | IntegrationError::MalformedResponse { .. }
            | IntegrationError::UpdateRejected { .. } => ErrorCategory::Transport,
            IntegrationError::ConfigError { .. }
            | IntegrationError::ConfigValidationError { .. }
            | IntegrationError::InvalidConfigValueError { .. }
            | IntegrationError::MissingConfigError { .. } => ErrorCategory::Configuration,
            IntegrationError::SerializationError(_)
            | IntegrationError::CsvError(_)
            | IntegrationError::IoError(_)
            | IntegrationError::TemplateError { .. } => ErrorCategory::Processing,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Expected => ErrorSeverity::Low,
            ErrorCategory::Transport => ErrorSeverity::Medium,
            ErrorCategory::Processing => ErrorSeverity::High,
            ErrorCategory::Configuration => ErrorSeverity::Critical,
        }
    }

    /// 傳輸層錯誤只中止目前這條規則
    pub fn is_transport(&self) -> bool {
        self.category() == ErrorCategory::Transport
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, IntegrationError::NoIntegrationData { .. })
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            IntegrationError::NoIntegrationData {
                provider, rule, ..
            } => format!("{} has no training content for the rule '{}'", provider, rule),
            IntegrationError::ApiError(e) if e.is_timeout() => {
                "The remote service did not answer in time".to_string()
            }
            IntegrationError::ApiError(_) => "Could not reach the remote service".to_string(),
            IntegrationError::UnexpectedStatus { status, .. } => match status {
                401 | 403 => "The remote service rejected your credentials".to_string(),
                404 => "The requested rule or resource does not exist".to_string(),
                _ => format!("The remote service answered with HTTP {}", status),
            },
            IntegrationError::MissingConfigError { field } => {
                format!("Your configuration is missing '{}'", field)
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Expected => "No action needed; the rule was left unchanged",
            ErrorCategory::Transport => match self {
                IntegrationError::UnexpectedStatus {
                    status: 401 | 403, ..
                } => "Run `auth init` again or check that your user has the RULES_ADMIN role",
                _ => "Check your network connection and the TeamServer URL, then retry",
            },
            ErrorCategory::Configuration => "Run `auth init` to recreate the configuration file",
            ErrorCategory::Processing => "Re-run with --verbose and inspect the logged details",
        }
    }
}

pub type Result<T> = std::result::Result<T, IntegrationError>;
