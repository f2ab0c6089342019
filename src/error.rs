use thiserror::Error;

/// Errors raised while configuring the loader or talking to a stub target
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Failed to bind embedded mock server: {0}")]
    Bind(#[source] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Admin API returned HTTP {status}: {body}")]
    AdminStatus { status: u16, body: String },

    #[error("Invalid regex '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Invalid JSON path '{0}'")]
    InvalidJsonPath(String),

    #[error("Invalid XPath '{0}'")]
    InvalidXPath(String),

    #[error("Invalid XML: {0}")]
    InvalidXml(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Stub target has been stopped")]
    TargetStopped,
}

impl From<figment::Error> for LoaderError {
    fn from(err: figment::Error) -> Self {
        LoaderError::Config(Box::new(err))
    }
}

pub type Result<T, E = LoaderError> = std::result::Result<T, E>;
