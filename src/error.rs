//! Error types for formcover

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// formcover errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("Form parse error: {0}")]
    FormParse(String),

    #[error("Duplicate question identifier: {question}")]
    DuplicateId { question: String },

    #[error("Question {question}: visibility predicate references unknown question '{referenced}'")]
    UnknownReference { question: String, referenced: String },

    #[error("Question {question}: visibility predicate references '{referenced}', which does not appear strictly earlier in the form")]
    ForwardReference { question: String, referenced: String },

    #[error("Question {question}: cannot encode visibility predicate: {reason}")]
    Encoding { question: String, reason: String },

    #[error("Solver error: {0}")]
    Solver(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}
