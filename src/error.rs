use thiserror::Error;

/// Core error types for the case runner
#[derive(Error, Debug)]
pub enum CaseFlowError {
    #[error("Substitution error: {0}")]
    Substitution(#[from] SubstitutionError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Assertion error: {0}")]
    Assertion(#[from] AssertionError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),

    #[error("Case error: {0}")]
    Case(#[from] CaseError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised while rewriting a request payload
#[derive(Error, Debug)]
pub enum SubstitutionError {
    #[error("Unknown helper function: {0}")]
    UnknownFunction(String),

    #[error("Invalid argument for helper '{function}': {message}")]
    InvalidArgument { function: String, message: String },

    #[error("Substituted payload is no longer valid YAML: {0}")]
    MalformedPayload(String),
}

/// Errors raised while pulling values out of a response.
/// These never cross the extraction boundary; they are logged and absorbed.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Response body is not decodable: {0}")]
    DecodeFailure(String),

    #[error("Response has no field named '{0}'")]
    MissingField(String),

    #[error("Invalid extraction expression '{expression}': {message}")]
    InvalidExpression { expression: String, message: String },

    #[error("Extraction miss for '{variable}': {matched} match(es), index {index}")]
    Miss {
        variable: String,
        matched: usize,
        index: usize,
    },
}

/// Assertion-specific errors
#[derive(Error, Debug)]
pub enum AssertionError {
    #[error("Assertion '{label}' failed: expected {expected}, actual {actual}")]
    Failed {
        label: String,
        expected: String,
        actual: String,
    },

    #[error("Unsupported assertion kind: {found}, supported kinds are {supported:?}")]
    UnsupportedKind {
        found: String,
        supported: &'static [&'static str],
    },

    #[error("Response body is not valid JSON: {0}")]
    DecodeFailure(String),
}

/// Transport-specific errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Invalid request definition: {0}")]
    InvalidRequest(String),
}

/// Database lookup collaborator errors
#[derive(Error, Debug)]
pub enum LookupError {
    #[error("Query failed: {query}: {message}")]
    QueryFailed { query: String, message: String },

    #[error("Query returned no rows: {0}")]
    EmptyResult(String),
}

/// Case document errors
#[derive(Error, Debug)]
pub enum CaseError {
    #[error("Case file not found: {0}")]
    FileNotFound(String),

    #[error("Case file '{file}' does not follow the framework layout: {message}")]
    ValidationError { file: String, message: String },

    #[error("Failed to parse case file '{file}': {message}")]
    ParseError { file: String, message: String },

    #[error("Invalid parametrize table in '{file}': {message}")]
    InvalidParametrize { file: String, message: String },
}

impl From<serde_yaml::Error> for CaseFlowError {
    fn from(err: serde_yaml::Error) -> Self {
        CaseFlowError::Configuration(err.to_string())
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, CaseFlowError>;
