use thiserror::Error;

/// The primary error type for the `mymazda-lib` library.
#[derive(Error, Debug)]
pub enum MazdaError {
    /// Key material or configuration needed for an operation is absent.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid email or password (status {status})")]
    Authentication { status: String },

    #[error("Account has been locked (status {status})")]
    AccountLocked { status: String },

    /// Server answered with error code 600001. Session keys are stale.
    #[error("Server rejected encrypted request (error code {code})")]
    EncryptionRejected { code: u32 },

    /// Server answered with error code 600002. Access token is stale.
    #[error("Token expired (error code {code})")]
    TokenExpired { code: u32 },

    #[error("Request failed for an unknown reason (HTTP {http_status}, error code {code:?})")]
    RequestFailed { http_status: u16, code: Option<u32> },

    #[error("Login failed (status {status})")]
    LoginFailed { status: String },

    #[error("Invalid padding in decrypted payload")]
    InvalidPadding,

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("RSA error: {0}")]
    Rsa(#[from] rsa::Error),

    #[error("Invalid public key: {0}")]
    PublicKey(String),

    #[error("Failed to {action} (result code {result_code})")]
    Domain { action: String, result_code: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Coarse classification of a [`MazdaError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Authentication,
    AccountLocked,
    Protocol,
    Domain,
    Transport,
}

impl MazdaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MazdaError::Configuration(_) => ErrorKind::Configuration,
            MazdaError::Authentication { .. } => ErrorKind::Authentication,
            MazdaError::AccountLocked { .. } => ErrorKind::AccountLocked,
            MazdaError::EncryptionRejected { .. }
            | MazdaError::TokenExpired { .. }
            | MazdaError::RequestFailed { .. }
            | MazdaError::LoginFailed { .. }
            | MazdaError::InvalidPadding
            | MazdaError::MalformedResponse(_)
            | MazdaError::Json(_)
            | MazdaError::Base64(_)
            | MazdaError::Rsa(_)
            | MazdaError::PublicKey(_) => ErrorKind::Protocol,
            MazdaError::Domain { .. } => ErrorKind::Domain,
            MazdaError::Http(_) => ErrorKind::Transport,
        }
    }

    /// Server error code carried by the error, if any.
    pub fn error_code(&self) -> Option<u32> {
        match self {
            MazdaError::EncryptionRejected { code } | MazdaError::TokenExpired { code } => Some(*code),
            MazdaError::RequestFailed { code, .. } => *code,
            _ => None,
        }
    }

    pub(crate) fn missing(what: &str) -> Self {
        MazdaError::Configuration(format!("Missing {what}"))
    }
}

impl From<rsa::pkcs8::spki::Error> for MazdaError {
    fn from(e: rsa::pkcs8::spki::Error) -> Self {
        MazdaError::PublicKey(e.to_string())
    }
}

impl From<rsa::pkcs1::Error> for MazdaError {
    fn from(e: rsa::pkcs1::Error) -> Self {
        MazdaError::PublicKey(e.to_string())
    }
}
