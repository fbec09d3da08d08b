//! # Errors
//!
//! Every failure a lifecycle workflow can surface is a [`TenantError`].
//! Each variant maps to exactly one Feathers-style [`ErrorKind`], which
//! carries the HTTP status code and `className`, and to a unique error
//! `name`, so a transport can report the taxonomy 1:1.
//!
//! The transport crate decides how to serialize; `to_json()` produces the
//! conventional `{name, message, code, className}` payload.

use serde_json::{json, Value};
use thiserror::Error;

/// Result alias used across the tenant crates.
pub type TenantResult<T> = std::result::Result<T, TenantError>;

/// Feathers-ish error classes + status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,     // 400
    NotFound,       // 404
    Conflict,       // 409
    Unprocessable,  // 422
    GeneralError,   // 500
    BadGateway,     // 502
    Unavailable,    // 503
    GatewayTimeout, // 504
}

impl ErrorKind {
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Unprocessable => 422,
            ErrorKind::GeneralError => 500,
            ErrorKind::BadGateway => 502,
            ErrorKind::Unavailable => 503,
            ErrorKind::GatewayTimeout => 504,
        }
    }

    /// Feathers error `className` (kebab-cased)
    pub fn class_name(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "bad-request",
            ErrorKind::NotFound => "not-found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Unprocessable => "unprocessable",
            ErrorKind::GeneralError => "general-error",
            ErrorKind::BadGateway => "bad-gateway",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::GatewayTimeout => "gateway-timeout",
        }
    }
}

#[derive(Debug, Error)]
pub enum TenantError {
    /// Bad input. Raised before any collaborator is touched.
    #[error("{0}")]
    Validation(String),

    #[error("Version {0} does not exist")]
    UnknownVersion(String),

    #[error("Tenant {0} already exists")]
    TenantExists(String),

    #[error("Tenant {0} does not exist")]
    TenantNotFound(String),

    #[error("Job {0} not found")]
    JobNotFound(String),

    /// The shared base stack is gone. Fatal configuration problem.
    #[error("Base stack {0} does not exist")]
    BaseStackMissing(String),

    #[error("Secret {0} already exists")]
    SecretAlreadyExists(String),

    #[error("{step} failed: {message}")]
    Provision { step: &'static str, message: String },

    #[error("Stack {stack} not ready after {waited_secs}s")]
    ReadinessTimeout { stack: String, waited_secs: u64 },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl TenantError {
    pub fn validation(msg: impl Into<String>) -> Self {
        TenantError::Validation(msg.into())
    }

    pub fn provision(step: &'static str, msg: impl ToString) -> Self {
        TenantError::Provision {
            step,
            message: msg.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            TenantError::Validation(_) => ErrorKind::BadRequest,
            TenantError::UnknownVersion(_) => ErrorKind::Unprocessable,
            TenantError::TenantExists(_) => ErrorKind::Conflict,
            TenantError::TenantNotFound(_) => ErrorKind::NotFound,
            TenantError::JobNotFound(_) => ErrorKind::NotFound,
            TenantError::BaseStackMissing(_) => ErrorKind::Unavailable,
            TenantError::SecretAlreadyExists(_) => ErrorKind::Conflict,
            TenantError::Provision { .. } => ErrorKind::BadGateway,
            TenantError::ReadinessTimeout { .. } => ErrorKind::GatewayTimeout,
            TenantError::Internal(_) => ErrorKind::GeneralError,
        }
    }

    /// Unique per variant, even where status codes coincide.
    pub fn name(&self) -> &'static str {
        match self {
            TenantError::Validation(_) => "ValidationError",
            TenantError::UnknownVersion(_) => "UnknownVersionError",
            TenantError::TenantExists(_) => "TenantExistsError",
            TenantError::TenantNotFound(_) => "TenantNotFoundError",
            TenantError::JobNotFound(_) => "JobNotFoundError",
            TenantError::BaseStackMissing(_) => "BaseStackMissingError",
            TenantError::SecretAlreadyExists(_) => "SecretAlreadyExistsError",
            TenantError::Provision { .. } => "ProvisionError",
            TenantError::ReadinessTimeout { .. } => "ReadinessTimeoutError",
            TenantError::Internal(_) => "GeneralError",
        }
    }

    pub fn code(&self) -> u16 {
        self.kind().status_code()
    }

    pub fn class_name(&self) -> &'static str {
        self.kind().class_name()
    }

    /// Message safe to hand to a client. Internal details stay in the logs.
    pub fn client_message(&self) -> String {
        match self {
            TenantError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    /// Feathers-ish JSON payload, already sanitized.
    pub fn to_json(&self) -> Value {
        json!({
            "name": self.name(),
            "message": self.client_message(),
            "code": self.code(),
            "className": self.class_name(),
        })
    }
}
