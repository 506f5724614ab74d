// src/api.rs

//! Structured replies for the transport layer.
//!
//! Every supervisor operation returns a typed `Result`; transports turn it
//! into a [`Reply`] instead of hand-building ad-hoc maps.

use serde::Serialize;

use crate::errors::{Result, SupervisorError};

pub const STATUS_OK: u8 = 0;
pub const STATUS_ERROR: u8 = 1;

/// Machine-readable error category, for mapping onto transport status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    DuplicateName,
    NotFound,
    InvalidTransition,
    Persistence,
}

impl From<&SupervisorError> for ErrorKind {
    fn from(err: &SupervisorError) -> Self {
        match err {
            SupervisorError::Validation { .. } => ErrorKind::Validation,
            SupervisorError::DuplicateName(_) => ErrorKind::DuplicateName,
            SupervisorError::NotFound(_) => ErrorKind::NotFound,
            SupervisorError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            SupervisorError::Persistence(_)
            | SupervisorError::TomlDe(_)
            | SupervisorError::TomlSer(_) => ErrorKind::Persistence,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Reply<T: Serialize> {
    pub status: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    /// Offending spec field, for validation failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<&'static str>,
    pub message: String,
}

impl<T: Serialize> Reply<T> {
    pub fn ok(value: T) -> Self {
        Self {
            status: STATUS_OK,
            value: Some(value),
            error: None,
        }
    }

    pub fn error(err: &SupervisorError) -> Self {
        let field = match err {
            SupervisorError::Validation { field, .. } => Some(*field),
            _ => None,
        };
        Self {
            status: STATUS_ERROR,
            value: None,
            error: Some(ErrorBody {
                kind: err.into(),
                field,
                message: err.to_string(),
            }),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

impl<T: Serialize> From<Result<T>> for Reply<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => Reply::ok(value),
            Err(err) => Reply::error(&err),
        }
    }
}
