// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

use crate::process::{ProcessEvent, ProcessState};

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Invalid program spec: {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("Duplicated program name: {0}")]
    DuplicateName(String),

    #[error("Program not found: {0}")]
    NotFound(String),

    #[error("Program {name}: event {event:?} not accepted in state {state}")]
    InvalidTransition {
        name: String,
        state: ProcessState,
        event: ProcessEvent,
    },

    #[error("Persistence error: {0}")]
    Persistence(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl SupervisorError {
    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        SupervisorError::Validation {
            field,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SupervisorError>;
