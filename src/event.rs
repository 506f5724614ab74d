// src/event.rs

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::broadcast::Weighted;

/// One line of the global event stream, e.g. `"web state: Running -> Stopping"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub at: DateTime<Utc>,
    pub message: String,
}

impl Event {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            at: Utc::now(),
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Weighted for Event {}
