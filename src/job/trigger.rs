// src/job/trigger.rs

use serde::{Deserialize, Serialize};

/// A content URI observed by a [`Trigger::ContentChange`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObservedUri {
    pub uri: String,
    /// Also fire when a descendant of `uri` changes.
    #[serde(default)]
    pub notify_for_descendants: bool,
}

impl ObservedUri {
    pub fn new(uri: impl Into<String>, notify_for_descendants: bool) -> Self {
        Self {
            uri: uri.into(),
            notify_for_descendants,
        }
    }
}

/// When a job becomes eligible to run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    /// Run as soon as the constraints allow.
    Now,
    /// Run somewhere between `start` and `end` seconds from scheduling.
    ExecutionWindow { start: i64, end: i64 },
    /// Run when one of the observed URIs changes.
    ContentChange { uris: Vec<ObservedUri> },
}

impl Trigger {
    pub fn execution_window(start: i64, end: i64) -> Self {
        Trigger::ExecutionWindow { start, end }
    }

    pub fn content_change(uris: Vec<ObservedUri>) -> Self {
        Trigger::ContentChange { uris }
    }

    /// Wire code of the trigger type.
    pub fn type_code(&self) -> i64 {
        match self {
            Trigger::Now => 2,
            Trigger::ExecutionWindow { .. } => 1,
            Trigger::ContentChange { .. } => 3,
        }
    }
}
