use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::row::Row;

/// Statement metrics computed by the backend. The shape is owned by the
/// server; an empty object means there is nothing to show yet.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Summary(pub Map<String, Value>);

impl Summary {
    /// Anything that is not a JSON object counts as "no data".
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

/// Normalized (0..1) rectangle of a row on the page image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowBounds {
    pub row_id: String,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

/// Everything fetched once a job completes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JobResults {
    /// Cleaned page file names, in page order.
    pub pages: Vec<String>,
    pub summary: Summary,
}

/// Server answer to a page save.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SavedRows {
    pub rows: Vec<Row>,
    pub summary: Option<Summary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    /// Session missing or expired.
    Unauthorized,
    /// The resource no longer exists server-side.
    NotFound,
    /// Anything else: network, timeout, 5xx, undecodable body.
    Transient,
}

/// Failure of a backend call as the state machine sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Transient, message)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.kind == RemoteErrorKind::Unauthorized
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
