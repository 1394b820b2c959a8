//! Domain types for the todo API.
//!
//! # Design
//! `Todo` is the only persisted entity and is also its own wire format.
//! Request bodies are read as raw JSON and validated field by field into
//! `NewTodo` and `TodoPatch`, so a wrong type or an explicit `null` is
//! reported with a precise message instead of a generic deserialization
//! failure. Once constructed, `NewTodo` and `TodoPatch` only ever carry
//! trimmed, non-empty text.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;

/// A single todo item as stored and returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: i64,
    pub text: String,
    pub completed: bool,
    #[serde(with = "iso8601")]
    pub created_at: DateTime<Utc>,
}

/// Validated payload for creating a todo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTodo {
    pub text: String,
}

impl NewTodo {
    /// Validates a `POST /api/todos` body.
    ///
    /// `text` must be present, a string, and non-empty once trimmed.
    pub fn from_json(body: &Value) -> Result<Self, ApiError> {
        body.get("text")
            .and_then(Value::as_str)
            .and_then(non_empty_trimmed)
            .map(|text| Self { text })
            .ok_or_else(|| ApiError::Validation("Text is required and cannot be empty".into()))
    }
}

/// Validated set of fields for a partial update. Omitted fields stay as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoPatch {
    pub text: Option<String>,
    pub completed: Option<bool>,
}

impl TodoPatch {
    /// Validates a `PUT /api/todos/{id}` body.
    ///
    /// A field that is present must have the right type, `null` included.
    /// An empty patch is valid here; the caller decides how to report it.
    pub fn from_json(body: &Value) -> Result<Self, ApiError> {
        let text = match body.get("text") {
            None => None,
            Some(value) => Some(
                value
                    .as_str()
                    .and_then(non_empty_trimmed)
                    .ok_or_else(|| ApiError::Validation("Text cannot be empty".into()))?,
            ),
        };

        let completed = match body.get("completed") {
            None => None,
            Some(value) => Some(
                value
                    .as_bool()
                    .ok_or_else(|| ApiError::Validation("Completed must be a boolean".into()))?,
            ),
        };

        Ok(Self { text, completed })
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.completed.is_none()
    }
}

/// Parses a path segment into a todo id.
pub fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>()
        .map_err(|_| ApiError::Validation("Invalid todo ID".into()))
}

fn non_empty_trimmed(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Timestamp codec shared by the JSON form and the `createdAt` column.
///
/// Output is always UTC with millisecond precision and a `Z` suffix. Input
/// also accepts SQLite's `CURRENT_TIMESTAMP` layout (`YYYY-MM-DD HH:MM:SS`,
/// implicitly UTC) so rows written by older deployments still load.
pub mod iso8601 {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn format(ts: &DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
    }
}
