// SPDX-License-Identifier: MIT OR Apache-2.0
//! The argument bag of a field or operation call.
//!
//! Arguments arrive from the execution engine as a JSON object. A reference
//! to a record is either an id string (`{"event": "<uuid>"}`) or an input
//! object carrying `_id` (`{"event": {"_id": "<uuid>", "private": true}}`);
//! [`Args::id`] accepts both shapes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Arguments passed to a field or operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Args(Map<String, Value>);

impl Args {
    /// An empty argument bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: insert an argument.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Build from a JSON value; anything but an object yields `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            Value::Null => Some(Self::new()),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Id referenced by `key`, either directly or through an input object's
    /// `_id`. Malformed ids yield `None`.
    pub fn id<T: From<Uuid>>(&self, key: &str) -> Option<T> {
        match self.0.get(key)? {
            Value::String(s) => parse_uuid(s),
            Value::Object(obj) => obj.get("_id").and_then(Value::as_str).and_then(parse_uuid),
            _ => None,
        }
    }

    /// Id stored in a field of the input object under `key`
    /// (e.g. `post.postedAt`).
    pub fn nested_id<T: From<Uuid>>(&self, key: &str, field: &str) -> Option<T> {
        self.object(key)?
            .get(field)
            .and_then(Value::as_str)
            .and_then(parse_uuid)
    }

    /// The input object under `key`, if the argument is an object.
    pub fn object(&self, key: &str) -> Option<&Map<String, Value>> {
        self.0.get(key).and_then(Value::as_object)
    }

    /// Boolean field of the input object under `key`.
    pub fn flag(&self, key: &str, field: &str) -> Option<bool> {
        self.object(key)?.get(field).and_then(Value::as_bool)
    }

    /// Whether the input object under `key` has a non-null `field`.
    pub fn has_field(&self, key: &str, field: &str) -> bool {
        self.object(key)
            .and_then(|o| o.get(field))
            .is_some_and(|v| !v.is_null())
    }
}

fn parse_uuid<T: From<Uuid>>(s: &str) -> Option<T> {
    Uuid::parse_str(s).ok().map(T::from)
}

impl From<Map<String, Value>> for Args {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
