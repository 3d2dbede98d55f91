// SPDX-License-Identifier: MIT OR Apache-2.0
//! JSON fixtures: a whole dataset in one document.

use fg_core::{Category, Event, Invitation, Post, Record, User, UserId};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Errors raised while loading a fixture file.
#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    /// The file could not be read.
    #[error("read fixture '{path}': {source}")]
    Io {
        /// Path that was requested.
        path: String,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// The file is not a valid fixture document.
    #[error("parse fixture: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A complete dataset, as loaded from a JSON document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Fixture {
    /// Registered users.
    #[serde(default)]
    pub users: Vec<User>,
    /// Categories.
    #[serde(default)]
    pub categories: Vec<Category>,
    /// Events.
    #[serde(default)]
    pub events: Vec<Event>,
    /// Invitations.
    #[serde(default)]
    pub invitations: Vec<Invitation>,
    /// Posts.
    #[serde(default)]
    pub posts: Vec<Post>,
}

impl Fixture {
    /// Read and parse a fixture file.
    pub fn load(path: &Path) -> Result<Self, FixtureError> {
        let content = std::fs::read_to_string(path).map_err(|source| FixtureError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Parse a fixture from a JSON string.
    pub fn from_json(content: &str) -> Result<Self, FixtureError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Look a user up by id.
    pub fn user(&self, id: UserId) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    /// Every record whose schema type is `type_name`.
    pub fn records_of(&self, type_name: &str) -> Vec<Record> {
        match type_name {
            "User" => self.users.iter().cloned().map(Record::from).collect(),
            "Category" => self.categories.iter().cloned().map(Record::from).collect(),
            "Event" => self.events.iter().cloned().map(Record::from).collect(),
            "Invitation" => self.invitations.iter().cloned().map(Record::from).collect(),
            "Post" => self.posts.iter().cloned().map(Record::from).collect(),
            _ => Vec::new(),
        }
    }

    /// Find a record by schema type and raw id string.
    pub fn find(&self, type_name: &str, id: &str) -> Option<Record> {
        self.records_of(type_name)
            .into_iter()
            .find(|r| r.id().to_string() == id)
    }

    /// Total number of records.
    pub fn len(&self) -> usize {
        self.users.len()
            + self.categories.len()
            + self.events.len()
            + self.invitations.len()
            + self.posts.len()
    }

    /// Whether the fixture holds no records at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
