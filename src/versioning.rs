// Copyright (c) 2025 - Cowboy AI, Inc.
//! Event schema versioning infrastructure.
//!
//! Provides upcasting support for event schema evolution. When a payload
//! shape changes, an [`Upcaster`] transforms an older recorded shape to the
//! version the running binary expects before it reaches `applyEvent` or a
//! projection handler.
//!
//! # Design
//!
//! 1. Upcasting happens on read, between deserialization and domain logic.
//! 2. Domain logic only ever sees the latest payload shape.
//! 3. Multiple migrations compose into a chain (v1 -> v2 -> v3 ...).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::LibraryError;

/// Error type for upcasting operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpcastError {
    UnsupportedVersion { from: u32, to: u32, found: u32 },
    TransformationFailed(String),
    DeserializationFailed(String),
    MissingField(String),
    InvalidFieldValue { field: String, reason: String },
}

impl fmt::Display for UpcastError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpcastError::UnsupportedVersion { from, to, found } => {
                write!(f, "upcaster expects version {from}, got version {found}. Can only upcast to version {to}")
            }
            UpcastError::TransformationFailed(msg) => write!(f, "event transformation failed: {msg}"),
            UpcastError::DeserializationFailed(msg) => write!(f, "deserialization after upcast failed: {msg}"),
            UpcastError::MissingField(field) => write!(f, "required field '{field}' missing in old event version"),
            UpcastError::InvalidFieldValue { field, reason } => write!(f, "invalid value in field '{field}': {reason}"),
        }
    }
}

impl std::error::Error for UpcastError {}

impl From<UpcastError> for LibraryError {
    fn from(err: UpcastError) -> Self {
        LibraryError::Internal(format!("event upcast failed: {err}"))
    }
}

/// Transform event JSON from one schema version to the next.
pub trait Upcaster<T>: Send + Sync {
    #[allow(clippy::wrong_self_convention)] // paired getter with to_version, not a constructor
    fn from_version(&self) -> u32;
    fn to_version(&self) -> u32;
    fn upcast(&self, value: serde_json::Value) -> Result<serde_json::Value, UpcastError>;

    /// Optional post-transform invariant check.
    fn validate(&self, _value: &serde_json::Value) -> Result<(), UpcastError> {
        Ok(())
    }
}

/// Chain of upcasters that migrates an event through multiple schema versions.
pub struct UpcasterChain<T> {
    upcasters: Vec<Box<dyn Upcaster<T>>>,
}

impl<T> UpcasterChain<T> {
    pub fn new() -> Self {
        Self { upcasters: Vec::new() }
    }

    /// Add an upcaster; upcasters should be added in version order.
    pub fn add<U: Upcaster<T> + 'static>(&mut self, upcaster: U) {
        self.upcasters.push(Box::new(upcaster));
    }

    pub fn latest_version(&self) -> Option<u32> {
        self.upcasters.last().map(|u| u.to_version())
    }

    /// Upcast to the latest version this chain knows about.
    pub fn upcast_to_latest(&self, mut value: serde_json::Value, current_version: u32) -> Result<serde_json::Value, UpcastError> {
        let mut version = current_version;
        for upcaster in &self.upcasters {
            if version == upcaster.from_version() {
                value = upcaster.upcast(value)?;
                upcaster.validate(&value)?;
                version = upcaster.to_version();
            }
        }
        Ok(value)
    }

    /// Upcast to a specific intermediate version.
    pub fn upcast_to_version(
        &self,
        mut value: serde_json::Value,
        current_version: u32,
        target_version: u32,
    ) -> Result<serde_json::Value, UpcastError> {
        if current_version == target_version {
            return Ok(value);
        }
        if current_version > target_version {
            return Err(UpcastError::UnsupportedVersion { from: current_version, to: target_version, found: current_version });
        }

        let mut version = current_version;
        for upcaster in &self.upcasters {
            if version == upcaster.from_version() && version < target_version {
                value = upcaster.upcast(value)?;
                upcaster.validate(&value)?;
                version = upcaster.to_version();
                if version == target_version {
                    break;
                }
            }
        }

        if version != target_version {
            return Err(UpcastError::UnsupportedVersion { from: current_version, to: target_version, found: version });
        }
        Ok(value)
    }
}

impl<T> Default for UpcasterChain<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Read `schemaVersion` out of a raw event-record JSON payload.
pub fn get_schema_version(value: &serde_json::Value) -> Result<u32, UpcastError> {
    value
        .get("schema_version")
        .and_then(|v| v.as_u64())
        .map(|v| v as u32)
        .ok_or_else(|| UpcastError::MissingField("schema_version".to_string()))
}

/// Stamp `schemaVersion` onto a raw event-record JSON payload.
pub fn set_schema_version(value: &mut serde_json::Value, version: u32) -> Result<(), UpcastError> {
    value
        .as_object_mut()
        .map(|obj| {
            obj.insert("schema_version".to_string(), serde_json::json!(version));
        })
        .ok_or_else(|| UpcastError::TransformationFailed("event is not a JSON object".to_string()))
}

/// Documentation record for a single schema version of an event type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventVersionInfo {
    pub event_type: String,
    pub version: u32,
    pub introduced_at: String,
    pub changes: Vec<String>,
    pub deprecated: bool,
}

impl EventVersionInfo {
    pub fn new(event_type: impl Into<String>, version: u32) -> Self {
        Self { event_type: event_type.into(), version, introduced_at: String::new(), changes: Vec::new(), deprecated: false }
    }

    pub fn introduced_at(mut self, date: impl Into<String>) -> Self {
        self.introduced_at = date.into();
        self
    }

    pub fn with_change(mut self, change: impl Into<String>) -> Self {
        self.changes.push(change.into());
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }
}
