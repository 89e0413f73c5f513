// Copyright (c) 2025 - Cowboy AI, Inc.

//! NATS subject hierarchy for library-management events.
//!
//! All events follow the hierarchical pattern:
//!
//! ```text
//! library.{context}.{aggregate_id}.{event_type}
//! ```
//!
//! This allows for:
//! - Precise subscriptions (`library.book.<id>.BookCreated`)
//! - Per-aggregate wildcards (`library.book.<id>.>`)
//! - Per-context wildcards (`library.book.>`)
//! - Global subscriptions (`library.>`)
//!
//! # Examples
//!
//! ```rust
//! use cim_library_core::subjects::{SubjectBuilder, BoundedContext};
//!
//! let subject = SubjectBuilder::new()
//!     .context(BoundedContext::Book)
//!     .event_type("BookCreated")
//!     .build();
//! assert_eq!(subject, "library.book.BookCreated");
//! ```

use std::fmt;
use uuid::Uuid;

/// Root namespace for all library subjects.
pub const LIBRARY_ROOT: &str = "library";

/// Bounded contexts that own an event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoundedContext {
    Book,
    Wallet,
    Reservation,
}

impl fmt::Display for BoundedContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundedContext::Book => write!(f, "book"),
            BoundedContext::Wallet => write!(f, "wallet"),
            BoundedContext::Reservation => write!(f, "reservation"),
        }
    }
}

/// Builder for library NATS subjects.
#[derive(Debug, Clone, Default)]
pub struct SubjectBuilder {
    context: Option<BoundedContext>,
    aggregate_id: Option<Uuid>,
    event_type: Option<String>,
}

impl SubjectBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn context(mut self, context: BoundedContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn aggregate_id(mut self, id: Uuid) -> Self {
        self.aggregate_id = Some(id);
        self
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Build the fully-qualified publish subject: `library.{context}.{event_type}`.
    ///
    /// Routing is by `event_type` (the bus wire contract keys on `eventType`);
    /// `aggregate_id`, if set, is appended for stream-side partitioning only.
    ///
    /// # Panics
    ///
    /// Panics if `context` or `event_type` is not set.
    pub fn build(self) -> String {
        let context = self.context.expect("context must be set");
        let event_type = self.event_type.expect("event_type must be set");
        match self.aggregate_id {
            Some(id) => format!("{LIBRARY_ROOT}.{context}.{id}.{event_type}"),
            None => format!("{LIBRARY_ROOT}.{context}.{event_type}"),
        }
    }

    /// Wildcard subscription for every event type on a given aggregate.
    ///
    /// # Panics
    ///
    /// Panics if `context` or `aggregate_id` is not set.
    pub fn build_aggregate_wildcard(self) -> String {
        let context = self.context.expect("context must be set");
        let aggregate_id = self.aggregate_id.expect("aggregate_id must be set");
        format!("{LIBRARY_ROOT}.{context}.{aggregate_id}.>")
    }

    /// Wildcard subscription for every event in a bounded context.
    ///
    /// # Panics
    ///
    /// Panics if `context` is not set.
    pub fn build_context_wildcard(self) -> String {
        let context = self.context.expect("context must be set");
        format!("{LIBRARY_ROOT}.{context}.>")
    }

    /// Wildcard subscription for every event in the system.
    pub fn build_all() -> String {
        format!("{LIBRARY_ROOT}.>")
    }
}
