// Copyright (c) 2025 - Cowboy AI, Inc.

//! Event-sourced, CQRS core for a library-management system.
//!
//! Three bounded contexts — Books, Wallets, Reservations — share one set of
//! generic infrastructure components:
//!
//! - [`event`] — canonical event record and codec (C1)
//! - [`event_store`] — append-only store with optimistic concurrency (C2)
//! - [`domain`] — aggregate roots: `Book`, `Wallet`, `Reservation` (C3)
//! - [`bus`] — pub/sub event bus (C4)
//! - [`projection`] — versioned, soft-deleting read-model store and handlers (C5/C6)
//! - [`command`] — command handlers, including the reservation saga (C7/C8)
//! - [`cache`] — best-effort cache port (C9)
//! - [`errors`] — the shared error taxonomy (C10)
//! - [`nats`] / [`jetstream`] / [`subjects`] — NATS transport (C11)
//! - [`config`] — environment-driven configuration (C13)
//! - [`versioning`] — event schema upcasting
//!
//! # Quick start
//!
//! ```rust,no_run
//! use cim_library_core::event_store::InMemoryEventStore;
//! use cim_library_core::domain::{Book, BookEvent, Money};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store: InMemoryEventStore<BookEvent> = InMemoryEventStore::new();
//!     let (_, event) = Book::create(
//!         uuid::Uuid::now_v7(), "978-0-13-468599-1", "Title", "Author",
//!         2020, "Publisher", Money::from_major_str("29.99").unwrap(),
//!     ).unwrap();
//!     let _ = (store, event);
//! }
//! ```

pub mod bus;
pub mod cache;
pub mod command;
pub mod config;
pub mod domain;
pub mod errors;
pub mod event;
pub mod event_store;
pub mod jetstream;
pub mod nats;
pub mod projection;
pub mod subjects;
pub mod versioning;

pub use cache::{CachePort, InMemoryCache};
pub use config::Config;
pub use errors::{ErrorKind, LibraryError, LibraryResult};
pub use event::{DomainEvent, EventMetadata, EventRecord};
pub use event_store::{EventStore, InMemoryEventStore, NatsEventStore};
pub use jetstream::{AckPolicy, ConsumerConfig, DeliverPolicy, JetStreamConfig, RetentionPolicy, StorageType};
pub use nats::{MessageHandler, NatsClient, NatsConfig};
pub use subjects::{BoundedContext, SubjectBuilder};

/// Crate version, exposed for diagnostics and `checkHealth` responses.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
