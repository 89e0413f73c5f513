// Copyright (c) 2025 - Cowboy AI, Inc.
//! Book aggregate (C3).
//!
//! `isbn` is immutable once set. Modeled as a pure `(state, version,
//! uncommittedEvents)` value: `handle`-style methods return a new logical
//! state plus one event; `apply_event` is pure and total.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::money::Money;
use crate::errors::{LibraryError, LibraryResult};
use crate::event::{DomainEvent, EventRecord};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookCreated {
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub publication_year: u32,
    pub publisher: String,
    pub price: Money,
}

/// Sparse patch: only fields present and differing from current state
/// trigger a change (see the aggregate's tie-break rule for `update`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookPatch {
    pub title: Option<String>,
    pub author: Option<String>,
    pub publication_year: Option<u32>,
    pub publisher: Option<String>,
    pub price: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookUpdated {
    pub patch: BookPatch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookDeleted {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum BookEvent {
    BookCreated(BookCreated),
    BookUpdated(BookUpdated),
    BookDeleted(BookDeleted),
}

impl DomainEvent for BookEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BookEvent::BookCreated(_) => "BookCreated",
            BookEvent::BookUpdated(_) => "BookUpdated",
            BookEvent::BookDeleted(_) => "BookDeleted",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Book {
    pub id: Uuid,
    pub version: u64,
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub publication_year: u32,
    pub publisher: String,
    pub price: Money,
    pub deleted: bool,
}

impl Book {
    /// Factory: validates and produces `BookCreated` at version 1.
    pub fn create(id: Uuid, isbn: impl Into<String>, title: impl Into<String>, author: impl Into<String>, publication_year: u32, publisher: impl Into<String>, price: Money) -> LibraryResult<(Book, BookEvent)> {
        let isbn = isbn.into();
        if isbn.trim().is_empty() {
            return Err(LibraryError::ValidationError("isbn must not be empty".to_string()));
        }
        let title = title.into();
        let author = author.into();
        let publisher = publisher.into();

        let event = BookEvent::BookCreated(BookCreated { isbn: isbn.clone(), title: title.clone(), author: author.clone(), publication_year, publisher: publisher.clone(), price });
        let book = Book { id, version: 1, isbn, title, author, publication_year, publisher, price, deleted: false };
        Ok((book, event))
    }

    /// Merge `patch` over current state. Only fields present and differing
    /// trigger a change; an empty/no-op patch fails `Conflict(NoChanges)`.
    pub fn update(&self, patch: BookPatch) -> LibraryResult<(Book, BookEvent)> {
        if self.deleted {
            return Err(LibraryError::Conflict("book already deleted".to_string()));
        }

        let mut effective = BookPatch::default();
        if let Some(title) = &patch.title {
            if *title != self.title {
                effective.title = Some(title.clone());
            }
        }
        if let Some(author) = &patch.author {
            if *author != self.author {
                effective.author = Some(author.clone());
            }
        }
        if let Some(year) = patch.publication_year {
            if year != self.publication_year {
                effective.publication_year = Some(year);
            }
        }
        if let Some(publisher) = &patch.publisher {
            if *publisher != self.publisher {
                effective.publisher = Some(publisher.clone());
            }
        }
        if let Some(price) = patch.price {
            if price != self.price {
                effective.price = Some(price);
            }
        }

        if effective == BookPatch::default() {
            return Err(LibraryError::Conflict("no changes".to_string()));
        }

        let mut next = self.clone();
        next.version += 1;
        if let Some(t) = &effective.title {
            next.title = t.clone();
        }
        if let Some(a) = &effective.author {
            next.author = a.clone();
        }
        if let Some(y) = effective.publication_year {
            next.publication_year = y;
        }
        if let Some(p) = &effective.publisher {
            next.publisher = p.clone();
        }
        if let Some(price) = effective.price {
            next.price = price;
        }

        Ok((next, BookEvent::BookUpdated(BookUpdated { patch: effective })))
    }

    pub fn delete(&self) -> LibraryResult<(Book, BookEvent)> {
        if self.deleted {
            return Err(LibraryError::Conflict("book already deleted".to_string()));
        }
        let mut next = self.clone();
        next.version += 1;
        next.deleted = true;
        Ok((next, BookEvent::BookDeleted(BookDeleted {})))
    }

    /// Pure, total state transition. Unknown event types never occur here
    /// since `BookEvent` is a closed enum; kept symmetrical with the other
    /// aggregates' `apply_event` for uniformity.
    pub fn apply_event(&self, event: &BookEvent) -> Book {
        let mut next = self.clone();
        match event {
            BookEvent::BookCreated(_) => {}
            BookEvent::BookUpdated(BookUpdated { patch }) => {
                if let Some(t) = &patch.title {
                    next.title = t.clone();
                }
                if let Some(a) = &patch.author {
                    next.author = a.clone();
                }
                if let Some(y) = patch.publication_year {
                    next.publication_year = y;
                }
                if let Some(p) = &patch.publisher {
                    next.publisher = p.clone();
                }
                if let Some(price) = patch.price {
                    next.price = price;
                }
            }
            BookEvent::BookDeleted(_) => {
                next.deleted = true;
            }
        }
        next.version += 1;
        next
    }

    /// Reconstruct state by replaying `events` in version order.
    pub fn rehydrate(id: Uuid, events: &[EventRecord<BookEvent>]) -> LibraryResult<Book> {
        let first = events.first().ok_or_else(|| LibraryError::NotFound(format!("book {id} has no events")))?;
        let BookEvent::BookCreated(created) = &first.payload else {
            return Err(LibraryError::Internal("first book event is not BookCreated".to_string()));
        };

        let mut book = Book {
            id,
            version: 1,
            isbn: created.isbn.clone(),
            title: created.title.clone(),
            author: created.author.clone(),
            publication_year: created.publication_year,
            publisher: created.publisher.clone(),
            price: created.price,
            deleted: false,
        };

        for record in &events[1..] {
            book = book.apply_event(&record.payload);
        }
        Ok(book)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn ts() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc)
    }

    fn record(book_id: Uuid, version: u64, event: BookEvent) -> EventRecord<BookEvent> {
        let mut r = EventRecord::pending(book_id, ts(), event, Uuid::now_v7(), None);
        r.version = version;
        r.global_version = version;
        r
    }

    #[test]
    fn create_produces_created_event_at_version_one() {
        let id = Uuid::now_v7();
        let (book, event) = Book::create(id, "978-3-16-148410-0", "Title", "Author", 2020, "Pub", Money::from_major_str("29.99").unwrap()).unwrap();
        assert_eq!(book.version, 1);
        assert_eq!(event.event_type(), "BookCreated");
    }

    #[test]
    fn update_with_no_differing_fields_fails_no_changes() {
        let id = Uuid::now_v7();
        let (book, _) = Book::create(id, "X", "T", "A", 2020, "P", Money::ZERO).unwrap();
        let patch = BookPatch { title: Some("T".to_string()), ..Default::default() };
        let err = book.update(patch).unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::Conflict);
    }

    #[test]
    fn update_applies_only_changed_fields() {
        let id = Uuid::now_v7();
        let (book, _) = Book::create(id, "X", "T", "A", 2020, "P", Money::ZERO).unwrap();
        let patch = BookPatch { title: Some("New Title".to_string()), ..Default::default() };
        let (next, event) = book.update(patch).unwrap();
        assert_eq!(next.title, "New Title");
        assert_eq!(next.author, "A");
        assert_eq!(next.version, 2);
        assert_eq!(event.event_type(), "BookUpdated");
    }

    #[test]
    fn delete_is_terminal() {
        let id = Uuid::now_v7();
        let (book, _) = Book::create(id, "X", "T", "A", 2020, "P", Money::ZERO).unwrap();
        let (deleted, _) = book.delete().unwrap();
        assert!(deleted.deleted);
        assert!(deleted.delete().is_err());
        assert!(deleted.update(BookPatch { title: Some("x".into()), ..Default::default() }).is_err());
    }

    #[test]
    fn rehydrate_matches_state_after_commands() {
        let id = Uuid::now_v7();
        let (book, created) = Book::create(id, "X", "T", "A", 2020, "P", Money::ZERO).unwrap();
        let (book, updated) = book.update(BookPatch { title: Some("New".into()), ..Default::default() }).unwrap();

        let events = vec![record(id, 1, created), record(id, 2, updated)];
        let rehydrated = Book::rehydrate(id, &events).unwrap();
        assert_eq!(rehydrated, book);
    }
}
