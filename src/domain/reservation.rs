// Copyright (c) 2025 - Cowboy AI, Inc.
//! Reservation aggregate and its saga state machine (C8, §4.8).
//!
//! The aggregate itself only records the Reservation side of the saga;
//! cross-context orchestration (publishing `BookValidationRequested`,
//! reacting to `WalletPaymentSuccess`, etc.) lives in
//! [`crate::command::reservation`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::money::Money;
use crate::errors::{LibraryError, LibraryResult};
use crate::event::{DomainEvent, EventRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationStatus {
    Validating,
    PendingPayment,
    Reserved,
    Returned,
    Brought,
    Rejected,
    Cancelled,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationCreated {
    pub user_id: String,
    pub book_id: Uuid,
    pub due_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationRetailPriceSet {
    pub retail_price: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationPendingPayment {
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationConfirmed {
    pub payment_ref: Uuid,
    pub method: String,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationRejected {
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationReturned {
    pub days_late: i64,
    pub retail_price: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationBookBrought {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationCancelled {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationDeleted {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum ReservationEvent {
    ReservationCreated(ReservationCreated),
    ReservationRetailPriceSet(ReservationRetailPriceSet),
    ReservationPendingPayment(ReservationPendingPayment),
    ReservationConfirmed(ReservationConfirmed),
    ReservationRejected(ReservationRejected),
    ReservationReturned(ReservationReturned),
    ReservationBookBrought(ReservationBookBrought),
    ReservationCancelled(ReservationCancelled),
    ReservationDeleted(ReservationDeleted),
}

impl DomainEvent for ReservationEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ReservationEvent::ReservationCreated(_) => "ReservationCreated",
            ReservationEvent::ReservationRetailPriceSet(_) => "ReservationRetailPriceSet",
            ReservationEvent::ReservationPendingPayment(_) => "ReservationPendingPayment",
            ReservationEvent::ReservationConfirmed(_) => "ReservationConfirmed",
            ReservationEvent::ReservationRejected(_) => "ReservationRejected",
            ReservationEvent::ReservationReturned(_) => "ReservationReturned",
            ReservationEvent::ReservationBookBrought(_) => "ReservationBookBrought",
            ReservationEvent::ReservationCancelled(_) => "ReservationCancelled",
            ReservationEvent::ReservationDeleted(_) => "ReservationDeleted",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reservation {
    pub id: Uuid,
    pub version: u64,
    pub user_id: String,
    pub book_id: Uuid,
    pub due_date: DateTime<Utc>,
    pub status: ReservationStatus,
    pub retail_price: Option<Money>,
    pub fee_charged: Option<Money>,
    pub rejection_reason: Option<String>,
}

impl Reservation {
    pub fn create(id: Uuid, user_id: impl Into<String>, book_id: Uuid, due_date: DateTime<Utc>) -> (Reservation, ReservationEvent) {
        let user_id = user_id.into();
        let event = ReservationEvent::ReservationCreated(ReservationCreated { user_id: user_id.clone(), book_id, due_date });
        let reservation = Reservation { id, version: 1, user_id, book_id, due_date, status: ReservationStatus::Validating, retail_price: None, fee_charged: None, rejection_reason: None };
        (reservation, event)
    }

    fn require_status(&self, expected: ReservationStatus) -> LibraryResult<()> {
        if self.status != expected {
            return Err(LibraryError::Conflict(format!("reservation {} is in {:?}, expected {:?}", self.id, self.status, expected)));
        }
        Ok(())
    }

    pub fn set_retail_price(&self, retail_price: Money) -> LibraryResult<(Reservation, ReservationEvent)> {
        self.require_status(ReservationStatus::Validating)?;
        let mut next = self.clone();
        next.version += 1;
        next.retail_price = Some(retail_price);
        Ok((next, ReservationEvent::ReservationRetailPriceSet(ReservationRetailPriceSet { retail_price })))
    }

    pub fn request_payment(&self, amount: Money) -> LibraryResult<(Reservation, ReservationEvent)> {
        self.require_status(ReservationStatus::Validating)?;
        let mut next = self.clone();
        next.version += 1;
        next.status = ReservationStatus::PendingPayment;
        next.fee_charged = Some(amount);
        Ok((next, ReservationEvent::ReservationPendingPayment(ReservationPendingPayment { amount })))
    }

    pub fn confirm(&self, payment_ref: Uuid, method: impl Into<String>, amount: Money) -> LibraryResult<(Reservation, ReservationEvent)> {
        self.require_status(ReservationStatus::PendingPayment)?;
        let mut next = self.clone();
        next.version += 1;
        next.status = ReservationStatus::Reserved;
        Ok((next, ReservationEvent::ReservationConfirmed(ReservationConfirmed { payment_ref, method: method.into(), amount })))
    }

    /// Rejects from `Validating` (book invalid / reservation limit) or
    /// `PendingPayment` (wallet declined).
    pub fn reject(&self, reason: impl Into<String>) -> LibraryResult<(Reservation, ReservationEvent)> {
        if self.status != ReservationStatus::Validating && self.status != ReservationStatus::PendingPayment {
            return Err(LibraryError::Conflict(format!("reservation {} cannot be rejected from {:?}", self.id, self.status)));
        }
        let reason = reason.into();
        let mut next = self.clone();
        next.version += 1;
        next.status = ReservationStatus::Rejected;
        next.rejection_reason = Some(reason.clone());
        Ok((next, ReservationEvent::ReservationRejected(ReservationRejected { reason })))
    }

    /// `daysLate = max(0, floor((now - dueDate) / 1 day))`.
    pub fn return_book(&self, now: DateTime<Utc>) -> LibraryResult<(Reservation, ReservationEvent)> {
        self.require_status(ReservationStatus::Reserved)?;
        let retail_price = self.retail_price.ok_or_else(|| LibraryError::Internal("reserved reservation missing retail_price".to_string()))?;
        let days_late = ((now - self.due_date).num_days()).max(0);

        let mut next = self.clone();
        next.version += 1;
        next.status = ReservationStatus::Returned;
        Ok((next, ReservationEvent::ReservationReturned(ReservationReturned { days_late, retail_price })))
    }

    /// Driven by the wallet's `WalletLateFeeApplied(bookPurchased=true)`.
    pub fn book_brought(&self) -> LibraryResult<(Reservation, ReservationEvent)> {
        self.require_status(ReservationStatus::Returned)?;
        let mut next = self.clone();
        next.version += 1;
        next.status = ReservationStatus::Brought;
        Ok((next, ReservationEvent::ReservationBookBrought(ReservationBookBrought {})))
    }

    pub fn cancel(&self) -> LibraryResult<(Reservation, ReservationEvent)> {
        if matches!(self.status, ReservationStatus::Rejected | ReservationStatus::Cancelled | ReservationStatus::Deleted | ReservationStatus::Returned | ReservationStatus::Brought) {
            return Err(LibraryError::Conflict(format!("reservation {} cannot be cancelled from {:?}", self.id, self.status)));
        }
        let mut next = self.clone();
        next.version += 1;
        next.status = ReservationStatus::Cancelled;
        Ok((next, ReservationEvent::ReservationCancelled(ReservationCancelled {})))
    }

    pub fn delete(&self) -> LibraryResult<(Reservation, ReservationEvent)> {
        if self.status == ReservationStatus::Deleted {
            return Err(LibraryError::Conflict("reservation already deleted".to_string()));
        }
        let mut next = self.clone();
        next.version += 1;
        next.status = ReservationStatus::Deleted;
        Ok((next, ReservationEvent::ReservationDeleted(ReservationDeleted {})))
    }

    pub fn apply_event(&self, event: &ReservationEvent) -> Reservation {
        let mut next = self.clone();
        match event {
            ReservationEvent::ReservationCreated(_) => {}
            ReservationEvent::ReservationRetailPriceSet(e) => next.retail_price = Some(e.retail_price),
            ReservationEvent::ReservationPendingPayment(e) => {
                next.status = ReservationStatus::PendingPayment;
                next.fee_charged = Some(e.amount);
            }
            ReservationEvent::ReservationConfirmed(_) => next.status = ReservationStatus::Reserved,
            ReservationEvent::ReservationRejected(e) => {
                next.status = ReservationStatus::Rejected;
                next.rejection_reason = Some(e.reason.clone());
            }
            ReservationEvent::ReservationReturned(_) => {
                next.status = ReservationStatus::Returned;
            }
            ReservationEvent::ReservationBookBrought(_) => next.status = ReservationStatus::Brought,
            ReservationEvent::ReservationCancelled(_) => next.status = ReservationStatus::Cancelled,
            ReservationEvent::ReservationDeleted(_) => next.status = ReservationStatus::Deleted,
        }
        next.version += 1;
        next
    }

    pub fn rehydrate(id: Uuid, events: &[EventRecord<ReservationEvent>]) -> LibraryResult<Reservation> {
        let first = events.first().ok_or_else(|| LibraryError::NotFound(format!("reservation {id} has no events")))?;
        let ReservationEvent::ReservationCreated(created) = &first.payload else {
            return Err(LibraryError::Internal("first reservation event is not ReservationCreated".to_string()));
        };

        let mut reservation = Reservation {
            id,
            version: 1,
            user_id: created.user_id.clone(),
            book_id: created.book_id,
            due_date: created.due_date,
            status: ReservationStatus::Validating,
            retail_price: None,
            fee_charged: None,
            rejection_reason: None,
        };
        for record in &events[1..] {
            reservation = reservation.apply_event(&record.payload);
        }
        Ok(reservation)
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, ReservationStatus::Validating | ReservationStatus::PendingPayment | ReservationStatus::Reserved)
    }
}
