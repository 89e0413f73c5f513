// Copyright (c) 2025 - Cowboy AI, Inc.
//! Domain aggregates (C3): Book, Wallet, Reservation.
//!
//! Each aggregate is a pure `(state, version, uncommittedEvents)` value.
//! `create`/mutation methods return `(NextState, Event)` or a typed error;
//! `apply_event` is pure and total and drives [`Self::rehydrate`].

pub mod book;
pub mod money;
pub mod reservation;
pub mod wallet;

pub use book::{Book, BookEvent, BookPatch};
pub use money::Money;
pub use reservation::{Reservation, ReservationEvent, ReservationStatus};
pub use wallet::{Wallet, WalletEvent};
