// Copyright (c) 2025 - Cowboy AI, Inc.
//! Wallet aggregate (C3).
//!
//! Balance is an integer minor-unit [`Money`] value (§4.10). `attempt_payment`
//! and `apply_late_fee` are infallible domain outcomes — insufficient funds or
//! a fee crossing the retail price are results, not errors.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::money::Money;
use crate::errors::{LibraryError, LibraryResult};
use crate::event::{DomainEvent, EventRecord};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletCreated {
    pub user_id: String,
    pub initial_balance: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletBalanceUpdated {
    pub delta: Money,
    pub new_balance: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletLateFeeApplied {
    pub reservation_id: Uuid,
    pub days_late: i64,
    pub retail_price: Money,
    pub fee_per_day: Money,
    pub fee: Money,
    pub book_purchased: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletPaymentSuccess {
    pub reservation_id: Uuid,
    pub payment_ref: Uuid,
    pub method: String,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletPaymentDeclined {
    pub reservation_id: Uuid,
    pub reason: String,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum WalletEvent {
    WalletCreated(WalletCreated),
    WalletBalanceUpdated(WalletBalanceUpdated),
    WalletLateFeeApplied(WalletLateFeeApplied),
    WalletPaymentSuccess(WalletPaymentSuccess),
    WalletPaymentDeclined(WalletPaymentDeclined),
}

impl DomainEvent for WalletEvent {
    fn event_type(&self) -> &'static str {
        match self {
            WalletEvent::WalletCreated(_) => "WalletCreated",
            WalletEvent::WalletBalanceUpdated(_) => "WalletBalanceUpdated",
            WalletEvent::WalletLateFeeApplied(_) => "WalletLateFeeApplied",
            WalletEvent::WalletPaymentSuccess(_) => "WalletPaymentSuccess",
            WalletEvent::WalletPaymentDeclined(_) => "WalletPaymentDeclined",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Wallet {
    pub id: Uuid,
    pub version: u64,
    pub user_id: String,
    pub balance: Money,
    pub deleted: bool,
}

impl Wallet {
    pub fn create(id: Uuid, user_id: impl Into<String>, initial_balance: Money) -> (Wallet, WalletEvent) {
        let user_id = user_id.into();
        let event = WalletEvent::WalletCreated(WalletCreated { user_id: user_id.clone(), initial_balance });
        (Wallet { id, version: 1, user_id, balance: initial_balance, deleted: false }, event)
    }

    /// Unconditional balance adjustment; `delta` may be negative.
    pub fn update_balance(&self, delta: Money) -> LibraryResult<(Wallet, WalletEvent)> {
        if self.deleted {
            return Err(LibraryError::Conflict("wallet already deleted".to_string()));
        }
        let new_balance = self.balance + delta;
        let mut next = self.clone();
        next.version += 1;
        next.balance = new_balance;
        Ok((next, WalletEvent::WalletBalanceUpdated(WalletBalanceUpdated { delta, new_balance })))
    }

    /// Attempt to debit `amount`. Declining is a domain outcome, not an
    /// error: the event is still appended and the balance is untouched.
    ///
    /// `reservation_id` is carried on the event itself (not just bus
    /// metadata) so the reservation saga can route the outcome back to the
    /// reservation that requested payment without a correlation table.
    pub fn attempt_payment(&self, reservation_id: Uuid, amount: Money, payment_ref: Uuid, method: impl Into<String>) -> LibraryResult<(Wallet, WalletEvent)> {
        if self.deleted {
            return Err(LibraryError::Conflict("wallet already deleted".to_string()));
        }
        let mut next = self.clone();
        next.version += 1;
        if self.balance >= amount {
            next.balance = self.balance - amount;
            Ok((next, WalletEvent::WalletPaymentSuccess(WalletPaymentSuccess { reservation_id, payment_ref, method: method.into(), amount })))
        } else {
            Ok((next, WalletEvent::WalletPaymentDeclined(WalletPaymentDeclined { reservation_id, reason: "insufficient funds".to_string(), amount })))
        }
    }

    /// `fee = daysLate * feePerDay`; `bookPurchased = fee >= retailPrice` (§4.10).
    /// The fee is debited from the balance (may go negative, matching S3).
    pub fn apply_late_fee(&self, reservation_id: Uuid, days_late: i64, retail_price: Money, fee_per_day: Money) -> LibraryResult<(Wallet, WalletEvent)> {
        if self.deleted {
            return Err(LibraryError::Conflict("wallet already deleted".to_string()));
        }
        let fee = Money::from_minor_units(days_late * fee_per_day.minor_units());
        let book_purchased = fee.minor_units() >= retail_price.minor_units();
        let mut next = self.clone();
        next.version += 1;
        next.balance = self.balance - fee;
        Ok((next, WalletEvent::WalletLateFeeApplied(WalletLateFeeApplied { reservation_id, days_late, retail_price, fee_per_day, fee, book_purchased })))
    }

    pub fn apply_event(&self, event: &WalletEvent) -> Wallet {
        let mut next = self.clone();
        match event {
            WalletEvent::WalletCreated(_) => {}
            WalletEvent::WalletBalanceUpdated(WalletBalanceUpdated { new_balance, .. }) => {
                next.balance = *new_balance;
            }
            WalletEvent::WalletLateFeeApplied(WalletLateFeeApplied { fee, .. }) => {
                next.balance = next.balance - *fee;
            }
            WalletEvent::WalletPaymentSuccess(WalletPaymentSuccess { amount, .. }) => {
                next.balance = next.balance - *amount;
            }
            WalletEvent::WalletPaymentDeclined(_) => {}
        }
        next.version += 1;
        next
    }

    pub fn rehydrate(id: Uuid, events: &[EventRecord<WalletEvent>]) -> LibraryResult<Wallet> {
        let first = events.first().ok_or_else(|| LibraryError::NotFound(format!("wallet {id} has no events")))?;
        let WalletEvent::WalletCreated(created) = &first.payload else {
            return Err(LibraryError::Internal("first wallet event is not WalletCreated".to_string()));
        };

        let mut wallet = Wallet { id, version: 1, user_id: created.user_id.clone(), balance: created.initial_balance, deleted: false };
        for record in &events[1..] {
            wallet = wallet.apply_event(&record.payload);
        }
        Ok(wallet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_sets_initial_balance() {
        let (wallet, _) = Wallet::create(Uuid::now_v7(), "U1", Money::from_major_str("50.00").unwrap());
        assert_eq!(wallet.balance.minor_units(), 5000);
    }

    #[test]
    fn attempt_payment_succeeds_when_funds_sufficient() {
        let (wallet, _) = Wallet::create(Uuid::now_v7(), "U1", Money::from_major_str("50.00").unwrap());
        let (next, event) = wallet.attempt_payment(Uuid::now_v7(), Money::from_major_str("3.00").unwrap(), Uuid::now_v7(), "internal").unwrap();
        assert_eq!(next.balance.minor_units(), 4700);
        assert!(matches!(event, WalletEvent::WalletPaymentSuccess(_)));
    }

    #[test]
    fn attempt_payment_declines_when_funds_insufficient() {
        let (wallet, _) = Wallet::create(Uuid::now_v7(), "U1", Money::from_major_str("2.00").unwrap());
        let (next, event) = wallet.attempt_payment(Uuid::now_v7(), Money::from_major_str("3.00").unwrap(), Uuid::now_v7(), "internal").unwrap();
        assert_eq!(next.balance, wallet.balance);
        assert!(matches!(event, WalletEvent::WalletPaymentDeclined(_)));
    }

    #[test]
    fn late_fee_matches_scenario_s3() {
        let (wallet, _) = Wallet::create(Uuid::now_v7(), "U1", Money::from_major_str("15.00").unwrap());
        let fee_per_day = Money::from_minor_units(20);
        let (next, event) = wallet.apply_late_fee(Uuid::now_v7(), 60, Money::from_major_str("10.00").unwrap(), fee_per_day).unwrap();
        assert_eq!(next.balance.minor_units(), 300);
        let WalletEvent::WalletLateFeeApplied(applied) = event else { panic!("wrong event") };
        assert!(applied.book_purchased);
    }
}
