//! Daily and monthly spend ceilings for priced providers
//!
//! Costs are estimates reported by each provider. Spend lives in memory
//! and resets at UTC day and month boundaries.

use std::sync::{Mutex, PoisonError};

use chrono::{Datelike, NaiveDate, Utc};
use serde::Serialize;

/// Spend snapshot in USD
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Spend {
    pub today: f64,
    pub this_month: f64,
}

#[derive(Debug)]
struct Ledger {
    day: NaiveDate,
    today: f64,
    this_month: f64,
}

impl Ledger {
    fn roll_to(&mut self, day: NaiveDate) {
        if day == self.day {
            return;
        }
        if (day.year(), day.month()) != (self.day.year(), self.day.month()) {
            self.this_month = 0.0;
        }
        self.today = 0.0;
        self.day = day;
    }
}

/// Enforces optional spend ceilings
#[derive(Debug)]
pub struct BudgetGuard {
    daily_cap: Option<f64>,
    monthly_cap: Option<f64>,
    ledger: Mutex<Ledger>,
}

impl Default for BudgetGuard {
    fn default() -> Self {
        Self::unlimited()
    }
}

impl BudgetGuard {
    /// Guard with the given ceilings; `None` means no ceiling
    #[must_use]
    pub fn new(daily_cap: Option<f64>, monthly_cap: Option<f64>) -> Self {
        Self {
            daily_cap,
            monthly_cap,
            ledger: Mutex::new(Ledger {
                day: Utc::now().date_naive(),
                today: 0.0,
                this_month: 0.0,
            }),
        }
    }

    /// Guard that never refuses
    #[must_use]
    pub fn unlimited() -> Self {
        Self::new(None, None)
    }

    /// Reserve `cost` if it fits under both ceilings today
    ///
    /// The check and the charge happen under one lock, so concurrent
    /// callers cannot overshoot a ceiling. Hand the reservation back to
    /// [`BudgetGuard::refund`] when the call fails.
    #[must_use]
    pub fn reserve(&self, cost: f64) -> Option<Reservation> {
        self.reserve_on(cost, Utc::now().date_naive())
    }

    /// Return a reservation whose call did not go through
    pub fn refund(&self, reservation: Reservation) {
        self.refund_on(reservation, Utc::now().date_naive());
    }

    /// Current spend
    #[must_use]
    pub fn spent(&self) -> Spend {
        let mut ledger = self.ledger.lock().unwrap_or_else(PoisonError::into_inner);
        ledger.roll_to(Utc::now().date_naive());
        Spend {
            today: ledger.today,
            this_month: ledger.this_month,
        }
    }

    fn reserve_on(&self, cost: f64, day: NaiveDate) -> Option<Reservation> {
        let cost = cost.max(0.0);
        let mut ledger = self.ledger.lock().unwrap_or_else(PoisonError::into_inner);
        ledger.roll_to(day);
        if cost <= 0.0 {
            return Some(Reservation { cost, day });
        }

        let under = |cap: Option<f64>, spent: f64| cap.is_none_or(|cap| spent + cost <= cap);
        if !(under(self.daily_cap, ledger.today) && under(self.monthly_cap, ledger.this_month)) {
            return None;
        }
        ledger.today += cost;
        ledger.this_month += cost;
        Some(Reservation { cost, day })
    }

    fn refund_on(&self, reservation: Reservation, day: NaiveDate) {
        if reservation.cost <= 0.0 {
            return;
        }
        let mut ledger = self.ledger.lock().unwrap_or_else(PoisonError::into_inner);
        ledger.roll_to(day);
        // Totals already rolled over hold nothing of this reservation
        if ledger.day == reservation.day {
            ledger.today = (ledger.today - reservation.cost).max(0.0);
        }
        let month = |d: NaiveDate| (d.year(), d.month());
        if month(ledger.day) == month(reservation.day) {
            ledger.this_month = (ledger.this_month - reservation.cost).max(0.0);
        }
    }
}

/// Spend held for one provider call
#[derive(Debug, Clone, Copy, PartialEq)]
#[must_use]
pub struct Reservation {
    cost: f64,
    day: NaiveDate,
}
