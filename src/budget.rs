// src/budget.rs
//! News-API call budget: one token per feed call, reset once a day.
//!
//! The counter is owned by this struct and shared via `Arc`; the only
//! mutation paths are [`TokenBudget::try_consume`] (atomic check-and-decrement)
//! and [`TokenBudget::reset_daily`].

use std::sync::atomic::{AtomicU32, Ordering};

use metrics::gauge;
use tracing::{debug, info};

use crate::error::{Error, Result};

#[derive(Debug)]
pub struct TokenBudget {
    remaining: AtomicU32,
    daily_limit: u32,
    items_per_token: u32,
}

impl TokenBudget {
    /// Starts full. `items_per_token` below 1 is treated as 1.
    pub fn new(daily_limit: u32, items_per_token: u32) -> Self {
        gauge!("news_budget_remaining").set(daily_limit as f64);
        Self {
            remaining: AtomicU32::new(daily_limit),
            daily_limit,
            items_per_token: items_per_token.max(1),
        }
    }

    /// Take `tokens` if that many remain; otherwise leave the counter untouched.
    pub fn try_consume(&self, tokens: u32) -> bool {
        let res = self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
                cur.checked_sub(tokens)
            });
        match res {
            Ok(prev) => {
                gauge!("news_budget_remaining").set(prev.saturating_sub(tokens) as f64);
                true
            }
            Err(cur) => {
                debug!(target: "budget", needed = tokens, remaining = cur, "token request refused");
                false
            }
        }
    }

    /// Refill to the daily limit, whatever is in flight.
    pub fn reset_daily(&self) {
        self.remaining.store(self.daily_limit, Ordering::Release);
        gauge!("news_budget_remaining").set(self.daily_limit as f64);
        info!(target: "budget", daily_limit = self.daily_limit, "news budget reset");
    }

    /// Tokens needed to fetch `item_count` items (`ceil(items / items_per_token)`).
    pub fn capacity_for(&self, item_count: u32) -> u32 {
        item_count.div_ceil(self.items_per_token)
    }

    /// Items the remaining tokens can still buy.
    pub fn items_available(&self) -> u32 {
        self.remaining().saturating_mul(self.items_per_token)
    }

    /// Strict up-front check: fails when `item_count` exceeds what is left.
    pub fn ensure_covers(&self, item_count: u32) -> Result<()> {
        if self.items_available() < item_count {
            return Err(Error::BudgetExhausted {
                needed: self.capacity_for(item_count),
                remaining: self.remaining(),
            });
        }
        Ok(())
    }

    pub fn remaining(&self) -> u32 {
        self.remaining.load(Ordering::Acquire)
    }

    pub fn daily_limit(&self) -> u32 {
        self.daily_limit
    }

    pub fn items_per_token(&self) -> u32 {
        self.items_per_token
    }
}
