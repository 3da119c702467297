//! Per-room gold ledger and the tower price list.

use log::debug;
use shared::{PlayerId, STARTING_GOLD};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("balance {balance} is below the cost of {cost}")]
pub struct InsufficientFunds {
    pub balance: i64,
    pub cost: i64,
}

/// Price of a tower type. Unknown types are free.
pub fn tower_cost(tower_type: &str) -> i64 {
    match tower_type {
        "basic" => 100,
        "rapid" | "rapidfire" => 150,
        "sniper" => 200,
        "cryo" => 250,
        "tesla" => 300,
        _ => 0,
    }
}

/// Gold balances for every player that ever entered the room.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    balances: HashMap<PlayerId, i64>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gives a newly seated player the starting purse.
    pub fn open_account(&mut self, player_id: &str) {
        self.balances.insert(player_id.to_owned(), STARTING_GOLD);
    }

    pub fn balance(&self, player_id: &str) -> i64 {
        self.balances.get(player_id).copied().unwrap_or(0)
    }

    /// Credits a reward, saturating at the `i64` limits. Rewards and synced
    /// balances are client-reported.
    pub fn grant(&mut self, player_id: &str, amount: i64) -> i64 {
        let balance = self.balances.entry(player_id.to_owned()).or_insert(0);
        *balance = balance.saturating_add(amount);
        *balance
    }

    /// Deducts `amount` and returns the new balance, or leaves the balance
    /// untouched when it cannot cover the cost.
    pub fn spend(&mut self, player_id: &str, amount: i64) -> Result<i64, InsufficientFunds> {
        let balance = self.balances.entry(player_id.to_owned()).or_insert(0);
        if *balance < amount {
            return Err(InsufficientFunds {
                balance: *balance,
                cost: amount,
            });
        }
        *balance = balance.saturating_sub(amount);
        Ok(*balance)
    }

    /// Client-authoritative overwrite from `gold_sync`.
    ///
    /// This is the only path that trusts a client-reported balance; any
    /// plausibility check belongs here.
    pub fn sync_from_client(&mut self, player_id: &str, reported: i64) -> i64 {
        let previous = self.balances.insert(player_id.to_owned(), reported);
        debug!(
            "Gold sync for {}: {} -> {}",
            player_id,
            previous.unwrap_or(0),
            reported
        );
        reported
    }
}
