//! How many copies of each print are committed to decks.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    error::InUseError,
    models::{CardRecord, Deck},
};

/// Card id → copies referenced across every section of every deck.
pub type UsageMap = HashMap<String, u32>;

/// Count deck references per card id.
pub fn usage<'a>(decks: impl IntoIterator<Item = &'a Deck>) -> UsageMap {
    let mut map = UsageMap::new();
    for deck in decks {
        for id in deck.all_slots() {
            *map.entry(id.clone()).or_insert(0) += 1;
        }
    }
    map
}

/// Copies not yet committed to any deck.
pub fn available_for(card_id: &str, total: u32, usage: &UsageMap) -> u32 {
    total.saturating_sub(usage.get(card_id).copied().unwrap_or(0))
}

/// Change the owned quantity of a print.
///
/// Negative requests are clamped by the `u32` type; a request below current
/// deck usage is rejected; zero removes the record. Unknown ids leave the
/// collection untouched.
pub fn set_quantity(
    collection: &[CardRecord],
    decks: &[Deck],
    card_id: &str,
    new_quantity: u32,
) -> Result<Vec<CardRecord>, InUseError> {
    let in_use = usage(decks).get(card_id).copied().unwrap_or(0);
    if new_quantity < in_use {
        warn!(card_id, in_use, requested = new_quantity, "quantity change blocked by deck usage");
        return Err(InUseError {
            card_id: card_id.to_string(),
            in_use,
            requested: new_quantity,
        });
    }

    if !collection.iter().any(|card| card.id == card_id) {
        debug!(card_id, "quantity change for unknown card");
        return Ok(collection.to_vec());
    }

    if new_quantity == 0 {
        info!(card_id, "removed print from collection");
        return Ok(collection
            .iter()
            .filter(|card| card.id != card_id)
            .cloned()
            .collect());
    }

    Ok(collection
        .iter()
        .map(|card| {
            if card.id == card_id {
                let mut updated = card.clone();
                updated.quantity = new_quantity;
                updated
            } else {
                card.clone()
            }
        })
        .collect())
}

/// Owned, allocated and free copies of one print.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    /// Print identity.
    pub card_id: String,
    /// Owned copies.
    pub total: u32,
    /// Copies referenced by decks.
    pub allocated: u32,
    /// Copies still free for deck building.
    pub free: u32,
}

impl Allocation {
    /// Legacy imports can reference more copies than are owned.
    pub fn is_over_allocated(&self) -> bool {
        self.allocated > self.total
    }
}

/// Per-print allocation, in collection order.
pub fn allocation_summary(collection: &[CardRecord], decks: &[Deck]) -> Vec<Allocation> {
    let used = usage(decks);
    collection
        .iter()
        .map(|card| {
            let allocated = used.get(&card.id).copied().unwrap_or(0);
            Allocation {
                card_id: card.id.clone(),
                total: card.quantity,
                allocated,
                free: card.quantity.saturating_sub(allocated),
            }
        })
        .collect()
}

/// Prints whose quantity is below their deck usage. Reported, never fixed.
pub fn over_allocations(collection: &[CardRecord], decks: &[Deck]) -> Vec<Allocation> {
    allocation_summary(collection, decks)
        .into_iter()
        .filter(Allocation::is_over_allocated)
        .collect()
}
