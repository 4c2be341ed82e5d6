//! Order activity reconstruction.
//!
//! Create-order and settle instructions land in separate transactions, and the only link
//! between them is the open-orders account both reference. Events are grouped by that
//! account and paired first-in-first-out, which is correct only while each open-orders
//! account has at most one order in flight. Overlapping orders on one account cannot be
//! disambiguated from ledger data and will be paired by arrival order.

pub mod extract;
pub mod ledger;
pub mod normalize;
#[cfg(test)]
pub(crate) mod test_support;

use std::cmp::Reverse;
use std::collections::{HashMap, VecDeque};

use solana_pubkey::Pubkey;

use crate::codec::{OrderType, Side, pubkey_to_string};
use crate::config::PoolConfig;
use crate::types::RawTransaction;
use extract::{EventExtractor, PoolAssetIndex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderEvent {
    pub signature: String,
    pub slot: u64,
    pub open_orders: Pubkey,
    pub market: Pubkey,
    pub side: Side,
    pub limit_price: u64,
    pub ratio_of_pool_assets_to_trade: u16,
    pub order_type: OrderType,
    pub client_id: u64,
    /// Mint of the pool asset account the order drew from, when it is a known asset.
    pub source_mint: Option<Pubkey>,
    pub target_mint: Pubkey,
    pub coin_lot_size: u64,
    pub pc_lot_size: u64,
    pub transferred_amount: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettledAmount {
    pub mint: Pubkey,
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettleEvent {
    pub signature: String,
    pub slot: u64,
    pub open_orders: Pubkey,
    pub market: Pubkey,
    /// Per-mint totals, in the order the mints were first seen.
    pub amounts: Vec<SettledAmount>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityEvent {
    Order(OrderEvent),
    Settle(SettleEvent),
}

impl ActivityEvent {
    pub fn open_orders(&self) -> &Pubkey {
        match self {
            Self::Order(o) => &o.open_orders,
            Self::Settle(s) => &s.open_orders,
        }
    }

    pub fn slot(&self) -> u64 {
        match self {
            Self::Order(o) => o.slot,
            Self::Settle(s) => s.slot,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconstructedOrder {
    pub order: OrderEvent,
    pub settlement: Option<SettleEvent>,
}

impl ReconstructedOrder {
    pub fn settled_amounts(&self) -> &[SettledAmount] {
        self.settlement
            .as_ref()
            .map(|s| s.amounts.as_slice())
            .unwrap_or_default()
    }

    pub fn is_settled(&self) -> bool {
        self.settlement.is_some()
    }
}

pub struct ActivityEngine;

impl ActivityEngine {
    /// Pairs newest-first `events` into orders, newest first, at most `max_results`.
    pub fn pair(events: Vec<ActivityEvent>, max_results: usize) -> Vec<ReconstructedOrder> {
        let mut positions: HashMap<Pubkey, usize> = HashMap::new();
        let mut groups: Vec<Vec<ActivityEvent>> = Vec::new();
        for event in events {
            let group = *positions.entry(*event.open_orders()).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[group].push(event);
        }

        let mut orders: Vec<ReconstructedOrder> = groups
            .into_iter()
            .flat_map(|mut group| {
                group.reverse();
                Self::pair_chronological(group)
            })
            .collect();

        orders.sort_by_key(|o| Reverse(o.order.slot));
        orders.truncate(max_results);
        orders
    }

    /// FIFO pairing over one open-orders account's events, oldest first. Settles observed
    /// before the first order belong to an order outside the window and are discarded.
    fn pair_chronological(events: Vec<ActivityEvent>) -> Vec<ReconstructedOrder> {
        let mut creates = Vec::new();
        let mut settles = VecDeque::new();
        for event in events {
            match event {
                ActivityEvent::Order(order) => creates.push(order),
                ActivityEvent::Settle(settle) if creates.is_empty() => {
                    tracing::debug!(
                        signature = %settle.signature,
                        open_orders = %pubkey_to_string(&settle.open_orders),
                        "dropping settle that precedes the first observed order"
                    );
                }
                ActivityEvent::Settle(settle) => settles.push_back(settle),
            }
        }

        creates
            .into_iter()
            .map(|order| ReconstructedOrder {
                order,
                settlement: settles.pop_front(),
            })
            .collect()
    }
}

/// Rebuilds the pool's order history from `history`.
///
/// `history` is expected newest-first; it is re-sorted by slot (stable) so transactions
/// fetched out of order still pair correctly. Transactions that cannot be decoded are
/// logged and skipped.
pub fn reconstruct(
    config: &PoolConfig,
    pool: &Pubkey,
    assets: &PoolAssetIndex,
    history: &[RawTransaction],
    max_results: usize,
) -> Vec<ReconstructedOrder> {
    let extractor = EventExtractor::new(config, pool, assets);

    let mut ordered: Vec<&RawTransaction> = history.iter().collect();
    ordered.sort_by_key(|tx| Reverse(tx.slot));

    let mut events = Vec::new();
    for tx in ordered {
        match extractor.extract(tx) {
            Ok(mut tx_events) => {
                // Later instructions in a transaction are newer.
                tx_events.reverse();
                events.extend(tx_events);
            }
            Err(err) => {
                tracing::warn!(
                    signature = %tx.signature,
                    slot = tx.slot,
                    error = %err,
                    "skipping undecodable transaction"
                );
            }
        }
    }

    ActivityEngine::pair(events, max_results)
}
