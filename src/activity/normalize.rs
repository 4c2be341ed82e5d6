use std::collections::HashMap;

use solana_pubkey::Pubkey;

use crate::activity::ReconstructedOrder;
use crate::codec::market::{MarketMetadata, lots_to_price};
use crate::codec::{OrderType, Side, pubkey_to_string};
use crate::error::Error;

/// A settled amount in display units.
#[derive(serde::Serialize, Debug, Clone, PartialEq)]
pub struct NormalizedAmount {
    pub mint: String,
    pub amount: f64,
}

/// One reconstructed order in display units, ready to hand to a client.
#[derive(serde::Serialize, Debug, Clone, PartialEq)]
pub struct OrderActivity {
    pub signature: String,
    pub slot: u64,
    pub market: String,
    pub open_orders: String,
    pub side: Side,
    pub order_type: OrderType,
    pub client_id: u64,
    /// Quote units per base unit.
    pub limit_price: f64,
    /// Mint of the asset the order drew from the pool.
    pub source_mint: String,
    pub target_mint: String,
    pub transferred_amount: f64,
    pub settle_signature: Option<String>,
    pub settle_slot: Option<u64>,
    pub settled: Vec<NormalizedAmount>,
}

/// `raw / 10^decimals`.
pub fn amount_to_ui(raw: u64, decimals: u8) -> f64 {
    raw as f64 / 10f64.powi(i32::from(decimals))
}

/// Mint of the asset that left the pool when the order was placed. The asset index is
/// authoritative; without it a bid spends the quote mint and an ask the base mint.
pub fn moved_mint(order: &ReconstructedOrder, market: Option<&MarketMetadata>) -> Option<Pubkey> {
    order.order.source_mint.or_else(|| {
        market.map(|m| match order.order.side {
            Side::Bid => m.quote_mint,
            Side::Ask => m.base_mint,
        })
    })
}

/// Distinct mints whose decimals are needed to normalize `orders`, first-seen order.
pub fn required_mints(
    orders: &[ReconstructedOrder],
    markets: &HashMap<Pubkey, MarketMetadata>,
) -> Vec<Pubkey> {
    let mut mints: Vec<Pubkey> = Vec::new();
    let mut push = |mint: Pubkey| {
        if !mints.contains(&mint) {
            mints.push(mint);
        }
    };
    for order in orders {
        if let Some(mint) = moved_mint(order, markets.get(&order.order.market)) {
            push(mint);
        }
        for settled in order.settled_amounts() {
            push(settled.mint);
        }
    }
    mints
}

fn decimals_of(decimals: &HashMap<Pubkey, u8>, mint: &Pubkey) -> Result<u8, Error> {
    decimals.get(mint).copied().ok_or_else(|| Error::Unavailable {
        reason: format!("decimals for mint {}", pubkey_to_string(mint)),
    })
}

/// Converts a reconstructed order to display units.
///
/// The price uses the market's lot sizes when its account was readable and the lot sizes
/// embedded in the order instruction otherwise.
pub fn normalize_order(
    order: &ReconstructedOrder,
    market: Option<&MarketMetadata>,
    decimals: &HashMap<Pubkey, u8>,
) -> Result<OrderActivity, Error> {
    let event = &order.order;
    let limit_price = match market {
        Some(m) => m.price_lots_to_number(event.limit_price),
        None => lots_to_price(event.limit_price, event.coin_lot_size, event.pc_lot_size),
    };
    let source_mint = moved_mint(order, market).ok_or_else(|| Error::Unavailable {
        reason: format!(
            "source mint of order {} (asset account unknown, market unreadable)",
            event.signature
        ),
    })?;
    let transferred_amount = amount_to_ui(
        event.transferred_amount,
        decimals_of(decimals, &source_mint)?,
    );

    let settled = order
        .settled_amounts()
        .iter()
        .map(|s| {
            Ok(NormalizedAmount {
                mint: pubkey_to_string(&s.mint),
                amount: amount_to_ui(s.amount, decimals_of(decimals, &s.mint)?),
            })
        })
        .collect::<Result<Vec<_>, Error>>()?;

    Ok(OrderActivity {
        signature: event.signature.clone(),
        slot: event.slot,
        market: pubkey_to_string(&event.market),
        open_orders: pubkey_to_string(&event.open_orders),
        side: event.side,
        order_type: event.order_type,
        client_id: event.client_id,
        limit_price,
        source_mint: pubkey_to_string(&source_mint),
        target_mint: pubkey_to_string(&event.target_mint),
        transferred_amount,
        settle_signature: order.settlement.as_ref().map(|s| s.signature.clone()),
        settle_slot: order.settlement.as_ref().map(|s| s.slot),
        settled,
    })
}
