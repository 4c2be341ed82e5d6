use solana_pubkey::Pubkey;

use crate::codec::{array_at, pubkey_at};
use crate::error::Error;

/// Size of a venue market account: 5 bytes of head padding, the market body and 7 bytes
/// of tail padding.
pub const MARKET_ACCOUNT_LEN: usize = 388;

const OWN_ADDRESS: usize = 13;
const VAULT_SIGNER_NONCE: usize = 45;
const BASE_MINT: usize = 53;
const QUOTE_MINT: usize = 85;
const BASE_VAULT: usize = 117;
const QUOTE_VAULT: usize = 165;
const REQUEST_QUEUE: usize = 221;
const EVENT_QUEUE: usize = 253;
const BIDS: usize = 285;
const ASKS: usize = 317;
const BASE_LOT_SIZE: usize = 349;
const QUOTE_LOT_SIZE: usize = 357;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketMetadata {
    pub address: Pubkey,
    pub vault_signer_nonce: u64,
    pub base_mint: Pubkey,
    pub quote_mint: Pubkey,
    pub base_vault: Pubkey,
    pub quote_vault: Pubkey,
    pub request_queue: Pubkey,
    pub event_queue: Pubkey,
    pub bids: Pubkey,
    pub asks: Pubkey,
    /// Coin lot size.
    pub base_lot_size: u64,
    /// Price-currency lot size.
    pub quote_lot_size: u64,
}

impl MarketMetadata {
    pub fn unpack(data: &[u8]) -> Result<Self, Error> {
        if data.len() < MARKET_ACCOUNT_LEN {
            return Err(Error::format(format!(
                "market account needs {MARKET_ACCOUNT_LEN} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            address: pubkey_at(data, OWN_ADDRESS, "own_address")?,
            vault_signer_nonce: read_reversed_u64(data, VAULT_SIGNER_NONCE, "vault_signer_nonce")?,
            base_mint: pubkey_at(data, BASE_MINT, "base_mint")?,
            quote_mint: pubkey_at(data, QUOTE_MINT, "quote_mint")?,
            base_vault: pubkey_at(data, BASE_VAULT, "base_vault")?,
            quote_vault: pubkey_at(data, QUOTE_VAULT, "quote_vault")?,
            request_queue: pubkey_at(data, REQUEST_QUEUE, "request_queue")?,
            event_queue: pubkey_at(data, EVENT_QUEUE, "event_queue")?,
            bids: pubkey_at(data, BIDS, "bids")?,
            asks: pubkey_at(data, ASKS, "asks")?,
            base_lot_size: read_reversed_u64(data, BASE_LOT_SIZE, "base_lot_size")?,
            quote_lot_size: read_reversed_u64(data, QUOTE_LOT_SIZE, "quote_lot_size")?,
        })
    }

    /// Scales a raw venue price (quote lots per base lot) to quote units per base unit.
    pub fn price_lots_to_number(&self, raw_price: u64) -> f64 {
        lots_to_price(raw_price, self.base_lot_size, self.quote_lot_size)
    }
}

/// `raw_price * pc_lot_size / coin_lot_size`; a zero coin lot size yields 0.
pub fn lots_to_price(raw_price: u64, coin_lot_size: u64, pc_lot_size: u64) -> f64 {
    if coin_lot_size == 0 {
        return 0.0;
    }
    raw_price as f64 * pc_lot_size as f64 / coin_lot_size as f64
}

// The venue stores these three fields in the opposite byte order from the reader that
// consumes them: reverse, then read big-endian.
fn read_reversed_u64(data: &[u8], start: usize, field: &str) -> Result<u64, Error> {
    let mut bytes: [u8; 8] = array_at(data, start, field)?;
    bytes.reverse();
    Ok(u64::from_be_bytes(bytes))
}
