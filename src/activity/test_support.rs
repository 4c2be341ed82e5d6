//! Transaction builders shared by the activity tests.
#![expect(clippy::unwrap_used, reason = "test fixtures")]

use std::num::{NonZeroU16, NonZeroU64};

use solana_pubkey::Pubkey;

use crate::activity::extract::TOKEN_TRANSFER_OPCODE;
use crate::codec::instruction::PoolInstruction;
use crate::codec::state::{PoolHeader, PoolStatus};
use crate::codec::{OrderType, SelfTradeBehavior, Side};
use crate::config::PoolConfig;
use crate::types::{RawInnerInstructions, RawInstruction, RawTransaction};

pub const POOL_PROGRAM: u8 = 200;

pub fn key(n: u8) -> Pubkey {
    Pubkey::new_from_array([n; 32])
}

pub fn config() -> PoolConfig {
    PoolConfig::new(key(POOL_PROGRAM)).unwrap()
}

pub fn create_order_data(side: Side, limit_price: u64, target_mint: Pubkey) -> Vec<u8> {
    PoolInstruction::CreateOrder {
        pool_seed: [7; 32],
        side,
        limit_price: NonZeroU64::new(limit_price).unwrap(),
        ratio_of_pool_assets_to_trade: NonZeroU16::new(1 << 15).unwrap(),
        order_type: OrderType::ImmediateOrCancel,
        client_id: 9,
        self_trade_behavior: SelfTradeBehavior::DecrementTake,
        source_index: 0,
        target_index: 1,
        market_index: 0,
        coin_lot_size: 1,
        pc_lot_size: 10,
        target_mint,
        serum_limit: 5,
    }
    .pack()
    .unwrap()
}

pub fn settle_data() -> Vec<u8> {
    PoolInstruction::SettleFunds {
        pool_seed: [7; 32],
        pc_index: 0,
        coin_index: 1,
    }
    .pack()
    .unwrap()
}

pub fn transfer_data(amount: u64) -> Vec<u8> {
    let mut data = vec![TOKEN_TRANSFER_OPCODE];
    data.extend_from_slice(&amount.to_le_bytes());
    data
}

/// Builds one transaction, interning account keys as they are referenced.
#[derive(Default)]
pub struct TxBuilder {
    keys: Vec<Pubkey>,
    instructions: Vec<RawInstruction>,
    inner: Vec<RawInnerInstructions>,
}

impl TxBuilder {
    fn index(&mut self, key: Pubkey) -> usize {
        if let Some(i) = self.keys.iter().position(|k| *k == key) {
            return i;
        }
        self.keys.push(key);
        self.keys.len() - 1
    }

    fn raw(&mut self, program: Pubkey, accounts: &[Pubkey], data: &[u8]) -> RawInstruction {
        let program = self.index(program);
        let accounts = accounts.iter().map(|k| self.index(*k)).collect();
        RawInstruction::new(program, accounts, data)
    }

    /// Adds a top-level instruction with the given nested `(program, accounts, data)` calls.
    pub fn instruction(
        mut self,
        program: Pubkey,
        accounts: &[Pubkey],
        data: &[u8],
        nested: &[(Pubkey, Vec<Pubkey>, Vec<u8>)],
    ) -> Self {
        let top = self.raw(program, accounts, data);
        let nested: Vec<RawInstruction> = nested
            .iter()
            .map(|(p, a, d)| self.raw(*p, a, d))
            .collect();
        if !nested.is_empty() {
            self.inner.push(RawInnerInstructions {
                index: self.instructions.len(),
                instructions: nested,
            });
        }
        self.instructions.push(top);
        self
    }

    pub fn build(self, signature: &str, slot: u64) -> RawTransaction {
        RawTransaction {
            signature: signature.to_string(),
            slot,
            account_keys: self
                .keys
                .iter()
                .map(crate::codec::pubkey_to_string)
                .collect(),
            instructions: self.instructions,
            inner_instructions: self.inner,
        }
    }
}

pub struct OrderAccounts {
    pub pool: Pubkey,
    pub market: Pubkey,
    pub pool_asset: Pubkey,
    pub open_orders: Pubkey,
}

pub fn create_order_accounts(a: &OrderAccounts) -> Vec<Pubkey> {
    vec![
        key(150),
        a.market,
        a.pool_asset,
        a.open_orders,
        key(151),
        key(152),
        key(153),
        key(154),
        a.pool,
    ]
}

pub fn settle_accounts(a: &OrderAccounts) -> Vec<Pubkey> {
    vec![a.market, a.open_orders, a.pool, key(160), key(161)]
}

/// A create-order transaction moving `amount` out of the pool asset account.
pub fn order_tx(
    sig: &str,
    slot: u64,
    a: &OrderAccounts,
    side: Side,
    amount: u64,
) -> RawTransaction {
    let cfg = config();
    TxBuilder::default()
        .instruction(
            cfg.pool_program_id,
            &create_order_accounts(a),
            &create_order_data(side, 100, key(101)),
            &[(
                cfg.token_program_id,
                vec![a.pool_asset, key(170), a.pool],
                transfer_data(amount),
            )],
        )
        .build(sig, slot)
}

/// A settle transaction whose nested transfers land in each `(destination, amount)`.
pub fn settle_tx(
    sig: &str,
    slot: u64,
    a: &OrderAccounts,
    transfers: &[(Pubkey, u64)],
) -> RawTransaction {
    let cfg = config();
    let nested: Vec<_> = transfers
        .iter()
        .map(|(dest, amount)| {
            (
                cfg.token_program_id,
                vec![key(170), *dest, key(171)],
                transfer_data(*amount),
            )
        })
        .collect();
    TxBuilder::default()
        .instruction(
            cfg.pool_program_id,
            &settle_accounts(a),
            &settle_data(),
            &nested,
        )
        .build(sig, slot)
}

/// Pool account bytes: header, `markets`, then one slot per mint plus `spare_slots` zeros.
pub fn pool_account(markets: &[Pubkey], mints: &[Pubkey], spare_slots: usize) -> Vec<u8> {
    let header = PoolHeader {
        serum_program_id: config().serum_program_id,
        seed: [7; 32],
        signal_provider: key(120),
        status: PoolStatus::Unlocked,
        number_of_markets: u16::try_from(markets.len()).unwrap(),
        fee_ratio: 50,
        last_fee_collection_timestamp: 1_600_000_000,
        fee_collection_period: 604_800,
    };
    let mut data = header.pack().unwrap().to_vec();
    for k in markets.iter().chain(mints) {
        data.extend_from_slice(k.as_ref());
    }
    data.resize(data.len() + 32 * spare_slots, 0);
    data
}

/// Venue market account bytes with the fields reconstruction reads.
pub fn market_account(
    address: Pubkey,
    base_mint: Pubkey,
    quote_mint: Pubkey,
    lots: (u64, u64),
) -> Vec<u8> {
    let mut data = vec![0u8; crate::codec::market::MARKET_ACCOUNT_LEN];
    data[13..45].copy_from_slice(address.as_ref());
    data[53..85].copy_from_slice(base_mint.as_ref());
    data[85..117].copy_from_slice(quote_mint.as_ref());
    data[349..357].copy_from_slice(&lots.0.to_le_bytes());
    data[357..365].copy_from_slice(&lots.1.to_le_bytes());
    data
}
