use std::collections::HashMap;

use solana_pubkey::Pubkey;

use crate::activity::{ActivityEvent, OrderEvent, SettleEvent, SettledAmount};
use crate::codec::instruction::{InstructionTag, PoolInstruction};
use crate::codec::pubkey_to_string;
use crate::config::PoolConfig;
use crate::error::Error;
use crate::types::{RawTransaction, ResolvedInstruction, resolve_instruction};

/// Token program `Transfer` opcode.
pub const TOKEN_TRANSFER_OPCODE: u8 = 3;

const CREATE_ORDER_MARKET: usize = 1;
const CREATE_ORDER_POOL_ASSET: usize = 2;
const CREATE_ORDER_OPEN_ORDERS: usize = 3;
const CREATE_ORDER_POOL: usize = 8;
const SETTLE_MARKET: usize = 0;
const SETTLE_OPEN_ORDERS: usize = 1;
const SETTLE_POOL: usize = 2;

/// The pool's token accounts, each mapped to the mint it holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolAssetIndex {
    accounts: HashMap<Pubkey, Pubkey>,
}

impl PoolAssetIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, account: Pubkey, mint: Pubkey) {
        self.accounts.insert(account, mint);
    }

    pub fn mint_for(&self, account: &Pubkey) -> Option<&Pubkey> {
        self.accounts.get(account)
    }

    pub fn contains(&self, account: &Pubkey) -> bool {
        self.accounts.contains_key(account)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl FromIterator<(Pubkey, Pubkey)> for PoolAssetIndex {
    fn from_iter<I: IntoIterator<Item = (Pubkey, Pubkey)>>(iter: I) -> Self {
        Self {
            accounts: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenTransfer {
    pub source: Pubkey,
    pub destination: Pubkey,
    pub amount: u64,
}

/// Decodes a token-program transfer; any other instruction yields `None`.
pub fn decode_transfer(ix: &ResolvedInstruction, token_program: &Pubkey) -> Option<TokenTransfer> {
    if ix.program_id != *token_program {
        return None;
    }
    let (&opcode, rest) = ix.data.split_first()?;
    if opcode != TOKEN_TRANSFER_OPCODE {
        return None;
    }
    let (amount, _) = rest.split_first_chunk::<8>()?;
    Some(TokenTransfer {
        source: *ix.accounts.first()?,
        destination: *ix.accounts.get(1)?,
        amount: u64::from_le_bytes(*amount),
    })
}

pub struct EventExtractor<'a> {
    config: &'a PoolConfig,
    pool: &'a Pubkey,
    assets: &'a PoolAssetIndex,
}

impl<'a> EventExtractor<'a> {
    pub fn new(config: &'a PoolConfig, pool: &'a Pubkey, assets: &'a PoolAssetIndex) -> Self {
        Self {
            config,
            pool,
            assets,
        }
    }

    /// Order and settle events of `tx`, in instruction order.
    ///
    /// Fails only when the transaction itself is unreadable; a malformed pool instruction
    /// is logged and skipped so the rest of the transaction still counts.
    pub fn extract(&self, tx: &RawTransaction) -> Result<Vec<ActivityEvent>, Error> {
        let keys = tx.key_table()?;
        let inner = tx.inner_by_index();
        let mut events = Vec::new();

        for (index, raw) in tx.instructions.iter().enumerate() {
            if keys.get(raw.program_id_index) != Some(&self.config.pool_program_id) {
                continue;
            }
            let ix = resolve_instruction(raw, &keys)?;
            let tag = match InstructionTag::peek(&ix.data) {
                Some(tag @ (InstructionTag::CreateOrder | InstructionTag::SettleFunds)) => tag,
                _ => continue,
            };

            let nested = match inner.get(&index) {
                Some(nested) if !nested.is_empty() => nested
                    .iter()
                    .map(|n| resolve_instruction(n, &keys))
                    .collect::<Result<Vec<_>, _>>()?,
                _ => {
                    tracing::debug!(
                        signature = %tx.signature,
                        instruction = index,
                        kind = %tag,
                        "no nested instructions recorded, instruction had no effect"
                    );
                    continue;
                }
            };

            let event = match tag {
                InstructionTag::CreateOrder => self
                    .order_event(tx, &ix, &nested)
                    .map(|e| e.map(ActivityEvent::Order)),
                _ => self
                    .settle_event(tx, &ix, &nested)
                    .map(|e| e.map(ActivityEvent::Settle)),
            };
            match event {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(
                        signature = %tx.signature,
                        instruction = index,
                        kind = %tag,
                        error = %err,
                        "skipping malformed pool instruction"
                    );
                }
            }
        }
        Ok(events)
    }

    fn references_pool(&self, ix: &ResolvedInstruction, position: usize) -> Result<bool, Error> {
        Ok(ix.account(position, "pool")? == self.pool)
    }

    fn order_event(
        &self,
        tx: &RawTransaction,
        ix: &ResolvedInstruction,
        nested: &[ResolvedInstruction],
    ) -> Result<Option<OrderEvent>, Error> {
        if !self.references_pool(ix, CREATE_ORDER_POOL)? {
            return Ok(None);
        }
        let PoolInstruction::CreateOrder {
            side,
            limit_price,
            ratio_of_pool_assets_to_trade,
            order_type,
            client_id,
            coin_lot_size,
            pc_lot_size,
            target_mint,
            ..
        } = PoolInstruction::unpack(&ix.data, InstructionTag::CreateOrder)?
        else {
            return Err(Error::format("expected a CreateOrder instruction"));
        };

        let Some(transfer) = nested
            .iter()
            .find_map(|n| decode_transfer(n, &self.config.token_program_id))
        else {
            tracing::debug!(
                signature = %tx.signature,
                "create order moved no tokens, instruction had no effect"
            );
            return Ok(None);
        };

        let pool_asset = ix.account(CREATE_ORDER_POOL_ASSET, "pool asset")?;
        Ok(Some(OrderEvent {
            signature: tx.signature.clone(),
            slot: tx.slot,
            open_orders: *ix.account(CREATE_ORDER_OPEN_ORDERS, "open orders")?,
            market: *ix.account(CREATE_ORDER_MARKET, "market")?,
            side,
            limit_price: limit_price.get(),
            ratio_of_pool_assets_to_trade: ratio_of_pool_assets_to_trade.get(),
            order_type,
            client_id,
            source_mint: self.assets.mint_for(pool_asset).copied(),
            target_mint,
            coin_lot_size,
            pc_lot_size,
            transferred_amount: transfer.amount,
        }))
    }

    fn settle_event(
        &self,
        tx: &RawTransaction,
        ix: &ResolvedInstruction,
        nested: &[ResolvedInstruction],
    ) -> Result<Option<SettleEvent>, Error> {
        if !self.references_pool(ix, SETTLE_POOL)? {
            return Ok(None);
        }
        PoolInstruction::unpack(&ix.data, InstructionTag::SettleFunds)?;

        // Referrer and fee transfers go to accounts outside the pool and are ignored.
        let mut amounts: Vec<SettledAmount> = Vec::new();
        for transfer in nested
            .iter()
            .filter_map(|n| decode_transfer(n, &self.config.token_program_id))
        {
            let Some(mint) = self.assets.mint_for(&transfer.destination) else {
                continue;
            };
            match amounts.iter_mut().find(|a| a.mint == *mint) {
                Some(existing) => {
                    existing.amount = existing.amount.checked_add(transfer.amount).ok_or(
                        Error::Overflow {
                            field: "settled_amount",
                            value: u128::from(existing.amount) + u128::from(transfer.amount),
                        },
                    )?;
                }
                None => amounts.push(SettledAmount {
                    mint: *mint,
                    amount: transfer.amount,
                }),
            }
        }

        if amounts.is_empty() {
            tracing::debug!(
                signature = %tx.signature,
                open_orders = %pubkey_to_string(ix.account(SETTLE_OPEN_ORDERS, "open orders")?),
                "settle moved nothing into the pool, instruction had no effect"
            );
            return Ok(None);
        }

        Ok(Some(SettleEvent {
            signature: tx.signature.clone(),
            slot: tx.slot,
            open_orders: *ix.account(SETTLE_OPEN_ORDERS, "open orders")?,
            market: *ix.account(SETTLE_MARKET, "market")?,
            amounts,
        }))
    }
}
