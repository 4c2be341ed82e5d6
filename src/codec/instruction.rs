use std::num::{NonZeroU16, NonZeroU64};

use solana_pubkey::Pubkey;

use crate::codec::{
    OrderType, PUBKEY_LEN, SelfTradeBehavior, Side, checked_u16, read_array, read_pubkey, read_u8,
    read_u16, read_u32, read_u64, read_u128,
};
use crate::error::Error;

/// Leading byte of every pool instruction. Values are fixed by the on-chain program and
/// must never be reordered.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum_macros::Display,
    strum_macros::AsRefStr,
    strum_macros::FromRepr,
)]
#[repr(u8)]
pub enum InstructionTag {
    Init = 0,
    Create = 1,
    Deposit = 2,
    CreateOrder = 3,
    CancelOrder = 4,
    SettleFunds = 5,
    Redeem = 6,
    CollectFees = 7,
}

impl InstructionTag {
    /// Length of the fixed part of the encoding, tag byte included.
    pub fn min_len(self) -> usize {
        const HEAD: usize = 1 + PUBKEY_LEN;
        HEAD + match self {
            Self::Init => 4 + 2,
            Self::Create => 8 + 2 + 2,
            Self::Deposit | Self::Redeem => 8,
            Self::CreateOrder => 1 + 8 + 2 + 1 + 8 + 1 + 8 + 8 + 2 + 8 + 8 + PUBKEY_LEN + 2,
            Self::CancelOrder => 1 + 16,
            Self::SettleFunds => 8 + 8,
            Self::CollectFees => 0,
        }
    }

    /// Reads the tag from the first byte, without validating the rest of the buffer.
    pub fn peek(data: &[u8]) -> Option<Self> {
        data.first().copied().and_then(Self::from_repr)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolInstruction {
    Init {
        pool_seed: [u8; 32],
        max_number_of_assets: u32,
        number_of_markets: u16,
    },
    Create {
        pool_seed: [u8; 32],
        fee_collection_period: u64,
        fee_ratio: u16,
        markets: Vec<Pubkey>,
        deposit_amounts: Vec<u64>,
    },
    Deposit {
        pool_seed: [u8; 32],
        pool_token_amount: u64,
    },
    CreateOrder {
        pool_seed: [u8; 32],
        side: Side,
        limit_price: NonZeroU64,
        /// Fraction of the source asset to trade, scaled to 2^16.
        ratio_of_pool_assets_to_trade: NonZeroU16,
        order_type: OrderType,
        client_id: u64,
        self_trade_behavior: SelfTradeBehavior,
        source_index: u64,
        target_index: u64,
        market_index: u16,
        coin_lot_size: u64,
        pc_lot_size: u64,
        target_mint: Pubkey,
        serum_limit: u16,
    },
    CancelOrder {
        pool_seed: [u8; 32],
        side: Side,
        order_id: u128,
    },
    SettleFunds {
        pool_seed: [u8; 32],
        pc_index: u64,
        coin_index: u64,
    },
    Redeem {
        pool_seed: [u8; 32],
        pool_token_amount: u64,
    },
    CollectFees {
        pool_seed: [u8; 32],
    },
}

impl PoolInstruction {
    pub fn tag(&self) -> InstructionTag {
        match self {
            Self::Init { .. } => InstructionTag::Init,
            Self::Create { .. } => InstructionTag::Create,
            Self::Deposit { .. } => InstructionTag::Deposit,
            Self::CreateOrder { .. } => InstructionTag::CreateOrder,
            Self::CancelOrder { .. } => InstructionTag::CancelOrder,
            Self::SettleFunds { .. } => InstructionTag::SettleFunds,
            Self::Redeem { .. } => InstructionTag::Redeem,
            Self::CollectFees { .. } => InstructionTag::CollectFees,
        }
    }

    pub fn pool_seed(&self) -> &[u8; 32] {
        match self {
            Self::Init { pool_seed, .. }
            | Self::Create { pool_seed, .. }
            | Self::Deposit { pool_seed, .. }
            | Self::CreateOrder { pool_seed, .. }
            | Self::CancelOrder { pool_seed, .. }
            | Self::SettleFunds { pool_seed, .. }
            | Self::Redeem { pool_seed, .. }
            | Self::CollectFees { pool_seed } => pool_seed,
        }
    }

    pub fn pack(&self) -> Result<Vec<u8>, Error> {
        let tag = self.tag();
        let mut data = Vec::with_capacity(tag.min_len());
        data.push(tag as u8);
        data.extend_from_slice(self.pool_seed());

        match self {
            Self::Init {
                max_number_of_assets,
                number_of_markets,
                ..
            } => {
                data.extend_from_slice(&max_number_of_assets.to_le_bytes());
                data.extend_from_slice(&number_of_markets.to_le_bytes());
            }
            Self::Create {
                fee_collection_period,
                fee_ratio,
                markets,
                deposit_amounts,
                ..
            } => {
                data.extend_from_slice(&fee_collection_period.to_le_bytes());
                data.extend_from_slice(&fee_ratio.to_le_bytes());
                data.extend_from_slice(
                    &checked_u16(markets.len(), "number_of_markets")?.to_le_bytes(),
                );
                for market in markets {
                    data.extend_from_slice(market.as_ref());
                }
                for amount in deposit_amounts {
                    data.extend_from_slice(&amount.to_le_bytes());
                }
            }
            Self::Deposit {
                pool_token_amount, ..
            }
            | Self::Redeem {
                pool_token_amount, ..
            } => {
                data.extend_from_slice(&pool_token_amount.to_le_bytes());
            }
            Self::CreateOrder {
                side,
                limit_price,
                ratio_of_pool_assets_to_trade,
                order_type,
                client_id,
                self_trade_behavior,
                source_index,
                target_index,
                market_index,
                coin_lot_size,
                pc_lot_size,
                target_mint,
                serum_limit,
                ..
            } => {
                data.push(*side as u8);
                data.extend_from_slice(&limit_price.get().to_le_bytes());
                data.extend_from_slice(&ratio_of_pool_assets_to_trade.get().to_le_bytes());
                data.push(*order_type as u8);
                data.extend_from_slice(&client_id.to_le_bytes());
                data.push(*self_trade_behavior as u8);
                data.extend_from_slice(&source_index.to_le_bytes());
                data.extend_from_slice(&target_index.to_le_bytes());
                data.extend_from_slice(&market_index.to_le_bytes());
                data.extend_from_slice(&coin_lot_size.to_le_bytes());
                data.extend_from_slice(&pc_lot_size.to_le_bytes());
                data.extend_from_slice(target_mint.as_ref());
                data.extend_from_slice(&serum_limit.to_le_bytes());
            }
            Self::CancelOrder { side, order_id, .. } => {
                data.push(*side as u8);
                data.extend_from_slice(&order_id.to_le_bytes());
            }
            Self::SettleFunds {
                pc_index,
                coin_index,
                ..
            } => {
                data.extend_from_slice(&pc_index.to_le_bytes());
                data.extend_from_slice(&coin_index.to_le_bytes());
            }
            Self::CollectFees { .. } => {}
        }
        Ok(data)
    }

    /// Decodes `data`, requiring its leading byte to be `expected`.
    pub fn unpack(data: &[u8], expected: InstructionTag) -> Result<Self, Error> {
        let (&tag, mut rest) = data
            .split_first()
            .ok_or_else(|| Error::format("empty instruction data"))?;
        if tag != expected as u8 {
            return Err(Error::format(format!(
                "instruction tag {tag} does not match expected {expected} ({})",
                expected as u8
            )));
        }
        if data.len() < expected.min_len() {
            return Err(Error::format(format!(
                "{expected} instruction needs at least {} bytes, got {}",
                expected.min_len(),
                data.len()
            )));
        }

        let input = &mut rest;
        let pool_seed = read_array::<32>(input, "pool_seed")?;
        let ix = match expected {
            InstructionTag::Init => Self::Init {
                pool_seed,
                max_number_of_assets: read_u32(input, "max_number_of_assets")?,
                number_of_markets: read_u16(input, "number_of_markets")?,
            },
            InstructionTag::Create => {
                let fee_collection_period = read_u64(input, "fee_collection_period")?;
                let fee_ratio = read_u16(input, "fee_ratio")?;
                let number_of_markets = read_u16(input, "number_of_markets")?;
                let markets = (0..number_of_markets)
                    .map(|_| read_pubkey(input, "market"))
                    .collect::<Result<Vec<_>, _>>()?;
                if input.len() % 8 != 0 {
                    return Err(Error::format(format!(
                        "deposit amounts section of {} bytes is not a multiple of 8",
                        input.len()
                    )));
                }
                let mut deposit_amounts = Vec::with_capacity(input.len() / 8);
                while !input.is_empty() {
                    deposit_amounts.push(read_u64(input, "deposit_amount")?);
                }
                Self::Create {
                    pool_seed,
                    fee_collection_period,
                    fee_ratio,
                    markets,
                    deposit_amounts,
                }
            }
            InstructionTag::Deposit => Self::Deposit {
                pool_seed,
                pool_token_amount: read_u64(input, "pool_token_amount")?,
            },
            InstructionTag::CreateOrder => Self::CreateOrder {
                pool_seed,
                side: read_side(input)?,
                limit_price: NonZeroU64::new(read_u64(input, "limit_price")?)
                    .ok_or_else(|| Error::format("limit_price must be non-zero"))?,
                ratio_of_pool_assets_to_trade: NonZeroU16::new(read_u16(
                    input,
                    "ratio_of_pool_assets_to_trade",
                )?)
                .ok_or_else(|| Error::format("ratio_of_pool_assets_to_trade must be non-zero"))?,
                order_type: {
                    let raw = read_u8(input, "order_type")?;
                    OrderType::from_repr(raw)
                        .ok_or_else(|| Error::format(format!("unknown order type {raw}")))?
                },
                client_id: read_u64(input, "client_id")?,
                self_trade_behavior: {
                    let raw = read_u8(input, "self_trade_behavior")?;
                    SelfTradeBehavior::from_repr(raw).ok_or_else(|| {
                        Error::format(format!("unknown self trade behavior {raw}"))
                    })?
                },
                source_index: read_u64(input, "source_index")?,
                target_index: read_u64(input, "target_index")?,
                market_index: read_u16(input, "market_index")?,
                coin_lot_size: read_u64(input, "coin_lot_size")?,
                pc_lot_size: read_u64(input, "pc_lot_size")?,
                target_mint: read_pubkey(input, "target_mint")?,
                serum_limit: read_u16(input, "serum_limit")?,
            },
            InstructionTag::CancelOrder => Self::CancelOrder {
                pool_seed,
                side: read_side(input)?,
                order_id: read_u128(input, "order_id")?,
            },
            InstructionTag::SettleFunds => Self::SettleFunds {
                pool_seed,
                pc_index: read_u64(input, "pc_index")?,
                coin_index: read_u64(input, "coin_index")?,
            },
            InstructionTag::Redeem => Self::Redeem {
                pool_seed,
                pool_token_amount: read_u64(input, "pool_token_amount")?,
            },
            InstructionTag::CollectFees => Self::CollectFees { pool_seed },
        };
        Ok(ix)
    }

    /// Decodes `data` using its own leading byte as the expected tag.
    pub fn unpack_any(data: &[u8]) -> Result<Self, Error> {
        let tag = data
            .first()
            .ok_or_else(|| Error::format("empty instruction data"))?;
        let expected = InstructionTag::from_repr(*tag)
            .ok_or_else(|| Error::format(format!("unknown instruction tag {tag}")))?;
        Self::unpack(data, expected)
    }
}

fn read_side(input: &mut &[u8]) -> Result<Side, Error> {
    let raw = read_u8(input, "side")?;
    Side::from_repr(raw).ok_or_else(|| Error::format(format!("unknown side {raw}")))
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "test assertions")]
mod tests {
    use super::*;

    const SEED: [u8; 32] = [42; 32];

    fn key(n: u8) -> Pubkey {
        Pubkey::new_from_array([n; 32])
    }

    fn create_order() -> PoolInstruction {
        PoolInstruction::CreateOrder {
            pool_seed: SEED,
            side: Side::Ask,
            limit_price: NonZeroU64::new(1_234).unwrap(),
            ratio_of_pool_assets_to_trade: NonZeroU16::new(1 << 15).unwrap(),
            order_type: OrderType::ImmediateOrCancel,
            client_id: 77,
            self_trade_behavior: SelfTradeBehavior::CancelProvide,
            source_index: 0,
            target_index: 1,
            market_index: 2,
            coin_lot_size: 100_000,
            pc_lot_size: 100,
            target_mint: key(5),
            serum_limit: 65_535,
        }
    }

    fn every_kind() -> Vec<PoolInstruction> {
        vec![
            PoolInstruction::Init {
                pool_seed: SEED,
                max_number_of_assets: 10,
                number_of_markets: 3,
            },
            PoolInstruction::Create {
                pool_seed: SEED,
                fee_collection_period: 604_800,
                fee_ratio: 1 << 8,
                markets: vec![key(1), key(2)],
                deposit_amounts: vec![1_000_000, 0, u64::MAX],
            },
            PoolInstruction::Deposit {
                pool_seed: SEED,
                pool_token_amount: 5_000,
            },
            create_order(),
            PoolInstruction::CancelOrder {
                pool_seed: SEED,
                side: Side::Bid,
                order_id: u128::MAX - 7,
            },
            PoolInstruction::SettleFunds {
                pool_seed: SEED,
                pc_index: 1,
                coin_index: 0,
            },
            PoolInstruction::Redeem {
                pool_seed: SEED,
                pool_token_amount: 42,
            },
            PoolInstruction::CollectFees { pool_seed: SEED },
        ]
    }

    #[test]
    fn every_kind_roundtrips() {
        for ix in every_kind() {
            let data = ix.pack().unwrap();
            assert_eq!(data[0], ix.tag() as u8);
            assert_eq!(data[1..33], SEED);
            assert_eq!(PoolInstruction::unpack(&data, ix.tag()).unwrap(), ix);
            assert_eq!(PoolInstruction::unpack_any(&data).unwrap(), ix);
        }
    }

    #[test]
    fn fixed_kinds_encode_to_their_minimum_length() {
        for ix in every_kind() {
            if matches!(ix, PoolInstruction::Create { .. }) {
                continue;
            }
            assert_eq!(ix.pack().unwrap().len(), ix.tag().min_len(), "{}", ix.tag());
        }
    }

    #[test]
    fn create_order_field_layout() {
        let data = create_order().pack().unwrap();
        assert_eq!(data.len(), 122);
        assert_eq!(data[33], Side::Ask as u8);
        assert_eq!(data[34..42], 1_234u64.to_le_bytes());
        assert_eq!(data[42..44], (1u16 << 15).to_le_bytes());
        assert_eq!(data[44], OrderType::ImmediateOrCancel as u8);
        assert_eq!(data[70..72], 2u16.to_le_bytes());
        assert_eq!(data[88..120], [5; 32]);
        assert_eq!(data[120..122], 65_535u16.to_le_bytes());
    }

    #[test]
    fn create_encodes_market_count_before_markets() {
        let ix = PoolInstruction::Create {
            pool_seed: SEED,
            fee_collection_period: 1,
            fee_ratio: 2,
            markets: vec![key(9)],
            deposit_amounts: vec![3, 4],
        };
        let data = ix.pack().unwrap();
        assert_eq!(data[43..45], 1u16.to_le_bytes());
        assert_eq!(data[45..77], [9; 32]);
        assert_eq!(data.len(), 45 + 32 + 16);
    }

    #[test]
    fn create_with_too_many_markets_overflows() {
        let ix = PoolInstruction::Create {
            pool_seed: SEED,
            fee_collection_period: 1,
            fee_ratio: 2,
            markets: vec![key(1); usize::from(u16::MAX) + 1],
            deposit_amounts: vec![],
        };
        assert!(matches!(
            ix.pack(),
            Err(Error::Overflow {
                field: "number_of_markets",
                ..
            })
        ));
    }

    #[test]
    fn create_rejects_ragged_deposit_section() {
        let ix = PoolInstruction::Create {
            pool_seed: SEED,
            fee_collection_period: 1,
            fee_ratio: 2,
            markets: vec![],
            deposit_amounts: vec![10],
        };
        let mut data = ix.pack().unwrap();
        data.push(0);
        assert!(matches!(
            PoolInstruction::unpack(&data, InstructionTag::Create),
            Err(Error::Format { .. })
        ));
    }

    #[test]
    fn create_rejects_market_list_longer_than_buffer() {
        let ix = PoolInstruction::Create {
            pool_seed: SEED,
            fee_collection_period: 1,
            fee_ratio: 2,
            markets: vec![key(1)],
            deposit_amounts: vec![],
        };
        let mut data = ix.pack().unwrap();
        data[43..45].copy_from_slice(&2u16.to_le_bytes());
        assert!(PoolInstruction::unpack(&data, InstructionTag::Create).is_err());
    }

    #[test]
    fn unpack_rejects_tag_mismatch() {
        let data = PoolInstruction::CollectFees { pool_seed: SEED }
            .pack()
            .unwrap();
        let err = PoolInstruction::unpack(&data, InstructionTag::Deposit).unwrap_err();
        assert!(matches!(err, Error::Format { .. }));
    }

    #[test]
    fn unpack_rejects_short_buffers_for_every_kind() {
        for ix in every_kind() {
            let data = ix.pack().unwrap();
            let truncated = &data[..ix.tag().min_len() - 1];
            assert!(
                matches!(
                    PoolInstruction::unpack(truncated, ix.tag()),
                    Err(Error::Format { .. })
                ),
                "{}",
                ix.tag()
            );
        }
        assert!(PoolInstruction::unpack(&[], InstructionTag::Init).is_err());
        assert!(PoolInstruction::unpack_any(&[8]).is_err());
    }

    #[test]
    fn unpack_rejects_unknown_enum_bytes_and_zero_price() {
        let mut data = create_order().pack().unwrap();
        data[33] = 2;
        assert!(PoolInstruction::unpack(&data, InstructionTag::CreateOrder).is_err());

        let mut data = create_order().pack().unwrap();
        data[44] = 9;
        assert!(PoolInstruction::unpack(&data, InstructionTag::CreateOrder).is_err());

        let mut data = create_order().pack().unwrap();
        data[34..42].copy_from_slice(&0u64.to_le_bytes());
        assert!(PoolInstruction::unpack(&data, InstructionTag::CreateOrder).is_err());
    }

    #[test]
    fn peek_reads_leading_tag() {
        assert_eq!(
            InstructionTag::peek(&[5, 0]),
            Some(InstructionTag::SettleFunds)
        );
        assert_eq!(InstructionTag::peek(&[8]), None);
        assert_eq!(InstructionTag::peek(&[]), None);
    }
}
