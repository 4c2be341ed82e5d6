//! Pool account layout: a fixed 117-byte [`PoolHeader`], the authorized market list
//! (`number_of_markets` keys) and the asset slots (one mint per 32 bytes) up to the end
//! of the account.

use std::num::NonZeroU8;

use solana_pubkey::Pubkey;

use crate::codec::{PUBKEY_LEN, array_at, is_zero_key, pubkey_at};
use crate::error::Error;

pub const POOL_HEADER_LEN: usize = 117;

const STATUS_MODE_SHIFT: u8 = 6;
const STATUS_PENDING_ORDER_FLAG: u8 = 1 << STATUS_MODE_SHIFT;
const STATUS_LOCKED_FLAG: u8 = 2 << STATUS_MODE_SHIFT;
const STATUS_COUNT_MASK: u8 = 0x3f;
const STATUS_UNLOCKED: u8 = STATUS_COUNT_MASK;

/// Highest pending-order count [`PoolStatus::to_byte`] writes. The program itself admits 64
/// in-flight orders, which decodes but is refused on encode.
pub const MAX_PENDING_ORDERS: u8 = 63;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolStatus {
    Uninitialized,
    Unlocked,
    Locked,
    PendingOrder(NonZeroU8),
    LockedPendingOrder(NonZeroU8),
}

impl PoolStatus {
    pub fn from_byte(byte: u8) -> Result<Self, Error> {
        match byte >> STATUS_MODE_SHIFT {
            0 if byte == 0 => Ok(Self::Uninitialized),
            0 => Ok(Self::Unlocked),
            1 => Ok(Self::PendingOrder(pending_count(byte))),
            2 => Ok(Self::Locked),
            3 => Ok(Self::LockedPendingOrder(pending_count(byte))),
            mode => Err(Error::format(format!("unrecognized pool status mode {mode}"))),
        }
    }

    pub fn to_byte(self) -> Result<u8, Error> {
        match self {
            Self::Uninitialized => Ok(0),
            Self::Unlocked => Ok(STATUS_UNLOCKED),
            Self::Locked => Ok(STATUS_LOCKED_FLAG),
            Self::PendingOrder(n) => Ok(STATUS_PENDING_ORDER_FLAG | encode_count(n)?),
            Self::LockedPendingOrder(n) => {
                Ok(STATUS_LOCKED_FLAG | STATUS_PENDING_ORDER_FLAG | encode_count(n)?)
            }
        }
    }

    pub fn pending_orders(self) -> u8 {
        match self {
            Self::PendingOrder(n) | Self::LockedPendingOrder(n) => n.get(),
            Self::Uninitialized | Self::Unlocked | Self::Locked => 0,
        }
    }

    pub fn is_locked(self) -> bool {
        matches!(self, Self::Locked | Self::LockedPendingOrder(_))
    }
}

fn pending_count(byte: u8) -> NonZeroU8 {
    NonZeroU8::MIN.saturating_add(byte & STATUS_COUNT_MASK)
}

fn encode_count(count: NonZeroU8) -> Result<u8, Error> {
    if count.get() > MAX_PENDING_ORDERS {
        return Err(Error::Overflow {
            field: "pending_order_count",
            value: u128::from(count.get()),
        });
    }
    Ok(count.get() - 1)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolHeader {
    /// Venue (exchange) program the pool trades on.
    pub serum_program_id: Pubkey,
    pub seed: [u8; 32],
    pub signal_provider: Pubkey,
    pub status: PoolStatus,
    pub number_of_markets: u16,
    pub fee_ratio: u16,
    pub last_fee_collection_timestamp: u64,
    pub fee_collection_period: u64,
}

impl PoolHeader {
    pub fn unpack(data: &[u8]) -> Result<Self, Error> {
        if data.len() < POOL_HEADER_LEN {
            return Err(Error::format(format!(
                "pool header needs {POOL_HEADER_LEN} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            serum_program_id: pubkey_at(data, 0, "serum_program_id")?,
            seed: array_at(data, 32, "seed")?,
            signal_provider: pubkey_at(data, 64, "signal_provider")?,
            status: PoolStatus::from_byte(data[96])?,
            number_of_markets: u16::from_le_bytes(array_at(data, 97, "number_of_markets")?),
            fee_ratio: u16::from_le_bytes(array_at(data, 99, "fee_ratio")?),
            last_fee_collection_timestamp: u64::from_le_bytes(array_at(
                data,
                101,
                "last_fee_collection_timestamp",
            )?),
            fee_collection_period: u64::from_le_bytes(array_at(
                data,
                109,
                "fee_collection_period",
            )?),
        })
    }

    pub fn pack(&self) -> Result<[u8; POOL_HEADER_LEN], Error> {
        let mut out = [0u8; POOL_HEADER_LEN];
        out[0..32].copy_from_slice(self.serum_program_id.as_ref());
        out[32..64].copy_from_slice(&self.seed);
        out[64..96].copy_from_slice(self.signal_provider.as_ref());
        out[96] = self.status.to_byte()?;
        out[97..99].copy_from_slice(&self.number_of_markets.to_le_bytes());
        out[99..101].copy_from_slice(&self.fee_ratio.to_le_bytes());
        out[101..109].copy_from_slice(&self.last_fee_collection_timestamp.to_le_bytes());
        out[109..117].copy_from_slice(&self.fee_collection_period.to_le_bytes());
        Ok(out)
    }

    /// Byte offset of the first asset slot in the pool account.
    pub fn asset_offset(&self) -> usize {
        POOL_HEADER_LEN + PUBKEY_LEN * usize::from(self.number_of_markets)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolAsset {
    pub mint_address: Pubkey,
}

pub fn unpack_markets(data: &[u8], offset: usize, count: u16) -> Result<Vec<Pubkey>, Error> {
    (0..usize::from(count))
        .map(|i| pubkey_at(data, offset + i * PUBKEY_LEN, "authorized market"))
        .collect()
}

/// Unused slots (all-zero mint) are skipped; a trailing partial slot is ignored.
pub fn unpack_assets(data: &[u8]) -> Vec<PoolAsset> {
    data.chunks_exact(PUBKEY_LEN)
        .filter(|slot| !is_zero_key(slot))
        .filter_map(|slot| <[u8; PUBKEY_LEN]>::try_from(slot).ok())
        .map(|bytes| PoolAsset {
            mint_address: Pubkey::new_from_array(bytes),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolState {
    pub header: PoolHeader,
    pub markets: Vec<Pubkey>,
    pub assets: Vec<PoolAsset>,
}

impl PoolState {
    pub fn unpack(data: &[u8]) -> Result<Self, Error> {
        let header = PoolHeader::unpack(data)?;
        let markets = unpack_markets(data, POOL_HEADER_LEN, header.number_of_markets)?;
        let assets = data
            .get(header.asset_offset()..)
            .map(unpack_assets)
            .unwrap_or_default();
        Ok(Self {
            header,
            markets,
            assets,
        })
    }

    pub fn mints(&self) -> impl Iterator<Item = &Pubkey> {
        self.assets.iter().map(|a| &a.mint_address)
    }

    /// Resolves a CreateOrder `market_index` against the authorized list.
    pub fn market_at(&self, index: u16) -> Option<&Pubkey> {
        self.markets.get(usize::from(index))
    }
}

/// Seed byte appended to the pool seed when deriving the pool token mint.
pub const POOL_MINT_SEED_SUFFIX: u8 = 1;

/// The pool account is the program-derived address of its seed alone.
pub fn pool_address(program_id: &Pubkey, seed: &[u8; 32]) -> Result<Pubkey, Error> {
    derive_address(program_id, &[seed.as_slice()], "pool")
}

pub fn pool_mint_address(program_id: &Pubkey, seed: &[u8; 32]) -> Result<Pubkey, Error> {
    derive_address(
        program_id,
        &[seed.as_slice(), &[POOL_MINT_SEED_SUFFIX]],
        "pool mint",
    )
}

/// Seeds whose hash lands on the curve have no address; that is a `Format` error.
fn derive_address(program_id: &Pubkey, seeds: &[&[u8]], what: &str) -> Result<Pubkey, Error> {
    Pubkey::create_program_address(seeds, program_id)
        .map_err(|e| Error::format(format!("{what} seed does not derive an address: {e}")))
}
