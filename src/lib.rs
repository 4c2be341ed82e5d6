#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::dbg_macro,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::panic,
    )
)]

pub mod activity;
pub mod builders;
pub mod codec;
pub mod config;
pub mod error;
pub mod types;

pub use activity::extract::{EventExtractor, PoolAssetIndex};
pub use activity::ledger::{ActivityReconstructor, AddressDerivation, LedgerSource};
pub use activity::normalize::{NormalizedAmount, OrderActivity, amount_to_ui, normalize_order};
pub use activity::{
    ActivityEngine, ActivityEvent, OrderEvent, ReconstructedOrder, SettleEvent, SettledAmount,
    reconstruct,
};
pub use codec::instruction::{InstructionTag, PoolInstruction};
pub use codec::market::{MarketMetadata, lots_to_price};
pub use codec::state::{
    PoolAsset, PoolHeader, PoolState, PoolStatus, pool_address, pool_mint_address,
};
pub use codec::{OrderType, SelfTradeBehavior, Side};
pub use config::{MarketListing, PoolConfig};
pub use error::Error;
pub use types::{RawInnerInstructions, RawInstruction, RawTransaction};
