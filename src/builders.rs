//! Instruction builders for every pool instruction.
//!
//! Each builder packs the instruction data through [`PoolInstruction::pack`] and lays out
//! the accounts in the order the pool program consumes them. Per-asset account lists
//! vary with the pool's asset count; optional trailing accounts are appended only when
//! supplied and never affect the data buffer. The pool and pool mint accounts are
//! derived from the pool seed, so a seed with no program address is a `Format` error.

use std::num::{NonZeroU16, NonZeroU64};

use solana_instruction::{AccountMeta, Instruction};
use solana_pubkey::Pubkey;

use crate::codec::instruction::PoolInstruction;
use crate::codec::state::{pool_address, pool_mint_address};
use crate::codec::{OrderType, SelfTradeBehavior, Side, checked_u64};
use crate::config::PoolConfig;
use crate::error::Error;

fn signer(pubkey: Pubkey) -> AccountMeta {
    AccountMeta::new_readonly(pubkey, true)
}

fn signer_mut(pubkey: Pubkey) -> AccountMeta {
    AccountMeta::new(pubkey, true)
}

fn writable(pubkey: Pubkey) -> AccountMeta {
    AccountMeta::new(pubkey, false)
}

fn readonly(pubkey: Pubkey) -> AccountMeta {
    AccountMeta::new_readonly(pubkey, false)
}

fn build(
    config: &PoolConfig,
    ix: &PoolInstruction,
    accounts: Vec<AccountMeta>,
) -> Result<Instruction, Error> {
    Ok(Instruction {
        program_id: config.pool_program_id,
        accounts,
        data: ix.pack()?,
    })
}

fn ensure_same_len(left: &[Pubkey], right: &[Pubkey], what: &str) -> Result<(), Error> {
    if left.len() != right.len() {
        return Err(Error::format(format!(
            "{what}: {} pool asset accounts but {} counterpart accounts",
            left.len(),
            right.len()
        )));
    }
    Ok(())
}

fn pool_keys(config: &PoolConfig, seed: &[u8; 32]) -> Result<(Pubkey, Pubkey), Error> {
    Ok((
        pool_address(&config.pool_program_id, seed)?,
        pool_mint_address(&config.pool_program_id, seed)?,
    ))
}

pub struct InitParams {
    pub pool_seed: [u8; 32],
    pub max_number_of_assets: u32,
    pub number_of_markets: u16,
    pub payer: Pubkey,
}

/// Accounts:
/// 0. system program
/// 1. rent sysvar
/// 2. token program
/// 3. pool (mut)
/// 4. pool mint (mut)
/// 5. payer (signer, mut)
pub fn build_init_ix(config: &PoolConfig, params: &InitParams) -> Result<Instruction, Error> {
    let (pool, pool_mint) = pool_keys(config, &params.pool_seed)?;
    let ix = PoolInstruction::Init {
        pool_seed: params.pool_seed,
        max_number_of_assets: params.max_number_of_assets,
        number_of_markets: params.number_of_markets,
    };
    build(
        config,
        &ix,
        vec![
            readonly(config.system_program_id),
            readonly(config.rent_sysvar_id),
            readonly(config.token_program_id),
            writable(pool),
            writable(pool_mint),
            signer_mut(params.payer),
        ],
    )
}

pub struct CreateParams {
    pub pool_seed: [u8; 32],
    pub fee_collection_period: u64,
    pub fee_ratio: u16,
    pub markets: Vec<Pubkey>,
    pub deposit_amounts: Vec<u64>,
    pub signal_provider: Pubkey,
    pub target_pool_token_account: Pubkey,
    pub pool_asset_accounts: Vec<Pubkey>,
    pub source_owner: Pubkey,
    pub source_asset_accounts: Vec<Pubkey>,
}

/// Every market must be authorized and live. One deposit amount per asset account.
pub fn build_create_ix(config: &PoolConfig, params: &CreateParams) -> Result<Instruction, Error> {
    for market in &params.markets {
        config.authorize_market(market)?;
    }
    ensure_same_len(
        &params.pool_asset_accounts,
        &params.source_asset_accounts,
        "create",
    )?;
    if params.deposit_amounts.len() != params.pool_asset_accounts.len() {
        return Err(Error::format(format!(
            "create: {} deposit amounts for {} assets",
            params.deposit_amounts.len(),
            params.pool_asset_accounts.len()
        )));
    }
    let (pool, pool_mint) = pool_keys(config, &params.pool_seed)?;

    let ix = PoolInstruction::Create {
        pool_seed: params.pool_seed,
        fee_collection_period: params.fee_collection_period,
        fee_ratio: params.fee_ratio,
        markets: params.markets.clone(),
        deposit_amounts: params.deposit_amounts.clone(),
    };

    let mut accounts = vec![
        readonly(config.token_program_id),
        readonly(config.clock_sysvar_id),
        readonly(config.serum_program_id),
        readonly(params.signal_provider),
        writable(pool_mint),
        writable(params.target_pool_token_account),
        writable(pool),
    ];
    accounts.extend(params.pool_asset_accounts.iter().copied().map(writable));
    accounts.push(signer(params.source_owner));
    accounts.extend(params.source_asset_accounts.iter().copied().map(writable));
    build(config, &ix, accounts)
}

pub struct DepositParams {
    pub pool_seed: [u8; 32],
    pub pool_token_amount: u64,
    pub target_pool_token_account: Pubkey,
    pub signal_provider_fee_account: Pubkey,
    pub protocol_fee_account: Pubkey,
    pub buy_and_burn_account: Pubkey,
    pub pool_asset_accounts: Vec<Pubkey>,
    pub source_owner: Pubkey,
    pub source_asset_accounts: Vec<Pubkey>,
}

pub fn build_deposit_ix(config: &PoolConfig, params: &DepositParams) -> Result<Instruction, Error> {
    ensure_same_len(
        &params.pool_asset_accounts,
        &params.source_asset_accounts,
        "deposit",
    )?;
    let (pool, pool_mint) = pool_keys(config, &params.pool_seed)?;
    let ix = PoolInstruction::Deposit {
        pool_seed: params.pool_seed,
        pool_token_amount: params.pool_token_amount,
    };
    let mut accounts = vec![
        readonly(config.token_program_id),
        writable(pool_mint),
        writable(params.target_pool_token_account),
        writable(params.signal_provider_fee_account),
        writable(params.protocol_fee_account),
        writable(params.buy_and_burn_account),
        readonly(pool),
    ];
    accounts.extend(params.pool_asset_accounts.iter().copied().map(writable));
    accounts.push(signer(params.source_owner));
    accounts.extend(params.source_asset_accounts.iter().copied().map(writable));
    build(config, &ix, accounts)
}

pub struct CreateOrderParams {
    pub pool_seed: [u8; 32],
    pub side: Side,
    pub limit_price: NonZeroU64,
    pub ratio_of_pool_assets_to_trade: NonZeroU16,
    pub order_type: OrderType,
    pub client_id: u64,
    pub self_trade_behavior: SelfTradeBehavior,
    /// Position of the source asset in the pool's asset list.
    pub source_index: usize,
    pub target_index: usize,
    pub market_index: u16,
    pub coin_lot_size: u64,
    pub pc_lot_size: u64,
    pub target_mint: Pubkey,
    pub serum_limit: u16,
    pub signal_provider: Pubkey,
    pub market: Pubkey,
    pub pool_asset_account: Pubkey,
    pub open_orders: Pubkey,
    pub event_queue: Pubkey,
    pub request_queue: Pubkey,
    pub bids: Pubkey,
    pub asks: Pubkey,
    pub coin_vault: Pubkey,
    pub pc_vault: Pubkey,
    /// Fee-discount token account, appended last when present.
    pub discount_account: Option<Pubkey>,
}

pub fn build_create_order_ix(
    config: &PoolConfig,
    params: &CreateOrderParams,
) -> Result<Instruction, Error> {
    config.authorize_market(&params.market)?;
    let pool = pool_address(&config.pool_program_id, &params.pool_seed)?;
    let ix = PoolInstruction::CreateOrder {
        pool_seed: params.pool_seed,
        side: params.side,
        limit_price: params.limit_price,
        ratio_of_pool_assets_to_trade: params.ratio_of_pool_assets_to_trade,
        order_type: params.order_type,
        client_id: params.client_id,
        self_trade_behavior: params.self_trade_behavior,
        source_index: checked_u64(params.source_index, "source_index")?,
        target_index: checked_u64(params.target_index, "target_index")?,
        market_index: params.market_index,
        coin_lot_size: params.coin_lot_size,
        pc_lot_size: params.pc_lot_size,
        target_mint: params.target_mint,
        serum_limit: params.serum_limit,
    };
    let mut accounts = vec![
        signer(params.signal_provider),
        writable(params.market),
        writable(params.pool_asset_account),
        writable(params.open_orders),
        writable(params.event_queue),
        writable(params.request_queue),
        writable(params.bids),
        writable(params.asks),
        writable(pool),
        writable(params.coin_vault),
        writable(params.pc_vault),
        readonly(config.token_program_id),
        readonly(config.rent_sysvar_id),
        readonly(config.serum_program_id),
    ];
    if let Some(discount) = params.discount_account {
        accounts.push(readonly(discount));
    }
    build(config, &ix, accounts)
}

pub struct CancelOrderParams {
    pub pool_seed: [u8; 32],
    pub side: Side,
    pub order_id: u128,
    pub signal_provider: Pubkey,
    pub market: Pubkey,
    pub open_orders: Pubkey,
    pub bids: Pubkey,
    pub asks: Pubkey,
    pub event_queue: Pubkey,
}

pub fn build_cancel_order_ix(
    config: &PoolConfig,
    params: &CancelOrderParams,
) -> Result<Instruction, Error> {
    let pool = pool_address(&config.pool_program_id, &params.pool_seed)?;
    let ix = PoolInstruction::CancelOrder {
        pool_seed: params.pool_seed,
        side: params.side,
        order_id: params.order_id,
    };
    build(
        config,
        &ix,
        vec![
            signer(params.signal_provider),
            readonly(params.market),
            writable(params.open_orders),
            writable(params.bids),
            writable(params.asks),
            writable(params.event_queue),
            readonly(pool),
            readonly(config.serum_program_id),
        ],
    )
}

pub struct SettleFundsParams {
    pub pool_seed: [u8; 32],
    pub pc_index: usize,
    pub coin_index: usize,
    pub market: Pubkey,
    pub open_orders: Pubkey,
    pub coin_vault: Pubkey,
    pub pc_vault: Pubkey,
    pub pool_coin_account: Pubkey,
    pub pool_pc_account: Pubkey,
    pub vault_signer: Pubkey,
    /// Referrer fee account, appended last when present.
    pub referrer: Option<Pubkey>,
}

pub fn build_settle_funds_ix(
    config: &PoolConfig,
    params: &SettleFundsParams,
) -> Result<Instruction, Error> {
    let (pool, pool_mint) = pool_keys(config, &params.pool_seed)?;
    let ix = PoolInstruction::SettleFunds {
        pool_seed: params.pool_seed,
        pc_index: checked_u64(params.pc_index, "pc_index")?,
        coin_index: checked_u64(params.coin_index, "coin_index")?,
    };
    let mut accounts = vec![
        writable(params.market),
        writable(params.open_orders),
        writable(pool),
        readonly(pool_mint),
        writable(params.coin_vault),
        writable(params.pc_vault),
        writable(params.pool_coin_account),
        writable(params.pool_pc_account),
        readonly(params.vault_signer),
        readonly(config.token_program_id),
        readonly(config.serum_program_id),
    ];
    if let Some(referrer) = params.referrer {
        accounts.push(writable(referrer));
    }
    build(config, &ix, accounts)
}

pub struct RedeemParams {
    pub pool_seed: [u8; 32],
    pub pool_token_amount: u64,
    pub source_pool_token_owner: Pubkey,
    pub source_pool_token_account: Pubkey,
    pub pool_asset_accounts: Vec<Pubkey>,
    pub target_asset_accounts: Vec<Pubkey>,
}

pub fn build_redeem_ix(config: &PoolConfig, params: &RedeemParams) -> Result<Instruction, Error> {
    ensure_same_len(
        &params.pool_asset_accounts,
        &params.target_asset_accounts,
        "redeem",
    )?;
    let (pool, pool_mint) = pool_keys(config, &params.pool_seed)?;
    let ix = PoolInstruction::Redeem {
        pool_seed: params.pool_seed,
        pool_token_amount: params.pool_token_amount,
    };
    let mut accounts = vec![
        readonly(config.token_program_id),
        readonly(config.clock_sysvar_id),
        writable(pool_mint),
        signer(params.source_pool_token_owner),
        writable(params.source_pool_token_account),
        writable(pool),
    ];
    accounts.extend(params.pool_asset_accounts.iter().copied().map(writable));
    accounts.extend(params.target_asset_accounts.iter().copied().map(writable));
    build(config, &ix, accounts)
}

pub struct CollectFeesParams {
    pub pool_seed: [u8; 32],
    pub signal_provider_fee_account: Pubkey,
    pub protocol_fee_account: Pubkey,
    pub buy_and_burn_account: Pubkey,
}

pub fn build_collect_fees_ix(
    config: &PoolConfig,
    params: &CollectFeesParams,
) -> Result<Instruction, Error> {
    let (pool, pool_mint) = pool_keys(config, &params.pool_seed)?;
    let ix = PoolInstruction::CollectFees {
        pool_seed: params.pool_seed,
    };
    build(
        config,
        &ix,
        vec![
            readonly(config.token_program_id),
            readonly(config.clock_sysvar_id),
            writable(pool),
            writable(pool_mint),
            writable(params.signal_provider_fee_account),
            writable(params.protocol_fee_account),
            writable(params.buy_and_burn_account),
        ],
    )
}
