use solana_pubkey::Pubkey;

use crate::codec::{parse_pubkey, pubkey_to_string};
use crate::error::Error;

pub const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";
pub const SERUM_DEX_V3_PROGRAM_ID: &str = "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin";
pub const SYSTEM_PROGRAM_ID: &str = "11111111111111111111111111111111";
pub const RENT_SYSVAR_ID: &str = "SysvarRent111111111111111111111111111111111";
pub const CLOCK_SYSVAR_ID: &str = "SysvarC1ock11111111111111111111111111111111";

const DEFAULT_FETCH_CONCURRENCY: usize = 8;
const DEFAULT_HISTORY_LIMIT: usize = 1_000;

/// A venue market the pool is allowed to trade on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketListing {
    pub address: Pubkey,
    pub name: Option<String>,
    /// Retired markets stay listed so their history still resolves, but new pools and
    /// orders must not reference them.
    pub deprecated: bool,
}

/// Identities and tables the codec and reconstructor are parameterized with.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub pool_program_id: Pubkey,
    pub token_program_id: Pubkey,
    pub serum_program_id: Pubkey,
    pub system_program_id: Pubkey,
    pub rent_sysvar_id: Pubkey,
    pub clock_sysvar_id: Pubkey,
    pub markets: Vec<MarketListing>,
    /// Upper bound on transaction fetches in flight during reconstruction.
    pub fetch_concurrency: usize,
    /// Signatures requested from the history endpoint per reconstruction.
    pub history_limit: usize,
}

#[derive(serde::Deserialize)]
struct MarketListingFile {
    address: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    deprecated: bool,
}

#[derive(serde::Deserialize)]
struct PoolConfigFile {
    pool_program_id: String,
    #[serde(default)]
    token_program_id: Option<String>,
    #[serde(default)]
    serum_program_id: Option<String>,
    #[serde(default)]
    markets: Vec<MarketListingFile>,
    #[serde(default)]
    fetch_concurrency: Option<usize>,
    #[serde(default)]
    history_limit: Option<usize>,
}

impl PoolConfig {
    /// Config with the well-known token/venue/sysvar identities and no allowed markets.
    pub fn new(pool_program_id: Pubkey) -> Result<Self, Error> {
        Ok(Self {
            pool_program_id,
            token_program_id: parse_pubkey(TOKEN_PROGRAM_ID)?,
            serum_program_id: parse_pubkey(SERUM_DEX_V3_PROGRAM_ID)?,
            system_program_id: parse_pubkey(SYSTEM_PROGRAM_ID)?,
            rent_sysvar_id: parse_pubkey(RENT_SYSVAR_ID)?,
            clock_sysvar_id: parse_pubkey(CLOCK_SYSVAR_ID)?,
            markets: Vec::new(),
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
            history_limit: DEFAULT_HISTORY_LIMIT,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, Error> {
        let file: PoolConfigFile = serde_json::from_str(json)?;
        let mut config = Self::new(parse_pubkey(&file.pool_program_id)?)?;
        if let Some(id) = file.token_program_id {
            config.token_program_id = parse_pubkey(&id)?;
        }
        if let Some(id) = file.serum_program_id {
            config.serum_program_id = parse_pubkey(&id)?;
        }
        config.markets = file
            .markets
            .into_iter()
            .map(|m| {
                Ok(MarketListing {
                    address: parse_pubkey(&m.address)?,
                    name: m.name,
                    deprecated: m.deprecated,
                })
            })
            .collect::<Result<_, Error>>()?;
        if let Some(n) = file.fetch_concurrency {
            config.fetch_concurrency = n.max(1);
        }
        if let Some(n) = file.history_limit {
            config.history_limit = n;
        }
        Ok(config)
    }

    pub fn with_market(mut self, address: Pubkey, name: Option<&str>, deprecated: bool) -> Self {
        self.markets.push(MarketListing {
            address,
            name: name.map(str::to_string),
            deprecated,
        });
        self
    }

    pub fn listing(&self, market: &Pubkey) -> Option<&MarketListing> {
        self.markets.iter().find(|m| m.address == *market)
    }

    /// Checks that `market` may be referenced by new pools and orders.
    pub fn authorize_market(&self, market: &Pubkey) -> Result<&MarketListing, Error> {
        let listing = self
            .listing(market)
            .ok_or_else(|| Error::UnauthorizedMarket {
                market: pubkey_to_string(market),
            })?;
        if listing.deprecated {
            return Err(Error::DeprecatedMarket {
                market: pubkey_to_string(market),
            });
        }
        Ok(listing)
    }
}
