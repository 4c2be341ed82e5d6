//! Ledger-backed reconstruction: reads the pool account and its history through a
//! [`LedgerSource`] and hands the result to the pure pairing in [`crate::activity`].

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use solana_pubkey::Pubkey;

use crate::activity::extract::PoolAssetIndex;
use crate::activity::normalize::{OrderActivity, normalize_order, required_mints};
use crate::activity::{ReconstructedOrder, reconstruct};
use crate::codec::market::MarketMetadata;
use crate::codec::pubkey_to_string;
use crate::codec::state::{POOL_HEADER_LEN, PoolState};
use crate::config::PoolConfig;
use crate::error::Error;
use crate::types::RawTransaction;

/// Read access to the ledger. Implementations report transport failures as
/// [`Error::Source`].
#[async_trait]
pub trait LedgerSource: Send + Sync {
    /// Raw account bytes, `None` when the account does not exist.
    async fn account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, Error>;

    /// Signatures touching `address`, newest first.
    async fn signatures_for_address(
        &self,
        address: &Pubkey,
        limit: usize,
    ) -> Result<Vec<String>, Error>;

    async fn transaction(&self, signature: &str) -> Result<Option<RawTransaction>, Error>;

    async fn mint_decimals(&self, mint: &Pubkey) -> Result<u8, Error>;
}

/// Derives the token account `owner` holds for `mint`.
pub trait AddressDerivation: Send + Sync {
    fn associated_account(&self, owner: &Pubkey, mint: &Pubkey) -> Pubkey;
}

impl<F> AddressDerivation for F
where
    F: Fn(&Pubkey, &Pubkey) -> Pubkey + Send + Sync,
{
    fn associated_account(&self, owner: &Pubkey, mint: &Pubkey) -> Pubkey {
        self(owner, mint)
    }
}

pub struct ActivityReconstructor<S, D> {
    config: PoolConfig,
    source: S,
    derive: D,
}

impl<S: LedgerSource, D: AddressDerivation> ActivityReconstructor<S, D> {
    pub fn new(config: PoolConfig, source: S, derive: D) -> Self {
        Self {
            config,
            source,
            derive,
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Reads and parses the pool account.
    pub async fn pool_snapshot(&self, pool: &Pubkey) -> Result<PoolState, Error> {
        let unavailable = |reason: String| Error::Unavailable {
            reason: format!("pool {}: {reason}", pubkey_to_string(pool)),
        };
        let data = match self.source.account_data(pool).await {
            Ok(Some(data)) => data,
            Ok(None) => return Err(unavailable("account not found".to_string())),
            Err(err) => return Err(unavailable(err.to_string())),
        };
        if data.len() < POOL_HEADER_LEN {
            return Err(unavailable(format!(
                "account holds {} bytes, header needs {POOL_HEADER_LEN}",
                data.len()
            )));
        }
        PoolState::unpack(&data)
    }

    /// Maps the pool's associated token account for each held mint back to the mint.
    pub fn asset_index(&self, pool: &Pubkey, state: &PoolState) -> PoolAssetIndex {
        state
            .mints()
            .map(|mint| (self.derive.associated_account(pool, mint), *mint))
            .collect()
    }

    /// Fetches up to `history_limit` transactions touching `pool`, newest first.
    ///
    /// Fetches run concurrently and complete in any order; the result is re-sorted by slot,
    /// ties keeping their history position. Transactions that cannot be fetched are logged
    /// and left out.
    pub async fn fetch_history(&self, pool: &Pubkey) -> Result<Vec<RawTransaction>, Error> {
        let signatures = self
            .source
            .signatures_for_address(pool, self.config.history_limit)
            .await?;

        let fetched: Vec<Option<(usize, RawTransaction)>> =
            stream::iter(signatures.iter().enumerate())
                .map(|(position, signature)| async move {
                    match self.source.transaction(signature).await {
                        Ok(Some(tx)) => Some((position, tx)),
                        Ok(None) => {
                            tracing::warn!(
                                signature = %signature,
                                "transaction not found, history is partial"
                            );
                            None
                        }
                        Err(err) => {
                            tracing::warn!(
                                signature = %signature,
                                error = %err,
                                "transaction fetch failed, history is partial"
                            );
                            None
                        }
                    }
                })
                .buffer_unordered(self.config.fetch_concurrency.max(1))
                .collect()
                .await;

        let mut history: Vec<(usize, RawTransaction)> = fetched.into_iter().flatten().collect();
        history.sort_by_key(|(position, tx)| (Reverse(tx.slot), *position));
        tracing::debug!(
            pool = %pubkey_to_string(pool),
            requested = signatures.len(),
            fetched = history.len(),
            "fetched pool history"
        );
        Ok(history.into_iter().map(|(_, tx)| tx).collect())
    }

    /// Paired orders for `pool`, newest first, before unit normalization.
    pub async fn pool_orders(
        &self,
        pool: &Pubkey,
        max_results: usize,
    ) -> Result<Vec<ReconstructedOrder>, Error> {
        let state = self.pool_snapshot(pool).await?;
        let assets = self.asset_index(pool, &state);
        let history = self.fetch_history(pool).await?;
        Ok(reconstruct(
            &self.config,
            pool,
            &assets,
            &history,
            max_results,
        ))
    }

    /// The pool's order activity in display units, newest first, at most `max_results`.
    ///
    /// Orders whose mint decimals cannot be resolved are logged and dropped.
    pub async fn pool_activity(
        &self,
        pool: &Pubkey,
        max_results: usize,
    ) -> Result<Vec<OrderActivity>, Error> {
        let orders = self.pool_orders(pool, max_results).await?;
        let markets = self.market_metadata(&orders).await;
        let decimals = self
            .resolve_decimals(&required_mints(&orders, &markets))
            .await;

        let mut activity = Vec::with_capacity(orders.len());
        for order in &orders {
            match normalize_order(order, markets.get(&order.order.market), &decimals) {
                Ok(normalized) => activity.push(normalized),
                Err(err) => {
                    tracing::warn!(
                        signature = %order.order.signature,
                        error = %err,
                        "dropping order that cannot be normalized"
                    );
                }
            }
        }
        Ok(activity)
    }

    async fn market_metadata(
        &self,
        orders: &[ReconstructedOrder],
    ) -> HashMap<Pubkey, MarketMetadata> {
        let mut markets = HashMap::new();
        let mut attempted = HashSet::new();
        for order in orders {
            let address = order.order.market;
            if !attempted.insert(address) {
                continue;
            }
            let parsed = match self.source.account_data(&address).await {
                Ok(Some(data)) => MarketMetadata::unpack(&data),
                Ok(None) => Err(Error::Unavailable {
                    reason: "market account not found".to_string(),
                }),
                Err(err) => Err(err),
            };
            match parsed {
                Ok(metadata) => {
                    markets.insert(address, metadata);
                }
                Err(err) => {
                    // Orders on this market fall back to their embedded lot sizes.
                    tracing::warn!(
                        market = %pubkey_to_string(&address),
                        error = %err,
                        "market metadata unavailable"
                    );
                }
            }
        }
        markets
    }

    async fn resolve_decimals(&self, mints: &[Pubkey]) -> HashMap<Pubkey, u8> {
        let mut decimals = HashMap::with_capacity(mints.len());
        for mint in mints {
            match self.source.mint_decimals(mint).await {
                Ok(d) => {
                    decimals.insert(*mint, d);
                }
                Err(err) => {
                    tracing::warn!(
                        mint = %pubkey_to_string(mint),
                        error = %err,
                        "mint decimals unavailable"
                    );
                }
            }
        }
        decimals
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "test assertions")]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::activity::test_support::*;
    use crate::codec::Side;

    #[derive(Default)]
    struct MockLedger {
        accounts: HashMap<Pubkey, Vec<u8>>,
        signatures: Vec<String>,
        transactions: HashMap<String, RawTransaction>,
        failing: HashSet<String>,
        decimals: HashMap<Pubkey, u8>,
        decimal_lookups: Mutex<Vec<Pubkey>>,
    }

    #[async_trait]
    impl LedgerSource for MockLedger {
        async fn account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, Error> {
            Ok(self.accounts.get(address).cloned())
        }

        async fn signatures_for_address(
            &self,
            _address: &Pubkey,
            limit: usize,
        ) -> Result<Vec<String>, Error> {
            Ok(self.signatures.iter().take(limit).cloned().collect())
        }

        async fn transaction(&self, signature: &str) -> Result<Option<RawTransaction>, Error> {
            if self.failing.contains(signature) {
                return Err(Error::Source {
                    reason: format!("timeout fetching {signature}"),
                });
            }
            let tx = self.transactions.get(signature).cloned();
            // Older transactions answer first so completion order differs from history order.
            if let Some(tx) = &tx {
                let delay = tx.slot.saturating_sub(9).min(20);
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            Ok(tx)
        }

        async fn mint_decimals(&self, mint: &Pubkey) -> Result<u8, Error> {
            self.decimal_lookups.lock().unwrap().push(*mint);
            self.decimals.get(mint).copied().ok_or_else(|| Error::Source {
                reason: "mint not found".to_string(),
            })
        }
    }

    const QUOTE: u8 = 41;
    const BASE: u8 = 40;

    fn derive(_owner: &Pubkey, mint: &Pubkey) -> Pubkey {
        if *mint == key(QUOTE) {
            key(3)
        } else {
            key(5)
        }
    }

    fn accounts() -> OrderAccounts {
        OrderAccounts {
            pool: key(1),
            market: key(2),
            pool_asset: key(3),
            open_orders: key(4),
        }
    }

    fn ledger() -> MockLedger {
        let a = accounts();
        let history = vec![
            order_tx("B", 15, &a, Side::Bid, 2_000_000),
            settle_tx("sA", 12, &a, &[(key(5), 250)]),
            order_tx("A", 10, &a, Side::Bid, 1_500_000),
        ];
        let mut ledger = MockLedger {
            signatures: vec![
                "B".to_string(),
                "broken".to_string(),
                "sA".to_string(),
                "A".to_string(),
            ],
            failing: ["broken".to_string()].into_iter().collect(),
            decimals: [(key(QUOTE), 6), (key(BASE), 2)].into_iter().collect(),
            ..MockLedger::default()
        };
        ledger.accounts.insert(
            a.pool,
            pool_account(&[a.market], &[key(QUOTE), key(BASE)], 1),
        );
        ledger.accounts.insert(
            a.market,
            market_account(a.market, key(BASE), key(QUOTE), (1, 10)),
        );
        ledger.transactions = history
            .into_iter()
            .map(|tx| (tx.signature.clone(), tx))
            .collect();
        ledger
    }

    fn reconstructor(
        ledger: MockLedger,
    ) -> ActivityReconstructor<MockLedger, fn(&Pubkey, &Pubkey) -> Pubkey> {
        ActivityReconstructor::new(config(), ledger, derive as fn(&Pubkey, &Pubkey) -> Pubkey)
    }

    #[tokio::test]
    async fn snapshot_parses_pool_account() {
        let r = reconstructor(ledger());
        let state = r.pool_snapshot(&key(1)).await.unwrap();
        assert_eq!(state.markets, vec![key(2)]);
        assert_eq!(
            state.mints().copied().collect::<Vec<_>>(),
            vec![key(QUOTE), key(BASE)]
        );

        let assets = r.asset_index(&key(1), &state);
        assert_eq!(assets.len(), 2);
        assert_eq!(assets.mint_for(&key(3)), Some(&key(QUOTE)));
        assert_eq!(assets.mint_for(&key(5)), Some(&key(BASE)));
    }

    #[tokio::test]
    async fn snapshot_reads_pool_at_order_limit() {
        let mut ledger = ledger();
        let pool = ledger.accounts.get_mut(&key(1)).unwrap();
        pool[96] = 0x7f;
        let r = reconstructor(ledger);
        let state = r.pool_snapshot(&key(1)).await.unwrap();
        assert_eq!(state.header.status.pending_orders(), 64);
        assert!(!state.header.status.is_locked());
        assert_eq!(r.pool_activity(&key(1), 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn missing_or_short_pool_is_unavailable() {
        let mut ledger = ledger();
        ledger.accounts.insert(key(9), vec![0; POOL_HEADER_LEN - 1]);
        let r = reconstructor(ledger);
        assert!(matches!(
            r.pool_snapshot(&key(8)).await,
            Err(Error::Unavailable { .. })
        ));
        assert!(matches!(
            r.pool_activity(&key(9), 10).await,
            Err(Error::Unavailable { .. })
        ));
    }

    #[tokio::test]
    async fn history_is_sorted_newest_first_despite_failed_fetch() {
        let r = reconstructor(ledger());
        let history = r.fetch_history(&key(1)).await.unwrap();
        let sigs: Vec<&str> = history.iter().map(|tx| tx.signature.as_str()).collect();
        assert_eq!(sigs, vec!["B", "sA", "A"]);
    }

    #[tokio::test]
    async fn pool_activity_pairs_and_normalizes() {
        let r = reconstructor(ledger());
        let activity = r.pool_activity(&key(1), 10).await.unwrap();
        assert_eq!(activity.len(), 2);

        let newest = &activity[0];
        assert_eq!(newest.signature, "B");
        assert_eq!(newest.settle_signature, None);
        assert!((newest.transferred_amount - 2.0).abs() < f64::EPSILON);

        let oldest = &activity[1];
        assert_eq!(oldest.signature, "A");
        assert_eq!(oldest.settle_signature.as_deref(), Some("sA"));
        assert!((oldest.limit_price - 1000.0).abs() < f64::EPSILON);
        assert!((oldest.transferred_amount - 1.5).abs() < f64::EPSILON);
        assert_eq!(oldest.settled[0].mint, pubkey_to_string(&key(BASE)));
        assert!((oldest.settled[0].amount - 2.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn decimals_are_resolved_once_per_mint() {
        let r = reconstructor(ledger());
        r.pool_activity(&key(1), 10).await.unwrap();
        let lookups = r.source.decimal_lookups.lock().unwrap().clone();
        assert_eq!(lookups, vec![key(QUOTE), key(BASE)]);
    }

    #[tokio::test]
    async fn unknown_decimals_drop_only_affected_orders() {
        let mut ledger = ledger();
        ledger.decimals.remove(&key(BASE));
        let r = reconstructor(ledger);
        let activity = r.pool_activity(&key(1), 10).await.unwrap();
        let sigs: Vec<&str> = activity.iter().map(|a| a.signature.as_str()).collect();
        assert_eq!(sigs, vec!["B"]);
    }

    #[tokio::test]
    async fn unreadable_market_falls_back_to_instruction_lot_sizes() {
        let mut ledger = ledger();
        ledger.accounts.remove(&key(2));
        let r = reconstructor(ledger);
        let activity = r.pool_activity(&key(1), 10).await.unwrap();
        assert_eq!(activity.len(), 2);
        assert!((activity[1].limit_price - 1000.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn closures_derive_addresses() {
        let r = ActivityReconstructor::new(config(), ledger(), |_: &Pubkey, mint: &Pubkey| {
            derive(&key(1), mint)
        });
        let orders = r.pool_orders(&key(1), 1).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].order.signature, "B");
    }
}
