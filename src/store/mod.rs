pub mod sqlite;

use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::amount::Amount;
use crate::error::{Error, Result};
use crate::types::{QuoteHash, RQState, RetainedQuote};

pub use sqlite::SqliteStore;

/// Durable reservations plus the operator-set liquidity balance.
///
/// Records are created once and never deleted; only `state` changes afterwards.
/// `get_liquidity` is derived: balance minus `req_liq` of every record still in
/// `WaitingForDeposit`.
///
/// `reserve` and `set_liquidity` are atomic against the store itself, so
/// several handles on the same backing data can never overcommit the balance.
pub trait RetainedQuoteStore: Send + Sync {
    /// Fails with [`Error::AlreadyRetained`] if the hash is already present.
    fn retain_quote(&self, record: &RetainedQuote) -> Result<()>;

    /// Retains `record` only if its `req_liq` fits the available liquidity,
    /// checked and written as one unit.
    ///
    /// Fails with [`Error::AlreadyRetained`] or [`Error::InsufficientLiquidity`]
    /// and leaves the store untouched.
    fn reserve(&self, record: &RetainedQuote) -> Result<()>;

    fn get_retained_quote(&self, hash: &QuoteHash) -> Result<Option<RetainedQuote>>;

    /// Fails with [`Error::InsufficientLiquidity`] if `balance` is below what
    /// active reservations hold.
    fn set_liquidity(&self, balance: &Amount) -> Result<()>;

    /// Available liquidity, already net of active reservations.
    fn get_liquidity(&self) -> Result<Amount>;

    /// Fails with [`Error::RecordNotFound`] if the hash is unknown.
    fn set_retained_quote_state(&self, hash: &QuoteHash, state: RQState) -> Result<()>;

    fn list_retained_quotes(&self, state: Option<RQState>) -> Result<Vec<RetainedQuote>>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    balance: Amount,
    quotes: BTreeMap<QuoteHash, RetainedQuote>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MemoryInner {
    fn reserved(&self) -> Amount {
        self.quotes
            .values()
            .filter(|q| q.state.is_active())
            .map(|q| &q.req_liq)
            .sum()
    }
}

impl RetainedQuoteStore for MemoryStore {
    fn retain_quote(&self, record: &RetainedQuote) -> Result<()> {
        let mut inner = self.inner.write().expect("memory store lock poisoned");
        if inner.quotes.contains_key(&record.quote_hash) {
            return Err(Error::AlreadyRetained(record.quote_hash));
        }
        inner.quotes.insert(record.quote_hash, record.clone());
        Ok(())
    }

    fn reserve(&self, record: &RetainedQuote) -> Result<()> {
        let mut inner = self.inner.write().expect("memory store lock poisoned");
        if inner.quotes.contains_key(&record.quote_hash) {
            return Err(Error::AlreadyRetained(record.quote_hash));
        }
        let available = &inner.balance - &inner.reserved();
        if available < record.req_liq {
            return Err(Error::InsufficientLiquidity {
                required: record.req_liq.clone(),
                available,
            });
        }
        inner.quotes.insert(record.quote_hash, record.clone());
        Ok(())
    }

    fn get_retained_quote(&self, hash: &QuoteHash) -> Result<Option<RetainedQuote>> {
        let inner = self.inner.read().expect("memory store lock poisoned");
        Ok(inner.quotes.get(hash).cloned())
    }

    fn set_liquidity(&self, balance: &Amount) -> Result<()> {
        let mut inner = self.inner.write().expect("memory store lock poisoned");
        let reserved = inner.reserved();
        if *balance < reserved {
            return Err(Error::InsufficientLiquidity {
                required: reserved,
                available: balance.clone(),
            });
        }
        inner.balance = balance.clone();
        Ok(())
    }

    fn get_liquidity(&self) -> Result<Amount> {
        let inner = self.inner.read().expect("memory store lock poisoned");
        Ok(&inner.balance - &inner.reserved())
    }

    fn set_retained_quote_state(&self, hash: &QuoteHash, state: RQState) -> Result<()> {
        let mut inner = self.inner.write().expect("memory store lock poisoned");
        let record = inner
            .quotes
            .get_mut(hash)
            .ok_or(Error::RecordNotFound(*hash))?;
        record.state = state;
        Ok(())
    }

    fn list_retained_quotes(&self, state: Option<RQState>) -> Result<Vec<RetainedQuote>> {
        let inner = self.inner.read().expect("memory store lock poisoned");
        Ok(inner
            .quotes
            .values()
            .filter(|q| state.is_none_or(|s| q.state == s))
            .cloned()
            .collect())
    }
}
