#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use bitcoin::Network;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes};
use peg_liquidity::config::{GasFeeConversion, ProviderConfig};
use peg_liquidity::provider::{Clock, LocalSigner, ReservationEngine, Signer};
use peg_liquidity::store::{MemoryStore, RetainedQuoteStore};
use peg_liquidity::types::{QuoteHash, QuoteRequest, RQState, RetainedQuote};
use peg_liquidity::{Amount, Error};

pub const TEST_PRIVATE_KEY: &str =
    "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
pub const TEST_CHAIN_ID: u64 = 31;
pub const TEST_BTC_ADDR: &str = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";

pub fn test_config() -> ProviderConfig {
    ProviderConfig {
        btc_addr: TEST_BTC_ADDR.to_string(),
        btc_network: Network::Bitcoin,
        chain_id: TEST_CHAIN_ID,
        max_conf: 60,
        confirmations: BTreeMap::from([(3_000_000, 6), (100_000_000, 60)]),
        time_for_deposit: 3600,
        call_time: 7200,
        call_fee: Amount::from(1000u64),
        penalty_fee: Amount::from(2000u64),
        gas_fee_conversion: GasFeeConversion::default(),
    }
}

pub fn test_request(value: u64) -> QuoteRequest {
    QuoteRequest {
        fed_btc_addr: "3EktnHQD7RiAE6uzMj2ZifT9YgRrkSgzQX".to_string(),
        lbc_addr: "0x0000000000000000000000000000000000000001".to_string(),
        btc_refund_addr: "1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN2".to_string(),
        rsk_refund_addr: "0x0000000000000000000000000000000000000002".to_string(),
        contract_addr: "0x0000000000000000000000000000000000000003".to_string(),
        data: "0x".to_string(),
        value: Amount::from(value),
        gas_limit: 50_000,
    }
}

pub fn test_signer() -> Result<LocalSigner> {
    LocalSigner::from_private_key(TEST_PRIVATE_KEY, TEST_CHAIN_ID)
}

pub fn memory_engine() -> Result<ReservationEngine<MemoryStore, LocalSigner>> {
    Ok(ReservationEngine::new(
        Arc::new(MemoryStore::new()),
        Arc::new(test_signer()?),
    ))
}

pub fn hash(byte: u8) -> QuoteHash {
    QuoteHash([byte; 32])
}

pub fn amount(v: u64) -> Amount {
    Amount::from(v)
}

pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn now_unix(&self) -> Result<u64> {
        Ok(self.0)
    }
}

/// Clock set before the unix epoch.
pub struct BrokenClock;

impl Clock for BrokenClock {
    fn now_unix(&self) -> Result<u64> {
        anyhow::bail!("system clock is before the unix epoch")
    }
}

/// Signer whose key is unavailable.
pub struct LockedSigner;

impl Signer for LockedSigner {
    fn address(&self) -> Address {
        Address::zero()
    }

    fn sign_hash(&self, _hash: &[u8; 32]) -> Result<Vec<u8>, Error> {
        Err(Error::SigningFailure(anyhow::anyhow!("account is locked")))
    }

    fn sign_transaction(&self, _address: Address, _tx: &TypedTransaction) -> Result<Bytes, Error> {
        Err(Error::SigningFailure(anyhow::anyhow!("account is locked")))
    }
}

/// Store that reads through to memory but refuses every new reservation.
#[derive(Default)]
pub struct ReadOnlyStore {
    pub inner: MemoryStore,
}

impl RetainedQuoteStore for ReadOnlyStore {
    fn retain_quote(&self, record: &RetainedQuote) -> Result<(), Error> {
        Err(Error::PersistenceFailure(anyhow::anyhow!(
            "disk full while writing {}",
            record.quote_hash
        )))
    }

    fn reserve(&self, record: &RetainedQuote) -> Result<(), Error> {
        self.retain_quote(record)
    }

    fn get_retained_quote(&self, hash: &QuoteHash) -> Result<Option<RetainedQuote>, Error> {
        self.inner.get_retained_quote(hash)
    }

    fn set_liquidity(&self, balance: &Amount) -> Result<(), Error> {
        self.inner.set_liquidity(balance)
    }

    fn get_liquidity(&self) -> Result<Amount, Error> {
        self.inner.get_liquidity()
    }

    fn set_retained_quote_state(&self, hash: &QuoteHash, state: RQState) -> Result<(), Error> {
        self.inner.set_retained_quote_state(hash, state)
    }

    fn list_retained_quotes(&self, state: Option<RQState>) -> Result<Vec<RetainedQuote>, Error> {
        self.inner.list_retained_quotes(state)
    }
}
