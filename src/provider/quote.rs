use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context as _, Result};
use rand::{CryptoRng, RngCore};

use crate::amount::Amount;
use crate::config::ProviderConfig;
use crate::types::{Quote, QuoteRequest};

pub trait Clock {
    /// Seconds since the unix epoch.
    fn now_unix(&self) -> Result<u64>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> Result<u64> {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .context("system clock is before the unix epoch")?;
        Ok(elapsed.as_secs())
    }
}

/// Fills in provider terms for a request. Reads only the clock and the rng.
///
/// A clock that cannot be expressed as a 32-bit agreement timestamp is an error;
/// the quote is never committed to a substituted time.
#[derive(Debug, Clone)]
pub struct QuoteFactory<'a> {
    cfg: &'a ProviderConfig,
    lp_rsk_addr: String,
}

impl<'a> QuoteFactory<'a> {
    pub fn new(cfg: &'a ProviderConfig, lp_rsk_addr: impl Into<String>) -> Self {
        Self {
            cfg,
            lp_rsk_addr: lp_rsk_addr.into(),
        }
    }

    pub fn build_quote<C, R>(
        &self,
        request: QuoteRequest,
        gas: u64,
        gas_price: &Amount,
        clock: &C,
        rng: &mut R,
    ) -> Result<Quote>
    where
        C: Clock + ?Sized,
        R: RngCore + CryptoRng + ?Sized,
    {
        let confirmations = self.cfg.confirmations_for(&request.value);
        let call_fee = &self.cfg.call_fee + &self.call_cost(gas, gas_price);
        let now = clock.now_unix()?;
        let agreement_timestamp = u32::try_from(now)
            .with_context(|| format!("agreement timestamp {now} does not fit 32 bits"))?;

        Ok(Quote {
            fed_btc_addr: request.fed_btc_addr,
            lbc_addr: request.lbc_addr,
            lp_rsk_addr: self.lp_rsk_addr.clone(),
            btc_refund_addr: request.btc_refund_addr,
            rsk_refund_addr: request.rsk_refund_addr,
            lp_btc_addr: self.cfg.btc_addr.clone(),
            call_fee,
            penalty_fee: self.cfg.penalty_fee.clone(),
            contract_addr: request.contract_addr,
            data: request.data,
            gas_limit: request.gas_limit,
            nonce: quote_nonce(rng),
            value: request.value,
            agreement_timestamp,
            time_for_deposit: self.cfg.time_for_deposit,
            call_time: self.cfg.call_time,
            confirmations,
        })
    }

    /// On-chain cost of the call, converted to the fee unit and rounded up.
    pub fn call_cost(&self, gas: u64, gas_price: &Amount) -> Amount {
        let gas_cost = Amount::from(gas) * gas_price.clone();
        self.cfg.gas_fee_conversion.convert(&gas_cost)
    }
}

/// Non-zero 64-bit salt drawn from a cryptographic rng.
fn quote_nonce<R: RngCore + CryptoRng + ?Sized>(rng: &mut R) -> u64 {
    loop {
        let nonce = rng.next_u64();
        if nonce != 0 {
            return nonce;
        }
    }
}
