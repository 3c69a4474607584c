//! Liquidity reservation and quote commitment.
//!
//! Available liquidity is never stored. It is always the balance minus the
//! `req_liq` of every reservation still in `WaitingForDeposit`, so moving a
//! record out of that state releases its capital exactly once.
//!
//! New reservations are decided by the store: [`RetainedQuoteStore::reserve`]
//! checks for a duplicate, checks availability and inserts as one unit, so
//! engines in other processes sharing the same database cannot overcommit the
//! pool either. Signing happens before that call since it touches no shared
//! state; the signature is only persisted if the store accepts the reservation.

use std::sync::{Arc, Mutex};

use rand::rngs::OsRng;

use crate::amount::Amount;
use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::provider::quote::{Clock, QuoteFactory};
use crate::provider::signer::Signer;
use crate::store::RetainedQuoteStore;
use crate::types::{Quote, QuoteHash, QuoteRequest, RQState, RetainedQuote};

pub struct ReservationEngine<S, G> {
    store: Arc<S>,
    signer: Arc<G>,
    transition_lock: Mutex<()>,
}

impl<S, G> ReservationEngine<S, G>
where
    S: RetainedQuoteStore,
    G: Signer,
{
    pub fn new(store: Arc<S>, signer: Arc<G>) -> Self {
        Self {
            store,
            signer,
            transition_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn signer(&self) -> &Arc<G> {
        &self.signer
    }

    /// Quote terms for `request`, committed to by this provider's address.
    pub fn build_quote<C: Clock + ?Sized>(
        &self,
        cfg: &ProviderConfig,
        request: QuoteRequest,
        gas: u64,
        gas_price: &Amount,
        clock: &C,
    ) -> anyhow::Result<Quote> {
        let lp_rsk_addr = ethers::utils::to_checksum(&self.signer.address(), None);
        QuoteFactory::new(cfg, lp_rsk_addr).build_quote(
            request,
            gas,
            gas_price,
            clock,
            &mut OsRng,
        )
    }

    /// Commits to `hash` and reserves `req_liq` for it.
    ///
    /// A hash that is already retained returns its stored signature; the
    /// arguments of the repeated call are ignored and nothing changes.
    pub fn sign_quote(
        &self,
        hash: &QuoteHash,
        deposit_addr: &str,
        req_liq: &Amount,
    ) -> Result<Vec<u8>> {
        if let Some(existing) = self.store.get_retained_quote(hash)? {
            tracing::debug!(quote_hash = %hash, "quote already retained");
            return decode_signature(&existing);
        }

        if req_liq.is_negative() {
            return Err(Error::InvalidAmount {
                field: "req_liq",
                amount: req_liq.clone(),
            });
        }

        // Early rejection before signing; the store re-checks when it writes.
        let available = self.store.get_liquidity()?;
        if available < *req_liq {
            return Err(rejected(hash, req_liq.clone(), available));
        }

        let signature = self.signer.sign_hash(hash.as_bytes())?;

        let record = RetainedQuote {
            quote_hash: *hash,
            deposit_addr: deposit_addr.to_string(),
            signature_hex: hex::encode(&signature),
            req_liq: req_liq.clone(),
            state: RQState::WaitingForDeposit,
        };
        match self.store.reserve(&record) {
            Ok(()) => {}
            Err(Error::AlreadyRetained(_)) => {
                tracing::debug!(quote_hash = %hash, "quote retained concurrently");
                return decode_signature(&self.retained_quote(hash)?);
            }
            Err(Error::InsufficientLiquidity {
                required,
                available,
            }) => return Err(rejected(hash, required, available)),
            Err(e) => return Err(e),
        }

        tracing::info!(
            quote_hash = %hash,
            deposit_addr,
            req_liq = %req_liq,
            "quote retained"
        );
        Ok(signature)
    }

    /// Moves a retained quote along the state machine.
    ///
    /// Re-applying the current state is a no-op. Leaving `WaitingForDeposit`
    /// releases the reserved liquidity as a consequence of the derivation.
    pub fn transition_state(&self, hash: &QuoteHash, new_state: RQState) -> Result<()> {
        let _guard = self
            .transition_lock
            .lock()
            .expect("transition mutex poisoned");

        let record = self.retained_quote(hash)?;
        if record.state == new_state {
            tracing::debug!(quote_hash = %hash, state = %new_state, "state unchanged");
            return Ok(());
        }
        if !record.state.can_transition_to(new_state) {
            return Err(Error::InvalidTransition {
                hash: *hash,
                from: record.state,
                to: new_state,
            });
        }

        self.store.set_retained_quote_state(hash, new_state)?;

        if record.state.is_active() {
            tracing::info!(
                quote_hash = %hash,
                from = %record.state,
                to = %new_state,
                released = %record.req_liq,
                "retained quote state changed, liquidity released"
            );
        } else {
            tracing::info!(
                quote_hash = %hash,
                from = %record.state,
                to = %new_state,
                "retained quote state changed"
            );
        }
        Ok(())
    }

    pub fn retained_quote(&self, hash: &QuoteHash) -> Result<RetainedQuote> {
        self.store
            .get_retained_quote(hash)?
            .ok_or(Error::RecordNotFound(*hash))
    }

    pub fn list_retained_quotes(&self, state: Option<RQState>) -> Result<Vec<RetainedQuote>> {
        self.store.list_retained_quotes(state)
    }

    /// Sets the total balance. Active reservations are deducted when reading availability,
    /// so the store refuses a balance below what they currently hold.
    pub fn set_liquidity(&self, balance: &Amount) -> Result<()> {
        if balance.is_negative() {
            return Err(Error::InvalidAmount {
                field: "liquidity balance",
                amount: balance.clone(),
            });
        }
        self.store.set_liquidity(balance)?;
        tracing::info!(balance = %balance, "liquidity balance set");
        Ok(())
    }

    pub fn available_liquidity(&self) -> Result<Amount> {
        self.store.get_liquidity()
    }

    pub fn has_liquidity(&self, amount: &Amount) -> Result<bool> {
        Ok(self.available_liquidity()? >= *amount)
    }

}

fn rejected(hash: &QuoteHash, required: Amount, available: Amount) -> Error {
    tracing::info!(
        quote_hash = %hash,
        required = %required,
        available = %available,
        "quote rejected, not enough liquidity"
    );
    Error::InsufficientLiquidity {
        required,
        available,
    }
}

fn decode_signature(record: &RetainedQuote) -> Result<Vec<u8>> {
    hex::decode(&record.signature_hex).map_err(|e| {
        Error::PersistenceFailure(anyhow::anyhow!(
            "stored signature for {} is not hex: {e}",
            record.quote_hash
        ))
    })
}
