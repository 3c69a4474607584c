use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr as _;

use anyhow::{Context as _, Result};
use bitcoin::Network;
use serde::{Deserialize, Serialize};

use crate::amount::Amount;

/// Rational factor turning `gas * gas_price` into the provider's fee unit.
///
/// The converted fee is rounded up, so the provider never under-charges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasFeeConversion {
    pub numerator: u64,
    pub denominator: u64,
}

impl Default for GasFeeConversion {
    fn default() -> Self {
        Self {
            numerator: 1,
            denominator: 1,
        }
    }
}

impl GasFeeConversion {
    pub fn convert(&self, gas_cost: &Amount) -> Amount {
        gas_cost.mul_div_ceil(self.numerator, self.denominator)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub btc_addr: String,
    #[serde(default = "default_btc_network")]
    pub btc_network: Network,
    pub chain_id: u64,
    pub max_conf: u16,
    /// Ascending value thresholds (wei) to required confirmations.
    #[serde(default)]
    pub confirmations: BTreeMap<u64, u16>,
    pub time_for_deposit: u32,
    pub call_time: u32,
    pub call_fee: Amount,
    pub penalty_fee: Amount,
    #[serde(default)]
    pub gas_fee_conversion: GasFeeConversion,
}

fn default_btc_network() -> Network {
    Network::Regtest
}

impl ProviderConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read provider config {}", path.display()))?;
        let cfg: Self = serde_json::from_str(&raw)
            .with_context(|| format!("parse provider config {}", path.display()))?;
        cfg.validate().context("validate provider config")?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        bitcoin::Address::from_str(&self.btc_addr)
            .with_context(|| format!("parse btc_addr {}", self.btc_addr))?
            .require_network(self.btc_network)
            .with_context(|| format!("btc_addr is not a {} address", self.btc_network))?;

        anyhow::ensure!(
            self.gas_fee_conversion.denominator > 0,
            "gas_fee_conversion.denominator must be > 0"
        );
        anyhow::ensure!(!self.call_fee.is_negative(), "call_fee must be >= 0");
        anyhow::ensure!(!self.penalty_fee.is_negative(), "penalty_fee must be >= 0");
        if let Some((threshold, confs)) = self
            .confirmations
            .iter()
            .find(|(_, confs)| **confs > self.max_conf)
        {
            anyhow::bail!(
                "confirmations for threshold {threshold} ({confs}) exceed max_conf {}",
                self.max_conf
            );
        }
        Ok(())
    }

    /// Confirmations for the smallest threshold strictly above `value`, else `max_conf`.
    pub fn confirmations_for(&self, value: &Amount) -> u16 {
        self.confirmations
            .iter()
            .find(|(threshold, _)| *value < Amount::from(**threshold))
            .map(|(_, confs)| *confs)
            .unwrap_or(self.max_conf)
    }
}
