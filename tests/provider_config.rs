mod support;

use std::io::Write as _;

use anyhow::{Context as _, Result};
use peg_liquidity::Amount;
use peg_liquidity::config::{GasFeeConversion, ProviderConfig};

use support::{TEST_BTC_ADDR, test_config};

#[test]
fn load_reads_json_config() -> Result<()> {
    let mut file = tempfile::NamedTempFile::new().context("create temp config")?;
    write!(
        file,
        r#"{{
  "btc_addr": "{TEST_BTC_ADDR}",
  "btc_network": "bitcoin",
  "chain_id": 31,
  "max_conf": 60,
  "confirmations": {{ "3000000": 6, "100000000": 60 }},
  "time_for_deposit": 3600,
  "call_time": 7200,
  "call_fee": "1000",
  "penalty_fee": "2000"
}}"#
    )?;

    let cfg = ProviderConfig::load(file.path())?;
    assert_eq!(cfg.chain_id, 31);
    assert_eq!(cfg.confirmations.get(&3_000_000), Some(&6));
    assert_eq!(cfg.call_fee, Amount::from(1000u64));
    assert_eq!(cfg.gas_fee_conversion, GasFeeConversion::default());
    Ok(())
}

#[test]
fn load_rejects_numeric_fee() -> Result<()> {
    let mut file = tempfile::NamedTempFile::new().context("create temp config")?;
    write!(
        file,
        r#"{{
  "btc_addr": "{TEST_BTC_ADDR}",
  "btc_network": "bitcoin",
  "chain_id": 31,
  "max_conf": 60,
  "time_for_deposit": 3600,
  "call_time": 7200,
  "call_fee": 1000,
  "penalty_fee": "2000"
}}"#
    )?;

    assert!(ProviderConfig::load(file.path()).is_err());
    Ok(())
}

#[test]
fn validate_checks_btc_address_network() {
    let mut cfg = test_config();
    cfg.validate().expect("valid config");

    cfg.btc_addr = "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx".to_string();
    assert!(cfg.validate().is_err());

    cfg.btc_addr = "not-a-btc-address".to_string();
    assert!(cfg.validate().is_err());
}

#[test]
fn validate_checks_fee_conversion_and_tiers() {
    let mut cfg = test_config();
    cfg.gas_fee_conversion.denominator = 0;
    assert!(cfg.validate().is_err());

    let mut cfg = test_config();
    cfg.confirmations.insert(500_000_000, 61);
    assert!(cfg.validate().is_err());

    let mut cfg = test_config();
    cfg.penalty_fee = Amount::from(-1i64);
    assert!(cfg.validate().is_err());
}
