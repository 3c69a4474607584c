mod support;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use assert_cmd::Command;
use predicates::str::contains;
use serde_json::Value;

use support::{TEST_PRIVATE_KEY, test_config, test_request};

struct CliEnv {
    dir: tempfile::TempDir,
    store_path: PathBuf,
    config_path: PathBuf,
}

impl CliEnv {
    fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create tempdir")?;
        let config_path = dir.path().join("provider.json");
        std::fs::write(&config_path, serde_json::to_vec_pretty(&test_config())?)
            .context("write provider config")?;
        Ok(Self {
            store_path: dir.path().join("lp_store.sqlite3"),
            config_path,
            dir,
        })
    }

    fn cmd(&self, args: &[&str]) -> Result<Command> {
        let mut cmd = Command::cargo_bin("lp_cli").context("locate lp_cli binary")?;
        cmd.arg("--store-path")
            .arg(&self.store_path)
            .arg("--config")
            .arg(&self.config_path)
            .arg("--private-key")
            .arg(TEST_PRIVATE_KEY)
            .args(args);
        Ok(cmd)
    }

    fn json(&self, args: &[&str]) -> Result<Value> {
        let out = self.cmd(args)?.assert().success().get_output().stdout.clone();
        serde_json::from_slice(&out).context("parse lp_cli output")
    }

    fn request_file(&self) -> Result<PathBuf> {
        let path = self.dir.path().join("request.json");
        std::fs::write(&path, serde_json::to_vec(&test_request(5_000_000))?)
            .context("write quote request")?;
        Ok(path)
    }
}

#[test]
fn cli_reserves_replays_and_releases() -> Result<()> {
    let env = CliEnv::new()?;
    let h = "45".repeat(32);

    let out = env.json(&["set-liquidity", "--amount", "220"])?;
    assert_eq!(out["balance"], "220");

    let first = env.json(&[
        "sign-quote",
        "--hash",
        &h,
        "--deposit-addr",
        "abc",
        "--req-liq",
        "200",
    ])?;
    let signature = first["signature"].as_str().context("signature")?.to_string();
    assert_eq!(signature.len(), 130);

    let out = env.json(&["get-liquidity"])?;
    assert_eq!(out["available"], "20");

    let replay = env.json(&[
        "sign-quote",
        "--hash",
        &h,
        "--deposit-addr",
        "xyz",
        "--req-liq",
        "1",
    ])?;
    assert_eq!(replay["signature"], signature.as_str());

    let waiting = env.json(&["list-retained-quotes", "--state", "waiting_for_deposit"])?;
    assert_eq!(waiting.as_array().map(Vec::len), Some(1));
    assert_eq!(waiting[0]["reqLiq"], "200");

    let record = env.json(&[
        "set-state",
        "--hash",
        &h,
        "--state",
        "call_for_user_succeeded",
    ])?;
    assert_eq!(record["state"], "call_for_user_succeeded");

    let out = env.json(&["get-liquidity"])?;
    assert_eq!(out["available"], "220");
    Ok(())
}

#[test]
fn cli_reports_insufficient_liquidity() -> Result<()> {
    let env = CliEnv::new()?;
    env.json(&["set-liquidity", "--amount", "100"])?;

    env.cmd(&[
        "sign-quote",
        "--hash",
        &"02".repeat(32),
        "--deposit-addr",
        "abc",
        "--req-liq",
        "101",
    ])?
    .assert()
    .failure()
    .stderr(contains("not enough liquidity"));

    let out = env.json(&["get-liquidity"])?;
    assert_eq!(out["available"], "100");

    env.cmd(&["get-retained-quote", "--hash", &"02".repeat(32)])?
        .assert()
        .failure()
        .stderr(contains("retained quote not found"));
    Ok(())
}

#[test]
fn cli_builds_hashable_quote() -> Result<()> {
    let env = CliEnv::new()?;
    let request = env.request_file()?;
    let request = request.to_str().context("utf-8 request path")?;

    let out = env.json(&[
        "build-quote",
        "--request",
        request,
        "--gas",
        "50000",
        "--gas-price",
        "10",
    ])?;
    assert_eq!(out["quote"]["callFee"], "501000");
    assert_eq!(out["quote"]["confirmations"], 60);
    assert_eq!(out["quoteHash"].as_str().map(str::len), Some(64));

    let quote: peg_liquidity::types::Quote = serde_json::from_value(out["quote"].clone())?;
    assert_eq!(
        quote.hash()?.to_hex(),
        out["quoteHash"].as_str().unwrap_or_default()
    );
    Ok(())
}

#[test]
fn cli_rejects_malformed_amount() -> Result<()> {
    let env = CliEnv::new()?;
    env.cmd(&["set-liquidity", "--amount", "12.5"])?
        .assert()
        .failure()
        .stderr(contains("invalid amount"));
    Ok(())
}
