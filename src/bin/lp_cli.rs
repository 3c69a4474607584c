use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Parser as _, Subcommand};
use peg_liquidity::Amount;
use peg_liquidity::config::ProviderConfig;
use peg_liquidity::provider::{LocalSigner, ReservationEngine, SystemClock};
use peg_liquidity::store::SqliteStore;
use peg_liquidity::types::{QuoteHash, QuoteRequest, RQState};
use serde_json::json;

#[derive(Debug, clap::Parser)]
struct Args {
    #[arg(long)]
    store_path: PathBuf,

    #[arg(long)]
    config: PathBuf,

    /// Hex private key of the provider account.
    #[arg(long, conflicts_with_all = ["keystore", "password_file"])]
    private_key: Option<String>,

    #[arg(long, requires = "password_file")]
    keystore: Option<PathBuf>,

    #[arg(long, requires = "keystore")]
    password_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    SetLiquidity {
        #[arg(long)]
        amount: Amount,
    },
    GetLiquidity,
    BuildQuote {
        /// JSON file holding a quote request.
        #[arg(long)]
        request: PathBuf,

        #[arg(long)]
        gas: u64,

        #[arg(long)]
        gas_price: Amount,
    },
    SignQuote {
        #[arg(long)]
        hash: QuoteHash,

        #[arg(long)]
        deposit_addr: String,

        #[arg(long)]
        req_liq: Amount,
    },
    GetRetainedQuote {
        #[arg(long)]
        hash: QuoteHash,
    },
    SetState {
        #[arg(long)]
        hash: QuoteHash,

        #[arg(long)]
        state: RQState,
    },
    ListRetainedQuotes {
        #[arg(long)]
        state: Option<RQState>,
    },
}

fn main() -> Result<()> {
    peg_liquidity::logging::init().ok();
    let args = Args::parse();

    let cfg = ProviderConfig::load(&args.config).context("load provider config")?;

    let signer = match (&args.private_key, &args.keystore, &args.password_file) {
        (Some(key), _, _) => LocalSigner::from_private_key(key, cfg.chain_id)?,
        (None, Some(keystore), Some(password_file)) => {
            LocalSigner::from_keystore(keystore, password_file, cfg.chain_id)?
        }
        _ => anyhow::bail!("either --private-key or --keystore with --password-file is required"),
    };

    let store = SqliteStore::open(args.store_path).context("open sqlite store")?;
    tracing::info!(store_path = %store.path().display(), "store ready");

    let engine = ReservationEngine::new(Arc::new(store), Arc::new(signer));

    let out = match args.command {
        Command::SetLiquidity { amount } => {
            engine.set_liquidity(&amount).context("set liquidity")?;
            json!({ "balance": amount })
        }
        Command::GetLiquidity => {
            let available = engine
                .available_liquidity()
                .context("get available liquidity")?;
            json!({ "available": available })
        }
        Command::BuildQuote {
            request,
            gas,
            gas_price,
        } => {
            let raw = std::fs::read_to_string(&request)
                .with_context(|| format!("read quote request {}", request.display()))?;
            let request: QuoteRequest =
                serde_json::from_str(&raw).context("parse quote request")?;
            let quote = engine
                .build_quote(&cfg, request, gas, &gas_price, &SystemClock)
                .context("build quote")?;
            let hash = quote.hash().context("hash quote")?;
            json!({ "quote": quote, "quoteHash": hash })
        }
        Command::SignQuote {
            hash,
            deposit_addr,
            req_liq,
        } => {
            let signature = engine
                .sign_quote(&hash, &deposit_addr, &req_liq)
                .context("sign quote")?;
            json!({ "quoteHash": hash, "signature": hex::encode(signature) })
        }
        Command::GetRetainedQuote { hash } => {
            let record = engine.retained_quote(&hash).context("get retained quote")?;
            serde_json::to_value(record).context("encode retained quote")?
        }
        Command::SetState { hash, state } => {
            engine
                .transition_state(&hash, state)
                .context("set retained quote state")?;
            let record = engine.retained_quote(&hash).context("get retained quote")?;
            serde_json::to_value(record).context("encode retained quote")?
        }
        Command::ListRetainedQuotes { state } => {
            let records = engine
                .list_retained_quotes(state)
                .context("list retained quotes")?;
            serde_json::to_value(records).context("encode retained quotes")?
        }
    };

    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
