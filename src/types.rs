use std::fmt;
use std::str::FromStr;

use anyhow::{Context as _, Result};
use ethers::types::Address;
use ethers::utils::keccak256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::amount::Amount;

/// Canonical identity of a [`Quote`]; keys the store and is what gets signed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QuoteHash(pub [u8; 32]);

impl QuoteHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; 32]> for QuoteHash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for QuoteHash {
    type Error = anyhow::Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("quote hash must be 32 bytes, got {}", bytes.len()))?;
        Ok(Self(arr))
    }
}

impl FromStr for QuoteHash {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let raw = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(raw).with_context(|| format!("decode quote hash {s}"))?;
        Self::try_from(bytes.as_slice())
    }
}

impl fmt::Display for QuoteHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for QuoteHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QuoteHash({})", self.to_hex())
    }
}

impl Serialize for QuoteHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for QuoteHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(|e: anyhow::Error| serde::de::Error::custom(format!("{e:#}")))
    }
}

/// Caller-supplied part of a quote, before the provider fills in its terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub fed_btc_addr: String,
    pub lbc_addr: String,
    pub btc_refund_addr: String,
    pub rsk_refund_addr: String,
    pub contract_addr: String,
    pub data: String,
    pub value: Amount,
    pub gas_limit: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub fed_btc_addr: String,
    pub lbc_addr: String,
    pub lp_rsk_addr: String,
    pub btc_refund_addr: String,
    pub rsk_refund_addr: String,
    pub lp_btc_addr: String,
    pub call_fee: Amount,
    pub penalty_fee: Amount,
    pub contract_addr: String,
    pub data: String,
    pub gas_limit: u32,
    pub nonce: u64,
    pub value: Amount,
    pub agreement_timestamp: u32,
    pub time_for_deposit: u32,
    pub call_time: u32,
    pub confirmations: u16,
}

impl Quote {
    /// keccak256 over one 32-byte word per field, in declaration order.
    ///
    /// Smart-chain addresses are left-padded, integers are big-endian, and the
    /// variable-length fields (BTC addresses, call data) contribute their own
    /// keccak256.
    pub fn hash(&self) -> Result<QuoteHash> {
        let data = hex::decode(self.data.strip_prefix("0x").unwrap_or(&self.data))
            .context("decode quote data")?;

        let mut encoded = Vec::with_capacity(17 * 32);
        encoded.extend_from_slice(&keccak256(self.fed_btc_addr.as_bytes()));
        encoded.extend_from_slice(&encode_address(&self.lbc_addr).context("lbc_addr")?);
        encoded.extend_from_slice(&encode_address(&self.lp_rsk_addr).context("lp_rsk_addr")?);
        encoded.extend_from_slice(&keccak256(self.btc_refund_addr.as_bytes()));
        encoded
            .extend_from_slice(&encode_address(&self.rsk_refund_addr).context("rsk_refund_addr")?);
        encoded.extend_from_slice(&keccak256(self.lp_btc_addr.as_bytes()));
        encoded.extend_from_slice(&encode_amount(&self.call_fee).context("call_fee")?);
        encoded.extend_from_slice(&encode_amount(&self.penalty_fee).context("penalty_fee")?);
        encoded.extend_from_slice(&encode_address(&self.contract_addr).context("contract_addr")?);
        encoded.extend_from_slice(&keccak256(&data));
        encoded.extend_from_slice(&encode_uint(u64::from(self.gas_limit)));
        encoded.extend_from_slice(&encode_uint(self.nonce));
        encoded.extend_from_slice(&encode_amount(&self.value).context("value")?);
        encoded.extend_from_slice(&encode_uint(u64::from(self.agreement_timestamp)));
        encoded.extend_from_slice(&encode_uint(u64::from(self.time_for_deposit)));
        encoded.extend_from_slice(&encode_uint(u64::from(self.call_time)));
        encoded.extend_from_slice(&encode_uint(u64::from(self.confirmations)));

        Ok(QuoteHash(keccak256(&encoded)))
    }
}

fn encode_address(addr: &str) -> Result<[u8; 32]> {
    let addr = Address::from_str(addr).with_context(|| format!("parse address {addr}"))?;
    let mut buf = [0u8; 32];
    buf[12..].copy_from_slice(addr.as_bytes());
    Ok(buf)
}

fn encode_amount(amount: &Amount) -> Result<[u8; 32]> {
    amount
        .to_be_word()
        .with_context(|| format!("amount {amount} does not fit an unsigned 256-bit word"))
}

fn encode_uint(value: u64) -> [u8; 32] {
    let mut buf = [0u8; 32];
    buf[24..].copy_from_slice(&value.to_be_bytes());
    buf
}

/// Lifecycle of a reservation. Only `WaitingForDeposit` holds liquidity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RQState {
    WaitingForDeposit,
    TimeForDepositElapsed,
    CallForUserSucceeded,
    CallForUserFailed,
    RegisterPegInSucceeded,
    RegisterPegInFailed,
    RefundLiquiditySucceeded,
    RefundLiquidityFailed,
    InternalError,
}

impl RQState {
    pub const ALL: [RQState; 9] = [
        RQState::WaitingForDeposit,
        RQState::TimeForDepositElapsed,
        RQState::CallForUserSucceeded,
        RQState::CallForUserFailed,
        RQState::RegisterPegInSucceeded,
        RQState::RegisterPegInFailed,
        RQState::RefundLiquiditySucceeded,
        RQState::RefundLiquidityFailed,
        RQState::InternalError,
    ];

    pub fn is_active(self) -> bool {
        matches!(self, RQState::WaitingForDeposit)
    }

    /// Whether the state machine has an edge `self -> next`. Staying put is not an edge.
    pub fn can_transition_to(self, next: RQState) -> bool {
        use RQState::*;
        match (self, next) {
            (InternalError, InternalError) => false,
            (_, InternalError) => true,
            (
                WaitingForDeposit,
                TimeForDepositElapsed | CallForUserSucceeded | CallForUserFailed,
            ) => true,
            (CallForUserSucceeded, RegisterPegInSucceeded | RegisterPegInFailed) => true,
            (CallForUserFailed, RefundLiquiditySucceeded | RefundLiquidityFailed) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RQState::WaitingForDeposit => "waiting_for_deposit",
            RQState::TimeForDepositElapsed => "time_for_deposit_elapsed",
            RQState::CallForUserSucceeded => "call_for_user_succeeded",
            RQState::CallForUserFailed => "call_for_user_failed",
            RQState::RegisterPegInSucceeded => "register_peg_in_succeeded",
            RQState::RegisterPegInFailed => "register_peg_in_failed",
            RQState::RefundLiquiditySucceeded => "refund_liquidity_succeeded",
            RQState::RefundLiquidityFailed => "refund_liquidity_failed",
            RQState::InternalError => "internal_error",
        }
    }
}

impl FromStr for RQState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        RQState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .with_context(|| format!("unknown retained quote state: {s}"))
    }
}

impl fmt::Display for RQState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetainedQuote {
    pub quote_hash: QuoteHash,
    pub deposit_addr: String,
    pub signature_hex: String,
    pub req_liq: Amount,
    pub state: RQState,
}
