use std::path::Path;

use anyhow::{Context as _, Result};
use ethers::signers::{LocalWallet, Signer as _};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, H256, Signature};
use ethers::utils::keccak256;

use crate::error::Error;

/// Length-prefixed preamble for a 32-byte signed message.
pub const SIGNED_MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

/// Lowest recovery byte the chain accepts; `v` must be 27 or 28.
const RECOVERY_BYTE_OFFSET: u8 = 27;

/// Commitment signing for the provider's own smart-chain account.
pub trait Signer: Send + Sync {
    fn address(&self) -> Address;

    /// Signs `hash` as a signed message. Returns `r || s || v` with `v` in {27, 28}.
    fn sign_hash(&self, hash: &[u8; 32]) -> Result<Vec<u8>, Error>;

    /// Returns the RLP encoding of `tx` signed by the provider account.
    fn sign_transaction(&self, address: Address, tx: &TypedTransaction) -> Result<Bytes, Error>;
}

/// keccak256(prefix || hash), the digest that actually gets signed.
pub fn signed_message_digest(hash: &[u8; 32]) -> [u8; 32] {
    let mut message = Vec::with_capacity(SIGNED_MESSAGE_PREFIX.len() + 32);
    message.extend_from_slice(SIGNED_MESSAGE_PREFIX);
    message.extend_from_slice(hash);
    keccak256(&message)
}

/// Shifts a zero-based recovery id in the trailing byte to 27/28. Already shifted values are kept.
pub fn normalize_recovery_byte(signature: &mut [u8]) {
    if let Some(v) = signature.last_mut()
        && *v < RECOVERY_BYTE_OFFSET
    {
        *v += RECOVERY_BYTE_OFFSET;
    }
}

/// Address that produced `signature` over the signed-message framing of `hash`.
pub fn recover_signer(hash: &[u8; 32], signature: &[u8]) -> Result<Address> {
    let signature = Signature::try_from(signature).context("decode signature")?;
    signature
        .recover(H256::from(signed_message_digest(hash)))
        .context("recover signer")
}

/// [`Signer`] backed by an in-process secp256k1 key.
pub struct LocalSigner {
    wallet: LocalWallet,
    chain_id: u64,
}

impl LocalSigner {
    pub fn from_private_key(private_key: &str, chain_id: u64) -> Result<Self> {
        let wallet: LocalWallet = private_key
            .trim()
            .trim_start_matches("0x")
            .parse()
            .context("parse private key")?;
        Ok(Self::new(wallet, chain_id))
    }

    /// Decrypts a JSON keystore with the password on the first line of `password_file`.
    pub fn from_keystore(keystore: &Path, password_file: &Path, chain_id: u64) -> Result<Self> {
        let raw = std::fs::read_to_string(password_file)
            .with_context(|| format!("read password file {}", password_file.display()))?;
        let password = raw.lines().next().unwrap_or_default();
        let wallet = LocalWallet::decrypt_keystore(keystore, password)
            .with_context(|| format!("decrypt keystore {}", keystore.display()))?;
        Ok(Self::new(wallet, chain_id))
    }

    fn new(wallet: LocalWallet, chain_id: u64) -> Self {
        Self {
            wallet: wallet.with_chain_id(chain_id),
            chain_id,
        }
    }
}

impl Signer for LocalSigner {
    fn address(&self) -> Address {
        self.wallet.address()
    }

    fn sign_hash(&self, hash: &[u8; 32]) -> Result<Vec<u8>, Error> {
        let digest = H256::from(signed_message_digest(hash));
        let signature = self
            .wallet
            .sign_hash(digest)
            .map_err(|e| Error::SigningFailure(anyhow::anyhow!("sign hash: {e}")))?;
        let mut bytes = signature.to_vec();
        normalize_recovery_byte(&mut bytes);
        Ok(bytes)
    }

    fn sign_transaction(&self, address: Address, tx: &TypedTransaction) -> Result<Bytes, Error> {
        let own = self.wallet.address();
        if address != own {
            return Err(Error::AddressMismatch {
                expected: format!("{own:?}"),
                actual: format!("{address:?}"),
            });
        }

        let mut tx = tx.clone();
        tx.set_chain_id(self.chain_id);
        let signature = self
            .wallet
            .sign_transaction_sync(&tx)
            .map_err(|e| Error::SigningFailure(anyhow::anyhow!("sign transaction: {e}")))?;
        Ok(tx.rlp_signed(&signature))
    }
}
