//! Local secp256k1 wallet
//!
//! Holds the operator/user private key and signs transaction hashes. The key is
//! never exposed through `Debug` or logs.

use anyhow::{Context, Result};
use chain_clients_common::strip_0x;
use k256::ecdsa::SigningKey;
use std::fmt;

use crate::abi::keccak256;

/// Signs EVM transactions with a private key held in memory.
pub struct EvmSigner {
    signing_key: SigningKey,
    address: String,
}

impl EvmSigner {
    /// Creates a signer from a 32-byte hex private key (with or without `0x`).
    ///
    /// # Returns
    ///
    /// * `Ok(EvmSigner)` - Key parsed and address derived
    /// * `Err(anyhow::Error)` - Key is not 32 bytes of hex or not a valid scalar
    pub fn from_private_key_hex(private_key: &str) -> Result<Self> {
        let key_bytes =
            hex::decode(strip_0x(private_key.trim())).context("Private key is not valid hex")?;
        if key_bytes.len() != 32 {
            anyhow::bail!(
                "Invalid private key length: expected 32 bytes, got {}",
                key_bytes.len()
            );
        }

        let signing_key = SigningKey::from_slice(&key_bytes)
            .map_err(|e| anyhow::anyhow!("Invalid secp256k1 private key: {}", e))?;
        let address = derive_address(&signing_key)?;

        Ok(Self {
            signing_key,
            address,
        })
    }

    /// Lowercase `0x`-prefixed address of this wallet.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Signs a 32-byte prehash, returning `(r, s, recovery_id)`.
    pub fn sign_prehash(&self, hash: &[u8; 32]) -> Result<([u8; 32], [u8; 32], u8)> {
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(hash)
            .map_err(|e| anyhow::anyhow!("Failed to sign transaction hash: {}", e))?;

        let bytes = signature.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);

        Ok((r, s, recovery_id.to_byte()))
    }
}

impl fmt::Debug for EvmSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvmSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Ethereum address: last 20 bytes of keccak256 of the uncompressed public key (without 0x04).
fn derive_address(signing_key: &SigningKey) -> Result<String> {
    let point = signing_key.verifying_key().to_encoded_point(false);
    let public_key = point.as_bytes();
    if public_key.len() != 65 || public_key[0] != 0x04 {
        anyhow::bail!("Invalid public key format: expected 65 bytes with 0x04 prefix");
    }
    let hash = keccak256(&public_key[1..]);
    Ok(format!("0x{}", hex::encode(&hash[12..])))
}
