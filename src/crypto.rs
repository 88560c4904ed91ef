//! Host-side derivation pipeline
//!
//! Re-derives entropy → mnemonic → seed → m/44'/429'/0'/0/<i> → pubkey →
//! address on the CPU. Every GPU hit goes through this before it is
//! reported; the GPU is never trusted on its own.

use crate::address::{encode_p2pk, Network};
use crate::error::{CryptoError, Result};
use crate::ERGO_COIN_TYPE;
use bip39::{Language, Mnemonic};
use bitcoin::bip32::{ChildNumber, Xpriv};
use bitcoin::secp256k1::{All, PublicKey, Secp256k1};
use hmac::Hmac;
use pbkdf2::pbkdf2;
use sha2::Sha512;
use std::fmt;

/// PBKDF2 iteration count for BIP39 seed derivation
const BIP39_PBKDF2_ROUNDS: u32 = 2048;

/// BIP39 salt (no passphrase support)
const BIP39_SALT: &[u8] = b"mnemonic";

/// Everything derived from one (entropy, address_index) pair.
#[derive(Clone)]
pub struct DerivedAddress {
    /// The Ergo address (Base58)
    pub address: String,
    /// The 24-word BIP39 mnemonic
    pub mnemonic: String,
    /// Raw private key at m/44'/429'/0'/0/<index>
    pub private_key: [u8; 32],
    /// Compressed public key
    pub public_key: [u8; 33],
}

impl fmt::Debug for DerivedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedAddress")
            .field("address", &self.address)
            .field("mnemonic", &"<redacted>")
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Derivation engine wrapping one secp256k1 context.
pub struct CryptoEngine {
    secp: Secp256k1<All>,
}

impl CryptoEngine {
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::new(),
        }
    }

    /// 32-byte entropy → 24-word mnemonic.
    pub fn entropy_to_mnemonic(&self, entropy: &[u8]) -> Result<String> {
        if entropy.len() != 32 {
            return Err(CryptoError::InvalidEntropyLength(entropy.len()).into());
        }
        let mnemonic = Mnemonic::from_entropy_in(Language::English, entropy)
            .map_err(CryptoError::from)?;
        Ok(mnemonic.to_string())
    }

    /// Mnemonic → 64-byte seed (PBKDF2-HMAC-SHA512, salt "mnemonic").
    pub fn mnemonic_to_seed(&self, mnemonic: &str) -> Result<[u8; 64]> {
        let mut seed = [0u8; 64];
        pbkdf2::<Hmac<Sha512>>(
            mnemonic.as_bytes(),
            BIP39_SALT,
            BIP39_PBKDF2_ROUNDS,
            &mut seed,
        )
        .map_err(|_| CryptoError::Pbkdf2("PBKDF2 operation failed".to_string()))?;
        Ok(seed)
    }

    /// Seed → extended key at the Ergo external chain m/44'/429'/0'/0.
    ///
    /// Address keys are one cheap normal derivation below this node, so a
    /// caller iterating address indices derives this once.
    pub fn derive_external_node(&self, seed: &[u8; 64]) -> Result<Xpriv> {
        let master =
            Xpriv::new_master(bitcoin::Network::Bitcoin, seed).map_err(CryptoError::from)?;

        let path = [
            ChildNumber::from_hardened_idx(44).map_err(CryptoError::from)?,
            ChildNumber::from_hardened_idx(ERGO_COIN_TYPE).map_err(CryptoError::from)?,
            ChildNumber::from_hardened_idx(0).map_err(CryptoError::from)?,
            ChildNumber::from_normal_idx(0).map_err(CryptoError::from)?,
        ];
        Ok(master
            .derive_priv(&self.secp, &path)
            .map_err(CryptoError::from)?)
    }

    /// External node + address index → (private key, compressed pubkey).
    pub fn derive_address_key(
        &self,
        external: &Xpriv,
        address_index: u32,
    ) -> Result<([u8; 32], [u8; 33])> {
        let child = ChildNumber::from_normal_idx(address_index).map_err(CryptoError::from)?;
        let derived = external
            .derive_priv(&self.secp, &[child])
            .map_err(CryptoError::from)?;

        let private_key = derived.private_key.secret_bytes();
        let public_key = PublicKey::from_secret_key(&self.secp, &derived.private_key).serialize();
        Ok((private_key, public_key))
    }

    /// Full pipeline for one (entropy, address_index) pair.
    pub fn derive(&self, entropy: &[u8; 32], address_index: u32) -> Result<DerivedAddress> {
        let mnemonic = self.entropy_to_mnemonic(entropy)?;
        let seed = self.mnemonic_to_seed(&mnemonic)?;
        let external = self.derive_external_node(&seed)?;
        let (private_key, public_key) = self.derive_address_key(&external, address_index)?;
        let address = encode_p2pk(&public_key, Network::Mainnet);

        Ok(DerivedAddress {
            address,
            mnemonic,
            private_key,
            public_key,
        })
    }
}

impl Default for CryptoEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_entropy_mnemonic() {
        let engine = CryptoEngine::new();
        let mnemonic = engine.entropy_to_mnemonic(&[0u8; 32]).unwrap();

        let words: Vec<&str> = mnemonic.split_whitespace().collect();
        assert_eq!(words.len(), 24);
        for word in &words[..23] {
            assert_eq!(*word, "abandon");
        }
        assert_eq!(words[23], "art");
    }

    #[test]
    fn test_bip39_seed_vector() {
        // Standard BIP39 test vector, 12 x "abandon" class mnemonic
        let engine = CryptoEngine::new();
        let mnemonic = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
        let seed = engine.mnemonic_to_seed(mnemonic).unwrap();
        assert_eq!(
            hex::encode(seed),
            "5eb00bbddcf069084889a8ab9155568165f5c453ccb85e70811aaed6f6da5fc1\
             9a5ac40b389cd370d086206dec8aa6c43daea6690f20ad3d8d48b2d2ce9e38e4"
        );
    }

    #[test]
    fn test_invalid_entropy_length() {
        let engine = CryptoEngine::new();
        assert!(engine.entropy_to_mnemonic(&[0u8; 16]).is_err());
        assert!(engine.entropy_to_mnemonic(&[0u8; 31]).is_err());
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let engine = CryptoEngine::new();
        let entropy = [0x5au8; 32];
        let a = engine.derive(&entropy, 0).unwrap();
        let b = engine.derive(&entropy, 0).unwrap();
        assert_eq!(a.address, b.address);
        assert_eq!(a.private_key, b.private_key);
    }

    #[test]
    fn test_indices_differ() {
        let engine = CryptoEngine::new();
        let entropy = [0x5au8; 32];
        let a = engine.derive(&entropy, 0).unwrap();
        let b = engine.derive(&entropy, 1).unwrap();
        assert_ne!(a.address, b.address);
        assert_ne!(a.private_key, b.private_key);
        // Same seed, same mnemonic
        assert_eq!(a.mnemonic, b.mnemonic);
    }

    #[test]
    fn test_external_node_iteration_matches_full_derive() {
        let engine = CryptoEngine::new();
        let entropy = [0x11u8; 32];

        let mnemonic = engine.entropy_to_mnemonic(&entropy).unwrap();
        let seed = engine.mnemonic_to_seed(&mnemonic).unwrap();
        let external = engine.derive_external_node(&seed).unwrap();

        for index in 0..5u32 {
            let (key, _) = engine.derive_address_key(&external, index).unwrap();
            let full = engine.derive(&entropy, index).unwrap();
            assert_eq!(key, full.private_key);
        }
    }

    #[test]
    fn test_pubkey_is_compressed() {
        let engine = CryptoEngine::new();
        let result = engine.derive(&[0x42u8; 32], 0).unwrap();
        assert!(result.public_key[0] == 0x02 || result.public_key[0] == 0x03);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let engine = CryptoEngine::new();
        let result = engine.derive(&[0u8; 32], 0).unwrap();
        let debug_str = format!("{:?}", result);
        assert!(debug_str.contains(&result.address));
        assert!(debug_str.contains("<redacted>"));
        assert!(!debug_str.contains("abandon"));
    }
}
