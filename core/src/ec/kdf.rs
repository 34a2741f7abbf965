//! ec/kdf.rs
//! HKDF-SHA256 derivation of the EC cipher and MAC keys.
//!
//! Design:
//! - HKDF-Extract(master, salt) -> PRK
//! - HKDF-Expand(PRK, "dml-ec2|cipher") -> AES-256 key
//! - HKDF-Expand(PRK, "dml-ec2|mac")    -> HMAC-SHA256 key
//!
//! Separate info labels keep the two keys independent even though they share
//! one master secret.

use hkdf::Hkdf;
use sha2::Sha256;

use crate::constants::EC_KEY_LEN;
use crate::ec::types::{EcError, EcKeys};

const INFO_CIPHER: &[u8] = b"dml-ec2|cipher";
const INFO_MAC: &[u8] = b"dml-ec2|mac";

impl EcKeys {
    /// Derive both keys from a master secret and a caller-chosen salt.
    ///
    /// Errors:
    /// - An all-zero salt is rejected; pick a per-deployment random value.
    pub fn derive(master: &[u8], salt: &[u8]) -> Result<Self, EcError> {
        if salt.is_empty() || salt.iter().all(|&b| b == 0) {
            return Err(EcError::Kdf("salt must not be empty or all-zero".into()));
        }
        let hk = Hkdf::<Sha256>::new(Some(salt), master);

        let mut cipher_key = [0u8; EC_KEY_LEN];
        hk.expand(INFO_CIPHER, &mut cipher_key)
            .map_err(|_| EcError::Kdf("HKDF expand failed (cipher key)".into()))?;

        let mut mac_key = [0u8; EC_KEY_LEN];
        hk.expand(INFO_MAC, &mut mac_key)
            .map_err(|_| EcError::Kdf("HKDF expand failed (MAC key)".into()))?;

        Ok(EcKeys::new(cipher_key, mac_key))
    }
}
