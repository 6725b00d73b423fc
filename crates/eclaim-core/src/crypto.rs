//! Payload cipher mandated by the clearinghouse.
//!
//! `key = SHA-256(consumerId ++ consumerSecret ++ facilityCode)` (raw digest),
//! `iv = key[..16]`, AES-256-CBC with PKCS#7 padding, base64 output. The
//! receiver re-derives the same key and IV from its copy of the credentials,
//! so nothing but the ciphertext travels. The derivation must stay
//! bit-exact: deriving the IV from the key is the receiver's contract.

use aes::Aes256;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use sha2::{Digest, Sha256};

use crate::credentials::Credentials;
use crate::error::{CoreError, Result};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Key size for AES-256 (256 bits)
pub const KEY_SIZE: usize = 32;

/// IV size for AES-CBC (128 bits)
pub const IV_SIZE: usize = 16;

/// Derived key material.
pub struct DerivedKey {
    key: [u8; KEY_SIZE],
}

impl DerivedKey {
    pub fn derive(credentials: &Credentials) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(credentials.consumer_id.as_bytes());
        hasher.update(credentials.consumer_secret.as_bytes());
        hasher.update(credentials.facility_code.as_bytes());
        Self {
            key: hasher.finalize().into(),
        }
    }

    pub fn key(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }

    pub fn iv(&self) -> &[u8] {
        &self.key[..IV_SIZE]
    }
}

/// Encrypt framed payload text, returning base64 ciphertext.
pub fn encrypt(plaintext: &str, credentials: &Credentials) -> Result<String> {
    let derived = DerivedKey::derive(credentials);
    let cipher = Aes256CbcEnc::new_from_slices(derived.key(), derived.iv())
        .map_err(|e| CoreError::crypto(format!("Failed to create cipher: {e}")))?;

    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
    Ok(BASE64.encode(ciphertext))
}

/// Receiver-side inverse of [`encrypt`].
pub fn decrypt(ciphertext: &str, credentials: &Credentials) -> Result<String> {
    let derived = DerivedKey::derive(credentials);
    let cipher = Aes256CbcDec::new_from_slices(derived.key(), derived.iv())
        .map_err(|e| CoreError::crypto(format!("Failed to create cipher: {e}")))?;

    let raw = BASE64
        .decode(ciphertext.trim())
        .map_err(|e| CoreError::decrypt(format!("Invalid ciphertext base64: {e}")))?;

    let plaintext = cipher
        .decrypt_padded_vec_mut::<Pkcs7>(&raw)
        .map_err(|e| CoreError::decrypt(format!("Invalid padding: {e}")))?;

    String::from_utf8(plaintext)
        .map_err(|e| CoreError::decrypt(format!("Invalid UTF-8 in decrypted payload: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> Credentials {
        Credentials::new("1234", "secret", "0301R001", "uk", "https://example.test")
    }

    #[test]
    fn key_is_raw_sha256_of_concatenation() {
        let derived = DerivedKey::derive(&creds());
        let expected: [u8; KEY_SIZE] = Sha256::digest(b"1234secret0301R001").into();
        assert_eq!(derived.key(), &expected);
        assert_eq!(derived.iv(), &expected[..IV_SIZE]);
    }

    #[test]
    fn round_trip_restores_plaintext() {
        let long = "x".repeat(4096);
        let samples: [&str; 4] = [
            "",
            "a",
            "H4sIAAAAAAAC/6tWSi0qyi9SslIqSc0tyEksSVWqBQBxMkNdFwAAAA==",
            long.as_str(),
        ];
        for plaintext in samples {
            let sealed = encrypt(plaintext, &creds()).unwrap();
            assert_eq!(decrypt(&sealed, &creds()).unwrap(), plaintext);
        }
    }

    #[test]
    fn encryption_is_deterministic_for_fixed_credentials() {
        assert_eq!(
            encrypt("payload", &creds()).unwrap(),
            encrypt("payload", &creds()).unwrap()
        );
    }

    #[test]
    fn ciphertext_is_block_aligned() {
        let raw = BASE64.decode(encrypt("0123456789abcdef", &creds()).unwrap()).unwrap();
        // A full block of input gains a full block of padding.
        assert_eq!(raw.len(), 32);
    }

    #[test]
    fn different_credentials_cannot_decrypt() {
        let sealed = encrypt("payload body", &creds()).unwrap();
        let other = Credentials::new("1234", "other", "0301R001", "uk", "https://example.test");
        match decrypt(&sealed, &other) {
            Ok(text) => assert_ne!(text, "payload body"),
            Err(err) => assert!(err.is_crypto_error()),
        }
    }

    #[test]
    fn consumer_id_takes_part_in_derivation() {
        let without_id = Credentials::new("", "secret", "0301R001", "uk", "https://example.test");
        assert_ne!(
            DerivedKey::derive(&creds()).key(),
            DerivedKey::derive(&without_id).key()
        );
    }
}
