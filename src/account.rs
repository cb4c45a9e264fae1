//! Keypair custody: signing and ECIES-style decryption.
//!
//! An [`Account`] wraps one secp256k1 keypair. Signatures are ECDSA over the
//! SHA-256 digest of the payload, hex-encoded compact form. Ciphertext
//! addressed to the account is an ephemeral compressed public key, a 12-byte
//! nonce and a ChaCha20-Poly1305 sealed body; the AEAD key is the ECDH shared
//! secret between the ephemeral key and the account key. The secret key never
//! leaves this module.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;
use secp256k1::ecdh::SharedSecret;
use secp256k1::{ecdsa, Message, PublicKey, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};

use crate::error::ClientError;
use crate::util::{bytes_to_hex, hex_to_bytes};

const EPHEMERAL_PK_BYTES: usize = 33;
const NONCE_BYTES: usize = 12;

pub struct Account {
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl Account {
    /// Builds an account from a hex-encoded secret key.
    pub fn from_hex(secret_key_hex: &str) -> Result<Self, ClientError> {
        let bytes = hex_to_bytes(secret_key_hex)
            .map_err(|_| ClientError::Signing("account key is not valid hex".to_string()))?;
        let secret_key = SecretKey::from_slice(&bytes)
            .map_err(|_| ClientError::Signing("account key is not a valid secret key".to_string()))?;
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Ok(Self {
            secret_key,
            public_key,
        })
    }

    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut rand::thread_rng());
        Self {
            secret_key,
            public_key,
        }
    }

    /// Hex of the compressed public key; used as the request address.
    pub fn public_key_hex(&self) -> String {
        bytes_to_hex(&self.public_key.serialize())
    }

    pub fn secret_key_hex(&self) -> String {
        bytes_to_hex(&self.secret_key.secret_bytes())
    }

    /// Signs an arbitrary payload, returning the hex compact signature.
    pub fn sign(&self, payload: &[u8]) -> Result<String, ClientError> {
        let digest: [u8; 32] = Sha256::digest(payload).into();
        let msg = Message::from_digest(digest);
        let secp = Secp256k1::new();
        let sig = secp.sign_ecdsa(&msg, &self.secret_key);
        Ok(bytes_to_hex(&sig.serialize_compact()))
    }

    /// Checks a hex signature over a payload against a hex public key.
    pub fn verify(public_key_hex: &str, payload: &[u8], signature_hex: &str) -> Result<bool, ClientError> {
        let pk_bytes = hex_to_bytes(public_key_hex)
            .map_err(|_| ClientError::Signing("invalid public key hex".to_string()))?;
        let pk = PublicKey::from_slice(&pk_bytes)
            .map_err(|_| ClientError::Signing("invalid public key".to_string()))?;
        let sig_bytes = hex_to_bytes(signature_hex)
            .map_err(|_| ClientError::Signing("invalid signature hex".to_string()))?;
        let sig = ecdsa::Signature::from_compact(&sig_bytes)
            .map_err(|_| ClientError::Signing("invalid signature".to_string()))?;
        let digest: [u8; 32] = Sha256::digest(payload).into();
        let msg = Message::from_digest(digest);
        let secp = Secp256k1::new();
        Ok(secp.verify_ecdsa(&msg, &sig, &pk).is_ok())
    }

    /// Decrypts ciphertext addressed to this account's public key.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, ClientError> {
        if ciphertext.len() < EPHEMERAL_PK_BYTES + NONCE_BYTES {
            return Err(ClientError::Decryption("ciphertext too short".to_string()));
        }
        let ephemeral = PublicKey::from_slice(&ciphertext[..EPHEMERAL_PK_BYTES])
            .map_err(|_| ClientError::Decryption("invalid ephemeral key".to_string()))?;
        let nonce = &ciphertext[EPHEMERAL_PK_BYTES..EPHEMERAL_PK_BYTES + NONCE_BYTES];
        let sealed = &ciphertext[EPHEMERAL_PK_BYTES + NONCE_BYTES..];

        let shared = SharedSecret::new(&ephemeral, &self.secret_key);
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&shared.secret_bytes()));
        cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| ClientError::Decryption("ciphertext not addressed to this key".to_string()))
    }

    /// Encrypts plaintext for a recipient public key (sender side of
    /// [`Account::decrypt`]; used by relying parties and tests).
    pub fn encrypt_for(recipient_hex: &str, plaintext: &[u8]) -> Result<Vec<u8>, ClientError> {
        let pk_bytes = hex_to_bytes(recipient_hex)
            .map_err(|_| ClientError::Decryption("invalid recipient key hex".to_string()))?;
        let recipient = PublicKey::from_slice(&pk_bytes)
            .map_err(|_| ClientError::Decryption("invalid recipient key".to_string()))?;

        let secp = Secp256k1::new();
        let (eph_sk, eph_pk) = secp.generate_keypair(&mut rand::thread_rng());
        let shared = SharedSecret::new(&recipient, &eph_sk);

        let mut nonce = [0u8; NONCE_BYTES];
        rand::thread_rng().fill_bytes(&mut nonce);

        let cipher = ChaCha20Poly1305::new(Key::from_slice(&shared.secret_bytes()));
        let sealed = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| ClientError::Decryption("encrypt failed".to_string()))?;

        let mut out = Vec::with_capacity(EPHEMERAL_PK_BYTES + NONCE_BYTES + sealed.len());
        out.extend_from_slice(&eph_pk.serialize());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::Account;

    #[test]
    fn sign_verifies_against_own_public_key() {
        let account = Account::generate();
        let payload = b"canonical request bytes";
        let sig_a = account.sign(payload).expect("sign");
        let sig_b = account.sign(payload).expect("sign");
        assert!(Account::verify(&account.public_key_hex(), payload, &sig_a).unwrap());
        assert!(Account::verify(&account.public_key_hex(), payload, &sig_b).unwrap());
    }

    #[test]
    fn verify_rejects_other_signer() {
        let account = Account::generate();
        let other = Account::generate();
        let payload = b"payload";
        let sig = account.sign(payload).expect("sign");
        assert!(!Account::verify(&other.public_key_hex(), payload, &sig).unwrap());
    }

    #[test]
    fn from_hex_rejects_bad_key_material() {
        assert!(Account::from_hex("not hex").is_err());
        assert!(Account::from_hex("00").is_err());
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let account = Account::generate();
        let ct = Account::encrypt_for(&account.public_key_hex(), b"secret material").expect("encrypt");
        let pt = account.decrypt(&ct).expect("decrypt");
        assert_eq!(pt, b"secret material");
    }

    #[test]
    fn decrypt_fails_for_wrong_recipient() {
        let intended = Account::generate();
        let other = Account::generate();
        let ct = Account::encrypt_for(&intended.public_key_hex(), b"secret").expect("encrypt");
        let err = other.decrypt(&ct).unwrap_err();
        assert_eq!(err.category(), "decryption");
    }

    #[test]
    fn decrypt_rejects_truncated_ciphertext() {
        let account = Account::generate();
        let err = account.decrypt(&[0u8; 8]).unwrap_err();
        assert_eq!(err.category(), "decryption");
    }

    #[test]
    fn from_hex_roundtrips_keys() {
        let account = Account::generate();
        let again = Account::from_hex(&account.secret_key_hex()).expect("from hex");
        assert_eq!(account.public_key_hex(), again.public_key_hex());
    }
}
