pub use crate::error::*;

use ct_codecs::{Encoder, Hex};
use std::fs::File;
use std::io::{self, prelude::*};
use std::path::Path;
use std::{fmt, str};

pub(crate) const ED25519_PK_ID: u8 = 0x01;
pub(crate) const ED25519_SK_ID: u8 = 0x81;

/// A public key.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct PublicKey {
    pub pk: ed25519_compact::PublicKey,
}

impl PublicKey {
    /// Create a public key from raw bytes.
    pub fn from_bytes(pk: &[u8]) -> Result<Self, BsError> {
        let mut reader = io::Cursor::new(pk);
        let mut id = [0u8];
        reader.read_exact(&mut id)?;
        if id[0] != ED25519_PK_ID {
            return Err(BsError::UnsupportedKeyType);
        }
        let mut bytes = vec![];
        reader.read_to_end(&mut bytes)?;
        Ok(Self {
            pk: ed25519_compact::PublicKey::from_slice(&bytes)?,
        })
    }

    /// Deserialize a PEM-encoded public key.
    pub fn from_pem(pem: &str) -> Result<Self, BsError> {
        let pk = ed25519_compact::PublicKey::from_pem(pem)?;
        Ok(Self { pk })
    }

    /// Deserialize a DER-encoded public key.
    pub fn from_der(der: &[u8]) -> Result<Self, BsError> {
        let pk = ed25519_compact::PublicKey::from_der(der)?;
        Ok(Self { pk })
    }

    /// Return the public key as raw bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![ED25519_PK_ID];
        bytes.extend_from_slice(self.pk.as_ref());
        bytes
    }

    /// Serialize the public key using PEM encoding.
    pub fn to_pem(&self) -> String {
        self.pk.to_pem()
    }

    /// Serialize the public key using DER encoding.
    pub fn to_der(&self) -> Vec<u8> {
        self.pk.to_der()
    }

    /// Read a public key from a file.
    pub fn from_file(file: impl AsRef<Path>) -> Result<Self, BsError> {
        let mut fp = File::open(file)?;
        let mut bytes = vec![];
        fp.read_to_end(&mut bytes)?;
        Self::from_bytes(&bytes)
    }

    /// Save the public key to a file.
    pub fn to_file(&self, file: impl AsRef<Path>) -> Result<(), BsError> {
        let mut fp = File::create(file)?;
        fp.write_all(&self.to_bytes())?;
        Ok(())
    }

    /// Try to guess the public key format.
    pub fn from_any(data: &[u8]) -> Result<Self, BsError> {
        if let Ok(pk) = Self::from_bytes(data) {
            return Ok(pk);
        }
        if let Ok(pk) = Self::from_der(data) {
            return Ok(pk);
        }
        let s = str::from_utf8(data).map_err(|_| BsError::UnsupportedKeyType)?;
        Self::from_pem(s).map_err(|_| BsError::UnsupportedKeyType)
    }

    /// Load a key from a file, trying to guess its format.
    pub fn from_any_file(file: impl AsRef<Path>) -> Result<Self, BsError> {
        let mut fp = File::open(file)?;
        let mut bytes = vec![];
        fp.read_to_end(&mut bytes)?;
        Self::from_any(&bytes)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "PublicKey {{ [{}] }}",
            Hex::encode_to_string(self.pk.as_ref()).unwrap()
        )
    }
}

/// A secret key.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct SecretKey {
    pub sk: ed25519_compact::SecretKey,
}

impl SecretKey {
    /// Create a secret key from raw bytes.
    pub fn from_bytes(sk: &[u8]) -> Result<Self, BsError> {
        let mut reader = io::Cursor::new(sk);
        let mut id = [0u8];
        reader.read_exact(&mut id)?;
        if id[0] != ED25519_SK_ID {
            return Err(BsError::UnsupportedKeyType);
        }
        let mut bytes = vec![];
        reader.read_to_end(&mut bytes)?;
        Ok(Self {
            sk: ed25519_compact::SecretKey::from_slice(&bytes)?,
        })
    }

    /// Deserialize a PEM-encoded secret key.
    pub fn from_pem(pem: &str) -> Result<Self, BsError> {
        let sk = ed25519_compact::SecretKey::from_pem(pem)?;
        Ok(Self { sk })
    }

    /// Deserialize a DER-encoded secret key.
    pub fn from_der(der: &[u8]) -> Result<Self, BsError> {
        let sk = ed25519_compact::SecretKey::from_der(der)?;
        Ok(Self { sk })
    }

    /// Return the secret key as raw bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![ED25519_SK_ID];
        bytes.extend_from_slice(self.sk.as_ref());
        bytes
    }

    /// Serialize the secret key using PEM encoding.
    pub fn to_pem(&self) -> String {
        self.sk.to_pem()
    }

    /// Serialize the secret key using DER encoding.
    pub fn to_der(&self) -> Vec<u8> {
        self.sk.to_der()
    }

    /// Read a secret key from a file.
    pub fn from_file(file: impl AsRef<Path>) -> Result<Self, BsError> {
        let mut fp = File::open(file)?;
        let mut bytes = vec![];
        fp.read_to_end(&mut bytes)?;
        Self::from_bytes(&bytes)
    }

    /// Save a secret key to a file.
    pub fn to_file(&self, file: impl AsRef<Path>) -> Result<(), BsError> {
        let mut fp = File::create(file)?;
        fp.write_all(&self.to_bytes())?;
        Ok(())
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretKey {{ <redacted> }}")
    }
}

/// A key pair.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct KeyPair {
    /// The public key.
    pub pk: PublicKey,
    /// The secret key.
    pub sk: SecretKey,
}

impl KeyPair {
    /// Generate a new key pair.
    pub fn generate() -> Self {
        let kp = ed25519_compact::KeyPair::from_seed(ed25519_compact::Seed::generate());
        KeyPair {
            pk: PublicKey { pk: kp.pk },
            sk: SecretKey { sk: kp.sk },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_generate() {
        let kp1 = KeyPair::generate();
        let kp2 = KeyPair::generate();
        assert_ne!(kp1.pk, kp2.pk);
    }

    #[test]
    fn test_public_key_bytes_roundtrip() {
        let kp = KeyPair::generate();
        let bytes = kp.pk.to_bytes();
        assert_eq!(bytes[0], ED25519_PK_ID);
        let pk = PublicKey::from_bytes(&bytes).unwrap();
        assert_eq!(pk, kp.pk);
    }

    #[test]
    fn test_secret_key_bytes_roundtrip() {
        let kp = KeyPair::generate();
        let bytes = kp.sk.to_bytes();
        assert_eq!(bytes[0], ED25519_SK_ID);
        let sk = SecretKey::from_bytes(&bytes).unwrap();
        assert_eq!(sk, kp.sk);
    }

    #[test]
    fn test_public_key_rejects_secret_key_bytes() {
        let kp = KeyPair::generate();
        let result = PublicKey::from_bytes(&kp.sk.to_bytes());
        assert!(matches!(result.unwrap_err(), BsError::UnsupportedKeyType));
    }

    #[test]
    fn test_public_key_pem_roundtrip() {
        let kp = KeyPair::generate();
        let pem = kp.pk.to_pem();
        let pk = PublicKey::from_pem(&pem).unwrap();
        assert_eq!(pk, kp.pk);
    }

    #[test]
    fn test_public_key_der_roundtrip() {
        let kp = KeyPair::generate();
        let der = kp.pk.to_der();
        let pk = PublicKey::from_der(&der).unwrap();
        assert_eq!(pk, kp.pk);
    }

    #[test]
    fn test_secret_key_pem_roundtrip() {
        let kp = KeyPair::generate();
        let pem = kp.sk.to_pem();
        let sk = SecretKey::from_pem(&pem).unwrap();
        assert_eq!(sk, kp.sk);
    }

    #[test]
    fn test_public_key_from_any() {
        let kp = KeyPair::generate();
        assert_eq!(PublicKey::from_any(&kp.pk.to_bytes()).unwrap(), kp.pk);
        assert_eq!(PublicKey::from_any(&kp.pk.to_der()).unwrap(), kp.pk);
        assert_eq!(
            PublicKey::from_any(kp.pk.to_pem().as_bytes()).unwrap(),
            kp.pk
        );
    }

    #[test]
    fn test_public_key_from_any_garbage() {
        let result = PublicKey::from_any(b"not a key");
        assert!(result.is_err());
    }

    #[test]
    fn test_key_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let kp = KeyPair::generate();

        let pk_path = dir.path().join("key.pub");
        kp.pk.to_file(&pk_path).unwrap();
        assert_eq!(PublicKey::from_file(&pk_path).unwrap(), kp.pk);
        assert_eq!(PublicKey::from_any_file(&pk_path).unwrap(), kp.pk);

        let sk_path = dir.path().join("key.sec");
        kp.sk.to_file(&sk_path).unwrap();
        assert_eq!(SecretKey::from_file(&sk_path).unwrap(), kp.sk);
    }

    #[test]
    fn test_secret_key_debug_is_redacted() {
        let kp = KeyPair::generate();
        let debug = format!("{:?}", kp.sk);
        assert!(!debug.contains(
            &Hex::encode_to_string(kp.sk.sk.as_ref()).unwrap()
        ));
    }
}
