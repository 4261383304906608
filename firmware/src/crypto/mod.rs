//! Device-bound key derivation and the block cipher protecting the stored
//! secret.
//!
//! The key and IV are recomputed from the chip's unique identifier on every
//! boot and never written anywhere. A region image copied to another board
//! therefore decrypts to noise.
use core::fmt;

use aes::Aes256;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, generic_array::GenericArray};
use sha2::{Digest, Sha256};
use shared::record::SECRET_CAPACITY;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

pub const UNIQUE_ID_LEN: usize = 8;
pub const KEY_LEN: usize = 32;
pub const IV_LEN: usize = 16;
const BLOCK_LEN: usize = 16;

/// Appended to the identifier before hashing so the IV differs from the key.
pub const IV_SALT: [u8; 4] = [0xDE, 0xAD, 0xBE, 0xEF];

/// Source of the chip's factory-programmed identifier.
pub trait UniqueIdSource {
    fn unique_id(&mut self) -> [u8; UNIQUE_ID_LEN];
}

/// AES-256 key and CBC IV bound to one device. Volatile only.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DeviceKeyMaterial {
    key: [u8; KEY_LEN],
    iv: [u8; IV_LEN],
}

impl DeviceKeyMaterial {
    /// `key = SHA-256(id)`, `iv = first16(SHA-256(id || DE AD BE EF))`.
    pub fn from_unique_id(id: &[u8; UNIQUE_ID_LEN]) -> Self {
        let mut material = Self {
            key: [0; KEY_LEN],
            iv: [0; IV_LEN],
        };

        let mut hasher = Sha256::new();
        hasher.update(id);
        hasher.finalize_into(GenericArray::from_mut_slice(&mut material.key));

        let mut salted = Zeroizing::new([0u8; UNIQUE_ID_LEN + IV_SALT.len()]);
        salted[..UNIQUE_ID_LEN].copy_from_slice(id);
        salted[UNIQUE_ID_LEN..].copy_from_slice(&IV_SALT);

        let mut iv_hash = Zeroizing::new([0u8; KEY_LEN]);
        let mut hasher = Sha256::new();
        hasher.update(&salted[..]);
        hasher.finalize_into(GenericArray::from_mut_slice(&mut iv_hash[..]));
        material.iv.copy_from_slice(&iv_hash[..IV_LEN]);

        material
    }

    pub fn key(&self) -> &[u8; KEY_LEN] {
        &self.key
    }

    pub fn iv(&self) -> &[u8; IV_LEN] {
        &self.iv
    }

    /// Encrypt one padded secret block. Each call starts from the stored IV.
    pub fn encrypt(&self, plaintext: &[u8; SECRET_CAPACITY]) -> [u8; SECRET_CAPACITY] {
        let mut cipher = Aes256CbcEnc::new(
            GenericArray::from_slice(&self.key),
            GenericArray::from_slice(&self.iv),
        );
        let mut block = *plaintext;
        for chunk in block.chunks_exact_mut(BLOCK_LEN) {
            cipher.encrypt_block_mut(GenericArray::from_mut_slice(chunk));
        }
        block
    }

    /// Decrypt one stored block. The result is wiped when dropped.
    pub fn decrypt(
        &self,
        ciphertext: &[u8; SECRET_CAPACITY],
    ) -> Zeroizing<[u8; SECRET_CAPACITY]> {
        let mut cipher = Aes256CbcDec::new(
            GenericArray::from_slice(&self.key),
            GenericArray::from_slice(&self.iv),
        );
        let mut block = Zeroizing::new(*ciphertext);
        for chunk in block.chunks_exact_mut(BLOCK_LEN) {
            cipher.decrypt_block_mut(GenericArray::from_mut_slice(chunk));
        }
        block
    }
}

impl fmt::Debug for DeviceKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DeviceKeyMaterial(..)")
    }
}

/// Turns the hardware identifier into [`DeviceKeyMaterial`].
pub struct KeyDeriver<S> {
    source: S,
}

impl<S: UniqueIdSource> KeyDeriver<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn derive(&mut self) -> DeviceKeyMaterial {
        let id = Zeroizing::new(self.source.unique_id());
        let material = DeviceKeyMaterial::from_unique_id(&id);
        log::info!(target: "boot", "Crypto OK (AES-256-CBC, device-bound key)");
        material
    }
}
