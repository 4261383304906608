//! Fixed-capacity buffer for the typed unlock secret.
use core::fmt;

use shared::record::SECRET_CAPACITY;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Secret bytes held in RAM; wiped on drop on every exit path.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretBuffer {
    bytes: [u8; SECRET_CAPACITY],
    len: u8,
}

impl SecretBuffer {
    pub const fn new() -> Self {
        Self {
            bytes: [0; SECRET_CAPACITY],
            len: 0,
        }
    }

    /// Copy `bytes` into a new buffer, `None` if they do not fit.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() > SECRET_CAPACITY {
            return None;
        }
        let mut buffer = Self::new();
        buffer.bytes[..bytes.len()].copy_from_slice(bytes);
        buffer.len = bytes.len() as u8;
        Some(buffer)
    }

    pub fn push(&mut self, byte: u8) -> bool {
        if self.is_full() {
            return false;
        }
        self.bytes[self.len as usize] = byte;
        self.len += 1;
        true
    }

    pub fn pop(&mut self) -> bool {
        if self.len == 0 {
            return false;
        }
        self.len -= 1;
        self.bytes[self.len as usize] = 0;
        true
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == SECRET_CAPACITY
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len()]
    }

    /// The whole zero-padded block, as it is encrypted.
    pub fn padded(&self) -> &[u8; SECRET_CAPACITY] {
        &self.bytes
    }

    /// Byte-exact comparison that does not stop at the first difference.
    pub fn matches(&self, other: &SecretBuffer) -> bool {
        let diff = self
            .bytes
            .iter()
            .zip(other.bytes.iter())
            .fold(self.len ^ other.len, |acc, (a, b)| acc | (a ^ b));
        diff == 0
    }
}

impl Default for SecretBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SecretBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretBuffer")
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_keep_padding_clean() {
        let mut secret = SecretBuffer::new();
        assert!(secret.push(b'a'));
        assert!(secret.push(b'b'));
        assert!(secret.pop());
        assert_eq!(secret.as_bytes(), b"a");
        assert_eq!(secret.padded()[1], 0);
        assert!(secret.pop());
        assert!(!secret.pop());
        assert!(secret.is_empty());
    }

    #[test]
    fn capacity_is_enforced() {
        let mut secret = SecretBuffer::from_bytes(&[b'x'; SECRET_CAPACITY]).unwrap();
        assert!(secret.is_full());
        assert!(!secret.push(b'y'));
        assert!(SecretBuffer::from_bytes(&[0; SECRET_CAPACITY + 1]).is_none());
    }

    #[test]
    fn matches_requires_equal_length_and_bytes() {
        let a = SecretBuffer::from_bytes(b"hunter2").unwrap();
        let b = SecretBuffer::from_bytes(b"hunter2").unwrap();
        let shorter = SecretBuffer::from_bytes(b"hunter").unwrap();
        let other = SecretBuffer::from_bytes(b"hunter3").unwrap();
        assert!(a.matches(&b));
        assert!(!a.matches(&shorter));
        assert!(!a.matches(&other));
    }

    #[test]
    fn zeroize_wipes_contents() {
        let mut secret = SecretBuffer::from_bytes(b"swordfish").unwrap();
        secret.zeroize();
        assert!(secret.is_empty());
        assert!(secret.padded().iter().all(|&byte| byte == 0));
    }

    #[test]
    fn debug_output_is_redacted() {
        let secret = SecretBuffer::from_bytes(b"swordfish").unwrap();
        let rendered = format!("{secret:?}");
        assert!(!rendered.contains("swordfish"));
    }
}
