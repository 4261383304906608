//! Byte layout of the single persisted credential record.
//!
//! ```text
//! 0x00  magic            1   RECORD_MAGIC when a credential is present
//! 0x01  active_slot      1   1 or 2
//! 0x02  secret_length    1   1..=32, stored in clear
//! 0x03  ciphertext      32   AES-256-CBC of the zero-padded secret
//! 0x23  checksum         1   XOR of bytes 0x00..0x23
//! ```
//!
//! The firmware is the only writer of the region.

use core::fmt;

use crate::checksum::xor_checksum;

/// Sentinel stored at [`OFFSET_MAGIC`] while a credential exists.
pub const RECORD_MAGIC: u8 = 0xA5;
/// Fixed size of the encrypted secret block.
pub const SECRET_CAPACITY: usize = 32;

pub const OFFSET_MAGIC: usize = 0x00;
pub const OFFSET_ACTIVE_SLOT: usize = 0x01;
pub const OFFSET_SECRET_LEN: usize = 0x02;
pub const OFFSET_CIPHERTEXT: usize = 0x03;
pub const OFFSET_CHECKSUM: usize = OFFSET_CIPHERTEXT + SECRET_CAPACITY;
/// Total bytes occupied by the record.
pub const RECORD_LEN: usize = OFFSET_CHECKSUM + 1;
/// Bytes reserved for the record in the persistent region.
pub const REGION_LEN: usize = 64;

/// Reasons a raw record image is rejected before any decryption happens.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordError {
    BadMagic(u8),
    ChecksumMismatch { stored: u8, computed: u8 },
    SlotOutOfRange(u8),
    LengthOutOfRange(u8),
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordError::BadMagic(found) => write!(f, "magic 0x{found:02X} is not a record"),
            RecordError::ChecksumMismatch { stored, computed } => write!(
                f,
                "checksum 0x{stored:02X} does not match computed 0x{computed:02X}"
            ),
            RecordError::SlotOutOfRange(slot) => write!(f, "active slot {slot} out of range"),
            RecordError::LengthOutOfRange(len) => write!(f, "secret length {len} out of range"),
        }
    }
}

impl core::error::Error for RecordError {}

/// Raw bytes of a credential record, exactly as they sit in the region.
#[derive(Clone, PartialEq, Eq)]
pub struct RecordImage {
    bytes: [u8; RECORD_LEN],
}

impl RecordImage {
    /// Build a complete record around an already encrypted secret block.
    pub fn seal(active_slot: u8, secret_len: u8, ciphertext: &[u8; SECRET_CAPACITY]) -> Self {
        let mut bytes = [0u8; RECORD_LEN];
        bytes[OFFSET_MAGIC] = RECORD_MAGIC;
        bytes[OFFSET_ACTIVE_SLOT] = active_slot;
        bytes[OFFSET_SECRET_LEN] = secret_len;
        bytes[OFFSET_CIPHERTEXT..OFFSET_CHECKSUM].copy_from_slice(ciphertext);
        bytes[OFFSET_CHECKSUM] = xor_checksum(0, &bytes[..OFFSET_CHECKSUM]);
        Self { bytes }
    }

    pub const fn from_bytes(bytes: [u8; RECORD_LEN]) -> Self {
        Self { bytes }
    }

    pub const fn as_bytes(&self) -> &[u8; RECORD_LEN] {
        &self.bytes
    }

    pub const fn magic(&self) -> u8 {
        self.bytes[OFFSET_MAGIC]
    }

    pub const fn active_slot(&self) -> u8 {
        self.bytes[OFFSET_ACTIVE_SLOT]
    }

    pub const fn secret_len(&self) -> u8 {
        self.bytes[OFFSET_SECRET_LEN]
    }

    pub fn ciphertext(&self) -> [u8; SECRET_CAPACITY] {
        let mut block = [0u8; SECRET_CAPACITY];
        block.copy_from_slice(&self.bytes[OFFSET_CIPHERTEXT..OFFSET_CHECKSUM]);
        block
    }

    pub const fn stored_checksum(&self) -> u8 {
        self.bytes[OFFSET_CHECKSUM]
    }

    pub fn computed_checksum(&self) -> u8 {
        xor_checksum(0, &self.bytes[..OFFSET_CHECKSUM])
    }

    /// Check sentinel, checksum and field ranges, in that order.
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.magic() != RECORD_MAGIC {
            return Err(RecordError::BadMagic(self.magic()));
        }

        let computed = self.computed_checksum();
        if computed != self.stored_checksum() {
            return Err(RecordError::ChecksumMismatch {
                stored: self.stored_checksum(),
                computed,
            });
        }

        if !matches!(self.active_slot(), 1 | 2) {
            return Err(RecordError::SlotOutOfRange(self.active_slot()));
        }

        let len = self.secret_len();
        if len == 0 || usize::from(len) > SECRET_CAPACITY {
            return Err(RecordError::LengthOutOfRange(len));
        }

        Ok(())
    }

    /// Field windows in the order they must be written to the region.
    pub fn fields(&self) -> [(usize, &[u8]); 5] {
        [
            (OFFSET_MAGIC, &self.bytes[OFFSET_MAGIC..OFFSET_ACTIVE_SLOT]),
            (
                OFFSET_ACTIVE_SLOT,
                &self.bytes[OFFSET_ACTIVE_SLOT..OFFSET_SECRET_LEN],
            ),
            (OFFSET_SECRET_LEN, &self.bytes[OFFSET_SECRET_LEN..OFFSET_CIPHERTEXT]),
            (OFFSET_CIPHERTEXT, &self.bytes[OFFSET_CIPHERTEXT..OFFSET_CHECKSUM]),
            (OFFSET_CHECKSUM, &self.bytes[OFFSET_CHECKSUM..RECORD_LEN]),
        ]
    }
}

// Ciphertext is device-bound but there is no reason to spray it into logs.
impl fmt::Debug for RecordImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordImage")
            .field("magic", &self.magic())
            .field("active_slot", &self.active_slot())
            .field("secret_len", &self.secret_len())
            .field("checksum", &self.stored_checksum())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RecordImage {
        RecordImage::seal(2, 5, &[0x3C; SECRET_CAPACITY])
    }

    #[test]
    fn layout_matches_fixed_offsets() {
        assert_eq!(OFFSET_CHECKSUM, 0x23);
        assert_eq!(RECORD_LEN, 36);
        assert!(RECORD_LEN <= REGION_LEN);

        let image = sample();
        let bytes = image.as_bytes();
        assert_eq!(bytes[0x00], RECORD_MAGIC);
        assert_eq!(bytes[0x01], 2);
        assert_eq!(bytes[0x02], 5);
        assert!(bytes[0x03..0x23].iter().all(|byte| *byte == 0x3C));
        assert_eq!(bytes[0x23], xor_checksum(0, &bytes[..0x23]));
    }

    #[test]
    fn sealed_record_validates() {
        assert_eq!(sample().validate(), Ok(()));
    }

    #[test]
    fn cleared_magic_is_rejected_first() {
        let mut bytes = *sample().as_bytes();
        bytes[OFFSET_MAGIC] = 0x00;
        let image = RecordImage::from_bytes(bytes);

        assert_eq!(image.validate(), Err(RecordError::BadMagic(0x00)));
    }

    #[test]
    fn any_single_byte_corruption_is_rejected() {
        let original = *sample().as_bytes();
        for offset in 0..RECORD_LEN {
            let mut bytes = original;
            bytes[offset] ^= 0x5A;
            let image = RecordImage::from_bytes(bytes);
            assert!(image.validate().is_err(), "offset {offset:#04x} accepted");
        }
    }

    #[test]
    fn out_of_range_fields_are_rejected_even_with_good_checksum() {
        let slot = RecordImage::seal(3, 5, &[0; SECRET_CAPACITY]);
        assert_eq!(slot.validate(), Err(RecordError::SlotOutOfRange(3)));

        let empty = RecordImage::seal(1, 0, &[0; SECRET_CAPACITY]);
        assert_eq!(empty.validate(), Err(RecordError::LengthOutOfRange(0)));

        let long = RecordImage::seal(1, 33, &[0; SECRET_CAPACITY]);
        assert_eq!(long.validate(), Err(RecordError::LengthOutOfRange(33)));
    }

    #[test]
    fn fields_cover_the_record_in_write_order() {
        let image = sample();
        let fields = image.fields();
        let offsets: [usize; 5] = core::array::from_fn(|idx| fields[idx].0);
        assert_eq!(offsets, [0x00, 0x01, 0x02, 0x03, 0x23]);

        let total: usize = fields.iter().map(|(_, bytes)| bytes.len()).sum();
        assert_eq!(total, RECORD_LEN);
    }
}
