//! Encrypted, checksummed credential record in the persistent region.
//!
//! [`CredentialStore`] is the only writer of the region. Records are
//! validated (magic, checksum, field ranges) before anything is decrypted,
//! and a write only counts once the committed bytes read back identical.
use core::fmt;

use embedded_storage::{ReadStorage, Storage};
use shared::record::{OFFSET_MAGIC, RECORD_LEN, REGION_LEN, RecordImage, SECRET_CAPACITY};

use crate::crypto::DeviceKeyMaterial;
use crate::secret::SecretBuffer;

/// Byte-addressable persistent region with an explicit commit step, such as
/// flash-emulated EEPROM.
pub trait EepromRegion: Storage {
    /// Prepare `len` bytes for access. Called once before any other method.
    fn begin(&mut self, len: usize) -> Result<(), Self::Error> {
        let _ = len;
        Ok(())
    }

    /// Make all earlier writes durable.
    fn commit(&mut self) -> Result<(), Self::Error>;
}

/// One of the two biometric slots the appliance uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Slot {
    One,
    Two,
}

impl Slot {
    pub const ALL: [Slot; 2] = [Slot::One, Slot::Two];

    /// Sensor slot ID.
    pub const fn id(self) -> u8 {
        match self {
            Slot::One => 1,
            Slot::Two => 2,
        }
    }

    pub const fn other(self) -> Slot {
        match self {
            Slot::One => Slot::Two,
            Slot::Two => Slot::One,
        }
    }

    /// Where a new registration goes given the current active slot.
    pub const fn staging_for(active: Option<Slot>) -> Slot {
        match active {
            Some(slot) => slot.other(),
            None => Slot::One,
        }
    }
}

impl TryFrom<u8> for Slot {
    type Error = InvalidSlot;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        match id {
            1 => Ok(Slot::One),
            2 => Ok(Slot::Two),
            other => Err(InvalidSlot(other)),
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InvalidSlot(pub u8);

impl fmt::Display for InvalidSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot {} is not 1 or 2", self.0)
    }
}

impl core::error::Error for InvalidSlot {}

#[derive(Debug, PartialEq, Eq)]
pub enum StoreError<E> {
    /// Slot ID outside {1, 2}.
    InvalidSlot(u8),
    /// Secret length outside 1..=32.
    InvalidLength(usize),
    Region(E),
    /// Committed bytes did not read back as written.
    VerifyMismatch,
}

impl<E> From<InvalidSlot> for StoreError<E> {
    fn from(error: InvalidSlot) -> Self {
        StoreError::InvalidSlot(error.0)
    }
}

impl<E: fmt::Debug> fmt::Display for StoreError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::InvalidSlot(id) => write!(f, "invalid slot {id}"),
            StoreError::InvalidLength(len) => {
                write!(f, "secret length {len} outside 1..={SECRET_CAPACITY}")
            }
            StoreError::Region(err) => write!(f, "region error: {err:?}"),
            StoreError::VerifyMismatch => write!(f, "read-back verification failed"),
        }
    }
}

impl<E: fmt::Debug> core::error::Error for StoreError<E> {}

/// Decrypted record: the active slot and its secret.
#[derive(Debug)]
pub struct Credential {
    pub slot: Slot,
    pub secret: SecretBuffer,
}

pub struct CredentialStore<R> {
    region: R,
    keys: DeviceKeyMaterial,
    ready: bool,
}

impl<R: EepromRegion> CredentialStore<R>
where
    R::Error: fmt::Debug,
{
    pub fn new(region: R, keys: DeviceKeyMaterial) -> Self {
        Self {
            region,
            keys,
            ready: false,
        }
    }

    /// Prepare the region. Safe to call more than once.
    pub fn init(&mut self) -> Result<(), StoreError<R::Error>> {
        if !self.ready {
            self.region.begin(REGION_LEN).map_err(StoreError::Region)?;
            self.ready = true;
        }
        Ok(())
    }

    /// Current credential, or `None` when absent, corrupt or unreadable.
    pub fn read(&mut self) -> Option<Credential> {
        let image = match self.load_image() {
            Ok(image) => image,
            Err(err) => {
                log::warn!("EEPROM read failed: {err:?}");
                return None;
            }
        };
        if let Err(err) = image.validate() {
            log::debug!("No valid record: {err}");
            return None;
        }

        let slot = Slot::try_from(image.active_slot()).ok()?;
        let plaintext = self.keys.decrypt(&image.ciphertext());
        let secret = SecretBuffer::from_bytes(&plaintext[..image.secret_len() as usize])?;
        Some(Credential { slot, secret })
    }

    /// Persist `secret` as the credential for `slot`.
    ///
    /// Fields are written magic first and checksum last, then committed and
    /// read back. Only an exact read-back counts as success.
    pub fn write(&mut self, slot: Slot, secret: &[u8]) -> Result<(), StoreError<R::Error>> {
        if secret.is_empty() || secret.len() > SECRET_CAPACITY {
            return Err(StoreError::InvalidLength(secret.len()));
        }
        let plaintext = SecretBuffer::from_bytes(secret).ok_or(StoreError::InvalidLength(secret.len()))?;
        let ciphertext = self.keys.encrypt(plaintext.padded());
        let image = RecordImage::seal(slot.id(), secret.len() as u8, &ciphertext);

        for (offset, bytes) in image.fields() {
            self.region
                .write(offset as u32, bytes)
                .map_err(StoreError::Region)?;
        }
        self.region.commit().map_err(StoreError::Region)?;

        match self.read() {
            Some(stored) if stored.slot == slot && stored.secret.matches(&plaintext) => Ok(()),
            _ => Err(StoreError::VerifyMismatch),
        }
    }

    /// Invalidate the record by clearing its magic byte.
    pub fn clear(&mut self) -> Result<(), StoreError<R::Error>> {
        self.region
            .write(OFFSET_MAGIC as u32, &[0])
            .map_err(StoreError::Region)?;
        self.region.commit().map_err(StoreError::Region)
    }

    pub fn active_slot(&mut self) -> Option<Slot> {
        self.read().map(|credential| credential.slot)
    }

    /// The slot a new registration is staged into.
    pub fn staging_slot(&mut self) -> Slot {
        Slot::staging_for(self.active_slot())
    }

    pub fn region(&self) -> &R {
        &self.region
    }

    pub fn region_mut(&mut self) -> &mut R {
        &mut self.region
    }

    fn load_image(&mut self) -> Result<RecordImage, R::Error> {
        let mut bytes = [0u8; RECORD_LEN];
        ReadStorage::read(&mut self.region, 0, &mut bytes)?;
        Ok(RecordImage::from_bytes(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryEeprom, MemoryEepromError};
    use shared::record::{OFFSET_ACTIVE_SLOT, OFFSET_CHECKSUM, OFFSET_CIPHERTEXT};

    const BOARD: [u8; 8] = [1, 2, 3, 4, 5, 6, 7, 8];

    fn store() -> CredentialStore<MemoryEeprom> {
        let mut store = CredentialStore::new(
            MemoryEeprom::new(),
            DeviceKeyMaterial::from_unique_id(&BOARD),
        );
        store.init().unwrap();
        store
    }

    #[test]
    fn fresh_region_has_no_credential() {
        let mut store = store();
        assert!(store.read().is_none());
        assert_eq!(store.active_slot(), None);
        assert_eq!(store.staging_slot(), Slot::One);
    }

    #[test]
    fn init_is_idempotent() {
        let mut store = store();
        store.write(Slot::Two, b"hunter2").unwrap();
        store.init().unwrap();
        assert_eq!(store.region().begin_calls(), 1);
        assert_eq!(store.active_slot(), Some(Slot::Two));
    }

    #[test]
    fn write_then_read_returns_same_secret() {
        let mut store = store();
        store.write(Slot::Two, b"correct horse").unwrap();

        let credential = store.read().unwrap();
        assert_eq!(credential.slot, Slot::Two);
        assert_eq!(credential.secret.as_bytes(), b"correct horse");
        assert_eq!(store.staging_slot(), Slot::One);
    }

    #[test]
    fn secret_is_not_stored_in_clear() {
        let mut store = store();
        store.write(Slot::One, b"swordfish").unwrap();
        let committed = store.region().committed();
        let ciphertext = &committed[OFFSET_CIPHERTEXT..OFFSET_CHECKSUM];
        assert!(!ciphertext.windows(9).any(|window| window == b"swordfish"));
    }

    #[test]
    fn survives_power_cycle() {
        let mut store = store();
        store.write(Slot::One, b"swordfish").unwrap();
        store.region_mut().power_cycle();
        assert_eq!(store.read().unwrap().secret.as_bytes(), b"swordfish");
    }

    #[test]
    fn any_corrupted_byte_reads_as_absent() {
        for offset in 0..RECORD_LEN {
            let mut store = store();
            store.write(Slot::One, b"swordfish").unwrap();
            store.region_mut().corrupt(offset, 0x40);
            assert!(store.read().is_none(), "corruption at {offset:#04x} accepted");
        }
    }

    #[test]
    fn invalid_arguments_are_rejected_before_io() {
        let mut store = store();
        let writes_before = store.region().write_calls();

        assert_eq!(store.write(Slot::One, b""), Err(StoreError::InvalidLength(0)));
        assert_eq!(
            store.write(Slot::One, &[b'x'; 33]),
            Err(StoreError::InvalidLength(33))
        );
        let bad_slot: Result<(), StoreError<MemoryEepromError>> =
            Slot::try_from(3).map_err(StoreError::from).map(|_| ());
        assert_eq!(bad_slot, Err(StoreError::InvalidSlot(3)));
        assert_eq!(Slot::try_from(0), Err(InvalidSlot(0)));

        assert_eq!(store.region().write_calls(), writes_before);
    }

    #[test]
    fn full_length_secret_round_trips() {
        let mut store = store();
        let secret = [b'z'; SECRET_CAPACITY];
        store.write(Slot::One, &secret).unwrap();
        assert_eq!(store.read().unwrap().secret.as_bytes(), &secret);
    }

    #[test]
    fn clear_only_touches_magic() {
        let mut store = store();
        store.write(Slot::Two, b"swordfish").unwrap();
        let before = store.region().committed();

        store.clear().unwrap();
        let after = store.region().committed();

        assert!(store.read().is_none());
        assert_eq!(after[OFFSET_MAGIC], 0);
        assert_eq!(before[1..], after[1..]);
        assert_eq!(after[OFFSET_ACTIVE_SLOT], 2);
    }

    #[test]
    fn failed_commit_is_reported() {
        let mut store = store();
        store.region_mut().fail_commits(1);
        assert_eq!(
            store.write(Slot::One, b"swordfish"),
            Err(StoreError::Region(MemoryEepromError::CommitFailed))
        );
    }

    #[test]
    fn stuck_byte_fails_verification() {
        let mut store = store();
        store.region_mut().stick_byte(OFFSET_ACTIVE_SLOT, 1);
        assert_eq!(
            store.write(Slot::Two, b"swordfish"),
            Err(StoreError::VerifyMismatch)
        );
    }

    #[test]
    fn other_device_reads_garbage_or_nothing() {
        let mut store = store();
        store.write(Slot::One, b"swordfish").unwrap();
        let image = store.region().committed();

        let mut foreign = CredentialStore::new(
            MemoryEeprom::with_contents(image),
            DeviceKeyMaterial::from_unique_id(&[8, 7, 6, 5, 4, 3, 2, 1]),
        );
        foreign.init().unwrap();
        if let Some(credential) = foreign.read() {
            assert_ne!(credential.secret.as_bytes(), b"swordfish");
        }
    }

    #[test]
    fn staging_is_always_the_other_slot() {
        assert_eq!(Slot::staging_for(None), Slot::One);
        assert_eq!(Slot::staging_for(Some(Slot::One)), Slot::Two);
        assert_eq!(Slot::staging_for(Some(Slot::Two)), Slot::One);
    }
}
