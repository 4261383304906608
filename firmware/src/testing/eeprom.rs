use embedded_storage::{ReadStorage, Storage};
use shared::record::REGION_LEN;

use crate::storage::EepromRegion;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemoryEepromError {
    OutOfBounds,
    CommitFailed,
}

/// RAM-cached EEPROM: writes land in a cache, `commit` makes them durable
/// and `power_cycle` drops whatever was not committed.
#[derive(Clone, Debug)]
pub struct MemoryEeprom {
    cache: [u8; REGION_LEN],
    committed: [u8; REGION_LEN],
    begin_calls: usize,
    write_calls: usize,
    failing_commits: usize,
    stuck: Option<(usize, u8)>,
}

impl MemoryEeprom {
    /// Factory state of emulated EEPROM: all bytes erased to 0xFF.
    pub fn new() -> Self {
        Self::with_contents([0xFF; REGION_LEN])
    }

    pub fn with_contents(contents: [u8; REGION_LEN]) -> Self {
        Self {
            cache: contents,
            committed: contents,
            begin_calls: 0,
            write_calls: 0,
            failing_commits: 0,
            stuck: None,
        }
    }

    pub fn committed(&self) -> [u8; REGION_LEN] {
        self.committed
    }

    pub fn begin_calls(&self) -> usize {
        self.begin_calls
    }

    pub fn write_calls(&self) -> usize {
        self.write_calls
    }

    /// Fail the next `count` commits, leaving durable contents untouched.
    pub fn fail_commits(&mut self, count: usize) {
        self.failing_commits = count;
    }

    /// Make `offset` ignore writes and always hold `value`.
    pub fn stick_byte(&mut self, offset: usize, value: u8) {
        self.stuck = Some((offset, value));
        self.cache[offset] = value;
    }

    /// Flip bits at `offset` in both the cache and durable contents.
    pub fn corrupt(&mut self, offset: usize, mask: u8) {
        self.cache[offset] ^= mask;
        self.committed[offset] ^= mask;
    }

    pub fn power_cycle(&mut self) {
        self.cache = self.committed;
    }

    fn range(offset: u32, len: usize) -> Result<core::ops::Range<usize>, MemoryEepromError> {
        let start = offset as usize;
        let end = start.checked_add(len).ok_or(MemoryEepromError::OutOfBounds)?;
        if end > REGION_LEN {
            return Err(MemoryEepromError::OutOfBounds);
        }
        Ok(start..end)
    }
}

impl Default for MemoryEeprom {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadStorage for MemoryEeprom {
    type Error = MemoryEepromError;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let range = Self::range(offset, bytes.len())?;
        bytes.copy_from_slice(&self.cache[range]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        REGION_LEN
    }
}

impl Storage for MemoryEeprom {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        let range = Self::range(offset, bytes.len())?;
        self.write_calls += 1;
        self.cache[range].copy_from_slice(bytes);
        if let Some((offset, value)) = self.stuck {
            self.cache[offset] = value;
        }
        Ok(())
    }
}

impl EepromRegion for MemoryEeprom {
    fn begin(&mut self, len: usize) -> Result<(), Self::Error> {
        if len > REGION_LEN {
            return Err(MemoryEepromError::OutOfBounds);
        }
        self.begin_calls += 1;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), Self::Error> {
        if self.failing_commits > 0 {
            self.failing_commits -= 1;
            return Err(MemoryEepromError::CommitFailed);
        }
        self.committed = self.cache;
        Ok(())
    }
}
