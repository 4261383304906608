use alloc::collections::VecDeque;
use alloc::vec::Vec;

use crate::sensor::{FingerprintSensor, SensorError};

const DEFAULT_CAPACITY: u8 = 80;

/// Scripted fingerprint module.
///
/// Captures succeed unless scripted otherwise. A search matches the template
/// of the finger set with [`MockSensor::place_finger`] if that slot holds one.
#[derive(Debug)]
pub struct MockSensor {
    enrolled: Vec<u8>,
    captures: VecDeque<Result<(), SensorError>>,
    presence: VecDeque<bool>,
    finger_stuck: bool,
    finger: Option<u8>,
    max_enrollments: u8,
    fail_store: bool,
    fail_delete: bool,
    fail_search: bool,
    fail_count: bool,
    fail_list: bool,
    capture_calls: usize,
    deleted: Vec<u8>,
    stored: Vec<u8>,
}

impl MockSensor {
    pub fn new() -> Self {
        Self {
            enrolled: Vec::new(),
            captures: VecDeque::new(),
            presence: VecDeque::new(),
            finger_stuck: false,
            finger: None,
            max_enrollments: DEFAULT_CAPACITY,
            fail_store: false,
            fail_delete: false,
            fail_search: false,
            fail_count: false,
            fail_list: false,
            capture_calls: 0,
            deleted: Vec::new(),
            stored: Vec::new(),
        }
    }

    pub fn enroll(&mut self, id: u8) {
        if !self.enrolled.contains(&id) {
            self.enrolled.push(id);
        }
    }

    pub fn is_enrolled(&self, id: u8) -> bool {
        self.enrolled.contains(&id)
    }

    pub fn enrolled_total(&self) -> usize {
        self.enrolled.len()
    }

    /// Queue capture results consumed before the default success.
    pub fn script_captures<I>(&mut self, results: I)
    where
        I: IntoIterator<Item = Result<(), SensorError>>,
    {
        self.captures.extend(results);
    }

    /// Report a finger for the next `polls` presence checks.
    pub fn hold_finger(&mut self, polls: usize) {
        self.presence.extend(core::iter::repeat_n(true, polls));
    }

    /// Keep reporting a finger forever.
    pub fn stick_finger(&mut self, stuck: bool) {
        self.finger_stuck = stuck;
    }

    /// The finger searches will identify, by the slot its template lives in.
    pub fn place_finger(&mut self, slot: Option<u8>) {
        self.finger = slot;
    }

    pub fn set_max_enrollments(&mut self, max: u8) {
        self.max_enrollments = max;
    }

    pub fn fail_store(&mut self, fail: bool) {
        self.fail_store = fail;
    }

    /// Make every delete report a link error without touching templates.
    pub fn fail_delete(&mut self, fail: bool) {
        self.fail_delete = fail;
    }

    pub fn fail_search(&mut self, fail: bool) {
        self.fail_search = fail;
    }

    pub fn fail_count(&mut self, fail: bool) {
        self.fail_count = fail;
    }

    pub fn fail_list(&mut self, fail: bool) {
        self.fail_list = fail;
    }

    pub fn capture_calls(&self) -> usize {
        self.capture_calls
    }

    /// IDs passed to `delete`, in call order.
    pub fn deleted(&self) -> &[u8] {
        &self.deleted
    }

    /// IDs successfully stored, in call order.
    pub fn stored(&self) -> &[u8] {
        &self.stored
    }
}

impl Default for MockSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl FingerprintSensor for MockSensor {
    fn capture(&mut self, _timeout_s: u8) -> Result<(), SensorError> {
        self.capture_calls += 1;
        self.captures.pop_front().unwrap_or(Ok(()))
    }

    fn finger_present(&mut self) -> bool {
        self.finger_stuck || self.presence.pop_front().unwrap_or(false)
    }

    fn store(&mut self, id: u8) -> Result<(), SensorError> {
        if self.fail_store {
            return Err(SensorError::Rejected);
        }
        self.enroll(id);
        self.stored.push(id);
        Ok(())
    }

    fn delete(&mut self, id: u8) -> Result<(), SensorError> {
        self.deleted.push(id);
        if self.fail_delete {
            return Err(SensorError::Link);
        }
        self.enrolled.retain(|enrolled| *enrolled != id);
        Ok(())
    }

    fn search(&mut self) -> Result<Option<u8>, SensorError> {
        if self.fail_search {
            return Err(SensorError::Link);
        }
        Ok(self.finger.filter(|slot| self.enrolled.contains(slot)))
    }

    fn enrolled_count(&mut self) -> Result<u8, SensorError> {
        if self.fail_count {
            return Err(SensorError::Link);
        }
        Ok(self.enrolled.len() as u8)
    }

    fn enrolled_ids(&mut self, ids: &mut [u8]) -> Result<usize, SensorError> {
        if self.fail_list {
            return Err(SensorError::Link);
        }
        let written = self.enrolled.len().min(ids.len());
        ids[..written].copy_from_slice(&self.enrolled[..written]);
        Ok(written)
    }

    fn max_enrollments(&self) -> u8 {
        self.max_enrollments
    }
}
