//! Startup reconciliation of the credential record with sensor templates.
//!
//! | record | active template | outcome   | repair                      |
//! |--------|-----------------|-----------|-----------------------------|
//! | valid  | present         | `Valid`   | delete template in other slot |
//! | valid  | missing         | `Corrupt` | clear record, delete both   |
//! | absent | none            | `Virgin`  | -                           |
//! | absent | some            | `Corrupt` | delete both                 |
use core::fmt;

use crate::config::ENROLLED_ID_BUFFER;
use crate::indicator::{Indicator, LedState};
use crate::platform::{Peripherals, Platform};
use crate::sensor::FingerprintSensor;
use crate::storage::{CredentialStore, Slot};
use crate::time::Clock;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BootOutcome {
    /// Record and active template agree.
    Valid,
    /// Nothing registered.
    Virgin,
    /// Inconsistent state found and wiped.
    Corrupt,
}

impl fmt::Display for BootOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BootOutcome::Valid => "VALID",
            BootOutcome::Virgin => "VIRGIN",
            BootOutcome::Corrupt => "CORRUPT",
        };
        f.write_str(label)
    }
}

/// Which of the two slots hold a template.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SlotOccupancy {
    one: bool,
    two: bool,
}

impl SlotOccupancy {
    pub const fn new(one: bool, two: bool) -> Self {
        Self { one, two }
    }

    /// Both slots, used when the sensor cannot say which are in use.
    pub const fn assume_all() -> Self {
        Self::new(true, true)
    }

    /// Read occupancy from the enrolled-ID list.
    ///
    /// When the count or the list cannot be read, both slots are reported
    /// occupied. This over-reports on purpose: a populated sensor must never
    /// read as blank.
    pub fn scan<S: FingerprintSensor + ?Sized>(sensor: &mut S) -> Self {
        let count = match sensor.enrolled_count() {
            Ok(0) => return Self::default(),
            Ok(count) => count,
            Err(err) => {
                log::warn!(target: "boot", "Enrolled count unavailable ({err}), assuming both slots used");
                return Self::assume_all();
            }
        };

        let mut ids = [0u8; ENROLLED_ID_BUFFER];
        let listed = match sensor.enrolled_ids(&mut ids) {
            Ok(listed) => listed,
            Err(err) => {
                log::warn!(target: "boot", "Enrolled ID list failed ({err}), assuming both slots used");
                return Self::assume_all();
            }
        };

        let limit = listed
            .min(count as usize)
            .min(sensor.max_enrollments() as usize)
            .min(ids.len());
        let mut occupancy = Self::default();
        for id in &ids[..limit] {
            match Slot::try_from(*id) {
                Ok(Slot::One) => occupancy.one = true,
                Ok(Slot::Two) => occupancy.two = true,
                Err(_) => {}
            }
        }
        occupancy
    }

    pub fn is_occupied(&self, slot: Slot) -> bool {
        match slot {
            Slot::One => self.one,
            Slot::Two => self.two,
        }
    }

    pub fn any(&self) -> bool {
        self.one || self.two
    }
}

/// Runs once per startup, before anything else touches the store.
pub struct BootValidator<'a, P: Platform> {
    store: &'a mut CredentialStore<P::Region>,
    io: &'a mut Peripherals<P>,
    corrupt_hold_ms: u64,
}

impl<'a, P: Platform> BootValidator<'a, P> {
    pub fn new(
        store: &'a mut CredentialStore<P::Region>,
        io: &'a mut Peripherals<P>,
        corrupt_hold_ms: u64,
    ) -> Self {
        Self {
            store,
            io,
            corrupt_hold_ms,
        }
    }

    /// Classify the startup state and repair it. Repairs finish before the
    /// outcome is returned.
    pub fn run(&mut self) -> BootOutcome {
        log::info!(target: "boot", "Running integrity check...");

        // Only the slot is needed; the secret is wiped as the credential drops.
        let active = self.store.read().map(|credential| credential.slot);
        let occupancy = SlotOccupancy::scan(&mut self.io.sensor);

        match active {
            Some(slot) => log::info!(target: "boot", "EEPROM: valid (slot {slot})"),
            None => log::info!(target: "boot", "EEPROM: invalid"),
        }
        log::info!(
            target: "boot",
            "Sensor: slot1={} slot2={}",
            occupied_label(occupancy.is_occupied(Slot::One)),
            occupied_label(occupancy.is_occupied(Slot::Two)),
        );

        match active {
            Some(slot) if occupancy.is_occupied(slot) => {
                log::info!(target: "boot", "State: VALID");
                let other = slot.other();
                if occupancy.is_occupied(other) {
                    self.delete_template(other);
                    log::info!(target: "boot", "Cleaned orphan in slot {other}");
                }
                BootOutcome::Valid
            }
            Some(_) => {
                log::warn!("Fingerprint missing for active slot, corrupt");
                self.io.indicator.show(LedState::CorruptState);
                if let Err(err) = self.store.clear() {
                    log::error!("Failed to clear record: {err}");
                }
                self.delete_all();
                log::warn!("Cleared EEPROM + all fingerprints");
                self.io.clock.delay_ms(self.corrupt_hold_ms);
                BootOutcome::Corrupt
            }
            None if !occupancy.any() => {
                log::info!(target: "boot", "State: VIRGIN");
                BootOutcome::Virgin
            }
            None => {
                log::warn!("Orphan fingerprint(s) without password, corrupt");
                self.io.indicator.show(LedState::CorruptState);
                self.delete_all();
                log::warn!("Cleared orphan fingerprints");
                self.io.clock.delay_ms(self.corrupt_hold_ms);
                BootOutcome::Corrupt
            }
        }
    }

    fn delete_all(&mut self) {
        for slot in Slot::ALL {
            self.delete_template(slot);
        }
    }

    fn delete_template(&mut self, slot: Slot) {
        if let Err(err) = self.io.sensor.delete(slot.id()) {
            log::warn!("Deleting slot {slot} failed: {err}");
        }
    }
}

fn occupied_label(occupied: bool) -> &'static str {
    if occupied { "occupied" } else { "empty" }
}
