//! Two-slot transactional enrollment of a fingerprint plus secret.
//!
//! The new template is staged in the slot the current credential does not
//! use, and the record is only rewritten once the template is stored and the
//! secret confirmed. Until the commit succeeds the old record and old
//! template stay exactly as they were; every failure path rolls back to
//! that pair. Flipping the mode switch aborts at any point before commit.
use core::fmt;

use shared::console::{
    MSG_MISMATCH, MSG_TOO_MANY_MISMATCHES, PROMPT_CONFIRM_SECRET, PROMPT_ENTER_SECRET, Tag,
};

use crate::config::Timings;
use crate::console::Console;
use crate::indicator::{Indicator, LedState};
use crate::input::{InputError, SecretReader};
use crate::platform::{Peripherals, Platform};
use crate::secret::SecretBuffer;
use crate::sensor::FingerprintSensor;
use crate::storage::{CredentialStore, Slot};
use crate::switch::abort_requested;
use crate::time::{Clock, Deadline};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegistrationState {
    Idle,
    CleaningStaging,
    /// Taking sample `sample` of `Timings::collect_count`, 1-based.
    Capturing {
        sample: u8,
    },
    Storing,
    ReadingSecret,
    ConfirmingSecret,
    Committing,
    Success,
    RolledBack,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegistrationError {
    /// The mode switch moved before commit.
    Aborted,
    CaptureRetriesExhausted,
    /// The finger stayed on the sensor past the removal window.
    FingerNotRemoved,
    /// The sensor refused to store the staged template.
    StoreFailed,
    InputTimeout,
    TooManyMismatches,
    /// The record could not be written or did not verify.
    CommitFailed,
}

impl From<InputError> for RegistrationError {
    fn from(error: InputError) -> Self {
        match error {
            InputError::Aborted => RegistrationError::Aborted,
            InputError::Timeout => RegistrationError::InputTimeout,
        }
    }
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RegistrationError::Aborted => "aborted by mode switch",
            RegistrationError::CaptureRetriesExhausted => "capture retries exhausted",
            RegistrationError::FingerNotRemoved => "finger not removed",
            RegistrationError::StoreFailed => "sensor failed to store template",
            RegistrationError::InputTimeout => "secret entry timed out",
            RegistrationError::TooManyMismatches => "secret confirmation failed",
            RegistrationError::CommitFailed => "credential commit failed",
        };
        write!(f, "{label}")
    }
}

impl core::error::Error for RegistrationError {}

pub struct RegistrationProtocol<'a, P: Platform> {
    store: &'a mut CredentialStore<P::Region>,
    io: &'a mut Peripherals<P>,
    timings: &'a Timings,
    state: RegistrationState,
    staging: Slot,
    template_staged: bool,
}

impl<'a, P: Platform> RegistrationProtocol<'a, P> {
    pub fn new(
        store: &'a mut CredentialStore<P::Region>,
        io: &'a mut Peripherals<P>,
        timings: &'a Timings,
    ) -> Self {
        Self {
            store,
            io,
            timings,
            state: RegistrationState::Idle,
            staging: Slot::One,
            template_staged: false,
        }
    }

    pub fn state(&self) -> RegistrationState {
        self.state
    }

    /// Enroll a new credential. On success returns the slot that is now
    /// active; on failure the previous credential is intact.
    pub fn run(&mut self) -> Result<Slot, RegistrationError> {
        log::info!(target: "mode", "REGISTER");
        self.template_staged = false;

        match self.execute() {
            Ok(slot) => {
                self.state = RegistrationState::Success;
                self.io.indicator.show(LedState::RegisterSuccess);
                log::info!(target: "reg", "Registration complete (slot {slot} now active)");
                self.io.clock.delay_ms(self.timings.success_hold_ms);
                Ok(slot)
            }
            Err(err) => {
                self.roll_back(err);
                Err(err)
            }
        }
    }

    fn execute(&mut self) -> Result<Slot, RegistrationError> {
        let active = self.store.active_slot();
        self.staging = Slot::staging_for(active);
        match active {
            Some(slot) => log::info!(
                target: "reg",
                "Active slot: {slot}, staging to slot: {}",
                self.staging
            ),
            None => log::info!(
                target: "reg",
                "Active slot: none (virgin), staging to slot: {}",
                self.staging
            ),
        }

        self.enter(RegistrationState::CleaningStaging)?;
        if let Err(err) = self.io.sensor.delete(self.staging.id()) {
            log::warn!("Cleaning staging slot {} failed: {err}", self.staging);
        }
        log::info!(target: "reg", "Cleaned staging slot {}", self.staging);

        self.capture_samples()?;

        self.enter(RegistrationState::Storing)?;
        if let Err(err) = self.io.sensor.store(self.staging.id()) {
            log::error!("Storing to staging slot {} failed: {err}", self.staging);
            return Err(RegistrationError::StoreFailed);
        }
        self.template_staged = true;
        log::info!(target: "reg", "Stored template in staging slot {}", self.staging);

        self.enter(RegistrationState::ReadingSecret)?;
        self.io.indicator.show(LedState::WaitingSecret);
        let secret = self.read_confirmed_secret()?;

        self.enter(RegistrationState::Committing)?;
        self.commit(active, &secret)?;
        Ok(self.staging)
    }

    fn capture_samples(&mut self) -> Result<(), RegistrationError> {
        let total = self.timings.collect_count;
        self.io.indicator.show(LedState::WaitingFinger);

        for sample in 1..=total {
            self.enter(RegistrationState::Capturing { sample })?;
            let mut failures = 0u8;

            loop {
                self.check_abort()?;
                log::info!(target: "reg", "Place finger ({sample}/{total})...");
                self.io.indicator.show(LedState::WaitingFinger);

                match self.io.sensor.capture(self.timings.capture_timeout_s) {
                    Ok(()) => {
                        self.io.indicator.show(LedState::CaptureOk);
                        log::info!(target: "reg", "Captured {sample}/{total}");
                        log::info!(target: "reg", "Remove finger...");
                        self.wait_for_removal()?;
                        self.pause(self.timings.settle_ms)?;
                        break;
                    }
                    Err(err) => {
                        self.io.indicator.show(LedState::CaptureFail);
                        failures += 1;
                        log::info!(
                            target: "reg",
                            "Capture failed: {err} (attempt {failures}/{})",
                            self.timings.capture_retries
                        );
                        if failures >= self.timings.capture_retries {
                            log::info!(target: "reg", "Max retries, enrollment failed");
                            return Err(RegistrationError::CaptureRetriesExhausted);
                        }
                        self.pause(self.timings.retry_delay_ms)?;
                        self.wait_for_removal()?;
                    }
                }
            }
        }
        Ok(())
    }

    fn read_confirmed_secret(&mut self) -> Result<SecretBuffer, RegistrationError> {
        let secret = self.read_secret(PROMPT_ENTER_SECRET)?;
        let attempts = self.timings.confirm_attempts;

        for attempt in 1..=attempts {
            self.enter(RegistrationState::ConfirmingSecret)?;
            let confirmation = self.read_secret(PROMPT_CONFIRM_SECRET)?;
            if secret.matches(&confirmation) {
                return Ok(secret);
            }
            self.io.console.write_line_fmt(
                Tag::Reg,
                format_args!("{MSG_MISMATCH} (attempt {attempt}/{attempts})"),
            );
        }

        self.io.console.write_line(Tag::Reg, MSG_TOO_MANY_MISMATCHES);
        Err(RegistrationError::TooManyMismatches)
    }

    fn read_secret(&mut self, prompt: &str) -> Result<SecretBuffer, RegistrationError> {
        let reader = SecretReader::new(
            Tag::Reg,
            self.timings.secret_timeout_ms,
            self.timings.secret_poll_ms,
        );
        let Peripherals {
            console,
            clock,
            switch,
            ..
        } = &mut *self.io;
        let secret = reader.read(console, clock, prompt, || abort_requested(&mut *switch))?;
        Ok(secret)
    }

    fn commit(
        &mut self,
        previous_slot: Option<Slot>,
        secret: &SecretBuffer,
    ) -> Result<(), RegistrationError> {
        log::info!(target: "reg", "Committing...");
        let previous = self.store.read();

        if let Err(err) = self.store.write(self.staging, secret.as_bytes()) {
            log::error!("EEPROM write failed: {err}");
            let restored = match &previous {
                Some(old) => self.store.write(old.slot, old.secret.as_bytes()),
                None => self.store.clear(),
            };
            match restored {
                Ok(()) => log::info!(target: "reg", "Old EEPROM data restored"),
                Err(err) => log::error!("Restoring previous record failed: {err}"),
            }
            return Err(RegistrationError::CommitFailed);
        }

        if let Some(old) = previous_slot.filter(|old| *old != self.staging) {
            if let Err(err) = self.io.sensor.delete(old.id()) {
                log::warn!("Deleting old slot {old} failed: {err}");
            } else {
                log::info!(target: "reg", "Deleted old slot {old}");
            }
        }
        self.template_staged = false;
        Ok(())
    }

    fn roll_back(&mut self, err: RegistrationError) {
        self.state = RegistrationState::RolledBack;
        let led = if err == RegistrationError::Aborted {
            LedState::SwitchAbort
        } else {
            LedState::RegisterFail
        };
        self.io.indicator.show(led);

        if self.template_staged {
            if let Err(delete_err) = self.io.sensor.delete(self.staging.id()) {
                log::error!("Cleaning staging slot {} failed: {delete_err}", self.staging);
            } else {
                log::info!(target: "reg", "Cleaned staging slot {}", self.staging);
            }
            self.template_staged = false;
        }
        log::info!(target: "reg", "Rolled back ({err}), old registration preserved");
    }

    /// Move to `state`, failing if the switch moved.
    fn enter(&mut self, state: RegistrationState) -> Result<(), RegistrationError> {
        self.state = state;
        log::debug!(target: "reg", "-> {state:?}");
        self.check_abort()
    }

    fn check_abort(&mut self) -> Result<(), RegistrationError> {
        if abort_requested(&mut self.io.switch) {
            log::warn!("Switch changed, aborting registration");
            return Err(RegistrationError::Aborted);
        }
        Ok(())
    }

    /// Sleep for `ms`, polling the abort signal every removal poll interval.
    fn pause(&mut self, ms: u64) -> Result<(), RegistrationError> {
        let deadline = Deadline::after(&self.io.clock, ms);
        loop {
            self.check_abort()?;
            let remaining = deadline.remaining_ms(&self.io.clock);
            if remaining == 0 {
                return Ok(());
            }
            self.io
                .clock
                .delay_ms(remaining.min(self.timings.removal_poll_ms));
        }
    }

    fn wait_for_removal(&mut self) -> Result<(), RegistrationError> {
        let deadline = Deadline::after(&self.io.clock, self.timings.removal_timeout_ms);
        while self.io.sensor.finger_present() {
            self.check_abort()?;
            if deadline.expired(&self.io.clock) {
                log::info!(target: "reg", "Finger not removed in time");
                return Err(RegistrationError::FingerNotRemoved);
            }
            self.io.clock.delay_ms(self.timings.removal_poll_ms);
        }
        Ok(())
    }
}
