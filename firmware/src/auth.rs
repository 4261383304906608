//! Fingerprint match followed by the keystroke unlock, with a cooldown.
use core::fmt;

use crate::config::Timings;
use crate::hid::UnlockScript;
use crate::indicator::{Indicator, LedState};
use crate::platform::{Peripherals, Platform};
use crate::sensor::FingerprintSensor;
use crate::storage::{CredentialStore, Slot};
use crate::time::Clock;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthOutcome {
    /// The secret for this slot was typed into the host.
    Unlocked(Slot),
    NoRegistration,
    /// A recent unlock is still cooling down; nothing was captured.
    Cooldown,
    CaptureFailed,
    /// No template matched, or only an orphan did.
    NoMatch,
}

impl AuthOutcome {
    pub fn is_unlocked(&self) -> bool {
        matches!(self, AuthOutcome::Unlocked(_))
    }
}

impl fmt::Display for AuthOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthOutcome::Unlocked(slot) => write!(f, "unlocked (slot {slot})"),
            AuthOutcome::NoRegistration => write!(f, "no registration"),
            AuthOutcome::Cooldown => write!(f, "cooldown"),
            AuthOutcome::CaptureFailed => write!(f, "capture failed"),
            AuthOutcome::NoMatch => write!(f, "no match"),
        }
    }
}

/// Recognition state that outlives a single touch: the cooldown deadline and
/// the cached result of the registration pre-check.
#[derive(Debug, Default)]
pub struct AuthenticationFlow {
    cooldown_until: Option<u64>,
    no_registration: bool,
}

impl AuthenticationFlow {
    pub const fn new() -> Self {
        Self {
            cooldown_until: None,
            no_registration: false,
        }
    }

    /// Forget cooldown and pre-check state, e.g. on a mode change.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Cache whether a usable registration exists: a valid record and at
    /// least one enrolled template.
    pub fn check_registration<P: Platform>(
        &mut self,
        store: &mut CredentialStore<P::Region>,
        io: &mut Peripherals<P>,
    ) -> bool {
        let registered = store.active_slot().is_some()
            && matches!(io.sensor.enrolled_count(), Ok(count) if count > 0);
        self.no_registration = !registered;
        registered
    }

    pub fn cooldown_remaining_ms(&self, now_ms: u64) -> Option<u64> {
        self.cooldown_until
            .filter(|until| now_ms < *until)
            .map(|until| until - now_ms)
    }

    fn in_cooldown(&mut self, now_ms: u64) -> bool {
        if self.cooldown_remaining_ms(now_ms).is_some() {
            return true;
        }
        self.cooldown_until = None;
        false
    }

    /// Handle one touch in recognition mode.
    pub fn run<P: Platform>(
        &mut self,
        store: &mut CredentialStore<P::Region>,
        io: &mut Peripherals<P>,
        timings: &Timings,
    ) -> AuthOutcome {
        if self.no_registration {
            log::info!(target: "auth", "No registration, flip to REGISTER");
            io.indicator.show(LedState::NoRegistration);
            return AuthOutcome::NoRegistration;
        }
        if self.in_cooldown(io.clock.now_ms()) {
            log::info!(target: "auth", "Cooldown active, ignoring touch");
            return AuthOutcome::Cooldown;
        }

        log::info!(target: "auth", "Capturing...");
        if let Err(err) = io.sensor.capture(timings.match_timeout_s) {
            log::info!(target: "auth", "Capture failed: {err}");
            Self::flash(io, LedState::CaptureFail, timings.capture_fail_hold_ms);
            return AuthOutcome::CaptureFailed;
        }

        let matched = match io.sensor.search() {
            Ok(Some(id)) if id != 0 => id,
            Ok(_) => {
                log::info!(target: "auth", "No match");
                Self::flash(io, LedState::NoMatch, timings.no_match_hold_ms);
                return AuthOutcome::NoMatch;
            }
            Err(err) => {
                log::info!(target: "auth", "No match ({err})");
                Self::flash(io, LedState::NoMatch, timings.no_match_hold_ms);
                return AuthOutcome::NoMatch;
            }
        };
        log::info!(target: "auth", "Match - slot #{matched}");

        let active = store.active_slot();
        if active.map(Slot::id) != Some(matched) {
            match active {
                Some(slot) => {
                    log::info!(target: "auth", "Matched slot {matched} but active is {slot}")
                }
                None => log::info!(target: "auth", "Matched slot {matched} but no slot is active"),
            }
            log::info!(target: "auth", "Ignoring orphan match");
            Self::flash(io, LedState::NoMatch, timings.no_match_hold_ms);
            return AuthOutcome::NoMatch;
        }

        let Some(credential) = store.read() else {
            log::error!("EEPROM read failed, registration corrupt?");
            io.indicator.show(LedState::NoRegistration);
            return AuthOutcome::NoRegistration;
        };

        io.indicator.show(LedState::MatchFound);
        log::info!(target: "auth", "Sending unlock sequence...");
        UnlockScript::new(&timings.hid).run(
            &mut io.keyboard,
            &mut io.clock,
            credential.secret.as_bytes(),
        );
        let slot = credential.slot;
        drop(credential);
        log::info!(target: "auth", "Unlock complete");

        self.cooldown_until = Some(io.clock.now_ms().saturating_add(timings.cooldown_ms));
        log::info!(target: "auth", "Cooldown {}s...", timings.cooldown_ms / 1_000);
        io.clock.delay_ms(timings.unlock_hold_ms);
        io.indicator.show(LedState::Cooldown);

        AuthOutcome::Unlocked(slot)
    }

    fn flash<P: Platform>(io: &mut Peripherals<P>, state: LedState, hold_ms: u64) {
        io.indicator.show(state);
        io.clock.delay_ms(hold_ms);
        io.indicator.show(LedState::RecognizeReady);
    }
}
