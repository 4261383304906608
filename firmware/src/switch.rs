//! Two-position mode switch with software debounce.
use core::fmt;

use crate::config::DEBOUNCE_MS;
use crate::time::Clock;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Register,
    Recognize,
}

impl Mode {
    /// Pulled-up input: grounded selects registration.
    pub const fn from_level(low: bool) -> Self {
        if low { Mode::Register } else { Mode::Recognize }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Mode::Register => "REGISTER",
            Mode::Recognize => "RECOGNIZE",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Debounced mode selector with a sticky change flag.
pub trait ModeSwitch {
    /// Sample the input and return the stable mode.
    fn read(&mut self) -> Mode;

    /// Whether the stable mode changed since the last acknowledgement.
    fn changed(&self) -> bool;

    fn acknowledge(&mut self);
}

/// Raw switch input.
pub trait SwitchPin {
    fn is_low(&mut self) -> bool;
}

/// [`ModeSwitch`] over a raw pin. The level at construction is accepted
/// without debounce; later changes must hold for `debounce_ms`.
pub struct DebouncedSwitch<P, C> {
    pin: P,
    clock: C,
    debounce_ms: u64,
    last_low: bool,
    last_change_ms: u64,
    stable: Mode,
    changed: bool,
}

impl<P: SwitchPin, C: Clock> DebouncedSwitch<P, C> {
    pub fn new(pin: P, clock: C) -> Self {
        Self::with_debounce(pin, clock, DEBOUNCE_MS)
    }

    pub fn with_debounce(mut pin: P, clock: C, debounce_ms: u64) -> Self {
        let low = pin.is_low();
        let now = clock.now_ms();
        Self {
            pin,
            clock,
            debounce_ms,
            last_low: low,
            last_change_ms: now,
            stable: Mode::from_level(low),
            changed: false,
        }
    }
}

impl<P: SwitchPin, C: Clock> ModeSwitch for DebouncedSwitch<P, C> {
    fn read(&mut self) -> Mode {
        let low = self.pin.is_low();
        let now = self.clock.now_ms();
        if low != self.last_low {
            self.last_low = low;
            self.last_change_ms = now;
        }

        if now.saturating_sub(self.last_change_ms) > self.debounce_ms {
            let mode = Mode::from_level(low);
            if mode != self.stable {
                self.stable = mode;
                self.changed = true;
            }
        }
        self.stable
    }

    fn changed(&self) -> bool {
        self.changed
    }

    fn acknowledge(&mut self) {
        self.changed = false;
    }
}

impl<S: ModeSwitch + ?Sized> ModeSwitch for &mut S {
    fn read(&mut self) -> Mode {
        (**self).read()
    }

    fn changed(&self) -> bool {
        (**self).changed()
    }

    fn acknowledge(&mut self) {
        (**self).acknowledge()
    }
}

/// Sample the switch and report whether the user flipped it.
pub fn abort_requested<S: ModeSwitch + ?Sized>(switch: &mut S) -> bool {
    switch.read();
    switch.changed()
}
