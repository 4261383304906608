//! Board binding: one associated type per collaborator.
use core::fmt;

use crate::console::Console;
use crate::hid::Keyboard;
use crate::indicator::Indicator;
use crate::sensor::FingerprintSensor;
use crate::storage::EepromRegion;
use crate::switch::ModeSwitch;
use crate::time::Clock;

/// Concrete drivers a board provides.
pub trait Platform {
    type RegionError: fmt::Debug;
    type Region: EepromRegion<Error = Self::RegionError>;
    type Sensor: FingerprintSensor;
    type Console: Console;
    type Switch: ModeSwitch;
    type Clock: Clock;
    type Indicator: Indicator;
    type Keyboard: Keyboard;
}

/// Owned driver instances. Components borrow this mutably for the length of
/// one operation.
pub struct Peripherals<P: Platform> {
    pub sensor: P::Sensor,
    pub console: P::Console,
    pub switch: P::Switch,
    pub clock: P::Clock,
    pub indicator: P::Indicator,
    pub keyboard: P::Keyboard,
}
