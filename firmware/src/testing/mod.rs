//! In-memory platform for unit and integration tests.
mod eeprom;
mod sensor;

use alloc::collections::VecDeque;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::Cell;

pub use eeprom::{MemoryEeprom, MemoryEepromError};
pub use sensor::MockSensor;

use crate::console::Console;
use crate::crypto::{DeviceKeyMaterial, UNIQUE_ID_LEN, UniqueIdSource};
use crate::hid::{Key, Keyboard};
use crate::indicator::{Indicator, LedState};
use crate::platform::{Peripherals, Platform};
use crate::storage::CredentialStore;
use crate::switch::{Mode, ModeSwitch};
use crate::time::Clock;

pub const TEST_DEVICE_ID: [u8; UNIQUE_ID_LEN] = [0xE6, 0x61, 0x38, 0x52, 0x83, 0x4F, 0x2A, 0x2C];

/// [`UniqueIdSource`] returning a constant identifier.
#[derive(Clone, Copy, Debug)]
pub struct FixedId(pub [u8; UNIQUE_ID_LEN]);

impl UniqueIdSource for FixedId {
    fn unique_id(&mut self) -> [u8; UNIQUE_ID_LEN] {
        self.0
    }
}

/// Virtual clock: delays advance time instantly. Clones share one timeline.
#[derive(Clone, Debug, Default)]
pub struct MockClock {
    now: Rc<Cell<u64>>,
}

impl MockClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get().saturating_add(ms));
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }

    fn delay_ms(&mut self, ms: u64) {
        self.advance(ms);
    }
}

/// Console fed from a script; `None` entries model idle polls.
#[derive(Debug, Default)]
pub struct ScriptedConsole {
    input: VecDeque<Option<u8>>,
    output: String,
}

impl ScriptedConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_str(&mut self, text: &str) {
        self.input.extend(text.bytes().map(Some));
    }

    /// Return nothing for the next `polls` reads.
    pub fn push_idle(&mut self, polls: usize) {
        self.input.extend(core::iter::repeat_n(None, polls));
    }

    pub fn pending_input(&self) -> usize {
        self.input.iter().filter(|byte| byte.is_some()).count()
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn clear_output(&mut self) {
        self.output.clear();
    }
}

impl Console for ScriptedConsole {
    fn read_byte(&mut self) -> Option<u8> {
        self.input.pop_front().flatten()
    }

    fn write_str(&mut self, text: &str) {
        self.output.push_str(text);
    }
}

/// Mode switch that can be told to flip on a given poll.
#[derive(Debug)]
pub struct ScriptedSwitch {
    mode: Mode,
    changed: bool,
    polls: usize,
    flip_after: Option<usize>,
}

impl ScriptedSwitch {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            changed: false,
            polls: 0,
            flip_after: None,
        }
    }

    /// Flip the switch on the read following the first `polls` reads from now.
    pub fn flip_after(&mut self, polls: usize) {
        self.flip_after = Some(self.polls + polls);
    }

    /// Move the switch now, as a user would.
    pub fn set_mode(&mut self, mode: Mode) {
        if mode != self.mode {
            self.mode = mode;
            self.changed = true;
        }
    }

    pub fn polls(&self) -> usize {
        self.polls
    }
}

impl ModeSwitch for ScriptedSwitch {
    fn read(&mut self) -> Mode {
        if self.flip_after == Some(self.polls) {
            self.flip_after = None;
            let flipped = match self.mode {
                Mode::Register => Mode::Recognize,
                Mode::Recognize => Mode::Register,
            };
            self.set_mode(flipped);
        }
        self.polls += 1;
        self.mode
    }

    fn changed(&self) -> bool {
        self.changed
    }

    fn acknowledge(&mut self) {
        self.changed = false;
    }
}

#[derive(Debug, Default)]
pub struct RecordingIndicator {
    states: Vec<LedState>,
}

impl RecordingIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn states(&self) -> &[LedState] {
        &self.states
    }

    pub fn last(&self) -> Option<LedState> {
        self.states.last().copied()
    }
}

impl Indicator for RecordingIndicator {
    fn show(&mut self, state: LedState) {
        self.states.push(state);
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyAction {
    Press(Key),
    Release(Key),
    ReleaseAll,
    Print(Vec<u8>),
}

#[derive(Debug, Default)]
pub struct RecordingKeyboard {
    actions: Vec<KeyAction>,
}

impl RecordingKeyboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actions(&self) -> &[KeyAction] {
        &self.actions
    }

    /// Everything passed to `print`, concatenated.
    pub fn typed(&self) -> Vec<u8> {
        self.actions
            .iter()
            .filter_map(|action| match action {
                KeyAction::Print(text) => Some(text.as_slice()),
                _ => None,
            })
            .flatten()
            .copied()
            .collect()
    }
}

impl Keyboard for RecordingKeyboard {
    fn press(&mut self, key: Key) {
        self.actions.push(KeyAction::Press(key));
    }

    fn release(&mut self, key: Key) {
        self.actions.push(KeyAction::Release(key));
    }

    fn release_all(&mut self) {
        self.actions.push(KeyAction::ReleaseAll);
    }

    fn print(&mut self, text: &[u8]) {
        self.actions.push(KeyAction::Print(text.to_vec()));
    }
}

pub struct MockPlatform;

impl Platform for MockPlatform {
    type RegionError = MemoryEepromError;
    type Region = MemoryEeprom;
    type Sensor = MockSensor;
    type Console = ScriptedConsole;
    type Switch = ScriptedSwitch;
    type Clock = MockClock;
    type Indicator = RecordingIndicator;
    type Keyboard = RecordingKeyboard;
}

pub type MockPeripherals = Peripherals<MockPlatform>;

pub fn mock_peripherals(mode: Mode) -> MockPeripherals {
    Peripherals {
        sensor: MockSensor::new(),
        console: ScriptedConsole::new(),
        switch: ScriptedSwitch::new(mode),
        clock: MockClock::new(),
        indicator: RecordingIndicator::new(),
        keyboard: RecordingKeyboard::new(),
    }
}

/// Initialised store over a blank region, keyed to [`TEST_DEVICE_ID`].
pub fn mock_store(region: MemoryEeprom) -> CredentialStore<MemoryEeprom> {
    let mut store = CredentialStore::new(region, DeviceKeyMaterial::from_unique_id(&TEST_DEVICE_ID));
    // The in-memory region cannot fail to begin.
    let _ = store.init();
    store
}

pub struct MockSetup {
    pub store: CredentialStore<MemoryEeprom>,
    pub io: MockPeripherals,
}

/// Blank device with the switch in registration mode.
pub fn mock_setup() -> MockSetup {
    MockSetup {
        store: mock_store(MemoryEeprom::new()),
        io: mock_peripherals(Mode::Register),
    }
}
