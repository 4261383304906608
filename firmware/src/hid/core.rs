//! Boot-protocol keyboard reports and the queue feeding the USB HID task.
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use heapless::Vec as HeaplessVec;

use super::{Key, Keyboard};

type QueueMutex = CriticalSectionRawMutex;

pub const KEYBOARD_ROLLOVER: usize = 6;
pub const HID_REPORT_SIZE: usize = KEYBOARD_ROLLOVER + 2;
/// Enough for the whole unlock script with a full-length secret.
pub const REPORT_QUEUE_DEPTH: usize = 96;

pub mod usage {
    pub const MOD_LEFT_CTRL: u8 = 0x01;
    pub const MOD_LEFT_SHIFT: u8 = 0x02;
    pub const MOD_LEFT_GUI: u8 = 0x08;

    pub const KEY_A: u8 = 0x04;
    pub const KEY_1: u8 = 0x1E;
    pub const KEY_0: u8 = 0x27;
    pub const KEY_ENTER: u8 = 0x28;
    pub const KEY_SPACE: u8 = 0x2C;
}

static REPORT_CHANNEL: Channel<QueueMutex, KeyboardReport, REPORT_QUEUE_DEPTH> = Channel::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyboardReport {
    pub modifiers: u8,
    pub keys: [u8; KEYBOARD_ROLLOVER],
}

impl KeyboardReport {
    pub const fn empty() -> Self {
        Self {
            modifiers: 0,
            keys: [0; KEYBOARD_ROLLOVER],
        }
    }

    pub fn to_bytes(&self) -> [u8; HID_REPORT_SIZE] {
        let mut data = [0u8; HID_REPORT_SIZE];
        data[0] = self.modifiers;
        data[2..].copy_from_slice(&self.keys);
        data
    }

    pub fn from_keys(modifiers: u8, pressed: &[u8]) -> Self {
        let mut report = Self::empty();
        report.modifiers = modifiers;
        for (slot, key) in report.keys.iter_mut().zip(pressed.iter().copied()) {
            *slot = key;
        }
        report
    }

    pub fn is_empty(&self) -> bool {
        self.modifiers == 0 && self.keys.iter().all(|&key| key == 0)
    }
}

/// US layout: usage ID and whether shift is needed, for printable ASCII.
pub fn ascii_to_usage(byte: u8) -> Option<(u8, bool)> {
    let mapped = match byte {
        b'a'..=b'z' => (usage::KEY_A + (byte - b'a'), false),
        b'A'..=b'Z' => (usage::KEY_A + (byte - b'A'), true),
        b'1'..=b'9' => (usage::KEY_1 + (byte - b'1'), false),
        b'0' => (usage::KEY_0, false),
        b'!' => (0x1E, true),
        b'@' => (0x1F, true),
        b'#' => (0x20, true),
        b'$' => (0x21, true),
        b'%' => (0x22, true),
        b'^' => (0x23, true),
        b'&' => (0x24, true),
        b'*' => (0x25, true),
        b'(' => (0x26, true),
        b')' => (0x27, true),
        b' ' => (usage::KEY_SPACE, false),
        b'-' => (0x2D, false),
        b'_' => (0x2D, true),
        b'=' => (0x2E, false),
        b'+' => (0x2E, true),
        b'[' => (0x2F, false),
        b'{' => (0x2F, true),
        b']' => (0x30, false),
        b'}' => (0x30, true),
        b'\\' => (0x31, false),
        b'|' => (0x31, true),
        b';' => (0x33, false),
        b':' => (0x33, true),
        b'\'' => (0x34, false),
        b'"' => (0x34, true),
        b'`' => (0x35, false),
        b'~' => (0x35, true),
        b',' => (0x36, false),
        b'<' => (0x36, true),
        b'.' => (0x37, false),
        b'>' => (0x37, true),
        b'/' => (0x38, false),
        b'?' => (0x38, true),
        _ => return None,
    };
    Some(mapped)
}

/// Destination for encoded reports.
pub trait ReportSink {
    fn send(&mut self, report: KeyboardReport);
}

/// [`Keyboard`] that tracks pressed keys and emits a report per change.
pub struct ReportKeyboard<S> {
    sink: S,
    modifiers: u8,
    pressed: HeaplessVec<u8, KEYBOARD_ROLLOVER>,
}

impl<S: ReportSink> ReportKeyboard<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            modifiers: 0,
            pressed: HeaplessVec::new(),
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    fn emit(&mut self) {
        let report = KeyboardReport::from_keys(self.modifiers, &self.pressed);
        self.sink.send(report);
    }

    fn resolve(key: Key) -> Option<(u8, u8)> {
        match key {
            Key::LeftCtrl => Some((usage::MOD_LEFT_CTRL, 0)),
            Key::LeftShift => Some((usage::MOD_LEFT_SHIFT, 0)),
            Key::LeftGui => Some((usage::MOD_LEFT_GUI, 0)),
            Key::Return => Some((0, usage::KEY_ENTER)),
            Key::Char(byte) => ascii_to_usage(byte).map(|(code, shift)| {
                let modifier = if shift { usage::MOD_LEFT_SHIFT } else { 0 };
                (modifier, code)
            }),
        }
    }
}

impl<S: ReportSink> Keyboard for ReportKeyboard<S> {
    fn press(&mut self, key: Key) {
        let Some((modifier, code)) = Self::resolve(key) else {
            log::warn!(target: "hid", "No key code for {key:?}");
            return;
        };
        self.modifiers |= modifier;
        if code != 0 && !self.pressed.contains(&code) {
            // Rollover overflow drops the key like a real keyboard would.
            let _ = self.pressed.push(code);
        }
        self.emit();
    }

    fn release(&mut self, key: Key) {
        let Some((modifier, code)) = Self::resolve(key) else {
            return;
        };
        self.modifiers &= !modifier;
        self.pressed.retain(|pressed| *pressed != code);
        self.emit();
    }

    fn release_all(&mut self) {
        self.modifiers = 0;
        self.pressed.clear();
        self.emit();
    }

    fn print(&mut self, text: &[u8]) {
        for byte in text.iter().copied() {
            self.press(Key::Char(byte));
            self.release(Key::Char(byte));
        }
    }
}

pub type ReportSender = Sender<'static, QueueMutex, KeyboardReport, REPORT_QUEUE_DEPTH>;
pub type ReportReceiver = Receiver<'static, QueueMutex, KeyboardReport, REPORT_QUEUE_DEPTH>;

pub fn report_sender() -> ReportSender {
    REPORT_CHANNEL.sender()
}

/// Receiving end for the USB HID writer task.
pub fn report_receiver() -> ReportReceiver {
    REPORT_CHANNEL.receiver()
}

/// [`ReportSink`] that queues reports for the USB HID task.
#[derive(Default)]
pub struct ReportChannelSink {
    dropped: usize,
}

impl ReportChannelSink {
    pub const fn new() -> Self {
        Self { dropped: 0 }
    }

    /// Reports lost because the queue was full.
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

impl ReportSink for ReportChannelSink {
    fn send(&mut self, report: KeyboardReport) {
        if report_sender().try_send(report).is_err() {
            self.dropped += 1;
            log::warn!(target: "hid", "Report queue full, dropped {} report(s)", self.dropped);
        }
    }
}
