//! Keystroke injection: the key abstraction and the host unlock script.
pub mod core;

use crate::config::HidTimings;
use crate::time::Clock;

pub use self::core::{
    KeyboardReport, REPORT_QUEUE_DEPTH, ReportChannelSink, ReportKeyboard, ReportSink,
    ascii_to_usage, report_receiver,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    LeftCtrl,
    LeftShift,
    LeftGui,
    Return,
    /// Printable ASCII character.
    Char(u8),
}

/// Minimal keyboard surface the unlock script drives.
pub trait Keyboard {
    fn press(&mut self, key: Key);
    fn release(&mut self, key: Key);
    fn release_all(&mut self);
    /// Type each byte as a separate key stroke.
    fn print(&mut self, text: &[u8]);
}

impl<K: Keyboard + ?Sized> Keyboard for &mut K {
    fn press(&mut self, key: Key) {
        (**self).press(key)
    }

    fn release(&mut self, key: Key) {
        (**self).release(key)
    }

    fn release_all(&mut self) {
        (**self).release_all()
    }

    fn print(&mut self, text: &[u8]) {
        (**self).print(text)
    }
}

/// Lock, wake, clear the field, type the secret, submit.
///
/// Waking must use a non-printing key; the lock screen's password field
/// already has focus.
pub struct UnlockScript<'t> {
    timings: &'t HidTimings,
}

impl<'t> UnlockScript<'t> {
    pub fn new(timings: &'t HidTimings) -> Self {
        Self { timings }
    }

    pub fn run<K, C>(&self, keyboard: &mut K, clock: &mut C, secret: &[u8])
    where
        K: Keyboard + ?Sized,
        C: Clock + ?Sized,
    {
        let t = self.timings;

        if !t.skip_lock {
            log::info!(target: "hid", "Lock (Ctrl+Cmd+Q)");
            self.chord(keyboard, clock, &[Key::LeftCtrl, Key::LeftGui, Key::Char(b'q')]);
            clock.delay_ms(t.lock_delay_ms as u64);
        }

        log::info!(target: "hid", "Wake (LEFT_CTRL x{})", t.wake_presses);
        for _ in 0..t.wake_presses {
            keyboard.press(Key::LeftCtrl);
            clock.delay_ms(t.key_hold_ms as u64);
            keyboard.release(Key::LeftCtrl);
            clock.delay_ms(t.wake_press_delay_ms as u64);
        }
        clock.delay_ms(t.wake_settle_ms as u64);

        log::info!(target: "hid", "Clear field (Cmd+A)");
        self.chord(keyboard, clock, &[Key::LeftGui, Key::Char(b'a')]);
        clock.delay_ms(t.field_clear_delay_ms as u64);

        log::info!(target: "hid", "Typing password...");
        keyboard.print(secret);
        clock.delay_ms(t.post_type_delay_ms as u64);

        log::info!(target: "hid", "Enter");
        keyboard.press(Key::Return);
        clock.delay_ms(t.key_hold_ms as u64);
        keyboard.release(Key::Return);
        clock.delay_ms(t.post_enter_delay_ms as u64);

        log::info!(target: "hid", "Unlock sequence complete");
    }

    fn chord<K, C>(&self, keyboard: &mut K, clock: &mut C, keys: &[Key])
    where
        K: Keyboard + ?Sized,
        C: Clock + ?Sized,
    {
        for key in keys {
            keyboard.press(*key);
        }
        clock.delay_ms(self.timings.key_hold_ms as u64);
        keyboard.release_all();
    }
}
