//! Masked line entry for the unlock secret over the serial console.
use core::fmt;

use shared::console::{MSG_EMPTY_SECRET, MSG_SECRET_TIMEOUT, Tag};

use crate::console::Console;
use crate::secret::SecretBuffer;
use crate::time::Clock;

const BACKSPACE: u8 = 0x08;
const DELETE: u8 = 0x7f;
const ECHO_MASK: &str = "*";
const ECHO_ERASE: &str = "\x08 \x08";
const NEWLINE: &str = "\r\n";

/// Effect of one received byte on the line being edited.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Edit {
    Inserted,
    Erased,
    /// CR or LF on a non-empty line.
    Submitted,
    /// CR or LF on an empty line.
    EmptySubmit,
    /// The line is full; no more input is accepted.
    Full,
    Ignored,
}

/// Line buffer that accepts printable ASCII and backspace.
#[derive(Default)]
pub struct LineEditor {
    line: SecretBuffer,
}

impl LineEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, byte: u8) -> Edit {
        match byte {
            b'\r' | b'\n' if self.line.is_empty() => Edit::EmptySubmit,
            b'\r' | b'\n' => Edit::Submitted,
            BACKSPACE | DELETE => {
                if self.line.pop() {
                    Edit::Erased
                } else {
                    Edit::Ignored
                }
            }
            32..=126 => {
                self.line.push(byte);
                if self.line.is_full() {
                    Edit::Full
                } else {
                    Edit::Inserted
                }
            }
            _ => Edit::Ignored,
        }
    }

    pub fn len(&self) -> usize {
        self.line.len()
    }

    pub fn is_empty(&self) -> bool {
        self.line.is_empty()
    }

    /// Take the edited line, leaving the editor empty.
    pub fn finish(&mut self) -> SecretBuffer {
        core::mem::take(&mut self.line)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputError {
    /// The abort signal fired while waiting for input.
    Aborted,
    /// Nothing was typed for the whole inactivity window.
    Timeout,
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::Aborted => write!(f, "input aborted"),
            InputError::Timeout => write!(f, "input timed out"),
        }
    }
}

impl core::error::Error for InputError {}

/// Prompts for a secret and reads it with masked echo.
#[derive(Clone, Copy, Debug)]
pub struct SecretReader {
    tag: Tag,
    timeout_ms: u64,
    poll_ms: u64,
}

impl SecretReader {
    pub const fn new(tag: Tag, timeout_ms: u64, poll_ms: u64) -> Self {
        Self {
            tag,
            timeout_ms,
            poll_ms,
        }
    }

    /// Print `prompt` and collect one line.
    ///
    /// The inactivity timer restarts on every accepted character and on an
    /// empty submission, which re-prompts instead of failing. `abort` is
    /// polled once per loop iteration.
    pub fn read<C, K, A>(
        &self,
        console: &mut C,
        clock: &mut K,
        prompt: &str,
        mut abort: A,
    ) -> Result<SecretBuffer, InputError>
    where
        C: Console + ?Sized,
        K: Clock + ?Sized,
        A: FnMut() -> bool,
    {
        console.write_line(self.tag, prompt);
        let mut editor = LineEditor::new();
        let mut last_activity = clock.now_ms();

        loop {
            if abort() {
                return Err(InputError::Aborted);
            }
            if clock.now_ms().saturating_sub(last_activity) > self.timeout_ms {
                console.write_str(NEWLINE);
                console.write_line(self.tag, MSG_SECRET_TIMEOUT);
                return Err(InputError::Timeout);
            }

            if let Some(byte) = console.read_byte() {
                match editor.feed(byte) {
                    Edit::Inserted => {
                        console.write_str(ECHO_MASK);
                        last_activity = clock.now_ms();
                    }
                    Edit::Full => {
                        console.write_str(ECHO_MASK);
                        console.write_str(NEWLINE);
                        return Ok(editor.finish());
                    }
                    Edit::Erased => console.write_str(ECHO_ERASE),
                    Edit::Submitted => {
                        console.write_str(NEWLINE);
                        return Ok(editor.finish());
                    }
                    Edit::EmptySubmit => {
                        console.write_str(NEWLINE);
                        console.write_line(self.tag, MSG_EMPTY_SECRET);
                        console.write_line(self.tag, prompt);
                        last_activity = clock.now_ms();
                    }
                    Edit::Ignored => {}
                }
            }

            clock.delay_ms(self.poll_ms);
        }
    }
}
