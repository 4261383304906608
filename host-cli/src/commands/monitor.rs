use std::io::{Read, Write};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use shared::console::ConsoleCommand;
use shared::error::SharedError;

use super::notice;
use crate::application::{self, PortProvider};
use crate::config::MonitorConfig;
use crate::constants::{INPUT_MAX_LEN, KEY_POLL_MS, RECONNECT_STABLE_MS};
use crate::prompt::{PromptEvent, PromptTracker};
use crate::transport::{read_available, send_command, send_line};

const BELL: &[u8] = b"\x07";
const ERASE: &[u8] = b"\x08 \x08";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    Char(char),
    Backspace,
    Enter,
    /// Ask the device to reboot.
    Reset,
    Quit,
}

pub trait KeySource {
    /// Wait up to `timeout` for the next key.
    fn next_key(&mut self, timeout: Duration) -> Result<Option<KeyInput>, SharedError>;
}

/// Keyboard in raw mode; restores the terminal when dropped.
pub struct TerminalKeys {
    _raw: (),
}

impl TerminalKeys {
    pub fn enable() -> Result<Self, SharedError> {
        enable_raw_mode()?;
        Ok(Self { _raw: () })
    }
}

impl Drop for TerminalKeys {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

impl KeySource for TerminalKeys {
    fn next_key(&mut self, timeout: Duration) -> Result<Option<KeyInput>, SharedError> {
        if !event::poll(timeout)? {
            return Ok(None);
        }
        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => Ok(map_key(key)),
            _ => Ok(None),
        }
    }
}

pub fn map_key(key: KeyEvent) -> Option<KeyInput> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('c') | KeyCode::Char('d') if ctrl => Some(KeyInput::Quit),
        KeyCode::Char('r') if ctrl => Some(KeyInput::Reset),
        KeyCode::Esc => Some(KeyInput::Quit),
        KeyCode::Enter => Some(KeyInput::Enter),
        KeyCode::Backspace => Some(KeyInput::Backspace),
        KeyCode::Char(ch) if !ctrl => Some(KeyInput::Char(ch)),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
    Reset,
}

/// Relays device output and edits the outgoing line, masking it while the
/// device waits for a secret.
pub struct MonitorSession<W: Write> {
    tracker: PromptTracker,
    input: String,
    out: W,
}

impl<W: Write> MonitorSession<W> {
    pub fn new(out: W) -> Self {
        Self {
            tracker: PromptTracker::new(),
            input: String::new(),
            out,
        }
    }

    pub fn is_masked(&self) -> bool {
        self.tracker.is_masked()
    }

    pub fn out(&self) -> &W {
        &self.out
    }

    pub fn notice(&mut self, message: &str) -> Result<(), SharedError> {
        notice(&mut self.out, message)
    }

    pub fn on_device_output(&mut self, bytes: &[u8]) -> Result<(), SharedError> {
        let text = String::from_utf8_lossy(bytes);
        self.out.write_all(text.as_bytes())?;

        for event in self.tracker.feed(&text) {
            match event {
                PromptEvent::Masked => {}
                PromptEvent::Rejected => self.out.write_all(BELL)?,
                PromptEvent::Abandoned => {
                    self.out.write_all(BELL)?;
                    self.input.clear();
                }
                PromptEvent::Released => self.input.clear(),
            }
        }
        self.out.flush()?;
        Ok(())
    }

    pub fn on_key<P>(&mut self, key: KeyInput, port: &mut P) -> Result<Flow, SharedError>
    where
        P: Write + ?Sized,
    {
        let masked = self.tracker.is_masked();
        match key {
            KeyInput::Char(ch) => {
                if (' '..='~').contains(&ch) && self.input.len() < INPUT_MAX_LEN {
                    self.input.push(ch);
                    if !masked {
                        write!(self.out, "{ch}")?;
                    }
                }
            }
            KeyInput::Backspace => {
                if self.input.pop().is_some() && !masked {
                    self.out.write_all(ERASE)?;
                }
            }
            KeyInput::Enter => {
                if !self.input.is_empty() {
                    if !masked {
                        self.out.write_all(b"\r\n")?;
                    }
                    let line = std::mem::take(&mut self.input);
                    send_line(port, &line)?;
                }
            }
            KeyInput::Reset => {
                send_command(port, ConsoleCommand::Reset)?;
                self.tracker.reset();
                self.input.clear();
                self.notice("Reset command sent")?;
                return Ok(Flow::Reset);
            }
            KeyInput::Quit => return Ok(Flow::Quit),
        }
        self.out.flush()?;
        Ok(Flow::Continue)
    }
}

/// Shuttle bytes between the port and the session until the user quits or
/// resets the device, or the port fails.
pub fn pump<P, K, W>(
    port: &mut P,
    keys: &mut K,
    session: &mut MonitorSession<W>,
) -> Result<Flow, SharedError>
where
    P: Read + Write + ?Sized,
    K: KeySource,
    W: Write,
{
    let mut buffer = [0u8; 256];
    loop {
        let read = read_available(port, &mut buffer)?;
        if read > 0 {
            session.on_device_output(&buffer[..read])?;
        }

        if let Some(key) = keys.next_key(Duration::from_millis(KEY_POLL_MS))? {
            match session.on_key(key, port)? {
                Flow::Continue => {}
                flow => return Ok(flow),
            }
        }
    }
}

pub fn run<P, K, W>(
    settings: &MonitorConfig,
    provider: &P,
    keys: &mut K,
    out: W,
) -> Result<(), SharedError>
where
    P: PortProvider,
    K: KeySource,
    W: Write,
{
    let mut session = MonitorSession::new(out);
    let mut connection = application::connect(settings, provider)?;
    session.notice(&format!("Connected to {} (Ctrl+R reset, Esc quit)", connection.path))?;
    // The device enumerates twice after a reboot; a drop shortly after
    // reconnecting is part of that, not an unplug.
    let mut rebooting_until: Option<Instant> = None;

    loop {
        let disconnected = match pump(&mut *connection.port, keys, &mut session) {
            Ok(Flow::Reset) => None,
            Ok(_) => {
                session.notice("Disconnected")?;
                return Ok(());
            }
            Err(err) => Some(err),
        };

        if let Some(err) = disconnected {
            let expected = rebooting_until.is_some_and(|until| Instant::now() < until);
            if !expected {
                session.notice("Device disconnected")?;
                return Err(err);
            }
        }

        drop(connection);
        session.notice("Device rebooting, waiting for reconnect...")?;
        connection = match application::reconnect(settings, provider) {
            Ok(connection) => connection,
            Err(err) => {
                session.notice("Reconnect failed")?;
                return Err(err);
            }
        };
        rebooting_until = Some(Instant::now() + Duration::from_millis(RECONNECT_STABLE_MS));
        session.notice(&format!("Connected to {}", connection.path))?;
    }
}
