use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::rc::Rc;
use std::time::Duration;

use serialport::{SerialPortInfo, SerialPortType};
use shared::error::SharedError;

use crate::application::PortProvider;
use crate::commands::monitor::{KeyInput, KeySource};
use crate::transport::memory::MemoryPort;

pub(crate) fn usb_port(
    name: &str,
    vid: u16,
    pid: u16,
    serial: Option<&str>,
    manufacturer: Option<&str>,
    product: Option<&str>,
) -> SerialPortInfo {
    SerialPortInfo {
        port_name: name.to_string(),
        port_type: SerialPortType::UsbPort(serialport::UsbPortInfo {
            vid,
            pid,
            serial_number: serial.map(|value| value.to_string()),
            manufacturer: manufacturer.map(|value| value.to_string()),
            product: product.map(|value| value.to_string()),
            interface: None,
        }),
    }
}

pub(crate) fn non_usb_port(name: &str) -> SerialPortInfo {
    SerialPortInfo {
        port_name: name.to_string(),
        port_type: SerialPortType::PciPort,
    }
}

/// Handle to a [`MemoryPort`] that the test keeps after the code under test
/// drops its box.
#[derive(Clone, Default)]
pub(crate) struct SharedPort(pub Rc<RefCell<MemoryPort>>);

impl SharedPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&self, chunk: impl AsRef<[u8]>) {
        self.0.borrow_mut().queue(chunk);
    }

    pub fn close_when_drained(&self) {
        self.0.borrow_mut().close_when_drained();
    }

    pub fn sent_text(&self) -> String {
        self.0.borrow().sent_text()
    }
}

impl Read for SharedPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.borrow_mut().read(buf)
    }
}

impl Write for SharedPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.borrow_mut().flush()
    }
}

/// Hands out scripted ports in order and records what was asked of it.
#[derive(Default)]
pub(crate) struct MemoryProvider {
    detected: RefCell<VecDeque<Result<String, SharedError>>>,
    ports: RefCell<VecDeque<Result<SharedPort, SharedError>>>,
    pub listed: Vec<SerialPortInfo>,
    pub opened: RefCell<Vec<(String, u32)>>,
    pub sleeps: RefCell<Vec<Duration>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listing(ports: Vec<SerialPortInfo>) -> Self {
        Self {
            listed: ports,
            ..Self::default()
        }
    }

    pub fn detect_as(&self, path: &str) {
        self.detected.borrow_mut().push_back(Ok(path.to_string()));
    }

    pub fn detect_nothing(&self) {
        self.detected
            .borrow_mut()
            .push_back(Err(SharedError::Transport("no appliance present".into())));
    }

    pub fn offer(&self, port: &SharedPort) {
        self.ports.borrow_mut().push_back(Ok(port.clone()));
    }

    pub fn refuse_open(&self) {
        self.ports
            .borrow_mut()
            .push_back(Err(SharedError::Transport("port busy".into())));
    }
}

impl PortProvider for MemoryProvider {
    type Port = SharedPort;

    fn detect(&self, _allow_any_port: bool) -> Result<String, SharedError> {
        self.detected
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(SharedError::Transport("nothing scripted to detect".into())))
    }

    fn open(&self, path: &str, baud: u32) -> Result<Box<Self::Port>, SharedError> {
        self.opened.borrow_mut().push((path.to_string(), baud));
        let port = self
            .ports
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(SharedError::Transport("nothing scripted to open".into())))?;
        Ok(Box::new(port))
    }

    fn list(&self) -> Result<Vec<SerialPortInfo>, SharedError> {
        Ok(self.listed.clone())
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
    }
}

/// Key source fed from a script; it quits once the script runs out.
#[derive(Default)]
pub(crate) struct ScriptedKeys {
    keys: VecDeque<Option<KeyInput>>,
}

impl ScriptedKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn type_text(&mut self, text: &str) -> &mut Self {
        self.keys.extend(text.chars().map(|ch| Some(KeyInput::Char(ch))));
        self
    }

    pub fn press(&mut self, key: KeyInput) -> &mut Self {
        self.keys.push_back(Some(key));
        self
    }

    /// Let the monitor poll the port `polls` times without a key.
    pub fn wait(&mut self, polls: usize) -> &mut Self {
        self.keys.extend(std::iter::repeat_n(None, polls));
        self
    }
}

impl KeySource for ScriptedKeys {
    fn next_key(&mut self, _timeout: Duration) -> Result<Option<KeyInput>, SharedError> {
        Ok(self.keys.pop_front().unwrap_or(Some(KeyInput::Quit)))
    }
}
