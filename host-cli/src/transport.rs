use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use shared::console::ConsoleCommand;
use shared::error::SharedError;

use crate::constants::{APPLIANCE_IDENTITY_KEYWORDS, APPLIANCE_USB_VID, READ_TIMEOUT_MS};

#[cfg(test)]
pub mod memory;

pub fn open_serial_port(path: &str, baud: u32) -> Result<Box<dyn SerialPort>, SharedError> {
    serialport::new(path, baud)
        .timeout(Duration::from_millis(READ_TIMEOUT_MS))
        .open()
        .map_err(|err| SharedError::Transport(format!("failed to open serial port {path}: {err}")))
}

pub fn available_ports() -> Result<Vec<SerialPortInfo>, SharedError> {
    serialport::available_ports()
        .map_err(|err| SharedError::Transport(format!("failed to enumerate serial ports: {err}")))
}

pub fn detect_first_serial_port(allow_any_port: bool) -> Result<String, SharedError> {
    let ports = available_ports()?;
    select_serial_port(&ports, allow_any_port)
        .map(|info| info.port_name.clone())
        .ok_or_else(|| missing_appliance_error(allow_any_port))
}

pub fn select_serial_port(
    ports: &[SerialPortInfo],
    allow_any_port: bool,
) -> Option<&SerialPortInfo> {
    if allow_any_port {
        return ports
            .iter()
            .find(|info| matches!(info.port_type, SerialPortType::UsbPort(_)));
    }

    let mut matches = ports
        .iter()
        .filter(|info| matches_appliance_vid(info))
        .peekable();

    let first = matches.next()?;
    if matches.peek().is_none() {
        return Some(first);
    }

    std::iter::once(first)
        .chain(matches)
        .find(|info| matches_appliance_identity(info))
        .or(Some(first))
}

pub fn matches_appliance_vid(info: &SerialPortInfo) -> bool {
    matches!(
        &info.port_type,
        SerialPortType::UsbPort(usb) if usb.vid == APPLIANCE_USB_VID
    )
}

pub fn matches_appliance_identity(info: &SerialPortInfo) -> bool {
    match &info.port_type {
        SerialPortType::UsbPort(usb) => {
            field_matches_keyword(usb.product.as_deref())
                || field_matches_keyword(usb.serial_number.as_deref())
                || field_matches_keyword(usb.manufacturer.as_deref())
        }
        _ => false,
    }
}

fn field_matches_keyword(field: Option<&str>) -> bool {
    field.is_some_and(contains_keyword)
}

fn contains_keyword(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    APPLIANCE_IDENTITY_KEYWORDS
        .iter()
        .any(|keyword| lower.contains(keyword))
}

pub fn missing_appliance_error(allow_any_port: bool) -> SharedError {
    let mut message =
        format!("Unlock appliance not found (expected USB VID 0x{APPLIANCE_USB_VID:04X}).");

    if !allow_any_port {
        message.push_str(" Pass --any-port to connect to the first available USB serial device.");
    }

    SharedError::Transport(message)
}

/// One-line description of a port for the `ports` listing.
pub fn describe_port(info: &SerialPortInfo) -> String {
    match &info.port_type {
        SerialPortType::UsbPort(usb) => {
            let product = usb.product.as_deref().unwrap_or("unknown product");
            format!(
                "{} (USB {:04X}:{:04X}, {product})",
                info.port_name, usb.vid, usb.pid
            )
        }
        SerialPortType::PciPort => format!("{} (PCI)", info.port_name),
        SerialPortType::BluetoothPort => format!("{} (Bluetooth)", info.port_name),
        SerialPortType::Unknown => info.port_name.clone(),
    }
}

/// Send a console command line to the device.
pub fn send_command<W>(port: &mut W, command: ConsoleCommand) -> Result<(), SharedError>
where
    W: Write + ?Sized,
{
    send_line(port, command.as_str())
}

pub fn send_line<W>(port: &mut W, line: &str) -> Result<(), SharedError>
where
    W: Write + ?Sized,
{
    port.write_all(line.as_bytes())?;
    port.write_all(b"\n")?;
    port.flush()?;
    Ok(())
}

/// Read whatever arrived within the port timeout. A timeout yields `Ok(0)`;
/// a closed port is an error.
pub fn read_available<R>(port: &mut R, buffer: &mut [u8]) -> Result<usize, SharedError>
where
    R: Read + ?Sized,
{
    match port.read(buffer) {
        Ok(0) => Err(SharedError::Transport("serial port closed".into())),
        Ok(read) => Ok(read),
        Err(err) if matches!(err.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
            Ok(0)
        }
        Err(err) if err.kind() == io::ErrorKind::Interrupted => Ok(0),
        Err(err) => Err(SharedError::Transport(format!("serial read failed: {err}"))),
    }
}

/// Bounded retry schedule for re-opening the device after it reboots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

/// Call `connect` up to `policy.attempts` times, sleeping `policy.interval`
/// before each try. Returns the first success or the last error.
pub fn reconnect<T, F, S>(policy: ReconnectPolicy, mut connect: F, mut sleep: S) -> Result<T, SharedError>
where
    F: FnMut(u32) -> Result<T, SharedError>,
    S: FnMut(Duration),
{
    let mut last_error = None;
    for attempt in 1..=policy.attempts {
        sleep(policy.interval);
        match connect(attempt) {
            Ok(value) => return Ok(value),
            Err(err) => last_error = Some(err),
        }
    }

    Err(match last_error {
        Some(err) => SharedError::Transport(format!(
            "reconnect failed after {} attempts: {err}",
            policy.attempts
        )),
        None => SharedError::Transport("reconnect disabled".into()),
    })
}
