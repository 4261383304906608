use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::{SerialPort, SerialPortInfo};
use shared::error::SharedError;

use crate::commands::{self, monitor::TerminalKeys};
use crate::config::MonitorConfig;
use crate::constants::STATUS_IDLE_READS;
use crate::transport::{self, available_ports, detect_first_serial_port, open_serial_port};
use crate::{Cli, Command};

/// Source of serial connections; the real one talks to the OS.
pub trait PortProvider {
    type Port: Read + Write + ?Sized;

    fn detect(&self, allow_any_port: bool) -> Result<String, SharedError>;

    fn open(&self, path: &str, baud: u32) -> Result<Box<Self::Port>, SharedError>;

    fn list(&self) -> Result<Vec<SerialPortInfo>, SharedError>;

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

pub struct SerialPortProvider;

impl PortProvider for SerialPortProvider {
    type Port = dyn SerialPort;

    fn detect(&self, allow_any_port: bool) -> Result<String, SharedError> {
        detect_first_serial_port(allow_any_port)
    }

    fn open(&self, path: &str, baud: u32) -> Result<Box<Self::Port>, SharedError> {
        open_serial_port(path, baud)
    }

    fn list(&self) -> Result<Vec<SerialPortInfo>, SharedError> {
        available_ports()
    }
}

pub struct Connection<T: ?Sized> {
    pub path: String,
    pub port: Box<T>,
}

pub fn load_settings(cli: &Cli) -> Result<MonitorConfig, SharedError> {
    let config = match &cli.config {
        Some(path) => MonitorConfig::load(path)?,
        None => MonitorConfig::default(),
    };
    Ok(config.with_overrides(cli.port.clone(), cli.any_port, cli.baud))
}

pub fn select_port<P>(settings: &MonitorConfig, provider: &P) -> Result<String, SharedError>
where
    P: PortProvider,
{
    match &settings.port {
        Some(port) => Ok(port.clone()),
        None => provider.detect(settings.any_port),
    }
}

pub fn connect<P>(settings: &MonitorConfig, provider: &P) -> Result<Connection<P::Port>, SharedError>
where
    P: PortProvider,
{
    let path = select_port(settings, provider)?;
    println!("Connecting to unlock appliance on {path}…");
    let port = provider.open(&path, settings.baud)?;
    Ok(Connection { path, port })
}

/// Wait for the device to come back after a reboot. Detection runs again on
/// each attempt since the port name may change.
pub fn reconnect<P>(
    settings: &MonitorConfig,
    provider: &P,
) -> Result<Connection<P::Port>, SharedError>
where
    P: PortProvider,
{
    transport::reconnect(
        settings.reconnect_policy(),
        |_attempt| {
            let path = select_port(settings, provider)?;
            let port = provider.open(&path, settings.baud)?;
            Ok(Connection { path, port })
        },
        |interval| provider.sleep(interval),
    )
}

pub fn execute<P>(cli: Cli, provider: &P) -> Result<(), SharedError>
where
    P: PortProvider,
{
    let settings = load_settings(&cli)?;
    let mut stdout = io::stdout();

    match cli.command.unwrap_or_default() {
        Command::Monitor => {
            let mut keys = TerminalKeys::enable()?;
            commands::monitor::run(&settings, provider, &mut keys, stdout)
        }
        Command::Reset => commands::reset::run(&settings, provider, &mut stdout),
        Command::Status => {
            let mut connection = connect(&settings, provider)?;
            commands::status::run(&mut *connection.port, &mut stdout, STATUS_IDLE_READS)
        }
        Command::Ports => commands::ports::run(&provider.list()?, &mut stdout),
    }
}
