use std::io::Write;

use shared::console::ConsoleCommand;
use shared::error::SharedError;

use crate::application::{self, PortProvider};
use crate::config::MonitorConfig;
use crate::transport::send_command;

/// Reboot the device and wait until it enumerates again.
pub fn run<P, W>(settings: &MonitorConfig, provider: &P, out: &mut W) -> Result<(), SharedError>
where
    P: PortProvider,
    W: Write + ?Sized,
{
    let mut connection = application::connect(settings, provider)?;
    send_command(&mut *connection.port, ConsoleCommand::Reset)?;
    writeln!(out, "Reset command sent to {}", connection.path)?;
    drop(connection);

    let connection = application::reconnect(settings, provider)?;
    writeln!(out, "Device back on {}", connection.path)?;
    Ok(())
}
