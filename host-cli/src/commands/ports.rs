use std::io::Write;

use serialport::SerialPortInfo;
use shared::error::SharedError;

use crate::transport::{describe_port, matches_appliance_vid, missing_appliance_error, select_serial_port};

/// List serial ports. `*` marks the port auto-detection would pick, `+` other
/// ports with the appliance vendor ID.
pub fn run<W>(ports: &[SerialPortInfo], out: &mut W) -> Result<(), SharedError>
where
    W: Write + ?Sized,
{
    if ports.is_empty() {
        writeln!(out, "No serial ports found.")?;
        return Ok(());
    }

    let selected = select_serial_port(ports, false).map(|info| info.port_name.as_str());
    for info in ports {
        let marker = if selected == Some(info.port_name.as_str()) {
            '*'
        } else if matches_appliance_vid(info) {
            '+'
        } else {
            ' '
        };
        writeln!(out, "{marker} {}", describe_port(info))?;
    }

    if selected.is_none() {
        writeln!(out, "{}", missing_appliance_error(false))?;
    }
    Ok(())
}
