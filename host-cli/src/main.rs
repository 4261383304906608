use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use shared::error::SharedError;

mod application;
mod commands;
mod config;
mod constants;
mod prompt;
#[cfg(test)]
mod test_support;
mod transport;

use application::SerialPortProvider;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Serial monitor for the fingerprint unlock appliance"
)]
pub struct Cli {
    /// Optional path to the serial device. Falls back to auto-detection when omitted.
    #[arg(short, long)]
    port: Option<String>,

    /// Skip vendor ID filtering and accept the first USB serial device.
    #[arg(long)]
    any_port: bool,

    /// Serial baud rate.
    #[arg(short, long)]
    baud: Option<u32>,

    /// JSON file with connection settings; flags override it.
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Command {
    /// Relay the device console, masking input at password prompts (default).
    #[default]
    Monitor,
    /// Reboot the device and wait for it to reconnect.
    Reset,
    /// Print the device's mode, active slot and cooldown.
    Status,
    /// List serial ports and mark the detected appliance.
    Ports,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Err(err) = application::execute(cli, &SerialPortProvider) {
        match &err {
            SharedError::Transport(_) => {
                eprintln!("Transport failure: {err}");
            }
            SharedError::Config(_) => {
                eprintln!("Configuration problem: {err}");
            }
        }
        return Err(anyhow::Error::from(err));
    }

    Ok(())
}
