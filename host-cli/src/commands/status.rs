use std::io::{Read, Write};

use shared::console::{ConsoleCommand, LineKind, Tag, classify_line};
use shared::error::SharedError;

use crate::transport::{read_available, send_command};

/// Ask for `!STATUS` and print the `[CMD]` reply lines. The reply is over
/// once `idle_reads` consecutive reads come back empty.
pub fn run<P, W>(port: &mut P, out: &mut W, idle_reads: u32) -> Result<(), SharedError>
where
    P: Read + Write + ?Sized,
    W: Write + ?Sized,
{
    send_command(port, ConsoleCommand::Status)?;

    let mut buffer = [0u8; 256];
    let mut pending = String::new();
    let mut idle = 0;
    let mut reported = 0usize;

    while idle < idle_reads {
        let read = read_available(port, &mut buffer)?;
        if read == 0 {
            idle += 1;
            continue;
        }
        idle = 0;
        pending.push_str(&String::from_utf8_lossy(&buffer[..read]));

        while let Some(end) = pending.find(['\r', '\n']) {
            let line: String = pending.drain(..=end).collect();
            let line = line.trim();
            if classify_line(line) == LineKind::Tagged(Tag::Cmd) {
                writeln!(out, "{}", line.trim_start_matches(Tag::Cmd.label()).trim())?;
                reported += 1;
            }
        }
    }

    if reported == 0 {
        return Err(SharedError::Transport(
            "device did not answer !STATUS (is a registration in progress?)".into(),
        ));
    }
    Ok(())
}
