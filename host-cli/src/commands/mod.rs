pub mod monitor;
pub mod ports;
pub mod reset;
pub mod status;

use std::io::Write;

use shared::error::SharedError;

/// Host-side status line, set apart from device output.
pub(crate) fn notice<W>(out: &mut W, message: &str) -> Result<(), SharedError>
where
    W: Write + ?Sized,
{
    write!(out, "\r\n-- {message} --\r\n")?;
    out.flush()?;
    Ok(())
}
