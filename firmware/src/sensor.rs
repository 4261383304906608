//! Seam to the optical fingerprint module.
//!
//! The module owns the templates; the firmware only addresses them by small
//! integer IDs and asks for captures, searches and occupancy.
use core::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SensorError {
    /// No finger arrived within the capture window.
    Timeout,
    /// A finger was read but the image was unusable.
    Capture,
    /// The module rejected a store, delete or list command.
    Rejected,
    /// The serial link to the module failed.
    Link,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SensorError::Timeout => "capture timed out",
            SensorError::Capture => "capture failed",
            SensorError::Rejected => "command rejected by sensor",
            SensorError::Link => "sensor link error",
        };
        write!(f, "{label}")
    }
}

impl core::error::Error for SensorError {}

pub trait FingerprintSensor {
    /// Capture one sample into the module's working buffer, waiting at most
    /// `timeout_s` seconds for a finger.
    fn capture(&mut self, timeout_s: u8) -> Result<(), SensorError>;

    /// Whether a finger is on the sensor right now.
    fn finger_present(&mut self) -> bool;

    /// Merge the captured samples and store them under `id`.
    fn store(&mut self, id: u8) -> Result<(), SensorError>;

    /// Delete the template under `id`. Deleting an empty slot is not an error.
    fn delete(&mut self, id: u8) -> Result<(), SensorError>;

    /// Match the last capture against all templates.
    fn search(&mut self) -> Result<Option<u8>, SensorError>;

    fn enrolled_count(&mut self) -> Result<u8, SensorError>;

    /// Fill `ids` with enrolled template IDs and return how many were written.
    fn enrolled_ids(&mut self, ids: &mut [u8]) -> Result<usize, SensorError>;

    /// Largest number of templates the module can hold.
    fn max_enrollments(&self) -> u8;
}
