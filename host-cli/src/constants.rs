pub const SERIAL_BAUD_RATE: u32 = 115_200;
/// Serial reads block at most this long so the key loop stays responsive.
pub const READ_TIMEOUT_MS: u64 = 50;
pub const KEY_POLL_MS: u64 = 10;

/// Raspberry Pi vendor ID reported by the RP2350 USB stack.
pub const APPLIANCE_USB_VID: u16 = 0x2E8A;
pub const APPLIANCE_IDENTITY_KEYWORDS: &[&str] = &["rp2350", "pico", "fingerprint"];

pub const RECONNECT_INTERVAL_MS: u64 = 1_500;
pub const RECONNECT_MAX_ATTEMPTS: u32 = 10;
/// The device re-enumerates a second time shortly after a reboot.
pub const RECONNECT_STABLE_MS: u64 = 6_000;

/// Consecutive empty reads that end a `status` reply.
pub const STATUS_IDLE_READS: u32 = 10;
/// Longest line the monitor forwards.
pub const INPUT_MAX_LEN: usize = 64;
