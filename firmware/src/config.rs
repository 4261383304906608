//! Compile-time limits and the tunable timing table.
//!
//! Every bounded wait in the firmware takes its limit from [`Timings`], which
//! defaults to the constants below. Boards and tests override individual
//! fields instead of patching constants.

/// Fingerprint samples merged into one enrolled template.
pub const COLLECT_COUNT: u8 = 3;
/// Seconds the sensor waits for a finger during enrollment.
pub const CAPTURE_TIMEOUT_S: u8 = 10;
/// Seconds the sensor waits for a finger during recognition.
pub const MATCH_TIMEOUT_S: u8 = 5;
/// Failed captures tolerated per enrollment sample.
pub const MAX_CAPTURE_RETRIES: u8 = 3;

pub const SECRET_MAX_LEN: usize = shared::record::SECRET_CAPACITY;
pub const SECRET_TIMEOUT_MS: u64 = 30_000;
pub const SECRET_MAX_CONFIRM_ATTEMPTS: u8 = 3;

pub const EEPROM_SIZE: usize = shared::record::REGION_LEN;

pub const DEBOUNCE_MS: u64 = 50;
pub const COOLDOWN_MS: u64 = 5_000;

/// Capacity of the enrolled-ID list the sensor can return.
pub const ENROLLED_ID_BUFFER: usize = 80;

pub const KEY_HOLD_MS: u32 = 50;
pub const LOCK_DELAY_MS: u32 = 2_000;
pub const WAKE_PRESSES: u8 = 2;
pub const WAKE_PRESS_DELAY_MS: u32 = 200;
pub const WAKE_SETTLE_MS: u32 = 2_000;
pub const FIELD_CLEAR_DELAY_MS: u32 = 200;
pub const POST_TYPE_DELAY_MS: u32 = 100;
pub const POST_ENTER_DELAY_MS: u32 = 500;

/// Delays used by the keystroke script that unlocks the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HidTimings {
    pub key_hold_ms: u32,
    pub lock_delay_ms: u32,
    pub wake_presses: u8,
    pub wake_press_delay_ms: u32,
    pub wake_settle_ms: u32,
    pub field_clear_delay_ms: u32,
    pub post_type_delay_ms: u32,
    pub post_enter_delay_ms: u32,
    /// Skip the lock chord; only useful on a bench host.
    pub skip_lock: bool,
}

impl Default for HidTimings {
    fn default() -> Self {
        Self {
            key_hold_ms: KEY_HOLD_MS,
            lock_delay_ms: LOCK_DELAY_MS,
            wake_presses: WAKE_PRESSES,
            wake_press_delay_ms: WAKE_PRESS_DELAY_MS,
            wake_settle_ms: WAKE_SETTLE_MS,
            field_clear_delay_ms: FIELD_CLEAR_DELAY_MS,
            post_type_delay_ms: POST_TYPE_DELAY_MS,
            post_enter_delay_ms: POST_ENTER_DELAY_MS,
            skip_lock: false,
        }
    }
}

/// Limits and delays shared by registration, authentication and the loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timings {
    pub collect_count: u8,
    pub capture_timeout_s: u8,
    pub match_timeout_s: u8,
    pub capture_retries: u8,
    /// Pause after a failed capture before the next attempt.
    pub retry_delay_ms: u64,
    /// Pause after the finger leaves the sensor.
    pub settle_ms: u64,
    pub removal_poll_ms: u64,
    /// Upper bound on waiting for the finger to be lifted.
    pub removal_timeout_ms: u64,
    pub secret_timeout_ms: u64,
    pub secret_poll_ms: u64,
    pub confirm_attempts: u8,
    pub cooldown_ms: u64,
    pub capture_fail_hold_ms: u64,
    pub no_match_hold_ms: u64,
    pub unlock_hold_ms: u64,
    pub success_hold_ms: u64,
    pub corrupt_hold_ms: u64,
    /// Main loop idle tick.
    pub loop_tick_ms: u64,
    pub hid: HidTimings,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            collect_count: COLLECT_COUNT,
            capture_timeout_s: CAPTURE_TIMEOUT_S,
            match_timeout_s: MATCH_TIMEOUT_S,
            capture_retries: MAX_CAPTURE_RETRIES,
            retry_delay_ms: 1_000,
            settle_ms: 500,
            removal_poll_ms: 100,
            removal_timeout_ms: CAPTURE_TIMEOUT_S as u64 * 1_000,
            secret_timeout_ms: SECRET_TIMEOUT_MS,
            secret_poll_ms: 10,
            confirm_attempts: SECRET_MAX_CONFIRM_ATTEMPTS,
            cooldown_ms: COOLDOWN_MS,
            capture_fail_hold_ms: 1_000,
            no_match_hold_ms: 1_500,
            unlock_hold_ms: 2_000,
            success_hold_ms: 2_000,
            corrupt_hold_ms: 2_000,
            loop_tick_ms: 10,
            hid: HidTimings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_constants() {
        let timings = Timings::default();
        assert_eq!(timings.collect_count, 3);
        assert_eq!(timings.capture_retries, 3);
        assert_eq!(timings.confirm_attempts, 3);
        assert_eq!(timings.secret_timeout_ms, 30_000);
        assert_eq!(timings.cooldown_ms, 5_000);
        assert_eq!(timings.removal_timeout_ms, 10_000);
        assert!(!timings.hid.skip_lock);
    }

    #[test]
    fn region_fits_record() {
        assert!(shared::record::RECORD_LEN <= EEPROM_SIZE);
        assert_eq!(SECRET_MAX_LEN, 32);
    }
}
