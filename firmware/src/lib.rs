//! Credential lifecycle core of the fingerprint unlock appliance.
//!
//! A single encrypted secret is bound to a fingerprint template held in one
//! of two sensor slots. [`boot::BootValidator`] reconciles the persisted
//! record with the sensor on startup, [`registration::RegistrationProtocol`]
//! replaces the pair transactionally, and [`auth::AuthenticationFlow`] types
//! the secret into the host after a match. [`appliance::Appliance`] ties them
//! to the mode switch, the touch interrupt and the serial console.
//!
//! The crate is hardware agnostic: a board implements [`platform::Platform`]
//! and hands its drivers over in a [`platform::Peripherals`].
#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod appliance;
pub mod auth;
pub mod boot;
pub mod config;
pub mod console;
pub mod crypto;
pub mod hid;
pub mod indicator;
pub mod input;
pub mod logging;
pub mod platform;
pub mod registration;
pub mod secret;
pub mod sensor;
pub mod storage;
pub mod switch;
pub mod time;
pub mod touch;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use appliance::{Appliance, ControlEvent};
pub use auth::{AuthOutcome, AuthenticationFlow};
pub use boot::{BootOutcome, BootValidator};
pub use config::Timings;
pub use crypto::{DeviceKeyMaterial, KeyDeriver, UniqueIdSource};
pub use platform::{Peripherals, Platform};
pub use registration::{RegistrationError, RegistrationProtocol, RegistrationState};
pub use storage::{Credential, CredentialStore, EepromRegion, Slot, StoreError};
