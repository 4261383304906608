#![cfg_attr(not(feature = "std"), no_std)]

pub mod checksum;
pub mod console;
#[cfg(feature = "std")]
pub mod error;
pub mod record;
