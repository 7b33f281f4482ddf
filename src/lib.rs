//! DuoKey: 2-of-2 threshold authorization for sealed device payloads.
//!
//! A device's payload key is split into two XOR shares held by independent
//! gateways. The device must obtain both shares, each released only after an
//! allow-list and HMAC check, before it can rebuild the key and open its
//! authenticated-encrypted payload.
//!
//! The cryptographic core (`sharing`, `mac`, `payload`, `protocol`,
//! `gateway`) builds without `std`. The device agent, file storage and
//! network transports need the `std` feature and its extensions.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod config;
pub mod entropy;
pub mod gateway;
pub mod mac;
pub mod notify;
pub mod payload;
pub mod platform;
pub mod protocol;
pub mod provision;
pub mod sharing;

#[cfg(feature = "std")]
pub mod device;
#[cfg(feature = "std")]
pub mod storage;
