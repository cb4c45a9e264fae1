//! Keygate client library surface.
//!
//! This crate exposes the signed-request / encrypted-reply protocol used to
//! talk to the key gateway:
//! - account keypair custody, signing and ECIES-style decryption
//! - typed request/reply messages with canonical wire encoding
//! - the one-shot secure channel and its transport seam
//! - the gateway client orchestrating credential provisioning

/// Keypair custody: signing and decryption.
pub mod account;
/// One-shot encrypted request/reply channel and configuration.
pub mod channel;
/// Client fault categories.
pub mod error;
/// Gateway client and request kinds.
pub mod gateway;
/// Protocol request/reply messages.
pub mod message;
/// Shared utility helpers.
pub mod util;
