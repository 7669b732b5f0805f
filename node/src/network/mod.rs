// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Worker protocol: message types, frame codec and the worker-side
//! connection handshake.
//!
//! # Framing
//! - 4-byte big-endian length prefix, then one bincode-encoded `WireMessage`
//! - Frames arrive whole and in order, or the connection fails
//! - Oversize or undecodable frames are protocol errors

pub mod client;
pub mod codec;
pub mod protocol;

pub use client::MasterClient;
pub use codec::MessageCodec;
pub use protocol::{WireMessage, PROTOCOL_VERSION};
