//! Kramer Protocol 3000
//!
//! This crate provides types and utilities for talking to Kramer matrix
//! switchers over their Protocol 3000 text interface. The protocol is a simple
//! line-based ASCII exchange, carried over TCP (port 5000) or UDP (port 50000).
//!
//! # Protocol Overview
//!
//! - **Commands** (host → device): `#<COMMAND> <params>` terminated with `\r`
//! - **Responses** (device → host): `~<address>@<COMMAND> <params>` terminated with `\r\n`
//!
//! Devices also broadcast unsolicited responses, for example `INFO-IO` and
//! `INFO-PRST` at startup, which report how many inputs, outputs and presets
//! the matrix has.
//!
//! # Example
//!
//! ```rust
//! use p3k_protocol::{Command, Instruction, Response, ResponseKind};
//!
//! // Build a command
//! let cmd = Command::new(Instruction::SwitchVideo, 3);
//! assert_eq!(cmd.encode(), b"#ROUTE 1,1,3\r");
//!
//! // Parse a response
//! let response = Response::parse("~01@INFO-IO IN 11,OUT 9").unwrap();
//! assert_eq!(response.kind, ResponseKind::InputOutput { inputs: 11, outputs: 9 });
//! ```

mod codec;
mod commands;
mod error;
mod responses;

pub use codec::*;
pub use commands::*;
pub use error::*;
pub use responses::*;

/// TCP port the device listens on.
pub const TCP_PORT: u16 = 5000;

/// UDP port the device listens on.
pub const UDP_PORT: u16 = 50000;
