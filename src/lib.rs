//! `jgate1939` library: host-side driver for serial-attached gateway boards
//! that bridge a host to a CAN/J1939 bus, usable in a `no_std` environment.
//! The crate exposes the infrastructure module (byte-stuffed frame codec),
//! the protocol logic (command tables, request tracking, dispatch, per-channel
//! address negotiation), and the session orchestrating them.
#![no_std]
//==================================================================================
/// Driver configuration: serial parameters, board options, per-channel setup.
pub mod config;
/// Domain and low-level errors (framing, encoding, request completion,
/// configuration, and transport-related issues).
pub mod error;
/// Byte-level infrastructure: the stuffed wire-frame encoder and decoder.
pub mod infra;
/// Gateway protocol implementation: command identifiers, request/response
/// correlation, message dispatch, CAN-channel state, and the board session.
pub mod protocol;
//==================================================================================
