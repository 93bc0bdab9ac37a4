//! # opc-send: frame sender for Open Pixel Control servers
//!
//! Samples a frame source down to LED resolution at a fixed rate and
//! streams the packets to an OPC server over WebSocket or raw TCP.
//!
//! ## Sources
//!
//! - **Pattern**: a static test card drawn at startup.
//! - **Stdin**: raw RGBA frames piped in by another process; the sender
//!   always samples the most recent complete frame.

pub mod config;
pub mod feed;
pub mod meter;
pub mod service;
