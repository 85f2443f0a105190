//! Shared wire types for the Wall-E deposit pipeline.
//!
//! Everything that crosses a process boundary lives here: the bus event
//! payloads, the topic names, and the intake request/response bodies.

#![forbid(unsafe_code)]

#[cfg(feature = "client")]
pub mod client;
pub mod objects;
pub mod topics;
