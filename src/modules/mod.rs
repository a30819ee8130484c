//! Core modules.
//!
//! This module provides the pieces of the `fusermount` handshake:
//!
//! - `channel`: socket pairs for the handshake
//! - `launcher`: running the helper with a fixed descriptor layout
//! - `cmsg`: parsing the `SCM_RIGHTS` control message
//! - `session`: receiving the session handle
//! - `mount`: mount and helper unmount orchestration
//! - `unmount`: privileged unmount with backoff
//! - `resolver`: locating the helper on `PATH`

pub mod channel;
pub mod cmsg;
pub mod constants;
/// Error type shared by all operations.
pub mod error;
pub mod launcher;
pub mod mount;
pub mod path;
pub mod resolver;
pub mod session;
pub mod unmount;
