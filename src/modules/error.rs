//! Error type shared by every mount and unmount operation.

use super::launcher::ProcessResult;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while establishing or tearing down a session.
#[derive(Debug, Error)]
pub enum Error {
    /// The socket pair for the handshake could not be allocated.
    #[error("socketpair failed: {0}")]
    ChannelCreation(#[source] io::Error),

    /// The helper could not be started or waited on.
    #[error("failed to run {}: {source}", program.display())]
    Launch {
        /// Helper that was being launched
        program: PathBuf,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },

    /// The mount helper ran but did not exit with code zero.
    #[error("fusermount exited with {status}")]
    MountHelperFailed {
        /// How the helper terminated
        status: ProcessResult,
    },

    /// `fusermount -u` ran but did not exit with code zero.
    #[error("fusermount -u exited with {status}")]
    UnmountHelperFailed {
        /// How the helper terminated
        status: ProcessResult,
    },

    /// A relative mount point could not be made absolute.
    #[error("cannot resolve mount point: {0}")]
    PathResolution(#[source] io::Error),

    /// `recvmsg` on the handshake socket failed.
    #[error("recvmsg failed: {0}")]
    Receive(#[source] io::Error),

    /// The control message is not an `SCM_RIGHTS` message.
    #[error("recvmsg returned wrong control type: level {level}, type {kind}")]
    UnexpectedMessageType {
        /// `cmsg_level` found in the header
        level: i32,
        /// `cmsg_type` found in the header
        kind: i32,
    },

    /// The control message is too short to carry a descriptor.
    #[error("too short control message: {len} bytes, need at least {min}")]
    TruncatedMessage {
        /// Length received or declared
        len: usize,
        /// Header plus one descriptor
        min: usize,
    },

    /// The passed descriptor value is negative.
    #[error("received invalid descriptor {0}")]
    InvalidDescriptor(i32),

    /// Every privileged unmount attempt failed.
    #[error("unmount of {} failed: {source}", path.display())]
    Unmount {
        /// Mount point
        path: PathBuf,
        /// Error of the last attempt
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Exit code of the helper, when the error comes from a helper exit status.
    pub fn helper_exit_code(&self) -> Option<i32> {
        match self {
            Error::MountHelperFailed { status } | Error::UnmountHelperFailed { status } => {
                status.code()
            }
            _ => None,
        }
    }

    /// Raw OS error code carried by the error, if any.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Error::ChannelCreation(e)
            | Error::PathResolution(e)
            | Error::Receive(e)
            | Error::Launch { source: e, .. }
            | Error::Unmount { source: e, .. } => e.raw_os_error(),
            _ => None,
        }
    }
}
