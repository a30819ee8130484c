//! Anonymous Unix socket pairs used for the `_FUSE_COMMFD` handshake.

use super::error::{Error, Result};
use log::debug;
use nix::sys::socket::{socketpair, AddressFamily, SockFlag, SockType};
use std::io;
use std::os::unix::io::{FromRawFd, OwnedFd};

/// Socket semantics of a [`Channel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// `SOCK_STREAM`: a byte stream without message boundaries
    Stream,
    /// `SOCK_SEQPACKET`: reliable datagrams with preserved boundaries
    SeqPacket,
}

impl ChannelKind {
    fn sock_type(self) -> SockType {
        match self {
            ChannelKind::Stream => SockType::Stream,
            ChannelKind::SeqPacket => SockType::SeqPacket,
        }
    }
}

/// A connected pair of endpoints.
///
/// `local` stays with the current process, `remote` is meant for the helper.
/// Each endpoint is closed when dropped.
#[derive(Debug)]
pub struct Channel {
    /// Endpoint kept by the caller
    pub local: OwnedFd,
    /// Endpoint handed to the child process
    pub remote: OwnedFd,
}

/// Creates a connected pair of `AF_UNIX` sockets.
///
/// Both ends are close-on-exec; the launcher explicitly re-exposes the remote
/// end in the helper. Either both endpoints are returned or none.
pub fn socket_pair(kind: ChannelKind) -> Result<Channel> {
    let (local, remote) = socketpair(
        AddressFamily::Unix,
        kind.sock_type(),
        None,
        SockFlag::SOCK_CLOEXEC,
    )
    .map_err(|errno| Error::ChannelCreation(io::Error::from(errno)))?;

    // SAFETY: socketpair just returned two fresh descriptors owned by nobody else.
    let channel = unsafe {
        Channel {
            local: OwnedFd::from_raw_fd(local),
            remote: OwnedFd::from_raw_fd(remote),
        }
    };
    debug!("Created {:?} socket pair: {} <-> {}", kind, local, remote);
    Ok(channel)
}
