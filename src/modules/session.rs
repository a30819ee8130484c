//! The FUSE session handle and its recovery from the handshake socket.
//!
//! After `fusermount` has mounted the filesystem it sends the opened
//! `/dev/fuse` descriptor back over the `_FUSE_COMMFD` socket as an
//! `SCM_RIGHTS` message. [`recover`] receives that message exactly once and
//! turns the descriptor into an owned [`SessionHandle`].

use super::cmsg::ControlMessageReader;
use super::constants::{CONTROL_BUF_LEN, DATA_BUF_LEN};
use super::error::{Error, Result};
use log::debug;
use std::fs::File;
use std::io::{self, Read, Write};
use std::mem;
use std::os::unix::io::{AsFd, AsRawFd, BorrowedFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};

/// A live FUSE session: the duplex channel to the kernel.
///
/// The handle owns its descriptor and closes it on drop. Reading and writing
/// FUSE protocol messages on it is up to the caller.
#[derive(Debug)]
pub struct SessionHandle {
    file: File,
}

impl SessionHandle {
    /// The underlying file.
    pub fn as_file(&self) -> &File {
        &self.file
    }

    /// Consumes the handle, returning the underlying file.
    pub fn into_file(self) -> File {
        self.file
    }
}

impl From<OwnedFd> for SessionHandle {
    fn from(fd: OwnedFd) -> Self {
        Self {
            file: File::from(fd),
        }
    }
}

impl From<SessionHandle> for OwnedFd {
    fn from(handle: SessionHandle) -> Self {
        OwnedFd::from(handle.file)
    }
}

impl AsFd for SessionHandle {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

impl AsRawFd for SessionHandle {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

impl IntoRawFd for SessionHandle {
    fn into_raw_fd(self) -> RawFd {
        self.file.into_raw_fd()
    }
}

impl Read for SessionHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for SessionHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
const RECV_FLAGS: libc::c_int = libc::MSG_CMSG_CLOEXEC;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const RECV_FLAGS: libc::c_int = 0;

/// Receives the session descriptor sent by the helper on `endpoint`.
///
/// Performs a single `recvmsg` with a small data buffer, whose contents are
/// ignored, and a control buffer large enough for one `SCM_RIGHTS` message.
/// The control bytes are validated by [`ControlMessageReader`]. Every
/// descriptor the message carried is owned from the moment `recvmsg`
/// returns: all of them are closed when validation fails, and any beyond the
/// first are closed on success.
pub fn recover(endpoint: &impl AsRawFd) -> Result<SessionHandle> {
    let mut data = [0u8; DATA_BUF_LEN];
    let mut control = vec![0u8; CONTROL_BUF_LEN];
    let received = recv_control(endpoint.as_raw_fd(), &mut data, &mut control)
        .map_err(Error::Receive)?;

    let reader = ControlMessageReader::new(&control, received);
    let mut installed: Vec<OwnedFd> = reader
        .passed_descriptors()
        .into_iter()
        // SAFETY: the kernel installed these descriptors in our table for us
        // alone, and each appears once in the message.
        .map(|fd| unsafe { OwnedFd::from_raw_fd(fd) })
        .collect();

    let message = reader.try_read_descriptor()?;
    let position = installed
        .iter()
        .position(|fd| fd.as_raw_fd() == message.fd)
        .ok_or(Error::InvalidDescriptor(message.fd))?;
    let session = installed.swap_remove(position);
    if !installed.is_empty() {
        debug!("Closing {} extra passed descriptors", installed.len());
    }
    debug!("Received session descriptor {}", message.fd);
    Ok(SessionHandle::from(session))
}

/// One `recvmsg` call; returns the number of control bytes received.
fn recv_control(fd: RawFd, data: &mut [u8], control: &mut [u8]) -> io::Result<usize> {
    let mut iov = libc::iovec {
        iov_base: data.as_mut_ptr().cast(),
        iov_len: data.len(),
    };
    // SAFETY: msghdr is plain old data; all-zero is a valid empty header.
    let mut msg: libc::msghdr = unsafe { mem::zeroed() };
    msg.msg_iov = &mut iov;
    msg.msg_iovlen = 1;
    msg.msg_control = control.as_mut_ptr().cast();
    msg.msg_controllen = control.len() as _;

    loop {
        // SAFETY: msg points at iov, data and control, all alive and writable
        // for the duration of the call with the lengths recorded in msg.
        let n = unsafe { libc::recvmsg(fd, &mut msg, RECV_FLAGS) };
        if n >= 0 {
            return Ok(msg.msg_controllen as usize);
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::channel::{socket_pair, ChannelKind};
    use nix::fcntl::OFlag;
    use nix::sys::socket::{sendmsg, ControlMessage, MsgFlags};
    use nix::unistd::pipe2;
    use std::io::{IoSlice, Seek, SeekFrom};

    fn send_fd(endpoint: &OwnedFd, fd: RawFd) -> anyhow::Result<()> {
        send_fds(endpoint, &[fd])
    }

    fn send_fds(endpoint: &OwnedFd, fds: &[RawFd]) -> anyhow::Result<()> {
        sendmsg::<()>(
            endpoint.as_raw_fd(),
            &[IoSlice::new(b"\0")],
            &[ControlMessage::ScmRights(fds)],
            MsgFlags::empty(),
            None,
        )?;
        Ok(())
    }

    #[test]
    fn test_recover_passed_file() -> anyhow::Result<()> {
        let mut file = tempfile::tempfile()?;
        file.write_all(b"fuse session")?;
        file.seek(SeekFrom::Start(0))?;

        let channel = socket_pair(ChannelKind::SeqPacket)?;
        send_fd(&channel.remote, file.as_raw_fd())?;

        let mut handle = recover(&channel.local)?;
        assert_ne!(handle.as_raw_fd(), file.as_raw_fd());

        let mut content = String::new();
        handle.read_to_string(&mut content)?;
        assert_eq!(content, "fuse session");
        Ok(())
    }

    #[test]
    fn test_extra_descriptors_are_closed() -> anyhow::Result<()> {
        let mut file = tempfile::tempfile()?;
        file.write_all(b"first")?;
        file.seek(SeekFrom::Start(0))?;

        let (read_end, write_end) = pipe2(OFlag::O_CLOEXEC | OFlag::O_NONBLOCK)?;
        // SAFETY: pipe2 just returned these descriptors and nothing else owns them.
        let mut read_end = File::from(unsafe { OwnedFd::from_raw_fd(read_end) });
        let write_end = unsafe { OwnedFd::from_raw_fd(write_end) };

        let channel = socket_pair(ChannelKind::SeqPacket)?;
        send_fds(&channel.remote, &[file.as_raw_fd(), write_end.as_raw_fd()])?;
        drop(write_end);

        let mut handle = recover(&channel.local)?;
        let mut content = String::new();
        handle.read_to_string(&mut content)?;
        assert_eq!(content, "first");

        // End of file only once the received copy of the write end is closed.
        let mut buf = [0u8; 1];
        assert_eq!(read_end.read(&mut buf)?, 0);
        Ok(())
    }

    #[test]
    fn test_plain_datagram_is_rejected() -> anyhow::Result<()> {
        let channel = socket_pair(ChannelKind::SeqPacket)?;
        nix::sys::socket::send(channel.remote.as_raw_fd(), b"oops", MsgFlags::empty())?;

        let err = recover(&channel.local).unwrap_err();
        assert!(matches!(err, Error::UnexpectedMessageType { kind: 0, .. }));
        Ok(())
    }

    #[test]
    fn test_closed_peer_is_rejected() -> anyhow::Result<()> {
        let channel = socket_pair(ChannelKind::SeqPacket)?;
        drop(channel.remote);

        let err = recover(&channel.local).unwrap_err();
        assert!(matches!(err, Error::UnexpectedMessageType { .. }));
        Ok(())
    }

    #[test]
    fn test_receive_on_non_socket_fails() -> anyhow::Result<()> {
        let file = tempfile::tempfile()?;
        let err = recover(&file).unwrap_err();
        match err {
            Error::Receive(e) => assert_eq!(e.raw_os_error(), Some(libc::ENOTSOCK)),
            other => panic!("unexpected error: {other}"),
        }
        Ok(())
    }

    #[test]
    fn test_handle_round_trips_through_owned_fd() -> anyhow::Result<()> {
        let file = tempfile::tempfile()?;
        let handle = SessionHandle::from(OwnedFd::from(file));
        let raw = handle.as_raw_fd();
        let owned: OwnedFd = handle.into();
        assert_eq!(owned.as_raw_fd(), raw);
        Ok(())
    }
}
