//! Bounds-checked parsing of the `SCM_RIGHTS` control message that carries the
//! FUSE session descriptor.
//!
//! The control buffer filled by `recvmsg` is treated as untrusted bytes. Every
//! field is copied out of the slice only after its offset and size have been
//! checked against the buffer, and the descriptor only after the received and
//! declared lengths cover it.

use super::error::{Error, Result};
use std::mem;
use std::os::unix::io::RawFd;

/// Size of the control message header, including alignment padding.
pub fn header_len() -> usize {
    // SAFETY: CMSG_LEN is pure arithmetic on its argument.
    unsafe { libc::CMSG_LEN(0) as usize }
}

/// Smallest control message that can carry one descriptor.
pub fn min_rights_len() -> usize {
    // SAFETY: CMSG_LEN is pure arithmetic on its argument.
    unsafe { libc::CMSG_LEN(mem::size_of::<RawFd>() as libc::c_uint) as usize }
}

/// Header fields of a control message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlHeader {
    /// `cmsg_len`: header plus payload, as declared by the sender
    pub len: usize,
    /// `cmsg_level`
    pub level: i32,
    /// `cmsg_type`
    pub kind: i32,
}

impl ControlHeader {
    /// Whether the header announces passed descriptors.
    pub fn is_rights(&self) -> bool {
        self.level == libc::SOL_SOCKET && self.kind == libc::SCM_RIGHTS
    }
}

/// A validated `SCM_RIGHTS` message with its first descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlMessage {
    /// Parsed header
    pub header: ControlHeader,
    /// First descriptor of the payload
    pub fd: RawFd,
}

/// Read-only view over a control buffer as returned by `recvmsg`.
///
/// `buf` is the whole buffer handed to the kernel (zero-initialized), and
/// `received` is the `msg_controllen` reported back.
#[derive(Debug, Clone, Copy)]
pub struct ControlMessageReader<'a> {
    buf: &'a [u8],
    received: usize,
}

impl<'a> ControlMessageReader<'a> {
    /// Wraps `buf`, of which the kernel reported `received` bytes.
    pub fn new(buf: &'a [u8], received: usize) -> Self {
        Self { buf, received }
    }

    /// Reads the first header.
    ///
    /// The header is taken from the buffer even when fewer bytes were
    /// received; length checks happen in [`Self::try_read_descriptor`]. The
    /// only failure here is a buffer too small to hold a header at all.
    pub fn try_read_header(&self) -> Result<ControlHeader> {
        let hdr_size = mem::size_of::<libc::cmsghdr>();
        let bytes = self.buf.get(..hdr_size).ok_or(Error::TruncatedMessage {
            len: self.buf.len(),
            min: hdr_size,
        })?;

        // SAFETY: `bytes` holds exactly size_of::<cmsghdr>() bytes, cmsghdr is
        // plain old data, and read_unaligned has no alignment requirement.
        let raw: libc::cmsghdr = unsafe { std::ptr::read_unaligned(bytes.as_ptr().cast()) };

        Ok(ControlHeader {
            len: raw.cmsg_len as usize,
            level: raw.cmsg_level,
            kind: raw.cmsg_type,
        })
    }

    /// Reads and validates the first descriptor.
    ///
    /// Checks run in order: message type, received length, declared length,
    /// descriptor sign.
    pub fn try_read_descriptor(&self) -> Result<ControlMessage> {
        let header = self.try_read_header()?;
        if !header.is_rights() {
            return Err(Error::UnexpectedMessageType {
                level: header.level,
                kind: header.kind,
            });
        }

        let min = min_rights_len();
        if self.received < min {
            return Err(Error::TruncatedMessage {
                len: self.received,
                min,
            });
        }
        if header.len < min || header.len > self.received {
            return Err(Error::TruncatedMessage {
                len: header.len,
                min,
            });
        }

        let start = header_len();
        let end = start + mem::size_of::<RawFd>();
        let bytes = self
            .buf
            .get(start..end)
            .ok_or(Error::TruncatedMessage {
                len: self.buf.len(),
                min: end,
            })?;
        let mut raw = [0u8; mem::size_of::<RawFd>()];
        raw.copy_from_slice(bytes);
        let fd = RawFd::from_ne_bytes(raw);

        if fd < 0 {
            return Err(Error::InvalidDescriptor(fd));
        }
        Ok(ControlMessage { header, fd })
    }

    /// Every descriptor an `SCM_RIGHTS` message carries, in payload order.
    ///
    /// Used to take ownership of all descriptors the kernel installed, whether
    /// or not the message then validates. Only slots inside the received,
    /// declared and buffer lengths are read; negative values are skipped.
    pub fn passed_descriptors(&self) -> Vec<RawFd> {
        let header = match self.try_read_header() {
            Ok(header) if header.is_rights() => header,
            _ => return Vec::new(),
        };
        let start = header_len();
        let end = header.len.min(self.received).min(self.buf.len());
        if end <= start {
            return Vec::new();
        }

        self.buf[start..end]
            .chunks_exact(mem::size_of::<RawFd>())
            .map(|chunk| {
                let mut raw = [0u8; mem::size_of::<RawFd>()];
                raw.copy_from_slice(chunk);
                RawFd::from_ne_bytes(raw)
            })
            .filter(|fd| *fd >= 0)
            .collect()
    }
}
