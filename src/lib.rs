#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::missing_crate_level_docs)]

//! fusecomm: FUSE sessions through the `fusermount` helper
//!
//! Mounting a FUSE filesystem needs privileges an ordinary process does not
//! have. The setuid `fusermount` helper performs the mount on our behalf and
//! hands the opened `/dev/fuse` descriptor back over a Unix socket passed to
//! it as `_FUSE_COMMFD`.
//!
//! ## Features
//!
//! - Socket pair handshake with descriptor passing (`SCM_RIGHTS`)
//! - Bounds-checked parsing of the received control message
//! - Unmount through the helper or directly, with bounded backoff
//! - One-time lookup of the helper on `PATH`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fusecomm::MountManager;
//! use std::path::Path;
//!
//! # fn main() -> anyhow::Result<()> {
//! let manager = MountManager::new();
//!
//! // Mount and get the kernel channel
//! let (session, mount_point) = manager.mount(Path::new("mnt"), "allow_other")?;
//! println!("{} is served by fd {:?}", mount_point.display(), session);
//!
//! // Speak FUSE on `session`, then tear down
//! drop(session);
//! manager.unmount(&mount_point)?;
//! # Ok(())
//! # }
//! ```

pub mod modules;

pub use modules::error::{Error, Result};
pub use modules::mount::MountManager;
pub use modules::session::SessionHandle;

// Re-export commonly used types
pub use modules::launcher::{Launcher, ProcessLauncher, ProcessResult};
pub use modules::resolver::HelperResolver;
pub use modules::unmount::{unmount_privileged, RetryPolicy};
