use super::channel::{socket_pair, ChannelKind};
use super::constants::{COMM_FD_ENV, COMM_FD_SLOT, OPTIONS_FLAG, UNMOUNT_FLAG};
use super::error::{Error, Result};
use super::launcher::{HelperInvocation, Launcher, ProcessLauncher, StdioPolicy};
use super::path::absolutize;
use super::resolver::HelperResolver;
use super::session::{recover, SessionHandle};
use log::{debug, info};
use std::path::{Path, PathBuf};

/// Mounts and unmounts FUSE filesystems through the `fusermount` helper.
///
/// The manager itself never needs privileges: the setuid helper performs the
/// `mount(2)` and hands the session descriptor back over a socket pair.
#[derive(Debug, Clone)]
pub struct MountManager<L = ProcessLauncher> {
    helper: PathBuf,
    launcher: L,
}

impl MountManager<ProcessLauncher> {
    /// A manager using the process-wide helper lookup.
    pub fn new() -> Self {
        Self::with_helper(HelperResolver::global().path())
    }

    /// A manager running `helper` instead of the looked-up one.
    pub fn with_helper(helper: impl Into<PathBuf>) -> Self {
        Self {
            helper: helper.into(),
            launcher: ProcessLauncher::new(),
        }
    }
}

impl Default for MountManager<ProcessLauncher> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: Launcher> MountManager<L> {
    /// A manager running `helper` through a custom launcher.
    pub fn with_launcher(helper: impl Into<PathBuf>, launcher: L) -> Self {
        Self {
            helper: helper.into(),
            launcher,
        }
    }

    /// Path of the helper this manager runs.
    pub fn helper(&self) -> &Path {
        &self.helper
    }

    /// Mounts a FUSE filesystem on `mount_point`.
    ///
    /// `options` is passed to the helper verbatim as the value of `-o` and
    /// left out entirely when empty. Returns the session handle and the
    /// absolute mount point. The helper's exit code is final: a failed mount
    /// is reported, never retried.
    pub fn mount(&self, mount_point: &Path, options: &str) -> Result<(SessionHandle, PathBuf)> {
        let mount_point = absolutize(mount_point)?;
        let channel = socket_pair(ChannelKind::SeqPacket)?;

        let mut invocation = HelperInvocation::new(&self.helper).arg(&mount_point);
        if !options.is_empty() {
            invocation = invocation.arg(OPTIONS_FLAG).arg(options);
        }
        let invocation = invocation
            .env(COMM_FD_ENV, COMM_FD_SLOT.to_string())
            .stdio(StdioPolicy::Inherit)
            .pass_fd(COMM_FD_SLOT, channel.remote);

        let status = self.launcher.run(invocation)?;
        if !status.success() {
            return Err(Error::MountHelperFailed { status });
        }

        let handle = recover(&channel.local)?;
        info!("Mounted {:?}", mount_point);
        Ok((handle, mount_point))
    }

    /// Unmounts `mount_point` by running `fusermount -u`.
    ///
    /// The helper runs from the mount point's parent directory with only
    /// stderr connected. A bare relative name has no parent component, so the
    /// helper keeps the caller's working directory and resolves it from there.
    pub fn unmount(&self, mount_point: &Path) -> Result<()> {
        let mut invocation = HelperInvocation::new(&self.helper)
            .arg(UNMOUNT_FLAG)
            .arg(mount_point)
            .stdio(StdioPolicy::StderrOnly);

        match mount_point.parent() {
            Some(dir) if dir.as_os_str().is_empty() => {}
            Some(dir) => invocation = invocation.current_dir(dir),
            None if mount_point.has_root() => invocation = invocation.current_dir("/"),
            None => {}
        }

        let status = self.launcher.run(invocation)?;
        if !status.success() {
            return Err(Error::UnmountHelperFailed { status });
        }
        debug!("Unmounted {:?}", mount_point);
        Ok(())
    }
}
