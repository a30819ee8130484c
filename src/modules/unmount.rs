//! Privileged unmount with bounded backoff.
//!
//! Closing the last descriptor of a FUSE session is acknowledged by the kernel
//! asynchronously, so an `umount(2)` issued right after it can still fail with
//! `EBUSY`. A couple of short retries absorb that window.

use super::constants::{UNMOUNT_BASE_DELAY, UNMOUNT_RETRIES};
use super::error::{Error, Result};
use log::warn;
use std::io;
use std::path::Path;
use std::thread;
use std::time::Duration;

/// Bounds of a retry loop.
///
/// After the first attempt fails, up to `max_retries` more are made. Before
/// each retry the delay is recomputed as `2 * delay + base_delay`, starting
/// from zero, so the default policy waits 10 ms and then 30 ms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub max_retries: u32,
    /// Constant term added at every step
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: UNMOUNT_RETRIES,
            base_delay: UNMOUNT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// The delay awaited before each retry, in order.
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let base = self.base_delay;
        std::iter::successors(Some(base), move |prev| Some(*prev * 2 + base))
            .take(self.max_retries as usize)
    }
}

/// Something that can pause the current thread.
pub trait Sleeper {
    /// Blocks for `duration`.
    fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] using `std::thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Runs `op` until it succeeds or `policy` is exhausted.
///
/// Returns the first success or the error of the last attempt.
pub fn retry_with_backoff<T, E, F>(
    policy: &RetryPolicy,
    sleeper: &impl Sleeper,
    mut op: F,
) -> std::result::Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> std::result::Result<T, E>,
{
    let mut result = op();
    for delay in policy.delays() {
        match &result {
            Ok(_) => break,
            Err(e) => warn!("Attempt failed ({}), retrying in {:?}", e, delay),
        }
        sleeper.sleep(delay);
        result = op();
    }
    result
}

/// Unmounts `path` directly with the default [`RetryPolicy`].
///
/// Needs the privileges to call `umount(2)`; unprivileged callers go through
/// [`MountManager::unmount`](super::mount::MountManager::unmount) instead.
pub fn unmount_privileged(path: &Path) -> Result<()> {
    unmount_privileged_with(path, &RetryPolicy::default(), &ThreadSleeper)
}

/// [`unmount_privileged`] with an explicit policy and sleeper.
pub fn unmount_privileged_with(
    path: &Path,
    policy: &RetryPolicy,
    sleeper: &impl Sleeper,
) -> Result<()> {
    unmount_with(path, policy, sleeper, |p| {
        nix::mount::umount(p).map_err(io::Error::from)
    })
}

fn unmount_with(
    path: &Path,
    policy: &RetryPolicy,
    sleeper: &impl Sleeper,
    mut umount: impl FnMut(&Path) -> io::Result<()>,
) -> Result<()> {
    retry_with_backoff(policy, sleeper, || umount(path)).map_err(|source| Error::Unmount {
        path: path.to_path_buf(),
        source,
    })
}
