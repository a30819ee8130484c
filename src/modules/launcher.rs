//! Spawning the privileged helper.
//!
//! [`HelperInvocation`] describes a single run of the helper: its argv, the
//! one environment variable it gets, how its standard streams are wired and
//! which descriptor, if any, is placed in a fixed slot of its table. A
//! [`Launcher`] runs it to completion.

use super::error::{Error, Result};
use log::debug;
use nix::fcntl::{fcntl, FcntlArg, FdFlag};
use nix::unistd::dup2;
use std::ffi::OsString;
use std::fmt;
use std::io;
use std::os::unix::io::{AsRawFd, OwnedFd};
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};

/// How the helper's descriptors 0 to 2 are wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdioPolicy {
    /// Share the caller's stdin, stdout and stderr.
    Inherit,
    /// Only stderr is shared; stdin and stdout point at `/dev/null`.
    StderrOnly,
}

/// A descriptor placed at a fixed slot in the child.
#[derive(Debug)]
pub struct PassedFd {
    /// Descriptor number in the child
    pub slot: i32,
    /// Endpoint to expose there
    pub fd: OwnedFd,
}

/// One run of the helper.
#[derive(Debug)]
pub struct HelperInvocation {
    /// Executable, also used as argv[0]
    pub program: PathBuf,
    /// Arguments after argv[0]
    pub args: Vec<OsString>,
    /// The only environment variable the child sees
    pub env: Option<(String, String)>,
    /// Standard stream wiring
    pub stdio: StdioPolicy,
    /// Working directory of the child
    pub current_dir: Option<PathBuf>,
    /// Extra descriptor for the child
    pub passed_fd: Option<PassedFd>,
}

impl HelperInvocation {
    /// Starts an invocation with no arguments, an empty environment and
    /// inherited standard streams.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: None,
            stdio: StdioPolicy::Inherit,
            current_dir: None,
            passed_fd: None,
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Sets the single environment binding.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env = Some((key.into(), value.into()));
        self
    }

    /// Sets the standard stream wiring.
    pub fn stdio(mut self, stdio: StdioPolicy) -> Self {
        self.stdio = stdio;
        self
    }

    /// Sets the working directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Exposes `fd` as descriptor `slot` in the child.
    pub fn pass_fd(mut self, slot: i32, fd: OwnedFd) -> Self {
        self.passed_fd = Some(PassedFd { slot, fd });
        self
    }
}

/// How a helper process terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessResult {
    code: Option<i32>,
    signal: Option<i32>,
}

impl ProcessResult {
    /// A normal exit with `code`.
    pub fn exited(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    /// Termination by `signal`.
    pub fn signaled(signal: i32) -> Self {
        Self {
            code: None,
            signal: Some(signal),
        }
    }

    /// Exit code, if the process exited normally.
    pub fn code(&self) -> Option<i32> {
        self.code
    }

    /// Terminating signal, if any.
    pub fn signal(&self) -> Option<i32> {
        self.signal
    }

    /// Only an exit code of exactly zero counts as success.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<ExitStatus> for ProcessResult {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
            signal: status.signal(),
        }
    }
}

impl fmt::Display for ProcessResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "code {}", code),
            (None, Some(signal)) => write!(f, "signal {}", signal),
            (None, None) => write!(f, "unknown status"),
        }
    }
}

/// Runs a [`HelperInvocation`] to completion.
///
/// A non-zero exit is reported through [`ProcessResult`], not as an error;
/// callers decide what it means.
pub trait Launcher {
    /// Spawns the helper, waits for it and reports how it ended.
    fn run(&self, invocation: HelperInvocation) -> Result<ProcessResult>;
}

/// [`Launcher`] backed by `std::process::Command`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessLauncher;

impl ProcessLauncher {
    /// Creates a launcher.
    pub fn new() -> Self {
        Self
    }
}

impl Launcher for ProcessLauncher {
    fn run(&self, invocation: HelperInvocation) -> Result<ProcessResult> {
        let HelperInvocation {
            program,
            args,
            env,
            stdio,
            current_dir,
            passed_fd,
        } = invocation;

        debug!("Spawning {:?} {:?}", program, args);

        let mut cmd = Command::new(&program);
        cmd.args(&args);
        cmd.env_clear();
        if let Some((key, value)) = &env {
            cmd.env(key, value);
        }
        if let Some(dir) = &current_dir {
            cmd.current_dir(dir);
        }

        match stdio {
            StdioPolicy::Inherit => {
                cmd.stdin(Stdio::inherit())
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit());
            }
            StdioPolicy::StderrOnly => {
                cmd.stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::inherit());
            }
        }

        if let Some(passed) = &passed_fd {
            let src = passed.fd.as_raw_fd();
            let slot = passed.slot;
            // SAFETY: the closure only issues dup2/fcntl, which are
            // async-signal-safe, and touches no allocator state.
            unsafe {
                cmd.pre_exec(move || {
                    if src == slot {
                        // dup2 onto itself keeps FD_CLOEXEC, clear it by hand.
                        fcntl(slot, FcntlArg::F_SETFD(FdFlag::empty()))?;
                    } else {
                        dup2(src, slot)?;
                    }
                    Ok(())
                });
            }
        }

        let spawned = cmd.spawn();
        // The child owns its copy now; ours must not outlive the spawn.
        drop(passed_fd);
        let mut child = spawned.map_err(|source| Error::Launch {
            program: program.clone(),
            source,
        })?;

        let status = wait_uninterrupted(&mut child).map_err(|source| Error::Launch {
            program: program.clone(),
            source,
        })?;
        let result = ProcessResult::from(status);
        debug!("{:?} finished with {}", program, result);
        Ok(result)
    }
}

fn wait_uninterrupted(child: &mut std::process::Child) -> io::Result<ExitStatus> {
    loop {
        match child.wait() {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}
