//! Runs shell-script stand-ins for `fusermount` through the real launcher.

use anyhow::Result;
use fusecomm::{Error, MountManager};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tempfile::TempDir;

// Writing an executable while another thread forks can leak the write
// descriptor into that child and make exec fail with ETXTBSY.
static SPAWN: Mutex<()> = Mutex::new(());

fn spawn_lock() -> MutexGuard<'static, ()> {
    SPAWN.lock().unwrap_or_else(|e| e.into_inner())
}

struct FakeHelper {
    dir: TempDir,
}

impl FakeHelper {
    /// A helper that runs `body` after recording its invocation.
    fn new(body: &str) -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let record = dir.path().join("record");
        let script = format!(
            r#"#!/bin/sh
{{
  for arg in "$@"; do echo "arg=$arg"; done
  echo "commfd=${{_FUSE_COMMFD-unset}}"
  echo "home=${{HOME-unset}}"
  if [ -S /proc/$$/fd/3 ]; then echo "fd3=socket"; else echo "fd3=none"; fi
  echo "cwd=$(pwd)"
}} > '{}'
{}
"#,
            record.display(),
            body
        );
        let helper = dir.path().join("fusermount");
        fs::write(&helper, script)?;
        fs::set_permissions(&helper, fs::Permissions::from_mode(0o755))?;
        Ok(Self { dir })
    }

    fn path(&self) -> PathBuf {
        self.dir.path().join("fusermount")
    }

    fn record(&self) -> Result<Vec<String>> {
        let content = fs::read_to_string(self.dir.path().join("record"))?;
        Ok(content.lines().map(str::to_string).collect())
    }
}

#[test]
fn test_mount_reports_exit_code() -> Result<()> {
    let _guard = spawn_lock();
    let helper = FakeHelper::new("exit 7")?;
    let manager = MountManager::with_helper(helper.path());

    let err = manager.mount(Path::new("/mnt/fuse"), "").unwrap_err();
    assert!(matches!(err, Error::MountHelperFailed { .. }));
    assert_eq!(err.helper_exit_code(), Some(7));
    Ok(())
}

#[test]
fn test_mount_invocation_contract() -> Result<()> {
    let _guard = spawn_lock();
    let helper = FakeHelper::new("exit 1")?;
    let manager = MountManager::with_helper(helper.path());

    let err = manager
        .mount(Path::new("/mnt//fuse/."), "allow_other,default_permissions")
        .unwrap_err();
    assert_eq!(err.helper_exit_code(), Some(1));

    let record = helper.record()?;
    assert_eq!(
        &record[..3],
        ["arg=/mnt/fuse", "arg=-o", "arg=allow_other,default_permissions"]
    );
    assert!(record.contains(&"commfd=3".to_string()));
    assert!(record.contains(&"home=unset".to_string()));
    assert!(record.contains(&"fd3=socket".to_string()));
    Ok(())
}

#[test]
fn test_mount_without_options_has_no_flag() -> Result<()> {
    let _guard = spawn_lock();
    let helper = FakeHelper::new("exit 1")?;
    let manager = MountManager::with_helper(helper.path());

    manager.mount(Path::new("sub/dir"), "").unwrap_err();

    let expected = std::env::current_dir()?.join("sub/dir");
    let record = helper.record()?;
    let args: Vec<_> = record.iter().filter(|l| l.starts_with("arg=")).collect();
    assert_eq!(args, [&format!("arg={}", expected.display())]);
    Ok(())
}

#[test]
fn test_successful_helper_without_descriptor() -> Result<()> {
    // Only returns if the parent dropped its copy of the helper's endpoint.
    let _guard = spawn_lock();
    let helper = FakeHelper::new("exit 0")?;
    let manager = MountManager::with_helper(helper.path());

    let err = manager.mount(Path::new("/mnt/fuse"), "").unwrap_err();
    assert!(matches!(err, Error::UnexpectedMessageType { .. }));
    Ok(())
}

#[test]
fn test_killed_helper_has_no_exit_code() -> Result<()> {
    let _guard = spawn_lock();
    let helper = FakeHelper::new("kill -9 $$")?;
    let manager = MountManager::with_helper(helper.path());

    match manager.mount(Path::new("/mnt/fuse"), "").unwrap_err() {
        Error::MountHelperFailed { status } => {
            assert_eq!(status.code(), None);
            assert_eq!(status.signal(), Some(libc::SIGKILL));
        }
        other => panic!("unexpected error: {other}"),
    }
    Ok(())
}

#[test]
fn test_unmount_invocation_contract() -> Result<()> {
    let _guard = spawn_lock();
    let helper = FakeHelper::new("exit 0")?;
    let manager = MountManager::with_helper(helper.path());

    let target = tempfile::tempdir()?;
    let mount_point = target.path().join("fuse");
    manager.unmount(&mount_point)?;

    let record = helper.record()?;
    assert_eq!(
        &record[..2],
        ["arg=-u".to_string(), format!("arg={}", mount_point.display())]
    );
    assert!(record.contains(&"commfd=unset".to_string()));
    assert!(record.contains(&format!("cwd={}", target.path().display())));
    Ok(())
}

#[test]
fn test_unmount_of_bare_name_runs_in_caller_cwd() -> Result<()> {
    let _guard = spawn_lock();
    let helper = FakeHelper::new("exit 0")?;
    let manager = MountManager::with_helper(helper.path());

    manager.unmount(Path::new("mnt"))?;

    let record = helper.record()?;
    assert_eq!(&record[..2], ["arg=-u", "arg=mnt"]);
    let cwd = std::env::current_dir()?;
    assert!(record.contains(&format!("cwd={}", cwd.display())));
    Ok(())
}

#[test]
fn test_unmount_reports_exit_code() -> Result<()> {
    let _guard = spawn_lock();
    let helper = FakeHelper::new("exit 5")?;
    let manager = MountManager::with_helper(helper.path());

    let target = tempfile::tempdir()?;
    let err = manager.unmount(&target.path().join("fuse")).unwrap_err();
    assert!(matches!(err, Error::UnmountHelperFailed { .. }));
    assert_eq!(err.helper_exit_code(), Some(5));
    Ok(())
}

#[test]
fn test_missing_helper_is_launch_error() {
    let _guard = spawn_lock();
    let manager = MountManager::with_helper("/nonexistent/fusermount");

    let err = manager.mount(Path::new("/mnt/fuse"), "").unwrap_err();
    assert!(matches!(err, Error::Launch { .. }));
}
