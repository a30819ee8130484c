use std::time::Duration;

// Helper lookup
pub const HELPER_NAME: &str = "fusermount";
pub const DEFAULT_HELPER_PATH: &str = "/bin/fusermount";

// Handshake contract with the helper
pub const COMM_FD_ENV: &str = "_FUSE_COMMFD";
pub const COMM_FD_SLOT: i32 = 3;
pub const OPTIONS_FLAG: &str = "-o";
pub const UNMOUNT_FLAG: &str = "-u";

// recvmsg buffers
pub const DATA_BUF_LEN: usize = 4;
pub const CONTROL_BUF_LEN: usize = 4 * 256;

// Privileged unmount backoff
pub const UNMOUNT_RETRIES: u32 = 2;
pub const UNMOUNT_BASE_DELAY: Duration = Duration::from_millis(10);
