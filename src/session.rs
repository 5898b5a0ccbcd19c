//! Per-user session helpers: runtime directory, default client lock path,
//! privilege checks

use std::path::PathBuf;

use nix::unistd::{Uid, User};

pub const SERVER_PID_FILE: &str = "/var/run/lockbell-server.pid";
const CLIENT_PID_NAME: &str = "lockbell-client.pid";
const FALLBACK_DIR: &str = "/tmp";

/// `$XDG_RUNTIME_DIR`, else `/run/user/<uid>`
pub fn runtime_dir() -> PathBuf {
    match std::env::var_os("XDG_RUNTIME_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => PathBuf::from(format!("/run/user/{}", Uid::current())),
    }
}

/// Client lock file inside the runtime directory, or under `/tmp` when the
/// session has no runtime directory
pub fn default_client_pid_file() -> PathBuf {
    let dir = runtime_dir();
    if dir.is_dir() {
        dir.join(CLIENT_PID_NAME)
    } else {
        fallback_client_pid_file()
    }
}

/// `/tmp` is shared, so the name carries the uid to keep one client per user
fn fallback_client_pid_file() -> PathBuf {
    PathBuf::from(FALLBACK_DIR).join(format!("lockbell-client-{}.pid", Uid::current()))
}

pub fn is_root() -> bool {
    nix::unistd::geteuid().is_root()
}

/// Login name of the current user, for log messages
pub fn user_name() -> String {
    let uid = Uid::current();
    match User::from_uid(uid) {
        Ok(Some(user)) => user.name,
        _ => uid.to_string(),
    }
}
