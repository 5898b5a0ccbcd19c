//! Wait for a filesystem path to appear without polling
//!
//! The client starts independently of the server and may come up first. It
//! watches the parent directory with inotify and returns once the path
//! exists.

use std::ffi::OsStr;
use std::io;
use std::os::fd::{AsFd, AsRawFd, RawFd};
use std::path::Path;

use nix::sys::inotify::{AddWatchFlags, InitFlags, Inotify};
use tokio::io::unix::AsyncFd;
use tracing::debug;

struct InotifyFd(Inotify);

impl AsRawFd for InotifyFd {
    fn as_raw_fd(&self) -> RawFd {
        self.0.as_fd().as_raw_fd()
    }
}

/// Block (asynchronously) until `path` exists.
///
/// The parent directory must already exist.
pub async fn wait_for_path(path: &Path) -> io::Result<()> {
    if path.exists() {
        return Ok(());
    }

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;

    let inotify = Inotify::init(InitFlags::IN_NONBLOCK | InitFlags::IN_CLOEXEC)?;
    inotify.add_watch(
        parent,
        AddWatchFlags::IN_CREATE | AddWatchFlags::IN_MOVED_TO,
    )?;

    // The watch is armed; anything created from here on is seen
    if path.exists() {
        return Ok(());
    }

    debug!("Waiting for {} to appear", path.display());
    let fd = AsyncFd::new(InotifyFd(inotify))?;
    loop {
        let mut guard = fd.readable().await?;
        let read = guard.try_io(|inner| inner.get_ref().0.read_events().map_err(io::Error::from));
        let events = match read {
            Ok(result) => result?,
            Err(_would_block) => continue,
        };
        if events
            .iter()
            .any(|event| event.name.as_deref() == Some(OsStr::new(file_name)))
        {
            debug!("{} appeared", path.display());
            return Ok(());
        }
    }
}
