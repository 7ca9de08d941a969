//! Process signalling helpers.

use std::io;

#[cfg(unix)]
use libc::{kill, SIGTERM};

/// Ask a process to terminate.
///
/// On Unix this sends SIGTERM with `kill(2)`. Elsewhere there is no graceful
/// signal, so the error tells the caller to fall back to a hard kill.
///
/// # Errors
///
/// Returns the OS error when the signal cannot be delivered, which includes
/// the process having already exited (ESRCH).
pub fn terminate(pid: u32) -> io::Result<()> {
    #[cfg(unix)]
    {
        // SAFETY: `kill(2)` is memory-safe for any pid value; an invalid or
        // exited pid only produces an error return.
        let result = unsafe { kill(pid as libc::pid_t, SIGTERM) };
        if result == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "graceful termination is not supported on this platform",
        ))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;

    #[tokio::test]
    async fn test_terminate_running_child() {
        let mut child = tokio::process::Command::new("sleep")
            .arg("30")
            .kill_on_drop(true)
            .spawn()
            .unwrap();
        let pid = child.id().unwrap();

        terminate(pid).unwrap();
        let status = child.wait().await.unwrap();
        assert_eq!(status.signal(), Some(libc::SIGTERM));
    }

    #[tokio::test]
    async fn test_terminate_exited_child_is_error() {
        let mut child = tokio::process::Command::new("true").spawn().unwrap();
        let pid = child.id().unwrap();
        child.wait().await.unwrap();

        assert!(terminate(pid).is_err());
    }
}
