//! Idle inhibition through `systemd-inhibit`.
//!
//! The inhibitor runs `systemd-inhibit ... cat` with a piped stdin. The lock
//! lives as long as that process; closing stdin makes `cat` exit, which ends
//! the inhibition without leaving orphaned children behind.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};

use gradestream_core::traits::{IdleInhibitor, InhibitGuard};

const DEFAULT_PROGRAM: &str = "systemd-inhibit";
/// How long a released launcher gets to exit before it is killed.
const RELEASE_GRACE: Duration = Duration::from_millis(200);

/// Best-effort idle/sleep inhibitor for Linux desktops.
pub struct SystemdInhibitor {
    program: String,
}

impl Default for SystemdInhibitor {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
        }
    }
}

impl SystemdInhibitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different launcher binary.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl IdleInhibitor for SystemdInhibitor {
    fn acquire(&self, reason: &str) -> Option<InhibitGuard> {
        if tokio::runtime::Handle::try_current().is_err() {
            tracing::debug!("idle inhibition needs a tokio runtime");
            return None;
        }

        let spawned = Command::new(&self.program)
            .arg("--what=idle:sleep")
            .arg("--who=gradestream")
            .arg(format!("--why={reason}"))
            .arg("--mode=block")
            .arg("cat")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn();

        match spawned {
            Ok(child) => {
                tracing::debug!(pid = child.id(), "idle inhibition acquired");
                Some(InhibitGuard::new(move || release(child)))
            }
            Err(e) => {
                tracing::debug!(program = %self.program, error = %e, "idle inhibition unavailable");
                None
            }
        }
    }
}

/// Close the launcher's stdin and reap it off the calling thread.
fn release(mut child: Child) {
    drop(child.stdin.take());
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(reap(child));
        }
        Err(_) => {
            if let Err(e) = child.start_kill() {
                tracing::debug!(error = %e, "inhibitor already exited");
            }
        }
    }
}

async fn reap(mut child: Child) {
    if tokio::time::timeout(RELEASE_GRACE, child.wait()).await.is_err() {
        if let Err(e) = child.kill().await {
            tracing::debug!(error = %e, "inhibitor already exited");
        }
    }
    tracing::debug!("idle inhibition released");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn missing_program_yields_no_guard() {
        let inhibitor = SystemdInhibitor::with_program("definitely-not-a-real-inhibitor");
        assert!(inhibitor.acquire("grading").is_none());
    }

    #[test]
    fn no_runtime_yields_no_guard() {
        let inhibitor = SystemdInhibitor::with_program("true");
        assert!(inhibitor.acquire("grading").is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn guard_reaps_child_on_drop() {
        // `true` ignores its arguments and exits, standing in for the launcher.
        let inhibitor = SystemdInhibitor::with_program("true");
        let guard = inhibitor.acquire("grading").expect("spawn true");
        drop(guard);
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "current_thread")]
    async fn release_does_not_block_the_runtime() {
        use std::os::unix::fs::PermissionsExt;

        // A launcher that ignores both its arguments and stdin closing.
        let dir = tempfile::tempdir().unwrap();
        let launcher = dir.path().join("stubborn-inhibit");
        std::fs::write(&launcher, "#!/bin/sh\nexec sleep 30\n").unwrap();
        std::fs::set_permissions(&launcher, std::fs::Permissions::from_mode(0o755)).unwrap();

        let inhibitor = SystemdInhibitor::with_program(launcher.display().to_string());
        let guard = inhibitor.acquire("grading").expect("spawn launcher");

        let start = Instant::now();
        drop(guard);
        assert!(
            start.elapsed() < Duration::from_millis(50),
            "drop took {:?}",
            start.elapsed()
        );

        // Give the reaper time to kill the launcher.
        tokio::time::sleep(RELEASE_GRACE * 2).await;
    }
}
