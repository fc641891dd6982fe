//! Keep-awake power requests.
//!
//! The desktop implementation holds a platform inhibitor process for as
//! long as keep-awake is requested and kills it on release.

use std::process::{Child, Command, Stdio};
use std::sync::Mutex;

use crate::types::errors::PowerError;

pub trait PowerManager: Send + Sync {
    /// Keeps the display awake. Calling it again while active is a no-op.
    fn request_keep_awake(&self) -> Result<(), PowerError>;
    /// Releases a previous request. Calling it while inactive is a no-op.
    fn release_keep_awake(&self) -> Result<(), PowerError>;
    fn is_active(&self) -> bool;
}

/// Applies the `keepAwake` preference, logging the outcome.
pub fn apply_keep_awake(power: &dyn PowerManager, enabled: bool) {
    let result = if enabled {
        power.request_keep_awake()
    } else {
        power.release_keep_awake()
    };
    match result {
        Ok(()) if enabled => tracing::info!("KeepAwake enabled"),
        Ok(()) => tracing::info!("KeepAwake disabled"),
        Err(e) => tracing::warn!(error = %e, enabled, "KeepAwake change failed"),
    }
}

/// Holds an inhibitor child process while keep-awake is active.
pub struct InhibitorPower {
    command: Option<(String, Vec<String>)>,
    child: Mutex<Option<Child>>,
}

impl InhibitorPower {
    /// Uses `systemd-inhibit` on Linux and `caffeinate` on macOS.
    pub fn platform_default() -> Self {
        #[cfg(target_os = "linux")]
        let command = Some((
            "systemd-inhibit".to_string(),
            [
                "--what=idle",
                "--who=ticketwatch",
                "--why=Monitoring ticket dashboard",
                "--mode=block",
                "sleep",
                "infinity",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        ));
        #[cfg(target_os = "macos")]
        let command = Some(("caffeinate".to_string(), vec!["-d".to_string()]));
        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        let command = None;

        Self {
            command,
            child: Mutex::new(None),
        }
    }

    /// Uses an arbitrary long-running command as the inhibitor.
    pub fn with_command(program: &str, args: &[&str]) -> Self {
        Self {
            command: Some((
                program.to_string(),
                args.iter().map(|s| s.to_string()).collect(),
            )),
            child: Mutex::new(None),
        }
    }

    fn child(&self) -> std::sync::MutexGuard<'_, Option<Child>> {
        match self.child.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl PowerManager for InhibitorPower {
    fn request_keep_awake(&self) -> Result<(), PowerError> {
        let (program, args) = self.command.as_ref().ok_or(PowerError::Unsupported)?;
        let mut slot = self.child();

        // Restart if the previous inhibitor died on its own.
        if let Some(child) = slot.as_mut() {
            match child.try_wait() {
                Ok(None) => return Ok(()),
                Ok(Some(status)) => {
                    tracing::warn!(%status, "Inhibitor exited, restarting");
                }
                Err(e) => return Err(PowerError::InhibitFailed(e.to_string())),
            }
        }

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| PowerError::InhibitFailed(format!("{}: {}", program, e)))?;
        tracing::debug!(program = %program, pid = child.id(), "Inhibitor started");
        *slot = Some(child);
        Ok(())
    }

    fn release_keep_awake(&self) -> Result<(), PowerError> {
        let Some(mut child) = self.child().take() else {
            return Ok(());
        };
        if let Ok(Some(_)) = child.try_wait() {
            return Ok(());
        }
        child
            .kill()
            .map_err(|e| PowerError::InhibitFailed(e.to_string()))?;
        let _ = child.wait();
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.child()
            .as_mut()
            .map(|child| matches!(child.try_wait(), Ok(None)))
            .unwrap_or(false)
    }
}

impl Drop for InhibitorPower {
    fn drop(&mut self) {
        let _ = self.release_keep_awake();
    }
}
