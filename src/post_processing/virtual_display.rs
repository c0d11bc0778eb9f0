use std::{
    process::{Child, Command, Stdio},
    sync::{Mutex, MutexGuard},
    thread::sleep,
    time::Duration,
};

use crate::error::{RenderError, RenderResult};

// DISPLAY is process wide, only one guard may own it at a time
static DISPLAY_LOCK: Mutex<()> = Mutex::new(());

fn lock_display() -> MutexGuard<'static, ()> {
    DISPLAY_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// An `Xvfb` server that lives as long as this guard. `DISPLAY` is pointed
/// at it while it runs and restored on drop.
///
/// Guards within one process are serialized: a second `start` blocks until
/// the first guard is dropped. Separate processes using the same display
/// number still collide, the second `Xvfb` then fails to start.
pub struct VirtualDisplay {
    server: Child,
    display: String,
    previous_display: Option<String>,
    _lock: MutexGuard<'static, ()>,
}

impl VirtualDisplay {
    pub fn start(display_number: u32) -> RenderResult<Self> {
        let lock = lock_display();
        let display = format!(":{}", display_number);
        let mut server = Command::new("Xvfb")
            .args([display.as_str(), "-screen", "0", "1024x768x24", "-nolisten", "tcp"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| RenderError::VirtualDisplay(format!("failed to start Xvfb: {}", e)))?;

        // Xvfb exits right away if the display number is taken
        sleep(Duration::from_millis(200));
        if let Ok(Some(status)) = server.try_wait() {
            return Err(RenderError::VirtualDisplay(format!(
                "Xvfb on {} exited with {}",
                display, status
            )));
        }

        let previous_display = std::env::var("DISPLAY").ok();
        std::env::set_var("DISPLAY", &display);
        log::info!("started virtual display {}", display);

        Ok(VirtualDisplay {
            server,
            display,
            previous_display,
            _lock: lock,
        })
    }

    pub fn display(&self) -> &str {
        &self.display
    }
}

impl Drop for VirtualDisplay {
    fn drop(&mut self) {
        self.server.kill().ok();
        self.server.wait().ok();
        match &self.previous_display {
            Some(previous) => std::env::set_var("DISPLAY", previous),
            None => std::env::remove_var("DISPLAY"),
        }
        log::debug!("stopped virtual display {}", self.display);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_owned_by_one_guard_at_a_time() {
        let held = lock_display();
        assert!(DISPLAY_LOCK.try_lock().is_err());
        drop(held);
        assert!(DISPLAY_LOCK.try_lock().is_ok());
    }
}
