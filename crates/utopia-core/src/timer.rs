// SPDX-License-Identifier: CEPL-1.0
use std::time::Instant;
use tracing::info;

#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn reset(&mut self) {
        self.start = Instant::now();
    }

    /// Seconds since construction or the last `reset`.
    pub fn elapsed(&self) -> f32 {
        self.start.elapsed().as_secs_f32()
    }

    pub fn elapsed_millis(&self) -> f32 {
        self.elapsed() * 1000.0
    }
}

/// Logs how long its scope took when dropped.
pub struct ScopedTimer {
    name: String,
    timer: Timer,
}

impl ScopedTimer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timer: Timer::new(),
        }
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        info!("[timer] {} - {:.3}ms", self.name, self.timer.elapsed_millis());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn elapsed_grows_and_reset_rewinds() {
        let mut t = Timer::new();
        thread::sleep(Duration::from_millis(5));
        let first = t.elapsed();
        assert!(first >= 0.005);
        assert!((t.elapsed_millis() - first * 1000.0).abs() < 50.0);

        t.reset();
        assert!(t.elapsed() < first);
    }
}
