//! High-resolution timing utilities for task engines.
//!
//! Stamps are plain milliseconds relative to a per-process origin so engines
//! can be driven with synthetic stamps in tests. On native targets the clock
//! is tokio's, which means `tokio::time::pause()` freezes it together with
//! every pending `sleep_ms`.

use serde::{Deserialize, Serialize};

/// A monotonic timestamp in milliseconds.
#[derive(Debug, Default, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct InstantStamp {
    ms: f64,
}

impl InstantStamp {
    pub fn zero() -> Self {
        Self { ms: 0.0 }
    }

    pub fn from_ms(ms: f64) -> Self {
        Self { ms }
    }

    pub fn as_ms(self) -> f64 {
        self.ms
    }

    /// Milliseconds elapsed since `earlier`, never negative.
    pub fn elapsed_since(self, earlier: InstantStamp) -> f64 {
        (self.ms - earlier.ms).max(0.0)
    }

    pub fn offset_ms(self, delta_ms: f64) -> Self {
        Self {
            ms: self.ms + delta_ms,
        }
    }
}

/// Current timestamp on the engine clock.
pub fn now() -> InstantStamp {
    InstantStamp::from_ms(imp::now_ms())
}

/// Suspend the current task for `ms` milliseconds.
pub async fn sleep_ms(ms: u64) {
    imp::sleep_ms(ms).await;
}

#[cfg(not(target_arch = "wasm32"))]
mod imp {
    use std::time::Duration;

    use once_cell::sync::Lazy;
    use tokio::time::Instant;

    static ORIGIN: Lazy<Instant> = Lazy::new(Instant::now);

    // Signed: a paused runtime's clock can start before the origin.
    pub(super) fn now_ms() -> f64 {
        let now = Instant::now();
        let origin = *ORIGIN;
        match now.checked_duration_since(origin) {
            Some(ahead) => ahead.as_secs_f64() * 1000.0,
            None => -(origin.duration_since(now).as_secs_f64() * 1000.0),
        }
    }

    pub(super) async fn sleep_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

#[cfg(target_arch = "wasm32")]
mod imp {
    use gloo_timers::future::TimeoutFuture;

    pub(super) fn now_ms() -> f64 {
        web_sys::window()
            .and_then(|window| window.performance())
            .map(|performance| performance.now())
            .unwrap_or_else(js_sys::Date::now)
    }

    pub(super) async fn sleep_ms(ms: u64) {
        TimeoutFuture::new(ms.min(u32::MAX as u64) as u32).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_is_clamped_at_zero() {
        let early = InstantStamp::from_ms(100.0);
        let late = early.offset_ms(250.0);
        assert_eq!(late.elapsed_since(early), 250.0);
        assert_eq!(early.elapsed_since(late), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn paused_clock_advances_with_sleep() {
        let before = now();
        sleep_ms(500).await;
        let elapsed = now().elapsed_since(before);
        assert!((elapsed - 500.0).abs() < 1.0, "elapsed {elapsed}");
    }
}
