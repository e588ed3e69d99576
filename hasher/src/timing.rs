//! Timing utilities.

use std::time::{Duration, Instant};

#[cfg(feature = "timings")]
#[inline]
pub fn timed<R>(name: &str, f: impl FnOnce() -> R) -> R {
    tracing::debug!("{} ...", name);
    let t = Instant::now();
    let r = f();
    tracing::debug!("... {} took {:?}", name, t.elapsed());
    r
}

#[cfg(not(feature = "timings"))]
#[inline]
pub fn timed<R>(_: &str, f: impl FnOnce() -> R) -> R {
    f()
}

#[inline]
pub fn always_timed<R>(name: &str, f: impl FnOnce() -> R) -> R {
    tracing::info!(":: {}...", name);
    let t = Instant::now();
    let r = f();
    tracing::info!("   {:?}", t.elapsed());
    r
}

/// Run `f`, returning its value and the wall-clock time it took.
#[inline]
pub fn stopwatch<R>(f: impl FnOnce() -> R) -> (R, Duration) {
    let t = Instant::now();
    let r = f();
    (r, t.elapsed())
}

/// Duration in fractional milliseconds.
pub fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
