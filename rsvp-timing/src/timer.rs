use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic clock in nanoseconds since the timer's origin.
pub trait Timer: Clone + Send + Sync {
    fn now(&self) -> u64;
    fn elapsed(&self, ts: u64) -> Duration {
        Duration::from_nanos(self.now().saturating_sub(ts))
    }
    fn sleep(&self, d: Duration);
    fn sleep_until(&self, ts: u64) {
        let now = self.now();
        if ts > now {
            self.sleep(Duration::from_nanos(ts - now));
        }
    }
    fn record_frame(&mut self, d: Duration);
    fn calibration_stats(&self) -> CalibrationStats;
}

pub fn ns_to_ms(ns: u64) -> f64 {
    ns as f64 / 1_000_000.0
}

/// Saturating conversion for deadline arithmetic.
pub fn duration_ns(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationStats {
    pub average_frame_time_ns: f64,
    pub jitter_ns: f64,
    pub min_frame_time_ns: f64,
    pub max_frame_time_ns: f64,
    pub effective_fps: f64,
}

/// Bounded window of recent frame durations.
#[derive(Debug, Clone)]
struct FrameLog {
    frame_times: VecDeque<Duration>,
    max_samples: usize,
}

impl FrameLog {
    fn new(max_samples: usize) -> Self {
        Self {
            frame_times: VecDeque::with_capacity(max_samples),
            max_samples,
        }
    }

    fn push(&mut self, d: Duration) {
        if self.frame_times.len() >= self.max_samples {
            self.frame_times.pop_front();
        }
        self.frame_times.push_back(d);
    }

    fn stats(&self) -> CalibrationStats {
        if self.frame_times.is_empty() {
            return CalibrationStats::default();
        }
        let times: Vec<f64> = self
            .frame_times
            .iter()
            .map(|d| d.as_nanos() as f64)
            .collect();
        let n = times.len() as f64;
        let avg = times.iter().sum::<f64>() / n;
        let var = times.iter().map(|x| (x - avg).powi(2)).sum::<f64>() / n;
        let min = times.iter().copied().fold(f64::INFINITY, f64::min);
        let max = times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        CalibrationStats {
            average_frame_time_ns: avg,
            jitter_ns: var.sqrt(),
            min_frame_time_ns: min,
            max_frame_time_ns: max,
            effective_fps: if avg > 0.0 { 1e9 / avg } else { 0.0 },
        }
    }
}

/// Wall-clock timer backed by `Instant` with platform sleeps.
#[derive(Debug, Clone)]
pub struct HighPrecisionTimer {
    pub start: Instant,
    frames: FrameLog,
}

impl Timer for HighPrecisionTimer {
    fn now(&self) -> u64 {
        duration_ns(self.start.elapsed())
    }
    fn sleep(&self, d: Duration) {
        self.high_precision_sleep(d)
    }
    fn record_frame(&mut self, d: Duration) {
        self.frames.push(d);
    }
    fn calibration_stats(&self) -> CalibrationStats {
        self.frames.stats()
    }
}

impl HighPrecisionTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            frames: FrameLog::new(1000),
        }
    }

    pub fn high_precision_sleep(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        #[cfg(target_os = "linux")]
        self.linux_sleep(duration);
        #[cfg(not(target_os = "linux"))]
        self.spin_or_sleep(duration);
    }

    #[cfg(target_os = "linux")]
    fn linux_sleep(&self, duration: Duration) {
        use libc::{clock_nanosleep, timespec, CLOCK_MONOTONIC};

        let req = timespec {
            tv_sec: duration.as_secs() as libc::time_t,
            tv_nsec: duration.subsec_nanos() as libc::c_long,
        };

        // SAFETY: `req` is a valid timespec and the remainder pointer may be null.
        unsafe {
            clock_nanosleep(CLOCK_MONOTONIC, 0, &req, std::ptr::null_mut());
        }
    }

    #[cfg(not(target_os = "linux"))]
    fn spin_or_sleep(&self, duration: Duration) {
        // OS sleeps overshoot badly below ~100us
        if duration.as_nanos() < 100_000 {
            let start = Instant::now();
            while start.elapsed() < duration {
                std::hint::spin_loop();
            }
        } else {
            std::thread::sleep(duration);
        }
    }
}

impl Default for HighPrecisionTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Virtual clock: time only moves through `advance`, `set` or `sleep`.
///
/// Clones share the same clock, so a runner and its test can both hold one.
#[derive(Debug, Clone)]
pub struct ManualTimer {
    now_ns: Arc<AtomicU64>,
    frames: FrameLog,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self {
            now_ns: Arc::new(AtomicU64::new(0)),
            frames: FrameLog::new(1000),
        }
    }

    pub fn advance(&self, d: Duration) {
        self.now_ns.fetch_add(duration_ns(d), Ordering::SeqCst);
    }

    /// Move the clock to `ns`; the clock never runs backwards.
    pub fn set(&self, ns: u64) {
        self.now_ns.fetch_max(ns, Ordering::SeqCst);
    }
}

impl Default for ManualTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer for ManualTimer {
    fn now(&self) -> u64 {
        self.now_ns.load(Ordering::SeqCst)
    }
    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
    fn record_frame(&mut self, d: Duration) {
        self.frames.push(d);
    }
    fn calibration_stats(&self) -> CalibrationStats {
        self.frames.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_timer_clones_share_time() {
        let t = ManualTimer::new();
        let c = t.clone();
        t.advance(Duration::from_millis(250));
        assert_eq!(c.now(), 250_000_000);
        c.sleep_until(300_000_000);
        assert_eq!(t.now(), 300_000_000);
        // never backwards
        t.set(10);
        assert_eq!(t.now(), 300_000_000);
        assert_eq!(t.elapsed(100_000_000), Duration::from_millis(200));
    }

    #[test]
    fn calibration_stats_over_recorded_frames() {
        let mut t = ManualTimer::new();
        assert_eq!(t.calibration_stats().effective_fps, 0.0);
        for ms in [10, 20, 30] {
            t.record_frame(Duration::from_millis(ms));
        }
        let s = t.calibration_stats();
        assert_eq!(s.average_frame_time_ns, 20_000_000.0);
        assert_eq!(s.min_frame_time_ns, 10_000_000.0);
        assert_eq!(s.max_frame_time_ns, 30_000_000.0);
        assert!((s.effective_fps - 50.0).abs() < 1e-9);
    }

    #[test]
    fn frame_log_keeps_latest_samples() {
        let mut log = FrameLog::new(2);
        for ms in [1, 2, 3] {
            log.push(Duration::from_millis(ms));
        }
        assert_eq!(log.stats().min_frame_time_ns, 2_000_000.0);
    }

    #[test]
    fn high_precision_timer_is_monotonic() {
        let t = HighPrecisionTimer::new();
        let a = t.now();
        t.sleep(Duration::from_micros(200));
        assert!(t.now() >= a + 200_000);
    }

    #[test]
    fn ns_to_ms_keeps_fraction() {
        assert_eq!(ns_to_ms(40_500_000), 40.5);
    }
}
