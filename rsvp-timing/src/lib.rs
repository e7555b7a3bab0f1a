pub mod scheduler;
pub mod timer;

pub use scheduler::{Scheduler, TimeoutHandle};
pub use timer::{CalibrationStats, HighPrecisionTimer, ManualTimer, Timer, duration_ns, ns_to_ms};
