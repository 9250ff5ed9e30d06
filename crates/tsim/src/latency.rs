//! TSC-backed clock for timing the cost model
//!
//! Raw reads avoid a syscall per recompute.

use once_cell::sync::Lazy;
use quanta::Clock;

pub static CLOCK: Lazy<Clock> = Lazy::new(Clock::new);

/// Current raw TSC reading
#[inline]
pub fn now_tsc() -> u64 {
    CLOCK.raw()
}

/// Milliseconds between two raw readings
#[inline]
pub fn elapsed_ms(start: u64, end: u64) -> f64 {
    CLOCK.delta(start, end).as_secs_f64() * 1000.0
}
