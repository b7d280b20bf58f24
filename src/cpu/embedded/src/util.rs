use crate::binding::*;
use core::sync::atomic::{compiler_fence, Ordering};

/// the start point of a busy wait moves forward after this many seconds
pub const REBASE_INTERVAL: f32 = 0.5;

/// busy wait for `duration` seconds on the native timer.
/// Narrow timers wrap quickly (a 32 bit counter at 150MHz wraps after 28.6s), so the elapsed time is
/// accumulated in steps of at most [`REBASE_INTERVAL`] instead of measured from a single start point.
pub fn sleep(duration: f32) {
    let mut start = unsafe { extern_c::get_native_time() };
    let mut accumulated = 0.;
    loop {
        compiler_fence(Ordering::SeqCst);
        let now = unsafe { extern_c::get_native_time() };
        let since_start = unsafe { extern_c::diff_native_time(start, now) };
        if accumulated + since_start >= duration {
            return;
        }
        if since_start > REBASE_INTERVAL {
            start = now;
            accumulated += since_start;
        }
    }
}

pub fn sleep_ms(duration: Millis) {
    sleep(duration as f32 / 1000.);
}
