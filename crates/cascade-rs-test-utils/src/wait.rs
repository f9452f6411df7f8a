//! Polling helpers for background reloads.

use std::thread;
use std::time::{Duration, Instant};

/// Poll `condition` every few milliseconds until it holds or `timeout`
/// passes; returns whether it held.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(10));
    }
}
