// Common utilities for tests

use std::sync::Once;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Route `tracing` output through the test harness writer. Filter with `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Run `f` on a new thread after sleeping for `delay`.
pub fn spawn_after<F, R>(delay: Duration, f: F) -> JoinHandle<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    thread::spawn(move || {
        thread::sleep(delay);
        f()
    })
}

/// Time a call, returning its result with the elapsed wall-clock time.
pub fn timed<R>(f: impl FnOnce() -> R) -> (R, Duration) {
    let start = Instant::now();
    let result = f();
    (result, start.elapsed())
}

/// Assert `elapsed` lies in `[min, max]`.
pub fn assert_elapsed_between(elapsed: Duration, min: Duration, max: Duration) {
    assert!(
        elapsed >= min,
        "finished too early: {elapsed:?} < {min:?}"
    );
    assert!(elapsed <= max, "finished too late: {elapsed:?} > {max:?}");
}

/// Poll `condition` until it holds or `timeout` passes. Returns whether it held.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::yield_now();
    }
    condition()
}
