// syswrap unit tests
//
// Engine tests drive the retry/capture logic with fake operations that set
// errno themselves. The facade tests go to the real kernel through pipes,
// socketpairs and loopback sockets, so they need no special privileges.


use std::os::fd::RawFd;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::engine::Outcome;
use crate::syscalls::fcntl;

// Tests that change process-wide state (signal dispositions) or depend on
// descriptor numbers not being reused underneath them must run serially.
static TEST_MUTEX: Lazy<Mutex<bool>> = Lazy::new(|| Mutex::new(true));

/// Setup function for tests.
/// Returns a lock guard that keeps the test serialized.
pub fn test_setup() -> parking_lot::MutexGuard<'static, bool> {
    let guard = TEST_MUTEX.lock();
    let _ = env_logger::builder().is_test(true).try_init();
    guard
}

/// Put `fd` into non-blocking mode.
pub fn set_nonblocking(fd: RawFd) {
    let flags = fcntl(fd, libc::F_GETFL, 0).unwrap();
    fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK).unwrap();
}

/// Unwrap a call expected to complete.
pub fn completed<T: std::fmt::Debug>(outcome: Outcome<T>) -> T {
    match outcome {
        Outcome::Completed(v) => v,
        other => panic!("expected a completed call, got {:?}", other),
    }
}
