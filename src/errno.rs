//! Thread-local errno access and the error type produced by failing syscalls.
//!
//! Errno is only ever read through [`get_errno`] from inside the engine's
//! capture window; everything else in the crate sees an already captured
//! code, either inside a [`SyscallError`] or as a classification result.

use std::io;

use cfg_if::cfg_if;
use thiserror::Error;

cfg_if! {
    if #[cfg(any(target_os = "linux", target_os = "emscripten", target_os = "redox"))] {
        use libc::__errno_location as errno_location;
    } else if #[cfg(target_os = "android")] {
        use libc::__errno as errno_location;
    } else if #[cfg(any(
        target_os = "macos",
        target_os = "ios",
        target_os = "tvos",
        target_os = "watchos",
        target_os = "freebsd",
        target_os = "dragonfly",
    ))] {
        use libc::__error as errno_location;
    } else if #[cfg(any(target_os = "netbsd", target_os = "openbsd"))] {
        use libc::__errno as errno_location;
    } else {
        compile_error!("syswrap does not know where this target keeps errno");
    }
}

/// Read the calling thread's errno.
#[inline(always)]
pub fn get_errno() -> i32 {
    unsafe { *errno_location() }
}

/// Overwrite the calling thread's errno.
///
/// Mostly useful for exercising the engine with fake calls.
#[inline(always)]
pub fn set_errno(code: i32) {
    unsafe { *errno_location() = code }
}

/// Codes that mean the caller handed the kernel something it should never
/// have: a dangling buffer or a descriptor it does not own.
const BLACKLISTED_ERRNOS: [i32; 2] = [libc::EFAULT, libc::EBADF];

/// Whether `code` is in the defect set rather than the recoverable taxonomy.
pub fn is_blacklisted(code: i32) -> bool {
    BLACKLISTED_ERRNOS.contains(&code)
}

/// Raise the defect signal if `code` indicates caller misuse.
///
/// This never returns an error value: reaching it means the calling code is
/// wrong, so it panics in every build profile.
#[track_caller]
pub(crate) fn assert_not_blacklisted(code: i32, function: &'static str) {
    if is_blacklisted(code) {
        panic!(
            "{}() failed with blacklisted errno {} ({}); this is a bug in the caller",
            function,
            code,
            io::Error::from_raw_os_error(code)
        );
    }
}

/// A syscall failed with a code the caller is expected to handle.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{function}() failed: {} (errno {errno})", describe(.errno))]
pub struct SyscallError {
    errno: i32,
    function: &'static str,
}

impl SyscallError {
    /// Build an error from an already captured code.
    pub fn new(errno: i32, function: &'static str) -> Self {
        Self { errno, function }
    }

    /// The OS error code captured when the call failed.
    pub fn errno(&self) -> i32 {
        self.errno
    }

    /// Name of the syscall that failed.
    pub fn function(&self) -> &'static str {
        self.function
    }

    /// Convenience for matching on the kind of failure.
    pub fn kind(&self) -> io::ErrorKind {
        io::Error::from_raw_os_error(self.errno).kind()
    }
}

impl From<SyscallError> for io::Error {
    fn from(err: SyscallError) -> Self {
        io::Error::from_raw_os_error(err.errno)
    }
}

fn describe(code: &i32) -> io::Error {
    io::Error::from_raw_os_error(*code)
}

/// Result of a wrapped syscall.
pub type Result<T> = std::result::Result<T, SyscallError>;
