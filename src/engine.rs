//! The retry/capture engine every facade call goes through.
//!
//! A wrapped operation is a closure that performs exactly one raw libc call
//! and returns its raw result. The engine runs it inside [`capture`], which
//! reads errno before returning, so nothing the engine or the caller does
//! afterwards (logging, drop glue, more syscalls) can clobber the code that
//! belongs to the failed call. Classification then works purely on the
//! captured value:
//!
//! - `EINTR`: run the closure again, the caller never sees it.
//! - `EAGAIN`/`EWOULDBLOCK`: [`Outcome::WouldBlock`], only for calls made
//!   through [`syscall_may_block`].
//! - `EFAULT`/`EBADF`: the defect signal (a panic), see [`crate::errno`].
//! - anything else: a [`SyscallError`].

use log::{debug, trace};

use crate::errno::{assert_not_blacklisted, get_errno, Result, SyscallError};

/// Raw return values a libc call can hand back.
pub trait RawReturn: Copy {
    /// Whether this value is the call's failure sentinel.
    fn is_failure(self) -> bool;

    /// The "no progress" value reported alongside a would-block.
    fn zero() -> Self;
}

macro_rules! raw_return_int {
    ($($ty:ty),*) => {
        $(
            impl RawReturn for $ty {
                #[inline(always)]
                fn is_failure(self) -> bool {
                    self == -1
                }

                #[inline(always)]
                fn zero() -> Self {
                    0
                }
            }
        )*
    };
}

raw_return_int!(i32, i64, isize);

impl<T> RawReturn for *const T {
    #[inline(always)]
    fn is_failure(self) -> bool {
        self.is_null()
    }

    fn zero() -> Self {
        std::ptr::null()
    }
}

impl<T> RawReturn for *mut T {
    #[inline(always)]
    fn is_failure(self) -> bool {
        self.is_null()
    }

    fn zero() -> Self {
        std::ptr::null_mut()
    }
}

/// Non-error terminal state of a call that may find its resource not ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The call ran to completion and produced this value.
    Completed(T),
    /// The resource was not ready; the value is whatever progress was made
    /// before the kernel gave up (usually zero).
    WouldBlock(T),
}

impl<T> Outcome<T> {
    pub fn is_would_block(&self) -> bool {
        matches!(self, Outcome::WouldBlock(_))
    }

    /// The carried value regardless of variant.
    pub fn into_inner(self) -> T {
        match self {
            Outcome::Completed(v) | Outcome::WouldBlock(v) => v,
        }
    }

    /// `Some` only for [`Outcome::Completed`].
    pub fn completed(self) -> Option<T> {
        match self {
            Outcome::Completed(v) => Some(v),
            Outcome::WouldBlock(_) => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Outcome::Completed(v) => Outcome::Completed(f(v)),
            Outcome::WouldBlock(v) => Outcome::WouldBlock(f(v)),
        }
    }
}

/// Run `op` once and pair its raw result with the errno it left behind.
///
/// Kept out of line so the read of errno is the first thing that happens
/// after the call returns in every monomorphised copy. `R` is `Copy`, so
/// there is no drop glue between the two.
#[inline(never)]
fn capture<R: RawReturn, F: FnMut() -> R>(op: &mut F) -> (R, Option<i32>) {
    let raw = op();
    if raw.is_failure() {
        (raw, Some(get_errno()))
    } else {
        (raw, None)
    }
}

#[inline]
fn is_would_block(code: i32) -> bool {
    code == libc::EAGAIN || code == libc::EWOULDBLOCK
}

/// Turn a captured, non-retryable code into the error value.
#[track_caller]
fn failure(code: i32, function: &'static str) -> SyscallError {
    assert_not_blacklisted(code, function);
    let err = SyscallError::new(code, function);
    debug!("{}", err);
    err
}

/// Wrap a call that always completes synchronously.
///
/// `EAGAIN` is not special here and comes back as a [`SyscallError`].
#[track_caller]
pub fn syscall<R, F>(function: &'static str, mut op: F) -> Result<R>
where
    R: RawReturn,
    F: FnMut() -> R,
{
    loop {
        match capture(&mut op) {
            (raw, None) => return Ok(raw),
            (_, Some(libc::EINTR)) => trace!("{}() interrupted, retrying", function),
            (_, Some(code)) => return Err(failure(code, function)),
        }
    }
}

/// Wrap a call on a descriptor that may be non-blocking.
#[track_caller]
pub fn syscall_may_block<R, F>(function: &'static str, mut op: F) -> Result<Outcome<R>>
where
    R: RawReturn,
    F: FnMut() -> R,
{
    loop {
        match capture(&mut op) {
            (raw, None) => return Ok(Outcome::Completed(raw)),
            (_, Some(libc::EINTR)) => trace!("{}() interrupted, retrying", function),
            (_, Some(code)) if is_would_block(code) => return Ok(Outcome::WouldBlock(R::zero())),
            (_, Some(code)) => return Err(failure(code, function)),
        }
    }
}

/// Wrap a call that reports failure with a null pointer.
#[track_caller]
pub fn syscall_nonnull<T, F>(function: &'static str, op: F) -> Result<*const T>
where
    F: FnMut() -> *const T,
{
    syscall(function, op)
}

/// Wrap `close(2)`-like calls.
///
/// These are never retried: once the call has been issued the descriptor is
/// gone, and a second attempt could close a descriptor some other thread has
/// just been handed. An `EINTR` therefore counts as success.
#[track_caller]
pub fn syscall_close<F>(function: &'static str, mut op: F) -> Result<()>
where
    F: FnMut() -> libc::c_int,
{
    match capture(&mut op) {
        (_, None) => Ok(()),
        (_, Some(libc::EINTR)) => {
            trace!("{}() interrupted, descriptor considered released", function);
            Ok(())
        }
        (_, Some(code)) => Err(failure(code, function)),
    }
}
