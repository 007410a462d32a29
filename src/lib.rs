//! syswrap: errno-safe wrappers over POSIX socket, descriptor and
//! event-notification syscalls.
//!
//! Every call in [`syscalls`] goes through the engine in [`engine`], which
//! guarantees three things:
//!
//! - errno is read immediately after the failing call, before anything else
//!   runs on the thread;
//! - `EINTR` is retried transparently (except for `close`, where it means
//!   success);
//! - the caller sees either a value, [`Outcome::WouldBlock`], or a
//!   [`SyscallError`].
//!
//! `EFAULT` and `EBADF` are not errors the caller can handle: they mean the
//! caller passed garbage to the kernel, and the engine panics on them.
//!
//! This crate never makes descriptors non-blocking, never schedules calls and
//! never retries on would-block. That is the event loop's job.

// Let's not have clippy warn for EAGAIN, etc.
#![allow(clippy::upper_case_acronyms)]
#![warn(clippy::all)]

pub mod data;
pub mod engine;
pub mod errno;
pub(crate) mod platform;
pub mod syscalls;

pub use data::{MMsgHdr, SockAddr};
pub use engine::{Outcome, RawReturn};
pub use errno::{Result, SyscallError};

#[cfg(test)]
mod tests;
