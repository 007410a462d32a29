//! Primitives whose names or argument shapes differ between OS families.
//!
//! Each backend implements [`Platform`] with the raw calls only; the facade
//! in [`crate::syscalls`] wraps them with the engine exactly like it wraps
//! any portable call. The backend is picked at build time and exported as
//! [`Host`].

use std::os::fd::RawFd;

use cfg_if::cfg_if;

use crate::data::MMsgHdr;

/// Raw per-platform operations.
///
/// Methods returning a raw value follow libc conventions (`-1` plus errno)
/// and are only ever called from inside an engine closure.
pub(crate) trait Platform {
    /// Runs before a socket-creating call. Must not touch errno afterwards.
    fn before_socket_created();

    /// Runs on every descriptor produced by socket/accept/socketpair.
    fn after_socket_created(fd: RawFd);

    /// Copy up to `count` bytes of `src` starting at `offset` into `dst`.
    ///
    /// `written` receives the number of bytes moved, including when the
    /// call fails after partial progress.
    fn sendfile(
        src: RawFd,
        dst: RawFd,
        offset: libc::off_t,
        count: usize,
        written: &mut libc::off_t,
    ) -> libc::c_int;

    /// # Safety
    /// Every header must describe valid buffers for `len` messages.
    unsafe fn sendmmsg(fd: RawFd, msgs: *mut MMsgHdr, len: libc::c_uint, flags: libc::c_int)
        -> libc::c_int;

    /// # Safety
    /// Every header must describe valid buffers for `len` messages.
    unsafe fn recvmmsg(
        fd: RawFd,
        msgs: *mut MMsgHdr,
        len: libc::c_uint,
        flags: libc::c_int,
        timeout: *mut libc::timespec,
    ) -> libc::c_int;
}

cfg_if! {
    if #[cfg(any(target_os = "linux", target_os = "android"))] {
        pub(crate) mod linux;
        pub(crate) use linux::LinuxPlatform as Host;
    } else if #[cfg(any(
        target_os = "macos",
        target_os = "ios",
        target_os = "tvos",
        target_os = "watchos",
        target_os = "freebsd",
        target_os = "dragonfly",
    ))] {
        pub(crate) mod bsd;
        pub(crate) use bsd::BsdPlatform as Host;
    } else {
        compile_error!("syswrap has no syscall backend for this target");
    }
}
