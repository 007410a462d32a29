//! Kernel readiness-notification primitives.
//!
//! Only the raw calls live here; arming interest and dispatching events is
//! the event loop's job. kqueue exists on the BSD family, epoll together
//! with eventfd and timerfd on Linux.

use std::os::fd::RawFd;

use libc::c_int;

use crate::engine;
use crate::errno::Result;

#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "tvos",
    target_os = "watchos",
    target_os = "freebsd",
    target_os = "dragonfly"
))]
pub use self::kqueue_calls::*;

#[cfg(any(target_os = "linux", target_os = "android"))]
pub use self::epoll_calls::*;

#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "tvos",
    target_os = "watchos",
    target_os = "freebsd",
    target_os = "dragonfly"
))]
mod kqueue_calls {
    use super::*;
    use std::ptr;

    /// Reference to FreeBSD: https://man.freebsd.org/cgi/man.cgi?kqueue
    pub fn kqueue() -> Result<RawFd> {
        engine::syscall("kqueue", || unsafe { libc::kqueue() })
    }

    /// Submit `changes` and collect up to `events.len()` triggered events.
    ///
    /// `None` waits indefinitely. Returns the number of entries written to
    /// `events`.
    pub fn kevent(
        kq: RawFd,
        changes: &[libc::kevent],
        events: &mut [libc::kevent],
        timeout: Option<&libc::timespec>,
    ) -> Result<usize> {
        let timeout_ptr = timeout.map_or(ptr::null(), |ts| ts as *const libc::timespec);
        let (ev_ptr, ev_len) = (events.as_mut_ptr(), events.len() as c_int);
        let n = engine::syscall("kevent", || unsafe {
            libc::kevent(
                kq,
                changes.as_ptr(),
                changes.len() as c_int,
                ev_ptr,
                ev_len,
                timeout_ptr,
            )
        })?;
        Ok(n as usize)
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
mod epoll_calls {
    use super::*;
    use std::mem;
    use std::ptr;

    use libc::c_void;

    use crate::engine::Outcome;

    /// Reference to Linux: https://man7.org/linux/man-pages/man2/epoll_create.2.html
    pub fn epoll_create(cloexec: bool) -> Result<RawFd> {
        let flags = if cloexec { libc::EPOLL_CLOEXEC } else { 0 };
        engine::syscall("epoll_create1", || unsafe { libc::epoll_create1(flags) })
    }

    /// Reference to Linux: https://man7.org/linux/man-pages/man2/epoll_ctl.2.html
    ///
    /// `event` may be `None` only for `EPOLL_CTL_DEL`.
    pub fn epoll_ctl(
        epfd: RawFd,
        op: c_int,
        fd: RawFd,
        event: Option<&mut libc::epoll_event>,
    ) -> Result<()> {
        let ev_ptr = event.map_or(ptr::null_mut(), |ev| ev as *mut libc::epoll_event);
        engine::syscall("epoll_ctl", || unsafe { libc::epoll_ctl(epfd, op, fd, ev_ptr) })?;
        Ok(())
    }

    /// Reference to Linux: https://man7.org/linux/man-pages/man2/epoll_wait.2.html
    ///
    /// A negative timeout waits indefinitely, `0` polls.
    pub fn epoll_wait(
        epfd: RawFd,
        events: &mut [libc::epoll_event],
        timeout_ms: c_int,
    ) -> Result<usize> {
        let (ptr, len) = (events.as_mut_ptr(), events.len() as c_int);
        let n = engine::syscall("epoll_wait", || unsafe {
            libc::epoll_wait(epfd, ptr, len, timeout_ms)
        })?;
        Ok(n as usize)
    }

    /// Reference to Linux: https://man7.org/linux/man-pages/man2/eventfd.2.html
    pub fn eventfd(initval: u32, flags: c_int) -> Result<RawFd> {
        engine::syscall("eventfd", || unsafe { libc::eventfd(initval as _, flags) })
    }

    /// Drain the counter of a (non-blocking) eventfd.
    pub fn eventfd_read(fd: RawFd) -> Result<Outcome<u64>> {
        let mut value: u64 = 0;
        let res = engine::syscall_may_block("eventfd_read", || unsafe {
            libc::read(fd, &mut value as *mut u64 as *mut c_void, mem::size_of::<u64>())
        })?;
        Ok(res.map(|_| value))
    }

    /// Add `value` to the counter of an eventfd.
    pub fn eventfd_write(fd: RawFd, value: u64) -> Result<Outcome<()>> {
        let res = engine::syscall_may_block("eventfd_write", || unsafe {
            libc::write(fd, &value as *const u64 as *const c_void, mem::size_of::<u64>())
        })?;
        Ok(res.map(|_| ()))
    }

    /// Reference to Linux: https://man7.org/linux/man-pages/man2/timerfd_create.2.html
    pub fn timerfd_create(clockid: libc::clockid_t, flags: c_int) -> Result<RawFd> {
        engine::syscall("timerfd_create", || unsafe { libc::timerfd_create(clockid, flags) })
    }

    /// Arm or disarm a timerfd, returning the previous setting.
    pub fn timerfd_settime(
        fd: RawFd,
        flags: c_int,
        new_value: &libc::itimerspec,
    ) -> Result<libc::itimerspec> {
        let mut old: libc::itimerspec = unsafe { mem::zeroed() };
        engine::syscall("timerfd_settime", || unsafe {
            libc::timerfd_settime(fd, flags, new_value, &mut old)
        })?;
        Ok(old)
    }
}
