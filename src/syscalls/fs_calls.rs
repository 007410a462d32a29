//! Descriptor I/O and descriptor lifecycle.
//!
//! Reference to Linux: https://man7.org/linux/man-pages/man2/read.2.html and
//! the pages linked from each function.

use std::ffi::CStr;
use std::io::{IoSlice, IoSliceMut};
use std::mem;
use std::os::fd::RawFd;

use libc::{c_int, c_void};

use crate::engine::{self, Outcome};
use crate::errno::{get_errno, Result};
use crate::platform::{Host, Platform};

// UIO_MAXIOV on Linux, IOV_MAX on the BSDs; libc only exports it for some
// targets.
const IOV_MAX: usize = 1024;

// The kernel rejects iovec arrays longer than IOV_MAX with EINVAL; clamp so a
// large gather write turns into a short write instead.
fn iov_count(len: usize) -> c_int {
    len.min(IOV_MAX) as c_int
}

/// Reference to Linux: https://man7.org/linux/man-pages/man2/read.2.html
///
/// `Completed(0)` means end of file.
pub fn read(fd: RawFd, buf: &mut [u8]) -> Result<Outcome<usize>> {
    let res = engine::syscall_may_block("read", || unsafe {
        libc::read(fd, buf.as_mut_ptr() as *mut c_void, buf.len())
    })?;
    Ok(res.map(|n| n as usize))
}

/// Reference to Linux: https://man7.org/linux/man-pages/man2/write.2.html
pub fn write(fd: RawFd, buf: &[u8]) -> Result<Outcome<usize>> {
    let res = engine::syscall_may_block("write", || unsafe {
        libc::write(fd, buf.as_ptr() as *const c_void, buf.len())
    })?;
    Ok(res.map(|n| n as usize))
}

/// Reference to Linux: https://man7.org/linux/man-pages/man2/writev.2.html
pub fn writev(fd: RawFd, bufs: &[IoSlice<'_>]) -> Result<Outcome<usize>> {
    // IoSlice is guaranteed ABI compatible with iovec on unix.
    let iov = bufs.as_ptr() as *const libc::iovec;
    let cnt = iov_count(bufs.len());
    let res = engine::syscall_may_block("writev", || unsafe { libc::writev(fd, iov, cnt) })?;
    Ok(res.map(|n| n as usize))
}

/// Reference to Linux: https://man7.org/linux/man-pages/man2/readv.2.html
pub fn readv(fd: RawFd, bufs: &mut [IoSliceMut<'_>]) -> Result<Outcome<usize>> {
    let iov = bufs.as_mut_ptr() as *const libc::iovec;
    let cnt = iov_count(bufs.len());
    let res = engine::syscall_may_block("readv", || unsafe { libc::readv(fd, iov, cnt) })?;
    Ok(res.map(|n| n as usize))
}

/// Reference to Linux: https://man7.org/linux/man-pages/man2/pread.2.html
pub fn pread(fd: RawFd, buf: &mut [u8], offset: libc::off_t) -> Result<Outcome<usize>> {
    let res = engine::syscall_may_block("pread", || unsafe {
        libc::pread(fd, buf.as_mut_ptr() as *mut c_void, buf.len(), offset)
    })?;
    Ok(res.map(|n| n as usize))
}

/// Reference to Linux: https://man7.org/linux/man-pages/man2/pwrite.2.html
pub fn pwrite(fd: RawFd, buf: &[u8], offset: libc::off_t) -> Result<Outcome<usize>> {
    let res = engine::syscall_may_block("pwrite", || unsafe {
        libc::pwrite(fd, buf.as_ptr() as *const c_void, buf.len(), offset)
    })?;
    Ok(res.map(|n| n as usize))
}

/// Reference to Linux: https://man7.org/linux/man-pages/man2/sendfile.2.html
///
/// Copies up to `count` bytes from `src` (starting at `offset`) into `dst`.
/// The argument order is the same on every platform even though the
/// underlying calls disagree on it. When `dst` fills up part way through,
/// the bytes already moved come back as `WouldBlock(n)`. A `count` of zero
/// moves nothing, even where the native call reads it as "until EOF".
pub fn sendfile(src: RawFd, dst: RawFd, offset: libc::off_t, count: usize) -> Result<Outcome<usize>> {
    if count == 0 {
        return Ok(Outcome::Completed(0));
    }
    sendfile_with(|written| Host::sendfile(src, dst, offset, count, written))
}

/// Drive a raw sendfile-shaped call that reports progress out-of-band.
pub(crate) fn sendfile_with<F>(mut op: F) -> Result<Outcome<usize>>
where
    F: FnMut(&mut libc::off_t) -> c_int,
{
    let mut written: libc::off_t = 0;
    let res = engine::syscall_may_block("sendfile", || {
        written = 0;
        let ret = op(&mut written);
        // An interrupt after partial progress must not be retried from the
        // original offset; report what was moved instead.
        if ret == -1 && written > 0 && get_errno() == libc::EINTR {
            0
        } else {
            ret
        }
    })?;
    Ok(match res {
        Outcome::Completed(_) => Outcome::Completed(written as usize),
        Outcome::WouldBlock(_) => Outcome::WouldBlock(written as usize),
    })
}

/// Reference to Linux: https://man7.org/linux/man-pages/man2/close.2.html
///
/// An interrupted close still releases the descriptor, so `EINTR` is
/// reported as success and the call is never retried.
pub fn close(fd: RawFd) -> Result<()> {
    engine::syscall_close("close", || unsafe { libc::close(fd) })
}

/// Reference to Linux: https://man7.org/linux/man-pages/man2/dup.2.html
pub fn dup(fd: RawFd) -> Result<RawFd> {
    engine::syscall("dup", || unsafe { libc::dup(fd) })
}

/// Reference to Linux: https://man7.org/linux/man-pages/man2/lseek.2.html
pub fn lseek(fd: RawFd, offset: libc::off_t, whence: c_int) -> Result<libc::off_t> {
    engine::syscall("lseek", || unsafe { libc::lseek(fd, offset, whence) })
}

/// Reference to Linux: https://man7.org/linux/man-pages/man2/fcntl.2.html
///
/// Only the integer-argument commands (`F_GETFL`, `F_SETFL`, `F_GETFD`,
/// `F_SETFD`, `F_DUPFD`, ...) are supported. Pass `0` when `cmd` takes no
/// argument.
pub fn fcntl(fd: RawFd, cmd: c_int, arg: c_int) -> Result<c_int> {
    engine::syscall("fcntl", || unsafe { libc::fcntl(fd, cmd, arg) })
}

/// Reference to Linux: https://man7.org/linux/man-pages/man2/open.2.html
pub fn open(path: &CStr, flags: c_int, mode: libc::mode_t) -> Result<RawFd> {
    engine::syscall("open", || unsafe { libc::open(path.as_ptr(), flags, mode as libc::c_uint) })
}

/// Reference to Linux: https://man7.org/linux/man-pages/man2/pipe.2.html
///
/// Returns `[read_end, write_end]`.
pub fn pipe() -> Result<[RawFd; 2]> {
    let mut fds: [c_int; 2] = [-1, -1];
    engine::syscall("pipe", || unsafe { libc::pipe(fds.as_mut_ptr()) })?;
    Ok(fds)
}

/// Reference to Linux: https://man7.org/linux/man-pages/man2/fstat.2.html
pub fn fstat(fd: RawFd) -> Result<libc::stat> {
    let mut st: libc::stat = unsafe { mem::zeroed() };
    engine::syscall("fstat", || unsafe { libc::fstat(fd, &mut st) })?;
    Ok(st)
}

/// Reference to Linux: https://man7.org/linux/man-pages/man2/poll.2.html
///
/// Returns the number of entries with a non-zero `revents`; `0` means the
/// timeout expired. A negative timeout waits forever.
pub fn poll(fds: &mut [libc::pollfd], timeout_ms: c_int) -> Result<usize> {
    let (ptr, len) = (fds.as_mut_ptr(), fds.len() as libc::nfds_t);
    let ready = engine::syscall("poll", || unsafe { libc::poll(ptr, len, timeout_ms) })?;
    Ok(ready as usize)
}
