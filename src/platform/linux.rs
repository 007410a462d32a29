use std::io;
use std::os::fd::RawFd;

use lazy_static::lazy_static;
use log::warn;

use super::Platform;
use crate::data::MMsgHdr;

lazy_static! {
    // Linux has no SO_NOSIGPIPE, so the disposition is changed for the whole
    // process the first time anyone creates a socket through this crate.
    static ref SIGPIPE_IGNORED: bool = {
        let previous = unsafe { libc::signal(libc::SIGPIPE, libc::SIG_IGN) };
        if previous == libc::SIG_ERR {
            warn!(
                "could not ignore SIGPIPE, writes to closed sockets may kill the process: {}",
                io::Error::last_os_error()
            );
            false
        } else {
            true
        }
    };
}

pub(crate) struct LinuxPlatform;

impl Platform for LinuxPlatform {
    fn before_socket_created() {
        lazy_static::initialize(&SIGPIPE_IGNORED);
    }

    fn after_socket_created(_fd: RawFd) {}

    fn sendfile(
        src: RawFd,
        dst: RawFd,
        offset: libc::off_t,
        count: usize,
        written: &mut libc::off_t,
    ) -> libc::c_int {
        let mut off = offset;
        // Linux takes (out_fd, in_fd) and only reports progress in the
        // return value, so a failed call has moved nothing.
        let ret = unsafe { libc::sendfile(dst, src, &mut off, count) };
        if ret < 0 {
            *written = 0;
            -1
        } else {
            *written = ret as libc::off_t;
            0
        }
    }

    unsafe fn sendmmsg(
        fd: RawFd,
        msgs: *mut MMsgHdr,
        len: libc::c_uint,
        flags: libc::c_int,
    ) -> libc::c_int {
        libc::sendmmsg(fd, msgs as _, len as _, flags as _) as libc::c_int
    }

    unsafe fn recvmmsg(
        fd: RawFd,
        msgs: *mut MMsgHdr,
        len: libc::c_uint,
        flags: libc::c_int,
        timeout: *mut libc::timespec,
    ) -> libc::c_int {
        libc::recvmmsg(fd, msgs, len as _, flags as _, timeout as _) as libc::c_int
    }
}

/// Whether the process-wide SIGPIPE disposition has been set to ignore.
#[cfg(test)]
pub(crate) fn sigpipe_ignored() -> bool {
    *SIGPIPE_IGNORED
}
