use std::mem;
use std::os::fd::RawFd;

use log::warn;

use super::Platform;
use crate::data::MMsgHdr;
use crate::engine;

pub(crate) struct BsdPlatform;

impl Platform for BsdPlatform {
    fn before_socket_created() {}

    fn after_socket_created(fd: RawFd) {
        let on: libc::c_int = 1;
        let res = engine::syscall("setsockopt", || unsafe {
            libc::setsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_NOSIGPIPE,
                &on as *const libc::c_int as *const libc::c_void,
                mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        });
        if let Err(e) = res {
            warn!("could not set SO_NOSIGPIPE on fd {}: {}", fd, e);
        }
    }

    fn sendfile(
        src: RawFd,
        dst: RawFd,
        offset: libc::off_t,
        count: usize,
        written: &mut libc::off_t,
    ) -> libc::c_int {
        // The BSDs take (file, socket) and report progress through an out
        // parameter that stays valid when the call fails with EAGAIN.
        #[cfg(any(target_os = "freebsd", target_os = "dragonfly"))]
        let ret = {
            let mut sbytes: libc::off_t = 0;
            let ret = unsafe {
                libc::sendfile(src, dst, offset, count, std::ptr::null_mut(), &mut sbytes, 0)
            };
            *written = sbytes;
            ret
        };
        #[cfg(not(any(target_os = "freebsd", target_os = "dragonfly")))]
        let ret = {
            let mut len = count as libc::off_t;
            let ret = unsafe { libc::sendfile(src, dst, offset, &mut len, std::ptr::null_mut(), 0) };
            *written = len;
            ret
        };
        ret
    }

    // Emulated with one sendmsg per header. A failure on the first message
    // is the call's failure; a later one just ends the batch early and will
    // surface again on the caller's next attempt, as it does on Linux.
    unsafe fn sendmmsg(
        fd: RawFd,
        msgs: *mut MMsgHdr,
        len: libc::c_uint,
        flags: libc::c_int,
    ) -> libc::c_int {
        let mut done: libc::c_uint = 0;
        while done < len {
            let hdr = &mut *msgs.add(done as usize);
            let ret = libc::sendmsg(fd, &hdr.msg_hdr, flags);
            if ret < 0 {
                if done == 0 {
                    return -1;
                }
                break;
            }
            hdr.msg_len = ret as libc::c_uint;
            done += 1;
        }
        done as libc::c_int
    }

    // Same shape as sendmmsg. Only the first receive may block; the timeout
    // is not supported by the emulation and is ignored.
    unsafe fn recvmmsg(
        fd: RawFd,
        msgs: *mut MMsgHdr,
        len: libc::c_uint,
        flags: libc::c_int,
        _timeout: *mut libc::timespec,
    ) -> libc::c_int {
        let mut done: libc::c_uint = 0;
        while done < len {
            let hdr = &mut *msgs.add(done as usize);
            let flags = if done == 0 { flags } else { flags | libc::MSG_DONTWAIT };
            let ret = libc::recvmsg(fd, &mut hdr.msg_hdr, flags);
            if ret < 0 {
                if done == 0 {
                    return -1;
                }
                break;
            }
            hdr.msg_len = ret as libc::c_uint;
            done += 1;
        }
        done as libc::c_int
    }
}
