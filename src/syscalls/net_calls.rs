//! Socket lifecycle, datagram I/O and address introspection.
//!
//! Reference to Linux: https://man7.org/linux/man-pages/man7/socket.7.html
//!
//! Every function here is a single engine application around the matching
//! libc call. Descriptors are expected to be non-blocking wherever an
//! [`Outcome`] is returned; this module never changes descriptor flags.

use std::ffi::{CStr, CString};
use std::mem;
use std::os::fd::RawFd;
use std::ptr;

use libc::{c_int, c_void, socklen_t};

use crate::data::{MMsgHdr, SockAddr};
use crate::engine::{self, Outcome};
use crate::errno::{Result, SyscallError};
use crate::platform::{Host, Platform};

/// Which half of a connection `shutdown` closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    Read,
    Write,
    Both,
}

impl Shutdown {
    fn as_raw(self) -> c_int {
        match self {
            Shutdown::Read => libc::SHUT_RD,
            Shutdown::Write => libc::SHUT_WR,
            Shutdown::Both => libc::SHUT_RDWR,
        }
    }
}

/// Reference to Linux: https://man7.org/linux/man-pages/man2/socket.2.html
///
/// Creates a socket and makes sure writing to it after the peer went away
/// reports `EPIPE` instead of killing the process.
pub fn socket(domain: c_int, socktype: c_int, protocol: c_int) -> Result<RawFd> {
    Host::before_socket_created();
    let fd = engine::syscall("socket", || unsafe { libc::socket(domain, socktype, protocol) })?;
    Host::after_socket_created(fd);
    Ok(fd)
}

/// Reference to Linux: https://man7.org/linux/man-pages/man2/socketpair.2.html
pub fn socketpair(domain: c_int, socktype: c_int, protocol: c_int) -> Result<[RawFd; 2]> {
    let mut fds: [c_int; 2] = [-1, -1];
    Host::before_socket_created();
    engine::syscall("socketpair", || unsafe {
        libc::socketpair(domain, socktype, protocol, fds.as_mut_ptr())
    })?;
    Host::after_socket_created(fds[0]);
    Host::after_socket_created(fds[1]);
    Ok(fds)
}

/// Reference to Linux: https://man7.org/linux/man-pages/man2/bind.2.html
pub fn bind(fd: RawFd, addr: &SockAddr) -> Result<()> {
    engine::syscall("bind", || unsafe { libc::bind(fd, addr.as_ptr(), addr.len()) })?;
    Ok(())
}

/// Reference to Linux: https://man7.org/linux/man-pages/man2/listen.2.html
pub fn listen(fd: RawFd, backlog: c_int) -> Result<()> {
    engine::syscall("listen", || unsafe { libc::listen(fd, backlog) })?;
    Ok(())
}

/// Reference to Linux: https://man7.org/linux/man-pages/man2/accept.2.html
///
/// Returns `None` when the listening descriptor has nothing pending. When
/// `peer` is given it receives the address of the accepted connection.
pub fn accept(fd: RawFd, peer: Option<&mut SockAddr>) -> Result<Option<RawFd>> {
    let (addr_ptr, len_ptr) = match peer {
        Some(addr) => {
            addr.reset_len();
            (addr.as_mut_ptr(), addr.len_mut())
        }
        None => (ptr::null_mut(), ptr::null_mut()),
    };
    match engine::syscall_may_block("accept", || unsafe { libc::accept(fd, addr_ptr, len_ptr) })? {
        Outcome::Completed(newfd) => {
            Host::after_socket_created(newfd);
            Ok(Some(newfd))
        }
        Outcome::WouldBlock(_) => Ok(None),
    }
}

/// Reference to Linux: https://man7.org/linux/man-pages/man2/connect.2.html
///
/// Returns `true` if the connection is established and `false` if a
/// non-blocking connect is still in progress; the caller finds out how it
/// ended by polling for writability and reading `SO_ERROR`.
pub fn connect(fd: RawFd, addr: &SockAddr) -> Result<bool> {
    connect_outcome(engine::syscall("connect", || unsafe {
        libc::connect(fd, addr.as_ptr(), addr.len())
    }))
}

/// `EINPROGRESS` is the one failure connect turns into a value.
pub(crate) fn connect_outcome(res: Result<c_int>) -> Result<bool> {
    match res {
        Ok(_) => Ok(true),
        Err(e) if e.errno() == libc::EINPROGRESS => Ok(false),
        Err(e) => Err(e),
    }
}

/// Reference to Linux: https://man7.org/linux/man-pages/man2/shutdown.2.html
pub fn shutdown(fd: RawFd, how: Shutdown) -> Result<()> {
    engine::syscall("shutdown", || unsafe { libc::shutdown(fd, how.as_raw()) })?;
    Ok(())
}

mod sealed {
    pub trait Sealed {}
}

/// Plain-old-data types a socket option value can be read into.
///
/// Every bit pattern, including all zeroes, is a valid value of these
/// types. Sealed so callers cannot add types the kernel would corrupt.
pub trait SockOptValue: Copy + sealed::Sealed {}

macro_rules! sockopt_value {
    ($($ty:ty),*) => {
        $(
            impl sealed::Sealed for $ty {}
            impl SockOptValue for $ty {}
        )*
    };
}

sockopt_value!(
    libc::c_int,
    libc::c_uint,
    libc::c_uchar,
    libc::linger,
    libc::timeval,
    libc::in_addr,
    libc::ip_mreq,
    libc::ipv6_mreq
);

#[cfg(any(target_os = "linux", target_os = "android"))]
sockopt_value!(libc::ucred);

/// Reference to Linux: https://man7.org/linux/man-pages/man2/setsockopt.2.html
pub fn setsockopt<T: SockOptValue>(fd: RawFd, level: c_int, name: c_int, value: &T) -> Result<()> {
    engine::syscall("setsockopt", || unsafe {
        libc::setsockopt(
            fd,
            level,
            name,
            value as *const T as *const c_void,
            mem::size_of::<T>() as socklen_t,
        )
    })?;
    Ok(())
}

/// Reference to Linux: https://man7.org/linux/man-pages/man2/getsockopt.2.html
///
/// Fails with `EINVAL` when the kernel hands back a value whose size is not
/// the size of `T`, i.e. the option is not of that type.
pub fn getsockopt<T: SockOptValue>(fd: RawFd, level: c_int, name: c_int) -> Result<T> {
    let mut value: T = unsafe { mem::zeroed() };
    let mut len = mem::size_of::<T>() as socklen_t;
    engine::syscall("getsockopt", || unsafe {
        libc::getsockopt(fd, level, name, &mut value as *mut T as *mut c_void, &mut len)
    })?;
    if len as usize != mem::size_of::<T>() {
        return Err(SyscallError::new(libc::EINVAL, "getsockopt"));
    }
    Ok(value)
}

/// Reference to Linux: https://man7.org/linux/man-pages/man2/getpeername.2.html
pub fn getpeername(fd: RawFd) -> Result<SockAddr> {
    let mut addr = SockAddr::empty();
    let (addr_ptr, len_ptr) = (addr.as_mut_ptr(), addr.len_mut());
    engine::syscall("getpeername", || unsafe { libc::getpeername(fd, addr_ptr, len_ptr) })?;
    Ok(addr)
}

/// Reference to Linux: https://man7.org/linux/man-pages/man2/getsockname.2.html
pub fn getsockname(fd: RawFd) -> Result<SockAddr> {
    let mut addr = SockAddr::empty();
    let (addr_ptr, len_ptr) = (addr.as_mut_ptr(), addr.len_mut());
    engine::syscall("getsockname", || unsafe { libc::getsockname(fd, addr_ptr, len_ptr) })?;
    Ok(addr)
}

/// Reference to Linux: https://man7.org/linux/man-pages/man2/sendto.2.html
///
/// With `dest` set to `None` this is a plain `send` on a connected socket.
pub fn sendto(fd: RawFd, buf: &[u8], dest: Option<&SockAddr>) -> Result<Outcome<usize>> {
    let (addr_ptr, addr_len) = match dest {
        Some(addr) => (addr.as_ptr(), addr.len()),
        None => (ptr::null(), 0),
    };
    let res = engine::syscall_may_block("sendto", || unsafe {
        libc::sendto(fd, buf.as_ptr() as *const c_void, buf.len(), 0, addr_ptr, addr_len)
    })?;
    Ok(res.map(|n| n as usize))
}

/// Reference to Linux: https://man7.org/linux/man-pages/man2/recvfrom.2.html
pub fn recvfrom(fd: RawFd, buf: &mut [u8], src: Option<&mut SockAddr>) -> Result<Outcome<usize>> {
    let (addr_ptr, len_ptr) = match src {
        Some(addr) => {
            addr.reset_len();
            (addr.as_mut_ptr(), addr.len_mut())
        }
        None => (ptr::null_mut(), ptr::null_mut()),
    };
    let res = engine::syscall_may_block("recvfrom", || unsafe {
        libc::recvfrom(fd, buf.as_mut_ptr() as *mut c_void, buf.len(), 0, addr_ptr, len_ptr)
    })?;
    Ok(res.map(|n| n as usize))
}

/// Reference to Linux: https://man7.org/linux/man-pages/man2/sendmsg.2.html
///
/// # Safety
/// `msg` must describe a valid iovec array and, if set, valid name and
/// control buffers.
pub unsafe fn sendmsg(fd: RawFd, msg: &libc::msghdr, flags: c_int) -> Result<Outcome<usize>> {
    let res = engine::syscall_may_block("sendmsg", || libc::sendmsg(fd, msg, flags))?;
    Ok(res.map(|n| n as usize))
}

/// Reference to Linux: https://man7.org/linux/man-pages/man2/recvmsg.2.html
///
/// # Safety
/// See [`sendmsg`].
pub unsafe fn recvmsg(fd: RawFd, msg: &mut libc::msghdr, flags: c_int) -> Result<Outcome<usize>> {
    let msg_ptr: *mut libc::msghdr = msg;
    let res = engine::syscall_may_block("recvmsg", || libc::recvmsg(fd, msg_ptr, flags))?;
    Ok(res.map(|n| n as usize))
}

/// Reference to Linux: https://man7.org/linux/man-pages/man2/sendmmsg.2.html
///
/// Sends as many of `msgs` as the socket accepts in one go and returns how
/// many went out; each sent header has its `msg_len` filled in.
///
/// # Safety
/// Every header must satisfy the requirements of [`sendmsg`].
pub unsafe fn sendmmsg(fd: RawFd, msgs: &mut [MMsgHdr], flags: c_int) -> Result<Outcome<usize>> {
    let (ptr, len) = (msgs.as_mut_ptr(), msgs.len() as libc::c_uint);
    let res = engine::syscall_may_block("sendmmsg", || Host::sendmmsg(fd, ptr, len, flags))?;
    Ok(res.map(|n| n as usize))
}

/// Reference to Linux: https://man7.org/linux/man-pages/man2/recvmmsg.2.html
///
/// The timeout is handed to the kernel untouched.
///
/// # Safety
/// Every header must satisfy the requirements of [`recvmsg`].
pub unsafe fn recvmmsg(
    fd: RawFd,
    msgs: &mut [MMsgHdr],
    flags: c_int,
    timeout: Option<&mut libc::timespec>,
) -> Result<Outcome<usize>> {
    let (ptr, len) = (msgs.as_mut_ptr(), msgs.len() as libc::c_uint);
    let timeout_ptr = match timeout {
        Some(ts) => ts as *mut libc::timespec,
        None => ptr::null_mut(),
    };
    let res = engine::syscall_may_block("recvmmsg", || {
        Host::recvmmsg(fd, ptr, len, flags, timeout_ptr)
    })?;
    Ok(res.map(|n| n as usize))
}

/// One entry returned by [`getifaddrs`].
#[derive(Debug, Clone)]
pub struct InterfaceAddress {
    pub name: String,
    pub flags: u32,
    pub address: Option<SockAddr>,
    pub netmask: Option<SockAddr>,
}

/// The interface list owned by libc, released on drop.
pub struct InterfaceAddresses {
    head: *mut libc::ifaddrs,
}

impl InterfaceAddresses {
    pub fn iter(&self) -> InterfaceAddressIter<'_> {
        InterfaceAddressIter {
            cur: self.head,
            _list: self,
        }
    }
}

impl Drop for InterfaceAddresses {
    fn drop(&mut self) {
        if !self.head.is_null() {
            unsafe { libc::freeifaddrs(self.head) };
        }
    }
}

pub struct InterfaceAddressIter<'a> {
    cur: *mut libc::ifaddrs,
    _list: &'a InterfaceAddresses,
}

impl<'a> Iterator for InterfaceAddressIter<'a> {
    type Item = InterfaceAddress;

    fn next(&mut self) -> Option<InterfaceAddress> {
        if self.cur.is_null() {
            return None;
        }
        let ifa = unsafe { &*self.cur };
        self.cur = ifa.ifa_next;
        let name = unsafe { CStr::from_ptr(ifa.ifa_name) }.to_string_lossy().into_owned();
        Some(InterfaceAddress {
            name,
            flags: ifa.ifa_flags as u32,
            address: unsafe { SockAddr::from_raw(ifa.ifa_addr) },
            netmask: unsafe { SockAddr::from_raw(ifa.ifa_netmask) },
        })
    }
}

/// Reference to Linux: https://man7.org/linux/man-pages/man3/getifaddrs.3.html
pub fn getifaddrs() -> Result<InterfaceAddresses> {
    let mut head: *mut libc::ifaddrs = ptr::null_mut();
    engine::syscall("getifaddrs", || unsafe { libc::getifaddrs(&mut head) })?;
    Ok(InterfaceAddresses { head })
}

/// Reference to Linux: https://man7.org/linux/man-pages/man3/if_nametoindex.3.html
pub fn if_nametoindex(name: &CStr) -> Result<u32> {
    // Failure is signalled by 0, which the engine does not know about, so
    // the check and the errno read happen here back to back.
    let index = unsafe { libc::if_nametoindex(name.as_ptr()) };
    if index == 0 {
        return Err(SyscallError::new(crate::errno::get_errno(), "if_nametoindex"));
    }
    Ok(index as u32)
}

// The libc crate does not bind the presentation-format converters.
mod ffi {
    use libc::{c_char, c_int, c_void, socklen_t};

    extern "C" {
        pub fn inet_ntop(af: c_int, src: *const c_void, dst: *mut c_char, size: socklen_t) -> *const c_char;
        pub fn inet_pton(af: c_int, src: *const c_char, dst: *mut c_void) -> c_int;
    }
}

// Large enough for "ffff:ffff:ffff:ffff:ffff:ffff:255.255.255.255" plus NUL.
const INET6_ADDRSTRLEN: usize = 46;

/// Bytes of network-order address libc reads or writes for `family`.
fn raw_addr_len(family: c_int) -> usize {
    if family == libc::AF_INET6 {
        16
    } else {
        4
    }
}

/// Reference to Linux: https://man7.org/linux/man-pages/man3/inet_ntop.3.html
///
/// `addr` is the raw network-order address: 4 bytes for `AF_INET`, 16 for
/// `AF_INET6`. A shorter slice fails with `EINVAL`.
pub fn inet_ntop(family: c_int, addr: &[u8]) -> Result<String> {
    if addr.len() < raw_addr_len(family) {
        return Err(SyscallError::new(libc::EINVAL, "inet_ntop"));
    }
    let mut out = [0 as libc::c_char; INET6_ADDRSTRLEN];
    let out_len = out.len() as socklen_t;
    let out_ptr = out.as_mut_ptr();
    engine::syscall_nonnull("inet_ntop", || unsafe {
        ffi::inet_ntop(family, addr.as_ptr() as *const c_void, out_ptr, out_len)
    })?;
    let text = unsafe { CStr::from_ptr(out.as_ptr()) };
    Ok(text.to_string_lossy().into_owned())
}

/// Reference to Linux: https://man7.org/linux/man-pages/man3/inet_pton.3.html
///
/// Writes the network-order address into `out`, which must be at least 4
/// bytes for `AF_INET` and 16 for `AF_INET6`. A string that is not a valid
/// address of `family` fails with `EINVAL`.
pub fn inet_pton(family: c_int, text: &CStr, out: &mut [u8]) -> Result<()> {
    if out.len() < raw_addr_len(family) {
        return Err(SyscallError::new(libc::EINVAL, "inet_pton"));
    }
    let out_ptr = out.as_mut_ptr() as *mut c_void;
    match engine::syscall("inet_pton", || unsafe { ffi::inet_pton(family, text.as_ptr(), out_ptr) })? {
        0 => Err(SyscallError::new(libc::EINVAL, "inet_pton")),
        _ => Ok(()),
    }
}

/// [`inet_pton`] for callers holding a Rust string.
pub fn inet_pton_str(family: c_int, text: &str, out: &mut [u8]) -> Result<()> {
    let text = CString::new(text).map_err(|_| SyscallError::new(libc::EINVAL, "inet_pton"))?;
    inet_pton(family, &text, out)
}
