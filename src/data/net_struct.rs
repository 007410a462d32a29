use std::fmt;
use std::mem;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::ptr;

use cfg_if::cfg_if;
use libc::{
    in6_addr, in_addr, sa_family_t, sockaddr, sockaddr_in, sockaddr_in6, sockaddr_storage,
    socklen_t, AF_INET, AF_INET6,
};

// BSD-derived stacks carry the structure length inside the address itself.
#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "tvos",
    target_os = "watchos",
    target_os = "freebsd",
    target_os = "dragonfly"
))]
macro_rules! set_sin_len {
    ($addr:ident . $field:ident, $ty:ty) => {
        $addr.$field = mem::size_of::<$ty>() as u8;
    };
}

#[cfg(not(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "tvos",
    target_os = "watchos",
    target_os = "freebsd",
    target_os = "dragonfly"
)))]
macro_rules! set_sin_len {
    ($addr:ident . $field:ident, $ty:ty) => {};
}

/// Owned socket address buffer plus the length the kernel should look at.
///
/// Used both as an input (bind, connect, sendto) and as an output buffer
/// (accept, recvfrom, getpeername, getsockname). Output buffers start out
/// with the full storage length; the kernel shrinks it to what it wrote.
#[derive(Clone, Copy)]
pub struct SockAddr {
    storage: sockaddr_storage,
    len: socklen_t,
}

impl SockAddr {
    /// A zeroed buffer large enough for any address family.
    pub fn empty() -> Self {
        SockAddr {
            storage: unsafe { mem::zeroed() },
            len: mem::size_of::<sockaddr_storage>() as socklen_t,
        }
    }

    pub fn from_std(addr: &SocketAddr) -> Self {
        let mut out = SockAddr::empty();
        match addr {
            SocketAddr::V4(v4) => {
                let mut sin: sockaddr_in = unsafe { mem::zeroed() };
                sin.sin_family = AF_INET as sa_family_t;
                sin.sin_port = v4.port().to_be();
                sin.sin_addr = in_addr {
                    s_addr: u32::from_ne_bytes(v4.ip().octets()),
                };
                set_sin_len!(sin.sin_len, sockaddr_in);
                unsafe { ptr::write(out.as_mut_ptr() as *mut sockaddr_in, sin) };
                out.len = mem::size_of::<sockaddr_in>() as socklen_t;
            }
            SocketAddr::V6(v6) => {
                let mut sin6: sockaddr_in6 = unsafe { mem::zeroed() };
                sin6.sin6_family = AF_INET6 as sa_family_t;
                sin6.sin6_port = v6.port().to_be();
                sin6.sin6_flowinfo = v6.flowinfo();
                sin6.sin6_addr = in6_addr {
                    s6_addr: v6.ip().octets(),
                };
                sin6.sin6_scope_id = v6.scope_id();
                set_sin_len!(sin6.sin6_len, sockaddr_in6);
                unsafe { ptr::write(out.as_mut_ptr() as *mut sockaddr_in6, sin6) };
                out.len = mem::size_of::<sockaddr_in6>() as socklen_t;
            }
        }
        out
    }

    /// Copy a kernel-provided address of a known family.
    ///
    /// Only `AF_INET` and `AF_INET6` have a length we can trust without the
    /// kernel telling us, anything else yields `None`.
    ///
    /// # Safety
    /// `addr` must be null or point to a valid `sockaddr` whose family field
    /// describes the structure behind it.
    pub unsafe fn from_raw(addr: *const sockaddr) -> Option<Self> {
        if addr.is_null() {
            return None;
        }
        let len = match (*addr).sa_family as i32 {
            AF_INET => mem::size_of::<sockaddr_in>(),
            AF_INET6 => mem::size_of::<sockaddr_in6>(),
            _ => return None,
        };
        let mut out = SockAddr::empty();
        ptr::copy_nonoverlapping(addr as *const u8, out.as_mut_ptr() as *mut u8, len);
        out.len = len as socklen_t;
        Some(out)
    }

    pub fn family(&self) -> i32 {
        self.storage.ss_family as i32
    }

    pub fn len(&self) -> socklen_t {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn to_std(&self) -> Option<SocketAddr> {
        match self.family() {
            AF_INET if self.len as usize >= mem::size_of::<sockaddr_in>() => {
                let sin = unsafe { &*(self.as_ptr() as *const sockaddr_in) };
                let ip = Ipv4Addr::from(sin.sin_addr.s_addr.to_ne_bytes());
                Some(SocketAddr::V4(SocketAddrV4::new(ip, u16::from_be(sin.sin_port))))
            }
            AF_INET6 if self.len as usize >= mem::size_of::<sockaddr_in6>() => {
                let sin6 = unsafe { &*(self.as_ptr() as *const sockaddr_in6) };
                Some(SocketAddr::V6(SocketAddrV6::new(
                    Ipv6Addr::from(sin6.sin6_addr.s6_addr),
                    u16::from_be(sin6.sin6_port),
                    sin6.sin6_flowinfo,
                    sin6.sin6_scope_id,
                )))
            }
            _ => None,
        }
    }

    pub fn as_ptr(&self) -> *const sockaddr {
        &self.storage as *const sockaddr_storage as *const sockaddr
    }

    pub fn as_mut_ptr(&mut self) -> *mut sockaddr {
        &mut self.storage as *mut sockaddr_storage as *mut sockaddr
    }

    /// Length slot for calls that take a value-result `socklen_t *`.
    pub(crate) fn len_mut(&mut self) -> *mut socklen_t {
        &mut self.len
    }

    /// Reset the length so the buffer can be handed to the kernel again.
    pub(crate) fn reset_len(&mut self) {
        self.len = mem::size_of::<sockaddr_storage>() as socklen_t;
    }
}

impl Default for SockAddr {
    fn default() -> Self {
        SockAddr::empty()
    }
}

impl From<SocketAddr> for SockAddr {
    fn from(addr: SocketAddr) -> Self {
        SockAddr::from_std(&addr)
    }
}

impl fmt::Debug for SockAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_std() {
            Some(addr) => write!(f, "SockAddr({})", addr),
            None => f
                .debug_struct("SockAddr")
                .field("family", &self.family())
                .field("len", &self.len)
                .finish(),
        }
    }
}

cfg_if! {
    if #[cfg(any(target_os = "linux", target_os = "android"))] {
        /// Header for one message of a batched datagram call.
        pub type MMsgHdr = libc::mmsghdr;
    } else {
        /// Header for one message of a batched datagram call.
        ///
        /// Laid out like Linux's `struct mmsghdr`; the batched calls are
        /// emulated on these targets so the kernel never sees it.
        #[repr(C)]
        #[derive(Clone, Copy)]
        pub struct MMsgHdr {
            pub msg_hdr: libc::msghdr,
            pub msg_len: libc::c_uint,
        }
    }
}
