#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::os::fd::RawFd;

use syswrap::syscalls::*;
use syswrap::{Outcome, SockAddr};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn loopback(port: u16) -> SockAddr {
    SockAddr::from(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port))
}

pub fn nonblocking(fd: RawFd) {
    let flags = fcntl(fd, libc::F_GETFL, 0).unwrap();
    fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK).unwrap();
}

/// Block until `fd` reports any of `events`.
pub fn wait_for(fd: RawFd, events: libc::c_short) {
    let mut fds = [libc::pollfd {
        fd,
        events,
        revents: 0,
    }];
    assert_eq!(poll(&mut fds, 5000).unwrap(), 1, "fd {} never became ready", fd);
}

/// Write all of `buf` to a non-blocking descriptor, waiting out back-pressure.
pub fn write_all(fd: RawFd, mut buf: &[u8]) {
    while !buf.is_empty() {
        match write(fd, buf).unwrap() {
            Outcome::Completed(n) => buf = &buf[n..],
            Outcome::WouldBlock(_) => wait_for(fd, libc::POLLOUT),
        }
    }
}

/// Read exactly `len` bytes from a non-blocking descriptor.
pub fn read_exact(fd: RawFd, len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    let mut got = 0;
    while got < len {
        match read(fd, &mut out[got..]).unwrap() {
            Outcome::Completed(0) => panic!("unexpected end of stream after {} bytes", got),
            Outcome::Completed(n) => got += n,
            Outcome::WouldBlock(_) => wait_for(fd, libc::POLLIN),
        }
    }
    out
}
