// These tests open real sockets and rely on the process-wide SIGPIPE
// handling, so they run one at a time.
use serial_test::serial;
use syswrap::syscalls::*;
use syswrap::{Outcome, SockAddr};
mod common;
use common::*;

#[test]
#[serial]
fn tcp_echo_over_nonblocking_sockets() {
    init_logging();

    let lfd = socket(libc::AF_INET, libc::SOCK_STREAM, 0).unwrap();
    bind(lfd, &loopback(0)).unwrap();
    listen(lfd, 8).unwrap();
    nonblocking(lfd);
    let addr = getsockname(lfd).unwrap();

    let cfd = socket(libc::AF_INET, libc::SOCK_STREAM, 0).unwrap();
    nonblocking(cfd);
    if !connect(cfd, &addr).unwrap() {
        wait_for(cfd, libc::POLLOUT);
        let so_error: libc::c_int = getsockopt(cfd, libc::SOL_SOCKET, libc::SO_ERROR).unwrap();
        assert_eq!(so_error, 0);
    }

    let mut peer = SockAddr::empty();
    let sfd = loop {
        match accept(lfd, Some(&mut peer)).unwrap() {
            Some(fd) => break fd,
            None => wait_for(lfd, libc::POLLIN),
        }
    };
    nonblocking(sfd);
    assert_eq!(peer.to_std(), getsockname(cfd).unwrap().to_std());

    // large enough to hit back-pressure on the way through
    let payload: Vec<u8> = (0..1_000_000u32).map(|i| i as u8).collect();
    let writer_payload = payload.clone();
    let writer = std::thread::spawn(move || {
        write_all(cfd, &writer_payload);
        shutdown(cfd, Shutdown::Write).unwrap();
        cfd
    });

    let echoed = read_exact(sfd, payload.len());
    assert_eq!(echoed, payload);
    let cfd = writer.join().unwrap();

    wait_for(sfd, libc::POLLIN);
    let mut buf = [0u8; 16];
    assert_eq!(read(sfd, &mut buf).unwrap(), Outcome::Completed(0));

    for fd in [sfd, cfd, lfd] {
        close(fd).unwrap();
    }
}

#[test]
#[serial]
fn writing_to_a_vanished_peer_returns_epipe() {
    init_logging();

    let lfd = socket(libc::AF_INET, libc::SOCK_STREAM, 0).unwrap();
    bind(lfd, &loopback(0)).unwrap();
    listen(lfd, 8).unwrap();
    let addr = getsockname(lfd).unwrap();

    let cfd = socket(libc::AF_INET, libc::SOCK_STREAM, 0).unwrap();
    assert!(connect(cfd, &addr).unwrap());
    let sfd = accept(lfd, None).unwrap().unwrap();
    close(sfd).unwrap();

    // The first write may still be accepted; the peer's reset then turns
    // later writes into EPIPE or ECONNRESET. The process must survive.
    let mut failure = None;
    for _ in 0..100 {
        match write(cfd, b"are you there?") {
            Ok(_) => std::thread::sleep(std::time::Duration::from_millis(5)),
            Err(e) => {
                failure = Some(e.errno());
                break;
            }
        }
    }
    let errno = failure.expect("writes kept succeeding after the peer closed");
    assert!(errno == libc::EPIPE || errno == libc::ECONNRESET, "errno {}", errno);

    close(cfd).unwrap();
    close(lfd).unwrap();
}

#[test]
#[serial]
fn udp_request_reply() {
    init_logging();

    let server = socket(libc::AF_INET, libc::SOCK_DGRAM, 0).unwrap();
    bind(server, &loopback(0)).unwrap();
    nonblocking(server);
    let server_addr = getsockname(server).unwrap();

    let client = socket(libc::AF_INET, libc::SOCK_DGRAM, 0).unwrap();
    bind(client, &loopback(0)).unwrap();
    nonblocking(client);

    let mut buf = [0u8; 128];
    let mut from = SockAddr::empty();
    assert!(recvfrom(server, &mut buf, Some(&mut from)).unwrap().is_would_block());

    assert_eq!(sendto(client, b"ping", Some(&server_addr)).unwrap(), Outcome::Completed(4));
    wait_for(server, libc::POLLIN);
    let n = recvfrom(server, &mut buf, Some(&mut from)).unwrap().into_inner();
    assert_eq!(&buf[..n], b"ping");

    // reply to whoever asked
    assert_eq!(sendto(server, b"pong", Some(&from)).unwrap(), Outcome::Completed(4));
    wait_for(client, libc::POLLIN);
    let mut reply_from = SockAddr::empty();
    let n = recvfrom(client, &mut buf, Some(&mut reply_from)).unwrap().into_inner();
    assert_eq!(&buf[..n], b"pong");
    assert_eq!(reply_from.to_std(), server_addr.to_std());

    close(client).unwrap();
    close(server).unwrap();
}

#[test]
#[serial]
fn serve_a_file_with_sendfile() {
    use std::io::Write;
    use std::os::fd::AsRawFd;

    init_logging();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    let contents: Vec<u8> = (0..300_000u32).map(|i| (i * 7) as u8).collect();
    file.write_all(&contents).unwrap();
    file.flush().unwrap();
    let src = file.as_file().as_raw_fd();

    let [tx, rx] = socketpair(libc::AF_UNIX, libc::SOCK_STREAM, 0).unwrap();
    nonblocking(tx);
    nonblocking(rx);

    let reader = std::thread::spawn(move || read_exact(rx, 300_000));

    let mut offset = 0usize;
    while offset < contents.len() {
        match sendfile(src, tx, offset as libc::off_t, contents.len() - offset).unwrap() {
            Outcome::Completed(n) => offset += n,
            Outcome::WouldBlock(n) => {
                offset += n;
                wait_for(tx, libc::POLLOUT);
            }
        }
    }

    assert_eq!(reader.join().unwrap(), contents);
    close(tx).unwrap();
    close(rx).unwrap();
}

#[test]
#[serial]
fn error_converts_into_io_error() {
    init_logging();

    let fd = socket(libc::AF_INET, libc::SOCK_STREAM, 0).unwrap();
    let err: std::io::Error = getpeername(fd).unwrap_err().into();
    assert_eq!(err.raw_os_error(), Some(libc::ENOTCONN));
    assert_eq!(err.kind(), std::io::ErrorKind::NotConnected);
    close(fd).unwrap();
}
