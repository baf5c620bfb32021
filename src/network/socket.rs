//! TCP transport over raw socket calls
//!
//! - `send()` for the flat two-copy buffer
//! - `sendmsg()` with an iovec per field for the gathered paths
//! - `recvmsg(MSG_ERRQUEUE)` for zero-copy completions (Linux)

use std::io::{self, IoSlice};
use std::net::{SocketAddr, TcpStream};
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::Duration;

use super::transport::{Completion, SendMode, Transport};

#[cfg(target_os = "linux")]
const SEND_FLAGS: libc::c_int = libc::MSG_NOSIGNAL;
#[cfg(not(target_os = "linux"))]
const SEND_FLAGS: libc::c_int = 0;

/// Blocking TCP stream dengan raw send paths untuk semua strategy.
pub struct TcpTransport {
    stream: TcpStream,
    zerocopy: bool,
}

impl TcpTransport {
    pub fn new(stream: TcpStream) -> io::Result<Self> {
        stream.set_nonblocking(false)?;
        // Disable Nagle untuk low latency; message langsung dikirim
        stream.set_nodelay(true)?;

        Ok(Self {
            stream,
            zerocopy: false,
        })
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.stream.peer_addr()
    }

    pub fn zerocopy_enabled(&self) -> bool {
        self.zerocopy
    }

    #[inline(always)]
    fn fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }
}

#[cfg(target_os = "linux")]
#[inline(always)]
fn zerocopy_flag(mode: SendMode, enabled: bool) -> libc::c_int {
    if mode == SendMode::ZeroCopy && enabled {
        libc::MSG_ZEROCOPY
    } else {
        0
    }
}

#[cfg(not(target_os = "linux"))]
#[inline(always)]
fn zerocopy_flag(_mode: SendMode, _enabled: bool) -> libc::c_int {
    0
}

#[inline(always)]
fn cvt(ret: isize) -> io::Result<usize> {
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret as usize)
    }
}

impl Transport for TcpTransport {
    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        // SAFETY: pointer and length come from a live slice
        let ret = unsafe {
            libc::send(
                self.fd(),
                buf.as_ptr() as *const libc::c_void,
                buf.len(),
                SEND_FLAGS,
            )
        };
        cvt(ret)
    }

    fn send_vectored(&mut self, bufs: &[IoSlice<'_>], mode: SendMode) -> io::Result<usize> {
        // SAFETY: an all-zero msghdr is a valid "no address, no control" header
        let mut hdr: libc::msghdr = unsafe { std::mem::zeroed() };
        // IoSlice is guaranteed ABI compatible with iovec on unix
        hdr.msg_iov = bufs.as_ptr() as *mut libc::iovec;
        hdr.msg_iovlen = bufs.len() as _;

        let flags = SEND_FLAGS | zerocopy_flag(mode, self.zerocopy);

        // SAFETY: hdr only references `bufs`, which outlives the call
        let ret = unsafe { libc::sendmsg(self.fd(), &hdr, flags) };
        cvt(ret)
    }

    #[cfg(target_os = "linux")]
    fn enable_zerocopy(&mut self) -> io::Result<()> {
        let one: libc::c_int = 1;
        // SAFETY: optval points at a c_int of the advertised size
        let ret = unsafe {
            libc::setsockopt(
                self.fd(),
                libc::SOL_SOCKET,
                libc::SO_ZEROCOPY,
                &one as *const _ as *const libc::c_void,
                std::mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        self.zerocopy = true;
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    fn enable_zerocopy(&mut self) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "MSG_ZEROCOPY is Linux only",
        ))
    }

    #[cfg(target_os = "linux")]
    fn recv_completion(&mut self) -> io::Result<Option<Completion>> {
        errqueue::recv_completion(self.fd())
    }

    #[cfg(not(target_os = "linux"))]
    fn recv_completion(&mut self) -> io::Result<Option<Completion>> {
        Ok(None)
    }

    fn wait_completion(&mut self, timeout: Duration) -> io::Result<bool> {
        let mut pfd = libc::pollfd {
            fd: self.fd(),
            events: libc::POLLERR,
            revents: 0,
        };
        let millis = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;

        // SAFETY: single valid pollfd
        let ret = unsafe { libc::poll(&mut pfd, 1, millis) };
        if ret < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(false);
            }
            return Err(err);
        }
        Ok(ret > 0 && pfd.revents & libc::POLLERR != 0)
    }
}

#[cfg(target_os = "linux")]
mod errqueue {
    use std::io;
    use std::mem;

    use super::Completion;

    /// `struct sock_extended_err` from linux/errqueue.h
    #[repr(C)]
    #[derive(Clone, Copy)]
    #[allow(dead_code)]
    struct SockExtendedErr {
        ee_errno: u32,
        ee_origin: u8,
        ee_type: u8,
        ee_code: u8,
        ee_pad: u8,
        ee_info: u32,
        ee_data: u32,
    }

    const SO_EE_ORIGIN_ZEROCOPY: u8 = 5;
    const SO_EE_CODE_ZEROCOPY_COPIED: u8 = 1;

    /// Pop notifications off the error queue until a zero-copy one shows up
    /// or the queue is empty.
    pub(super) fn recv_completion(fd: libc::c_int) -> io::Result<Option<Completion>> {
        loop {
            // u64 backing keeps the control buffer aligned for cmsghdr
            let mut control = [0u64; 16];
            // SAFETY: zeroed msghdr is valid; we only set the control buffer
            let mut hdr: libc::msghdr = unsafe { mem::zeroed() };
            hdr.msg_control = control.as_mut_ptr() as *mut libc::c_void;
            hdr.msg_controllen = mem::size_of_val(&control) as _;

            // SAFETY: hdr points at `control`, live for the call
            let ret = unsafe { libc::recvmsg(fd, &mut hdr, libc::MSG_ERRQUEUE | libc::MSG_DONTWAIT) };
            if ret < 0 {
                let err = io::Error::last_os_error();
                return match err.kind() {
                    io::ErrorKind::WouldBlock => Ok(None),
                    io::ErrorKind::Interrupted => continue,
                    _ => Err(err),
                };
            }

            if let Some(completion) = parse_control(&hdr) {
                return Ok(Some(completion));
            }
            // Bukan zero-copy notification (misal ICMP); skip
        }
    }

    fn parse_control(hdr: &libc::msghdr) -> Option<Completion> {
        // SAFETY: hdr was filled by recvmsg; CMSG_* walk stays inside
        // msg_control/msg_controllen
        unsafe {
            let mut cmsg = libc::CMSG_FIRSTHDR(hdr);
            while !cmsg.is_null() {
                let level = (*cmsg).cmsg_level;
                let kind = (*cmsg).cmsg_type;
                let is_recverr = (level == libc::SOL_IP && kind == libc::IP_RECVERR)
                    || (level == libc::SOL_IPV6 && kind == libc::IPV6_RECVERR);

                if is_recverr {
                    let ee = std::ptr::read_unaligned(libc::CMSG_DATA(cmsg) as *const SockExtendedErr);
                    if ee.ee_errno == 0 && ee.ee_origin == SO_EE_ORIGIN_ZEROCOPY {
                        return Some(Completion {
                            lo: ee.ee_info,
                            hi: ee.ee_data,
                            copied: ee.ee_code & SO_EE_CODE_ZEROCOPY_COPIED != 0,
                        });
                    }
                }
                cmsg = libc::CMSG_NXTHDR(hdr, cmsg);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;
    use std::thread;

    fn pair() -> (TcpTransport, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = thread::spawn(move || TcpStream::connect(addr).unwrap());
        let (server, _) = listener.accept().unwrap();
        (TcpTransport::new(server).unwrap(), client.join().unwrap())
    }

    #[test]
    fn test_plain_and_gathered_sends_reach_peer() {
        let (mut transport, mut peer) = pair();

        assert_eq!(transport.send(b"flat|").unwrap(), 5);
        let parts = [IoSlice::new(b"ab"), IoSlice::new(b"cd"), IoSlice::new(b"ef")];
        assert_eq!(transport.send_vectored(&parts, SendMode::Copy).unwrap(), 6);
        drop(transport);

        let mut got = Vec::new();
        peer.read_to_end(&mut got).unwrap();
        assert_eq!(got, b"flat|abcdef");
    }

    #[test]
    fn test_empty_error_queue_reads_as_none() {
        let (mut transport, _peer) = pair();
        assert_eq!(transport.recv_completion().unwrap(), None);
        assert!(!transport.wait_completion(Duration::from_millis(10)).unwrap());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_zerocopy_send_is_acknowledged() {
        let (mut transport, mut peer) = pair();
        if transport.enable_zerocopy().is_err() {
            // Kernel without SO_ZEROCOPY; nothing to check
            return;
        }
        assert!(transport.zerocopy_enabled());

        let payload = vec![b'Z'; 4096];
        let parts = [IoSlice::new(&payload)];
        assert_eq!(
            transport.send_vectored(&parts, SendMode::ZeroCopy).unwrap(),
            4096
        );

        let mut got = vec![0u8; 4096];
        peer.read_exact(&mut got).unwrap();
        assert_eq!(got, payload);

        let mut completion = None;
        for _ in 0..50 {
            if let Some(c) = transport.recv_completion().unwrap() {
                completion = Some(c);
                break;
            }
            transport.wait_completion(Duration::from_millis(20)).unwrap();
        }
        let completion = completion.expect("no zero-copy completion");
        assert_eq!(completion.lo, 0);
        assert_eq!(completion.hi, 0);
    }
}
