use std::io::{Read, Write};
use std::net::{SocketAddrV6, TcpStream, UdpSocket};
use std::time::Duration;

use tracing::debug;

use crate::error::{EndpointError, Result};
use crate::service::Service;

/// Socket option allowing traffic on the internal coprocessor interface.
#[cfg(target_vendor = "apple")]
const SO_INTCOPROC_ALLOW: libc::c_int = 0x1118;

/// Socket type for a coprocessor connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnType {
    Stream,
    Datagram,
}

impl ConnType {
    #[cfg(unix)]
    fn as_raw(self) -> libc::c_int {
        match self {
            ConnType::Stream => libc::SOCK_STREAM,
            ConnType::Datagram => libc::SOCK_DGRAM,
        }
    }
}

/// An unconnected IPv6 socket.
///
/// Obtained from [`Endpoint::init_socket`](crate::Endpoint::init_socket) so
/// callers can set options on the raw descriptor before connecting.
#[derive(Debug)]
pub struct Socket {
    #[cfg(unix)]
    fd: std::os::fd::OwnedFd,
    conn_type: ConnType,
}

#[cfg(unix)]
impl Socket {
    pub(crate) fn new(conn_type: ConnType) -> Result<Self> {
        use std::os::fd::FromRawFd;

        #[cfg(target_os = "linux")]
        let ty = conn_type.as_raw() | libc::SOCK_CLOEXEC;
        #[cfg(not(target_os = "linux"))]
        let ty = conn_type.as_raw();

        // SAFETY: plain syscall with constant arguments; the result is checked below.
        let raw = unsafe { libc::socket(libc::AF_INET6, ty, 0) };
        if raw < 0 {
            return Err(EndpointError::Socket(std::io::Error::last_os_error()));
        }
        // SAFETY: `raw` is a freshly created descriptor owned by nobody else.
        let fd = unsafe { std::os::fd::OwnedFd::from_raw_fd(raw) };
        let socket = Self { fd, conn_type };

        #[cfg(not(target_os = "linux"))]
        socket.set_cloexec()?;
        #[cfg(target_vendor = "apple")]
        socket.allow_coprocessor_interface();

        Ok(socket)
    }

    /// Socket type this socket was created with.
    pub fn conn_type(&self) -> ConnType {
        self.conn_type
    }

    #[cfg(not(target_os = "linux"))]
    fn set_cloexec(&self) -> Result<()> {
        use std::os::fd::AsRawFd;

        // SAFETY: `self.fd` is an open descriptor owned by this socket.
        let rc = unsafe { libc::fcntl(self.fd.as_raw_fd(), libc::F_SETFD, libc::FD_CLOEXEC) };
        if rc < 0 {
            return Err(EndpointError::Socket(std::io::Error::last_os_error()));
        }
        Ok(())
    }

    #[cfg(target_vendor = "apple")]
    fn allow_coprocessor_interface(&self) {
        use std::os::fd::AsRawFd;

        let on: libc::c_int = 1;
        // SAFETY: `on` is a valid c_int for the duration of the call and
        // `self.fd` is an open socket descriptor.
        let rc = unsafe {
            libc::setsockopt(
                self.fd.as_raw_fd(),
                libc::SOL_SOCKET,
                SO_INTCOPROC_ALLOW,
                (&on as *const libc::c_int).cast::<libc::c_void>(),
                std::mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };
        if rc != 0 {
            tracing::warn!(
                error = %std::io::Error::last_os_error(),
                "SO_INTCOPROC_ALLOW rejected; connections may be filtered"
            );
        }
    }

    /// Connect to `addr`, consuming the socket.
    ///
    /// On failure the socket is closed and the error carries the OS error
    /// code (see [`EndpointError::connect_errno`]).
    pub fn connect(self, addr: SocketAddrV6, service: Service) -> Result<Connection> {
        use std::os::fd::AsRawFd;

        let sa = sockaddr_in6(&addr);
        // SAFETY: `sa` is a fully initialised sockaddr_in6 and the length
        // passed matches its size; `self.fd` is an open socket descriptor.
        let rc = unsafe {
            libc::connect(
                self.fd.as_raw_fd(),
                (&sa as *const libc::sockaddr_in6).cast::<libc::sockaddr>(),
                std::mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t,
            )
        };
        if rc != 0 {
            return Err(EndpointError::Connect {
                service,
                addr,
                source: std::io::Error::last_os_error(),
            });
        }

        debug!(%service, %addr, "connected");
        let inner = match self.conn_type {
            ConnType::Stream => ConnectionInner::Stream(TcpStream::from(self.fd)),
            ConnType::Datagram => ConnectionInner::Datagram(UdpSocket::from(self.fd)),
        };
        Ok(Connection {
            inner,
            service,
            peer: addr,
        })
    }
}

#[cfg(unix)]
impl std::os::fd::AsFd for Socket {
    fn as_fd(&self) -> std::os::fd::BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

#[cfg(unix)]
impl std::os::fd::AsRawFd for Socket {
    fn as_raw_fd(&self) -> std::os::fd::RawFd {
        self.fd.as_raw_fd()
    }
}

#[cfg(unix)]
fn sockaddr_in6(addr: &SocketAddrV6) -> libc::sockaddr_in6 {
    // SAFETY: sockaddr_in6 is plain old data; all-zero is a valid value.
    let mut sa: libc::sockaddr_in6 = unsafe { std::mem::zeroed() };
    sa.sin6_family = libc::AF_INET6 as libc::sa_family_t;
    sa.sin6_port = addr.port().to_be();
    sa.sin6_flowinfo = addr.flowinfo();
    sa.sin6_addr.s6_addr = addr.ip().octets();
    sa.sin6_scope_id = addr.scope_id();
    #[cfg(target_vendor = "apple")]
    {
        sa.sin6_len = std::mem::size_of::<libc::sockaddr_in6>() as u8;
    }
    sa
}

#[cfg(not(unix))]
impl Socket {
    pub(crate) fn new(_conn_type: ConnType) -> Result<Self> {
        Err(EndpointError::Socket(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "coprocessor links require a unix host",
        )))
    }

    pub fn conn_type(&self) -> ConnType {
        self.conn_type
    }

    pub fn connect(self, addr: SocketAddrV6, service: Service) -> Result<Connection> {
        Err(EndpointError::Connect {
            service,
            addr,
            source: std::io::Error::from(std::io::ErrorKind::Unsupported),
        })
    }
}

/// A connected socket to one coprocessor service.
///
/// Owned by whoever opened it and closed when dropped, on every path. Not
/// cloneable: one connection carries one request/reply exchange at a time.
/// Framed message exchange expects [`ConnType::Stream`]; datagram
/// connections read and write whole datagrams.
pub struct Connection {
    inner: ConnectionInner,
    service: Service,
    peer: SocketAddrV6,
}

enum ConnectionInner {
    Stream(TcpStream),
    Datagram(UdpSocket),
}

impl Connection {
    /// Service this connection is bound to.
    pub fn service(&self) -> Service {
        self.service
    }

    /// Resolved address this connection was opened to.
    pub fn peer_addr(&self) -> SocketAddrV6 {
        self.peer
    }

    pub fn conn_type(&self) -> ConnType {
        match self.inner {
            ConnectionInner::Stream(_) => ConnType::Stream,
            ConnectionInner::Datagram(_) => ConnType::Datagram,
        }
    }

    /// Set read timeout on the underlying socket.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            ConnectionInner::Stream(s) => s.set_read_timeout(timeout).map_err(Into::into),
            ConnectionInner::Datagram(s) => s.set_read_timeout(timeout).map_err(Into::into),
        }
    }

    /// Set write timeout on the underlying socket.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            ConnectionInner::Stream(s) => s.set_write_timeout(timeout).map_err(Into::into),
            ConnectionInner::Datagram(s) => s.set_write_timeout(timeout).map_err(Into::into),
        }
    }

    /// Close the connection explicitly.
    pub fn close(self) {
        debug!(service = %self.service, "closing connection");
    }

    /// The stream socket, if this is a stream connection.
    pub fn as_tcp(&self) -> Option<&TcpStream> {
        match &self.inner {
            ConnectionInner::Stream(s) => Some(s),
            ConnectionInner::Datagram(_) => None,
        }
    }

    /// The datagram socket, if this is a datagram connection.
    pub fn as_udp(&self) -> Option<&UdpSocket> {
        match &self.inner {
            ConnectionInner::Stream(_) => None,
            ConnectionInner::Datagram(s) => Some(s),
        }
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            ConnectionInner::Stream(s) => s.read(buf),
            ConnectionInner::Datagram(s) => s.recv(buf),
        }
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            ConnectionInner::Stream(s) => s.write(buf),
            ConnectionInner::Datagram(s) => s.send(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            ConnectionInner::Stream(s) => s.flush(),
            ConnectionInner::Datagram(_) => Ok(()),
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("service", &self.service)
            .field("peer", &self.peer)
            .field("type", &self.conn_type())
            .finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::net::{Ipv6Addr, TcpListener};

    use super::*;

    fn loopback_listener() -> Option<TcpListener> {
        TcpListener::bind((Ipv6Addr::LOCALHOST, 0)).ok()
    }

    fn loopback_addr(port: u16) -> SocketAddrV6 {
        SocketAddrV6::new(Ipv6Addr::LOCALHOST, port, 0, 0)
    }

    #[test]
    fn stream_socket_connects_and_exchanges_bytes() {
        let Some(listener) = loopback_listener() else {
            return;
        };
        let port = listener.local_addr().unwrap().port();

        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 5];
            stream.read_exact(&mut buf).unwrap();
            stream.write_all(&buf).unwrap();
        });

        let socket = Socket::new(ConnType::Stream).unwrap();
        assert_eq!(socket.conn_type(), ConnType::Stream);
        let mut conn = socket.connect(loopback_addr(port), Service::Echo).unwrap();
        assert_eq!(conn.service(), Service::Echo);
        assert_eq!(conn.conn_type(), ConnType::Stream);
        assert!(conn.as_tcp().is_some());
        assert!(conn.as_udp().is_none());

        conn.write_all(b"hello").unwrap();
        let mut echoed = [0u8; 5];
        conn.read_exact(&mut echoed).unwrap();
        assert_eq!(&echoed, b"hello");

        server.join().unwrap();
        conn.close();
    }

    #[test]
    fn refused_connect_reports_errno() {
        let Some(listener) = loopback_listener() else {
            return;
        };
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let socket = Socket::new(ConnType::Stream).unwrap();
        let err = socket
            .connect(loopback_addr(port), Service::DeviceQuery)
            .unwrap_err();
        assert!(matches!(err, EndpointError::Connect { .. }));
        assert_eq!(err.connect_errno(), Some(libc::ECONNREFUSED));
    }

    #[test]
    fn datagram_socket_sends_whole_datagrams() {
        let Ok(peer) = UdpSocket::bind((Ipv6Addr::LOCALHOST, 0)) else {
            return;
        };
        let port = peer.local_addr().unwrap().port();

        let socket = Socket::new(ConnType::Datagram).unwrap();
        let mut conn = socket.connect(loopback_addr(port), Service::TimeSync).unwrap();
        assert_eq!(conn.conn_type(), ConnType::Datagram);
        conn.write_all(b"tick").unwrap();
        conn.flush().unwrap();

        let mut buf = [0u8; 16];
        let (n, _) = peer.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"tick");
    }

    #[test]
    fn timeouts_apply_to_connection() {
        let Some(listener) = loopback_listener() else {
            return;
        };
        let port = listener.local_addr().unwrap().port();
        let conn = Socket::new(ConnType::Stream)
            .unwrap()
            .connect(loopback_addr(port), Service::Echo)
            .unwrap();

        conn.set_read_timeout(Some(Duration::from_millis(10)))
            .unwrap();
        conn.set_write_timeout(Some(Duration::from_millis(10)))
            .unwrap();

        let mut conn = conn;
        let mut buf = [0u8; 1];
        let err = conn.read(&mut buf).unwrap_err();
        assert!(matches!(
            err.kind(),
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
        ));
    }
}
