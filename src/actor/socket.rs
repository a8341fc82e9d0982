//! UDP sockets multiplexed into the actor's poll loop, one per address family.

use std::io::ErrorKind;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use mio::net::UdpSocket;
use mio::{Interest, Registry, Token};
use socket2::{Domain, Protocol, Socket, Type};
use tracing::{trace, warn};

use crate::engine::{AddressFamily, Datagram, EngineSockets};
use crate::{Error, Result};

const MTU: usize = 4096;

pub(crate) const V4: Token = Token(0);
pub(crate) const V6: Token = Token(1);

/// Bind a non-blocking datagram socket for `family` on all interfaces.
///
/// IPv6 sockets are IPv6 only, so the two sockets never see the same traffic.
pub fn bind(family: AddressFamily, port: u16) -> Result<std::net::UdpSocket> {
    let (domain, address) = match family {
        AddressFamily::V4 => (
            Domain::IPV4,
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)),
        ),
        AddressFamily::V6 => (
            Domain::IPV6,
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, port)),
        ),
    };

    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|source| Error::SocketCreate { family, source })?;

    let bind_error = |source| Error::Bind { family, source };

    if family == AddressFamily::V6 {
        socket.set_only_v6(true).map_err(bind_error)?;
    }
    socket.set_nonblocking(true).map_err(bind_error)?;
    socket.bind(&address.into()).map_err(bind_error)?;

    Ok(socket.into())
}

#[derive(Debug)]
/// Owns the bound sockets and the receive buffer.
pub struct SocketMux {
    v4: Option<UdpSocket>,
    v6: Option<UdpSocket>,
    /// Send handles for the engine, taken once at initialization.
    engine_sockets: Option<EngineSockets>,
    registered: bool,
    buf: Box<[u8; MTU]>,
}

impl SocketMux {
    /// Bind the enabled families on `port`.
    pub fn bind(ipv4: bool, ipv6: bool, port: u16) -> Result<Self> {
        if !ipv4 && !ipv6 {
            return Err(Error::NoAddressFamily);
        }

        let mut engine_sockets = EngineSockets::default();

        let mut open = |family| -> Result<UdpSocket> {
            let socket = bind(family, port)?;
            let clone = socket
                .try_clone()
                .map_err(|source| Error::SocketCreate { family, source })?;

            match family {
                AddressFamily::V4 => engine_sockets.v4 = Some(clone),
                AddressFamily::V6 => engine_sockets.v6 = Some(clone),
            }

            Ok(UdpSocket::from_std(socket))
        };

        let v4 = if ipv4 {
            Some(open(AddressFamily::V4)?)
        } else {
            None
        };
        let v6 = if ipv6 {
            Some(open(AddressFamily::V6)?)
        } else {
            None
        };

        Ok(SocketMux {
            v4,
            v6,
            engine_sockets: Some(engine_sockets),
            registered: false,
            buf: Box::new([0; MTU]),
        })
    }

    // === Getters ===

    pub fn local_addr(&self, family: AddressFamily) -> Option<SocketAddr> {
        self.socket(family).and_then(|s| s.local_addr().ok())
    }

    pub fn is_bound(&self, family: AddressFamily) -> bool {
        self.socket(family).is_some()
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    pub(crate) fn family(token: Token) -> Option<AddressFamily> {
        match token {
            V4 => Some(AddressFamily::V4),
            V6 => Some(AddressFamily::V6),
            _ => None,
        }
    }

    // === Public Methods ===

    /// Send handles for the engine. Returns `None` after the first call.
    pub fn take_engine_sockets(&mut self) -> Option<EngineSockets> {
        self.engine_sockets.take()
    }

    /// Register every bound socket for read readiness.
    pub fn register(&mut self, registry: &Registry) -> std::io::Result<()> {
        if self.registered {
            return Ok(());
        }

        if let Some(socket) = self.v4.as_mut() {
            registry.register(socket, V4, Interest::READABLE)?;
        }
        if let Some(socket) = self.v6.as_mut() {
            registry.register(socket, V6, Interest::READABLE)?;
        }

        self.registered = true;
        Ok(())
    }

    pub fn deregister(&mut self, registry: &Registry) {
        if !self.registered {
            return;
        }

        for socket in [self.v4.as_mut(), self.v6.as_mut()].into_iter().flatten() {
            if let Err(error) = registry.deregister(socket) {
                warn!(?error, "Failed to deregister socket");
            }
        }

        self.registered = false;
    }

    /// Perform exactly one non-blocking read on the socket of `family`.
    ///
    /// Returns `Ok(None)` if nothing is queued or the family isn't bound. An
    /// `Err` leaves it unknown whether more datagrams are queued.
    pub fn receive(&mut self, family: AddressFamily) -> std::io::Result<Option<Datagram<'_>>> {
        let socket = match family {
            AddressFamily::V4 => self.v4.as_ref(),
            AddressFamily::V6 => self.v6.as_ref(),
        };
        let Some(socket) = socket else {
            return Ok(None);
        };

        match socket.recv_from(&mut self.buf[..]) {
            Ok((amt, from)) => {
                trace!(context = "socket_receiving", %family, ?from, amt);

                Ok(Some(Datagram {
                    bytes: &self.buf[..amt],
                    from,
                }))
            }
            Err(error) if error.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(error) => {
                if error.kind() != ErrorKind::Interrupted {
                    warn!(%family, "IO error {error}");
                }
                Err(error)
            }
        }
    }

    /// Close both sockets.
    pub fn close(&mut self) {
        self.v4 = None;
        self.v6 = None;
        self.engine_sockets = None;
    }

    // === Private Methods ===

    fn socket(&self, family: AddressFamily) -> Option<&UdpSocket> {
        match family {
            AddressFamily::V4 => self.v4.as_ref(),
            AddressFamily::V6 => self.v6.as_ref(),
        }
    }
}

#[cfg(test)]
mod test {
    use std::net::SocketAddrV4;
    use std::time::{Duration, Instant};

    use super::*;

    fn loopback(mux: &SocketMux) -> SocketAddrV4 {
        SocketAddrV4::new(
            Ipv4Addr::LOCALHOST,
            mux.local_addr(AddressFamily::V4).unwrap().port(),
        )
    }

    fn receive_within(mux: &mut SocketMux, timeout: Duration) -> Option<(Vec<u8>, SocketAddr)> {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if let Some(datagram) = mux.receive(AddressFamily::V4).unwrap() {
                return Some((datagram.bytes.to_vec(), datagram.from));
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        None
    }

    #[test]
    fn empty_receive() {
        let mut mux = SocketMux::bind(true, false, 0).unwrap();

        assert!(mux.receive(AddressFamily::V4).unwrap().is_none());
        assert!(mux.receive(AddressFamily::V6).unwrap().is_none());
    }

    #[test]
    fn receive_one_datagram_per_call() {
        let mut mux = SocketMux::bind(true, false, 0).unwrap();
        let address = loopback(&mux);

        let client = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        client.send_to(b"first", address).unwrap();
        client.send_to(b"second", address).unwrap();

        let (bytes, from) = receive_within(&mut mux, Duration::from_secs(1)).unwrap();
        assert_eq!(bytes, b"first");
        assert_eq!(from, client.local_addr().unwrap());

        let (bytes, _) = receive_within(&mut mux, Duration::from_secs(1)).unwrap();
        assert_eq!(bytes, b"second");

        assert!(mux.receive(AddressFamily::V4).unwrap().is_none());
    }

    #[test]
    fn engine_sockets_send_from_the_bound_port() {
        let mut mux = SocketMux::bind(true, false, 0).unwrap();
        let bound_port = loopback(&mux).port();

        let sockets = mux.take_engine_sockets().unwrap();
        assert!(sockets.v6.is_none());
        assert!(mux.take_engine_sockets().is_none());

        let peer = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        sockets
            .v4
            .unwrap()
            .send_to(b"ping", peer.local_addr().unwrap())
            .unwrap();

        let mut buf = [0; 16];
        peer.set_read_timeout(Some(Duration::from_secs(1))).unwrap();
        let (amt, from) = peer.recv_from(&mut buf).unwrap();

        assert_eq!(&buf[..amt], b"ping");
        assert_eq!(from.port(), bound_port);
    }

    #[test]
    fn no_family_enabled() {
        assert!(matches!(
            SocketMux::bind(false, false, 0),
            Err(Error::NoAddressFamily)
        ));
    }

    #[test]
    fn bind_conflict_is_reported() {
        let first = SocketMux::bind(true, false, 0).unwrap();
        let port = first.local_addr(AddressFamily::V4).unwrap().port();

        assert!(matches!(
            SocketMux::bind(true, false, port),
            Err(Error::Bind {
                family: AddressFamily::V4,
                ..
            })
        ));
    }

    #[test]
    fn ipv6_socket_is_v6_only() {
        // Hosts without IPv6 can't run this.
        let Ok(socket) = bind(AddressFamily::V6, 0) else {
            return;
        };

        let socket: Socket = socket.into();
        assert!(socket.only_v6().unwrap());
    }

    #[test]
    fn register_and_deregister() {
        let poll = mio::Poll::new().unwrap();
        let mut mux = SocketMux::bind(true, false, 0).unwrap();

        mux.register(poll.registry()).unwrap();
        assert!(mux.is_registered());

        mux.deregister(poll.registry());
        assert!(!mux.is_registered());
    }
}
