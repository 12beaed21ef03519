use crate::Error;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::time::Duration;

/// The transport capability set the engine and query client rely on
///
/// One implementor wraps one UDP socket. The blanket implementation for
/// [`std::net::UdpSocket`] expects the socket to be non-blocking (the
/// `open_*` helpers arrange that); tests substitute in-memory fakes.
pub trait Channel {
    /// Send one datagram
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransportSend`] if the underlying send fails.
    fn transmit(&self, to: SocketAddr, buf: &[u8]) -> Result<(), Error>;

    /// Receive one pending datagram, without blocking
    ///
    /// `Ok(None)` means no datagram is waiting.
    ///
    /// # Errors
    ///
    /// Implementations may surface receive failures; the std
    /// implementation swallows them, since a dropped datagram and a
    /// failed receive are indistinguishable to this protocol.
    fn receive(
        &self,
        buf: &mut [u8],
    ) -> Result<Option<(usize, SocketAddr)>, Error>;

    /// The local port this channel is bound to
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransportSetup`] if the socket address cannot be
    /// read back.
    fn local_port(&self) -> Result<u16, Error>;

    /// Yield cooperatively between datagrams
    ///
    /// Called by the dispatcher after each response and by the query
    /// client between receive polls. The default sleeps the thread;
    /// fakes override it to advance a mock clock instead.
    fn pace(&self, interval: Duration) {
        std::thread::sleep(interval);
    }
}

impl Channel for UdpSocket {
    fn transmit(&self, to: SocketAddr, buf: &[u8]) -> Result<(), Error> {
        self.send_to(buf, to).map_err(Error::TransportSend)?;
        Ok(())
    }

    fn receive(
        &self,
        buf: &mut [u8],
    ) -> Result<Option<(usize, SocketAddr)>, Error> {
        match self.recv_from(buf) {
            Ok((n, from)) => Ok(Some((n, from))),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => {
                // e.g. ICMP port-unreachable surfacing on Linux
                log::debug!("receive error ignored: {e}");
                Ok(None)
            }
        }
    }

    fn local_port(&self) -> Result<u16, Error> {
        Ok(self.local_addr().map_err(Error::TransportSetup)?.port())
    }
}

/// The two local interfaces a node may have, and how to choose between
/// them
///
/// A node has an infrastructure interface and, optionally, a soft-AP
/// interface. Response LOCATION URLs must name the interface on whose
/// subnet the requester lies; [`Netif::interface_of`] makes that choice,
/// preferring the infrastructure interface when both subnets match.
#[derive(Debug, Clone, Copy)]
pub struct Netif {
    local_ip: Ipv4Addr,
    soft_ap_ip: Option<Ipv4Addr>,
    subnet_mask: Ipv4Addr,
}

impl Netif {
    /// Describe a node with only an infrastructure interface
    #[must_use]
    pub fn new(local_ip: Ipv4Addr, subnet_mask: Ipv4Addr) -> Self {
        Self {
            local_ip,
            soft_ap_ip: None,
            subnet_mask,
        }
    }

    /// Add a soft-AP interface
    #[must_use]
    pub fn with_soft_ap(mut self, soft_ap_ip: Ipv4Addr) -> Self {
        self.soft_ap_ip = Some(soft_ap_ip);
        self
    }

    /// The infrastructure interface address
    #[must_use]
    pub fn local_ip(&self) -> Ipv4Addr {
        self.local_ip
    }

    /// The soft-AP interface address, if the node has one
    #[must_use]
    pub fn soft_ap_ip(&self) -> Option<Ipv4Addr> {
        self.soft_ap_ip
    }

    /// The subnet mask shared by both interfaces
    #[must_use]
    pub fn subnet_mask(&self) -> Ipv4Addr {
        self.subnet_mask
    }

    /// Is `addr` on the infrastructure interface's subnet?
    #[must_use]
    pub fn is_local(&self, addr: Ipv4Addr) -> bool {
        same_subnet(self.subnet_mask, self.local_ip, addr)
    }

    /// Is `addr` on the soft-AP interface's subnet?
    #[must_use]
    pub fn is_soft_ap(&self, addr: Ipv4Addr) -> bool {
        self.soft_ap_ip
            .is_some_and(|ip| same_subnet(self.subnet_mask, ip, addr))
    }

    /// The interface address to advertise to a peer at `addr`
    ///
    /// The infrastructure interface is checked first; the ordering is
    /// part of the contract for hosts whose subnets overlap. Returns
    /// `0.0.0.0` when neither subnet matches.
    #[must_use]
    pub fn interface_of(&self, addr: Ipv4Addr) -> Ipv4Addr {
        if self.is_local(addr) {
            self.local_ip
        } else if self.is_soft_ap(addr) {
            self.soft_ap_ip.unwrap_or(Ipv4Addr::UNSPECIFIED)
        } else {
            Ipv4Addr::UNSPECIFIED
        }
    }
}

fn same_subnet(mask: Ipv4Addr, a: Ipv4Addr, b: Ipv4Addr) -> bool {
    u32::from(a) & u32::from(mask) == u32::from(b) & u32::from(mask)
}

type NewSocketFn = fn() -> std::io::Result<socket2::Socket>;
type SockoptFn = fn(&socket2::Socket, bool) -> std::io::Result<()>;
type BindFn = fn(&socket2::Socket, SocketAddrV4) -> std::io::Result<()>;

fn setup_socket_inner(
    addr: SocketAddrV4,
    new_socket: NewSocketFn,
    nonblocking: SockoptFn,
    reuse_address: SockoptFn,
    bind: BindFn,
) -> std::io::Result<UdpSocket> {
    let socket = new_socket()?;
    nonblocking(&socket, true)?;
    reuse_address(&socket, true)?;
    bind(&socket, addr)?;
    Ok(socket.into())
}

fn setup_socket(addr: SocketAddrV4) -> Result<UdpSocket, Error> {
    setup_socket_inner(
        addr,
        || {
            socket2::Socket::new(
                socket2::Domain::IPV4,
                socket2::Type::DGRAM,
                None,
            )
        },
        socket2::Socket::set_nonblocking,
        socket2::Socket::set_reuse_address,
        |s, a| s.bind(&socket2::SockAddr::from(a)),
    )
    .map_err(Error::TransportSetup)
}

/// Open the shared multicast listening socket
///
/// # Errors
///
/// Returns [`Error::TransportSetup`] if the socket cannot be created,
/// bound, or joined to the group.
pub fn open_multicast(
    group: Ipv4Addr,
    port: u16,
) -> Result<UdpSocket, Error> {
    let socket =
        setup_socket(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port))?;
    socket
        .join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)
        .map_err(Error::TransportSetup)?;
    Ok(socket)
}

/// Open a unicast socket on all interfaces; port 0 picks an ephemeral
/// port
///
/// # Errors
///
/// Returns [`Error::TransportSetup`] if the socket cannot be created or
/// bound.
pub fn open_unicast(port: u16) -> Result<UdpSocket, Error> {
    setup_socket(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port))
}

/// Open an ephemeral socket bound to one interface, for issuing a search
///
/// # Errors
///
/// Returns [`Error::TransportSetup`] if the socket cannot be created or
/// bound.
pub fn open_search_socket(iface: Ipv4Addr) -> Result<UdpSocket, Error> {
    setup_socket(SocketAddrV4::new(iface, 0))
}
