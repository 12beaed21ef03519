use crate::config::Config;
use crate::device::RootNode;
use crate::engine::Engine;
use crate::udp::{self, Channel, Netif};
use crate::Error;
use std::net::UdpSocket;

/// The server side: two sockets and the engine behind them
///
/// An `Ssdp` listens on the shared multicast channel for searches from
/// the segment, and on a unicast channel of its own (an ephemeral port)
/// whose address peers learn from responses. Construct one, then call
/// [`Ssdp::poll`] from the application's cooperative loop; each call
/// drains at most one datagram per channel, so other subsystems sharing
/// the loop are never starved for long.
pub struct Ssdp {
    multicast: UdpSocket,
    unicast: UdpSocket,
    engine: Engine,
    netif: Netif,
    ssdp_port: u16,
    recv_buf: Vec<u8>,
}

impl Ssdp {
    /// Bind both channels with default tuning
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransportSetup`] if either socket cannot be
    /// bound or the multicast group cannot be joined.
    pub fn new(netif: Netif) -> Result<Self, Error> {
        Self::with_config(netif, Config::default())
    }

    /// Bind both channels
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransportSetup`] if either socket cannot be
    /// bound or the multicast group cannot be joined.
    pub fn with_config(netif: Netif, config: Config) -> Result<Self, Error> {
        let multicast =
            udp::open_multicast(config.multicast_group, config.ssdp_port)?;
        let unicast = udp::open_unicast(0)?;
        log::info!(
            "listening on multicast {}:{}, unicast port {}",
            config.multicast_group,
            config.ssdp_port,
            unicast.local_port().unwrap_or(0)
        );
        Ok(Self {
            multicast,
            unicast,
            engine: Engine::new(&config),
            netif,
            ssdp_port: config.ssdp_port,
            recv_buf: vec![0u8; config.packet_buffer_bytes],
        })
    }

    /// The ephemeral port of the unicast channel
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransportSetup`] if the socket address cannot be
    /// read back.
    pub fn local_port(&self) -> Result<u16, Error> {
        self.unicast.local_port()
    }

    /// The port of the multicast channel
    #[must_use]
    pub fn multicast_port(&self) -> u16 {
        self.ssdp_port
    }

    /// Run one server tick, answering from `root`
    ///
    /// Channels are drained in a fixed order, multicast first. The tree
    /// must not change while this call is in progress.
    pub fn poll(&mut self, root: &dyn RootNode) {
        if let Ok(Some((n, from))) = self.multicast.receive(&mut self.recv_buf)
        {
            self.engine.on_data(
                &self.recv_buf[..n],
                root,
                &self.netif,
                &self.unicast,
                from,
            );
        }
        if let Ok(Some((n, from))) = self.unicast.receive(&mut self.recv_buf) {
            self.engine.on_data(
                &self.recv_buf[..n],
                root,
                &self.netif,
                &self.unicast,
                from,
            );
        }
    }
}
