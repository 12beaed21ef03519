use crate::config::Config;
use crate::device::{DeviceNode, RootNode, ServiceNode};
use crate::message::{self, SearchKind};
use crate::packet::Packet;
use crate::udp::{Channel, Netif};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// The search dispatcher at the core of the server side
///
/// The engine owns no sockets and no device tree: the embedder reads a
/// datagram, then hands it to [`Engine::on_data`] together with the tree
/// to answer from, the interface description, the channel to reply on,
/// and the requester's address. The engine classifies the request and,
/// when it deserves answering, emits every applicable response in
/// deterministic tree order before returning. Unrecognized or ungated
/// requests produce nothing.
///
/// One response buffer is allocated up front and reused for every
/// response; a response that does not fit is sent truncated after a
/// warning.
pub struct Engine {
    response_delay: Duration,
    max_children: usize,
    buffer: Vec<u8>,
}

impl Engine {
    /// Create an engine with the given tuning
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            response_delay: config.response_delay,
            max_children: usize::from(config.max_children),
            buffer: vec![0u8; config.packet_buffer_bytes],
        }
    }

    /// Process one inbound datagram, replying as required
    ///
    /// All responses go to `reply_to`, the source address of the
    /// datagram. The engine pauses briefly after each response so as not
    /// to overrun small receivers; the channel's
    /// [`pace`](Channel::pace) supplies the pause.
    pub fn on_data<SCK: Channel>(
        &mut self,
        buf: &[u8],
        root: &dyn RootNode,
        netif: &Netif,
        socket: &SCK,
        reply_to: SocketAddr,
    ) {
        let packet = Packet::new(buf);
        let Some(search) = message::classify(&packet) else {
            return;
        };
        let SocketAddr::V4(peer) = reply_to else {
            return;
        };
        let iface = netif.interface_of(*peer.ip());
        match search.kind {
            SearchKind::Root { all } => {
                if all {
                    self.post_all(root, search.st, iface, socket, reply_to);
                } else {
                    self.post_root_response(
                        root, search.st, iface, socket, reply_to,
                    );
                }
            }
            SearchKind::Uuid { uuid, all } => {
                self.post_uuid(
                    root, uuid, search.st, all, iface, socket, reply_to,
                );
            }
            SearchKind::Urn { urn } => {
                self.post_matching(root, urn, search.st, iface, socket, reply_to);
            }
        }
    }

    /// Respond for every node of the tree: root, root services, then
    /// each embedded device followed by its services.
    fn post_all<SCK: Channel>(
        &mut self,
        root: &dyn RootNode,
        st: &str,
        iface: Ipv4Addr,
        socket: &SCK,
        to: SocketAddr,
    ) {
        self.post_root_response(root, st, iface, socket, to);
        self.post_device_services(root, st, iface, socket, to);
        for i in 0..root.num_devices().min(self.max_children) {
            let device = root.device(i);
            self.post_embedded_response(
                device,
                root.uuid(),
                st,
                iface,
                socket,
                to,
            );
            self.post_device_services(device, st, iface, socket, to);
        }
    }

    fn post_uuid<SCK: Channel>(
        &mut self,
        root: &dyn RootNode,
        uuid: &str,
        st: &str,
        all: bool,
        iface: Ipv4Addr,
        socket: &SCK,
        to: SocketAddr,
    ) {
        if root.uuid() == uuid {
            if all {
                self.post_all(root, st, iface, socket, to);
            } else {
                self.post_root_response(root, st, iface, socket, to);
            }
            return;
        }
        for i in 0..root.num_devices().min(self.max_children) {
            let device = root.device(i);
            if device.uuid() == uuid {
                self.post_embedded_response(
                    device,
                    root.uuid(),
                    st,
                    iface,
                    socket,
                    to,
                );
                if all {
                    self.post_device_services(device, st, iface, socket, to);
                }
                return;
            }
        }
        log::debug!("device with uuid [{uuid}] does not exist");
    }

    /// Respond for every node whose type urn equals the target. The
    /// gate's expansion flag plays no part here.
    fn post_matching<SCK: Channel>(
        &mut self,
        root: &dyn RootNode,
        urn: &str,
        st: &str,
        iface: Ipv4Addr,
        socket: &SCK,
        to: SocketAddr,
    ) {
        log::trace!("searching the tree for type {urn}");
        if root.is_type(urn) {
            log::trace!("root {} matches, posting response", root.uuid());
            self.post_root_response(root, st, iface, socket, to);
        } else {
            log::trace!(
                "root type {} does not match",
                root.device_type()
            );
        }
        self.post_matching_services(root, urn, st, iface, socket, to);
        for i in 0..root.num_devices().min(self.max_children) {
            let device = root.device(i);
            if device.is_type(urn) {
                log::trace!(
                    "device {} matches, posting response",
                    device.uuid()
                );
                self.post_embedded_response(
                    device,
                    root.uuid(),
                    st,
                    iface,
                    socket,
                    to,
                );
            } else {
                log::trace!(
                    "device {} type {} does not match",
                    device.uuid(),
                    device.device_type()
                );
            }
            self.post_matching_services(device, urn, st, iface, socket, to);
        }
    }

    fn post_device_services<SCK: Channel, D: DeviceNode + ?Sized>(
        &mut self,
        device: &D,
        st: &str,
        iface: Ipv4Addr,
        socket: &SCK,
        to: SocketAddr,
    ) {
        for i in 0..device.num_services().min(self.max_children) {
            self.post_service_response(
                device.service(i),
                device.uuid(),
                st,
                iface,
                socket,
                to,
            );
        }
    }

    fn post_matching_services<SCK: Channel, D: DeviceNode + ?Sized>(
        &mut self,
        device: &D,
        urn: &str,
        st: &str,
        iface: Ipv4Addr,
        socket: &SCK,
        to: SocketAddr,
    ) {
        for i in 0..device.num_services().min(self.max_children) {
            let service = device.service(i);
            if service.is_type(urn) {
                log::trace!(
                    "service {} under {} matches, posting response",
                    service.service_type(),
                    device.uuid()
                );
                self.post_service_response(
                    service,
                    device.uuid(),
                    st,
                    iface,
                    socket,
                    to,
                );
            } else {
                log::trace!(
                    "service type {} does not match",
                    service.service_type()
                );
            }
        }
    }

    fn post_root_response<SCK: Channel>(
        &mut self,
        root: &dyn RootNode,
        st: &str,
        iface: Ipv4Addr,
        socket: &SCK,
        to: SocketAddr,
    ) {
        let location = root.root_location(iface);
        let n = message::build_root_response(
            &mut self.buffer,
            &location,
            st,
            root.uuid(),
            root.device_type(),
            root.display_name(),
            root.num_devices(),
            root.num_services(),
        );
        self.send(socket, to, n);
    }

    fn post_embedded_response<SCK: Channel>(
        &mut self,
        device: &dyn DeviceNode,
        parent_uuid: &str,
        st: &str,
        iface: Ipv4Addr,
        socket: &SCK,
        to: SocketAddr,
    ) {
        let location = device.location(iface);
        let n = message::build_device_response(
            &mut self.buffer,
            &location,
            st,
            device.uuid(),
            device.device_type(),
            device.display_name(),
            device.num_services(),
            parent_uuid,
        );
        self.send(socket, to, n);
    }

    fn post_service_response<SCK: Channel>(
        &mut self,
        service: &dyn ServiceNode,
        parent_uuid: &str,
        st: &str,
        iface: Ipv4Addr,
        socket: &SCK,
        to: SocketAddr,
    ) {
        let location = service.location(iface);
        let n = message::build_service_response(
            &mut self.buffer,
            &location,
            st,
            parent_uuid,
            service.service_type(),
            service.display_name(),
        );
        self.send(socket, to, n);
    }

    fn send<SCK: Channel>(&self, socket: &SCK, to: SocketAddr, len: usize) {
        if let Err(e) = socket.transmit(to, &self.buffer[..len]) {
            log::warn!("search response not sent: {e}");
        }
        socket.pace(self.response_delay);
    }
}
