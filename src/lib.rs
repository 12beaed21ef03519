//! Implementing a quiet, query-only variant of SSDP
//!
//! The terse-ssdp crate lets small networked nodes advertise a shallow
//! hierarchy of logical devices and services on a local IP segment, and
//! lets peers locate those entities by multicast query. It deliberately
//! implements only a subset of SSDP (the Simple Service Discovery
//! Protocol), with these goals:
//!
//!  1. Reduce the chattiness of standard UPnP/SSDP by responding only to
//!     recognized search requests -- there are no arrival or departure
//!     announcements, and unrecognized queries are ignored outright.
//!  2. Provide enough information in each response to populate a device
//!     hierarchy of the environment.
//!  3. Allow a peer to check whether a root device is still on the network.
//!  4. Find every instance of a specific device or service type.
//!
//! Search requests go out over the multicast address 239.255.255.250 port
//! 1900; responses return over unicast to the address and port of the
//! requester. A search request must carry the vendor gate header
//! ([`GATE_HEADER`]) to elicit any response at all -- requests without it
//! are dropped without reply, which is what keeps the protocol quiet on
//! segments full of general-purpose UPnP traffic.
//!
//! Each response describes one node of the hierarchy: its `LOCATION` URL
//! (host part chosen to match the requester's subnet), the echoed `ST`,
//! a `USN` of the form `uuid:<device-uuid>::<type-urn>`, and a
//! [`DESC_HEADER`] field whose colon-keyed value distinguishes roots,
//! embedded devices, and services (see [`desc`]).
//!
//! The server side is driven from a cooperative loop: construct an
//! [`Ssdp`], then call [`Ssdp::poll`] from your main loop as often as you
//! like. The client side is a blocking call, [`search_request`], which
//! multicasts one query and hands matching responses to a closure until a
//! time budget expires. Code with its own socket handling can instead
//! drive [`engine::Engine`] directly.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

use std::net::Ipv4Addr;
use thiserror::Error;

/// The SSDP multicast group searched and listened on.
pub const SSDP_MULTICAST: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);

/// The SSDP UDP port.
pub const SSDP_PORT: u16 = 1900;

/// The vendor-namespaced search gate header.
///
/// Inbound searches must carry this header (empty or `ssdp:all`) to be
/// answered. The vendor suffix is part of the wire contract with peer
/// implementations; changing it breaks interop.
pub const GATE_HEADER: &str = "ST.LEELANAUSOFTWARE.COM";

/// The vendor-namespaced description header carried in every response.
///
/// Its value is a colon-keyed bag, e.g.
/// `:name:Thermostat:devices:2:services:1:`. See [`desc::DescField`].
pub const DESC_HEADER: &str = "DESC.LEELANAUSOFTWARE.COM";

/// The errors which can be returned from the query client and transport
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// A socket could not be created, configured, or bound
    #[error("transport setup failed: {0}")]
    TransportSetup(#[source] std::io::Error),

    /// A datagram could not be sent
    #[error("transport send failed: {0}")]
    TransportSend(#[source] std::io::Error),

    /// A search was requested with an unrecognizable search target
    ///
    /// Valid targets are `upnp:rootdevice`, `uuid:<device-uuid>`, and
    /// `urn:<domain>:device:<type>:<ver>` (or `...:service:...`).
    #[error("search target must be upnp:rootdevice, uuid:..., or urn:...")]
    InvalidSearchTarget,
}

/// Configuration options for the engine, server loop, and query client
pub mod config;

/// Parsing the `DESC` compound header value
pub mod desc;

/// Traits through which the engine reads the externally-owned device tree
pub mod device;

/// The search dispatcher at the core of the server side
pub mod engine;

mod message;

/// Zero-copy parsing of one received datagram
pub mod packet;

mod search;

mod service;

/// Traits and helpers abstracting over UDP sockets and local interfaces
pub mod udp;

pub use config::Config;
pub use packet::Packet;
pub use search::{search_request, search_request_with};
pub use service::Ssdp;
pub use udp::Netif;
