use crate::{SSDP_MULTICAST, SSDP_PORT};
use std::net::Ipv4Addr;
use std::time::Duration;

/// Tunable options shared by the engine, server loop, and query client
///
/// The defaults match the protocol as deployed; most embedders only ever
/// use [`Config::default`]. The multicast group and port can be changed
/// for testing on a segment where real SSDP traffic would interfere.
#[derive(Debug, Clone)]
pub struct Config {
    /// Multicast group searched and listened on
    pub multicast_group: Ipv4Addr,

    /// UDP port of the multicast channel
    pub ssdp_port: u16,

    /// Pause between successive response datagrams
    ///
    /// Small receivers drop packets when replies arrive back-to-back, so
    /// the dispatcher yields for this long after each send.
    pub response_delay: Duration,

    /// Pause between receive polls in the query client
    pub query_poll_interval: Duration,

    /// Response window used by [`search_request`](crate::search_request)
    /// when the caller does not supply one
    pub default_query_timeout: Duration,

    /// Most embedded devices or services one node may own
    ///
    /// The dispatcher never walks more children than this, even if a tree
    /// implementation reports a larger count.
    pub max_children: u8,

    /// Size of the reusable packet and response buffers
    ///
    /// Must hold one full datagram; responses that do not fit are
    /// truncated.
    pub packet_buffer_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            multicast_group: SSDP_MULTICAST,
            ssdp_port: SSDP_PORT,
            response_delay: Duration::from_millis(500),
            query_poll_interval: Duration::from_millis(100),
            default_query_timeout: Duration::from_millis(2000),
            max_children: 8,
            packet_buffer_bytes: 1536,
        }
    }
}
