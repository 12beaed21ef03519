use crate::packet::Packet;
use crate::{DESC_HEADER, GATE_HEADER};
use std::io::{Cursor, Write};
use std::net::Ipv4Addr;

pub const ST_ROOT_DEVICE: &str = "upnp:rootdevice";
pub const ST_UUID_PREFIX: &str = "uuid:";
pub const ST_URN_PREFIX: &str = "urn:";
const SSDP_ALL: &str = "ssdp:all";

/// A classified inbound search request.
#[derive(Debug)]
pub struct Search<'a> {
    /// The untouched ST value from the request, echoed into every
    /// response regardless of which node matched.
    pub st: &'a str,
    pub kind: SearchKind<'a>,
}

#[derive(Debug)]
pub enum SearchKind<'a> {
    Root { all: bool },
    Uuid { uuid: &'a str, all: bool },
    Urn { urn: &'a str },
}

/// Decide whether an inbound datagram deserves any response.
///
/// `None` means silent drop: not a search request, gate header absent,
/// ST header absent, or ST of no recognized shape. The gate value
/// expands the response set when it begins with `ssdp:all` (a prefix
/// test, matching deployed peers that append trailing text).
pub fn classify<'a>(packet: &Packet<'a>) -> Option<Search<'a>> {
    if !packet.is_search_request() {
        return None;
    }
    let gate = packet.header_value(GATE_HEADER)?;
    let Some(st) = packet.header_value("ST") else {
        log::debug!("search request has no ST header");
        return None;
    };
    let all = gate.starts_with(SSDP_ALL);
    let kind = if st.starts_with(ST_ROOT_DEVICE) {
        SearchKind::Root { all }
    } else if let Some(uuid) = st.strip_prefix(ST_UUID_PREFIX) {
        SearchKind::Uuid {
            uuid: uuid.trim_start_matches(' '),
            all,
        }
    } else if st.starts_with(ST_URN_PREFIX) {
        SearchKind::Urn { urn: st }
    } else {
        return None;
    };
    Some(Search { st, kind })
}

/// Format an M-SEARCH request.
///
/// A root search is gated wide open (`ssdp:all`) or narrow (empty gate)
/// according to `all`; uuid and urn searches always carry `ssdp:all`,
/// since the expansion decision belongs to the responder's tree walk.
#[allow(clippy::cast_possible_truncation)]
pub fn build_search(
    buf: &mut [u8],
    st: &str,
    all: bool,
    group: Ipv4Addr,
    port: u16,
) -> usize {
    let gate = if all || st != ST_ROOT_DEVICE {
        SSDP_ALL
    } else {
        ""
    };
    let mut cursor = Cursor::new(buf);
    let r = write!(
        cursor,
        "M-SEARCH * HTTP/1.1\r
HOST: {group}:{port}\r
MAN: ssdp:discover\r
ST: {st}\r
{GATE_HEADER}: {gate}\r
USER-AGENT: UPnP/1.1 {}/{}\r
\r\n",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
    );
    if r.is_err() {
        log::warn!("M-SEARCH for {st} truncated");
    }
    cursor.position() as usize
}

/// Format a root-device response.
///
/// The status line carries a trailing space before its CRLF; some peer
/// implementations are sensitive to it, so it is part of the template.
#[allow(clippy::cast_possible_truncation)]
pub fn build_root_response(
    buf: &mut [u8],
    location: &str,
    st: &str,
    uuid: &str,
    urn: &str,
    name: &str,
    num_devices: usize,
    num_services: usize,
) -> usize {
    let mut cursor = Cursor::new(buf);
    let r = write!(
        cursor,
        "HTTP/1.1 200 OK \r
CACHE-CONTROL: max-age = 1800 \r
LOCATION: {location}\r
ST: {st}\r
USN: uuid:{uuid}::{urn}\r
{DESC_HEADER}: :name:{name}:devices:{num_devices}:services:{num_services}:\r
\r\n",
    );
    if r.is_err() {
        log::warn!("response for uuid:{uuid} truncated");
    }
    cursor.position() as usize
}

/// Format an embedded-device response.
#[allow(clippy::cast_possible_truncation)]
pub fn build_device_response(
    buf: &mut [u8],
    location: &str,
    st: &str,
    uuid: &str,
    urn: &str,
    name: &str,
    num_services: usize,
    parent_uuid: &str,
) -> usize {
    let mut cursor = Cursor::new(buf);
    let r = write!(
        cursor,
        "HTTP/1.1 200 OK \r
CACHE-CONTROL: max-age = 1800 \r
LOCATION: {location}\r
ST: {st}\r
USN: uuid:{uuid}::{urn}\r
{DESC_HEADER}: :name:{name}:services:{num_services}:puuid:{parent_uuid}:\r
\r\n",
    );
    if r.is_err() {
        log::warn!("response for uuid:{uuid} truncated");
    }
    cursor.position() as usize
}

/// Format a service response.
///
/// A service has no uuid of its own: its USN couples the owning device's
/// uuid with the service's type urn.
#[allow(clippy::cast_possible_truncation)]
pub fn build_service_response(
    buf: &mut [u8],
    location: &str,
    st: &str,
    parent_uuid: &str,
    urn: &str,
    name: &str,
) -> usize {
    let mut cursor = Cursor::new(buf);
    let r = write!(
        cursor,
        "HTTP/1.1 200 OK \r
CACHE-CONTROL: max-age = 1800 \r
LOCATION: {location}\r
ST: {st}\r
USN: uuid:{parent_uuid}::{urn}\r
{DESC_HEADER}: :name:{name}:puuid:{parent_uuid}:\r
\r\n",
    );
    if r.is_err() {
        log::warn!("service response for uuid:{parent_uuid} truncated");
    }
    cursor.position() as usize
}
