use crate::config::Config;
use crate::message;
use crate::packet::Packet;
use crate::udp::{self, Channel};
use crate::Error;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

#[cfg(test)]
use mock_instant::Instant;

#[cfg(not(test))]
use std::time::Instant;

/// Multicast one search request and collect the responses
///
/// `st` must be one of the three recognized search-target shapes:
/// `upnp:rootdevice`, `uuid:<device-uuid>`, or `urn:...`. The request is
/// sent from an ephemeral port bound to `iface`, and `handler` is called
/// once per response whose echoed ST matches `st` byte-for-byte and which
/// carries a non-empty display name; anything else on the socket is
/// ignored. The call returns when `timeout` (default:
/// [`Config::default_query_timeout`]) elapses without wire activity --
/// each incoming response re-arms the window, so a busy segment keeps
/// the collection alive. A `uuid:` search expects a single responder and
/// returns as soon as it has delivered one response.
///
/// # Errors
///
/// * [`Error::InvalidSearchTarget`] -- `st` has none of the three
///   shapes; nothing is transmitted.
/// * [`Error::TransportSetup`] -- the socket could not be bound.
/// * [`Error::TransportSend`] -- the request could not be sent.
pub fn search_request<F>(
    st: &str,
    handler: F,
    iface: Ipv4Addr,
    timeout: Option<Duration>,
    all: bool,
) -> Result<(), Error>
where
    F: FnMut(&Packet),
{
    search_request_with(&Config::default(), st, handler, iface, timeout, all)
}

/// As [`search_request`], with explicit tuning
///
/// # Errors
///
/// As [`search_request`].
pub fn search_request_with<F>(
    config: &Config,
    st: &str,
    handler: F,
    iface: Ipv4Addr,
    timeout: Option<Duration>,
    all: bool,
) -> Result<(), Error>
where
    F: FnMut(&Packet),
{
    if !is_valid_target(st) {
        return Err(Error::InvalidSearchTarget);
    }
    let socket = udp::open_search_socket(iface)?;
    run_search(
        &socket,
        config,
        st,
        handler,
        timeout.unwrap_or(config.default_query_timeout),
        all,
    )
}

fn is_valid_target(st: &str) -> bool {
    st == message::ST_ROOT_DEVICE
        || st.starts_with(message::ST_UUID_PREFIX)
        || st.starts_with(message::ST_URN_PREFIX)
}

fn run_search<SCK, F>(
    socket: &SCK,
    config: &Config,
    st: &str,
    mut handler: F,
    timeout: Duration,
    all: bool,
) -> Result<(), Error>
where
    SCK: Channel,
    F: FnMut(&Packet),
{
    let mut buf = vec![0u8; config.packet_buffer_bytes];
    let n = message::build_search(
        &mut buf,
        st,
        all,
        config.multicast_group,
        config.ssdp_port,
    );
    socket.transmit(
        SocketAddr::V4(SocketAddrV4::new(
            config.multicast_group,
            config.ssdp_port,
        )),
        &buf[..n],
    )?;

    let single_device = st.starts_with(message::ST_UUID_PREFIX);
    let mut deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Ok(Some((n, _peer))) = socket.receive(&mut buf) {
            let packet = Packet::new(&buf[..n]);
            if packet.is_search_response() {
                // Keep the window open while responses are coming in
                deadline = Instant::now() + timeout;
                if packet.header_value("ST") == Some(st) {
                    if packet.display_name().is_some_and(|n| !n.is_empty()) {
                        handler(&packet);
                        if single_device {
                            return Ok(());
                        }
                    } else {
                        log::debug!(
                            "search response without a display name ignored"
                        );
                    }
                } else {
                    log::debug!("search response does not match request {st}");
                }
            }
        }
        socket.pace(config.query_poll_interval);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mock_instant::MockClock;
    use serial_test::serial;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    struct FakeChannel {
        sends: RefCell<Vec<(SocketAddr, Vec<u8>)>>,
        /// (deliver after this many receive calls, datagram)
        inbound: RefCell<VecDeque<(usize, Vec<u8>)>>,
        receives: RefCell<usize>,
    }

    impl FakeChannel {
        fn new(inbound: Vec<(usize, Vec<u8>)>) -> Self {
            Self {
                sends: RefCell::new(Vec::new()),
                inbound: RefCell::new(inbound.into_iter().collect()),
                receives: RefCell::new(0),
            }
        }

        fn sent(&self) -> Vec<Vec<u8>> {
            self.sends.borrow().iter().map(|(_, b)| b.clone()).collect()
        }
    }

    impl Channel for FakeChannel {
        fn transmit(
            &self,
            to: SocketAddr,
            buf: &[u8],
        ) -> Result<(), Error> {
            self.sends.borrow_mut().push((to, buf.to_vec()));
            Ok(())
        }

        fn receive(
            &self,
            buf: &mut [u8],
        ) -> Result<Option<(usize, SocketAddr)>, Error> {
            let call = *self.receives.borrow();
            *self.receives.borrow_mut() += 1;
            let mut inbound = self.inbound.borrow_mut();
            if let Some((at, _)) = inbound.front() {
                if call >= *at {
                    let (_, datagram) = inbound.pop_front().unwrap();
                    buf[..datagram.len()].copy_from_slice(&datagram);
                    return Ok(Some((
                        datagram.len(),
                        SocketAddr::V4(SocketAddrV4::new(
                            Ipv4Addr::new(192, 168, 100, 60),
                            1900,
                        )),
                    )));
                }
            }
            Ok(None)
        }

        fn local_port(&self) -> Result<u16, Error> {
            Ok(0)
        }

        fn pace(&self, interval: Duration) {
            MockClock::advance(interval);
        }
    }

    fn response(st: &str, name: &str) -> Vec<u8> {
        format!(
            "HTTP/1.1 200 OK \r\n\
CACHE-CONTROL: max-age = 1800 \r\n\
LOCATION: http://192.168.100.60:80\r\n\
ST: {st}\r\n\
USN: uuid:37::urn:x-com:device:Clock:1\r\n\
DESC.LEELANAUSOFTWARE.COM: :name:{name}:devices:0:services:0:\r\n\
\r\n"
        )
        .into_bytes()
    }

    fn run<F: FnMut(&Packet)>(
        channel: &FakeChannel,
        st: &str,
        handler: F,
    ) -> Result<(), Error> {
        run_search(
            channel,
            &Config::default(),
            st,
            handler,
            Duration::from_secs(2),
            false,
        )
    }

    #[test]
    fn rejects_bad_targets() {
        assert!(!is_valid_target("fnord"));
        assert!(!is_valid_target("upnp:rootdevices"));
        assert!(!is_valid_target(""));
        assert!(is_valid_target("upnp:rootdevice"));
        assert!(is_valid_target("uuid:37"));
        assert!(is_valid_target("urn:x-com:device:Clock:1"));
    }

    #[test]
    fn bad_target_transmits_nothing() {
        let e = search_request(
            "fnord",
            |_| panic!("no responses expected"),
            Ipv4Addr::LOCALHOST,
            Some(Duration::from_millis(1)),
            false,
        );
        assert!(matches!(e, Err(Error::InvalidSearchTarget)));
    }

    #[test]
    #[serial]
    fn request_goes_to_multicast_group() {
        let channel = FakeChannel::new(vec![]);

        run(&channel, "upnp:rootdevice", |_| {}).unwrap();

        let sends = channel.sends.borrow();
        assert_eq!(sends.len(), 1);
        assert_eq!(
            sends[0].0,
            SocketAddr::V4(SocketAddrV4::new(
                Ipv4Addr::new(239, 255, 255, 250),
                1900
            ))
        );
        let text = String::from_utf8(sends[0].1.clone()).unwrap();
        assert!(text.starts_with("M-SEARCH * HTTP/1.1\r\n"));
        assert!(text.contains("ST: upnp:rootdevice\r\n"));
        assert!(text.contains("ST.LEELANAUSOFTWARE.COM: \r\n"));
    }

    #[test]
    #[serial]
    fn wide_search_carries_ssdp_all() {
        let channel = FakeChannel::new(vec![]);

        run_search(
            &channel,
            &Config::default(),
            "upnp:rootdevice",
            |_| {},
            Duration::from_millis(500),
            true,
        )
        .unwrap();

        let text = String::from_utf8(channel.sent()[0].clone()).unwrap();
        assert!(text.contains("ST.LEELANAUSOFTWARE.COM: ssdp:all\r\n"));
    }

    #[test]
    #[serial]
    fn matching_response_is_delivered() {
        let channel =
            FakeChannel::new(vec![(0, response("upnp:rootdevice", "A"))]);
        let mut names = Vec::new();

        run(&channel, "upnp:rootdevice", |p| {
            names.push(p.display_name().unwrap().to_string());
        })
        .unwrap();

        assert_eq!(names, vec!["A"]);
    }

    #[test]
    #[serial]
    fn mismatched_st_is_filtered() {
        let channel = FakeChannel::new(vec![
            (0, response("urn:x-com:device:Clock:1", "B")),
            (1, response("upnp:rootdevice", "A")),
        ]);
        let mut names = Vec::new();

        run(&channel, "upnp:rootdevice", |p| {
            names.push(p.display_name().unwrap().to_string());
        })
        .unwrap();

        assert_eq!(names, vec!["A"]);
    }

    #[test]
    #[serial]
    fn response_without_name_is_filtered() {
        let no_name = b"HTTP/1.1 200 OK \r\n\
ST: upnp:rootdevice\r\n\
USN: uuid:37::urn:x-com:device:Clock:1\r\n\
\r\n";
        let channel = FakeChannel::new(vec![
            (0, no_name.to_vec()),
            (1, response("upnp:rootdevice", "")),
            (2, response("upnp:rootdevice", "A")),
        ]);
        let mut count = 0;

        run(&channel, "upnp:rootdevice", |_| count += 1).unwrap();

        assert_eq!(count, 1);
    }

    #[test]
    #[serial]
    fn uuid_search_returns_after_first_match() {
        let channel = FakeChannel::new(vec![
            (0, response("uuid:37", "A")),
            (1, response("uuid:37", "B")),
        ]);
        let mut count = 0;

        run(&channel, "uuid:37", |_| count += 1).unwrap();

        assert_eq!(count, 1);
        // The second response was never drained
        assert_eq!(channel.inbound.borrow().len(), 1);
    }

    #[test]
    #[serial]
    fn root_search_collects_until_timeout() {
        let channel = FakeChannel::new(vec![
            (0, response("upnp:rootdevice", "A")),
            (1, response("upnp:rootdevice", "B")),
        ]);
        let mut count = 0;

        run(&channel, "upnp:rootdevice", |_| count += 1).unwrap();

        assert_eq!(count, 2);
    }

    #[test]
    #[serial]
    fn responses_rearm_the_deadline() {
        // One response arrives 1.5s in (15 polls at 100ms); the window
        // must then stay open until ~3.5s, not close at 2s.
        let channel = FakeChannel::new(vec![(
            15,
            response("urn:x-com:device:Clock:1", "other"),
        )]);
        let start = Instant::now();

        run(&channel, "upnp:rootdevice", |_| {}).unwrap();

        let elapsed = Instant::now().saturating_duration_since(start);
        assert!(elapsed >= Duration::from_millis(3400), "{elapsed:?}");
    }

    #[test]
    #[serial]
    fn silence_ends_at_timeout() {
        let channel = FakeChannel::new(vec![]);
        let start = Instant::now();

        run(&channel, "upnp:rootdevice", |_| {}).unwrap();

        let elapsed = Instant::now().saturating_duration_since(start);
        assert!(elapsed >= Duration::from_secs(2), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(3), "{elapsed:?}");
    }
}
