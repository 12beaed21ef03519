use crate::packet::Packet;
use crate::DESC_HEADER;

/// The three kinds of node a response can describe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// A root device, owning embedded devices and services
    Root,
    /// An embedded device, owning services
    Device,
    /// A service, a leaf of the hierarchy
    Service,
}

/// The colon-keyed description bag carried in the `DESC` header
///
/// A value such as `:name:Thermostat:services:1:puuid:37:` maps keys to
/// values; field order is not significant, so lookups scan rather than
/// parse positionally. Which keys are present distinguishes the kind of
/// node described:
///
///  * root: `devices` and `services` counters, no `puuid`
///  * embedded device: `services` counter and `puuid`, no `devices`
///  * service: `puuid` only
///
/// A message carrying both `puuid` and `devices` is malformed; it is
/// taken as an embedded device and the `devices` counter is ignored.
#[derive(Debug, Clone, Copy)]
pub struct DescField<'a> {
    raw: &'a str,
}

impl<'a> DescField<'a> {
    /// Wrap one `DESC` header value
    #[must_use]
    pub fn new(raw: &'a str) -> Self {
        Self { raw }
    }

    /// Extract the `DESC` header from a received datagram
    #[must_use]
    pub fn from_packet(packet: &Packet<'a>) -> Option<Self> {
        packet.header_value(DESC_HEADER).map(Self::new)
    }

    /// The display name, for presentation on a user interface
    #[must_use]
    pub fn name(&self) -> Option<&'a str> {
        self.value_of("name")
    }

    /// The advertised number of embedded devices
    #[must_use]
    pub fn num_devices(&self) -> Option<usize> {
        self.value_of("devices")?.parse().ok()
    }

    /// The advertised number of services
    #[must_use]
    pub fn num_services(&self) -> Option<usize> {
        self.value_of("services")?.parse().ok()
    }

    /// The uuid of the owning device, absent on root responses
    #[must_use]
    pub fn parent_uuid(&self) -> Option<&'a str> {
        self.value_of("puuid")
    }

    /// Which kind of node this description refers to
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        if self.value_of("puuid").is_some() {
            // Anything owned that still claims children is a device; a
            // devices counter next to a puuid is ignored.
            if self.value_of("services").is_some()
                || self.value_of("devices").is_some()
            {
                EntityKind::Device
            } else {
                EntityKind::Service
            }
        } else {
            EntityKind::Root
        }
    }

    fn value_of(&self, key: &str) -> Option<&'a str> {
        let bytes = self.raw.as_bytes();
        let key = key.as_bytes();
        let mut i = 0;
        while i + key.len() + 2 <= bytes.len() {
            if bytes[i] == b':'
                && bytes[i + 1..].starts_with(key)
                && bytes[i + 1 + key.len()] == b':'
            {
                let rest = &self.raw[i + key.len() + 2..];
                let end = rest.find(':')?;
                return Some(&rest[..end]);
            }
            i += 1;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_fields() {
        let d = DescField::new(":name:Hub:devices:2:services:1:");
        assert_eq!(d.name(), Some("Hub"));
        assert_eq!(d.num_devices(), Some(2));
        assert_eq!(d.num_services(), Some(1));
        assert_eq!(d.parent_uuid(), None);
        assert_eq!(d.kind(), EntityKind::Root);
    }

    #[test]
    fn device_fields() {
        let d = DescField::new(":name:Relay:services:3:puuid:37:");
        assert_eq!(d.name(), Some("Relay"));
        assert_eq!(d.num_devices(), None);
        assert_eq!(d.num_services(), Some(3));
        assert_eq!(d.parent_uuid(), Some("37"));
        assert_eq!(d.kind(), EntityKind::Device);
    }

    #[test]
    fn service_fields() {
        let d = DescField::new(":name:GetTime:puuid:37:");
        assert_eq!(d.name(), Some("GetTime"));
        assert_eq!(d.num_services(), None);
        assert_eq!(d.parent_uuid(), Some("37"));
        assert_eq!(d.kind(), EntityKind::Service);
    }

    #[test]
    fn field_order_is_free() {
        let d = DescField::new(":services:1:puuid:37:name:Relay:");
        assert_eq!(d.name(), Some("Relay"));
        assert_eq!(d.num_services(), Some(1));
        assert_eq!(d.parent_uuid(), Some("37"));
    }

    #[test]
    fn puuid_beats_devices() {
        // Malformed: claims both a parent and embedded devices. Taken as
        // an embedded device.
        let d = DescField::new(":name:Odd:devices:2:puuid:37:");
        assert_eq!(d.kind(), EntityKind::Device);
    }

    #[test]
    fn unterminated_value_is_absent() {
        let d = DescField::new(":name:Hub:devices:2");
        assert_eq!(d.name(), Some("Hub"));
        assert_eq!(d.num_devices(), None);
    }

    #[test]
    fn non_numeric_counter_is_absent() {
        let d = DescField::new(":devices:many:");
        assert_eq!(d.num_devices(), None);
    }

    #[test]
    fn empty_bag() {
        let d = DescField::new("");
        assert_eq!(d.name(), None);
        assert_eq!(d.kind(), EntityKind::Root);
    }

    #[test]
    fn from_packet_finds_header() {
        let p = Packet::new(
            b"HTTP/1.1 200 OK \r\n\
DESC.LEELANAUSOFTWARE.COM: :name:Hub:devices:0:services:0:\r\n\r\n",
        );
        let d = DescField::from_packet(&p).unwrap();
        assert_eq!(d.name(), Some("Hub"));
        assert_eq!(d.kind(), EntityKind::Root);
    }

    #[test]
    fn from_packet_missing_header() {
        let p = Packet::new(b"HTTP/1.1 200 OK \r\nST: x\r\n\r\n");
        assert!(DescField::from_packet(&p).is_none());
    }
}
