use std::net::Ipv4Addr;

/// A service, a leaf of the device hierarchy
///
/// Services have no uuid of their own; on the wire they are identified
/// by their type urn coupled with the owning device's uuid, which the
/// dispatcher supplies from context during its walk.
pub trait ServiceNode {
    /// Type urn, e.g. `urn:x-com:service:GetDateTime:1`
    fn service_type(&self) -> &str;

    /// Name for presentation on a user interface
    fn display_name(&self) -> &str;

    /// URL of this service's web interface when reached via `iface`
    ///
    /// The path is the owning device's location plus this service's
    /// target segment.
    fn location(&self, iface: Ipv4Addr) -> String;

    /// Byte-exact type comparison
    fn is_type(&self, urn: &str) -> bool {
        self.service_type().as_bytes() == urn.as_bytes()
    }
}

/// A device: a root or an embedded device
///
/// Devices own up to [`Config::max_children`](crate::Config::max_children)
/// services, reached by index. The tree is read-only from the engine's
/// perspective and must not change while a server tick is in progress.
pub trait DeviceNode {
    /// The device uuid, in canonical 36-character form
    fn uuid(&self) -> &str;

    /// Type urn, e.g. `urn:x-com:device:SoftwareClock:1`
    fn device_type(&self) -> &str;

    /// Name for presentation on a user interface
    fn display_name(&self) -> &str;

    /// URL of this device's web interface when reached via `iface`
    fn location(&self, iface: Ipv4Addr) -> String;

    /// How many services this device owns
    fn num_services(&self) -> usize;

    /// The service at `index`
    ///
    /// # Panics
    ///
    /// Implementations may panic when `index >= self.num_services()`.
    fn service(&self, index: usize) -> &dyn ServiceNode;

    /// Byte-exact type comparison
    fn is_type(&self, urn: &str) -> bool {
        self.device_type().as_bytes() == urn.as_bytes()
    }
}

/// The root of the hierarchy, additionally owning embedded devices
pub trait RootNode: DeviceNode {
    /// How many embedded devices this root owns
    fn num_devices(&self) -> usize;

    /// The embedded device at `index`, in registration order
    ///
    /// # Panics
    ///
    /// Implementations may panic when `index >= self.num_devices()`.
    fn device(&self, index: usize) -> &dyn DeviceNode;

    /// Base URL of the root's web interface, with no trailing path
    /// segment
    ///
    /// This, not [`DeviceNode::location`], is what root-device responses
    /// advertise.
    fn root_location(&self, iface: Ipv4Addr) -> String;
}
