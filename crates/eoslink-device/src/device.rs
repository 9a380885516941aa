use std::net::{Ipv6Addr, SocketAddrV6};
use std::sync::Arc;
use std::time::Duration;

use eoslink_endpoint::{
    ConnType, Connection, Endpoint, EndpointConfig, NetworkProperties, Service, Socket,
};
use eoslink_frame::FrameConfig;
use eoslink_message::Dictionary;
use tracing::{debug, warn};

use crate::driver::{DeviceType, DriverControl};
use crate::error::{EosError, Result};
use crate::events::{Event, EventHub, Subscription, WorkQueue};
use crate::exchange::MessageStream;
use crate::query;
use crate::state::{labels, MemoryStateStore, StateStore};

/// Settings for connections opened by [`Device`] operations.
#[derive(Debug, Clone, Default)]
pub struct DeviceConfig {
    /// Socket read/write timeout for device-query connections. `None` blocks
    /// indefinitely.
    pub io_timeout: Option<Duration>,
    /// Frame limits for device-query exchanges.
    pub frame: FrameConfig,
}

impl DeviceConfig {
    /// Defaults with the frame limits appropriate for `device_type`.
    pub fn for_device_type(device_type: DeviceType) -> Self {
        let frame = if device_type.is_first_generation() {
            FrameConfig::first_generation()
        } else {
            FrameConfig::default()
        };
        Self {
            io_timeout: None,
            frame,
        }
    }
}

/// Process-wide context for talking to the coprocessor.
///
/// Owns the address resolver, the driver and state-store boundaries, and the
/// event hub. Construct one at startup and share it. Every public operation
/// first checks that a coprocessor is supported on this machine and fails
/// with [`EosError::DeviceNotSupported`] otherwise; use
/// [`Device::endpoint`] for the unchecked resolver calls.
pub struct Device {
    endpoint: Endpoint,
    config: DeviceConfig,
    driver: Option<Arc<dyn DriverControl>>,
    state: Arc<dyn StateStore>,
    events: EventHub,
}

impl Device {
    /// Device context over `endpoint` with an in-process state store and no
    /// driver.
    pub fn new(endpoint: Endpoint) -> Self {
        let state: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        Self {
            endpoint,
            config: DeviceConfig::default(),
            driver: None,
            events: EventHub::new(Arc::clone(&state)),
            state,
        }
    }

    /// Device context reading network properties as `config` describes.
    pub fn from_config(config: &EndpointConfig) -> Self {
        Self::new(Endpoint::from_config(config))
    }

    pub fn with_config(mut self, config: DeviceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_driver(mut self, driver: impl DriverControl + 'static) -> Self {
        self.driver = Some(Arc::new(driver));
        self
    }

    /// Use `state` for flag queries and events.
    ///
    /// Any registered event handler is dropped with the old hub.
    pub fn with_state_store(mut self, state: Arc<dyn StateStore>) -> Self {
        self.events = EventHub::new(Arc::clone(&state));
        self.state = state;
        self
    }

    /// Unchecked resolver, for bootstrapping and diagnostics.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn state_store(&self) -> &Arc<dyn StateStore> {
        &self.state
    }

    /// Whether a coprocessor link can be discovered on this machine.
    pub fn is_supported(&self) -> bool {
        self.endpoint.properties().is_ok()
    }

    fn supported(&self) -> Result<Arc<NetworkProperties>> {
        self.endpoint
            .properties()
            .map_err(|err| EosError::DeviceNotSupported(err.to_string()))
    }

    /// Kind of coprocessor on this machine.
    pub fn device_type(&self) -> Result<DeviceType> {
        let props = self.endpoint.properties()?;
        props
            .device_type
            .map(DeviceType::from_code)
            .ok_or_else(|| EosError::DeviceNotFound("device type not published".to_string()))
    }

    /// Link-local address of the coprocessor.
    pub fn addr(&self) -> Result<Ipv6Addr> {
        Ok(self.supported()?.addr)
    }

    /// Scoped socket address for `service`.
    pub fn init_address(&self, service: Service) -> Result<SocketAddrV6> {
        self.supported()?;
        Ok(self.endpoint.init_address(service)?)
    }

    /// Unconnected socket suitable for reaching the coprocessor.
    pub fn init_socket(&self, conn_type: ConnType) -> Result<Socket> {
        self.supported()?;
        Ok(self.endpoint.init_socket(conn_type)?)
    }

    /// Socket plus resolved address, for callers that set options before
    /// connecting.
    pub fn init(&self, conn_type: ConnType, service: Service) -> Result<(Socket, SocketAddrV6)> {
        self.supported()?;
        Ok(self.endpoint.init(conn_type, service)?)
    }

    /// Connect to `service`. The raw connect errno of a failure is available
    /// from [`EosError::connect_errno`].
    pub fn connect(&self, conn_type: ConnType, service: Service) -> Result<Connection> {
        self.supported()?;
        Ok(self.endpoint.connect(conn_type, service)?)
    }

    fn query_stream(&self) -> Result<MessageStream<Connection>> {
        let conn = self.connect(ConnType::Stream, Service::DeviceQuery)?;
        if let Some(timeout) = self.config.io_timeout {
            conn.set_read_timeout(Some(timeout))?;
            conn.set_write_timeout(Some(timeout))?;
        }
        Ok(MessageStream::with_config(conn, self.config.frame.clone()))
    }

    /// Fetch answers for `keys` from the coprocessor's gestalt.
    pub fn fetch_gestalt_keys<K: AsRef<str>>(&self, keys: &[K]) -> Result<Dictionary> {
        if keys.is_empty() {
            return Err(EosError::BadArgument("no gestalt keys requested".to_string()));
        }
        query::fetch_gestalt_keys(&mut self.query_stream()?, keys)
    }

    /// Every gestalt key the coprocessor can answer.
    pub fn fetch_supported_gestalt_keys(&self) -> Result<Vec<String>> {
        query::fetch_supported_gestalt_keys(&mut self.query_stream()?)
    }

    pub fn fetch_boot_args(&self) -> Result<String> {
        query::fetch_boot_args(&mut self.query_stream()?)
    }

    /// Check that the coprocessor accepts this protocol version.
    pub fn check_service_version(&self) -> Result<()> {
        query::check_service_version(&mut self.query_stream()?)
    }

    fn driver(&self) -> Result<&dyn DriverControl> {
        self.supported()?;
        self.driver
            .as_deref()
            .ok_or_else(|| EosError::DeviceNotSupported("no driver control available".to_string()))
    }

    /// Reboot the coprocessor into recovery. Clears `DeviceConnected`.
    pub fn force_reset(&self) -> Result<()> {
        self.driver()?.force_reset()?;
        self.mark_disconnected();
        Ok(())
    }

    /// Reboot the coprocessor into DFU mode. Clears `DeviceConnected`.
    pub fn force_dfu(&self) -> Result<()> {
        self.driver()?.force_dfu()?;
        self.mark_disconnected();
        Ok(())
    }

    pub fn set_healed(&self, healed: bool) -> Result<()> {
        Ok(self.driver()?.set_healed(healed)?)
    }

    pub fn healed(&self) -> Result<bool> {
        Ok(self.driver()?.healed()?)
    }

    fn mark_disconnected(&self) {
        if let Err(err) = self.state.set(labels::DEVICE_CONNECTED, false) {
            warn!(error = %err, "failed to clear connected flag after driver reset");
        }
    }

    /// Whether the driver reports the coprocessor as connected.
    pub fn is_connected(&self) -> Result<bool> {
        self.supported()?;
        Ok(self.state.get(labels::DEVICE_CONNECTED)?)
    }

    /// Whether the driver reports the coprocessor as unresponsive.
    pub fn is_unresponsive(&self) -> Result<bool> {
        self.supported()?;
        Ok(self.state.get(labels::DEVICE_UNRESPONSIVE)?)
    }

    /// Run `handler` on `queue` for every lifecycle event.
    ///
    /// Only one handler may be registered at a time; a second registration
    /// fails with [`EosError::BadArgument`].
    pub fn register_event_handler<F>(&self, queue: &WorkQueue, handler: F) -> Result<Subscription>
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        self.supported()?;
        let subscription = self.events.register(queue, handler)?;
        debug!(queue = queue.name(), "registered device event handler");
        Ok(subscription)
    }

    /// Remove the registered event handler, if any.
    pub fn unregister_event_handler(&self) {
        self.events.unregister();
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("endpoint", &self.endpoint)
            .field("config", &self.config)
            .field("driver", &self.driver.is_some())
            .field("events", &self.events)
            .finish()
    }
}
