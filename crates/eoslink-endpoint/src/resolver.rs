use std::net::{Ipv6Addr, SocketAddrV6};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::connection::{ConnType, Connection, Socket};
use crate::error::Result;
use crate::properties::{Discover, EndpointConfig, NetworkProperties, PropertiesFile};
use crate::service::Service;

/// Resolves coprocessor service addresses and opens connections to them.
///
/// Construct one per process and share it. Discovery runs lazily on first
/// use; concurrent first callers block on the single in-flight discovery and
/// all observe the same cached [`NetworkProperties`]. A failed discovery is
/// not cached.
///
/// None of these calls check whether the device is supported; they are the
/// bootstrap layer that support checks are built on.
pub struct Endpoint {
    source: Box<dyn Discover>,
    cache: Mutex<Option<Arc<NetworkProperties>>>,
}

impl Endpoint {
    /// Resolver backed by an explicit discovery source.
    pub fn new(source: impl Discover + 'static) -> Self {
        Self {
            source: Box::new(source),
            cache: Mutex::new(None),
        }
    }

    /// Resolver reading the properties document named by `config`.
    pub fn from_config(config: &EndpointConfig) -> Self {
        Self::new(PropertiesFile::from_config(config))
    }

    /// Discovered properties, running discovery if nothing is cached yet.
    pub fn properties(&self) -> Result<Arc<NetworkProperties>> {
        let mut cache = self.cache.lock();
        if let Some(props) = cache.as_ref() {
            return Ok(Arc::clone(props));
        }

        let props = Arc::new(self.source.discover()?);
        info!(
            ifname = %props.ifname,
            ifindex = props.ifindex,
            addr = %props.addr,
            services = props.ports.len(),
            "discovered coprocessor link"
        );
        *cache = Some(Arc::clone(&props));
        Ok(props)
    }

    /// Whether discovery has already succeeded.
    pub fn is_discovered(&self) -> bool {
        self.cache.lock().is_some()
    }

    pub fn ifname(&self) -> Result<String> {
        Ok(self.properties()?.ifname.clone())
    }

    pub fn ifindex(&self) -> Result<u32> {
        Ok(self.properties()?.ifindex)
    }

    /// Link-local address of the coprocessor.
    pub fn addr(&self) -> Result<Ipv6Addr> {
        Ok(self.properties()?.addr)
    }

    /// Port for `service` in host byte order.
    pub fn port(&self, service: Service) -> Result<u16> {
        self.properties()?.port(service)
    }

    /// Scoped socket address for `service`.
    pub fn init_address(&self, service: Service) -> Result<SocketAddrV6> {
        self.properties()?.service_addr(service)
    }

    /// Create an unconnected IPv6 socket of the given type.
    pub fn init_socket(&self, conn_type: ConnType) -> Result<Socket> {
        Socket::new(conn_type)
    }

    /// Create a socket and resolve the address for `service` without
    /// connecting, so callers can adjust socket options first.
    pub fn init(&self, conn_type: ConnType, service: Service) -> Result<(Socket, SocketAddrV6)> {
        let addr = self.init_address(service)?;
        let socket = self.init_socket(conn_type)?;
        Ok((socket, addr))
    }

    /// Resolve, create and connect in one step.
    pub fn connect(&self, conn_type: ConnType, service: Service) -> Result<Connection> {
        let (socket, addr) = self.init(conn_type, service)?;
        debug!(%service, %addr, ?conn_type, "connecting to coprocessor service");
        socket.connect(addr, service)
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("discovered", &self.is_discovered())
            .finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::time::Duration;

    use super::*;
    use crate::error::EndpointError;
    use crate::properties::tests::sample_properties;

    #[test]
    fn concurrent_first_use_discovers_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let endpoint = Arc::new(Endpoint::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(50));
            Ok(sample_properties())
        }));

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let endpoint = Arc::clone(&endpoint);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    endpoint.properties().unwrap()
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&results[0], &results[1]));
        assert_eq!(results[0].ports, results[1].ports);
    }

    #[test]
    fn failed_discovery_is_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let endpoint = Endpoint::new(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(EndpointError::DeviceNotFound("link down".into()))
            } else {
                Ok(sample_properties())
            }
        });

        assert!(endpoint.properties().is_err());
        assert!(!endpoint.is_discovered());
        assert!(endpoint.properties().is_ok());
        assert!(endpoint.is_discovered());
        let _ = endpoint.port(Service::Echo).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn accessors_use_cached_properties() {
        let endpoint = Endpoint::new(|| Ok(sample_properties()));
        assert_eq!(endpoint.ifindex().unwrap(), 1);
        assert_eq!(endpoint.ifname().unwrap(), sample_properties().ifname);
        assert_eq!(endpoint.addr().unwrap(), sample_properties().addr);
        assert_eq!(endpoint.port(Service::DeviceQuery).unwrap(), 49155);

        let addr = endpoint.init_address(Service::Echo).unwrap();
        assert_eq!(addr.port(), 49160);
        assert_eq!(addr.scope_id(), 1);
    }

    #[test]
    fn init_reports_unavailable_service_before_creating_socket() {
        let endpoint = Endpoint::new(|| Ok(sample_properties()));
        let err = endpoint
            .init(ConnType::Stream, Service::BiometricKit)
            .unwrap_err();
        assert!(matches!(
            err,
            EndpointError::ServiceUnavailable(Service::BiometricKit)
        ));
    }

    #[test]
    fn connect_without_device_is_not_found() {
        let endpoint = Endpoint::new(|| Err(EndpointError::DeviceNotFound("absent".into())));
        let err = endpoint
            .connect(ConnType::Stream, Service::DeviceQuery)
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
