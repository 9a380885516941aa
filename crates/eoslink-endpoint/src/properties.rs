//! Coprocessor network properties and their discovery.
//!
//! The link to the coprocessor is an IPv6 link-local network on a dedicated
//! host interface. Which interface, which address, and which port each
//! service listens on are published by the platform at runtime; this module
//! reads that publication and resolves the interface index.

use std::collections::BTreeMap;
use std::net::{Ipv6Addr, SocketAddrV6};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{EndpointError, Result};
use crate::service::Service;

/// Environment variable overriding the properties document location.
pub const PROPERTIES_ENV: &str = "EOSLINK_PROPERTIES";

/// Default location of the properties document.
pub const DEFAULT_PROPERTIES_PATH: &str = "/var/run/eoslink/network.json";

/// Everything needed to address coprocessor services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkProperties {
    /// BSD name of the host interface carrying the link.
    pub ifname: String,
    /// Index of `ifname`, used as the IPv6 scope id.
    pub ifindex: u32,
    /// Link-local address of the coprocessor.
    pub addr: Ipv6Addr,
    /// Port table, one port per offered service.
    pub ports: BTreeMap<Service, u16>,
    /// Raw device type code, when published.
    pub device_type: Option<u32>,
}

impl NetworkProperties {
    /// Port for `service` in host byte order.
    pub fn port(&self, service: Service) -> Result<u16> {
        self.ports
            .get(&service)
            .copied()
            .ok_or(EndpointError::ServiceUnavailable(service))
    }

    /// Fully scoped socket address for `service`.
    pub fn service_addr(&self, service: Service) -> Result<SocketAddrV6> {
        Ok(SocketAddrV6::new(
            self.addr,
            self.port(service)?,
            0,
            self.ifindex,
        ))
    }
}

/// Source of [`NetworkProperties`].
///
/// Called at most once per successful discovery by the resolver; failures are
/// not cached and the next resolver call asks again.
pub trait Discover: Send + Sync {
    fn discover(&self) -> Result<NetworkProperties>;
}

impl<F> Discover for F
where
    F: Fn() -> Result<NetworkProperties> + Send + Sync,
{
    fn discover(&self) -> Result<NetworkProperties> {
        self()
    }
}

/// Configuration for the default discovery source.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Location of the JSON properties document.
    pub properties_path: PathBuf,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        let properties_path = std::env::var_os(PROPERTIES_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PROPERTIES_PATH));
        Self { properties_path }
    }
}

#[derive(Debug, Deserialize)]
struct PropertiesDocument {
    interface: String,
    address: Ipv6Addr,
    #[serde(default)]
    ports: BTreeMap<String, u16>,
    #[serde(default)]
    device_type: Option<u32>,
}

/// Discovers properties from a JSON document on disk.
///
/// ```json
/// {
///   "interface": "en5",
///   "address": "fe80::aede:48ff:fe33:4455",
///   "ports": { "device-query": 49155, "echo": 49160 },
///   "device_type": 8192
/// }
/// ```
#[derive(Debug, Clone)]
pub struct PropertiesFile {
    path: PathBuf,
}

impl PropertiesFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_config(config: &EndpointConfig) -> Self {
        Self::new(config.properties_path.clone())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse a properties document and resolve its interface.
    pub fn parse(path: &Path, text: &str) -> Result<NetworkProperties> {
        let doc: PropertiesDocument =
            serde_json::from_str(text).map_err(|e| EndpointError::InvalidProperties {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let mut ports = BTreeMap::new();
        for (name, port) in doc.ports {
            match Service::from_name(&name) {
                Some(service) => {
                    ports.insert(service, port);
                }
                None => warn!(service = %name, "ignoring unknown service in port table"),
            }
        }

        if !doc.address.is_unicast_link_local() {
            warn!(addr = %doc.address, "coprocessor address is not link-local");
        }

        let ifindex = interface_index(&doc.interface)?;
        Ok(NetworkProperties {
            ifname: doc.interface,
            ifindex,
            addr: doc.address,
            ports,
            device_type: doc.device_type,
        })
    }
}

impl Discover for PropertiesFile {
    fn discover(&self) -> Result<NetworkProperties> {
        debug!(path = ?self.path, "reading coprocessor network properties");
        let text = std::fs::read_to_string(&self.path).map_err(|e| {
            EndpointError::DeviceNotFound(format!(
                "no network properties at {}: {e}",
                self.path.display()
            ))
        })?;
        Self::parse(&self.path, &text)
    }
}

/// Resolve a BSD interface name to its index.
#[cfg(unix)]
pub fn interface_index(ifname: &str) -> Result<u32> {
    let c_name = std::ffi::CString::new(ifname)
        .map_err(|_| EndpointError::DeviceNotFound(format!("invalid interface name {ifname:?}")))?;
    // SAFETY: `c_name` is a valid NUL-terminated string that outlives the call.
    let index = unsafe { libc::if_nametoindex(c_name.as_ptr()) };
    if index == 0 {
        return Err(EndpointError::DeviceNotFound(format!(
            "interface {ifname} not present"
        )));
    }
    Ok(index)
}

/// Resolve a BSD interface name to its index.
#[cfg(not(unix))]
pub fn interface_index(ifname: &str) -> Result<u32> {
    Err(EndpointError::DeviceNotFound(format!(
        "interface {ifname}: link-local coprocessor links require a unix host"
    )))
}
