//! Coprocessor service catalogue.
//!
//! Each service is one logical endpoint on the coprocessor and is bound to
//! exactly one discovered port. Code 0 is reserved for "invalid" and has no
//! variant.

use std::fmt;

/// A named logical endpoint on the coprocessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Service {
    StockholmUart,
    StockholmRpc,
    Rvf,
    Abse,
    Eostrace,
    Sysdiagnose,
    Logging,
    LaSecureIo,
    EosSupport,
    XartStorage,
    TimeSync,
    DeviceQuery,
    Fdrd,
    RepairTask,
    ReverseProxy,
    XartRecovery,
    Echo,
    FactoryProcess,
    BiometricKit,
    DfrBrightness,
    Aid,
}

impl Service {
    /// Every service, in code order.
    pub const ALL: [Service; 21] = [
        Service::StockholmUart,
        Service::StockholmRpc,
        Service::Rvf,
        Service::Abse,
        Service::Eostrace,
        Service::Sysdiagnose,
        Service::Logging,
        Service::LaSecureIo,
        Service::EosSupport,
        Service::XartStorage,
        Service::TimeSync,
        Service::DeviceQuery,
        Service::Fdrd,
        Service::RepairTask,
        Service::ReverseProxy,
        Service::XartRecovery,
        Service::Echo,
        Service::FactoryProcess,
        Service::BiometricKit,
        Service::DfrBrightness,
        Service::Aid,
    ];

    /// Stable numeric identifier (1-based).
    pub fn code(self) -> u32 {
        // ALL is in declaration order, so the discriminant is the index.
        self as u32 + 1
    }

    /// Look up a service by numeric identifier.
    pub fn from_code(code: u32) -> Option<Self> {
        let idx = usize::try_from(code.checked_sub(1)?).ok()?;
        Self::ALL.get(idx).copied()
    }

    /// Stable kebab-case name used in properties documents and diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Service::StockholmUart => "stockholm-uart",
            Service::StockholmRpc => "stockholm-rpc",
            Service::Rvf => "rvf",
            Service::Abse => "abse",
            Service::Eostrace => "eostrace",
            Service::Sysdiagnose => "sysdiagnose",
            Service::Logging => "logging",
            Service::LaSecureIo => "la-secure-io",
            Service::EosSupport => "eos-support",
            Service::XartStorage => "xart-storage",
            Service::TimeSync => "time-sync",
            Service::DeviceQuery => "device-query",
            Service::Fdrd => "fdrd",
            Service::RepairTask => "repair-task",
            Service::ReverseProxy => "reverse-proxy",
            Service::XartRecovery => "xart-recovery",
            Service::Echo => "echo",
            Service::FactoryProcess => "factory-process",
            Service::BiometricKit => "biometric-kit",
            Service::DfrBrightness => "dfr-brightness",
            Service::Aid => "aid",
        }
    }

    /// Look up a service by its kebab-case name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.name() == name)
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Service {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| format!("unknown service '{s}'"))
    }
}
