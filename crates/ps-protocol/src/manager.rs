//! Adapter selection and connection lifecycle.

use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::adapter::ProtocolAdapter;
use crate::error::{AdapterError, AdapterResult};
use crate::logo::{LogoAdapter, VMemoryTransport};
use crate::memory::MemoryAdapter;
use crate::modbus::{ModbusConfig, ModbusTcpAdapter};
use crate::s7::{S7Adapter, S7Endpoint, S7Transport};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProtocolKind {
    /// In-process image, used as GUI surrogate and in tests.
    #[default]
    Memory,
    ModbusTcp,
    S7,
    /// Local S7 simulator reached through a loopback bridge.
    #[serde(rename = "plcsim-s7")]
    PlcSimS7,
    Logo,
}

impl ProtocolKind {
    pub const ALL: [ProtocolKind; 5] = [
        ProtocolKind::Memory,
        ProtocolKind::ModbusTcp,
        ProtocolKind::S7,
        ProtocolKind::PlcSimS7,
        ProtocolKind::Logo,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProtocolKind::Memory => "memory",
            ProtocolKind::ModbusTcp => "modbus-tcp",
            ProtocolKind::S7 => "s7",
            ProtocolKind::PlcSimS7 => "plcsim-s7",
            ProtocolKind::Logo => "logo",
        }
    }

    pub fn parse(s: &str) -> Option<ProtocolKind> {
        let s = s.trim().to_ascii_lowercase();
        ProtocolKind::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    pub protocol: ProtocolKind,
    pub ip: String,
    pub port: u16,
    pub rack: u16,
    pub slot: u16,
    pub tsap_local: u16,
    pub tsap_remote: u16,
    pub network_adapter: String,
    pub connect_timeout_ms: u64,
    pub io_timeout_ms: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            protocol: ProtocolKind::Memory,
            ip: "192.168.0.1".to_string(),
            port: 502,
            rack: 0,
            slot: 1,
            tsap_local: 0x0300,
            tsap_remote: 0x0200,
            network_adapter: "auto".to_string(),
            connect_timeout_ms: 2000,
            io_timeout_ms: 500,
        }
    }
}

impl ConnectionSettings {
    pub fn socket_addr(&self) -> AdapterResult<SocketAddr> {
        (self.ip.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| AdapterError::InvalidSettings(format!("{}:{}: {e}", self.ip, self.port)))?
            .next()
            .ok_or_else(|| {
                AdapterError::InvalidSettings(format!("{}:{} did not resolve", self.ip, self.port))
            })
    }

    pub fn is_loopback(&self) -> bool {
        if self.ip.eq_ignore_ascii_case("localhost") {
            return true;
        }
        self.ip
            .parse::<IpAddr>()
            .map(|ip| ip.is_loopback())
            .unwrap_or(false)
    }
}

pub type AdapterFactory =
    Box<dyn Fn(&ConnectionSettings) -> AdapterResult<Box<dyn ProtocolAdapter>> + Send>;

/// Owns the factories and at most one active adapter.
pub struct ProtocolManager {
    factories: HashMap<ProtocolKind, AdapterFactory>,
    memory: MemoryAdapter,
    active: Option<(ProtocolKind, Box<dyn ProtocolAdapter>)>,
}

impl fmt::Debug for ProtocolManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.factories.keys().map(|k| k.as_str()).collect();
        kinds.sort_unstable();
        f.debug_struct("ProtocolManager")
            .field("factories", &kinds)
            .field("active", &self.active_kind())
            .finish()
    }
}

impl Default for ProtocolManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolManager {
    /// Memory and Modbus TCP are always available. S7 and LOGO need a
    /// transport registered through [`register_s7`](Self::register_s7) and
    /// [`register_logo`](Self::register_logo).
    pub fn new() -> Self {
        let memory = MemoryAdapter::new();
        let mut manager = Self {
            factories: HashMap::new(),
            memory: memory.clone(),
            active: None,
        };
        manager.register(
            ProtocolKind::Memory,
            Box::new(move |_| Ok(Box::new(memory.clone()) as Box<dyn ProtocolAdapter>)),
        );
        manager.register(
            ProtocolKind::ModbusTcp,
            Box::new(|settings| {
                let mut config = ModbusConfig::new(settings.socket_addr()?);
                config.connect_timeout = Duration::from_millis(settings.connect_timeout_ms);
                config.io_timeout = Duration::from_millis(settings.io_timeout_ms);
                Ok(Box::new(ModbusTcpAdapter::new(config)) as Box<dyn ProtocolAdapter>)
            }),
        );
        manager
    }

    /// Handle onto the image the memory adapter serves.
    pub fn memory_image(&self) -> MemoryAdapter {
        self.memory.clone()
    }

    pub fn register(&mut self, kind: ProtocolKind, factory: AdapterFactory) {
        self.factories.insert(kind, factory);
    }

    /// Registers both the S7 and local S7 simulator kinds.
    pub fn register_s7<T, F>(&mut self, make_transport: F)
    where
        T: S7Transport + 'static,
        F: Fn() -> T + Send + Sync + Clone + 'static,
    {
        for kind in [ProtocolKind::S7, ProtocolKind::PlcSimS7] {
            let make = make_transport.clone();
            self.register(
                kind,
                Box::new(move |settings| {
                    let endpoint = S7Endpoint {
                        host: settings.ip.clone(),
                        rack: settings.rack,
                        slot: settings.slot,
                    };
                    Ok(Box::new(S7Adapter::new(make(), endpoint)) as Box<dyn ProtocolAdapter>)
                }),
            );
        }
    }

    pub fn register_logo<T, F>(&mut self, make_transport: F)
    where
        T: VMemoryTransport + 'static,
        F: Fn() -> T + Send + 'static,
    {
        self.register(
            ProtocolKind::Logo,
            Box::new(move |settings| {
                Ok(Box::new(LogoAdapter::new(
                    make_transport(),
                    settings.ip.clone(),
                    settings.tsap_local,
                    settings.tsap_remote,
                )) as Box<dyn ProtocolAdapter>)
            }),
        );
    }

    pub fn supports(&self, kind: ProtocolKind) -> bool {
        self.factories.contains_key(&kind)
    }

    pub fn build(&self, settings: &ConnectionSettings) -> AdapterResult<Box<dyn ProtocolAdapter>> {
        if settings.protocol == ProtocolKind::PlcSimS7 && !settings.is_loopback() {
            return Err(AdapterError::InvalidSettings(format!(
                "{} only runs on the local machine, got {}",
                settings.protocol, settings.ip
            )));
        }
        let factory = self
            .factories
            .get(&settings.protocol)
            .ok_or_else(|| AdapterError::Unsupported(settings.protocol.to_string()))?;
        factory(settings)
    }

    /// Replaces the active adapter, disconnecting the previous one.
    pub fn activate(&mut self, kind: ProtocolKind, adapter: Box<dyn ProtocolAdapter>) {
        self.deactivate();
        info!(protocol = %kind, adapter = adapter.name(), "adapter activated");
        self.active = Some((kind, adapter));
    }

    /// Build, activate, connect and clear both I/O ranges.
    ///
    /// Succeeds only when the adapter reports connected and both range
    /// resets go through; anything less disconnects and reports the cause.
    pub fn initialize(
        &mut self,
        settings: &ConnectionSettings,
        byte_range: (u16, u16),
    ) -> AdapterResult<()> {
        let adapter = self.build(settings)?;
        self.activate(settings.protocol, adapter);

        let Some((kind, adapter)) = self.active.as_mut() else {
            return Err(AdapterError::NotConnected);
        };
        let (lo, hi) = byte_range;
        let outcome = adapter.connect().and_then(|()| {
            if !adapter.is_connected() {
                return Err(AdapterError::NotConnected);
            }
            adapter.reset_input_range(lo, hi)?;
            adapter.reset_output_range(lo, hi)
        });

        match outcome {
            Ok(()) => {
                info!(protocol = %kind, lo, hi, "controller link initialized");
                Ok(())
            }
            Err(e) => {
                warn!(protocol = %kind, error = %e, "initialization failed");
                if let Err(de) = adapter.disconnect() {
                    warn!(protocol = %kind, error = %de, "disconnect after failed init");
                }
                Err(e)
            }
        }
    }

    pub fn active_kind(&self) -> Option<ProtocolKind> {
        self.active.as_ref().map(|(kind, _)| *kind)
    }

    pub fn is_connected(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|(_, adapter)| adapter.is_connected())
    }

    pub fn adapter_mut(&mut self) -> Option<&mut dyn ProtocolAdapter> {
        match self.active.as_mut() {
            Some((_, adapter)) => Some(adapter.as_mut()),
            None => None,
        }
    }

    /// Drops the link but keeps the adapter for a later reconnect.
    pub fn disconnect(&mut self) {
        if let Some((kind, adapter)) = self.active.as_mut()
            && let Err(e) = adapter.disconnect()
        {
            warn!(protocol = %kind, error = %e, "disconnect failed");
        }
    }

    pub fn deactivate(&mut self) {
        self.disconnect();
        if let Some((kind, _)) = self.active.take() {
            info!(protocol = %kind, "adapter deactivated");
        }
    }
}
