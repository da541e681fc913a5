//! ps-protocol: uniform bit/word access to controller I/O images.
//!
//! Contains:
//! - adapter (the `ProtocolAdapter` contract)
//! - memory, modbus, s7, logo (concrete backends)
//! - discovery (bounded concurrent port probing)
//! - manager (adapter factories and connection lifecycle)

pub mod adapter;
pub mod discovery;
pub mod error;
pub mod logo;
pub mod manager;
pub mod memory;
pub mod modbus;
pub mod s7;

pub use adapter::ProtocolAdapter;
pub use error::{AdapterError, AdapterResult};
pub use manager::{AdapterFactory, ConnectionSettings, ProtocolKind, ProtocolManager};
pub use memory::{AdapterCall, MemoryAdapter};
