//! # synhome-app
//!
//! Application layer: use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters implement (driven/outbound ports):
//!   - `Interpreter`: turns instruction text into operations
//!   - `ProtocolAdapter`: live connection to a remote broker or server
//!   - `DeviceDriver`: forwards accepted operations to a command sink
//! - Provide the **use-cases**:
//!   - `DeviceRegistry`: configured devices and their lookups
//!   - `AdapterRegistry`: adapter lifecycle and status fan-in
//!   - `DispatchEngine`: classify, split, adapt and execute instructions
//! - Provide the shared reconnect loop used by every adapter
//!
//! ## Dependency rule
//! Depends on `synhome-domain` only (plus `tokio::sync`/`tokio::time`).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod ports;
pub mod reconnect;
pub mod services;
