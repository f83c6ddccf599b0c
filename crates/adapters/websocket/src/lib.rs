//! # synhome-adapter-websocket
//!
//! WebSocket adapter: bridges devices behind a JSON WebSocket server into
//! synhome.
//!
//! ## Messages
//!
//! | Direction | Shape |
//! |-----------|-------|
//! | out | `{"type": "auth", ...}` for `basic` / `api_key` auth, answered by `{"success": bool}` |
//! | out | rendered command template, `{"type": "command", ...}` by default |
//! | out | `{"type": "discovery", "adapter_id"}` |
//! | in  | `{"type": "discovery_response", "devices": [...], "complete": bool}` |
//! | in  | `{"type": "status", "device_id", "status": {...}}` |
//!
//! ## Dependency rule
//! Depends on `synhome-app` (port traits) and `synhome-domain` only.

mod adapter;
pub mod config;
pub mod error;

pub use adapter::WebSocketAdapter;
pub use config::{WsAuth, WsConfig};
pub use error::WsError;
