//! Protocol adapter port: a live session with a remote broker or server.
//!
//! An adapter bridges a wire protocol (MQTT, WebSocket, …) into synhome. It
//! owns one background listener while connected, forwards commands, runs
//! discovery and pushes remote status updates to a single registered
//! callback.
//!
//! Lifecycle, as driven by the composition root:
//!
//! 1. [`register_status_callback`](ProtocolAdapter::register_status_callback)
//! 2. [`connect`](ProtocolAdapter::connect)
//! 3. [`discover_devices`](ProtocolAdapter::discover_devices)
//! 4. (commands flow through [`send_command`](ProtocolAdapter::send_command))
//! 5. [`disconnect`](ProtocolAdapter::disconnect)

use std::future::Future;
use std::sync::Arc;

use serde_json::{Map, Value};
use synhome_domain::discovery::DeviceDescriptor;
use synhome_domain::error::SynHomeError;
use synhome_domain::id::AdapterId;
use synhome_domain::operation::Operation;
use synhome_domain::reconnect::ConnectionState;

/// Receives `(remote device id, status)` pushes in arrival order.
pub type StatusCallback = Arc<dyn Fn(&str, Map<String, Value>) + Send + Sync>;

/// A connection to remote devices over some wire protocol.
pub trait ProtocolAdapter: Send + Sync {
    /// Identifier of this adapter instance.
    fn id(&self) -> &AdapterId;

    /// Current connection state.
    fn state(&self) -> ConnectionState;

    fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Open the session and start the background listener.
    ///
    /// Succeeds immediately when already connected. Resets the reconnect
    /// attempt counter.
    fn connect(&self) -> impl Future<Output = Result<(), SynHomeError>> + Send;

    /// Stop the listener, close the session and forget subscriptions.
    ///
    /// Always leaves the adapter disconnected, even when closing the
    /// transport fails.
    fn disconnect(&self) -> impl Future<Output = Result<(), SynHomeError>> + Send;

    /// Ask the remote side for its devices and subscribe to their status.
    fn discover_devices(
        &self,
    ) -> impl Future<Output = Result<Vec<DeviceDescriptor>, SynHomeError>> + Send;

    /// Send one operation to a remote device.
    ///
    /// Fails immediately with [`SynHomeError::NotConnected`] while the
    /// adapter is not connected; nothing is queued.
    fn send_command(
        &self,
        device_id: &str,
        operation: &Operation,
    ) -> impl Future<Output = Result<(), SynHomeError>> + Send;

    /// Install the status callback, replacing any previous one.
    fn register_status_callback(&self, callback: StatusCallback);
}

impl<T: ProtocolAdapter> ProtocolAdapter for Arc<T> {
    fn id(&self) -> &AdapterId {
        (**self).id()
    }

    fn state(&self) -> ConnectionState {
        (**self).state()
    }

    fn connect(&self) -> impl Future<Output = Result<(), SynHomeError>> + Send {
        (**self).connect()
    }

    fn disconnect(&self) -> impl Future<Output = Result<(), SynHomeError>> + Send {
        (**self).disconnect()
    }

    fn discover_devices(
        &self,
    ) -> impl Future<Output = Result<Vec<DeviceDescriptor>, SynHomeError>> + Send {
        (**self).discover_devices()
    }

    fn send_command(
        &self,
        device_id: &str,
        operation: &Operation,
    ) -> impl Future<Output = Result<(), SynHomeError>> + Send {
        (**self).send_command(device_id, operation)
    }

    fn register_status_callback(&self, callback: StatusCallback) {
        (**self).register_status_callback(callback);
    }
}
