//! Device driver port: forwards accepted operations to a command sink.

use std::future::Future;

use synhome_domain::device::CommandSink;
use synhome_domain::error::SynHomeError;
use synhome_domain::operation::Operation;

/// Forwards an operation that a device accepted locally to where the
/// device really lives.
pub trait DeviceDriver: Send + Sync {
    /// Forward `operation` to `sink`.
    ///
    /// [`CommandSink::Local`] needs no forwarding and must succeed.
    fn forward(
        &self,
        sink: &CommandSink,
        operation: &Operation,
    ) -> impl Future<Output = Result<(), SynHomeError>> + Send;
}

impl<T: DeviceDriver> DeviceDriver for std::sync::Arc<T> {
    fn forward(
        &self,
        sink: &CommandSink,
        operation: &Operation,
    ) -> impl Future<Output = Result<(), SynHomeError>> + Send {
        (**self).forward(sink, operation)
    }
}
