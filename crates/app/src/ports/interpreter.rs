//! Interpreter port: the language-understanding collaborator.
//!
//! The interpreter turns free-form instruction text into JSON following the
//! operation contracts of [`synhome_domain::operation`]. It is usually backed
//! by a language model; the core only consumes its output.

use std::future::Future;

use serde_json::Value;
use synhome_domain::device::DeviceContext;
use synhome_domain::error::SynHomeError;

/// Turns instruction text into structured operations.
///
/// `Ok(None)` means the interpreter produced nothing usable; errors are
/// reserved for failures reaching the interpreter itself.
pub trait Interpreter: Send + Sync {
    /// Interpret an instruction for one device.
    ///
    /// Output: `{command, params}` or `{compound: true, operations: [...]}`.
    fn interpret(
        &self,
        context: &DeviceContext,
        text: &str,
    ) -> impl Future<Output = Result<Option<Value>, SynHomeError>> + Send;

    /// Extract the device-independent operation of a multi-device instruction.
    ///
    /// Output: `{operation, parameters}`.
    fn standardize(
        &self,
        text: &str,
    ) -> impl Future<Output = Result<Option<Value>, SynHomeError>> + Send;

    /// Name the most likely device type among `available_types`.
    ///
    /// The answer may be free text; the caller matches it against the
    /// available types.
    fn infer_device_type(
        &self,
        text: &str,
        available_types: &[String],
    ) -> impl Future<Output = Result<Option<String>, SynHomeError>> + Send;
}

impl<T: Interpreter> Interpreter for std::sync::Arc<T> {
    fn interpret(
        &self,
        context: &DeviceContext,
        text: &str,
    ) -> impl Future<Output = Result<Option<Value>, SynHomeError>> + Send {
        (**self).interpret(context, text)
    }

    fn standardize(
        &self,
        text: &str,
    ) -> impl Future<Output = Result<Option<Value>, SynHomeError>> + Send {
        (**self).standardize(text)
    }

    fn infer_device_type(
        &self,
        text: &str,
        available_types: &[String],
    ) -> impl Future<Output = Result<Option<String>, SynHomeError>> + Send {
        (**self).infer_device_type(text, available_types)
    }
}
