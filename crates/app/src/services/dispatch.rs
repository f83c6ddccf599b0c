//! Dispatch engine: routes a natural-language instruction to devices.
//!
//! Routing order:
//! 1. cross-device instructions (operations on several device types) are
//!    split per type and each part runs on the first device of that type;
//! 2. same-type multi-device instructions are standardized once and adapted
//!    to every targeted device;
//! 3. anything else targets a single device, chosen by hint or inferred type.
//!
//! Every path returns a [`DispatchResult`]; errors are reported in its
//! message, never propagated.

use std::collections::HashSet;
use std::sync::Arc;

use synhome_domain::classifier::{Classifier, CommandKind, SubCommand, TargetSelection};
use synhome_domain::device::CommandSink;
use synhome_domain::error::{NotFoundError, RoutingError, SynHomeError};
use synhome_domain::operation::{Interpretation, Operation, StandardizedOperation};
use synhome_domain::outcome::{BatchOutcome, DeviceResult, DispatchResult, SingleOutcome};

use crate::ports::{DeviceDriver, Interpreter};
use crate::services::device_registry::{DeviceRegistry, RegisteredDevice};

/// Application service turning instructions into device operations.
pub struct DispatchEngine<I, D> {
    interpreter: I,
    driver: D,
    devices: Arc<DeviceRegistry>,
    classifier: Classifier,
}

impl<I: Interpreter, D: DeviceDriver> DispatchEngine<I, D> {
    /// Create an engine over the shared device registry.
    pub fn new(interpreter: I, driver: D, devices: Arc<DeviceRegistry>) -> Self {
        Self {
            interpreter,
            driver,
            devices,
            classifier: Classifier::default(),
        }
    }

    /// Replace the default keyword tables.
    #[must_use]
    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    #[must_use]
    pub fn devices(&self) -> &DeviceRegistry {
        &self.devices
    }

    /// Route an instruction, optionally hinting the target device (id or type).
    #[tracing::instrument(skip(self))]
    pub async fn process_command(&self, text: &str, device_hint: Option<&str>) -> DispatchResult {
        if self.classifier.detects_cross_device_operations(text) {
            let sub_commands = self
                .classifier
                .split_by_device_type(text, &self.devices.device_types());
            if sub_commands.is_empty() {
                tracing::debug!("cross-device instruction matched no known device type");
            } else {
                tracing::info!(parts = sub_commands.len(), "cross-device instruction");
                return self.process_cross_device(sub_commands).await;
            }
        }

        let kind = self.classifier.classify(text);
        tracing::debug!(?kind, "instruction classified");
        if kind == CommandKind::MultiDeviceSameType {
            return self.process_multi_device(text).await;
        }

        let Some(device) = self.resolve_single_target(text, device_hint).await else {
            tracing::warn!("could not determine target device");
            return DispatchResult::failure("Could not determine target device");
        };
        DispatchResult::Single(self.run_on_device(device, text).await)
    }

    /// Run an instruction on one device by id.
    #[tracing::instrument(skip(self))]
    pub async fn process_on_device(&self, device_id: &str, text: &str) -> DispatchResult {
        match self.devices.get(device_id) {
            Some(device) => DispatchResult::Single(self.run_on_device(device, text).await),
            None => DispatchResult::failure(
                NotFoundError {
                    entity: "Device",
                    id: device_id.to_string(),
                }
                .to_string(),
            ),
        }
    }

    async fn process_cross_device(&self, sub_commands: Vec<SubCommand>) -> DispatchResult {
        let mut processed = HashSet::new();
        let mut results = Vec::new();
        for sub in &sub_commands {
            let Some(device) = self.devices.first_of_type(&sub.device_type) else {
                tracing::warn!(device_type = %sub.device_type, "no device of this type");
                continue;
            };
            if !processed.insert(device.id().clone()) {
                continue;
            }
            tracing::info!(device_id = %device.id(), sub_command = %sub.text, "running sub-command");
            let outcome = self.run_on_device(device, &sub.text).await;
            results.push(DeviceResult {
                device_id: device.id().clone(),
                device_name: device.name().to_string(),
                device_type: Some(sub.device_type.clone()),
                command: Some(sub.text.clone()),
                success: outcome.success,
                error: (!outcome.success).then_some(outcome.message),
            });
        }
        let parts = sub_commands.len();
        let batch = BatchOutcome::from_results(
            |ok, total| format!("Executed {parts} sub-commands across {total} devices, {ok} successful."),
            Some(sub_commands),
            results,
        );
        tracing::info!(message = %batch.message, "cross-device instruction finished");
        DispatchResult::Batch(batch)
    }

    async fn process_multi_device(&self, text: &str) -> DispatchResult {
        let targets: Vec<&RegisteredDevice> =
            match self.classifier.extract_target_device_names(text, &self.devices.device_names()) {
                TargetSelection::Named(names) if !names.is_empty() => names
                    .iter()
                    .filter_map(|name| self.devices.find_by_name(name))
                    .collect(),
                TargetSelection::All | TargetSelection::Named(_) => self.devices.iter().collect(),
            };
        if targets.is_empty() {
            return DispatchResult::failure("No valid devices found for command");
        }

        let standardized = match self.interpreter.standardize(text).await {
            Ok(Some(raw)) => StandardizedOperation::from_value(raw).map_err(SynHomeError::from),
            Ok(None) => Err(RoutingError::MissingCommand.into()),
            Err(err) => Err(err),
        };
        let standardized = match standardized {
            Ok(operation) => operation,
            Err(err) => {
                tracing::warn!(error = %err, "standardization failed");
                return DispatchResult::failure("Failed to create operation from command");
            }
        };
        tracing::info!(operation = %standardized.operation, targets = targets.len(), "multi-device instruction");

        let mut results = Vec::with_capacity(targets.len());
        for device in targets {
            let adapted = device.with(|d| standardized.adapt_to(d));
            let result = match adapted {
                Some(instruction) => {
                    let outcome = self.run_on_device(device, &instruction).await;
                    DeviceResult {
                        device_id: device.id().clone(),
                        device_name: device.name().to_string(),
                        device_type: None,
                        command: Some(instruction),
                        success: outcome.success,
                        error: (!outcome.success).then_some(outcome.message),
                    }
                }
                None => {
                    tracing::warn!(device_id = %device.id(), operation = %standardized.operation, "cannot adapt operation");
                    DeviceResult {
                        device_id: device.id().clone(),
                        device_name: device.name().to_string(),
                        device_type: None,
                        command: None,
                        success: false,
                        error: Some("Could not adapt operation for this device".to_string()),
                    }
                }
            };
            results.push(result);
        }
        let batch = BatchOutcome::from_results(
            |ok, total| format!("Command executed successfully on {ok}/{total} devices"),
            None,
            results,
        );
        tracing::info!(message = %batch.message, "multi-device instruction finished");
        DispatchResult::Batch(batch)
    }

    async fn resolve_single_target(&self, text: &str, hint: Option<&str>) -> Option<&RegisteredDevice> {
        if let Some(found) = hint.and_then(|h| self.devices.get(h).or_else(|| self.devices.first_of_type(h))) {
            return Some(found);
        }
        let types = self.devices.device_types();
        let answer = match self.interpreter.infer_device_type(text, &types).await {
            Ok(answer) => answer?,
            Err(err) => {
                tracing::warn!(error = %err, "device type inference failed");
                return None;
            }
        };
        let answer = answer.trim().to_lowercase();
        let device_type = types.iter().find(|t| answer.contains(&t.to_lowercase()))?;
        tracing::debug!(%device_type, "device type inferred");
        self.devices.first_of_type(device_type)
    }

    async fn run_on_device(&self, device: &RegisteredDevice, text: &str) -> SingleOutcome {
        let result = self.execute(device, text).await;
        if let Err(err) = &result {
            tracing::warn!(device_id = %device.id(), error = %err, "instruction failed");
        }
        SingleOutcome {
            success: result.is_ok(),
            device_id: Some(device.id().clone()),
            device_name: Some(device.name().to_string()),
            message: match result {
                Ok(()) => "Command processed successfully".to_string(),
                Err(err) => format!("Failed to process command: {err}"),
            },
        }
    }

    /// Interpret, repair and apply an instruction on one device.
    ///
    /// Every operation is attempted even after a failure; the first error is
    /// returned.
    async fn execute(&self, device: &RegisteredDevice, text: &str) -> Result<(), SynHomeError> {
        let (context, capabilities) = device.with(|d| {
            let names: Vec<String> = d.capability_names().map(ToString::to_string).collect();
            (d.context(), names)
        });
        let raw = self
            .interpreter
            .interpret(&context, text)
            .await?
            .ok_or(RoutingError::MissingCommand)?;
        let capability_refs: Vec<&str> = capabilities.iter().map(String::as_str).collect();
        let interpretation = Interpretation::from_value(raw, &capability_refs)?;

        let mut first_error = None;
        for operation in interpretation.ordered() {
            if let Err(err) = self.apply_operation(device, &operation).await {
                tracing::warn!(
                    device_id = %device.id(),
                    command = %operation.command,
                    params = ?operation.params,
                    error = %err,
                    "operation rejected"
                );
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn apply_operation(&self, device: &RegisteredDevice, operation: &Operation) -> Result<(), SynHomeError> {
        device.with(|d| d.apply(operation))?;
        if !matches!(device.sink(), CommandSink::Local) {
            self.driver.forward(device.sink(), operation).await?;
        }
        tracing::debug!(device_id = %device.id(), command = %operation.command, "operation applied");
        Ok(())
    }
}
