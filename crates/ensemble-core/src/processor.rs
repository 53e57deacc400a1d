//! Processor abstraction module
//!
//! The engine does no unit-side work itself; it consumes these seams:
//! - SetProcessor: creates one UnitProcessor per unit
//! - UnitProcessor: tests, reads, and applies a single unit's settings
//! - ProcessorError: failure channel for either, classified into
//!   ResultInformation before it reaches a unit result
//!
//! A processor can report failure two ways: by returning a report whose
//! embedded result carries a failure code (adopted verbatim), or by
//! returning a ProcessorError (run through the classifier).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::types::{ConfigUnit, ResultCode, ResultInformation, ResultSource};

/// Outcome of testing whether a unit is in its desired state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestOutcome {
    /// The processor could not determine the state
    #[default]
    Unknown,
    /// The system is in the unit's desired state
    Positive,
    /// The system is not in the unit's desired state
    Negative,
    /// Testing itself failed; see the report's result information
    Failed,
}

/// Result of a `test_settings` call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestReport {
    pub outcome: TestOutcome,
    pub result: ResultInformation,
}

impl TestReport {
    /// Create a report for an outcome with a default-success result
    pub fn new(outcome: TestOutcome) -> Self {
        Self {
            outcome,
            result: ResultInformation::default(),
        }
    }

    /// Attach result information
    pub fn with_result(mut self, result: ResultInformation) -> Self {
        self.result = result;
        self
    }
}

/// Result of a `get_settings` call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetReport {
    /// The settings currently present on the system
    pub settings: Value,
    pub result: ResultInformation,
}

impl GetReport {
    /// Create a successful report carrying retrieved settings
    pub fn new(settings: Value) -> Self {
        Self {
            settings,
            result: ResultInformation::default(),
        }
    }

    /// Attach result information
    pub fn with_result(mut self, result: ResultInformation) -> Self {
        self.result = result;
        self
    }
}

/// Result of an `apply_settings` call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyReport {
    /// The change needs a reboot to take full effect
    pub reboot_required: bool,
    pub result: ResultInformation,
}

impl ApplyReport {
    /// Create a successful report
    pub fn new() -> Self {
        Self {
            reboot_required: false,
            result: ResultInformation::default(),
        }
    }

    /// Mark the change as requiring a reboot
    pub fn with_reboot_required(mut self, reboot_required: bool) -> Self {
        self.reboot_required = reboot_required;
        self
    }

    /// Attach result information
    pub fn with_result(mut self, result: ResultInformation) -> Self {
        self.result = result;
        self
    }
}

impl Default for ApplyReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Failure raised by a set or unit processor
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// The processor produced an explicit result payload for the failure
    #[error("unit processing failed with {}", .0.code)]
    Failed(ResultInformation),

    /// The processor does not implement the requested operation
    #[error("operation not supported: {0}")]
    NotSupported(String),

    /// Anything else that went wrong inside the processor
    #[error("{0}")]
    Internal(String),
}

impl ResultInformation {
    /// Classify a processor failure into unit result information.
    ///
    /// Explicit payloads are adopted verbatim; everything else defaults to
    /// source Internal with the message preserved as the detail.
    pub fn from_processor_error(error: &ProcessorError) -> Self {
        match error {
            ProcessorError::Failed(information) => information.clone(),
            ProcessorError::NotSupported(detail) => {
                Self::new(ResultCode::E_NOT_IMPLEMENTED, ResultSource::UnitProcessing)
                    .with_details(detail.clone())
            }
            ProcessorError::Internal(detail) => {
                Self::new(ResultCode::E_FAIL, ResultSource::Internal).with_details(detail.clone())
            }
        }
    }
}

/// Creates unit processors for the units of one configuration set
#[async_trait]
pub trait SetProcessor: Send + Sync {
    /// Create a processor capable of handling the given unit
    async fn create_unit_processor(
        &self,
        unit: &ConfigUnit,
    ) -> Result<Box<dyn UnitProcessor>, ProcessorError>;
}

/// Tests, reads, and applies one unit's settings
#[async_trait]
pub trait UnitProcessor: Send + Sync {
    /// Determine whether the system is in the unit's desired state
    async fn test_settings(&self) -> Result<TestReport, ProcessorError>;

    /// Retrieve the unit's current settings from the system
    async fn get_settings(&self) -> Result<GetReport, ProcessorError>;

    /// Converge the system to the unit's desired state
    async fn apply_settings(&self) -> Result<ApplyReport, ProcessorError>;
}
