//! Result type definitions
//!
//! Result codes are HRESULT-style i32 values so they round-trip unchanged
//! through per-unit results, the set result, and telemetry. A unit's state
//! advances monotonically: Unknown -> (Pending ->) InProgress -> Completed,
//! with Skipped terminal and reachable from Unknown.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::unit::{ConfigUnit, UnitIntent};

/// HRESULT-style status code carried by unit and set results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultCode(pub i32);

impl ResultCode {
    pub const OK: Self = Self(0);

    pub const E_FAIL: Self = Self(0x8000_4005_u32 as i32);
    pub const E_UNEXPECTED: Self = Self(0x8000_FFFF_u32 as i32);
    pub const E_NOT_IMPLEMENTED: Self = Self(0x8000_4001_u32 as i32);
    pub const CANCELLED: Self = Self(0x8007_04C7_u32 as i32);

    pub const DUPLICATE_IDENTIFIER: Self = Self(0x8A44_0001_u32 as i32);
    pub const MISSING_DEPENDENCY: Self = Self(0x8A44_0002_u32 as i32);
    pub const DEPENDENCY_CYCLE: Self = Self(0x8A44_0003_u32 as i32);
    pub const ASSERTION_FAILED: Self = Self(0x8A44_0004_u32 as i32);
    pub const DEPENDENCY_UNSATISFIED: Self = Self(0x8A44_0005_u32 as i32);
    pub const SET_APPLY_FAILED: Self = Self(0x8A44_0006_u32 as i32);
    pub const MANUALLY_SKIPPED: Self = Self(0x8A44_0007_u32 as i32);

    /// Whether this code denotes success (non-negative HRESULT)
    pub fn is_success(self) -> bool {
        self.0 >= 0
    }

    /// Whether this code denotes failure
    pub fn is_failure(self) -> bool {
        !self.is_success()
    }

    /// The raw i32 value
    pub fn value(self) -> i32 {
        self.0
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010X}", self.0 as u32)
    }
}

/// Which layer a failure originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    /// No failure recorded
    #[default]
    None,
    /// The engine itself, or an unclassified processor fault
    Internal,
    /// Validation of the configuration set (duplicates, unresolved references)
    Set,
    /// A precondition for running the unit was not met
    Precondition,
    /// The external unit processor while doing unit work
    UnitProcessing,
    /// The state of the system the unit ran against
    SystemState,
}

/// Outcome details for a unit: code, source layer, optional detail string
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultInformation {
    pub code: ResultCode,
    pub source: ResultSource,
    #[serde(default)]
    pub details: Option<String>,
}

impl ResultInformation {
    /// Create result information with a code and source
    pub fn new(code: ResultCode, source: ResultSource) -> Self {
        Self {
            code,
            source,
            details: None,
        }
    }

    /// Attach a detail string
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Lifecycle state of a single unit within an apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitState {
    /// Not yet selected for processing
    #[default]
    Unknown,
    /// Selected but waiting on another operation
    Pending,
    /// Currently being processed
    InProgress,
    /// Processing finished (successfully or not)
    Completed,
    /// Deliberately not processed
    Skipped,
}

impl UnitState {
    /// Whether this state is terminal
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }
}

/// Lifecycle state of the whole apply operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetState {
    /// Not yet started
    #[default]
    Unknown,
    /// Queued behind another operation; reserved, not currently emitted
    Pending,
    /// Units are being processed
    InProgress,
    /// The apply has finished
    Completed,
}

/// Final outcome for a single unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyUnitResult {
    /// The unit this result belongs to
    pub unit: ConfigUnit,
    /// Terminal state reached by the unit
    pub state: UnitState,
    /// Outcome details; a zero code means success
    pub result_information: ResultInformation,
    /// The unit tested as already being in its desired state
    pub previously_in_desired_state: bool,
    /// Applying the unit requires a reboot to take full effect
    pub reboot_required: bool,
}

/// Aggregate outcome of applying a configuration set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplySetResult {
    /// Overall code: success, or exactly one failure from the taxonomy
    pub result_code: ResultCode,
    /// Per-unit results, in input order
    pub unit_results: Vec<ApplyUnitResult>,
}

impl ApplySetResult {
    /// Whether the whole apply succeeded
    pub fn is_success(&self) -> bool {
        self.result_code.is_success()
    }
}

/// Per-intent counts for a finished apply
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProcessingSummary {
    /// The intent these counts cover
    pub intent: UnitIntent,
    /// Units declaring this intent
    pub count: usize,
    /// Units that were committed to execution
    pub run: usize,
    /// Units that ran and ended with a failure code
    pub failed: usize,
}

impl ProcessingSummary {
    /// Create an empty summary for an intent
    pub fn new(intent: UnitIntent) -> Self {
        Self {
            intent,
            count: 0,
            run: 0,
            failed: 0,
        }
    }
}
