//! Telemetry shim
//!
//! The engine emits two kinds of records through a sink it does not own:
//! a per-unit run record after each processor interaction, and a per-apply
//! summary when the operation finishes or is cancelled. Destinations are
//! the caller's concern; TracingTelemetry is the in-process default.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{
    ConfigUnit, ProcessingSummary, ResultCode, ResultInformation, ResultSource, UnitIntent,
};

/// Action name for `test_settings` interactions
pub const TEST_ACTION: &str = "test";
/// Action name for `get_settings` interactions
pub const GET_ACTION: &str = "get";
/// Action name for `apply_settings` interactions
pub const APPLY_ACTION: &str = "apply";

/// Per-apply summary record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplySummary {
    /// Instance identifier of the set that was applied
    pub instance_identifier: Uuid,
    /// Whether the set was loaded from history
    pub from_history: bool,
    /// Top-level intent of the operation
    pub intent: UnitIntent,
    /// Overall result code of the apply
    pub result_code: ResultCode,
    /// Source tag for the overall result
    pub source: ResultSource,
    pub assert_summary: ProcessingSummary,
    pub inform_summary: ProcessingSummary,
    pub apply_summary: ProcessingSummary,
}

/// Sink interface for engine telemetry
pub trait TelemetrySink: Send + Sync {
    /// Record one unit's processor interaction
    fn unit_run(
        &self,
        instance_identifier: Uuid,
        unit: &ConfigUnit,
        intent: UnitIntent,
        action: &str,
        result: &ResultInformation,
    );

    /// Record the outcome of a whole apply operation
    fn apply_summary(&self, summary: &ApplySummary);
}

/// Default sink that forwards records as tracing events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn unit_run(
        &self,
        instance_identifier: Uuid,
        unit: &ConfigUnit,
        intent: UnitIntent,
        action: &str,
        result: &ResultInformation,
    ) {
        if result.code.is_success() {
            tracing::info!(
                set = %instance_identifier,
                unit = %unit.identifier,
                intent = ?intent,
                action = action,
                "unit run completed"
            );
        } else {
            tracing::error!(
                set = %instance_identifier,
                unit = %unit.identifier,
                intent = ?intent,
                action = action,
                code = %result.code,
                source = ?result.source,
                details = result.details.as_deref().unwrap_or(""),
                "unit run failed"
            );
        }
    }

    fn apply_summary(&self, summary: &ApplySummary) {
        tracing::info!(
            set = %summary.instance_identifier,
            from_history = summary.from_history,
            code = %summary.result_code,
            source = ?summary.source,
            assert_count = summary.assert_summary.count,
            assert_failed = summary.assert_summary.failed,
            inform_count = summary.inform_summary.count,
            inform_failed = summary.inform_summary.failed,
            apply_count = summary.apply_summary.count,
            apply_failed = summary.apply_summary.failed,
            "configuration set apply finished"
        );
    }
}

/// Sink that drops all records
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn unit_run(
        &self,
        _instance_identifier: Uuid,
        _unit: &ConfigUnit,
        _intent: UnitIntent,
        _action: &str,
        _result: &ResultInformation,
    ) {
    }

    fn apply_summary(&self, _summary: &ApplySummary) {}
}
