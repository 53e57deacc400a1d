//! # Ensemble Core
//!
//! Core engine for applying declarative configuration sets.
//!
//! This crate contains:
//! - ConfigUnit / ConfigSet / result definitions
//! - Set validation (identifier uniqueness, dependency resolution, cycle
//!   detection) and the intent-phased apply scheduler
//! - The SetProcessor / UnitProcessor seams that do the actual unit work
//! - Progress reporting, cooperative cancellation, and telemetry shims
//!
//! This crate does NOT care about:
//! - How configuration documents are parsed or serialized on disk
//! - What a unit's settings mean or how they are applied to a system
//! - Where progress or telemetry records are delivered
//! - Scheduling across multiple sets

pub mod apply;
pub mod error;
pub mod processor;
pub mod progress;
pub mod telemetry;
pub mod types;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::apply::SetApplyProcessor;
    pub use crate::error::ApplyError;
    pub use crate::processor::{
        ApplyReport, GetReport, ProcessorError, SetProcessor, TestOutcome, TestReport,
        UnitProcessor,
    };
    pub use crate::progress::{
        CancellationToken, ProgressBus, ProgressReporter, SetChangeEvent,
    };
    pub use crate::telemetry::{ApplySummary, NoopTelemetry, TelemetrySink, TracingTelemetry};
    pub use crate::types::{
        ApplySetResult, ApplyUnitResult, ConfigSet, ConfigUnit, ProcessingSummary, ResultCode,
        ResultInformation, ResultSource, SetState, UnitIntent, UnitState,
    };
}

// Re-export key types at crate root
pub use apply::SetApplyProcessor;
pub use error::ApplyError;
pub use processor::{ProcessorError, SetProcessor, TestOutcome, UnitProcessor};
pub use progress::{CancellationToken, ProgressBus, ProgressReporter, SetChangeEvent};
pub use telemetry::{ApplySummary, TelemetrySink};
pub use types::{ApplySetResult, ConfigSet, ConfigUnit, ResultCode, UnitIntent};
