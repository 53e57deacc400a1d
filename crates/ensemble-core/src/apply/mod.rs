//! Apply engine
//!
//! The engine validates a configuration set (identifier uniqueness,
//! dependency resolution, acyclicity) and then drives every unit through
//! its declared intent phase by delegating to an external SetProcessor.
//!
//! Execution is intent-phased: all Assert units run first, then Inform,
//! then Apply. Within a phase, units run one at a time in input order among
//! those whose dependencies are satisfied. A failing phase short-circuits
//! the rest of the operation.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::ApplyError;
use crate::processor::{SetProcessor, TestOutcome};
use crate::progress::{ProgressReporter, SetChangeEvent};
use crate::telemetry::{self, ApplySummary, TelemetrySink, TracingTelemetry};
use crate::types::{
    ApplySetResult, ApplyUnitResult, ConfigSet, ConfigUnit, ProcessingSummary, ResultCode,
    ResultInformation, ResultSource, SetState, UnitIntent, UnitState,
};

/// Case-folded form of an identifier, used for equality comparison
fn normalize_identifier(identifier: &str) -> String {
    identifier.to_lowercase()
}

/// Which pass the scheduler is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SchedulePass {
    /// Dry run that assumes every unit succeeds; proves the dependency
    /// graph can be scheduled at all
    Validate,
    /// Real execution against the external processor
    Execute,
}

impl SchedulePass {
    fn dependency_satisfied(self, info: &UnitInfo) -> bool {
        match self {
            Self::Validate => info.preprocessed,
            Self::Execute => info.processed && info.result_information.code.is_success(),
        }
    }
}

/// Per-unit mutable record owned by the engine; indices are stable for the
/// lifetime of one apply
struct UnitInfo {
    unit: ConfigUnit,
    state: UnitState,
    result_information: ResultInformation,
    previously_in_desired_state: bool,
    reboot_required: bool,
    /// Indices into the unit table, resolved during validation
    dependency_indices: Vec<usize>,
    preprocessed: bool,
    processed: bool,
}

impl UnitInfo {
    fn new(unit: ConfigUnit) -> Self {
        Self {
            unit,
            state: UnitState::Unknown,
            result_information: ResultInformation::default(),
            previously_in_desired_state: false,
            reboot_required: false,
            dependency_indices: Vec::new(),
            preprocessed: false,
            processed: false,
        }
    }

    fn into_result(self) -> ApplyUnitResult {
        ApplyUnitResult {
            unit: self.unit,
            state: self.state,
            result_information: self.result_information,
            previously_in_desired_state: self.previously_in_desired_state,
            reboot_required: self.reboot_required,
        }
    }
}

/// Drives one configuration set through validation and intent-phased
/// execution
pub struct SetApplyProcessor {
    set: ConfigSet,
    set_processor: Arc<dyn SetProcessor>,
    telemetry: Arc<dyn TelemetrySink>,
    progress: Option<Arc<dyn ProgressReporter>>,
    cancellation: CancellationToken,
    units: Vec<UnitInfo>,
    id_index: HashMap<String, usize>,
    result_code: ResultCode,
}

impl SetApplyProcessor {
    /// Create a processor for one apply of the given set
    pub fn new(set: ConfigSet, set_processor: Arc<dyn SetProcessor>) -> Self {
        let units = set.units.iter().cloned().map(UnitInfo::new).collect();
        Self {
            set,
            set_processor,
            telemetry: Arc::new(TracingTelemetry),
            progress: None,
            cancellation: CancellationToken::new(),
            units,
            id_index: HashMap::new(),
            result_code: ResultCode::OK,
        }
    }

    /// Attach a progress reporter
    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Replace the telemetry sink
    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Attach a cancellation token polled at unit boundaries and around
    /// long-running processor calls
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Run the apply to completion.
    ///
    /// Returns the aggregate result, or `ApplyError::Cancelled` when the
    /// token fired first. A telemetry summary is emitted on both paths.
    pub async fn process(mut self) -> Result<ApplySetResult, ApplyError> {
        match self.process_set().await {
            Ok(()) => {
                let record = self.summary_record(self.result_code, ResultSource::None);
                self.telemetry.apply_summary(&record);
                Ok(self.into_result())
            }
            Err(error) => {
                let record = self.summary_record(ResultCode::CANCELLED, ResultSource::Internal);
                self.telemetry.apply_summary(&record);
                Err(error)
            }
        }
    }

    async fn process_set(&mut self) -> Result<(), ApplyError> {
        if self.pre_process().await? {
            self.send_set_progress(SetState::InProgress).await;
            // The phase outcome is already recorded in the result code.
            let _ = self.run_phases(SchedulePass::Execute, true).await?;
        }

        self.send_set_progress(SetState::Completed).await;
        Ok(())
    }

    /// Validate the set: index identifiers, resolve dependencies, and prove
    /// the dependency graph schedulable. Returns false with the result code
    /// set when validation fails.
    async fn pre_process(&mut self) -> Result<bool, ApplyError> {
        let mut ok = true;
        for index in 0..self.units.len() {
            if !self.add_to_index(index).await {
                ok = false;
            }
        }

        if !ok {
            // The only failure indexing can produce
            self.result_code = ResultCode::DUPLICATE_IDENTIFIER;
            return Ok(false);
        }

        for index in 0..self.units.len() {
            let dependencies = self.units[index].unit.dependencies.clone();
            for dependency in dependencies {
                // Throw out empty dependency strings
                if dependency.is_empty() {
                    continue;
                }

                let normalized = normalize_identifier(&dependency);
                match self.id_index.get(&normalized).copied() {
                    Some(target) => self.units[index].dependency_indices.push(target),
                    None => {
                        tracing::error!(dependency = %normalized, "found missing dependency");
                        self.units[index].result_information =
                            ResultInformation::new(ResultCode::MISSING_DEPENDENCY, ResultSource::Set)
                                .with_details(dependency);
                        self.send_unit_progress(UnitState::Completed, index).await;
                        ok = false;
                        // Only the first missing dependency is reported
                        break;
                    }
                }
            }
        }

        if !ok {
            self.result_code = ResultCode::MISSING_DEPENDENCY;
            return Ok(false);
        }

        if !self.run_phases(SchedulePass::Validate, false).await? {
            // The dry run simulates processing as if every unit succeeded.
            // A stall means some unit's dependencies can never be satisfied,
            // which only happens when the graph has a cycle.
            self.result_code = ResultCode::DEPENDENCY_CYCLE;
            return Ok(false);
        }

        Ok(true)
    }

    /// Record one unit in the identifier index. A collision marks both
    /// entries as duplicates and fails validation.
    async fn add_to_index(&mut self, index: usize) -> bool {
        let original = self.units[index].unit.identifier.clone();
        if original.is_empty() {
            return true;
        }

        let normalized = normalize_identifier(&original);
        if let Some(incumbent) = self.id_index.get(&normalized).copied() {
            tracing::error!(identifier = %normalized, "found duplicate identifier");
            self.units[incumbent].result_information =
                ResultInformation::new(ResultCode::DUPLICATE_IDENTIFIER, ResultSource::Set);
            self.send_unit_progress_if_not_complete(UnitState::Completed, incumbent)
                .await;
            self.units[index].result_information =
                ResultInformation::new(ResultCode::DUPLICATE_IDENTIFIER, ResultSource::Set);
            self.send_unit_progress(UnitState::Completed, index).await;
            false
        } else {
            self.id_index.insert(normalized, index);
            true
        }
    }

    /// Run the three intent phases over a shared candidate list
    async fn run_phases(
        &mut self,
        pass: SchedulePass,
        send_progress: bool,
    ) -> Result<bool, ApplyError> {
        let mut candidates: Vec<usize> = (0..self.units.len()).collect();

        if !self
            .run_phase(
                &mut candidates,
                pass,
                UnitIntent::Assert,
                ResultCode::ASSERTION_FAILED,
                ResultCode::ASSERTION_FAILED,
                send_progress,
            )
            .await?
        {
            return Ok(false);
        }

        if !self
            .run_phase(
                &mut candidates,
                pass,
                UnitIntent::Inform,
                ResultCode::DEPENDENCY_UNSATISFIED,
                ResultCode::DEPENDENCY_UNSATISFIED,
                send_progress,
            )
            .await?
        {
            return Ok(false);
        }

        // No intents remain after Apply, so the other-intent code cannot be
        // reached in practice.
        self.run_phase(
            &mut candidates,
            pass,
            UnitIntent::Apply,
            ResultCode::E_FAIL,
            ResultCode::SET_APPLY_FAILED,
            send_progress,
        )
        .await
    }

    /// Run one intent phase: repeatedly pick the first ready candidate in
    /// input order, then classify whatever could not be scheduled.
    async fn run_phase(
        &mut self,
        candidates: &mut Vec<usize>,
        pass: SchedulePass,
        intent: UnitIntent,
        error_for_other_intents: ResultCode,
        error_for_failures: ResultCode,
        send_progress: bool,
    ) -> Result<bool, ApplyError> {
        let mut has_failure = false;
        loop {
            let Some(position) = candidates
                .iter()
                .position(|&index| self.is_ready(index, intent, pass))
            else {
                break;
            };

            let index = candidates.remove(position);
            let succeeded = match pass {
                SchedulePass::Validate => {
                    self.units[index].preprocessed = true;
                    true
                }
                SchedulePass::Execute => self.process_unit(index).await?,
            };
            if !succeeded {
                has_failure = true;
            }
        }

        // Whatever is left with this intent could not have its dependencies
        // satisfied
        let mut has_remaining_dependencies = false;
        for &index in candidates.iter() {
            if self.units[index].unit.intent == intent {
                has_remaining_dependencies = true;
                self.units[index].result_information = ResultInformation::new(
                    ResultCode::DEPENDENCY_UNSATISFIED,
                    ResultSource::Precondition,
                );
                if send_progress {
                    self.send_unit_progress(UnitState::Skipped, index).await;
                }
            }
        }

        // Any failure is fatal for the rest of the operation
        if has_failure || has_remaining_dependencies {
            for &index in candidates.iter() {
                if self.units[index].unit.intent != intent {
                    self.units[index].result_information =
                        ResultInformation::new(error_for_other_intents, ResultSource::Precondition);
                    if send_progress {
                        self.send_unit_progress(UnitState::Skipped, index).await;
                    }
                }
            }

            self.result_code = if has_failure {
                error_for_failures
            } else {
                ResultCode::DEPENDENCY_UNSATISFIED
            };
            return Ok(false);
        }

        Ok(true)
    }

    /// A unit is ready when it declares the phase intent and every resolved
    /// dependency satisfies the pass predicate
    fn is_ready(&self, index: usize, intent: UnitIntent, pass: SchedulePass) -> bool {
        let info = &self.units[index];
        info.unit.intent == intent
            && info
                .dependency_indices
                .iter()
                .all(|&dependency| pass.dependency_satisfied(&self.units[dependency]))
    }

    /// Process one unit against the external processor. Returns whether the
    /// unit succeeded; `Err` only for cancellation.
    async fn process_unit(&mut self, index: usize) -> Result<bool, ApplyError> {
        self.check_cancelled()?;

        // From this point the unit counts as processed, even if creating
        // the actual processor fails.
        self.units[index].processed = true;

        if !self.units[index].unit.should_apply {
            // A requested skip is recorded as a failure so that dependents
            // do not run, while the phase treats it as a successful pass.
            self.units[index].result_information =
                ResultInformation::new(ResultCode::MANUALLY_SKIPPED, ResultSource::Precondition);
            self.send_unit_progress(UnitState::Skipped, index).await;
            return Ok(true);
        }

        self.send_unit_progress(UnitState::InProgress, index).await;
        let outcome = self.run_unit(index).await;
        // The terminal event goes out on every exit path, cancellation
        // included.
        self.send_unit_progress(UnitState::Completed, index).await;
        outcome
    }

    async fn run_unit(&mut self, index: usize) -> Result<bool, ApplyError> {
        let unit = self.units[index].unit.clone();

        let unit_processor = match self.set_processor.create_unit_processor(&unit).await {
            Ok(processor) => processor,
            Err(error) => {
                self.units[index].result_information =
                    ResultInformation::from_processor_error(&error);
                return Ok(false);
            }
        };

        // Creating the unit processor can take a while; check again before
        // doing any work.
        self.check_cancelled()?;

        let mut action = telemetry::TEST_ACTION;
        let mut succeeded = false;

        match unit.intent {
            UnitIntent::Assert => match unit_processor.test_settings().await {
                Ok(report) => match report.outcome {
                    TestOutcome::Positive => succeeded = true,
                    TestOutcome::Negative => {
                        self.units[index].result_information = ResultInformation::new(
                            ResultCode::ASSERTION_FAILED,
                            ResultSource::Precondition,
                        );
                    }
                    TestOutcome::Failed => {
                        self.units[index].result_information = report.result;
                    }
                    TestOutcome::Unknown => {
                        self.units[index].result_information = ResultInformation::new(
                            ResultCode::E_UNEXPECTED,
                            ResultSource::Internal,
                        );
                    }
                },
                Err(error) => {
                    self.units[index].result_information =
                        ResultInformation::from_processor_error(&error);
                }
            },
            UnitIntent::Inform => {
                action = telemetry::GET_ACTION;
                match unit_processor.get_settings().await {
                    Ok(report) => {
                        if report.result.code.is_success() {
                            succeeded = true;
                        } else {
                            self.units[index].result_information = report.result;
                        }
                    }
                    Err(error) => {
                        self.units[index].result_information =
                            ResultInformation::from_processor_error(&error);
                    }
                }
            }
            UnitIntent::Apply => match unit_processor.test_settings().await {
                Ok(report) => match report.outcome {
                    TestOutcome::Positive => {
                        self.units[index].previously_in_desired_state = true;
                        succeeded = true;
                    }
                    TestOutcome::Negative => {
                        // Testing may have taken a while; check once more
                        // before mutating system state.
                        self.check_cancelled()?;

                        action = telemetry::APPLY_ACTION;
                        match unit_processor.apply_settings().await {
                            Ok(report) => {
                                if report.result.code.is_success() {
                                    self.units[index].reboot_required = report.reboot_required;
                                    succeeded = true;
                                } else {
                                    self.units[index].result_information = report.result;
                                }
                            }
                            Err(error) => {
                                self.units[index].result_information =
                                    ResultInformation::from_processor_error(&error);
                            }
                        }
                    }
                    TestOutcome::Failed => {
                        self.units[index].result_information = report.result;
                    }
                    TestOutcome::Unknown => {
                        self.units[index].result_information = ResultInformation::new(
                            ResultCode::E_UNEXPECTED,
                            ResultSource::Internal,
                        );
                    }
                },
                Err(error) => {
                    self.units[index].result_information =
                        ResultInformation::from_processor_error(&error);
                }
            },
        }

        self.telemetry.unit_run(
            self.set.instance_identifier,
            &unit,
            UnitIntent::Apply,
            action,
            &self.units[index].result_information,
        );
        Ok(succeeded)
    }

    fn check_cancelled(&self) -> Result<(), ApplyError> {
        if self.cancellation.is_cancelled() {
            return Err(ApplyError::Cancelled);
        }
        Ok(())
    }

    async fn send_set_progress(&self, state: SetState) {
        self.emit(SetChangeEvent::set(state)).await;
    }

    /// Record the new state on the unit and emit the matching event
    async fn send_unit_progress(&mut self, state: UnitState, index: usize) {
        self.units[index].state = state;
        let event = SetChangeEvent::unit(
            state,
            self.units[index].result_information.clone(),
            self.units[index].unit.clone(),
        );
        self.emit(event).await;
    }

    /// Emit a terminal event only if the unit has not already completed;
    /// avoids double-terminal emissions for repeat validation findings
    async fn send_unit_progress_if_not_complete(&mut self, state: UnitState, index: usize) {
        if self.units[index].state != UnitState::Completed {
            self.send_unit_progress(state, index).await;
        }
    }

    async fn emit(&self, event: SetChangeEvent) {
        if let Some(reporter) = &self.progress {
            if let Err(error) = reporter.report(event).await {
                tracing::warn!("failed to report apply progress: {}", error);
            }
        }
    }

    fn summary_for(&self, intent: UnitIntent) -> ProcessingSummary {
        let mut summary = ProcessingSummary::new(intent);
        for info in &self.units {
            if info.unit.intent != intent {
                continue;
            }
            summary.count += 1;
            if info.processed {
                summary.run += 1;
                if info.result_information.code.is_failure() {
                    summary.failed += 1;
                }
            }
        }
        summary
    }

    fn summary_record(&self, result_code: ResultCode, source: ResultSource) -> ApplySummary {
        ApplySummary {
            instance_identifier: self.set.instance_identifier,
            from_history: self.set.from_history,
            intent: UnitIntent::Apply,
            result_code,
            source,
            assert_summary: self.summary_for(UnitIntent::Assert),
            inform_summary: self.summary_for(UnitIntent::Inform),
            apply_summary: self.summary_for(UnitIntent::Apply),
        }
    }

    fn into_result(self) -> ApplySetResult {
        ApplySetResult {
            result_code: self.result_code,
            unit_results: self.units.into_iter().map(UnitInfo::into_result).collect(),
        }
    }
}
