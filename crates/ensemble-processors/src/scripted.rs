//! Scripted set/unit processors backed by in-memory state.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use ensemble_core::processor::{
    ApplyReport, GetReport, ProcessorError, SetProcessor, TestOutcome, TestReport, UnitProcessor,
};
use ensemble_core::types::{ConfigUnit, ResultInformation};

/// Scripted behavior for one unit
#[derive(Debug, Clone)]
pub struct UnitScript {
    /// Outcome returned from `test_settings`
    pub test_outcome: TestOutcome,
    /// Result information attached to the test report
    pub test_result: ResultInformation,
    /// Settings payload returned from `get_settings`
    pub get_settings: Value,
    /// Result information attached to the get report
    pub get_result: ResultInformation,
    /// Result information attached to the apply report
    pub apply_result: ResultInformation,
    /// Whether the apply report flags a reboot
    pub reboot_required: bool,
    /// When set, creating the unit processor fails with this message
    pub creation_failure: Option<String>,
}

impl UnitScript {
    /// Script a unit that already is in its desired state
    pub fn in_desired_state() -> Self {
        Self {
            test_outcome: TestOutcome::Positive,
            test_result: ResultInformation::default(),
            get_settings: Value::Null,
            get_result: ResultInformation::default(),
            apply_result: ResultInformation::default(),
            reboot_required: false,
            creation_failure: None,
        }
    }

    /// Script a unit that needs applying and applies cleanly
    pub fn out_of_desired_state() -> Self {
        Self {
            test_outcome: TestOutcome::Negative,
            ..Self::in_desired_state()
        }
    }

    /// Script a unit whose test call itself fails
    pub fn test_failure(result: ResultInformation) -> Self {
        Self {
            test_outcome: TestOutcome::Failed,
            test_result: result,
            ..Self::in_desired_state()
        }
    }

    /// Script a unit whose processor cannot be created
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            creation_failure: Some(message.into()),
            ..Self::in_desired_state()
        }
    }

    /// Set the settings payload returned from `get_settings`
    pub fn with_settings(mut self, settings: Value) -> Self {
        self.get_settings = settings;
        self
    }

    /// Set the result information attached to the get report
    pub fn with_get_result(mut self, result: ResultInformation) -> Self {
        self.get_result = result;
        self
    }

    /// Set the result information attached to the apply report
    pub fn with_apply_result(mut self, result: ResultInformation) -> Self {
        self.apply_result = result;
        self
    }

    /// Flag the apply report as requiring a reboot
    pub fn with_reboot_required(mut self, reboot_required: bool) -> Self {
        self.reboot_required = reboot_required;
        self
    }
}

impl Default for UnitScript {
    fn default() -> Self {
        Self::in_desired_state()
    }
}

/// One processor interaction, as recorded in the journal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    /// Identifier of the unit the call was made for
    pub unit: String,
    /// One of "create", "test", "get", "apply"
    pub action: &'static str,
}

impl CallRecord {
    fn new(unit: &str, action: &'static str) -> Self {
        Self {
            unit: unit.to_string(),
            action,
        }
    }
}

/// In-memory set processor that plays back unit scripts
pub struct MemorySetProcessor {
    scripts: RwLock<HashMap<String, UnitScript>>,
    fallback: UnitScript,
    journal: Arc<Mutex<Vec<CallRecord>>>,
}

impl MemorySetProcessor {
    /// Create a processor where unscripted units test as already in their
    /// desired state
    pub fn new() -> Self {
        Self {
            scripts: RwLock::new(HashMap::new()),
            fallback: UnitScript::in_desired_state(),
            journal: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Set the script used for units without an explicit entry
    pub fn with_fallback(mut self, fallback: UnitScript) -> Self {
        self.fallback = fallback;
        self
    }

    /// Register a script for a unit identifier (builder form)
    pub fn with_script(self, identifier: impl Into<String>, script: UnitScript) -> Self {
        self.register(identifier, script);
        self
    }

    /// Register a script for a unit identifier
    pub fn register(&self, identifier: impl Into<String>, script: UnitScript) {
        self.scripts
            .write()
            .expect("script table poisoned")
            .insert(identifier.into(), script);
    }

    /// Snapshot of every interaction made so far, in call order
    pub fn journal(&self) -> Vec<CallRecord> {
        self.journal.lock().expect("journal poisoned").clone()
    }

    /// Actions recorded for one unit, in call order
    pub fn actions_for(&self, identifier: &str) -> Vec<&'static str> {
        self.journal()
            .into_iter()
            .filter(|record| record.unit == identifier)
            .map(|record| record.action)
            .collect()
    }

    fn script_for(&self, identifier: &str) -> UnitScript {
        self.scripts
            .read()
            .expect("script table poisoned")
            .get(identifier)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl Default for MemorySetProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SetProcessor for MemorySetProcessor {
    async fn create_unit_processor(
        &self,
        unit: &ConfigUnit,
    ) -> Result<Box<dyn UnitProcessor>, ProcessorError> {
        let script = self.script_for(&unit.identifier);
        if let Some(message) = &script.creation_failure {
            return Err(ProcessorError::Internal(message.clone()));
        }

        self.journal
            .lock()
            .expect("journal poisoned")
            .push(CallRecord::new(&unit.identifier, "create"));

        Ok(Box::new(ScriptedUnitProcessor {
            identifier: unit.identifier.clone(),
            script,
            journal: self.journal.clone(),
        }))
    }
}

/// Unit processor that plays back one UnitScript
pub struct ScriptedUnitProcessor {
    identifier: String,
    script: UnitScript,
    journal: Arc<Mutex<Vec<CallRecord>>>,
}

impl ScriptedUnitProcessor {
    fn record(&self, action: &'static str) {
        self.journal
            .lock()
            .expect("journal poisoned")
            .push(CallRecord::new(&self.identifier, action));
    }
}

#[async_trait]
impl UnitProcessor for ScriptedUnitProcessor {
    async fn test_settings(&self) -> Result<TestReport, ProcessorError> {
        self.record("test");
        Ok(TestReport::new(self.script.test_outcome).with_result(self.script.test_result.clone()))
    }

    async fn get_settings(&self) -> Result<GetReport, ProcessorError> {
        self.record("get");
        Ok(GetReport::new(self.script.get_settings.clone())
            .with_result(self.script.get_result.clone()))
    }

    async fn apply_settings(&self) -> Result<ApplyReport, ProcessorError> {
        self.record("apply");
        Ok(ApplyReport::new()
            .with_reboot_required(self.script.reboot_required)
            .with_result(self.script.apply_result.clone()))
    }
}
