//! Configuration unit and set definitions
//!
//! ConfigUnit is a single declarative item with an intent, an optional
//! identifier, a dependency list, and implementation-specific settings.
//! ConfigSet is an ordered collection of units plus set metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Declared intent of a configuration unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitIntent {
    /// Precondition check; never changes system state
    Assert,
    /// Observation; reads current state
    Inform,
    /// Effectful change; converges system state
    Apply,
}

impl Default for UnitIntent {
    fn default() -> Self {
        Self::Apply
    }
}

/// A single declarative configuration item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigUnit {
    /// Free-form identifier; may be empty. Units reference each other by
    /// identifier in `dependencies`.
    #[serde(default)]
    pub identifier: String,
    /// Declared intent
    #[serde(default)]
    pub intent: UnitIntent,
    /// Identifiers of units that must complete successfully first
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Whether this unit should actually run; a false value still blocks
    /// dependents
    #[serde(default = "default_true")]
    pub should_apply: bool,
    /// Implementation-specific settings payload, opaque to the engine
    #[serde(default)]
    pub settings: Value,
}

fn default_true() -> bool {
    true
}

impl ConfigUnit {
    /// Create a new unit with the default Apply intent
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            intent: UnitIntent::Apply,
            dependencies: Vec::new(),
            should_apply: true,
            settings: Value::Null,
        }
    }

    /// Create a new Assert unit
    pub fn assert(identifier: impl Into<String>) -> Self {
        Self::new(identifier).with_intent(UnitIntent::Assert)
    }

    /// Create a new Inform unit
    pub fn inform(identifier: impl Into<String>) -> Self {
        Self::new(identifier).with_intent(UnitIntent::Inform)
    }

    /// Create a new Apply unit
    pub fn apply(identifier: impl Into<String>) -> Self {
        Self::new(identifier)
    }

    /// Set the intent
    pub fn with_intent(mut self, intent: UnitIntent) -> Self {
        self.intent = intent;
        self
    }

    /// Set the dependency identifiers
    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Set whether this unit should run
    pub fn with_should_apply(mut self, should_apply: bool) -> Self {
        self.should_apply = should_apply;
        self
    }

    /// Set the settings payload
    pub fn with_settings(mut self, settings: Value) -> Self {
        self.settings = settings;
        self
    }
}

/// Ordered collection of configuration units plus set metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSet {
    /// Unique identifier for this set instance
    pub instance_identifier: Uuid,
    /// Optional human-readable name
    #[serde(default)]
    pub name: Option<String>,
    /// Whether this set was loaded from history rather than authored fresh
    #[serde(default)]
    pub from_history: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// The units, in stable input order
    #[serde(default)]
    pub units: Vec<ConfigUnit>,
}

impl ConfigSet {
    /// Create a new empty set
    pub fn new() -> Self {
        Self {
            instance_identifier: Uuid::new_v4(),
            name: None,
            from_history: false,
            created_at: Utc::now(),
            units: Vec::new(),
        }
    }

    /// Set the name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Mark the set as loaded from history
    pub fn with_from_history(mut self, from_history: bool) -> Self {
        self.from_history = from_history;
        self
    }

    /// Set the units
    pub fn with_units(mut self, units: Vec<ConfigUnit>) -> Self {
        self.units = units;
        self
    }

    /// Append a unit
    pub fn add_unit(&mut self, unit: ConfigUnit) {
        self.units.push(unit);
    }
}

impl Default for ConfigSet {
    fn default() -> Self {
        Self::new()
    }
}
