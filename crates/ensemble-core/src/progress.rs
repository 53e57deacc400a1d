//! Progress reporting - live state fan-out for one apply operation.
//!
//! The engine pushes every state transition through a ProgressReporter.
//! Reporting is a side channel: a failing sink is logged and swallowed,
//! and the engine's own state machine advances regardless.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::{ConfigUnit, ResultInformation, SetState, UnitState};

// Re-export CancellationToken for convenience
pub use tokio_util::sync::CancellationToken;

/// A single state transition within an apply operation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum SetChangeEvent {
    /// The whole set changed state
    Set { state: SetState },
    /// One unit changed state
    Unit {
        state: UnitState,
        /// Snapshot of the unit's result information at emission time
        result: ResultInformation,
        unit: ConfigUnit,
    },
}

impl SetChangeEvent {
    /// Create a set-level event
    pub fn set(state: SetState) -> Self {
        Self::Set { state }
    }

    /// Create a unit-level event
    pub fn unit(state: UnitState, result: ResultInformation, unit: ConfigUnit) -> Self {
        Self::Unit {
            state,
            result,
            unit,
        }
    }
}

/// Sink interface for apply progress reporting
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    async fn report(&self, event: SetChangeEvent) -> Result<(), String>;
}

/// In-process progress fan-out based on tokio broadcast channels
pub struct ProgressBus {
    tx: broadcast::Sender<SetChangeEvent>,
    capacity: usize,
}

impl ProgressBus {
    /// Create a new bus with channel capacity
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Return the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Subscribe to live apply events
    pub fn subscribe(&self) -> broadcast::Receiver<SetChangeEvent> {
        self.tx.subscribe()
    }
}

impl Default for ProgressBus {
    fn default() -> Self {
        // Default capacity for local realtime consumers.
        Self::new(256)
    }
}

#[async_trait]
impl ProgressReporter for ProgressBus {
    async fn report(&self, event: SetChangeEvent) -> Result<(), String> {
        // "No receiver" is a non-error; the apply result remains source-of-truth.
        match self.tx.send(event) {
            Ok(_) => Ok(()),
            Err(broadcast::error::SendError(_)) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_bus_delivers_event() {
        tokio_test::block_on(async {
            let bus = ProgressBus::new(16);
            let mut rx = bus.subscribe();

            bus.report(SetChangeEvent::set(SetState::InProgress))
                .await
                .unwrap();

            let event = rx.recv().await.expect("event");
            match event {
                SetChangeEvent::Set { state } => assert_eq!(state, SetState::InProgress),
                _ => panic!("expected set event"),
            }
        });
    }

    #[test]
    fn test_progress_bus_report_without_subscribers_is_ok() {
        tokio_test::block_on(async {
            let bus = ProgressBus::new(4);
            bus.report(SetChangeEvent::set(SetState::Completed))
                .await
                .unwrap();
        });
    }
}
