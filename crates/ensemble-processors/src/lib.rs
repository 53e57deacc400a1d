//! In-memory configuration processors for development and testing.
//!
//! MemorySetProcessor plays back per-unit scripts instead of touching a
//! real system, and keeps a journal of every processor interaction so
//! callers can assert on what the engine actually did.

mod scripted;

pub use scripted::{CallRecord, MemorySetProcessor, ScriptedUnitProcessor, UnitScript};
