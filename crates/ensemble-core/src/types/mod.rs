//! Core type definitions
//!
//! This module contains the fundamental types used throughout the engine:
//! - ConfigUnit / ConfigSet: the declarative input model
//! - UnitIntent: assert / inform / apply
//! - ResultCode / ResultInformation: HRESULT-style outcome model
//! - UnitState / SetState: lifecycle state machines
//! - ApplyUnitResult / ApplySetResult: final outcomes

mod result;
mod unit;

pub use result::{
    ApplySetResult, ApplyUnitResult, ProcessingSummary, ResultCode, ResultInformation,
    ResultSource, SetState, UnitState,
};
pub use unit::{ConfigSet, ConfigUnit, UnitIntent};
