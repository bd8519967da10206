//! Shared test utilities for dsr.

pub mod checkers;
pub mod fixtures;

#[cfg(test)]
pub mod arbitrary;

pub use checkers::ScriptedChecker;
pub use fixtures::{Backend, EngineFixture};
