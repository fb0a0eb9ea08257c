#![allow(
    clippy::missing_errors_doc // error conditions are documented on the Error enum
)]

pub mod bitspan;
pub mod collection;
pub mod combine;
pub mod error;
pub mod instruction;

/// Builders for writing unit and integration tests.
///
/// This module is only available when running tests or when the
/// `test-harness` feature is enabled.
#[cfg(any(test, feature = "test-harness"))]
pub mod test_harness;

pub use collection::InstructionSet;
pub use combine::{CombineOptions, CombineStats, Combiner};
pub use error::{Error, Result};
pub use instruction::{Component, ComponentKind, Instruction};
