//! Builders for constructing instructions and instruction sets in tests.
//!
//! Only available when running tests or with the `test-harness` feature.
//!
//! # Example
//!
//! ```rust
//! use opgen::test_harness::*;
//! use opgen::{CombineOptions, Combiner};
//!
//! let mut set = set_of(vec![
//!     instruction("0000", &[syn("mov"), imm("0")]),
//!     instruction("0001", &[syn("mov"), imm("1")]),
//! ]);
//! let combiner = Combiner::new(&CombineOptions { workers: 1 }).expect("pool");
//! let stats = combiner.run(&mut set);
//! assert_eq!(stats.merges, 1);
//! ```

use crate::collection::InstructionSet;
use crate::instruction::{ComponentKind, Instruction};

/// Builds an instruction from an opcode bit-string and `(kind, text)` pairs.
#[must_use]
pub fn instruction(bits: &str, components: &[(ComponentKind, &str)]) -> Instruction {
    let mut instr = Instruction::from_bits(bits);
    for (kind, text) in components {
        instr.push_component(*kind, *text);
    }
    instr
}

/// Builds a populated [`InstructionSet`], panicking on invalid input since
/// test fixtures are expected to be well-formed.
#[must_use]
pub fn set_of(instructions: Vec<Instruction>) -> InstructionSet {
    let mut set = InstructionSet::new();
    for instr in instructions {
        set.insert(instr).expect("test fixture instruction rejected");
    }
    set
}

#[must_use]
pub fn syn(text: &str) -> (ComponentKind, &str) {
    (ComponentKind::Syntax, text)
}

#[must_use]
pub fn reg(text: &str) -> (ComponentKind, &str) {
    (ComponentKind::Register, text)
}

#[must_use]
pub fn imm(text: &str) -> (ComponentKind, &str) {
    (ComponentKind::Immediate, text)
}
