//! Property-based tests for the combining engine.
//!
//! - Field letters and component positions are exact inverses
//! - Combining always terminates within the opcode-width pass bound
//! - A finished combine is a fixed point: rerunning merges nothing
//! - Every live entry is keyed by its own opcode, and the entry count
//!   shrinks by exactly one per applied merge

use proptest::prelude::*;

use opgen::test_harness::set_of;
use opgen::{CombineOptions, Combiner, ComponentKind, Instruction};

fn arb_components() -> impl Strategy<Value = Vec<(ComponentKind, String)>> {
    prop::collection::vec(
        prop_oneof![
            "[a-z]{1,4}".prop_map(|s| (ComponentKind::Syntax, s)),
            (0u8..8).prop_map(|n| (ComponentKind::Register, format!("r{n}"))),
            (0u32..64).prop_map(|n| (ComponentKind::Immediate, n.to_string())),
        ],
        1..10,
    )
}

fn arb_instruction_set() -> impl Strategy<Value = (usize, Vec<Instruction>)> {
    (2usize..=4).prop_flat_map(|width| {
        let max = 1u32 << width;
        (
            Just(width),
            prop::collection::btree_set(0..max, 1..=(max as usize)),
            prop::collection::vec((0usize..2, 0usize..3, 0u8..4), max as usize),
        )
            .prop_map(|(width, codes, shapes)| {
                let mnemonics = ["mov", "add"];
                let instructions: Vec<Instruction> = codes
                    .into_iter()
                    .zip(shapes)
                    .map(|(code, (mnemonic, operand, value))| {
                        let mut instr = Instruction::from_bits(format!("{code:0width$b}"));
                        instr.push_component(ComponentKind::Syntax, mnemonics[mnemonic]);
                        match operand {
                            0 => {
                                instr.push_component(ComponentKind::Immediate, value.to_string());
                            }
                            1 => {
                                instr.push_component(ComponentKind::Register, format!("r{value}"));
                            }
                            _ => {}
                        }
                        instr
                    })
                    .collect();
                (width, instructions)
            })
    })
}

proptest! {
    #[test]
    fn field_letters_round_trip(components in arb_components()) {
        let mut instr = Instruction::from_bits("00000000");
        for (kind, text) in &components {
            instr.push_component(*kind, text.clone());
        }

        for (position, component) in instr.components().iter().enumerate() {
            if component.kind == ComponentKind::Syntax {
                continue;
            }
            let letter = instr.letter_from_position(component.kind, position);
            let resolved = instr.position_from_letter(letter);
            prop_assert_eq!(resolved, position);

            // stable under repeated round trips
            let again = instr.letter_from_position(component.kind, resolved);
            prop_assert_eq!(again, letter);
        }
    }

    #[test]
    fn combining_terminates_within_the_pass_bound(
        (width, instructions) in arb_instruction_set(),
        workers in 1usize..4,
    ) {
        let initial = instructions.len();
        let mut set = set_of(instructions);
        let combiner = Combiner::new(&CombineOptions { workers }).expect("worker pool");

        let stats = combiner.run(&mut set);
        prop_assert!(stats.passes <= width);
        prop_assert_eq!(set.patterns().len(), initial - stats.merges);

        // every live entry is keyed by its own opcode, at the pool width
        for (key, instr) in set.patterns() {
            prop_assert_eq!(key.as_str(), instr.opcode());
            prop_assert_eq!(key.len(), width);
        }

        // a finished combine is a fixed point
        let again = combiner.run(&mut set);
        prop_assert_eq!(again.merges, 0);
        prop_assert_eq!(again.passes, 1);
    }
}
