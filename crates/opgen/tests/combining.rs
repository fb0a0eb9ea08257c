//! End-to-end tests for the combining engine: merge correctness for the
//! three combine classes, candidate arbitration, idempotence, and the pass
//! bound.

use opgen::test_harness::*;
use opgen::{CombineOptions, Combiner, ComponentKind, InstructionSet};

fn combiner(workers: usize) -> Combiner {
    Combiner::new(&CombineOptions { workers }).expect("worker pool")
}

fn pattern_keys(set: &InstructionSet) -> Vec<&str> {
    set.patterns().keys().map(String::as_str).collect()
}

#[test]
fn duplicates_merge_into_a_wildcard_bit() {
    let mut set = set_of(vec![
        instruction("0100", &[syn("nop")]),
        instruction("0110", &[syn("nop")]),
    ]);

    let stats = combiner(1).run(&mut set);

    assert_eq!(stats.merges, 1);
    assert_eq!(pattern_keys(&set), vec!["01*0"]);
    let merged = &set.patterns()["01*0"];
    assert!(merged.combined());
    assert!(!merged.components()[0].merged);
}

#[test]
fn immediate_difference_merges_under_a_letter_not_a_wildcard() {
    let mut set = set_of(vec![
        instruction("0001", &[syn("mov"), imm("5")]),
        instruction("0000", &[syn("mov"), imm("7")]),
    ]);

    let stats = combiner(1).run(&mut set);

    assert_eq!(stats.merges, 1);
    assert_eq!(pattern_keys(&set), vec!["000a"]);
    let merged = &set.patterns()["000a"];
    assert_eq!(merged.components()[1].kind, ComponentKind::Immediate);
    assert!(merged.components()[1].merged);
}

#[test]
fn register_difference_merges_under_an_uppercase_letter() {
    let mut set = set_of(vec![
        instruction("1000", &[syn("inc"), reg("r0")]),
        instruction("1001", &[syn("inc"), reg("r1")]),
    ]);

    let stats = combiner(1).run(&mut set);

    assert_eq!(stats.merges, 1);
    assert_eq!(pattern_keys(&set), vec!["100A"]);
    assert!(set.patterns()["100A"].components()[1].merged);
}

#[test]
fn a_full_immediate_grid_collapses_to_one_pattern() {
    let mut set = set_of(
        (0..8u8)
            .map(|v| instruction(&format!("{v:03b}"), &[syn("li"), imm(&v.to_string())]))
            .collect(),
    );

    let stats = combiner(1).run(&mut set);

    assert_eq!(pattern_keys(&set), vec!["aaa"]);
    assert_eq!(stats.merges, 7);
    assert!(stats.passes <= 3);
}

#[test]
fn overlapping_candidates_are_arbitrated_without_corruption() {
    // "01" and "10" both pair with "11"; with one instruction per worker
    // range the conflicting proposals meet at the arbitration walk, and the
    // loser must be discarded cleanly
    let mut set = set_of(
        (0..4u8)
            .map(|v| instruction(&format!("{v:02b}"), &[syn("li"), imm(&v.to_string())]))
            .collect(),
    );

    let stats = combiner(4).run(&mut set);

    assert_eq!(pattern_keys(&set), vec!["aa"]);
    assert_eq!(stats.merges, 3);
}

#[test]
fn worker_count_does_not_change_the_grid_result() {
    let build = || {
        set_of(
            (0..16u8)
                .map(|v| instruction(&format!("{v:04b}"), &[syn("li"), imm(&v.to_string())]))
                .collect(),
        )
    };

    let mut serial = build();
    let mut parallel = build();
    combiner(1).run(&mut serial);
    combiner(4).run(&mut parallel);

    assert_eq!(pattern_keys(&serial), vec!["aaaa"]);
    assert_eq!(serial.patterns().keys().collect::<Vec<_>>(), parallel.patterns().keys().collect::<Vec<_>>());
}

#[test]
fn rerunning_a_finished_combine_is_a_no_op() {
    let mut set = set_of(
        (0..8u8)
            .map(|v| instruction(&format!("{v:03b}"), &[syn("li"), imm(&v.to_string())]))
            .collect(),
    );

    let first = combiner(2).run(&mut set);
    assert!(first.merges > 0);

    let again = combiner(2).run(&mut set);
    assert_eq!(again.merges, 0);
    assert_eq!(again.passes, 1);
    assert_eq!(pattern_keys(&set), vec!["aaa"]);
}

#[test]
fn pass_count_never_exceeds_the_opcode_width() {
    let mut set = set_of(
        (0..16u8)
            .map(|v| instruction(&format!("{v:04b}"), &[syn("li"), imm(&v.to_string())]))
            .collect(),
    );

    let stats = combiner(2).run(&mut set);
    assert!(stats.passes <= set.max_opcode_bits());
}

#[test]
fn unmergeable_neighbors_stay_separate() {
    // same distance in opcode space, but the components disagree in two
    // places at once
    let mut set = set_of(vec![
        instruction("0000", &[syn("mov"), reg("r0"), imm("1")]),
        instruction("0001", &[syn("mov"), reg("r1"), imm("2")]),
    ]);

    let stats = combiner(1).run(&mut set);

    assert_eq!(stats.merges, 0);
    assert_eq!(set.patterns().len(), 2);
}

#[test]
fn width_pools_combine_independently() {
    let mut set = set_of(vec![
        instruction("0000", &[syn("nop")]),
        instruction("0001", &[syn("nop")]),
        instruction("00000000", &[syn("halt")]),
        instruction("00000001", &[syn("halt")]),
    ]);

    let stats = combiner(2).run(&mut set);

    assert_eq!(stats.merges, 2);
    assert_eq!(pattern_keys(&set), vec!["000*", "0000000*"]);
}

#[test]
fn combining_an_empty_set_terminates_immediately() {
    let mut set = InstructionSet::new();
    let stats = combiner(1).run(&mut set);
    assert_eq!(stats, opgen::CombineStats::default());
}

#[test]
fn second_register_field_gets_the_next_letter() {
    // bit 3 varies r2/r3 (second register component), bit 0 varies r0/r1
    // (first); each field must get its own letter
    let mut set = set_of(vec![
        instruction("0000", &[syn("mov"), reg("r0"), syn(","), reg("r2")]),
        instruction("0001", &[syn("mov"), reg("r0"), syn(","), reg("r3")]),
        instruction("1000", &[syn("mov"), reg("r1"), syn(","), reg("r2")]),
        instruction("1001", &[syn("mov"), reg("r1"), syn(","), reg("r3")]),
    ]);

    let stats = combiner(1).run(&mut set);

    assert_eq!(stats.merges, 3);
    assert_eq!(pattern_keys(&set), vec!["A00B"]);
    let merged = &set.patterns()["A00B"];
    assert_eq!(merged.position_from_letter('A'), 1);
    assert_eq!(merged.position_from_letter('B'), 3);
}
