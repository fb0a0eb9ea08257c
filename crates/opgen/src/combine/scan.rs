use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::collections::hash_map::Entry;

use crate::bitspan::{BitSpan, overwrite_span};
use crate::instruction::Instruction;

use super::candidate::{Candidate, combinable};

/// Scans one worker's slice of the live collection, producing its local
/// candidate set.
///
/// The visited map dedups proposals within this worker only: two workers may
/// still propose the same pair, which the arbitration walk resolves by
/// checking that both source opcodes are still live before applying.
pub(crate) fn scan_range(
    entries: &[(&String, &Instruction)],
    live: &BTreeMap<String, Instruction>,
) -> BTreeSet<Candidate> {
    let mut candidates = BTreeSet::new();
    let mut visited: HashMap<String, usize> = HashMap::new();

    for (opcode, instruction) in entries {
        scan_instruction(opcode, instruction, live, &mut candidates, &mut visited);
    }

    candidates
}

/// Scans every bit of `cur`, tracking the longest span of positions that can
/// merge under a single marker, and proposes at most one merge for this
/// instruction.
///
/// For each binary bit the scan builds two probe opcodes with the whole open
/// span (plus the current bit) forced to all-`0` and all-`1`; both must
/// resolve in the live collection and compare combinable for the span to
/// grow. A bit that is already a marker from an earlier pass extends the
/// span when it matches the span's marker and restarts it otherwise.
pub(crate) fn scan_instruction(
    cur: &str,
    instruction: &Instruction,
    live: &BTreeMap<String, Instruction>,
    candidates: &mut BTreeSet<Candidate>,
    visited: &mut HashMap<String, usize>,
) {
    let chars: Vec<char> = cur.chars().collect();
    let mut longest = BitSpan::default();
    let mut span = BitSpan::default();

    let mut i = 0usize;
    while i < chars.len() {
        let c = chars[i];

        if c != '0' && c != '1' {
            // already combined in an earlier pass
            if Some(c) == span.replacement {
                span.extend();
            } else {
                span.promote(&mut longest);
                span.reset();
                span.extend();
                span.replacement = Some(c);
            }
            i += 1;
            continue;
        }

        let has_zero = c == '0';

        let mut probe = chars.clone();
        overwrite_span(&mut probe, i, span.len, '0');
        let zero_probe: String = probe.iter().collect();

        let mut probe = chars.clone();
        overwrite_span(&mut probe, i, span.len, '1');
        let one_probe: String = probe.iter().collect();

        let (Some(zero_instr), Some(one_instr)) = (live.get(&zero_probe), live.get(&one_probe))
        else {
            // no adjacent instruction; closing a non-empty span invalidates
            // the multi-bit probes, so retry this bit with a fresh span
            let retry = span.len > 0;
            span.promote(&mut longest);
            span.reset();
            if !retry {
                i += 1;
            }
            continue;
        };

        let Some((marker, difference)) = combinable(zero_instr, one_instr) else {
            span.promote(&mut longest);
            span.reset();
            i += 1;
            continue;
        };

        if span.replacement.is_some() && Some(marker) != span.replacement {
            // combinable, but under a different marker: restart the span here
            span.promote(&mut longest);
            span.reset();
            span.extend();
            if has_zero {
                span.has_zero = true;
                span.bit_pos = i;
            }
            span.replacement = Some(marker);
            i += 1;
            continue;
        }

        // same marker, or a fresh span starting at this bit
        if has_zero && !span.has_zero {
            span.has_zero = true;
            span.bit_pos = i;
        }
        span.replacement = Some(marker);

        if span.difference_position.is_none() {
            span.difference_position = difference;
        }

        span.extend();
        i += 1;
    }

    span.promote(&mut longest);

    if longest.len == 0 {
        return;
    }

    let Some(marker) = longest.replacement else {
        // cannot happen: promotion requires a marker
        return;
    };

    // reconstruct the paired opcode by flipping the anchor zero bit
    let mut paired: Vec<char> = chars.clone();
    paired[longest.bit_pos] = '1';
    let paired: String = paired.iter().collect();

    // skip if this worker already proposed this pair with a span at least
    // as long; otherwise record the new best length for the pair
    match visited.entry(paired.clone()) {
        Entry::Occupied(mut seen) => {
            if longest.len <= *seen.get() {
                return;
            }
            *seen.get_mut() = longest.len;
        }
        Entry::Vacant(slot) => {
            slot.insert(longest.len);
        }
    }

    let mut pattern = chars;
    pattern[longest.bit_pos] = marker;
    let pattern: String = pattern.iter().collect();

    let mut merged = instruction.clone();
    merged.set_opcode_bits(pattern);
    merged.set_combined(true);
    if let Some(position) = longest.difference_position {
        merged.mark_component_merged(position);
    }

    candidates.insert(Candidate {
        len: longest.len,
        opcode_a: cur.to_owned(),
        opcode_b: paired,
        merged,
    });
}
