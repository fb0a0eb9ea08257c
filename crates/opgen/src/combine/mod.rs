// Instruction combining: iteratively merges near-duplicate encodings
// (identical, or differing by one register or one immediate field) into
// pattern templates, one bit of the opcode per pass, until a fixed point.

mod candidate;
mod scan;

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

use rayon::prelude::*;

use crate::collection::InstructionSet;
use crate::error::Result;
use crate::instruction::Instruction;

use candidate::Candidate;

/// Tuning knobs for a combining run.
#[derive(Debug, Clone)]
pub struct CombineOptions {
    /// Worker threads per pass. Defaults to the physical core count.
    pub workers: usize,
}

impl Default for CombineOptions {
    fn default() -> Self {
        Self {
            workers: num_cpus::get_physical().max(1),
        }
    }
}

/// Outcome of a combining run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CombineStats {
    /// Passes executed, including the final pass that applied nothing.
    pub passes: usize,
    /// Merges applied across all passes. Each merge removes two live
    /// entries and inserts one combined entry.
    pub merges: usize,
}

/// Drives scan/arbitrate/apply passes over an [`InstructionSet`]'s pattern
/// map until no further merge is possible.
pub struct Combiner {
    pool: rayon::ThreadPool,
}

impl Combiner {
    pub fn new(options: &CombineOptions) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.workers.max(1))
            .thread_name(|i| format!("combine-{i}"))
            .build()?;
        Ok(Self { pool })
    }

    /// Runs combining passes to a fixed point. Seeds the pattern map from
    /// the parsed instructions if it has not been seeded yet.
    ///
    /// Worst case an instruction gains one combined bit per pass, so the
    /// pass count is bounded by the widest opcode; a pass that applies no
    /// merge ends the run early. A worker that detects a corrupted
    /// collection panics, which aborts the whole run: partial results are
    /// not trusted.
    pub fn run(&self, set: &mut InstructionSet) -> CombineStats {
        if set.patterns().is_empty() {
            set.seed_patterns();
        }

        let mut stats = CombineStats::default();
        for pass in 0..set.max_opcode_bits() {
            tracing::debug!(pass, live = set.patterns().len(), "combining pass");

            let applied = self.run_pass(set);
            stats.passes += 1;
            stats.merges += applied;

            if applied == 0 {
                break;
            }
        }

        stats
    }

    /// One pass: partition the live collection, scan each range in
    /// parallel against a frozen view, merge the workers' candidate sets
    /// into one arbitration order, and apply the winners.
    fn run_pass(&self, set: &mut InstructionSet) -> usize {
        let candidates = {
            let live = set.patterns();
            if live.is_empty() {
                return 0;
            }

            let entries: Vec<(&String, &Instruction)> = live.iter().collect();
            let ranges = partition(entries.len(), self.pool.current_num_threads());

            let worker_sets: Vec<BTreeSet<Candidate>> = self.pool.install(|| {
                ranges
                    .into_par_iter()
                    .map(|range| scan::scan_range(&entries[range], live))
                    .collect()
            });

            let mut candidates = BTreeSet::new();
            for local in worker_sets {
                candidates.extend(local);
            }
            candidates
        };

        apply(set.patterns_mut(), candidates)
    }
}

/// Splits `total` ordered entries into up to `workers` contiguous ranges of
/// `total / workers` entries, the final range absorbing the remainder.
fn partition(total: usize, workers: usize) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    if total == 0 {
        return ranges;
    }

    let workers = workers.max(1);
    let chunk = (total / workers).max(1);

    for w in 0..workers {
        let start = w * chunk;
        if start >= total {
            break;
        }
        let end = if w == workers - 1 { total } else { start + chunk };
        ranges.push(start..end);
    }

    ranges
}

/// Walks the arbitration order once, applying every candidate whose source
/// opcodes are both still live. A candidate that lost one of its sources to
/// an earlier, higher-priority merge is dropped.
fn apply(live: &mut BTreeMap<String, Instruction>, candidates: BTreeSet<Candidate>) -> usize {
    let mut applied = 0;

    for candidate in candidates {
        if !live.contains_key(&candidate.opcode_a) || !live.contains_key(&candidate.opcode_b) {
            continue;
        }

        live.remove(&candidate.opcode_a);
        live.remove(&candidate.opcode_b);
        live.insert(candidate.merged.opcode().to_owned(), candidate.merged);
        applied += 1;
    }

    applied
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_splits_evenly_with_remainder_on_the_last_range() {
        assert_eq!(partition(10, 3), vec![0..3, 3..6, 6..10]);
        assert_eq!(partition(4, 2), vec![0..2, 2..4]);
    }

    #[test]
    fn partition_with_more_workers_than_entries() {
        assert_eq!(partition(2, 4), vec![0..1, 1..2]);
        assert_eq!(partition(1, 8), vec![0..1]);
    }

    #[test]
    fn partition_of_an_empty_collection_is_empty() {
        assert!(partition(0, 4).is_empty());
    }

    #[test]
    fn partition_covers_every_entry_exactly_once() {
        for total in 1..40 {
            for workers in 1..10 {
                let ranges = partition(total, workers);
                let mut covered = 0;
                for (i, range) in ranges.iter().enumerate() {
                    assert_eq!(range.start, covered, "gap at range {i}");
                    covered = range.end;
                }
                assert_eq!(covered, total, "{total} entries, {workers} workers");
            }
        }
    }
}
