//! In-place compression of full trace buffers.
//!
//! Both strategies keep the first sample, keep ticks non-decreasing, and never
//! leave two adjacent samples with the same status. Pair elision also keeps
//! the last sample; majority vote keeps it unless it repeats the status of
//! the window before it.

use super::recorder::Sample;

/// Removes the shortest-lived transitions.
///
/// A candidate at `i` is the pair `i+1, i+2` where `samples[i]` and
/// `samples[i+3]` differ in status, so removing the pair still leaves a real
/// transition behind. Candidates are taken shortest span first
/// (`tick[i+3] - tick[i]`), skipping any that overlap an already selected
/// pair, until `max_pairs` are selected. Returns the number of samples
/// removed (zero when no candidate exists).
pub fn elide_pairs(samples: &mut Vec<Sample>, max_pairs: usize) -> usize {
    if samples.len() < 4 || max_pairs == 0 {
        return 0;
    }
    let mut candidates: Vec<(u64, usize)> = samples
        .windows(4)
        .enumerate()
        .filter(|(_, w)| w[0].status != w[3].status)
        .map(|(i, w)| (w[3].tick.saturating_sub(w[0].tick), i))
        .collect();
    candidates.sort_unstable();

    let mut selected: Vec<usize> = Vec::with_capacity(max_pairs);
    for (_, i) in candidates {
        if selected.len() == max_pairs {
            break;
        }
        if selected.iter().all(|&j| i.abs_diff(j) >= 3) {
            selected.push(i);
        }
    }
    if selected.is_empty() {
        return 0;
    }

    let mut doomed = vec![false; samples.len()];
    for i in &selected {
        doomed[i + 1] = true;
        doomed[i + 2] = true;
    }
    let mut index = 0;
    samples.retain(|_| {
        let keep = !doomed[index];
        index += 1;
        keep
    });
    selected.len() * 2
}

/// Replaces every window of interior samples by its most frequent status.
///
/// The first and last samples are not part of any window. Each window becomes one
/// sample at the window's first tick; ties go to the status seen first in the
/// window. Adjacent samples that end up with the same status are merged.
/// Returns the number of samples removed.
pub fn majority_vote(samples: &mut Vec<Sample>, window: usize) -> usize {
    let before = samples.len();
    if before < 3 || window < 2 {
        return 0;
    }
    let first = samples[0];
    let last = samples[before - 1];

    let mut out = Vec::with_capacity(before / window + 2);
    out.push(first);
    for chunk in samples[1..before - 1].chunks(window) {
        let mut counts = [0usize; 4];
        for s in chunk {
            counts[usize::from(s.status.code())] += 1;
        }
        let mut winner = chunk[0].status;
        for s in chunk {
            if counts[usize::from(s.status.code())] > counts[usize::from(winner.code())] {
                winner = s.status;
            }
        }
        push_distinct(&mut out, Sample {
            tick: chunk[0].tick,
            status: winner,
        });
    }
    push_distinct(&mut out, last);
    *samples = out;
    before - samples.len()
}

fn push_distinct(out: &mut Vec<Sample>, sample: Sample) {
    if out.last().is_some_and(|prev| prev.status == sample.status) {
        return;
    }
    out.push(sample);
}
