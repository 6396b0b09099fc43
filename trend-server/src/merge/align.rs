//! Nearest-timestamp matching within a tolerance window

use chrono::{Duration, NaiveDateTime};

/// Index into `times` (sorted ascending) of the sample nearest to `target`,
/// if it lies within `tolerance`.
///
/// Candidates are the last sample at or before `target` and the first at or
/// after it. The later candidate wins only when strictly closer, so ties
/// resolve to the earlier sample.
pub fn nearest_within(
    times: &[NaiveDateTime],
    target: NaiveDateTime,
    tolerance: Duration,
) -> Option<usize> {
    let after_le = times.partition_point(|t| *t <= target);
    let backward = after_le.checked_sub(1);
    let first_ge = times.partition_point(|t| *t < target);
    let forward = (first_ge < times.len()).then_some(first_ge);

    let (idx, distance) = match (backward, forward) {
        (Some(b), Some(f)) => {
            let back = target - times[b];
            let fwd = times[f] - target;
            if fwd < back {
                (f, fwd)
            } else {
                (b, back)
            }
        }
        (Some(b), None) => (b, target - times[b]),
        (None, Some(f)) => (f, times[f] - target),
        (None, None) => return None,
    };

    (distance <= tolerance).then_some(idx)
}

/// Match every grid timestamp against the sorted sample times.
pub fn align_to_grid(
    grid: &[NaiveDateTime],
    samples: &[NaiveDateTime],
    tolerance: Duration,
) -> Vec<Option<usize>> {
    grid.iter()
        .map(|&t| nearest_within(samples, t, tolerance))
        .collect()
}
