//! Batch planning
//!
//! Splits a table's id space into the ranges handed to its generator, one
//! batch file per range. Batches are sized on the number of *rows* a table
//! emits, which for one-to-many tables differs from the number of ids the
//! generator is addressed by.

use crate::ids::IdRange;

/// Partition `1..=base` into ranges of roughly `ceiling` rows each, for a
/// table emitting `total` rows over those ids.
///
/// When `base == total` this is a plain split into runs of `ceiling` ids.
/// Otherwise the `1..=total` partition is scaled onto `1..=base`, bumping
/// endpoints that collide with the previous range and dropping ranges that
/// would start past `base`. Every id of `1..=base` lands in exactly one range.
pub fn plan_batches(base: u64, total: u64, ceiling: u64) -> Vec<IdRange> {
    if base == 0 || total == 0 {
        return Vec::new();
    }
    // A ceiling past the row count is one batch
    let ceiling = ceiling.clamp(1, total);

    if base == total {
        return (0..total.div_ceil(ceiling))
            .filter_map(|part| {
                let start = part * ceiling + 1;
                IdRange::new(start, start.saturating_add(ceiling - 1).min(total))
            })
            .collect();
    }

    let scale = |value: u64| -> u64 {
        let scaled = (value as f64 / total as f64 * base as f64).round() as u64;
        scaled.clamp(1, base)
    };

    let mut ranges: Vec<IdRange> = Vec::new();
    let mut previous = 0;
    let mut start = 1;
    while start <= total {
        let stop = start.saturating_add(ceiling - 1).min(total);

        // Ranges are contiguous, each starts one past the previous stop
        let scaled_start = previous + 1;
        if scaled_start > base {
            break;
        }
        let scaled_stop = scale(stop).max(scaled_start);
        // The final range always reaches the end of the id space
        let scaled_stop = if stop == total { base } else { scaled_stop };

        if let Some(range) = IdRange::new(scaled_start, scaled_stop) {
            ranges.push(range);
            previous = scaled_stop;
        }
        if stop == total {
            break;
        }
        start = stop + 1;
    }

    ranges
}
