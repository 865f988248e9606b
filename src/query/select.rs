//! Retention selection primitives
//!
//! Small scans over one schema's retention ladder. These encode the two
//! directions the planner cares about: ascending for "finest archive that
//! works" and descending for "coarsest archive that can deliver a given
//! interval".

use crate::retention::Retention;

/// Find the most precise retention that is ready for `from` and covers
/// `ttl`, or failing the TTL, the longest-covering ready one.
///
/// Returns `None` only when no retention is ready for `from` at all.
pub fn find_highest_res(rets: &[Retention], from: u32, ttl: u32) -> Option<(usize, Retention)> {
    let mut chosen = None;
    for (i, ret) in rets.iter().enumerate() {
        // skip archives that are not yet populated for this window
        if ret.ready > from {
            continue;
        }
        chosen = Some((i, *ret));
        if ret.max_retention() >= ttl {
            break;
        }
    }
    chosen
}

/// Find the coarsest valid retention whose interval divides `interval`.
///
/// Scanning in descending order means an archive that matches `interval`
/// exactly is always preferred over a finer divisor, which would return more
/// data and need normalisation at read time.
pub fn find_lowest_valid_for_interval(
    rets: &[Retention],
    from: u32,
    ttl: u32,
    interval: u32,
) -> Option<(usize, Retention)> {
    for (i, ret) in rets.iter().enumerate().rev() {
        if ret.valid(from, ttl) && interval % ret.seconds_per_point == 0 {
            return Some((i, *ret));
        }
    }
    None
}

/// Intervals of all retentions valid for `(from, ttl)`, in ladder order
pub fn valid_intervals(rets: &[Retention], from: u32, ttl: u32) -> Vec<u32> {
    rets.iter()
        .filter(|ret| ret.valid(from, ttl))
        .map(|ret| ret.seconds_per_point)
        .collect()
}
