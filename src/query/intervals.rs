//! Interval-set combinatorics
//!
//! When requests spanning several schemas must emit points at one common
//! interval, the candidate intervals are the LCMs of every combination of
//! per-schema valid intervals. The search space is the Cartesian product of
//! the (de-duplicated) per-schema interval lists; with a handful of schemas
//! and short rollup ladders this stays small.
//!
//! Two selections run over the candidates:
//!
//! - [`lowest_res_lcm`] picks the coarsest candidate under a cap, scored by
//!   how much fetch volume the whole bucket saves,
//! - [`highest_res_lcm`] picks the finest candidate above a floor, used when
//!   coarsening an already-planned group one step.

use crate::query::partition::SchemaBuckets;
use crate::query::select::{find_lowest_valid_for_interval, valid_intervals};
use crate::retention::SchemaCatalog;

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Least common multiple of a set of intervals.
///
/// Returns `None` for an empty set or when the LCM does not fit in 32 bits;
/// an unrepresentable interval can never be served, so callers treat it the
/// same as a candidate out of range.
pub fn lcm_of(values: &[u32]) -> Option<u32> {
    let (&first, rest) = values.split_first()?;
    let mut acc = u64::from(first);
    for &v in rest {
        let v = u64::from(v);
        acc = acc / gcd(acc, v) * v;
        if acc > u64::from(u32::MAX) {
            return None;
        }
    }
    Some(acc as u32)
}

/// Cartesian product across the per-schema interval lists.
///
/// One combination per element of the product, in deterministic order: the
/// last list varies fastest. Empty input (or any empty list) produces no
/// combinations.
pub fn all_combinations(set: &[Vec<u32>]) -> Vec<Vec<u32>> {
    if set.is_empty() || set.iter().any(Vec::is_empty) {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(set.iter().map(Vec::len).product());
    let mut odometer = vec![0usize; set.len()];
    'outer: loop {
        out.push(
            odometer
                .iter()
                .zip(set)
                .map(|(&i, list)| list[i])
                .collect(),
        );
        let mut pos = set.len() - 1;
        loop {
            odometer[pos] += 1;
            if odometer[pos] < set[pos].len() {
                continue 'outer;
            }
            odometer[pos] = 0;
            if pos == 0 {
                break 'outer;
            }
            pos -= 1;
        }
    }
    out
}

/// Per-schema valid-interval lists for every schema with requests in the
/// bucket set.
///
/// Identical lists are contributed once; two schemas whose valid intervals
/// coincide cannot enlarge the combination space. Returns `None` when any
/// populated schema has no valid interval at all.
pub fn valid_intervals_set(
    catalog: &SchemaCatalog,
    buckets: &SchemaBuckets<'_>,
    from: u32,
    ttl: u32,
) -> Option<Vec<Vec<u32>>> {
    let mut set: Vec<Vec<u32>> = Vec::new();
    for (schema, _) in buckets.schema_counts() {
        let intervals = valid_intervals(catalog.get(schema).as_slice(), from, ttl);
        if intervals.is_empty() {
            return None;
        }
        if !set.contains(&intervals) {
            set.push(intervals);
        }
    }
    Some(set)
}

/// The in-range LCM candidate that lets the bucket read the least data.
///
/// Every combination's LCM inside `[min_interval, max_interval]` is scored
/// as the sum over schemas of `request count x seconds_per_point` of the
/// archive that would serve the candidate; coarser reads score higher, so
/// the maximum-score candidate moves the fewest points. Ties keep the first
/// candidate encountered. When no candidate lands in range, the smallest
/// LCM seen is returned instead.
///
/// # Panics
///
/// Panics when a schema in the bucket set cannot serve a candidate built
/// from its own valid intervals; that means the interval set and the bucket
/// set went out of sync, which is a bug in the caller.
#[allow(clippy::too_many_arguments)]
pub fn lowest_res_lcm(
    catalog: &SchemaCatalog,
    buckets: &SchemaBuckets<'_>,
    from: u32,
    ttl: u32,
    min_interval: u32,
    max_interval: u32,
    set: &[Vec<u32>],
) -> u32 {
    let mut max_score: u64 = 0;
    let mut lowest_seen = u32::MAX;
    let mut chosen = 0u32;

    for combo in all_combinations(set) {
        let Some(candidate) = lcm_of(&combo) else {
            continue;
        };
        lowest_seen = lowest_seen.min(candidate);
        if candidate < min_interval || candidate > max_interval {
            continue;
        }
        let mut score: u64 = 0;
        for (schema, count) in buckets.schema_counts() {
            let rets = catalog.get(schema);
            let (_, ret) = find_lowest_valid_for_interval(rets.as_slice(), from, ttl, candidate)
                .unwrap_or_else(|| {
                    panic!(
                        "no retention of schema {} can deliver candidate interval {}s",
                        schema, candidate
                    )
                });
            score += count as u64 * u64::from(ret.seconds_per_point);
        }
        if score > max_score {
            max_score = score;
            chosen = candidate;
        }
    }

    if chosen == 0 {
        lowest_seen
    } else {
        chosen
    }
}

/// The smallest LCM candidate inside `[min_interval, max_interval]`.
///
/// Returns 0 when no combination lands in range, which callers read as
/// "cannot coarsen any further".
pub fn highest_res_lcm(min_interval: u32, max_interval: u32, set: &[Vec<u32>]) -> u32 {
    let mut interval = 0u32;
    for combo in all_combinations(set) {
        let Some(candidate) = lcm_of(&combo) else {
            continue;
        };
        if candidate < min_interval || candidate > max_interval {
            continue;
        }
        if interval == 0 || candidate < interval {
            interval = candidate;
        }
    }
    interval
}
