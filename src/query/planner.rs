//! Fetch request planner
//!
//! Given a batch of raw point-fetch requests sharing one window, decide for
//! every request which rollup archive to read and at which interval points
//! will be emitted, subject to:
//!
//! - retention readiness and time-to-live constraints,
//! - the caller's max-data-points hint (display density),
//! - soft and hard caps on the total number of points fetched,
//! - a common output interval for requests that are combined downstream.
//!
//! # Planning Phases
//!
//! ```text
//! RequestBatch
//!      │
//!      ▼
//! ┌──────────────┐
//! │  Partition   │  PN-group membership × MDP-optimisability × schema
//! └──────┬───────┘
//!        ▼
//! ┌──────────────┐
//! │ Initial plan │  optimisable: coarsest interval keeping >= MDP/2 points
//! └──────┬───────┘  others: finest interval retention still allows
//!        ▼
//! ┌──────────────┐
//! │  Soft limit  │  coarsen non-optimisable buckets until under the cap
//! └──────┬───────┘
//!        ▼
//! ┌──────────────┐
//! │  Hard limit  │  reject outright when still over
//! └──────┬───────┘
//!        ▼
//!    ReqsPlan (+ metrics)
//! ```
//!
//! MDP-optimisable requests may be reduced down to MDP/2 points but no
//! lower; MDP typically matches a panel's pixel width, so half of that is
//! still dense enough to carry the same information. Requests in one
//! pre-normalisation group are combined downstream anyway, so reading them
//! from a coarser archive loses nothing.
//!
//! The planner is synchronous and performs no I/O; its only shared input is
//! a catalogue snapshot taken at the start of the call, and it mutates only
//! the requests owned by the caller's batch.

use crate::config::PlannerConfig;
use crate::error::PlanError;
use crate::metrics::{PlannerMetrics, PrometheusMetrics};
use crate::query::intervals::{highest_res_lcm, lcm_of, lowest_res_lcm, valid_intervals_set};
use crate::query::partition::{ReqsPlan, RequestBatch, SchemaBuckets};
use crate::query::request::FetchRequest;
use crate::query::select::{find_highest_res, find_lowest_valid_for_interval};
use crate::retention::{SchemaCatalog, SharedCatalog};
use crate::types::{PnGroupId, SchemaId};
use std::fmt;
use std::sync::Arc;

/// Plans fetch request batches against the schema catalogue
pub struct RequestPlanner {
    catalog: Arc<SharedCatalog>,
    metrics: Arc<dyn PlannerMetrics>,
    soft_limit: u32,
    hard_limit: u32,
    default_mdp: u32,
}

impl fmt::Debug for RequestPlanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestPlanner")
            .field("soft_limit", &self.soft_limit)
            .field("hard_limit", &self.hard_limit)
            .field("default_mdp", &self.default_mdp)
            .finish_non_exhaustive()
    }
}

impl RequestPlanner {
    /// Create a planner with default settings
    pub fn new(catalog: Arc<SharedCatalog>) -> Self {
        Self::with_config(catalog, &PlannerConfig::default())
    }

    /// Create a planner from configuration
    pub fn with_config(catalog: Arc<SharedCatalog>, config: &PlannerConfig) -> Self {
        Self {
            catalog,
            metrics: Arc::new(PrometheusMetrics),
            soft_limit: config.max_points_soft,
            hard_limit: config.max_points_hard,
            default_mdp: config.default_mdp,
        }
    }

    /// Replace the metrics sink
    pub fn with_metrics(mut self, metrics: Arc<dyn PlannerMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// The configured fallback max-data-points hint
    pub fn default_mdp(&self) -> u32 {
        self.default_mdp
    }

    /// Plan a batch using the configured default MDP hint
    pub fn plan_batch<'a>(
        &self,
        now: u32,
        from: u32,
        to: u32,
        batch: &'a mut RequestBatch,
    ) -> Result<ReqsPlan<'a>, PlanError> {
        self.plan(now, from, to, batch, self.default_mdp)
    }

    /// Plan every request in the batch.
    ///
    /// All requests are assumed to share the `[from, to)` window; `now`
    /// anchors the TTL check. On success every request carries its chosen
    /// archive, archive interval, output interval and normalisation factor,
    /// and the returned view groups them the way they were planned.
    ///
    /// Fails with [`PlanError::Unsatisfiable`] when some schema has no
    /// archive covering the window, and with [`PlanError::TooManyPoints`]
    /// when the batch would fetch more than the hard cap even after
    /// coarsening. A window further back than any archive covers, or
    /// starting in the future, simply yields no valid retention.
    ///
    /// # Panics
    ///
    /// Panics when `plan_mdp` is 0 or a request names a schema missing from
    /// the catalogue; both are contract breaches in the caller.
    pub fn plan<'a>(
        &self,
        now: u32,
        from: u32,
        to: u32,
        batch: &'a mut RequestBatch,
        plan_mdp: u32,
    ) -> Result<ReqsPlan<'a>, PlanError> {
        assert!(plan_mdp > 0, "plan_mdp must be positive");

        let catalog = self.catalog.snapshot();
        let mut rp = ReqsPlan::new(batch);
        // a window starting after now wraps into an unserveable ttl, which
        // is exactly what makes every retention invalid below
        let ttl = now.wrapping_sub(from);

        tracing::debug!(
            requests = rp.len(),
            pngroups = rp.pngroups.len(),
            from,
            to,
            plan_mdp,
            "planning fetch batch"
        );

        // 1) initial parameters per partition
        for split in rp.pngroups.values_mut() {
            if split.mdp_yes.has_data()
                && !plan_lowest_res_for_mdp_multi(
                    &catalog,
                    from,
                    to,
                    ttl,
                    plan_mdp,
                    &mut split.mdp_yes,
                )
            {
                return Err(PlanError::Unsatisfiable);
            }
            if split.mdp_no.has_data()
                && !plan_highest_res_multi(&catalog, from, ttl, &mut split.mdp_no)
            {
                return Err(PlanError::Unsatisfiable);
            }
        }
        for (schema, reqs) in rp.single.mdp_yes.iter_mut() {
            if !reqs.is_empty()
                && !plan_lowest_res_for_mdp_singles(&catalog, from, plan_mdp, schema, reqs)
            {
                return Err(PlanError::Unsatisfiable);
            }
        }
        for (schema, reqs) in rp.single.mdp_no.iter_mut() {
            if !reqs.is_empty() && !plan_highest_res_singles(&catalog, from, ttl, schema, reqs) {
                return Err(PlanError::Unsatisfiable);
            }
        }

        // 2) pick coarser data as needed to honor the soft cap
        if self.soft_limit > 0 && rp.points_fetch() > u64::from(self.soft_limit) {
            self.honor_soft_limit(&catalog, from, ttl, &mut rp);
        }

        // 3) reject what still breaches the hard cap
        if self.hard_limit > 0 && rp.points_fetch() > u64::from(self.hard_limit) {
            return Err(PlanError::TooManyPoints);
        }

        // 4) send out some metrics and we're done
        self.emit_metrics(&rp, plan_mdp);
        tracing::debug!(
            points_fetch = rp.points_fetch(),
            points_return = rp.points_return(plan_mdp),
            "planned fetch batch"
        );

        Ok(rp)
    }

    /// Coarsen non-MDP-optimisable buckets until the batch fits the soft cap
    /// or nothing can be reduced further.
    ///
    /// The MDP-optimisable halves already saw an aggressive reduction in the
    /// initial phase, so only the conservative halves are revisited.
    /// PN-groups are walked in ascending order of request count, then
    /// singles in ascending schema order; the ordering is a stability
    /// heuristic, not an optimality claim. Groups spanning several schemas
    /// often shed points by adjusting only some member schemas, so singles
    /// may coarsen faster than groups.
    fn honor_soft_limit(
        &self,
        catalog: &SchemaCatalog,
        from: u32,
        ttl: u32,
        rp: &mut ReqsPlan<'_>,
    ) {
        let soft = u64::from(self.soft_limit);
        tracing::debug!(
            points_fetch = rp.points_fetch(),
            soft_limit = soft,
            "batch exceeds soft points cap, coarsening"
        );

        let mut groups_by_len: Vec<PnGroupId> = rp.pngroups.keys().copied().collect();
        groups_by_len.sort_by_key(|group| rp.pngroups[group].len());
        let single_schemas: Vec<SchemaId> = rp.single.mdp_no.schema_ids();

        let mut progress = true;
        while rp.points_fetch() > soft && progress {
            progress = false;
            for group in &groups_by_len {
                let split = rp
                    .pngroups
                    .get_mut(group)
                    .expect("group order was derived from this map");
                if split.mdp_no.has_data()
                    && reduce_res_multi(catalog, from, ttl, &mut split.mdp_no)
                {
                    progress = true;
                    if rp.points_fetch() <= soft {
                        return;
                    }
                }
            }
            for &schema in &single_schemas {
                let Some(reqs) = rp.single.mdp_no.bucket_mut(schema) else {
                    continue;
                };
                if !reqs.is_empty() && reduce_res_singles(catalog, from, ttl, schema, reqs) {
                    progress = true;
                    if rp.points_fetch() <= soft {
                        return;
                    }
                }
            }
        }
        tracing::debug!(
            points_fetch = rp.points_fetch(),
            "no further reduction possible"
        );
    }

    fn emit_metrics(&self, rp: &ReqsPlan<'_>, plan_mdp: u32) {
        let splits = std::iter::once(&rp.single).chain(rp.pngroups.values());
        for split in splits {
            for buckets in [&split.mdp_yes, &split.mdp_no] {
                for (archive, count) in buckets.bucket_summaries() {
                    self.metrics
                        .observe_chosen_archive((archive * count) as u32);
                }
            }
        }
        self.metrics.observe_points_fetched(rp.points_fetch());
        self.metrics
            .observe_points_returned(rp.points_return(plan_mdp));
    }
}

/// Plan a singles bucket to the finest resolution retention allows
fn plan_highest_res_singles(
    catalog: &SchemaCatalog,
    from: u32,
    ttl: u32,
    schema: SchemaId,
    reqs: &mut [&mut FetchRequest],
) -> bool {
    let rets = catalog.get(schema);
    let Some((archive, ret)) = find_highest_res(rets.as_slice(), from, ttl) else {
        return false;
    };
    for req in reqs.iter_mut() {
        req.plan(archive, ret);
    }
    true
}

/// Plan a singles bucket to the coarsest archive still returning at least
/// `mdp / 2` points.
///
/// Walks the ladder coarsest-first, probing each ready candidate against the
/// bucket's first request; the first candidate meeting the threshold wins,
/// and when none does the finest ready archive is kept. Fails only when no
/// archive is ready for the window.
fn plan_lowest_res_for_mdp_singles(
    catalog: &SchemaCatalog,
    from: u32,
    mdp: u32,
    schema: SchemaId,
    reqs: &mut [&mut FetchRequest],
) -> bool {
    let Some((probe, rest)) = reqs.split_first_mut() else {
        return false;
    };
    let rets = catalog.get(schema);
    let mut chosen = None;
    for (i, ret) in rets.as_slice().iter().enumerate().rev() {
        // skip non-ready option
        if ret.ready > from {
            continue;
        }
        chosen = Some((i, *ret));
        probe.plan(i, *ret);
        if probe.points_fetch() >= mdp / 2 {
            break;
        }
    }
    let Some((archive, ret)) = chosen else {
        return false;
    };
    // the probe already carries the final plan
    for req in rest.iter_mut() {
        req.plan(archive, ret);
    }
    true
}

/// Plan a multi-schema bucket set to the finest common output interval.
///
/// Each schema is planned to its own finest valid archive first; the common
/// interval is the LCM of every distinct archive interval that step
/// produced. Distinct intervals can appear even within one schema, because
/// raw reads deliver each series' native cadence rather than the schema's
/// nominal one.
fn plan_highest_res_multi(
    catalog: &SchemaCatalog,
    from: u32,
    ttl: u32,
    buckets: &mut SchemaBuckets<'_>,
) -> bool {
    let mut intervals: Vec<u32> = Vec::new();
    for (schema, reqs) in buckets.iter_mut() {
        if reqs.is_empty() {
            continue;
        }
        let rets = catalog.get(schema);
        let Some((archive, ret)) = find_highest_res(rets.as_slice(), from, ttl) else {
            return false;
        };
        for req in reqs.iter_mut() {
            req.plan(archive, ret);
            if !intervals.contains(&req.arch_interval) {
                intervals.push(req.arch_interval);
            }
        }
    }
    // an LCM beyond 32 bits cannot be served as a common interval
    let Some(interval) = lcm_of(&intervals) else {
        return false;
    };
    for (_, reqs) in buckets.iter_mut() {
        for req in reqs.iter_mut() {
            req.adjust_to(interval);
        }
    }
    true
}

/// Plan a multi-schema bucket set to one common interval such that every
/// request still returns at least `mdp / 2` points.
///
/// Planning each schema to its own coarsest acceptable interval and then
/// aligning to their LCM could overshoot into too-coarse territory, so
/// instead the candidate LCMs themselves are searched: the coarsest one not
/// exceeding `2 * (to - from) / mdp`, scored toward cheaper reads.
fn plan_lowest_res_for_mdp_multi(
    catalog: &SchemaCatalog,
    from: u32,
    to: u32,
    ttl: u32,
    mdp: u32,
    buckets: &mut SchemaBuckets<'_>,
) -> bool {
    let span = u64::from(to.saturating_sub(from));
    let max_interval = u32::try_from(2 * span / u64::from(mdp)).unwrap_or(u32::MAX);

    let Some(set) = valid_intervals_set(catalog, buckets, from, ttl) else {
        return false;
    };
    let interval = lowest_res_lcm(catalog, buckets, from, ttl, 0, max_interval, &set);
    plan_to_multi(catalog, from, ttl, interval, buckets);
    true
}

/// Plan every request of the bucket set to the given common interval.
///
/// # Panics
///
/// Panics when a schema cannot deliver `interval`; callers derive the
/// interval from the same buckets, so a miss is an internal inconsistency.
fn plan_to_multi(
    catalog: &SchemaCatalog,
    from: u32,
    ttl: u32,
    interval: u32,
    buckets: &mut SchemaBuckets<'_>,
) {
    for (schema, reqs) in buckets.iter_mut() {
        if reqs.is_empty() {
            continue;
        }
        let rets = catalog.get(schema);
        let (archive, ret) = find_lowest_valid_for_interval(rets.as_slice(), from, ttl, interval)
            .unwrap_or_else(|| {
                panic!(
                    "no retention of schema {} can deliver planned interval {}s",
                    schema, interval
                )
            });
        for req in reqs.iter_mut() {
            req.plan(archive, ret);
            if interval != req.arch_interval {
                req.plan_normalization(interval);
            }
        }
    }
}

/// Coarsen a planned singles bucket by one retention step.
///
/// Requests are already set up to fetch as little as possible for their
/// output interval, so the only way to fetch fewer points is to emit at a
/// coarser one: the finest valid retention coarser than the current output
/// interval. Returns whether a reduction was applied.
fn reduce_res_singles(
    catalog: &SchemaCatalog,
    from: u32,
    ttl: u32,
    schema: SchemaId,
    reqs: &mut [&mut FetchRequest],
) -> bool {
    let Some(first) = reqs.first() else {
        return false;
    };
    let cur_out = first.out_interval;
    let rets = catalog.get(schema);
    let found = rets
        .as_slice()
        .iter()
        .enumerate()
        .find(|(_, ret)| ret.valid(from, ttl) && ret.seconds_per_point > cur_out);
    let Some((archive, ret)) = found.map(|(i, ret)| (i, *ret)) else {
        return false;
    };
    for req in reqs.iter_mut() {
        req.plan(archive, ret);
    }
    true
}

/// Coarsen a planned multi-schema bucket set to the next common interval.
///
/// Returns whether a reduction was applied; false when no valid combination
/// yields an interval coarser than the current one.
fn reduce_res_multi(
    catalog: &SchemaCatalog,
    from: u32,
    ttl: u32,
    buckets: &mut SchemaBuckets<'_>,
) -> bool {
    let cur_out = buckets.out_interval();
    let Some(set) = valid_intervals_set(catalog, buckets, from, ttl) else {
        return false;
    };
    let interval = highest_res_lcm(cur_out.saturating_add(1), u32::MAX, &set);
    if interval == 0 {
        return false;
    }
    plan_to_multi(catalog, from, ttl, interval, buckets);
    true
}
