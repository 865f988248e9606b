//! Request bundles and the partitioned planning view
//!
//! The caller hands the planner a [`RequestBatch`] (a flat bundle of
//! requests sharing one window). Planning starts by deriving a
//! [`ReqsPlan`]: the same requests partitioned three ways —
//!
//! - by pre-normalisation group membership (grouped vs single),
//! - by MDP-optimisability within each of those,
//! - by schema within each of *those*.
//!
//! The view borrows the batch's requests mutably and in place; planning a
//! bucket mutates the caller's requests directly, so there is no re-plan
//! divergence between a copy and the source of truth. All maps are ordered
//! so iteration (and therefore planning) is deterministic.

use crate::query::request::FetchRequest;
use crate::types::{PnGroupId, SchemaId};
use std::collections::BTreeMap;

/// Flat bundle of un-planned requests, all sharing one `[from, to)` window
#[derive(Debug, Default, Clone)]
pub struct RequestBatch {
    requests: Vec<FetchRequest>,
}

impl RequestBatch {
    /// Create an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a request to the batch
    pub fn add(&mut self, req: FetchRequest) {
        self.requests.push(req);
    }

    /// Number of requests in the batch
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Whether the batch holds no requests
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// The requests, in insertion order
    pub fn requests(&self) -> &[FetchRequest] {
        &self.requests
    }

    pub(crate) fn requests_mut(&mut self) -> &mut Vec<FetchRequest> {
        &mut self.requests
    }
}

impl FromIterator<FetchRequest> for RequestBatch {
    fn from_iter<I: IntoIterator<Item = FetchRequest>>(iter: I) -> Self {
        Self {
            requests: iter.into_iter().collect(),
        }
    }
}

/// Requests of one planning bucket, keyed by schema
///
/// Holds mutable borrows into the caller's batch. Ordered by schema id so
/// planning and reduction walk schemas deterministically.
#[derive(Debug, Default)]
pub struct SchemaBuckets<'a> {
    buckets: BTreeMap<SchemaId, Vec<&'a mut FetchRequest>>,
}

impl<'a> SchemaBuckets<'a> {
    fn push(&mut self, req: &'a mut FetchRequest) {
        self.buckets.entry(req.schema_id).or_default().push(req);
    }

    /// Whether any bucket holds requests
    pub fn has_data(&self) -> bool {
        self.buckets.values().any(|reqs| !reqs.is_empty())
    }

    /// Total number of requests across all schemas
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Whether no requests are present
    pub fn is_empty(&self) -> bool {
        !self.has_data()
    }

    /// The common output interval of this bucket's requests.
    ///
    /// Within a planned pre-normalisation half all requests share one
    /// `out_interval`, so reading any request suffices.
    ///
    /// # Panics
    ///
    /// Panics when the bucket set is empty; callers gate on [`has_data`].
    ///
    /// [`has_data`]: SchemaBuckets::has_data
    pub fn out_interval(&self) -> u32 {
        self.requests()
            .next()
            .expect("out_interval queried on an empty bucket set")
            .out_interval
    }

    /// Sum of points the planned requests will fetch
    pub fn points_fetch(&self) -> u64 {
        self.requests().map(|req| u64::from(req.points_fetch())).sum()
    }

    /// All requests, schema order then insertion order
    pub fn requests(&self) -> impl Iterator<Item = &FetchRequest> {
        self.buckets.values().flat_map(|reqs| reqs.iter().map(|r| &**r))
    }

    pub(crate) fn schema_ids(&self) -> Vec<SchemaId> {
        self.buckets.keys().copied().collect()
    }

    /// Populated schemas with their request counts, in schema-id order
    pub(crate) fn schema_counts(&self) -> impl Iterator<Item = (SchemaId, usize)> + '_ {
        self.buckets
            .iter()
            .filter(|(_, reqs)| !reqs.is_empty())
            .map(|(id, reqs)| (*id, reqs.len()))
    }

    /// Chosen archive and request count per populated bucket
    pub(crate) fn bucket_summaries(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.buckets
            .values()
            .filter(|reqs| !reqs.is_empty())
            .map(|reqs| (reqs[0].archive, reqs.len()))
    }

    pub(crate) fn bucket_mut(
        &mut self,
        schema: SchemaId,
    ) -> Option<&mut Vec<&'a mut FetchRequest>> {
        self.buckets.get_mut(&schema)
    }

    pub(crate) fn iter_mut(
        &mut self,
    ) -> impl Iterator<Item = (SchemaId, &mut Vec<&'a mut FetchRequest>)> {
        self.buckets.iter_mut().map(|(id, reqs)| (*id, reqs))
    }
}

/// One partition's requests split by MDP-optimisability
#[derive(Debug, Default)]
pub struct MdpSplit<'a> {
    /// Requests tolerant to coarser-than-native resolution
    pub mdp_yes: SchemaBuckets<'a>,
    /// Requests that must keep the finest resolution retention allows
    pub mdp_no: SchemaBuckets<'a>,
}

impl<'a> MdpSplit<'a> {
    /// Total number of requests in both halves
    pub fn len(&self) -> usize {
        self.mdp_yes.len() + self.mdp_no.len()
    }

    /// Whether both halves are empty
    pub fn is_empty(&self) -> bool {
        self.mdp_yes.is_empty() && self.mdp_no.is_empty()
    }

    fn requests(&self) -> impl Iterator<Item = &FetchRequest> {
        self.mdp_yes.requests().chain(self.mdp_no.requests())
    }
}

/// The partitioned planning view over one batch
///
/// Exists only for the duration of one planning call; owns nothing, borrows
/// everything from the caller's [`RequestBatch`].
#[derive(Debug)]
pub struct ReqsPlan<'a> {
    /// Per pre-normalisation group: that group's requests, MDP-split
    pub(crate) pngroups: BTreeMap<PnGroupId, MdpSplit<'a>>,
    /// Requests not belonging to any group, MDP-split
    pub(crate) single: MdpSplit<'a>,
}

impl<'a> ReqsPlan<'a> {
    /// Partition a batch into the planning view
    pub fn new(batch: &'a mut RequestBatch) -> Self {
        let mut plan = Self {
            pngroups: BTreeMap::new(),
            single: MdpSplit::default(),
        };
        for req in batch.requests_mut().iter_mut() {
            let optimisable = req.mdp_optimisable;
            let split = match req.pngroup {
                Some(group) => plan.pngroups.entry(group).or_default(),
                None => &mut plan.single,
            };
            if optimisable {
                split.mdp_yes.push(req);
            } else {
                split.mdp_no.push(req);
            }
        }
        plan
    }

    /// Total number of requests in the view
    pub fn len(&self) -> usize {
        self.single.len() + self.pngroups.values().map(MdpSplit::len).sum::<usize>()
    }

    /// Whether the view holds no requests
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of points all planned requests will fetch
    pub fn points_fetch(&self) -> u64 {
        self.requests().map(|req| u64::from(req.points_fetch())).sum()
    }

    /// Sum of points all planned requests will return under `plan_mdp`
    /// runtime consolidation
    pub fn points_return(&self, plan_mdp: u32) -> u64 {
        self.requests()
            .map(|req| u64::from(req.points_return(plan_mdp)))
            .sum()
    }

    /// All requests in the view: singles first, then groups in id order
    pub fn requests(&self) -> impl Iterator<Item = &FetchRequest> {
        self.single
            .requests()
            .chain(self.pngroups.values().flat_map(|split| split.requests()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retention::Retention;

    fn unplanned(schema: SchemaId, series: u128) -> FetchRequest {
        FetchRequest::new(schema, series, 0, 3600, 800, 10).unwrap()
    }

    #[test]
    fn test_partitioning_routes_by_group_and_flag() {
        let mut batch = RequestBatch::new();
        batch.add(unplanned(0, 1));
        batch.add(unplanned(0, 2).optimisable());
        batch.add(unplanned(1, 3).with_pngroup(9));
        batch.add(unplanned(2, 4).with_pngroup(9).optimisable());

        let plan = ReqsPlan::new(&mut batch);
        assert_eq!(plan.len(), 4);
        assert_eq!(plan.single.mdp_no.len(), 1);
        assert_eq!(plan.single.mdp_yes.len(), 1);
        let group = &plan.pngroups[&9];
        assert_eq!(group.mdp_no.len(), 1);
        assert_eq!(group.mdp_yes.len(), 1);
    }

    #[test]
    fn test_buckets_group_by_schema_in_order() {
        let mut batch = RequestBatch::new();
        batch.add(unplanned(5, 1));
        batch.add(unplanned(2, 2));
        batch.add(unplanned(5, 3));

        let plan = ReqsPlan::new(&mut batch);
        assert_eq!(plan.single.mdp_no.schema_ids(), vec![2, 5]);
        assert_eq!(plan.single.mdp_no.len(), 3);
    }

    #[test]
    fn test_points_fetch_sums_planned_requests() {
        let mut batch = RequestBatch::new();
        batch.add(unplanned(0, 1));
        batch.add(unplanned(0, 2));

        let mut plan = ReqsPlan::new(&mut batch);
        let ret = Retention::new(10, 100_000, 0);
        for (_, reqs) in plan.single.mdp_no.iter_mut() {
            for req in reqs.iter_mut() {
                req.plan(0, ret);
            }
        }
        // 3600s window at 10s: 360 points each
        assert_eq!(plan.points_fetch(), 720);
        assert_eq!(plan.single.mdp_no.out_interval(), 10);
    }
}
