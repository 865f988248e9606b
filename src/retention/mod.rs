//! Retention schemas and the process-wide schema catalogue
//!
//! A **retention** describes one rollup archive: its native interval, how
//! many points it keeps, and from which wall-clock instant it is populated.
//! A **schema** is a named group of series sharing an ordered ladder of
//! retentions (finest first, index 0 is the raw archive). The **catalogue**
//! maps schema ids to their retention ladders and is the only piece of
//! shared state the planner reads.
//!
//! The catalogue is updated rarely (config reload) and read on every
//! planning call. Readers take an `Arc` snapshot up front so a call observes
//! a stable set of retentions even if a reload lands mid-flight.

use crate::error::Error;
use crate::types::SchemaId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// One rollup archive of a schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Retention {
    /// Native interval of the archive in seconds
    pub seconds_per_point: u32,
    /// Number of points the archive keeps
    pub number_of_points: u32,
    /// Earliest wall-clock instant for which this archive is populated.
    ///
    /// Freshly configured rollups start empty; until enough time has passed
    /// they must not serve reads for windows that predate their creation.
    pub ready: u32,
}

impl Retention {
    /// Create a retention descriptor
    pub fn new(seconds_per_point: u32, number_of_points: u32, ready: u32) -> Self {
        Self {
            seconds_per_point,
            number_of_points,
            ready,
        }
    }

    /// Oldest age (in seconds) this archive covers
    pub fn max_retention(&self) -> u32 {
        self.seconds_per_point.saturating_mul(self.number_of_points)
    }

    /// Whether this archive can serve a read starting at `from` that must
    /// reach back `ttl` seconds
    pub fn valid(&self, from: u32, ttl: u32) -> bool {
        self.ready <= from && self.max_retention() >= ttl
    }
}

/// Ordered ladder of retentions for one schema, finest first
///
/// Index 0 is the raw archive. The ordering is load-bearing: the selection
/// primitives scan ascending for "finest valid" and descending for "coarsest
/// divisor" semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPolicy {
    rets: Vec<Retention>,
}

impl RetentionPolicy {
    /// Build a policy from a retention list.
    ///
    /// The list must be non-empty, every archive must have a positive
    /// interval and point count, and intervals must be strictly ascending.
    pub fn new(rets: Vec<Retention>) -> Result<Self, Error> {
        if rets.is_empty() {
            return Err(Error::Configuration(
                "retention policy must declare at least one archive".to_string(),
            ));
        }
        for ret in &rets {
            if ret.seconds_per_point == 0 {
                return Err(Error::Configuration(
                    "retention archive declares a zero interval".to_string(),
                ));
            }
            if ret.number_of_points == 0 {
                return Err(Error::Configuration(format!(
                    "retention archive at {}s declares zero points",
                    ret.seconds_per_point
                )));
            }
        }
        for pair in rets.windows(2) {
            if pair[1].seconds_per_point <= pair[0].seconds_per_point {
                return Err(Error::Configuration(format!(
                    "retention intervals must be strictly ascending: {}s followed by {}s",
                    pair[0].seconds_per_point, pair[1].seconds_per_point
                )));
            }
        }
        Ok(Self { rets })
    }

    /// The retention at `archive` index
    ///
    /// # Panics
    ///
    /// Panics when the index is out of range; archive indexes only ever come
    /// from selections over this same ladder.
    pub fn get(&self, archive: usize) -> Retention {
        self.rets[archive]
    }

    /// Retentions in ladder order (finest first)
    pub fn as_slice(&self) -> &[Retention] {
        &self.rets
    }

    /// Number of archives in the ladder
    pub fn len(&self) -> usize {
        self.rets.len()
    }

    /// Whether the ladder is empty (never true for a constructed policy)
    pub fn is_empty(&self) -> bool {
        self.rets.is_empty()
    }
}

/// A named group of series sharing one retention ladder
#[derive(Debug, Clone)]
pub struct Schema {
    /// Human-readable schema name (e.g. the match pattern it was built from)
    pub name: String,
    /// Dense id assigned in declaration order
    pub id: SchemaId,
    /// The schema's rollup ladder
    pub retentions: RetentionPolicy,
}

impl Schema {
    /// Create a schema
    pub fn new(name: impl Into<String>, id: SchemaId, retentions: RetentionPolicy) -> Self {
        Self {
            name: name.into(),
            id,
            retentions,
        }
    }
}

/// Read-only lookup from schema id to retention ladder
///
/// Built once from configuration; planning calls only ever pass ids that
/// came out of this catalogue, so a missing id is a programmer error.
#[derive(Debug, Default)]
pub struct SchemaCatalog {
    schemas: BTreeMap<SchemaId, Schema>,
}

impl SchemaCatalog {
    /// Create an empty catalogue
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema, replacing any previous one with the same id
    pub fn insert(&mut self, schema: Schema) {
        self.schemas.insert(schema.id, schema);
    }

    /// The retention ladder for `id`
    ///
    /// # Panics
    ///
    /// Panics when `id` is not in the catalogue. Callers only pass ids
    /// obtained from this catalogue; a miss indicates a contract breach
    /// elsewhere, not a recoverable condition.
    pub fn get(&self, id: SchemaId) -> &RetentionPolicy {
        match self.schemas.get(&id) {
            Some(schema) => &schema.retentions,
            None => panic!("schema {} is not in the catalogue", id),
        }
    }

    /// The full schema record for `id`, if present
    pub fn schema(&self, id: SchemaId) -> Option<&Schema> {
        self.schemas.get(&id)
    }

    /// Number of registered schemas
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Whether the catalogue is empty
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

/// Process-wide catalogue handle with snapshot semantics
///
/// Writers swap in a whole new catalogue on config reload; readers clone the
/// `Arc` once per planning call and work against that stable snapshot.
#[derive(Debug)]
pub struct SharedCatalog {
    inner: RwLock<Arc<SchemaCatalog>>,
}

impl SharedCatalog {
    /// Wrap a catalogue for shared use
    pub fn new(catalog: SchemaCatalog) -> Self {
        Self {
            inner: RwLock::new(Arc::new(catalog)),
        }
    }

    /// Current catalogue snapshot
    pub fn snapshot(&self) -> Arc<SchemaCatalog> {
        self.inner.read().clone()
    }

    /// Swap in a new catalogue; in-flight readers keep their old snapshot
    pub fn replace(&self, catalog: SchemaCatalog) {
        *self.inner.write() = Arc::new(catalog);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ladder() -> RetentionPolicy {
        RetentionPolicy::new(vec![
            Retention::new(10, 60_480, 0),
            Retention::new(60, 43_200, 0),
            Retention::new(3600, 9_600, 0),
        ])
        .unwrap()
    }

    #[test]
    fn test_max_retention() {
        let ret = Retention::new(60, 43_200, 0);
        assert_eq!(ret.max_retention(), 2_592_000); // 30 days
    }

    #[test]
    fn test_valid_requires_ready_and_ttl() {
        let ret = Retention::new(10, 8_640, 500); // 1 day of 10s data, ready at t=500
        assert!(ret.valid(500, 86_400));
        assert!(!ret.valid(499, 86_400), "not yet populated at from=499");
        assert!(!ret.valid(500, 86_401), "ttl exceeds archive coverage");
    }

    #[test]
    fn test_policy_rejects_unsorted_ladder() {
        let err = RetentionPolicy::new(vec![Retention::new(60, 100, 0), Retention::new(10, 100, 0)]);
        assert!(err.is_err());
        let err = RetentionPolicy::new(vec![]);
        assert!(err.is_err());
    }

    #[test]
    fn test_policy_rejects_degenerate_archives() {
        // a zero interval would divide the window span downstream
        let err = RetentionPolicy::new(vec![Retention::new(0, 100, 0), Retention::new(10, 100, 0)]);
        assert!(err.is_err());
        let err = RetentionPolicy::new(vec![Retention::new(10, 0, 0)]);
        assert!(err.is_err());
    }

    #[test]
    fn test_catalog_lookup() {
        let mut catalog = SchemaCatalog::new();
        catalog.insert(Schema::new("default", 0, ladder()));
        assert_eq!(catalog.get(0).len(), 3);
        assert_eq!(catalog.schema(0).unwrap().name, "default");
    }

    #[test]
    #[should_panic(expected = "not in the catalogue")]
    fn test_catalog_missing_schema_panics() {
        let catalog = SchemaCatalog::new();
        catalog.get(7);
    }

    #[test]
    fn test_shared_snapshot_is_stable_across_replace() {
        let mut catalog = SchemaCatalog::new();
        catalog.insert(Schema::new("default", 0, ladder()));
        let shared = SharedCatalog::new(catalog);

        let snap = shared.snapshot();
        shared.replace(SchemaCatalog::new());

        // the old snapshot still resolves, the new one is empty
        assert_eq!(snap.get(0).len(), 3);
        assert!(shared.snapshot().is_empty());
    }
}
