//! Property-based tests for the fetch request planner
//!
//! Uses proptest to drive the planner with randomly generated retention
//! ladders, windows and batches, and checks the structural invariants every
//! successful plan must uphold:
//! - output intervals divide evenly by archive intervals
//! - pre-normalisation halves agree on one output interval
//! - archive assignments are consistent with the catalogue
//! - soft limits only ever coarsen, hard limits actually gate
//! - planning is deterministic and idempotent

use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

use vireo_tsdb::metrics::NoopMetrics;
use vireo_tsdb::{
    FetchRequest, PlannerConfig, RequestBatch, RequestPlanner, Retention, RetentionPolicy, Schema,
    SchemaCatalog, SharedCatalog,
};

const NOW: u32 = 1_700_000_000;

// =============================================================================
// Test Data Strategies
// =============================================================================

/// Strategy for a retention ladder: a raw archive plus up to three rollups
/// with strictly growing intervals
fn ladder_strategy() -> impl Strategy<Value = Vec<Retention>> {
    (
        prop_oneof![Just(1u32), Just(5), Just(10), Just(15), Just(30), Just(60)],
        prop::collection::vec((2u32..=6, 1_000u32..=50_000), 0..=3),
        50_000u32..=300_000,
    )
        .prop_map(|(base, steps, base_points)| {
            let mut rets = vec![Retention::new(base, base_points, 0)];
            let mut interval = base;
            for (factor, points) in steps {
                interval *= factor;
                rets.push(Retention::new(interval, points, 0));
            }
            rets
        })
}

/// One generated planning scenario: schemas, requests, window and limits
#[derive(Debug, Clone)]
struct PlannerCase {
    ladders: Vec<Vec<Retention>>,
    /// per request: (schema index, optimisable, group)
    reqs: Vec<(usize, bool, Option<u64>)>,
    span: u32,
    mdp: u32,
    soft: u32,
}

fn case_strategy() -> impl Strategy<Value = PlannerCase> {
    (
        prop::collection::vec(ladder_strategy(), 1..=3),
        60u32..=200_000,
        2u32..=2_000,
    )
        .prop_flat_map(|(ladders, span, mdp)| {
            let schemas = ladders.len();
            (
                Just(ladders),
                prop::collection::vec(
                    (
                        0..schemas,
                        any::<bool>(),
                        prop_oneof![Just(None), Just(Some(1u64)), Just(Some(2u64))],
                    ),
                    1..=6,
                ),
                Just(span),
                Just(mdp),
                0u32..=100_000,
            )
        })
        .prop_map(|(ladders, reqs, span, mdp, soft)| PlannerCase {
            ladders,
            reqs,
            span,
            mdp,
            soft,
        })
}

// =============================================================================
// Helper Functions
// =============================================================================

fn build_case(case: &PlannerCase) -> (Arc<SharedCatalog>, RequestBatch) {
    let mut catalog = SchemaCatalog::new();
    for (i, rets) in case.ladders.iter().enumerate() {
        catalog.insert(Schema::new(
            format!("schema-{}", i),
            i as u16,
            RetentionPolicy::new(rets.clone()).unwrap(),
        ));
    }
    let mut batch = RequestBatch::new();
    for (i, &(schema, optimisable, group)) in case.reqs.iter().enumerate() {
        let raw_interval = case.ladders[schema][0].seconds_per_point;
        let mut req = FetchRequest::new(
            schema as u16,
            i as u128,
            NOW - case.span,
            NOW,
            case.mdp,
            raw_interval,
        )
        .unwrap();
        if optimisable {
            req = req.optimisable();
        }
        if let Some(g) = group {
            req = req.with_pngroup(g);
        }
        batch.add(req);
    }
    (Arc::new(SharedCatalog::new(catalog)), batch)
}

fn planner_with(catalog: Arc<SharedCatalog>, soft: u32, hard: u32) -> RequestPlanner {
    RequestPlanner::with_config(
        catalog,
        &PlannerConfig {
            max_points_soft: soft,
            max_points_hard: hard,
            default_mdp: 800,
        },
    )
    .with_metrics(Arc::new(NoopMetrics))
}

fn assignments(batch: &RequestBatch) -> Vec<(usize, u32, u32, u32)> {
    batch
        .requests()
        .iter()
        .map(|r| (r.archive, r.arch_interval, r.out_interval, r.agg_num))
        .collect()
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    /// Every successfully planned request has a consistent archive
    /// assignment and an output interval divisible by its archive interval
    #[test]
    fn prop_planned_requests_are_consistent(case in case_strategy()) {
        let (catalog, mut batch) = build_case(&case);
        let planner = planner_with(catalog, case.soft, 0);
        let from = NOW - case.span;

        if planner.plan(NOW, from, NOW, &mut batch, case.mdp).is_err() {
            // a generated ladder may legitimately not cover the window
            return Ok(());
        }

        for req in batch.requests() {
            prop_assert!(req.arch_interval > 0);
            prop_assert_eq!(req.out_interval % req.arch_interval, 0);
            prop_assert_eq!(req.agg_num, req.out_interval / req.arch_interval);

            let ladder = &case.ladders[req.schema_id as usize];
            prop_assert!(req.archive < ladder.len());
            if req.archive == 0 {
                prop_assert_eq!(req.arch_interval, req.raw_interval);
            } else {
                prop_assert_eq!(req.arch_interval, ladder[req.archive].seconds_per_point);
            }
        }
    }

    /// Within one pre-normalisation group, each planned half emits all its
    /// requests at one shared output interval
    #[test]
    fn prop_group_halves_share_out_interval(case in case_strategy()) {
        let (catalog, mut batch) = build_case(&case);
        let planner = planner_with(catalog, case.soft, 0);
        let from = NOW - case.span;

        if planner.plan(NOW, from, NOW, &mut batch, case.mdp).is_err() {
            return Ok(());
        }

        let mut halves: HashMap<(u64, bool), u32> = HashMap::new();
        for req in batch.requests() {
            let Some(group) = req.pngroup else { continue };
            let interval = halves
                .entry((group, req.mdp_optimisable))
                .or_insert(req.out_interval);
            prop_assert_eq!(*interval, req.out_interval);
        }
    }

    /// A batch that plans successfully under a hard limit fetches no more
    /// than that limit
    #[test]
    fn prop_hard_limit_gates_fetch_volume(case in case_strategy(), hard in 1_000u64..=500_000) {
        let (catalog, mut batch) = build_case(&case);
        let planner = planner_with(catalog, case.soft, hard as u32);
        let from = NOW - case.span;

        match planner.plan(NOW, from, NOW, &mut batch, case.mdp) {
            Ok(plan) => prop_assert!(plan.points_fetch() <= hard),
            Err(_) => {}
        }
    }

    /// Soft-limit shaping never refines a request: output intervals only
    /// move toward coarser resolutions
    #[test]
    fn prop_soft_limit_only_coarsens(case in case_strategy()) {
        let from = NOW - case.span;

        let (catalog, mut unconstrained) = build_case(&case);
        let baseline = planner_with(catalog, 0, 0);
        if baseline.plan(NOW, from, NOW, &mut unconstrained, case.mdp).is_err() {
            return Ok(());
        }

        let (catalog, mut constrained) = build_case(&case);
        let limited = planner_with(catalog, case.soft.max(1), 0);
        if limited.plan(NOW, from, NOW, &mut constrained, case.mdp).is_err() {
            return Ok(());
        }

        for (base, shaped) in unconstrained.requests().iter().zip(constrained.requests()) {
            prop_assert!(shaped.out_interval >= base.out_interval);
        }
    }

    /// Planning an already-planned batch with identical inputs reproduces
    /// the same assignments
    #[test]
    fn prop_planning_is_idempotent(case in case_strategy()) {
        let (catalog, mut batch) = build_case(&case);
        let planner = planner_with(catalog, case.soft, 0);
        let from = NOW - case.span;

        if planner.plan(NOW, from, NOW, &mut batch, case.mdp).is_err() {
            return Ok(());
        }
        let first = assignments(&batch);

        planner.plan(NOW, from, NOW, &mut batch, case.mdp).unwrap();
        prop_assert_eq!(first, assignments(&batch));
    }

    /// A lone optimisable request either meets the half-MDP density target
    /// or ends up on the finest archive, never anything in between
    #[test]
    fn prop_optimisable_single_meets_density_or_is_finest(
        ladder in ladder_strategy(),
        span in 60u32..=200_000,
        mdp in 2u32..=2_000,
    ) {
        let mut catalog = SchemaCatalog::new();
        catalog.insert(Schema::new(
            "only",
            0,
            RetentionPolicy::new(ladder.clone()).unwrap(),
        ));
        let mut batch = RequestBatch::new();
        batch.add(
            FetchRequest::new(0, 1, NOW - span, NOW, mdp, ladder[0].seconds_per_point)
                .unwrap()
                .optimisable(),
        );

        let planner = planner_with(Arc::new(SharedCatalog::new(catalog)), 0, 0);
        planner.plan(NOW, NOW - span, NOW, &mut batch, mdp).unwrap();

        let req = &batch.requests()[0];
        prop_assert!(
            req.points_fetch() >= mdp / 2 || req.archive == 0,
            "archive {} fetches {} points, below mdp/2 = {}",
            req.archive,
            req.points_fetch(),
            mdp / 2
        );
    }
}
