//! Vireo TSDB query layer - rollup-aware fetch request planning
//!
//! This library plans point-fetch requests for a distributed time-series
//! database:
//! - Retention schemas with heterogeneous rollup ladders
//! - Archive selection under readiness and TTL constraints
//! - Max-data-points driven resolution reduction
//! - Common-interval alignment for requests combined downstream
//! - Soft and hard caps on total fetch volume

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod metrics;
pub mod query;
pub mod retention;
pub mod types;

// Re-export main types
pub use config::{Config, PlannerConfig};
pub use error::{Error, PlanError, Result};
pub use query::{FetchRequest, ReqsPlan, RequestBatch, RequestPlanner};
pub use retention::{Retention, RetentionPolicy, Schema, SchemaCatalog, SharedCatalog};
pub use types::{PnGroupId, SchemaId, SeriesId};
