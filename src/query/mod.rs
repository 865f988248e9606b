//! Fetch request planning for the query layer
//!
//! The entry point is [`RequestPlanner::plan`]: it takes a batch of raw
//! point-fetch requests, partitions it by pre-normalisation group,
//! MDP-optimisability and schema, assigns every request an archive and an
//! output interval, and enforces the soft/hard caps on fetch volume.
//!
//! The submodules follow the planning pipeline: [`request`] defines the
//! unit of work, [`partition`] the derived grouping, [`select`] the
//! single-ladder retention scans, [`intervals`] the cross-schema interval
//! combinatorics, and [`planner`] the staged orchestration.

pub mod intervals;
pub mod partition;
pub mod planner;
pub mod request;
pub mod select;

// Re-export main types
pub use intervals::{all_combinations, highest_res_lcm, lcm_of, lowest_res_lcm, valid_intervals_set};
pub use partition::{MdpSplit, ReqsPlan, RequestBatch, SchemaBuckets};
pub use planner::RequestPlanner;
pub use request::FetchRequest;
pub use select::{find_highest_res, find_lowest_valid_for_interval, valid_intervals};
