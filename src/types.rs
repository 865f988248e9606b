//! Core identifier types shared across the query layer
//!
//! # Key Types
//!
//! - **`SchemaId`**: Identifies a retention schema (a named group of series
//!   sharing one rollup ladder)
//! - **`SeriesId`**: Unique identifier for a time-series (128-bit integer)
//! - **`PnGroupId`**: Identifies a pre-normalisation group; requests in the
//!   same group are combined downstream and must be fetched at a common
//!   output interval

/// Identifier of a retention schema.
///
/// Schemas are declared in configuration and assigned dense 16-bit ids in
/// declaration order. Every series maps to exactly one schema.
pub type SchemaId = u16;

/// Unique identifier for a time-series
///
/// A 128-bit unsigned integer that uniquely identifies a time-series across
/// the system, giving sufficient space for globally unique IDs without
/// collision concerns.
pub type SeriesId = u128;

/// Identifier of a pre-normalisation group.
///
/// Requests that will be combined by a cross-series function downstream are
/// tagged with the same group id so the planner can force them onto one
/// output interval.
pub type PnGroupId = u64;
