//! lodes - download, filter and aggregate LEHD LODES commuting data.
//!
//! Retrieves the state-partitioned WAC/RAC/OD files from the LODES7
//! archive, filters them to caller-supplied areas of interest (GEOIDs of
//! any granularity), aggregates the job counts to a requested geography
//! level, and optionally joins the result to centroid coordinates for
//! mapping.

pub mod client;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod geo;
pub mod geoid;
pub mod states;
pub mod table;

#[cfg(test)]
mod testutil;

pub use client::{LodesClient, MAX_YEAR, MIN_YEAR};
pub use engine::AreaSpec;
pub use error::{Error, FetchError, Result};
pub use fetch::{Dataset, Fetcher, HttpFetcher, JobType, Segment};
pub use geo::{LineTable, PointTable};
pub use geoid::{infer_level, truncate, GeographyLevel};
pub use table::{KeyColumn, LodesRow, LodesTable, Role};
