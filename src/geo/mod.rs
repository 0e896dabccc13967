//! Joining tables to point coordinates for mapping.
//!
//! Coordinates come from the Census 2010 population-centroid reference
//! files, one per state per geography level (a single national file at
//! state level). The join is a left join: every input row is preserved and
//! rows without a reference match carry no geometry.

use std::collections::BTreeSet;

use geo_types::{LineString, Point};
use hashbrown::HashMap;
use tracing::info;

use crate::client::LodesClient;
use crate::error::{Error, FetchError, Result};
use crate::fetch::Fetcher;
use crate::geoid::{truncate, GeographyLevel};
use crate::table::{LodesTable, Role};

pub const CENPOP_BASE_URL: &str = "https://www2.census.gov/geo/docs/reference/cenpop2010";

/// A table with one point per row, `None` where the join found no match.
#[derive(Debug, Clone)]
pub struct PointTable {
    pub table: LodesTable,
    pub geometry: Vec<Option<Point<f64>>>,
}

/// An OD table with a two-point line per row connecting the home and
/// workplace centroids, `None` where either endpoint is unmatched.
#[derive(Debug, Clone)]
pub struct LineTable {
    pub table: LodesTable,
    pub geometry: Vec<Option<LineString<f64>>>,
}

/// URL of the centroid reference file for one state. The reference files
/// are keyed by the 2-digit numeric FIPS prefix; the state-level file is a
/// single national table.
pub fn cenpop_url(level: GeographyLevel, state_fips: &str) -> Result<String> {
    match level {
        GeographyLevel::State => Ok(format!("{CENPOP_BASE_URL}/CenPop2010_Mean_ST.txt")),
        GeographyLevel::County => Ok(format!(
            "{CENPOP_BASE_URL}/county/CenPop2010_Mean_CO{state_fips}.txt"
        )),
        GeographyLevel::Tract => Ok(format!(
            "{CENPOP_BASE_URL}/tract/CenPop2010_Mean_TR{state_fips}.txt"
        )),
        GeographyLevel::BlockGroup => Ok(format!(
            "{CENPOP_BASE_URL}/blkgrp/CenPop2010_Mean_BG{state_fips}.txt"
        )),
        other => Err(Error::UnsupportedGeography(format!(
            "no centroid reference exists at {} level",
            other
        ))),
    }
}

/// Reference-file columns concatenated to form the GEOID at each level.
fn geoid_parts(level: GeographyLevel) -> &'static [&'static str] {
    match level {
        GeographyLevel::State => &["STATEFP"],
        GeographyLevel::County => &["STATEFP", "COUNTYFP"],
        GeographyLevel::Tract => &["STATEFP", "COUNTYFP", "TRACTCE"],
        GeographyLevel::BlockGroup => &["STATEFP", "COUNTYFP", "TRACTCE", "BLKGRPCE"],
        _ => &[],
    }
}

/// Parse one centroid reference file into (GEOID, point) pairs. The files
/// are Latin-1 encoded, so records are read as bytes and only the needed
/// ASCII columns are decoded.
fn parse_cenpop(
    level: GeographyLevel,
    url: &str,
    bytes: &[u8],
) -> Result<Vec<(String, Point<f64>)>, FetchError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes);
    let headers = reader
        .byte_headers()
        .map_err(|e| FetchError::malformed(url, e.to_string()))?
        .clone();

    let find = |name: &str| {
        headers
            .iter()
            .position(|h| h == name.as_bytes())
            .ok_or_else(|| FetchError::malformed(url, format!("column {:?} not found", name)))
    };

    let part_indices: Vec<usize> = geoid_parts(level)
        .iter()
        .map(|name| find(name))
        .collect::<Result<_, _>>()?;
    let lat_idx = find("LATITUDE")?;
    let lon_idx = find("LONGITUDE")?;

    let mut points = Vec::new();
    for record in reader.byte_records() {
        let record = record.map_err(|e| FetchError::malformed(url, e.to_string()))?;
        let geoid: String = part_indices
            .iter()
            .map(|&i| String::from_utf8_lossy(&record[i]).into_owned())
            .collect();
        let lat: f64 = String::from_utf8_lossy(&record[lat_idx])
            .trim()
            .parse()
            .map_err(|_| FetchError::malformed(url, "non-numeric LATITUDE"))?;
        let lon: f64 = String::from_utf8_lossy(&record[lon_idx])
            .trim()
            .parse()
            .map_err(|_| FetchError::malformed(url, "non-numeric LONGITUDE"))?;
        points.push((geoid, Point::new(lon, lat)));
    }
    Ok(points)
}

/// Fetch and merge the centroid reference for every needed state.
async fn centroid_index<F: Fetcher + ?Sized>(
    fetcher: &F,
    level: GeographyLevel,
    state_fips: &BTreeSet<String>,
) -> Result<HashMap<String, Point<f64>>> {
    let urls: Vec<String> = match level {
        // One national file regardless of the states involved.
        GeographyLevel::State => vec![cenpop_url(level, "")?],
        _ => state_fips
            .iter()
            .map(|fips| cenpop_url(level, fips))
            .collect::<Result<_>>()?,
    };

    info!(
        "downloading {} centroid reference file(s) at {} level",
        urls.len(),
        level
    );

    let parts = futures::future::try_join_all(urls.iter().map(|url| async move {
        let bytes = fetcher.fetch(url).await?;
        parse_cenpop(level, url, &bytes)
    }))
    .await?;

    let mut index = HashMap::new();
    for part in parts {
        index.extend(part);
    }
    Ok(index)
}

/// Derive the join identifier at `level` for one key column of every row.
fn derived_ids(table: &LodesTable, key_idx: usize, level: GeographyLevel) -> Result<Vec<String>> {
    table
        .rows
        .iter()
        .map(|row| truncate(&row.keys[key_idx], level).map(|p| p.to_string()))
        .collect()
}

fn state_fips_of(ids: &[String]) -> BTreeSet<String> {
    ids.iter().map(|id| id[..2].to_string()).collect()
}

impl<F: Fetcher> LodesClient<F> {
    /// Attach a centroid point to every row, joining on the table's first
    /// key column derived at `geography`. Supported levels: state, county,
    /// tract and block group. Block-level joins are not supported.
    pub async fn to_points(
        &self,
        table: &LodesTable,
        geography: GeographyLevel,
    ) -> Result<PointTable> {
        if !matches!(
            geography,
            GeographyLevel::State
                | GeographyLevel::County
                | GeographyLevel::Tract
                | GeographyLevel::BlockGroup
        ) {
            return Err(Error::UnsupportedGeography(format!(
                "point joins support state, county, tract and block group levels, not {}",
                geography
            )));
        }

        let ids = derived_ids(table, 0, geography)?;
        let index = centroid_index(self.fetcher(), geography, &state_fips_of(&ids)).await?;

        let geometry = ids.iter().map(|id| index.get(id).copied()).collect();
        Ok(PointTable {
            table: table.clone(),
            geometry,
        })
    }

    /// Attach a two-point line per row connecting the home and workplace
    /// centroids, for OD tables. Supported at tract and block group levels
    /// only.
    pub async fn to_lines(
        &self,
        table: &LodesTable,
        geography: GeographyLevel,
    ) -> Result<LineTable> {
        if !matches!(geography, GeographyLevel::Tract | GeographyLevel::BlockGroup) {
            return Err(Error::UnsupportedGeography(format!(
                "line joins support tract and block group levels, not {}",
                geography
            )));
        }

        let home_idx = table.key_index(Role::Home);
        let work_idx = table.key_index(Role::Work);
        let (home_idx, work_idx) = match (home_idx, work_idx) {
            (Some(h), Some(w)) => (h, w),
            _ => {
                return Err(Error::UnsupportedGeography(
                    "line joins require a table with both home and workplace columns".to_string(),
                ))
            }
        };

        let home_ids = derived_ids(table, home_idx, geography)?;
        let work_ids = derived_ids(table, work_idx, geography)?;

        let mut fips = state_fips_of(&home_ids);
        fips.extend(state_fips_of(&work_ids));
        let index = centroid_index(self.fetcher(), geography, &fips).await?;

        let geometry = home_ids
            .iter()
            .zip(&work_ids)
            .map(|(home, work)| match (index.get(home), index.get(work)) {
                (Some(h), Some(w)) => Some(LineString::from(vec![
                    (h.x(), h.y()),
                    (w.x(), w.y()),
                ])),
                _ => None,
            })
            .collect();

        Ok(LineTable {
            table: table.clone(),
            geometry,
        })
    }
}
