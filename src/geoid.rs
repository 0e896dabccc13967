//! Census GEOID handling: level classification and prefix truncation.
//!
//! GEOIDs are hierarchical: every finer level's identifier is a string
//! extension of every coarser one, so a 15-digit block id truncates to its
//! tract with `&id[..11]`, to its county with `&id[..5]`, and so on. The
//! length of an identifier alone determines its level.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Census geography levels, coarse to fine. Place and CountySubdivision sit
/// under County as siblings; they are classified by `infer_level` but not
/// supported for filtering or aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GeographyLevel {
    State,
    County,
    Place,
    CountySubdivision,
    Tract,
    BlockGroup,
    Block,
}

impl GeographyLevel {
    /// Length of a GEOID at this level.
    pub fn prefix_len(self) -> usize {
        match self {
            GeographyLevel::State => 2,
            GeographyLevel::County => 5,
            GeographyLevel::Place => 7,
            GeographyLevel::CountySubdivision => 10,
            GeographyLevel::Tract => 11,
            GeographyLevel::BlockGroup => 12,
            GeographyLevel::Block => 15,
        }
    }

    /// Short code used in derived column names (`w_geoid_CT` etc.), matching
    /// the upstream LODES conventions.
    pub fn code(self) -> &'static str {
        match self {
            GeographyLevel::State => "S",
            GeographyLevel::County => "C",
            GeographyLevel::Place => "P",
            GeographyLevel::CountySubdivision => "CS",
            GeographyLevel::Tract => "CT",
            GeographyLevel::BlockGroup => "BG",
            GeographyLevel::Block => "B",
        }
    }

    /// True for the levels the filter/aggregate engine supports end-to-end.
    pub fn is_supported(self) -> bool {
        !matches!(
            self,
            GeographyLevel::Place | GeographyLevel::CountySubdivision
        )
    }
}

impl std::fmt::Display for GeographyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            GeographyLevel::State => "state",
            GeographyLevel::County => "county",
            GeographyLevel::Place => "place",
            GeographyLevel::CountySubdivision => "county subdivision",
            GeographyLevel::Tract => "tract",
            GeographyLevel::BlockGroup => "block group",
            GeographyLevel::Block => "block",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for GeographyLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "S" | "state" => Ok(GeographyLevel::State),
            "C" | "county" => Ok(GeographyLevel::County),
            "P" | "place" => Ok(GeographyLevel::Place),
            "CS" | "county-subdivision" => Ok(GeographyLevel::CountySubdivision),
            "CT" | "tract" => Ok(GeographyLevel::Tract),
            "BG" | "block-group" => Ok(GeographyLevel::BlockGroup),
            "B" | "block" => Ok(GeographyLevel::Block),
            _ => Err(Error::InvalidParameter {
                name: "geography",
                value: s.to_string(),
                expected: "B, BG, CT, C or S",
            }),
        }
    }
}

/// Classify a GEOID by its length.
pub fn infer_level(geoid: &str) -> Result<GeographyLevel> {
    match geoid.len() {
        2 => Ok(GeographyLevel::State),
        5 => Ok(GeographyLevel::County),
        7 => Ok(GeographyLevel::Place),
        10 => Ok(GeographyLevel::CountySubdivision),
        11 => Ok(GeographyLevel::Tract),
        12 => Ok(GeographyLevel::BlockGroup),
        15 => Ok(GeographyLevel::Block),
        _ => Err(Error::InvalidGeoId(geoid.to_string())),
    }
}

/// Truncate a GEOID to an equal-or-coarser level. Asking for a level finer
/// than the id itself is a usage error.
pub fn truncate(geoid: &str, level: GeographyLevel) -> Result<&str> {
    let len = level.prefix_len();
    if geoid.len() < len {
        return Err(Error::InvalidGeoId(geoid.to_string()));
    }
    Ok(&geoid[..len])
}

/// Left-pad a block geocode with zeros to the full 15 characters. Upstream
/// files carry the ids as integers, so a leading zero can be lost.
pub fn zero_pad(geocode: &str) -> String {
    format!("{:0>15}", geocode)
}
