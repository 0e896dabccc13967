//! Static lookup from 2-digit numeric state/territory FIPS prefixes to
//! postal alpha codes, used to decide which state-partitioned LODES files
//! to download.

use std::collections::BTreeSet;

/// (numeric FIPS, postal alpha) pairs covering the 50 states, D.C. and the
/// territories. Several historical or reserved numeric codes map to an
/// empty alpha code; those never produce a download.
pub const STATE_CODES: &[(&str, &str)] = &[
    ("01", "AL"),
    ("02", "AK"),
    ("60", "AS"),
    ("03", ""),
    ("04", "AZ"),
    ("05", "AR"),
    ("81", "BI"),
    ("06", "CA"),
    ("07", ""),
    ("08", "CO"),
    ("09", "CT"),
    ("10", "DE"),
    ("11", "DC"),
    ("12", "FL"),
    ("64", "FM"),
    ("13", "GA"),
    ("14", ""),
    ("66", "GU"),
    ("15", "HI"),
    ("84", "HI"),
    ("16", "ID"),
    ("17", "IL"),
    ("18", "IN"),
    ("19", "IA"),
    ("86", "JI"),
    ("67", "JA"),
    ("20", "KS"),
    ("21", "KY"),
    ("89", "KR"),
    ("22", "LA"),
    ("23", "ME"),
    ("68", "MH"),
    ("24", "MD"),
    ("25", "MA"),
    ("26", "MI"),
    ("71", "MI"),
    ("27", "MN"),
    ("28", "MS"),
    ("29", "MO"),
    ("30", "MT"),
    ("76", "NI"),
    ("31", "NE"),
    ("32", "NV"),
    ("33", "NH"),
    ("34", "NJ"),
    ("35", "NM"),
    ("36", "NY"),
    ("37", "NC"),
    ("38", "ND"),
    ("69", "MP"),
    ("39", "OH"),
    ("40", "OK"),
    ("41", "OR"),
    ("70", "PW"),
    ("95", "PA"),
    ("42", "PA"),
    ("43", ""),
    ("72", "PR"),
    ("44", "RI"),
    ("45", "SC"),
    ("46", "SD"),
    ("47", "TN"),
    ("48", "TX"),
    ("74", "UM"),
    ("49", "UT"),
    ("50", "VT"),
    ("51", "VA"),
    ("52", ""),
    ("78", "VI"),
    ("79", "WI"),
    ("53", "WA"),
    ("54", "WV"),
    ("55", "WI"),
    ("56", "WY"),
];

/// Look up the postal alpha code for a numeric FIPS prefix.
pub fn state_alpha(numeric: &str) -> Option<&'static str> {
    STATE_CODES
        .iter()
        .find(|(n, _)| *n == numeric)
        .map(|(_, a)| *a)
        .filter(|a| !a.is_empty())
}

/// Collect the distinct postal alpha codes for a set of GEOIDs of any
/// granularity. The state prefix is the first two characters of every
/// level's identifier. Unknown and historical numeric codes are excluded
/// rather than treated as errors; the resulting set is sorted so download
/// order is deterministic.
pub fn alpha_codes<S: AsRef<str>>(geoids: &[S]) -> BTreeSet<String> {
    geoids
        .iter()
        .filter(|id| id.as_ref().len() >= 2)
        .filter_map(|id| state_alpha(&id.as_ref()[..2]))
        .map(|a| a.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_alpha_lookup() {
        assert_eq!(state_alpha("06"), Some("CA"));
        assert_eq!(state_alpha("36"), Some("NY"));
        assert_eq!(state_alpha("44"), Some("RI"));
    }

    #[test]
    fn test_historical_codes_excluded() {
        // Reserved codes carry no alpha and must not show up as downloads.
        assert_eq!(state_alpha("03"), None);
        assert_eq!(state_alpha("52"), None);
        assert_eq!(state_alpha("99"), None);
    }

    #[test]
    fn test_alpha_codes_deduplicates() {
        let codes = alpha_codes(&["44001", "44003"]);
        assert_eq!(codes.len(), 1);
        assert!(codes.contains("RI"));
    }

    #[test]
    fn test_alpha_codes_mixed_granularity() {
        let codes = alpha_codes(&["06", "36061", "060372074001015", "03"]);
        let expected: Vec<&str> = codes.iter().map(|s| s.as_str()).collect();
        assert_eq!(expected, vec!["CA", "NY"]);
    }
}
