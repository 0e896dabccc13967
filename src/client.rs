//! Public LODES operations: `wac`, `rac` and `od`.

use tracing::info;

use crate::engine::{filter_and_aggregate, AreaSpec};
use crate::error::{Error, Result};
use crate::fetch::{fetch_unified, Dataset, Fetcher, HttpFetcher, JobType, Segment};
use crate::geoid::GeographyLevel;
use crate::states::alpha_codes;
use crate::table::LodesTable;

/// First and last years covered by the LODES7 archive.
pub const MIN_YEAR: u16 = 2002;
pub const MAX_YEAR: u16 = 2017;

/// Client for downloading and aggregating LODES data. Generic over the
/// fetcher so tests can run against canned tables.
pub struct LodesClient<F: Fetcher = HttpFetcher> {
    fetcher: F,
}

impl LodesClient<HttpFetcher> {
    pub fn new() -> Self {
        Self {
            fetcher: HttpFetcher::new(),
        }
    }
}

impl Default for LodesClient<HttpFetcher> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Fetcher> LodesClient<F> {
    pub fn with_fetcher(fetcher: F) -> Self {
        Self { fetcher }
    }

    pub(crate) fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Workplace Area Characteristics: job counts keyed by workplace block,
    /// filtered to `locations` and aggregated to `geography`.
    pub async fn wac(
        &self,
        locations: &[String],
        year: u16,
        geography: GeographyLevel,
        segment: Segment,
        job_type: JobType,
    ) -> Result<LodesTable> {
        self.characteristics(Dataset::Wac, locations, year, geography, segment, job_type)
            .await
    }

    /// Residence Area Characteristics: symmetric to `wac`, keyed on the
    /// home block.
    pub async fn rac(
        &self,
        locations: &[String],
        year: u16,
        geography: GeographyLevel,
        segment: Segment,
        job_type: JobType,
    ) -> Result<LodesTable> {
        self.characteristics(Dataset::Rac, locations, year, geography, segment, job_type)
            .await
    }

    async fn characteristics(
        &self,
        dataset: Dataset,
        locations: &[String],
        year: u16,
        geography: GeographyLevel,
        segment: Segment,
        job_type: JobType,
    ) -> Result<LodesTable> {
        validate_year(year)?;
        validate_geography(geography)?;
        if locations.is_empty() {
            return Err(Error::MissingArea);
        }
        let spec = AreaSpec::parse(locations)?;

        let states = alpha_codes(locations);
        let raw = fetch_unified(
            &self.fetcher,
            dataset,
            &states,
            year,
            Some(segment),
            job_type,
        )
        .await?;

        info!(
            "filtering {} rows of {} data and aggregating to {} level",
            raw.len(),
            dataset.kind(),
            geography
        );
        match dataset {
            Dataset::Wac => filter_and_aggregate(raw, None, Some(&spec), false, geography),
            Dataset::Rac => filter_and_aggregate(raw, Some(&spec), None, false, geography),
            Dataset::Od => unreachable!("OD goes through LodesClient::od"),
        }
    }

    /// Origin-Destination commuting flows. At least one of `origins` and
    /// `destinations` must be a non-empty list. With both present,
    /// `constrained` keeps only flows whose two endpoints both fall inside
    /// their respective areas; otherwise either endpoint suffices.
    pub async fn od(
        &self,
        year: u16,
        geography: GeographyLevel,
        job_type: JobType,
        origins: Option<&[String]>,
        destinations: Option<&[String]>,
        constrained: bool,
    ) -> Result<LodesTable> {
        validate_year(year)?;
        validate_geography(geography)?;

        let origins = origins.filter(|ids| !ids.is_empty());
        let destinations = destinations.filter(|ids| !ids.is_empty());
        if origins.is_none() && destinations.is_none() {
            return Err(Error::MissingArea);
        }

        let origin_spec = origins.map(AreaSpec::parse).transpose()?;
        let destination_spec = destinations.map(AreaSpec::parse).transpose()?;

        // Flows are partitioned by the *workplace* state, with the aux part
        // holding flows whose home lies out of state. Either endpoint's
        // state can therefore hold relevant rows.
        let mut states = alpha_codes(origins.unwrap_or(&[]));
        states.extend(alpha_codes(destinations.unwrap_or(&[])));

        let raw = fetch_unified(&self.fetcher, Dataset::Od, &states, year, None, job_type).await?;

        info!(
            "filtering {} OD rows and aggregating to {} level",
            raw.len(),
            geography
        );
        filter_and_aggregate(
            raw,
            origin_spec.as_ref(),
            destination_spec.as_ref(),
            constrained,
            geography,
        )
    }
}

fn validate_year(year: u16) -> Result<()> {
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return Err(Error::UnsupportedYear(year));
    }
    Ok(())
}

fn validate_geography(geography: GeographyLevel) -> Result<()> {
    if !geography.is_supported() {
        return Err(Error::InvalidParameter {
            name: "geography",
            value: geography.to_string(),
            expected: "B, BG, CT, C or S",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::testutil::{gzip, MockFetcher};

    fn wac_header() -> String {
        let mut header = vec!["w_geocode".to_string()];
        header.extend(
            crate::fetch::WAC_RAC_COUNT_COLUMNS
                .iter()
                .map(|c| c.to_string()),
        );
        header.push("createdate".to_string());
        header.join(",")
    }

    fn wac_row(geocode: &str, value: u64) -> String {
        let mut fields = vec![geocode.to_string()];
        fields.extend(
            crate::fetch::WAC_RAC_COUNT_COLUMNS
                .iter()
                .map(|_| value.to_string()),
        );
        fields.push("20190826".to_string());
        fields.join(",")
    }

    fn od_csv(rows: &[(&str, &str, u64)]) -> String {
        let mut lines =
            vec!["w_geocode,h_geocode,S000,SA01,SA02,SA03,SE01,SE02,SE03,SI01,SI02,SI03,createdate"
                .to_string()];
        for (home, work, v) in rows {
            lines.push(format!(
                "{work},{home},{v},0,0,0,0,0,0,0,0,0,20190826"
            ));
        }
        lines.join("\n")
    }

    const CA_WAC_URL: &str =
        "https://lehd.ces.census.gov/data/lodes/LODES7/ca/wac/ca_wac_S000_JT00_2015.csv.gz";
    const NY_OD_AUX_URL: &str =
        "https://lehd.ces.census.gov/data/lodes/LODES7/ny/od/ny_od_aux_JT00_2016.csv.gz";
    const NY_OD_MAIN_URL: &str =
        "https://lehd.ces.census.gov/data/lodes/LODES7/ny/od/ny_od_main_JT00_2016.csv.gz";

    #[tokio::test]
    async fn test_wac_state_to_county_aggregation() {
        let csv = format!(
            "{}\n{}\n{}\n{}\n",
            wac_header(),
            wac_row("060372074001015", 2),
            wac_row("060372074001016", 3),
            wac_row("060590630051004", 5),
        );
        let fetcher = MockFetcher::new().with(CA_WAC_URL, gzip(&csv));
        let client = LodesClient::with_fetcher(fetcher);

        let table = client
            .wac(
                &["06".to_string()],
                2015,
                GeographyLevel::County,
                Segment::S000,
                JobType::JT00,
            )
            .await
            .unwrap();

        assert_eq!(table.keys[0].name(), "w_geoid_C");
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0].keys, vec!["06037"]);
        assert_eq!(table.rows[0].counts[0], 5);
        assert_eq!(table.rows[1].keys, vec!["06059"]);
        assert_eq!(table.rows[1].counts[0], 5);
    }

    #[tokio::test]
    async fn test_od_origin_only_blocks_unaggregated() {
        // Manhattan flows plus one row from another county that must drop.
        let csv = od_csv(&[
            ("360610099001001", "360610031002000", 7),
            ("360610099001002", "060372074001015", 2),
            ("360810101001000", "360610031002000", 9),
        ]);
        let fetcher = MockFetcher::new()
            .with(NY_OD_AUX_URL, gzip(&od_csv(&[])))
            .with(NY_OD_MAIN_URL, gzip(&csv));
        let client = LodesClient::with_fetcher(fetcher);

        let table = client
            .od(
                2016,
                GeographyLevel::Block,
                JobType::JT00,
                Some(&["36061".to_string()]),
                None,
                false,
            )
            .await
            .unwrap();

        assert_eq!(table.len(), 2);
        assert!(table
            .rows
            .iter()
            .all(|r| r.keys[0].starts_with("36061")));
        assert_eq!(client.fetcher().request_count(), 2);
    }

    #[tokio::test]
    async fn test_od_missing_area_fails_before_any_fetch() {
        let client = LodesClient::with_fetcher(MockFetcher::new());
        let err = client
            .od(2016, GeographyLevel::Block, JobType::JT00, None, None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingArea));
        assert_eq!(client.fetcher().request_count(), 0);

        // An empty list counts as missing too.
        let empty: Vec<String> = Vec::new();
        let err = client
            .od(
                2016,
                GeographyLevel::Block,
                JobType::JT00,
                Some(&empty),
                None,
                false,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingArea));
        assert_eq!(client.fetcher().request_count(), 0);
    }

    #[tokio::test]
    async fn test_validation_is_eager() {
        let client = LodesClient::with_fetcher(MockFetcher::new());

        let err = client
            .wac(
                &["06".to_string()],
                2001,
                GeographyLevel::Block,
                Segment::S000,
                JobType::JT00,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedYear(2001)));

        let err = client
            .wac(
                &["06".to_string()],
                2015,
                GeographyLevel::Place,
                Segment::S000,
                JobType::JT00,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));

        let err = client
            .wac(
                &["063".to_string()],
                2015,
                GeographyLevel::Block,
                Segment::S000,
                JobType::JT00,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidGeoId(_)));

        assert_eq!(client.fetcher().request_count(), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts_whole_request() {
        // Only one of the two OD parts is available.
        let fetcher = MockFetcher::new().with(NY_OD_MAIN_URL, gzip(&od_csv(&[])));
        let client = LodesClient::with_fetcher(fetcher);
        let err = client
            .od(
                2016,
                GeographyLevel::Block,
                JobType::JT00,
                Some(&["36".to_string()]),
                None,
                false,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Fetch(FetchError::Status { status: 404, .. })
        ));
    }
}
