//! Remote table retrieval: URL templates for the LODES7 archive, the
//! `Fetcher` seam, and decoding of the gzipped CSV payloads.

use std::collections::BTreeSet;
use std::io::Read;

use async_trait::async_trait;
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, FetchError, Result};
use crate::geoid::{zero_pad, GeographyLevel};
use crate::table::{KeyColumn, LodesRow, LodesTable, Role};

pub const LODES_BASE_URL: &str = "https://lehd.ces.census.gov/data/lodes/LODES7";

/// Job-count columns of the WAC and RAC schemas, in file order.
pub const WAC_RAC_COUNT_COLUMNS: &[&str] = &[
    "C000", "CA01", "CA02", "CA03", "CE01", "CE02", "CE03", "CNS01", "CNS02", "CNS03", "CNS04",
    "CNS05", "CNS06", "CNS07", "CNS08", "CNS09", "CNS10", "CNS11", "CNS12", "CNS13", "CNS14",
    "CNS15", "CNS16", "CNS17", "CNS18", "CNS19", "CNS20", "CR01", "CR02", "CR03", "CR04", "CR05",
    "CR07", "CT01", "CT02", "CD01", "CD02", "CD03", "CD04", "CS01", "CS02",
];

/// Job-count columns of the OD schema, in file order.
pub const OD_COUNT_COLUMNS: &[&str] = &[
    "S000", "SA01", "SA02", "SA03", "SE01", "SE02", "SE03", "SI01", "SI02", "SI03",
];

/// The three LODES dataset kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dataset {
    Wac,
    Rac,
    Od,
}

impl Dataset {
    pub fn kind(self) -> &'static str {
        match self {
            Dataset::Wac => "wac",
            Dataset::Rac => "rac",
            Dataset::Od => "od",
        }
    }

    /// Raw key columns of this dataset, always at block level. OD keys are
    /// ordered home then workplace.
    pub fn key_columns(self) -> Vec<KeyColumn> {
        match self {
            Dataset::Wac => vec![KeyColumn::new(Role::Work, GeographyLevel::Block)],
            Dataset::Rac => vec![KeyColumn::new(Role::Home, GeographyLevel::Block)],
            Dataset::Od => vec![
                KeyColumn::new(Role::Home, GeographyLevel::Block),
                KeyColumn::new(Role::Work, GeographyLevel::Block),
            ],
        }
    }

    pub fn count_columns(self) -> &'static [&'static str] {
        match self {
            Dataset::Wac | Dataset::Rac => WAC_RAC_COUNT_COLUMNS,
            Dataset::Od => OD_COUNT_COLUMNS,
        }
    }

    /// Header names of the raw geocode columns, paired with their roles.
    fn geocode_headers(self) -> &'static [(Role, &'static str)] {
        match self {
            Dataset::Wac => &[(Role::Work, "w_geocode")],
            Dataset::Rac => &[(Role::Home, "h_geocode")],
            Dataset::Od => &[(Role::Home, "h_geocode"), (Role::Work, "w_geocode")],
        }
    }
}

/// Workforce segment codes of the LODES schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Segment {
    S000,
    SA01,
    SA02,
    SA03,
    SE01,
    SE02,
    SE03,
    SI01,
    SI02,
}

impl Segment {
    pub fn as_str(self) -> &'static str {
        match self {
            Segment::S000 => "S000",
            Segment::SA01 => "SA01",
            Segment::SA02 => "SA02",
            Segment::SA03 => "SA03",
            Segment::SE01 => "SE01",
            Segment::SE02 => "SE02",
            Segment::SE03 => "SE03",
            Segment::SI01 => "SI01",
            Segment::SI02 => "SI02",
        }
    }
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Segment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "S000" => Ok(Segment::S000),
            "SA01" => Ok(Segment::SA01),
            "SA02" => Ok(Segment::SA02),
            "SA03" => Ok(Segment::SA03),
            "SE01" => Ok(Segment::SE01),
            "SE02" => Ok(Segment::SE02),
            "SE03" => Ok(Segment::SE03),
            "SI01" => Ok(Segment::SI01),
            "SI02" => Ok(Segment::SI02),
            _ => Err(Error::InvalidParameter {
                name: "segment",
                value: s.to_string(),
                expected: "S000, SA01-SA03, SE01-SE03, SI01 or SI02",
            }),
        }
    }
}

/// Job type codes: all, primary, private, private primary, federal, federal
/// primary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobType {
    JT00,
    JT01,
    JT02,
    JT03,
    JT04,
    JT05,
}

impl JobType {
    pub fn as_str(self) -> &'static str {
        match self {
            JobType::JT00 => "JT00",
            JobType::JT01 => "JT01",
            JobType::JT02 => "JT02",
            JobType::JT03 => "JT03",
            JobType::JT04 => "JT04",
            JobType::JT05 => "JT05",
        }
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for JobType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "JT00" => Ok(JobType::JT00),
            "JT01" => Ok(JobType::JT01),
            "JT02" => Ok(JobType::JT02),
            "JT03" => Ok(JobType::JT03),
            "JT04" => Ok(JobType::JT04),
            "JT05" => Ok(JobType::JT05),
            _ => Err(Error::InvalidParameter {
                name: "job type",
                value: s.to_string(),
                expected: "JT00 through JT05",
            }),
        }
    }
}

/// URL of one state-partitioned LODES file. `file_tag` is the segment code
/// for WAC/RAC or the `aux`/`main` part name for OD.
pub fn lodes_url(state: &str, dataset: Dataset, file_tag: &str, job_type: JobType, year: u16) -> String {
    let st = state.to_lowercase();
    let kind = dataset.kind();
    format!(
        "{LODES_BASE_URL}/{st}/{kind}/{st}_{kind}_{file_tag}_{job_type}_{year}.csv.gz"
    )
}

/// All URLs needed for one state. WAC/RAC take one file; OD takes the
/// cross-state `aux` part and the within-state `main` part.
fn state_urls(
    state: &str,
    dataset: Dataset,
    segment: Option<Segment>,
    job_type: JobType,
    year: u16,
) -> Vec<String> {
    match dataset {
        Dataset::Wac | Dataset::Rac => {
            let seg = segment.unwrap_or(Segment::S000);
            vec![lodes_url(state, dataset, seg.as_str(), job_type, year)]
        }
        Dataset::Od => vec![
            lodes_url(state, dataset, "aux", job_type, year),
            lodes_url(state, dataset, "main", job_type, year),
        ],
    }
}

/// Retrieves a remote resource as raw bytes. The HTTP implementation is the
/// production path; tests substitute an in-memory map.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// `Fetcher` backed by a reqwest client with a fixed timeout. Any non-2xx
/// status or transport failure aborts the whole request; there is no retry.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent("lodes-rs/0.1 (LEHD LODES downloader)")
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .expect("Failed to create HTTP client"),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Http {
                url: url.to_string(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| FetchError::Http {
            url: url.to_string(),
            source: e,
        })?;
        Ok(bytes.to_vec())
    }
}

/// Decode one gzipped LODES CSV into a block-level table. Columns are
/// located by header name; extras such as `createdate` are dropped.
pub(crate) fn parse_lodes_csv(
    dataset: Dataset,
    url: &str,
    bytes: &[u8],
) -> Result<LodesTable, FetchError> {
    let mut decoder = GzDecoder::new(bytes);
    let mut text = Vec::new();
    decoder
        .read_to_end(&mut text)
        .map_err(|e| FetchError::malformed(url, format!("gzip decode failed: {}", e)))?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(text.as_slice());
    let headers = reader
        .headers()
        .map_err(|e| FetchError::malformed(url, e.to_string()))?
        .clone();

    let key_indices: Vec<usize> = dataset
        .geocode_headers()
        .iter()
        .map(|(_, name)| {
            headers
                .iter()
                .position(|h| h == *name)
                .ok_or_else(|| FetchError::malformed(url, format!("column {:?} not found", name)))
        })
        .collect::<Result<_, _>>()?;

    let count_indices: Vec<usize> = dataset
        .count_columns()
        .iter()
        .map(|name| {
            headers
                .iter()
                .position(|h| h == *name)
                .ok_or_else(|| FetchError::malformed(url, format!("column {:?} not found", name)))
        })
        .collect::<Result<_, _>>()?;

    let mut table = LodesTable::new(
        dataset.key_columns(),
        dataset.count_columns().iter().map(|c| c.to_string()).collect(),
    );

    for record in reader.records() {
        let record = record.map_err(|e| FetchError::malformed(url, e.to_string()))?;
        let keys: Vec<String> = key_indices.iter().map(|&i| zero_pad(&record[i])).collect();
        let counts: Vec<u64> = count_indices
            .iter()
            .map(|&i| {
                record[i].parse::<u64>().map_err(|_| {
                    FetchError::malformed(url, format!("non-numeric count {:?}", &record[i]))
                })
            })
            .collect::<Result<_, _>>()?;
        table.rows.push(LodesRow { keys, counts });
    }

    Ok(table)
}

/// Fetch every state's file(s) for a dataset and concatenate them into one
/// block-level table. Per-state fetches run concurrently; the row set does
/// not depend on completion order because results are joined in request
/// order and everything downstream is order-independent anyway.
pub(crate) async fn fetch_unified<F: Fetcher + ?Sized>(
    fetcher: &F,
    dataset: Dataset,
    states: &BTreeSet<String>,
    year: u16,
    segment: Option<Segment>,
    job_type: JobType,
) -> Result<LodesTable> {
    let urls: Vec<String> = states
        .iter()
        .flat_map(|state| state_urls(state, dataset, segment, job_type, year))
        .collect();

    info!(
        "downloading {} {} file(s) for states {:?}",
        urls.len(),
        dataset.kind(),
        states
    );

    let parts = futures::future::try_join_all(urls.iter().map(|url| async move {
        let bytes = fetcher.fetch(url).await?;
        parse_lodes_csv(dataset, url, &bytes)
    }))
    .await?;

    let mut unified = LodesTable::new(
        dataset.key_columns(),
        dataset.count_columns().iter().map(|c| c.to_string()).collect(),
    );
    for part in parts {
        unified.extend_from(part);
    }

    info!("unified {} table has {} rows", dataset.kind(), unified.len());
    Ok(unified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn gzip(data: &str) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_lodes_url_wac() {
        assert_eq!(
            lodes_url("CA", Dataset::Wac, "S000", JobType::JT00, 2015),
            "https://lehd.ces.census.gov/data/lodes/LODES7/ca/wac/ca_wac_S000_JT00_2015.csv.gz"
        );
    }

    #[test]
    fn test_lodes_url_od_parts() {
        let urls = state_urls("ny", Dataset::Od, None, JobType::JT00, 2016);
        assert_eq!(
            urls,
            vec![
                "https://lehd.ces.census.gov/data/lodes/LODES7/ny/od/ny_od_aux_JT00_2016.csv.gz",
                "https://lehd.ces.census.gov/data/lodes/LODES7/ny/od/ny_od_main_JT00_2016.csv.gz",
            ]
        );
    }

    #[test]
    fn test_parse_od_csv_pads_and_drops_extras() {
        let csv = "w_geocode,h_geocode,S000,SA01,SA02,SA03,SE01,SE02,SE03,SI01,SI02,SI03,createdate\n\
                   60372074001015,360610099001001,5,1,2,2,1,2,2,3,1,1,20190826\n";
        let table = parse_lodes_csv(Dataset::Od, "test://od", &gzip(csv)).unwrap();
        assert_eq!(table.rows.len(), 1);
        // Home key comes first and the dropped leading zero is restored.
        assert_eq!(table.rows[0].keys[0], "360610099001001");
        assert_eq!(table.rows[0].keys[1], "060372074001015");
        assert_eq!(table.rows[0].counts[0], 5);
        assert_eq!(table.count_columns.len(), 10);
    }

    #[test]
    fn test_parse_missing_column_is_malformed() {
        let csv = "w_geocode,C000\n060372074001015,5\n";
        let err = parse_lodes_csv(Dataset::Wac, "test://wac", &gzip(csv)).unwrap_err();
        assert!(matches!(err, FetchError::Malformed { .. }));
    }

    #[test]
    fn test_segment_and_job_type_codes() {
        assert_eq!("SA01".parse::<Segment>().unwrap(), Segment::SA01);
        assert!("SI03".parse::<Segment>().is_err());
        assert_eq!("JT05".parse::<JobType>().unwrap().as_str(), "JT05");
        assert!("JT06".parse::<JobType>().is_err());
    }
}
