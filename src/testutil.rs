//! Test-only helpers: an in-memory fetcher and gzip encoding.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use hashbrown::HashMap;

use crate::error::FetchError;
use crate::fetch::Fetcher;

/// Serves canned responses by URL and counts every request.
pub(crate) struct MockFetcher {
    responses: HashMap<String, Vec<u8>>,
    requests: AtomicUsize,
}

impl MockFetcher {
    pub(crate) fn new() -> Self {
        Self {
            responses: HashMap::new(),
            requests: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with(mut self, url: &str, body: Vec<u8>) -> Self {
        self.responses.insert(url.to_string(), body);
        self
    }

    pub(crate) fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}

pub(crate) fn gzip(data: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data.as_bytes()).unwrap();
    encoder.finish().unwrap()
}
