use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};

use crate::error::FetchError;

/// Response of one GET against the object store. The body is left unread so
/// callers that only classify the response never pull the payload.
pub struct StoreResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Box<dyn Read + Send>,
}

impl StoreResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub trait ObjectStoreClient: Send + Sync {
    fn get(&self, url: &str) -> Result<StoreResponse, FetchError>;
}

/// Connection-pooling client shared by every request of a run. Build it once
/// and hand out references.
#[derive(Clone)]
pub struct ObjectStoreHttpClient {
    client: Client,
}

impl ObjectStoreHttpClient {
    pub fn new() -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("s2fetch/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| FetchError::Http(err.to_string()))?,
        );
        // Reads are unbounded; only connecting is timed out.
        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(30))
            .timeout(None)
            .build()
            .map_err(|err| FetchError::Http(err.to_string()))?;
        Ok(Self { client })
    }
}

impl ObjectStoreClient for ObjectStoreHttpClient {
    fn get(&self, url: &str) -> Result<StoreResponse, FetchError> {
        tracing::debug!(url, "GET");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| FetchError::Http(err.to_string()))?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());
        Ok(StoreResponse {
            status,
            content_type,
            body: Box::new(response),
        })
    }
}
