use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum FetchError {
    #[error("invalid product id: {0}")]
    InvalidProductId(String),

    #[error("invalid product id format: {0}")]
    #[diagnostic(help("expected an id like S2A_MSIL1C_<date>_N0209_R000_T56HKH_<date>"))]
    InvalidIdentifierFormat(String),

    #[error("failed to fetch manifest from {url}: {reason}")]
    ManifestFetchFailure { url: String, reason: String },

    #[error("tile not found: manifest for {0} lists no band files")]
    EmptyManifest(String),

    #[error("unexpected content type {} for {url}", .content_type.as_deref().unwrap_or("<none>"))]
    UnexpectedContentType {
        url: String,
        content_type: Option<String>,
    },

    #[error("all download attempts failed for {0}")]
    DownloadRetriesExhausted(String),

    #[error("object store request failed: {0}")]
    Http(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("missing config file s2fetch.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),
}
