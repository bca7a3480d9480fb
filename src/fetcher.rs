use std::fs;
use std::io;

use camino::Utf8Path;
use tempfile::Builder;

use crate::client::{ObjectStoreClient, StoreResponse};
use crate::error::FetchError;
use crate::retry::{Attempt, RetryOutcome, RetryPolicy, Sleeper};

/// Served by the bucket while an object is not materialized yet.
pub const PLACEHOLDER_CONTENT_TYPE: &str = "text/html; charset=UTF-8";
/// Served with the actual object payload.
pub const PAYLOAD_CONTENT_TYPE: &str = "application/octet-stream";

pub struct FileFetcher<'a, C: ?Sized, S: ?Sized> {
    client: &'a C,
    sleeper: &'a S,
    policy: RetryPolicy,
}

impl<'a, C, S> FileFetcher<'a, C, S>
where
    C: ObjectStoreClient + ?Sized,
    S: Sleeper + ?Sized,
{
    pub fn new(client: &'a C, sleeper: &'a S, policy: RetryPolicy) -> Self {
        Self {
            client,
            sleeper,
            policy,
        }
    }

    /// Downloads `url` to `target`, overwriting it. Returns the number of
    /// bytes written.
    ///
    /// Content types are compared literally: a placeholder served with any
    /// other spelling fails as `UnexpectedContentType` instead of retrying.
    pub fn fetch(&self, url: &str, target: &Utf8Path) -> Result<u64, FetchError> {
        let parent = match target.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent,
            _ => Utf8Path::new("."),
        };
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| FetchError::Filesystem(format!("create {parent}: {err}")))?;

        let outcome = self.policy.run(self.sleeper, url, |_| {
            let response = self.client.get(url)?;
            let content_type = response.content_type.clone();
            match content_type.as_deref() {
                Some(PLACEHOLDER_CONTENT_TYPE) => {
                    Ok(Attempt::Retry("object not materialized yet".to_string()))
                }
                Some(PAYLOAD_CONTENT_TYPE) => write_atomic(response, url, parent, target)
                    .map(Attempt::Ready),
                other => Err(FetchError::UnexpectedContentType {
                    url: url.to_string(),
                    content_type: other.map(str::to_string),
                }),
            }
        })?;

        match outcome {
            RetryOutcome::Done(bytes) => Ok(bytes),
            RetryOutcome::Exhausted { .. } => {
                Err(FetchError::DownloadRetriesExhausted(url.to_string()))
            }
        }
    }
}

fn write_atomic(
    mut response: StoreResponse,
    url: &str,
    parent: &Utf8Path,
    target: &Utf8Path,
) -> Result<u64, FetchError> {
    let mut temp = temp_file_builder()
        .tempfile_in(parent.as_std_path())
        .map_err(|err| FetchError::Filesystem(format!("temp file in {parent}: {err}")))?;
    let bytes = io::copy(&mut response.body, temp.as_file_mut())
        .map_err(|err| FetchError::Http(format!("download of {url} interrupted: {err}")))?;
    temp.persist(target.as_std_path())
        .map_err(|err| FetchError::Filesystem(format!("persist {target}: {}", err.error)))?;
    Ok(bytes)
}

/// Band files get the same mode a plain `File::create` would give them
/// (0o666 less the umask), not the 0o600 tempfile defaults to.
fn temp_file_builder() -> Builder<'static, 'static> {
    let mut builder = Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o666));
    }
    builder
}
