use std::io::Read;

use camino::{Utf8Component, Utf8Path};

use crate::client::ObjectStoreClient;
use crate::domain::{ProcessingLevel, ProductId};
use crate::error::FetchError;
use crate::location::StoreLocation;
use crate::retry::{Attempt, RetryOutcome, RetryPolicy, Sleeper};

/// One band file listed by a tile manifest, relative to its `StoreLocation`
/// and without the `.jp2` extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry(String);

impl ManifestEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the entry stays below the directory it is joined onto:
    /// no root, prefix, `.` or `..` components.
    pub fn is_relative_descendant(&self) -> bool {
        Utf8Path::new(&self.0)
            .components()
            .all(|component| matches!(component, Utf8Component::Normal(_)))
    }
}

/// Extracts the text of every `IMAGE_FILE` element in document order.
/// Entries that would resolve outside the scene directory make the whole
/// manifest invalid.
pub fn parse_manifest(xml: &str) -> Result<Vec<ManifestEntry>, String> {
    let document = roxmltree::Document::parse(xml).map_err(|err| err.to_string())?;
    let mut entries = Vec::new();
    for node in document
        .descendants()
        .filter(|node| node.is_element() && node.tag_name().name() == "IMAGE_FILE")
    {
        let name = node.text().map(str::trim).unwrap_or_default();
        if name.is_empty() {
            continue;
        }
        let entry = ManifestEntry::new(name);
        if !entry.is_relative_descendant() {
            return Err(format!("entry {name} escapes the scene directory"));
        }
        entries.push(entry);
    }
    Ok(entries)
}

pub struct ManifestClient<'a, C: ?Sized, S: ?Sized> {
    client: &'a C,
    sleeper: &'a S,
    policy: RetryPolicy,
}

impl<'a, C, S> ManifestClient<'a, C, S>
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

    pub fn fetch_manifest(
        &self,
        location: &StoreLocation,
        product_id: &ProductId,
        level: ProcessingLevel,
    ) -> Result<Vec<ManifestEntry>, FetchError> {
        let url = location.file_url(level.manifest_name());
        let outcome = self.policy.run(self.sleeper, &url, |_| Ok(self.attempt(&url)))?;
        let entries = match outcome {
            RetryOutcome::Done(entries) => entries,
            RetryOutcome::Exhausted { last_reason, .. } => {
                return Err(FetchError::ManifestFetchFailure {
                    url,
                    reason: last_reason,
                });
            }
        };

        if entries.is_empty() {
            return Err(FetchError::EmptyManifest(product_id.to_string()));
        }
        tracing::debug!(%product_id, files = entries.len(), "manifest resolved");
        Ok(entries)
    }

    fn attempt(&self, url: &str) -> Attempt<Vec<ManifestEntry>> {
        let mut response = match self.client.get(url) {
            Ok(response) => response,
            Err(err) => return Attempt::Retry(err.to_string()),
        };
        if !response.is_success() {
            return Attempt::Retry(format!("status {}", response.status));
        }
        let mut xml = String::new();
        if let Err(err) = response.body.read_to_string(&mut xml) {
            return Attempt::Retry(err.to_string());
        }
        match parse_manifest(&xml) {
            Ok(entries) => Attempt::Ready(entries),
            Err(reason) => Attempt::Retry(format!("invalid manifest: {reason}")),
        }
    }
}
