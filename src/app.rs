use std::fs;
use std::panic;
use std::thread;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::client::ObjectStoreClient;
use crate::domain::{ProductId, TileCoordinates};
use crate::error::FetchError;
use crate::fetcher::FileFetcher;
use crate::location::StoreLocation;
use crate::manifest::{ManifestClient, ManifestEntry};
use crate::retry::{RetryPolicy, Sleeper};

/// What a batch does when one tile fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    #[default]
    FailFast,
    CollectAll,
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Band files of one tile downloaded at the same time (minimum 1).
    pub concurrency: usize,
    pub failure_policy: FailurePolicy,
    pub retry: RetryPolicy,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            failure_policy: FailurePolicy::FailFast,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchResult {
    pub items: Vec<FetchItemResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchItemResult {
    pub product_id: String,
    pub processing_level: Option<String>,
    pub status: String,
    pub scene_dir: Option<String>,
    pub files: usize,
    pub bytes: u64,
    pub error: Option<String>,
    pub finished_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocateResult {
    pub product_id: String,
    pub processing_level: String,
    pub coordinates: TileCoordinates,
    pub store_location: String,
    pub manifest_url: String,
}

#[derive(Debug, Clone)]
pub enum ProgressEvent {
    TileStarted {
        product_id: String,
        files: usize,
    },
    FileStarted {
        product_id: String,
        file: String,
        index: usize,
        total: usize,
    },
    FileFinished {
        product_id: String,
        file: String,
        index: usize,
        total: usize,
        bytes: u64,
        elapsed: Duration,
    },
    TileFinished {
        product_id: String,
        scene_dir: Utf8PathBuf,
        elapsed: Duration,
    },
}

pub trait ProgressSink: Send + Sync {
    fn event(&self, event: ProgressEvent);
}

pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn event(&self, _event: ProgressEvent) {}
}

/// One band file to download: `{location}{entry}.jp2` into the scene directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub name: String,
    pub url: String,
    pub target: Utf8PathBuf,
}

pub fn download_tasks(
    location: &StoreLocation,
    scene_dir: &Utf8Path,
    entries: &[ManifestEntry],
) -> Vec<DownloadTask> {
    entries
        .iter()
        .map(|entry| DownloadTask {
            name: format!("{}.jp2", entry.as_str()),
            url: location.band_url(entry.as_str()),
            target: scene_dir.join(format!("{}.jp2", entry.as_str())),
        })
        .collect()
}

/// Resolves where a product lives in the bucket without touching the network.
pub fn locate(product_id: &ProductId, base_url: Option<&str>) -> Result<LocateResult, FetchError> {
    let level = product_id.processing_level()?;
    let coordinates = product_id.tile_coordinates()?;
    let base_url = base_url_for(product_id, base_url)?;
    let location = StoreLocation::build(base_url, product_id, &coordinates);
    Ok(LocateResult {
        product_id: product_id.to_string(),
        processing_level: level.to_string(),
        coordinates,
        manifest_url: location.file_url(level.manifest_name()),
        store_location: location.to_string(),
    })
}

fn base_url_for<'b>(
    product_id: &ProductId,
    base_url: Option<&'b str>,
) -> Result<&'b str, FetchError> {
    match base_url {
        Some(url) => Ok(url),
        None => Ok(product_id.processing_level()?.default_base_url()),
    }
}

#[derive(Debug, Clone)]
struct TileDownload {
    scene_dir: Utf8PathBuf,
    files: usize,
    bytes: u64,
}

/// Retrieves tiles through one shared store client. The client and sleeper
/// are borrowed for the lifetime of the `App`.
pub struct App<'a, C: ?Sized, S: ?Sized> {
    client: &'a C,
    sleeper: &'a S,
    options: FetchOptions,
}

impl<'a, C, S> App<'a, C, S>
where
    C: ObjectStoreClient + ?Sized,
    S: Sleeper + ?Sized,
{
    pub fn new(client: &'a C, sleeper: &'a S, options: FetchOptions) -> Self {
        Self {
            client,
            sleeper,
            options,
        }
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    /// Downloads every band file of one tile and returns its scene directory.
    pub fn fetch_one(
        &self,
        base_url: &str,
        product_id: &ProductId,
        target_root: &Utf8Path,
        sink: &dyn ProgressSink,
    ) -> Result<Utf8PathBuf, FetchError> {
        self.retrieve_tile(base_url, product_id, target_root, sink)
            .map(|tile| tile.scene_dir)
    }

    /// Fetches tiles in order and stops at the first failing tile. Without a
    /// base URL each product uses the public bucket for its level.
    pub fn fetch_many(
        &self,
        product_ids: &[ProductId],
        target_root: &Utf8Path,
        base_url: Option<&str>,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<Utf8PathBuf>, FetchError> {
        let mut scene_dirs = Vec::with_capacity(product_ids.len());
        for product_id in product_ids {
            let base_url = base_url_for(product_id, base_url)?;
            scene_dirs.push(self.fetch_one(base_url, product_id, target_root, sink)?);
        }
        Ok(scene_dirs)
    }

    /// Like `fetch_many`, but reports every tile and honors the configured
    /// `FailurePolicy`.
    pub fn fetch_batch(
        &self,
        product_ids: &[ProductId],
        target_root: &Utf8Path,
        base_url: Option<&str>,
        sink: &dyn ProgressSink,
    ) -> Result<FetchResult, FetchError> {
        let mut items = Vec::with_capacity(product_ids.len());
        for product_id in product_ids {
            let level = product_id.processing_level().ok().map(|level| level.to_string());
            let outcome = base_url_for(product_id, base_url)
                .and_then(|base| self.retrieve_tile(base, product_id, target_root, sink));
            match outcome {
                Ok(tile) => items.push(FetchItemResult {
                    product_id: product_id.to_string(),
                    processing_level: level,
                    status: "downloaded".to_string(),
                    scene_dir: Some(tile.scene_dir.to_string()),
                    files: tile.files,
                    bytes: tile.bytes,
                    error: None,
                    finished_at: iso_timestamp(),
                }),
                Err(err) if self.options.failure_policy == FailurePolicy::CollectAll => {
                    tracing::error!(%product_id, error = %err, "tile failed");
                    items.push(FetchItemResult {
                        product_id: product_id.to_string(),
                        processing_level: level,
                        status: "failed".to_string(),
                        scene_dir: None,
                        files: 0,
                        bytes: 0,
                        error: Some(err.to_string()),
                        finished_at: iso_timestamp(),
                    });
                }
                Err(err) => return Err(err),
            }
        }
        Ok(FetchResult { items })
    }

    fn retrieve_tile(
        &self,
        base_url: &str,
        product_id: &ProductId,
        target_root: &Utf8Path,
        sink: &dyn ProgressSink,
    ) -> Result<TileDownload, FetchError> {
        let start = Instant::now();
        let coords = product_id.tile_coordinates()?;
        let level = product_id.processing_level()?;
        let location = StoreLocation::build(base_url, product_id, &coords);
        fs::create_dir_all(target_root.as_std_path())
            .map_err(|err| FetchError::Filesystem(format!("create {target_root}: {err}")))?;

        let entries = ManifestClient::new(self.client, self.sleeper, self.options.retry)
            .fetch_manifest(&location, product_id, level)?;

        let scene_dir = target_root.join(product_id.scene_dir_name());
        fs::create_dir_all(scene_dir.as_std_path())
            .map_err(|err| FetchError::Filesystem(format!("create {scene_dir}: {err}")))?;
        let tasks = download_tasks(&location, &scene_dir, &entries);
        tracing::info!(%product_id, %location, files = tasks.len(), "downloading tile");
        sink.event(ProgressEvent::TileStarted {
            product_id: product_id.to_string(),
            files: tasks.len(),
        });

        let bytes = self.download_all(product_id, &tasks, sink)?;

        sink.event(ProgressEvent::TileFinished {
            product_id: product_id.to_string(),
            scene_dir: scene_dir.clone(),
            elapsed: start.elapsed(),
        });
        Ok(TileDownload {
            scene_dir,
            files: tasks.len(),
            bytes,
        })
    }

    /// Downloads tasks in manifest order, in batches of `concurrency`. No
    /// batch starts after a failure; the earliest failing task is reported.
    fn download_all(
        &self,
        product_id: &ProductId,
        tasks: &[DownloadTask],
        sink: &dyn ProgressSink,
    ) -> Result<u64, FetchError> {
        let fetcher = FileFetcher::new(self.client, self.sleeper, self.options.retry);
        let total = tasks.len();
        let mut bytes = 0;

        for (batch_index, batch) in tasks.chunks(self.options.concurrency.max(1)).enumerate() {
            let offset = batch_index * self.options.concurrency.max(1);
            let results = if batch.len() == 1 {
                vec![download_task(&fetcher, product_id, offset, total, &batch[0], sink)]
            } else {
                thread::scope(|scope| {
                    let handles = batch
                        .iter()
                        .enumerate()
                        .map(|(position, task)| {
                            let fetcher = &fetcher;
                            let index = offset + position;
                            scope.spawn(move || {
                                download_task(fetcher, product_id, index, total, task, sink)
                            })
                        })
                        .collect::<Vec<_>>();
                    handles
                        .into_iter()
                        .map(|handle| {
                            handle.join().unwrap_or_else(|payload| panic::resume_unwind(payload))
                        })
                        .collect::<Vec<_>>()
                })
            };
            for result in results {
                bytes += result?;
            }
        }
        Ok(bytes)
    }
}

fn download_task<C, S>(
    fetcher: &FileFetcher<'_, C, S>,
    product_id: &ProductId,
    index: usize,
    total: usize,
    task: &DownloadTask,
    sink: &dyn ProgressSink,
) -> Result<u64, FetchError>
where
    C: ObjectStoreClient + ?Sized,
    S: Sleeper + ?Sized,
{
    sink.event(ProgressEvent::FileStarted {
        product_id: product_id.to_string(),
        file: task.name.clone(),
        index,
        total,
    });
    let start = Instant::now();
    let bytes = fetcher.fetch(&task.url, &task.target)?;
    sink.event(ProgressEvent::FileFinished {
        product_id: product_id.to_string(),
        file: task.name.clone(),
        index,
        total,
        bytes,
        elapsed: start.elapsed(),
    });
    Ok(bytes)
}

fn iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
