//! Download coordinator: fans out one download per asset and reports when
//! the last one has landed.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use voxbridge_core::{AssetGroup, ControllerError, DownloadError, DownloadJob, PendingConfig};
use voxbridge_engine::AssetDownloader;

/// Completion of one dispatched download, tagged with the initialize
/// generation that issued it.
#[derive(Debug)]
pub struct DownloadOutcome {
    pub generation: u64,
    pub job: DownloadJob,
    pub result: Result<PathBuf, DownloadError>,
}

#[derive(Debug, PartialEq)]
pub enum DownloadProgress {
    /// More downloads are outstanding.
    Waiting { remaining: usize },
    /// The last download succeeded; engines may be built.
    Complete,
    /// This download failed; the initialize attempt is over.
    Failed(ControllerError),
    /// Arrived after a failure or with nothing outstanding.
    Ignored,
}

#[derive(Debug, Default)]
pub struct DownloadCoordinator {
    remaining: usize,
    failed: bool,
}

impl DownloadCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets the counter and claims the jobs of every activated group.
    ///
    /// The counter is set to the full job count here, before any download is
    /// issued, so an early completion cannot be mistaken for the last one.
    pub fn begin(&mut self, groups: &[AssetGroup]) -> Vec<DownloadJob> {
        let jobs: Vec<DownloadJob> = groups
            .iter()
            .filter(|g| g.is_activated())
            .flat_map(|g| g.jobs.iter().cloned())
            .collect();
        self.remaining = jobs.len();
        self.failed = false;
        jobs
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn has_failed(&self) -> bool {
        self.failed
    }

    /// Records one completion, writing a successful download's location into
    /// its configuration slot.
    pub fn record(
        &mut self,
        job: &DownloadJob,
        result: Result<PathBuf, DownloadError>,
        config: &mut PendingConfig,
    ) -> DownloadProgress {
        if self.remaining == 0 {
            return DownloadProgress::Ignored;
        }
        self.remaining -= 1;

        if self.failed {
            return DownloadProgress::Ignored;
        }

        let result = result.and_then(|path| {
            if path.as_os_str().is_empty() {
                Err(DownloadError::NoLocation(job.url.clone()))
            } else {
                Ok(path)
            }
        });

        match result {
            Ok(path) => {
                tracing::debug!(
                    url = %job.url,
                    slot = %job.slot,
                    remaining = self.remaining,
                    "asset downloaded"
                );
                config.resolve_asset(job.slot, path);
                if self.remaining == 0 {
                    DownloadProgress::Complete
                } else {
                    DownloadProgress::Waiting {
                        remaining: self.remaining,
                    }
                }
            }
            Err(e) => {
                self.failed = true;
                DownloadProgress::Failed(ControllerError::DownloadFailed {
                    url: job.url.clone(),
                    reason: e.to_string(),
                })
            }
        }
    }

    pub fn reset(&mut self) {
        self.remaining = 0;
        self.failed = false;
    }
}

/// Issues every job on its own task. Completions come back on `tx`.
pub fn spawn_downloads(
    jobs: Vec<DownloadJob>,
    downloader: Arc<dyn AssetDownloader>,
    generation: u64,
    tx: mpsc::UnboundedSender<DownloadOutcome>,
) {
    for job in jobs {
        let downloader = Arc::clone(&downloader);
        let tx = tx.clone();
        tokio::spawn(async move {
            tracing::debug!(url = %job.url, slot = %job.slot, generation, "download dispatched");
            let result = downloader.download(&job.url).await;
            let _ = tx.send(DownloadOutcome {
                generation,
                job,
                result,
            });
        });
    }
}
