//! Harvest runner that drives the stages over a queue and a catalog

use super::progress::{HarvestProgress, HarvestStats};
use super::queue::{HarvestQueue, MemoryQueue};
use super::{HarvestError, HarvestJob, Harvester, ObjectState, RecordOutcome};
use crate::catalog::CatalogStore;
use crate::config::FailurePolicy;
use std::sync::Arc;
use tracing::{info, warn};

/// Runs gather, fetch and import, applying the failure policy per record
pub struct HarvestRunner {
    harvester: Box<dyn Harvester>,
    queue: Box<dyn HarvestQueue>,
    catalog: Arc<dyn CatalogStore>,
    failure_policy: FailurePolicy,
    quiet: bool,
}

impl HarvestRunner {
    /// Queue used between stages
    pub fn queue(&self) -> &dyn HarvestQueue {
        self.queue.as_ref()
    }

    /// Gather stage: build records and queue them.
    ///
    /// A feed or parse failure aborts the run before anything is queued.
    pub fn gather(&mut self, source: &str) -> Result<HarvestStats, HarvestError> {
        let info = self.harvester.info();
        let job = HarvestJob::new(source);
        info!("Starting {} gather job {} from {}", info.name, job.id, source);

        let output = self.harvester.gather_stage(&job)?;
        let progress = HarvestProgress::new("gather", Some(output.objects.len() as u64), self.quiet);
        progress.packages_gathered(
            output.packages_seen,
            output.skipped.len(),
            output.resources_probed,
            output.resources_unreachable,
        );

        for object in output.objects {
            let guid = object.guid.clone();
            self.queue.enqueue(object)?;
            progress.record_queued(&guid);
        }

        progress.finish();
        let stats = progress.get_stats();
        info!(
            "Gather finished: {} packages, {} queued, {} skipped",
            stats.packages_seen, stats.records_queued, stats.packages_skipped
        );
        Ok(stats)
    }

    /// Fetch stage: validate every gathered object
    pub fn fetch(&mut self) -> Result<HarvestStats, HarvestError> {
        let objects = self.queue.objects_in(ObjectState::Gathered)?;
        let progress = HarvestProgress::new("fetch", Some(objects.len() as u64), self.quiet);

        for mut object in objects {
            match self.harvester.fetch_stage(&mut object) {
                Ok(()) => {
                    self.queue.update(&object)?;
                    progress.object_fetched(&object.guid);
                }
                Err(e) => {
                    warn!("Fetch failed for {}: {}", object.guid, e);
                    object.fail(ObjectState::Errored, &e);
                    self.queue.update(&object)?;
                    progress.record_failed(&object.guid);

                    if self.failure_policy == FailurePolicy::Abort {
                        progress.abandon();
                        return Err(HarvestError::Aborted {
                            guid: object.guid,
                            message: e.to_string(),
                        });
                    }
                }
            }
        }

        progress.finish();
        Ok(progress.get_stats())
    }

    /// Import stage: write every fetched object to the catalog
    pub fn import(&mut self) -> Result<HarvestStats, HarvestError> {
        let objects = self.queue.objects_in(ObjectState::Fetched)?;
        info!(
            "Importing {} objects into {} catalog",
            objects.len(),
            self.catalog.name()
        );
        let progress = HarvestProgress::new("import", Some(objects.len() as u64), self.quiet);

        for mut object in objects {
            let failure = match self.harvester.import_stage(&object, self.catalog.as_ref()) {
                RecordOutcome::Imported(summary) => {
                    object.advance(ObjectState::Imported);
                    self.queue.update(&object)?;
                    progress.record_imported(&summary.package_name, summary.translations);
                    None
                }
                RecordOutcome::Recoverable(e) => {
                    warn!("Import of {} failed, will retry: {}", object.guid, e);
                    object.fail(ObjectState::Fetched, &e);
                    self.queue.update(&object)?;
                    progress.record_retryable(&object.guid);
                    Some(e)
                }
                RecordOutcome::Fatal(e) => {
                    warn!("Import of {} failed: {}", object.guid, e);
                    object.fail(ObjectState::Errored, &e);
                    self.queue.update(&object)?;
                    progress.record_failed(&object.guid);
                    Some(e)
                }
            };

            if let (Some(e), FailurePolicy::Abort) = (failure, self.failure_policy) {
                progress.abandon();
                return Err(HarvestError::Aborted {
                    guid: object.guid,
                    message: e.to_string(),
                });
            }
        }

        progress.finish();
        Ok(progress.get_stats())
    }

    /// All three stages in order
    pub fn run(&mut self, source: &str) -> Result<HarvestStats, HarvestError> {
        let mut stats = self.gather(source)?;
        stats.merge(&self.fetch()?);
        stats.merge(&self.import()?);
        Ok(stats)
    }
}

/// Builder for HarvestRunner with sensible defaults
pub struct HarvestRunnerBuilder {
    harvester: Box<dyn Harvester>,
    queue: Option<Box<dyn HarvestQueue>>,
    catalog: Option<Arc<dyn CatalogStore>>,
    failure_policy: FailurePolicy,
    quiet: bool,
}

impl HarvestRunnerBuilder {
    pub fn new(harvester: Box<dyn Harvester>) -> Self {
        Self {
            harvester,
            queue: None,
            catalog: None,
            failure_policy: FailurePolicy::default(),
            quiet: false,
        }
    }

    /// Set the queue (defaults to an in-memory queue)
    pub fn with_queue(mut self, queue: Box<dyn HarvestQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Set the catalog store
    pub fn with_catalog(mut self, catalog: Arc<dyn CatalogStore>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Set quiet mode
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Build the runner
    pub fn build(self) -> Result<HarvestRunner, HarvestError> {
        let catalog = self.catalog.ok_or_else(|| {
            HarvestError::Config("Catalog store is required. Call with_catalog() first.".into())
        })?;

        Ok(HarvestRunner {
            harvester: self.harvester,
            queue: self.queue.unwrap_or_else(|| Box::new(MemoryQueue::new())),
            catalog,
            failure_policy: self.failure_policy,
            quiet: self.quiet,
        })
    }
}
