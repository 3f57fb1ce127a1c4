//! Harvester for the statistical office metadata feed

use super::importer::IdentityResolver;
use super::{GatherOutput, HarvestError, HarvestJob, HarvestObject, Harvester, HarvesterInfo, RecordOutcome};
use crate::catalog::CatalogStore;
use crate::config::LocaleTables;
use crate::feed::{parse_feed, FeedSource};
use crate::gather::{audit_resources, MetadataRecordBuilder, MissingResource, ResourceFilter, ResourceProbe};
use crate::harvest::ObjectState;
use std::sync::Arc;
use tracing::{debug, info};

/// Gathers from a [`FeedSource`] and imports through an [`IdentityResolver`]
pub struct FeedHarvester {
    feed: Box<dyn FeedSource>,
    filter: ResourceFilter,
    audit_filter: Option<ResourceFilter>,
    builder: MetadataRecordBuilder,
    resolver: IdentityResolver,
    max_packages: Option<usize>,
}

impl FeedHarvester {
    pub fn new(feed: Box<dyn FeedSource>, probe: Arc<dyn ResourceProbe>, tables: Arc<LocaleTables>) -> Self {
        let filter = ResourceFilter::new(probe);
        Self {
            feed,
            builder: MetadataRecordBuilder::new(tables.clone(), filter.clone()),
            resolver: IdentityResolver::new(tables),
            filter,
            audit_filter: None,
            max_packages: None,
        }
    }

    /// Stop queueing after `max` records
    pub fn with_max_packages(mut self, max: Option<usize>) -> Self {
        self.max_packages = max;
        self
    }

    /// Probe used by [`audit`](Self::audit) instead of the gather probe
    pub fn with_audit_probe(mut self, probe: Arc<dyn ResourceProbe>) -> Self {
        self.audit_filter = Some(ResourceFilter::new(probe));
        self
    }

    pub fn source_name(&self) -> &str {
        self.feed.source_name()
    }

    /// Probe every resource in the feed and list the ones not answering 200
    pub fn audit(&self) -> Result<Vec<MissingResource>, HarvestError> {
        let bytes = self.feed.fetch()?;
        let packages = parse_feed(&bytes)?;
        info!("Auditing resources of {} packages", packages.len());
        let filter = self.audit_filter.as_ref().unwrap_or(&self.filter);
        Ok(audit_resources(&packages, filter))
    }
}

impl Harvester for FeedHarvester {
    fn info(&self) -> HarvesterInfo {
        HarvesterInfo {
            name: "fso".to_string(),
            title: "FSO Harvester".to_string(),
            description: "Harvests metadata from the Swiss Federal Statistical Office (FSO)".to_string(),
        }
    }

    fn gather_stage(&self, job: &HarvestJob) -> Result<GatherOutput, HarvestError> {
        let bytes = self.feed.fetch()?;
        let packages = parse_feed(&bytes)?;
        info!("Parsed {} packages from {}", packages.len(), self.feed.source_name());

        let mut output = GatherOutput::default();

        for package in &packages {
            if let Some(max) = self.max_packages {
                if output.objects.len() >= max {
                    info!("Reached max packages limit: {}", max);
                    break;
                }
            }

            output.packages_seen += 1;
            let report = self.builder.build_report(package);
            output.resources_probed += report.resources_probed;
            output.resources_unreachable += report.resources_unreachable;

            match (report.record, report.skip_reason) {
                (Some(record), _) => {
                    let object = HarvestObject::from_record(&record, &job.id).map_err(|source| {
                        HarvestError::Content {
                            guid: record.id.to_string(),
                            source,
                        }
                    })?;
                    output.objects.push(object);
                }
                (None, reason) => {
                    if let Some(reason) = reason {
                        debug!("Skipping {} since it has {}", report.dataset_id, reason);
                        output.skipped.push((report.dataset_id, reason));
                    }
                }
            }
        }

        Ok(output)
    }

    fn fetch_stage(&self, object: &mut HarvestObject) -> Result<(), HarvestError> {
        object.record().map_err(|source| HarvestError::Content {
            guid: object.guid.clone(),
            source,
        })?;
        object.advance(ObjectState::Fetched);
        Ok(())
    }

    fn import_stage(&self, object: &HarvestObject, catalog: &dyn CatalogStore) -> RecordOutcome {
        let record = match object.record() {
            Ok(record) => record,
            Err(source) => {
                return RecordOutcome::Fatal(HarvestError::Content {
                    guid: object.guid.clone(),
                    source,
                })
            }
        };

        RecordOutcome::from_result(self.resolver.import(catalog, &record))
    }
}
