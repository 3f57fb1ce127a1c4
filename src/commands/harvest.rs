use anyhow::{Context, Result};
use statharvest::{
    catalog::open_catalog,
    config::Config,
    feed::open_feed,
    gather::{HttpProbe, ResourceProbe, StaticProbe},
    harvest::{DirQueue, FeedHarvester, HarvestRunner, HarvestRunnerBuilder, HarvestStats},
};
use std::sync::Arc;
use tracing::info;

/// Probe configured for this run
pub fn build_probe(config: &Config, skip_probe: bool) -> Result<Arc<dyn ResourceProbe>> {
    if skip_probe {
        info!("Resource probing disabled; every resource counts as reachable");
        return Ok(Arc::new(StaticProbe::all_reachable()));
    }
    let probe = HttpProbe::new(&config.probe).context("Failed to create resource probe")?;
    Ok(Arc::new(probe))
}

/// Harvester over the configured feed
pub fn build_harvester(config: &Config, skip_probe: bool) -> Result<FeedHarvester> {
    let feed = open_feed(&config.harvest, &config.probe).context("Failed to open metadata feed")?;
    let probe = build_probe(config, skip_probe)?;
    Ok(FeedHarvester::new(feed, probe, Arc::new(config.locale.clone()))
        .with_max_packages(config.harvest.max_packages))
}

fn build_runner(config: &Config, skip_probe: bool) -> Result<(HarvestRunner, String)> {
    let harvester = build_harvester(config, skip_probe)?;
    let source = harvester.source_name().to_string();

    let queue = DirQueue::open(&config.harvest.queue_dir).with_context(|| {
        format!(
            "Failed to open queue directory {}",
            config.harvest.queue_dir.display()
        )
    })?;
    let catalog = open_catalog(&config.catalog).context("Failed to open catalog")?;

    let runner = HarvestRunnerBuilder::new(Box::new(harvester))
        .with_queue(Box::new(queue))
        .with_catalog(Arc::from(catalog))
        .with_failure_policy(config.harvest.failure_policy)
        .with_quiet(config.harvest.quiet)
        .build()?;

    Ok((runner, source))
}

fn report(config: &Config, stats: &HarvestStats) {
    if !config.harvest.quiet {
        stats.print_summary();
    }
}

pub fn gather(config: Config, skip_probe: bool) -> Result<()> {
    let (mut runner, source) = build_runner(&config, skip_probe)?;
    let stats = runner.gather(&source).context("Gather stage failed")?;
    report(&config, &stats);
    Ok(())
}

pub fn fetch(config: Config) -> Result<()> {
    let (mut runner, _) = build_runner(&config, true)?;
    let stats = runner.fetch().context("Fetch stage failed")?;
    report(&config, &stats);
    Ok(())
}

pub fn import(config: Config) -> Result<()> {
    let (mut runner, _) = build_runner(&config, true)?;
    let stats = runner.import().context("Import stage failed")?;
    report(&config, &stats);
    Ok(())
}

pub fn run(config: Config, skip_probe: bool) -> Result<()> {
    let (mut runner, source) = build_runner(&config, skip_probe)?;
    let stats = runner.run(&source).context("Harvest failed")?;
    report(&config, &stats);
    Ok(())
}
