//! Progress tracking for harvest runs

use crate::util::truncate_str;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

/// Harvest statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HarvestStats {
    /// Packages read from the feed
    pub packages_seen: usize,
    /// Records written to the queue
    pub records_queued: usize,
    /// Packages dropped for lack of group or reachable resources
    pub packages_skipped: usize,
    pub resources_probed: usize,
    pub resources_unreachable: usize,
    /// Objects validated by the fetch stage
    pub objects_fetched: usize,
    pub records_imported: usize,
    /// Objects marked errored
    pub records_failed: usize,
    /// Objects left queued after a transient failure
    pub records_retryable: usize,
    pub translations_written: usize,
    pub elapsed_seconds: f64,
}

impl HarvestStats {
    /// Add the counters of a later stage
    pub fn merge(&mut self, other: &HarvestStats) {
        self.packages_seen += other.packages_seen;
        self.records_queued += other.records_queued;
        self.packages_skipped += other.packages_skipped;
        self.resources_probed += other.resources_probed;
        self.resources_unreachable += other.resources_unreachable;
        self.objects_fetched += other.objects_fetched;
        self.records_imported += other.records_imported;
        self.records_failed += other.records_failed;
        self.records_retryable += other.records_retryable;
        self.translations_written += other.translations_written;
        self.elapsed_seconds += other.elapsed_seconds;
    }

    /// Print summary to console
    pub fn print_summary(&self) {
        println!("\nHarvest Summary");
        println!("===============");
        if self.packages_seen > 0 {
            println!("Packages seen:         {}", self.packages_seen);
            println!("Records queued:        {}", self.records_queued);
            println!("Packages skipped:      {}", self.packages_skipped);
            println!(
                "Resources probed:      {} ({} unreachable)",
                self.resources_probed, self.resources_unreachable
            );
        }
        if self.objects_fetched > 0 {
            println!("Objects fetched:       {}", self.objects_fetched);
        }
        println!("Records imported:      {}", self.records_imported);
        println!("Records failed:        {}", self.records_failed);
        println!("Records to retry:      {}", self.records_retryable);
        println!("Translations written:  {}", self.translations_written);
        println!("Elapsed time:          {:.1}s", self.elapsed_seconds);
    }
}

/// Progress tracker for one harvest stage
pub struct HarvestProgress {
    /// Progress bar (None if running in quiet mode)
    progress_bar: Option<ProgressBar>,
    stage: &'static str,
    start_time: Instant,
    packages_seen: AtomicUsize,
    records_queued: AtomicUsize,
    packages_skipped: AtomicUsize,
    resources_probed: AtomicUsize,
    resources_unreachable: AtomicUsize,
    objects_fetched: AtomicUsize,
    records_imported: AtomicUsize,
    records_failed: AtomicUsize,
    records_retryable: AtomicUsize,
    translations_written: AtomicUsize,
}

impl HarvestProgress {
    /// Create a tracker; `total` sizes the bar when known
    pub fn new(stage: &'static str, total: Option<u64>, quiet: bool) -> Self {
        let progress_bar = if !quiet {
            let pb = match total {
                Some(total) => ProgressBar::new(total),
                None => ProgressBar::new_spinner(),
            };

            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} {prefix} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            pb.set_prefix(stage);

            Some(pb)
        } else {
            None
        };

        Self {
            progress_bar,
            stage,
            start_time: Instant::now(),
            packages_seen: AtomicUsize::new(0),
            records_queued: AtomicUsize::new(0),
            packages_skipped: AtomicUsize::new(0),
            resources_probed: AtomicUsize::new(0),
            resources_unreachable: AtomicUsize::new(0),
            objects_fetched: AtomicUsize::new(0),
            records_imported: AtomicUsize::new(0),
            records_failed: AtomicUsize::new(0),
            records_retryable: AtomicUsize::new(0),
            translations_written: AtomicUsize::new(0),
        }
    }

    fn tick(&self, label: &str) {
        if let Some(ref pb) = self.progress_bar {
            pb.inc(1);
            pb.set_message(truncate_str(label, 40));
        }
    }

    /// Gather outcome counters, reported once per run
    pub fn packages_gathered(&self, seen: usize, skipped: usize, probed: usize, unreachable: usize) {
        self.packages_seen.fetch_add(seen, Ordering::Relaxed);
        self.packages_skipped.fetch_add(skipped, Ordering::Relaxed);
        self.resources_probed.fetch_add(probed, Ordering::Relaxed);
        self.resources_unreachable.fetch_add(unreachable, Ordering::Relaxed);
    }

    pub fn record_queued(&self, guid: &str) {
        self.records_queued.fetch_add(1, Ordering::Relaxed);
        self.tick(guid);
    }

    pub fn object_fetched(&self, guid: &str) {
        self.objects_fetched.fetch_add(1, Ordering::Relaxed);
        self.tick(guid);
    }

    pub fn record_imported(&self, name: &str, translations: usize) {
        self.records_imported.fetch_add(1, Ordering::Relaxed);
        self.translations_written.fetch_add(translations, Ordering::Relaxed);
        self.tick(name);
    }

    pub fn record_failed(&self, guid: &str) {
        self.records_failed.fetch_add(1, Ordering::Relaxed);
        self.tick(guid);
    }

    pub fn record_retryable(&self, guid: &str) {
        self.records_retryable.fetch_add(1, Ordering::Relaxed);
        self.tick(guid);
    }

    /// Get current statistics
    pub fn get_stats(&self) -> HarvestStats {
        HarvestStats {
            packages_seen: self.packages_seen.load(Ordering::Relaxed),
            records_queued: self.records_queued.load(Ordering::Relaxed),
            packages_skipped: self.packages_skipped.load(Ordering::Relaxed),
            resources_probed: self.resources_probed.load(Ordering::Relaxed),
            resources_unreachable: self.resources_unreachable.load(Ordering::Relaxed),
            objects_fetched: self.objects_fetched.load(Ordering::Relaxed),
            records_imported: self.records_imported.load(Ordering::Relaxed),
            records_failed: self.records_failed.load(Ordering::Relaxed),
            records_retryable: self.records_retryable.load(Ordering::Relaxed),
            translations_written: self.translations_written.load(Ordering::Relaxed),
            elapsed_seconds: self.start_time.elapsed().as_secs_f64(),
        }
    }

    /// Finish the progress bar
    pub fn finish(&self) {
        if let Some(ref pb) = self.progress_bar {
            let stats = self.get_stats();
            pb.finish_with_message(format!(
                "{} done: {} queued, {} imported, {} failed, {} to retry",
                self.stage,
                stats.records_queued,
                stats.records_imported,
                stats.records_failed,
                stats.records_retryable
            ));
        }
    }

    /// Stop the bar without the completion message
    pub fn abandon(&self) {
        if let Some(ref pb) = self.progress_bar {
            pb.abandon_with_message(format!("{} aborted", self.stage));
        }
    }
}
