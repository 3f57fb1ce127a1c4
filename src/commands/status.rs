use anyhow::{Context, Result};
use statharvest::config::Config;
use statharvest::harvest::{DirQueue, HarvestQueue};
use statharvest::util::truncate_str;

pub fn show_queue_status(config: Config, errors: bool) -> Result<()> {
    let dir = &config.harvest.queue_dir;
    if !dir.exists() {
        anyhow::bail!("Queue directory not found: {}", dir.display());
    }

    let queue = DirQueue::open(dir)
        .with_context(|| format!("Failed to open queue directory {}", dir.display()))?;
    let counts = queue.counts()?;

    println!("\nHarvest Queue Status");
    println!("====================");
    println!("Queue directory: {}", dir.display());
    println!("Gathered:        {}", counts.gathered);
    println!("Fetched:         {}", counts.fetched);
    println!("Imported:        {}", counts.imported);
    println!("Errored:         {}", counts.errored);
    println!("Total:           {}", counts.total());

    if errors {
        let failed: Vec<_> = queue
            .all()?
            .into_iter()
            .filter(|o| o.error.is_some())
            .collect();

        if !failed.is_empty() {
            println!("\nFailed objects");
            println!("==============");
        }
        for object in failed {
            println!(
                "{} [{}] attempts={} {}",
                object.guid,
                object.state,
                object.attempts,
                truncate_str(object.error.as_deref().unwrap_or_default(), 120)
            );
        }
    }

    let pending = counts.gathered + counts.fetched;
    if pending > 0 {
        let next = if counts.gathered > 0 { "fetch" } else { "import" };
        println!("\n{} objects pending; run `statharvest {}` to continue", pending, next);
    }

    Ok(())
}
