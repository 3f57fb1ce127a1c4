use super::harvest::build_harvester;
use anyhow::{Context, Result};
use statharvest::config::Config;
use statharvest::gather::{HttpProbe, ProbeMethod};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

pub fn audit_resources(config: Config, output: Option<PathBuf>) -> Result<()> {
    let probe = HttpProbe::new(&config.probe)
        .context("Failed to create resource probe")?
        .with_method(ProbeMethod::Get);
    let harvester = build_harvester(&config, false)?.with_audit_probe(Arc::new(probe));
    let missing = harvester.audit().context("Resource audit failed")?;

    let mut writer: Box<dyn Write> = match &output {
        Some(path) => Box::new(
            std::fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?,
        ),
        None => Box::new(std::io::stdout().lock()),
    };

    for resource in &missing {
        writeln!(writer, "{}", resource)?;
    }
    writer.flush()?;

    if !config.harvest.quiet {
        eprintln!("{} unreachable resources", missing.len());
        if let Some(path) = output {
            eprintln!("Report written to {}", path.display());
        }
    }

    Ok(())
}
