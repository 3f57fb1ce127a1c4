//! End-to-end harvest tests: feed file -> scripted probe -> queue -> local catalog

use statharvest::catalog::{CatalogStore, LocalCatalog};
use statharvest::config::{FailurePolicy, LocaleTables};
use statharvest::feed::FileFeed;
use statharvest::gather::StaticProbe;
use statharvest::harvest::{
    DirQueue, FeedHarvester, HarvestError, HarvestQueue, HarvestRunner, HarvestRunnerBuilder,
    MemoryQueue, ObjectState,
};
use statharvest::types::RecordId;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tempfile::NamedTempFile;

const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<packages>
  <package>
    <dataset datasetID="px-x-0102010000_101" xml:lang="fr">
      <title>Bilan de la population</title>
      <notes>Population résidante permanente.</notes>
      <author>OFS</author>
      <maintainer>Section Démographie</maintainer>
      <coverage>1971-2014</coverage>
      <published>2015-08-27</published>
      <tags><tag>population</tag></tags>
      <groups><group>01.01</group></groups>
      <resource><url>http://files.example/fr.px</url><name>fr.px</name></resource>
    </dataset>
    <dataset datasetID="px-x-0102010000_101" xml:lang="de">
      <title>Bevölkerungsbilanz</title>
      <notes>Ständige Wohnbevölkerung.</notes>
      <author>BFS</author>
      <maintainer>Sektion Demografie</maintainer>
      <licence>http://www.bfs.admin.ch/terms</licence>
      <copyright>cc-by</copyright>
      <coverage>1971-2014</coverage>
      <published>2015-08-27</published>
      <tags><tag>bevölkerung</tag></tags>
      <groups><group>01.01</group></groups>
      <resource><url>http://files.example/de.px</url><name>de.px</name></resource>
    </dataset>
    <dataset datasetID="px-x-0102010000_101" xml:lang="en">
      <title>Population balance</title>
      <author>FSO</author>
      <maintainer>Demography section</maintainer>
      <coverage>1971-2014</coverage>
      <groups><group>01.01</group></groups>
      <resource><url>http://files.example/en.px</url><name>en.px</name></resource>
    </dataset>
  </package>
  <package>
    <dataset datasetID="su-d-17.02" xml:lang="de">
      <title>Nationalratswahlen</title>
      <author>BFS</author>
      <groups><group>17.02</group></groups>
      <resource><url>http://files.example/nr.xlsx</url><name>nr.xlsx</name></resource>
    </dataset>
  </package>
  <package>
    <dataset datasetID="je-d-05" xml:lang="de">
      <title>Preise</title>
      <groups><group>05.01</group></groups>
      <resource><url>http://files.example/preise.xlsx</url><name>preise.xlsx</name></resource>
    </dataset>
  </package>
  <package>
    <dataset datasetID="gs-d-14" xml:lang="de">
      <title>Spitalstatistik</title>
      <groups><group>14.04</group></groups>
      <resource><url>http://files.example/gone.csv</url><name>gone.csv</name></resource>
    </dataset>
  </package>
  <package>
    <dataset datasetID="su-d-17.03" xml:lang="de">
      <title>Nationalratswahlen</title>
      <groups><group>17.03</group></groups>
      <resource><url>http://files.example/nr2.xlsx</url><name>nr2.xlsx</name></resource>
    </dataset>
  </package>
</packages>
"#;

fn feed_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn harvester(feed: &Path) -> FeedHarvester {
    let probe = StaticProbe::all_reachable()
        .with_status("http://files.example/fr.px", 404)
        .with_status("http://files.example/gone.csv", 500);
    FeedHarvester::new(
        Box::new(FileFeed::new(feed)),
        Arc::new(probe),
        Arc::new(LocaleTables::default()),
    )
}

fn runner(
    feed: &Path,
    queue: Box<dyn HarvestQueue>,
    catalog: Arc<LocalCatalog>,
    policy: FailurePolicy,
) -> HarvestRunner {
    HarvestRunnerBuilder::new(Box::new(harvester(feed)))
        .with_queue(queue)
        .with_catalog(catalog)
        .with_failure_policy(policy)
        .with_quiet(true)
        .build()
        .unwrap()
}

#[test]
fn test_full_run_imports_buildable_packages() {
    let feed = feed_file(FEED);
    let catalog = Arc::new(LocalCatalog::in_memory());
    let mut r = runner(
        feed.path(),
        Box::new(MemoryQueue::new()),
        catalog.clone(),
        FailurePolicy::Isolate,
    );

    let stats = r.run("test-feed").unwrap();
    assert_eq!(stats.packages_seen, 5);
    assert_eq!(stats.records_queued, 3);
    assert_eq!(stats.packages_skipped, 2);
    assert_eq!(stats.records_imported, 3);
    assert_eq!(stats.records_failed, 0);

    // Bevölkerung and Politik
    assert_eq!(catalog.group_count(), 2);
    assert_eq!(catalog.organization_count(), 1);
    assert_eq!(catalog.package_count(), 3);

    let id = RecordId::for_dataset("px-x-0102010000_101").to_string();
    let package = catalog.package_show(&id).unwrap().unwrap();
    assert_eq!(package.name, "bevolkerungsbilanz");
    assert_eq!(package.title, "Bevölkerungsbilanz");
    assert_eq!(package.groups, vec!["bevolkerung"]);
    assert_eq!(package.tags, vec!["bevölkerung"]);
    assert_eq!(package.license_id.as_deref(), Some("cc-by"));
    let urls: Vec<_> = package.resources.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(urls, vec!["http://files.example/de.px", "http://files.example/en.px"]);
    assert!(package.notes.starts_with(
        "Ständige Wohnbevölkerung.\n  Periode der Erhebung 1971-2014\n  Veröffentlicht: 2015-08-27\n  [Das Thema"
    ));

    assert_eq!(catalog.translation("fr", "Bevölkerungsbilanz").as_deref(), Some("Bilan de la population"));
    assert_eq!(catalog.translation("en", "BFS").as_deref(), Some("FSO"));
    assert_eq!(catalog.translation("it", "Politik").as_deref(), Some("Politica"));
    assert!(catalog
        .translation("en", &package.notes)
        .unwrap()
        .starts_with("\n  Inquiry period 1971-2014\n  [The topic population"));
}

#[test]
fn test_second_run_creates_no_duplicates() {
    let feed = feed_file(FEED);
    let catalog = Arc::new(LocalCatalog::in_memory());
    let dir = tempfile::tempdir().unwrap();

    for _ in 0..2 {
        let queue = DirQueue::open(dir.path().join("queue")).unwrap();
        let mut r = runner(feed.path(), Box::new(queue), catalog.clone(), FailurePolicy::Isolate);
        r.run("test-feed").unwrap();
    }

    assert_eq!(catalog.group_count(), 2);
    assert_eq!(catalog.organization_count(), 1);
    assert_eq!(catalog.package_count(), 3);

    let queue = DirQueue::open(dir.path().join("queue")).unwrap();
    let counts = queue.counts().unwrap();
    assert_eq!(counts.total(), 3);
    assert_eq!(counts.imported, 3);
}

#[test]
fn test_same_title_gets_distinct_slugs() {
    let feed = feed_file(FEED);
    let catalog = Arc::new(LocalCatalog::in_memory());
    let mut r = runner(
        feed.path(),
        Box::new(MemoryQueue::new()),
        catalog.clone(),
        FailurePolicy::Isolate,
    );
    r.run("test-feed").unwrap();

    let first = catalog
        .package_show(&RecordId::for_dataset("su-d-17.02").to_string())
        .unwrap()
        .unwrap();
    let second = catalog
        .package_show(&RecordId::for_dataset("su-d-17.03").to_string())
        .unwrap()
        .unwrap();

    let mut names = vec![first.name, second.name];
    names.sort();
    assert_eq!(names[0], "nationalratswahlen");
    assert!(names[1].starts_with("nationalratswahlen-"));
}

#[test]
fn test_malformed_feed_queues_nothing() {
    let feed = feed_file("<packages><package><dataset datasetID=\"1\" xml:lang=\"de\"><title>x</notes>");
    let catalog = Arc::new(LocalCatalog::in_memory());
    let mut r = runner(
        feed.path(),
        Box::new(MemoryQueue::new()),
        catalog.clone(),
        FailurePolicy::Isolate,
    );

    let err = r.gather("broken-feed").unwrap_err();
    assert!(matches!(err, HarvestError::Feed(_)));
    assert_eq!(r.queue().counts().unwrap().total(), 0);
}

#[test]
fn test_corrupt_queue_entry_is_isolated_or_aborts() {
    let feed = feed_file(FEED);
    let dir = tempfile::tempdir().unwrap();
    let queue_dir = dir.path().join("queue");

    for policy in [FailurePolicy::Isolate, FailurePolicy::Abort] {
        let _ = std::fs::remove_dir_all(&queue_dir);
        let catalog = Arc::new(LocalCatalog::in_memory());

        let mut r = runner(
            feed.path(),
            Box::new(DirQueue::open(&queue_dir).unwrap()),
            catalog.clone(),
            policy,
        );
        r.gather("test-feed").unwrap();
        r.fetch().unwrap();

        // Damage every fetched object's content on disk
        let mut queue = DirQueue::open(&queue_dir).unwrap();
        for mut object in queue.objects_in(ObjectState::Fetched).unwrap() {
            object.content = "{}".to_string();
            queue.update(&object).unwrap();
        }

        let result = r.import();
        match policy {
            FailurePolicy::Isolate => {
                let stats = result.unwrap();
                assert_eq!(stats.records_failed, 3);
                assert_eq!(r.queue().counts().unwrap().errored, 3);
            }
            FailurePolicy::Abort => {
                assert!(matches!(result, Err(HarvestError::Aborted { .. })));
                assert_eq!(r.queue().counts().unwrap().errored, 1);
            }
        }
        assert_eq!(catalog.package_count(), 0);
    }
}

#[test]
fn test_audit_lists_unreachable_resources() {
    let feed = feed_file(FEED);
    let mut lines: Vec<String> = harvester(feed.path())
        .audit()
        .unwrap()
        .iter()
        .map(|m| m.to_string())
        .collect();
    lines.sort();
    assert_eq!(
        lines,
        vec![
            "404: http://files.example/fr.px",
            "500: http://files.example/gone.csv",
        ]
    );
}
