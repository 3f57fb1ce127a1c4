//! Streaming parser for the multilingual metadata feed
//!
//! Walks the XML event stream and yields one [`Package`] per `<package>`
//! element, each holding one [`DatasetRecord`] per `<dataset>` child.

use super::source::FeedError;
use crate::types::{DatasetRecord, Package, Resource};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::io::BufRead;
use tracing::debug;

/// Dataset child elements that carry text
const TEXT_ELEMENTS: &[&str] = &[
    "title",
    "notes",
    "author",
    "maintainer",
    "maintainer_email",
    "licence",
    "copyright",
    "coverage",
    "published",
    "tag",
    "group",
    "url",
    "name",
];

/// Text elements holding codes, tags or links; these are trimmed while
/// free text keeps its surrounding whitespace
const IDENTIFIER_ELEMENTS: &[&str] = &[
    "maintainer_email",
    "licence",
    "copyright",
    "tag",
    "group",
    "url",
    "name",
];

/// Resource being built from XML events
#[derive(Debug, Default)]
struct PartialResource {
    url: Option<String>,
    name: Option<String>,
}

impl PartialResource {
    fn finish(self) -> Option<Resource> {
        let url = self.url?;
        let name = self.name.unwrap_or_else(|| {
            url.rsplit('/').next().unwrap_or_default().to_string()
        });
        Some(Resource { url, name })
    }
}

/// Result of reading up to the next package boundary
enum ParseResult {
    Package(Package),
    /// `<package>` without any `<dataset>`
    Skipped,
    Eof,
}

/// Iterates over the packages of a feed document
pub struct PackageReader<R: BufRead> {
    reader: Reader<R>,
    records: Option<Vec<DatasetRecord>>,
    record: Option<DatasetRecord>,
    resource: Option<PartialResource>,
    current_element: Option<String>,
    text_buf: String,
    packages_read: usize,
    finished: bool,
}

impl<'a> PackageReader<&'a [u8]> {
    /// Read packages from an in-memory document
    pub fn from_bytes(bytes: &'a [u8]) -> Self {
        Self::new(bytes)
    }
}

impl<R: BufRead> PackageReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            reader: Reader::from_reader(source),
            records: None,
            record: None,
            resource: None,
            current_element: None,
            text_buf: String::new(),
            packages_read: 0,
            finished: false,
        }
    }

    /// Number of packages yielded so far
    pub fn packages_read(&self) -> usize {
        self.packages_read
    }

    fn parse_next_package(&mut self) -> Result<ParseResult, FeedError> {
        let mut buf = Vec::with_capacity(8192);

        loop {
            buf.clear();
            let event = self.reader.read_event_into(&mut buf)?;

            match event {
                Event::Start(ref e) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                    match name.as_str() {
                        "package" => {
                            self.records = Some(Vec::new());
                        }
                        "dataset" if self.records.is_some() => {
                            self.record = Some(dataset_from_attributes(e)?);
                        }
                        "resource" if self.record.is_some() => {
                            self.resource = Some(PartialResource::default());
                        }
                        other if self.record.is_some() && TEXT_ELEMENTS.contains(&other) => {
                            self.current_element = Some(name);
                            self.text_buf.clear();
                        }
                        _ => {}
                    }
                }
                Event::Empty(ref e) => {
                    // Self-closing elements carry no text; only a bare dataset matters
                    let name = e.local_name();
                    if name.as_ref() == b"dataset" {
                        if let Some(ref mut records) = self.records {
                            records.push(dataset_from_attributes(e)?);
                        }
                    }
                }
                Event::Text(ref e) => {
                    if self.current_element.is_some() {
                        self.text_buf.push_str(&e.unescape()?);
                    }
                }
                Event::CData(ref e) => {
                    if self.current_element.is_some() {
                        self.text_buf.push_str(&String::from_utf8_lossy(e.as_ref()));
                    }
                }
                Event::End(ref e) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();

                    if self.current_element.as_deref() == Some(name.as_str()) {
                        self.current_element = None;
                        let text = std::mem::take(&mut self.text_buf);
                        let value = if text.trim().is_empty() {
                            None
                        } else if IDENTIFIER_ELEMENTS.contains(&name.as_str()) {
                            Some(text.trim().to_string())
                        } else {
                            Some(text)
                        };
                        self.assign_text(&name, value);
                        continue;
                    }

                    match name.as_str() {
                        "resource" => {
                            if let (Some(record), Some(resource)) =
                                (self.record.as_mut(), self.resource.take())
                            {
                                record.resource = resource.finish();
                            }
                        }
                        "dataset" => {
                            if let (Some(records), Some(record)) =
                                (self.records.as_mut(), self.record.take())
                            {
                                records.push(record);
                            }
                        }
                        "package" => {
                            if let Some(records) = self.records.take() {
                                return Ok(match Package::new(records) {
                                    Some(package) => ParseResult::Package(package),
                                    None => ParseResult::Skipped,
                                });
                            }
                        }
                        _ => {}
                    }
                }
                Event::Eof => {
                    if self.record.is_some() {
                        return Err(FeedError::UnexpectedEof("dataset"));
                    }
                    if self.records.is_some() {
                        return Err(FeedError::UnexpectedEof("package"));
                    }
                    return Ok(ParseResult::Eof);
                }
                _ => {}
            }
        }
    }

    fn assign_text(&mut self, element: &str, value: Option<String>) {
        if let Some(ref mut resource) = self.resource {
            match element {
                "url" => resource.url = value,
                "name" => resource.name = value,
                _ => {}
            }
            return;
        }

        let Some(record) = self.record.as_mut() else {
            return;
        };

        match element {
            "title" => record.title = value,
            "notes" => record.notes = value,
            "author" => record.author = value,
            "maintainer" => record.maintainer = value,
            "maintainer_email" => record.maintainer_email = value,
            "licence" => record.license_url = value,
            "copyright" => record.license_id = value,
            "coverage" => record.coverage = value,
            "published" => record.published = value,
            "tag" => record.tags.extend(value),
            "group" => record.group_codes.extend(value),
            _ => {}
        }
    }
}

impl<R: BufRead> Iterator for PackageReader<R> {
    type Item = Result<Package, FeedError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        loop {
            match self.parse_next_package() {
                Ok(ParseResult::Package(package)) => {
                    self.packages_read += 1;
                    return Some(Ok(package));
                }
                Ok(ParseResult::Skipped) => {
                    debug!("Skipping package without datasets");
                    continue;
                }
                Ok(ParseResult::Eof) => {
                    self.finished = true;
                    return None;
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Build an empty record from the `datasetID` and `xml:lang` attributes
fn dataset_from_attributes(element: &BytesStart<'_>) -> Result<DatasetRecord, FeedError> {
    let mut dataset_id = None;
    let mut locale = String::new();

    for attr in element.attributes() {
        let attr = attr?;
        let key = attr.key;
        if key.as_ref() == b"datasetID" {
            dataset_id = Some(attr.unescape_value()?.trim().to_string());
        } else if key.as_ref() == b"xml:lang" || key.local_name().as_ref() == b"lang" {
            locale = attr.unescape_value()?.trim().to_string();
        }
    }

    let dataset_id = dataset_id
        .filter(|id| !id.is_empty())
        .ok_or(FeedError::MissingAttribute {
            element: "dataset",
            attribute: "datasetID",
        })?;

    Ok(DatasetRecord::new(dataset_id, locale))
}

/// Parse a whole feed document.
///
/// Fails on the first malformed construct, so nothing from a broken feed
/// ever reaches the queue.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<Package>, FeedError> {
    PackageReader::from_bytes(bytes).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<packages>
  <package>
    <dataset datasetID="px-x-0102010000_101" xml:lang="fr">
      <title>Bilan de la population</title>
      <notes>Population résidante permanente</notes>
      <author>OFS</author>
      <maintainer>Section Démographie</maintainer>
      <maintainer_email>info@bfs.admin.ch</maintainer_email>
      <licence>http://www.bfs.admin.ch/terms</licence>
      <copyright>cc-by</copyright>
      <coverage>1971-2014</coverage>
      <published>2015-08-27</published>
      <tags><tag>population</tag><tag>bilan</tag></tags>
      <groups><group>01.01</group></groups>
      <resource>
        <url>http://www.bfs.admin.ch/files/px-x-0102010000_101.px</url>
        <name>px-x-0102010000_101.PX</name>
      </resource>
    </dataset>
    <dataset datasetID="px-x-0102010000_101" xml:lang="de">
      <title>Bevölkerungsbilanz &amp; Wanderung</title>
      <notes/>
      <author>BFS</author>
      <maintainer>Sektion Demografie</maintainer>
      <coverage>1971-2014</coverage>
      <published></published>
      <tags><tag>bevölkerung</tag></tags>
      <groups><group>01.01</group><group>17.02</group></groups>
      <resource>
        <url>http://www.bfs.admin.ch/files/de.px</url>
        <name>de.px</name>
      </resource>
    </dataset>
  </package>
  <package>
  </package>
  <package>
    <dataset datasetID="su-d-17" xml:lang="it">
      <title><![CDATA[Elezioni <nazionali>]]></title>
      <groups><group>17</group></groups>
      <resource><url>http://www.bfs.admin.ch/files/el.xlsx</url></resource>
    </dataset>
  </package>
</packages>
"#;

    #[test]
    fn test_parse_sample_feed() {
        let packages = parse_feed(SAMPLE_FEED.as_bytes()).unwrap();

        // Empty package is skipped
        assert_eq!(packages.len(), 2);
        assert_eq!(packages[0].len(), 2);

        let fr = &packages[0].records()[0];
        assert_eq!(fr.dataset_id, "px-x-0102010000_101");
        assert_eq!(fr.locale, "fr");
        assert_eq!(fr.title.as_deref(), Some("Bilan de la population"));
        assert_eq!(fr.license_url.as_deref(), Some("http://www.bfs.admin.ch/terms"));
        assert_eq!(fr.license_id.as_deref(), Some("cc-by"));
        assert_eq!(fr.tags, vec!["population", "bilan"]);
        assert_eq!(fr.group_codes, vec!["01.01"]);
        let resource = fr.resource.as_ref().unwrap();
        assert_eq!(resource.name, "px-x-0102010000_101.PX");
        assert_eq!(resource.format(), "px");
    }

    #[test]
    fn test_empty_elements_are_absent() {
        let packages = parse_feed(SAMPLE_FEED.as_bytes()).unwrap();
        let de = &packages[0].records()[1];
        assert_eq!(de.title.as_deref(), Some("Bevölkerungsbilanz & Wanderung"));
        assert_eq!(de.notes, None);
        assert_eq!(de.published, None);
        assert_eq!(de.maintainer_email, None);
        assert_eq!(de.group_codes, vec!["01.01", "17.02"]);
    }

    #[test]
    fn test_free_text_keeps_whitespace() {
        let feed = "<packages><package><dataset datasetID=\"1\" xml:lang=\"de\">\
            <notes>  Erste Zeile\n</notes>\
            <tags><tag> census </tag></tags>\
            <groups><group> 01.01 </group></groups>\
            <resource><url> http://a/b.csv </url></resource>\
            </dataset></package></packages>";
        let packages = parse_feed(feed.as_bytes()).unwrap();
        let record = packages[0].first();
        assert_eq!(record.notes.as_deref(), Some("  Erste Zeile\n"));
        assert_eq!(record.tags, vec!["census"]);
        assert_eq!(record.group_codes, vec!["01.01"]);
        assert_eq!(record.resource.as_ref().unwrap().url, "http://a/b.csv");
    }

    #[test]
    fn test_cdata_and_missing_resource_name() {
        let packages = parse_feed(SAMPLE_FEED.as_bytes()).unwrap();
        let it = packages[1].first();
        assert_eq!(it.title.as_deref(), Some("Elezioni <nazionali>"));
        let resource = it.resource.as_ref().unwrap();
        assert_eq!(resource.name, "el.xlsx");
        assert_eq!(resource.format(), "xlsx");
    }

    #[test]
    fn test_missing_dataset_id_is_an_error() {
        let feed = r#"<packages><package><dataset xml:lang="de"><title>x</title></dataset></package></packages>"#;
        let err = parse_feed(feed.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            FeedError::MissingAttribute {
                attribute: "datasetID",
                ..
            }
        ));
    }

    #[test]
    fn test_malformed_feed_is_an_error() {
        let feed = r#"<packages><package><dataset datasetID="1"><title>x</notes></dataset></package></packages>"#;
        assert!(parse_feed(feed.as_bytes()).is_err());
    }

    #[test]
    fn test_truncated_feed_is_an_error() {
        let feed = r#"<packages><package><dataset datasetID="1" xml:lang="de"><title>x</title>"#;
        assert!(parse_feed(feed.as_bytes()).is_err());
    }

    #[test]
    fn test_reader_counts_packages() {
        let mut reader = PackageReader::from_bytes(SAMPLE_FEED.as_bytes());
        while let Some(result) = reader.next() {
            result.unwrap();
        }
        assert_eq!(reader.packages_read(), 2);
    }
}
