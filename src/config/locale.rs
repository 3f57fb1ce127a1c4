//! Locale tables: taxonomy, notes labels and organization texts
//!
//! These tables are immutable once loaded. They are deserialized from the
//! `[locale]` section of the config file and shared read-only by every stage.
//! The defaults describe the Swiss Federal Statistical Office feed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Hyperlink to a topic page, appended to enriched notes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicLink {
    pub text: String,
    pub url: String,
}

impl TopicLink {
    fn new(text: &str, url: &str) -> Self {
        Self {
            text: text.to_string(),
            url: url.to_string(),
        }
    }

    /// Markdown rendering `[text](url)`
    pub fn to_markdown(&self) -> String {
        format!("[{}]({})", self.text, self.url)
    }
}

/// One row of the closed taxonomy table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyEntry {
    /// Two-character numeric code prefix (e.g. "01")
    pub code: String,
    /// Group name per locale
    pub names: BTreeMap<String, String>,
    /// Topic link per locale
    #[serde(default)]
    pub topics: BTreeMap<String, TopicLink>,
}

/// Labels used by notes enrichment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocaleLabels {
    /// Prefix of the coverage line (e.g. "Periode der Erhebung")
    pub inquiry_period: String,
    /// Prefix of the publication line, including its colon
    pub published: String,
}

/// Organization name and description in one locale
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationText {
    pub name: String,
    pub description: String,
}

/// The organization owning every harvested dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationProfile {
    pub texts: BTreeMap<String, OrganizationText>,
    #[serde(default)]
    pub website: Option<String>,
}

/// Immutable per-locale tables driving classification, enrichment and translation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocaleTables {
    /// Locale whose record is used as translation source
    pub canonical: String,
    /// All locales the catalog translates into, canonical included
    pub locales: Vec<String>,
    /// Ordered taxonomy table; first matching code wins
    pub taxonomy: Vec<TaxonomyEntry>,
    pub labels: BTreeMap<String, LocaleLabels>,
    pub organization: OrganizationProfile,
}

impl LocaleTables {
    /// Configured locales other than the canonical one, in configured order
    pub fn other_locales(&self) -> impl Iterator<Item = &str> {
        self.locales
            .iter()
            .map(String::as_str)
            .filter(move |l| *l != self.canonical)
    }

    /// Labels for a locale, falling back to the canonical locale's
    pub fn labels_for(&self, locale: &str) -> Option<&LocaleLabels> {
        self.labels
            .get(locale)
            .or_else(|| self.labels.get(&self.canonical))
    }

    /// Topic link of an entry for a locale, falling back to the canonical locale's
    pub fn topic_for<'a>(&self, entry: &'a TaxonomyEntry, locale: &str) -> Option<&'a TopicLink> {
        entry
            .topics
            .get(locale)
            .or_else(|| entry.topics.get(&self.canonical))
    }

    /// Group name of an entry in the canonical locale
    pub fn canonical_name<'a>(&self, entry: &'a TaxonomyEntry) -> Option<&'a str> {
        entry.names.get(&self.canonical).map(String::as_str)
    }

    /// Organization text in the canonical locale
    pub fn canonical_organization(&self) -> Option<&OrganizationText> {
        self.organization.texts.get(&self.canonical)
    }

    /// Collect every inconsistency in the tables
    pub fn validation_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.canonical.is_empty() {
            errors.push("locale.canonical must not be empty".to_string());
        }
        if !self.locales.contains(&self.canonical) {
            errors.push(format!(
                "locale.locales must contain the canonical locale '{}'",
                self.canonical
            ));
        }

        let mut seen = Vec::new();
        for entry in &self.taxonomy {
            if entry.code.len() != 2 || !entry.code.chars().all(|c| c.is_ascii_digit()) {
                errors.push(format!(
                    "taxonomy code '{}' must be two ASCII digits",
                    entry.code
                ));
            }
            if seen.contains(&entry.code) {
                errors.push(format!("taxonomy code '{}' is listed twice", entry.code));
            }
            seen.push(entry.code.clone());
            if self.canonical_name(entry).is_none() {
                errors.push(format!(
                    "taxonomy code '{}' has no name in canonical locale '{}'",
                    entry.code, self.canonical
                ));
            }
        }

        if self.labels.get(&self.canonical).is_none() {
            errors.push(format!(
                "locale.labels has no entry for canonical locale '{}'",
                self.canonical
            ));
        }
        if self.canonical_organization().is_none() {
            errors.push(format!(
                "organization has no text for canonical locale '{}'",
                self.canonical
            ));
        }

        errors
    }
}

const FSO_THEMES: &str = "http://www.bfs.admin.ch/bfs/portal";

fn theme_url(locale: &str, path: &str) -> String {
    format!("{}/{}/index/themen/{}", FSO_THEMES, locale, path)
}

fn names(pairs: [(&str, &str); 4]) -> BTreeMap<String, String> {
    pairs
        .into_iter()
        .map(|(l, n)| (l.to_string(), n.to_string()))
        .collect()
}

fn topics(pairs: [(&str, &str, String); 4]) -> BTreeMap<String, TopicLink> {
    pairs
        .into_iter()
        .map(|(l, text, url)| (l.to_string(), TopicLink::new(text, &url)))
        .collect()
}

fn default_taxonomy() -> Vec<TaxonomyEntry> {
    let health_de = "Das Thema Gesundheit im Bundesamt für Statistik";
    let basis_de = "Das Thema Grundlagen und Übersichten im Bundesamt für Statistik";

    vec![
        TaxonomyEntry {
            code: "01".to_string(),
            names: names([
                ("de", "Bevölkerung"),
                ("fr", "Population"),
                ("it", "Popolazione"),
                ("en", "Population"),
            ]),
            topics: topics([
                (
                    "de",
                    "Das Thema Bevölkerung im Bundesamt für Statistik",
                    theme_url("de", "01/01/keyw.html"),
                ),
                (
                    "fr",
                    "Le sujet de la population à l'Office fédéral de la statistique",
                    theme_url("fr", "01/01/keyw.html"),
                ),
                (
                    "it",
                    "Il tema della popolazione presso l'Ufficio federale di statistica",
                    theme_url("de", "01/01/keyw.html"),
                ),
                (
                    "en",
                    "The topic population at the Swiss Federal Statistical Office",
                    theme_url("en", "01/01/keyw.html"),
                ),
            ]),
        },
        TaxonomyEntry {
            code: "17".to_string(),
            names: names([
                ("de", "Politik"),
                ("fr", "Politique"),
                ("it", "Politica"),
                ("en", "Politics"),
            ]),
            topics: topics([
                (
                    "de",
                    "Das Thema Politik im Bundesamt für Statistik",
                    theme_url("de", "17/01/keyw.html"),
                ),
                (
                    "fr",
                    "Le sujet de la politique à l'Office fédéral de la statistique",
                    theme_url("fr", "17/01/keyw.html"),
                ),
                (
                    "it",
                    "Il tema della politica presso l'Ufficio federale di statistica",
                    theme_url("de", "17/01/keyw.html"),
                ),
                (
                    "en",
                    "The topic politics at the Swiss Federal Statistical Office",
                    theme_url("de", "17/01/keyw.html"),
                ),
            ]),
        },
        TaxonomyEntry {
            code: "00".to_string(),
            names: names([
                ("de", "Statistische Grundlagen und Übersichten"),
                ("fr", "Bases statistiques et généralités"),
                ("it", "Basi statistiche e presentazioni generali"),
                ("en", "Statistical basis and overviews"),
            ]),
            topics: topics([
                ("de", basis_de, theme_url("de", "00.html")),
                ("fr", basis_de, theme_url("de", "00.html")),
                ("it", basis_de, theme_url("de", "00.html")),
                ("en", basis_de, theme_url("de", "00.html")),
            ]),
        },
        TaxonomyEntry {
            code: "14".to_string(),
            names: names([
                ("de", "Gesundheit"),
                ("fr", "Santé"),
                ("it", "Salute"),
                ("en", "Health"),
            ]),
            topics: topics([
                ("de", health_de, theme_url("de", "14/01/keyw.html")),
                ("fr", health_de, theme_url("de", "14/01/keyw.html")),
                ("it", health_de, theme_url("de", "14/01/keyw.html")),
                ("en", health_de, theme_url("de", "14/01/keyw.html")),
            ]),
        },
    ]
}

fn default_labels() -> BTreeMap<String, LocaleLabels> {
    [
        ("de", "Periode der Erhebung", "Veröffentlicht:"),
        ("fr", "Période de collection", "Publié:"),
        ("it", "Periodo di inchiesta", "Pubblicato:"),
        ("en", "Inquiry period", "Published:"),
    ]
    .into_iter()
    .map(|(l, inquiry, published)| {
        (
            l.to_string(),
            LocaleLabels {
                inquiry_period: inquiry.to_string(),
                published: published.to_string(),
            },
        )
    })
    .collect()
}

fn default_organization() -> OrganizationProfile {
    let texts = [
        (
            "de",
            "Bundesamt für Statistik",
            "Orientiert über den Stand und die Entwicklung der Schweiz in zahlreichen \
             Lebensbereichen. Es liefert die quantitativen Informationen, um die Gegenwart \
             zu verstehen und die Zukunft zu planen.",
        ),
        (
            "fr",
            "Office fédéral de la statistique",
            "Fournit des informations sur l’état et l’évolution de la Suisse dans de \
             nombreux domaines. Les informations qu’il produit servent à comprendre le \
             présent et à planifier l’avenir.",
        ),
        (
            "it",
            "Ufficio federale di statistica",
            "Fornisce informazioni sullo stato e sull’evoluzione della Svizzera nei più \
             svariati settori che permettono di capire il presente e pianificare il futuro.",
        ),
        (
            "en",
            "Swiss Federal Statistical Office",
            "Publishes information on the situation and trends in Switzerland in many \
             different areas of life. It provides the quantitative information needed to \
             understand the present and to plan for the future.",
        ),
    ]
    .into_iter()
    .map(|(l, name, description)| {
        (
            l.to_string(),
            OrganizationText {
                name: name.to_string(),
                description: description.to_string(),
            },
        )
    })
    .collect();

    OrganizationProfile {
        texts,
        website: Some("http://www.bfs.admin.ch/".to_string()),
    }
}

impl Default for LocaleTables {
    fn default() -> Self {
        Self {
            canonical: "de".to_string(),
            locales: vec![
                "de".to_string(),
                "fr".to_string(),
                "it".to_string(),
                "en".to_string(),
            ],
            taxonomy: default_taxonomy(),
            labels: default_labels(),
            organization: default_organization(),
        }
    }
}
