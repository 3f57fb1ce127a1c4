//! Term translation table construction
//!
//! Every entry maps canonical text (`term`) to its equivalent in another
//! locale. Downstream the list is a set of upserts keyed by
//! `(lang_code, term)`, so emission order carries no meaning.

use super::notes::NotesEnricher;
use super::selector::canonical_index;
use crate::config::LocaleTables;
use crate::types::{Package, TermTranslation, TextField};
use std::collections::HashSet;
use std::sync::Arc;

/// Builds the translation list of a package
#[derive(Debug, Clone)]
pub struct TranslationBuilder {
    tables: Arc<LocaleTables>,
    notes: NotesEnricher,
}

impl TranslationBuilder {
    pub fn new(tables: Arc<LocaleTables>) -> Self {
        let notes = NotesEnricher::new(tables.clone());
        Self { tables, notes }
    }

    /// All translations for a package
    pub fn build(&self, package: &Package) -> Vec<TermTranslation> {
        let mut translations = self.taxonomy_translations();
        translations.extend(self.organization_translations());
        translations.extend(self.field_translations(package));
        translations.extend(self.notes_translations(package));
        translations
    }

    /// Group names of the finite taxonomy in every non-canonical locale
    pub fn taxonomy_translations(&self) -> Vec<TermTranslation> {
        let mut translations = Vec::new();

        for locale in self.tables.other_locales() {
            for entry in &self.tables.taxonomy {
                let (Some(term), Some(translated)) =
                    (self.tables.canonical_name(entry), entry.names.get(locale))
                else {
                    continue;
                };
                translations.push(TermTranslation::new(locale, term, translated));
            }
        }

        translations
    }

    /// Organization name and description in every non-canonical locale
    pub fn organization_translations(&self) -> Vec<TermTranslation> {
        let Some(canonical) = self.tables.canonical_organization() else {
            return Vec::new();
        };

        let mut translations = Vec::new();
        for locale in self.tables.other_locales() {
            let Some(text) = self.tables.organization.texts.get(locale) else {
                continue;
            };
            translations.push(TermTranslation::new(locale, &canonical.name, &text.name));
            translations.push(TermTranslation::new(
                locale,
                &canonical.description,
                &text.description,
            ));
        }

        translations
    }

    /// Title, author and maintainer of every non-canonical record, where both
    /// sides are non-empty
    pub fn field_translations(&self, package: &Package) -> Vec<TermTranslation> {
        let canonical = &package.records()[canonical_index(package, &self.tables.canonical)];
        let mut translations = Vec::new();

        for record in package.records() {
            if record.locale == canonical.locale || record.locale.is_empty() {
                continue;
            }
            for field in TextField::ALL {
                if let (Some(term), Some(translated)) =
                    (canonical.text_field(field), record.text_field(field))
                {
                    translations.push(TermTranslation::new(&record.locale, term, translated));
                }
            }
        }

        translations
    }

    /// One enriched-notes entry per non-canonical locale present in the package
    pub fn notes_translations(&self, package: &Package) -> Vec<TermTranslation> {
        let canonical = &package.records()[canonical_index(package, &self.tables.canonical)];
        let term = self.notes.enrich(canonical, &canonical.locale);

        let mut seen = HashSet::new();
        let mut translations = Vec::new();

        for record in package.records() {
            if record.locale == canonical.locale
                || record.locale.is_empty()
                || !seen.insert(record.locale.as_str())
            {
                continue;
            }
            let translated = self.notes.enrich(record, &record.locale);
            translations.push(TermTranslation::new(&record.locale, &term, translated));
        }

        translations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DatasetRecord;

    fn builder() -> TranslationBuilder {
        TranslationBuilder::new(Arc::new(LocaleTables::default()))
    }

    fn record(locale: &str, title: &str, author: &str, maintainer: &str) -> DatasetRecord {
        let mut r = DatasetRecord::new("ds-1", locale);
        r.title = Some(title.to_string()).filter(|t| !t.is_empty());
        r.author = Some(author.to_string()).filter(|t| !t.is_empty());
        r.maintainer = Some(maintainer.to_string()).filter(|t| !t.is_empty());
        r.notes = Some(format!("notes {}", locale));
        r.group_codes = vec!["01.01".to_string()];
        r
    }

    #[test]
    fn test_taxonomy_translations_cover_other_locales() {
        let translations = builder().taxonomy_translations();
        // 4 groups x 3 non-canonical locales
        assert_eq!(translations.len(), 12);
        assert!(translations.contains(&TermTranslation::new("fr", "Gesundheit", "Santé")));
        assert!(translations.contains(&TermTranslation::new("en", "Politik", "Politics")));
        assert!(translations.iter().all(|t| t.lang_code != "de"));
    }

    #[test]
    fn test_organization_translations() {
        let translations = builder().organization_translations();
        assert_eq!(translations.len(), 6);
        assert!(translations.contains(&TermTranslation::new(
            "it",
            "Bundesamt für Statistik",
            "Ufficio federale di statistica"
        )));
    }

    #[test]
    fn test_field_and_notes_counts() {
        let package = Package::new(vec![
            record("fr", "Titre", "OFS", "Section"),
            record("de", "Titel", "BFS", "Sektion"),
            record("en", "Title", "FSO", "Section EN"),
        ])
        .unwrap();

        let b = builder();
        assert_eq!(b.field_translations(&package).len(), 6);
        assert_eq!(b.notes_translations(&package).len(), 2);
        assert_eq!(b.build(&package).len(), 6 + 2 + 12 + 6);

        let fields = b.field_translations(&package);
        assert!(fields.contains(&TermTranslation::new("fr", "Titel", "Titre")));
        assert!(fields.contains(&TermTranslation::new("en", "BFS", "FSO")));
    }

    #[test]
    fn test_empty_fields_are_not_translated() {
        let package = Package::new(vec![
            record("de", "Titel", "", "Sektion"),
            record("fr", "Titre", "OFS", ""),
        ])
        .unwrap();

        let fields = builder().field_translations(&package);
        assert_eq!(fields, vec![TermTranslation::new("fr", "Titel", "Titre")]);
    }

    #[test]
    fn test_notes_translation_uses_enriched_text() {
        let mut de = record("de", "Titel", "BFS", "Sektion");
        de.coverage = Some("2019".to_string());
        let mut fr = record("fr", "Titre", "OFS", "Section");
        fr.coverage = Some("2019".to_string());
        let package = Package::new(vec![de, fr]).unwrap();

        let notes = builder().notes_translations(&package);
        assert_eq!(notes.len(), 1);
        assert!(notes[0].term.starts_with("notes de\n  Periode der Erhebung 2019\n  [Das Thema"));
        assert!(notes[0]
            .term_translation
            .starts_with("notes fr\n  Période de collection 2019\n  [Le sujet"));
    }

    #[test]
    fn test_empty_notes_still_get_an_entry() {
        let mut tables = LocaleTables::default();
        for entry in &mut tables.taxonomy {
            entry.topics.clear();
        }
        let b = TranslationBuilder::new(Arc::new(tables));

        let mut de = record("de", "Titel", "BFS", "Sektion");
        de.notes = None;
        let mut fr = record("fr", "Titre", "OFS", "Section");
        fr.notes = None;
        let package = Package::new(vec![de, fr]).unwrap();

        assert_eq!(
            b.notes_translations(&package),
            vec![TermTranslation::new("fr", "", "")]
        );
    }

    #[test]
    fn test_single_locale_package_has_no_dataset_translations() {
        let package = Package::new(vec![record("de", "Titel", "BFS", "Sektion")]).unwrap();
        let b = builder();
        assert!(b.field_translations(&package).is_empty());
        assert!(b.notes_translations(&package).is_empty());
    }

    #[test]
    fn test_duplicate_locale_gets_one_notes_entry() {
        let package = Package::new(vec![
            record("de", "Titel", "BFS", "Sektion"),
            record("fr", "Titre", "OFS", "Section"),
            record("fr", "Titre 2", "OFS", "Section"),
        ])
        .unwrap();
        assert_eq!(builder().notes_translations(&package).len(), 1);
    }
}
