//! Translation-unit matching against approved translations ("translation memory").

use rusqlite::Connection;

use super::fallback::FallbackTable;
use crate::db::translation_repo::{self, TranslationRow};
use crate::db::DatabaseError;

pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.7;
pub const DEFAULT_FUZZY_LIMIT: usize = 5;

/// A fuzzy candidate and its similarity to the requested source, in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct FuzzyMatch {
    pub translation: TranslationRow,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct TranslationMatcher {
    fallbacks: FallbackTable,
    threshold: f64,
    limit: usize,
}

impl Default for TranslationMatcher {
    fn default() -> Self {
        Self::new(FallbackTable::default(), DEFAULT_FUZZY_THRESHOLD, DEFAULT_FUZZY_LIMIT)
    }
}

impl TranslationMatcher {
    pub fn new(fallbacks: FallbackTable, threshold: f64, limit: usize) -> Self {
        Self {
            fallbacks,
            threshold,
            limit,
        }
    }

    pub fn fallbacks(&self) -> &FallbackTable {
        &self.fallbacks
    }

    /// Walks the fallback chain of `target_locale` and returns the most
    /// recently updated approved translation of exactly `source_copy` at the
    /// first locale that has one.
    pub fn find_reusable_translation(
        &self,
        conn: &Connection,
        target_locale: &str,
        source_copy: &str,
    ) -> Result<Option<TranslationRow>, DatabaseError> {
        for locale in self.fallbacks.fallback_chain(target_locale) {
            let matches = translation_repo::approved_exact(conn, &locale, source_copy)?;
            if let Some(found) = matches.into_iter().next() {
                log::debug!(
                    "Reusable translation {} for '{}' found in {}",
                    found.id,
                    target_locale,
                    locale
                );
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    /// Approved translations across the fallback chain whose source is at
    /// least `threshold` similar to `source_copy`, best first. Advisory only.
    pub fn fuzzy_matches(
        &self,
        conn: &Connection,
        target_locale: &str,
        source_copy: &str,
    ) -> Result<Vec<FuzzyMatch>, DatabaseError> {
        let source_len = source_copy.chars().count();
        let (min_len, max_len) = length_window(source_len, self.threshold);

        let mut matches = Vec::new();
        for locale in self.fallbacks.fallback_chain(target_locale) {
            for candidate in translation_repo::approved_candidates(conn, &locale, min_len, max_len)? {
                let score = strsim::normalized_levenshtein(source_copy, &candidate.source_copy);
                if score >= self.threshold {
                    matches.push(FuzzyMatch {
                        translation: candidate,
                        score,
                    });
                }
            }
        }

        matches.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.translation.updated_at.cmp(&a.translation.updated_at))
        });
        matches.truncate(self.limit);
        Ok(matches)
    }
}

/// Candidate source lengths that can still reach `threshold` similarity.
fn length_window(len: usize, threshold: f64) -> (usize, usize) {
    if threshold <= 0.0 {
        return (0, i64::MAX as usize);
    }
    let min = (len as f64 * threshold).floor() as usize;
    let max = ((len as f64) / threshold).ceil() as usize;
    (min, max.min(i64::MAX as usize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::key_repo::{self, NewKey};
    use crate::db::project_repo::{self, NewProject};
    use crate::db::translation_repo::NewTranslation;
    use crate::db::Database;

    fn approved(conn: &Connection, key: &str, locale: &str, source: &str, copy: &str) -> i64 {
        let project_id = match project_repo::find_by_id(conn, 1).unwrap() {
            Some(p) => p.id,
            None => {
                project_repo::insert(
                    conn,
                    &NewProject {
                        name: "memory".to_string(),
                        base_locale: "en".to_string(),
                        ..Default::default()
                    },
                )
                .unwrap()
                .id
            }
        };
        let key_id = key_repo::insert(
            conn,
            &NewKey {
                project_id,
                container_id: None,
                key: key.to_string(),
                source_copy: source.to_string(),
                position: None,
                fencers: vec![],
            },
        )
        .unwrap()
        .id;
        translation_repo::insert(
            conn,
            &NewTranslation {
                key_id,
                locale: locale.to_string(),
                source_copy: source.to_string(),
                copy: Some(copy.to_string()),
                approved: Some(true),
            },
        )
        .unwrap()
        .id
    }

    #[test]
    fn test_falls_back_from_regional_locale() {
        let db = Database::open_in_memory().unwrap();
        let matcher = TranslationMatcher::default();
        db.with_conn(|conn| {
            approved(conn, "hello", "fr", "Hello", "Bonjour");
            let found = matcher.find_reusable_translation(conn, "fr-CA", "Hello")?;
            let found = found.unwrap();
            assert_eq!(found.locale, "fr");
            assert_eq!(found.copy.as_deref(), Some("Bonjour"));

            assert!(matcher.find_reusable_translation(conn, "fr-CA", "Goodbye")?.is_none());
            assert!(matcher.find_reusable_translation(conn, "de", "Hello")?.is_none());
            Ok::<_, DatabaseError>(())
        })
        .unwrap();
    }

    #[test]
    fn test_exact_locale_wins_over_fallback() {
        let db = Database::open_in_memory().unwrap();
        let matcher = TranslationMatcher::default();
        db.with_conn(|conn| {
            approved(conn, "a", "fr", "Hello", "Bonjour");
            approved(conn, "b", "fr-CA", "Hello", "Allô");
            let found = matcher.find_reusable_translation(conn, "fr-CA", "Hello")?.unwrap();
            assert_eq!(found.locale, "fr-CA");
            Ok::<_, DatabaseError>(())
        })
        .unwrap();
    }

    #[test]
    fn test_fuzzy_matches_rank_and_threshold() {
        let db = Database::open_in_memory().unwrap();
        let matcher = TranslationMatcher::default();
        db.with_conn(|conn| {
            approved(conn, "a", "de", "Save your changes", "Änderungen speichern");
            approved(conn, "b", "de", "Save your change", "Änderung speichern");
            approved(conn, "c", "de", "Delete account", "Konto löschen");

            let matches = matcher.fuzzy_matches(conn, "de", "Save your changes!")?;
            assert_eq!(matches.len(), 2);
            assert_eq!(matches[0].translation.source_copy, "Save your changes");
            assert!(matches[0].score >= matches[1].score);
            assert!(matches.iter().all(|m| m.score >= DEFAULT_FUZZY_THRESHOLD));
            Ok::<_, DatabaseError>(())
        })
        .unwrap();
    }

    #[test]
    fn test_fuzzy_limit() {
        let db = Database::open_in_memory().unwrap();
        let matcher = TranslationMatcher::new(FallbackTable::empty(), 0.5, 2);
        db.with_conn(|conn| {
            for (i, source) in ["Open file", "Open files", "Open a file", "Opens file"]
                .iter()
                .enumerate()
            {
                approved(conn, &format!("k{}", i), "it", source, "Apri");
            }
            assert_eq!(matcher.fuzzy_matches(conn, "it", "Open file")?.len(), 2);
            Ok::<_, DatabaseError>(())
        })
        .unwrap();
    }

    #[test]
    fn test_length_window() {
        assert_eq!(length_window(10, 0.7), (7, 15));
        assert_eq!(length_window(0, 0.7), (0, 0));
    }
}
