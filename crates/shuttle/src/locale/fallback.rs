//! Curated locale fallback table.
//!
//! Fallbacks are a policy decision rather than a subtag derivation: `es-MX`
//! falls back to Latin American Spanish before Castilian, `zh-HK` to
//! Traditional Chinese, and a locale missing from the table has no fallbacks.

use std::collections::{BTreeMap, HashSet};

/// Built-in fallbacks, most specific first.
const DEFAULT_FALLBACKS: &[(&str, &[&str])] = &[
    ("de-AT", &["de"]),
    ("de-CH", &["de"]),
    ("en-AU", &["en-GB", "en"]),
    ("en-CA", &["en"]),
    ("en-GB", &["en"]),
    ("en-IE", &["en-GB", "en"]),
    ("en-NZ", &["en-AU", "en-GB", "en"]),
    ("es-419", &["es"]),
    ("es-AR", &["es-419", "es"]),
    ("es-MX", &["es-419", "es"]),
    ("es-US", &["es-419", "es"]),
    ("fr-BE", &["fr"]),
    ("fr-CA", &["fr"]),
    ("fr-CH", &["fr"]),
    ("it-CH", &["it"]),
    ("nl-BE", &["nl"]),
    ("pt-BR", &["pt"]),
    ("pt-PT", &["pt"]),
    ("zh-CN", &["zh-Hans", "zh"]),
    ("zh-HK", &["zh-TW", "zh-Hant", "zh"]),
    ("zh-SG", &["zh-CN", "zh-Hans", "zh"]),
    ("zh-TW", &["zh-Hant", "zh"]),
];

#[derive(Debug, Clone)]
pub struct FallbackTable {
    entries: BTreeMap<String, Vec<String>>,
}

impl Default for FallbackTable {
    fn default() -> Self {
        Self {
            entries: DEFAULT_FALLBACKS
                .iter()
                .map(|(locale, fallbacks)| {
                    (
                        locale.to_string(),
                        fallbacks.iter().map(|f| f.to_string()).collect(),
                    )
                })
                .collect(),
        }
    }
}

impl FallbackTable {
    /// A table with no entries: every locale is its own root.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Default table with `overrides` replacing or adding entries.
    pub fn with_overrides(overrides: &BTreeMap<String, Vec<String>>) -> Self {
        let mut table = Self::default();
        for (locale, fallbacks) in overrides {
            table.entries.insert(locale.clone(), fallbacks.clone());
        }
        table
    }

    pub fn direct_fallbacks(&self, locale: &str) -> &[String] {
        self.entries.get(locale).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `locale` followed by its fallbacks, each expanded recursively,
    /// duplicates dropped. Cycles in a misconfigured table terminate.
    pub fn fallback_chain(&self, locale: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        self.walk(locale, &mut chain, &mut seen);
        chain
    }

    fn walk(&self, locale: &str, chain: &mut Vec<String>, seen: &mut HashSet<String>) {
        if !seen.insert(locale.to_string()) {
            return;
        }
        chain.push(locale.to_string());
        for fallback in self.direct_fallbacks(locale) {
            self.walk(fallback, chain, seen);
        }
    }

    pub fn entries(&self) -> &BTreeMap<String, Vec<String>> {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regional_french_falls_back_to_french() {
        let table = FallbackTable::default();
        assert_eq!(table.fallback_chain("fr-CA"), vec!["fr-CA", "fr"]);
    }

    #[test]
    fn test_chain_is_recursive_and_deduplicated() {
        let table = FallbackTable::default();
        assert_eq!(
            table.fallback_chain("zh-HK"),
            vec!["zh-HK", "zh-TW", "zh-Hant", "zh"]
        );
        assert_eq!(
            table.fallback_chain("en-NZ"),
            vec!["en-NZ", "en-AU", "en-GB", "en"]
        );
    }

    #[test]
    fn test_unknown_locale_is_its_own_root() {
        let table = FallbackTable::default();
        assert_eq!(table.fallback_chain("sw"), vec!["sw"]);
    }

    #[test]
    fn test_overrides_and_cycles() {
        let mut overrides = BTreeMap::new();
        overrides.insert("fr-CA".to_string(), vec!["fr-FR".to_string()]);
        overrides.insert("fr-FR".to_string(), vec!["fr".to_string(), "fr-CA".to_string()]);
        let table = FallbackTable::with_overrides(&overrides);
        assert_eq!(table.fallback_chain("fr-CA"), vec!["fr-CA", "fr-FR", "fr"]);
    }
}
