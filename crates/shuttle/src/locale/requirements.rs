//! Effective locale requirements for a project or container.

use std::collections::BTreeMap;

use crate::db::container_repo::ContainerRow;
use crate::db::project_repo::{LocaleTarget, ProjectRow};
use crate::rules::GlobList;

/// Which locales a key gets translations for, and which gate its readiness.
#[derive(Debug, Clone)]
pub struct LocaleRequirements {
    pub base: String,
    pub required: Vec<String>,
    pub optional: Vec<String>,
    key_locale_exclusions: BTreeMap<String, GlobList>,
}

impl LocaleRequirements {
    /// Builds requirements from a target list. The base locale is dropped
    /// from the targets and a locale listed twice keeps its strictest flag.
    pub fn new(
        base: &str,
        targets: &[LocaleTarget],
        key_locale_exclusions: &BTreeMap<String, Vec<String>>,
    ) -> Self {
        let mut required: Vec<String> = Vec::new();
        let mut optional: Vec<String> = Vec::new();
        for target in targets.iter().filter(|t| t.locale != base) {
            if target.required {
                if !required.contains(&target.locale) {
                    required.push(target.locale.clone());
                }
                optional.retain(|l| l != &target.locale);
            } else if !required.contains(&target.locale) && !optional.contains(&target.locale) {
                optional.push(target.locale.clone());
            }
        }
        Self {
            base: base.to_string(),
            required,
            optional,
            key_locale_exclusions: key_locale_exclusions
                .iter()
                .map(|(locale, globs)| (locale.clone(), GlobList::lenient(globs)))
                .collect(),
        }
    }

    pub fn for_project(project: &ProjectRow) -> Self {
        Self::new(
            &project.base_locale,
            &project.targeted_locales,
            &project.key_locale_exclusions,
        )
    }

    /// Container override when present, otherwise the project's targets.
    pub fn for_container(project: &ProjectRow, container: &ContainerRow) -> Self {
        let targets = container
            .targeted_locales
            .as_deref()
            .unwrap_or(&project.targeted_locales);
        Self::new(&project.base_locale, targets, &project.key_locale_exclusions)
    }

    fn excluded(&self, key: &str, locale: &str) -> bool {
        locale != self.base
            && self
                .key_locale_exclusions
                .get(locale)
                .map(|globs| globs.matches(key))
                .unwrap_or(false)
    }

    /// Base, required and optional locales minus the key's exclusions.
    pub fn locales_for_key(&self, key: &str) -> Vec<String> {
        std::iter::once(&self.base)
            .chain(self.required.iter())
            .chain(self.optional.iter())
            .filter(|l| !self.excluded(key, l))
            .cloned()
            .collect()
    }

    /// Required locales minus the key's exclusions.
    pub fn required_for_key(&self, key: &str) -> Vec<String> {
        self.required
            .iter()
            .filter(|l| !self.excluded(key, l))
            .cloned()
            .collect()
    }

    /// Base and every targeted locale, in order.
    pub fn all_locales(&self) -> Vec<String> {
        std::iter::once(&self.base)
            .chain(self.required.iter())
            .chain(self.optional.iter())
            .cloned()
            .collect()
    }

    pub fn is_known(&self, locale: &str) -> bool {
        locale == self.base || self.required.iter().chain(&self.optional).any(|l| l == locale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requirements() -> LocaleRequirements {
        let mut exclusions = BTreeMap::new();
        exclusions.insert("ja".to_string(), vec!["legal.*".to_string()]);
        exclusions.insert("en".to_string(), vec!["*".to_string()]);
        LocaleRequirements::new(
            "en",
            &[
                LocaleTarget::required("de"),
                LocaleTarget::optional("ja"),
                LocaleTarget::required("en"),
                LocaleTarget::optional("de"),
                LocaleTarget::optional("fr"),
                LocaleTarget::required("fr"),
            ],
            &exclusions,
        )
    }

    #[test]
    fn test_base_locale_is_never_targeted() {
        let req = requirements();
        assert_eq!(req.base, "en");
        assert!(!req.required.contains(&"en".to_string()));
        assert!(!req.optional.contains(&"en".to_string()));
    }

    #[test]
    fn test_required_flag_wins_on_duplicates() {
        let req = requirements();
        assert_eq!(req.required, vec!["de".to_string(), "fr".to_string()]);
        assert_eq!(req.optional, vec!["ja".to_string()]);
    }

    #[test]
    fn test_key_locale_exclusions() {
        let req = requirements();
        assert_eq!(req.locales_for_key("legal.terms"), vec!["en", "de", "fr"]);
        assert_eq!(req.locales_for_key("home.title"), vec!["en", "de", "fr", "ja"]);
        assert_eq!(req.required_for_key("legal.terms"), vec!["de", "fr"]);
    }

    #[test]
    fn test_no_targets_means_nothing_required() {
        let req = LocaleRequirements::new("en", &[], &BTreeMap::new());
        assert!(req.required_for_key("k").is_empty());
        assert_eq!(req.locales_for_key("k"), vec!["en"]);
        assert!(req.is_known("en"));
        assert!(!req.is_known("de"));
    }
}
