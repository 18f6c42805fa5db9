//! Locale code validation.

use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::db::project_repo::LocaleTarget;
use crate::error::ValidationError;

/// `ll[-Ssss][-RR|-nnn]`: language, optional script, optional region.
static RE_LOCALE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<lang>[a-z]{2,3})(?:-(?P<script>[A-Z][a-z]{3}))?(?:-(?P<region>[A-Z]{2}|\d{3}))?$")
        .unwrap()
});

/// A validated locale code such as `fr`, `fr-CA`, `zh-Hant-TW` or `es-419`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Locale(String);

impl Locale {
    pub fn parse(code: &str) -> Result<Self, ValidationError> {
        if RE_LOCALE.is_match(code) {
            Ok(Self(code.to_string()))
        } else {
            Err(ValidationError::MalformedLocale(code.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn language(&self) -> &str {
        RE_LOCALE
            .captures(&self.0)
            .and_then(|c| c.name("lang"))
            .map(|m| m.as_str())
            .unwrap_or(&self.0)
    }

    pub fn region(&self) -> Option<&str> {
        RE_LOCALE
            .captures(&self.0)
            .and_then(|c| c.name("region"))
            .map(|m| m.as_str())
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Locale {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Locale::parse(&value)
    }
}

impl From<Locale> for String {
    fn from(locale: Locale) -> Self {
        locale.0
    }
}

/// Checks a base locale and its targets: every code well formed, no target
/// listed twice, the base never among the targets.
pub fn validate_targets(base: &str, targets: &[LocaleTarget]) -> Result<(), ValidationError> {
    Locale::parse(base)?;
    let mut seen = HashSet::new();
    for target in targets {
        Locale::parse(&target.locale)?;
        if target.locale == base {
            return Err(ValidationError::BaseLocaleTargeted(target.locale.clone()));
        }
        if !seen.insert(target.locale.as_str()) {
            return Err(ValidationError::DuplicateLocale(target.locale.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_well_formed_codes() {
        for code in ["en", "fr-CA", "es-419", "zh-Hant", "zh-Hant-TW", "haw"] {
            assert!(Locale::parse(code).is_ok(), "{} should parse", code);
        }
    }

    #[test]
    fn test_rejects_malformed_codes() {
        for code in ["", "EN", "fr_CA", "fr-ca", "english", "zh-hant", "fr-CA-"] {
            assert_eq!(
                Locale::parse(code),
                Err(ValidationError::MalformedLocale(code.to_string()))
            );
        }
    }

    #[test]
    fn test_subtags() {
        let locale = Locale::parse("pt-BR").unwrap();
        assert_eq!(locale.language(), "pt");
        assert_eq!(locale.region(), Some("BR"));
        assert_eq!(Locale::parse("de").unwrap().region(), None);
    }

    #[test]
    fn test_serde_validates() {
        let ok: Locale = serde_json::from_str("\"fr-CA\"").unwrap();
        assert_eq!(ok.as_str(), "fr-CA");
        assert!(serde_json::from_str::<Locale>("\"fr_CA\"").is_err());
    }

    #[test]
    fn test_validate_targets() {
        let targets = vec![LocaleTarget::required("de"), LocaleTarget::optional("fr-CA")];
        assert!(validate_targets("en", &targets).is_ok());
        assert!(validate_targets("en", &[]).is_ok());

        assert_eq!(
            validate_targets("en", &[LocaleTarget::required("en")]),
            Err(ValidationError::BaseLocaleTargeted("en".to_string()))
        );
        assert_eq!(
            validate_targets("en", &[LocaleTarget::required("de"), LocaleTarget::optional("de")]),
            Err(ValidationError::DuplicateLocale("de".to_string()))
        );
        assert_eq!(
            validate_targets("EN", &targets),
            Err(ValidationError::MalformedLocale("EN".to_string()))
        );
    }
}
