//! Locale codes, requirements, fallback chains and translation matching.

pub mod code;
pub mod fallback;
pub mod matching;
pub mod requirements;

pub use code::{validate_targets, Locale};
pub use fallback::FallbackTable;
pub use matching::{FuzzyMatch, TranslationMatcher};
pub use requirements::LocaleRequirements;
