//! Paragraph splitters for paragraph-organized containers.

use crate::error::ImportError;

pub trait ParagraphSplitter: Send + Sync {
    fn split(&self, text: &str) -> Result<Vec<String>, ImportError>;
}

/// Paragraphs separated by one or more blank lines. Each paragraph is trimmed.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlankLineSplitter;

impl ParagraphSplitter for BlankLineSplitter {
    fn split(&self, text: &str) -> Result<Vec<String>, ImportError> {
        let mut paragraphs = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        for line in text.lines() {
            if line.trim().is_empty() {
                if !current.is_empty() {
                    paragraphs.push(current.join("\n").trim().to_string());
                    current.clear();
                }
            } else {
                current.push(line);
            }
        }
        if !current.is_empty() {
            paragraphs.push(current.join("\n").trim().to_string());
        }
        Ok(paragraphs)
    }
}

/// A JSON array of strings, one paragraph per element. Blank elements are dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonArraySplitter;

impl ParagraphSplitter for JsonArraySplitter {
    fn split(&self, text: &str) -> Result<Vec<String>, ImportError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let items: Vec<String> = serde_json::from_str(text).map_err(|e| ImportError::Parse {
            path: "source_copy".to_string(),
            reason: format!("key group source must be a JSON array of strings: {}", e),
        })?;
        Ok(items.into_iter().filter(|s| !s.trim().is_empty()).collect())
    }
}
