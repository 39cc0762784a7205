//! CognitiveModel - The owner's long-term, three-layer model
//!
//! The text is produced by an external free-text generator, so parsing is
//! lenient: missing tags yield empty sections and paragraph splitting
//! tolerates extra or missing blank lines.

use crate::domain::value_objects::ModelSection;

/// Initial value for an owner with no stored model
pub const MODEL_SKELETON: &str = "<Bedrock>\n\n</Bedrock>\n\n<Evolutionary>\n\n</Evolutionary>\n\n<Dynamic>\n\n</Dynamic>";

/// Canonical separator between Dynamic paragraphs
pub const DYNAMIC_DELIMITER: &str = "\n\n\n";

/// CognitiveModel - Bedrock / Evolutionary / Dynamic text blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CognitiveModel {
    text: String,
}

impl CognitiveModel {
    /// Empty three-section model
    pub fn skeleton() -> Self {
        Self {
            text: MODEL_SKELETON.to_string(),
        }
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    /// Length of the model text in characters
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Body of `<Section>...</Section>`, trimmed. `None` if the tags are missing.
    pub fn section(&self, section: ModelSection) -> Option<&str> {
        let open = format!("<{}>", section.tag());
        let close = format!("</{}>", section.tag());
        let start = self.text.find(&open)? + open.len();
        let end = start + self.text[start..].find(&close)?;
        Some(self.text[start..end].trim())
    }

    fn non_empty_section(&self, section: ModelSection) -> Option<&str> {
        self.section(section).filter(|body| !body.is_empty())
    }

    /// Whether every section is absent or blank
    pub fn is_empty(&self) -> bool {
        ModelSection::ALL
            .iter()
            .all(|s| self.non_empty_section(*s).is_none())
    }

    /// Bedrock and Evolutionary sections, re-wrapped in their tags.
    ///
    /// Empty string when both are blank.
    pub fn base_memory(&self) -> String {
        [ModelSection::Bedrock, ModelSection::Evolutionary]
            .iter()
            .filter_map(|s| {
                self.non_empty_section(*s)
                    .map(|body| format!("<{tag}>\n{body}\n</{tag}>", tag = s.tag()))
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Paragraphs of the Dynamic section
    pub fn dynamic_segments(&self) -> Vec<String> {
        self.section(ModelSection::Dynamic)
            .map(split_paragraphs)
            .unwrap_or_default()
    }
}

impl Default for CognitiveModel {
    fn default() -> Self {
        Self::skeleton()
    }
}

impl std::fmt::Display for CognitiveModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// Split text into paragraphs separated by one or more blank lines.
///
/// Accepts the canonical triple-newline delimiter as well as drifted output
/// (double newlines, whitespace-only lines, CRLF line endings).
pub fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
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

    paragraphs
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL: &str = "<TheMemory>\n<Bedrock>\nThe user values honesty.\n</Bedrock>\n<Evolutionary>\nI notice they study Rust more each month.\n</Evolutionary>\n<Dynamic>\n[2024-05-01] They moved to Kyoto.\n\n\n[2024-05-03] They started a new job.\n</Dynamic>\n</TheMemory>";

    #[test]
    fn test_skeleton_is_empty() {
        let model = CognitiveModel::skeleton();
        assert!(model.is_empty());
        assert_eq!(model.section(ModelSection::Bedrock), Some(""));
        assert_eq!(model.base_memory(), "");
        assert!(model.dynamic_segments().is_empty());
    }

    #[test]
    fn test_section_extraction() {
        let model = CognitiveModel::from_text(MODEL);
        assert_eq!(
            model.section(ModelSection::Bedrock),
            Some("The user values honesty.")
        );
        assert!(!model.is_empty());
    }

    #[test]
    fn test_missing_section_is_none() {
        let model = CognitiveModel::from_text("<Bedrock>x</Bedrock>");
        assert_eq!(model.section(ModelSection::Dynamic), None);
    }

    #[test]
    fn test_base_memory_excludes_dynamic() {
        let model = CognitiveModel::from_text(MODEL);
        assert_eq!(
            model.base_memory(),
            "<Bedrock>\nThe user values honesty.\n</Bedrock>\n\n<Evolutionary>\nI notice they study Rust more each month.\n</Evolutionary>"
        );
    }

    #[test]
    fn test_base_memory_skips_blank_bedrock() {
        let model =
            CognitiveModel::from_text("<Bedrock>\n</Bedrock><Evolutionary>grows</Evolutionary>");
        assert_eq!(model.base_memory(), "<Evolutionary>\ngrows\n</Evolutionary>");
    }

    #[test]
    fn test_dynamic_segments_canonical_delimiter() {
        let model = CognitiveModel::from_text(MODEL);
        assert_eq!(
            model.dynamic_segments(),
            vec![
                "[2024-05-01] They moved to Kyoto.".to_string(),
                "[2024-05-03] They started a new job.".to_string(),
            ]
        );
    }

    #[test]
    fn test_split_paragraphs_tolerates_drift() {
        let text = "first\r\n\r\nsecond line a\nsecond line b\n   \n\n\n\nthird\n";
        assert_eq!(
            split_paragraphs(text),
            vec![
                "first".to_string(),
                "second line a\nsecond line b".to_string(),
                "third".to_string(),
            ]
        );
    }
}
