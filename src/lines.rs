//! Line extraction from text-detection responses.
//!
//! Pure functions, no async. Line order is the service's block order; nothing
//! is re-sorted by coordinates.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::schema::{BlockType, DetectionResponse};

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("LINE block {id} has no text")]
    MissingText { id: String },
}

/// Collect the text of every `LINE` block, in order.
pub fn extract_lines(response: &DetectionResponse) -> Result<Vec<String>, ExtractError> {
    response
        .blocks_of(BlockType::Line)
        .enumerate()
        .map(|(index, block)| {
            block.text.clone().ok_or_else(|| ExtractError::MissingText {
                id: block.id.clone().unwrap_or_else(|| format!("#{}", index)),
            })
        })
        .collect()
}

/// The `formatted_response.json` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedLines {
    pub lines: Vec<String>,
}

impl FormattedLines {
    pub fn new(lines: Vec<String>) -> Self {
        Self { lines }
    }

    /// Pretty JSON with 4-space indentation; non-ASCII text is written as-is.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        // serde_json only emits valid UTF-8
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    pub fn write_to(&self, path: &Path) -> anyhow::Result<()> {
        use anyhow::Context;

        let json = self.to_json()?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))?;
        info!("Wrote {} line(s) to {:?}", self.lines.len(), path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Block;

    fn block(kind: &str, id: &str, text: Option<&str>) -> Block {
        Block {
            block_type: BlockType::from(kind.to_string()),
            id: Some(id.to_string()),
            text: text.map(str::to_string),
            confidence: Some(99.0),
            text_type: None,
            geometry: None,
            relationships: None,
            page: None,
        }
    }

    fn response(blocks: Vec<Block>) -> DetectionResponse {
        DetectionResponse {
            document_metadata: None,
            blocks,
            model_version: None,
        }
    }

    #[test]
    fn test_extract_lines_in_service_order() {
        let r = response(vec![
            block("PAGE", "p", None),
            block("LINE", "l1", Some("2 cadernos")),
            block("WORD", "w1", Some("2")),
            block("LINE", "l2", Some("1 régua")),
            block("WORD", "w2", Some("régua")),
            block("LINE", "l3", Some("Apontador")),
        ]);
        let lines = extract_lines(&r).unwrap();
        assert_eq!(lines, vec!["2 cadernos", "1 régua", "Apontador"]);
    }

    #[test]
    fn test_no_line_blocks() {
        let r = response(vec![block("PAGE", "p", None), block("WORD", "w", Some("x"))]);
        assert!(extract_lines(&r).unwrap().is_empty());
        assert!(extract_lines(&response(Vec::new())).unwrap().is_empty());
    }

    #[test]
    fn test_line_without_text_fails() {
        let r = response(vec![block("LINE", "l1", Some("ok")), block("LINE", "l2", None)]);
        match extract_lines(&r) {
            Err(ExtractError::MissingText { id }) => assert_eq!(id, "l2"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_formatted_output() {
        let formatted = FormattedLines::new(vec!["Lápis nº 2".to_string(), "Borracha".to_string()]);
        let json = formatted.to_json().unwrap();
        assert_eq!(
            json,
            "{\n    \"lines\": [\n        \"Lápis nº 2\",\n        \"Borracha\"\n    ]\n}"
        );
    }

    #[test]
    fn test_write_formatted_file() {
        let path = std::env::temp_dir().join(format!("formatted-{}.json", uuid::Uuid::new_v4()));
        let formatted = FormattedLines::new(vec!["Cola branca".to_string()]);
        formatted.write_to(&path).unwrap();

        let read: FormattedLines =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(read, formatted);
        std::fs::remove_file(&path).ok();
    }
}
