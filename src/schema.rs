#![allow(dead_code)]
//! Response types for the text-detection and celebrity-recognition services.
//!
//! Field names follow the services' PascalCase JSON so a cached response is the
//! same document the service sent back (for every field modelled here).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Root payload of a `DetectDocumentText` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DetectionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_metadata: Option<DocumentMetadata>,
    #[serde(default)]
    pub blocks: Vec<Block>,
    #[serde(
        default,
        rename = "DetectDocumentTextModelVersion",
        skip_serializing_if = "Option::is_none"
    )]
    pub model_version: Option<String>,
}

impl DetectionResponse {
    /// Iterate over the blocks of a given type, in service order.
    pub fn blocks_of(&self, kind: BlockType) -> impl Iterator<Item = &Block> + '_ {
        self.blocks.iter().filter(move |b| b.block_type == kind)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DocumentMetadata {
    pub pages: u32,
}

/// A structural unit (page, line, word, ...) returned by the OCR service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Block {
    pub block_type: BlockType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Geometry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationships: Option<Vec<Relationship>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

/// Block kind. Types this crate does not consume are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BlockType {
    Page,
    Line,
    Word,
    Other(String),
}

impl From<String> for BlockType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "PAGE" => Self::Page,
            "LINE" => Self::Line,
            "WORD" => Self::Word,
            _ => Self::Other(s),
        }
    }
}

impl From<BlockType> for String {
    fn from(kind: BlockType) -> Self {
        match kind {
            BlockType::Page => "PAGE".to_string(),
            BlockType::Line => "LINE".to_string(),
            BlockType::Word => "WORD".to_string(),
            BlockType::Other(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Geometry {
    pub bounding_box: NormalizedBox,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub polygon: Vec<Point>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Relationship {
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(default)]
    pub ids: Vec<String>,
}

/// Rectangle expressed as fractions of the image width and height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NormalizedBox {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

// ── Celebrity recognition ───────────────────────────────────────────────────

/// Root payload of a `RecognizeCelebrities` call.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RecognizeCelebritiesResponse {
    #[serde(default)]
    pub celebrity_faces: Vec<Celebrity>,
    #[serde(default)]
    pub unrecognized_faces: Vec<ComparedFace>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Celebrity {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub face: Option<ComparedFace>,
    #[serde(default)]
    pub match_confidence: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ComparedFace {
    #[serde(default)]
    pub bounding_box: Option<NormalizedBox>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// A recognized subject, ready to be drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct CelebrityDetection {
    pub name: String,
    pub match_confidence: f64,
    pub bounding_box: NormalizedBox,
}

/// Raised when a celebrity entry lacks the face bounding box.
#[derive(Debug, Clone, PartialEq)]
pub struct MissingBoundingBox {
    pub name: String,
}

impl fmt::Display for MissingBoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "celebrity '{}' has no face bounding box", self.name)
    }
}

impl TryFrom<Celebrity> for CelebrityDetection {
    type Error = MissingBoundingBox;

    /// A missing name or match confidence defaults to `""` / `0.0`; a missing
    /// bounding box is rejected.
    fn try_from(celebrity: Celebrity) -> Result<Self, Self::Error> {
        let name = celebrity.name.unwrap_or_default();
        let bounding_box = celebrity
            .face
            .and_then(|f| f.bounding_box)
            .ok_or_else(|| MissingBoundingBox { name: name.clone() })?;

        Ok(Self {
            name,
            match_confidence: celebrity.match_confidence.unwrap_or(0.0),
            bounding_box,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "DocumentMetadata": {"Pages": 1},
        "Blocks": [
            {"BlockType": "PAGE", "Id": "p1", "Relationships": [{"Type": "CHILD", "Ids": ["l1"]}]},
            {"BlockType": "LINE", "Id": "l1", "Text": "Caderno", "Confidence": 99.5,
             "Geometry": {"BoundingBox": {"Width": 0.2, "Height": 0.05, "Left": 0.1, "Top": 0.1},
                          "Polygon": [{"X": 0.1, "Y": 0.1}]}},
            {"BlockType": "KEY_VALUE_SET", "Id": "k1"}
        ],
        "DetectDocumentTextModelVersion": "1.0"
    }"#;

    #[test]
    fn test_parse_detection_response() {
        let response: DetectionResponse = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(response.document_metadata.as_ref().unwrap().pages, 1);
        assert_eq!(response.blocks.len(), 3);
        assert_eq!(response.blocks[1].block_type, BlockType::Line);
        assert_eq!(response.blocks[1].text.as_deref(), Some("Caderno"));
        assert_eq!(response.model_version.as_deref(), Some("1.0"));
    }

    #[test]
    fn test_unknown_block_type_preserved() {
        let response: DetectionResponse = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(
            response.blocks[2].block_type,
            BlockType::Other("KEY_VALUE_SET".to_string())
        );

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["Blocks"][2]["BlockType"], "KEY_VALUE_SET");
        assert_eq!(json["Blocks"][0]["Relationships"][0]["Type"], "CHILD");
    }

    #[test]
    fn test_celebrity_conversion() {
        let raw = r#"{"CelebrityFaces": [
            {"Name": "Ana", "MatchConfidence": 97.1,
             "Face": {"BoundingBox": {"Left": 0.1, "Top": 0.2, "Width": 0.3, "Height": 0.4}}},
            {"Face": {"BoundingBox": {"Left": 0.5, "Top": 0.5, "Width": 0.1, "Height": 0.1}}},
            {"Name": "Sem Caixa", "MatchConfidence": 99.0}
        ]}"#;
        let response: RecognizeCelebritiesResponse = serde_json::from_str(raw).unwrap();
        let mut faces = response.celebrity_faces.into_iter();

        let ana = CelebrityDetection::try_from(faces.next().unwrap()).unwrap();
        assert_eq!(ana.name, "Ana");
        assert_eq!(ana.match_confidence, 97.1);

        let anonymous = CelebrityDetection::try_from(faces.next().unwrap()).unwrap();
        assert_eq!(anonymous.name, "");
        assert_eq!(anonymous.match_confidence, 0.0);

        let err = CelebrityDetection::try_from(faces.next().unwrap()).unwrap_err();
        assert_eq!(err.name, "Sem Caixa");
    }
}
