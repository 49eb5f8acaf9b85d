//! Document model produced by the TEI reader.

use serde::{Deserialize, Serialize};

/// Bibliographic metadata from the TEI header.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub date: Option<String>,
    pub doi: Option<String>,
}

/// A body paragraph with its bibliography cross references removed from the
/// text and kept as ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    pub text: String,
    pub citations: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Figure {
    pub id: Option<String>,
    pub label: Option<String>,
    /// Empty when the figure has no caption.
    pub caption: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub id: Option<String>,
    pub label: Option<String>,
    pub caption: String,
    pub rows: Vec<Vec<String>>,
}

/// One entry of the reference list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BibEntry {
    pub id: Option<String>,
    pub title: Option<String>,
    pub year: Option<String>,
}

/// Where a piece of text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Title,
    Heading,
    Paragraph,
    Caption,
}

/// A piece of cleaned text handed to the mention extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub kind: BlockKind,
    pub text: String,
}

/// The compound part of a record: every name the text used for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compound {
    pub names: Vec<String>,
}

/// A unit of extracted information. Only records carrying a compound with
/// at least one name feed the entity pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub source: BlockKind,
    pub compound: Option<Compound>,
}

impl Record {
    pub fn compound(source: BlockKind, names: Vec<String>) -> Self {
        Self {
            source,
            compound: Some(Compound { names }),
        }
    }

    /// The mention names, empty when the record has no compound.
    pub fn names(&self) -> &[String] {
        self.compound.as_ref().map(|c| c.names.as_slice()).unwrap_or(&[])
    }
}

/// Everything the reader extracts from one paper.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredDocument {
    pub metadata: DocumentMetadata,
    pub headings: Vec<String>,
    pub paragraphs: Vec<Paragraph>,
    pub figures: Vec<Figure>,
    pub tables: Vec<Table>,
    pub bibliography: Vec<BibEntry>,
    pub records: Vec<Record>,
}

impl StructuredDocument {
    /// Paragraph texts, used for the comparison's text overlap.
    pub fn body_text(&self) -> Vec<&str> {
        self.paragraphs.iter().map(|p| p.text.as_str()).collect()
    }

    /// Total number of mention names across all records.
    pub fn mention_count(&self) -> usize {
        self.records.iter().map(|r| r.names().len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_without_compound_has_no_names() {
        let r = Record {
            source: BlockKind::Paragraph,
            compound: None,
        };
        assert!(r.names().is_empty());
    }

    #[test]
    fn mention_count_sums_names() {
        let doc = StructuredDocument {
            records: vec![
                Record::compound(BlockKind::Paragraph, vec!["sodium chloride".into(), "NaCl".into()]),
                Record::compound(BlockKind::Caption, vec![]),
                Record {
                    source: BlockKind::Heading,
                    compound: None,
                },
            ],
            ..Default::default()
        };
        assert_eq!(doc.mention_count(), 2);
    }
}
