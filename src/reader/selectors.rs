//! Path selectors the TEI reader is configured with.
//!
//! The reader is a generic traversal; everything TEI-specific lives in this
//! record so a different markup dialect needs a new `ReaderSelectors`, not a
//! new reader.

use crate::error::PaperChemError;
use crate::markup::Selector;
use serde::{Deserialize, Serialize};

/// Selector strings, see [`crate::markup::selector`] for the syntax.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderSelectors {
    pub metadata: String,
    pub title: String,
    pub date: String,
    pub doi: String,
    pub authors: String,
    pub headings: String,
    pub paragraphs: String,
    pub figures: String,
    /// Used when `figures` matches nothing (figures outside any `div`).
    pub figures_fallback: String,
    pub figure_caption: String,
    pub figure_label: String,
    pub tables: String,
    pub table_rows: String,
    pub table_caption: String,
    pub table_label: String,
    /// Bibliographic cross-reference markers stripped before text extraction.
    pub references: String,
    pub bibliography: String,
}

impl Default for ReaderSelectors {
    /// Selectors for GROBID-flavoured TEI.
    fn default() -> Self {
        Self {
            metadata: "//fileDesc".into(),
            title: ".//titleStmt/title".into(),
            date: ".//publicationStmt/date".into(),
            doi: ".//idno[@type='DOI']".into(),
            authors: ".//author/persName".into(),
            headings: ".//div/head".into(),
            paragraphs: ".//body//p".into(),
            figures: "//div//*//figure[contains(@xml:id, 'fig')]".into(),
            figures_fallback: "//figure[contains(@xml:id, 'fig')]".into(),
            figure_caption: "figDesc".into(),
            figure_label: "label".into(),
            tables: "//div//*//figure[contains(@xml:id, 'tab')]".into(),
            table_rows: "table/row".into(),
            table_caption: "figDesc".into(),
            table_label: "label".into(),
            references: "//div//*//ref[contains(@target, '#b')]".into(),
            bibliography: "//biblStruct".into(),
        }
    }
}

/// Parsed form of [`ReaderSelectors`].
#[derive(Debug, Clone)]
pub(crate) struct CompiledSelectors {
    pub metadata: Selector,
    pub title: Selector,
    pub date: Selector,
    pub doi: Selector,
    pub authors: Selector,
    pub headings: Selector,
    pub paragraphs: Selector,
    pub figures: Selector,
    pub figures_fallback: Selector,
    pub figure_caption: Selector,
    pub figure_label: Selector,
    pub tables: Selector,
    pub table_rows: Selector,
    pub table_caption: Selector,
    pub table_label: Selector,
    pub references: Selector,
    pub bibliography: Selector,
}

impl ReaderSelectors {
    pub(crate) fn compile(&self) -> Result<CompiledSelectors, PaperChemError> {
        Ok(CompiledSelectors {
            metadata: Selector::parse(&self.metadata)?,
            title: Selector::parse(&self.title)?,
            date: Selector::parse(&self.date)?,
            doi: Selector::parse(&self.doi)?,
            authors: Selector::parse(&self.authors)?,
            headings: Selector::parse(&self.headings)?,
            paragraphs: Selector::parse(&self.paragraphs)?,
            figures: Selector::parse(&self.figures)?,
            figures_fallback: Selector::parse(&self.figures_fallback)?,
            figure_caption: Selector::parse(&self.figure_caption)?,
            figure_label: Selector::parse(&self.figure_label)?,
            tables: Selector::parse(&self.tables)?,
            table_rows: Selector::parse(&self.table_rows)?,
            table_caption: Selector::parse(&self.table_caption)?,
            table_label: Selector::parse(&self.table_label)?,
            references: Selector::parse(&self.references)?,
            bibliography: Selector::parse(&self.bibliography)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_compile() {
        assert!(ReaderSelectors::default().compile().is_ok());
    }

    #[test]
    fn bad_selector_names_the_culprit() {
        let selectors = ReaderSelectors {
            doi: ".//idno[@type='DOI'".into(),
            ..Default::default()
        };
        let err = selectors.compile().unwrap_err();
        assert!(err.to_string().contains("idno"), "got: {err}");
    }
}
