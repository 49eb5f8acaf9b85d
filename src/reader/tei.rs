//! Selector-driven reader turning a normalized TEI tree into a
//! [`StructuredDocument`].

use crate::error::PaperChemError;
use crate::markup::{Element, Selector};
use crate::reader::clean::clean_text;
use crate::reader::document::{
    BibEntry, BlockKind, DocumentMetadata, Figure, Paragraph, StructuredDocument, Table,
    TextBlock,
};
use crate::reader::mentions::{ChemicalRecognizer, MentionExtractor};
use crate::reader::selectors::{CompiledSelectors, ReaderSelectors};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Reference id used when a cross-reference target cannot be parsed.
pub const UNKNOWN_REFERENCE: u32 = 1000;

/// Reads TEI trees with a fixed set of selectors and a mention extractor.
#[derive(Clone)]
pub struct TeiReader {
    selectors: CompiledSelectors,
    extractor: Arc<dyn MentionExtractor>,
}

impl std::fmt::Debug for TeiReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TeiReader")
            .field("selectors", &self.selectors)
            .finish_non_exhaustive()
    }
}

impl TeiReader {
    /// Compile `selectors` and use the default [`ChemicalRecognizer`].
    pub fn new(selectors: &ReaderSelectors) -> Result<Self, PaperChemError> {
        Self::with_extractor(selectors, Arc::new(ChemicalRecognizer::new()))
    }

    pub fn with_extractor(
        selectors: &ReaderSelectors,
        extractor: Arc<dyn MentionExtractor>,
    ) -> Result<Self, PaperChemError> {
        Ok(Self {
            selectors: selectors.compile()?,
            extractor,
        })
    }

    pub fn parse(&self, root: &Element) -> Result<StructuredDocument, PaperChemError> {
        let s = &self.selectors;

        // ── Step 1: Record and strip cross-reference markers ─────────────────
        let markers = s.references.select(root);
        let marker_ids: HashMap<usize, u32> = markers
            .iter()
            .map(|m| (m.order(), reference_id(m.attr("target"))))
            .collect();

        let mut citations: HashMap<usize, Vec<u32>> = HashMap::new();
        for p in s.paragraphs.select(root) {
            let ids: Vec<u32> = p
                .descendants()
                .into_iter()
                .filter_map(|d| marker_ids.get(&d.order()).copied())
                .collect();
            citations.insert(p.order(), ids);
        }

        let mut stripped = root.clone();
        let marker_orders: HashSet<usize> = marker_ids.keys().copied().collect();
        let removed = stripped.remove_where(&|e| marker_orders.contains(&e.order()));
        debug!("Stripped {} reference markers", removed);
        let root = &stripped;

        // ── Step 2: Metadata ─────────────────────────────────────────────────
        let header = s.metadata.first(root, root).unwrap_or(root);
        let title_el = s.title.first(root, header);
        let metadata = DocumentMetadata {
            title: title_el.and_then(|t| non_empty(clean_text(&t.text()))),
            authors: s
                .authors
                .select_from(root, header)
                .into_iter()
                .map(author_name)
                .filter(|a| !a.is_empty())
                .collect(),
            date: s.date.first(root, header).and_then(|d| {
                d.attr("when")
                    .map(str::to_string)
                    .or_else(|| non_empty(clean_text(&d.text())))
            }),
            doi: s
                .doi
                .first(root, header)
                .and_then(|d| non_empty(clean_text(&d.text()))),
        };

        // Text blocks are collected with their tree position and sorted at
        // the end so the extractor sees document order.
        let mut blocks: Vec<(usize, TextBlock)> = Vec::new();
        if let (Some(el), Some(text)) = (title_el, metadata.title.as_ref()) {
            blocks.push((el.order(), block(BlockKind::Title, text)));
        }

        // ── Step 3: Headings and paragraphs ──────────────────────────────────
        let mut headings = Vec::new();
        for h in s.headings.select_from(root, root) {
            let text = clean_text(&h.text());
            if text.is_empty() {
                continue;
            }
            blocks.push((h.order(), block(BlockKind::Heading, &text)));
            headings.push(text);
        }

        let mut paragraphs = Vec::new();
        for p in s.paragraphs.select_from(root, root) {
            let text = clean_text(&p.text());
            if text.is_empty() {
                continue;
            }
            blocks.push((p.order(), block(BlockKind::Paragraph, &text)));
            paragraphs.push(Paragraph {
                text,
                citations: citations.remove(&p.order()).unwrap_or_default(),
            });
        }

        // ── Step 4: Figures and tables ───────────────────────────────────────
        let mut figure_els = s.figures.select(root);
        if figure_els.is_empty() {
            figure_els = s.figures_fallback.select(root);
        }
        let mut figures = Vec::new();
        for fig in figure_els {
            let caption = child_text(&s.figure_caption, root, fig).unwrap_or_default();
            if !caption.is_empty() {
                blocks.push((fig.order(), block(BlockKind::Caption, &caption)));
            }
            figures.push(Figure {
                id: fig.attr("id").map(str::to_string),
                label: child_text(&s.figure_label, root, fig),
                caption,
            });
        }

        let mut tables = Vec::new();
        for tab in s.tables.select(root) {
            let caption = child_text(&s.table_caption, root, tab).unwrap_or_default();
            if !caption.is_empty() {
                blocks.push((tab.order(), block(BlockKind::Caption, &caption)));
            }
            let rows = s
                .table_rows
                .select_from(root, tab)
                .into_iter()
                .map(|row| row.child_elements().map(|c| clean_text(&c.text())).collect())
                .collect();
            tables.push(Table {
                id: tab.attr("id").map(str::to_string),
                label: child_text(&s.table_label, root, tab),
                caption,
                rows,
            });
        }

        // ── Step 5: Bibliography ─────────────────────────────────────────────
        let bibliography = s
            .bibliography
            .select(root)
            .into_iter()
            .map(bib_entry)
            .collect();

        // ── Step 6: Mentions ─────────────────────────────────────────────────
        blocks.sort_by_key(|(order, _)| *order);
        let blocks: Vec<TextBlock> = blocks.into_iter().map(|(_, b)| b).collect();
        let records = self.extractor.extract(&blocks);
        debug!(
            "Read {} paragraphs, {} figures, {} tables, {} records",
            paragraphs.len(),
            figures.len(),
            tables.len(),
            records.len()
        );

        Ok(StructuredDocument {
            metadata,
            headings,
            paragraphs,
            figures,
            tables,
            bibliography,
            records,
        })
    }
}

/// `#b12` → 12. Anything else maps to [`UNKNOWN_REFERENCE`].
fn reference_id(target: Option<&str>) -> u32 {
    target
        .and_then(|t| t.split_whitespace().next())
        .and_then(|t| t.trim_start_matches('#').strip_prefix('b'))
        .and_then(|n| n.parse().ok())
        .unwrap_or(UNKNOWN_REFERENCE)
}

/// Text nodes of a `persName`, trimmed and joined by one space.
fn author_name(pers: &Element) -> String {
    pers.text_nodes()
        .into_iter()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn child_text(selector: &Selector, root: &Element, context: &Element) -> Option<String> {
    selector
        .first(root, context)
        .and_then(|e| non_empty(clean_text(&e.text())))
}

fn bib_entry(bibl: &Element) -> BibEntry {
    let descendants = bibl.descendants();
    let title = descendants
        .iter()
        .find(|e| e.name == "title" && e.attr("level") == Some("a"))
        .or_else(|| descendants.iter().find(|e| e.name == "title"))
        .and_then(|e| non_empty(clean_text(&e.text())));
    let year = descendants.iter().find(|e| e.name == "date").and_then(|d| {
        d.attr("when")
            .map(|w| w.chars().take(4).collect())
            .or_else(|| non_empty(clean_text(&d.text())))
    });
    BibEntry {
        id: bibl.attr("id").map(str::to_string),
        title,
        year,
    }
}

fn block(kind: BlockKind, text: &str) -> TextBlock {
    TextBlock {
        kind,
        text: text.to_string(),
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
