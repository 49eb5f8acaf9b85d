//! Offline integration tests: TEI in, deduplicated chemicals out.
//!
//! PubChem is replaced by an in-memory table, so these run without network
//! access or a conversion service.

use async_trait::async_trait;
use paperchem::reader::{BlockKind, Record};
use paperchem::{
    compare_documents, extract_entities, extract_entities_from_markup, extract_entities_to_file,
    inspect, resolve_entities, ChemicalLookup, CompoundProperties, DocumentConverter,
    DocumentEntities, EnrichedCompound, LookupError, PaperChemError, PipelineConfig,
};
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ── Test helpers ─────────────────────────────────────────────────────────────

const PAPER: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<TEI xmlns="http://www.tei-c.org/ns/1.0">
  <teiHeader>
    <fileDesc>
      <titleStmt><title level="a" type="main">Conversion of glucose to ethanol</title></titleStmt>
    </fileDesc>
  </teiHeader>
  <text>
    <body>
      <div><head>Results</head>
        <p>Glucose was fermented <ref type="bibr" target="#b0">[1]</ref> to ethanol and acetone.</p>
        <p>Ethanol was distilled from water.</p>
      </div>
    </body>
  </text>
</TEI>"##;

const EMPTY: &str = r#"<TEI><text><body/></text></TEI>"#;

fn compound(cid: u64, iupac: Option<&str>, elements: &[&str]) -> EnrichedCompound {
    EnrichedCompound {
        synonyms: vec![format!("synonym-{cid}")],
        properties: CompoundProperties {
            cid,
            elements: elements.iter().map(|e| e.to_string()).collect(),
            molecular_weight: cid as f64 / 10.0,
            molecular_formula: format!("F{cid}"),
            iupac_name: iupac.map(str::to_string),
        },
        structure_png: None,
    }
}

/// Case-insensitive name table standing in for PubChem.
#[derive(Default)]
struct TableLookup {
    table: HashMap<String, EnrichedCompound>,
    calls: AtomicUsize,
}

impl TableLookup {
    fn with(mut self, name: &str, hit: EnrichedCompound) -> Self {
        self.table.insert(name.to_lowercase(), hit);
        self
    }

    fn chemistry() -> Self {
        Self::default()
            .with("glucose", compound(5793, Some("(3R,4S,5S,6R)-6-(hydroxymethyl)oxane-2,3,4,5-tetrol"), &["C", "C", "H", "O"]))
            .with("ethanol", compound(702, Some("ethanol"), &["C", "C", "H", "H", "O"]))
            .with("acetone", compound(180, Some("propan-2-one"), &["C", "H", "O"]))
            .with("water", compound(962, None, &["H", "H", "O"]))
    }
}

#[async_trait]
impl ChemicalLookup for TableLookup {
    async fn lookup(&self, name: &str) -> Result<Option<EnrichedCompound>, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.table.get(&name.to_lowercase()).cloned())
    }
}

fn config_with(lookup: TableLookup) -> PipelineConfig {
    PipelineConfig::builder()
        .lookup(Arc::new(lookup))
        .build()
        .unwrap()
}

fn write_markup(dir: &Path, name: &str, markup: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, markup).unwrap();
    path
}

fn cids(doc: &DocumentEntities) -> Vec<u64> {
    doc.entities.iter().map(|e| e.cid).collect()
}

// ── Extraction ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn extracts_one_entity_per_compound_in_document_order() {
    let config = config_with(TableLookup::chemistry());
    let doc = extract_entities_from_markup(PAPER, &config).await.unwrap();

    assert_eq!(doc.source, "<markup>");
    assert_eq!(doc.metadata.title.as_deref(), Some("Conversion of glucose to ethanol"));
    assert_eq!(cids(&doc), vec![5793, 702, 180, 962]);
    assert_eq!(doc.stats.misses, 0);
    assert_eq!(doc.stats.lookup_errors, 0);
    assert_eq!(doc.body.len(), 2);
}

#[tokio::test]
async fn extraction_is_idempotent() {
    let config = config_with(TableLookup::chemistry());
    let first = extract_entities_from_markup(PAPER, &config).await.unwrap();
    let second = extract_entities_from_markup(PAPER, &config).await.unwrap();
    assert_eq!(first.entities, second.entities);
}

#[tokio::test]
async fn display_name_falls_back_to_mention() {
    let config = config_with(TableLookup::chemistry());
    let doc = extract_entities_from_markup(PAPER, &config).await.unwrap();

    let water = doc.entities.iter().find(|e| e.cid == 962).unwrap();
    assert_eq!(water.name, "water");
    assert_eq!(water.iupac_name, None);

    let acetone = doc.entities.iter().find(|e| e.cid == 180).unwrap();
    assert_eq!(acetone.name, "propan-2-one");
    assert_eq!(acetone.mention, "acetone");
}

#[tokio::test]
async fn iupac_semicolons_become_spaces() {
    let lookup = TableLookup::default().with("water", compound(962, Some("oxidane;water"), &["H", "O"]));
    let config = config_with(lookup);
    let doc = extract_entities_from_markup(PAPER, &config).await.unwrap();
    assert_eq!(doc.entities.len(), 1);
    assert_eq!(doc.entities[0].name, "oxidane water");
}

#[tokio::test]
async fn elements_are_deduplicated() {
    let config = config_with(TableLookup::chemistry());
    let doc = extract_entities_from_markup(PAPER, &config).await.unwrap();
    let ethanol = doc.entities.iter().find(|e| e.cid == 702).unwrap();
    let elements: Vec<&str> = ethanol.elements.iter().map(String::as_str).collect();
    assert_eq!(elements, vec!["C", "H", "O"]);
}

#[tokio::test]
async fn unknown_mentions_are_counted_as_misses() {
    let lookup = TableLookup::default().with("ethanol", compound(702, Some("ethanol"), &["C"]));
    let config = config_with(lookup);
    let doc = extract_entities_from_markup(PAPER, &config).await.unwrap();
    assert_eq!(cids(&doc), vec![702]);
    assert_eq!(doc.stats.misses, 3);
}

#[tokio::test]
async fn records_without_names_are_skipped() {
    let lookup = TableLookup::chemistry();
    let records = vec![
        Record {
            source: BlockKind::Paragraph,
            compound: None,
        },
        Record::compound(BlockKind::Paragraph, vec![]),
        Record::compound(BlockKind::Paragraph, vec!["acetone".to_string()]),
    ];
    let (entities, stats) = resolve_entities(&records, &lookup, None).await;
    assert_eq!(entities.len(), 1);
    assert_eq!(stats.records, 3);
    assert_eq!(stats.mentions, 1);
    assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn fallback_variants_resolve_spaced_names() {
    let lookup = TableLookup::default().with("sodiumchloride", compound(5234, Some("sodium chloride"), &["Na", "Cl"]));
    let records = vec![Record::compound(
        BlockKind::Paragraph,
        vec!["Sodium Chloride".to_string()],
    )];
    let (entities, stats) = resolve_entities(&records, &lookup, None).await;
    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0].mention, "Sodium Chloride");
    assert_eq!(stats.misses, 0);
    assert_eq!(lookup.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn synonyms_of_one_compound_collapse() {
    let lookup = TableLookup::default()
        .with("ethanol", compound(702, Some("ethanol"), &["C", "H", "O"]))
        .with("EtOH", compound(702, Some("ethanol"), &["C", "H", "O"]));
    let records = vec![Record::compound(
        BlockKind::Paragraph,
        vec!["ethanol".to_string(), "EtOH".to_string()],
    )];
    let (entities, stats) = resolve_entities(&records, &lookup, None).await;
    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0].mention, "ethanol");
    assert_eq!(stats.duplicates, 1);
}

proptest! {
    #[test]
    fn entity_cids_are_unique_and_first_seen(picks in prop::collection::vec((0usize..12, 1u64..6), 0..30)) {
        let mut lookup = TableLookup::default();
        let mut records = Vec::new();
        let mut expected = Vec::new();
        let mut assigned: HashMap<String, u64> = HashMap::new();
        for (name_idx, cid) in &picks {
            let name = format!("m{name_idx}");
            let cid = *assigned.entry(name.clone()).or_insert(*cid);
            lookup = lookup.with(&name, compound(cid, None, &["C"]));
            if !expected.contains(&cid) {
                expected.push(cid);
            }
            records.push(Record::compound(BlockKind::Paragraph, vec![name]));
        }

        let (entities, stats) = tokio_test::block_on(resolve_entities(&records, &lookup, None));
        let got: Vec<u64> = entities.iter().map(|e| e.cid).collect();
        let unique: HashSet<u64> = got.iter().copied().collect();
        prop_assert_eq!(unique.len(), got.len());
        prop_assert_eq!(got, expected);
        prop_assert_eq!(stats.resolved + stats.duplicates, picks.len());
    }
}

// ── File inputs ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn markup_files_skip_conversion() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_markup(dir.path(), "paper.tei.xml", PAPER);

    // No reachable conversion service: GROBID at a closed port.
    let config = PipelineConfig::builder()
        .grobid_url("http://127.0.0.1:9")
        .lookup(Arc::new(TableLookup::chemistry()))
        .build()
        .unwrap();

    let doc = extract_entities(path.to_string_lossy(), &config).await.unwrap();
    assert_eq!(cids(&doc), vec![5793, 702, 180, 962]);

    let structure = inspect(path.to_string_lossy(), &config).await.unwrap();
    assert_eq!(structure.headings, vec!["Results"]);
    assert_eq!(structure.paragraphs.len(), 2);
    assert_eq!(structure.paragraphs[0].citations, vec![0]);
}

#[tokio::test]
async fn missing_file_is_an_error() {
    let config = config_with(TableLookup::chemistry());
    assert!(extract_entities("/nonexistent/paper.tei.xml", &config).await.is_err());
}

#[tokio::test]
async fn writes_json_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_markup(dir.path(), "paper.xml", PAPER);
    let output = dir.path().join("out/paper.json");
    let config = config_with(TableLookup::chemistry());

    let stats = extract_entities_to_file(input.to_string_lossy(), &output, &config)
        .await
        .unwrap();
    assert_eq!(stats.resolved, 4);

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    let entities = json["entities"].as_array().unwrap();
    assert_eq!(entities.len(), 4);
    assert_eq!(entities[0]["cid"], 5793);
    assert!(entities[3].get("structure_png").is_none());
    assert!(json.get("body").is_none(), "paragraph text stays out of the output");
}

// ── Conversion failures ──────────────────────────────────────────────────────

struct Unavailable;

#[async_trait]
impl DocumentConverter for Unavailable {
    async fn convert(&self, _pdf: &Path) -> Result<String, PaperChemError> {
        Err(PaperChemError::ServiceUnavailable {
            service: "GROBID".into(),
            detail: "connection refused".into(),
        })
    }
}

fn write_pdf(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"%PDF-1.5\n%%EOF\n").unwrap();
    path
}

#[tokio::test]
async fn conversion_failure_reaches_the_caller() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = write_pdf(dir.path(), "paper.pdf");
    let config = PipelineConfig::builder()
        .converter(Arc::new(Unavailable))
        .lookup(Arc::new(TableLookup::chemistry()))
        .build()
        .unwrap();

    let err = extract_entities(pdf.to_string_lossy(), &config).await.unwrap_err();
    assert!(err.is_service_unavailable(), "got {err:?}");
}

#[tokio::test]
async fn comparison_fails_when_one_side_cannot_be_converted() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = write_pdf(dir.path(), "paper.pdf");
    let markup = write_markup(dir.path(), "other.xml", PAPER);
    let config = PipelineConfig::builder()
        .converter(Arc::new(Unavailable))
        .lookup(Arc::new(TableLookup::chemistry()))
        .build()
        .unwrap();

    let result = compare_documents(&markup.to_string_lossy(), &pdf.to_string_lossy(), &config).await;
    assert!(result.is_err());
}

// ── Comparison ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn comparing_with_empty_document_has_no_pairs() {
    let dir = tempfile::tempdir().unwrap();
    let paper = write_markup(dir.path(), "paper.xml", PAPER);
    let empty = write_markup(dir.path(), "empty.xml", EMPTY);
    let config = config_with(TableLookup::chemistry());

    let result = compare_documents(&paper.to_string_lossy(), &empty.to_string_lossy(), &config)
        .await
        .unwrap();
    assert!(result.matches.is_empty());
    assert_eq!(result.right.entities.len(), 0);
    assert_eq!(result.text_overlap, 0.0);
}

#[tokio::test]
async fn comparing_a_document_with_itself_pairs_everything() {
    let dir = tempfile::tempdir().unwrap();
    let paper = write_markup(dir.path(), "paper.xml", PAPER);
    let path = paper.to_string_lossy();
    let config = config_with(TableLookup::chemistry());

    let result = compare_documents(&path, &path, &config).await.unwrap();
    assert_eq!(result.matches, vec![(0, 0), (1, 1), (2, 2), (3, 3)]);
    assert_eq!(result.text_overlap, 1.0);
}
