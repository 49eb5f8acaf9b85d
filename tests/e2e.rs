//! End-to-end integration tests for paperchem.
//!
//! These tests convert real PDF files in `./test_cases/` with a running
//! GROBID server and make live PubChem requests. They are gated behind the
//! `E2E_ENABLED` environment variable so they do not run in CI unless
//! explicitly requested.
//!
//! Run with:
//!   docker run --rm -p 8070:8070 lfoppiano/grobid:0.8.0 &
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture
//!
//! To restrict to a specific test:
//!   E2E_ENABLED=1 cargo test --test e2e test_lookup -- --nocapture

use paperchem::{
    compare_documents, extract_entities, inspect, ChemicalLookup, GrobidClient, PipelineConfig,
    PubChemClient,
};
use std::path::PathBuf;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

fn output_dir() -> PathBuf {
    let d = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases/output");
    std::fs::create_dir_all(&d).ok();
    d
}

fn grobid_url() -> String {
    std::env::var("PAPERCHEM_GROBID_URL")
        .unwrap_or_else(|_| paperchem::config::DEFAULT_GROBID_URL.to_string())
}

fn config() -> PipelineConfig {
    PipelineConfig::builder()
        .grobid_url(grobid_url())
        .max_retries(2)
        .fetch_images(false)
        .markup_dir(output_dir())
        .build()
        .expect("valid config")
}

macro_rules! e2e_skip_unless_enabled {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
    }};
}

/// Skip this test if E2E_ENABLED is not set *or* no PDF file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        e2e_skip_unless_enabled!();
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP — test file not found: {}", p.display());
            println!("       Place a chemistry paper at test_cases/paper.pdf");
            return;
        }
        p
    }};
}

// ── Lookup tests (PubChem only) ──────────────────────────────────────────────

#[tokio::test]
async fn test_lookup_well_known_compounds() {
    e2e_skip_unless_enabled!();

    let client = PubChemClient::new(&config()).expect("client");
    let cases = [("water", 962), ("ethanol", 702), ("acetone", 180)];
    for (name, cid) in cases {
        let hit = client
            .lookup(name)
            .await
            .expect("lookup should succeed")
            .unwrap_or_else(|| panic!("{name} should resolve"));
        assert_eq!(hit.properties.cid, cid, "{name}");
        assert!(!hit.properties.elements.is_empty());
        assert!(hit.synonyms.len() <= 5);
    }
}

#[tokio::test]
async fn test_lookup_unknown_name_is_none() {
    e2e_skip_unless_enabled!();

    let client = PubChemClient::new(&config()).expect("client");
    let hit = client
        .lookup("definitelynotachemicalxyzzy")
        .await
        .expect("a 404 is not an error");
    assert!(hit.is_none());
}

#[tokio::test]
async fn test_lookup_structure_image() {
    e2e_skip_unless_enabled!();

    let config = PipelineConfig::builder().build().expect("valid config");
    let client = PubChemClient::new(&config).expect("client");
    let png = client.structure_png("ethanol", 702).await;
    assert!(png.is_some(), "ethanol should have a structure image");
}

// ── Conversion tests (need GROBID) ───────────────────────────────────────────

#[tokio::test]
async fn test_grobid_is_alive() {
    e2e_skip_unless_enabled!();

    let client = GrobidClient::new(&grobid_url(), 10, "paperchem-e2e").expect("client");
    assert!(client.is_alive().await, "GROBID should answer at {}", grobid_url());
}

#[tokio::test]
async fn test_inspect_paper() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("paper.pdf"));

    let doc = inspect(path.to_str().unwrap(), &config())
        .await
        .expect("inspect() should succeed");

    assert!(doc.metadata.title.is_some(), "GROBID should find a title");
    assert!(!doc.paragraphs.is_empty());
    assert!(output_dir().join("paper.tei.xml").exists(), "markup should be saved");

    println!("Metadata: {:?}", doc.metadata);
    println!("{} paragraphs, {} mentions", doc.paragraphs.len(), doc.mention_count());
}

#[tokio::test]
async fn test_inspect_nonexistent() {
    e2e_skip_unless_enabled!();

    let result = inspect("/definitely/not/a/real/file.pdf", &config()).await;
    assert!(
        result.is_err(),
        "inspect() should return Err for nonexistent file"
    );
}

// ── Full pipeline tests (GROBID + PubChem) ───────────────────────────────────

#[tokio::test]
async fn test_extract_paper() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("paper.pdf"));
    let out_path = output_dir().join("paper.entities.json");

    let doc = extract_entities(path.to_str().unwrap(), &config())
        .await
        .expect("extraction should succeed");

    let mut seen = std::collections::HashSet::new();
    for chem in &doc.entities {
        assert!(seen.insert(chem.cid), "CID {} appears twice", chem.cid);
        assert!(!chem.name.is_empty());
    }
    assert_eq!(
        doc.stats.resolved + doc.stats.duplicates + doc.stats.misses,
        doc.stats.mentions
    );

    let json = serde_json::to_string_pretty(&doc).expect("serialisable");
    std::fs::write(&out_path, json).ok();
    println!("[extract] {} chemicals, saved to {}", doc.entities.len(), out_path.display());
}

#[tokio::test]
async fn test_compare_paper_with_itself() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("paper.pdf"));
    let p = path.to_str().unwrap();

    let result = compare_documents(p, p, &config())
        .await
        .expect("comparison should succeed");

    assert_eq!(result.matches.len(), result.left.entities.len());
    assert!(result.matches.iter().all(|(i, j)| i == j));
    assert!((result.text_overlap - 1.0).abs() < f64::EPSILON || result.left.body.is_empty());
}
