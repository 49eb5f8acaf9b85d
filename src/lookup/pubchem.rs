//! PubChem PUG REST client.
//!
//! One mention costs up to five requests:
//!
//! ```text
//! compound/name/{name}/cids/JSON            name → CID (404 = unknown)
//! compound/cid/{cid}/property/…/JSON        formula, weight, IUPAC name
//! compound/cid/{cid}/JSON                   full record → atoms.element
//! compound/cid/{cid}/synonyms/JSON          synonyms
//! compound/cid/{cid}/PNG                    2D structure (optional)
//! ```
//!
//! ## Retry Strategy
//!
//! PubChem throttles aggressively (HTTP 503 "server busy" and 429). Transient
//! failures are retried with exponential backoff (`retry_backoff_ms *
//! 2^attempt`); with 500 ms base and 3 retries the waits are
//! 500 ms → 1 s → 2 s. Permanent failures (400, decode errors) fail at once.

use crate::chem;
use crate::config::PipelineConfig;
use crate::error::{LookupError, PaperChemError};
use crate::lookup::{ChemicalLookup, CompoundProperties, EnrichedCompound};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

const PROPERTIES: &str = "MolecularFormula,MolecularWeight,IUPACName";

/// PubChem-backed [`ChemicalLookup`].
#[derive(Debug, Clone)]
pub struct PubChemClient {
    client: reqwest::Client,
    base: Url,
    num_results: usize,
    max_synonyms: usize,
    fetch_images: bool,
    max_retries: u32,
    retry_backoff_ms: u64,
    timeout_secs: u64,
}

impl PubChemClient {
    pub fn new(config: &PipelineConfig) -> Result<Self, PaperChemError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.lookup_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| PaperChemError::Internal(format!("HTTP client: {e}")))?;
        Self::with_client(client, config)
    }

    /// Use a caller-provided HTTP client (shared connection pool, proxies).
    pub fn with_client(
        client: reqwest::Client,
        config: &PipelineConfig,
    ) -> Result<Self, PaperChemError> {
        let base = Url::parse(config.pubchem_url.trim_end_matches('/')).map_err(|e| {
            PaperChemError::InvalidConfig(format!(
                "pubchem_url '{}' is not a URL: {e}",
                config.pubchem_url
            ))
        })?;
        if base.cannot_be_a_base() {
            return Err(PaperChemError::InvalidConfig(format!(
                "pubchem_url '{}' cannot be a base URL",
                config.pubchem_url
            )));
        }
        Ok(Self {
            client,
            base,
            num_results: config.num_results.max(1),
            max_synonyms: config.max_synonyms,
            fetch_images: config.fetch_images,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            timeout_secs: config.lookup_timeout_secs,
        })
    }

    /// Base URL with `segments` appended; each segment is percent-encoded,
    /// so names like `copper(II) sulfate` are safe.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// GET with retries. `Ok(None)` on 404.
    async fn get(&self, name: &str, url: Url) -> Result<Option<reqwest::Response>, LookupError> {
        let mut last_err: Option<LookupError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = backoff_ms(self.retry_backoff_ms, attempt);
                warn!(
                    "'{}': retry {}/{} after {}ms",
                    name, attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            let err = match self.client.get(url.clone()).send().await {
                Ok(resp) if resp.status() == StatusCode::NOT_FOUND => return Ok(None),
                Ok(resp) if resp.status().is_success() => return Ok(Some(resp)),
                Ok(resp) => LookupError::Status {
                    name: name.to_string(),
                    status: resp.status().as_u16(),
                },
                Err(e) if e.is_timeout() => LookupError::Timeout {
                    name: name.to_string(),
                    secs: self.timeout_secs,
                },
                Err(e) => LookupError::Http {
                    name: name.to_string(),
                    detail: e.to_string(),
                },
            };

            if !err.is_transient() {
                return Err(err);
            }
            debug!("'{}': attempt {} failed: {}", name, attempt + 1, err);
            last_err = Some(err);
        }

        Err(last_err.unwrap_or_else(|| LookupError::Http {
            name: name.to_string(),
            detail: "no attempt made".into(),
        }))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        name: &str,
        url: Url,
    ) -> Result<Option<T>, LookupError> {
        let Some(resp) = self.get(name, url).await? else {
            return Ok(None);
        };
        let body = resp.text().await.map_err(|e| LookupError::Http {
            name: name.to_string(),
            detail: e.to_string(),
        })?;
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| LookupError::Decode {
                name: name.to_string(),
                detail: e.to_string(),
            })
    }

    /// First CID for `name`, `None` when PubChem has no match.
    pub async fn cid(&self, name: &str) -> Result<Option<u64>, LookupError> {
        let url = self.endpoint(&["compound", "name", name, "cids", "JSON"]);
        let resp: Option<CidsResponse> = self.get_json(name, url).await?;
        Ok(resp.and_then(|r| first_cid(name, &r.identifier_list.cid, self.num_results)))
    }

    pub async fn properties(
        &self,
        name: &str,
        cid: u64,
    ) -> Result<Option<PropertyRow>, LookupError> {
        let cid = cid.to_string();
        let url = self.endpoint(&["compound", "cid", &cid, "property", PROPERTIES, "JSON"]);
        let resp: Option<PropertyResponse> = self.get_json(name, url).await?;
        Ok(resp.and_then(|r| r.property_table.properties.into_iter().next()))
    }

    /// One element symbol per atom of the full record.
    pub async fn elements(&self, name: &str, cid: u64) -> Result<Vec<String>, LookupError> {
        let cid = cid.to_string();
        let url = self.endpoint(&["compound", "cid", &cid, "JSON"]);
        let resp: Option<RecordResponse> = self.get_json(name, url).await?;
        Ok(resp.map(|r| r.element_symbols()).unwrap_or_default())
    }

    pub async fn synonyms(&self, name: &str, cid: u64) -> Result<Vec<String>, LookupError> {
        let cid = cid.to_string();
        let url = self.endpoint(&["compound", "cid", &cid, "synonyms", "JSON"]);
        let resp: Option<SynonymsResponse> = self.get_json(name, url).await?;
        let mut synonyms = resp
            .and_then(|r| r.information_list.information.into_iter().next())
            .map(|i| i.synonym)
            .unwrap_or_default();
        synonyms.truncate(self.max_synonyms);
        Ok(synonyms)
    }

    /// Base64 PNG of the structure. Never fails: any problem is logged and
    /// yields `None`.
    pub async fn structure_png(&self, name: &str, cid: u64) -> Option<String> {
        let cid_s = cid.to_string();
        let url = self.endpoint(&["compound", "cid", &cid_s, "PNG"]);
        let bytes = match self.get(name, url).await {
            Ok(Some(resp)) => match resp.bytes().await {
                Ok(b) => b,
                Err(e) => {
                    warn!("'{}': structure image download failed: {}", name, e);
                    return None;
                }
            },
            Ok(None) => {
                warn!("'{}': no structure image for CID {}", name, cid);
                return None;
            }
            Err(e) => {
                warn!("'{}': structure image request failed: {}", name, e);
                return None;
            }
        };
        encode_png(&bytes).or_else(|| {
            warn!("'{}': structure image for CID {} is not a PNG", name, cid);
            None
        })
    }
}

#[async_trait]
impl ChemicalLookup for PubChemClient {
    async fn lookup(&self, name: &str) -> Result<Option<EnrichedCompound>, LookupError> {
        let Some(cid) = self.cid(name).await? else {
            debug!("'{}': not in PubChem", name);
            return Ok(None);
        };
        let Some(row) = self.properties(name, cid).await? else {
            debug!("'{}': CID {} has no property row", name, cid);
            return Ok(None);
        };
        let elements = self.elements(name, cid).await?;
        let synonyms = self.synonyms(name, cid).await?;
        let structure_png = if self.fetch_images {
            self.structure_png(name, cid).await
        } else {
            None
        };

        debug!("'{}': resolved to CID {}", name, cid);
        Ok(Some(EnrichedCompound {
            synonyms,
            properties: CompoundProperties {
                cid,
                elements,
                molecular_weight: row.molecular_weight.value(),
                molecular_formula: row.molecular_formula.unwrap_or_default(),
                iupac_name: row.iupac_name,
            },
            structure_png,
        }))
    }
}

/// Verify `bytes` decode as a PNG and base64-encode them.
pub fn encode_png(bytes: &[u8]) -> Option<String> {
    image::load_from_memory_with_format(bytes, image::ImageFormat::Png).ok()?;
    Some(STANDARD.encode(bytes))
}

// ── Response payloads ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CidsResponse {
    #[serde(rename = "IdentifierList")]
    identifier_list: IdentifierList,
}

#[derive(Debug, Deserialize)]
struct IdentifierList {
    #[serde(rename = "CID", default)]
    cid: Vec<u64>,
}

#[derive(Debug, Deserialize)]
struct PropertyResponse {
    #[serde(rename = "PropertyTable")]
    property_table: PropertyTable,
}

#[derive(Debug, Deserialize)]
struct PropertyTable {
    #[serde(rename = "Properties", default)]
    properties: Vec<PropertyRow>,
}

/// One row of a property-table response.
#[derive(Debug, Clone, Deserialize)]
pub struct PropertyRow {
    #[serde(rename = "CID")]
    pub cid: u64,
    #[serde(rename = "MolecularFormula")]
    pub molecular_formula: Option<String>,
    #[serde(rename = "MolecularWeight", default)]
    pub molecular_weight: Weight,
    #[serde(rename = "IUPACName")]
    pub iupac_name: Option<String>,
}

/// PubChem has served the weight both as a number and as a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Weight {
    Number(f64),
    Text(String),
}

impl Default for Weight {
    fn default() -> Self {
        Weight::Number(0.0)
    }
}

impl Weight {
    pub fn value(&self) -> f64 {
        match self {
            Weight::Number(n) => *n,
            Weight::Text(s) => s.trim().parse().unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RecordResponse {
    #[serde(rename = "PC_Compounds", default)]
    compounds: Vec<RecordCompound>,
}

#[derive(Debug, Deserialize)]
struct RecordCompound {
    atoms: Option<Atoms>,
}

#[derive(Debug, Deserialize)]
struct Atoms {
    #[serde(default)]
    element: Vec<u32>,
}

impl RecordResponse {
    fn element_symbols(&self) -> Vec<String> {
        self.compounds
            .first()
            .and_then(|c| c.atoms.as_ref())
            .map(|a| {
                a.element
                    .iter()
                    .filter_map(|&z| {
                        let sym = chem::symbol(z);
                        if sym.is_none() {
                            debug!("Unknown atomic number {}", z);
                        }
                        sym.map(str::to_string)
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct SynonymsResponse {
    #[serde(rename = "InformationList")]
    information_list: InformationList,
}

#[derive(Debug, Deserialize)]
struct InformationList {
    #[serde(rename = "Information", default)]
    information: Vec<Information>,
}

#[derive(Debug, Deserialize)]
struct Information {
    #[serde(rename = "Synonym", default)]
    synonym: Vec<String>,
}

/// Delay before retry `attempt` (1-based): `base * 2^(attempt-1)`,
/// saturating instead of overflowing.
fn backoff_ms(base: u64, attempt: u32) -> u64 {
    2u64.checked_pow(attempt.saturating_sub(1))
        .map_or(u64::MAX, |factor| base.saturating_mul(factor))
}

/// The CID that becomes the entity. Up to `num_results` hits are
/// considered; the ones after the first are only logged.
fn first_cid(name: &str, cids: &[u64], num_results: usize) -> Option<u64> {
    let considered = &cids[..cids.len().min(num_results)];
    if considered.len() > 1 {
        debug!("'{}': ignoring further CIDs {:?}", name, &considered[1..]);
    }
    considered.first().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> PubChemClient {
        PubChemClient::new(&PipelineConfig::default()).unwrap()
    }

    #[test]
    fn endpoint_encodes_names() {
        let url = client().endpoint(&["compound", "name", "copper(II) sulfate", "cids", "JSON"]);
        assert_eq!(
            url.as_str(),
            "https://pubchem.ncbi.nlm.nih.gov/rest/pug/compound/name/copper(II)%20sulfate/cids/JSON"
        );
        let url = client().endpoint(&["compound", "name", "a/b", "cids", "JSON"]);
        assert!(url.as_str().contains("a%2Fb"), "got {url}");
    }

    #[test]
    fn first_cid_wins() {
        assert_eq!(first_cid("water", &[962, 22247451, 5], 3), Some(962));
        assert_eq!(first_cid("water", &[962, 22247451], 1), Some(962));
        assert_eq!(first_cid("water", &[], 5), None);
    }

    #[test]
    fn client_keeps_num_results() {
        let config = PipelineConfig::builder().num_results(4).build().unwrap();
        assert_eq!(PubChemClient::new(&config).unwrap().num_results, 4);
        let config = PipelineConfig { num_results: 0, ..Default::default() };
        assert_eq!(PubChemClient::new(&config).unwrap().num_results, 1);
    }

    #[test]
    fn backoff_doubles_and_saturates() {
        assert_eq!(backoff_ms(500, 1), 500);
        assert_eq!(backoff_ms(500, 3), 2000);
        assert_eq!(backoff_ms(500, 64), u64::MAX);
        assert_eq!(backoff_ms(u64::MAX, 2), u64::MAX);
    }

    #[test]
    fn decodes_cids() {
        let r: CidsResponse =
            serde_json::from_str(r#"{"IdentifierList":{"CID":[962,12345]}}"#).unwrap();
        assert_eq!(r.identifier_list.cid, vec![962, 12345]);
    }

    #[test]
    fn decodes_properties_with_string_weight() {
        let r: PropertyResponse = serde_json::from_str(
            r#"{"PropertyTable":{"Properties":[{"CID":962,"MolecularFormula":"H2O","MolecularWeight":"18.015","IUPACName":"oxidane"}]}}"#,
        )
        .unwrap();
        let row = &r.property_table.properties[0];
        assert_eq!(row.cid, 962);
        assert_eq!(row.molecular_formula.as_deref(), Some("H2O"));
        assert!((row.molecular_weight.value() - 18.015).abs() < 1e-9);
        assert_eq!(row.iupac_name.as_deref(), Some("oxidane"));
    }

    #[test]
    fn decodes_properties_without_iupac_and_numeric_weight() {
        let r: PropertyResponse = serde_json::from_str(
            r#"{"PropertyTable":{"Properties":[{"CID":5234,"MolecularFormula":"ClNa","MolecularWeight":58.44}]}}"#,
        )
        .unwrap();
        let row = &r.property_table.properties[0];
        assert!(row.iupac_name.is_none());
        assert!((row.molecular_weight.value() - 58.44).abs() < 1e-9);
    }

    #[test]
    fn decodes_atoms_to_symbols() {
        let r: RecordResponse = serde_json::from_str(
            r#"{"PC_Compounds":[{"id":{"id":{"cid":962}},"atoms":{"aid":[1,2,3],"element":[8,1,1]}}]}"#,
        )
        .unwrap();
        assert_eq!(r.element_symbols(), vec!["O", "H", "H"]);
    }

    #[test]
    fn decodes_synonyms() {
        let r: SynonymsResponse = serde_json::from_str(
            r#"{"InformationList":{"Information":[{"CID":962,"Synonym":["water","oxidane","H2O"]}]}}"#,
        )
        .unwrap();
        assert_eq!(r.information_list.information[0].synonym.len(), 3);
    }

    #[test]
    fn rejects_non_png_bytes() {
        assert!(encode_png(b"GIF89a not a png").is_none());
    }

    #[test]
    fn encodes_real_png() {
        let img = image::RgbImage::new(2, 2);
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        let encoded = encode_png(buf.get_ref()).unwrap();
        assert_eq!(STANDARD.decode(encoded).unwrap(), *buf.get_ref());
    }

    #[test]
    fn rejects_bad_base_url() {
        let config = PipelineConfig {
            pubchem_url: "not a url".into(),
            ..Default::default()
        };
        assert!(matches!(
            PubChemClient::new(&config),
            Err(PaperChemError::InvalidConfig(_))
        ));
    }
}
