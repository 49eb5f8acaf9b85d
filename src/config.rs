//! Configuration types for chemical-entity extraction and comparison.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. One struct carries the conversion services,
//! the enrichment database, retry policy and reader selectors, so two runs can
//! be diffed by printing their configs.

use crate::error::PaperChemError;
use crate::gateway::DocumentConverter;
use crate::lookup::ChemicalLookup;
use crate::progress::ProgressCallback;
use crate::reader::ReaderSelectors;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default local GROBID endpoint.
pub const DEFAULT_GROBID_URL: &str = "http://localhost:8070";

/// Upper bound accepted for `max_retries`.
pub const MAX_RETRIES: u32 = 10;

/// Default PubChem PUG REST root.
pub const DEFAULT_PUBCHEM_URL: &str = "https://pubchem.ncbi.nlm.nih.gov/rest/pug";

/// Configuration for an extraction or comparison run.
///
/// Built via [`PipelineConfig::builder()`] or using
/// [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use paperchem::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .grobid_url("http://localhost:8070")
///     .concurrency(4)
///     .fetch_images(false)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Local GROBID service. `None` skips the local attempt entirely.
    pub grobid_url: Option<String>,

    /// Remote conversion backend used when the local service is unavailable.
    /// `None` disables the fallback.
    pub backend_url: Option<String>,

    /// Remote backend user name.
    pub backend_user: Option<String>,

    /// Remote backend password.
    pub backend_password: Option<String>,

    /// External id attached to every upload to the remote backend.
    pub external_id: String,

    /// File the remote backend token is persisted to between runs.
    /// `None` keeps the token in memory only.
    pub token_cache_path: Option<PathBuf>,

    /// How long a backend token stays valid, in seconds. Default: 7200.
    pub token_validity_secs: u64,

    /// PubChem PUG REST root URL.
    pub pubchem_url: String,

    /// Number of PubChem search hits considered per name. Default: 1.
    ///
    /// Only the first hit becomes an entity; extra hits are logged at debug
    /// level so a noisy name can be diagnosed.
    pub num_results: usize,

    /// Maximum synonyms kept per compound. Default: 5.
    pub max_synonyms: usize,

    /// Download the 2D structure PNG for each compound. Default: true.
    pub fetch_images: bool,

    /// Worker-pool size for batch uploads/downloads. Default: 10.
    ///
    /// The effective pool is `min(concurrency, items)`.
    pub concurrency: usize,

    /// Retry attempts for transient enrichment failures. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (doubles per attempt). Default: 500.
    pub retry_backoff_ms: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Timeout for a single conversion request in seconds. Default: 300.
    pub conversion_timeout_secs: u64,

    /// Timeout for a single enrichment request in seconds. Default: 30.
    pub lookup_timeout_secs: u64,

    /// Directory converted TEI markup is saved to. `None` keeps it in memory.
    pub markup_dir: Option<PathBuf>,

    /// `User-Agent` sent to PubChem.
    pub user_agent: String,

    /// Word n-gram size used for the comparison's text overlap. Default: 2.
    pub ngram_size: usize,

    /// Path selectors the TEI reader uses.
    pub selectors: ReaderSelectors,

    /// Pre-constructed converter. Takes precedence over the URLs above.
    pub converter: Option<Arc<dyn DocumentConverter>>,

    /// Pre-constructed enrichment lookup. Takes precedence over `pubchem_url`.
    pub lookup: Option<Arc<dyn ChemicalLookup>>,

    /// Per-mention progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            grobid_url: Some(DEFAULT_GROBID_URL.to_string()),
            backend_url: None,
            backend_user: None,
            backend_password: None,
            external_id: "paperchem".to_string(),
            token_cache_path: None,
            token_validity_secs: 7200,
            pubchem_url: DEFAULT_PUBCHEM_URL.to_string(),
            num_results: 1,
            max_synonyms: 5,
            fetch_images: true,
            concurrency: 10,
            max_retries: 3,
            retry_backoff_ms: 500,
            download_timeout_secs: 120,
            conversion_timeout_secs: 300,
            lookup_timeout_secs: 30,
            markup_dir: None,
            user_agent: concat!("paperchem/", env!("CARGO_PKG_VERSION")).to_string(),
            ngram_size: 2,
            selectors: ReaderSelectors::default(),
            converter: None,
            lookup: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("grobid_url", &self.grobid_url)
            .field("backend_url", &self.backend_url)
            .field("backend_user", &self.backend_user)
            .field("backend_password", &self.backend_password.as_ref().map(|_| "<redacted>"))
            .field("external_id", &self.external_id)
            .field("token_cache_path", &self.token_cache_path)
            .field("token_validity_secs", &self.token_validity_secs)
            .field("pubchem_url", &self.pubchem_url)
            .field("num_results", &self.num_results)
            .field("max_synonyms", &self.max_synonyms)
            .field("fetch_images", &self.fetch_images)
            .field("concurrency", &self.concurrency)
            .field("max_retries", &self.max_retries)
            .field("markup_dir", &self.markup_dir)
            .field("converter", &self.converter.as_ref().map(|_| "<dyn DocumentConverter>"))
            .field("lookup", &self.lookup.as_ref().map(|_| "<dyn ChemicalLookup>"))
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn grobid_url(mut self, url: impl Into<String>) -> Self {
        self.config.grobid_url = Some(url.into());
        self
    }

    /// Skip the local GROBID attempt and go straight to the remote backend.
    pub fn no_grobid(mut self) -> Self {
        self.config.grobid_url = None;
        self
    }

    pub fn backend_url(mut self, url: impl Into<String>) -> Self {
        self.config.backend_url = Some(url.into());
        self
    }

    pub fn backend_credentials(
        mut self,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.config.backend_user = Some(user.into());
        self.config.backend_password = Some(password.into());
        self
    }

    pub fn external_id(mut self, id: impl Into<String>) -> Self {
        self.config.external_id = id.into();
        self
    }

    pub fn token_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.token_cache_path = Some(path.into());
        self
    }

    pub fn token_validity_secs(mut self, secs: u64) -> Self {
        self.config.token_validity_secs = secs;
        self
    }

    pub fn pubchem_url(mut self, url: impl Into<String>) -> Self {
        self.config.pubchem_url = url.into();
        self
    }

    pub fn num_results(mut self, n: usize) -> Self {
        self.config.num_results = n.max(1);
        self
    }

    pub fn max_synonyms(mut self, n: usize) -> Self {
        self.config.max_synonyms = n;
        self
    }

    pub fn fetch_images(mut self, v: bool) -> Self {
        self.config.fetch_images = v;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn conversion_timeout_secs(mut self, secs: u64) -> Self {
        self.config.conversion_timeout_secs = secs;
        self
    }

    pub fn lookup_timeout_secs(mut self, secs: u64) -> Self {
        self.config.lookup_timeout_secs = secs;
        self
    }

    pub fn markup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.markup_dir = Some(dir.into());
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn ngram_size(mut self, n: usize) -> Self {
        self.config.ngram_size = n;
        self
    }

    pub fn selectors(mut self, selectors: ReaderSelectors) -> Self {
        self.config.selectors = selectors;
        self
    }

    pub fn converter(mut self, converter: Arc<dyn DocumentConverter>) -> Self {
        self.config.converter = Some(converter);
        self
    }

    pub fn lookup(mut self, lookup: Arc<dyn ChemicalLookup>) -> Self {
        self.config.lookup = Some(lookup);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, PaperChemError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(PaperChemError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.max_retries > MAX_RETRIES {
            return Err(PaperChemError::InvalidConfig(format!(
                "Max retries must be ≤ {MAX_RETRIES}, got {}",
                c.max_retries
            )));
        }
        if c.ngram_size == 0 {
            return Err(PaperChemError::InvalidConfig(
                "N-gram size must be ≥ 1".into(),
            ));
        }
        if c.backend_url.is_some()
            && (c.backend_user.is_none() || c.backend_password.is_none())
        {
            return Err(PaperChemError::InvalidConfig(
                "A backend URL needs both a user and a password".into(),
            ));
        }
        if c.converter.is_none() && c.grobid_url.is_none() && c.backend_url.is_none() {
            return Err(PaperChemError::InvalidConfig(
                "No conversion service configured: set a GROBID or backend URL".into(),
            ));
        }
        Ok(self.config)
    }
}
