//! Encyclopedic knowledge provider backed by a wiki search API
//!
//! Search results and page summaries are stable, so both are cached with
//! long TTLs. The HTTP layer sits behind [`WikiBackend`] so tests can
//! substitute a canned backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use sibyl_cache::TtlCache;
use tracing::{debug, info, warn};

use crate::error::{Result, SibylError};

use super::{Knowledge, KnowledgeSource};

/// Raw search results to request before filtering
const SEARCH_LIMIT: usize = 5;

/// Non-disambiguation candidates kept after filtering
const MAX_CANDIDATES: usize = 3;

/// Candidates whose summaries are fetched concurrently
const SUMMARY_CANDIDATES: usize = 2;

/// Paragraphs shorter than this are ignored when building an extract
const MIN_PARAGRAPH_LEN: usize = 50;

/// Hard cap on the composed summary
const MAX_SUMMARY_LEN: usize = 1000;

const SEARCH_CACHE_ENTRIES: usize = 500;
const SUMMARY_CACHE_ENTRIES: usize = 500;
const SEARCH_TTL: Duration = Duration::from_secs(24 * 3600);
const SUMMARY_TTL: Duration = Duration::from_secs(7 * 24 * 3600);
const DISAMBIGUATION_TTL: Duration = Duration::from_secs(24 * 3600);

/// A page as seen by the backend.
#[derive(Debug, Clone)]
pub enum WikiPage {
    /// Plain-text article body (paragraphs separated by blank lines)
    Article { text: String },
    /// The title is ambiguous; options are other plausible topics
    Disambiguation { options: Vec<String> },
    /// No such page
    Missing,
}

/// Transport seam for the encyclopedic provider.
#[async_trait]
pub trait WikiBackend: Send + Sync {
    /// Ranked page titles for a cleaned query.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>>;

    /// Fetch a page body by exact title.
    async fn fetch_page(&self, title: &str) -> Result<WikiPage>;
}

/// Encyclopedic knowledge source: ranked search plus summary extraction.
pub struct EncyclopediaProvider {
    backend: Arc<dyn WikiBackend>,
    search_cache: TtlCache<Vec<String>>,
    summary_cache: TtlCache<String>,
}

impl EncyclopediaProvider {
    pub fn new(backend: Arc<dyn WikiBackend>) -> Self {
        Self {
            backend,
            search_cache: TtlCache::bounded(SEARCH_TTL, SEARCH_CACHE_ENTRIES),
            summary_cache: TtlCache::bounded(SUMMARY_TTL, SUMMARY_CACHE_ENTRIES),
        }
    }

    /// Search for candidate titles, skipping disambiguation pages.
    async fn search(&self, cleaned: &str) -> Result<Vec<String>> {
        let cache_key = format!("search:{}", cleaned);
        if let Some(cached) = self.search_cache.get(&cache_key).await {
            debug!("search cache hit: {}", cleaned);
            return Ok(cached);
        }

        let raw = self.backend.search(cleaned, SEARCH_LIMIT).await?;

        let candidates: Vec<String> = raw
            .into_iter()
            .filter(|title| !title.to_lowercase().contains("(disambiguation)"))
            .take(MAX_CANDIDATES)
            .collect();

        info!("search '{}' yielded {} candidates", cleaned, candidates.len());
        self.search_cache.set(cache_key, candidates.clone()).await;
        Ok(candidates)
    }

    /// Summary text for a title, preferring a multi-paragraph extract and
    /// falling back to the first paragraph. Disambiguation pages become a
    /// clarification message rather than an error.
    async fn summary(&self, title: &str) -> Result<Option<String>> {
        let cache_key = format!("summary:{}", title);
        if let Some(cached) = self.summary_cache.get(&cache_key).await {
            debug!("summary cache hit: {}", title);
            return Ok(Some(cached));
        }

        match self.backend.fetch_page(title).await? {
            WikiPage::Article { text } => {
                let summary = compose_summary(&text);
                if summary.is_empty() {
                    return Ok(None);
                }
                self.summary_cache
                    .set_with_ttl(cache_key, summary.clone(), SUMMARY_TTL)
                    .await;
                Ok(Some(summary))
            }
            WikiPage::Disambiguation { options } => {
                let shown: Vec<&str> = options.iter().map(String::as_str).take(3).collect();
                let clarification = format!(
                    "The term '{}' could refer to multiple topics including {}. \
                     Please specify which one you are interested in.",
                    title,
                    shown.join(", ")
                );
                self.summary_cache
                    .set_with_ttl(cache_key, clarification.clone(), DISAMBIGUATION_TTL)
                    .await;
                Ok(Some(clarification))
            }
            WikiPage::Missing => {
                debug!("page not found: {}", title);
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl KnowledgeSource for EncyclopediaProvider {
    fn name(&self) -> &'static str {
        "encyclopedia"
    }

    async fn lookup(&self, query: &str) -> Result<Knowledge> {
        let cleaned = clean_query(query);
        if cleaned.is_empty() {
            return Ok(Knowledge::default());
        }

        let candidates = self.search(&cleaned).await?;
        if candidates.is_empty() {
            return Ok(Knowledge::default());
        }

        // Fetch summaries for the top candidates concurrently; the first
        // usable one wins.
        let fetches = candidates
            .iter()
            .take(SUMMARY_CANDIDATES)
            .map(|title| self.summary(title));
        let summaries = join_all(fetches).await;

        for (title, outcome) in candidates.iter().zip(summaries) {
            match outcome {
                Ok(Some(text)) => return Ok(Knowledge::new(title.clone(), text)),
                Ok(None) => continue,
                Err(err) => {
                    warn!("summary fetch failed for '{}': {}", title, err);
                    continue;
                }
            }
        }

        Ok(Knowledge::default())
    }
}

/// Interrogative lead-ins stripped before searching
const QUESTION_PREFIXES: &[&str] = &[
    "what is ",
    "what are ",
    "who is ",
    "who was ",
    "tell me about ",
    "how does ",
    "where is ",
    "when did ",
    "why does ",
    "can you explain ",
];

/// Normalize a free-text question into a search query: lowercase, strip a
/// leading interrogative phrase, drop punctuation, collapse whitespace.
pub fn clean_query(query: &str) -> String {
    let lowered = query.to_lowercase();

    let stripped = QUESTION_PREFIXES
        .iter()
        .find_map(|prefix| lowered.strip_prefix(prefix))
        .unwrap_or(&lowered);

    let filtered: String = stripped
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();

    filtered.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Build a bounded summary out of an article body: join the first few
/// substantial paragraphs, or fall back to the first paragraph when none
/// qualify.
fn compose_summary(text: &str) -> String {
    let paragraphs: Vec<&str> = text
        .split("\n\n")
        .map(str::trim)
        .filter(|p| p.len() > MIN_PARAGRAPH_LEN)
        .collect();

    let summary = if paragraphs.is_empty() {
        text.split("\n\n")
            .map(str::trim)
            .find(|p| !p.is_empty())
            .unwrap_or("")
            .to_string()
    } else {
        paragraphs
            .into_iter()
            .take(3)
            .collect::<Vec<_>>()
            .join("\n\n")
    };

    let capped = if summary.chars().count() > MAX_SUMMARY_LEN {
        let mut truncated: String = summary.chars().take(MAX_SUMMARY_LEN).collect();
        truncated.push_str("...");
        truncated
    } else {
        summary
    };

    clean_content(&capped)
}

/// Strip `[n]` reference markers and collapse whitespace.
fn clean_content(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '[' {
            let mut probe = chars.clone();
            let mut saw_digit = false;
            while let Some(d) = probe.peek() {
                if d.is_ascii_digit() {
                    saw_digit = true;
                    probe.next();
                } else {
                    break;
                }
            }
            if saw_digit && probe.peek() == Some(&']') {
                probe.next();
                chars = probe;
                continue;
            }
        }
        out.push(c);
    }

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Production backend talking to the MediaWiki APIs.
pub struct HttpWikiBackend {
    http: reqwest::Client,
    base_url: String,
}

impl HttpWikiBackend {
    pub fn new() -> Self {
        Self::with_base_url("https://en.wikipedia.org")
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(8))
            .user_agent(concat!("sibyl/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

impl Default for HttpWikiBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct SearchPayload {
    #[serde(default)]
    pages: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
}

#[derive(Debug, Deserialize)]
struct QueryPayload {
    #[serde(default)]
    query: Option<QueryBody>,
}

#[derive(Debug, Deserialize)]
struct QueryBody {
    #[serde(default)]
    pages: Vec<QueryPage>,
}

#[derive(Debug, Deserialize)]
struct QueryPage {
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    pageprops: Option<PageProps>,
    #[serde(default)]
    extract: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PageProps {
    #[serde(default)]
    disambiguation: Option<String>,
}

#[async_trait]
impl WikiBackend for HttpWikiBackend {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let url = format!("{}/w/rest.php/v1/search/page", self.base_url);
        let limit = limit.to_string();
        let payload: SearchPayload = self
            .http
            .get(&url)
            .query(&[("q", query), ("limit", limit.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(payload.pages.into_iter().map(|hit| hit.title).collect())
    }

    async fn fetch_page(&self, title: &str) -> Result<WikiPage> {
        let url = format!("{}/w/api.php", self.base_url);
        let payload: QueryPayload = self
            .http
            .get(&url)
            .query(&[
                ("action", "query"),
                ("prop", "extracts|pageprops"),
                ("explaintext", "1"),
                ("ppprop", "disambiguation"),
                ("redirects", "1"),
                ("format", "json"),
                ("formatversion", "2"),
                ("titles", title),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let page = payload
            .query
            .and_then(|body| body.pages.into_iter().next())
            .ok_or_else(|| SibylError::Retrieval(format!("empty query response for '{}'", title)))?;

        if page.missing {
            return Ok(WikiPage::Missing);
        }

        let extract = page.extract.unwrap_or_default();

        if page
            .pageprops
            .map(|props| props.disambiguation.is_some())
            .unwrap_or(false)
        {
            // Disambiguation bodies list one option per line
            let options = extract
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .skip(1)
                .take(3)
                .map(String::from)
                .collect();
            return Ok(WikiPage::Disambiguation { options });
        }

        Ok(WikiPage::Article { text: extract })
    }
}
