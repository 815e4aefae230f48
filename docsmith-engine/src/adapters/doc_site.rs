//! Documentation-site adapter: HTML search pages parsed with CSS selectors.
//!
//! One adapter instance covers one site. The search and examples URLs are
//! templates with a `{query}` placeholder; result items, links and snippets
//! are located with configurable selectors, so the same code serves
//! Sphinx-generated sites, MDN, and similar static documentation.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::adapter::SourceAdapter;
use crate::error::{AdapterError, EngineError};
use crate::http;
use crate::orchestrator::scoring::position_score;
use crate::types::{CodeExample, QueryKind, SearchHit};

const QUERY_PLACEHOLDER: &str = "{query}";
const EXAMPLE_SELECTOR: &str = "h1, h2, h3, h4, h5, h6, pre";

/// Static description of one documentation site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocSiteConfig {
    /// Adapter id, unique within its library.
    pub id: String,
    /// Score multiplier applied to this site's position-decayed scores.
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Search page URL with a `{query}` placeholder.
    pub search_url: String,
    /// Selector matching one search result item.
    pub result_selector: String,
    /// Selector for the link inside a result item.
    #[serde(default = "default_link_selector")]
    pub link_selector: String,
    /// Selector for the snippet inside a result item.
    #[serde(default)]
    pub snippet_selector: Option<String>,
    /// Base URL relative result links are resolved against.
    pub link_base: String,
    /// Page holding code examples, with a `{query}` placeholder.
    #[serde(default)]
    pub examples_url: Option<String>,
    /// Languages the examples page covers. Empty means any.
    #[serde(default)]
    pub example_languages: Vec<String>,
    /// Fixed User-Agent. A rotating browser User-Agent is used if unset.
    #[serde(default)]
    pub user_agent: Option<String>,
    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_weight() -> f64 {
    1.0
}

fn default_link_selector() -> String {
    "a".into()
}

fn default_request_timeout_ms() -> u64 {
    1_800
}

impl DocSiteConfig {
    /// Check templates, selectors and the link base.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] naming the adapter and the bad field.
    pub fn validate(&self) -> Result<(), EngineError> {
        let fail = |msg: String| Err(EngineError::Config(format!("adapter {}: {msg}", self.id)));

        if self.id.trim().is_empty() {
            return Err(EngineError::Config("adapter id must not be empty".into()));
        }
        if !self.search_url.contains(QUERY_PLACEHOLDER) {
            return fail(format!("search_url must contain {QUERY_PLACEHOLDER}"));
        }
        if let Some(examples_url) = &self.examples_url {
            if !examples_url.contains(QUERY_PLACEHOLDER) {
                return fail(format!("examples_url must contain {QUERY_PLACEHOLDER}"));
            }
        }
        if !self.weight.is_finite() || self.weight <= 0.0 {
            return fail("weight must be a positive number".into());
        }
        if self.request_timeout_ms == 0 {
            return fail("request_timeout_ms must be greater than 0".into());
        }
        if let Err(e) = Url::parse(&self.link_base) {
            return fail(format!("invalid link_base: {e}"));
        }
        let selectors = [
            Some(self.result_selector.as_str()),
            Some(self.link_selector.as_str()),
            self.snippet_selector.as_deref(),
        ];
        for selector in selectors.into_iter().flatten() {
            if let Err(e) = Selector::parse(selector) {
                return fail(format!("invalid selector {selector:?}: {e:?}"));
            }
        }
        Ok(())
    }
}

/// [`SourceAdapter`] backed by a documentation site's HTML search page.
pub struct DocSiteAdapter {
    config: DocSiteConfig,
    client: reqwest::Client,
}

impl DocSiteAdapter {
    /// Validate `config` and build the adapter's HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] for an invalid site description or
    /// when the HTTP client cannot be built.
    pub fn new(config: DocSiteConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let client = http::build_client(
            config.user_agent.as_deref(),
            Duration::from_millis(config.request_timeout_ms),
        )
        .map_err(|e| EngineError::Config(format!("adapter {}: {e}", config.id)))?;
        Ok(Self { config, client })
    }

    /// The site description this adapter was built from.
    pub fn config(&self) -> &DocSiteConfig {
        &self.config
    }

    async fn fetch(&self, url: &str) -> Result<String, AdapterError> {
        let id = &self.config.id;
        let response = self
            .client
            .get(url)
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await
            .map_err(|e| AdapterError::Http(format!("{id} request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AdapterError::Http(format!("{id} returned {status}")));
        }

        let html = response
            .text()
            .await
            .map_err(|e| AdapterError::Http(format!("{id} response read failed: {e}")))?;
        tracing::trace!(adapter = %id, bytes = html.len(), "documentation page received");
        Ok(html)
    }

    fn example_language(&self, requested: Option<&str>) -> String {
        requested
            .or(self.config.example_languages.first().map(String::as_str))
            .unwrap_or("text")
            .to_lowercase()
    }
}

#[async_trait]
impl SourceAdapter for DocSiteAdapter {
    fn id(&self) -> &str {
        &self.config.id
    }

    fn supports(&self, kind: QueryKind, language: Option<&str>) -> bool {
        match kind {
            QueryKind::Search => true,
            QueryKind::CodeExample => {
                let languages = &self.config.example_languages;
                self.config.examples_url.is_some()
                    && (languages.is_empty()
                        || language.is_none_or(|lang| {
                            languages.iter().any(|l| l.eq_ignore_ascii_case(lang))
                        }))
            }
        }
    }

    async fn search(&self, term: &str) -> Result<Vec<SearchHit>, AdapterError> {
        tracing::trace!(adapter = %self.config.id, term, "documentation search");
        let url = fill_template(&self.config.search_url, term);
        let html = self.fetch(&url).await?;
        let hits = parse_search_html(&html, &self.config)?;
        tracing::debug!(adapter = %self.config.id, count = hits.len(), "search results parsed");
        Ok(hits)
    }

    async fn fetch_examples(
        &self,
        function: &str,
        language: Option<&str>,
    ) -> Result<Vec<CodeExample>, AdapterError> {
        let Some(template) = &self.config.examples_url else {
            return Err(AdapterError::Unsupported(format!(
                "{} has no examples page",
                self.config.id
            )));
        };
        tracing::trace!(adapter = %self.config.id, function, "code example lookup");
        let html = self.fetch(&fill_template(template, function)).await?;
        let examples = parse_examples_html(
            &html,
            function,
            &self.example_language(language),
            &self.config,
        )?;
        tracing::debug!(adapter = %self.config.id, count = examples.len(), "code examples parsed");
        Ok(examples)
    }
}

/// Substitute the URL-encoded `value` for every `{query}` in `template`.
pub fn fill_template(template: &str, value: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(value.as_bytes()).collect();
    template.replace(QUERY_PLACEHOLDER, &encoded)
}

fn selector(raw: &str) -> Result<Selector, AdapterError> {
    Selector::parse(raw).map_err(|e| AdapterError::Parse(format!("invalid selector {raw:?}: {e:?}")))
}

/// Element text with whitespace runs collapsed.
fn element_text(element: ElementRef<'_>) -> String {
    let text: String = element.text().collect();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse a search results page into hits in page order.
///
/// # Errors
///
/// Returns [`AdapterError::Parse`] if a selector or the link base is invalid.
pub fn parse_search_html(html: &str, config: &DocSiteConfig) -> Result<Vec<SearchHit>, AdapterError> {
    let result_sel = selector(&config.result_selector)?;
    let link_sel = selector(&config.link_selector)?;
    let snippet_sel = config.snippet_selector.as_deref().map(selector).transpose()?;
    let base = Url::parse(&config.link_base)
        .map_err(|e| AdapterError::Parse(format!("invalid link base: {e}")))?;

    let document = Html::parse_document(html);
    let mut hits = Vec::new();

    for item in document.select(&result_sel) {
        let Some(link) = item.select(&link_sel).next() else {
            continue;
        };
        let title = element_text(link);
        if title.is_empty() {
            continue;
        }
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let Ok(url) = base.join(href.trim()) else {
            continue;
        };
        let snippet = snippet_sel
            .as_ref()
            .and_then(|sel| item.select(sel).next())
            .map(element_text)
            .unwrap_or_default();

        hits.push(SearchHit {
            title,
            snippet,
            url: url.to_string(),
            source_adapter: config.id.clone(),
            raw_score: position_score(config.weight, hits.len()),
        });
    }

    Ok(hits)
}

/// Collect `<pre>` blocks mentioning `function`, described by the nearest
/// preceding heading.
///
/// # Errors
///
/// Returns [`AdapterError::Parse`] if the built-in selector fails to parse.
pub fn parse_examples_html(
    html: &str,
    function: &str,
    language: &str,
    config: &DocSiteConfig,
) -> Result<Vec<CodeExample>, AdapterError> {
    let blocks = selector(EXAMPLE_SELECTOR)?;
    let document = Html::parse_document(html);

    let mut heading: Option<String> = None;
    let mut examples = Vec::new();

    for element in document.select(&blocks) {
        if element.value().name() != "pre" {
            let text = element_text(element);
            heading = (!text.is_empty()).then_some(text);
            continue;
        }
        let code = element.text().collect::<String>().trim().to_string();
        if code.is_empty() || !code.contains(function) {
            continue;
        }
        examples.push(CodeExample {
            code,
            description: heading.clone().unwrap_or_else(|| "Example".into()),
            source_adapter: config.id.clone(),
            language: language.to_owned(),
            raw_score: position_score(config.weight, examples.len()),
        });
    }

    Ok(examples)
}
