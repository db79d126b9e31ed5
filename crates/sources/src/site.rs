//! Trusted health sites scraped via their own search pages.
//!
//! Each site is two GETs: the search results page, from which the first
//! link matching a CSS selector is taken, and the linked article, whose
//! visible text (optionally limited to one container) becomes the hit.

use crate::http::HttpGet;
use async_trait::async_trait;
use caduceus_core::{FetchError, KnowledgeSource, SourceHit, truncate_chars};
use scraper::{ElementRef, Html, Node, Selector};
use std::sync::Arc;

/// Article text kept per page.
const MAX_PAGE_CHARS: usize = 1000;

/// Elements whose text is never visible.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Static description of one scraped site.
#[derive(Debug, Clone, Copy)]
pub struct Site {
    pub name: &'static str,
    pub label: &'static str,
    /// Scheme and host, prefixed to relative links.
    pub origin: &'static str,
    /// Search page URL; the encoded query is appended.
    pub search_prefix: &'static str,
    /// Selects the result link on the search page.
    pub link_selector: &'static str,
    /// Selects the article body. `None` takes the whole page.
    pub content_selector: Option<&'static str>,
}

pub const MEDLINEPLUS: Site = Site {
    name: "medlineplus",
    label: "MedlinePlus",
    origin: "https://medlineplus.gov",
    search_prefix: "https://medlineplus.gov/search/?query=",
    link_selector: "a.results-link",
    content_selector: Some("div.main-content"),
};

pub const CDC: Site = Site {
    name: "cdc",
    label: "CDC",
    origin: "https://www.cdc.gov",
    search_prefix: "https://www.cdc.gov/search.do?queryText=",
    link_selector: r#"a[href^="/"]"#,
    content_selector: None,
};

pub const MAYO_CLINIC: Site = Site {
    name: "mayo",
    label: "Mayo Clinic",
    origin: "https://www.mayoclinic.org",
    search_prefix: "https://www.mayoclinic.org/search/search-results?q=",
    link_selector: r#"a[href^="/drugs-supplements/"]"#,
    content_selector: None,
};

pub struct SiteSource {
    site: Site,
    http: Arc<dyn HttpGet>,
}

impl SiteSource {
    pub fn new(site: Site, http: Arc<dyn HttpGet>) -> Self {
        Self { site, http }
    }

    fn search_url(&self, query: &str) -> String {
        format!("{}{}", self.site.search_prefix, urlencoding::encode(query.trim()))
    }

    fn absolute(&self, href: &str) -> String {
        if href.starts_with("http://") || href.starts_with("https://") {
            href.to_string()
        } else if href.starts_with("//") {
            format!("https:{href}")
        } else if href.starts_with('/') {
            format!("{}{href}", self.site.origin)
        } else {
            format!("{}/{href}", self.site.origin)
        }
    }
}

fn selector(source_name: &str, css: &str) -> Result<Selector, FetchError> {
    Selector::parse(css).map_err(|e| FetchError::parse(source_name, format!("{e:?}")))
}

/// `href` of the first element matching `css`.
pub fn first_link(html: &str, css: &str, source_name: &str) -> Result<Option<String>, FetchError> {
    let selector = selector(source_name, css)?;
    let document = Html::parse_document(html);
    Ok(document
        .select(&selector)
        .filter_map(|el| el.value().attr("href"))
        .map(str::trim)
        .find(|href| !href.is_empty())
        .map(str::to_string))
}

/// Visible text of the first element matching `css`, or of the whole page.
pub fn page_text(
    html: &str,
    css: Option<&str>,
    source_name: &str,
) -> Result<Option<String>, FetchError> {
    let document = Html::parse_document(html);
    let root = match css {
        Some(css) => {
            let selector = selector(source_name, css)?;
            match document.select(&selector).next() {
                Some(el) => el,
                None => return Ok(None),
            }
        }
        None => document.root_element(),
    };
    let text = visible_text(root);
    Ok((!text.is_empty()).then_some(text))
}

/// Trimmed text nodes joined by single spaces, skipping hidden elements.
fn visible_text(root: ElementRef<'_>) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for node in root.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            matches!(ancestor.value(), Node::Element(el) if HIDDEN_ELEMENTS.contains(&el.name()))
        });
        if hidden {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed);
        }
    }
    parts.join(" ")
}

#[async_trait]
impl KnowledgeSource for SiteSource {
    fn name(&self) -> &str {
        self.site.name
    }

    fn label(&self) -> &str {
        self.site.label
    }

    async fn fetch(&self, query: &str) -> Result<SourceHit, FetchError> {
        if query.trim().is_empty() {
            return Ok(SourceHit::empty());
        }

        let results = self
            .http
            .get(&self.search_url(query))
            .await?
            .require_success(self.name())?;
        let Some(href) = first_link(&results.body, self.site.link_selector, self.name())? else {
            return Ok(SourceHit::empty());
        };

        let page_url = self.absolute(&href);
        let page = self.http.get(&page_url).await?.require_success(self.name())?;

        Ok(
            match page_text(&page.body, self.site.content_selector, self.name())? {
                Some(text) => SourceHit::with_text(truncate_chars(&text, MAX_PAGE_CHARS), Some(page_url)),
                None => SourceHit::empty(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::CannedHttp;

    const MEDLINE_RESULTS: &str = r#"<html><body>
        <a href="/about/">About</a>
        <a class="results-link" href="/heartattack.html">Heart Attack</a>
        </body></html>"#;

    const MEDLINE_PAGE: &str = r#"<html><head><title>Heart Attack</title>
        <script>var tracking = 1;</script></head><body>
        <nav>Skip navigation</nav>
        <div class="main-content"><h1>Heart Attack</h1>
        <p>A heart attack happens when blood flow to the heart is blocked.</p>
        <style>.x{color:red}</style>
        <p>Chest pain is the most common symptom.</p></div></body></html>"#;

    #[test]
    fn visible_text_skips_scripts_and_styles() {
        let text = page_text(MEDLINE_PAGE, None, "test").unwrap().unwrap();
        assert!(text.contains("Skip navigation"));
        assert!(!text.contains("tracking"));
        assert!(!text.contains("color:red"));
    }

    #[test]
    fn container_selector_limits_text() {
        let text = page_text(MEDLINE_PAGE, Some("div.main-content"), "test")
            .unwrap()
            .unwrap();
        assert_eq!(
            text,
            "Heart Attack A heart attack happens when blood flow to the heart is blocked. \
             Chest pain is the most common symptom."
        );
        assert!(page_text(MEDLINE_PAGE, Some("div.missing"), "test").unwrap().is_none());
    }

    #[test]
    fn attribute_prefix_selectors() {
        let html = r#"<a href="https://other.org/x">x</a><a href="/drugs-supplements/sertraline/">s</a>"#;
        assert_eq!(
            first_link(html, MAYO_CLINIC.link_selector, "mayo").unwrap().as_deref(),
            Some("/drugs-supplements/sertraline/")
        );
        assert_eq!(
            first_link(html, CDC.link_selector, "cdc").unwrap().as_deref(),
            Some("/drugs-supplements/sertraline/")
        );
    }

    #[test]
    fn invalid_selector_is_parse_error() {
        assert!(first_link("<a></a>", "a[[", "test").is_err());
    }

    #[tokio::test]
    async fn medlineplus_follows_first_result() {
        let http = Arc::new(
            CannedHttp::new()
                .reply("https://medlineplus.gov/search/?query=heart%20attack", 200, MEDLINE_RESULTS)
                .reply("https://medlineplus.gov/heartattack.html", 200, MEDLINE_PAGE),
        );
        let hit = SiteSource::new(MEDLINEPLUS, http.clone())
            .fetch("heart attack")
            .await
            .unwrap();

        assert_eq!(hit.url.as_deref(), Some("https://medlineplus.gov/heartattack.html"));
        assert!(hit.text().unwrap().starts_with("Heart Attack A heart attack happens"));
    }

    #[tokio::test]
    async fn no_result_link_is_empty() {
        let http = CannedHttp::new().reply(
            "https://www.mayoclinic.org/search/search-results?q=chest%20pain",
            200,
            "<html><body><a href='/diseases-conditions/'>x</a></body></html>",
        );
        let hit = SiteSource::new(MAYO_CLINIC, Arc::new(http))
            .fetch("chest pain")
            .await
            .unwrap();
        assert!(hit.is_empty());
    }

    #[tokio::test]
    async fn page_text_is_bounded() {
        let long_page = format!("<html><body><p>{}</p></body></html>", "word ".repeat(1000));
        let http = CannedHttp::new()
            .reply("https://www.cdc.gov/search.do?queryText=flu", 200, "<a href='/flu/'>Flu</a>")
            .reply("https://www.cdc.gov/flu/", 200, &long_page);
        let hit = SiteSource::new(CDC, Arc::new(http)).fetch("flu").await.unwrap();
        assert_eq!(hit.text.unwrap().chars().count(), MAX_PAGE_CHARS);
    }

    #[tokio::test]
    async fn search_page_error_is_failure() {
        let http = CannedHttp::new().reply("https://www.cdc.gov/search.do?queryText=flu", 503, "");
        assert!(SiteSource::new(CDC, Arc::new(http)).fetch("flu").await.is_err());
    }

    #[test]
    fn relative_and_absolute_links() {
        let source = SiteSource::new(CDC, Arc::new(CannedHttp::new()));
        assert_eq!(source.absolute("/flu/"), "https://www.cdc.gov/flu/");
        assert_eq!(source.absolute("flu/"), "https://www.cdc.gov/flu/");
        assert_eq!(source.absolute("https://x.org/y"), "https://x.org/y");
        assert_eq!(source.absolute("//www.cdc.gov/x"), "https://www.cdc.gov/x");
    }
}
