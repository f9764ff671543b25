//! Google Scholar author profile as a pageable document.
//!
//! The profile's "Show more" button is backed by a plain GET endpoint
//! (`/citations?user=..&cstart=..&pagesize=..`), so the page is driven over
//! HTTP: every activation fetches the next chunk of rows and appends the
//! rows not seen before to the ones already loaded. The control and the rows
//! are read from the fetched HTML with the same selectors a browser session
//! would use.

use crate::cookies::{build_cookie_header, CookieManager};
use crate::error::{CitationsError, Result};
use crate::loader::{LoadMoreControl, PageHandle, DEFAULT_ROW_SELECTOR};
use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Default Google Scholar URL
pub const DEFAULT_SCHOLAR_URL: &str = "https://scholar.google.com";

/// Largest page size the profile endpoint honours
pub const MAX_PAGE_SIZE: u32 = 100;

/// User agent string for requests
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// A single publication row from a profile
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Publication {
    /// Publication title
    pub title: String,
    /// Authors as listed on the profile
    pub authors: String,
    /// Journal/Conference venue
    pub venue: String,
    /// Publication year
    pub year: String,
    /// "Cited by" count, 0 when the cell is empty
    pub citations: u32,
    /// Link to the publication's Scholar detail page
    pub url: String,
}

/// Which profile to load and how.
#[derive(Debug, Clone)]
pub struct ProfileQuery {
    /// Scholar user id (the `user=` query parameter)
    pub user: String,
    /// Base URL, overridable for mirror sites
    pub base_url: String,
    /// Interface language (`hl=`)
    pub language: String,
    /// Rows requested per chunk
    pub page_size: u32,
    /// Proxy URL (e.g., "http://127.0.0.1:7890")
    pub proxy: Option<String>,
    /// Upper bound of the random pause before each request
    pub request_jitter: Duration,
}

impl Default for ProfileQuery {
    fn default() -> Self {
        Self {
            user: String::new(),
            base_url: DEFAULT_SCHOLAR_URL.to_string(),
            language: "en".to_string(),
            page_size: MAX_PAGE_SIZE,
            proxy: None,
            request_jitter: Duration::from_millis(1500),
        }
    }
}

impl ProfileQuery {
    /// Build a query from a bare user id or a full profile URL.
    pub fn from_target(target: &str) -> Result<Self> {
        let target = target.trim();
        if target.is_empty() {
            return Err(CitationsError::Validation(
                "Profile target is empty".to_string(),
            ));
        }

        if !target.contains("://") {
            return Ok(Self {
                user: target.to_string(),
                ..Self::default()
            });
        }

        let url = Url::parse(target)
            .map_err(|e| CitationsError::Validation(format!("Invalid profile URL: {}", e)))?;

        let mut query = Self::default();
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "user" => query.user = value.into_owned(),
                "hl" => query.language = value.into_owned(),
                _ => {}
            }
        }
        if query.user.is_empty() {
            return Err(CitationsError::Validation(format!(
                "Profile URL has no user parameter: {}",
                target
            )));
        }

        query.base_url = url.origin().ascii_serialization();
        Ok(query)
    }

    /// Build the URL of the chunk starting at row `cstart`.
    pub fn chunk_url(&self, cstart: usize) -> Result<Url> {
        let mut url = Url::parse(&format!(
            "{}/citations",
            self.base_url.trim_end_matches('/')
        ))
        .map_err(|e| CitationsError::Config(format!("Invalid base URL: {}", e)))?;

        url.query_pairs_mut()
            .append_pair("user", &self.user)
            .append_pair("hl", &self.language)
            .append_pair("cstart", &cstart.to_string())
            .append_pair("pagesize", &self.page_size.clamp(1, MAX_PAGE_SIZE).to_string());

        Ok(url)
    }
}

/// An open profile session.
///
/// Holds every distinct row fetched so far and the latest chunk, which carries
/// the current state of the "Show more" control. A row that comes back in a
/// later chunk is kept once, so a server repeating itself shows up as a stall.
/// The session is released when the value is dropped.
pub struct ProfilePage {
    client: reqwest::Client,
    query: ProfileQuery,
    cookie_header: String,
    author: Option<String>,
    last_chunk: String,
    rows: Vec<String>,
    seen: HashSet<String>,
    fetches: usize,
}

impl ProfilePage {
    /// Open a profile and fetch its first chunk, using cookies from the
    /// default cookie file.
    pub async fn open(query: ProfileQuery) -> Result<Self> {
        let cookies = CookieManager::default().load();
        if cookies.is_empty() {
            warn!("No cookies loaded. Run 'rustcitations cookies import' if Scholar starts asking for a CAPTCHA.");
        } else {
            info!("Loaded {} cookies for Google Scholar", cookies.len());
        }
        Self::open_with_cookie_header(query, build_cookie_header(&cookies)).await
    }

    /// Open a profile with an explicit `Cookie` header (may be empty).
    pub async fn open_with_cookie_header(query: ProfileQuery, cookie_header: String) -> Result<Self> {
        if query.user.is_empty() {
            return Err(CitationsError::Validation(
                "Profile user id is empty".to_string(),
            ));
        }

        info!(user = %query.user, url = %query.base_url, "Opening Scholar profile");

        let client = build_http_client(query.proxy.as_deref())?;
        let mut page = Self {
            client,
            query,
            cookie_header,
            author: None,
            last_chunk: String::new(),
            rows: Vec::new(),
            seen: HashSet::new(),
            fetches: 0,
        };
        page.fetch_chunk(0).await?;
        Ok(page)
    }

    /// Number of chunks fetched so far
    pub fn chunk_count(&self) -> usize {
        self.fetches
    }

    /// Author name from the profile header, if present
    pub fn author_name(&self) -> Option<String> {
        self.author.clone()
    }

    /// Extract every loaded publication row, in page order.
    pub fn publications(&self) -> Result<Vec<Publication>> {
        let base = Url::parse(&self.query.base_url)
            .map_err(|e| CitationsError::Config(format!("Invalid base URL: {}", e)))?;

        parse_publications(&self.rows_document(), Some(&base))
    }

    /// Loaded rows wrapped in a table so they parse like a profile page.
    fn rows_document(&self) -> String {
        format!("<table><tbody>{}</tbody></table>", self.rows.concat())
    }

    async fn fetch_chunk(&mut self, cstart: usize) -> Result<()> {
        let url = self.query.chunk_url(cstart)?;

        let jitter = self.query.request_jitter.as_millis() as u64;
        if jitter > 0 {
            let delay = rand::random::<u64>() % jitter;
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        debug!(cstart, url = %url, "Fetching profile chunk");
        let html = fetch_page(&self.client, &url, &self.cookie_header).await?;

        if html.contains("Solving the above CAPTCHA") || html.contains("unusual traffic") {
            warn!(cstart, "CAPTCHA detected");
            return Err(CitationsError::Captcha);
        }

        let fresh = take_new_rows(&html, &mut self.seen)?;
        debug!(cstart, fresh = fresh.len(), "Profile chunk received");

        if self.author.is_none() {
            self.author = author_in(&html);
        }
        self.rows.extend(fresh);
        self.last_chunk = html;
        self.fetches += 1;
        Ok(())
    }
}

impl Drop for ProfilePage {
    fn drop(&mut self) {
        debug!(user = %self.query.user, rows = self.rows.len(), "Closing profile session");
    }
}

#[async_trait]
impl PageHandle for ProfilePage {
    async fn find_control(&mut self, id: &str) -> Result<Option<LoadMoreControl>> {
        find_control_in(&self.last_chunk, id)
    }

    async fn activate(&mut self, control: &LoadMoreControl) -> Result<()> {
        let loaded = self.rows.len();
        debug!(control = control.id(), loaded, "Requesting more rows");
        self.fetch_chunk(loaded).await
    }

    async fn count_rows(&mut self, selector: &str) -> Result<usize> {
        count_matches(&self.rows_document(), selector)
    }

    // The new rows arrived with the response, nothing left to wait for.
    async fn wait_for_rows(
        &mut self,
        selector: &str,
        _before: usize,
        _settle: Duration,
    ) -> Result<usize> {
        self.count_rows(selector).await
    }
}

/// Build HTTP client with optional proxy
fn build_http_client(proxy: Option<&str>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(30))
        .cookie_store(true);

    if let Some(proxy_url) = proxy {
        let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| {
            CitationsError::Config(format!("Invalid proxy URL '{}': {}", proxy_url, e))
        })?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| CitationsError::Config(format!("Failed to build HTTP client: {}", e)))
}

/// Fetch page content, sending the cookie header if present
async fn fetch_page(client: &reqwest::Client, url: &Url, cookie_header: &str) -> Result<String> {
    let mut request = client
        .get(url.as_str())
        .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
        .header("Accept-Language", "en-US,en;q=0.9")
        .header("Cache-Control", "no-cache");

    if !cookie_header.is_empty() {
        request = request.header("Cookie", cookie_header);
    }

    let response = request.send().await?;

    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(CitationsError::RateLimited(60));
    }

    if !status.is_success() {
        return Err(CitationsError::Api {
            code: status.as_u16() as i32,
            message: format!("HTTP error: {}", status),
        });
    }

    Ok(response.text().await?)
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| CitationsError::Parse(format!("Bad selector '{}': {}", css, e)))
}

/// Locate the control `#id` in one HTML document.
fn find_control_in(html: &str, id: &str) -> Result<Option<LoadMoreControl>> {
    let document = Html::parse_document(html);
    let control_selector = selector(&format!("#{}", id))?;

    Ok(document.select(&control_selector).next().map(|el| {
        let disabled = el.value().attr("disabled").is_some()
            || el
                .value()
                .attr("class")
                .is_some_and(|class| class.contains("disabled"));
        LoadMoreControl::new(id, disabled)
    }))
}

fn count_matches(html: &str, css: &str) -> Result<usize> {
    let matcher = selector(css)?;
    let document = Html::parse_document(html);
    let count = document.select(&matcher).count();
    Ok(count)
}

fn author_in(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("#gsc_prf_in").ok()?;
    let name = document.select(&selector).next().map(element_text);
    name.filter(|name| !name.is_empty())
}

/// Rows of `html` not yet in `seen`, as outer HTML.
///
/// A row is identified by its title link and title text. Rows without a
/// title link fall back to their markup.
fn take_new_rows(html: &str, seen: &mut HashSet<String>) -> Result<Vec<String>> {
    let document = Html::parse_document(html);
    let row_selector = selector(DEFAULT_ROW_SELECTOR)?;
    let title_selector = selector(".gsc_a_t a")?;

    let mut fresh = Vec::new();
    for row in document.select(&row_selector) {
        let markup = row.html();
        let key = match row.select(&title_selector).next() {
            Some(title) => format!(
                "{}|{}",
                title.value().attr("href").unwrap_or_default(),
                element_text(title)
            ),
            None => markup.clone(),
        };
        if seen.insert(key) {
            fresh.push(markup);
        }
    }
    Ok(fresh)
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Parse the publication rows of one profile chunk.
///
/// Relative links are resolved against `base` when given.
pub fn parse_publications(html: &str, base: Option<&Url>) -> Result<Vec<Publication>> {
    let document = Html::parse_document(html);

    let row_selector = selector(DEFAULT_ROW_SELECTOR)?;
    let title_selector = selector(".gsc_a_t a")?;
    let gray_selector = selector(".gsc_a_t .gs_gray")?;
    let cite_selector = selector(".gsc_a_c a")?;
    let year_selector = selector(".gsc_a_y span")?;

    let digits = Regex::new(r"\d[\d,]*").map_err(|e| CitationsError::Parse(e.to_string()))?;
    let year_suffix =
        Regex::new(r",\s*(19|20)\d{2}\s*$").map_err(|e| CitationsError::Parse(e.to_string()))?;

    let mut publications = Vec::new();

    for row in document.select(&row_selector) {
        let Some(title_elem) = row.select(&title_selector).next() else {
            continue;
        };
        let title = element_text(title_elem);
        if title.is_empty() {
            continue;
        }

        let mut publication = Publication {
            title,
            ..Default::default()
        };

        if let Some(href) = title_elem.value().attr("href") {
            publication.url = match base.and_then(|b| b.join(href).ok()) {
                Some(resolved) => resolved.to_string(),
                None => href.to_string(),
            };
        }

        let mut gray = row.select(&gray_selector);
        if let Some(authors) = gray.next() {
            publication.authors = element_text(authors);
        }
        if let Some(venue) = gray.next() {
            publication.venue = year_suffix.replace(&element_text(venue), "").trim().to_string();
        }

        // Empty or missing "Cited by" cell counts as zero
        if let Some(cite) = row.select(&cite_selector).next() {
            let text = element_text(cite);
            if let Some(found) = digits.find(&text) {
                publication.citations = found.as_str().replace(',', "").parse().unwrap_or(0);
            }
        }

        if let Some(year) = row.select(&year_selector).next() {
            publication.year = element_text(year);
        }

        publications.push(publication);
    }

    Ok(publications)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{load_all, LoaderConfig, Termination, DEFAULT_CONTROL_ID};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn row(title: &str, citations: &str, year: &str) -> String {
        format!(
            r#"<tr class="gsc_a_tr">
                <td class="gsc_a_t"><a href="/citations?view_op=view_citation&amp;citation_for_view=x" class="gsc_a_at">{title}</a>
                    <div class="gs_gray">A Author, B Author</div>
                    <div class="gs_gray">Journal of Tests 12 (3), 45-67<span class="gs_oph">, {year}</span></div></td>
                <td class="gsc_a_c"><a href="/scholar?cites=1" class="gsc_a_ac gs_ibl">{citations}</a></td>
                <td class="gsc_a_y"><span class="gsc_a_h gsc_a_hc gs_ibl">{year}</span></td>
            </tr>"#
        )
    }

    fn chunk(rows: &[String], more_disabled: bool) -> String {
        let disabled = if more_disabled { r#" disabled="""# } else { "" };
        format!(
            r#"<html><body>
                <div id="gsc_prf_in">Ada Lovelace</div>
                <table id="gsc_a_t"><tbody id="gsc_a_b">{}</tbody></table>
                <button type="button" id="gsc_bpf_more" class="gs_btnPD gs_in_ib"{}><span class="gs_lbl">Show more</span></button>
            </body></html>"#,
            rows.join("\n"),
            disabled
        )
    }

    fn test_query(server: &MockServer, page_size: u32) -> ProfileQuery {
        ProfileQuery {
            user: "abcDEF123".to_string(),
            base_url: server.uri(),
            page_size,
            request_jitter: Duration::ZERO,
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_publications() {
        let html = chunk(
            &[row("Deep Learning", "1,234", "2015"), row("Uncited Work", "", "2020")],
            false,
        );
        let base = Url::parse("https://scholar.google.com").expect("valid url");
        let pubs = parse_publications(&html, Some(&base)).expect("parse");

        assert_eq!(pubs.len(), 2);
        assert_eq!(pubs[0].title, "Deep Learning");
        assert_eq!(pubs[0].citations, 1234);
        assert_eq!(pubs[0].authors, "A Author, B Author");
        assert_eq!(pubs[0].venue, "Journal of Tests 12 (3), 45-67");
        assert_eq!(pubs[0].year, "2015");
        assert!(pubs[0].url.starts_with("https://scholar.google.com/citations?"));
        assert_eq!(pubs[1].citations, 0);
    }

    #[test]
    fn test_parse_missing_citation_cell() {
        let html = r#"<table><tr class="gsc_a_tr"><td class="gsc_a_t"><a href="/x">Lonely</a></td></tr></table>"#;
        let pubs = parse_publications(html, None).expect("parse");
        assert_eq!(pubs.len(), 1);
        assert_eq!(pubs[0].citations, 0);
        assert_eq!(pubs[0].url, "/x");
    }

    #[test]
    fn test_parse_empty_html() {
        let pubs = parse_publications("<html><body></body></html>", None).expect("parse");
        assert!(pubs.is_empty());
    }

    #[test]
    fn test_find_control_states() {
        let enabled = chunk(&[], false);
        let disabled = chunk(&[], true);
        let by_class = r#"<button id="gsc_bpf_more" class="gs_btnPD gs_dis disabled"></button>"#;

        let control = find_control_in(&enabled, DEFAULT_CONTROL_ID)
            .expect("parse")
            .expect("present");
        assert!(!control.is_disabled());

        assert!(find_control_in(&disabled, DEFAULT_CONTROL_ID)
            .expect("parse")
            .expect("present")
            .is_disabled());
        assert!(find_control_in(by_class, DEFAULT_CONTROL_ID)
            .expect("parse")
            .expect("present")
            .is_disabled());
        assert!(find_control_in("<html></html>", DEFAULT_CONTROL_ID)
            .expect("parse")
            .is_none());
    }

    #[test]
    fn test_query_from_url() {
        let query = ProfileQuery::from_target(
            "https://scholar.google.com/citations?hl=de&user=wWlI9XMAAAAJ",
        )
        .expect("valid target");
        assert_eq!(query.user, "wWlI9XMAAAAJ");
        assert_eq!(query.language, "de");
        assert_eq!(query.base_url, "https://scholar.google.com");
    }

    #[test]
    fn test_query_from_user_id() {
        let query = ProfileQuery::from_target("wWlI9XMAAAAJ").expect("valid target");
        assert_eq!(query.user, "wWlI9XMAAAAJ");
        assert_eq!(query.base_url, DEFAULT_SCHOLAR_URL);
    }

    #[test]
    fn test_query_rejects_url_without_user() {
        assert!(ProfileQuery::from_target("https://scholar.google.com/citations?hl=en").is_err());
        assert!(ProfileQuery::from_target("   ").is_err());
    }

    #[test]
    fn test_chunk_url() {
        let query = ProfileQuery {
            user: "abc".to_string(),
            page_size: 500,
            ..Default::default()
        };
        let url = query.chunk_url(100).expect("url");
        assert!(url.as_str().starts_with("https://scholar.google.com/citations?"));
        assert!(url.as_str().contains("user=abc"));
        assert!(url.as_str().contains("cstart=100"));
        assert!(url.as_str().contains("pagesize=100"));
    }

    #[tokio::test]
    async fn test_load_all_profile_chunks() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/citations"))
            .and(query_param("cstart", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_string(chunk(
                &[row("P1", "10", "2020"), row("P2", "5", "2019")],
                false,
            )))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/citations"))
            .and(query_param("cstart", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_string(chunk(
                &[row("P3", "3", "2018"), row("P4", "", "2017")],
                false,
            )))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/citations"))
            .and(query_param("cstart", "4"))
            .respond_with(ResponseTemplate::new(200).set_body_string(chunk(
                &[row("P5", "1", "2016")],
                true,
            )))
            .mount(&server)
            .await;

        let mut page = ProfilePage::open_with_cookie_header(test_query(&server, 2), String::new())
            .await
            .expect("open");
        let outcome = load_all(&mut page, &LoaderConfig::default()).await;

        assert!(matches!(outcome.termination, Termination::ControlDisabled));
        assert_eq!(outcome.activations, 2);
        assert_eq!(outcome.rows, 5);
        assert_eq!(page.chunk_count(), 3);
        assert_eq!(page.author_name().as_deref(), Some("Ada Lovelace"));

        let titles: Vec<String> = page
            .publications()
            .expect("publications")
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, vec!["P1", "P2", "P3", "P4", "P5"]);
    }

    #[tokio::test]
    async fn test_repeated_rows_count_as_stall() {
        let server = MockServer::start().await;

        // The server ignores cstart and keeps sending the same row.
        Mock::given(method("GET"))
            .and(path("/citations"))
            .respond_with(ResponseTemplate::new(200).set_body_string(chunk(
                &[row("Only Paper", "7", "2021")],
                false,
            )))
            .mount(&server)
            .await;

        let mut page = ProfilePage::open_with_cookie_header(test_query(&server, 1), String::new())
            .await
            .expect("open");
        let config = LoaderConfig::new(3).expect("valid config");
        let outcome = load_all(&mut page, &config).await;

        assert!(matches!(outcome.termination, Termination::StallLimitReached));
        assert_eq!(outcome.activations, 3);
        assert_eq!(outcome.rows, 1);
        assert_eq!(page.chunk_count(), 4);

        let pubs = page.publications().expect("publications");
        assert_eq!(pubs.len(), 1);
        assert_eq!(pubs[0].title, "Only Paper");
        assert_eq!(pubs[0].citations, 7);
    }

    #[test]
    fn test_take_new_rows_skips_seen() {
        let mut seen = HashSet::new();
        let first = chunk(&[row("A", "1", "2020"), row("B", "2", "2021")], false);
        let second = chunk(&[row("B", "2", "2021"), row("C", "3", "2022")], false);

        assert_eq!(take_new_rows(&first, &mut seen).expect("rows").len(), 2);
        let fresh = take_new_rows(&second, &mut seen).expect("rows");
        assert_eq!(fresh.len(), 1);
        assert!(fresh[0].contains(">C</a>"));
    }

    #[tokio::test]
    async fn test_open_detects_captcha() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/citations"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<html><body>Our systems have detected unusual traffic from your computer network.</body></html>",
            ))
            .mount(&server)
            .await;

        let result = ProfilePage::open_with_cookie_header(test_query(&server, 100), String::new()).await;
        assert!(matches!(result, Err(CitationsError::Captcha)));
    }

    #[tokio::test]
    async fn test_rate_limit_is_transient() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/citations"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = ProfilePage::open_with_cookie_header(test_query(&server, 100), String::new())
            .await
            .err()
            .expect("rate limited");
        assert!(matches!(err, CitationsError::RateLimited(_)));
        assert!(err.is_transient());
    }
}
