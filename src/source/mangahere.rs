//! MangaHere backend.
//!
//! Pages are fetched as plain HTML and picked apart with regular
//! expressions; the markup is the site's, so every pattern here is tied
//! to it.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::MangaSource;
use super::models::{ChapterSummary, MangaInfo, MangaStatus, Page, SearchPage, SearchResult};
use crate::http::HttpClient;

/// A full results page means there is probably another one.
const RESULTS_PER_PAGE: usize = 20;

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static pattern compiles")
}

static LIST_ITEM: Lazy<Regex> = Lazy::new(|| re(r"(?s)<li(?:\s[^>]*)?>(.*?)</li>"));
static SEARCH_LINK: Lazy<Regex> = Lazy::new(|| {
    re(r#"(?s)<p class="manga-list-4-item-title"[^>]*>\s*<a[^>]*href="[^"]*/manga/([^"/]+)/?"[^>]*title="([^"]*)""#)
});
static IMG_SRC: Lazy<Regex> = Lazy::new(|| re(r#"<img[^>]*src="([^"]*)""#));
static SEARCH_STATUS: Lazy<Regex> = Lazy::new(|| {
    re(r#"(?s)<p class="manga-list-4-show-tag-list-2"[^>]*>\s*<a[^>]*>([^<]*)<"#)
});
static PARAGRAPH: Lazy<Regex> = Lazy::new(|| re(r"(?s)<p[^>]*>([^<]*)</p>"));

static INFO_TITLE: Lazy<Regex> =
    Lazy::new(|| re(r#"<span class="detail-info-right-title-font"[^>]*>([^<]*)<"#));
static INFO_COVER: Lazy<Regex> = Lazy::new(|| {
    re(r#"<img[^>]*class="[^"]*detail-info-cover-img[^"]*"[^>]*src="([^"]*)""#)
});
static INFO_DESCRIPTION: Lazy<Regex> =
    Lazy::new(|| re(r#"(?s)<p class="fullcontent"[^>]*>(.*?)</p>"#));
static INFO_STATUS: Lazy<Regex> =
    Lazy::new(|| re(r#"<span class="detail-info-right-title-tip"[^>]*>([^<]*)<"#));
static INFO_GENRES: Lazy<Regex> =
    Lazy::new(|| re(r#"(?s)<p class="detail-info-right-tag-list"[^>]*>(.*?)</p>"#));
static INFO_AUTHORS: Lazy<Regex> =
    Lazy::new(|| re(r#"(?s)<p class="detail-info-right-say"[^>]*>(.*?)</p>"#));
static LINK_TITLE: Lazy<Regex> = Lazy::new(|| re(r#"<a[^>]*title="([^"]*)""#));
static CHAPTER_LIST: Lazy<Regex> =
    Lazy::new(|| re(r#"(?s)<ul class="detail-main-list"[^>]*>(.*?)</ul>"#));
static CHAPTER_ITEM: Lazy<Regex> = Lazy::new(|| {
    re(r#"(?s)<a[^>]*href="([^"]*)"[^>]*>.*?<p class="title3"[^>]*>([^<]*)</p>(?:\s*<p class="title2"[^>]*>([^<]*)</p>)?"#)
});
static CHAPTER_NUMBER: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)(?:chapter|ch\.?|#|\bc)\s*(\d+(?:\.\d+)?)"));

static BLOCKED_NOTICE: Lazy<Regex> =
    Lazy::new(|| re(r#"(?s)<p class="detail-block-content"[^>]*>(.*?)</p>"#));
static CHAPTER_PAGES_VAR: Lazy<Regex> =
    Lazy::new(|| re(r"(?s)var\s+chapterPages\s*=\s*(\[.*?\]);"));
static READER_IMG: Lazy<Regex> = Lazy::new(|| {
    re(r#"<img[^>]*class="[^"]*reader-main-img[^"]*"[^>]*src="([^"]*)""#)
});
static TAG: Lazy<Regex> = Lazy::new(|| re(r"<[^>]*>"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| re(r"\s+"));

/// Scraper for mangahere.cc
pub struct MangaHere {
    http: Arc<HttpClient>,
    base_url: String,
}

impl MangaHere {
    pub fn new(http: Arc<HttpClient>) -> Self {
        let base_url = http.config().base_url.trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    /// The site hides adult series unless this cookie is set.
    fn request_headers(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("Referer".to_string(), format!("{}/", self.base_url)),
            ("Cookie".to_string(), "isAdult=1".to_string()),
        ])
    }

    async fn fetch_html(&self, url: &str) -> Result<String> {
        self.http.get_text(url, &self.request_headers()).await
    }
}

#[async_trait]
impl MangaSource for MangaHere {
    fn name(&self) -> &str {
        "MangaHere"
    }

    #[instrument(skip(self))]
    async fn search(&self, query: &str, page: u32) -> Result<SearchPage> {
        let page_param = page.to_string();
        let url = Url::parse_with_params(
            &format!("{}/search", self.base_url),
            &[("title", query), ("page", page_param.as_str())],
        )?;
        let html = self.fetch_html(url.as_str()).await.context("Search failed")?;

        let results = parse_search_results(&html, &self.base_url);
        debug!(count = results.len(), "parsed search results");

        Ok(SearchPage {
            current_page: page,
            has_next_page: results.len() >= RESULTS_PER_PAGE,
            results,
        })
    }

    #[instrument(skip(self))]
    async fn fetch_info(&self, manga_id: &str) -> Result<MangaInfo> {
        let url = format!("{}/manga/{}/", self.base_url, manga_id);
        let html = self
            .fetch_html(&url)
            .await
            .context("Failed to fetch manga info")?;

        Ok(parse_manga_info(&html, manga_id, &self.base_url))
    }

    #[instrument(skip(self))]
    async fn fetch_pages(&self, chapter_id: &str) -> Result<Vec<Page>> {
        let url = format!("{}/manga/{}/1.html", self.base_url, chapter_id);
        let html = self
            .fetch_html(&url)
            .await
            .context("Failed to fetch chapter pages")?;

        let referer = format!("{}/", self.base_url);
        parse_chapter_pages(&html, &self.base_url, &referer)
    }
}

fn parse_search_results(html: &str, base_url: &str) -> Vec<SearchResult> {
    LIST_ITEM
        .captures_iter(html)
        .filter_map(|item| {
            let item = item.get(1)?.as_str();
            let link = SEARCH_LINK.captures(item)?;
            let id = link[1].to_string();
            let title = clean_text(&link[2]);
            if title.is_empty() {
                return None;
            }

            Some(SearchResult {
                id,
                title,
                image: IMG_SRC
                    .captures(item)
                    .and_then(|c| resolve_url(base_url, &c[1])),
                description: PARAGRAPH
                    .captures_iter(item)
                    .last()
                    .map(|c| clean_text(&c[1]))
                    .unwrap_or_default(),
                status: SEARCH_STATUS
                    .captures(item)
                    .map(|c| MangaStatus::from_label(&c[1]))
                    .unwrap_or_default(),
            })
        })
        .collect()
}

fn parse_manga_info(html: &str, manga_id: &str, base_url: &str) -> MangaInfo {
    MangaInfo {
        id: manga_id.to_string(),
        title: capture(&INFO_TITLE, html)
            .map(|t| clean_text(&t))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| manga_id.to_string()),
        description: capture(&INFO_DESCRIPTION, html)
            .map(|d| clean_text(&TAG.replace_all(&d, " ")))
            .unwrap_or_default(),
        image: capture(&INFO_COVER, html).and_then(|src| resolve_url(base_url, &src)),
        status: capture(&INFO_STATUS, html)
            .map(|s| MangaStatus::from_label(&s))
            .unwrap_or_default(),
        genres: capture(&INFO_GENRES, html)
            .map(|block| link_titles(&block))
            .unwrap_or_default(),
        authors: capture(&INFO_AUTHORS, html)
            .map(|block| link_titles(&block))
            .unwrap_or_default(),
        chapters: capture(&CHAPTER_LIST, html)
            .map(|list| parse_chapters(&list))
            .unwrap_or_default(),
    }
}

/// First capture group of the first match
fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text).map(|c| c[1].to_string())
}

fn link_titles(block: &str) -> Vec<String> {
    LINK_TITLE
        .captures_iter(block)
        .map(|c| clean_text(&c[1]))
        .filter(|t| !t.is_empty())
        .collect()
}

/// Chapters in site order (newest first on MangaHere).
fn parse_chapters(list: &str) -> Vec<ChapterSummary> {
    LIST_ITEM
        .captures_iter(list)
        .filter_map(|item| {
            let chapter = CHAPTER_ITEM.captures(item.get(1)?.as_str())?;
            let id = chapter_id_from_href(&chapter[1])?;
            let title = clean_text(&chapter[2]);
            let number = chapter_number(&title)
                .or_else(|| id.rsplit('/').next().and_then(chapter_number));

            Some(ChapterSummary {
                id,
                title,
                chapter_number: number,
                released_date: chapter
                    .get(3)
                    .map(|d| clean_text(d.as_str()))
                    .filter(|d| !d.is_empty()),
            })
        })
        .collect()
}

/// `/manga/one_piece/c001/1.html` -> `one_piece/c001`
fn chapter_id_from_href(href: &str) -> Option<String> {
    let (_, rest) = href.split_once("/manga/")?;
    let rest = rest.trim_end_matches('/');
    let rest = match rest.rsplit_once('/') {
        Some((prefix, last)) if last.ends_with(".html") => prefix,
        _ => rest,
    };
    (!rest.is_empty()).then(|| rest.to_string())
}

fn chapter_number(text: &str) -> Option<f64> {
    CHAPTER_NUMBER
        .captures(text)
        .and_then(|c| c[1].parse().ok())
}

fn parse_chapter_pages(html: &str, base_url: &str, referer: &str) -> Result<Vec<Page>> {
    if let Some(notice) = BLOCKED_NOTICE.captures(html) {
        let notice = &notice[1];
        if notice.contains("Dear user") || notice.contains("blocked") {
            bail!("Chapter blocked due to copyright");
        }
    }

    let mut urls: Vec<String> = CHAPTER_PAGES_VAR
        .captures(html)
        .and_then(|c| serde_json::from_str::<Vec<Value>>(&c[1]).ok())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(u) => Some(u.as_str()),
                    Value::Object(fields) => fields.get("u").and_then(Value::as_str),
                    _ => None,
                })
                .filter_map(|u| resolve_url(base_url, u))
                .collect()
        })
        .unwrap_or_default();

    if urls.is_empty() {
        urls = READER_IMG
            .captures_iter(html)
            .filter_map(|c| resolve_url(base_url, &c[1]))
            .collect();
    }

    let headers = BTreeMap::from([("Referer".to_string(), referer.to_string())]);
    Ok(urls
        .into_iter()
        .enumerate()
        .map(|(i, img)| Page {
            page: i as u32 + 1,
            img,
            header_for_image: headers.clone(),
        })
        .collect())
}

fn resolve_url(base_url: &str, url: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() {
        None
    } else if url.starts_with("http://") || url.starts_with("https://") {
        Some(url.to_string())
    } else if let Some(rest) = url.strip_prefix("//") {
        Some(format!("https://{rest}"))
    } else if url.starts_with('/') {
        Some(format!("{base_url}{url}"))
    } else {
        Some(url.to_string())
    }
}

fn clean_text(text: &str) -> String {
    WHITESPACE
        .replace_all(text.trim(), " ")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
